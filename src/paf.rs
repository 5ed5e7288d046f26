//! PAF (Pairwise Alignment Format) parsing
//!
//! Splits PAF lines into [`AlignmentRecord`]s and opens PAF inputs, either
//! uncompressed or BGZF-compressed.

use crate::alignment_record::{AlignmentRecord, Strand};
use log::debug;
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Error as IoError, Read, Seek, SeekFrom};
use std::num::{NonZeroUsize, ParseIntError};

/// Mandatory PAF columns; shorter lines are malformed.
pub const PAF_MIN_FIELDS: usize = 12;

#[derive(Debug)]
pub enum ParseErr {
    NotEnoughFields(usize),
    InvalidField(ParseIntError),
    ZeroLength,
    InvalidFormat(String),
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::NotEnoughFields(n) => write!(
                f,
                "Not enough fields in PAF record ({} < {})",
                n, PAF_MIN_FIELDS
            ),
            ParseErr::InvalidField(e) => write!(f, "Invalid field: {}", e),
            ParseErr::ZeroLength => write!(f, "Alignment block length is zero"),
            ParseErr::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseErr {}

const BGZF_HEADER_SIZE: usize = 18;

/// Check whether a file starts with a valid BGZF header.
/// Returns `Ok(false)` for regular gzip, too-small files, or plain text.
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => {
            Ok(header[0..2] == [0x1f, 0x8b]      // gzip magic
                && header[2] == 0x08              // DEFLATE
                && header[3] == 0x04              // FEXTRA
                && header[10..12] == [0x06, 0x00] // XLEN=6
                && header[12..14] == [b'B', b'C'] // BC subfield
                && header[14..16] == [0x02, 0x00]) // SLEN=2
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// Parse a single PAF line into an AlignmentRecord.
///
/// Only the line terminator is stripped, so empty columns keep their
/// position. Only the column count is checked here; numeric columns are
/// validated when they are used.
pub fn parse_paf_line(line: &str) -> Result<AlignmentRecord, ParseErr> {
    let fields: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split('\t').collect();
    if fields.len() < PAF_MIN_FIELDS {
        return Err(ParseErr::NotEnoughFields(fields.len()));
    }

    Ok(AlignmentRecord {
        query_name: fields[0].to_string(),
        strand: Strand::from_paf_field(fields[4]),
        target_name: fields[5].to_string(),
        target_start: fields[7].to_string(),
        target_end: fields[8].to_string(),
        matches: fields[9].to_string(),
        alignment_length: fields[10].to_string(),
        mapping_quality: fields[11].to_string(),
    })
}

/// Open a PAF file for line-oriented reading.
/// `.gz`/`.bgz` inputs must be BGZF and are decompressed with `threads` workers.
pub fn open_paf_reader(paf_file: &str, threads: NonZeroUsize) -> io::Result<Box<dyn BufRead>> {
    let mut file = File::open(paf_file)
        .map_err(|e| IoError::new(e.kind(), format!("Failed to open file '{}': {}", paf_file, e)))?;

    if [".gz", ".bgz"].iter().any(|e| paf_file.ends_with(e)) {
        if !is_bgzf(&mut file)? {
            return Err(IoError::new(
                io::ErrorKind::InvalidData,
                format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.paf.gz",
                    paf_file, paf_file
                ),
            ));
        }
        debug!("Reading {} as BGZF with {} decompression threads", paf_file, threads);
        let reader = bgzf::io::MultithreadedReader::with_worker_count(threads, file);
        Ok(Box::new(BufReader::new(reader)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
