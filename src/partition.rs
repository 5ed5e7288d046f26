//! Streaming partitioner that cuts a PAF stream into chunks at read boundaries.
//!
//! Input must keep all fragments of one read adjacent (e.g. mapper output in
//! read order). A chunk is sealed only when the read id changes, so a read's
//! alignments always travel together.

use crate::alignment_record::AlignmentRecord;
use crate::paf::parse_paf_line;
use log::debug;
use std::io::{self, BufRead};

/// A sealed run of records, tagged with its submission order.
#[derive(Debug)]
pub struct Chunk {
    pub index: usize,
    pub records: Vec<AlignmentRecord>,
}

/// Running counters for the input side of a conversion
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartitionStats {
    pub input_lines: u64,
    pub malformed_lines: u64,
    pub records: u64,
    pub bytes_read: u64,
    pub chunks: usize,
}

pub struct ReadGroupPartitioner<R> {
    reader: R,
    chunk_size: usize,
    buffer: Vec<AlignmentRecord>,
    line: String,
    stats: PartitionStats,
    finished: bool,
}

impl<R: BufRead> ReadGroupPartitioner<R> {
    /// `chunk_size` is a lower bound: a chunk grows until both this many
    /// records are buffered and the next record belongs to a different read.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size,
            buffer: Vec::new(),
            line: String::new(),
            stats: PartitionStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> PartitionStats {
        self.stats
    }

    fn should_seal_before(&self, next: &AlignmentRecord) -> bool {
        match self.buffer.last() {
            Some(last) => {
                self.buffer.len() >= self.chunk_size && last.base_read_id() != next.base_read_id()
            }
            None => false,
        }
    }

    fn seal(&mut self, records: Vec<AlignmentRecord>) -> Chunk {
        let chunk = Chunk {
            index: self.stats.chunks,
            records,
        };
        self.stats.chunks += 1;
        debug!(
            "Sealed chunk {} with {} records",
            chunk.index,
            chunk.records.len()
        );
        chunk
    }
}

impl<R: BufRead> Iterator for ReadGroupPartitioner<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.line.clear();
            let bytes = match self.reader.read_line(&mut self.line) {
                Ok(n) => n,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to read PAF line {}: {}",
                            self.stats.input_lines + 1,
                            e
                        ),
                    )));
                }
            };

            if bytes == 0 {
                self.finished = true;
                if self.buffer.is_empty() {
                    return None;
                }
                let records = std::mem::take(&mut self.buffer);
                return Some(Ok(self.seal(records)));
            }

            self.stats.input_lines += 1;
            self.stats.bytes_read += bytes as u64;

            let record = match parse_paf_line(&self.line) {
                Ok(record) => record,
                Err(e) => {
                    self.stats.malformed_lines += 1;
                    debug!("Skipping line {}: {}", self.stats.input_lines, e);
                    continue;
                }
            };
            self.stats.records += 1;

            if self.should_seal_before(&record) {
                let sealed = std::mem::replace(&mut self.buffer, vec![record]);
                return Some(Ok(self.seal(sealed)));
            }
            self.buffer.push(record);
        }
    }
}
