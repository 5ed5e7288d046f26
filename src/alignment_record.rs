use crate::paf::ParseErr;

/// One alignment line of a PAF file, reduced to the columns needed to build contacts.
///
/// Numeric columns are kept as text and parsed on demand, so a bad value only
/// excludes the record (or the pair) that actually needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    /// Full fragment name, optionally `base:start-end`
    pub query_name: String,
    pub strand: Strand,
    pub target_name: String,
    pub target_start: String,
    pub target_end: String,
    pub matches: String,
    pub alignment_length: String,
    /// Copied verbatim into the contact line
    pub mapping_quality: String,
}

/// Strand orientation for alignments
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    /// Anything other than `+` counts as reverse.
    pub fn from_paf_field(field: &str) -> Self {
        if field == "+" {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }

    /// SAM-style orientation flag used in the contact format
    pub fn flag(self) -> u8 {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 16,
        }
    }
}

impl AlignmentRecord {
    /// Name shared by all split fragments of one read: everything before the first ':'.
    pub fn base_read_id(&self) -> &str {
        base_read_id(&self.query_name)
    }

    /// Fraction of matching bases over the alignment block length.
    pub fn identity(&self) -> Result<f64, ParseErr> {
        let matches = self.matches.parse::<u64>().map_err(ParseErr::InvalidField)?;
        let aln_len = self
            .alignment_length
            .parse::<u64>()
            .map_err(ParseErr::InvalidField)?;
        if aln_len == 0 {
            return Err(ParseErr::ZeroLength);
        }
        Ok(matches as f64 / aln_len as f64)
    }

    /// Midpoint of the target interval, rounded towards negative infinity.
    pub fn target_midpoint(&self) -> Result<i64, ParseErr> {
        let start = self.target_start.parse::<i64>().map_err(ParseErr::InvalidField)?;
        let end = self.target_end.parse::<i64>().map_err(ParseErr::InvalidField)?;
        let sum = start.checked_add(end).ok_or_else(|| {
            ParseErr::InvalidFormat(format!("Coordinate overflow: {} + {}", start, end))
        })?;
        Ok(sum.div_euclid(2))
    }
}

pub fn base_read_id(query_name: &str) -> &str {
    query_name.split(':').next().unwrap_or(query_name)
}
