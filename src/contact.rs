use crate::alignment_record::Strand;
use std::fmt;

/// One side of a contact: where a fragment of the read landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEnd<'a> {
    pub strand: Strand,
    pub chrom: &'a str,
    pub pos: i64,
    pub mapq: &'a str,
}

/// A pair of positions linked by one read, written as an MND line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactRecord<'a> {
    pub first: ContactEnd<'a>,
    pub second: ContactEnd<'a>,
    pub read_name: &'a str,
}

impl fmt::Display for ContactRecord<'_> {
    /// `str1 chr1 pos1 frag1 str2 chr2 pos2 frag2 mapq1 cigar1 seq1 mapq2 cigar2 seq2 name1 name2`,
    /// with `0`/`1` fragment ids and `-` for the unused cigar/sequence columns.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t0\t{}\t{}\t{}\t1\t{}\t-\t-\t{}\t-\t-\t{}\t{}",
            self.first.strand.flag(),
            self.first.chrom,
            self.first.pos,
            self.second.strand.flag(),
            self.second.chrom,
            self.second.pos,
            self.first.mapq,
            self.second.mapq,
            self.read_name,
            self.read_name
        )
    }
}
