//! Per-read processing: fragment deduplication, identity filtering and
//! pairwise expansion of one read's alignments into contacts.

use crate::alignment_record::AlignmentRecord;
use crate::contact::{ContactEnd, ContactRecord};
use log::trace;
use rustc_hash::FxHashMap;

/// Drop every fragment name that occurs more than once in the group.
///
/// A fragment aligned to several places is not uniquely placed, so all copies
/// go, not just the extras. Groups of one record are left untouched.
pub fn remove_multimapped<'a>(group: &'a [AlignmentRecord]) -> Vec<&'a AlignmentRecord> {
    if group.len() <= 1 {
        return group.iter().collect();
    }

    let mut occurrences: FxHashMap<&str, usize> = FxHashMap::default();
    for record in group {
        *occurrences.entry(record.query_name.as_str()).or_insert(0) += 1;
    }

    group
        .iter()
        .filter(|record| occurrences[record.query_name.as_str()] == 1)
        .collect()
}

/// Keep records whose identity is strictly above `min_identity`.
/// Records with unparsable counts or a zero block length are dropped.
pub fn filter_by_identity<'a>(
    records: Vec<&'a AlignmentRecord>,
    min_identity: f64,
) -> Vec<&'a AlignmentRecord> {
    records
        .into_iter()
        .filter(|record| match record.identity() {
            Ok(identity) => identity > min_identity,
            Err(e) => {
                trace!("Dropping {}: {}", record.query_name, e);
                false
            }
        })
        .collect()
}

/// Contacts for one read: every unordered pair of surviving alignments, in
/// encounter order (`(0,1), (0,2), .., (1,2), ..`).
///
/// The pairs are produced lazily; a read with `n` survivors yields
/// `n * (n - 1) / 2` contacts. A record whose target coordinates do not parse
/// contributes no pairs.
pub fn group_contacts(group: &[AlignmentRecord], min_identity: f64) -> GroupContacts<'_> {
    let survivors = filter_by_identity(remove_multimapped(group), min_identity);
    if survivors.len() < 2 {
        return GroupContacts::default();
    }

    let first: &AlignmentRecord = survivors[0];
    GroupContacts {
        read_name: first.base_read_id(),
        ends: survivors.into_iter().map(contact_end).collect(),
        i: 0,
        j: 1,
    }
}

#[derive(Default)]
pub struct GroupContacts<'a> {
    ends: Vec<Option<ContactEnd<'a>>>,
    read_name: &'a str,
    i: usize,
    j: usize,
}

impl<'a> Iterator for GroupContacts<'a> {
    type Item = ContactRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.ends.len();
        while self.i < n {
            if self.j >= n {
                self.i += 1;
                self.j = self.i + 1;
                continue;
            }
            let (i, j) = (self.i, self.j);
            self.j += 1;
            if let (Some(first), Some(second)) = (self.ends[i], self.ends[j]) {
                return Some(ContactRecord {
                    first,
                    second,
                    read_name: self.read_name,
                });
            }
        }
        None
    }
}

fn contact_end(record: &AlignmentRecord) -> Option<ContactEnd<'_>> {
    match record.target_midpoint() {
        Ok(pos) => Some(ContactEnd {
            strand: record.strand,
            chrom: &record.target_name,
            pos,
            mapq: &record.mapping_quality,
        }),
        Err(e) => {
            trace!("No position for {}: {}", record.query_name, e);
            None
        }
    }
}
