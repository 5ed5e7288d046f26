use crate::alignment_record::AlignmentRecord;
use crate::group::group_contacts;
use crate::paf::open_paf_reader;
use crate::partition::{Chunk, PartitionStats, ReadGroupPartitioner};
use crossbeam_channel::{bounded, unbounded};
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

pub const DEFAULT_MIN_IDENTITY: f64 = 0.75;
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;
/// Smaller chunks still work but spend most of their time on task overhead.
pub const RECOMMENDED_MIN_CHUNK_SIZE: usize = 1000;

const PROGRESS_EVERY_CHUNKS: usize = 10;

/// Configuration for the convert command
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Alignments must have matches / block length strictly above this
    pub min_identity: f64,
    /// Minimum number of records per chunk before it may be sealed
    pub chunk_size: usize,
    pub num_workers: NonZeroUsize,
    /// Where chunk spool files go; system temp dir if unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            min_identity: DEFAULT_MIN_IDENTITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            num_workers: resolve_worker_count(0),
            temp_dir: None,
        }
    }
}

impl ConvertConfig {
    /// Reject settings that make the run meaningless; warn about wasteful ones.
    pub fn validate(&self) -> io::Result<()> {
        if !(0.0..=1.0).contains(&self.min_identity) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Minimum identity must be between 0.0 and 1.0 (got {})",
                    self.min_identity
                ),
            ));
        }
        if let Some(ref temp_dir) = self.temp_dir {
            if !temp_dir.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Temporary directory '{}' does not exist", temp_dir.display()),
                ));
            }
        }
        if self.chunk_size < RECOMMENDED_MIN_CHUNK_SIZE {
            warn!(
                "Chunk size {} is small and may be inefficient; at least {} lines are recommended",
                self.chunk_size, RECOMMENDED_MIN_CHUNK_SIZE
            );
        }
        Ok(())
    }

    /// Sealed chunks allowed to wait or run at once before the reader blocks.
    fn max_in_flight(&self) -> usize {
        self.num_workers.get() * 2
    }
}

/// `0` picks half of the logical CPUs, never less than one.
pub fn resolve_worker_count(requested: usize) -> NonZeroUsize {
    NonZeroUsize::new(requested)
        .or_else(|| NonZeroUsize::new(num_cpus::get() / 2))
        .unwrap_or(NonZeroUsize::MIN)
}

/// Totals for one conversion run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertStats {
    pub input: PartitionStats,
    pub groups: u64,
    pub contacts: u64,
}

/// A finished chunk: its contacts sit in a spool file until merged.
struct ChunkOutput {
    spool: TempPath,
    groups: u64,
    contacts: u64,
}

/// Convert a PAF file into MND contacts written to `output`.
pub fn run_convert(input: &str, output: &str, config: &ConvertConfig) -> io::Result<ConvertStats> {
    if !Path::new(input).exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Input file does not exist: {}", input),
        ));
    }
    config.validate()?;

    info!(
        "Converting {} -> {} (min identity {}, chunk size {}, {} workers)",
        input, output, config.min_identity, config.chunk_size, config.num_workers
    );

    // Byte progress is only meaningful for uncompressed input
    let input_size = if [".gz", ".bgz"].iter().any(|e| input.ends_with(e)) {
        None
    } else {
        std::fs::metadata(input).ok().map(|m| m.len())
    };

    let reader = open_paf_reader(input, config.num_workers)?;
    convert(reader, Path::new(output), config, input_size)
}

/// Stream `reader` through the partitioner and worker pool, then merge the
/// per-chunk spools into `output` in submission order.
///
/// Any failed chunk fails the whole run; `output` is only created once every
/// chunk has succeeded.
pub fn convert<R: BufRead>(
    reader: R,
    output: &Path,
    config: &ConvertConfig,
    input_size: Option<u64>,
) -> io::Result<ConvertStats> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.num_workers.get())
        .thread_name(|i| format!("paf2mnd-worker-{}", i))
        .build()
        .map_err(|e| io::Error::other(format!("Failed to build thread pool: {}", e)))?;

    let mut partitioner = ReadGroupPartitioner::new(reader, config.chunk_size);
    let (slot_tx, slot_rx) = bounded::<()>(config.max_in_flight());
    let (done_tx, done_rx) = unbounded::<(usize, io::Result<ChunkOutput>)>();
    let min_identity = config.min_identity;
    let temp_dir = config.temp_dir.as_deref();

    let dispatch: io::Result<()> = pool.in_place_scope(|scope| {
        while let Some(chunk) = partitioner.next() {
            let chunk = chunk?;
            let index = chunk.index;

            // Blocks while max_in_flight chunks are queued or running
            slot_tx
                .send(())
                .map_err(|_| io::Error::other("Worker slot queue closed"))?;

            let slot_rx = slot_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move |_| {
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| process_chunk(chunk, min_identity, temp_dir)))
                        .unwrap_or_else(|payload| {
                            Err(io::Error::other(format!(
                                "worker panicked: {}",
                                panic_message(&*payload)
                            )))
                        });
                let _ = done_tx.send((index, result));
                let _ = slot_rx.recv();
            });

            if (index + 1) % PROGRESS_EVERY_CHUNKS == 0 {
                log_progress(&partitioner.stats(), input_size);
            }
        }
        Ok(())
    });
    drop(done_tx);

    // The scope has joined every spawned chunk, so all results are queued
    let finished: BTreeMap<usize, io::Result<ChunkOutput>> = done_rx.iter().collect();
    dispatch?;

    let input_stats = partitioner.stats();
    info!(
        "Read {} lines ({} malformed) into {} chunks",
        input_stats.input_lines, input_stats.malformed_lines, input_stats.chunks
    );
    if finished.len() != input_stats.chunks {
        return Err(io::Error::other(format!(
            "Expected {} chunk results, got {}",
            input_stats.chunks,
            finished.len()
        )));
    }

    let mut outputs = Vec::with_capacity(finished.len());
    for (index, result) in finished {
        let chunk_output = result
            .map_err(|e| io::Error::new(e.kind(), format!("Chunk {} failed: {}", index, e)))?;
        outputs.push(chunk_output);
    }

    let (groups, contacts) = merge_spools(outputs, output)?;
    Ok(ConvertStats {
        input: input_stats,
        groups,
        contacts,
    })
}

fn log_progress(stats: &PartitionStats, input_size: Option<u64>) {
    match input_size {
        Some(total) if total > 0 => info!(
            "Dispatched {} chunks, {} lines read ({:.1}%)",
            stats.chunks,
            stats.input_lines,
            stats.bytes_read as f64 * 100.0 / total as f64
        ),
        _ => info!(
            "Dispatched {} chunks, {} lines read",
            stats.chunks, stats.input_lines
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Split a chunk into per-read groups, in order of first appearance.
///
/// The partitioner already cuts at read boundaries; this also joins runs of
/// one read that are not adjacent within the chunk.
pub fn regroup_by_read(records: Vec<AlignmentRecord>) -> Vec<Vec<AlignmentRecord>> {
    let mut groups: Vec<Vec<AlignmentRecord>> = Vec::new();
    let mut group_of: FxHashMap<String, usize> = FxHashMap::default();
    let mut last_group = None;

    for record in records {
        let slot = match group_of.get(record.base_read_id()).copied() {
            Some(slot) => {
                if last_group != Some(slot) {
                    debug!(
                        "Read {} is not contiguous in the input; merging its alignments",
                        record.base_read_id()
                    );
                }
                slot
            }
            None => {
                group_of.insert(record.base_read_id().to_string(), groups.len());
                groups.push(Vec::new());
                groups.len() - 1
            }
        };
        groups[slot].push(record);
        last_group = Some(slot);
    }

    groups
}

fn create_spool(temp_dir: Option<&Path>) -> io::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("paf2mnd-chunk-").suffix(".mnd");
    match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

/// Run every read group of a chunk and spool the contacts to a temp file.
fn process_chunk(chunk: Chunk, min_identity: f64, temp_dir: Option<&Path>) -> io::Result<ChunkOutput> {
    let index = chunk.index;
    let groups = regroup_by_read(chunk.records);

    let mut writer = BufWriter::new(create_spool(temp_dir)?);
    let mut contacts = 0u64;
    for group in &groups {
        for contact in group_contacts(group, min_identity) {
            writeln!(writer, "{}", contact)?;
            contacts += 1;
        }
    }
    let spool = writer.into_inner().map_err(|e| e.into_error())?;

    debug!(
        "Chunk {}: {} groups, {} contacts",
        index,
        groups.len(),
        contacts
    );

    Ok(ChunkOutput {
        // Close the handle now; the path is removed when dropped or merged
        spool: spool.into_temp_path(),
        groups: groups.len() as u64,
        contacts,
    })
}

/// Concatenate spools into `output` in order, deleting each once copied.
fn merge_spools(outputs: Vec<ChunkOutput>, output: &Path) -> io::Result<(u64, u64)> {
    info!("Merging {} chunk files into {}", outputs.len(), output.display());

    let file = File::create(output).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to create output file '{}': {}", output.display(), e),
        )
    })?;
    let mut writer = BufWriter::new(file);

    let mut groups = 0;
    let mut contacts = 0;
    for chunk_output in outputs {
        io::copy(&mut File::open(&chunk_output.spool)?, &mut writer)?;
        chunk_output.spool.close()?;

        groups += chunk_output.groups;
        contacts += chunk_output.contacts;
    }
    writer.flush()?;

    Ok((groups, contacts))
}
