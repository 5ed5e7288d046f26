use clap::Parser;
use log::{debug, error, info};
use paf2mnd::commands::convert::{
    resolve_worker_count, run_convert, ConvertConfig, ConvertStats, DEFAULT_CHUNK_SIZE,
    DEFAULT_MIN_IDENTITY,
};
use std::io;
use std::path::PathBuf;
use std::time::Instant;

/// Convert split-read PAF alignments into MND contacts for Hi-C style scaffolding.
///
/// Input must keep all fragments of a read (`read:start-end`) on adjacent lines.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input PAF file (.gz/.bgz must be BGZF-compressed)
    input: String,

    /// Output MND file
    output: String,

    /// Minimum identity (matches / alignment block length), strictly exceeded
    #[clap(short = 'm', long, value_parser, default_value_t = DEFAULT_MIN_IDENTITY)]
    min_identity: f64,

    /// Minimum number of lines per processing chunk
    #[clap(short = 'c', long, value_parser, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Number of worker threads (0 = half of the logical CPUs)
    #[clap(short = 'w', long, value_parser, default_value_t = 0)]
    max_workers: usize,

    /// Directory for intermediate chunk files (defaults to the system temp dir)
    #[clap(long, value_parser)]
    temp_dir: Option<PathBuf>,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "1")]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    raise_open_file_limit();

    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> io::Result<()> {
    let start_time = Instant::now();

    let config = ConvertConfig {
        min_identity: args.min_identity,
        chunk_size: args.chunk_size,
        num_workers: resolve_worker_count(args.max_workers),
        temp_dir: args.temp_dir.clone(),
    };
    let stats = run_convert(&args.input, &args.output, &config)?;

    report(&stats, start_time.elapsed().as_secs_f64(), &args.output);
    Ok(())
}

fn report(stats: &ConvertStats, elapsed_secs: f64, output: &str) {
    info!("Done in {:.2} s", elapsed_secs);
    info!("Input lines: {}", stats.input.input_lines);
    info!("Malformed lines skipped: {}", stats.input.malformed_lines);
    info!(
        "Alignments: {} in {} reads, {} chunks",
        stats.input.records, stats.groups, stats.input.chunks
    );
    info!("MND records written: {} ({})", stats.contacts, output);
    if let Some(peak_mb) = peak_memory_mb() {
        info!("Peak memory: {:.1} MB", peak_mb);
    }
}

/// Best effort: lift the soft open-file limit towards 65536 (capped by the hard limit).
#[cfg(unix)]
fn raise_open_file_limit() {
    const WANTED: libc::rlim_t = 65536;

    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit/setrlimit only touch the struct we pass
    unsafe {
        if libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) != 0 {
            debug!("Could not read open file limit: {}", io::Error::last_os_error());
            return;
        }
        if limit.rlim_cur >= WANTED {
            return;
        }
        limit.rlim_cur = WANTED.min(limit.rlim_max);
        if libc::setrlimit(libc::RLIMIT_NOFILE, &limit) == 0 {
            debug!("Raised open file limit to {}", limit.rlim_cur);
        } else {
            debug!("Could not raise open file limit: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(not(unix))]
fn raise_open_file_limit() {}

/// Peak resident set size of this process
#[cfg(unix)]
fn peak_memory_mb() -> Option<f64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    // SAFETY: getrusage fills the struct on success, and it is only read then
    let max_rss = unsafe {
        if libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) != 0 {
            return None;
        }
        usage.assume_init().ru_maxrss as f64
    };
    // Linux reports KiB, macOS bytes
    if cfg!(target_os = "macos") {
        Some(max_rss / 1024.0 / 1024.0)
    } else {
        Some(max_rss / 1024.0)
    }
}

#[cfg(not(unix))]
fn peak_memory_mb() -> Option<f64> {
    None
}
