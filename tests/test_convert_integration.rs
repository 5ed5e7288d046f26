//! Integration tests for the paf2mnd binary: PAF in, MND out, exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn get_paf2mnd_binary() -> PathBuf {
    // CARGO_BIN_EXE_paf2mnd is set by cargo test for the binary crate
    PathBuf::from(env!("CARGO_BIN_EXE_paf2mnd"))
}

fn run_paf2mnd(work_dir: &Path, args: &[&str]) -> std::io::Result<Output> {
    Command::new(get_paf2mnd_binary())
        .current_dir(work_dir)
        .args(args)
        .output()
}

fn paf_line(query: &str, strand: char, chrom: &str, start: u64, end: u64, matches: u64) -> String {
    format!(
        "{}\t10000\t0\t100\t{}\t{}\t1000000\t{}\t{}\t{}\t100\t60\n",
        query, strand, chrom, start, end, matches
    )
}

fn write_input(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join("reads.paf");
    fs::write(&path, lines.concat()).unwrap();
    path
}

fn sorted_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    lines.sort();
    lines
}

#[test]
fn test_basic_conversion() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();

    write_input(
        work_dir,
        &[
            paf_line("r1:1-100", '+', "chr1", 100, 200, 95),
            paf_line("r1:101-200", '-', "chr2", 1000, 1101, 90),
            paf_line("r1:201-300", '+', "chr1", 5000, 5100, 99),
            paf_line("r2:1-100", '+', "chr3", 10, 20, 95),
        ],
    );

    let output = run_paf2mnd(work_dir, &["reads.paf", "contacts.mnd", "-w", "2"])?;
    assert!(
        output.status.success(),
        "paf2mnd failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let mnd = fs::read_to_string(work_dir.join("contacts.mnd"))?;
    assert_eq!(
        mnd,
        "0\tchr1\t150\t0\t16\tchr2\t1050\t1\t60\t-\t-\t60\t-\t-\tr1\tr1\n\
         0\tchr1\t150\t0\t0\tchr1\t5050\t1\t60\t-\t-\t60\t-\t-\tr1\tr1\n\
         16\tchr2\t1050\t0\t0\tchr1\t5050\t1\t60\t-\t-\t60\t-\t-\tr1\tr1\n"
    );
    Ok(())
}

#[test]
fn test_duplicate_fragment_yields_empty_output() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();

    write_input(
        work_dir,
        &[
            paf_line("readA:1-50", '+', "chr1", 100, 150, 48),
            paf_line("readA:60-120", '+', "chr1", 300, 360, 58),
            paf_line("readA:60-120", '+', "chr1", 300, 360, 58),
            paf_line("readB:1-80", '-', "chr2", 500, 580, 78),
        ],
    );

    let output = run_paf2mnd(work_dir, &["reads.paf", "contacts.mnd"])?;
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(work_dir.join("contacts.mnd"))?, "");
    Ok(())
}

#[test]
fn test_identity_threshold_option() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();

    write_input(
        work_dir,
        &[
            paf_line("r1:1-100", '+', "chr1", 0, 100, 80),
            paf_line("r1:101-200", '+', "chr1", 200, 300, 90),
        ],
    );

    let output = run_paf2mnd(work_dir, &["reads.paf", "loose.mnd", "-m", "0.75"])?;
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(work_dir.join("loose.mnd"))?.lines().count(), 1);

    let output = run_paf2mnd(work_dir, &["reads.paf", "strict.mnd", "-m", "0.85"])?;
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(work_dir.join("strict.mnd"))?, "");
    Ok(())
}

#[test]
fn test_chunk_size_does_not_change_contacts() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();

    let mut lines = Vec::new();
    for read in 0..200u64 {
        for frag in 0..(read % 4 + 1) {
            let start = read * 500 + frag * 100;
            lines.push(paf_line(
                &format!("read{}:{}-{}", read, frag * 100 + 1, frag * 100 + 100),
                if frag % 2 == 0 { '+' } else { '-' },
                &format!("chr{}", (read + frag) % 5),
                start,
                start + 100,
                70 + (read + frag) % 30,
            ));
        }
    }
    write_input(work_dir, &lines);

    let output = run_paf2mnd(work_dir, &["reads.paf", "small.mnd", "-c", "1", "-w", "4"])?;
    assert!(output.status.success());
    let output = run_paf2mnd(work_dir, &["reads.paf", "whole.mnd", "-c", "100000000", "-w", "1"])?;
    assert!(output.status.success());

    let small = fs::read_to_string(work_dir.join("small.mnd"))?;
    let whole = fs::read_to_string(work_dir.join("whole.mnd"))?;
    assert!(!whole.is_empty());
    assert_eq!(sorted_lines(&small), sorted_lines(&whole));
    Ok(())
}

#[test]
fn test_small_chunk_size_only_warns() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();
    write_input(work_dir, &[paf_line("r1:1-100", '+', "chr1", 0, 100, 95)]);

    let output = run_paf2mnd(work_dir, &["reads.paf", "out.mnd", "-c", "10"])?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Chunk size"));
    Ok(())
}

#[test]
fn test_invalid_identity_fails() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();
    write_input(work_dir, &[paf_line("r1:1-100", '+', "chr1", 0, 100, 95)]);

    let output = run_paf2mnd(work_dir, &["reads.paf", "out.mnd", "-m", "1.5"])?;
    assert!(!output.status.success());
    assert!(!work_dir.join("out.mnd").exists());
    Ok(())
}

#[test]
fn test_missing_input_fails() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_paf2mnd(temp_dir.path(), &["absent.paf", "out.mnd"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.paf"));
    Ok(())
}

#[test]
fn test_spool_files_go_to_temp_dir_and_are_removed() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path();
    let spool_dir = work_dir.join("spool");
    fs::create_dir(&spool_dir)?;

    let lines: Vec<String> = (0..50)
        .flat_map(|read| {
            [
                paf_line(&format!("r{}:1-100", read), '+', "chr1", 0, 100, 95),
                paf_line(&format!("r{}:101-200", read), '+', "chr2", 0, 100, 95),
            ]
        })
        .collect();
    write_input(work_dir, &lines);

    let output = run_paf2mnd(
        work_dir,
        &["reads.paf", "out.mnd", "-c", "3", "--temp-dir", "spool"],
    )?;
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(work_dir.join("out.mnd"))?.lines().count(), 50);
    assert_eq!(fs::read_dir(&spool_dir)?.count(), 0);
    Ok(())
}
