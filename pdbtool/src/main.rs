//! Reference driver: converts PDB files into text reports.

#![forbid(unused_must_use)]

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};

mod report;

#[derive(clap::Parser)]
#[command(about = "Converts PDB files into text reports of their types and symbols")]
struct Options {
    /// Convert a single PDB file.
    #[arg(long, conflicts_with = "batch", required_unless_present = "batch")]
    pdb_file: Option<PathBuf>,

    /// The output file (with --pdb-file) or output directory (with --batch).
    #[arg(long)]
    out: PathBuf,

    /// A list file naming PDBs to convert: one path or glob pattern per
    /// line, `#` starts a comment. Conversions run in parallel.
    #[arg(long)]
    batch: Option<PathBuf>,

    /// Keep symbols and types from the C++ standard library (names starting
    /// with `std::`).
    #[arg(long)]
    keep_std: bool,

    /// Reduce logging to warnings and errors.
    #[arg(long)]
    quiet: bool,

    /// Turn on debug output. Noisy!
    #[arg(long)]
    verbose: bool,
}

impl Options {
    fn open_options(&self) -> pdbwalk::OpenOptions {
        pdbwalk::OpenOptions {
            exclude_std_names: !self.keep_std,
        }
    }
}

fn main() -> Result<()> {
    let options = Options::parse();
    configure_tracing(&options);

    if let Some(batch) = &options.batch {
        return batch_convert(&options, batch);
    }

    // conflicts_with/required_unless_present guarantee exactly one mode.
    let pdb_file = options.pdb_file.as_deref().unwrap();
    convert_one(pdb_file, &options.out, &options.open_options())
}

fn configure_tracing(options: &Options) {
    use tracing_subscriber::filter::LevelFilter;

    let level = if options.verbose {
        LevelFilter::DEBUG
    } else if options.quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn convert_one(pdb_file: &Path, out: &Path, options: &pdbwalk::OpenOptions) -> Result<()> {
    let pdb = pdbwalk::Pdb::open_with(pdb_file, options.clone())
        .with_context(|| format!("failed to open {}", pdb_file.display()))?;

    let mut writer = std::io::BufWriter::new(
        std::fs::File::create(out)
            .with_context(|| format!("failed to create {}", out.display()))?,
    );
    report::write_report(&pdb, &mut writer)
        .with_context(|| format!("failed to write {}", out.display()))?;

    info!(
        pdb = %pdb_file.display(),
        out = %out.display(),
        "converted"
    );
    Ok(())
}

fn batch_convert(options: &Options, batch: &Path) -> Result<()> {
    let paths = read_batch_list(batch)?;
    if paths.is_empty() {
        bail!("the batch list {} names no PDB files", batch.display());
    }

    std::fs::create_dir_all(&options.out)
        .with_context(|| format!("failed to create {}", options.out.display()))?;

    let open_options = options.open_options();
    let failures: usize = paths
        .par_iter()
        .map(|pdb_file| {
            let stem = pdb_file
                .file_stem()
                .unwrap_or_else(|| pdb_file.as_os_str());
            let out = options.out.join(stem).with_extension("txt");
            match convert_one(pdb_file, &out, &open_options) {
                Ok(()) => 0usize,
                Err(e) => {
                    error!(pdb = %pdb_file.display(), "conversion failed: {e:#}");
                    1
                }
            }
        })
        .sum();

    if failures > 0 {
        bail!("{failures} of {} conversions failed", paths.len());
    }
    Ok(())
}

/// Reads the batch list: one path or glob pattern per line.
fn read_batch_list(batch: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(batch)
        .with_context(|| format!("failed to read {}", batch.display()))?;

    let mut paths = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.contains(['?', '*']) {
            for entry in glob::glob(line)? {
                let path = entry?;
                if path.is_file() {
                    paths.push(path);
                }
            }
        } else {
            paths.push(PathBuf::from(line));
        }
    }

    Ok(paths)
}
