//! On-disk record databases.
//!
//! Every interesting file has one sorted, newline-terminated database under
//! the output directory. Translation units that share a header merge into
//! the same database, possibly from concurrent processes, so each merge runs
//! under an exclusive lock and replaces the database by atomic rename.

mod lock;
mod merge;

pub use lock::{lock_path, FileLock};
pub use merge::{merge_sorted, MergeStats};

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;
use xref_core::{IndexerConfig, RunMetrics};

use crate::indexer::IndexOutput;
use crate::IndexerError;

/// Temp file next to `path`, unique across processes and threads.
fn temp_path(path: &Path) -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(
        ".{}.{pid}.{nanos}.{seq}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
    ))
}

/// Merge `lines` into the database at `target`.
///
/// The previous database stays in place until the merged one is complete
/// and synced; a failure anywhere leaves it untouched.
pub fn merge_into(target: &Path, lines: &[String]) -> Result<MergeStats, IndexerError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut sorted: Vec<&str> = lines
        .iter()
        .map(|line| line.strip_suffix('\n').unwrap_or(line))
        .collect();
    sorted.sort_unstable();

    let _lock = FileLock::acquire(target)?;

    let old = match File::open(target) {
        Ok(file) => Some(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let temp = temp_path(target);
    let result = write_merged(&temp, old, &sorted).and_then(|stats| {
        fs::rename(&temp, target)?;
        Ok(stats)
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    let stats = result?;

    debug!(
        path = ?target,
        written = stats.written,
        deduplicated = stats.deduplicated,
        "Merged records"
    );
    Ok(stats)
}

fn write_merged(
    temp: &Path,
    old: Option<BufReader<File>>,
    sorted: &[&str],
) -> io::Result<MergeStats> {
    let mut out = BufWriter::new(File::create(temp)?);
    let stats = match old {
        Some(reader) => merge_sorted(reader, sorted, &mut out)?,
        None => merge_sorted(io::empty(), sorted, &mut out)?,
    };
    out.flush()?;
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(stats)
}

/// Database path of a file's relative name.
pub fn database_path(config: &IndexerConfig, relative: &str) -> PathBuf {
    config.out_dir.join(relative)
}

/// Merge every file of an indexed unit into its database. Returns the number
/// of databases touched.
pub fn write_output(
    config: &IndexerConfig,
    output: &IndexOutput,
    metrics: &RunMetrics,
) -> Result<usize, IndexerError> {
    for file in &output.files {
        let start = Instant::now();
        let stats = merge_into(&database_path(config, &file.path), &file.lines)?;
        metrics.record_merge(stats.written, stats.deduplicated, start.elapsed());
    }
    Ok(output.files.len())
}
