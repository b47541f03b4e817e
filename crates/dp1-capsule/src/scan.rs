//! Directory hashing with a bounded worker pool.
//!
//! The walk collects every regular file up front, then a fixed number of
//! worker threads pull jobs from a shared queue and push results into a
//! collector channel. The caller blocks until the queue drains. Output is
//! sorted by relative path, so it never depends on which worker finished
//! first.

use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use dp1_core::hash::sha256_file;

use crate::error::{CapsuleError, Result};

/// Upper bound on hashing threads, independent of CPU count, to keep open
/// file handles bounded.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// The hash of one file in a scanned directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashResult {
    /// Path relative to the scanned root, `/` separated.
    pub path: String,
    /// Lowercase hex; absent when hashing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How file jobs are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Executor {
    /// Worker threads fed by a job queue.
    #[default]
    Pool,
    /// Hash every file on the calling thread.
    Sequential,
}

/// Scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub executor: Executor,
    /// Cap on worker threads (default: 8). The pool never exceeds the CPU
    /// count or the number of files either.
    pub max_workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            executor: Executor::Pool,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl ScanConfig {
    pub fn sequential() -> Self {
        Self {
            executor: Executor::Sequential,
            ..Self::default()
        }
    }

    /// Number of workers to use for `file_count` files.
    pub fn worker_count(&self, file_count: usize) -> usize {
        num_cpus::get()
            .min(self.max_workers)
            .min(file_count)
            .max(1)
    }
}

/// A file queued for hashing.
struct FileJob {
    path: PathBuf,
    rel_path: String,
    size: u64,
    /// Set when the walk itself failed at this entry.
    walk_error: Option<String>,
}

/// Hash every regular file under `root` with the default configuration.
pub fn sha256_dir(root: impl AsRef<Path>) -> Result<Vec<HashResult>> {
    sha256_dir_with(root, &ScanConfig::default())
}

/// Hash every regular file under `root`.
///
/// Symlinks are not followed. Failures on individual entries are recorded
/// on their [`HashResult`] and do not stop the scan.
pub fn sha256_dir_with(root: impl AsRef<Path>, config: &ScanConfig) -> Result<Vec<HashResult>> {
    let root = root.as_ref();
    let meta = std::fs::metadata(root).map_err(|source| CapsuleError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(CapsuleError::NotADirectory(root.to_path_buf()));
    }

    let jobs = collect_jobs(root)?;
    debug!(root = %root.display(), files = jobs.len(), executor = ?config.executor, "hashing directory");

    let mut results = match config.executor {
        Executor::Sequential => jobs.into_iter().map(hash_job).collect(),
        Executor::Pool => {
            let workers = config.worker_count(jobs.len());
            run_pool(jobs, workers)
        }
    };

    results.sort_by(|a: &HashResult, b: &HashResult| a.path.cmp(&b.path));
    Ok(results)
}

fn collect_jobs(root: &Path) -> Result<Vec<FileJob>> {
    let mut jobs = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let (size, walk_error) = match entry.metadata() {
                    Ok(meta) => (meta.len(), None),
                    Err(e) => (0, Some(e.to_string())),
                };
                jobs.push(FileJob {
                    rel_path: relative_path(root, entry.path()),
                    path: entry.into_path(),
                    size,
                    walk_error,
                });
            }
            // The root itself is unreadable: nothing can be scanned.
            Err(e) if e.depth() == 0 => return Err(CapsuleError::Walk(e)),
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                warn!(path = %path.display(), error = %e, "failed to access entry during walk");
                jobs.push(FileJob {
                    rel_path: relative_path(root, &path),
                    path,
                    size: 0,
                    walk_error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(jobs)
}

/// Relative path with `/` separators regardless of platform.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn run_pool(jobs: Vec<FileJob>, workers: usize) -> Vec<HashResult> {
    if jobs.is_empty() {
        return Vec::new();
    }

    let (job_tx, job_rx): (Sender<FileJob>, Receiver<FileJob>) = unbounded();
    let (result_tx, result_rx) = unbounded::<HashResult>();

    for job in jobs {
        // The receiver is alive in this scope, so sending cannot fail.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for job in job_rx.iter() {
                    if result_tx.send(hash_job(job)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        result_rx.iter().collect()
    })
}

fn hash_job(job: FileJob) -> HashResult {
    let mut result = HashResult {
        path: job.rel_path,
        sha256: None,
        size: job.size,
        error: None,
    };

    if let Some(error) = job.walk_error {
        result.error = Some(error);
        return result;
    }

    match sha256_file(&job.path) {
        Ok(hash) => result.sha256 = Some(hash),
        Err(e) => {
            warn!(path = %result.path, error = %e, "failed to hash file");
            result.error = Some(e.to_string());
        }
    }
    result
}
