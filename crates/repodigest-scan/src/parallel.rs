//! Parallel per-file processing on a rayon worker pool.
//!
//! Discovery stays serial so the file set and its order are exactly what
//! [`Scanner`] produces. Only the per-file work fans out. Results arrive in
//! completion order; [`ParallelOutput::into_canonical`] restores tree order.

use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use rayon::prelude::*;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use repodigest_core::{FileEntry, IngestConfig, IngestError, SourceTree};

use crate::progress::ScanProgress;
use crate::scanner::Scanner;

/// Lower bound on the worker count when sizing from the CPU count.
pub const MIN_WORKERS: usize = 2;

/// A file whose processing failed. Failures never abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Position of the file in tree order.
    pub index: usize,
    /// Path relative to the source.
    pub path: PathBuf,
    /// Human-readable cause.
    pub cause: String,
}

/// Result of processing one file.
#[derive(Debug, Clone)]
pub struct Completed<T> {
    /// Position of the file in tree order.
    pub index: usize,
    /// Path relative to the source.
    pub path: PathBuf,
    /// Value produced by the per-file function.
    pub value: T,
}

/// Everything a parallel run produced.
#[derive(Debug)]
pub struct ParallelOutput<T> {
    /// Tree discovered by the serial scan.
    pub tree: SourceTree,
    /// Successful results, in completion order until canonicalized.
    pub completed: Vec<Completed<T>>,
    /// Per-file failures.
    pub failures: Vec<FileFailure>,
}

impl<T> ParallelOutput<T> {
    /// Reorder results into tree order.
    pub fn into_canonical(mut self) -> Self {
        self.completed.sort_by_key(|c| c.index);
        self.failures.sort_by_key(|f| f.index);
        self
    }

    /// Values in their current order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.completed.iter().map(|c| &c.value)
    }
}

enum Outcome<T> {
    Done(Completed<T>),
    Failed(FileFailure),
}

/// Serial discovery followed by parallel per-file processing.
pub struct ParallelScanner {
    scanner: Scanner,
    threads: usize,
}

impl ParallelScanner {
    /// Create a scanner with `threads` workers; `0` sizes from the CPU count.
    pub fn new(threads: usize) -> Self {
        Self {
            scanner: Scanner::new(),
            threads,
        }
    }

    /// Subscribe to discovery progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.scanner.subscribe()
    }

    /// Number of workers a run will use.
    pub fn worker_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(MIN_WORKERS)
            .max(MIN_WORKERS)
    }

    /// Scan `config` and apply `f` to every discovered file.
    pub fn run<T, E, F>(
        &self,
        config: &IngestConfig,
        f: F,
    ) -> Result<ParallelOutput<T>, IngestError>
    where
        T: Send,
        E: Display,
        F: Fn(&FileEntry) -> Result<T, E> + Sync,
    {
        let tree = self.scanner.scan(config)?;
        let files = tree.files();
        let (completed, failures) = self.process(&files, f)?;
        Ok(ParallelOutput {
            tree,
            completed,
            failures,
        })
    }

    /// Apply `f` to `files` on the worker pool.
    ///
    /// A panic inside `f` is caught and reported as that file's failure.
    #[allow(clippy::type_complexity)]
    pub fn process<T, E, F>(
        &self,
        files: &[FileEntry],
        f: F,
    ) -> Result<(Vec<Completed<T>>, Vec<FileFailure>), IngestError>
    where
        T: Send,
        E: Display,
        F: Fn(&FileEntry) -> Result<T, E> + Sync,
    {
        let workers = self.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("repodigest-worker-{i}"))
            .build()
            .map_err(|e| IngestError::WorkerPool {
                message: e.to_string(),
            })?;
        debug!("Processing {} file(s) on {workers} worker(s)", files.len());

        let mut completed = Vec::with_capacity(files.len());
        let mut failures = Vec::new();
        let (tx, rx) = mpsc::channel::<Outcome<T>>();
        let pool = &pool;
        let f = &f;

        thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    files.par_iter().for_each_with(tx, |tx, entry| {
                        let _ = tx.send(process_one(f, entry));
                    });
                });
            });

            for outcome in rx {
                match outcome {
                    Outcome::Done(done) => completed.push(done),
                    Outcome::Failed(failure) => {
                        warn!("Failed to process {}: {}", failure.path.display(), failure.cause);
                        failures.push(failure);
                    }
                }
            }
        });

        info!(
            "Processed {} file(s), {} failure(s)",
            completed.len(),
            failures.len()
        );
        Ok((completed, failures))
    }
}

fn process_one<T, E, F>(f: &F, entry: &FileEntry) -> Outcome<T>
where
    E: Display,
    F: Fn(&FileEntry) -> Result<T, E>,
{
    let failure = |cause: String| {
        Outcome::Failed(FileFailure {
            index: entry.index,
            path: entry.relative_path.clone(),
            cause,
        })
    };

    match panic::catch_unwind(AssertUnwindSafe(|| f(entry))) {
        Ok(Ok(value)) => Outcome::Done(Completed {
            index: entry.index,
            path: entry.relative_path.clone(),
            value,
        }),
        Ok(Err(e)) => failure(e.to_string()),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            failure(format!("worker panicked: {message}"))
        }
    }
}
