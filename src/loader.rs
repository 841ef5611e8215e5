//! Load coordination and worker threads
//!
//! The [`Loader`] seeds the work queue with the command-line roots, spawns
//! a fixed pool of worker threads, joins them, and aggregates their
//! errors. Each worker pulls entries from the shared queue: directories
//! expand one level back into the queue, files are parsed, converted, and
//! submitted to the sink through the bounded in-flight buffer.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::convert;
use crate::document::Document;
use crate::markup;
use crate::queue::{in_flight_capacity, PendingWrites, WorkQueue};
use crate::sink::DocumentSink;

/// How the contents of each input file map to XML documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Each file is one XML document.
    Files,
    /// Each line of each file is one XML document.
    Lines,
}

pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub mode: InputMode,
    /// Files and directories seeded into the work queue.
    pub roots: Vec<PathBuf>,
    /// Worker count override; defaults to the sink's concurrency hint.
    pub threads: Option<usize>,
    /// How long a single write may stay unacknowledged before it is
    /// treated as failed.
    pub ack_timeout: Duration,
}

impl LoaderConfig {
    pub fn new(mode: InputMode, roots: Vec<PathBuf>) -> Self {
        Self {
            mode,
            roots,
            threads: None,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Runs the full load, printing every worker error and a usage hint on
    /// failure. Returns true only if no worker recorded an error.
    pub fn run(&self, sink: Arc<dyn DocumentSink>) -> bool {
        let errors = self.execute(sink);
        for error in &errors {
            eprintln!("xmload: {error:#}");
        }
        if errors.is_empty() {
            true
        } else {
            eprintln!("{}", crate::cli::USAGE_HINT);
            false
        }
    }

    /// Runs the full load and returns the collected worker errors; empty
    /// means success.
    pub fn execute(&self, sink: Arc<dyn DocumentSink>) -> Vec<anyhow::Error> {
        let queue = Arc::new(WorkQueue::new());
        for root in &self.config.roots {
            queue.put(root.clone());
        }

        let workers = self
            .config
            .threads
            .unwrap_or_else(|| sink.concurrency_hint())
            .max(1);
        let pending = Arc::new(PendingWrites::with_capacity(in_flight_capacity(workers)));

        let mut joins = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker {
                mode: self.config.mode,
                ack_timeout: self.config.ack_timeout,
                queue: Arc::clone(&queue),
                pending: Arc::clone(&pending),
                sink: Arc::clone(&sink),
            };
            let join = thread::Builder::new()
                .name(format!("load-{id}"))
                .spawn(move || worker.run());
            joins.push(join);
        }

        // Errors stay thread-local until the join: each worker carries its
        // first failure out through its JoinHandle.
        let mut errors = Vec::new();
        for join in joins {
            match join {
                Ok(handle) => match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => errors.push(error),
                    Err(_) => errors.push(anyhow!("load thread panicked")),
                },
                Err(error) => {
                    errors.push(anyhow::Error::new(error).context("failed to spawn load thread"))
                }
            }
        }

        // Workers that stopped on an error leave their outstanding writes
        // behind; resolve whatever is left so nothing goes unreported.
        while let Some(handle) = pending.poll() {
            if let Err(error) = handle.resolve(self.config.ack_timeout) {
                errors.push(error);
            }
        }

        errors
    }
}

struct Worker {
    mode: InputMode,
    ack_timeout: Duration,
    queue: Arc<WorkQueue<PathBuf>>,
    pending: Arc<PendingWrites>,
    sink: Arc<dyn DocumentSink>,
}

impl Worker {
    fn run(self) -> Result<()> {
        while let Some(path) = self.queue.take() {
            let outcome = self.process_entry(&path);
            self.queue.complete();
            // First unrecovered failure stops this worker; siblings keep
            // draining the queue.
            outcome?;
        }
        self.drain()
    }

    fn process_entry(&self, path: &Path) -> Result<()> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => {
                eprintln!("xmload: cannot read '{}', skipping", path.display());
                return Ok(());
            }
        };

        if meta.is_dir() {
            self.expand_directory(path)?;
        } else if meta.is_file() {
            match self.mode {
                InputMode::Files => self.load_file(path)?,
                InputMode::Lines => self.load_lines(path)?,
            }
        } else {
            eprintln!("xmload: cannot read '{}', skipping", path.display());
        }
        Ok(())
    }

    /// Enqueues the directory's immediate children instead of descending,
    /// so the fan-out spreads across all workers.
    fn expand_directory(&self, path: &Path) -> Result<()> {
        let entries = fs::read_dir(path)
            .with_context(|| format!("failed to list directory '{}'", path.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to list directory '{}'", path.display()))?;
            self.queue.put(entry.path());
        }
        Ok(())
    }

    fn load_file(&self, path: &Path) -> Result<()> {
        let root = markup::parse_file(path)?;
        self.submit(convert::convert(&root))
    }

    fn load_lines(&self, path: &Path) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("failed to read '{}'", path.display()))?;
        let reader = BufReader::new(file);

        for (idx, line) in reader.lines().enumerate() {
            let line =
                line.with_context(|| format!("failed to read '{}'", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let root = markup::parse_str(&line).with_context(|| {
                format!("invalid XML on line {} of '{}'", idx + 1, path.display())
            })?;
            self.submit(convert::convert(&root))?;
        }
        Ok(())
    }

    /// Submission order is per-worker sequential: the next file is not
    /// submitted until this one has been admitted to the buffer.
    fn submit(&self, document: Document) -> Result<()> {
        let handle = self.sink.write_async(document);
        self.pending.admit(handle, self.ack_timeout)
    }

    /// After the queue is exhausted, resolve whatever is still in flight.
    /// Handles are shared, not owned per worker, so this worker may drain
    /// writes submitted by a sibling.
    fn drain(&self) -> Result<()> {
        while let Some(handle) = self.pending.poll() {
            handle.resolve(self.ack_timeout)?;
        }
        Ok(())
    }
}
