//! Execution contexts for event processors
//!
//! The Disruptor only needs "run this unit of work somewhere, once". Which
//! thread runs it, and whether it runs at all, is up to the executor.

use crate::disruptor::thread_management::{validate_core_id, ManagedThread, ThreadBuilder};
use crate::disruptor::{DisruptorError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// A processor run loop handed to an executor
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a processor loop
pub trait Executor: Send + Sync {
    /// Schedule `task` to run once
    ///
    /// # Errors
    /// Whatever prevented the task from being scheduled
    fn execute(&self, task: Task) -> Result<()>;
}

const DEFAULT_THREAD_NAME_PREFIX: &str = "ringway-processor";

/// Runs every task on its own named OS thread
///
/// When CPU cores are configured, threads are pinned to them round-robin in
/// the order tasks arrive.
pub struct ThreadedExecutor {
    name_prefix: String,
    cpu_affinity: Vec<usize>,
    spawned: AtomicUsize,
    threads: Mutex<Vec<ManagedThread>>,
}

impl ThreadedExecutor {
    pub fn new() -> Self {
        Self::with_name_prefix(DEFAULT_THREAD_NAME_PREFIX)
    }

    pub fn with_name_prefix<S: Into<String>>(name_prefix: S) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            cpu_affinity: Vec::new(),
            spawned: AtomicUsize::new(0),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Pin spawned threads to these cores, round-robin
    ///
    /// # Errors
    /// `DisruptorError::Config` if any core does not exist
    pub fn with_cpu_affinity(mut self, cores: Vec<usize>) -> Result<Self> {
        for &core in &cores {
            validate_core_id(core)?;
        }
        self.cpu_affinity = cores;
        Ok(self)
    }

    /// Number of threads spawned so far
    pub fn thread_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Wait for every spawned thread to finish
    ///
    /// Processors only finish once halted, so call this after halting.
    ///
    /// # Errors
    /// The first thread panic encountered; all threads are still joined
    pub fn join_all(&self) -> Result<()> {
        let threads: Vec<ManagedThread> = self.threads.lock().drain(..).collect();
        let mut outcome = Ok(());
        for thread in threads {
            if let Err(error) = thread.join() {
                if outcome.is_ok() {
                    outcome = Err(error);
                }
            }
        }
        outcome
    }
}

impl Default for ThreadedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadedExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        let index = self.spawned.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-{index}", self.name_prefix);

        let mut builder = ThreadBuilder::new().thread_name(name.clone());
        if !self.cpu_affinity.is_empty() {
            builder = builder.pin_at_core(self.cpu_affinity[index % self.cpu_affinity.len()])?;
        }

        let thread = builder.spawn(task)?;
        debug!(thread = %name, "spawned processor thread");
        self.threads.lock().push(thread);
        Ok(())
    }
}

impl std::fmt::Debug for ThreadedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedExecutor")
            .field("name_prefix", &self.name_prefix)
            .field("cpu_affinity", &self.cpu_affinity)
            .field("spawned", &self.thread_count())
            .finish()
    }
}

/// Runs tasks on a tokio runtime's blocking pool
///
/// Processor loops block, so they never go onto the async worker threads.
#[derive(Debug)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Use the runtime the caller is running inside
    ///
    /// # Errors
    /// `DisruptorError::Config` when called outside a tokio runtime
    pub fn current() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|error| DisruptorError::Config(error.to_string()))
    }

    /// Await every scheduled task
    pub async fn join_all(&self) -> Result<()> {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.await
                .map_err(|error| DisruptorError::Handler(anyhow::Error::new(error)))?;
        }
        Ok(())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        let join_handle = self.handle.spawn_blocking(task);
        self.tasks.lock().push(join_handle);
        Ok(())
    }
}
