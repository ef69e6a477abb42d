//! Thread management and CPU affinity
//!
//! Named OS threads for event processors, optionally pinned to a CPU core.
//! Pinning is best effort: a core that cannot be pinned is logged and the
//! thread runs unpinned.

use crate::disruptor::{DisruptorError, Result};
use core_affinity::CoreId;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Handle to a spawned processor thread
///
/// Dropping the handle joins the thread.
pub struct ManagedThread {
    join_handle: Option<JoinHandle<()>>,
    thread_name: String,
}

impl ManagedThread {
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Wait for the thread to finish
    ///
    /// # Errors
    /// `DisruptorError::Handler` if the thread panicked
    pub fn join(mut self) -> Result<()> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                DisruptorError::Handler(anyhow::anyhow!(
                    "thread '{}' panicked",
                    self.thread_name
                ))
            }),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        if let Err(error) = self.join_inner() {
            warn!(%error, "processor thread ended abnormally");
        }
    }
}

impl std::fmt::Debug for ManagedThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedThread")
            .field("thread_name", &self.thread_name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Thread builder with CPU affinity and naming support
#[derive(Debug, Default)]
pub struct ThreadBuilder {
    affinity: Option<CoreId>,
    name: Option<String>,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the thread to a CPU core
    ///
    /// # Errors
    /// `DisruptorError::Config` if the core does not exist on this machine
    pub fn pin_at_core(mut self, core_id: usize) -> Result<Self> {
        validate_core_id(core_id)?;
        self.affinity = Some(CoreId { id: core_id });
        Ok(self)
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawn a thread with the configured settings
    ///
    /// # Arguments
    /// * `f` - The function to run in the thread
    pub fn spawn<F>(self, f: F) -> Result<ManagedThread>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread_name = self.name.unwrap_or_else(|| "processor".to_string());
        let affinity = self.affinity;

        let name_for_thread = thread_name.clone();
        let join_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                set_affinity_if_defined(affinity, &name_for_thread);
                f();
            })?;

        Ok(ManagedThread {
            join_handle: Some(join_handle),
            thread_name,
        })
    }
}

/// Check that a CPU core ID is available on the system
pub fn validate_core_id(core_id: usize) -> Result<()> {
    let available_cores = get_available_cores();
    if available_cores.contains(&core_id) {
        Ok(())
    } else {
        Err(DisruptorError::Config(format!(
            "CPU core {core_id} is not available, available cores: {available_cores:?}"
        )))
    }
}

fn set_affinity_if_defined(affinity: Option<CoreId>, thread_name: &str) {
    if let Some(core_id) = affinity {
        if core_affinity::set_for_current(core_id) {
            debug!(thread = thread_name, core = core_id.id, "pinned thread to CPU core");
        } else {
            warn!(thread = thread_name, core = core_id.id, "could not pin thread to CPU core");
        }
    }
}

/// IDs of the CPU cores this process may run on
pub fn get_available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .iter()
        .map(|core| core.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_thread_builder() {
        let ran = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(2));

        let managed_thread = {
            let ran = Arc::clone(&ran);
            let barrier = Arc::clone(&barrier);
            ThreadBuilder::new()
                .thread_name("test-worker")
                .spawn(move || {
                    barrier.wait();
                    assert_eq!(thread::current().name(), Some("test-worker"));
                    ran.store(true, Ordering::SeqCst);
                })
                .unwrap()
        };

        assert_eq!(managed_thread.thread_name(), "test-worker");
        assert!(managed_thread.is_running());

        barrier.wait();
        managed_thread.join().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panicking_thread_reports_error() {
        let managed_thread = ThreadBuilder::new()
            .spawn(|| panic!("processor blew up"))
            .unwrap();

        let error = managed_thread.join().unwrap_err();
        assert!(error.to_string().contains("panicked"));
    }

    #[test]
    fn test_unknown_core_is_rejected() {
        let result = ThreadBuilder::new().pin_at_core(usize::MAX);
        assert!(matches!(result, Err(DisruptorError::Config(_))));
    }

    #[test]
    #[cfg(not(miri))]
    fn test_cpu_affinity() {
        let available_cores = get_available_cores();
        if let Some(&core_id) = available_cores.first() {
            let managed_thread = ThreadBuilder::new()
                .pin_at_core(core_id)
                .unwrap()
                .thread_name("affinity-test")
                .spawn(|| {})
                .unwrap();
            managed_thread.join().unwrap();
        }
    }
}
