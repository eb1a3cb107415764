//! Process-wide limit on concurrently running script executions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::config::AdmissionConfig;

#[derive(Default)]
struct Counters {
    running: AtomicUsize,
    peak: AtomicUsize,
}

/// Bounds how many renders run at once. Clones share the same limit.
#[derive(Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
    max: usize,
}

/// Held for the duration of one execution. Dropping it admits the next waiter.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl AdmissionController {
    /// Allow at most `max` concurrent executions (0 = CPU count).
    pub fn new(max: usize) -> Self {
        let max = if max == 0 {
            AdmissionConfig::default().resolved_max()
        } else {
            max
        };
        tracing::debug!("Admission controller allows {max} concurrent renders");
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            counters: Arc::default(),
            max,
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(config.resolved_max())
    }

    /// Wait until fewer than `max` executions are running, then claim a slot.
    ///
    /// Fails only after [`close`](Self::close); there is no way to run
    /// without a slot.
    pub async fn acquire(&self) -> Result<AdmissionPermit, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        let running = self.counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(running, Ordering::SeqCst);
        Ok(AdmissionPermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Stop admitting. Waiting and future `acquire` calls fail; permits
    /// already held stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Executions currently holding a permit.
    pub fn running(&self) -> usize {
        self.counters.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous permits seen so far.
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.counters.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("max", &self.max)
            .field("running", &self.running())
            .finish()
    }
}
