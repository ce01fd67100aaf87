//! Concurrency stress helpers for KeyBox.
//!
//! These helpers hammer the identity map and key rings from many threads and
//! report what each thread observed.

use crate::fixtures::KeyBoxHarness;
use keybox_codec::Value;
use keybox_core::{Instance, KeyRing};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            duration,
        }
    }

    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_ops as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Operations per thread.
    pub operations: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            operations: 1_000,
        }
    }
}

/// Resolves the ring of one instance from `threads` threads released at the
/// same moment; returns every ring observed.
pub fn concurrent_first_access(
    harness: &Arc<KeyBoxHarness>,
    instance: &Instance,
    threads: usize,
) -> Vec<Arc<KeyRing>> {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let harness = Arc::clone(harness);
            let instance = Arc::clone(instance);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                harness.ring(&instance)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect()
}

/// Calls `instantiate_source` on one instance-less ring from `threads`
/// threads at once; returns every instance observed.
pub fn concurrent_instantiation(ring: &Arc<KeyRing>, threads: usize) -> Vec<Instance> {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let ring = Arc::clone(ring);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ring.instantiate_source().expect("Failed to instantiate source")
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect()
}

/// Each thread creates customers, keys them and resolves their rings again.
///
/// An operation succeeds when the re-resolved ring is the first one and
/// reads back the written code.
pub fn stress_concurrent_rings(harness: Arc<KeyBoxHarness>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let harness = Arc::clone(&harness);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    let code = format!("T{t}-{i}");
                    let customer = harness.create("Customer");
                    let first = harness.ring(&customer);
                    let ok = first.set("Code", code.as_str()).is_ok()
                        && Arc::ptr_eq(&first, &harness.ring(&customer))
                        && first.get("Code").ok() == Some(Value::from(code));
                    if ok {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Each thread adds instances sharing a small key space to the cache; every
/// add must return the instance that was canonical for its key.
pub fn stress_concurrent_cache(harness: Arc<KeyBoxHarness>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let harness = Arc::clone(&harness);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    let code = format!("C{}", i % 16);
                    let customer = harness.create_with("Customer", &[("Code", code.into())]);
                    let ring = harness.ring(&customer);
                    let ok = match harness.cache.add("Customer", &ring, Arc::clone(&customer)) {
                        Ok(canonical) => harness
                            .cache
                            .try_get("Customer", &ring)
                            .ok()
                            .flatten()
                            .is_some_and(|found| Arc::ptr_eq(&found, &canonical)),
                        Err(_) => false,
                    };
                    if ok {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
