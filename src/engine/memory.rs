//! Memory guard
//!
//! Advisory admission check performed before every job, and an
//! unconditional cleanup performed after every job regardless of outcome.
//! The check is a fail-fast heuristic, not a reservation: generation can
//! still run out of memory mid-flight.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::error::{Result, ResourceKind, TtsError};

/// Default admission floor: 1 GiB available
pub const DEFAULT_MIN_AVAILABLE_BYTES: u64 = 1024 * 1024 * 1024;

/// Point-in-time device-memory snapshot, in bytes.
/// Recomputed on demand, never cached across jobs.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryStatus {
    pub allocated: u64,
    pub reserved: u64,
    pub total: u64,
    pub available: u64,
}

/// Capability for querying and releasing device memory
pub trait MemoryProbe: Send + Sync {
    /// Take a fresh snapshot
    fn status(&self) -> Result<MemoryStatus>;

    /// Release cached/transient buffers. Idempotent; a no-op when nothing
    /// is allocated.
    fn release(&self);
}

/// Admission guard over a [`MemoryProbe`]
#[derive(Clone)]
pub struct MemoryGuard {
    probe: Arc<dyn MemoryProbe>,
    min_available: u64,
}

impl MemoryGuard {
    pub fn new(probe: Arc<dyn MemoryProbe>, min_available: u64) -> Self {
        Self {
            probe,
            min_available,
        }
    }

    /// Fresh memory snapshot
    pub fn status(&self) -> Result<MemoryStatus> {
        self.probe.status()
    }

    /// Decide whether a job may proceed. A failed probe is treated as
    /// permissive: the check is advisory and must not block work on
    /// instrumentation trouble.
    pub fn check_available(&self) -> Result<MemoryStatus> {
        match self.probe.status() {
            Ok(status) if status.available < self.min_available => {
                warn!(
                    available = status.available,
                    min = self.min_available,
                    "Insufficient memory for synthesis"
                );
                Err(TtsError::Resource {
                    message: format!(
                        "insufficient memory: {} bytes available, {} required",
                        status.available, self.min_available
                    ),
                    resource: ResourceKind::DeviceMemory,
                })
            }
            Ok(status) => {
                debug!(
                    allocated = status.allocated,
                    available = status.available,
                    "Memory check passed"
                );
                Ok(status)
            }
            Err(e) => {
                warn!("Memory probe failed, admitting job anyway: {}", e);
                Ok(MemoryStatus::default())
            }
        }
    }

    /// Release transient buffers. Never errors; invoked after every job
    /// and once more at shutdown.
    pub fn cleanup(&self) {
        self.probe.release();
        debug!("Memory cleanup completed");
    }
}

/// Host-memory probe backed by `sysinfo`
///
/// Stands in for an accelerator probe on machines without one; a CUDA
/// deployment swaps in a probe that reads the device allocator instead.
pub struct SystemMemoryProbe {
    system: Mutex<sysinfo::System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn status(&self) -> Result<MemoryStatus> {
        let mut system = self.system.lock().map_err(|_| TtsError::Resource {
            message: "memory probe poisoned".to_string(),
            resource: ResourceKind::DeviceMemory,
        })?;
        system.refresh_memory();

        let total = system.total_memory();
        let available = system.available_memory();
        Ok(MemoryStatus {
            allocated: system.used_memory(),
            reserved: total.saturating_sub(available),
            total,
            available,
        })
    }

    fn release(&self) {
        // Nothing cached at host level; GPU probes empty their allocator
        // cache here.
    }
}
