//! Load-shedding admission control.
//!
//! Each endpoint class gets its own [`AdmissionController`] with a fixed
//! in-flight ceiling. A request either acquires a permit immediately or is
//! rejected; there is no queue and no backpressure. The permit releases
//! its slot on drop, so every exit path of a handler returns capacity,
//! including a panic unwind.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// =============================================================================
// Admission Controller
// =============================================================================

/// Non-blocking counting guard with "acquire if under limit, else reject"
/// semantics.
#[derive(Debug)]
pub struct AdmissionController {
    limit: u32,
    in_flight: Arc<AtomicU32>,
}

impl AdmissionController {
    /// Create a controller admitting at most `limit` concurrent holders.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Try to admit one request.
    ///
    /// Returns `None` when the ceiling is already reached. Never blocks.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        let mut current = self.in_flight.load(Ordering::Relaxed);
        loop {
            if current >= self.limit {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(AdmissionPermit {
                        in_flight: Arc::clone(&self.in_flight),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Configured ceiling.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of currently admitted requests.
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

/// A held admission slot. Releases on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    in_flight: Arc<AtomicU32>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

// =============================================================================
// Tests
// =============================================================================
