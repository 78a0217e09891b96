//! Cooperative cancellation (spec.md §5).
//!
//! Scans must re-check cancellation between pairs and return early with a
//! partial report/result list — never panic, never silently run to
//! completion once cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Default handle: never cancels. Used when the caller doesn't need to
/// interrupt a scan.
#[derive(Default, Clone, Copy)]
pub struct NeverCancelled;

impl Cancellation for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A cheap, cloneable cancellation flag a caller can flip from another
/// thread to interrupt an in-progress scan.
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Cancellation for CancellationFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
