use std::sync::{Mutex, MutexGuard, PoisonError};

use super::DiskError;

/// Point-in-time copy of the operation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationSnapshot {
    pub running: bool,
    pub percent: u8,
}

/// Process-wide record of the single in-flight format.
///
/// The formatter is the only writer; the progress reporter only reads.
#[derive(Debug, Default)]
pub struct OperationState {
    inner: Mutex<OperationSnapshot>,
}

impl OperationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> OperationSnapshot {
        *self.lock()
    }

    /// Claims the record for a new operation, or reports `Busy` without
    /// touching it when one is already running.
    pub fn try_begin(&self) -> Result<(), DiskError> {
        let mut state = self.lock();
        if state.running {
            return Err(DiskError::Busy);
        }
        *state = OperationSnapshot {
            running: true,
            percent: 0,
        };
        Ok(())
    }

    pub fn complete(&self) {
        *self.lock() = OperationSnapshot {
            running: false,
            percent: 100,
        };
    }

    pub fn reset(&self) {
        *self.lock() = OperationSnapshot::default();
    }

    fn lock(&self) -> MutexGuard<'_, OperationSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
