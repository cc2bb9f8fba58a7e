//! Admission gate bounding concurrent downloads
//!
//! There is no queue: a request either gets a slot immediately or is denied.
//! A granted slot is an [`AdmissionPermit`]; dropping it releases the slot,
//! so every exit path of an attempt (success, failure, panic) gives it back.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Non-blocking counter of running downloads
#[derive(Clone)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    max: usize,
}

/// One granted admission slot, released on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        tracing::debug!("admission slot released");
    }
}

impl AdmissionGate {
    /// Gate with `max` slots
    pub fn new(max: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Take a slot if one is free, without waiting
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Slots currently in use
    pub fn active(&self) -> usize {
        self.max.saturating_sub(self.slots.available_permits())
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Configured number of slots
    pub fn max(&self) -> usize {
        self.max
    }

    /// Stop granting slots; pending and future `try_acquire` calls are denied
    pub fn close(&self) {
        self.slots.close();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_up_to_max_then_denies() {
        let gate = AdmissionGate::new(2);
        let first = gate.try_acquire();
        let second = gate.try_acquire();
        let third = gate.try_acquire();

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(third.is_none());
        assert_eq!(gate.active(), 2);
        assert_eq!(gate.available(), 0);
    }

    #[test]
    fn dropping_permit_releases_exactly_one_slot() {
        let gate = AdmissionGate::new(1);
        let permit = gate.try_acquire().unwrap();
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert_eq!(gate.active(), 0);
        assert!(gate.try_acquire().is_some());
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn concurrent_acquires_never_exceed_max() {
        let gate = AdmissionGate::new(3);
        let mut handles = Vec::new();
        for _ in 0..10 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move { gate.try_acquire() }));
        }

        let mut granted = Vec::new();
        for handle in handles {
            if let Some(permit) = handle.await.unwrap() {
                granted.push(permit);
            }
        }

        assert_eq!(granted.len(), 3);
        assert_eq!(gate.active(), 3);
        granted.clear();
        assert_eq!(gate.active(), 0);
    }

    #[tokio::test]
    async fn permit_is_released_when_owning_task_panics() {
        let gate = AdmissionGate::new(1);
        let permit = gate.try_acquire().unwrap();

        let result = tokio::spawn(async move {
            let _permit = permit;
            panic!("attempt blew up");
        })
        .await;

        assert!(result.unwrap_err().is_panic());
        assert_eq!(gate.active(), 0);
    }

    #[test]
    fn closed_gate_denies() {
        let gate = AdmissionGate::new(2);
        gate.close();
        assert!(gate.try_acquire().is_none());
    }
}
