//! Single-slot mailbox for camera parameter updates.
//!
//! A consumer thread [`submit`](ParameterInjector::submit)s an updater; the driver thread
//! [`apply`](ParameterInjector::apply)s it to the live parameters the next time the device
//! is ready. Only the newest unapplied updater is kept, and each one runs at most once.

use crate::parameters::CameraParameters;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutation applied to the parameters of an open device, on the driver's thread.
pub type ParameterUpdater = Box<dyn Fn(&mut CameraParameters) + Send + Sync>;

struct PendingRequest {
    generation: u64,
    updater: ParameterUpdater,
}

#[derive(Default)]
struct Slot {
    pending: Option<PendingRequest>,
    submitted: u64,
    applied: u64,
    superseded: u64,
}

#[derive(Default)]
pub struct ParameterInjector {
    slot: Mutex<Slot>,
}

/// Counters describing the mailbox history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct InjectorStats {
    pub submitted: u64,
    pub applied: u64,
    /// Requests overwritten before the driver got to them.
    pub superseded: u64,
    pub pending: bool,
}

impl ParameterInjector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `updater`, replacing any request that has not been applied yet.
    /// Returns the generation assigned to the request.
    pub fn submit(&self, updater: ParameterUpdater) -> u64 {
        let mut slot = self.lock();
        slot.submitted += 1;
        let generation = slot.submitted;
        if let Some(previous) = slot.pending.replace(PendingRequest {
            generation,
            updater,
        }) {
            slot.superseded += 1;
            log::debug!(
                "Parameter request {} superseded by {}",
                previous.generation,
                generation
            );
        }
        generation
    }

    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Runs the pending updater against `parameters` and clears the slot.
    ///
    /// Called on the driver thread. Returns `false` when nothing was pending, which makes
    /// repeated scheduling of the same request harmless. The updater runs outside the
    /// mailbox lock, so it may submit a follow-up request.
    pub fn apply(&self, parameters: &mut CameraParameters) -> bool {
        let request = {
            let mut slot = self.lock();
            match slot.pending.take() {
                Some(request) => {
                    slot.applied += 1;
                    request
                }
                None => return false,
            }
        };

        log::info!("Updating camera parameters (request {})", request.generation);
        (request.updater)(parameters);
        true
    }

    /// Drops any unapplied request.
    pub fn clear(&self) -> bool {
        self.lock().pending.take().is_some()
    }

    pub fn stats(&self) -> InjectorStats {
        let slot = self.lock();
        InjectorStats {
            submitted: slot.submitted,
            applied: slot.applied,
            superseded: slot.superseded,
            pending: slot.pending.is_some(),
        }
    }
}

impl fmt::Debug for ParameterInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterInjector")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::FlashMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_updater(counter: &Arc<AtomicUsize>) -> ParameterUpdater {
        let counter = counter.clone();
        Box::new(move |params| {
            counter.fetch_add(1, Ordering::SeqCst);
            params.flash_mode = Some(FlashMode::Torch);
        })
    }

    #[test]
    fn test_apply_runs_once() {
        let injector = ParameterInjector::new();
        let calls = Arc::new(AtomicUsize::new(0));
        injector.submit(counting_updater(&calls));

        let mut params = CameraParameters::default();
        assert!(injector.apply(&mut params));
        assert!(!injector.apply(&mut params));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(params.flash_mode, Some(FlashMode::Torch));
        assert!(!injector.has_pending());
    }

    #[test]
    fn test_newest_request_wins() {
        let injector = ParameterInjector::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        assert_eq!(injector.submit(counting_updater(&first)), 1);
        assert_eq!(injector.submit(counting_updater(&second)), 2);

        let mut params = CameraParameters::default();
        injector.apply(&mut params);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        let stats = injector.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.superseded, 1);
        assert!(!stats.pending);
    }

    #[test]
    fn test_apply_with_nothing_pending() {
        let injector = ParameterInjector::new();
        let mut params = CameraParameters::default();
        assert!(!injector.apply(&mut params));
        assert_eq!(params, CameraParameters::default());
    }

    #[test]
    fn test_updater_may_resubmit() {
        let injector = Arc::new(ParameterInjector::new());
        let inner = injector.clone();
        injector.submit(Box::new(move |_| {
            inner.submit(Box::new(|p| p.zoom = Some(2.0)));
        }));

        let mut params = CameraParameters::default();
        assert!(injector.apply(&mut params));
        assert!(injector.has_pending());
        assert!(injector.apply(&mut params));
        assert_eq!(params.zoom, Some(2.0));
    }

    #[test]
    fn test_clear() {
        let injector = ParameterInjector::new();
        injector.submit(Box::new(|_| {}));
        assert!(injector.clear());
        assert!(!injector.clear());
        assert!(!injector.has_pending());
    }
}
