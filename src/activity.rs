//! In-flight operation tracking.
//!
//! The desk is either idle or running some set of activities, each a dispatch
//! to one provider or a forward of one request. [`ActivityState`] is a pure
//! state machine over that set: `apply` returns the next state or rejects an
//! activity that is already running. [`ActivityTracker`] holds the current state
//! behind a lock and hands out guards that finish their activity when dropped,
//! so a busy flag is released however the operation ends.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::provider::ServiceProvider;
use crate::error::{CsrError, Result};
use crate::request::RequestId;

/// A long-running operation that holds a partition busy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Activity {
    Dispatching(ServiceProvider),
    Forwarding(RequestId),
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Dispatching(provider) => write!(f, "dispatching to {}", provider),
            Activity::Forwarding(id) => write!(f, "forwarding {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    Started(Activity),
    Finished(Activity),
}

/// Set of activities currently in flight. Empty means idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityState {
    in_flight: BTreeSet<Activity>,
}

impl ActivityState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn is_active(&self, activity: &Activity) -> bool {
        self.in_flight.contains(activity)
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.in_flight.iter()
    }

    /// Compute the state after `event`.
    ///
    /// Starting an activity that is already in flight is rejected with
    /// `ProviderBusy` or `RequestBusy`. Finishing one that is not in flight
    /// leaves the state unchanged.
    pub fn apply(&self, event: ActivityEvent) -> Result<ActivityState> {
        let mut next = self.clone();
        match event {
            ActivityEvent::Started(activity) => {
                if next.in_flight.contains(&activity) {
                    return Err(match activity {
                        Activity::Dispatching(provider) => CsrError::ProviderBusy(provider),
                        Activity::Forwarding(id) => CsrError::RequestBusy(id),
                    });
                }
                next.in_flight.insert(activity);
            }
            ActivityEvent::Finished(activity) => {
                if !next.in_flight.remove(&activity) {
                    tracing::warn!(%activity, "Finished an activity that was not in flight");
                }
            }
        }
        Ok(next)
    }
}

/// Shared holder of the desk's [`ActivityState`].
#[derive(Debug, Default)]
pub struct ActivityTracker {
    state: Mutex<ActivityState>,
}

impl ActivityTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `activity` as started, or fail if it is already running.
    ///
    /// The activity finishes when the returned guard is dropped.
    pub fn begin(self: &Arc<Self>, activity: Activity) -> Result<ActivityGuard> {
        let mut state = self.state.lock();
        *state = state.apply(ActivityEvent::Started(activity.clone()))?;
        tracing::debug!(%activity, "Activity started");

        Ok(ActivityGuard {
            tracker: Arc::clone(self),
            activity: Some(activity),
        })
    }

    pub fn is_active(&self, activity: &Activity) -> bool {
        self.state.lock().is_active(activity)
    }

    pub fn snapshot(&self) -> ActivityState {
        self.state.lock().clone()
    }

    fn finish(&self, activity: Activity) {
        let mut state = self.state.lock();
        // Finishing never fails
        if let Ok(next) = state.apply(ActivityEvent::Finished(activity.clone())) {
            *state = next;
        }
        tracing::debug!(%activity, "Activity finished");
    }
}

/// Finishes its activity when dropped.
#[derive(Debug)]
pub struct ActivityGuard {
    tracker: Arc<ActivityTracker>,
    activity: Option<Activity>,
}

impl ActivityGuard {
    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if let Some(activity) = self.activity.take() {
            self.tracker.finish(activity);
        }
    }
}
