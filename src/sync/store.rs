use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::error::SyncError;
use crate::model::DailyAggregate;

/// In-memory holder of the best-known aggregate for "today".
///
/// Every write happens inside one critical section with no suspension point,
/// so concurrent optimistic updates compose instead of overwriting each other.
/// Each write bumps a version counter; replies and refreshes carry the version
/// they were issued at and are discarded when they would overwrite newer state.
#[derive(Debug)]
pub struct AggregateStore {
    state: Mutex<StoreState>,
    changes: watch::Sender<Option<DailyAggregate>>,
}

#[derive(Debug, Default)]
struct StoreState {
    current: Option<DailyAggregate>,
    version: u64,
    latest_optimistic: u64,
    latest_authoritative: u64,
    in_flight: usize,
    /// A reply was discarded or a rollback compensated since the last
    /// authoritative install.
    needs_convergence: bool,
}

/// An optimistic update waiting for its remote outcome.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub(crate) version: u64,
    pub(crate) date: String,
    pub(crate) snapshot: Option<DailyAggregate>,
}

/// Store version observed when a convergence fetch started.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RefreshTicket {
    version: u64,
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::with_initial(None)
    }

    pub fn with_initial(initial: Option<DailyAggregate>) -> Self {
        let (changes, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(StoreState {
                current: initial,
                ..StoreState::default()
            }),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &StoreState) {
        self.changes.send_replace(state.current.clone());
    }

    pub fn get_current(&self) -> Option<DailyAggregate> {
        self.lock().current.clone()
    }

    /// Independent copy of the held aggregate.
    pub fn snapshot(&self) -> Option<DailyAggregate> {
        self.lock().current.clone()
    }

    /// Overwrites the held aggregate in one step. Treated as authoritative.
    pub fn replace(&self, aggregate: DailyAggregate) {
        let mut state = self.lock();
        state.version += 1;
        state.latest_authoritative = state.version;
        state.needs_convergence = false;
        state.current = Some(aggregate);
        self.publish(&state);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DailyAggregate>> {
        self.changes.subscribe()
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Number of optimistic updates whose remote outcome is still unknown.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// True when the held value may differ from the server and nothing
    /// authoritative has been installed since.
    pub fn needs_convergence(&self) -> bool {
        self.lock().needs_convergence
    }

    /// Applies `apply` to the aggregate for `date`. An absent aggregate, or one
    /// for another day, is replaced by an all-zero baseline first.
    pub(crate) fn apply_optimistic(
        &self,
        date: &str,
        apply: impl FnOnce(DailyAggregate) -> DailyAggregate,
    ) -> Pending {
        let mut state = self.lock();
        let snapshot = state.current.clone();
        let base = match &state.current {
            Some(current) if current.date == date => current.clone(),
            _ => DailyAggregate::empty(date),
        };
        state.version += 1;
        state.latest_optimistic = state.version;
        state.in_flight += 1;
        state.current = Some(apply(base));
        self.publish(&state);

        Pending {
            version: state.version,
            date: date.to_string(),
            snapshot,
        }
    }

    /// Merges a server reply for `pending`, unless a newer optimistic update
    /// has been applied since, another mutation is still in flight or the
    /// store has moved to another day.
    ///
    /// A reply that arrives while an older mutation is outstanding may come
    /// from a server that has not applied that mutation yet, so installing it
    /// could drop a delta. Such replies are discarded, the optimistic sum
    /// stays in place and the store is flagged for convergence.
    pub(crate) fn reconcile(
        &self,
        pending: &Pending,
        merge: impl FnOnce(DailyAggregate) -> DailyAggregate,
    ) -> Result<DailyAggregate, SyncError> {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        let same_day = state
            .current
            .as_ref()
            .is_some_and(|current| current.date == pending.date);
        if pending.version < state.latest_optimistic || state.in_flight > 0 || !same_day {
            state.needs_convergence = true;
            return Err(SyncError::StaleReconciliation {
                version: pending.version,
                latest: state.version,
            });
        }

        let base = state
            .current
            .take()
            .unwrap_or_else(|| DailyAggregate::empty(pending.date.as_str()));
        let merged = merge(base);
        state.version += 1;
        state.latest_authoritative = state.version;
        state.current = Some(merged.clone());
        self.publish(&state);
        Ok(merged)
    }

    /// Undoes `pending` after a failed remote call.
    ///
    /// Restores the snapshot exactly when nothing was written since. Otherwise
    /// the optimistic delta is only still present if every later write was
    /// optimistic too, in which case `revert` takes it back out.
    pub(crate) fn rollback(
        &self,
        pending: &Pending,
        revert: impl FnOnce(DailyAggregate) -> DailyAggregate,
    ) -> Option<DailyAggregate> {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        if state.version == pending.version {
            state.current = pending.snapshot.clone();
        } else if state.latest_authoritative < pending.version {
            state.current = match state.current.take() {
                Some(current) if current.date == pending.date => Some(revert(current)),
                other => other,
            };
            state.needs_convergence = true;
        } else {
            // a server value already replaced our estimate
            return state.current.clone();
        }

        state.version += 1;
        self.publish(&state);
        state.current.clone()
    }

    pub(crate) fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket {
            version: self.lock().version,
        }
    }

    /// Installs a fetched server aggregate if no mutation is in flight and
    /// nothing was written since `ticket` was taken.
    pub(crate) fn finish_refresh(
        &self,
        ticket: RefreshTicket,
        aggregate: DailyAggregate,
    ) -> Result<(), SyncError> {
        let mut state = self.lock();
        if state.in_flight > 0 || state.version != ticket.version {
            return Err(SyncError::StaleReconciliation {
                version: ticket.version,
                latest: state.version,
            });
        }
        state.version += 1;
        state.latest_authoritative = state.version;
        state.needs_convergence = false;
        state.current = Some(aggregate);
        self.publish(&state);
        Ok(())
    }
}
