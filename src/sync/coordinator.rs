use std::sync::Arc;

use tokio::{sync::broadcast, task::JoinHandle, time::timeout};
use tracing::{debug, warn};

use super::{
    error::{RemoteError, SyncError},
    gateway::{HttpGateway, RemoteGateway},
    mirror,
    plan::{CheckIn, CheckInPlan, MutationKind, MutationPlan, NutritionPlan, WaterPlan},
    store::{AggregateStore, Pending},
};
use crate::{
    auth::session::AuthProvider,
    config::SyncConfig,
    day::{day_key, Clock, SystemClock},
    model::{DailyAggregate, InventoryItem},
};

/// How a successful remote mutation ended locally.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The server totals were written to the store.
    Reconciled(DailyAggregate),
    /// A newer optimistic update was applied first; the reply was discarded.
    Superseded,
}

/// Emitted after every settled mutation so other views of the day refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub date: String,
    pub kind: MutationKind,
}

/// Handle to a dispatched mutation. Dropping it does not cancel the
/// round-trip.
#[derive(Debug)]
pub struct InFlight {
    version: u64,
    handle: JoinHandle<Result<Settlement, SyncError>>,
}

impl InFlight {
    /// Store version assigned when the optimistic update was applied.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub async fn settled(self) -> Result<Settlement, SyncError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(RemoteError::Aborted(e.to_string()).into()),
        }
    }
}

/// Runs the optimistic-update protocol for logging actions against one store.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<AggregateStore>,
    gateway: Arc<dyn RemoteGateway>,
    auth: Arc<dyn AuthProvider>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    invalidations: broadcast::Sender<Invalidation>,
}

impl Coordinator {
    pub fn new(
        store: Arc<AggregateStore>,
        gateway: Arc<dyn RemoteGateway>,
        auth: Arc<dyn AuthProvider>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let (invalidations, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                store,
                gateway,
                auth,
                clock,
                config,
                invalidations,
            }),
        }
    }

    /// Builds a client from `config`: wall clock at the configured UTC
    /// offset, HTTP gateway on `api_base_url`, and, when `mirror_path` is
    /// set, a store seeded from the mirror file plus a task keeping it
    /// written. An unreadable mirror starts the store empty.
    pub async fn connect(config: SyncConfig, auth: Arc<dyn AuthProvider>) -> anyhow::Result<Self> {
        let initial = match &config.mirror_path {
            Some(path) => mirror::load(path).await.unwrap_or_else(|e| {
                warn!(error = %e, path = %path.display(), "ignoring unreadable store mirror");
                None
            }),
            None => None,
        };
        let store = Arc::new(AggregateStore::with_initial(initial));
        if let Some(path) = &config.mirror_path {
            // runs until the store is dropped
            mirror::spawn(store.subscribe(), path.clone());
        }

        let gateway = Arc::new(HttpGateway::new(config.api_base_url.clone(), Arc::clone(&auth)));
        let clock = Arc::new(SystemClock::new(config.day.utc_offset));
        debug!(api = %config.api_base_url, offset = %config.day.utc_offset, "sync client assembled");
        Ok(Self::new(store, gateway, auth, clock, config))
    }

    /// [`Coordinator::connect`] with settings read from the environment.
    pub async fn from_env(auth: Arc<dyn AuthProvider>) -> anyhow::Result<Self> {
        Self::connect(SyncConfig::from_env()?, auth).await
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.inner.store
    }

    /// Day key the next logging action will be filed under.
    pub fn today(&self) -> String {
        day_key(self.inner.clock.now(), self.inner.config.day.cutoff)
    }

    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<Invalidation> {
        self.inner.invalidations.subscribe()
    }

    pub fn log_nutrition(&self, item: InventoryItem, quantity: f64) -> Result<InFlight, SyncError> {
        self.dispatch(NutritionPlan { item, quantity })
    }

    pub fn log_water(&self, amount_ml: u32) -> Result<InFlight, SyncError> {
        self.dispatch(WaterPlan { amount_ml })
    }

    pub fn submit_check_in(&self, check_in: CheckIn) -> Result<InFlight, SyncError> {
        self.dispatch(CheckInPlan {
            check_in,
            cutoff: self.inner.config.day.cutoff,
        })
    }

    /// Applies `plan` optimistically and spawns its remote round-trip.
    ///
    /// The store holds the optimistic value when this returns. Auth and
    /// validation failures are reported before anything is applied. Must be
    /// called from within a tokio runtime.
    pub fn dispatch<P: MutationPlan>(&self, plan: P) -> Result<InFlight, SyncError> {
        if self.inner.auth.current_user_id().is_none() {
            debug!(kind = ?plan.kind(), "no session; mutation refused");
            return Err(SyncError::Unauthenticated);
        }
        plan.validate()?;

        let date = self.today();
        let pending = self
            .inner
            .store
            .apply_optimistic(&date, |base| plan.apply(base));
        debug!(kind = ?plan.kind(), version = pending.version, %date, "optimistic update applied");

        let version = pending.version;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.settle(plan, pending).await });
        Ok(InFlight { version, handle })
    }

    /// Fetches today's aggregate and installs it if the store is quiescent.
    /// Returns whether the store was updated.
    pub async fn refresh(&self) -> Result<bool, SyncError> {
        self.inner.refresh(&self.today()).await
    }
}

impl Inner {
    async fn settle<P: MutationPlan>(
        &self,
        plan: P,
        pending: Pending,
    ) -> Result<Settlement, SyncError> {
        let limit = self.config.mutation_timeout;
        let outcome = match timeout(limit, plan.send(self.gateway.as_ref())).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(limit)),
        };

        let settlement = match outcome {
            Ok(reply) => {
                let merged = self.store.reconcile(&pending, |current| {
                    plan.reconcile(current, pending.snapshot.as_ref(), reply)
                });
                match merged {
                    Ok(aggregate) => {
                        debug!(kind = ?plan.kind(), version = pending.version, "reconciled with server totals");
                        Ok(Settlement::Reconciled(aggregate))
                    }
                    Err(SyncError::StaleReconciliation { version, latest }) => {
                        debug!(kind = ?plan.kind(), version, latest, "stale reconciliation discarded");
                        Ok(Settlement::Superseded)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                warn!(kind = ?plan.kind(), version = pending.version, error = %e, "remote mutation failed; rolling back");
                self.store.rollback(&pending, |current| {
                    plan.revert(current, pending.snapshot.as_ref())
                });
                Err(SyncError::RemoteFailure(e))
            }
        };

        self.invalidate(&pending.date, plan.kind()).await;
        settlement
    }

    async fn invalidate(&self, date: &str, kind: MutationKind) {
        // no subscribers is fine
        let _ = self.invalidations.send(Invalidation {
            date: date.to_string(),
            kind,
        });

        // a discarded reply leaves only an estimate behind; converge once the
        // last outstanding mutation has settled
        let must_converge = self.store.needs_convergence() && self.store.in_flight() == 0;
        if self.config.refresh_on_settle || must_converge {
            if let Err(e) = self.refresh(date).await {
                warn!(%date, error = %e, "refresh after settle failed");
            }
        }
    }

    async fn refresh(&self, date: &str) -> Result<bool, SyncError> {
        let ticket = self.store.begin_refresh();
        let limit = self.config.mutation_timeout;
        let fetched = timeout(limit, self.gateway.fetch_day(date))
            .await
            .map_err(|_| RemoteError::Timeout(limit))??;

        let Some(aggregate) = fetched else {
            debug!(%date, "day not on server yet; nothing to converge to");
            return Ok(false);
        };

        match self.store.finish_refresh(ticket, aggregate) {
            Ok(()) => {
                debug!(%date, "store converged to server state");
                Ok(true)
            }
            Err(SyncError::StaleReconciliation { version, latest }) => {
                debug!(%date, version, latest, "refresh skipped; store changed meanwhile");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
