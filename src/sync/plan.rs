use async_trait::async_trait;
use tracing::warn;

use super::{
    error::{RemoteError, SyncError},
    gateway::RemoteGateway,
};
use crate::{
    day::DayCutoff,
    model::{
        check_in_error, quantity_error, water_amount_error, DailyAggregate, InventoryItem,
        MacroTotals,
    },
    tracking::dto::{CheckInRequest, CheckInResponse},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Water,
    Nutrition,
    CheckIn,
}

/// One logging action expressed as the pieces the coordinator runs.
#[async_trait]
pub trait MutationPlan: Send + Sync + 'static {
    type Reply: Send + 'static;

    fn kind(&self) -> MutationKind;

    /// Rejects bad input before anything is applied.
    fn validate(&self) -> Result<(), SyncError>;

    /// Optimistic estimate on top of `base`.
    fn apply(&self, base: DailyAggregate) -> DailyAggregate;

    /// Takes this plan's effect back out of `current` when later optimistic
    /// updates prevent restoring the snapshot outright.
    fn revert(&self, current: DailyAggregate, snapshot: Option<&DailyAggregate>) -> DailyAggregate;

    async fn send(&self, gateway: &dyn RemoteGateway) -> Result<Self::Reply, RemoteError>;

    /// Merges the server's authoritative reply into `current`.
    fn reconcile(
        &self,
        current: DailyAggregate,
        snapshot: Option<&DailyAggregate>,
        reply: Self::Reply,
    ) -> DailyAggregate;
}

fn subtract(total: f64, amount: f64) -> f64 {
    (total - amount).max(0.0)
}

#[derive(Debug, Clone)]
pub struct NutritionPlan {
    pub item: InventoryItem,
    pub quantity: f64,
}

#[async_trait]
impl MutationPlan for NutritionPlan {
    type Reply = MacroTotals;

    fn kind(&self) -> MutationKind {
        MutationKind::Nutrition
    }

    fn validate(&self) -> Result<(), SyncError> {
        if let Some(problem) = quantity_error(self.quantity) {
            return Err(SyncError::validation(problem));
        }
        if !self.item.has_valid_macros() {
            return Err(SyncError::validation(format!(
                "item {} has negative or non-finite macros",
                self.item.id
            )));
        }
        if !self.item.active {
            return Err(SyncError::validation(format!(
                "item {} is inactive",
                self.item.id
            )));
        }
        Ok(())
    }

    fn apply(&self, base: DailyAggregate) -> DailyAggregate {
        let delta = self.item.macros_for(self.quantity);
        let totals = base.macros();
        base.with_macros(MacroTotals {
            protein_total: totals.protein_total + delta.protein_total,
            carbs_total: totals.carbs_total + delta.carbs_total,
            fats_total: totals.fats_total + delta.fats_total,
            calories_total: totals.calories_total + delta.calories_total,
        })
    }

    fn revert(&self, current: DailyAggregate, _: Option<&DailyAggregate>) -> DailyAggregate {
        let delta = self.item.macros_for(self.quantity);
        let totals = current.macros();
        current.with_macros(MacroTotals {
            protein_total: subtract(totals.protein_total, delta.protein_total),
            carbs_total: subtract(totals.carbs_total, delta.carbs_total),
            fats_total: subtract(totals.fats_total, delta.fats_total),
            calories_total: subtract(totals.calories_total, delta.calories_total),
        })
    }

    async fn send(&self, gateway: &dyn RemoteGateway) -> Result<MacroTotals, RemoteError> {
        let reply = gateway.log_nutrition(&self.item.id, self.quantity).await?;
        if !reply.success {
            return Err(RemoteError::Rejected);
        }
        Ok(reply.daily_totals)
    }

    fn reconcile(
        &self,
        current: DailyAggregate,
        _: Option<&DailyAggregate>,
        reply: MacroTotals,
    ) -> DailyAggregate {
        current.with_macros(reply)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WaterPlan {
    pub amount_ml: u32,
}

#[async_trait]
impl MutationPlan for WaterPlan {
    type Reply = u32;

    fn kind(&self) -> MutationKind {
        MutationKind::Water
    }

    fn validate(&self) -> Result<(), SyncError> {
        match water_amount_error(self.amount_ml) {
            Some(msg) => Err(SyncError::validation(msg)),
            None => Ok(()),
        }
    }

    fn apply(&self, mut base: DailyAggregate) -> DailyAggregate {
        base.water_total = base.water_total.saturating_add(self.amount_ml);
        base
    }

    fn revert(&self, mut current: DailyAggregate, _: Option<&DailyAggregate>) -> DailyAggregate {
        current.water_total = current.water_total.saturating_sub(self.amount_ml);
        current
    }

    async fn send(&self, gateway: &dyn RemoteGateway) -> Result<u32, RemoteError> {
        let reply = gateway.log_water(self.amount_ml).await?;
        if !reply.success {
            return Err(RemoteError::Rejected);
        }
        Ok(reply.updated_water_total)
    }

    fn reconcile(
        &self,
        mut current: DailyAggregate,
        _: Option<&DailyAggregate>,
        reply: u32,
    ) -> DailyAggregate {
        current.water_total = reply;
        current
    }
}

/// Morning check-in values. Absent fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CheckIn {
    pub weight: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub bloated: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct CheckInPlan {
    pub check_in: CheckIn,
    pub cutoff: DayCutoff,
}

#[async_trait]
impl MutationPlan for CheckInPlan {
    type Reply = CheckInResponse;

    fn kind(&self) -> MutationKind {
        MutationKind::CheckIn
    }

    fn validate(&self) -> Result<(), SyncError> {
        let CheckIn {
            weight,
            sleep_hours,
            bloated,
        } = self.check_in;
        if weight.is_none() && sleep_hours.is_none() && bloated.is_none() {
            return Err(SyncError::validation("check-in has no values"));
        }
        match check_in_error(weight, sleep_hours) {
            Some(problem) => Err(SyncError::validation(problem)),
            None => Ok(()),
        }
    }

    fn apply(&self, mut base: DailyAggregate) -> DailyAggregate {
        if let Some(w) = self.check_in.weight {
            base.weight = Some(w);
        }
        if let Some(h) = self.check_in.sleep_hours {
            base.sleep_hours = Some(h);
        }
        if let Some(b) = self.check_in.bloated {
            base.bloated = b;
        }
        base
    }

    /// Restores a field only while it still holds the value this check-in wrote.
    fn revert(
        &self,
        mut current: DailyAggregate,
        snapshot: Option<&DailyAggregate>,
    ) -> DailyAggregate {
        let previous = snapshot.filter(|s| s.date == current.date);
        if self.check_in.weight.is_some() && current.weight == self.check_in.weight {
            current.weight = previous.and_then(|s| s.weight);
        }
        if self.check_in.sleep_hours.is_some() && current.sleep_hours == self.check_in.sleep_hours
        {
            current.sleep_hours = previous.and_then(|s| s.sleep_hours);
        }
        if let Some(b) = self.check_in.bloated {
            if current.bloated == b {
                current.bloated = previous.is_some_and(|s| s.bloated);
            }
        }
        current
    }

    async fn send(&self, gateway: &dyn RemoteGateway) -> Result<CheckInResponse, RemoteError> {
        let request = CheckInRequest {
            weight: self.check_in.weight,
            sleep_hours: self.check_in.sleep_hours,
            bloated: self.check_in.bloated,
            cutoff_hour: self.cutoff.hour(),
            cutoff_minute: self.cutoff.minute(),
        };
        gateway.upsert_check_in(&request).await
    }

    fn reconcile(
        &self,
        mut current: DailyAggregate,
        snapshot: Option<&DailyAggregate>,
        reply: CheckInResponse,
    ) -> DailyAggregate {
        if reply.date != current.date {
            warn!(
                client_date = %current.date,
                server_date = %reply.date,
                "check-in stored under a different day; undoing local values"
            );
            return self.revert(current, snapshot);
        }
        current.check_in_id = Some(reply.id);
        current.weight = reply.weight;
        current.sleep_hours = reply.sleep_hours;
        current.bloated = reply.bloated;
        current
    }
}
