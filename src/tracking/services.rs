use anyhow::Context;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::{
    bloat,
    dto::{CheckInRequest, CheckInResponse},
    repo,
};
use crate::{
    day::{day_key, Clock, DayCutoff, SystemClock},
    model::{DailyAggregate, InventoryItem, MacroTotals},
    state::AppState,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("item {0} is inactive")]
    Inactive(String),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// Today's day key on the server's clock.
fn today(st: &AppState, cutoff: DayCutoff) -> String {
    day_key(SystemClock::new(st.config.day.utc_offset).now(), cutoff)
}

pub async fn log_water(st: &AppState, user_id: Uuid, amount_ml: u32) -> Result<u32, ServiceError> {
    let amount = i32::try_from(amount_ml)
        .map_err(|_| ServiceError::Invalid(format!("amountMl too large: {amount_ml}")))?;
    let date = today(st, st.config.day.cutoff);

    let mut tx = st.db.begin().await.context("begin tx")?;
    let log_id = repo::ensure_daily_log_tx(&mut tx, user_id, &date).await?;
    repo::insert_water_entry_tx(&mut tx, log_id, amount).await?;
    let total = repo::recompute_water_tx(&mut tx, log_id).await?;
    tx.commit().await.context("commit tx")?;

    debug!(%user_id, %date, total, "water logged");
    let total = u32::try_from(total)
        .map_err(|_| anyhow::anyhow!("negative water total {total} for {date}"))?;
    Ok(total)
}

pub async fn log_nutrition(
    st: &AppState,
    user_id: Uuid,
    item_id: &str,
    quantity: f64,
) -> Result<MacroTotals, ServiceError> {
    let date = today(st, st.config.day.cutoff);

    let mut tx = st.db.begin().await.context("begin tx")?;
    let item = repo::find_item_tx(&mut tx, item_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("item {item_id}")))?;
    if !item.active {
        return Err(ServiceError::Inactive(item.id));
    }
    let log_id = repo::ensure_daily_log_tx(&mut tx, user_id, &date).await?;
    repo::insert_nutrition_entry_tx(&mut tx, log_id, &item, quantity).await?;
    let totals = repo::recompute_macros_tx(&mut tx, log_id).await?;
    tx.commit().await.context("commit tx")?;

    debug!(%user_id, %date, item_id, quantity, "nutrition logged");
    Ok(totals)
}

/// Upserts the day's check-in using the caller's cutoff, then runs the
/// bloat-pattern rule in the same transaction.
pub async fn check_in(
    st: &AppState,
    user_id: Uuid,
    req: &CheckInRequest,
) -> Result<CheckInResponse, ServiceError> {
    let cutoff = DayCutoff::new(req.cutoff_hour, req.cutoff_minute)
        .map_err(|e| ServiceError::Invalid(e.to_string()))?;
    let date = today(st, cutoff);

    let mut tx = st.db.begin().await.context("begin tx")?;
    let row = repo::upsert_check_in_tx(
        &mut tx,
        user_id,
        &date,
        req.weight,
        req.sleep_hours,
        req.bloated,
    )
    .await?;
    if row.bloated {
        bloat::apply_tx(&mut tx, user_id).await?;
    }
    tx.commit().await.context("commit tx")?;

    Ok(CheckInResponse {
        id: row.id,
        weight: row.weight,
        sleep_hours: row.sleep_hours,
        bloated: row.bloated,
        date: row.date,
    })
}

pub async fn get_day(
    st: &AppState,
    user_id: Uuid,
    date: &str,
) -> Result<DailyAggregate, ServiceError> {
    repo::find_day(&st.db, user_id, date)
        .await?
        .map(DailyAggregate::from)
        .ok_or_else(|| ServiceError::NotFound(format!("day {date}")))
}

pub async fn list_inventory(st: &AppState) -> Result<Vec<InventoryItem>, ServiceError> {
    Ok(repo::list_active_items(&st.db).await?)
}
