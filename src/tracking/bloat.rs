//! Two bloated days in a row take high-soy foods off the menu.

use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{repo, repo_types::BloatFlagRow};
use crate::day::parse_day_key;

/// How many recent days the rule looks at.
pub const WINDOW: i64 = 2;

/// True when the two most recent days are consecutive calendar dates and
/// both were flagged bloated. `recent` is ordered newest first.
pub fn pattern_detected(recent: &[BloatFlagRow]) -> bool {
    let [latest, previous, ..] = recent else {
        return false;
    };
    if !(latest.bloated && previous.bloated) {
        return false;
    }
    match (parse_day_key(&latest.date), parse_day_key(&previous.date)) {
        (Ok(a), Ok(b)) => b.next_day() == Some(a),
        _ => false,
    }
}

/// Runs the rule for `user_id` inside `tx`; returns how many items were
/// deactivated.
pub async fn apply_tx(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> anyhow::Result<u64> {
    let recent = repo::recent_bloat_flags_tx(tx, user_id, WINDOW).await?;
    if !pattern_detected(&recent) {
        return Ok(0);
    }
    let disabled = repo::deactivate_high_soy_items_tx(tx).await?;
    info!(%user_id, disabled, "bloat pattern detected, high-soy items deactivated");
    Ok(disabled)
}
