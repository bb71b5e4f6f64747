use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{BloatFlagRow, DailyLogRow, InventoryItemRow, MacroTotalsRow};
use crate::model::{InventoryItem, MacroTotals};

const DAILY_LOG_COLUMNS: &str = r#"
    id, date, protein_total, carbs_total, fats_total, calories_total,
    water_total, bloated, weight, sleep_hours, checked_in_at
"#;

pub async fn list_active_items(db: &PgPool) -> anyhow::Result<Vec<InventoryItem>> {
    let rows = sqlx::query_as::<_, InventoryItemRow>(
        r#"
        SELECT id, name, icon, protein_per_unit, carbs_per_unit, fat_per_unit,
               calories_per_unit, high_soy, active
        FROM inventory_items
        WHERE active
        ORDER BY name
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(InventoryItem::from).collect())
}

pub async fn find_item_tx(
    tx: &mut Transaction<'_, Postgres>,
    item_id: &str,
) -> anyhow::Result<Option<InventoryItem>> {
    let row = sqlx::query_as::<_, InventoryItemRow>(
        r#"
        SELECT id, name, icon, protein_per_unit, carbs_per_unit, fat_per_unit,
               calories_per_unit, high_soy, active
        FROM inventory_items
        WHERE id = $1
        "#,
    )
    .bind(item_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(InventoryItem::from))
}

pub async fn find_day(
    db: &PgPool,
    user_id: Uuid,
    date: &str,
) -> anyhow::Result<Option<DailyLogRow>> {
    let row = sqlx::query_as::<_, DailyLogRow>(&format!(
        "SELECT {DAILY_LOG_COLUMNS} FROM daily_logs WHERE user_id = $1 AND date = $2"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Creates the day's row on first use and returns its id.
pub async fn ensure_daily_log_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    date: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO daily_logs (id, user_id, date)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, date) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(date)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn insert_water_entry_tx(
    tx: &mut Transaction<'_, Postgres>,
    daily_log_id: Uuid,
    amount_ml: i32,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO water_entries (id, daily_log_id, amount_ml)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(daily_log_id)
    .bind(amount_ml)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Recomputes `water_total` from the day's entries.
pub async fn recompute_water_tx(
    tx: &mut Transaction<'_, Postgres>,
    daily_log_id: Uuid,
) -> anyhow::Result<i32> {
    let (total,): (i32,) = sqlx::query_as(
        r#"
        UPDATE daily_logs
        SET water_total = (
                SELECT COALESCE(SUM(amount_ml), 0)::INTEGER
                FROM water_entries
                WHERE daily_log_id = $1
            ),
            updated_at = now()
        WHERE id = $1
        RETURNING water_total
        "#,
    )
    .bind(daily_log_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(total)
}

/// Appends an entry with the item's macros frozen at logging time.
pub async fn insert_nutrition_entry_tx(
    tx: &mut Transaction<'_, Postgres>,
    daily_log_id: Uuid,
    item: &InventoryItem,
    quantity: f64,
) -> anyhow::Result<()> {
    let m = item.macros_for(quantity);
    sqlx::query(
        r#"
        INSERT INTO nutrition_entries
            (id, daily_log_id, item_id, quantity, protein, carbs, fat, calories)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(daily_log_id)
    .bind(&item.id)
    .bind(quantity)
    .bind(m.protein_total)
    .bind(m.carbs_total)
    .bind(m.fats_total)
    .bind(m.calories_total)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Recomputes the four macro totals from the day's entries.
pub async fn recompute_macros_tx(
    tx: &mut Transaction<'_, Postgres>,
    daily_log_id: Uuid,
) -> anyhow::Result<MacroTotals> {
    let row = sqlx::query_as::<_, MacroTotalsRow>(
        r#"
        WITH sums AS (
            SELECT COALESCE(SUM(protein), 0)  AS protein,
                   COALESCE(SUM(carbs), 0)    AS carbs,
                   COALESCE(SUM(fat), 0)      AS fat,
                   COALESCE(SUM(calories), 0) AS calories
            FROM nutrition_entries
            WHERE daily_log_id = $1
        )
        UPDATE daily_logs d
        SET protein_total  = sums.protein,
            carbs_total    = sums.carbs,
            fats_total     = sums.fat,
            calories_total = sums.calories,
            updated_at     = now()
        FROM sums
        WHERE d.id = $1
        RETURNING d.protein_total, d.carbs_total, d.fats_total, d.calories_total
        "#,
    )
    .bind(daily_log_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.into())
}

/// Upserts the check-in fields of a day. `None` keeps the stored value.
pub async fn upsert_check_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    date: &str,
    weight: Option<f64>,
    sleep_hours: Option<f64>,
    bloated: Option<bool>,
) -> anyhow::Result<DailyLogRow> {
    let row = sqlx::query_as::<_, DailyLogRow>(&format!(
        r#"
        INSERT INTO daily_logs (id, user_id, date, weight, sleep_hours, bloated, checked_in_at)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, FALSE), now())
        ON CONFLICT (user_id, date) DO UPDATE SET
            weight        = COALESCE(EXCLUDED.weight, daily_logs.weight),
            sleep_hours   = COALESCE(EXCLUDED.sleep_hours, daily_logs.sleep_hours),
            bloated       = COALESCE($6, daily_logs.bloated),
            checked_in_at = now(),
            updated_at    = now()
        RETURNING {DAILY_LOG_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(date)
    .bind(weight)
    .bind(sleep_hours)
    .bind(bloated)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

/// Most recent days first.
pub async fn recent_bloat_flags_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<BloatFlagRow>> {
    let rows = sqlx::query_as::<_, BloatFlagRow>(
        r#"
        SELECT date, bloated
        FROM daily_logs
        WHERE user_id = $1
        ORDER BY date DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

/// Deactivates every active high-soy item; returns how many changed.
pub async fn deactivate_high_soy_items_tx(
    tx: &mut Transaction<'_, Postgres>,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE inventory_items
        SET active = FALSE
        WHERE high_soy AND active
        "#,
    )
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}
