use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{DailyAggregate, InventoryItem, MacroTotals};

/// Row of `daily_logs`.
#[derive(Debug, Clone, FromRow)]
pub struct DailyLogRow {
    pub id: Uuid,
    pub date: String,
    pub protein_total: f64,
    pub carbs_total: f64,
    pub fats_total: f64,
    pub calories_total: f64,
    pub water_total: i32,
    pub bloated: bool,
    pub weight: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub checked_in_at: Option<OffsetDateTime>,
}

impl From<DailyLogRow> for DailyAggregate {
    fn from(r: DailyLogRow) -> Self {
        Self {
            date: r.date,
            protein_total: r.protein_total,
            carbs_total: r.carbs_total,
            fats_total: r.fats_total,
            calories_total: r.calories_total,
            water_total: r.water_total.max(0) as u32,
            bloated: r.bloated,
            weight: r.weight,
            sleep_hours: r.sleep_hours,
            check_in_id: r.checked_in_at.map(|_| r.id),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MacroTotalsRow {
    pub protein_total: f64,
    pub carbs_total: f64,
    pub fats_total: f64,
    pub calories_total: f64,
}

impl From<MacroTotalsRow> for MacroTotals {
    fn from(r: MacroTotalsRow) -> Self {
        Self {
            protein_total: r.protein_total,
            carbs_total: r.carbs_total,
            fats_total: r.fats_total,
            calories_total: r.calories_total,
        }
    }
}

/// Row of `inventory_items`.
#[derive(Debug, Clone, FromRow)]
pub struct InventoryItemRow {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub protein_per_unit: f64,
    pub carbs_per_unit: f64,
    pub fat_per_unit: f64,
    pub calories_per_unit: f64,
    pub high_soy: bool,
    pub active: bool,
}

impl From<InventoryItemRow> for InventoryItem {
    fn from(r: InventoryItemRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            icon: r.icon,
            protein_per_unit: r.protein_per_unit,
            carbs_per_unit: r.carbs_per_unit,
            fat_per_unit: r.fat_per_unit,
            calories_per_unit: r.calories_per_unit,
            high_soy: r.high_soy,
            active: r.active,
        }
    }
}

/// `(date, bloated)` pair used by the bloat-pattern rule.
#[derive(Debug, Clone, FromRow)]
pub struct BloatFlagRow {
    pub date: String,
    pub bloated: bool,
}
