use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro totals for one day, as computed by the server from logged entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroTotals {
    pub protein_total: f64,
    pub carbs_total: f64,
    pub fats_total: f64,
    pub calories_total: f64,
}

/// One user's nutrition/hydration figures for one day key.
///
/// Totals are never user input: they are either an optimistic estimate or a
/// value computed by the server from the day's entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: String,
    pub protein_total: f64,
    pub carbs_total: f64,
    pub fats_total: f64,
    pub calories_total: f64,
    pub water_total: u32,
    #[serde(default)]
    pub bloated: bool,
    pub weight: Option<f64>,
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub check_in_id: Option<Uuid>,
}

impl DailyAggregate {
    /// All-zero baseline for a day that has not been created yet.
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            protein_total: 0.0,
            carbs_total: 0.0,
            fats_total: 0.0,
            calories_total: 0.0,
            water_total: 0,
            bloated: false,
            weight: None,
            sleep_hours: None,
            check_in_id: None,
        }
    }

    pub fn macros(&self) -> MacroTotals {
        MacroTotals {
            protein_total: self.protein_total,
            carbs_total: self.carbs_total,
            fats_total: self.fats_total,
            calories_total: self.calories_total,
        }
    }

    pub fn with_macros(mut self, totals: MacroTotals) -> Self {
        self.protein_total = totals.protein_total;
        self.carbs_total = totals.carbs_total;
        self.fats_total = totals.fats_total;
        self.calories_total = totals.calories_total;
        self
    }
}

/// Catalog entry with macro values per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub protein_per_unit: f64,
    pub carbs_per_unit: f64,
    pub fat_per_unit: f64,
    pub calories_per_unit: f64,
    #[serde(default)]
    pub high_soy: bool,
    pub active: bool,
}

impl InventoryItem {
    /// Macro contribution of `quantity` units of this item.
    pub fn macros_for(&self, quantity: f64) -> MacroTotals {
        MacroTotals {
            protein_total: self.protein_per_unit * quantity,
            carbs_total: self.carbs_per_unit * quantity,
            fats_total: self.fat_per_unit * quantity,
            calories_total: self.calories_per_unit * quantity,
        }
    }

    pub fn has_valid_macros(&self) -> bool {
        [
            self.protein_per_unit,
            self.carbs_per_unit,
            self.fat_per_unit,
            self.calories_per_unit,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Problem with a logged quantity, if any.
pub fn quantity_error(quantity: f64) -> Option<String> {
    if quantity.is_finite() && quantity > 0.0 {
        None
    } else {
        Some(format!("quantity must be positive, got {quantity}"))
    }
}

/// Largest single water entry accepted, in millilitres.
pub const MAX_WATER_ML: u32 = 10_000;

/// Problem with a water amount, if any.
pub fn water_amount_error(amount_ml: u32) -> Option<String> {
    match amount_ml {
        0 => Some("water amount must be positive".to_string()),
        n if n > MAX_WATER_ML => Some(format!(
            "water amount must be at most {MAX_WATER_ML} ml, got {n}"
        )),
        _ => None,
    }
}

/// Problem with check-in values, if any.
pub fn check_in_error(weight: Option<f64>, sleep_hours: Option<f64>) -> Option<String> {
    if let Some(w) = weight {
        if !(w.is_finite() && w > 0.0) {
            return Some(format!("weight must be positive, got {w}"));
        }
    }
    if let Some(h) = sleep_hours {
        if !(h.is_finite() && (0.0..=24.0).contains(&h)) {
            return Some(format!("sleep hours must be within 0..=24, got {h}"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chicken() -> InventoryItem {
        InventoryItem {
            id: "chicken".into(),
            name: "Chicken breast".into(),
            icon: None,
            protein_per_unit: 24.0,
            carbs_per_unit: 0.0,
            fat_per_unit: 3.0,
            calories_per_unit: 130.0,
            high_soy: false,
            active: true,
        }
    }

    #[test]
    fn water_amount_bounds() {
        assert!(water_amount_error(0).is_some());
        assert!(water_amount_error(250).is_none());
        assert!(water_amount_error(MAX_WATER_ML).is_none());
        assert!(water_amount_error(MAX_WATER_ML + 1).is_some());
        assert!(water_amount_error(u32::MAX).is_some());
    }

    #[test]
    fn macros_scale_with_quantity() {
        let m = chicken().macros_for(2.0);
        assert_eq!(m.protein_total, 48.0);
        assert_eq!(m.fats_total, 6.0);
        assert_eq!(m.calories_total, 260.0);
    }

    #[test]
    fn negative_or_nan_macros_are_invalid() {
        let mut item = chicken();
        assert!(item.has_valid_macros());
        item.carbs_per_unit = -1.0;
        assert!(!item.has_valid_macros());
        item.carbs_per_unit = f64::NAN;
        assert!(!item.has_valid_macros());
    }

    #[test]
    fn aggregate_uses_camel_case_on_the_wire() {
        let json = serde_json::to_string(&DailyAggregate::empty("2026-10-16")).unwrap();
        assert!(json.contains("\"proteinTotal\":0.0"));
        assert!(json.contains("\"waterTotal\":0"));
        assert!(json.contains("\"sleepHours\":null"));
    }
}
