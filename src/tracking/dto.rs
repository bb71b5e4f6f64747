use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::MacroTotals;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogWaterRequest {
    pub amount_ml: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogWaterResponse {
    pub success: bool,
    pub updated_water_total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogNutritionRequest {
    pub item_id: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogNutritionResponse {
    pub success: bool,
    pub daily_totals: MacroTotals,
}

/// Daily check-in upsert. Absent fields keep their stored values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub weight: Option<f64>,
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub bloated: Option<bool>,
    pub cutoff_hour: u8,
    pub cutoff_minute: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub id: Uuid,
    pub weight: Option<f64>,
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub bloated: bool,
    pub date: String,
}
