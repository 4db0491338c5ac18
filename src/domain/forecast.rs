use serde::{Deserialize, Serialize};

/// Latest generation/consumption estimate from the prediction source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "pv_power", default)]
    pub generation_w: f64,
    #[serde(rename = "consumption", default)]
    pub consumption_w: f64,
    #[serde(rename = "battery_soc", default = "default_soc_hint")]
    pub soc_hint_percent: f64,
}

fn default_soc_hint() -> f64 {
    70.0
}
