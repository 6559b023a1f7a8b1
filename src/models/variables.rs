use serde::Serialize;
use serde_json::Value;

use super::{bool_field, float_field, int_field, string_field};

/// The single shared device control record, mirrored from `Variables`.
///
/// Wire names match the device firmware, including the long-standing
/// "PotionSize" misspelling, which is load-bearing on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceVariables {
    /// True while a feed cycle is in progress.
    #[serde(rename = "FeedNow")]
    pub feed_now: bool,
    /// Remaining food as a fraction in [0, 1].
    #[serde(rename = "MainFoodLevel")]
    pub main_food_level: f64,
    /// Portion size, 1 (small) to 3 (large).
    #[serde(rename = "PotionSize")]
    pub portion_size: i64,
    #[serde(rename = "IntruderAlert")]
    pub intruder_alert: bool,
    /// Free-text label of the next scheduled feed, written by the device.
    #[serde(rename = "NextFeeding")]
    pub next_feeding: String,
}

impl Default for DeviceVariables {
    fn default() -> Self {
        Self {
            feed_now: false,
            main_food_level: 0.0,
            portion_size: 1,
            intruder_alert: false,
            next_feeding: String::new(),
        }
    }
}

impl DeviceVariables {
    /// Decodes the remote record, defaulting each field independently.
    pub fn from_value(value: &Value) -> Self {
        Self {
            feed_now: bool_field(value, "FeedNow"),
            main_food_level: float_field(value, "MainFoodLevel"),
            portion_size: match int_field(value, "PotionSize") {
                0 => 1,
                size => size,
            },
            intruder_alert: bool_field(value, "IntruderAlert"),
            next_feeding: string_field(value, "NextFeeding"),
        }
    }
}
