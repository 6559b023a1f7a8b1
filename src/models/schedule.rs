use serde::Serialize;
use serde_json::Value;

use super::{bool_field, int_field};

/// One feeding-time rule.
///
/// Serializes with the wire field names used by the remote tree
/// (`Schedules/<id>`). Decoding goes through [`Schedule::from_value`], which
/// defaults every missing or mistyped field instead of rejecting the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub id: i64,
    #[serde(rename = "enable")]
    pub enabled: bool,
    #[serde(rename = "timeHour")]
    pub time_hour: i64,
    #[serde(rename = "timeMinute")]
    pub time_minute: i64,
    pub mon: bool,
    pub tue: bool,
    pub wed: bool,
    pub thu: bool,
    pub fri: bool,
    pub sat: bool,
    pub sun: bool,
}

impl Schedule {
    /// Creates an enabled rule at the given time with no days selected.
    ///
    /// The id is a placeholder; the schedule store assigns the real one on
    /// add.
    pub fn new(time_hour: i64, time_minute: i64) -> Self {
        Self {
            id: 0,
            enabled: true,
            time_hour,
            time_minute,
            mon: false,
            tue: false,
            wed: false,
            thu: false,
            fri: false,
            sat: false,
            sun: false,
        }
    }

    /// Decodes a remote record, defaulting each field independently
    /// (booleans to false, integers to 0).
    pub fn from_value(value: &Value) -> Self {
        Self {
            id: int_field(value, "id"),
            enabled: bool_field(value, "enable"),
            time_hour: int_field(value, "timeHour"),
            time_minute: int_field(value, "timeMinute"),
            mon: bool_field(value, "mon"),
            tue: bool_field(value, "tue"),
            wed: bool_field(value, "wed"),
            thu: bool_field(value, "thu"),
            fri: bool_field(value, "fri"),
            sat: bool_field(value, "sat"),
            sun: bool_field(value, "sun"),
        }
    }

    /// Day flags in week order, Monday first.
    pub fn days(&self) -> [bool; 7] {
        [
            self.mon, self.tue, self.wed, self.thu, self.fri, self.sat, self.sun,
        ]
    }

    /// Sets a day flag by week index (0 = Monday).
    pub fn set_day(&mut self, index: usize, on: bool) {
        match index {
            0 => self.mon = on,
            1 => self.tue = on,
            2 => self.wed = on,
            3 => self.thu = on,
            4 => self.fri = on,
            5 => self.sat = on,
            6 => self.sun = on,
            _ => {}
        }
    }

    /// "HH:MM" display form.
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.time_hour, self.time_minute)
    }

    /// Comma-separated selected days, or "never" when none are set.
    pub fn days_summary(&self) -> String {
        const NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        let selected: Vec<&str> = self
            .days()
            .iter()
            .zip(NAMES)
            .filter(|(on, _)| **on)
            .map(|(_, name)| name)
            .collect();
        if selected.is_empty() {
            "never".to_string()
        } else {
            selected.join(",")
        }
    }
}
