use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::model::{Asset, AssetField};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SortConfig {
    pub key: Option<AssetField>,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: AssetField, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }

    /// Header click: the active ascending column flips to descending,
    /// anything else becomes ascending on `key`.
    pub fn toggle(self, key: AssetField) -> Self {
        let direction = if self.key == Some(key) && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Self {
            key: Some(key),
            direction,
        }
    }
}

/// Epoch milliseconds of a creation timestamp.
///
/// Offsetless date-times are read as UTC and bare dates as midnight UTC.
pub fn parse_timestamp_millis(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

// Unparseable timestamps compare as `None`, ahead of every real date.
fn compare_by(field: AssetField, a: &Asset, b: &Asset) -> Ordering {
    match field {
        AssetField::Created => {
            parse_timestamp_millis(&a.created_at).cmp(&parse_timestamp_millis(&b.created_at))
        }
        other => other.value(a).cmp(other.value(b)),
    }
}

/// Returns a stably sorted copy of `assets`; an unset key keeps input order.
pub fn sort_assets(assets: &[Asset], config: &SortConfig) -> Vec<Asset> {
    let mut out = assets.to_vec();
    let Some(field) = config.key else {
        return out;
    };
    out.sort_by(|a, b| {
        let ord = compare_by(field, a, b);
        match config.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    out
}

/// Glyph shown next to a column header.
pub fn sort_indicator(config: &SortConfig, field: AssetField) -> &'static str {
    match (config.key, config.direction) {
        (Some(key), SortDirection::Asc) if key == field => "▲",
        (Some(key), SortDirection::Desc) if key == field => "▼",
        _ => " ",
    }
}
