use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

pub const BUILDING_MARKER: &str = "建物";
pub const LAND_MARKER: &str = "土地";

/// One idle asset listing as served by the remote API.
///
/// The API keys its records by the localized column labels; unknown keys are
/// kept in `extra` so an update sends back everything it received.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Asset {
    #[serde(
        deserialize_with = "lenient_text",
        skip_serializing_if = "String::is_empty"
    )]
    pub id: String,
    #[serde(rename = "資產類型", deserialize_with = "lenient_text")]
    pub asset_type: String,
    #[serde(rename = "管理機關", deserialize_with = "lenient_text")]
    pub management_agency: String,
    #[serde(rename = "行政區", deserialize_with = "lenient_text")]
    pub administrative_district: String,
    #[serde(rename = "地段", deserialize_with = "lenient_text")]
    pub section: String,
    #[serde(rename = "地址", deserialize_with = "lenient_text")]
    pub address: String,
    #[serde(rename = "標的名稱", deserialize_with = "lenient_text")]
    pub target_name: String,
    #[serde(rename = "建立時間", deserialize_with = "lenient_text")]
    pub created_at: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// Null reads as an empty cell and numbers as their JSON text.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a text value, got {other}"
        ))),
    }
}

impl Asset {
    /// String form of every field value, in the order the record is laid out.
    /// Null extras carry no text and are skipped.
    pub fn field_texts(&self) -> impl Iterator<Item = Cow<'_, str>> {
        let fixed = std::iter::once(Cow::Borrowed(self.id.as_str())).chain(
            AssetField::ALL
                .into_iter()
                .map(move |field| Cow::Borrowed(field.value(self))),
        );
        let extra = self.extra.values().filter_map(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        });
        fixed.chain(extra)
    }

    /// Substring match on the type marker, so a mixed record counts as both kinds.
    pub fn is_kind(&self, kind: AssetKind) -> bool {
        self.asset_type.contains(kind.marker())
    }

    /// The date part of `created_at`, as shown in the table.
    pub fn created_date(&self) -> &str {
        self.created_at
            .split('T')
            .next()
            .unwrap_or(self.created_at.as_str())
    }
}

/// The seven displayed columns, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetField {
    Type,
    Agency,
    District,
    Section,
    Address,
    Name,
    Created,
}

// (field, localized label, cli name)
static FIELD_TABLE: [(AssetField, &str, &str); 7] = [
    (AssetField::Type, "資產類型", "type"),
    (AssetField::Agency, "管理機關", "agency"),
    (AssetField::District, "行政區", "district"),
    (AssetField::Section, "地段", "section"),
    (AssetField::Address, "地址", "address"),
    (AssetField::Name, "標的名稱", "name"),
    (AssetField::Created, "建立時間", "created"),
];

impl AssetField {
    pub const ALL: [AssetField; 7] = [
        AssetField::Type,
        AssetField::Agency,
        AssetField::District,
        AssetField::Section,
        AssetField::Address,
        AssetField::Name,
        AssetField::Created,
    ];

    fn entry(self) -> &'static (AssetField, &'static str, &'static str) {
        &FIELD_TABLE[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.entry().1
    }

    pub fn cli_name(self) -> &'static str {
        self.entry().2
    }

    /// Accepts either the cli name (case-insensitive) or the localized label.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let lower = trimmed.to_lowercase();
        FIELD_TABLE
            .iter()
            .find(|(_, label, name)| *label == trimmed || *name == lower)
            .map(|(field, _, _)| *field)
    }

    pub fn value(self, asset: &Asset) -> &str {
        match self {
            AssetField::Type => &asset.asset_type,
            AssetField::Agency => &asset.management_agency,
            AssetField::District => &asset.administrative_district,
            AssetField::Section => &asset.section,
            AssetField::Address => &asset.address,
            AssetField::Name => &asset.target_name,
            AssetField::Created => &asset.created_at,
        }
    }

    pub fn set_value(self, asset: &mut Asset, value: String) {
        let slot = match self {
            AssetField::Type => &mut asset.asset_type,
            AssetField::Agency => &mut asset.management_agency,
            AssetField::District => &mut asset.administrative_district,
            AssetField::Section => &mut asset.section,
            AssetField::Address => &mut asset.address,
            AssetField::Name => &mut asset.target_name,
            AssetField::Created => &mut asset.created_at,
        };
        *slot = value;
    }
}

impl fmt::Display for AssetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

/// Asset classification used by the type filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Building,
    Land,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::Building, AssetKind::Land];

    pub fn marker(self) -> &'static str {
        match self {
            AssetKind::Building => BUILDING_MARKER,
            AssetKind::Land => LAND_MARKER,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "building" | "buildings" | BUILDING_MARKER => Some(Self::Building),
            "land" | LAND_MARKER => Some(Self::Land),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Building => "building",
            AssetKind::Land => "land",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
