use std::collections::BTreeSet;

use crate::model::{AssetField, AssetKind};

// East Asian wide ranges that show up in asset records: CJK, kana, hangul,
// fullwidth forms.
fn is_wide(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD)
}

pub fn char_width(ch: char) -> usize {
    if ch.is_control() {
        0
    } else if is_wide(ch) {
        2
    } else {
        1
    }
}

/// Terminal column width of `value`.
pub fn display_width(value: &str) -> usize {
    value.chars().map(char_width).sum()
}

pub fn pad_display(value: &str, width: usize) -> String {
    let mut out = value.to_string();
    let current = display_width(value);
    if current < width {
        out.push_str(&" ".repeat(width - current));
    }
    out
}

pub fn parse_string_set_csv(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn parse_kinds_csv(value: &str) -> Result<BTreeSet<AssetKind>, String> {
    let mut out = BTreeSet::new();
    for part in value.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let kind = AssetKind::parse(item)
            .ok_or_else(|| format!("unknown asset type '{item}', expected building or land"))?;
        out.insert(kind);
    }
    Ok(out)
}

pub fn parse_field(value: &str) -> Result<AssetField, String> {
    AssetField::parse(value).ok_or_else(|| {
        let names: Vec<&str> = AssetField::ALL.iter().map(|f| f.cli_name()).collect();
        format!("unknown field '{}', expected one of {}", value.trim(), names.join(", "))
    })
}

/// Parses `FIELD=VALUE`; the value may itself contain `=`.
pub fn parse_assignment(value: &str) -> Result<(AssetField, String), String> {
    let (field, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{value}'"))?;
    Ok((parse_field(field)?, rest.trim().to_string()))
}
