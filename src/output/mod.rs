pub mod report;

use colored::Colorize;
use serde::Serialize;

use crate::filter::FilterCriteria;
use crate::model::{Asset, AssetField};
use crate::sort::{sort_indicator, SortConfig};
use crate::utils::{char_width, display_width, pad_display};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

const MAX_CELL_WIDTH: usize = 28;

fn cell_text(asset: &Asset, field: AssetField) -> String {
    let raw = match field {
        AssetField::Created => asset.created_date(),
        other => other.value(asset),
    };
    truncate_display(raw, MAX_CELL_WIDTH)
}

fn truncate_display(value: &str, max: usize) -> String {
    if display_width(value) <= max {
        return value.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in value.chars() {
        let w = char_width(ch);
        if width + w + 1 > max {
            break;
        }
        out.push(ch);
        width += w;
    }
    out.push('…');
    out
}

/// Plain-text asset table with the sort glyph on the active header.
pub fn render_table(assets: &[Asset], sort: &SortConfig) -> String {
    let headers: Vec<String> = std::iter::once("id".to_string())
        .chain(
            AssetField::ALL
                .iter()
                .map(|f| format!("{}{}", f.label(), sort_indicator(sort, *f))),
        )
        .collect();
    let rows: Vec<Vec<String>> = assets
        .iter()
        .map(|a| {
            std::iter::once(a.id.clone())
                .chain(AssetField::ALL.iter().map(|f| cell_text(a, *f)))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows.iter() {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let mut out = String::new();
    let header_line = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad_display(h, widths[i]))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(&header_line.bold().to_string());
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, c)| pad_display(c, widths[i]))
            .collect::<Vec<_>>()
            .join(" | ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn format_selection<T: ToString>(include: bool, values: impl IntoIterator<Item = T>) -> String {
    let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
    let mode = if include { "include" } else { "exclude" };
    if values.is_empty() {
        format!("{mode} (none selected)")
    } else {
        format!("{mode} {}", values.join(", "))
    }
}

/// One line per filter dimension, the way the filter summary panel reads.
pub fn render_filter_summary(criteria: &FilterCriteria) -> String {
    let mut out = String::new();
    if !criteria.search_text.is_empty() {
        out.push_str(&format!(":: {:<10}: \"{}\"\n", "search", criteria.search_text));
    }
    out.push_str(&format!(
        ":: {:<10}: {}\n",
        AssetField::Type.label(),
        format_selection(criteria.type_include, criteria.selected_types.iter())
    ));
    out.push_str(&format!(
        ":: {:<10}: {}\n",
        AssetField::Agency.label(),
        format_selection(criteria.agency_include, criteria.selected_agencies.iter())
    ));
    out.push_str(&format!(
        ":: {:<10}: {}\n",
        AssetField::District.label(),
        format_selection(criteria.district_include, criteria.selected_districts.iter())
    ));
    out
}

/// Selectable values for the agency and district filters.
pub fn render_facets(agencies: &[String], districts: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        ":: {:<10}: {}\n",
        AssetField::Agency.label(),
        agencies.join(", ")
    ));
    out.push_str(&format!(
        ":: {:<10}: {}\n",
        AssetField::District.label(),
        districts.join(", ")
    ));
    out
}

pub fn render_detail(asset: &Asset) -> String {
    let mut lines: Vec<(String, String)> = vec![("id".to_string(), asset.id.clone())];
    for field in AssetField::ALL {
        lines.push((field.label().to_string(), field.value(asset).to_string()));
    }
    for (key, value) in asset.extra.iter() {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        lines.push((key.clone(), text));
    }
    let width = lines
        .iter()
        .map(|(k, _)| display_width(k))
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for (key, value) in lines {
        out.push_str(&format!("{} : {}\n", pad_display(&key, width).bold(), value));
    }
    out
}

#[derive(Serialize)]
struct JsonListing<'a> {
    total: usize,
    shown: usize,
    criteria: &'a FilterCriteria,
    sort: &'a SortConfig,
    assets: &'a [Asset],
}

pub fn render_json(
    total: usize,
    assets: &[Asset],
    criteria: &FilterCriteria,
    sort: &SortConfig,
) -> Vec<u8> {
    let listing = JsonListing {
        total,
        shown: assets.len(),
        criteria,
        sort,
        assets,
    };
    serde_json::to_vec_pretty(&listing).unwrap_or_else(|_| b"[]\n".to_vec())
}

pub fn render_html(assets: &[Asset], sort: &SortConfig) -> Vec<u8> {
    report::render_html(assets, sort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDirection;

    fn sample() -> Asset {
        Asset {
            id: "7".to_string(),
            asset_type: "土地".to_string(),
            management_agency: "Parks Dept".to_string(),
            administrative_district: "Da-an".to_string(),
            section: "S1".to_string(),
            address: "1 Park Ave".to_string(),
            target_name: "Lot 7".to_string(),
            created_at: "2023-06-01T08:00:00Z".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn table_shows_date_only_and_sort_glyph() {
        colored::control::set_override(false);
        let sort = SortConfig::new(AssetField::Created, SortDirection::Desc);
        let table = render_table(&[sample()], &sort);
        assert!(table.contains("建立時間▼"));
        assert!(table.contains("2023-06-01"));
        assert!(!table.contains("08:00:00"));
    }

    #[test]
    fn summary_mentions_exclusions() {
        let mut criteria = FilterCriteria {
            district_include: false,
            ..Default::default()
        };
        criteria.toggle_district("Da-an");
        let summary = render_filter_summary(&criteria);
        assert!(summary.contains("exclude Da-an"));
        assert!(summary.contains("include building, land"));
    }

    #[test]
    fn long_cells_are_truncated() {
        let long = "x".repeat(60);
        let cut = truncate_display(&long, 10);
        assert_eq!(display_width(&cut), 10);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn json_listing_carries_counts() {
        let assets = vec![sample()];
        let raw = render_json(3, &assets, &FilterCriteria::default(), &SortConfig::default());
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["shown"], 1);
        assert_eq!(value["assets"][0]["標的名稱"], "Lot 7");
    }

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(infer_format_from_path("out.HTML"), Some(OutputFormat::Html));
        assert_eq!(infer_format_from_path("out.json"), Some(OutputFormat::Json));
        assert_eq!(infer_format_from_path("out"), None);
    }
}
