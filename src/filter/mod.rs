use std::collections::BTreeSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{Asset, AssetKind};

/// Include/exclude switches and selections driving the asset table.
///
/// `*_include == false` turns the matching selection into a deny-list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterCriteria {
    pub search_text: String,
    pub type_include: bool,
    pub selected_types: BTreeSet<AssetKind>,
    pub agency_include: bool,
    pub selected_agencies: BTreeSet<String>,
    pub district_include: bool,
    pub selected_districts: BTreeSet<String>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            type_include: true,
            selected_types: AssetKind::ALL.into_iter().collect(),
            agency_include: true,
            selected_agencies: BTreeSet::new(),
            district_include: true,
            selected_districts: BTreeSet::new(),
        }
    }
}

fn toggle_in<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if set.contains(&value) {
        set.remove(&value);
    } else {
        set.insert(value);
    }
}

impl FilterCriteria {
    pub fn toggle_type(&mut self, kind: AssetKind) {
        toggle_in(&mut self.selected_types, kind);
    }

    pub fn toggle_agency(&mut self, agency: &str) {
        toggle_in(&mut self.selected_agencies, agency.to_string());
    }

    pub fn toggle_district(&mut self, district: &str) {
        toggle_in(&mut self.selected_districts, district.to_string());
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        self.text_matches(asset)
            && self.type_matches(asset)
            && self.agency_matches(asset)
            && self.district_matches(asset)
    }

    fn text_matches(&self, asset: &Asset) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        let needle = self.search_text.to_lowercase();
        asset
            .field_texts()
            .any(|text| text.to_lowercase().contains(&needle))
    }

    fn type_matches(&self, asset: &Asset) -> bool {
        let matches = self.selected_types.iter().any(|kind| asset.is_kind(*kind));
        matches == self.type_include
    }

    // An empty selection constrains nothing, so it matches every asset.
    fn agency_matches(&self, asset: &Asset) -> bool {
        let matches = self.selected_agencies.is_empty()
            || self.selected_agencies.contains(&asset.management_agency);
        matches == self.agency_include
    }

    fn district_matches(&self, asset: &Asset) -> bool {
        let matches = self.selected_districts.is_empty()
            || self
                .selected_districts
                .contains(&asset.administrative_district);
        matches == self.district_include
    }
}

/// Returns the assets passing every predicate of `criteria`, in input order.
pub fn filter_assets(assets: &[Asset], criteria: &FilterCriteria) -> Vec<Asset> {
    assets
        .iter()
        .filter(|asset| criteria.matches(asset))
        .cloned()
        .collect()
}

/// Distinct management agencies, first-seen order.
pub fn unique_agencies(assets: &[Asset]) -> Vec<String> {
    assets
        .iter()
        .map(|a| a.management_agency.clone())
        .unique()
        .collect()
}

/// Distinct administrative districts, first-seen order.
pub fn unique_districts(assets: &[Asset]) -> Vec<String> {
    assets
        .iter()
        .map(|a| a.administrative_district.clone())
        .unique()
        .collect()
}
