//! KOI catalog browsing
//!
//! Holds the cumulative KOI table in memory for the explorer: filtering by
//! disposition, name, SNR and period, sorting on any column with missing
//! values last, and pagination.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Dispositions kept when the catalog is loaded
pub const CATALOG_DISPOSITIONS: [&str; 3] = ["CONFIRMED", "FALSE POSITIVE", "CANDIDATE"];

pub const DEFAULT_PER_PAGE: usize = 25;
pub const MAX_PER_PAGE: usize = 500;

/// One catalog row as shown in the explorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub kepoi_name: Option<String>,
    #[serde(default)]
    pub kepid: Option<u64>,
    pub koi_disposition: String,
    #[serde(default)]
    pub koi_period: Option<f64>,
    #[serde(default)]
    pub koi_impact: Option<f64>,
    #[serde(default)]
    pub koi_duration: Option<f64>,
    #[serde(default)]
    pub koi_depth: Option<f64>,
    #[serde(default)]
    pub koi_model_snr: Option<f64>,
    #[serde(default)]
    pub koi_steff: Option<f64>,
    #[serde(default)]
    pub koi_slogg: Option<f64>,
    #[serde(default)]
    pub koi_srad: Option<f64>,
    #[serde(default)]
    pub koi_smass: Option<f64>,
    #[serde(default)]
    pub koi_smet: Option<f64>,
    #[serde(default)]
    pub koi_prad: Option<f64>,
}

type NumericKey = fn(&CatalogEntry) -> Option<f64>;
type TextKey = fn(&CatalogEntry) -> Option<&str>;

enum SortColumn {
    Numeric(NumericKey),
    Text(TextKey),
}

impl SortColumn {
    fn parse(name: &str) -> Option<Self> {
        let numeric: NumericKey = match name {
            "kepid" => |e| e.kepid.map(|id| id as f64),
            "koi_period" => |e| e.koi_period,
            "koi_impact" => |e| e.koi_impact,
            "koi_duration" => |e| e.koi_duration,
            "koi_depth" => |e| e.koi_depth,
            "koi_model_snr" => |e| e.koi_model_snr,
            "koi_steff" => |e| e.koi_steff,
            "koi_slogg" => |e| e.koi_slogg,
            "koi_srad" => |e| e.koi_srad,
            "koi_smass" => |e| e.koi_smass,
            "koi_smet" => |e| e.koi_smet,
            "koi_prad" => |e| e.koi_prad,
            "kepoi_name" => return Some(Self::Text(|e| e.kepoi_name.as_deref())),
            "koi_disposition" => return Some(Self::Text(|e| Some(e.koi_disposition.as_str()))),
            _ => return None,
        };
        Some(Self::Numeric(numeric))
    }

    fn compare(&self, a: &CatalogEntry, b: &CatalogEntry, descending: bool) -> Ordering {
        match self {
            Self::Numeric(key) => missing_last(key(a), key(b), |x, y| x.total_cmp(&y), descending),
            Self::Text(key) => missing_last(key(a), key(b), |x, y| x.cmp(y), descending),
        }
    }
}

/// Present values in the requested direction, missing values always last
fn missing_last<T>(
    a: Option<T>,
    b: Option<T>,
    cmp: impl Fn(T, T) -> Ordering,
    descending: bool,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = cmp(x, y);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Explorer filters, sort and page
#[derive(Debug, Clone, PartialEq)]
pub struct ExploreQuery {
    /// 1-based page number
    pub page: usize,
    pub per_page: usize,
    /// Column to sort by; unknown columns keep catalog order
    pub sort: String,
    pub descending: bool,
    pub disposition: Option<String>,
    /// Case-insensitive substring of the KOI name or Kepler id
    pub search: Option<String>,
    pub min_snr: Option<f64>,
    pub max_period: Option<f64>,
}

impl Default for ExploreQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            sort: "koi_period".to_string(),
            descending: false,
            disposition: None,
            search: None,
            min_snr: None,
            max_period: None,
        }
    }
}

impl ExploreQuery {
    fn matches(&self, entry: &CatalogEntry, search: Option<&str>) -> bool {
        if let Some(disposition) = &self.disposition {
            if &entry.koi_disposition != disposition {
                return false;
            }
        }
        if let Some(needle) = search {
            let in_name = entry
                .kepoi_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(needle));
            let in_id = entry
                .kepid
                .is_some_and(|id| id.to_string().contains(needle));
            if !in_name && !in_id {
                return false;
            }
        }
        // Rows without the filtered value never pass a numeric bound
        if let Some(min) = self.min_snr {
            if !entry.koi_model_snr.is_some_and(|snr| snr >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_period {
            if !entry.koi_period.is_some_and(|period| period <= max) {
                return false;
            }
        }
        true
    }
}

/// One page of filtered catalog rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorePage {
    /// Rows matching the filters, across all pages
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
    pub data: Vec<CatalogEntry>,
    /// Disposition counts over the filtered rows
    pub disposition_counts: BTreeMap<String, usize>,
}

/// In-memory KOI catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let catalog = Self::read(std::fs::File::open(path)?)?;
        info!(path = %path.display(), rows = catalog.len(), "Loaded KOI catalog");
        Ok(catalog)
    }

    pub fn read<R: Read>(source: R) -> PipelineResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (idx, record) in reader.deserialize::<CatalogEntry>().enumerate() {
            let entry = record
                .map_err(|e| PipelineError::Dataset(format!("row {}: {}", idx + 1, e)))?;
            if CATALOG_DISPOSITIONS.contains(&entry.koi_disposition.as_str()) {
                entries.push(entry);
            } else {
                skipped += 1;
            }
        }

        debug!(kept = entries.len(), skipped, "Filtered catalog dispositions");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn explore(&self, query: &ExploreQuery) -> ExplorePage {
        let page = query.page.max(1);
        let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|e| query.matches(e, search.as_deref()))
            .collect();

        if let Some(column) = SortColumn::parse(&query.sort) {
            matched.sort_by(|a, b| column.compare(a, b, query.descending));
        }

        let mut disposition_counts = BTreeMap::new();
        for entry in &matched {
            *disposition_counts
                .entry(entry.koi_disposition.clone())
                .or_insert(0) += 1;
        }

        let total = matched.len();
        let data = matched
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();

        ExplorePage {
            total,
            page,
            per_page,
            pages: total.div_ceil(per_page),
            data,
            disposition_counts,
        }
    }
}
