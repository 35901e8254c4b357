use chrono::{NaiveDate, NaiveDateTime};

/// One node in the two-level category hierarchy. Level 1 entries are boards
/// (板块) and carry no parent; level 2 entries are subcategories nested under
/// exactly one board.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    /// Unique across both levels.
    pub name: String,
    pub level: i64,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
}

impl Category {
    pub fn is_board(&self) -> bool {
        self.level == 1
    }
}

/// One tracked time series from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub id: i64,
    /// Localized display name (经济指标).
    pub name: String,
    /// FRED series code; unique and immutable once assigned.
    pub code: String,
    pub english_name: String,
    pub description: String,
    pub frequency: String,
    pub units: String,
    pub seasonal_adjustment: String,
    /// Provider-reported last-updated timestamp, when it could be fetched.
    pub last_updated: Option<NaiveDateTime>,
    pub category_id: i64,
    pub fred_url: Option<String>,
    pub sort_order: i64,
}

/// One (date, value) sample for an indicator. Unique per (indicator, date).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Series metadata reported by the remote provider. All fields are
/// best-effort: the reconciler degrades gracefully when the lookup fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesMetadata {
    pub description: String,
    pub frequency: String,
    pub units: String,
    pub seasonal_adjustment: String,
    pub last_updated: Option<NaiveDateTime>,
}

/// Reference URL for a FRED series page.
pub fn fred_series_url(code: &str) -> String {
    format!("https://fred.stlouisfed.org/series/{code}")
}
