//! Derived view: search, filter and sort over the record set.
//!
//! [`derived_view`] is a pure function of the records, the [`ViewParams`] and
//! a [`ViewContext`] carrying the evaluation time. It returns borrowed records
//! in display order and never touches the set itself.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::GalleryError;
use crate::models::{ImageRecord, PhotoGalleryConfig};

/// Category filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterBy {
    #[default]
    All,
    Favorites,
    Recent,
    Large,
    Edited,
}

impl FilterBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterBy::All => "all",
            FilterBy::Favorites => "favorites",
            FilterBy::Recent => "recent",
            FilterBy::Large => "large",
            FilterBy::Edited => "edited",
        }
    }
}

impl FromStr for FilterBy {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterBy::All),
            "favorites" => Ok(FilterBy::Favorites),
            "recent" => Ok(FilterBy::Recent),
            "large" => Ok(FilterBy::Large),
            "edited" => Ok(FilterBy::Edited),
            other => Err(GalleryError::Validation(format!("Unknown filter: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Name,
    Size,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Date => "date",
            SortBy::Name => "name",
            SortBy::Size => "size",
        }
    }
}

impl FromStr for SortBy {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(SortBy::Date),
            "name" => Ok(SortBy::Name),
            "size" => Ok(SortBy::Size),
            other => Err(GalleryError::Validation(format!("Unknown sort key: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(GalleryError::Validation(format!("Unknown sort order: {}", other))),
        }
    }
}

/// Grid or list presentation; does not affect the derived sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// A calendar month in UTC, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    /// Long English label, e.g. "March 2025"
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(date) => date.format("%B %Y").to_string(),
            None => self.to_string(),
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GalleryError::Validation(format!("Invalid month: {}", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }
}

/// Parameters of the derived view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewParams {
    pub search_term: String,
    pub filter_by: FilterBy,
    pub month: Option<YearMonth>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// Evaluation context: the time "recent" is measured from and the thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct ViewContext {
    pub now: DateTime<Utc>,
    pub recent_window: Duration,
    pub large_threshold_mb: f64,
}

impl ViewContext {
    pub fn new(now: DateTime<Utc>, config: &PhotoGalleryConfig) -> Self {
        Self {
            now,
            recent_window: Duration::days(config.recent_window_days),
            large_threshold_mb: config.large_threshold_mb,
        }
    }

    pub fn at_now(config: &PhotoGalleryConfig) -> Self {
        Self::new(Utc::now(), config)
    }
}

impl Default for ViewContext {
    fn default() -> Self {
        Self::at_now(&PhotoGalleryConfig::default())
    }
}

fn matches_search(record: &ImageRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record.name.to_lowercase().contains(needle)
        || record
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(needle))
}

fn matches_filter(record: &ImageRecord, filter: FilterBy, ctx: &ViewContext) -> bool {
    match filter {
        FilterBy::All => true,
        FilterBy::Favorites => record.favorite,
        FilterBy::Edited => record.edited,
        FilterBy::Recent => record.created_at > ctx.now - ctx.recent_window,
        FilterBy::Large => record
            .size_mb()
            .map(|mb| mb > ctx.large_threshold_mb)
            .unwrap_or(false),
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare(a: &ImageRecord, b: &ImageRecord, sort_by: SortBy, order: SortOrder) -> Ordering {
    let directed = |ord: Ordering| match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    };
    match sort_by {
        SortBy::Date => directed(a.created_at.cmp(&b.created_at)),
        SortBy::Name => directed(compare_names(&a.name, &b.name)),
        // Unknown sizes go last regardless of direction
        SortBy::Size => match (a.size_mb(), b.size_mb()) {
            (Some(x), Some(y)) => directed(x.total_cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Filters (search, category, month) and sorts `records` for display.
/// The sort is stable, so equal keys keep their set order.
pub fn derived_view<'a>(
    records: &'a [ImageRecord],
    params: &ViewParams,
    ctx: &ViewContext,
) -> Vec<&'a ImageRecord> {
    let needle = params.search_term.trim().to_lowercase();

    let mut view: Vec<&ImageRecord> = records
        .iter()
        .filter(|r| matches_search(r, &needle))
        .filter(|r| matches_filter(r, params.filter_by, ctx))
        .filter(|r| {
            params
                .month
                .map(|m| YearMonth::of(&r.created_at) == m)
                .unwrap_or(true)
        })
        .collect();

    view.sort_by(|a, b| compare(a, b, params.sort_by, params.sort_order));
    view
}

/// A selectable month for the month filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthOption {
    pub value: YearMonth,
    pub label: String,
}

/// Distinct creation months of `records`, newest first
pub fn available_months(records: &[ImageRecord]) -> Vec<MonthOption> {
    let mut months: Vec<YearMonth> = records
        .iter()
        .map(|r| YearMonth::of(&r.created_at))
        .collect();
    months.sort_unstable_by(|a, b| b.cmp(a));
    months.dedup();
    months
        .into_iter()
        .map(|value| MonthOption {
            label: value.label(),
            value,
        })
        .collect()
}
