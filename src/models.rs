//! Data models for the incident dashboard.
//!
//! This module contains the record type read from the incident dataset
//! and the chart-ready structures the aggregator produces from it.

use crate::view::ChartView;
use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Sentinel for `PairCounts::max_count_by_attr1` when there is no data.
pub const NO_DATA: i64 = -1;

/// Default name of the date column in the incident dataset.
pub const DETECTION_DATE: &str = "detection_date";

/// The value of one attribute of a record.
///
/// A record lacking the attribute groups under `Missing` instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "Option<String>")]
pub enum AttrValue {
    /// The field exists; the value is kept verbatim.
    Present(String),
    /// The field is absent from the record.
    Missing,
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Present(s) => write!(f, "{}", s),
            AttrValue::Missing => write!(f, "(missing)"),
        }
    }
}

impl From<Option<String>> for AttrValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => AttrValue::Present(s),
            None => AttrValue::Missing,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Present(s.to_string())
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttrValue::Present(s) => serializer.serialize_str(s),
            AttrValue::Missing => serializer.serialize_none(),
        }
    }
}

/// One incident report: a flat mapping from column name to cell value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    /// Creates a record from a field map.
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    /// Returns the value of `name`, or `AttrValue::Missing`.
    pub fn get(&self, name: &str) -> AttrValue {
        match self.fields.get(name) {
            Some(value) => AttrValue::Present(value.clone()),
            None => AttrValue::Missing,
        }
    }

    /// Returns the raw string value of `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Builds the aggregation key over `names`, in order.
    pub fn key(&self, names: &[String]) -> AggregationKey {
        AggregationKey(names.iter().map(|name| self.get(name)).collect())
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// An ordered tuple of attribute values identifying a group.
///
/// Hashed and compared as a tuple, so values containing `,` stay intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregationKey(pub Vec<AttrValue>);

impl AggregationKey {
    /// Human-readable label: the values joined with `,`.
    ///
    /// Display only; never parsed back.
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One row of pair aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRow {
    /// Value of the first attribute.
    pub attr1_value: AttrValue,
    /// Value of the second attribute.
    pub attr2_value: AttrValue,
    /// Number of records with exactly this pair.
    pub count: usize,
}

/// Result of aggregating records by a pair of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounts {
    /// Name of the first (grouping) attribute.
    pub attr1: String,
    /// Name of the second (stacking) attribute.
    pub attr2: String,
    /// Rows in group-iteration order.
    pub rows: Vec<CountRow>,
    /// Largest stacked total over all `attr1` values, or `NO_DATA`.
    pub max_count_by_attr1: i64,
}

impl PairCounts {
    /// The stacked axis bound, or `None` when there is nothing to scale.
    pub fn scale_max(&self) -> Option<usize> {
        if self.max_count_by_attr1 > 0 {
            Some(self.max_count_by_attr1 as usize)
        } else {
            None
        }
    }

    /// Sum of all row counts.
    pub fn total(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One point of a monthly time series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesPoint {
    /// First day of the month bucket.
    pub month: NaiveDate,
    /// Number of records in this month with this key.
    pub count: usize,
    /// Attribute values, aligned with `TimeSeries::attr_names`.
    pub key: AggregationKey,
    attr_names: Vec<String>,
}

impl TimeSeriesPoint {
    pub fn new(month: NaiveDate, count: usize, key: AggregationKey, attr_names: Vec<String>) -> Self {
        Self {
            month,
            count,
            key,
            attr_names,
        }
    }

    /// Month label in `YYYY-MM` form.
    pub fn month_label(&self) -> String {
        self.month.format("%Y-%m").to_string()
    }

    /// Returns the value of the named attribute.
    #[allow(dead_code)] // Lookup for renderers keyed by attribute name
    pub fn value(&self, name: &str) -> Option<&AttrValue> {
        self.attr_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.key.0.get(i))
    }

    /// Returns `(name, value)` pairs in attribute order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attr_names
            .iter()
            .map(String::as_str)
            .zip(self.key.0.iter())
    }
}

/// Point fields that attribute keys must not shadow.
const POINT_FIELDS: [&str; 2] = ["month", "count"];

/// JSON key for an attribute; names clashing with a point field get an `attr.` prefix.
fn attribute_key(name: &str) -> Cow<'_, str> {
    if POINT_FIELDS.contains(&name) {
        Cow::Owned(format!("attr.{}", name))
    } else {
        Cow::Borrowed(name)
    }
}

// Flat shape: {"month": "2021-01", "count": 2, "<attr>": "<value>", ...}
impl Serialize for TimeSeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.attr_names.len()))?;
        map.serialize_entry("month", &self.month_label())?;
        map.serialize_entry("count", &self.count)?;
        for (name, value) in self.values() {
            map.serialize_entry(&attribute_key(name), value)?;
        }
        map.end()
    }
}

/// Result of aggregating records by month and a list of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeries {
    /// Attribute names the points are keyed on.
    pub attr_names: Vec<String>,
    /// Points sorted ascending by month.
    pub points: Vec<TimeSeriesPoint>,
    /// Records excluded because their date did not parse.
    pub skipped: usize,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of all point counts.
    pub fn total(&self) -> usize {
        self.points.iter().map(|p| p.count).sum()
    }
}

/// Metadata about a dashboard report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Where the dataset was loaded from.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of records loaded.
    pub records_loaded: usize,
    /// Records whose detection date did not parse.
    pub records_undated: usize,
    /// Wall time spent loading and aggregating, in seconds.
    pub duration_seconds: f64,
}

/// The rendered dashboard: every requested view over one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub views: Vec<ChartView>,
}

impl DashboardReport {
    /// True if any view has nothing to draw.
    pub fn has_empty_view(&self) -> bool {
        self.views.iter().any(ChartView::is_empty)
    }
}
