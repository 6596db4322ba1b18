//! Incident aggregation.
//!
//! This module groups and counts incident records by one pair of
//! attributes, or by month crossed with a list of attributes, and
//! provides the date order used to keep records and series chronological.

use crate::models::{
    AggregationKey, AttrValue, CountRow, PairCounts, Record, TimeSeries, TimeSeriesPoint,
    DETECTION_DATE, NO_DATA,
};
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Default pattern of the date column, e.g. `3/14/2020`.
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Where to find a record's date and how to parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSpec {
    /// Column holding the date.
    pub field: String,
    /// chrono format string for the column.
    pub format: String,
}

impl Default for DateSpec {
    fn default() -> Self {
        Self {
            field: DETECTION_DATE.to_string(),
            format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl DateSpec {
    /// Parse the date of a record, if it has one.
    pub fn date_of(&self, record: &Record) -> Option<NaiveDate> {
        record
            .field(&self.field)
            .and_then(|value| parse_date(value, &self.format))
    }
}

/// Parse a date string with the given chrono format.
///
/// Surrounding whitespace is ignored; anything else that doesn't match
/// yields `None`.
pub fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), format).ok()
}

/// Truncate a date to the first day of its month.
pub fn month_bucket(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Anything that can be ordered on a calendar date.
pub trait Dated {
    /// The date of this value, or `None` if it has none.
    fn date(&self) -> Option<NaiveDate>;
}

impl Dated for Record {
    fn date(&self) -> Option<NaiveDate> {
        DateSpec::default().date_of(self)
    }
}

impl Dated for TimeSeriesPoint {
    fn date(&self) -> Option<NaiveDate> {
        Some(self.month)
    }
}

/// Total order on parsed dates. Undated values sort after dated ones.
pub fn compare_by_date<T: Dated>(a: &T, b: &T) -> Ordering {
    date_order(a.date(), b.date())
}

fn date_order(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by date.
pub fn sort_by_date<T: Dated>(items: &mut [T]) {
    items.sort_by(compare_by_date);
}

/// Stable sort of records on the date described by `spec`.
pub fn sort_records_by_date(records: &mut [Record], spec: &DateSpec) {
    // Each date is parsed once; `None` keys land after every dated record.
    records.sort_by_cached_key(|record| {
        let date = spec.date_of(record);
        (date.is_none(), date)
    });
}

/// Per-`attr1` accumulator preserving first-seen order of `attr2` values.
struct PairGroup {
    value: AttrValue,
    counts: Vec<(AttrValue, usize)>,
    index: HashMap<AttrValue, usize>,
}

impl PairGroup {
    fn new(value: AttrValue) -> Self {
        Self {
            value,
            counts: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn add(&mut self, value: AttrValue) {
        match self.index.get(&value) {
            Some(&slot) => self.counts[slot].1 += 1,
            None => {
                self.index.insert(value.clone(), self.counts.len());
                self.counts.push((value, 1));
            }
        }
    }
}

/// Count records grouped by `attr1`, then by `attr2`.
///
/// Rows come out in first-seen order of `attr1`, then first-seen order of
/// `attr2` within it. `max_count_by_attr1` is the largest per-`attr1`
/// total (the stacked bar height), or `NO_DATA` for empty input.
pub fn aggregate_by_pair_of_attributes(records: &[Record], attr1: &str, attr2: &str) -> PairCounts {
    let mut groups: Vec<PairGroup> = Vec::new();
    let mut index: HashMap<AttrValue, usize> = HashMap::new();

    for record in records {
        let value = record.get(attr1);
        let slot = match index.get(&value) {
            Some(&slot) => slot,
            None => {
                index.insert(value.clone(), groups.len());
                groups.push(PairGroup::new(value));
                groups.len() - 1
            }
        };
        groups[slot].add(record.get(attr2));
    }

    let mut max_count_by_attr1 = NO_DATA;
    let mut rows = Vec::new();

    for group in groups {
        let mut running: i64 = 0;
        for (attr2_value, count) in group.counts {
            running += count as i64;
            max_count_by_attr1 = max_count_by_attr1.max(running);
            rows.push(CountRow {
                attr1_value: group.value.clone(),
                attr2_value,
                count,
            });
        }
    }

    debug!(
        "Aggregated {} records by ({}, {}) into {} rows, max stacked count {}",
        records.len(),
        attr1,
        attr2,
        rows.len(),
        max_count_by_attr1
    );

    PairCounts {
        attr1: attr1.to_string(),
        attr2: attr2.to_string(),
        rows,
        max_count_by_attr1,
    }
}

/// Count records per month of `detection_date` and per key over `attr_names`.
#[allow(dead_code)] // Entry point for callers using the default date column
pub fn aggregate_by_attributes_over_time<S: AsRef<str>>(
    records: &[Record],
    attr_names: &[S],
) -> TimeSeries {
    aggregate_by_attributes_over_time_with(records, attr_names, &DateSpec::default())
}

/// Like [`aggregate_by_attributes_over_time`], reading dates per `spec`.
///
/// Records whose date does not parse are left out and counted in
/// `TimeSeries::skipped`. Points are sorted ascending by month; points in
/// the same month keep their first-seen order.
pub fn aggregate_by_attributes_over_time_with<S: AsRef<str>>(
    records: &[Record],
    attr_names: &[S],
    spec: &DateSpec,
) -> TimeSeries {
    let names: Vec<String> = attr_names.iter().map(|n| n.as_ref().to_string()).collect();

    let mut buckets: Vec<(NaiveDate, AggregationKey, usize)> = Vec::new();
    let mut index: HashMap<(NaiveDate, AggregationKey), usize> = HashMap::new();
    let mut skipped = 0;

    for record in records {
        let Some(date) = spec.date_of(record) else {
            skipped += 1;
            continue;
        };

        let bucket = (month_bucket(date), record.key(&names));
        match index.get(&bucket) {
            Some(&slot) => buckets[slot].2 += 1,
            None => {
                index.insert(bucket.clone(), buckets.len());
                buckets.push((bucket.0, bucket.1, 1));
            }
        }
    }

    if skipped > 0 {
        debug!(
            "Skipped {} records with unparseable {} values",
            skipped, spec.field
        );
    }

    let mut points: Vec<TimeSeriesPoint> = buckets
        .into_iter()
        .map(|(month, key, count)| TimeSeriesPoint::new(month, count, key, names.clone()))
        .collect();
    sort_by_date(&mut points);

    debug!(
        "Aggregated {} records by month and {:?} into {} points",
        records.len() - skipped,
        names,
        points.len()
    );

    TimeSeries {
        attr_names: names,
        points,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn record(product: &str, adulterant: &str, date: &str) -> Record {
        [
            ("product_name", product),
            ("adulterant", adulterant),
            ("detection_date", date),
        ]
        .into_iter()
        .collect()
    }

    fn milk_records() -> Vec<Record> {
        vec![
            record("milk", "water", "1/5/2021"),
            record("milk", "water", "1/20/2021"),
            record("milk", "chalk", "2/1/2021"),
        ]
    }

    fn mixed_records() -> Vec<Record> {
        vec![
            record("juice", "sweetener", "5/2/2020"),
            record("milk", "water", "1/5/2021"),
            record("chicken", "dye", "3/3/2020"),
            record("juice", "water", "5/9/2020"),
            record("milk", "chalk", "2/1/2021"),
            record("juice", "sweetener", "6/1/2020"),
            record("chicken", "dye", "3/30/2020"),
        ]
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_pair_aggregation_scenario() {
        let counts = aggregate_by_pair_of_attributes(&milk_records(), "product_name", "adulterant");

        assert_eq!(counts.rows.len(), 2);
        assert_eq!(counts.rows[0].attr1_value, AttrValue::from("milk"));
        assert_eq!(counts.rows[0].attr2_value, AttrValue::from("water"));
        assert_eq!(counts.rows[0].count, 2);
        assert_eq!(counts.rows[1].attr2_value, AttrValue::from("chalk"));
        assert_eq!(counts.rows[1].count, 1);
        assert_eq!(counts.max_count_by_attr1, 3);
    }

    #[test]
    fn test_time_aggregation_scenario() {
        let series =
            aggregate_by_attributes_over_time(&milk_records(), &["product_name", "adulterant"]);

        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].month, ymd(2021, 1, 1));
        assert_eq!(series.points[0].key.label(), "milk,water");
        assert_eq!(series.points[0].count, 2);
        assert_eq!(series.points[1].month, ymd(2021, 2, 1));
        assert_eq!(series.points[1].key.label(), "milk,chalk");
        assert_eq!(series.points[1].count, 1);
        assert_eq!(series.skipped, 0);
    }

    #[test]
    fn test_empty_input() {
        let counts = aggregate_by_pair_of_attributes(&[], "x", "y");
        assert!(counts.rows.is_empty());
        assert_eq!(counts.max_count_by_attr1, NO_DATA);

        let series = aggregate_by_attributes_over_time(&[], &["x"]);
        assert!(series.points.is_empty());
    }

    #[test]
    fn test_pair_counts_conserve_records_and_keys_are_unique() {
        let records = mixed_records();
        let counts = aggregate_by_pair_of_attributes(&records, "product_name", "adulterant");

        assert_eq!(counts.total(), records.len());

        let keys: HashSet<_> = counts
            .rows
            .iter()
            .map(|r| (r.attr1_value.clone(), r.attr2_value.clone()))
            .collect();
        assert_eq!(keys.len(), counts.rows.len());
    }

    #[test]
    fn test_max_is_stacked_total_not_single_count() {
        let records = mixed_records();
        let counts = aggregate_by_pair_of_attributes(&records, "product_name", "adulterant");

        // juice: sweetener 2 + water 1; chicken: dye 2; milk: 1 + 1
        assert_eq!(counts.max_count_by_attr1, 3);
        assert!(counts.rows.iter().all(|r| r.count <= 2));
    }

    #[test]
    fn test_pair_rows_follow_first_seen_order() {
        let counts =
            aggregate_by_pair_of_attributes(&mixed_records(), "product_name", "adulterant");

        let order: Vec<String> = counts
            .rows
            .iter()
            .map(|r| format!("{}/{}", r.attr1_value, r.attr2_value))
            .collect();
        assert_eq!(
            order,
            vec![
                "juice/sweetener",
                "juice/water",
                "milk/water",
                "milk/chalk",
                "chicken/dye"
            ]
        );
    }

    #[test]
    fn test_missing_attribute_forms_its_own_group() {
        let mut records = milk_records();
        records.push(
            [("product_name", "milk"), ("detection_date", "2/3/2021")]
                .into_iter()
                .collect(),
        );

        let counts = aggregate_by_pair_of_attributes(&records, "product_name", "adulterant");
        let missing = counts
            .rows
            .iter()
            .find(|r| r.attr2_value == AttrValue::Missing)
            .unwrap();
        assert_eq!(missing.count, 1);
        assert_eq!(counts.max_count_by_attr1, 4);

        let series = aggregate_by_attributes_over_time(&records, &["product_name", "adulterant"]);
        let labels: Vec<_> = series
            .points
            .iter()
            .map(|p| (p.month_label(), p.key.label(), p.count))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("2021-01".to_string(), "milk,water".to_string(), 2),
                ("2021-02".to_string(), "milk,chalk".to_string(), 1),
                ("2021-02".to_string(), "milk,(missing)".to_string(), 1),
            ]
        );
        assert_eq!(series.points[2].value("adulterant"), Some(&AttrValue::Missing));
    }

    #[test]
    fn test_time_series_is_chronological() {
        let series =
            aggregate_by_attributes_over_time(&mixed_records(), &["product_name", "adulterant"]);

        assert!(series
            .points
            .windows(2)
            .all(|w| w[0].month <= w[1].month));
        assert_eq!(series.total(), 7);

        // chicken/dye twice in March 2020 collapses to one point
        assert_eq!(series.points[0].month, ymd(2020, 3, 1));
        assert_eq!(series.points[0].count, 2);
    }

    #[test]
    fn test_same_month_points_keep_grouping_order() {
        let records = vec![
            record("juice", "water", "5/9/2020"),
            record("milk", "chalk", "5/1/2020"),
            record("butter", "dye", "4/1/2020"),
        ];
        let series = aggregate_by_attributes_over_time(&records, &["product_name"]);

        let labels: Vec<String> = series.points.iter().map(|p| p.key.label()).collect();
        assert_eq!(labels, vec!["butter", "juice", "milk"]);
    }

    #[test]
    fn test_values_with_commas_survive() {
        let records = vec![
            record("milk, skimmed", "water", "1/5/2021"),
            record("milk, skimmed", "water", "1/6/2021"),
        ];
        let series = aggregate_by_attributes_over_time(&records, &["product_name", "adulterant"]);

        assert_eq!(series.points.len(), 1);
        let point = &series.points[0];
        assert_eq!(
            point.value("product_name"),
            Some(&AttrValue::from("milk, skimmed"))
        );
        assert_eq!(point.value("adulterant"), Some(&AttrValue::from("water")));
    }

    #[test]
    fn test_unparseable_dates_are_skipped() {
        let mut records = milk_records();
        records.push(record("milk", "water", "not a date"));
        records.push(record("milk", "water", "2021-01-05"));

        let series = aggregate_by_attributes_over_time(&records, &["product_name", "adulterant"]);
        assert_eq!(series.skipped, 2);
        assert_eq!(series.total(), 3);
    }

    #[test]
    fn test_no_attributes_groups_by_month_only() {
        let no_attrs: [&str; 0] = [];
        let series = aggregate_by_attributes_over_time(&milk_records(), &no_attrs);

        let counts: Vec<_> = series
            .points
            .iter()
            .map(|p| (p.month_label(), p.count))
            .collect();
        assert_eq!(
            counts,
            vec![("2021-01".to_string(), 2), ("2021-02".to_string(), 1)]
        );
    }

    #[test]
    fn test_custom_date_spec() {
        let records: Vec<Record> = vec![
            [("seen", "2021-03-04"), ("severity", "minor")]
                .into_iter()
                .collect(),
            [("seen", "2021-03-28"), ("severity", "minor")]
                .into_iter()
                .collect(),
        ];
        let spec = DateSpec {
            field: "seen".to_string(),
            format: "%Y-%m-%d".to_string(),
        };

        let series = aggregate_by_attributes_over_time_with(&records, &["severity"], &spec);
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].count, 2);
        assert_eq!(series.points[0].month_label(), "2021-03");
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let records = mixed_records();
        let a = aggregate_by_pair_of_attributes(&records, "adulterant", "product_name");
        let b = aggregate_by_pair_of_attributes(&records, "adulterant", "product_name");
        assert_eq!(a, b);

        let a = aggregate_by_attributes_over_time(&records, &["adulterant"]);
        let b = aggregate_by_attributes_over_time(&records, &["adulterant"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_date_accepts_unpadded_fields() {
        assert_eq!(parse_date("3/14/2020", DEFAULT_DATE_FORMAT), Some(ymd(2020, 3, 14)));
        assert_eq!(parse_date(" 03/04/2020 ", DEFAULT_DATE_FORMAT), Some(ymd(2020, 3, 4)));
        assert_eq!(parse_date("13/01/2020", DEFAULT_DATE_FORMAT), None);
        assert_eq!(month_bucket(ymd(2020, 3, 14)), ymd(2020, 3, 1));
    }

    #[test]
    fn test_sort_records_by_date_is_chronological_not_lexicographic() {
        let mut records = vec![
            record("a", "x", "12/1/2020"),
            record("b", "x", "bad"),
            record("c", "x", "2/1/2021"),
            record("d", "x", "9/15/2020"),
        ];
        sort_records_by_date(&mut records, &DateSpec::default());

        let order: Vec<_> = records
            .iter()
            .map(|r| r.field("product_name").unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn test_compare_by_date() {
        let a = record("a", "x", "1/2/2020");
        let b = record("b", "x", "1/10/2020");
        let bad = record("c", "x", "");

        assert_eq!(compare_by_date(&a, &b), Ordering::Less);
        assert_eq!(compare_by_date(&b, &a), Ordering::Greater);
        assert_eq!(compare_by_date(&a, &a), Ordering::Equal);
        assert_eq!(compare_by_date(&bad, &a), Ordering::Greater);
        assert_eq!(compare_by_date(&bad, &bad), Ordering::Equal);
    }
}
