//! Chart-ready derivations over aggregated results.
//!
//! These turn pair counts and time series into the domains, stacks and
//! line series a renderer draws from.

use crate::models::{AggregationKey, AttrValue, PairCounts, Record, TimeSeries};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Headroom applied on top of the tallest stacked bar.
pub const BAR_AXIS_HEADROOM: f64 = 1.1;

/// One stacked bar segment spanning `lower..upper`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackSegment {
    pub attr1_value: AttrValue,
    pub attr2_value: AttrValue,
    pub lower: usize,
    pub upper: usize,
}

impl StackSegment {
    pub fn height(&self) -> usize {
        self.upper - self.lower
    }
}

/// One line of a time series chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    /// Comma-joined key, used for legends.
    pub label: String,
    pub key: AggregationKey,
    /// `(month, count)` pairs in chronological order.
    pub points: Vec<(NaiveDate, usize)>,
}

impl Series {
    pub fn total(&self) -> usize {
        self.points.iter().map(|(_, count)| count).sum()
    }
}

/// Distinct values of `attr` in first-seen order.
pub fn distinct_values(records: &[Record], attr: &str) -> Vec<AttrValue> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.get(attr))
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Stack pair counts into bar segments.
///
/// Groups follow the row order of `counts`; within a group, segments stack
/// in `attr2_domain` order. Values absent from the domain are stacked last
/// in row order. Zero-height segments are not emitted.
pub fn stack_segments(counts: &PairCounts, attr2_domain: &[AttrValue]) -> Vec<StackSegment> {
    let mut groups: Vec<(&AttrValue, HashMap<&AttrValue, usize>, Vec<&AttrValue>)> = Vec::new();
    let mut index: HashMap<&AttrValue, usize> = HashMap::new();

    for row in &counts.rows {
        let slot = *index.entry(&row.attr1_value).or_insert_with(|| {
            groups.push((&row.attr1_value, HashMap::new(), Vec::new()));
            groups.len() - 1
        });
        let (_, by_attr2, order) = &mut groups[slot];
        if by_attr2.insert(&row.attr2_value, row.count).is_none() {
            order.push(&row.attr2_value);
        }
    }

    let mut segments = Vec::new();
    for (attr1_value, by_attr2, order) in groups {
        let extras = order.into_iter().filter(|v| !attr2_domain.contains(*v));
        let mut lower = 0;
        for attr2_value in attr2_domain.iter().chain(extras) {
            let count = by_attr2.get(attr2_value).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            segments.push(StackSegment {
                attr1_value: attr1_value.clone(),
                attr2_value: attr2_value.clone(),
                lower,
                upper: lower + count,
            });
            lower += count;
        }
    }

    segments
}

/// Stacked totals per `attr1` value, in row order.
pub fn stacked_totals(counts: &PairCounts) -> Vec<(AttrValue, usize)> {
    let mut totals: Vec<(AttrValue, usize)> = Vec::new();
    let mut index: HashMap<&AttrValue, usize> = HashMap::new();

    for row in &counts.rows {
        match index.get(&row.attr1_value) {
            Some(&slot) => totals[slot].1 += row.count,
            None => {
                index.insert(&row.attr1_value, totals.len());
                totals.push((row.attr1_value.clone(), row.count));
            }
        }
    }

    totals
}

/// Upper bound for the bar value axis, or `None` with no data.
pub fn bar_axis_max(counts: &PairCounts) -> Option<f64> {
    counts
        .scale_max()
        .map(|max| max as f64 * BAR_AXIS_HEADROOM)
}

/// Split a time series into one line per key, in first-seen order.
pub fn group_series(series: &TimeSeries) -> Vec<Series> {
    let mut lines: Vec<Series> = Vec::new();
    let mut index: HashMap<&AggregationKey, usize> = HashMap::new();

    for point in &series.points {
        let slot = match index.get(&point.key) {
            Some(&slot) => slot,
            None => {
                index.insert(&point.key, lines.len());
                lines.push(Series {
                    label: point.key.label(),
                    key: point.key.clone(),
                    points: Vec::new(),
                });
                lines.len() - 1
            }
        };
        lines[slot].points.push((point.month, point.count));
    }

    lines
}

/// First and last month of a time series.
pub fn month_extent(series: &TimeSeries) -> Option<(NaiveDate, NaiveDate)> {
    let first = series.points.iter().map(|p| p.month).min()?;
    let last = series.points.iter().map(|p| p.month).max()?;
    Some((first, last))
}

/// Largest single point count, `0` when empty.
pub fn max_point_count(series: &TimeSeries) -> usize {
    series.points.iter().map(|p| p.count).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate_by_attributes_over_time, aggregate_by_pair_of_attributes};

    fn record(product: &str, adulterant: &str, date: &str) -> Record {
        [
            ("product_name", product),
            ("adulterant", adulterant),
            ("detection_date", date),
        ]
        .into_iter()
        .collect()
    }

    fn records() -> Vec<Record> {
        vec![
            record("milk", "water", "1/5/2021"),
            record("juice", "chalk", "1/9/2021"),
            record("milk", "chalk", "2/1/2021"),
            record("milk", "water", "3/1/2021"),
            record("juice", "chalk", "3/2/2021"),
        ]
    }

    #[test]
    fn test_distinct_values_first_seen() {
        let values = distinct_values(&records(), "adulterant");
        assert_eq!(values, vec![AttrValue::from("water"), AttrValue::from("chalk")]);
    }

    #[test]
    fn test_stack_segments_top_out_at_group_totals() {
        let records = records();
        let counts = aggregate_by_pair_of_attributes(&records, "product_name", "adulterant");
        let domain = distinct_values(&records, "adulterant");

        let segments = stack_segments(&counts, &domain);

        // juice has no water, so that segment is skipped
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].attr1_value, AttrValue::from("milk"));
        assert_eq!((segments[0].lower, segments[0].upper), (0, 2));
        assert_eq!((segments[1].lower, segments[1].upper), (2, 3));
        assert_eq!(segments[2].attr1_value, AttrValue::from("juice"));
        assert_eq!((segments[2].lower, segments[2].upper), (0, 2));

        let tops: usize = segments.iter().map(|s| s.upper).max().unwrap();
        assert_eq!(tops as i64, counts.max_count_by_attr1);
    }

    #[test]
    fn test_stack_segments_outside_domain_go_last() {
        let records = records();
        let counts = aggregate_by_pair_of_attributes(&records, "product_name", "adulterant");

        let segments = stack_segments(&counts, &[AttrValue::from("chalk")]);
        assert_eq!(segments[0].attr2_value, AttrValue::from("chalk"));
        assert_eq!(segments[1].attr2_value, AttrValue::from("water"));
        assert_eq!(segments[1].height(), 2);
    }

    #[test]
    fn test_stacked_totals_and_axis() {
        let counts = aggregate_by_pair_of_attributes(&records(), "product_name", "adulterant");
        let totals = stacked_totals(&counts);

        assert_eq!(
            totals,
            vec![(AttrValue::from("milk"), 3), (AttrValue::from("juice"), 2)]
        );
        let axis = bar_axis_max(&counts).unwrap();
        assert!((axis - 3.3).abs() < 1e-9);

        let empty = aggregate_by_pair_of_attributes(&[], "product_name", "adulterant");
        assert_eq!(bar_axis_max(&empty), None);
    }

    #[test]
    fn test_group_series() {
        let series = aggregate_by_attributes_over_time(&records(), &["product_name"]);
        let lines = group_series(&series);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].label, "milk");
        assert_eq!(lines[0].points.len(), 3);
        assert_eq!(lines[0].total(), 3);
        assert_eq!(lines[1].label, "juice");
        assert!(lines[1].points.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_extent_and_max() {
        let series = aggregate_by_attributes_over_time(&records(), &["adulterant"]);
        let (first, last) = month_extent(&series).unwrap();

        assert_eq!(first, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        assert_eq!(max_point_count(&series), 1);

        let empty = aggregate_by_attributes_over_time(&[], &["adulterant"]);
        assert_eq!(month_extent(&empty), None);
        assert_eq!(max_point_count(&empty), 0);
    }
}
