//! Dashboard view state and rendering.
//!
//! A `ViewState` names the scene and chart kind to show. UI events
//! produce a new state through [`ViewState::apply`], and [`render`] turns a
//! state plus the records into chart-ready data without touching either.

use crate::analysis::{
    aggregate_by_attributes_over_time_with, aggregate_by_pair_of_attributes, bar_axis_max,
    distinct_values, group_series, max_point_count, month_extent, stack_segments, DateSpec,
    Series, StackSegment,
};
use crate::models::{AttrValue, PairCounts, Record, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pair of incident attributes shown together.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Scene {
    /// Product vs adulterant
    #[default]
    ProductAdulterant,
    /// Adulterant vs health risk
    AdulterantHealthRisk,
    /// Adulterant vs severity
    AdulterantSeverity,
    /// Severity vs action taken
    SeverityActionTaken,
}

impl Scene {
    pub const ALL: [Scene; 4] = [
        Scene::ProductAdulterant,
        Scene::AdulterantHealthRisk,
        Scene::AdulterantSeverity,
        Scene::SeverityActionTaken,
    ];

    /// The `(first, second)` attribute names for this scene.
    pub fn attributes(&self) -> (&'static str, &'static str) {
        match self {
            Scene::ProductAdulterant => ("product_name", "adulterant"),
            Scene::AdulterantHealthRisk => ("adulterant", "health_risk"),
            Scene::AdulterantSeverity => ("adulterant", "severity"),
            Scene::SeverityActionTaken => ("severity", "action_taken"),
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Scene::ProductAdulterant => "product-adulterant",
            Scene::AdulterantHealthRisk => "adulterant-health-risk",
            Scene::AdulterantSeverity => "adulterant-severity",
            Scene::SeverityActionTaken => "severity-action-taken",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Scene::ProductAdulterant => "Relationship between product and adulterant.",
            Scene::AdulterantHealthRisk => "Relationship between adulterant and health risk.",
            Scene::AdulterantSeverity => "Relationship between adulterant and severity.",
            Scene::SeverityActionTaken => "Relationship between severity and action taken.",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scene::ProductAdulterant => {
                "Chicken and juice have a higher number of adulterants than other products. \
                 Butter is the least contaminated food. See the adulterant vs health risk \
                 scene for the health risk associated with each adulterant."
            }
            Scene::AdulterantHealthRisk => {
                "Coloring agents and chalk have a slightly higher health risk than other \
                 adulterants. See the adulterant vs severity scene for the severity count \
                 of each adulterant."
            }
            Scene::AdulterantSeverity => {
                "The distribution of adulterant vs severity seems to be relatively balanced. \
                 However, sweeteners seem to have a higher proportion of \"severe\" severity. \
                 See the severity vs action taken scene for the actions taken."
            }
            Scene::SeverityActionTaken => {
                "Surprisingly, even a minor severity resulted in a similar number of product \
                 recalls as moderate and severe."
            }
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// How a scene is charted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Stacked bar chart of pair counts
    #[default]
    Bar,
    /// Monthly line chart
    Timeseries,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::Bar => write!(f, "bar"),
            ChartKind::Timeseries => write!(f, "timeseries"),
        }
    }
}

/// What the dashboard currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewState {
    pub scene: Scene,
    pub chart: ChartKind,
}

/// A user action on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    SelectScene(Scene),
    SelectChart(ChartKind),
}

impl ViewState {
    /// Returns the state that follows `event`.
    pub fn apply(self, event: ViewEvent) -> Self {
        match event {
            ViewEvent::SelectScene(scene) => Self { scene, ..self },
            ViewEvent::SelectChart(chart) => Self { chart, ..self },
        }
    }
}

/// Chart-ready data for a stacked bar chart.
#[derive(Debug, Clone, Serialize)]
pub struct BarChart {
    pub scene: Scene,
    pub counts: PairCounts,
    /// Band axis domain: distinct first-attribute values.
    pub attr1_domain: Vec<AttrValue>,
    /// Stack and legend domain: distinct second-attribute values.
    pub attr2_domain: Vec<AttrValue>,
    pub segments: Vec<StackSegment>,
    /// Value axis upper bound, `None` when there is no data.
    pub axis_max: Option<f64>,
}

/// Chart-ready data for a monthly line chart.
#[derive(Debug, Clone, Serialize)]
pub struct LineChart {
    pub scene: Scene,
    pub series: TimeSeries,
    pub lines: Vec<Series>,
    pub extent: Option<(NaiveDate, NaiveDate)>,
    pub max_count: usize,
}

/// A rendered view.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "chart", rename_all = "lowercase")]
pub enum ChartView {
    Bar(BarChart),
    Timeseries(LineChart),
}

impl ChartView {
    pub fn scene(&self) -> Scene {
        match self {
            ChartView::Bar(chart) => chart.scene,
            ChartView::Timeseries(chart) => chart.scene,
        }
    }

    pub fn kind(&self) -> ChartKind {
        match self {
            ChartView::Bar(_) => ChartKind::Bar,
            ChartView::Timeseries(_) => ChartKind::Timeseries,
        }
    }

    /// True when the view has nothing to draw.
    pub fn is_empty(&self) -> bool {
        match self {
            ChartView::Bar(chart) => chart.counts.is_empty(),
            ChartView::Timeseries(chart) => chart.series.is_empty(),
        }
    }
}

/// Compute the chart data for `state`.
pub fn render(state: ViewState, records: &[Record], dates: &DateSpec) -> ChartView {
    let (attr1, attr2) = state.scene.attributes();

    match state.chart {
        ChartKind::Bar => {
            let counts = aggregate_by_pair_of_attributes(records, attr1, attr2);
            let attr2_domain = distinct_values(records, attr2);
            let segments = stack_segments(&counts, &attr2_domain);
            let axis_max = bar_axis_max(&counts);

            ChartView::Bar(BarChart {
                scene: state.scene,
                attr1_domain: distinct_values(records, attr1),
                attr2_domain,
                segments,
                axis_max,
                counts,
            })
        }
        ChartKind::Timeseries => {
            let series = aggregate_by_attributes_over_time_with(records, &[attr1, attr2], dates);

            ChartView::Timeseries(LineChart {
                scene: state.scene,
                lines: group_series(&series),
                extent: month_extent(&series),
                max_count: max_point_count(&series),
                series,
            })
        }
    }
}
