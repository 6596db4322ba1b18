//! Markdown report generation.
//!
//! This module writes the rendered dashboard views as Markdown tables,
//! or as JSON for an external chart renderer.

use crate::analysis::stacked_totals;
use crate::config::ReportConfig;
use crate::models::{DashboardReport, ReportMetadata};
use crate::view::{BarChart, ChartView, LineChart};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &DashboardReport, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Food Safety Incident Dashboard\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));

    if report.views.len() > 1 {
        output.push_str(&generate_table_of_contents(&report.views));
    }

    for view in &report.views {
        output.push_str(&generate_view_section(view, options));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Records Loaded:** {}\n",
        metadata.records_loaded
    ));
    if metadata.records_undated > 0 {
        section.push_str(&format!(
            "- **Records Without a Valid Date:** {}\n",
            metadata.records_undated
        ));
    }
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn view_heading(view: &ChartView) -> String {
    format!("{} ({})", view.scene().title(), view.kind())
}

/// GitHub-style heading anchor: lowercase, punctuation dropped, spaces to `-`.
fn heading_anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Generate the table of contents.
fn generate_table_of_contents(views: &[ChartView]) -> String {
    let mut toc = String::new();

    toc.push_str("## Contents\n\n");
    for view in views {
        let heading = view_heading(view);
        toc.push_str(&format!("- [{}](#{})\n", heading, heading_anchor(&heading)));
    }
    toc.push('\n');

    toc
}

/// Generate the section for one view.
fn generate_view_section(view: &ChartView, options: &ReportConfig) -> String {
    let mut section = String::new();
    let scene = view.scene();

    section.push_str(&format!("## {}\n\n", view_heading(view)));
    section.push_str(&format!("*{}*\n\n", scene.description()));

    match view {
        ChartView::Bar(chart) => section.push_str(&generate_bar_section(chart, options)),
        ChartView::Timeseries(chart) => {
            section.push_str(&generate_timeseries_section(chart, options))
        }
    }

    section
}

/// Generate the tables for a stacked bar chart.
fn generate_bar_section(chart: &BarChart, options: &ReportConfig) -> String {
    let mut section = String::new();
    let counts = &chart.counts;

    section.push_str("### Counts\n\n");

    if counts.is_empty() {
        section.push_str(&format!(
            "No data to chart (max stacked count: {}).\n\n",
            counts.max_count_by_attr1
        ));
        return section;
    }

    section.push_str(&format!("| {} | {} | Count |\n", counts.attr1, counts.attr2));
    section.push_str("|:---|:---|:---:|\n");
    for row in &counts.rows {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            row.attr1_value, row.attr2_value, row.count
        ));
    }
    section.push('\n');

    section.push_str(&format!("### Totals by {}\n\n", counts.attr1));
    section.push_str(&format!("| {} | Total |\n", counts.attr1));
    section.push_str("|:---|:---:|\n");
    for (value, total) in stacked_totals(counts) {
        section.push_str(&format!("| {} | {} |\n", value, total));
    }
    section.push('\n');

    section.push_str(&format!("- **Incidents:** {}\n", counts.total()));
    section.push_str(&format!(
        "- **Max stacked count:** {}\n",
        counts.max_count_by_attr1
    ));
    if let Some(axis_max) = chart.axis_max {
        section.push_str(&format!("- **Value axis:** 0 to {:.1}\n", axis_max));
    }
    section.push_str(&format!(
        "- **Legend ({}):** {}\n\n",
        counts.attr2,
        chart
            .attr2_domain
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    ));

    if options.include_segments && !chart.segments.is_empty() {
        section.push_str("<details>\n<summary>Stacked segments</summary>\n\n");
        section.push_str(&format!(
            "| {} | {} | From | To | Height |\n",
            counts.attr1, counts.attr2
        ));
        section.push_str("|:---|:---|:---:|:---:|:---:|\n");
        for segment in &chart.segments {
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                segment.attr1_value,
                segment.attr2_value,
                segment.lower,
                segment.upper,
                segment.height()
            ));
        }
        section.push_str("\n</details>\n\n");
    }

    section
}

/// Generate the tables for a monthly line chart.
fn generate_timeseries_section(chart: &LineChart, options: &ReportConfig) -> String {
    let mut section = String::new();
    let series = &chart.series;

    section.push_str("### Monthly Counts\n\n");

    if series.is_empty() {
        section.push_str("No dated records to chart.\n\n");
        return section;
    }

    let mut header = String::from("| Month |");
    let mut align = String::from("|:---|");
    for name in &series.attr_names {
        header.push_str(&format!(" {} |", name));
        align.push_str(":---|");
    }
    header.push_str(" Count |\n");
    align.push_str(":---:|\n");
    section.push_str(&header);
    section.push_str(&align);

    for point in &series.points {
        let mut line = format!("| {} |", point.month_label());
        for (_, value) in point.values() {
            line.push_str(&format!(" {} |", value));
        }
        line.push_str(&format!(" {} |\n", point.count));
        section.push_str(&line);
    }
    section.push('\n');

    if let Some((first, last)) = chart.extent {
        section.push_str(&format!(
            "- **Range:** {} to {}\n",
            first.format("%Y-%m"),
            last.format("%Y-%m")
        ));
    }
    section.push_str(&format!("- **Dated incidents:** {}\n", series.total()));
    section.push_str(&format!("- **Max monthly count:** {}\n", chart.max_count));
    if series.skipped > 0 {
        section.push_str(&format!(
            "- **Skipped (unparseable date):** {}\n",
            series.skipped
        ));
    }
    section.push('\n');

    if options.include_series && !chart.lines.is_empty() {
        section.push_str("### Series\n\n");
        section.push_str("| Series | Months | Total |\n");
        section.push_str("|:---|:---:|:---:|\n");
        for line in &chart.lines {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                line.label,
                line.points.len(),
                line.total()
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by foodwatch v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
