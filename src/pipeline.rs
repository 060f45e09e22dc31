//! The report pipeline: group → aggregate → sort → render → save, driven by
//! one [`ChartSpec`] per chart.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{Dimension, Measure, Table};
use crate::graph::{self, AreaStyle, BarStyle, ChartKind, Labels, LineStyle, PointStyle};
use crate::ir::{ChartData, Series, SortOrder};
use crate::transform;
use crate::{OutputFormat, RenderOptions};

/// Reduction applied per group
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Sum,
    Mean,
    /// Sum per group, then a running total in sorted order
    CumulativeSum,
    /// Sum per group as a percentage of the grand total
    Share,
    /// Fixed-width histogram over one measure
    Bins(usize),
    /// No reduction: one point per record from `[x, y, size, color]` measures
    Scatter { size_divisor: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortPolicy {
    /// Key-ascending, as grouped
    None,
    ByValue(SortOrder),
    ByKey,
}

/// The aggregation half of a chart definition
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub group_by: Vec<Dimension>,
    pub measures: Vec<Measure>,
    pub aggregation: Aggregation,
    pub sort: SortPolicy,
}

impl Query {
    /// Run the aggregation. Pure: the table is only read.
    pub fn evaluate(&self, table: &Table) -> Result<ChartData> {
        match (self.aggregation, self.group_by.as_slice(), self.measures.as_slice()) {
            (Aggregation::Sum, [dim], [measure]) => {
                let series = transform::group_sum(table, *dim, *measure)?;
                Ok(ChartData::Series(self.sorted(series)))
            }
            (Aggregation::Sum, [rows, cols], [measure]) => {
                Ok(ChartData::Pivot(transform::pivot_sum(table, *rows, *cols, *measure)?))
            }
            (Aggregation::Mean, [dim], [measure]) => {
                let series = transform::group_mean(table, *dim, *measure)?;
                Ok(ChartData::Series(self.sorted(series)))
            }
            (Aggregation::Mean, [dim], measures) if !measures.is_empty() => {
                let series = transform::group_means(table, *dim, measures)?;
                Ok(ChartData::MultiSeries(series.into_iter().map(|s| self.sorted(s)).collect()))
            }
            (Aggregation::CumulativeSum, [dim], [measure]) => {
                let series = transform::group_sum(table, *dim, *measure)?;
                Ok(ChartData::Series(self.sorted(series).cumulative()))
            }
            (Aggregation::Share, [dim], [measure]) => {
                Ok(ChartData::Shares(transform::shares(table, *dim, *measure)?))
            }
            (Aggregation::Bins(bins), [], [measure]) => {
                Ok(ChartData::Bins(transform::histogram(table, *measure, bins)?))
            }
            (Aggregation::Scatter { size_divisor }, [], [x, y, size, color]) => Ok(ChartData::Scatter(
                transform::scatter(table, *x, *y, *size, *color, size_divisor)?,
            )),
            (aggregation, dims, measures) => bail!(
                "Unsupported query: {:?} over {} grouping key(s) and {} measure(s)",
                aggregation,
                dims.len(),
                measures.len()
            ),
        }
    }

    fn sorted(&self, series: Series) -> Series {
        match self.sort {
            SortPolicy::None => series,
            SortPolicy::ByValue(order) => series.sort_by_value(order),
            SortPolicy::ByKey => series.sort_by_key(),
        }
    }
}

/// One chart of the report
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    /// Output file stem
    pub name: String,
    pub labels: Labels,
    pub query: Query,
    pub kind: ChartKind,
    /// Canvas size in pixels
    pub size: (u32, u32),
}

/// Where the report reads from and writes to
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("car_sales.csv"),
            out_dir: PathBuf::from("."),
            format: OutputFormat::Png,
        }
    }
}

impl ReportConfig {
    pub fn output_path(&self, spec: &ChartSpec) -> PathBuf {
        self.out_dir.join(format!("{}.{}", spec.name, self.format.extension()))
    }
}

fn labels(title: &str, x: Option<&str>, y: Option<&str>) -> Labels {
    Labels {
        title: title.to_string(),
        x: x.map(str::to_string),
        y: y.map(str::to_string),
    }
}

fn color(name: &str) -> Option<String> {
    Some(name.to_string())
}

/// The nine charts of the car sales report, in output order
pub fn report_charts() -> Vec<ChartSpec> {
    vec![
        ChartSpec {
            name: "units_sold_by_continent_bar_chart".to_string(),
            labels: labels("Total Units Sold by Continent", Some("Continent"), Some("Total Units Sold")),
            query: Query {
                group_by: vec![Dimension::Continent],
                measures: vec![Measure::UnitsSold],
                aggregation: Aggregation::Sum,
                sort: SortPolicy::ByValue(SortOrder::Descending),
            },
            kind: ChartKind::Bar(BarStyle {
                color: color("skyblue"),
                ..BarStyle::default()
            }),
            size: (1000, 600),
        },
        ChartSpec {
            name: "revenue_by_brand_pie_chart".to_string(),
            labels: labels("Percentage of Revenue by Brand", None, None),
            query: Query {
                group_by: vec![Dimension::Brand],
                measures: vec![Measure::Revenue],
                aggregation: Aggregation::Share,
                sort: SortPolicy::None,
            },
            kind: ChartKind::Pie { start_angle: 90.0 },
            size: (800, 800),
        },
        ChartSpec {
            name: "units_sold_vs_unit_price_scatter_plot".to_string(),
            labels: labels(
                "Units Sold vs. Unit Price (Point Size by Revenue, Color by Discount)",
                Some("Unit Price"),
                Some("Units Sold"),
            ),
            query: Query {
                group_by: vec![],
                measures: vec![Measure::UnitPrice, Measure::UnitsSold, Measure::Revenue, Measure::Discount],
                aggregation: Aggregation::Scatter { size_divisor: 50.0 },
                sort: SortPolicy::None,
            },
            kind: ChartKind::Scatter {
                colorbar_label: "Discount".to_string(),
            },
            size: (1000, 600),
        },
        ChartSpec {
            name: "avg_revenue_by_sales_channel_line_chart".to_string(),
            labels: labels("Average Revenue by Sales Channel", Some("Sales Channel"), Some("Average Revenue")),
            query: Query {
                group_by: vec![Dimension::SalesChannel],
                measures: vec![Measure::Revenue],
                aggregation: Aggregation::Mean,
                sort: SortPolicy::ByKey,
            },
            kind: ChartKind::Line {
                line: LineStyle { color: color("green") },
                markers: Some(PointStyle {
                    color: color("green"),
                    size: Some(5.0),
                }),
                grid: true,
            },
            size: (1000, 600),
        },
        ChartSpec {
            name: "revenue_distribution_histogram".to_string(),
            labels: labels("Distribution of Revenue", Some("Revenue"), Some("Frequency")),
            query: Query {
                group_by: vec![],
                measures: vec![Measure::Revenue],
                aggregation: Aggregation::Bins(5),
                sort: SortPolicy::None,
            },
            kind: ChartKind::Histogram(BarStyle {
                color: color("coral"),
                edge_color: color("black"),
                ..BarStyle::default()
            }),
            size: (1000, 600),
        },
        ChartSpec {
            name: "units_sold_by_continent_and_channel_stacked_bar_chart".to_string(),
            labels: labels(
                "Units Sold by Continent and Sales Channel",
                Some("Continent"),
                Some("Total Units Sold"),
            ),
            query: Query {
                group_by: vec![Dimension::Continent, Dimension::SalesChannel],
                measures: vec![Measure::UnitsSold],
                aggregation: Aggregation::Sum,
                sort: SortPolicy::None,
            },
            kind: ChartKind::StackedBar {
                legend_title: Some("Sales Channel".to_string()),
            },
            size: (1000, 600),
        },
        ChartSpec {
            name: "total_discount_by_brand_horizontal_bar_chart".to_string(),
            labels: labels("Total Discount by Brand", Some("Total Discount"), Some("Brand")),
            query: Query {
                group_by: vec![Dimension::Brand],
                measures: vec![Measure::Discount],
                aggregation: Aggregation::Sum,
                sort: SortPolicy::ByValue(SortOrder::Ascending),
            },
            kind: ChartKind::HorizontalBar(BarStyle {
                color: color("purple"),
                ..BarStyle::default()
            }),
            size: (1000, 600),
        },
        ChartSpec {
            name: "cumulative_revenue_area_chart".to_string(),
            labels: labels("Cumulative Revenue by Continent", Some("Continent"), Some("Cumulative Revenue")),
            query: Query {
                group_by: vec![Dimension::Continent],
                measures: vec![Measure::Revenue],
                aggregation: Aggregation::CumulativeSum,
                sort: SortPolicy::ByKey,
            },
            kind: ChartKind::Area {
                style: AreaStyle {
                    color: color("teal"),
                    alpha: Some(0.5),
                },
                grid: true,
            },
            size: (1000, 600),
        },
        ChartSpec {
            name: "avg_units_sold_and_revenue_by_sales_channel_grouped_bar_chart".to_string(),
            labels: labels(
                "Average Units Sold and Revenue by Sales Channel",
                Some("Sales Channel"),
                Some("Value"),
            ),
            query: Query {
                group_by: vec![Dimension::SalesChannel],
                measures: vec![Measure::UnitsSold, Measure::Revenue],
                aggregation: Aggregation::Mean,
                sort: SortPolicy::None,
            },
            kind: ChartKind::GroupedBar {
                series: vec![
                    BarStyle {
                        color: color("skyblue"),
                        width: Some(0.35),
                        label: Some("Average Units Sold".to_string()),
                        ..BarStyle::default()
                    },
                    BarStyle {
                        color: color("coral"),
                        width: Some(0.35),
                        label: Some("Average Revenue".to_string()),
                        ..BarStyle::default()
                    },
                ],
            },
            size: (1200, 700),
        },
    ]
}

/// Aggregate, render and save one chart. Returns the written path.
pub fn run_chart(table: &Table, spec: &ChartSpec, config: &ReportConfig) -> Result<PathBuf> {
    let data = spec
        .query
        .evaluate(table)
        .with_context(|| format!("Failed to aggregate data for '{}'", spec.name))?;
    log::debug!("{}: {:?}", spec.name, data);

    let options = RenderOptions {
        width: spec.size.0,
        height: spec.size.1,
        format: config.format,
    };
    let bytes = graph::render(&data, &spec.kind, &spec.labels, &options)
        .with_context(|| format!("Failed to render '{}'", spec.name))?;

    let path = config.output_path(spec);
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Saved {} chart to {}", spec.kind.name(), path.display());

    Ok(path)
}

/// Run every report chart in order. The first failure aborts the run; files
/// already written are left in place.
pub fn generate_report(table: &Table, config: &ReportConfig) -> Result<Vec<PathBuf>> {
    ensure_dir(&config.out_dir)?;

    let charts = report_charts();
    let mut written = Vec::with_capacity(charts.len());
    for spec in &charts {
        written.push(run_chart(table, spec, config)?);
    }
    Ok(written)
}

/// Load the input named by `config` and generate the full report
pub fn run(config: &ReportConfig) -> Result<Vec<PathBuf>> {
    let table = Table::load(&config.input)
        .with_context(|| format!("Failed to load {}", config.input.display()))?;
    log::info!("Loaded {} records from {}", table.len(), config.input.display());

    generate_report(&table, config)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}
