// =============================================================================
// Aggregation results
// =============================================================================

/// Ordered mapping from a category key to one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String, // Legend label
    pub categories: Vec<String>,
    pub values: Vec<f64>,
}

/// Two-key sum laid out as one row per `rows` key and one column per `columns` key.
/// Combinations absent from the table hold 0.0.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>, // values[row][col]
}

/// Per-category totals with their share of the grand total (0-100).
#[derive(Debug, Clone, PartialEq)]
pub struct Shares {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub percentages: Vec<f64>,
}

/// Fixed-width histogram. `edges.len() == counts.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bins {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Raw per-record values for a scatter plot
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub size: Vec<f64>,  // Marker area
    pub color: Vec<f64>, // Mapped through a gradient
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Everything a chart can be drawn from
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Series(Series),
    /// Several series over the same categories (grouped bars)
    MultiSeries(Vec<Series>),
    Pivot(Pivot),
    Shares(Shares),
    Bins(Bins),
    Scatter(ScatterPoints),
}

impl ChartData {
    pub fn variant_name(&self) -> &'static str {
        match self {
            ChartData::Series(_) => "series",
            ChartData::MultiSeries(_) => "multi-series",
            ChartData::Pivot(_) => "pivot",
            ChartData::Shares(_) => "shares",
            ChartData::Bins(_) => "bins",
            ChartData::Scatter(_) => "scatter",
        }
    }
}
