use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use crate::data::{Dimension, Measure, Table};
use crate::ir::{Bins, Pivot, ScatterPoints, Series, Shares, SortOrder};

/// Group measure values by category. Keys come back in ascending order.
fn group_values(table: &Table, dim: Dimension, measure: Measure) -> Result<BTreeMap<String, Vec<f64>>> {
    if table.is_empty() {
        return Err(anyhow!("Cannot aggregate {} over a table with no records", measure));
    }

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in table.records() {
        groups
            .entry(dim.of(record).to_string())
            .or_default()
            .push(measure.of(record));
    }
    Ok(groups)
}

/// Sum `measure` per `dim` category
pub fn group_sum(table: &Table, dim: Dimension, measure: Measure) -> Result<Series> {
    let groups = group_values(table, dim, measure)?;
    let (categories, values) = groups
        .into_iter()
        .map(|(k, vs)| (k, vs.iter().sum::<f64>()))
        .unzip();

    Ok(Series {
        name: measure.to_string(),
        categories,
        values,
    })
}

/// Arithmetic mean of `measure` per `dim` category
pub fn group_mean(table: &Table, dim: Dimension, measure: Measure) -> Result<Series> {
    let groups = group_values(table, dim, measure)?;

    let mut categories = Vec::with_capacity(groups.len());
    let mut values = Vec::with_capacity(groups.len());
    for (key, vs) in groups {
        if vs.is_empty() {
            return Err(anyhow!("Group '{}' has no values for {}", key, measure));
        }
        values.push(vs.iter().sum::<f64>() / vs.len() as f64);
        categories.push(key);
    }

    Ok(Series {
        name: measure.to_string(),
        categories,
        values,
    })
}

/// Means of several measures over the same categories
pub fn group_means(table: &Table, dim: Dimension, measures: &[Measure]) -> Result<Vec<Series>> {
    if measures.is_empty() {
        return Err(anyhow!("At least one measure is required"));
    }
    measures.iter().map(|&m| group_mean(table, dim, m)).collect()
}

impl Series {
    /// Order by value. Ties keep the existing (key-ascending) order.
    pub fn sort_by_value(mut self, order: SortOrder) -> Self {
        let mut pairs: Vec<(String, f64)> = self.categories.drain(..).zip(self.values.drain(..)).collect();
        pairs.sort_by(|a, b| {
            let ord = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
        let (categories, values) = pairs.into_iter().unzip();
        self.categories = categories;
        self.values = values;
        self
    }

    /// Order by category key, ascending
    pub fn sort_by_key(mut self) -> Self {
        let mut pairs: Vec<(String, f64)> = self.categories.drain(..).zip(self.values.drain(..)).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let (categories, values) = pairs.into_iter().unzip();
        self.categories = categories;
        self.values = values;
        self
    }

    /// Running total in the current category order
    pub fn cumulative(mut self) -> Self {
        let mut running = 0.0;
        for v in self.values.iter_mut() {
            running += *v;
            *v = running;
        }
        self
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|i| self.values[i])
    }
}

/// Sum `measure` over every (`row_dim`, `col_dim`) pair
pub fn pivot_sum(table: &Table, row_dim: Dimension, col_dim: Dimension, measure: Measure) -> Result<Pivot> {
    if table.is_empty() {
        return Err(anyhow!("Cannot pivot {} over a table with no records", measure));
    }

    let mut cells: BTreeMap<(String, String), f64> = BTreeMap::new();
    let mut rows: Vec<String> = Vec::new();
    let mut columns: Vec<String> = Vec::new();

    for record in table.records() {
        let r = row_dim.of(record).to_string();
        let c = col_dim.of(record).to_string();
        if !rows.contains(&r) {
            rows.push(r.clone());
        }
        if !columns.contains(&c) {
            columns.push(c.clone());
        }
        *cells.entry((r, c)).or_insert(0.0) += measure.of(record);
    }

    rows.sort();
    columns.sort();

    let values = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| cells.get(&(r.clone(), c.clone())).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    Ok(Pivot { rows, columns, values })
}

impl Pivot {
    /// Stack height per row
    pub fn row_totals(&self) -> Vec<f64> {
        self.values.iter().map(|row| row.iter().sum()).collect()
    }

    /// One column as a series over the rows
    pub fn column(&self, idx: usize) -> Series {
        Series {
            name: self.columns[idx].clone(),
            categories: self.rows.clone(),
            values: self.values.iter().map(|row| row[idx]).collect(),
        }
    }
}

/// Totals per category together with their percentage of the grand total
pub fn shares(table: &Table, dim: Dimension, measure: Measure) -> Result<Shares> {
    let series = group_sum(table, dim, measure)?;
    if let Some(i) = series.values.iter().position(|&v| v < 0.0) {
        return Err(anyhow!(
            "Cannot compute shares of {}: '{}' has a negative total",
            measure,
            series.categories[i]
        ));
    }
    let total: f64 = series.values.iter().sum();
    if total == 0.0 {
        return Err(anyhow!("Cannot compute shares of {}: total is zero", measure));
    }

    let percentages = series.values.iter().map(|v| v / total * 100.0).collect();

    Ok(Shares {
        labels: series.categories,
        values: series.values,
        percentages,
    })
}

/// Count `measure` values into `bin_count` equal-width bins spanning [min, max].
/// The last bin is closed on the right so the maximum is counted.
pub fn histogram(table: &Table, measure: Measure, bin_count: usize) -> Result<Bins> {
    if bin_count == 0 {
        return Err(anyhow!("Histogram requires at least one bin"));
    }
    if table.is_empty() {
        return Err(anyhow!("Cannot bin {} over a table with no records", measure));
    }

    let values: Vec<f64> = table.records().iter().map(|r| measure.of(r)).collect();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    // A zero range gets a unit-wide span centered on the value
    let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let width = (hi - lo) / bin_count as f64;

    let edges: Vec<f64> = (0..=bin_count).map(|i| lo + i as f64 * width).collect();
    let mut counts = vec![0usize; bin_count];
    for v in values {
        let idx = ((v - lo) / width).floor() as usize;
        counts[idx.min(bin_count - 1)] += 1;
    }

    Ok(Bins { edges, counts })
}

/// Raw per-record points. Marker size is `size / size_divisor`.
pub fn scatter(
    table: &Table,
    x: Measure,
    y: Measure,
    size: Measure,
    color: Measure,
    size_divisor: f64,
) -> Result<ScatterPoints> {
    if table.is_empty() {
        return Err(anyhow!("Cannot scatter {} against {} with no records", y, x));
    }
    if size_divisor == 0.0 {
        return Err(anyhow!("Marker size divisor must be non-zero"));
    }

    let records = table.records();
    Ok(ScatterPoints {
        x: records.iter().map(|r| x.of(r)).collect(),
        y: records.iter().map(|r| y.of(r)).collect(),
        size: records.iter().map(|r| size.of(r) / size_divisor).collect(),
        color: records.iter().map(|r| color.of(r)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::{fixture, record};

    fn two_continents() -> Table {
        Table::new(vec![
            record("B", "X", "Online", 30, 1.0, 10.0, 0.0),
            record("A", "X", "Online", 60, 1.0, 10.0, 0.0),
            record("B", "Y", "Dealer", 20, 1.0, 10.0, 0.0),
            record("A", "Y", "Dealer", 40, 1.0, 10.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_group_sum_sorted_descending() {
        let series = group_sum(&two_continents(), Dimension::Continent, Measure::UnitsSold)
            .unwrap()
            .sort_by_value(SortOrder::Descending);
        assert_eq!(series.categories, vec!["A", "B"]);
        assert_eq!(series.values, vec![100.0, 50.0]);
    }

    #[test]
    fn test_group_sum_fixture_units_by_continent() {
        let series = group_sum(&fixture(), Dimension::Continent, Measure::UnitsSold)
            .unwrap()
            .sort_by_value(SortOrder::Descending);
        assert_eq!(series.categories, vec!["Asia", "Europe"]);
        assert_eq!(series.values, vec![15.0, 10.0]);
    }

    #[test]
    fn test_group_sum_keys_ascending() {
        let series = group_sum(&two_continents(), Dimension::Continent, Measure::Revenue).unwrap();
        assert_eq!(series.categories, vec!["A", "B"]);
        assert_eq!(series.name, "Revenue");
    }

    #[test]
    fn test_sort_by_value_ties_keep_key_order() {
        let table = Table::new(vec![
            record("C", "X", "O", 5, 1.0, 1.0, 0.0),
            record("A", "X", "O", 5, 1.0, 1.0, 0.0),
            record("B", "X", "O", 9, 1.0, 1.0, 0.0),
        ])
        .unwrap();
        let asc = group_sum(&table, Dimension::Continent, Measure::UnitsSold)
            .unwrap()
            .sort_by_value(SortOrder::Ascending);
        assert_eq!(asc.categories, vec!["A", "C", "B"]);
        let desc = group_sum(&table, Dimension::Continent, Measure::UnitsSold)
            .unwrap()
            .sort_by_value(SortOrder::Descending);
        assert_eq!(desc.categories, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_sort_by_key_restores_order() {
        let series = group_sum(&two_continents(), Dimension::Continent, Measure::UnitsSold)
            .unwrap()
            .sort_by_value(SortOrder::Ascending)
            .sort_by_key();
        assert_eq!(series.categories, vec!["A", "B"]);
    }

    #[test]
    fn test_group_mean_within_bounds() {
        let table = fixture();
        let means = group_mean(&table, Dimension::SalesChannel, Measure::Revenue).unwrap();
        assert_eq!(means.categories, vec!["Dealer", "Online"]);
        for (channel, mean) in means.categories.iter().zip(&means.values) {
            let revenues: Vec<f64> = table
                .records()
                .iter()
                .filter(|r| &r.sales_channel == channel)
                .map(|r| r.revenue)
                .collect();
            let lo = revenues.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = revenues.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(*mean >= lo && *mean <= hi, "{} mean {} outside [{}, {}]", channel, mean, lo, hi);
        }
        assert_eq!(means.get("Dealer"), Some(90000.0));
        assert_eq!(means.get("Online"), Some(260000.0));
    }

    #[test]
    fn test_group_means_share_categories() {
        let means = group_means(&fixture(), Dimension::SalesChannel, &[Measure::UnitsSold, Measure::Revenue]).unwrap();
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].categories, means[1].categories);
        assert_eq!(means[0].get("Online"), Some(9.0));
        assert_eq!(means[0].get("Dealer"), Some(3.5));
    }

    #[test]
    fn test_group_means_requires_measure() {
        assert!(group_means(&fixture(), Dimension::Brand, &[]).is_err());
    }

    #[test]
    fn test_cumulative_non_decreasing() {
        let series = group_sum(&fixture(), Dimension::Continent, Measure::Revenue)
            .unwrap()
            .sort_by_key()
            .cumulative();
        assert_eq!(series.values, vec![300000.0, 700000.0]);
        assert!(series.values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_pivot_matches_unstacked_sums() {
        let table = fixture();
        let pivot = pivot_sum(&table, Dimension::Continent, Dimension::SalesChannel, Measure::UnitsSold).unwrap();
        assert_eq!(pivot.rows, vec!["Asia", "Europe"]);
        assert_eq!(pivot.columns, vec!["Dealer", "Online"]);
        assert_eq!(pivot.values, vec![vec![5.0, 10.0], vec![2.0, 8.0]]);

        let sums = group_sum(&table, Dimension::Continent, Measure::UnitsSold).unwrap();
        assert_eq!(pivot.row_totals(), sums.values);
    }

    #[test]
    fn test_pivot_missing_combination_is_zero() {
        let table = Table::new(vec![
            record("Asia", "X", "Online", 3, 1.0, 1.0, 0.0),
            record("Europe", "X", "Dealer", 4, 1.0, 1.0, 0.0),
        ])
        .unwrap();
        let pivot = pivot_sum(&table, Dimension::Continent, Dimension::SalesChannel, Measure::UnitsSold).unwrap();
        assert_eq!(pivot.values, vec![vec![0.0, 3.0], vec![4.0, 0.0]]);
        assert_eq!(pivot.column(1).values, vec![3.0, 0.0]);
        assert_eq!(pivot.column(1).name, "Online");
    }

    #[test]
    fn test_shares_fixture() {
        let s = shares(&fixture(), Dimension::Brand, Measure::Revenue).unwrap();
        assert_eq!(s.labels, vec!["BMW", "Toyota"]);
        assert!((s.percentages[0] - 400000.0 / 700000.0 * 100.0).abs() < 1e-9);
        assert!((s.percentages[1] - 42.857142857).abs() < 1e-6);
        let total: f64 = s.percentages.iter().sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_shares_zero_total() {
        let table = Table::new(vec![record("A", "X", "O", 1, 1.0, 0.0, 0.0)]).unwrap();
        let err = shares(&table, Dimension::Brand, Measure::Revenue).unwrap_err();
        assert!(err.to_string().contains("total is zero"));
    }

    #[test]
    fn test_shares_negative_total() {
        let table = Table::new(vec![
            record("A", "X", "O", 1, 1.0, 500.0, 0.0),
            record("A", "Y", "O", 1, 1.0, -100.0, 0.0),
        ])
        .unwrap();
        let err = shares(&table, Dimension::Brand, Measure::Revenue).unwrap_err();
        assert!(err.to_string().contains("'Y' has a negative total"));
    }

    #[test]
    fn test_histogram_counts_all_values() {
        let table = fixture();
        let bins = histogram(&table, Measure::Revenue, 5).unwrap();
        assert_eq!(bins.edges.len(), 6);
        assert_eq!(bins.edges[0], 80000.0);
        assert_eq!(bins.edges[5], 320000.0);
        assert_eq!(bins.counts.iter().sum::<usize>(), table.len());
        // 80k, 100k -> bin 0; 200k -> bin 2; 320k (max) -> last bin
        assert_eq!(bins.counts, vec![2, 0, 1, 0, 1]);
    }

    #[test]
    fn test_histogram_single_value() {
        let table = Table::new(vec![record("A", "X", "O", 1, 1.0, 7.0, 0.0)]).unwrap();
        let bins = histogram(&table, Measure::Revenue, 5).unwrap();
        assert_eq!(bins.counts.iter().sum::<usize>(), 1);
        assert_eq!(bins.edges[0], 6.5);
        assert_eq!(bins.edges[5], 7.5);
    }

    #[test]
    fn test_histogram_zero_bins() {
        assert!(histogram(&fixture(), Measure::Revenue, 0).is_err());
    }

    #[test]
    fn test_scatter_sizes() {
        let points = scatter(&fixture(), Measure::UnitPrice, Measure::UnitsSold, Measure::Revenue, Measure::Discount, 50.0).unwrap();
        assert_eq!(points.x.len(), 4);
        assert_eq!(points.size[0], 4000.0);
        assert_eq!(points.color, vec![5.0, 2.0, 10.0, 0.0]);
        assert_eq!(points.y[2], 8.0);
    }
}
