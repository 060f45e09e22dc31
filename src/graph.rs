use anyhow::{bail, Context, Result};
use image::ImageEncoder;
use plotters::chart::ChartContext;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;

use crate::ir::{Bins, ChartData, Pivot, ScatterPoints, Series, Shares};
use crate::palette::{parse_color, ColorPalette, Gradient};
use crate::scale;
use crate::{OutputFormat, RenderOptions};

type Chart2d<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const FONT: &str = "sans-serif";

/// Style configuration for line charts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineStyle {
    pub color: Option<String>,
}

/// Style configuration for point markers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointStyle {
    pub color: Option<String>,
    pub size: Option<f64>,
}

/// Style configuration for bars
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarStyle {
    pub color: Option<String>,
    pub width: Option<f64>,
    pub edge_color: Option<String>,
    /// Legend entry, when the chart has a legend
    pub label: Option<String>,
}

/// Style configuration for filled areas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaStyle {
    pub color: Option<String>,
    pub alpha: Option<f64>,
}

/// Chart title and axis descriptions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels {
    pub title: String,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// How a chart is drawn, with its visual parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    Bar(BarStyle),
    HorizontalBar(BarStyle),
    /// Slices run counter-clockwise from `start_angle` degrees
    Pie { start_angle: f64 },
    Scatter { colorbar_label: String },
    Line { line: LineStyle, markers: Option<PointStyle>, grid: bool },
    Histogram(BarStyle),
    StackedBar { legend_title: Option<String> },
    Area { style: AreaStyle, grid: bool },
    /// One style per series, bars side by side
    GroupedBar { series: Vec<BarStyle> },
}

impl ChartKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Bar(_) => "bar",
            ChartKind::HorizontalBar(_) => "horizontal bar",
            ChartKind::Pie { .. } => "pie",
            ChartKind::Scatter { .. } => "scatter",
            ChartKind::Line { .. } => "line",
            ChartKind::Histogram(_) => "histogram",
            ChartKind::StackedBar { .. } => "stacked bar",
            ChartKind::Area { .. } => "area",
            ChartKind::GroupedBar { .. } => "grouped bar",
        }
    }
}

/// Render chart data to encoded image bytes (PNG or SVG)
pub fn render(data: &ChartData, kind: &ChartKind, labels: &Labels, options: &RenderOptions) -> Result<Vec<u8>> {
    if options.width == 0 || options.height == 0 {
        bail!("Canvas size must be non-zero (got {}x{})", options.width, options.height);
    }

    match options.format {
        OutputFormat::Png => render_png(data, kind, labels, options.width, options.height),
        OutputFormat::Svg => render_svg(data, kind, labels, options.width, options.height),
    }
}

fn render_png(data: &ChartData, kind: &ChartKind, labels: &Labels, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root, data, kind, labels)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

fn render_svg(data: &ChartData, kind: &ChartKind, labels: &Labels, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw(&root, data, kind, labels)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg.into_bytes())
}

/// Draw onto any plotters backend
pub fn draw<DB>(root: &DrawingArea<DB, Shift>, data: &ChartData, kind: &ChartKind, labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match (kind, data) {
        (ChartKind::Bar(style), ChartData::Series(series)) => draw_bars(root, series, style, labels),
        (ChartKind::HorizontalBar(style), ChartData::Series(series)) => draw_horizontal_bars(root, series, style, labels),
        (ChartKind::Pie { start_angle }, ChartData::Shares(shares)) => draw_pie(root, shares, *start_angle, labels),
        (ChartKind::Scatter { colorbar_label }, ChartData::Scatter(points)) => {
            draw_scatter(root, points, colorbar_label, labels)
        }
        (ChartKind::Line { line, markers, grid }, ChartData::Series(series)) => {
            draw_line(root, series, line, markers.as_ref(), *grid, labels)
        }
        (ChartKind::Histogram(style), ChartData::Bins(bins)) => draw_histogram(root, bins, style, labels),
        (ChartKind::StackedBar { legend_title }, ChartData::Pivot(pivot)) => {
            draw_stacked_bars(root, pivot, legend_title.as_deref(), labels)
        }
        (ChartKind::Area { style, grid }, ChartData::Series(series)) => draw_area(root, series, style, *grid, labels),
        (ChartKind::GroupedBar { series: styles }, ChartData::MultiSeries(series)) => {
            draw_grouped_bars(root, series, styles, labels)
        }
        (kind, data) => bail!(
            "A {} chart cannot be drawn from {} data",
            kind.name(),
            data.variant_name()
        ),
    }
}

fn resolve_color(color: &Option<String>, fallback: RGBColor) -> RGBColor {
    color.as_deref().and_then(parse_color).unwrap_or(fallback)
}

fn default_color() -> RGBColor {
    ColorPalette::category10().color(0)
}

fn build_chart<'a, DB>(
    area: &'a DrawingArea<DB, Shift>,
    labels: &Labels,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<Chart2d<'a, DB>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    ChartBuilder::on(area)
        .margin(20)
        .caption(&labels.title, (FONT, 22))
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build chart")
}

/// Mesh with category names on one axis
fn draw_category_mesh<'a, DB>(
    chart: &mut Chart2d<'a, DB>,
    categories: &[String],
    labels: &Labels,
    horizontal: bool,
    grid: bool,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    let n = categories.len();
    let formatter = |v: &f64| scale::category_label(categories, *v);

    let mut mesh = chart.configure_mesh();
    if horizontal {
        mesh.y_labels(2 * n + 1).y_label_formatter(&formatter).disable_y_mesh();
    } else {
        mesh.x_labels(2 * n + 1).x_label_formatter(&formatter).disable_x_mesh();
    }
    if !grid {
        mesh.disable_mesh();
    }
    if let Some(x) = &labels.x {
        mesh.x_desc(x.as_str());
    }
    if let Some(y) = &labels.y {
        mesh.y_desc(y.as_str());
    }
    mesh.draw().context("Failed to draw mesh")
}

/// Mesh for two continuous axes
fn draw_value_mesh<'a, DB>(chart: &mut Chart2d<'a, DB>, labels: &Labels, grid: bool) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    let mut mesh = chart.configure_mesh();
    if !grid {
        mesh.disable_mesh();
    }
    if let Some(x) = &labels.x {
        mesh.x_desc(x.as_str());
    }
    if let Some(y) = &labels.y {
        mesh.y_desc(y.as_str());
    }
    mesh.draw().context("Failed to draw mesh")
}

/// Series legend in the upper right of the plotting area, optionally titled
fn draw_legend<'a, DB>(root: &'a DrawingArea<DB, Shift>, chart: &mut Chart2d<'a, DB>, title: Option<&str>) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    let (base_x, base_y) = chart.plotting_area().get_base_pixel();
    let (plot_w, _) = chart.plotting_area().dim_in_pixel();
    let legend_x = plot_w as i32 - 190;
    let legend_y = if title.is_some() { 30 } else { 10 };

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::Coordinate(legend_x, legend_y))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font((FONT, 14))
        .draw()
        .context("Failed to draw legend")?;

    if let Some(title) = title {
        root.draw(&Text::new(
            title.to_string(),
            (base_x - root.get_base_pixel().0 + legend_x + 4, base_y - root.get_base_pixel().1 + 10),
            (FONT, 14).into_font(),
        ))
        .context("Failed to draw legend title")?;
    }

    Ok(())
}

fn draw_bars<DB>(root: &DrawingArea<DB, Shift>, series: &Series, style: &BarStyle, labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if series.categories.is_empty() {
        bail!("Cannot create bar chart with no data");
    }

    let n = series.categories.len();
    let mut chart = build_chart(root, labels, scale::categorical_range(n), scale::baseline_range(&series.values)?)?;
    draw_category_mesh(&mut chart, &series.categories, labels, false, false)?;

    let color = resolve_color(&style.color, default_color());
    let half = style.width.unwrap_or(0.8) / 2.0;

    chart
        .draw_series(series.values.iter().enumerate().map(|(i, &v)| {
            let x = i as f64;
            Rectangle::new([(x - half, 0.0), (x + half, v)], color.filled())
        }))
        .context("Failed to draw bars")?;

    Ok(())
}

fn draw_horizontal_bars<DB>(root: &DrawingArea<DB, Shift>, series: &Series, style: &BarStyle, labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if series.categories.is_empty() {
        bail!("Cannot create bar chart with no data");
    }

    let n = series.categories.len();
    let mut chart = build_chart(root, labels, scale::baseline_range(&series.values)?, scale::categorical_range(n))?;
    draw_category_mesh(&mut chart, &series.categories, labels, true, false)?;

    let color = resolve_color(&style.color, default_color());
    let half = style.width.unwrap_or(0.8) / 2.0;

    chart
        .draw_series(series.values.iter().enumerate().map(|(i, &v)| {
            let y = i as f64;
            Rectangle::new([(0.0, y - half), (v, y + half)], color.filled())
        }))
        .context("Failed to draw bars")?;

    Ok(())
}

fn draw_line<DB>(
    root: &DrawingArea<DB, Shift>,
    series: &Series,
    style: &LineStyle,
    markers: Option<&PointStyle>,
    grid: bool,
    labels: &Labels,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if series.categories.is_empty() {
        bail!("Cannot create line chart with no data");
    }

    let n = series.categories.len();
    let mut chart = build_chart(root, labels, scale::categorical_range(n), scale::continuous_range(&series.values)?)?;
    draw_category_mesh(&mut chart, &series.categories, labels, false, grid)?;

    let points: Vec<(f64, f64)> = series.values.iter().enumerate().map(|(i, &v)| (i as f64, v)).collect();

    let color = resolve_color(&style.color, default_color());
    chart
        .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
        .context("Failed to draw line series")?;

    if let Some(marker) = markers {
        let marker_color = resolve_color(&marker.color, color);
        let size = marker.size.unwrap_or(5.0) as i32;
        chart
            .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), size, marker_color.filled())))
            .context("Failed to draw markers")?;
    }

    Ok(())
}

fn draw_area<DB>(root: &DrawingArea<DB, Shift>, series: &Series, style: &AreaStyle, grid: bool, labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if series.categories.is_empty() {
        bail!("Cannot create area chart with no data");
    }

    let n = series.categories.len();
    let mut chart = build_chart(root, labels, scale::categorical_range(n), scale::baseline_range(&series.values)?)?;
    draw_category_mesh(&mut chart, &series.categories, labels, false, grid)?;

    let color = resolve_color(&style.color, default_color());
    let alpha = style.alpha.unwrap_or(0.5);
    let points: Vec<(f64, f64)> = series.values.iter().enumerate().map(|(i, &v)| (i as f64, v)).collect();

    chart
        .draw_series(AreaSeries::new(points, 0.0, &color.mix(alpha)).border_style(&color))
        .context("Failed to draw area")?;

    Ok(())
}

fn draw_histogram<DB>(root: &DrawingArea<DB, Shift>, bins: &Bins, style: &BarStyle, labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if bins.counts.is_empty() || bins.edges.len() != bins.counts.len() + 1 {
        bail!("Histogram needs one more edge than bins");
    }

    let counts: Vec<f64> = bins.counts.iter().map(|&c| c as f64).collect();
    let mut chart = build_chart(root, labels, scale::continuous_range(&bins.edges)?, scale::baseline_range(&counts)?)?;
    draw_value_mesh(&mut chart, labels, false)?;

    let fill = resolve_color(&style.color, default_color());
    let rects: Vec<[(f64, f64); 2]> = bins
        .edges
        .windows(2)
        .zip(&counts)
        .map(|(edge, &count)| [(edge[0], 0.0), (edge[1], count)])
        .collect();

    chart
        .draw_series(rects.iter().map(|&r| Rectangle::new(r, fill.filled())))
        .context("Failed to draw histogram")?;

    if let Some(edge) = style.edge_color.as_deref().and_then(parse_color) {
        chart
            .draw_series(rects.iter().map(|&r| Rectangle::new(r, edge.stroke_width(1))))
            .context("Failed to draw histogram edges")?;
    }

    Ok(())
}

fn draw_stacked_bars<DB>(root: &DrawingArea<DB, Shift>, pivot: &Pivot, legend_title: Option<&str>, labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if pivot.rows.is_empty() || pivot.columns.is_empty() {
        bail!("Cannot create stacked bar chart with no data");
    }

    // Range must include the full stack height
    let mut extent = pivot.row_totals();
    extent.push(0.0);

    let n = pivot.rows.len();
    let mut chart = build_chart(root, labels, scale::categorical_range(n), scale::baseline_range(&extent)?)?;
    draw_category_mesh(&mut chart, &pivot.rows, labels, false, false)?;

    let palette = ColorPalette::category10();
    let half = 0.4;
    let mut offsets = vec![0.0; n];

    for col in 0..pivot.columns.len() {
        let color = palette.color(col);
        let layer = pivot.column(col);
        let rects: Vec<Rectangle<(f64, f64)>> = layer
            .values
            .iter()
            .enumerate()
            .map(|(row, &v)| {
                let start = offsets[row];
                let end = start + v;
                offsets[row] = end;
                let x = row as f64;
                Rectangle::new([(x - half, start), (x + half, end)], color.filled())
            })
            .collect();

        chart
            .draw_series(rects)
            .context("Failed to draw stacked bars")?
            .label(layer.name)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    draw_legend(root, &mut chart, legend_title)
}

fn draw_grouped_bars<DB>(root: &DrawingArea<DB, Shift>, series: &[Series], styles: &[BarStyle], labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let Some(first) = series.first() else {
        bail!("Cannot create bar chart with no series");
    };
    if first.categories.is_empty() {
        bail!("Cannot create bar chart with no categories");
    }
    if series.iter().any(|s| s.categories != first.categories) {
        bail!("Grouped series must share the same categories");
    }

    let all_values: Vec<f64> = series.iter().flat_map(|s| s.values.iter().copied()).collect();
    let n = first.categories.len();
    let mut chart = build_chart(root, labels, scale::categorical_range(n), scale::baseline_range(&all_values)?)?;
    draw_category_mesh(&mut chart, &first.categories, labels, false, false)?;

    let palette = ColorPalette::category10();
    let num_series = series.len() as f64;

    for (idx, s) in series.iter().enumerate() {
        let style = styles.get(idx).cloned().unwrap_or_default();
        let color = resolve_color(&style.color, palette.color(idx));
        let bar_width = style.width.unwrap_or(0.8 / num_series);
        let offset = (idx as f64 - (num_series - 1.0) / 2.0) * bar_width;

        chart
            .draw_series(s.values.iter().enumerate().map(|(i, &v)| {
                let x = i as f64 + offset;
                Rectangle::new([(x - bar_width / 2.0, 0.0), (x + bar_width / 2.0, v)], color.filled())
            }))
            .context("Failed to draw bar")?
            .label(style.label.clone().unwrap_or_else(|| s.name.clone()))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    draw_legend(root, &mut chart, None)
}

/// Marker area in pt^2 to a pixel radius at 100 dpi
fn marker_radius(area: f64) -> i32 {
    let diameter_pt = area.max(0.0).sqrt();
    (diameter_pt / 2.0 * 100.0 / 72.0).clamp(2.0, 80.0).round() as i32
}

fn draw_scatter<DB>(
    root: &DrawingArea<DB, Shift>,
    points: &ScatterPoints,
    colorbar_label: &str,
    labels: &Labels,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if points.x.is_empty() {
        bail!("Cannot create scatter plot with no data points");
    }

    let (width, _) = root.dim_in_pixel();
    let (plot_area, bar_area) = root.split_horizontally((width as i32 - 110).max(1));

    let mut chart = build_chart(&plot_area, labels, scale::continuous_range(&points.x)?, scale::continuous_range(&points.y)?)?;
    draw_value_mesh(&mut chart, labels, true)?;

    let gradient = Gradient::viridis();
    let (cmin, cmax) = scale::min_max(&points.color).unwrap_or((0.0, 1.0));
    chart
        .draw_series(
            points
                .x
                .iter()
                .zip(&points.y)
                .zip(points.size.iter().zip(&points.color))
                .map(|((&x, &y), (&size, &c))| {
                    Circle::new((x, y), marker_radius(size), gradient.map(c, cmin, cmax).filled())
                }),
        )
        .context("Failed to draw point series")?;

    draw_colorbar(&bar_area, &gradient, cmin, cmax, colorbar_label)
}

fn draw_colorbar<DB>(area: &DrawingArea<DB, Shift>, gradient: &Gradient, min: f64, max: f64, label: &str) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    const STEPS: usize = 64;

    let (lo, hi) = if min < max { (min, max) } else { scale::pad_range(min, max) };

    let mut chart = ChartBuilder::on(area)
        .margin_top(62)
        .margin_bottom(70)
        .margin_right(10)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..1.0, lo..hi)
        .context("Failed to build color bar")?;

    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(label)
        .draw()
        .context("Failed to draw color bar axis")?;

    let step = (hi - lo) / STEPS as f64;
    chart
        .draw_series((0..STEPS).map(|k| {
            let y0 = lo + k as f64 * step;
            let t = (k as f64 + 0.5) / STEPS as f64;
            Rectangle::new([(0.0, y0), (1.0, y0 + step)], gradient.at(t).filled())
        }))
        .context("Failed to draw color bar")?;

    Ok(())
}

/// Pie wedge outline in pixel space. Angles in degrees, counter-clockwise, 0 = 3 o'clock.
pub(crate) fn wedge_points(center: (f64, f64), radius: f64, from_deg: f64, to_deg: f64) -> Vec<(i32, i32)> {
    let steps = ((to_deg - from_deg).abs().ceil() as usize).max(1);
    let mut points = Vec::with_capacity(steps + 2);
    points.push((center.0.round() as i32, center.1.round() as i32));
    for s in 0..=steps {
        let a = (from_deg + (to_deg - from_deg) * s as f64 / steps as f64).to_radians();
        points.push((
            (center.0 + radius * a.cos()).round() as i32,
            (center.1 - radius * a.sin()).round() as i32,
        ));
    }
    points
}

fn draw_pie<DB>(root: &DrawingArea<DB, Shift>, shares: &Shares, start_angle: f64, labels: &Labels) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if shares.labels.is_empty() {
        bail!("Cannot create pie chart with no data");
    }

    let area = root
        .titled(&labels.title, (FONT, 22).into_font())
        .context("Failed to draw title")?;

    let (w, h) = area.dim_in_pixel();
    let center = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.38;
    let palette = ColorPalette::paired();
    let text_style = TextStyle::from((FONT, 15).into_font()).pos(Pos::new(HPos::Center, VPos::Center));

    let mut angle = start_angle;
    for (i, (label, pct)) in shares.labels.iter().zip(&shares.percentages).enumerate() {
        let sweep = 360.0 * pct / 100.0;
        area.draw(&Polygon::new(wedge_points(center, radius, angle, angle + sweep), palette.color(i).filled()))
            .context("Failed to draw pie slice")?;

        let mid = (angle + sweep / 2.0).to_radians();
        let at = |r: f64| {
            (
                (center.0 + r * mid.cos()).round() as i32,
                (center.1 - r * mid.sin()).round() as i32,
            )
        };

        area.draw(&Text::new(label.clone(), at(radius * 1.12), text_style.clone()))
            .context("Failed to draw pie label")?;
        area.draw(&Text::new(format!("{:.1}%", pct), at(radius * 0.6), text_style.clone()))
            .context("Failed to draw pie percentage")?;

        angle += sweep;
    }

    Ok(())
}
