//! Yearly box-plot charts rendered with [`plotters`] to PNG.

use plotters::coord::Shift;
use plotters::prelude::*;
use std::{collections::BTreeMap, ops::Range, path::Path};
use thiserror::Error;

use super::stats::{CountyHhi, MainOfficeShare};

/// Errors that can occur during chart generation
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to create drawing area: {0}")]
    DrawingArea(String),

    #[error("Failed to configure chart: {0}")]
    ChartConfig(String),

    #[error("Failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

type Result<T> = core::result::Result<T, PlotError>;

// matplotlib's tab10 palette
const TAB_BLUE: RGBColor = RGBColor(31, 119, 180);
const TAB_ORANGE: RGBColor = RGBColor(255, 127, 14);
const TAB_GREEN: RGBColor = RGBColor(44, 160, 44);

const HHI_MAX: f32 = 10_000.0;

/// Groups finite values by year. NaN/inf (zero-total divisions) are dropped.
pub fn yearly_values<T>(
    items: &[T],
    year: impl Fn(&T) -> u16,
    value: impl Fn(&T) -> f64,
) -> BTreeMap<u16, Vec<f64>> {
    let mut out: BTreeMap<u16, Vec<f64>> = BTreeMap::new();
    for item in items {
        let v = value(item);
        if v.is_finite() {
            out.entry(year(item)).or_default().push(v);
        }
    }
    out
}

/// x-axis limits: three quarters of a year of padding either side.
fn year_range<'a>(years: impl Iterator<Item = &'a u16>) -> Result<Range<f64>> {
    let (lo, hi) = years.fold((u16::MAX, u16::MIN), |(lo, hi), &y| (lo.min(y), hi.max(y)));
    if lo > hi {
        return Err(PlotError::InvalidData("no finite values to plot".to_string()));
    }
    Ok(lo as f64 - 0.75..hi as f64 + 0.75)
}

struct Panel<'a> {
    caption: Option<&'a str>,
    y_desc: &'a str,
    y_range: Range<f32>,
    y_step: f32,
    color: RGBColor,
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    groups: &BTreeMap<u16, Vec<f64>>,
    x_range: Range<f64>,
    panel: Panel<'_>,
) -> Result<()> {
    let mut builder = ChartBuilder::on(area);
    builder
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60);
    if let Some(caption) = panel.caption {
        builder.caption(caption, ("sans-serif", 20));
    }
    let mut chart = builder
        .build_cartesian_2d(x_range.clone(), panel.y_range.clone())
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    let y_labels = ((panel.y_range.end - panel.y_range.start) / panel.y_step) as usize + 1;
    let x_labels = ((x_range.end - x_range.start) / 5.0).ceil() as usize + 1;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(panel.y_desc)
        .y_labels(y_labels)
        .x_labels(x_labels)
        .x_label_formatter(&|x| format!("{:.0}", x))
        .y_label_formatter(&|y| format!("{:.0}", y))
        .label_style(("sans-serif", 12))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    // box width in pixels, ~60% of the space one year gets on the x axis
    let plot_width = chart.plotting_area().dim_in_pixel().0 as f64;
    let per_year = plot_width / (x_range.end - x_range.start);
    let box_width = (per_year * 0.6).max(2.0) as u32;

    chart
        .draw_series(groups.iter().map(|(&year, values)| {
            let quartiles = Quartiles::new(values);
            Boxplot::new_vertical(year as f64, &quartiles)
                .width(box_width)
                .whisker_width(0.5)
                .style(panel.color)
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    Ok(())
}

/// Side-by-side yearly box plots of county branch HHI and deposit HHI (800x400).
pub fn draw_hhi_chart(hhi: &[CountyHhi], output_path: &Path) -> Result<()> {
    let branch = yearly_values(hhi, |h| h.year, |h| h.branch_hhi);
    let deposit = yearly_values(hhi, |h| h.year, |h| h.deposit_hhi);
    let x_range = year_range(branch.keys().chain(deposit.keys()))?;

    let root = BitMapBackend::new(output_path, (800, 400)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;
    let root = root
        .titled(
            "Branch and deposit HHI distribution over time",
            ("sans-serif", 20),
        )
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;
    let (left, right) = root.split_horizontally(400);

    draw_panel(
        &left,
        &branch,
        x_range.clone(),
        Panel {
            caption: None,
            y_desc: "Branch HHI",
            y_range: 0.0..HHI_MAX,
            y_step: 2_000.0,
            color: TAB_BLUE,
        },
    )?;
    draw_panel(
        &right,
        &deposit,
        x_range,
        Panel {
            caption: None,
            y_desc: "Deposit HHI",
            y_range: 0.0..HHI_MAX,
            y_step: 2_000.0,
            color: TAB_ORANGE,
        },
    )?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    Ok(())
}

/// Yearly box plots of the main-office share of each institution's deposits (800x800).
pub fn draw_main_office_chart(shares: &[MainOfficeShare], output_path: &Path) -> Result<()> {
    let pct = yearly_values(shares, |m| m.year, |m| m.pct);
    let x_range = year_range(pct.keys())?;

    let root = BitMapBackend::new(output_path, (800, 800)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    draw_panel(
        &root,
        &pct,
        x_range,
        Panel {
            caption: Some("% of \"branch deposits\" at main office over time"),
            y_desc: "% of deposits at main office",
            y_range: 0.0..100.0,
            y_step: 10.0,
            color: TAB_GREEN,
        },
    )?;

    root.present()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    Ok(())
}
