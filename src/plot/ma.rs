use std::path::Path;

use plotters::prelude::*;

use super::{draw_labels, font, padded_range, palette, render};
use crate::config::DisplayConfig;
use crate::error::{DeseqError, Result};
use crate::shrinkage::{Direction, ShrunkenResults};

/// Shrunken log2 fold change over mean expression (log x axis), coloured
/// by direction, with the strongest calls labelled.
pub fn ma_plot(shrunken: &ShrunkenResults, display: &DisplayConfig, path: &Path) -> Result<()> {
    let rows: Vec<_> = shrunken
        .rows()
        .iter()
        .filter(|r| r.base_mean > 0.0 && r.log2_fold_change.is_finite())
        .collect();
    if rows.is_empty() {
        return Err(DeseqError::export(path, "no genes with a positive mean and finite fold change"));
    }
    let (x_lo, x_hi) = rows
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r.base_mean), hi.max(r.base_mean)));
    let t = shrunken.thresholds().abs_lfc;
    let (y0, y1) = padded_range(rows.iter().map(|r| r.log2_fold_change).chain([t, -t]), 0.08).unwrap_or((-1.0, 1.0));
    let (x0, x1) = (x_lo / 1.5, x_hi * 1.5);
    let labelled = shrunken.top_labelled(display.label_top_n);

    render(path, display, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("MA plot (shrunken log2 fold changes)", font(display, 1.4))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((x0..x1).log_scale(), y0..y1)?;
        chart
            .configure_mesh()
            .x_desc("mean of normalized counts")
            .y_desc("log2 fold change")
            .label_style(font(display, 0.8))
            .draw()?;

        for direction in [Direction::No, Direction::Down, Direction::Up] {
            let colour = palette::direction(direction);
            let alpha = if direction == Direction::No { 0.4 } else { 0.8 };
            chart
                .draw_series(
                    rows.iter()
                        .filter(|r| r.direction == direction)
                        .map(|r| Circle::new((r.base_mean, r.log2_fold_change), display.point_size, colour.mix(alpha).filled())),
                )?
                .label(direction.as_str())
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, colour.filled()));
        }
        chart.draw_series(LineSeries::new(vec![(x0, 0.0), (x1, 0.0)], BLACK.stroke_width(1)))?;
        for level in [t, -t] {
            chart.draw_series(LineSeries::new(vec![(x0, level), (x1, level)], BLACK.mix(0.4).stroke_width(1)))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(font(display, 0.8))
            .draw()?;

        let anchors: Vec<(i32, i32)> = labelled
            .iter()
            .map(|r| chart.backend_coord(&(r.base_mean, r.log2_fold_change)))
            .collect();
        let (xr, yr) = chart.plotting_area().get_pixel_range();
        let bounds = (xr.start as f64, yr.start as f64, xr.end as f64, yr.end as f64);
        draw_labels(root, &labelled, &anchors, bounds, display)
    })
}
