use std::path::Path;

use plotters::prelude::*;

use super::{draw_labels, font, padded_range, palette, render};
use crate::config::DisplayConfig;
use crate::error::{DeseqError, Result};
use crate::shrinkage::{Direction, ShrunkenResults, ShrunkenRow};

/// -log10(padj); a padj of exactly zero is drawn one decade above the
/// smallest positive padj.
fn neg_log10(padj: f64, floor: f64) -> f64 {
    -(padj.max(floor)).log10()
}

/// -log10(padj) against the shrunken log2 fold change, with guide lines at
/// the direction thresholds.
pub fn volcano_plot(shrunken: &ShrunkenResults, display: &DisplayConfig, path: &Path) -> Result<()> {
    let rows: Vec<&ShrunkenRow> = shrunken
        .rows()
        .iter()
        .filter(|r| r.padj.is_finite() && r.log2_fold_change.is_finite())
        .collect();
    if rows.is_empty() {
        return Err(DeseqError::export(path, "no genes with an adjusted p-value"));
    }
    let floor = rows
        .iter()
        .map(|r| r.padj)
        .filter(|&p| p > 0.0)
        .fold(1.0_f64, f64::min)
        / 10.0;
    let thresholds = shrunken.thresholds();
    let (t, p_line) = (thresholds.abs_lfc, neg_log10(thresholds.padj, floor));
    let (x0, x1) = padded_range(rows.iter().map(|r| r.log2_fold_change).chain([t, -t]), 0.08).unwrap_or((-1.0, 1.0));
    let y_max = rows.iter().map(|r| neg_log10(r.padj, floor)).fold(p_line, f64::max);
    let (y0, y1) = (0.0, y_max * 1.08 + 0.1);
    let labelled = shrunken.top_labelled(display.label_top_n);

    render(path, display, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Volcano plot", font(display, 1.4))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1, y0..y1)?;
        chart
            .configure_mesh()
            .x_desc("shrunken log2 fold change")
            .y_desc("-log10 adjusted p-value")
            .label_style(font(display, 0.8))
            .draw()?;

        let guide = || BLACK.mix(0.4).stroke_width(1);
        for x in [t, -t] {
            chart.draw_series(LineSeries::new(vec![(x, y0), (x, y1)], guide()))?;
        }
        chart.draw_series(LineSeries::new(vec![(x0, p_line), (x1, p_line)], guide()))?;

        for direction in [Direction::No, Direction::Down, Direction::Up] {
            let colour = palette::direction(direction);
            let alpha = if direction == Direction::No { 0.4 } else { 0.8 };
            let count = rows.iter().filter(|r| r.direction == direction).count();
            chart
                .draw_series(rows.iter().filter(|r| r.direction == direction).map(|r| {
                    Circle::new(
                        (r.log2_fold_change, neg_log10(r.padj, floor)),
                        display.point_size,
                        colour.mix(alpha).filled(),
                    )
                }))?
                .label(format!("{} ({})", direction, count))
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, colour.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(font(display, 0.8))
            .draw()?;

        let anchors: Vec<(i32, i32)> = labelled
            .iter()
            .map(|r| chart.backend_coord(&(r.log2_fold_change, neg_log10(r.padj, floor))))
            .collect();
        let (xr, yr) = chart.plotting_area().get_pixel_range();
        let bounds = (xr.start as f64, yr.start as f64, xr.end as f64, yr.end as f64);
        draw_labels(root, &labelled, &anchors, bounds, display)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neg_log10_floors_zero() {
        assert!((neg_log10(0.01, 1e-10) - 2.0).abs() < 1e-12);
        assert!((neg_log10(0.0, 1e-10) - 10.0).abs() < 1e-12);
    }
}
