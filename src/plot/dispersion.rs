//! Dispersion estimates against mean expression

use std::path::Path;

use plotters::prelude::*;

use super::{font, palette, render};
use crate::config::DisplayConfig;
use crate::error::{DeseqError, Result};
use crate::model::FittedModel;

fn positive_range<'a, I: Iterator<Item = &'a f64>>(values: I) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite() && **v > 0.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    (lo <= hi).then(|| (lo / 2.0, hi * 2.0))
}

/// Log-log scatter of gene-wise (black) and final (blue) dispersions over
/// the mean of normalized counts, with the fitted trend in red.
pub fn dispersion_plot(fit: &FittedModel, display: &DisplayConfig, path: &Path) -> Result<()> {
    let means = fit.base_means();
    let disp = fit.dispersions();
    let x_range = positive_range(means.iter());
    let y_range = positive_range(disp.gene_wise.iter().chain(disp.final_dispersions.iter()));
    let ((x0, x1), (y0, y1)) = match (x_range, y_range) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(DeseqError::export(path, "no positive means or dispersions to draw")),
    };

    let points = |values: &ndarray::Array1<f64>| -> Vec<(f64, f64)> {
        means
            .iter()
            .zip(values.iter())
            .filter(|(m, d)| **m > 0.0 && **d > 0.0 && d.is_finite())
            .map(|(&m, &d)| (m, d))
            .collect()
    };
    let gene_wise = points(&disp.gene_wise);
    let final_points = points(&disp.final_dispersions);
    let trend: Vec<(f64, f64)> = (0..=200)
        .map(|i| x0 * (x1 / x0).powf(i as f64 / 200.0))
        .map(|m| (m, disp.function.eval(m)))
        .filter(|(_, d)| *d > 0.0 && d.is_finite())
        .collect();
    let size = display.point_size.saturating_sub(1).max(1);

    render(path, display, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Dispersion estimates", font(display, 1.4))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((x0..x1).log_scale(), (y0..y1).log_scale())?;
        chart
            .configure_mesh()
            .x_desc("mean of normalized counts")
            .y_desc("dispersion")
            .label_style(font(display, 0.8))
            .draw()?;

        chart
            .draw_series(gene_wise.iter().map(|&p| Circle::new(p, size, BLACK.mix(0.4).filled())))?
            .label("gene-wise")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLACK.filled()));
        chart
            .draw_series(final_points.iter().map(|&p| Circle::new(p, size, palette::FINAL.mix(0.5).filled())))?
            .label("final")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, palette::FINAL.filled()));
        chart
            .draw_series(LineSeries::new(trend.iter().copied(), palette::TREND.stroke_width(2)))?
            .label("fitted")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], palette::TREND.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(font(display, 0.8))
            .draw()?;
        Ok(())
    })
}
