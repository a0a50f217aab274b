use std::path::Path;

use plotters::prelude::*;

use super::{font, padded_range, palette, render};
use crate::analysis::PcaResult;
use crate::config::DisplayConfig;
use crate::data::{LibraryLayout, SampleDesign, Treatment};
use crate::error::{DeseqError, Result};

/// PC1 against PC2, coloured by treatment with one marker shape per layout
pub fn pca_plot(pca: &PcaResult, design: &SampleDesign, display: &DisplayConfig, path: &Path) -> Result<()> {
    if pca.pc1.len() != design.n_samples() {
        return Err(DeseqError::export(
            path,
            format!("{} PCA scores for {} samples", pca.pc1.len(), design.n_samples()),
        ));
    }
    let (x0, x1) = padded_range(pca.pc1.iter().copied(), 0.15).unwrap_or((-1.0, 1.0));
    let (y0, y1) = padded_range(pca.pc2.iter().copied(), 0.15).unwrap_or((-1.0, 1.0));
    let size = display.point_size + 3;

    render(path, display, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("PCA of variance-stabilized counts", font(display, 1.4))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1, y0..y1)?;
        chart
            .configure_mesh()
            .x_desc(format!("PC1: {:.0}% variance", pca.percent_variance[0]))
            .y_desc(format!("PC2: {:.0}% variance", pca.percent_variance[1]))
            .label_style(font(display, 0.8))
            .draw()?;

        for treatment in [Treatment::Untreated, Treatment::Treated] {
            for layout in design.layout_levels() {
                let colour = palette::treatment(treatment);
                let points: Vec<(f64, f64)> = design
                    .records()
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.treatment == treatment && r.layout == layout)
                    .map(|(i, _)| (pca.pc1[i], pca.pc2[i]))
                    .collect();
                if points.is_empty() {
                    continue;
                }
                let name = format!("{} / {}", treatment, layout);
                match layout {
                    LibraryLayout::Paired => chart
                        .draw_series(points.iter().map(|&p| Circle::new(p, size, colour.filled())))?
                        .label(name)
                        .legend(move |(x, y)| Circle::new((x + 10, y), 5, colour.filled())),
                    LibraryLayout::Single => chart
                        .draw_series(points.iter().map(|&p| TriangleMarker::new(p, size + 2, colour.filled())))?
                        .label(name)
                        .legend(move |(x, y)| TriangleMarker::new((x + 10, y), 6, colour.filled())),
                };
            }
        }

        chart.draw_series(design.records().iter().enumerate().map(|(i, r)| {
            Text::new(
                r.sample_id.clone(),
                (pca.pc1[i], pca.pc2[i]),
                font(display, 0.7).color(&BLACK),
            )
        }))?;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(font(display, 0.8))
            .draw()?;
        Ok(())
    })
}
