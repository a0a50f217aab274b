//! SVG chart recipes
//!
//! Every recipe takes its inputs, the display configuration and a target
//! path, and writes one SVG file. Rendering failures surface as export
//! errors naming the file.

mod dispersion;
mod heatmap;
mod ma;
pub mod palette;
mod pca;
pub mod repel;
mod volcano;

pub use dispersion::dispersion_plot;
pub use heatmap::{sample_distance_heatmap, top_genes_heatmap, zscore_heatmap};
pub use ma::ma_plot;
pub use pca::pca_plot;
pub use volcano::volcano_plot;

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::config::DisplayConfig;
use crate::error::{DeseqError, Result};
use crate::shrinkage::ShrunkenRow;

pub const DISPERSION_PLOT: &str = "dispersion.svg";
pub const PCA_PLOT: &str = "pca.svg";
pub const SAMPLE_DISTANCE_HEATMAP: &str = "sample_distance_heatmap.svg";
pub const TOP_GENES_HEATMAP: &str = "top_genes_heatmap.svg";
pub const ZSCORE_HEATMAP: &str = "zscore_heatmap.svg";
pub const MA_PLOT: &str = "ma_plot.svg";
pub const VOLCANO_PLOT: &str = "volcano_plot.svg";

type Canvas<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Open an SVG canvas at `path`, run `draw` on it and flush it to disk
fn render<F>(path: &Path, display: &DisplayConfig, draw: F) -> Result<()>
where
    F: FnOnce(&Canvas<'_>) -> DrawResult,
{
    let root = SVGBackend::new(path, (display.width, display.height)).into_drawing_area();
    let drawn = (|| -> DrawResult {
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
        Ok(())
    })();
    drawn.map_err(|e| DeseqError::export(path, e))?;
    log::info!("Rendered {}", path.display());
    Ok(())
}

fn font(display: &DisplayConfig, scale: f64) -> FontDesc<'static> {
    ("sans-serif", display.font_size as f64 * scale).into_font()
}

/// `[min, max]` of the finite values padded by `pad` of the span on each
/// side; a degenerate span widens to one unit.
fn padded_range<I: IntoIterator<Item = f64>>(values: I, pad: f64) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return None;
    }
    if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
        return Some((lo - 0.5, hi + 0.5));
    }
    let span = hi - lo;
    Some((lo - pad * span, hi + pad * span))
}

/// Draw repelled gene labels with a leader line back to each point.
/// `anchors` are backend pixel coordinates of the labelled points.
fn draw_labels(
    root: &Canvas<'_>,
    rows: &[&ShrunkenRow],
    anchors: &[(i32, i32)],
    plot_area: repel::Bounds,
    display: &DisplayConfig,
) -> DrawResult {
    let style: TextStyle = font(display, 0.8).into();
    let mut sizes = Vec::with_capacity(rows.len());
    for row in rows {
        let (w, h) = root.estimate_text_size(&row.gene_id, &style)?;
        sizes.push((w as f64, h as f64));
    }
    let points: Vec<(f64, f64)> = anchors.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
    let boxes = repel::repel(&points, &sizes, plot_area, 300);

    for ((row, &(ax, ay)), b) in rows.iter().zip(anchors).zip(&boxes) {
        let (cx, cy) = ((b.x + b.w / 2.0) as i32, (b.y + b.h) as i32);
        root.draw(&PathElement::new(vec![(ax, ay), (cx, cy)], BLACK.mix(0.5)))?;
        root.draw(&Text::new(row.gene_id.clone(), (b.x as i32, b.y as i32), style.clone()))?;
    }
    Ok(())
}
