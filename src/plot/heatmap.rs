//! Heatmaps: sample distances with dendrograms, top-gene expression and
//! per-gene z-scores
//!
//! Cells are laid out in backend pixels directly on the canvas; there is
//! no chart coordinate system.

use std::path::Path;

use ndarray::Array2;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;

use super::{font, palette, render, Canvas, DrawResult};
use crate::analysis::{Dendrogram, ZScoreMatrix};
use crate::config::DisplayConfig;
use crate::data::SampleDesign;
use crate::error::{DeseqError, Result};

const MARGIN: f64 = 10.0;
const KEY_WIDTH: f64 = 70.0;
const ANNOTATION_HEIGHT: f64 = 14.0;

/// Pixel rectangle holding the cell grid
#[derive(Debug, Clone, Copy)]
struct Grid {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    rows: usize,
    cols: usize,
}

impl Grid {
    fn cell_w(&self) -> f64 {
        self.width / self.cols as f64
    }

    fn cell_h(&self) -> f64 {
        self.height / self.rows as f64
    }

    fn cell(&self, r: usize, c: usize) -> [(i32, i32); 2] {
        let (cw, ch) = (self.cell_w(), self.cell_h());
        [
            ((self.left + c as f64 * cw).round() as i32, (self.top + r as f64 * ch).round() as i32),
            ((self.left + (c + 1) as f64 * cw).round() as i32, (self.top + (r + 1) as f64 * ch).round() as i32),
        ]
    }

    fn col_center(&self, c: f64) -> f64 {
        self.left + (c + 0.5) * self.cell_w()
    }

    fn row_center(&self, r: f64) -> f64 {
        self.top + (r + 0.5) * self.cell_h()
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

fn widest(root: &Canvas<'_>, labels: &[String], style: &TextStyle) -> std::result::Result<f64, Box<dyn std::error::Error>> {
    let mut w = 0u32;
    for l in labels {
        w = w.max(root.estimate_text_size(l, style)?.0);
    }
    Ok(w as f64)
}

fn draw_title(root: &Canvas<'_>, title: &str, display: &DisplayConfig) -> DrawResult {
    let style: TextStyle = font(display, 1.4).into();
    let style = style.pos(Pos::new(HPos::Center, VPos::Top));
    root.draw(&Text::new(title.to_string(), ((display.width / 2) as i32, MARGIN as i32), style))?;
    Ok(())
}

fn title_height(display: &DisplayConfig) -> f64 {
    MARGIN + display.font_size as f64 * 2.2
}

fn draw_cells<F: Fn(usize, usize) -> RGBColor>(root: &Canvas<'_>, grid: &Grid, colour: F) -> DrawResult {
    for r in 0..grid.rows {
        for c in 0..grid.cols {
            root.draw(&Rectangle::new(grid.cell(r, c), colour(r, c).filled()))?;
        }
    }
    Ok(())
}

fn draw_row_labels(root: &Canvas<'_>, grid: &Grid, labels: &[String], style: &TextStyle) -> DrawResult {
    let style = style.pos(Pos::new(HPos::Left, VPos::Center));
    for (r, label) in labels.iter().enumerate() {
        let at = ((grid.right() + 6.0) as i32, grid.row_center(r as f64) as i32);
        root.draw(&Text::new(label.clone(), at, style.clone()))?;
    }
    Ok(())
}

fn draw_col_labels(root: &Canvas<'_>, grid: &Grid, labels: &[String], style: &TextStyle) -> DrawResult {
    let style = style.transform(FontTransform::Rotate90);
    let half = style.font.get_size() / 2.0;
    for (c, label) in labels.iter().enumerate() {
        let at = ((grid.col_center(c as f64) + half) as i32, (grid.bottom() + 6.0) as i32);
        root.draw(&Text::new(label.clone(), at, style.clone()))?;
    }
    Ok(())
}

/// Vertical colour bar from `lo` (bottom) to `hi` (top)
fn draw_colour_key<F: Fn(f64) -> RGBColor>(
    root: &Canvas<'_>,
    left: f64,
    top: f64,
    height: f64,
    (lo, hi): (f64, f64),
    colour: F,
    style: &TextStyle,
) -> DrawResult {
    const STEPS: usize = 50;
    let step_h = height / STEPS as f64;
    for i in 0..STEPS {
        let t = 1.0 - (i as f64 + 0.5) / STEPS as f64;
        let y = top + i as f64 * step_h;
        root.draw(&Rectangle::new(
            [(left as i32, y as i32), ((left + 14.0) as i32, (y + step_h).ceil() as i32)],
            colour(t).filled(),
        ))?;
    }
    let style = style.pos(Pos::new(HPos::Left, VPos::Center));
    root.draw(&Text::new(format!("{:.2}", hi), ((left + 18.0) as i32, top as i32), style.clone()))?;
    root.draw(&Text::new(format!("{:.2}", lo), ((left + 18.0) as i32, (top + height) as i32), style))?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Top,
    Left,
}

/// Dendrogram drawn outward from the grid edge, `depth` pixels deep
fn draw_dendrogram(root: &Canvas<'_>, tree: &Dendrogram, grid: &Grid, side: Side, depth: f64) -> DrawResult {
    let pos = tree.node_positions();
    let heights = tree.node_heights();
    let max_h = heights.iter().cloned().fold(0.0_f64, f64::max);
    let scale = if max_h > 0.0 { (depth - 4.0) / max_h } else { 0.0 };
    let at = |p: f64, h: f64| -> (i32, i32) {
        match side {
            Side::Top => (grid.col_center(p) as i32, (grid.top - 4.0 - h * scale) as i32),
            Side::Left => ((grid.left - 4.0 - h * scale) as i32, grid.row_center(p) as i32),
        }
    };
    for (k, m) in tree.merges.iter().enumerate() {
        let node = tree.n_leaves + k;
        let path = vec![
            at(pos[m.left], heights[m.left]),
            at(pos[m.left], heights[node]),
            at(pos[m.right], heights[node]),
            at(pos[m.right], heights[m.right]),
        ];
        root.draw(&PathElement::new(path, BLACK.stroke_width(1)))?;
    }
    Ok(())
}

/// Euclidean sample distances, both axes in dendrogram order
pub fn sample_distance_heatmap(
    dist: &Array2<f64>,
    tree: &Dendrogram,
    sample_ids: &[String],
    display: &DisplayConfig,
    path: &Path,
) -> Result<()> {
    let n = tree.order.len();
    if dist.nrows() != n || sample_ids.len() != n {
        return Err(DeseqError::export(path, "distance matrix, dendrogram and sample ids disagree"));
    }
    let labels: Vec<String> = tree.order.iter().map(|&i| sample_ids[i].clone()).collect();
    let max_d = dist.iter().cloned().fold(0.0_f64, f64::max);
    let (w, h) = (display.width as f64, display.height as f64);
    let depth = 0.12 * w.min(h);

    render(path, display, |root| {
        let style: TextStyle = font(display, 0.8).into();
        let label_w = widest(root, &labels, &style)? + 12.0;
        let left = MARGIN + depth + 4.0;
        let top = title_height(display) + depth + 4.0;
        let grid = Grid {
            left,
            top,
            width: (w - left - label_w - KEY_WIDTH - MARGIN).max(10.0),
            height: (h - top - label_w - MARGIN).max(10.0),
            rows: n,
            cols: n,
        };

        draw_title(root, "Sample-to-sample distances", display)?;
        draw_cells(root, &grid, |r, c| {
            let d = dist[[tree.order[r], tree.order[c]]];
            palette::distance(if max_d > 0.0 { d / max_d } else { 0.0 })
        })?;
        draw_dendrogram(root, tree, &grid, Side::Top, depth)?;
        draw_dendrogram(root, tree, &grid, Side::Left, depth)?;
        draw_row_labels(root, &grid, &labels, &style)?;
        draw_col_labels(root, &grid, &labels, &style)?;
        draw_colour_key(
            root,
            grid.right() + label_w + 8.0,
            grid.top,
            grid.height.min(200.0),
            (0.0, max_d),
            palette::distance,
            &style,
        )?;
        Ok(())
    })
}

/// Expression of the top genes. Rows follow the given gene order, columns
/// the sample order; neither is clustered. A strip above the grid marks
/// treatment and layout of each sample.
pub fn top_genes_heatmap(
    values: &Array2<f64>,
    gene_ids: &[String],
    design: &SampleDesign,
    display: &DisplayConfig,
    path: &Path,
) -> Result<()> {
    let grid_shape = (values.nrows(), values.ncols());
    if gene_ids.len() != grid_shape.0 || design.n_samples() != grid_shape.1 {
        return Err(DeseqError::export(path, "expression matrix does not match its labels"));
    }
    if grid_shape.0 == 0 || grid_shape.1 == 0 {
        return Err(DeseqError::export(path, "heatmap has no cells"));
    }
    let range = super::padded_range(values.iter().copied(), 0.0).unwrap_or((0.0, 1.0));
    let sample_ids = design.sample_ids();
    let (w, h) = (display.width as f64, display.height as f64);

    render(path, display, |root| {
        let style: TextStyle = font(display, 0.8).into();
        let row_w = widest(root, gene_ids, &style)?.max(widest(root, &["treatment".into()], &style)?) + 12.0;
        let col_h = widest(root, &sample_ids, &style)? + 12.0;
        let top = title_height(display) + display.font_size as f64 * 1.5 + 2.0 * ANNOTATION_HEIGHT + 6.0;
        let grid = Grid {
            left: MARGIN * 2.0,
            top,
            width: (w - MARGIN * 3.0 - row_w - KEY_WIDTH).max(10.0),
            height: (h - top - col_h - MARGIN).max(10.0),
            rows: grid_shape.0,
            cols: grid_shape.1,
        };

        draw_title(root, "Top genes by adjusted p-value", display)?;

        // annotation strip: treatment row then layout row
        let strip_top = grid.top - 2.0 * ANNOTATION_HEIGHT - 4.0;
        for (c, record) in design.records().iter().enumerate() {
            let [(x0, _), (x1, _)] = grid.cell(0, c);
            for (k, colour) in [palette::treatment(record.treatment), palette::layout(record.layout)]
                .into_iter()
                .enumerate()
            {
                let y = strip_top + k as f64 * ANNOTATION_HEIGHT;
                root.draw(&Rectangle::new(
                    [(x0, y as i32), (x1, (y + ANNOTATION_HEIGHT - 1.0) as i32)],
                    colour.filled(),
                ))?;
            }
        }
        let strip = Grid {
            top: strip_top,
            height: 2.0 * ANNOTATION_HEIGHT,
            rows: 2,
            ..grid
        };
        draw_row_labels(root, &strip, &["treatment".into(), "layout".into()], &style)?;

        // annotation legend under the title
        let mut x = grid.left;
        let legend_y = title_height(display);
        let mut entries: Vec<(String, RGBColor)> = Vec::new();
        for t in [crate::data::Treatment::Untreated, crate::data::Treatment::Treated] {
            entries.push((t.to_string(), palette::treatment(t)));
        }
        for l in design.layout_levels() {
            entries.push((l.to_string(), palette::layout(l)));
        }
        for (name, colour) in entries {
            root.draw(&Rectangle::new(
                [(x as i32, legend_y as i32), ((x + 10.0) as i32, (legend_y + 10.0) as i32)],
                colour.filled(),
            ))?;
            root.draw(&Text::new(name.clone(), ((x + 14.0) as i32, legend_y as i32), style.clone()))?;
            x += 24.0 + root.estimate_text_size(&name, &style)?.0 as f64;
        }

        draw_cells(root, &grid, |r, c| {
            let (lo, hi) = range;
            palette::expression((values[[r, c]] - lo) / (hi - lo))
        })?;
        draw_row_labels(root, &grid, gene_ids, &style)?;
        draw_col_labels(root, &grid, &sample_ids, &style)?;
        draw_colour_key(
            root,
            grid.right() + row_w + 8.0,
            grid.top,
            grid.height.min(200.0),
            range,
            palette::expression,
            &style,
        )?;
        Ok(())
    })
}

/// Row z-scores on a diverging scale symmetric around zero
pub fn zscore_heatmap(z: &ZScoreMatrix, sample_ids: &[String], display: &DisplayConfig, path: &Path) -> Result<()> {
    if z.data.ncols() != sample_ids.len() {
        return Err(DeseqError::export(path, "z-score matrix does not match the sample ids"));
    }
    let max_abs = z.data.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-12);
    let (w, h) = (display.width as f64, display.height as f64);

    render(path, display, |root| {
        draw_title(root, "Top genes, row z-scores", display)?;
        let style: TextStyle = font(display, 0.8).into();
        if z.data.nrows() == 0 {
            let centred = style.pos(Pos::new(HPos::Center, VPos::Center));
            root.draw(&Text::new(
                "no genes with non-zero variance".to_string(),
                ((w / 2.0) as i32, (h / 2.0) as i32),
                centred,
            ))?;
            return Ok(());
        }
        let row_w = widest(root, &z.gene_ids, &style)? + 12.0;
        let col_h = widest(root, sample_ids, &style)? + 12.0;
        let top = title_height(display) + 6.0;
        let grid = Grid {
            left: MARGIN * 2.0,
            top,
            width: (w - MARGIN * 3.0 - row_w - KEY_WIDTH).max(10.0),
            height: (h - top - col_h - MARGIN).max(10.0),
            rows: z.data.nrows(),
            cols: z.data.ncols(),
        };
        draw_cells(root, &grid, |r, c| palette::diverging(z.data[[r, c]] / max_abs))?;
        draw_row_labels(root, &grid, &z.gene_ids, &style)?;
        draw_col_labels(root, &grid, sample_ids, &style)?;
        draw_colour_key(
            root,
            grid.right() + row_w + 8.0,
            grid.top,
            grid.height.min(200.0),
            (-max_abs, max_abs),
            |t| palette::diverging(2.0 * t - 1.0),
            &style,
        )?;
        Ok(())
    })
}
