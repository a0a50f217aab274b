//! Non-overlapping placement of point labels
//!
//! Labels start just above their anchor point. Each pass pushes every
//! overlapping pair apart along the axis of least overlap and clamps the
//! boxes to the plotting area, until no pair overlaps or the pass budget is
//! spent.

/// Axis-aligned label box in pixel coordinates, `(x, y)` being the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl LabelBox {
    fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Overlap extents along x and y; both positive means the boxes intersect
    fn overlap(&self, other: &LabelBox) -> (f64, f64) {
        let ox = (self.x + self.w).min(other.x + other.w) - self.x.max(other.x);
        let oy = (self.y + self.h).min(other.y + other.h) - self.y.max(other.y);
        (ox, oy)
    }

    pub fn intersects(&self, other: &LabelBox) -> bool {
        let (ox, oy) = self.overlap(other);
        ox > 0.0 && oy > 0.0
    }
}

/// Plotting-area bounds `(left, top, right, bottom)`
pub type Bounds = (f64, f64, f64, f64);

const PADDING: f64 = 2.0;

fn clamp(b: &mut LabelBox, bounds: Bounds) {
    let (left, top, right, bottom) = bounds;
    b.x = b.x.max(left).min((right - b.w).max(left));
    b.y = b.y.max(top).min((bottom - b.h).max(top));
}

/// Place labels of the given `(width, height)` near their `anchors`.
///
/// Returns one box per label, in input order.
pub fn repel(anchors: &[(f64, f64)], sizes: &[(f64, f64)], bounds: Bounds, max_passes: usize) -> Vec<LabelBox> {
    let mut boxes: Vec<LabelBox> = anchors
        .iter()
        .zip(sizes)
        .map(|(&(ax, ay), &(w, h))| {
            let mut b = LabelBox {
                x: ax - w / 2.0,
                y: ay - h - PADDING * 2.0,
                w,
                h,
            };
            clamp(&mut b, bounds);
            b
        })
        .collect();

    for pass in 0..max_passes {
        let mut moved = false;
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                let (ox, oy) = boxes[i].overlap(&boxes[j]);
                if ox <= 0.0 || oy <= 0.0 {
                    continue;
                }
                moved = true;
                let (ci, cj) = (boxes[i].center(), boxes[j].center());
                if ox < oy {
                    let shift = (ox + PADDING) / 2.0;
                    let sign = if ci.0 <= cj.0 { 1.0 } else { -1.0 };
                    boxes[i].x -= sign * shift;
                    boxes[j].x += sign * shift;
                } else {
                    let shift = (oy + PADDING) / 2.0;
                    let sign = if ci.1 <= cj.1 { 1.0 } else { -1.0 };
                    boxes[i].y -= sign * shift;
                    boxes[j].y += sign * shift;
                }
                clamp(&mut boxes[i], bounds);
                clamp(&mut boxes[j], bounds);
            }
        }
        if !moved {
            log::debug!("label repel settled after {} passes", pass);
            break;
        }
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stacked_labels_are_separated() {
        let anchors = vec![(200.0, 200.0); 5];
        let sizes = vec![(60.0, 12.0); 5];
        let boxes = repel(&anchors, &sizes, (0.0, 0.0, 400.0, 400.0), 200);
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                assert!(!boxes[i].intersects(&boxes[j]), "{:?} {:?}", boxes[i], boxes[j]);
            }
        }
    }

    #[test]
    fn test_boxes_stay_inside_bounds() {
        let anchors = vec![(2.0, 3.0), (398.0, 399.0)];
        let sizes = vec![(50.0, 10.0); 2];
        for b in repel(&anchors, &sizes, (0.0, 0.0, 400.0, 400.0), 10) {
            assert!(b.x >= 0.0 && b.x + b.w <= 400.0);
            assert!(b.y >= 0.0 && b.y + b.h <= 400.0);
        }
    }

    #[test]
    fn test_isolated_label_sits_above_anchor() {
        let b = repel(&[(100.0, 100.0)], &[(40.0, 10.0)], (0.0, 0.0, 400.0, 400.0), 10)[0];
        assert_eq!(b.x, 80.0);
        assert!(b.y + b.h < 100.0);
    }
}
