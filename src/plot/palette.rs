//! Colours shared by the chart recipes

use plotters::style::RGBColor;

use crate::data::{LibraryLayout, Treatment};
use crate::shrinkage::Direction;

pub const UP: RGBColor = RGBColor(214, 39, 40);
pub const DOWN: RGBColor = RGBColor(31, 119, 180);
pub const NOT_SIGNIFICANT: RGBColor = RGBColor(170, 170, 170);
pub const TREND: RGBColor = RGBColor(220, 20, 20);
pub const FINAL: RGBColor = RGBColor(30, 80, 220);

pub fn direction(d: Direction) -> RGBColor {
    match d {
        Direction::Up => UP,
        Direction::Down => DOWN,
        Direction::No => NOT_SIGNIFICANT,
    }
}

pub fn treatment(t: Treatment) -> RGBColor {
    match t {
        Treatment::Untreated => RGBColor(0, 158, 115),
        Treatment::Treated => RGBColor(230, 159, 0),
    }
}

pub fn layout(l: LibraryLayout) -> RGBColor {
    match l {
        LibraryLayout::Paired => RGBColor(86, 180, 233),
        LibraryLayout::Single => RGBColor(204, 121, 167),
    }
}

fn lerp(a: RGBColor, b: RGBColor, t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Dark blue at 0 through white at 1, for distances
pub fn distance(t: f64) -> RGBColor {
    lerp(RGBColor(8, 48, 107), RGBColor(247, 251, 255), t)
}

/// Pale yellow at 0 through dark red at 1, for expression levels
pub fn expression(t: f64) -> RGBColor {
    // NaN falls to the low end
    if t.is_nan() || t < 0.5 {
        lerp(RGBColor(255, 255, 204), RGBColor(253, 141, 60), t * 2.0)
    } else {
        lerp(RGBColor(253, 141, 60), RGBColor(128, 0, 38), (t - 0.5) * 2.0)
    }
}

/// Blue at -1, white at 0, red at +1
pub fn diverging(t: f64) -> RGBColor {
    let white = RGBColor(255, 255, 255);
    if t < 0.0 {
        lerp(white, RGBColor(49, 54, 149), -t)
    } else {
        lerp(white, RGBColor(165, 0, 38), t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales_hit_endpoints() {
        assert_eq!(distance(0.0), RGBColor(8, 48, 107));
        assert_eq!(distance(1.0), RGBColor(247, 251, 255));
        assert_eq!(diverging(0.0), RGBColor(255, 255, 255));
        assert_eq!(diverging(-1.0), RGBColor(49, 54, 149));
        assert_eq!(diverging(3.0), RGBColor(165, 0, 38));
        assert_eq!(expression(f64::NAN), RGBColor(255, 255, 204));
    }

    #[test]
    fn test_non_finite_values_clamp_to_scale_ends() {
        assert_eq!(expression(0.0), RGBColor(255, 255, 204));
        assert_eq!(expression(1.0), RGBColor(128, 0, 38));
        assert_eq!(expression(f64::INFINITY), RGBColor(128, 0, 38));
        assert_eq!(expression(f64::NEG_INFINITY), RGBColor(255, 255, 204));
        assert_eq!(distance(f64::NAN), RGBColor(8, 48, 107));
        assert_eq!(diverging(f64::NAN), RGBColor(255, 255, 255));
    }

    #[test]
    fn test_direction_colours_are_distinct() {
        assert_ne!(direction(Direction::Up), direction(Direction::Down));
        assert_eq!(direction(Direction::No), NOT_SIGNIFICANT);
    }
}
