use eframe::egui::Color32;
use palette::{Mix, Srgb};

/// Floating point colour with channels in `[0, 1]`.
pub type Rgb = Srgb<f32>;

pub fn to_color32(c: Rgb) -> Color32 {
    let c: Srgb<u8> = c.into_format();
    Color32::from_rgb(c.red, c.green, c.blue)
}

// ---------------------------------------------------------------------------
// Inferno ramp
// ---------------------------------------------------------------------------

/// Polynomial fit of matplotlib's "inferno" colour map, `t` in `[0, 1]`.
pub fn inferno(t: f32) -> Rgb {
    const C: [[f32; 3]; 7] = [
        [0.000_218_940_37, 0.001_651_004_6, -0.019_480_898],
        [0.106_513_42, 0.563_956_44, 3.932_712_4],
        [11.602_493, -3.972_854, -15.942_394],
        [-41.703_996, 17.436_399, 44.354_145],
        [77.162_94, -33.402_36, -81.807_31],
        [-71.319_43, 32.626_064, 73.209_52],
        [25.131_126, -12.242_669, -23.070_326],
    ];
    let t = t.clamp(0.0, 1.0);
    let mut rgb = [0.0f32; 3];
    for (ch, out) in rgb.iter_mut().enumerate() {
        // Horner evaluation, highest degree first.
        *out = C.iter().rev().fold(0.0, |acc, c| acc * t + c[ch]).clamp(0.0, 1.0);
    }
    Rgb::new(rgb[0], rgb[1], rgb[2])
}

// ---------------------------------------------------------------------------
// Colour ramp: scalar value → colour
// ---------------------------------------------------------------------------

/// One `(value, colour)` control point of a [`ColorRamp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPoint {
    pub value: f64,
    pub color: Rgb,
}

/// Piecewise linear colour transfer function.
///
/// Interpolation runs between *adjacent* points in insertion order, so the
/// values are expected to be non-decreasing; this is not checked. Values
/// outside the ramp are clamped to the end colours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorRamp {
    points: Vec<ColorPoint>,
}

impl ColorRamp {
    pub fn new(points: Vec<ColorPoint>) -> Self {
        Self { points }
    }

    /// The "inferno16" ramp: 16 inferno samples spread evenly over `range`.
    pub fn inferno16((min, max): (f64, f64)) -> Self {
        const STEPS: usize = 16;
        let points = (0..STEPS)
            .map(|i| {
                let t = i as f64 / (STEPS - 1) as f64;
                ColorPoint {
                    value: min + (max - min) * t,
                    color: inferno(t as f32),
                }
            })
            .collect();
        Self { points }
    }

    pub fn add_point(&mut self, value: f64, color: Rgb) {
        self.points.push(ColorPoint { value, color });
    }

    pub fn points(&self) -> &[ColorPoint] {
        &self.points
    }

    /// Value range covered by the first and last control points.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.points.first()?.value, self.points.last()?.value))
    }

    pub fn color_at(&self, value: f64) -> Rgb {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Rgb::new(1.0, 1.0, 1.0);
        };
        if value <= first.value {
            return first.color;
        }
        if value >= last.value {
            return last.color;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.value <= value && value <= b.value {
                let span = b.value - a.value;
                if span <= 0.0 {
                    return b.color;
                }
                let t = ((value - a.value) / span) as f32;
                return a.color.mix(b.color, t);
            }
        }
        last.color
    }
}

// ---------------------------------------------------------------------------
// Mapping stage configuration
// ---------------------------------------------------------------------------

/// How the colour-map stage turns vertex scalars into colours.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorMapping {
    /// Shared value → colour ramp.
    Ramp(ColorRamp),
    /// Single-entry lookup table: every vertex gets this colour.
    Flat(Rgb),
}

impl ColorMapping {
    pub fn color_for(&self, value: f64) -> Color32 {
        match self {
            ColorMapping::Ramp(ramp) => to_color32(ramp.color_at(value)),
            ColorMapping::Flat(c) => to_color32(*c),
        }
    }

    pub fn ramp(&self) -> Option<&ColorRamp> {
        match self {
            ColorMapping::Ramp(ramp) => Some(ramp),
            ColorMapping::Flat(_) => None,
        }
    }

    /// Return `n` evenly spaced `(value, colour)` stops for a scalar bar.
    pub fn legend_entries(&self, n: usize) -> Vec<(f64, Color32)> {
        let Some((min, max)) = self.ramp().and_then(ColorRamp::range) else {
            return Vec::new();
        };
        let n = n.max(2);
        (0..n)
            .map(|i| {
                let v = min + (max - min) * i as f64 / (n - 1) as f64;
                (v, self.color_for(v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_point() -> ColorRamp {
        let mut ramp = ColorRamp::default();
        ramp.add_point(0.0, Rgb::new(0.0, 0.0, 0.0));
        ramp.add_point(100.0, Rgb::new(1.0, 0.5, 0.0));
        ramp
    }

    #[test]
    fn ramp_interpolates_between_neighbours() {
        let c = two_point().color_at(50.0);
        assert_relative_eq!(c.red, 0.5, epsilon = 1e-6);
        assert_relative_eq!(c.green, 0.25, epsilon = 1e-6);
        assert_relative_eq!(c.blue, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn ramp_clamps_outside_range() {
        let ramp = two_point();
        assert_eq!(ramp.color_at(-10.0), Rgb::new(0.0, 0.0, 0.0));
        assert_eq!(ramp.color_at(1e9), Rgb::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn ramp_follows_insertion_order() {
        let mut ramp = two_point();
        ramp.add_point(200.0, Rgb::new(0.0, 0.0, 1.0));
        let c = ramp.color_at(150.0);
        assert_relative_eq!(c.red, 0.5, epsilon = 1e-6);
        assert_relative_eq!(c.blue, 0.5, epsilon = 1e-6);
        assert_eq!(ramp.range(), Some((0.0, 200.0)));
    }

    #[test]
    fn inferno16_spans_range() {
        let ramp = ColorRamp::inferno16((10.0, 310.0));
        assert_eq!(ramp.points().len(), 16);
        assert_eq!(ramp.range(), Some((10.0, 310.0)));
        assert_relative_eq!(ramp.points()[1].value, 30.0, epsilon = 1e-9);
        // Dark at the low end, bright yellow at the high end.
        let lo = ramp.points()[0].color;
        let hi = ramp.points()[15].color;
        assert!(lo.red < 0.05 && lo.green < 0.05);
        assert!(hi.red > 0.9 && hi.green > 0.9);
    }

    #[test]
    fn flat_mapping_ignores_value() {
        let m = ColorMapping::Flat(Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(m.color_for(-5.0), Color32::from_rgb(255, 0, 0));
        assert_eq!(m.color_for(5000.0), Color32::from_rgb(255, 0, 0));
        assert!(m.legend_entries(8).is_empty());
    }

    #[test]
    fn legend_entries_cover_ramp() {
        let m = ColorMapping::Ramp(two_point());
        let stops = m.legend_entries(5);
        assert_eq!(stops.len(), 5);
        assert_eq!(stops[0].0, 0.0);
        assert_eq!(stops[4].0, 100.0);
        assert_eq!(stops[4].1.r(), 255);
        assert_eq!(stops[4].1.b(), 0);
    }
}
