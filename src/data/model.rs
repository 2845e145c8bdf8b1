use std::fmt;

// ---------------------------------------------------------------------------
// Axis – one of the three grid directions
// ---------------------------------------------------------------------------

/// A world-space axis. Used to index per-axis arrays (`[T; 3]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

// ---------------------------------------------------------------------------
// ScalarVolume – the loaded image data
// ---------------------------------------------------------------------------

/// A regular 3D grid of scalar samples, immutable once loaded.
///
/// Samples are stored with `x` varying fastest, then `y`, then `z`
/// (the VTK point ordering). Point `(i, j, k)` sits at
/// `origin + (i, j, k) * spacing` in world space.
#[derive(Debug, Clone)]
pub struct ScalarVolume {
    /// Number of points along each axis.
    pub dims: [usize; 3],
    /// World position of point `(0, 0, 0)`.
    pub origin: [f64; 3],
    /// Distance between neighbouring points along each axis.
    pub spacing: [f64; 3],
    values: Vec<f32>,
    range: (f64, f64),
}

impl ScalarVolume {
    /// Build a volume, computing its scalar range. Returns `None` when the
    /// sample count does not match `dims`.
    pub fn new(
        dims: [usize; 3],
        origin: [f64; 3],
        spacing: [f64; 3],
        values: Vec<f32>,
    ) -> Option<Self> {
        if dims.iter().product::<usize>() != values.len() {
            return None;
        }
        let range = compute_range(&values);
        Some(Self {
            dims,
            origin,
            spacing,
            values,
            range,
        })
    }

    /// Build a volume by evaluating `f(x, y, z)` at every world-space point.
    pub fn from_fn(
        dims: [usize; 3],
        origin: [f64; 3],
        spacing: [f64; 3],
        mut f: impl FnMut(f64, f64, f64) -> f32,
    ) -> Self {
        let mut values = Vec::with_capacity(dims.iter().product());
        for k in 0..dims[2] {
            let z = origin[2] + k as f64 * spacing[2];
            for j in 0..dims[1] {
                let y = origin[1] + j as f64 * spacing[1];
                for i in 0..dims[0] {
                    let x = origin[0] + i as f64 * spacing[0];
                    values.push(f(x, y, z));
                }
            }
        }
        let range = compute_range(&values);
        Self {
            dims,
            origin,
            spacing,
            values,
            range,
        }
    }

    /// `(min, max)` over all non-NaN samples; `(0, 0)` for an empty volume.
    pub fn scalar_range(&self) -> (f64, f64) {
        self.range
    }

    /// Isovalue used when none is given: the midpoint of the scalar range,
    /// rounded down to an integer.
    pub fn default_isovalue(&self) -> i32 {
        midpoint_isovalue(self.range)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize) -> f32 {
        self.values[self.index(i, j, k)]
    }

    /// World-space position of grid point `(i, j, k)`.
    #[inline]
    pub fn point(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            self.origin[0] + i as f64 * self.spacing[0],
            self.origin[1] + j as f64 * self.spacing[1],
            self.origin[2] + k as f64 * self.spacing[2],
        ]
    }

    /// Axis-aligned world bounds as `(min, max)` corners.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for a in 0..3 {
            let extent = self.dims[a].saturating_sub(1) as f64 * self.spacing[a];
            let (p, q) = (self.origin[a], self.origin[a] + extent);
            lo[a] = p.min(q);
            hi[a] = p.max(q);
        }
        (lo, hi)
    }

    /// Trilinear interpolation at a world-space position.
    ///
    /// Returns `None` outside the grid (a small tolerance absorbs rounding on
    /// the boundary faces).
    pub fn sample(&self, p: [f64; 3]) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        const TOL: f64 = 1e-6;
        let mut base = [0usize; 3];
        let mut frac = [0.0f64; 3];
        for a in 0..3 {
            let n = self.dims[a];
            if self.spacing[a] == 0.0 || n == 1 {
                if (p[a] - self.origin[a]).abs() > TOL {
                    return None;
                }
                continue;
            }
            let t = (p[a] - self.origin[a]) / self.spacing[a];
            let last = (n - 1) as f64;
            if t < -TOL || t > last + TOL {
                return None;
            }
            let t = t.clamp(0.0, last);
            let cell = (t.floor() as usize).min(n - 2);
            base[a] = cell;
            frac[a] = t - cell as f64;
        }

        let step = |a: usize| usize::from(self.dims[a] > 1);
        let [i, j, k] = base;
        let (di, dj, dk) = (step(0), step(1), step(2));
        let [fx, fy, fz] = frac;

        let c = |ii: usize, jj: usize, kk: usize| self.value(ii, jj, kk) as f64;
        let c00 = c(i, j, k) * (1.0 - fx) + c(i + di, j, k) * fx;
        let c10 = c(i, j + dj, k) * (1.0 - fx) + c(i + di, j + dj, k) * fx;
        let c01 = c(i, j, k + dk) * (1.0 - fx) + c(i + di, j, k + dk) * fx;
        let c11 = c(i, j + dj, k + dk) * (1.0 - fx) + c(i + di, j + dj, k + dk) * fx;
        let c0 = c00 * (1.0 - fy) + c10 * fy;
        let c1 = c01 * (1.0 - fy) + c11 * fy;
        Some((c0 * (1.0 - fz) + c1 * fz) as f32)
    }

    /// Central-difference gradient magnitude (one-sided on the faces).
    pub fn gradient_magnitude(&self) -> ScalarVolume {
        let [nx, ny, nz] = self.dims;
        let mut values = Vec::with_capacity(self.len());
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let mut sum = 0.0f64;
                    for (a, n) in [nx, ny, nz].into_iter().enumerate() {
                        if n < 2 || self.spacing[a] == 0.0 {
                            continue;
                        }
                        let idx = [i, j, k];
                        let lo = idx[a].saturating_sub(1);
                        let hi = (idx[a] + 1).min(n - 1);
                        let mut p = idx;
                        let mut q = idx;
                        p[a] = lo;
                        q[a] = hi;
                        let dv = self.value(q[0], q[1], q[2]) as f64
                            - self.value(p[0], p[1], p[2]) as f64;
                        let d = dv / ((hi - lo) as f64 * self.spacing[a]);
                        sum += d * d;
                    }
                    values.push(sum.sqrt() as f32);
                }
            }
        }
        let range = compute_range(&values);
        ScalarVolume {
            dims: self.dims,
            origin: self.origin,
            spacing: self.spacing,
            values,
            range,
        }
    }
}

/// `floor((min + max) / 2)` as an integer isovalue.
pub fn midpoint_isovalue((min, max): (f64, f64)) -> i32 {
    ((min + max) / 2.0).floor() as i32
}

fn compute_range(values: &[f32]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        (0.0, 0.0)
    } else {
        (lo as f64, hi as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_x() -> ScalarVolume {
        ScalarVolume::from_fn([4, 3, 2], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0], |x, _, _| {
            (x * 10.0) as f32
        })
    }

    #[test]
    fn new_rejects_mismatched_sample_count() {
        assert!(ScalarVolume::new([2, 2, 2], [0.0; 3], [1.0; 3], vec![0.0; 7]).is_none());
        assert!(ScalarVolume::new([2, 2, 2], [0.0; 3], [1.0; 3], vec![0.0; 8]).is_some());
    }

    #[test]
    fn scalar_range_skips_nan() {
        let vol = ScalarVolume::new(
            [2, 2, 1],
            [0.0; 3],
            [1.0; 3],
            vec![3.0, f32::NAN, -1.0, 7.5],
        )
        .unwrap();
        assert_eq!(vol.scalar_range(), (-1.0, 7.5));
    }

    #[test]
    fn default_isovalue_is_floored_midpoint() {
        assert_eq!(midpoint_isovalue((0.0, 2000.0)), 1000);
        assert_eq!(midpoint_isovalue((0.0, 1.0)), 0);
        assert_eq!(midpoint_isovalue((3.0, 4.0)), 3);
        assert_eq!(midpoint_isovalue((-1024.0, 3071.0)), 1023);
        assert_eq!(midpoint_isovalue((-3.0, 0.0)), -2);
        for lo in -5..5 {
            for hi in lo..lo + 7 {
                let expected = ((lo + hi) as f64 / 2.0).floor() as i32;
                assert_eq!(midpoint_isovalue((lo as f64, hi as f64)), expected);
            }
        }
    }

    #[test]
    fn point_ordering_is_x_fastest() {
        let vol = ramp_x();
        assert_eq!(vol.index(1, 0, 0), 1);
        assert_eq!(vol.index(0, 1, 0), 4);
        assert_eq!(vol.index(0, 0, 1), 12);
        assert_eq!(vol.value(3, 2, 1), 30.0);
    }

    #[test]
    fn bounds_follow_origin_and_spacing() {
        let vol = ScalarVolume::from_fn([11, 6, 3], [-5.0, 0.0, 2.0], [1.0, 0.5, 2.0], |_, _, _| 0.0);
        assert_eq!(vol.bounds(), ([-5.0, 0.0, 2.0], [5.0, 2.5, 6.0]));
    }

    #[test]
    fn sample_interpolates_linearly() {
        let vol = ramp_x();
        assert_relative_eq!(vol.sample([1.25, 0.5, 0.5]).unwrap(), 12.5, epsilon = 1e-4);
        assert_relative_eq!(vol.sample([3.0, 2.0, 1.0]).unwrap(), 30.0, epsilon = 1e-4);
        assert!(vol.sample([3.5, 0.0, 0.0]).is_none());
        assert!(vol.sample([0.0, -0.1, 0.0]).is_none());
    }

    #[test]
    fn sample_handles_flat_axes() {
        let vol = ScalarVolume::from_fn([3, 3, 1], [0.0; 3], [1.0; 3], |x, y, _| (x + y) as f32);
        assert_relative_eq!(vol.sample([0.5, 1.5, 0.0]).unwrap(), 2.0, epsilon = 1e-5);
        assert!(vol.sample([0.5, 1.5, 0.5]).is_none());
    }

    #[test]
    fn gradient_magnitude_of_linear_field() {
        let vol = ScalarVolume::from_fn([5, 4, 3], [0.0; 3], [2.0, 1.0, 1.0], |x, y, _| {
            (3.0 * x + 4.0 * y) as f32
        });
        let grad = vol.gradient_magnitude();
        assert_eq!(grad.dims, vol.dims);
        for &g in grad.values() {
            assert_relative_eq!(g, 5.0, epsilon = 1e-4);
        }
        assert_relative_eq!(grad.scalar_range().0, 5.0, epsilon = 1e-4);
    }
}
