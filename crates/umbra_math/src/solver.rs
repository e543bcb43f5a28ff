//! Closed-form real roots for monic polynomials up to degree four.
//!
//! Implicit surfaces (tori, blobs) reduce ray intersection to a monic
//! quartic `x⁴ + a₁x³ + a₂x² + a₃x + a₄`. The solvers below return the real
//! roots in a [`Roots`] value. Whenever two or four roots come back, each
//! consecutive pair is already ascending. Callers rely on that to read
//! enter/exit parameters without sorting again.

use std::f64::consts::PI;

use crate::{Interval, EPSILON};

/// Threshold under which a discriminant or coefficient is treated as zero.
pub const SOLVER_EPS: f64 = 1e-12;

/// Ratio above which `a₃` dwarfs a tiny `a₄` and the quartic is treated
/// as having a root at zero.
const TRIVIAL_ROOT_RATIO: f64 = 1e6;

/// Up to four real roots of a polynomial.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Roots {
    pub count: usize,
    pub values: [f64; 4],
}

impl Roots {
    pub const NONE: Roots = Roots {
        count: 0,
        values: [0.0; 4],
    };

    #[inline]
    fn push(&mut self, value: f64) {
        self.values[self.count] = value;
        self.count += 1;
    }

    /// Push an ascending pair.
    #[inline]
    fn push_pair(&mut self, a: f64, b: f64) {
        if a <= b {
            self.push(a);
            self.push(b);
        } else {
            self.push(b);
            self.push(a);
        }
    }

    /// The roots found, in storage order.
    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.count]
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Smallest root in `[EPSILON, max_time]`.
    ///
    /// Roots are scanned according to the ordering guaranteed for each
    /// count, so at most one comparison per pair is needed.
    pub fn closest(&self, max_time: f64) -> Option<f64> {
        let ok = |t: f64| t >= EPSILON && t <= max_time;
        let v = &self.values;
        match self.count {
            1 => Some(v[0]).filter(|&t| ok(t)),
            2 => {
                if ok(v[0]) {
                    Some(v[0])
                } else {
                    Some(v[1]).filter(|&t| ok(t))
                }
            }
            3 => v[..3].iter().copied().filter(|&t| ok(t)).reduce(f64::min),
            4 => {
                let first = if ok(v[0]) {
                    Some(v[0])
                } else {
                    Some(v[1]).filter(|&t| ok(t))
                };
                let second = if ok(v[2]) {
                    Some(v[2])
                } else {
                    Some(v[3]).filter(|&t| ok(t))
                };
                match (first, second) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                }
            }
            _ => None,
        }
    }

    /// Smallest root strictly inside `window`.
    pub fn closest_within(&self, window: Interval) -> Option<f64> {
        self.as_slice()
            .iter()
            .copied()
            .filter(|&t| window.surrounds(t))
            .reduce(f64::min)
    }

    /// Order four roots so they read as two ascending enter/exit pairs
    /// along the ray: `r0 <= r1 <= r2 <= r3`.
    pub fn sort_hits(&mut self) {
        let n = self.count;
        self.values[..n].sort_unstable_by(f64::total_cmp);
    }
}

/// Real roots of `x² + b x + c`.
///
/// A tangent (zero discriminant) yields a repeated root, so the result is
/// either empty or an ascending pair.
pub fn solve_quadratic(b: f64, c: f64) -> Roots {
    let mut roots = Roots::NONE;
    let disc = b * b - 4.0 * c;
    if disc < -SOLVER_EPS {
        return roots;
    }
    let sq = disc.max(0.0).sqrt();
    // Stable form: avoid cancellation between -b and sq.
    let q = -0.5 * (b + b.signum() * sq);
    if q.abs() < SOLVER_EPS {
        let x = -0.5 * b;
        roots.push_pair(x, x);
    } else {
        roots.push_pair(q, c / q);
    }
    roots
}

/// Real roots of `x³ + a1 x² + a2 x + a3`.
///
/// The discriminant of the depressed cubic selects between the
/// trigonometric form (three real roots) and Cardano's form (one real
/// root). A discriminant within [`SOLVER_EPS`] of zero is a tangent: the
/// repeated root is reported twice. Three roots come back fully sorted.
pub fn solve_cubic(a1: f64, a2: f64, a3: f64) -> Roots {
    let mut roots = Roots::NONE;
    let shift = a1 / 3.0;
    let q = (a1 * a1 - 3.0 * a2) / 9.0;
    let r = (2.0 * a1 * a1 * a1 - 9.0 * a1 * a2 + 27.0 * a3) / 54.0;
    let q3 = q * q * q;
    let disc = r * r - q3;

    if disc.abs() <= SOLVER_EPS * (1.0 + q3.abs()) {
        // r² = q³: a simple root and a double one, or a triple root.
        let a = -r.signum() * r.abs().cbrt();
        let (simple, double) = (2.0 * a - shift, -a - shift);
        if simple <= double {
            roots.push(simple);
            roots.push(double);
            roots.push(double);
        } else {
            roots.push(double);
            roots.push(double);
            roots.push(simple);
        }
    } else if disc < 0.0 {
        // Three real roots. q > 0 is implied by r² < q³.
        let theta = (r / q3.sqrt()).clamp(-1.0, 1.0).acos();
        let m = -2.0 * q.sqrt();
        let mut x = [
            m * (theta / 3.0).cos() - shift,
            m * ((theta + 2.0 * PI) / 3.0).cos() - shift,
            m * ((theta - 2.0 * PI) / 3.0).cos() - shift,
        ];
        if x[0] > x[1] {
            x.swap(0, 1);
        }
        if x[1] > x[2] {
            x.swap(1, 2);
            if x[0] > x[1] {
                x.swap(0, 1);
            }
        }
        for value in x {
            roots.push(value);
        }
    } else {
        let a = -r.signum() * (r.abs() + disc.sqrt()).cbrt();
        let b = if a.abs() < SOLVER_EPS { 0.0 } else { q / a };
        roots.push(a + b - shift);
    }
    roots
}

/// Real roots of `x⁴ + a1 x³ + a2 x² + a3 x + a4`.
///
/// Ferrari's method through a resolvent cubic. The degenerate branches,
/// where an intermediate square root argument is within [`SOLVER_EPS`] of
/// zero, are resolved explicitly so no NaN can leak out.
pub fn solve_quartic(a1: f64, a2: f64, a3: f64, a4: f64) -> Roots {
    // A vanishing constant term next to a much larger linear one: x = 0 is
    // a root and the rest is a cubic.
    if a4 == 0.0 || (a4.abs() < SOLVER_EPS && a3.abs() > TRIVIAL_ROOT_RATIO * a4.abs()) {
        let cubic = solve_cubic(a1, a2, a3);
        let mut roots = Roots::NONE;
        for &value in cubic.as_slice() {
            roots.push(value);
        }
        roots.push(0.0);
        roots.sort_hits();
        return roots;
    }

    // Depressed quartic y⁴ + p y² + q y + r with x = y - a1/4.
    let shift = a1 / 4.0;
    let sq_a = a1 * a1;
    let p = -3.0 / 8.0 * sq_a + a2;
    let q = sq_a * a1 / 8.0 - a1 * a2 / 2.0 + a3;
    let r = -3.0 / 256.0 * sq_a * sq_a + sq_a * a2 / 16.0 - a1 * a3 / 4.0 + a4;

    let mut roots = Roots::NONE;
    if r.abs() < SOLVER_EPS {
        // y (y³ + p y + q) = 0
        let cubic = solve_cubic(0.0, p, q);
        for &value in cubic.as_slice() {
            roots.push(value - shift);
        }
        roots.push(-shift);
        roots.sort_hits();
        return roots;
    }

    // Resolvent: z³ - p/2 z² - r z + (r p / 2 - q² / 8) = 0
    let resolvent = solve_cubic(-0.5 * p, -r, 0.5 * r * p - q * q / 8.0);
    // The largest real root keeps both square roots below as real as possible.
    let z = resolvent
        .as_slice()
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let u = z * z - r;
    let v = 2.0 * z - p;
    let u_tol = SOLVER_EPS * (1.0 + z * z + r.abs());
    let v_tol = SOLVER_EPS * (1.0 + z.abs() + p.abs());
    let u = if u.abs() < u_tol {
        0.0
    } else if u > 0.0 {
        u.sqrt()
    } else {
        return roots;
    };
    let v = if v.abs() < v_tol {
        0.0
    } else if v > 0.0 {
        v.sqrt()
    } else {
        return roots;
    };

    let (v1, v2) = if q < 0.0 { (-v, v) } else { (v, -v) };
    for pair in [solve_quadratic(v1, z - u), solve_quadratic(v2, z + u)] {
        if pair.count == 2 {
            roots.push_pair(pair.values[0] - shift, pair.values[1] - shift);
        }
    }
    roots
}
