#![allow(dead_code)]

//! 2-D escape-time fractal patterns: the Julia and Mandelbrot families in
//! their quadratic, cubic, quartic and general-exponent forms, plus the two
//! magnet formulas in both m- and j-variants.
//!
//! All of them iterate in the pattern's x/y plane, track the minimum orbit
//! distance for interior colouring, and colour the exterior from the
//! iteration count or the escape position.

use lazy_static::lazy_static;

use crate::math::{Vector2, Vector3};

pub const FRACTAL_MAX_EXPONENT: usize = 33;

/// How escaped points map to a pattern value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExteriorColouring {
    pub mode: u8,
    pub factor: f64,
}

impl Default for ExteriorColouring {
    fn default() -> ExteriorColouring {
        ExteriorColouring {
            mode: 1,
            factor: 1.0,
        }
    }
}

/// How trapped points map to a pattern value.
#[derive(Debug, Clone, PartialEq)]
pub struct InteriorColouring {
    pub mode: u8,
    pub factor: f64,
}

impl Default for InteriorColouring {
    fn default() -> InteriorColouring {
        InteriorColouring {
            mode: 0,
            factor: 1.0,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FractalKind {
    Julia,
    Julia3,
    Julia4,
    JuliaX,
    Mandel,
    Mandel3,
    Mandel4,
    MandelX,
    Magnet1M,
    Magnet1J,
    Magnet2M,
    Magnet2J,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FractalParams {
    pub kind: FractalKind,
    /// Seed (cr, ci) for the Julia and magnet-j variants.
    pub coord: Vector2,
    pub iterations: u32,
    /// Exponent for the JuliaX/MandelX variants (2..=33).
    pub exponent: u32,
    pub exterior: ExteriorColouring,
    pub interior: InteriorColouring,
}

impl FractalParams {
    pub fn new(kind: FractalKind) -> FractalParams {
        FractalParams {
            kind,
            coord: Vector2::new(0.0, 0.0),
            iterations: 64,
            exponent: 2,
            exterior: ExteriorColouring::default(),
            interior: InteriorColouring::default(),
        }
    }
}

lazy_static! {
    /// Pascal's triangle with the sign pattern of (a+bi)^n expansions
    /// folded in, rows 0..=33, flattened.
    static ref BINOMIAL_COEFFICIENTS: Vec<i64> = {
        let n = FRACTAL_MAX_EXPONENT + 1;
        let mut table = vec![0i64; n * (n + 1) / 2];
        let idx = |row: usize, col: usize| row * (row + 1) / 2 + col;

        for row in 0..n {
            table[idx(row, 0)] = 1;
            for col in 1..row {
                table[idx(row, col)] = table[idx(row - 1, col - 1)] + table[idx(row - 1, col)];
            }
            table[idx(row, row)] = 1;
        }
        // Alternate signs: the k-th term of the expansion carries i^k.
        for row in 1..n {
            for col in 0..=row {
                if (col & 2) != 0 {
                    table[idx(row, col)] = -table[idx(row, col)];
                }
            }
        }
        table
    };
}

fn binomial_row(exponent: usize) -> &'static [i64] {
    let start = exponent * (exponent + 1) / 2;
    &BINOMIAL_COEFFICIENTS[start..start + exponent + 1]
}

fn exterior_colour(params: &FractalParams, iters: u32, a: f64, b: f64) -> f64 {
    let e = &params.exterior;
    match e.mode {
        0 => e.factor,
        1 => iters as f64 / params.iterations as f64,
        2 => a * e.factor,
        3 => b * e.factor,
        4 => a * a * e.factor,
        5 => b * b * e.factor,
        6 => (a * a + b * b).sqrt() * e.factor,
        7 => {
            // Range 0 .. (n-1)/n.
            let m = e.factor as u32;
            (iters % m.max(1)) as f64 / e.factor
        }
        _ => {
            // Range 0 .. 1.
            let m = 1 + e.factor as u32;
            (iters % m.max(1)) as f64 / e.factor
        }
    }
}

fn interior_colour(params: &FractalParams, a: f64, b: f64, mindist2: f64) -> f64 {
    let i = &params.interior;
    match i.mode {
        0 => i.factor,
        1 => mindist2.sqrt() * i.factor,
        2 => a * i.factor,
        3 => b * i.factor,
        4 => a * a * i.factor,
        5 => b * b * i.factor,
        _ => a * a + b * b * i.factor,
    }
}

/// z <- z^2 + c iteration with both start/constant choices.
fn iterate_quadratic(params: &FractalParams, z0: Vector2, c: Vector2) -> f64 {
    let (cr, ci) = (c.x, c.y);
    let mut a = z0.x;
    let mut b = z0.y;
    let mut a2 = a * a;
    let mut b2 = b * b;
    let mut mindist2 = a2 + b2;

    for col in 0..params.iterations {
        b = 2.0 * a * b + ci;
        a = a2 - b2 + cr;
        a2 = a * a;
        b2 = b * b;
        let dist2 = a2 + b2;
        if dist2 < mindist2 {
            mindist2 = dist2;
        }
        if dist2 > 4.0 {
            return exterior_colour(params, col, a, b);
        }
    }
    interior_colour(params, a, b, mindist2)
}

fn iterate_cubic(params: &FractalParams, z0: Vector2, c: Vector2) -> f64 {
    let (cr, ci) = (c.x, c.y);
    let mut a = z0.x;
    let mut b = z0.y;
    let mut a2 = a * a;
    let mut b2 = b * b;
    let mut mindist2 = a2 + b2;

    for col in 0..params.iterations {
        let new_b = 3.0 * a2 * b - b2 * b + ci;
        let new_a = a2 * a - 3.0 * a * b2 + cr;
        a = new_a;
        b = new_b;
        a2 = a * a;
        b2 = b * b;
        let dist2 = a2 + b2;
        if dist2 < mindist2 {
            mindist2 = dist2;
        }
        if dist2 > 4.0 {
            return exterior_colour(params, col, a, b);
        }
    }
    interior_colour(params, a, b, mindist2)
}

fn iterate_quartic(params: &FractalParams, z0: Vector2, c: Vector2) -> f64 {
    let (cr, ci) = (c.x, c.y);
    let mut a = z0.x;
    let mut b = z0.y;
    let mut a2 = a * a;
    let mut b2 = b * b;
    let mut mindist2 = a2 + b2;

    for col in 0..params.iterations {
        let new_b = 4.0 * (a2 * a * b - a * b2 * b) + ci;
        let new_a = a2 * a2 - 6.0 * a2 * b2 + b2 * b2 + cr;
        a = new_a;
        b = new_b;
        a2 = a * a;
        b2 = b * b;
        let dist2 = a2 + b2;
        if dist2 < mindist2 {
            mindist2 = dist2;
        }
        if dist2 > 4.0 {
            return exterior_colour(params, col, a, b);
        }
    }
    interior_colour(params, a, b, mindist2)
}

/// General z^n + c using the precomputed signed binomials.
fn iterate_general(params: &FractalParams, z0: Vector2, c: Vector2) -> f64 {
    let exponent = params.exponent.min(FRACTAL_MAX_EXPONENT as u32) as usize;
    let coeff = binomial_row(exponent);
    let (cr, ci) = (c.x, c.y);
    let mut a = z0.x;
    let mut b = z0.y;
    let mut mindist2 = a * a + b * b;

    for col in 0..params.iterations {
        let mut new_a = a.powi(exponent as i32);
        let mut k = 2;
        while k <= exponent {
            new_a += coeff[k] as f64 * a.powi((exponent - k) as i32) * b.powi(k as i32);
            k += 2;
        }
        let mut new_b = 0.0;
        let mut l = 1;
        while l <= exponent {
            new_b += coeff[l] as f64 * a.powi((exponent - l) as i32) * b.powi(l as i32);
            l += 2;
        }

        a = new_a + cr;
        b = new_b + ci;

        let dist2 = a * a + b * b;
        if dist2 < mindist2 {
            mindist2 = dist2;
        }
        if dist2 > 4.0 {
            return exterior_colour(params, col, a, b);
        }
    }
    interior_colour(params, a, b, mindist2)
}

/// Magnet formula 1: z <- ((z² + c - 1) / (2z + c - 2))².
fn iterate_magnet1(params: &FractalParams, z0: Vector2, c: Vector2, m_variant: bool) -> f64 {
    let (cr, ci) = (c.x, c.y);
    let mut a = z0.x;
    let mut b = z0.y;
    let mut a2 = a * a;
    let mut b2 = b * b;
    let mut mindist2 = if m_variant { 10000.0 } else { a2 + b2 };

    for col in 0..params.iterations {
        let tmp1r = a2 - b2 + cr - 1.0;
        let tmp1i = 2.0 * a * b + ci;
        let tmp2r = 2.0 * a + cr - 2.0;
        let tmp2i = 2.0 * b + ci;
        let tmp = tmp2r * tmp2r + tmp2i * tmp2i;
        a = (tmp1r * tmp2r + tmp1i * tmp2i) / tmp;
        b = (tmp1i * tmp2r - tmp1r * tmp2i) / tmp;
        b2 = b * b;
        b = 2.0 * a * b;
        a = a * a - b2;

        a2 = a * a;
        b2 = b * b;
        let dist2 = a2 + b2;
        if dist2 < mindist2 {
            mindist2 = dist2;
        }
        let conv = a - 1.0;
        if dist2 > 10000.0 || conv * conv + b2 < 1.0 / 10000.0 {
            return exterior_colour(params, col, a, b);
        }
    }
    interior_colour(params, a, b, mindist2)
}

/// Magnet formula 2: the degree-3 rational map.
fn iterate_magnet2(params: &FractalParams, z0: Vector2, c: Vector2, m_variant: bool) -> f64 {
    let (cr, ci) = (c.x, c.y);
    let mut a = z0.x;
    let mut b = z0.y;
    let mut a2 = a * a;
    let mut b2 = b * b;
    let mut mindist2 = if m_variant { 10000.0 } else { a2 + b2 };

    let c1r = cr - 1.0;
    let c2r = cr - 2.0;
    let c1c2r = c1r * c2r - ci * ci;
    let c1c2i = (c1r + c2r) * ci;

    for col in 0..params.iterations {
        let tmp1r = a2 * a - 3.0 * a * b2 + 3.0 * (a * c1r - b * ci) + c1c2r;
        let tmp1i = 3.0 * a2 * b - b2 * b + 3.0 * (a * ci + b * c1r) + c1c2i;
        let tmp2r = 3.0 * (a2 - b2) + 3.0 * (a * c2r - b * ci) + c1c2r + 1.0;
        let tmp2i = 6.0 * a * b + 3.0 * (a * ci + b * c2r) + c1c2i;
        let tmp = tmp2r * tmp2r + tmp2i * tmp2i;
        a = (tmp1r * tmp2r + tmp1i * tmp2i) / tmp;
        b = (tmp1i * tmp2r - tmp1r * tmp2i) / tmp;
        b2 = b * b;
        b = 2.0 * a * b;
        a = a * a - b2;

        a2 = a * a;
        b2 = b * b;
        let dist2 = a2 + b2;
        if dist2 < mindist2 {
            mindist2 = dist2;
        }
        let conv = a - 1.0;
        if dist2 > 10000.0 || conv * conv + b2 < 1.0 / 10000.0 {
            return exterior_colour(params, col, a, b);
        }
    }
    interior_colour(params, a, b, mindist2)
}

/// Evaluates the configured fractal at the pattern point's x/y.
pub fn fractal_pattern(point: Vector3, params: &FractalParams) -> f64 {
    let p = Vector2::new(point.x, point.y);
    let zero = Vector2::new(0.0, 0.0);

    match params.kind {
        FractalKind::Julia => iterate_quadratic(params, p, params.coord),
        FractalKind::Julia3 => iterate_cubic(params, p, params.coord),
        FractalKind::Julia4 => iterate_quartic(params, p, params.coord),
        FractalKind::JuliaX => iterate_general(params, p, params.coord),
        FractalKind::Mandel => iterate_quadratic(params, p, p),
        FractalKind::Mandel3 => iterate_cubic(params, p, p),
        FractalKind::Mandel4 => iterate_quartic(params, p, p),
        FractalKind::MandelX => iterate_general(params, p, p),
        FractalKind::Magnet1M => iterate_magnet1(params, zero, p, true),
        FractalKind::Magnet1J => iterate_magnet1(params, p, params.coord, false),
        FractalKind::Magnet2M => iterate_magnet2(params, zero, p, true),
        FractalKind::Magnet2J => iterate_magnet2(params, p, params.coord, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn julia_exterior_is_iteration_ratio() {
        // The point (1.5, 0) escapes the classic seed in 4 iterations.
        let mut params = FractalParams::new(FractalKind::Julia);
        params.coord = Vector2::new(-0.745, 0.113);
        let v = fractal_pattern(Vector3::new(1.5, 0.0, 0.0), &params);
        assert!((v - 3.0 / 64.0).abs() < 1.0e-12, "got {}", v);
    }

    #[test]
    fn julia_interior_uses_interior_colouring() {
        // The origin never escapes this seed within 64 iterations.
        let mut params = FractalParams::new(FractalKind::Julia);
        params.coord = Vector2::new(-0.745, 0.113);
        let v = fractal_pattern(Vector3::new(0.0, 0.0, 0.0), &params);
        // Default interior colouring is the constant factor.
        assert_eq!(v, 1.0);
    }

    #[test]
    fn mandel_far_points_escape_immediately() {
        let params = FractalParams::new(FractalKind::Mandel);
        let v = fractal_pattern(Vector3::new(2.5, 2.5, 0.0), &params);
        assert_eq!(v, 0.0); // escaped at iteration 0
    }

    #[test]
    fn mandel_cardioid_is_interior() {
        let params = FractalParams::new(FractalKind::Mandel);
        let v = fractal_pattern(Vector3::new(-0.1, 0.0, 0.0), &params);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn general_exponent_matches_specialised_forms() {
        // z^3 via the binomial path must agree with the hand-coded cubic.
        let mut px = FractalParams::new(FractalKind::MandelX);
        px.exponent = 3;
        let p3 = FractalParams::new(FractalKind::Mandel3);

        for &(x, y) in &[(0.3, 0.4), (-0.5, 0.2), (0.9, -0.9), (0.05, 0.05)] {
            let a = fractal_pattern(Vector3::new(x, y, 0.0), &px);
            let b = fractal_pattern(Vector3::new(x, y, 0.0), &p3);
            assert!((a - b).abs() < 1.0e-9, "mismatch at ({}, {}): {} vs {}", x, y, a, b);
        }
    }

    #[test]
    fn magnet_converges_or_escapes() {
        let params = FractalParams::new(FractalKind::Magnet1M);
        for &(x, y) in &[(0.1, 0.1), (2.0, 0.0), (-1.0, 1.0)] {
            let v = fractal_pattern(Vector3::new(x, y, 0.0), &params);
            assert!(v.is_finite());
            assert!(v >= 0.0 && v <= 1.0);
        }
    }

    #[test]
    fn exterior_modes_differ() {
        let mut a = FractalParams::new(FractalKind::Mandel);
        a.exterior = ExteriorColouring { mode: 1, factor: 1.0 };
        let mut b = FractalParams::new(FractalKind::Mandel);
        b.exterior = ExteriorColouring { mode: 6, factor: 0.1 };
        let p = Vector3::new(0.4, 0.4, 0.0);
        assert_ne!(fractal_pattern(p, &a), fractal_pattern(p, &b));
    }
}
