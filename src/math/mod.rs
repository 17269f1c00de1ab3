#![allow(dead_code)]

mod matrix;

pub mod chi2;

pub use self::matrix::{Matrix4x4, Transform};

/// All geometry in the core is double precision; the glam f64 types carry
/// the component arithmetic.
pub type Vector3 = glam::DVec3;
pub type Vector2 = glam::DVec2;

/// Generic "practically zero" threshold shared by the intersection code.
pub const EPSILON: f64 = 1.0e-10;

/// Maximum parametric depth a hit may have along a ray.
pub const MAX_DISTANCE: f64 = 1.0e7;

/// Pseudo-infinite extent used by unbounded shapes.
pub const BOUND_HUGE: f64 = 2.0e10;

/// Bounding boxes longer than this on any axis are treated as infinite.
pub const CRITICAL_LENGTH: f64 = 1.0e6;

/// Padding applied to near-flat bounding boxes.
pub const SMALL_TOLERANCE: f64 = 0.001;

pub fn dot(a: Vector3, b: Vector3) -> f64 {
    a.dot(b)
}

pub fn cross(a: Vector3, b: Vector3) -> Vector3 {
    a.cross(b)
}

/// Clamps a value between a min and max.
pub fn clamp<T: PartialOrd>(v: T, lower: T, upper: T) -> T {
    if v < lower {
        lower
    } else if v > upper {
        upper
    } else {
        v
    }
}

pub fn min3(a: f64, b: f64, c: f64) -> f64 {
    if a < b {
        if a < c {
            a
        } else {
            c
        }
    } else if b < c {
        b
    } else {
        c
    }
}

pub fn max3(a: f64, b: f64, c: f64) -> f64 {
    if a > b {
        if a > c {
            a
        } else {
            c
        }
    } else if b > c {
        b
    } else {
        c
    }
}

/// Index (0/1/2) of the component with the largest magnitude.
pub fn dominant_axis(v: Vector3) -> usize {
    let x = v.x.abs();
    let y = v.y.abs();
    let z = v.z.abs();
    if x > y {
        if x > z {
            0
        } else {
            2
        }
    } else if y > z {
        1
    } else {
        2
    }
}

pub fn component(v: Vector3, axis: usize) -> f64 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

pub fn set_component(v: &mut Vector3, axis: usize, value: f64) {
    match axis {
        0 => v.x = value,
        1 => v.y = value,
        _ => v.z = value,
    }
}

/// Creates a right-handed orthonormal basis from a single unit vector.
///
/// The input vector becomes the third vector of the returned tuple.
///
/// Algorithm taken from "Building an Orthonormal Basis, Revisited" by
/// Duff et al.
pub fn coordinate_system_from_vector(v: Vector3) -> (Vector3, Vector3, Vector3) {
    let sign = if v.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + v.z);
    let b = v.x * v.y * a;
    let v2 = Vector3::new(1.0 + sign * v.x * v.x * a, sign * b, -sign * v.x);
    let v3 = Vector3::new(b, sign + v.y * v.y * a, -v.y);

    (v2, v3, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
    }

    #[test]
    fn dominant() {
        assert_eq!(dominant_axis(Vector3::new(0.0, -3.0, 2.0)), 1);
        assert_eq!(dominant_axis(Vector3::new(0.1, 0.0, -0.2)), 2);
    }

    #[test]
    fn basis_is_orthonormal() {
        for v in &[
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 0.0).normalize(),
            Vector3::new(1.0, 2.0, -3.0).normalize(),
            Vector3::new(0.0, 0.0, -1.0),
        ] {
            let (a, b, c) = coordinate_system_from_vector(*v);
            assert!(a.dot(b).abs() < 1.0e-12);
            assert!(b.dot(c).abs() < 1.0e-12);
            assert!(a.dot(c).abs() < 1.0e-12);
            assert!((a.length() - 1.0).abs() < 1.0e-12);
            assert!((b.length() - 1.0).abs() < 1.0e-12);
        }
    }
}
