#![allow(dead_code)]

//! Container shapes for function-defined surfaces.
//!
//! An isosurface or parametric surface only exists inside its container;
//! the container supplies the ray bracket `[t0, t1]`, an inside test, a
//! surface normal for closed-surface container hits, and the bounding box.

use crate::bbox::BoundingBox;
use crate::math::{Transform, Vector3, EPSILON, MAX_DISTANCE};

/// Which container face a bracket endpoint lies on; passed through to the
/// normal computation for closed isosurfaces.
pub const SIDE_X_MIN: i32 = 1;
pub const SIDE_X_MAX: i32 = 2;
pub const SIDE_Y_MIN: i32 = 3;
pub const SIDE_Y_MAX: i32 = 4;
pub const SIDE_Z_MIN: i32 = 5;
pub const SIDE_Z_MAX: i32 = 6;
pub const SIDE_RADIAL: i32 = 0;

#[derive(Debug, Clone)]
pub enum ContainedBy {
    Box { corner1: Vector3, corner2: Vector3 },
    Sphere { center: Vector3, radius: f64 },
    Cylinder { radius: f64, base: f64, cap: f64 },
}

impl ContainedBy {
    pub fn unit_box() -> ContainedBy {
        ContainedBy::Box {
            corner1: Vector3::new(-1.0, -1.0, -1.0),
            corner2: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Brackets the ray against the container in the shape's local space
    /// (the caller untransforms the ray first when a transform is present).
    /// Returns the clamped `[t0, t1]` plus the face tags of the endpoints.
    pub fn intersect(
        &self,
        origin: Vector3,
        direction: Vector3,
        trans: Option<&Transform>,
    ) -> Option<(f64, f64, i32, i32)> {
        let (origin, direction) = match trans {
            Some(t) => (
                t.inverse_transform_point(origin),
                t.inverse_transform_direction(direction),
            ),
            None => (origin, direction),
        };

        match *self {
            ContainedBy::Box { corner1, corner2 } => {
                let mut t0 = -MAX_DISTANCE;
                let mut t1 = MAX_DISTANCE;
                let mut side0 = 0;
                let mut side1 = 0;

                for axis in 0..3 {
                    let o = crate::math::component(origin, axis);
                    let d = crate::math::component(direction, axis);
                    let mn = crate::math::component(corner1, axis);
                    let mx = crate::math::component(corner2, axis);
                    let (smin, smax) = match axis {
                        0 => (SIDE_X_MIN, SIDE_X_MAX),
                        1 => (SIDE_Y_MIN, SIDE_Y_MAX),
                        _ => (SIDE_Z_MIN, SIDE_Z_MAX),
                    };
                    if d.abs() < EPSILON {
                        if o < mn || o > mx {
                            return None;
                        }
                    } else {
                        let inv = 1.0 / d;
                        let (ta, tb, sa, sb) = if inv >= 0.0 {
                            ((mn - o) * inv, (mx - o) * inv, smin, smax)
                        } else {
                            ((mx - o) * inv, (mn - o) * inv, smax, smin)
                        };
                        if ta > t0 {
                            t0 = ta;
                            side0 = sa;
                        }
                        if tb < t1 {
                            t1 = tb;
                            side1 = sb;
                        }
                        if t0 > t1 {
                            return None;
                        }
                    }
                }

                if t1 < 0.0 {
                    return None;
                }
                Some((t0.max(0.0), t1, side0, side1))
            }
            ContainedBy::Sphere { center, radius } => {
                let oc = center - origin;
                let oc2 = oc.length_squared();
                let closest = oc.dot(direction);
                if oc2 >= radius * radius && closest < EPSILON {
                    return None;
                }
                let half2 = radius * radius - oc2 + closest * closest;
                if half2 <= EPSILON {
                    return None;
                }
                let half = half2.sqrt();
                let t0 = closest - half;
                let t1 = closest + half;
                if t1 < 0.0 {
                    return None;
                }
                Some((t0.max(0.0), t1, SIDE_RADIAL, SIDE_RADIAL))
            }
            ContainedBy::Cylinder { radius, base, cap } => {
                // Infinite cylinder around y, capped to [base, cap].
                let a = direction.x * direction.x + direction.z * direction.z;
                let mut t0 = -MAX_DISTANCE;
                let mut t1 = MAX_DISTANCE;
                let mut side0 = SIDE_RADIAL;
                let mut side1 = SIDE_RADIAL;

                if a.abs() < EPSILON {
                    // Parallel to the axis.
                    if origin.x * origin.x + origin.z * origin.z > radius * radius {
                        return None;
                    }
                } else {
                    let b = origin.x * direction.x + origin.z * direction.z;
                    let c = origin.x * origin.x + origin.z * origin.z - radius * radius;
                    let d = b * b - a * c;
                    if d <= 0.0 {
                        return None;
                    }
                    let d = d.sqrt();
                    t0 = (-b - d) / a;
                    t1 = (-b + d) / a;
                }

                // Clamp to the caps.
                if direction.y.abs() < EPSILON {
                    if origin.y < base || origin.y > cap {
                        return None;
                    }
                } else {
                    let inv = 1.0 / direction.y;
                    let (ta, tb, sa, sb) = if inv >= 0.0 {
                        ((base - origin.y) * inv, (cap - origin.y) * inv, SIDE_Y_MIN, SIDE_Y_MAX)
                    } else {
                        ((cap - origin.y) * inv, (base - origin.y) * inv, SIDE_Y_MAX, SIDE_Y_MIN)
                    };
                    if ta > t0 {
                        t0 = ta;
                        side0 = sa;
                    }
                    if tb < t1 {
                        t1 = tb;
                        side1 = sb;
                    }
                    if t0 > t1 {
                        return None;
                    }
                }

                if t1 < 0.0 {
                    return None;
                }
                Some((t0.max(0.0), t1, side0, side1))
            }
        }
    }

    /// Inside test in the container's local space.
    pub fn inside(&self, p: Vector3) -> bool {
        match *self {
            ContainedBy::Box { corner1, corner2 } => {
                p.x >= corner1.x
                    && p.x <= corner2.x
                    && p.y >= corner1.y
                    && p.y <= corner2.y
                    && p.z >= corner1.z
                    && p.z <= corner2.z
            }
            ContainedBy::Sphere { center, radius } => {
                (p - center).length_squared() <= radius * radius
            }
            ContainedBy::Cylinder { radius, base, cap } => {
                p.y >= base && p.y <= cap && p.x * p.x + p.z * p.z <= radius * radius
            }
        }
    }

    /// Surface normal for a container hit, in world space.
    pub fn normal(
        &self,
        ipoint: Vector3,
        trans: Option<&Transform>,
        side: i32,
    ) -> Vector3 {
        let local = match trans {
            Some(t) => t.inverse_transform_point(ipoint),
            None => ipoint,
        };

        let n = match *self {
            ContainedBy::Box { .. } => match side {
                SIDE_X_MIN => Vector3::new(-1.0, 0.0, 0.0),
                SIDE_X_MAX => Vector3::new(1.0, 0.0, 0.0),
                SIDE_Y_MIN => Vector3::new(0.0, -1.0, 0.0),
                SIDE_Y_MAX => Vector3::new(0.0, 1.0, 0.0),
                SIDE_Z_MIN => Vector3::new(0.0, 0.0, -1.0),
                _ => Vector3::new(0.0, 0.0, 1.0),
            },
            ContainedBy::Sphere { center, .. } => local - center,
            ContainedBy::Cylinder { .. } => match side {
                SIDE_Y_MIN => Vector3::new(0.0, -1.0, 0.0),
                SIDE_Y_MAX => Vector3::new(0.0, 1.0, 0.0),
                _ => Vector3::new(local.x, 0.0, local.z),
            },
        };

        let n = match trans {
            Some(t) => t.transform_normal(n),
            None => n,
        };
        let len = n.length();
        if len == 0.0 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            n / len
        }
    }

    pub fn compute_bbox(&self) -> BoundingBox {
        match *self {
            ContainedBy::Box { corner1, corner2 } => BoundingBox::from_points(corner1, corner2),
            ContainedBy::Sphere { center, radius } => BoundingBox::from_points(
                center - Vector3::splat(radius),
                center + Vector3::splat(radius),
            ),
            ContainedBy::Cylinder { radius, base, cap } => BoundingBox::from_points(
                Vector3::new(-radius, base, -radius),
                Vector3::new(radius, cap, radius),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_bracket_and_sides() {
        let c = ContainedBy::unit_box();
        let (t0, t1, s0, s1) = c
            .intersect(
                Vector3::new(0.0, 0.0, -3.0),
                Vector3::new(0.0, 0.0, 1.0),
                None,
            )
            .unwrap();
        assert!((t0 - 2.0).abs() < 1.0e-12);
        assert!((t1 - 4.0).abs() < 1.0e-12);
        assert_eq!(s0, SIDE_Z_MIN);
        assert_eq!(s1, SIDE_Z_MAX);
    }

    #[test]
    fn bracket_from_inside_starts_at_zero() {
        let c = ContainedBy::unit_box();
        let (t0, t1, _, _) = c
            .intersect(
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
                None,
            )
            .unwrap();
        assert_eq!(t0, 0.0);
        assert!((t1 - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn sphere_container() {
        let c = ContainedBy::Sphere {
            center: Vector3::new(0.0, 0.0, 0.0),
            radius: 1.0,
        };
        let (t0, t1, _, _) = c
            .intersect(
                Vector3::new(0.0, 0.0, -3.0),
                Vector3::new(0.0, 0.0, 1.0),
                None,
            )
            .unwrap();
        assert!((t0 - 2.0).abs() < 1.0e-12);
        assert!((t1 - 4.0).abs() < 1.0e-12);
        assert!(c.inside(Vector3::new(0.5, 0.0, 0.0)));
        assert!(!c.inside(Vector3::new(1.5, 0.0, 0.0)));
    }

    #[test]
    fn cylinder_container() {
        let c = ContainedBy::Cylinder {
            radius: 1.0,
            base: -1.0,
            cap: 1.0,
        };
        let (t0, t1, _, _) = c
            .intersect(
                Vector3::new(-3.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                None,
            )
            .unwrap();
        assert!((t0 - 2.0).abs() < 1.0e-12);
        assert!((t1 - 4.0).abs() < 1.0e-12);

        // Clipped by the caps.
        let hit = c.intersect(
            Vector3::new(-3.0, 2.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            None,
        );
        assert!(hit.is_none());
    }
}
