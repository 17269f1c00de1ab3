#![allow(dead_code)]

use std::ops::{BitOr, BitOrAssign};

use crate::math::{Transform, Vector3, BOUND_HUGE, CRITICAL_LENGTH};

/// A 3D axis-aligned bounding box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Vector3,
    pub max: Vector3,
}

impl BoundingBox {
    /// Creates a degenerate BBox with +infinity min and -infinity max.
    pub fn new() -> BoundingBox {
        BoundingBox {
            min: Vector3::new(BOUND_HUGE, BOUND_HUGE, BOUND_HUGE),
            max: Vector3::new(-BOUND_HUGE, -BOUND_HUGE, -BOUND_HUGE),
        }
    }

    pub fn from_points(min: Vector3, max: Vector3) -> BoundingBox {
        BoundingBox { min, max }
    }

    /// The everything-box used by unbounded shapes.
    pub fn infinite() -> BoundingBox {
        BoundingBox {
            min: Vector3::new(-BOUND_HUGE / 2.0, -BOUND_HUGE / 2.0, -BOUND_HUGE / 2.0),
            max: Vector3::new(BOUND_HUGE / 2.0, BOUND_HUGE / 2.0, BOUND_HUGE / 2.0),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    pub fn volume(&self) -> f64 {
        let d = self.size();
        d.x * d.y * d.z
    }

    pub fn contains(&self, p: Vector3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Slab test. Returns the entry/exit depths when the ray pierces the
    /// box within `[0, max_t]`.
    pub fn intersect_ray(&self, orig: Vector3, dir: Vector3, max_t: f64) -> Option<(f64, f64)> {
        let mut near_t = 0.0f64;
        let mut far_t = max_t;

        for axis in 0..3 {
            let o = crate::math::component(orig, axis);
            let d = crate::math::component(dir, axis);
            let mn = crate::math::component(self.min, axis);
            let mx = crate::math::component(self.max, axis);
            if d.abs() < crate::math::EPSILON {
                if o < mn || o > mx {
                    return None;
                }
            } else {
                let inv = 1.0 / d;
                let (t1, t2) = if inv >= 0.0 {
                    ((mn - o) * inv, (mx - o) * inv)
                } else {
                    ((mx - o) * inv, (mn - o) * inv)
                };
                if t1 > near_t {
                    near_t = t1;
                }
                if t2 < far_t {
                    far_t = t2;
                }
                if near_t > far_t {
                    return None;
                }
            }
        }

        Some((near_t, far_t))
    }

    /// Creates a new BBox transformed into a different space, by
    /// transforming all eight corners.
    pub fn transformed(&self, trans: &Transform) -> BoundingBox {
        let corners = [
            Vector3::new(self.min.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.min.y, self.max.z),
            Vector3::new(self.min.x, self.max.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.min.z),
            Vector3::new(self.max.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.min.z),
            Vector3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut b = BoundingBox::new();
        for c in &corners {
            let p = trans.transform_point(*c);
            b |= p;
        }
        b
    }

    /// Clamps to the everything-box when any side has grown past the
    /// critical length (over-large boxes hurt more than they help).
    pub fn guard_critical_length(&mut self) {
        let s = self.size();
        if s.x > CRITICAL_LENGTH || s.y > CRITICAL_LENGTH || s.z > CRITICAL_LENGTH {
            *self = BoundingBox::infinite();
        }
    }

    /// Componentwise intersection with another box.
    pub fn intersected(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }
}

/// Union of two boxes.
impl BitOr for BoundingBox {
    type Output = BoundingBox;

    fn bitor(self, rhs: BoundingBox) -> BoundingBox {
        BoundingBox::from_points(self.min.min(rhs.min), self.max.max(rhs.max))
    }
}

impl BitOrAssign for BoundingBox {
    fn bitor_assign(&mut self, rhs: BoundingBox) {
        *self = *self | rhs;
    }
}

/// Expand by a point.
impl BitOr<Vector3> for BoundingBox {
    type Output = BoundingBox;

    fn bitor(self, rhs: Vector3) -> BoundingBox {
        BoundingBox::from_points(self.min.min(rhs), self.max.max(rhs))
    }
}

impl BitOrAssign<Vector3> for BoundingBox {
    fn bitor_assign(&mut self, rhs: Vector3) {
        *self = *self | rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::MAX_DISTANCE;

    #[test]
    fn union_of_points() {
        let mut b = BoundingBox::new();
        b |= Vector3::new(1.0, -1.0, 0.0);
        b |= Vector3::new(-1.0, 2.0, 0.5);
        assert_eq!(b.min, Vector3::new(-1.0, -1.0, 0.0));
        assert_eq!(b.max, Vector3::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn ray_hits_unit_box() {
        let b = BoundingBox::from_points(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let (t0, t1) = b
            .intersect_ray(
                Vector3::new(0.0, 0.0, -3.0),
                Vector3::new(0.0, 0.0, 1.0),
                MAX_DISTANCE,
            )
            .unwrap();
        assert!((t0 - 2.0).abs() < 1.0e-12);
        assert!((t1 - 4.0).abs() < 1.0e-12);
    }

    #[test]
    fn ray_misses_box() {
        let b = BoundingBox::from_points(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        assert!(b
            .intersect_ray(
                Vector3::new(0.0, 5.0, -3.0),
                Vector3::new(0.0, 0.0, 1.0),
                MAX_DISTANCE,
            )
            .is_none());
    }

    #[test]
    fn transform_keeps_containment() {
        let b = BoundingBox::from_points(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let t = Transform::rotation_z(std::f64::consts::FRAC_PI_4);
        let tb = b.transformed(&t);
        let centre = t.transform_point(Vector3::new(0.5, 0.5, 0.5));
        assert!(tb.contains(centre));
    }
}
