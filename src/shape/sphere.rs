#![allow(dead_code)]

//! The sphere primitive.
//!
//! A sphere lives in one of two modes. In spherical mode it is a centre and
//! radius, and translation/uniform scaling mutate those directly. Any
//! rotation, non-uniform scale or general transform promotes it to
//! ellipsoidal mode: a unit sphere at the origin carrying the full
//! transform.

use crate::bbox::BoundingBox;
use crate::istack::{IStack, Intersection};
use crate::math::{Transform, Vector2, Vector3, EPSILON, MAX_DISTANCE};
use crate::ray::Ray;
use crate::shape::{point_in_clip, ObjectBase, ObjectPtr, Shape, INVERTED_FLAG};
use crate::stats::Stat;
use crate::thread::TraceThreadData;

const DEPTH_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct Sphere {
    pub base: ObjectBase,
    pub center: Vector3,
    pub radius: f64,
    do_ellipsoid: bool,
}

impl Sphere {
    pub fn new(center: Vector3, radius: f64) -> Sphere {
        let mut s = Sphere {
            base: ObjectBase::new(),
            center,
            radius,
            do_ellipsoid: false,
        };
        s.compute_bbox();
        s
    }

    /// Half-chord intersection against an explicit centre/radius².
    /// Both depths are returned unfiltered; the caller applies the
    /// tolerance window.
    pub fn intersect(
        origin: Vector3,
        direction: Vector3,
        center: Vector3,
        radius2: f64,
    ) -> Option<(f64, f64)> {
        let origin_to_center = center - origin;
        let oc_squared = origin_to_center.length_squared();
        let t_closest_approach = origin_to_center.dot(direction);

        if oc_squared >= radius2 && t_closest_approach < EPSILON {
            return None;
        }

        let t_half_chord_squared = radius2 - oc_squared + t_closest_approach * t_closest_approach;
        if t_half_chord_squared > EPSILON {
            let half_chord = t_half_chord_squared.sqrt();
            Some((
                t_closest_approach - half_chord,
                t_closest_approach + half_chord,
            ))
        } else {
            None
        }
    }
}

impl Shape for Sphere {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn all_intersections<'a>(
        &'a self,
        ray: &Ray<'a>,
        stack: &mut IStack<'a>,
        thread: &mut TraceThreadData<'a>,
    ) -> bool {
        thread.stats.bump(Stat::RaySphereTests);
        let mut found = false;

        if self.do_ellipsoid {
            let trans = self.base.trans.as_ref().unwrap();
            let new_origin = trans.inverse_transform_point(ray.origin);
            let mut new_dir = trans.inverse_transform_direction(ray.direction);
            let len = new_dir.length();
            new_dir /= len;

            if let Some((depth1, depth2)) =
                Sphere::intersect(new_origin, new_dir, Vector3::new(0.0, 0.0, 0.0), 1.0)
            {
                thread.stats.bump(Stat::RaySphereTestsSucceeded);
                for &depth in &[depth1, depth2] {
                    if depth > DEPTH_TOLERANCE && depth < MAX_DISTANCE {
                        let local = new_origin + new_dir * depth;
                        let ipoint = trans.transform_point(local);
                        if self.base.clip.is_empty()
                            || point_in_clip(ipoint, &self.base.clip, thread)
                        {
                            stack.push(Intersection::new(depth / len, ipoint, self));
                            found = true;
                        }
                    }
                }
            }
        } else if let Some((depth1, depth2)) = Sphere::intersect(
            ray.origin,
            ray.direction,
            self.center,
            self.radius * self.radius,
        ) {
            thread.stats.bump(Stat::RaySphereTestsSucceeded);
            for &depth in &[depth1, depth2] {
                if depth > DEPTH_TOLERANCE && depth < MAX_DISTANCE {
                    let ipoint = ray.evaluate(depth);
                    if self.base.clip.is_empty() || point_in_clip(ipoint, &self.base.clip, thread) {
                        stack.push(Intersection::new(depth, ipoint, self));
                        found = true;
                    }
                }
            }
        }

        found
    }

    fn inside(&self, point: Vector3, _thread: &mut TraceThreadData<'_>) -> bool {
        let oc_squared = if self.do_ellipsoid {
            let trans = self.base.trans.as_ref().unwrap();
            trans.inverse_transform_point(point).length_squared()
        } else {
            (self.center - point).length_squared()
        };

        if self.base.test_flag(INVERTED_FLAG) {
            oc_squared > self.radius * self.radius
        } else {
            oc_squared < self.radius * self.radius
        }
    }

    fn normal(&self, inter: &Intersection<'_>, _thread: &mut TraceThreadData<'_>) -> Vector3 {
        if self.do_ellipsoid {
            let trans = self.base.trans.as_ref().unwrap();
            // Ellipsoidal mode is the unit sphere, so the local point is
            // the local normal.
            let local = trans.inverse_transform_point(inter.ipoint);
            trans.transform_normal(local).normalize()
        } else {
            (inter.ipoint - self.center) / self.radius
        }
    }

    fn uv_coord(&self, inter: &Intersection<'_>) -> Vector2 {
        let mut p = if self.do_ellipsoid {
            let trans = self.base.trans.as_ref().unwrap();
            trans.inverse_transform_point(inter.ipoint)
        } else {
            let mut p = inter.ipoint - self.center;
            if let Some(ref trans) = self.base.trans {
                p = trans.inverse_transform_point(p);
            }
            p
        };

        let len = p.length();
        if len == 0.0 {
            return Vector2::new(0.0, 0.0);
        }
        p /= len;

        let phi = 0.5 + p.y.asin() / std::f64::consts::PI;
        let len2 = p.x * p.x + p.z * p.z;
        let theta = if len2 > EPSILON {
            let len2 = len2.sqrt();
            let mut theta = if p.z == 0.0 {
                if p.x > 0.0 {
                    0.0
                } else {
                    std::f64::consts::PI
                }
            } else {
                let t = (p.x / len2).acos();
                if p.z < 0.0 {
                    2.0 * std::f64::consts::PI - t
                } else {
                    t
                }
            };
            theta /= 2.0 * std::f64::consts::PI;
            theta
        } else {
            // At a pole any u will do.
            0.0
        };

        Vector2::new(theta, phi)
    }

    fn translate(&mut self, vector: Vector3, trans: &Transform) {
        if self.do_ellipsoid {
            self.transform(trans);
        } else {
            self.center += vector;
            self.compute_bbox();
        }
    }

    fn rotate(&mut self, _vector: Vector3, trans: &Transform) {
        if self.do_ellipsoid {
            self.transform(trans);
        } else {
            match self.base.trans {
                Some(ref mut t) => t.compose(trans),
                None => self.base.trans = Some(*trans),
            }
            self.center = trans.transform_point(self.center);
            self.compute_bbox();
        }
    }

    fn scale(&mut self, vector: Vector3, trans: &Transform) {
        if self.do_ellipsoid || vector.x != vector.y || vector.x != vector.z {
            self.transform(trans);
        } else {
            self.center *= vector.x;
            self.radius *= vector.x.abs();
            self.compute_bbox();
        }
    }

    fn transform(&mut self, trans: &Transform) {
        // Arbitrary transformations can only be tracked in ellipsoidal
        // mode, so convert centre and radius into transforms first.
        if !self.do_ellipsoid {
            self.do_ellipsoid = true;
            let mut t = self.base.trans.take().unwrap_or_else(Transform::identity);
            t.compose(&Transform::uniform_scaling(self.radius));
            t.compose(&Transform::translation(self.center));
            self.base.trans = Some(t);
            self.radius = 1.0;
            self.center = Vector3::new(0.0, 0.0, 0.0);
        }

        self.base.trans.as_mut().unwrap().compose(trans);
        self.compute_bbox();
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.base.invert_flag(INVERTED_FLAG);
        self
    }

    fn compute_bbox(&mut self) {
        if self.do_ellipsoid {
            let unit = BoundingBox::from_points(
                Vector3::new(-1.0, -1.0, -1.0),
                Vector3::new(1.0, 1.0, 1.0),
            );
            self.base.bbox = unit.transformed(self.base.trans.as_ref().unwrap());
        } else {
            let r = Vector3::new(self.radius, self.radius, self.radius);
            self.base.bbox = BoundingBox::from_points(self.center - r, self.center + r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::TraceTicket;

    fn ray<'a>(origin: Vector3, direction: Vector3) -> Ray<'a> {
        Ray::new(origin, direction, TraceTicket::new(5, 0))
    }

    #[test]
    fn unit_sphere_hits() {
        let s = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.0, 0.0, -3.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(s.all_intersections(&r, &mut stack, &mut thread));
        stack.sort_by_depth();
        assert_eq!(stack.len(), 2);
        assert!((stack.entries()[0].depth - 2.0).abs() < 1.0e-12);
        assert!((stack.entries()[1].depth - 4.0).abs() < 1.0e-12);
    }

    #[test]
    fn ray_behind_sphere_misses() {
        let s = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.0, 0.0, 3.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!s.all_intersections(&r, &mut stack, &mut thread));
    }

    #[test]
    fn inside_and_inversion_duality() {
        let s = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let mut thread = TraceThreadData::new(0);
        let p_in = Vector3::new(0.2, 0.3, 0.0);
        let p_out = Vector3::new(2.0, 0.0, 0.0);
        assert!(s.inside(p_in, &mut thread));
        assert!(!s.inside(p_out, &mut thread));

        let inv = Box::new(s).invert();
        assert!(!inv.inside(p_in, &mut thread));
        assert!(inv.inside(p_out, &mut thread));
    }

    #[test]
    fn normal_points_outward() {
        let s = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 2.0);
        let mut thread = TraceThreadData::new(0);
        let inter = Intersection::new(1.0, Vector3::new(0.0, 2.0, 0.0), &s);
        let n = s.normal(&inter, &mut thread);
        assert!((n - Vector3::new(0.0, 1.0, 0.0)).length() < 1.0e-12);
    }

    #[test]
    fn transformed_unit_sphere_matches_spherical_mode() {
        // Sphere/ellipsoid equivalence: translate(c) * scale(r) applied to
        // the unit sphere must match centre c / radius r to high precision.
        let c = Vector3::new(1.0, -2.0, 0.5);
        let r = 2.5;

        let plain = Sphere::new(c, r);

        let mut xformed = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let mut t = Transform::uniform_scaling(r);
        t.compose(&Transform::translation(c));
        xformed.transform(&t);

        let mut thread = TraceThreadData::new(0);
        let test_ray = ray(Vector3::new(1.0, -2.0, -7.0), Vector3::new(0.0, 0.0, 1.0));

        let mut s1 = IStack::new();
        let mut s2 = IStack::new();
        assert!(plain.all_intersections(&test_ray, &mut s1, &mut thread));
        assert!(xformed.all_intersections(&test_ray, &mut s2, &mut thread));
        s1.sort_by_depth();
        s2.sort_by_depth();
        assert_eq!(s1.len(), s2.len());
        for (a, b) in s1.iter().zip(s2.iter()) {
            assert!((a.depth - b.depth).abs() < 1.0e-10);
        }
    }

    #[test]
    fn uniform_scale_keeps_spherical_mode() {
        let mut s = Sphere::new(Vector3::new(1.0, 0.0, 0.0), 1.0);
        let v = Vector3::new(3.0, 3.0, 3.0);
        s.scale(v, &Transform::scaling(v));
        assert_eq!(s.center, Vector3::new(3.0, 0.0, 0.0));
        assert_eq!(s.radius, 3.0);
        assert!(!s.do_ellipsoid);

        // A non-uniform scale promotes to ellipsoidal mode.
        let v = Vector3::new(1.0, 2.0, 1.0);
        s.scale(v, &Transform::scaling(v));
        assert!(s.do_ellipsoid);
        assert_eq!(s.radius, 1.0);
    }
}
