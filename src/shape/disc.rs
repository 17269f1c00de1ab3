#![allow(dead_code)]

//! The disc primitive: an annulus in its local z = 0 plane.

use crate::bbox::BoundingBox;
use crate::istack::{IStack, Intersection};
use crate::math::{Transform, Vector3, EPSILON, MAX_DISTANCE, SMALL_TOLERANCE};
use crate::ray::Ray;
use crate::shape::{point_in_clip, ObjectBase, ObjectPtr, Shape, INVERTED_FLAG};
use crate::stats::Stat;
use crate::thread::TraceThreadData;

const DEPTH_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct Disc {
    pub base: ObjectBase,
    pub center: Vector3,
    pub normal: Vector3,
    /// Squared inner and outer radii.
    pub iradius2: f64,
    pub oradius2: f64,
}

impl Disc {
    pub fn new(center: Vector3, normal: Vector3, inner_radius: f64, outer_radius: f64) -> Disc {
        let normal = normal.normalize();
        let mut d = Disc {
            base: ObjectBase::new(),
            center,
            normal,
            iradius2: inner_radius * inner_radius,
            oradius2: outer_radius * outer_radius,
        };
        d.base.trans = Some(Transform::coordinate(center, normal));
        d.compute_bbox();
        d
    }

    fn intersect(&self, ray: &Ray<'_>) -> Option<f64> {
        let trans = self.base.trans.as_ref().unwrap();
        let p = trans.inverse_transform_point(ray.origin);
        let mut d = trans.inverse_transform_direction(ray.direction);
        let len = d.length();
        d /= len;

        if d.z.abs() > EPSILON {
            let t = -p.z / d.z;
            if t >= 0.0 {
                let u = p.x + t * d.x;
                let v = p.y + t * d.y;
                let r2 = u * u + v * v;
                if r2 >= self.iradius2 && r2 <= self.oradius2 {
                    let depth = t / len;
                    if depth > DEPTH_TOLERANCE && depth < MAX_DISTANCE {
                        return Some(depth);
                    }
                }
            }
        }
        None
    }
}

impl Shape for Disc {
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
        thread.stats.bump(Stat::RayDiscTests);
        if let Some(depth) = self.intersect(ray) {
            thread.stats.bump(Stat::RayDiscTestsSucceeded);
            let ipoint = ray.evaluate(depth);
            if self.base.clip.is_empty() || point_in_clip(ipoint, &self.base.clip, thread) {
                stack.push(Intersection::new(depth, ipoint, self));
                return true;
            }
        }
        false
    }

    fn inside(&self, point: Vector3, _thread: &mut TraceThreadData<'_>) -> bool {
        let trans = self.base.trans.as_ref().unwrap();
        let local = trans.inverse_transform_point(point);
        if local.z >= 0.0 {
            self.base.test_flag(INVERTED_FLAG)
        } else {
            !self.base.test_flag(INVERTED_FLAG)
        }
    }

    fn normal(&self, _inter: &Intersection<'_>, _thread: &mut TraceThreadData<'_>) -> Vector3 {
        self.normal
    }

    fn translate(&mut self, _vector: Vector3, trans: &Transform) {
        self.transform(trans);
    }

    fn rotate(&mut self, _vector: Vector3, trans: &Transform) {
        self.transform(trans);
    }

    fn scale(&mut self, _vector: Vector3, trans: &Transform) {
        self.transform(trans);
    }

    fn transform(&mut self, trans: &Transform) {
        self.normal = trans.transform_normal(self.normal).normalize();
        self.base.trans.as_mut().unwrap().compose(trans);
        self.compute_bbox();
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.base.invert_flag(INVERTED_FLAG);
        self
    }

    fn compute_bbox(&mut self) {
        let rad = self.oradius2.sqrt();
        let local = BoundingBox::from_points(
            Vector3::new(-rad, -rad, -SMALL_TOLERANCE),
            Vector3::new(rad, rad, SMALL_TOLERANCE),
        );
        self.base.bbox = local.transformed(self.base.trans.as_ref().unwrap());
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
    fn axis_ray_hits_disc() {
        let d = Disc::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            0.0,
            1.0,
        );
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.5, 0.0, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(d.all_intersections(&r, &mut stack, &mut thread));
        assert!((stack.top().depth - 2.0).abs() < 1.0e-12);
    }

    #[test]
    fn annulus_hole_misses() {
        let d = Disc::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            0.5,
            1.0,
        );
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        // Through the hole.
        let r = ray(Vector3::new(0.25, 0.0, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!d.all_intersections(&r, &mut stack, &mut thread));
        // Through the ring.
        let r = ray(Vector3::new(0.75, 0.0, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(d.all_intersections(&r, &mut stack, &mut thread));
    }

    #[test]
    fn outside_radius_misses() {
        let d = Disc::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            0.0,
            1.0,
        );
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(1.5, 0.0, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!d.all_intersections(&r, &mut stack, &mut thread));
    }

    #[test]
    fn inside_is_behind_the_plane() {
        let d = Disc::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            0.0,
            1.0,
        );
        let mut thread = TraceThreadData::new(0);
        assert!(d.inside(Vector3::new(0.0, 0.0, -1.0), &mut thread));
        assert!(!d.inside(Vector3::new(0.0, 0.0, 1.0), &mut thread));
    }
}
