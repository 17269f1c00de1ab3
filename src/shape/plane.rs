#![allow(dead_code)]

//! The plane primitive: the half-space `n·p + d <= 0`.

use crate::bbox::BoundingBox;
use crate::istack::{IStack, Intersection};
use crate::math::{Transform, Vector3, EPSILON, MAX_DISTANCE};
use crate::ray::Ray;
use crate::shape::{point_in_clip, ObjectBase, ObjectPtr, Shape};
use crate::stats::Stat;
use crate::thread::TraceThreadData;

const DEPTH_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct Plane {
    pub base: ObjectBase,
    pub normal_vector: Vector3,
    pub distance: f64,
}

impl Plane {
    pub fn new(normal: Vector3, distance: f64) -> Plane {
        let mut p = Plane {
            base: ObjectBase::new(),
            normal_vector: normal,
            distance,
        };
        p.compute_bbox();
        p
    }

    fn intersect(&self, ray: &Ray<'_>, thread: &mut TraceThreadData<'_>) -> Option<f64> {
        thread.stats.bump(Stat::RayPlaneTests);

        let (normal_dot_origin, normal_dot_direction) = match self.base.trans {
            None => (
                self.normal_vector.dot(ray.origin),
                self.normal_vector.dot(ray.direction),
            ),
            Some(ref trans) => {
                let p = trans.inverse_transform_point(ray.origin);
                let d = trans.inverse_transform_direction(ray.direction);
                (self.normal_vector.dot(p), self.normal_vector.dot(d))
            }
        };

        if normal_dot_direction.abs() < EPSILON {
            return None;
        }

        let depth = -(normal_dot_origin + self.distance) / normal_dot_direction;
        if depth >= DEPTH_TOLERANCE && depth <= MAX_DISTANCE {
            thread.stats.bump(Stat::RayPlaneTestsSucceeded);
            Some(depth)
        } else {
            None
        }
    }
}

impl Shape for Plane {
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
        if let Some(depth) = self.intersect(ray, thread) {
            let ipoint = ray.evaluate(depth);
            if self.base.clip.is_empty() || point_in_clip(ipoint, &self.base.clip, thread) {
                stack.push(Intersection::new(depth, ipoint, self));
                return true;
            }
        }
        false
    }

    fn inside(&self, point: Vector3, _thread: &mut TraceThreadData<'_>) -> bool {
        let temp = match self.base.trans {
            None => point.dot(self.normal_vector),
            Some(ref trans) => trans.inverse_transform_point(point).dot(self.normal_vector),
        };
        (temp + self.distance) < EPSILON
    }

    fn normal(&self, _inter: &Intersection<'_>, _thread: &mut TraceThreadData<'_>) -> Vector3 {
        match self.base.trans {
            None => self.normal_vector,
            Some(ref trans) => trans.transform_normal(self.normal_vector).normalize(),
        }
    }

    fn translate(&mut self, vector: Vector3, trans: &Transform) {
        if self.base.trans.is_none() {
            self.distance -= self.normal_vector.dot(vector);
            self.compute_bbox();
        } else {
            self.transform(trans);
        }
    }

    fn rotate(&mut self, _vector: Vector3, trans: &Transform) {
        if self.base.trans.is_none() {
            self.normal_vector = trans.transform_direction(self.normal_vector);
            self.compute_bbox();
        } else {
            self.transform(trans);
        }
    }

    fn scale(&mut self, vector: Vector3, trans: &Transform) {
        if self.base.trans.is_none() {
            self.normal_vector /= vector;
            let length = self.normal_vector.length();
            self.normal_vector /= length;
            self.distance /= length;
            self.compute_bbox();
        } else {
            self.transform(trans);
        }
    }

    fn transform(&mut self, trans: &Transform) {
        match self.base.trans {
            Some(ref mut t) => t.compose(trans),
            None => self.base.trans = Some(*trans),
        }
        self.compute_bbox();
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.normal_vector = -self.normal_vector;
        self.distance = -self.distance;
        self
    }

    fn compute_bbox(&mut self) {
        self.base.bbox = BoundingBox::infinite();
        if !self.base.clip.is_empty() {
            self.base.bbox = self.base.clip[0].bbox();
        }
    }

    fn as_plane(&self) -> Option<&Plane> {
        Some(self)
    }
}

/// Half-space extents used by the CSG-intersection bbox tightening: an
/// axis-aligned plane clips one side of one axis.
pub fn plane_min_max(plane: &Plane) -> (Vector3, Vector3) {
    let (n, d) = match plane.base.trans {
        None => (plane.normal_vector, -plane.distance),
        Some(ref trans) => {
            let n = trans.inverse_transform_normal(plane.normal_vector);
            let p = trans.inverse_transform_point(n);
            (
                n,
                -plane.distance - p.x * n.x - p.y * n.y - p.z * n.z + 1.0,
            )
        }
    };

    let mut min = Vector3::new(
        -crate::math::BOUND_HUGE / 2.0,
        -crate::math::BOUND_HUGE / 2.0,
        -crate::math::BOUND_HUGE / 2.0,
    );
    let mut max = Vector3::new(
        crate::math::BOUND_HUGE / 2.0,
        crate::math::BOUND_HUGE / 2.0,
        crate::math::BOUND_HUGE / 2.0,
    );

    // n isn't necessarily normalized, so test the two zero components.
    if n.y.abs() < EPSILON && n.z.abs() < EPSILON {
        if n.x > 0.0 {
            max.x = d;
        } else {
            min.x = -d;
        }
    }
    if n.x.abs() < EPSILON && n.z.abs() < EPSILON {
        if n.y > 0.0 {
            max.y = d;
        } else {
            min.y = -d;
        }
    }
    if n.x.abs() < EPSILON && n.y.abs() < EPSILON {
        if n.z > 0.0 {
            max.z = d;
        } else {
            min.z = -d;
        }
    }

    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::TraceTicket;

    fn ray<'a>(origin: Vector3, direction: Vector3) -> Ray<'a> {
        Ray::new(origin, direction, TraceTicket::new(5, 0))
    }

    #[test]
    fn intersect_from_origin_along_normal() {
        // For a plane with unit normal n and distance d, a ray from the
        // world origin along n hits at -d / (n·n) = -d.
        let plane = Plane::new(Vector3::new(0.0, 1.0, 0.0), -3.0);
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        assert!(plane.all_intersections(&r, &mut stack, &mut thread));
        assert_eq!(stack.len(), 1);
        assert!((stack.top().depth - 3.0).abs() < 1.0e-12);
    }

    #[test]
    fn parallel_ray_misses() {
        let plane = Plane::new(Vector3::new(0.0, 1.0, 0.0), 0.0);
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.0, 1.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert!(!plane.all_intersections(&r, &mut stack, &mut thread));
        assert!(stack.is_empty());
    }

    #[test]
    fn inside_is_the_negative_half_space() {
        let plane = Plane::new(Vector3::new(0.0, 1.0, 0.0), 0.0);
        let mut thread = TraceThreadData::new(0);
        assert!(plane.inside(Vector3::new(0.0, -1.0, 0.0), &mut thread));
        assert!(!plane.inside(Vector3::new(0.0, 1.0, 0.0), &mut thread));
    }

    #[test]
    fn invert_flips_the_half_space() {
        let plane: ObjectPtr = Box::new(Plane::new(Vector3::new(0.0, 1.0, 0.0), 0.0));
        let inverted = plane.invert();
        let mut thread = TraceThreadData::new(0);
        assert!(!inverted.inside(Vector3::new(0.0, -1.0, 0.0), &mut thread));
        assert!(inverted.inside(Vector3::new(0.0, 1.0, 0.0), &mut thread));
    }

    #[test]
    fn translate_shifts_distance() {
        let mut plane = Plane::new(Vector3::new(0.0, 1.0, 0.0), 0.0);
        let v = Vector3::new(0.0, 2.0, 0.0);
        plane.translate(v, &Transform::translation(v));
        let mut thread = TraceThreadData::new(0);
        assert!(plane.inside(Vector3::new(0.0, 1.0, 0.0), &mut thread));
        assert!(!plane.inside(Vector3::new(0.0, 3.0, 0.0), &mut thread));
    }
}
