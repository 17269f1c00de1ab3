#![allow(dead_code)]

//! A (possibly non-convex, possibly multi-contour) planar polygon.
//!
//! The vertices are projected into a local 2D frame at construction; the
//! even-odd crossings rule decides inclusion. Collinear or non-coplanar
//! input flags the polygon degenerate, and degenerate polygons never
//! intersect anything.

use std::sync::Arc;

use glam::DVec4;

use crate::bbox::BoundingBox;
use crate::istack::{IStack, Intersection};
use crate::math::{Matrix4x4, Transform, Vector2, Vector3, EPSILON, MAX_DISTANCE, SMALL_TOLERANCE};
use crate::ray::Ray;
use crate::shape::{point_in_clip, ObjectBase, ObjectPtr, Shape, DEGENERATE_FLAG};
use crate::stats::Stat;
use crate::thread::TraceThreadData;

/// Minimal intersection depth for a valid intersection.
const DEPTH_TOLERANCE: f64 = 1.0e-8;

/// If |x| < ZERO_TOLERANCE x is assumed to be 0.
const ZERO_TOLERANCE: f64 = 1.0e-10;

/// The projected outline, shared between copies of the polygon.
#[derive(Debug)]
pub struct PolygonData {
    pub points: Vec<Vector2>,
}

#[derive(Debug, Clone)]
pub struct Polygon {
    pub base: ObjectBase,
    s_normal: Vector3,
    data: Arc<PolygonData>,
}

impl Polygon {
    /// Builds a polygon from coplanar 3D vertices. Contours are closed by
    /// repeating their first vertex, exactly as the outline was handed over
    /// by the front end.
    pub fn new(points: &[Vector3]) -> Polygon {
        let mut poly = Polygon {
            base: ObjectBase::new(),
            s_normal: Vector3::new(0.0, 0.0, 1.0),
            data: Arc::new(PolygonData { points: Vec::new() }),
        };
        poly.compute_polygon(points);
        poly
    }

    fn compute_polygon(&mut self, points: &[Vector3]) {
        let number = points.len();
        let o = points[0];

        // Find a non-zero u axis.
        let mut u = Vector3::new(0.0, 0.0, 0.0);
        let mut i = 1;
        while i < number {
            u = points[i] - o;
            if u.length_squared() > EPSILON {
                break;
            }
            i += 1;
        }
        if i == number {
            self.base.set_flag(DEGENERATE_FLAG);
            log::warn!("points in polygon are co-linear; ignoring polygon");
        }

        // Find independent v and w.
        let mut v = Vector3::new(0.0, 0.0, 0.0);
        let mut w = Vector3::new(0.0, 0.0, 0.0);
        i += 1;
        while i < number {
            v = points[i] - o;
            w = u.cross(v);
            if v.length_squared() > EPSILON && w.length_squared() > EPSILON {
                break;
            }
            i += 1;
        }
        if i == number {
            self.base.set_flag(DEGENERATE_FLAG);
            log::warn!("points in polygon are co-linear; ignoring polygon");
        }

        let u = v.cross(w).normalize();
        let v = w.cross(u).normalize();
        let w = w.normalize();

        // Local frame: u/v span the plane, w is its normal.
        let matrix = Matrix4x4::from_cols(
            DVec4::new(u.x, u.y, u.z, 0.0),
            DVec4::new(v.x, v.y, v.z, 0.0),
            DVec4::new(w.x, w.y, w.z, 0.0),
            DVec4::new(o.x, o.y, o.z, 1.0),
        );
        self.base.trans = Some(Transform::from_matrix(matrix));

        // Project (3D -> 2D) and check coplanarity.
        let mut projected = Vec::with_capacity(number);
        for p in points {
            let rel = *p - o;
            let d = rel.dot(w);
            if d.abs() > ZERO_TOLERANCE {
                self.base.set_flag(DEGENERATE_FLAG);
                log::warn!("points in polygon are not co-planar; ignoring polygon");
            }
            projected.push(Vector2::new(rel.dot(u), rel.dot(v)));
        }
        self.data = Arc::new(PolygonData { points: projected });

        self.s_normal = self
            .base
            .trans
            .as_ref()
            .unwrap()
            .transform_normal(Vector3::new(0.0, 0.0, 1.0))
            .normalize();
        self.compute_bbox();
    }

    fn intersect(&self, ray: &Ray<'_>, thread: &mut TraceThreadData<'_>) -> Option<f64> {
        if self.base.test_flag(DEGENERATE_FLAG) {
            return None;
        }
        thread.stats.bump(Stat::RayPolygonTests);

        let trans = self.base.trans.as_ref().unwrap();
        let p = trans.inverse_transform_point(ray.origin);
        let mut d = trans.inverse_transform_direction(ray.direction);
        let len = d.length();
        d /= len;

        if d.z.abs() < ZERO_TOLERANCE {
            return None;
        }

        let depth = -p.z / d.z;
        if depth < DEPTH_TOLERANCE || depth > MAX_DISTANCE {
            return None;
        }

        let x = p.x + depth * d.x;
        let y = p.y + depth * d.y;
        if in_polygon(&self.data.points, x, y) {
            thread.stats.bump(Stat::RayPolygonTestsSucceeded);
            Some(depth / len)
        } else {
            None
        }
    }
}

/// Even-odd crossings test against the +x axis from the test point.
fn in_polygon(points: &[Vector2], u: f64, v: f64) -> bool {
    let mut inside = false;
    if points.len() < 2 {
        return false;
    }

    let mut v0 = points[0];
    let mut yflag0 = v0.y >= v;
    for p in points[1..].iter() {
        let v1 = *p;
        let yflag1 = v1.y >= v;
        // Only edges straddling the horizontal through the test point can
        // cross the +x ray.
        if yflag0 != yflag1 {
            if ((v1.y - v) * (v0.x - v1.x) >= (v1.x - u) * (v0.y - v1.y)) == yflag1 {
                inside = !inside;
            }
        }
        v0 = v1;
        yflag0 = yflag1;
    }
    inside
}

impl Shape for Polygon {
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

    fn inside(&self, _point: Vector3, _thread: &mut TraceThreadData<'_>) -> bool {
        false
    }

    fn normal(&self, _inter: &Intersection<'_>, _thread: &mut TraceThreadData<'_>) -> Vector3 {
        self.s_normal
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
        match self.base.trans {
            Some(ref mut t) => t.compose(trans),
            None => self.base.trans = Some(*trans),
        }
        self.s_normal = self
            .base
            .trans
            .as_ref()
            .unwrap()
            .transform_normal(Vector3::new(0.0, 0.0, 1.0))
            .normalize();
        self.compute_bbox();
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.base.invert_flag(crate::shape::INVERTED_FLAG);
        self
    }

    fn compute_bbox(&mut self) {
        let trans = match self.base.trans {
            Some(ref t) => *t,
            None => Transform::identity(),
        };
        let mut bbox = BoundingBox::new();
        for p in self.data.points.iter() {
            bbox |= trans.transform_point(Vector3::new(p.x, p.y, 0.0));
        }

        // Pad out the flat axes.
        for axis in 0..3 {
            let size = crate::math::component(bbox.max - bbox.min, axis);
            if size.abs() < SMALL_TOLERANCE {
                let lo = crate::math::component(bbox.min, axis) - SMALL_TOLERANCE;
                let hi = crate::math::component(bbox.max, axis) + SMALL_TOLERANCE;
                crate::math::set_component(&mut bbox.min, axis, lo);
                crate::math::set_component(&mut bbox.max, axis, hi);
            }
        }
        self.base.bbox = bbox;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::TraceTicket;

    fn ray<'a>(origin: Vector3, direction: Vector3) -> Ray<'a> {
        Ray::new(origin, direction, TraceTicket::new(5, 0))
    }

    fn unit_square() -> Polygon {
        Polygon::new(&[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
        ])
    }

    #[test]
    fn square_hit() {
        let poly = unit_square();
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.5, 0.5, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(poly.all_intersections(&r, &mut stack, &mut thread));
        assert!((stack.top().depth - 2.0).abs() < 1.0e-9);
    }

    #[test]
    fn square_miss() {
        let poly = unit_square();
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(1.5, 0.5, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!poly.all_intersections(&r, &mut stack, &mut thread));
    }

    #[test]
    fn concave_polygon() {
        // An L shape; the notch must not count as inside.
        let poly = Polygon::new(&[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(2.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(1.0, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
        ]);
        let mut thread = TraceThreadData::new(0);

        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.5, 1.5, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(poly.all_intersections(&r, &mut stack, &mut thread));

        let mut stack = IStack::new();
        let r = ray(Vector3::new(1.5, 1.5, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!poly.all_intersections(&r, &mut stack, &mut thread));
    }

    #[test]
    fn collinear_points_degenerate() {
        let poly = Polygon::new(&[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        ]);
        assert!(poly.base.test_flag(DEGENERATE_FLAG));
    }

    #[test]
    fn non_coplanar_points_degenerate() {
        let poly = Polygon::new(&[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.5),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
        ]);
        assert!(poly.base.test_flag(DEGENERATE_FLAG));
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.5, 0.5, -2.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!poly.all_intersections(&r, &mut stack, &mut thread));
    }
}
