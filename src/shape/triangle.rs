#![allow(dead_code)]

//! Flat and smooth (vertex-normal interpolating) triangles.
//!
//! Intersection projects the hit point onto the triangle's dominant axis
//! and runs three edge sign tests there; construction normalises the vertex
//! order so those tests have a consistent sign, recording any swap so the
//! flat triangle can keep its original facing.

use crate::bbox::BoundingBox;
use crate::istack::{IStack, Intersection};
use crate::math::{dominant_axis, Transform, Vector3, EPSILON, MAX_DISTANCE};
use crate::ray::Ray;
use crate::shape::{point_in_clip, ObjectBase, ObjectPtr, Shape, DEGENERATE_FLAG};
use crate::stats::Stat;
use crate::thread::TraceThreadData;

const DEPTH_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct Triangle {
    pub base: ObjectBase,
    pub p1: Vector3,
    pub p2: Vector3,
    pub p3: Vector3,
    normal_vector: Vector3,
    distance: f64,
    dominant: usize,
    point_order_swapped: bool,
}

impl Triangle {
    pub fn new(p1: Vector3, p2: Vector3, p3: Vector3) -> Triangle {
        let mut t = Triangle {
            base: ObjectBase::new(),
            p1,
            p2,
            p3,
            normal_vector: Vector3::new(0.0, 1.0, 0.0),
            distance: 0.0,
            dominant: 1,
            point_order_swapped: false,
        };
        t.compute_triangle();
        t
    }

    pub fn is_degenerate(&self) -> bool {
        self.base.test_flag(DEGENERATE_FLAG)
    }

    fn compute_triangle(&mut self) -> bool {
        let v1 = self.p1 - self.p2;
        let v2 = self.p3 - self.p2;
        let mut normal = v1.cross(v2);
        if self.point_order_swapped {
            normal = -normal;
        }

        let length = normal.length();
        if length == 0.0 {
            self.base.set_flag(DEGENERATE_FLAG);
            return false;
        }
        self.normal_vector = normal / length;
        self.distance = -self.normal_vector.dot(self.p1);

        self.dominant = dominant_axis(self.normal_vector);
        if self.edge_order_needs_swap() {
            std::mem::swap(&mut self.p1, &mut self.p2);
            self.point_order_swapped = !self.point_order_swapped;
        }

        self.compute_bbox();
        true
    }

    fn edge_order_needs_swap(&self) -> bool {
        let (p1, p2, p3) = (self.p1, self.p2, self.p3);
        match self.dominant {
            0 => (p2.y - p3.y) * (p2.z - p1.z) < (p2.z - p3.z) * (p2.y - p1.y),
            1 => (p2.x - p3.x) * (p2.z - p1.z) < (p2.z - p3.z) * (p2.x - p1.x),
            _ => (p2.x - p3.x) * (p2.y - p1.y) < (p2.y - p3.y) * (p2.x - p1.x),
        }
    }

    fn intersect(&self, ray: &Ray<'_>) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }

        let normal_dot_direction = self.normal_vector.dot(ray.direction);
        if normal_dot_direction.abs() < EPSILON {
            return None;
        }
        let normal_dot_origin = self.normal_vector.dot(ray.origin);
        let depth = -(self.distance + normal_dot_origin) / normal_dot_direction;
        if depth < DEPTH_TOLERANCE || depth > MAX_DISTANCE {
            return None;
        }

        if self.point_inside_projection(ray, depth) {
            Some(depth)
        } else {
            None
        }
    }

    fn point_inside_projection(&self, ray: &Ray<'_>, depth: f64) -> bool {
        inside_projected(self.p1, self.p2, self.p3, self.dominant, ray, depth)
    }
}

/// The three edge sign tests in the dominant-axis projection.
fn inside_projected(
    p1: Vector3,
    p2: Vector3,
    p3: Vector3,
    dominant: usize,
    ray: &Ray<'_>,
    depth: f64,
) -> bool {
    match dominant {
        0 => {
            let s = ray.origin.y + depth * ray.direction.y;
            let t = ray.origin.z + depth * ray.direction.z;
            !((p2.y - s) * (p2.z - p1.z) < (p2.z - t) * (p2.y - p1.y)
                || (p3.y - s) * (p3.z - p2.z) < (p3.z - t) * (p3.y - p2.y)
                || (p1.y - s) * (p1.z - p3.z) < (p1.z - t) * (p1.y - p3.y))
        }
        1 => {
            let s = ray.origin.x + depth * ray.direction.x;
            let t = ray.origin.z + depth * ray.direction.z;
            !((p2.x - s) * (p2.z - p1.z) < (p2.z - t) * (p2.x - p1.x)
                || (p3.x - s) * (p3.z - p2.z) < (p3.z - t) * (p3.x - p2.x)
                || (p1.x - s) * (p1.z - p3.z) < (p1.z - t) * (p1.x - p3.x))
        }
        _ => {
            let s = ray.origin.x + depth * ray.direction.x;
            let t = ray.origin.y + depth * ray.direction.y;
            !((p2.x - s) * (p2.y - p1.y) < (p2.y - t) * (p2.x - p1.x)
                || (p3.x - s) * (p3.y - p2.y) < (p3.y - t) * (p3.x - p2.x)
                || (p1.x - s) * (p1.y - p3.y) < (p1.y - t) * (p1.x - p3.x))
        }
    }
}

impl Shape for Triangle {
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
        thread.stats.bump(Stat::RayTriangleTests);
        if let Some(depth) = self.intersect(ray) {
            thread.stats.bump(Stat::RayTriangleTestsSucceeded);
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
        self.normal_vector
    }

    fn translate(&mut self, vector: Vector3, _trans: &Transform) {
        if !self.is_degenerate() {
            self.p1 += vector;
            self.p2 += vector;
            self.p3 += vector;
            self.compute_triangle();
        }
    }

    fn rotate(&mut self, _vector: Vector3, trans: &Transform) {
        if !self.is_degenerate() {
            self.transform(trans);
        }
    }

    fn scale(&mut self, vector: Vector3, _trans: &Transform) {
        if !self.is_degenerate() {
            self.p1 *= vector;
            self.p2 *= vector;
            self.p3 *= vector;
            self.compute_triangle();
        }
    }

    fn transform(&mut self, trans: &Transform) {
        if !self.is_degenerate() {
            self.p1 = trans.transform_point(self.p1);
            self.p2 = trans.transform_point(self.p2);
            self.p3 = trans.transform_point(self.p3);
            self.compute_triangle();
        }
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.base.invert_flag(crate::shape::INVERTED_FLAG);
        self
    }

    fn compute_bbox(&mut self) {
        use crate::math::{max3, min3};
        let min = Vector3::new(
            min3(self.p1.x, self.p2.x, self.p3.x),
            min3(self.p1.y, self.p2.y, self.p3.y),
            min3(self.p1.z, self.p2.z, self.p3.z),
        );
        let max = Vector3::new(
            max3(self.p1.x, self.p2.x, self.p3.x),
            max3(self.p1.y, self.p2.y, self.p3.y),
            max3(self.p1.z, self.p2.z, self.p3.z),
        );
        self.base.bbox = BoundingBox::from_points(min - Vector3::splat(EPSILON), max + Vector3::splat(EPSILON));
    }
}

/// A triangle with per-vertex normals interpolated across the face.
#[derive(Debug, Clone)]
pub struct SmoothTriangle {
    pub base: ObjectBase,
    pub p1: Vector3,
    pub p2: Vector3,
    pub p3: Vector3,
    pub n1: Vector3,
    pub n2: Vector3,
    pub n3: Vector3,
    normal_vector: Vector3,
    distance: f64,
    dominant: usize,
    /// Precomputed barycentric basis for normal interpolation.
    perp: Vector3,
    v_axis: usize,
}

impl SmoothTriangle {
    pub fn new(
        p1: Vector3,
        p2: Vector3,
        p3: Vector3,
        n1: Vector3,
        n2: Vector3,
        n3: Vector3,
    ) -> SmoothTriangle {
        let mut t = SmoothTriangle {
            base: ObjectBase::new(),
            p1,
            p2,
            p3,
            n1: n1.normalize(),
            n2: n2.normalize(),
            n3: n3.normalize(),
            normal_vector: Vector3::new(0.0, 1.0, 0.0),
            distance: 0.0,
            dominant: 1,
            perp: Vector3::new(0.0, 0.0, 0.0),
            v_axis: 0,
        };
        t.compute_triangle();
        t
    }

    pub fn is_degenerate(&self) -> bool {
        self.base.test_flag(DEGENERATE_FLAG)
    }

    fn compute_triangle(&mut self) -> bool {
        let v1 = self.p1 - self.p2;
        let v2 = self.p3 - self.p2;
        let normal = v1.cross(v2);

        let length = normal.length();
        if length == 0.0 {
            self.base.set_flag(DEGENERATE_FLAG);
            return false;
        }
        self.normal_vector = normal / length;
        self.distance = -self.normal_vector.dot(self.p1);

        self.dominant = dominant_axis(self.normal_vector);
        if self.edge_order_needs_swap() {
            std::mem::swap(&mut self.p1, &mut self.p2);
            std::mem::swap(&mut self.n1, &mut self.n2);
        }

        let ok = self.compute_smooth_basis();
        self.compute_bbox();
        ok
    }

    fn edge_order_needs_swap(&self) -> bool {
        let (p1, p2, p3) = (self.p1, self.p2, self.p3);
        match self.dominant {
            0 => (p2.y - p3.y) * (p2.z - p1.z) < (p2.z - p3.z) * (p2.y - p1.y),
            1 => (p2.x - p3.x) * (p2.z - p1.z) < (p2.z - p3.z) * (p2.x - p1.x),
            _ => (p2.x - p3.x) * (p2.y - p1.y) < (p2.y - p3.y) * (p2.x - p1.x),
        }
    }

    fn compute_smooth_basis(&mut self) -> bool {
        let p3_minus_p2 = self.p3 - self.p2;
        self.v_axis = dominant_axis(p3_minus_p2);

        let mut vtemp1 = (self.p2 - self.p3).normalize();
        let vtemp2 = self.p1 - self.p3;
        let proj = vtemp2.dot(vtemp1);
        vtemp1 *= proj;
        self.perp = (vtemp1 - vtemp2).normalize();
        let u_denominator = vtemp2.dot(self.perp);
        self.perp /= -u_denominator;

        // Degenerate if the vertex normals straddle the face normal.
        let x = self.normal_vector.dot(self.n1);
        let y = self.normal_vector.dot(self.n2);
        let z = self.normal_vector.dot(self.n3);
        if (x < 0.0 && y < 0.0 && z < 0.0) || (x > 0.0 && y > 0.0 && z > 0.0) {
            true
        } else {
            self.base.set_flag(DEGENERATE_FLAG);
            false
        }
    }

    fn intersect(&self, ray: &Ray<'_>) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }

        let normal_dot_direction = self.normal_vector.dot(ray.direction);
        if normal_dot_direction.abs() < EPSILON {
            return None;
        }
        let normal_dot_origin = self.normal_vector.dot(ray.origin);
        let depth = -(self.distance + normal_dot_origin) / normal_dot_direction;
        if depth < DEPTH_TOLERANCE || depth > MAX_DISTANCE {
            return None;
        }

        if inside_projected(self.p1, self.p2, self.p3, self.dominant, ray, depth) {
            Some(depth)
        } else {
            None
        }
    }
}

impl Shape for SmoothTriangle {
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
        thread.stats.bump(Stat::RaySmoothTriangleTests);
        if let Some(depth) = self.intersect(ray) {
            thread.stats.bump(Stat::RaySmoothTriangleTestsSucceeded);
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

    fn normal(&self, inter: &Intersection<'_>, _thread: &mut TraceThreadData<'_>) -> Vector3 {
        let pi_minus_p1 = inter.ipoint - self.p1;
        let u = pi_minus_p1.dot(self.perp);
        if u < EPSILON {
            return self.n1;
        }

        let axis = self.v_axis;
        let v = (crate::math::component(pi_minus_p1, axis) / u
            + crate::math::component(self.p1, axis)
            - crate::math::component(self.p2, axis))
            / (crate::math::component(self.p3, axis) - crate::math::component(self.p2, axis));

        (self.n1 + u * (self.n2 - self.n1 + v * (self.n3 - self.n2))).normalize()
    }

    fn translate(&mut self, vector: Vector3, _trans: &Transform) {
        if !self.is_degenerate() {
            self.p1 += vector;
            self.p2 += vector;
            self.p3 += vector;
            self.compute_triangle();
        }
    }

    fn rotate(&mut self, _vector: Vector3, trans: &Transform) {
        if !self.is_degenerate() {
            self.transform(trans);
        }
    }

    fn scale(&mut self, vector: Vector3, _trans: &Transform) {
        if !self.is_degenerate() {
            self.p1 *= vector;
            self.p2 *= vector;
            self.p3 *= vector;
            self.n1 = (self.n1 / vector).normalize();
            self.n2 = (self.n2 / vector).normalize();
            self.n3 = (self.n3 / vector).normalize();
            self.compute_triangle();
        }
    }

    fn transform(&mut self, trans: &Transform) {
        if !self.is_degenerate() {
            self.p1 = trans.transform_point(self.p1);
            self.p2 = trans.transform_point(self.p2);
            self.p3 = trans.transform_point(self.p3);
            self.n1 = trans.transform_normal(self.n1).normalize();
            self.n2 = trans.transform_normal(self.n2).normalize();
            self.n3 = trans.transform_normal(self.n3).normalize();
            self.compute_triangle();
        }
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.base.invert_flag(crate::shape::INVERTED_FLAG);
        self
    }

    fn compute_bbox(&mut self) {
        use crate::math::{max3, min3};
        let min = Vector3::new(
            min3(self.p1.x, self.p2.x, self.p3.x),
            min3(self.p1.y, self.p2.y, self.p3.y),
            min3(self.p1.z, self.p2.z, self.p3.z),
        );
        let max = Vector3::new(
            max3(self.p1.x, self.p2.x, self.p3.x),
            max3(self.p1.y, self.p2.y, self.p3.y),
            max3(self.p1.z, self.p2.z, self.p3.z),
        );
        self.base.bbox = BoundingBox::from_points(min - Vector3::splat(EPSILON), max + Vector3::splat(EPSILON));
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
    fn flat_triangle_hit_and_miss() {
        let tri = Triangle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        let mut thread = TraceThreadData::new(0);

        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.25, 0.25, 1.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(tri.all_intersections(&r, &mut stack, &mut thread));
        assert!((stack.top().depth - 1.0).abs() < 1.0e-12);

        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.75, 0.75, 1.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(!tri.all_intersections(&r, &mut stack, &mut thread));
    }

    #[test]
    fn degenerate_triangle_is_flagged_and_skipped() {
        let tri = Triangle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(2.0, 2.0, 2.0),
        );
        assert!(tri.is_degenerate());

        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!tri.all_intersections(&r, &mut stack, &mut thread));
    }

    #[test]
    fn smooth_triangle_constant_normals_interpolate_exactly() {
        let up = Vector3::new(0.0, 0.0, 1.0);
        let tri = SmoothTriangle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            up,
            up,
            up,
        );
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.25, 0.25, 1.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(tri.all_intersections(&r, &mut stack, &mut thread));
        let inter = *stack.top();
        assert!((inter.depth - 1.0).abs() < 1.0e-12);
        let n = tri.normal(&inter, &mut thread);
        assert_eq!(n, up);
    }

    #[test]
    fn smooth_triangle_blends_vertex_normals() {
        let tri = SmoothTriangle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.3, 0.0, 1.0).normalize(),
            Vector3::new(0.0, 0.3, 1.0).normalize(),
        );
        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.5, 0.5, 1.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(tri.all_intersections(&r, &mut stack, &mut thread));
        let inter = *stack.top();
        let n = tri.normal(&inter, &mut thread);
        assert!((n.length() - 1.0).abs() < 1.0e-12);
        // Blended away from any single vertex normal.
        assert!(n.x > 0.0 && n.y > 0.0 && n.z > 0.5);
    }

    #[test]
    fn translate_preserves_hit() {
        let mut tri = Triangle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        let v = Vector3::new(0.0, 0.0, -2.0);
        tri.translate(v, &Transform::translation(v));

        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(0.25, 0.25, 1.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(tri.all_intersections(&r, &mut stack, &mut thread));
        assert!((stack.top().depth - 3.0).abs() < 1.0e-12);
    }
}
