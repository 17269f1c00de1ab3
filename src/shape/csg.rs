#![allow(dead_code)]

//! CSG compounds: union, merge, and intersection (difference is an
//! intersection whose subtracted children are inverted).
//!
//! Set semantics come from filtering child hits against the inside tests of
//! the siblings; merge additionally discards hits that lie inside any
//! sibling, which removes the internal surfaces where transparent children
//! overlap.

use crate::bbox::BoundingBox;
use crate::istack::{IStack, Intersection};
use crate::math::{Transform, Vector3, BOUND_HUGE};
use crate::ray::Ray;
use crate::shape::{
    inside_object, point_in_clip, ray_in_bound, test_ray_flags, test_ray_flags_shadow, ObjectBase,
    ObjectPtr, Shape, INVERTED_FLAG,
};
use crate::stats::Stat;
use crate::texture::Texture;
use crate::thread::TraceThreadData;

#[derive(Debug)]
pub struct CsgUnion {
    pub base: ObjectBase,
    pub children: Vec<ObjectPtr>,
}

#[derive(Debug)]
pub struct CsgMerge {
    pub base: ObjectBase,
    pub children: Vec<ObjectPtr>,
}

#[derive(Debug)]
pub struct CsgIntersection {
    pub base: ObjectBase,
    pub children: Vec<ObjectPtr>,
    pub is_difference: bool,
}

impl CsgUnion {
    pub fn new(children: Vec<ObjectPtr>) -> CsgUnion {
        let mut c = CsgUnion {
            base: ObjectBase::new(),
            children,
        };
        c.compute_bbox();
        c
    }
}

impl CsgMerge {
    pub fn new(children: Vec<ObjectPtr>) -> CsgMerge {
        let mut c = CsgMerge {
            base: ObjectBase::new(),
            children,
        };
        c.compute_bbox();
        c
    }
}

impl CsgIntersection {
    pub fn new(children: Vec<ObjectPtr>) -> CsgIntersection {
        let mut c = CsgIntersection {
            base: ObjectBase::new(),
            children,
            is_difference: false,
        };
        c.compute_bbox();
        c
    }

    /// `lhs - rhs...`: intersection of the first child with the inverted
    /// rest.
    pub fn difference(first: ObjectPtr, subtract: Vec<ObjectPtr>) -> CsgIntersection {
        let mut children = vec![first];
        for child in subtract {
            children.push(child.invert());
        }
        let mut c = CsgIntersection::new(children);
        c.is_difference = true;
        c
    }
}

/// Union-of-children box.
fn union_bbox(children: &[ObjectPtr]) -> BoundingBox {
    let mut bbox = BoundingBox::new();
    for child in children {
        bbox |= child.bbox();
    }
    bbox
}

/// Intersection-of-children box: start at infinity, intersect each
/// non-inverted child's extents. Planes contribute half-spaces; quadrics go
/// last so they can tighten analytically against the accumulated extents.
fn intersection_bbox(children: &mut Vec<ObjectPtr>, old: BoundingBox) -> BoundingBox {
    let mut new_min = Vector3::splat(-BOUND_HUGE);
    let mut new_max = Vector3::splat(BOUND_HUGE);
    let mut quadric_idx = Vec::new();

    for (i, child) in children.iter().enumerate() {
        if child.base().test_flag(INVERTED_FLAG) {
            continue;
        }
        if child.as_quadric().is_some() {
            quadric_idx.push(i);
            continue;
        }
        let (tmp_min, tmp_max) = match child.as_plane() {
            Some(p) => crate::shape::plane::plane_min_max(p),
            None => {
                let b = child.bbox();
                (b.min, b.max)
            }
        };
        new_min = new_min.max(tmp_min);
        new_max = new_max.min(tmp_max);
    }

    for i in quadric_idx {
        let q = children[i].as_quadric_mut().expect("index collected above");
        q.compute_bbox_clipped(new_min, new_max);
        let b = q.bbox();
        new_min = new_min.max(b.min);
        new_max = new_max.min(b.max);
    }

    if new_min.x > new_max.x || new_min.y > new_max.y || new_min.z > new_max.z {
        log::warn!("degenerate CSG bounding box (not used)");
        old
    } else {
        let new_volume = (new_max.x - new_min.x) * (new_max.y - new_min.y) * (new_max.z - new_min.z);
        if new_volume < old.volume() {
            let mut bbox = BoundingBox::from_points(new_min, new_max);
            bbox.guard_critical_length();
            bbox
        } else {
            old
        }
    }
}

fn transform_children(children: &mut [ObjectPtr], trans: &Transform) {
    for child in children.iter_mut() {
        child.transform(trans);
    }
}

impl Shape for CsgUnion {
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
        thread.stats.bump(Stat::RayCsgUnionTests);
        let mut found = false;

        if self.base.clip.is_empty() {
            for child in self.children.iter() {
                if test_ray_flags(ray, child.as_ref()) && ray_in_bound(ray, child.as_ref()) {
                    if child.all_intersections(ray, stack, thread) {
                        found = true;
                    }
                }
            }
        } else {
            let mut local = thread.stack_pool.acquire();
            debug_assert!(local.is_empty());
            for child in self.children.iter() {
                if test_ray_flags(ray, child.as_ref()) && ray_in_bound(ray, child.as_ref()) {
                    if child.all_intersections(ray, &mut local, thread) {
                        while let Some(mut isect) = local.pop() {
                            if point_in_clip(isect.ipoint, &self.base.clip, thread) {
                                isect.csg = Some(self);
                                stack.push(isect);
                                found = true;
                            }
                        }
                    }
                }
            }
            debug_assert!(local.is_empty());
            thread.stack_pool.release(local);
        }

        if found {
            thread.stats.bump(Stat::RayCsgUnionTestsSucceeded);
        }
        found
    }

    fn inside(&self, point: Vector3, thread: &mut TraceThreadData<'_>) -> bool {
        for child in self.children.iter() {
            if !child.is_childless_light() && inside_object(point, child.as_ref(), thread) {
                return true;
            }
        }
        false
    }

    fn normal(&self, inter: &Intersection<'_>, thread: &mut TraceThreadData<'_>) -> Vector3 {
        // Hits always reference the leaf that produced them; a compound is
        // never asked directly, but delegate sensibly if it happens.
        inter.object.normal(inter, thread)
    }

    fn translate(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.translate(vector, trans);
        }
        self.compute_bbox();
    }

    fn rotate(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.rotate(vector, trans);
        }
        self.compute_bbox();
    }

    fn scale(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.scale(vector, trans);
        }
        self.compute_bbox();
    }

    fn transform(&mut self, trans: &Transform) {
        transform_children(&mut self.children, trans);
        self.compute_bbox();
    }

    /// De Morgan: the complement of a union is the intersection of the
    /// complements.
    fn invert(self: Box<Self>) -> ObjectPtr {
        let me = *self;
        let children = me.children.into_iter().map(|c| c.invert()).collect();
        let mut new = CsgIntersection::new(children);
        new.base = me.base;
        new.base.invert_flag(INVERTED_FLAG);
        new.compute_bbox();
        Box::new(new)
    }

    fn compute_bbox(&mut self) {
        self.base.bbox = union_bbox(&self.children);
    }

    fn children(&self) -> &[ObjectPtr] {
        &self.children
    }

    fn determine_textures<'a>(
        &'a self,
        inter: &Intersection<'a>,
        hit_inside: bool,
        textures: &mut Vec<(f64, &'a Texture)>,
        thread: &mut TraceThreadData<'a>,
    ) {
        determine_csg_textures(&self.children, false, inter, hit_inside, textures, thread);
    }
}

impl Shape for CsgMerge {
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
        thread.stats.bump(Stat::RayCsgMergeTests);
        let mut found = false;

        let mut local = thread.stack_pool.acquire();
        debug_assert!(local.is_empty());
        for (i, child) in self.children.iter().enumerate() {
            if !test_ray_flags_shadow(ray, child.as_ref()) || !ray_in_bound(ray, child.as_ref()) {
                continue;
            }
            if child.all_intersections(ray, &mut local, thread) {
                while let Some(mut isect) = local.pop() {
                    if self.base.clip.is_empty()
                        || point_in_clip(isect.ipoint, &self.base.clip, thread)
                    {
                        // A hit strictly inside any sibling is an internal
                        // surface; suppress it.
                        let mut inside_flag = true;
                        for (j, sibling) in self.children.iter().enumerate() {
                            if i == j || sibling.is_childless_light() {
                                continue;
                            }
                            if test_ray_flags_shadow(ray, sibling.as_ref())
                                && inside_object(isect.ipoint, sibling.as_ref(), thread)
                            {
                                inside_flag = false;
                                break;
                            }
                        }
                        if inside_flag {
                            isect.csg = Some(self);
                            stack.push(isect);
                            found = true;
                        }
                    }
                }
            }
        }
        debug_assert!(local.is_empty());
        thread.stack_pool.release(local);

        if found {
            thread.stats.bump(Stat::RayCsgMergeTestsSucceeded);
        }
        found
    }

    fn inside(&self, point: Vector3, thread: &mut TraceThreadData<'_>) -> bool {
        for child in self.children.iter() {
            if !child.is_childless_light() && inside_object(point, child.as_ref(), thread) {
                return true;
            }
        }
        false
    }

    fn normal(&self, inter: &Intersection<'_>, thread: &mut TraceThreadData<'_>) -> Vector3 {
        inter.object.normal(inter, thread)
    }

    fn translate(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.translate(vector, trans);
        }
        self.compute_bbox();
    }

    fn rotate(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.rotate(vector, trans);
        }
        self.compute_bbox();
    }

    fn scale(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.scale(vector, trans);
        }
        self.compute_bbox();
    }

    fn transform(&mut self, trans: &Transform) {
        transform_children(&mut self.children, trans);
        self.compute_bbox();
    }

    fn invert(self: Box<Self>) -> ObjectPtr {
        let me = *self;
        let children = me.children.into_iter().map(|c| c.invert()).collect();
        let mut new = CsgIntersection::new(children);
        new.base = me.base;
        new.base.invert_flag(INVERTED_FLAG);
        new.compute_bbox();
        Box::new(new)
    }

    fn compute_bbox(&mut self) {
        self.base.bbox = union_bbox(&self.children);
    }

    fn children(&self) -> &[ObjectPtr] {
        &self.children
    }

    fn determine_textures<'a>(
        &'a self,
        inter: &Intersection<'a>,
        hit_inside: bool,
        textures: &mut Vec<(f64, &'a Texture)>,
        thread: &mut TraceThreadData<'a>,
    ) {
        determine_csg_textures(&self.children, false, inter, hit_inside, textures, thread);
    }
}

impl Shape for CsgIntersection {
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
        thread.stats.bump(Stat::RayCsgIntersectionTests);
        let mut found = false;

        let mut local = thread.stack_pool.acquire();
        debug_assert!(local.is_empty());
        for (i, child) in self.children.iter().enumerate() {
            if !ray_in_bound(ray, child.as_ref()) {
                continue;
            }
            if child.all_intersections(ray, &mut local, thread) {
                while let Some(mut isect) = local.pop() {
                    // Keep only hits inside every sibling.
                    let mut maybe_found = true;
                    for (j, sibling) in self.children.iter().enumerate() {
                        if i == j || sibling.is_childless_light() {
                            continue;
                        }
                        if !inside_object(isect.ipoint, sibling.as_ref(), thread) {
                            maybe_found = false;
                            break;
                        }
                    }
                    if maybe_found
                        && (self.base.clip.is_empty()
                            || point_in_clip(isect.ipoint, &self.base.clip, thread))
                    {
                        isect.csg = Some(self);
                        stack.push(isect);
                        found = true;
                    }
                }
            }
        }
        debug_assert!(local.is_empty());
        thread.stack_pool.release(local);

        if found {
            thread.stats.bump(Stat::RayCsgIntersectionTestsSucceeded);
        }
        found
    }

    fn inside(&self, point: Vector3, thread: &mut TraceThreadData<'_>) -> bool {
        for child in self.children.iter() {
            if !child.is_childless_light() && !inside_object(point, child.as_ref(), thread) {
                return false;
            }
        }
        true
    }

    fn normal(&self, inter: &Intersection<'_>, thread: &mut TraceThreadData<'_>) -> Vector3 {
        inter.object.normal(inter, thread)
    }

    fn translate(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.translate(vector, trans);
        }
        self.compute_bbox();
    }

    fn rotate(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.rotate(vector, trans);
        }
        self.compute_bbox();
    }

    fn scale(&mut self, vector: Vector3, trans: &Transform) {
        for child in self.children.iter_mut() {
            child.scale(vector, trans);
        }
        self.compute_bbox();
    }

    fn transform(&mut self, trans: &Transform) {
        transform_children(&mut self.children, trans);
        self.compute_bbox();
    }

    /// De Morgan: the complement of an intersection is the merge of the
    /// complements.
    fn invert(self: Box<Self>) -> ObjectPtr {
        let me = *self;
        let children = me.children.into_iter().map(|c| c.invert()).collect();
        let mut new = CsgMerge::new(children);
        new.base = me.base;
        new.base.invert_flag(INVERTED_FLAG);
        new.compute_bbox();
        Box::new(new)
    }

    fn compute_bbox(&mut self) {
        let old = self.base.bbox;
        self.base.bbox = intersection_bbox(&mut self.children, old);
    }

    fn children(&self) -> &[ObjectPtr] {
        &self.children
    }

    fn determine_textures<'a>(
        &'a self,
        inter: &Intersection<'a>,
        hit_inside: bool,
        textures: &mut Vec<(f64, &'a Texture)>,
        thread: &mut TraceThreadData<'a>,
    ) {
        determine_csg_textures(
            &self.children,
            self.is_difference,
            inter,
            hit_inside,
            textures,
            thread,
        );
    }
}

/// The texture walk shared by the three compounds. A difference uses only
/// its first child (the others are the removed material); everything else
/// collects all containing children, equally weighted.
fn determine_csg_textures<'a>(
    children: &'a [ObjectPtr],
    is_difference: bool,
    inter: &Intersection<'a>,
    hit_inside: bool,
    textures: &mut Vec<(f64, &'a Texture)>,
    thread: &mut TraceThreadData<'a>,
) {
    if children.is_empty() {
        return;
    }

    if is_difference {
        if children[0].inside(inter.ipoint, thread) {
            if !children[0].children().is_empty() {
                children[0].determine_textures(inter, hit_inside, textures, thread);
            } else if let Some(ref t) = children[0].base().texture {
                textures.push((1.0, t));
            }
        }
    } else {
        let first_inserted = textures.len();
        for child in children.iter() {
            if child.inside(inter.ipoint, thread) {
                if !child.children().is_empty() {
                    child.determine_textures(inter, hit_inside, textures, thread);
                } else if let Some(ref t) = child.base().texture {
                    textures.push((1.0, t));
                }
            }
        }
        let inserted = textures.len() - first_inserted;
        if inserted > 0 {
            let weight = 1.0 / inserted as f64;
            for entry in textures[first_inserted..].iter_mut() {
                entry.0 = weight;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::TraceTicket;
    use crate::shape::sphere::Sphere;

    fn ray<'a>(origin: Vector3, direction: Vector3) -> Ray<'a> {
        Ray::new(origin, direction, TraceTicket::new(5, 0))
    }

    fn depths(stack: &mut IStack<'_>) -> Vec<f64> {
        stack.sort_by_depth();
        stack.iter().map(|i| i.depth).collect()
    }

    #[test]
    fn union_of_one_is_identity() {
        // union(A) behaves exactly like A for both hits and inside tests.
        let sphere = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let union = CsgUnion::new(vec![Box::new(Sphere::new(
            Vector3::new(0.0, 0.0, 0.0),
            1.0,
        ))]);
        let mut thread = TraceThreadData::new(0);

        let r = ray(Vector3::new(0.0, 0.0, -3.0), Vector3::new(0.0, 0.0, 1.0));
        let mut s1 = IStack::new();
        let mut s2 = IStack::new();
        assert!(sphere.all_intersections(&r, &mut s1, &mut thread));
        assert!(union.all_intersections(&r, &mut s2, &mut thread));
        assert_eq!(depths(&mut s1), depths(&mut s2));

        for p in &[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.5, 0.5, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        ] {
            assert_eq!(sphere.inside(*p, &mut thread), union.inside(*p, &mut thread));
        }
    }

    #[test]
    fn difference_of_spheres() {
        // Unit sphere minus the sphere spanning x in [0, 0.5]: a ray along
        // +x sees outer enter, inner enter, inner exit, outer exit.
        let outer = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let inner = Sphere::new(Vector3::new(0.25, 0.0, 0.0), 0.25);
        let diff = CsgIntersection::difference(Box::new(outer), vec![Box::new(inner)]);

        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(-2.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert!(diff.all_intersections(&r, &mut stack, &mut thread));
        let d = depths(&mut stack);
        assert_eq!(d.len(), 4);
        assert!((d[0] - 1.0).abs() < 1.0e-9);
        assert!((d[1] - 2.0).abs() < 1.0e-9);
        assert!((d[2] - 2.5).abs() < 1.0e-9);
        assert!((d[3] - 3.0).abs() < 1.0e-9);

        // The carved-out origin is no longer inside.
        assert!(!diff.inside(Vector3::new(0.0, 0.0, 0.0), &mut thread));
        assert!(diff.inside(Vector3::new(-0.5, 0.0, 0.0), &mut thread));
    }

    #[test]
    fn merge_suppresses_internal_surfaces() {
        // Two overlapping unit spheres: any hit strictly inside the other
        // sphere is absent from a merge.
        let a = Sphere::new(Vector3::new(-0.5, 0.0, 0.0), 1.0);
        let b = Sphere::new(Vector3::new(0.5, 0.0, 0.0), 1.0);
        let merge = CsgMerge::new(vec![Box::new(a), Box::new(b)]);

        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(-3.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert!(merge.all_intersections(&r, &mut stack, &mut thread));
        let d = depths(&mut stack);
        // Only the two outermost surfaces remain.
        assert_eq!(d.len(), 2);
        assert!((d[0] - 1.5).abs() < 1.0e-9);
        assert!((d[1] - 4.5).abs() < 1.0e-9);

        // A union keeps all four.
        let a = Sphere::new(Vector3::new(-0.5, 0.0, 0.0), 1.0);
        let b = Sphere::new(Vector3::new(0.5, 0.0, 0.0), 1.0);
        let union = CsgUnion::new(vec![Box::new(a), Box::new(b)]);
        let mut stack = IStack::new();
        assert!(union.all_intersections(&r, &mut stack, &mut thread));
        assert_eq!(depths(&mut stack).len(), 4);
    }

    #[test]
    fn intersection_of_overlapping_spheres() {
        let a = Sphere::new(Vector3::new(-0.5, 0.0, 0.0), 1.0);
        let b = Sphere::new(Vector3::new(0.5, 0.0, 0.0), 1.0);
        let inter = CsgIntersection::new(vec![Box::new(a), Box::new(b)]);

        let mut thread = TraceThreadData::new(0);
        let mut stack = IStack::new();
        let r = ray(Vector3::new(-3.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert!(inter.all_intersections(&r, &mut stack, &mut thread));
        let d = depths(&mut stack);
        // The lens spans x in [-0.5, 0.5].
        assert_eq!(d.len(), 2);
        assert!((d[0] - 2.5).abs() < 1.0e-9);
        assert!((d[1] - 3.5).abs() < 1.0e-9);

        assert!(inter.inside(Vector3::new(0.0, 0.0, 0.0), &mut thread));
        assert!(!inter.inside(Vector3::new(0.75, 0.0, 0.0), &mut thread));
    }

    #[test]
    fn adding_children_cannot_grow_intersection_bbox() {
        let a = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let one = CsgIntersection::new(vec![Box::new(a)]);
        let vol_one = one.bbox().volume();

        let a = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let b = Sphere::new(Vector3::new(0.5, 0.0, 0.0), 1.0);
        let two = CsgIntersection::new(vec![Box::new(a), Box::new(b)]);
        assert!(two.bbox().volume() <= vol_one + 1.0e-12);
    }

    #[test]
    fn de_morgan_union_inversion() {
        let a = Sphere::new(Vector3::new(-0.5, 0.0, 0.0), 1.0);
        let b = Sphere::new(Vector3::new(0.5, 0.0, 0.0), 1.0);
        let union = CsgUnion::new(vec![Box::new(a), Box::new(b)]);
        let mut thread = TraceThreadData::new(0);

        let probes = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(-1.2, 0.0, 0.0),
            Vector3::new(1.2, 0.0, 0.0),
            Vector3::new(0.0, 3.0, 0.0),
        ];
        let before: Vec<bool> = probes.iter().map(|p| union.inside(*p, &mut thread)).collect();

        let inverted = Box::new(union).invert();
        for (p, was_inside) in probes.iter().zip(before) {
            assert_eq!(inverted.inside(*p, &mut thread), !was_inside);
        }
    }

    #[test]
    fn union_bbox_is_union_of_children() {
        let a = Sphere::new(Vector3::new(-2.0, 0.0, 0.0), 1.0);
        let b = Sphere::new(Vector3::new(2.0, 0.0, 0.0), 1.0);
        let union = CsgUnion::new(vec![Box::new(a), Box::new(b)]);
        let bb = union.bbox();
        assert!((bb.min.x + 3.0).abs() < 1.0e-12);
        assert!((bb.max.x - 3.0).abs() < 1.0e-12);
        assert!((bb.max.y - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn istack_balance_through_csg() {
        // The stack must end with exactly the caller's entries plus the
        // returned hits, even with the pooled local stacks in play.
        let a = Sphere::new(Vector3::new(-0.5, 0.0, 0.0), 1.0);
        let b = Sphere::new(Vector3::new(0.5, 0.0, 0.0), 1.0);
        let merge = CsgMerge::new(vec![Box::new(a), Box::new(b)]);

        let mut thread = TraceThreadData::new(0);
        let plane = crate::shape::plane::Plane::new(Vector3::new(0.0, 1.0, 0.0), 0.0);
        let mut stack = IStack::new();
        stack.push(Intersection::new(99.0, Vector3::new(0.0, 0.0, 99.0), &plane));

        let r = ray(Vector3::new(-3.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        merge.all_intersections(&r, &mut stack, &mut thread);
        assert_eq!(stack.len(), 1 + 2);
    }
}
