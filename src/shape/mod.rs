#![allow(dead_code)]

pub mod container;
pub mod csg;
pub mod disc;
pub mod isosurface;
pub mod parametric;
pub mod plane;
pub mod polygon;
pub mod quadric;
pub mod sphere;
pub mod triangle;

use std::fmt::Debug;
use std::sync::Arc;

use crate::bbox::BoundingBox;
use crate::interior::Interior;
use crate::istack::{IStack, Intersection};
use crate::math::{Transform, Vector2, Vector3};
use crate::ray::Ray;
use crate::texture::Texture;
use crate::thread::TraceThreadData;

pub const INVERTED_FLAG: u32 = 1;
pub const NO_SHADOW_FLAG: u32 = 1 << 1;
pub const NO_IMAGE_FLAG: u32 = 1 << 2;
pub const NO_REFLECTION_FLAG: u32 = 1 << 3;
pub const NO_RADIOSITY_FLAG: u32 = 1 << 4;
pub const DEGENERATE_FLAG: u32 = 1 << 5;
pub const HOLLOW_FLAG: u32 = 1 << 6;
pub const NO_GLOBAL_LIGHTS_FLAG: u32 = 1 << 7;

/// An exclusively owned node of the scene tree.
pub type ObjectPtr = Box<dyn Shape>;

/// Clipping lists are shared between the objects that reference them.
pub type ClipList = Arc<Vec<ObjectPtr>>;

/// Data every shape carries: transform, cached bounding box, flags, the
/// clip list, and the shading attachments.
#[derive(Debug, Clone)]
pub struct ObjectBase {
    pub trans: Option<Transform>,
    pub bbox: BoundingBox,
    pub flags: u32,
    pub clip: ClipList,
    pub texture: Option<Arc<Texture>>,
    pub interior: Option<Arc<Interior>>,
}

impl ObjectBase {
    pub fn new() -> ObjectBase {
        ObjectBase {
            trans: None,
            bbox: BoundingBox::infinite(),
            flags: 0,
            clip: Arc::new(Vec::new()),
            texture: None,
            interior: None,
        }
    }

    #[inline]
    pub fn test_flag(&self, flag: u32) -> bool {
        (self.flags & flag) != 0
    }

    pub fn set_flag(&mut self, flag: u32) {
        self.flags |= flag;
    }

    pub fn clear_flag(&mut self, flag: u32) {
        self.flags &= !flag;
    }

    pub fn invert_flag(&mut self, flag: u32) {
        self.flags ^= flag;
    }
}

/// Uniform capability set every shape provides. Leaf shapes implement their
/// analytic algorithms; compound shapes compose children.
pub trait Shape: Debug + Send + Sync {
    fn base(&self) -> &ObjectBase;
    fn base_mut(&mut self) -> &mut ObjectBase;

    /// Pushes every valid hit (`depth` within the shape's tolerance window)
    /// onto `stack`. Returns whether at least one hit was pushed. Hits are
    /// not depth-sorted.
    fn all_intersections<'a>(
        &'a self,
        ray: &Ray<'a>,
        stack: &mut IStack<'a>,
        thread: &mut TraceThreadData<'a>,
    ) -> bool;

    /// Strict world-space inside test, honouring the inverted flag.
    /// Non-solid shapes are nowhere inside.
    fn inside(&self, point: Vector3, thread: &mut TraceThreadData<'_>) -> bool;

    /// Unit surface normal at an intersection produced by this shape.
    fn normal(&self, inter: &Intersection<'_>, thread: &mut TraceThreadData<'_>) -> Vector3;

    fn uv_coord(&self, inter: &Intersection<'_>) -> Vector2 {
        Vector2::new(inter.ipoint.x, inter.ipoint.y)
    }

    fn translate(&mut self, vector: Vector3, trans: &Transform);
    fn rotate(&mut self, vector: Vector3, trans: &Transform);
    fn scale(&mut self, vector: Vector3, trans: &Transform);
    fn transform(&mut self, trans: &Transform);

    /// Turns the shape inside out, consuming it. Most shapes just toggle
    /// their inverted flag; planes and quadrics negate coefficients, and
    /// CSG compounds apply De Morgan and change type.
    fn invert(self: Box<Self>) -> ObjectPtr;

    fn compute_bbox(&mut self);

    fn bbox(&self) -> BoundingBox {
        self.base().bbox
    }

    /// Children of a compound shape; empty for leaves.
    fn children(&self) -> &[ObjectPtr] {
        &[]
    }

    /// A light source with no attached geometry; such siblings are skipped
    /// by the CSG inside tests.
    fn is_childless_light(&self) -> bool {
        false
    }

    /// Collects the textures that apply at a shading point, weighted.
    /// Compounds walk their containing children; leaves contribute their
    /// own texture.
    fn determine_textures<'a>(
        &'a self,
        inter: &Intersection<'a>,
        hit_inside: bool,
        textures: &mut Vec<(f64, &'a Texture)>,
        thread: &mut TraceThreadData<'a>,
    ) {
        let _ = (inter, hit_inside);
        let _ = thread;
        if let Some(ref t) = self.base().texture {
            textures.push((1.0, t));
        }
    }

    // Concrete-type hooks used where the original downcasts (CSG
    // intersection bbox tightening).
    fn as_plane(&self) -> Option<&plane::Plane> {
        None
    }
    fn as_quadric(&self) -> Option<&quadric::Quadric> {
        None
    }
    fn as_quadric_mut(&mut self) -> Option<&mut quadric::Quadric> {
        None
    }
}

/// Inside test for a whole object including its clips: the point must be
/// inside every clip as well as the object itself.
pub fn inside_object(point: Vector3, object: &dyn Shape, thread: &mut TraceThreadData<'_>) -> bool {
    for clip in object.base().clip.iter() {
        if !inside_object(point, clip.as_ref(), thread) {
            return false;
        }
    }
    object.inside(point, thread)
}

/// True when the point survives every clip object (respecting each clip's
/// own inversion).
pub fn point_in_clip(
    point: Vector3,
    clip: &[ObjectPtr],
    thread: &mut TraceThreadData<'_>,
) -> bool {
    clip.iter().all(|c| inside_object(point, c.as_ref(), thread))
}

/// Ray-type gate used when gathering intersections: objects can opt out of
/// specific ray kinds. Primary rays override `no_image` so the `trace()`
/// scene function still sees the object.
pub fn test_ray_flags(ray: &Ray<'_>, obj: &dyn Shape) -> bool {
    let base = obj.base();
    if ray.is_photon_ray() {
        !base.test_flag(NO_SHADOW_FLAG)
    } else {
        (!base.test_flag(NO_IMAGE_FLAG) || !ray.is_image_ray() || ray.is_primary_ray())
            && (!base.test_flag(NO_REFLECTION_FLAG) || !ray.is_reflection_ray())
            && (!base.test_flag(NO_RADIOSITY_FLAG) || !ray.is_radiosity_ray())
    }
}

/// Shadow-aware variant used by merge: shadow test rays additionally pass
/// unless the object opts out of shadows, and primary rays get no
/// `no_image` override.
pub fn test_ray_flags_shadow(ray: &Ray<'_>, obj: &dyn Shape) -> bool {
    let base = obj.base();
    if ray.is_photon_ray() {
        !base.test_flag(NO_SHADOW_FLAG)
    } else if ray.is_shadow_test_ray() && !base.test_flag(NO_SHADOW_FLAG) {
        true
    } else {
        (!base.test_flag(NO_IMAGE_FLAG) || !ray.is_image_ray())
            && (!base.test_flag(NO_REFLECTION_FLAG) || !ray.is_reflection_ray())
            && (!base.test_flag(NO_RADIOSITY_FLAG) || !ray.is_radiosity_ray())
    }
}

/// Cheap reject for a child before descending into it.
pub fn ray_in_bound(ray: &Ray<'_>, obj: &dyn Shape) -> bool {
    obj.bbox()
        .intersect_ray(ray.origin, ray.direction, crate::math::MAX_DISTANCE)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::{RayType, TraceTicket};
    use crate::shape::sphere::Sphere;

    fn primary<'a>() -> Ray<'a> {
        Ray::new(
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::new(0.0, 0.0, 1.0),
            TraceTicket::new(5, 0),
        )
    }

    #[test]
    fn ray_flags_primary_overrides_no_image() {
        let mut s = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        s.base_mut().set_flag(NO_IMAGE_FLAG);
        let ray = primary();
        assert!(test_ray_flags(&ray, &s));
        // The shadow-aware variant has no such override.
        assert!(!test_ray_flags_shadow(&ray, &s));
    }

    #[test]
    fn ray_flags_reflection() {
        let mut s = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        s.base_mut().set_flag(NO_REFLECTION_FLAG);
        let mut ray = primary();
        assert!(test_ray_flags(&ray, &s));
        ray.set_flags(RayType::Reflection, false, false);
        assert!(!test_ray_flags(&ray, &s));
    }

    #[test]
    fn clip_rejects_outside_points() {
        let mut thread = TraceThreadData::new(0);
        let clip: Vec<ObjectPtr> = vec![Box::new(Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0))];
        assert!(point_in_clip(
            Vector3::new(0.0, 0.5, 0.0),
            &clip,
            &mut thread
        ));
        assert!(!point_in_clip(
            Vector3::new(0.0, 2.0, 0.0),
            &clip,
            &mut thread
        ));
    }
}
