#![allow(dead_code)]

//! Light sources, reduced to what the shading integrator and the media
//! lit-interval partitioning consume.

use crate::bbox::BoundingBox;
use crate::colour::RgbColour;
use crate::istack::{IStack, Intersection};
use crate::math::{Transform, Vector3};
use crate::ray::Ray;
use crate::shape::{ObjectBase, ObjectPtr, Shape};
use crate::thread::TraceThreadData;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LightType {
    Point,
    Spot,
    Cylinder,
}

#[derive(Debug, Clone)]
pub struct LightSource {
    pub light_type: LightType,
    pub center: Vector3,
    /// Unit axis for spot and cylinder lights.
    pub direction: Vector3,
    /// Cosine of the falloff angle for spots; radius for cylinder lights.
    pub falloff: f64,
    pub colour: RgbColour,
    pub media_interaction: bool,
    pub media_attenuation: bool,
    pub fade_distance: f64,
    pub fade_power: f64,
}

impl LightSource {
    pub fn point(center: Vector3, colour: RgbColour) -> LightSource {
        LightSource {
            light_type: LightType::Point,
            center,
            direction: Vector3::new(0.0, -1.0, 0.0),
            falloff: 0.0,
            colour,
            media_interaction: true,
            media_attenuation: false,
            fade_distance: 0.0,
            fade_power: 0.0,
        }
    }

    pub fn spot(center: Vector3, points_at: Vector3, falloff_angle: f64, colour: RgbColour) -> LightSource {
        LightSource {
            light_type: LightType::Spot,
            center,
            direction: (points_at - center).normalize(),
            falloff: falloff_angle.cos(),
            colour,
            media_interaction: true,
            media_attenuation: false,
            fade_distance: 0.0,
            fade_power: 0.0,
        }
    }

    pub fn cylinder(center: Vector3, points_at: Vector3, radius: f64, colour: RgbColour) -> LightSource {
        LightSource {
            light_type: LightType::Cylinder,
            center,
            direction: (points_at - center).normalize(),
            falloff: radius,
            colour,
            media_interaction: true,
            media_attenuation: false,
            fade_distance: 0.0,
            fade_power: 0.0,
        }
    }

    /// Distance-fade factor at `distance`.
    pub fn attenuation(&self, distance: f64) -> f64 {
        if self.fade_power > 0.0 && self.fade_distance > 0.0 {
            2.0 / (1.0 + (distance / self.fade_distance).powf(self.fade_power))
        } else {
            1.0
        }
    }

    /// Directional factor toward `point`: 1 inside a spot cone or cylinder
    /// beam, 0 outside (hard edges; soft edges belong to the full shading
    /// model).
    pub fn beam_factor(&self, point: Vector3) -> f64 {
        match self.light_type {
            LightType::Point => 1.0,
            LightType::Spot => {
                let to_point = (point - self.center).normalize();
                if to_point.dot(self.direction) >= self.falloff {
                    1.0
                } else {
                    0.0
                }
            }
            LightType::Cylinder => {
                let rel = point - self.center;
                let along = rel.dot(self.direction);
                if along <= 0.0 {
                    return 0.0;
                }
                let radial = rel - self.direction * along;
                if radial.length_squared() <= self.falloff * self.falloff {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Light colour arriving at a point, with beam and fade applied.
    pub fn colour_at(&self, point: Vector3) -> (Vector3, f64, RgbColour) {
        let to_light = self.center - point;
        let distance = to_light.length();
        let direction = to_light / distance;
        let colour = self.colour * self.beam_factor(point) * self.attenuation(distance);
        (direction, distance, colour)
    }
}

/// A light source standing in the scene tree (for `looks_like` geometry
/// and CSG membership). A light with no attached geometry intersects
/// nothing and is skipped by the CSG sibling tests.
#[derive(Debug)]
pub struct LightSourceShape {
    pub base: ObjectBase,
    pub light: LightSource,
    pub geometry: Option<ObjectPtr>,
}

impl LightSourceShape {
    pub fn new(light: LightSource) -> LightSourceShape {
        LightSourceShape {
            base: ObjectBase::new(),
            light,
            geometry: None,
        }
    }
}

impl Shape for LightSourceShape {
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
        match self.geometry {
            Some(ref g) => g.all_intersections(ray, stack, thread),
            None => false,
        }
    }

    fn inside(&self, point: Vector3, thread: &mut TraceThreadData<'_>) -> bool {
        match self.geometry {
            Some(ref g) => g.inside(point, thread),
            None => false,
        }
    }

    fn normal(&self, inter: &Intersection<'_>, thread: &mut TraceThreadData<'_>) -> Vector3 {
        match self.geometry {
            Some(ref g) => g.normal(inter, thread),
            None => Vector3::new(0.0, 1.0, 0.0),
        }
    }

    fn translate(&mut self, vector: Vector3, trans: &Transform) {
        self.light.center += vector;
        if let Some(ref mut g) = self.geometry {
            g.translate(vector, trans);
        }
        self.compute_bbox();
    }

    fn rotate(&mut self, vector: Vector3, trans: &Transform) {
        self.light.center = trans.transform_point(self.light.center);
        self.light.direction = trans.transform_direction(self.light.direction);
        if let Some(ref mut g) = self.geometry {
            g.rotate(vector, trans);
        }
        self.compute_bbox();
    }

    fn scale(&mut self, vector: Vector3, trans: &Transform) {
        self.light.center = trans.transform_point(self.light.center);
        if let Some(ref mut g) = self.geometry {
            g.scale(vector, trans);
        }
        self.compute_bbox();
    }

    fn transform(&mut self, trans: &Transform) {
        self.light.center = trans.transform_point(self.light.center);
        self.light.direction = trans.transform_direction(self.light.direction).normalize();
        if let Some(ref mut g) = self.geometry {
            g.transform(trans);
        }
        self.compute_bbox();
    }

    fn invert(self: Box<Self>) -> ObjectPtr {
        self
    }

    fn compute_bbox(&mut self) {
        self.base.bbox = match self.geometry {
            Some(ref g) => g.bbox(),
            None => BoundingBox::from_points(self.light.center, self.light.center),
        };
    }

    fn is_childless_light(&self) -> bool {
        self.geometry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_reaches_everywhere() {
        let light = LightSource::point(Vector3::new(0.0, 10.0, 0.0), RgbColour::WHITE);
        let (dir, dist, colour) = light.colour_at(Vector3::new(0.0, 0.0, 0.0));
        assert!((dir - Vector3::new(0.0, 1.0, 0.0)).length() < 1.0e-12);
        assert!((dist - 10.0).abs() < 1.0e-12);
        assert_eq!(colour, RgbColour::WHITE);
    }

    #[test]
    fn spot_light_cone() {
        let light = LightSource::spot(
            Vector3::new(0.0, 10.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            0.3,
            RgbColour::WHITE,
        );
        assert_eq!(light.beam_factor(Vector3::new(0.0, 0.0, 0.0)), 1.0);
        assert_eq!(light.beam_factor(Vector3::new(50.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn cylinder_light_beam() {
        let light = LightSource::cylinder(
            Vector3::new(0.0, 10.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            1.0,
            RgbColour::WHITE,
        );
        assert_eq!(light.beam_factor(Vector3::new(0.5, 0.0, 0.0)), 1.0);
        assert_eq!(light.beam_factor(Vector3::new(2.0, 0.0, 0.0)), 0.0);
        // Behind the source.
        assert_eq!(light.beam_factor(Vector3::new(0.0, 20.0, 0.0)), 0.0);
    }

    #[test]
    fn fade_halves_at_fade_distance_squared_power() {
        let mut light = LightSource::point(Vector3::new(0.0, 0.0, 0.0), RgbColour::WHITE);
        light.fade_distance = 1.0;
        light.fade_power = 2.0;
        assert_eq!(light.attenuation(1.0), 1.0);
        assert!((light.attenuation(3.0) - 0.2).abs() < 1.0e-12);
    }

    #[test]
    fn childless_light_is_skippable() {
        let shape = LightSourceShape::new(LightSource::point(
            Vector3::new(0.0, 0.0, 0.0),
            RgbColour::WHITE,
        ));
        assert!(shape.is_childless_light());
        let mut thread = TraceThreadData::new(0);
        assert!(!shape.inside(Vector3::new(0.0, 0.0, 0.0), &mut thread));
    }
}
