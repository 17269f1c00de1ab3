#![allow(dead_code)]

//! The shading entry point of the core: nearest-intersection lookup over
//! the scene root, direct (Lambertian) lighting with shadow feeler rays,
//! transparency continuation, and media integration along the traced
//! segment. The tiling driver above this is an external collaborator; it
//! calls `trace_pixel` per camera sample and writes the returned colour.

use lazy_static::lazy_static;

use crate::colour::{RgbColour, TransColour};
use crate::error::{RenderError, RenderResult};
use crate::istack::Intersection;
use crate::lights::LightSource;
use crate::math::Vector3;
use crate::media::{Media, MediaFunction, ShadowTester};
use crate::pattern::PatternEvalCtx;
use crate::ray::{Ray, RayType, TraceTicket};
use crate::scene::SceneData;
use crate::shape::{test_ray_flags, Shape};
use crate::stats::Stat;
use crate::texture::{Pigment, Texture};
use crate::thread::TraceThreadData;

/// Offset applied when restarting a ray from a surface.
const SHADOW_TOLERANCE: f64 = 1.0e-4;

lazy_static! {
    /// Texture for objects the front end left untextured.
    static ref DEFAULT_TEXTURE: Texture = Texture::new(Pigment::solid(TransColour::opaque(
        RgbColour::splat(0.8)
    )));
}

pub struct Tracer<'a> {
    scene: &'a SceneData,
}

impl<'a> Tracer<'a> {
    pub fn new(scene: &'a SceneData) -> Tracer<'a> {
        Tracer { scene }
    }

    /// Traces the camera ray for a normalized screen position. This is the
    /// cooperative cancellation point: the driver's flag is honoured here,
    /// between top-level samples, never inside an intersection.
    pub fn trace_pixel(
        &self,
        x: f64,
        y: f64,
        stream_index: u32,
        thread: &mut TraceThreadData<'a>,
    ) -> RenderResult<(RgbColour, f64)> {
        let ticket = TraceTicket::new(self.scene.settings.max_trace_level, stream_index);
        if ticket.cancel_requested() {
            return Err(RenderError::Cancelled);
        }
        thread.rands.position_stream(stream_index);
        let ray = self.scene.camera.generate_ray(x, y, ticket);
        Ok(self.trace_ray(ray, thread))
    }

    /// Same, but sharing a driver-owned cancellation flag.
    pub fn trace_pixel_with_ticket(
        &self,
        x: f64,
        y: f64,
        ticket: TraceTicket,
        thread: &mut TraceThreadData<'a>,
    ) -> RenderResult<(RgbColour, f64)> {
        if ticket.cancel_requested() {
            return Err(RenderError::Cancelled);
        }
        thread.rands.position_stream(ticket.stream_index);
        let ray = self.scene.camera.generate_ray(x, y, ticket);
        Ok(self.trace_ray(ray, thread))
    }

    /// The nearest flag-admissible intersection along the ray.
    pub fn find_intersection(
        &self,
        ray: &Ray<'a>,
        thread: &mut TraceThreadData<'a>,
    ) -> Option<Intersection<'a>> {
        if !test_ray_flags(ray, self.scene.root.as_ref()) {
            return None;
        }

        let mut stack = thread.stack_pool.acquire();
        self.scene.root.all_intersections(ray, &mut stack, thread);
        let best = stack.nearest().copied();
        thread.stack_pool.release(stack);
        best
    }

    /// Traces a ray to a colour plus the fraction of background that shows
    /// through.
    pub fn trace_ray(&self, ray: Ray<'a>, thread: &mut TraceThreadData<'a>) -> (RgbColour, f64) {
        let hit = self.find_intersection(&ray, thread);

        let (mut colour, mut transm, depth) = match hit {
            Some(inter) => {
                let (c, t) = self.shade_surface(&inter, &ray, thread);
                (c, t, inter.depth)
            }
            None => (RgbColour::BLACK, 1.0, 0.0),
        };

        if hit.is_some() {
            self.apply_media(&ray, depth, &mut colour, &mut transm, thread);
        }

        (colour, transm)
    }

    fn apply_media(
        &self,
        ray: &Ray<'a>,
        depth: f64,
        colour: &mut RgbColour,
        transm: &mut f64,
        thread: &mut TraceThreadData<'a>,
    ) {
        let medias: Vec<&'a Media> = if ray.interiors().is_empty() {
            // Hollow space: the atmosphere applies.
            self.scene.atmosphere.iter().collect()
        } else {
            ray.interiors()
                .iter()
                .flat_map(|i| i.media.iter())
                .collect()
        };
        if medias.is_empty() {
            return;
        }

        let mf = MediaFunction::new(
            &self.scene.lights,
            self,
            self.scene.media_photons.as_ref(),
        );
        mf.compute_media(&medias, ray, depth, true, colour, transm, thread);
    }

    /// Direct lighting at a hit point: CSG-aware texture collection,
    /// ambient and Lambertian terms per light with shadow feelers, plus
    /// the transparency continuation.
    fn shade_surface(
        &self,
        inter: &Intersection<'a>,
        ray: &Ray<'a>,
        thread: &mut TraceThreadData<'a>,
    ) -> (RgbColour, f64) {
        // Geometric normal, flipped to face the ray.
        let mut normal = inter.object.normal(inter, thread);
        let hit_inside = normal.dot(ray.direction) > 0.0;
        if hit_inside {
            normal = -normal;
        }

        let mut textures: Vec<(f64, &'a Texture)> = Vec::new();
        match inter.csg {
            Some(csg) => csg.determine_textures(inter, hit_inside, &mut textures, thread),
            None => {
                if let Some(ref t) = inter.object.base().texture {
                    textures.push((1.0, t));
                }
            }
        }
        if textures.is_empty() {
            textures.push((1.0, &*DEFAULT_TEXTURE));
        }

        let eval_ctx = PatternEvalCtx {
            pnormal: Some(normal),
            ray_direction: Some(ray.direction),
            default_noise_gen: self.scene.settings.noise_generator,
        };

        let mut result = RgbColour::BLACK;
        let mut filter = 0.0;
        let mut transmit = 0.0;
        let mut filter_colour = RgbColour::BLACK;

        for &(weight, texture) in textures.iter() {
            let surface = texture.pigment.evaluate(inter.ipoint, &eval_ctx, thread);

            let shade_normal = match texture.normal {
                Some(ref tnormal) => tnormal.perturb(normal, inter.ipoint, &eval_ctx, thread),
                None => normal,
            };

            let mut shaded =
                surface.colour * texture.finish.ambient * self.scene.settings.ambient_light;

            for light in self.scene.lights.iter() {
                if let Some((light_dir, light_colour)) =
                    self.test_shadow(light, inter.ipoint, thread)
                {
                    let cos = shade_normal.dot(light_dir);
                    if cos > 0.0 {
                        shaded += surface.colour * light_colour * (cos * texture.finish.diffuse);
                    }
                }
            }

            result += shaded * weight * surface.opacity().max(0.0);
            filter += surface.filter * weight;
            transmit += surface.transmit * weight;
            filter_colour += surface.colour * weight;
        }

        // Transparent surfaces let the scene behind them through.
        let through = filter + transmit;
        if through > crate::math::EPSILON && ray.ticket.trace_level < ray.ticket.max_trace_level {
            let mut continued = ray.clone();
            continued.ticket.trace_level += 1;
            continued.origin = inter.ipoint + ray.direction * SHADOW_TOLERANCE;
            continued.set_flags(RayType::Refraction, false, false);

            // Track the interior stack across the boundary.
            if let Some(ref interior) = inter.object.base().interior {
                if !hit_inside {
                    continued.append_interior(interior);
                } else {
                    continued.remove_interior(interior);
                }
            }

            let (behind, _) = self.trace_ray(continued, thread);
            result += behind * (RgbColour::splat(transmit) + filter_colour * filter);
        }

        (result, through.min(1.0))
    }
}

impl<'a> ShadowTester<'a> for Tracer<'a> {
    /// Feeler ray from a point toward a light. Opaque blockers kill the
    /// light; transparent ones attenuate by their filter/transmit, and
    /// atmosphere media extinguish along the feeler. Numerical breakdown
    /// degrades to "no light" rather than an error.
    fn test_shadow(
        &self,
        light: &LightSource,
        point: Vector3,
        thread: &mut TraceThreadData<'a>,
    ) -> Option<(Vector3, RgbColour)> {
        let (direction, distance, mut colour) = light.colour_at(point);
        if colour.is_zero() {
            return None;
        }
        thread.stats.bump(Stat::ShadowRayTests);

        let mut ray = Ray::new(
            point + direction * SHADOW_TOLERANCE,
            direction,
            TraceTicket::new(self.scene.settings.max_trace_level, 0),
        );
        ray.set_flags(RayType::Other, true, false);

        let mut stack = thread.stack_pool.acquire();
        self.scene.root.all_intersections(&ray, &mut stack, thread);

        let eval_ctx = PatternEvalCtx {
            pnormal: None,
            ray_direction: Some(direction),
            default_noise_gen: self.scene.settings.noise_generator,
        };

        let mut blocked = false;
        for isect in stack.iter() {
            if isect.depth >= distance - SHADOW_TOLERANCE {
                continue;
            }
            if isect.object.base().test_flag(crate::shape::NO_SHADOW_FLAG) {
                continue;
            }
            let attenuation = match isect.object.base().texture {
                Some(ref t) => t
                    .pigment
                    .evaluate(isect.ipoint, &eval_ctx, thread)
                    .shadow_attenuation(),
                None => RgbColour::BLACK,
            };
            if attenuation.is_near_zero(crate::math::EPSILON) {
                blocked = true;
                break;
            }
            colour *= attenuation;
        }
        thread.stack_pool.release(stack);

        if blocked || colour.is_near_zero(crate::math::EPSILON) {
            return None;
        }

        // Extinction through any atmospheric media between here and the
        // light.
        if !self.scene.atmosphere.is_empty() {
            let medias: Vec<&Media> = self.scene.atmosphere.iter().collect();
            let mf = MediaFunction::new(&self.scene.lights, self, None);
            let mut transm = 1.0;
            mf.compute_media(
                &medias,
                &ray,
                distance,
                true,
                &mut colour,
                &mut transm,
                thread,
            );
        }

        thread.stats.bump(Stat::ShadowRaysSucceeded);
        Some((direction, colour))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::colour::TransColour;
    use crate::shape::sphere::Sphere;
    use crate::texture::{Finish, Pigment};

    fn white_texture(diffuse: f64, ambient: f64) -> Texture {
        let mut t = Texture::new(Pigment::solid(TransColour::opaque(RgbColour::WHITE)));
        t.finish = Finish {
            ambient: RgbColour::splat(ambient),
            diffuse,
        };
        t
    }

    fn single_sphere_scene() -> SceneData {
        let mut sphere = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        sphere.base.texture = Some(std::sync::Arc::new(white_texture(1.0, 0.0)));

        let camera = Camera::look_at(
            Vector3::new(0.0, 0.0, -3.0),
            Vector3::new(0.0, 0.0, 0.0),
            std::f64::consts::FRAC_PI_2,
            1.0,
        );
        let mut scene = SceneData::new(Box::new(sphere), camera);
        scene
            .lights
            .push(LightSource::point(Vector3::new(2.0, 2.0, -2.0), RgbColour::WHITE));
        scene
    }

    #[test]
    fn primary_ray_hits_sphere_at_two() {
        let scene = single_sphere_scene();
        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);

        let ray = scene
            .camera
            .generate_ray(0.5, 0.5, TraceTicket::new(5, 0));
        let inter = tracer.find_intersection(&ray, &mut thread).unwrap();
        assert!((inter.depth - 2.0).abs() < 1.0e-9);
    }

    #[test]
    fn lambert_shading_through_pixel_centre() {
        // Single unit sphere, camera at (0,0,-3), white point light at
        // (2,2,-2): the pixel-centre hit shades to max(0, n.l) * albedo.
        let scene = single_sphere_scene();
        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);

        let (colour, transm) = tracer.trace_pixel(0.5, 0.5, 0, &mut thread).unwrap();
        // Hit point (0,0,-1), normal (0,0,-1), light direction
        // (2,2,-1)/3 -> n.l = 1/3.
        assert!((colour.red - 1.0 / 3.0).abs() < 1.0e-9, "got {}", colour.red);
        assert_eq!(transm, 0.0);
    }

    #[test]
    fn miss_returns_background() {
        let scene = single_sphere_scene();
        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);
        // Aim well off the sphere.
        let (colour, transm) = tracer.trace_pixel(0.02, 0.02, 0, &mut thread).unwrap();
        assert_eq!(colour, RgbColour::BLACK);
        assert_eq!(transm, 1.0);
    }

    #[test]
    fn occluder_casts_shadow() {
        let mut scene = single_sphere_scene();
        // A second sphere between the light and the first one.
        let mut blocker = Sphere::new(Vector3::new(1.0, 1.0, -1.5), 0.3);
        blocker.base.texture = Some(std::sync::Arc::new(white_texture(1.0, 0.0)));
        let first = std::mem::replace(
            &mut scene.root,
            Box::new(Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0)),
        );
        scene.root = Box::new(crate::shape::csg::CsgUnion::new(vec![
            first,
            Box::new(blocker),
        ]));

        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);
        let (colour, _) = tracer.trace_pixel(0.5, 0.5, 0, &mut thread).unwrap();
        assert!(colour.red < 1.0e-9, "fully shadowed, got {}", colour.red);
    }

    #[test]
    fn transparent_blocker_attenuates_not_blocks() {
        let mut scene = single_sphere_scene();
        let mut blocker = Sphere::new(Vector3::new(1.0, 1.0, -1.5), 0.3);
        let mut tex = white_texture(1.0, 0.0);
        tex.pigment = Pigment::solid(TransColour::new(RgbColour::WHITE, 0.0, 0.5));
        blocker.base.texture = Some(std::sync::Arc::new(tex));

        let first = std::mem::replace(
            &mut scene.root,
            Box::new(Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0)),
        );
        scene.root = Box::new(crate::shape::csg::CsgUnion::new(vec![
            first,
            Box::new(blocker),
        ]));

        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);
        let (colour, _) = tracer.trace_pixel(0.5, 0.5, 0, &mut thread).unwrap();
        // Two surface crossings at transmit 0.5 each: a quarter of the
        // light survives.
        assert!(
            (colour.red - 0.25 / 3.0).abs() < 1.0e-6,
            "got {}",
            colour.red
        );
    }

    #[test]
    fn cancellation_stops_tracing() {
        let scene = single_sphere_scene();
        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);

        let ticket = TraceTicket::new(5, 0);
        let cancel = ticket.cancel_handle();
        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        match tracer.trace_pixel_with_ticket(0.5, 0.5, ticket, &mut thread) {
            Err(RenderError::Cancelled) => {}
            other => panic!("expected cancellation, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn atmosphere_attenuates_surface_colour() {
        let mut scene = single_sphere_scene();
        let mut medium = Media::new();
        medium.absorption = RgbColour::splat(0.5);
        medium.post_process();
        scene.atmosphere.push(medium);

        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);
        let (colour, _) = tracer.trace_pixel(0.5, 0.5, 0, &mut thread).unwrap();

        // Surface lambert (1/3) attenuated over depth 2... but the shadow
        // feeler is extinguished too, over its 3 units to the light.
        let surface = 1.0 / 3.0 * (-0.5f64 * 3.0).exp();
        let expected = surface * (-0.5f64 * 2.0).exp();
        assert!(
            (colour.red - expected).abs() < 1.0e-6,
            "{} vs {}",
            colour.red,
            expected
        );
    }
}
