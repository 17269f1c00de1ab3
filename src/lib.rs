//! The render core of an offline CSG ray tracer: analytic primitives and
//! CSG composition, procedural patterns, participating media, and the
//! per-thread scratch state that keeps the whole thing allocation-quiet
//! while a thread pool drives it.
//!
//! The scene front end, image back end and tiling driver are external: the
//! parser hands over a read-only [`scene::SceneData`], the driver calls
//! [`tracer::Tracer::trace_pixel`] per camera sample and writes the
//! returned colour.

pub mod bbox;
pub mod camera;
pub mod colour;
pub mod error;
pub mod interior;
pub mod istack;
pub mod lights;
pub mod math;
pub mod media;
pub mod pattern;
pub mod photons;
pub mod ray;
pub mod scene;
pub mod shape;
pub mod stats;
pub mod texture;
pub mod thread;
pub mod tracer;

pub use crate::colour::{RgbColour, TransColour};
pub use crate::error::{RenderError, RenderResult};
pub use crate::ray::{Ray, TraceTicket};
pub use crate::scene::SceneData;
pub use crate::thread::TraceThreadData;
pub use crate::tracer::Tracer;

#[cfg(test)]
mod tests {
    //! End-to-end checks that cross module boundaries.

    use crate::camera::Camera;
    use crate::colour::{RgbColour, TransColour};
    use crate::lights::LightSource;
    use crate::math::Vector3;
    use crate::pattern::{PatternKind, TPattern};
    use crate::ray::TraceTicket;
    use crate::scene::SceneData;
    use crate::shape::plane::Plane;
    use crate::shape::sphere::Sphere;
    use crate::shape::Shape;
    use crate::texture::{Pigment, PigmentMap, Texture};
    use crate::thread::TraceThreadData;
    use crate::tracer::Tracer;

    /// Checker on the ground plane: the tile at (0.5, 0, 0.5) is tile 0,
    /// one cell over in x is tile 1, driven through a real surface hit.
    #[test]
    fn checker_on_ground_plane() {
        let mut plane = Plane::new(Vector3::new(0.0, 1.0, 0.0), 0.0);
        let checker = Pigment::new(
            TPattern::new(PatternKind::Checker),
            PigmentMap::Pigments(vec![
                Pigment::solid(TransColour::opaque(RgbColour::BLACK)),
                Pigment::solid(TransColour::opaque(RgbColour::WHITE)),
            ]),
        );
        let mut texture = Texture::new(checker);
        texture.finish.ambient = RgbColour::WHITE;
        texture.finish.diffuse = 0.0;
        plane.base.texture = Some(std::sync::Arc::new(texture));

        let camera = Camera::look_at(
            Vector3::new(0.5, 3.0, 0.5),
            Vector3::new(0.5, 0.0, 0.5),
            std::f64::consts::FRAC_PI_2,
            1.0,
        );
        let mut scene = SceneData::new(Box::new(plane), camera);
        scene.settings.ambient_light = RgbColour::WHITE;

        let tracer = Tracer::new(&scene);
        let mut thread = TraceThreadData::new(0);

        // Straight down onto (0.5, 0, 0.5): tile 0 -> black.
        let (colour, _) = tracer.trace_pixel(0.5, 0.5, 0, &mut thread).unwrap();
        assert!(colour.red < 1.0e-9, "tile 0 must be black, got {:?}", colour);

        // One cell over: re-aim the camera at (1.5, 0, 0.5).
        let camera = Camera::look_at(
            Vector3::new(1.5, 3.0, 0.5),
            Vector3::new(1.5, 0.0, 0.5),
            std::f64::consts::FRAC_PI_2,
            1.0,
        );
        let scene2 = SceneData {
            camera,
            ..scene
        };
        let tracer = Tracer::new(&scene2);
        let mut thread = TraceThreadData::new(0);
        let (colour, _) = tracer.trace_pixel(0.5, 0.5, 0, &mut thread).unwrap();
        assert!(
            (colour.red - 1.0).abs() < 1.0e-9,
            "tile 1 must be white, got {:?}",
            colour
        );
    }

    /// The IStack balance contract, exercised across a whole scene trace:
    /// after any all_intersections call the stack holds exactly the
    /// caller's records plus the reported hits.
    #[test]
    fn istack_balance_across_mixed_scene() {
        use crate::istack::IStack;
        use crate::ray::Ray;
        use crate::shape::csg::{CsgIntersection, CsgMerge, CsgUnion};

        let scene_root = CsgUnion::new(vec![
            Box::new(Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0)),
            Box::new(CsgMerge::new(vec![
                Box::new(Sphere::new(Vector3::new(2.5, 0.0, 0.0), 1.0)),
                Box::new(Sphere::new(Vector3::new(3.5, 0.0, 0.0), 1.0)),
            ])),
            Box::new(CsgIntersection::new(vec![
                Box::new(Sphere::new(Vector3::new(-2.5, 0.0, 0.0), 1.0)),
                Box::new(Sphere::new(Vector3::new(-3.0, 0.0, 0.0), 1.0)),
            ])),
        ]);

        let mut thread = TraceThreadData::new(0);
        for (ox, oy) in &[(-5.0, 0.0), (0.0, 0.0), (-5.0, 0.5), (-5.0, 5.0)] {
            let ray = Ray::new(
                Vector3::new(*ox, *oy, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                TraceTicket::new(5, 0),
            );
            let mut stack = IStack::new();
            let found = scene_root.all_intersections(&ray, &mut stack, &mut thread);
            assert_eq!(found, !stack.is_empty());
        }
    }

    /// Statistics counters merge across threads by summation.
    #[test]
    fn per_thread_stats_merge() {
        use crate::stats::{RenderStatistics, Stat};

        let sphere = Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0);
        let mut totals = RenderStatistics::new();

        for seed in 0..3u64 {
            let mut thread = TraceThreadData::new(seed);
            let ray = crate::ray::Ray::new(
                Vector3::new(0.0, 0.0, -3.0),
                Vector3::new(0.0, 0.0, 1.0),
                TraceTicket::new(5, 0),
            );
            let mut stack = crate::istack::IStack::new();
            sphere.all_intersections(&ray, &mut stack, &mut thread);
            totals.merge(&thread.stats);
        }

        assert_eq!(totals.get(Stat::RaySphereTests), 3);
        assert_eq!(totals.get(Stat::RaySphereTestsSucceeded), 3);
    }

    /// A light source with attached geometry participates in CSG; without
    /// geometry it is skipped by the sibling inside tests.
    #[test]
    fn childless_light_does_not_break_intersection() {
        use crate::istack::IStack;
        use crate::lights::LightSourceShape;
        use crate::ray::Ray;
        use crate::shape::csg::CsgIntersection;

        let light = LightSourceShape::new(LightSource::point(
            Vector3::new(0.0, 5.0, 0.0),
            RgbColour::WHITE,
        ));
        let inter = CsgIntersection::new(vec![
            Box::new(Sphere::new(Vector3::new(0.0, 0.0, 0.0), 1.0)),
            Box::new(light),
        ]);

        let mut thread = TraceThreadData::new(0);
        let ray = Ray::new(
            Vector3::new(0.0, 0.0, -3.0),
            Vector3::new(0.0, 0.0, 1.0),
            TraceTicket::new(5, 0),
        );
        let mut stack = IStack::new();
        // The childless light must not veto the sphere's hits.
        assert!(inter.all_intersections(&ray, &mut stack, &mut thread));
        assert_eq!(stack.len(), 2);
    }
}
