#![allow(dead_code)]

//! A minimal perspective camera, enough to drive the core end to end.

use crate::math::Vector3;
use crate::ray::{Ray, TraceTicket};

#[derive(Debug, Clone)]
pub struct Camera {
    pub location: Vector3,
    pub direction: Vector3,
    pub right: Vector3,
    pub up: Vector3,
}

impl Camera {
    /// Looks from `location` toward `look_at`; `fov` is the full horizontal
    /// field of view, `aspect` is width over height.
    pub fn look_at(location: Vector3, look_at: Vector3, fov: f64, aspect: f64) -> Camera {
        let direction = (look_at - location).normalize();
        let world_up = if direction.y.abs() > 0.999 {
            Vector3::new(0.0, 0.0, 1.0)
        } else {
            Vector3::new(0.0, 1.0, 0.0)
        };
        let right_unit = direction.cross(world_up).normalize();
        let up_unit = right_unit.cross(direction);

        let half_width = (fov * 0.5).tan();
        Camera {
            location,
            direction,
            right: right_unit * 2.0 * half_width,
            up: up_unit * 2.0 * half_width / aspect,
        }
    }

    /// Generates the primary ray through normalized screen coordinates;
    /// (0.5, 0.5) is the image centre.
    pub fn generate_ray<'a>(&self, x: f64, y: f64, ticket: TraceTicket) -> Ray<'a> {
        let dir = (self.direction + self.right * (x - 0.5) + self.up * (0.5 - y)).normalize();
        Ray::new(self.location, dir, ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_ray_points_at_target() {
        let cam = Camera::look_at(
            Vector3::new(0.0, 0.0, -3.0),
            Vector3::new(0.0, 0.0, 0.0),
            std::f64::consts::FRAC_PI_2,
            1.0,
        );
        let ray = cam.generate_ray(0.5, 0.5, TraceTicket::new(5, 0));
        assert!((ray.direction - Vector3::new(0.0, 0.0, 1.0)).length() < 1.0e-12);
        assert_eq!(ray.origin, Vector3::new(0.0, 0.0, -3.0));
    }

    #[test]
    fn screen_edges_diverge() {
        let cam = Camera::look_at(
            Vector3::new(0.0, 0.0, -3.0),
            Vector3::new(0.0, 0.0, 0.0),
            std::f64::consts::FRAC_PI_2,
            1.0,
        );
        let left = cam.generate_ray(0.0, 0.5, TraceTicket::new(5, 0));
        let right = cam.generate_ray(1.0, 0.5, TraceTicket::new(5, 0));
        assert!(left.direction.x < 0.0);
        assert!(right.direction.x > 0.0);
        assert!((left.direction.length() - 1.0).abs() < 1.0e-12);
    }
}
