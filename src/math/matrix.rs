#![allow(dead_code)]

use glam::{DMat4, DVec4};

use super::Vector3;

/// A plain 4x4 double matrix, used where raw matrix algebra is needed
/// (the quadric congruence transform).
pub type Matrix4x4 = DMat4;

/// An invertible affine transform, stored as a forward/inverse matrix pair
/// so that points can be moved both ways without re-inverting.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub matrix: Matrix4x4,
    pub inverse: Matrix4x4,
}

impl Transform {
    pub fn identity() -> Transform {
        Transform {
            matrix: Matrix4x4::IDENTITY,
            inverse: Matrix4x4::IDENTITY,
        }
    }

    pub fn translation(v: Vector3) -> Transform {
        Transform {
            matrix: Matrix4x4::from_translation(v),
            inverse: Matrix4x4::from_translation(-v),
        }
    }

    pub fn scaling(v: Vector3) -> Transform {
        Transform {
            matrix: Matrix4x4::from_scale(v),
            inverse: Matrix4x4::from_scale(Vector3::new(1.0 / v.x, 1.0 / v.y, 1.0 / v.z)),
        }
    }

    pub fn uniform_scaling(s: f64) -> Transform {
        Transform::scaling(Vector3::new(s, s, s))
    }

    pub fn rotation_x(angle: f64) -> Transform {
        Transform {
            matrix: Matrix4x4::from_rotation_x(angle),
            inverse: Matrix4x4::from_rotation_x(-angle),
        }
    }

    pub fn rotation_y(angle: f64) -> Transform {
        Transform {
            matrix: Matrix4x4::from_rotation_y(angle),
            inverse: Matrix4x4::from_rotation_y(-angle),
        }
    }

    pub fn rotation_z(angle: f64) -> Transform {
        Transform {
            matrix: Matrix4x4::from_rotation_z(angle),
            inverse: Matrix4x4::from_rotation_z(-angle),
        }
    }

    pub fn axis_rotation(axis: Vector3, angle: f64) -> Transform {
        let axis = axis.normalize();
        Transform {
            matrix: Matrix4x4::from_axis_angle(axis, angle),
            inverse: Matrix4x4::from_axis_angle(axis, -angle),
        }
    }

    /// A transform whose local z-axis is `normal` and whose local origin is
    /// `origin`. Used by the disc (its geometry lives in the local z = 0
    /// plane).
    pub fn coordinate(origin: Vector3, normal: Vector3) -> Transform {
        let n = normal.normalize();
        let (u, v, w) = super::coordinate_system_from_vector(n);
        let matrix = Matrix4x4::from_cols(
            DVec4::new(u.x, u.y, u.z, 0.0),
            DVec4::new(v.x, v.y, v.z, 0.0),
            DVec4::new(w.x, w.y, w.z, 0.0),
            DVec4::new(origin.x, origin.y, origin.z, 1.0),
        );
        Transform {
            matrix,
            inverse: matrix.inverse(),
        }
    }

    pub fn from_matrix(matrix: Matrix4x4) -> Transform {
        Transform {
            matrix,
            inverse: matrix.inverse(),
        }
    }

    /// Composes `other` after `self`: the result applies `self`, then
    /// `other`.
    pub fn compose(&mut self, other: &Transform) {
        self.matrix = other.matrix * self.matrix;
        self.inverse = self.inverse * other.inverse;
    }

    pub fn composed(&self, other: &Transform) -> Transform {
        let mut t = *self;
        t.compose(other);
        t
    }

    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        self.matrix.transform_point3(p)
    }

    pub fn inverse_transform_point(&self, p: Vector3) -> Vector3 {
        self.inverse.transform_point3(p)
    }

    pub fn transform_direction(&self, v: Vector3) -> Vector3 {
        self.matrix.transform_vector3(v)
    }

    pub fn inverse_transform_direction(&self, v: Vector3) -> Vector3 {
        self.inverse.transform_vector3(v)
    }

    /// Normals move by the inverse transpose.
    pub fn transform_normal(&self, n: Vector3) -> Vector3 {
        self.inverse.transpose().transform_vector3(n)
    }

    pub fn inverse_transform_normal(&self, n: Vector3) -> Vector3 {
        self.matrix.transpose().transform_vector3(n)
    }
}
