#![allow(dead_code)]

//! The general quadric surface
//! `A x² + E y² + H z² + B xy + C xz + F yz + D x + G y + I z + J = 0`.

use glam::DVec4;

use crate::bbox::BoundingBox;
use crate::istack::{IStack, Intersection};
use crate::math::{Matrix4x4, Transform, Vector3, BOUND_HUGE, EPSILON, MAX_DISTANCE};
use crate::ray::Ray;
use crate::shape::plane::plane_min_max;
use crate::shape::{point_in_clip, ObjectBase, ObjectPtr, Shape};
use crate::stats::Stat;
use crate::thread::TraceThreadData;

const DEPTH_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct Quadric {
    pub base: ObjectBase,
    /// A, E, H.
    pub square_terms: Vector3,
    /// B, C, F.
    pub mixed_terms: Vector3,
    /// D, G, I.
    pub terms: Vector3,
    pub constant: f64,
    automatic_bounds: bool,
}

impl Quadric {
    /// The default surface is the unit sphere-like `x²+y²+z²+1 = 0`
    /// coefficient layout of the original (sphere requires J = -1).
    pub fn new(square_terms: Vector3, mixed_terms: Vector3, terms: Vector3, constant: f64) -> Quadric {
        let mut q = Quadric {
            base: ObjectBase::new(),
            square_terms,
            mixed_terms,
            terms,
            constant,
            automatic_bounds: false,
        };
        q.compute_bbox();
        q
    }

    fn intersect(&self, origin: Vector3, direction: Vector3) -> Option<(f64, f64)> {
        let (xo, yo, zo) = (origin.x, origin.y, origin.z);
        let (xd, yd, zd) = (direction.x, direction.y, direction.z);
        let (qa, qe, qh) = (self.square_terms.x, self.square_terms.y, self.square_terms.z);
        let (qb, qc, qf) = (self.mixed_terms.x, self.mixed_terms.y, self.mixed_terms.z);
        let (qd, qg, qi) = (self.terms.x, self.terms.y, self.terms.z);
        let qj = self.constant;

        let a = xd * (qa * xd + qb * yd + qc * zd) + yd * (qe * yd + qf * zd) + zd * qh * zd;
        let b = xd * (qa * xo + 0.5 * (qb * yo + qc * zo + qd))
            + yd * (qe * yo + 0.5 * (qb * xo + qf * zo + qg))
            + zd * (qh * zo + 0.5 * (qc * xo + qf * yo + qi));
        let c = xo * (qa * xo + qb * yo + qc * zo + qd)
            + yo * (qe * yo + qf * zo + qg)
            + zo * (qh * zo + qi)
            + qj;

        if a != 0.0 {
            // Quadratic case.
            let d = b * b - a * c;
            if d <= 0.0 {
                return None;
            }
            let d = d.sqrt();
            Some(((-b + d) / a, (-b - d) / a))
        } else {
            // No quadratic terms: solve the linear equation instead.
            if b == 0.0 {
                return None;
            }
            Some((-0.5 * c / b, MAX_DISTANCE))
        }
    }

    fn quadric_to_matrix(&self) -> Matrix4x4 {
        // Upper-triangular layout; rows are matrix rows.
        Matrix4x4::from_cols(
            DVec4::new(self.square_terms.x, 0.0, 0.0, 0.0),
            DVec4::new(self.mixed_terms.x, self.square_terms.y, 0.0, 0.0),
            DVec4::new(self.mixed_terms.y, self.mixed_terms.z, self.square_terms.z, 0.0),
            DVec4::new(self.terms.x, self.terms.y, self.terms.z, self.constant),
        )
    }

    fn matrix_to_quadric(&mut self, m: Matrix4x4) {
        // Fold the general matrix back to the ten coefficients, summing the
        // symmetric halves.
        let row = |r: usize| -> DVec4 { m.row(r) };
        self.square_terms = Vector3::new(row(0).x, row(1).y, row(2).z);
        self.mixed_terms = Vector3::new(
            row(0).y + row(1).x,
            row(0).z + row(2).x,
            row(1).z + row(2).y,
        );
        self.terms = Vector3::new(
            row(0).w + row(3).x,
            row(1).w + row(3).y,
            row(2).w + row(3).z,
        );
        self.constant = row(3).w;
    }

    /// Recomputes the bounding box, tightening with the given clip extents.
    /// Handles the axis-aligned special forms (ellipsoid, cylinder, cone,
    /// hyperboloid, paraboloid); anything with mixed terms keeps the clip
    /// extents.
    pub fn compute_bbox_clipped(&mut self, clip_min_in: Vector3, clip_max_in: Vector3) {
        let mut clip_min = clip_min_in;
        let mut clip_max = clip_max_in;
        let old = self.base.bbox;

        let clip_list = self.base.clip.clone();
        for clip in clip_list.iter() {
            if !clip.base().test_flag(crate::shape::INVERTED_FLAG) {
                let (tmp_min, tmp_max) = match clip.as_plane() {
                    Some(p) => plane_min_max(p),
                    None => {
                        let b = clip.bbox();
                        (b.min, b.max)
                    }
                };
                clip_min = clip_min.max(tmp_min);
                clip_max = clip_max.min(tmp_max);
            }
        }

        let mut a = self.square_terms.x;
        let mut e = self.square_terms.y;
        let mut h = self.square_terms.z;
        let mut b = self.mixed_terms.x / 2.0;
        let mut c = self.mixed_terms.y / 2.0;
        let mut f = self.mixed_terms.z / 2.0;
        let mut d = self.terms.x / 2.0;
        let mut g = self.terms.y / 2.0;
        let mut i = self.terms.z / 2.0;
        let mut j = self.constant;

        for v in [&mut a, &mut b, &mut c, &mut d, &mut e, &mut f, &mut g, &mut h, &mut i, &mut j]
            .iter_mut()
        {
            if v.abs() < EPSILON {
                **v = 0.0;
            }
        }

        // Mixed terms: bounding analytically would need diagonalising the
        // 4x4 matrix, so settle for the clip extents.
        if b != 0.0 || c != 0.0 || f != 0.0 {
            let new_volume =
                (clip_max.x - clip_min.x) * (clip_max.y - clip_min.y) * (clip_max.z - clip_min.z);
            if new_volume < old.volume() {
                self.base.bbox = BoundingBox::from_points(clip_min, clip_max);
            }
            return;
        }

        // Linear terms: find the translation that centres the quadric.
        let t1;
        if d != 0.0 || g != 0.0 || i != 0.0 {
            let tx = if a != 0.0 {
                -d / a
            } else if d != 0.0 {
                -j / (2.0 * d)
            } else {
                0.0
            };
            let ty = if e != 0.0 {
                -g / e
            } else if g != 0.0 {
                -j / (2.0 * g)
            } else {
                0.0
            };
            let tz = if h != 0.0 {
                -i / h
            } else if i != 0.0 {
                -j / (2.0 * i)
            } else {
                0.0
            };
            t1 = Vector3::new(tx, ty, tz);

            d += a * t1.x;
            g += e * t1.y;
            i += h * t1.z;
            j -= t1.x * (a * t1.x - 2.0 * d) + t1.y * (e * t1.y - 2.0 * g)
                + t1.z * (h * t1.z - 2.0 * i);
        } else {
            t1 = Vector3::new(0.0, 0.0, 0.0);
        }

        let mut new_min = Vector3::new(-BOUND_HUGE / 2.0, -BOUND_HUGE / 2.0, -BOUND_HUGE / 2.0);
        let mut new_max = Vector3::new(BOUND_HUGE / 2.0, BOUND_HUGE / 2.0, BOUND_HUGE / 2.0);

        clip_min -= t1;
        clip_max -= t1;

        // Keep A non-negative.
        if a < 0.0 {
            a = -a;
            d = -d;
            e = -e;
            g = -g;
            h = -h;
            i = -i;
            j = -j;
        }

        // Ellipsoid.
        if a > 0.0 && e > 0.0 && h > 0.0 && j < 0.0 {
            let ra = (-j / a).sqrt();
            let rb = (-j / e).sqrt();
            let rc = (-j / h).sqrt();
            new_min = Vector3::new(-ra, -rb, -rc);
            new_max = Vector3::new(ra, rb, rc);
        }

        // Cylinders.
        if a == 0.0 && e > 0.0 && h > 0.0 && j < 0.0 {
            let rb = (-j / e).sqrt();
            let rc = (-j / h).sqrt();
            new_min.y = -rb;
            new_min.z = -rc;
            new_max.y = rb;
            new_max.z = rc;
        }
        if a > 0.0 && e == 0.0 && h > 0.0 && j < 0.0 {
            let ra = (-j / a).sqrt();
            let rc = (-j / h).sqrt();
            new_min.x = -ra;
            new_min.z = -rc;
            new_max.x = ra;
            new_max.z = rc;
        }
        if a > 0.0 && e > 0.0 && h == 0.0 && j < 0.0 {
            let ra = (-j / a).sqrt();
            let rb = (-j / e).sqrt();
            new_min.x = -ra;
            new_min.y = -rb;
            new_max.x = ra;
            new_max.y = rb;
        }

        // Cones.
        if a > 0.0 && e < 0.0 && h < 0.0 && j == 0.0 {
            let sa = (1.0 / a).sqrt();
            let sb = (-1.0 / e).sqrt();
            let sc = (-1.0 / h).sqrt();
            let ry = (clip_min.x * sb / sa).abs().max((clip_max.x * sb / sa).abs());
            let rz = (clip_min.x * sc / sa).abs().max((clip_max.x * sc / sa).abs());
            new_min.y = -ry;
            new_min.z = -rz;
            new_max.y = ry;
            new_max.z = rz;
        }
        if a > 0.0 && e < 0.0 && h > 0.0 && j == 0.0 {
            let sa = (1.0 / a).sqrt();
            let sb = (-1.0 / e).sqrt();
            let sc = (1.0 / h).sqrt();
            let rx = (clip_min.y * sa / sb).abs().max((clip_max.y * sa / sb).abs());
            let rz = (clip_min.y * sc / sb).abs().max((clip_max.y * sc / sb).abs());
            new_min.x = -rx;
            new_min.z = -rz;
            new_max.x = rx;
            new_max.z = rz;
        }
        if a > 0.0 && e > 0.0 && h < 0.0 && j == 0.0 {
            let sa = (1.0 / a).sqrt();
            let sb = (1.0 / e).sqrt();
            let sc = (-1.0 / h).sqrt();
            let rx = (clip_min.z * sa / sc).abs().max((clip_max.z * sa / sc).abs());
            let ry = (clip_min.z * sb / sc).abs().max((clip_max.z * sb / sc).abs());
            new_min.x = -rx;
            new_min.y = -ry;
            new_max.x = rx;
            new_max.y = ry;
        }

        // Hyperboloids.
        if a > 0.0 && e < 0.0 && h < 0.0 && j > 0.0 {
            // One sheet around x.
            let d1 = 1.0 + a * clip_min.x * clip_min.x;
            let d2 = 1.0 + a * clip_max.x * clip_max.x;
            let ry = (-d1 / e).sqrt().max((-d2 / e).sqrt());
            let rz = (-d1 / h).sqrt().max((-d2 / h).sqrt());
            new_min.y = -ry;
            new_min.z = -rz;
            new_max.y = ry;
            new_max.z = rz;
        }
        if a > 0.0 && e < 0.0 && h > 0.0 && j < 0.0 {
            let d1 = 1.0 - e * clip_min.y * clip_min.y;
            let d2 = 1.0 - e * clip_max.y * clip_max.y;
            let rx = (d1 / a).sqrt().max((d2 / a).sqrt());
            let rz = (d1 / h).sqrt().max((d2 / h).sqrt());
            new_min.x = -rx;
            new_min.z = -rz;
            new_max.x = rx;
            new_max.z = rz;
        }
        if a > 0.0 && e > 0.0 && h < 0.0 && j < 0.0 {
            let d1 = 1.0 - h * clip_min.z * clip_min.z;
            let d2 = 1.0 - h * clip_max.z * clip_max.z;
            let rx = (d1 / a).sqrt().max((d2 / a).sqrt());
            let ry = (d1 / e).sqrt().max((d2 / e).sqrt());
            new_min.x = -rx;
            new_min.y = -ry;
            new_max.x = rx;
            new_max.y = ry;
        }

        // Paraboloids.
        if a == 0.0 && d != 0.0 && e * h > 0.0 && j == 0.0 {
            let x1 = if d * e < 0.0 { clip_min.x.max(0.0) } else { clip_min.x };
            let ry1 = (2.0 * d * x1 / e).abs().sqrt();
            let rz1 = (2.0 * d * x1 / h).abs().sqrt();
            let x2 = if d * e > 0.0 { clip_max.x.min(0.0) } else { clip_max.x };
            let ry2 = (2.0 * d * x2 / e).abs().sqrt();
            let rz2 = (2.0 * d * x2 / h).abs().sqrt();
            let ry = ry1.max(ry2);
            let rz = rz1.max(rz2);
            if d * e < 0.0 {
                new_min.x = clip_min.x.max(0.0);
            }
            new_min.y = -ry;
            new_min.z = -rz;
            if d * e > 0.0 {
                new_max.x = clip_max.x.min(0.0);
            }
            new_max.y = ry;
            new_max.z = rz;
        }
        if e == 0.0 && g != 0.0 && a * h > 0.0 && j == 0.0 {
            let y1 = if g > 0.0 { clip_min.y } else { clip_min.y.max(0.0) };
            let rx1 = (2.0 * g * y1 / a).abs().sqrt();
            let rz1 = (2.0 * g * y1 / h).abs().sqrt();
            let y2 = if g < 0.0 { clip_max.y } else { clip_max.y.min(0.0) };
            let rx2 = (2.0 * g * y2 / a).abs().sqrt();
            let rz2 = (2.0 * g * y2 / h).abs().sqrt();
            let rx = rx1.max(rx2);
            let rz = rz1.max(rz2);
            new_min.x = -rx;
            if g < 0.0 {
                new_min.y = clip_min.y.max(0.0);
            }
            new_min.z = -rz;
            new_max.x = rx;
            if g > 0.0 {
                new_max.y = clip_max.y.min(0.0);
            }
            new_max.z = rz;
        }
        if h == 0.0 && i != 0.0 && a * e > 0.0 && j == 0.0 {
            let z1 = if i < 0.0 { clip_min.z.max(0.0) } else { clip_min.z };
            let rx1 = (2.0 * i * z1 / a).abs().sqrt();
            let ry1 = (2.0 * i * z1 / e).abs().sqrt();
            let z2 = if i > 0.0 { clip_max.z.min(0.0) } else { clip_max.z };
            let rx2 = (2.0 * i * z2 / a).abs().sqrt();
            let ry2 = (2.0 * i * z2 / e).abs().sqrt();
            let rx = rx1.max(rx2);
            let ry = ry1.max(ry2);
            new_min.x = -rx;
            new_min.y = -ry;
            if i < 0.0 {
                new_min.z = clip_min.z.max(0.0);
            }
            new_max.x = rx;
            new_max.y = ry;
            if i > 0.0 {
                new_max.z = clip_max.z.min(0.0);
            }
        }

        new_min = new_min.max(clip_min);
        new_max = new_max.min(clip_max);

        let new_volume = (new_max.x - new_min.x) * (new_max.y - new_min.y) * (new_max.z - new_min.z);
        if new_volume < old.volume() {
            self.automatic_bounds = true;
            new_min += t1;
            new_max += t1;
            self.base.bbox = BoundingBox::from_points(new_min, new_max);
            self.base.bbox.guard_critical_length();
        }
    }
}

impl Shape for Quadric {
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
        thread.stats.bump(Stat::RayQuadricTests);
        let mut found = false;

        if let Some((depth1, depth2)) = self.intersect(ray.origin, ray.direction) {
            thread.stats.bump(Stat::RayQuadricTestsSucceeded);
            for &depth in &[depth1, depth2] {
                if depth > DEPTH_TOLERANCE && depth < MAX_DISTANCE {
                    let ipoint = ray.evaluate(depth);
                    if self.base.clip.is_empty() || point_in_clip(ipoint, &self.base.clip, thread) {
                        stack.push(Intersection::new(depth, ipoint, self));
                        found = true;
                    }
                }
            }
        }

        found
    }

    fn inside(&self, p: Vector3, _thread: &mut TraceThreadData<'_>) -> bool {
        let (qa, qe, qh) = (self.square_terms.x, self.square_terms.y, self.square_terms.z);
        let (qb, qc, qf) = (self.mixed_terms.x, self.mixed_terms.y, self.mixed_terms.z);
        let (qd, qg, qi) = (self.terms.x, self.terms.y, self.terms.z);

        p.x * (qa * p.x + qb * p.y + qd)
            + p.y * (qe * p.y + qf * p.z + qg)
            + p.z * (qh * p.z + qc * p.x + qi)
            + self.constant
            <= 0.0
    }

    fn normal(&self, inter: &Intersection<'_>, _thread: &mut TraceThreadData<'_>) -> Vector3 {
        let p = inter.ipoint;
        let (qa, qe, qh) = (self.square_terms.x, self.square_terms.y, self.square_terms.z);
        let (qb, qc, qf) = (self.mixed_terms.x, self.mixed_terms.y, self.mixed_terms.z);
        let (qd, qg, qi) = (self.terms.x, self.terms.y, self.terms.z);

        let result = Vector3::new(
            2.0 * qa * p.x + qb * p.y + qc * p.z + qd,
            qb * p.x + 2.0 * qe * p.y + qf * p.z + qg,
            qc * p.x + qf * p.y + 2.0 * qh * p.z + qi,
        );

        let len = result.length();
        if len == 0.0 {
            // The normal is undefined here; use an arbitrary axis.
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            result / len
        }
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
        // Congruence transform of the coefficient matrix by the inverse.
        let q = self.quadric_to_matrix();
        let m = trans.inverse.transpose() * q * trans.inverse;
        self.matrix_to_quadric(m);
        self.base.bbox = self.base.bbox.transformed(trans);
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.square_terms = -self.square_terms;
        self.mixed_terms = -self.mixed_terms;
        self.terms = -self.terms;
        self.constant = -self.constant;
        self
    }

    fn compute_bbox(&mut self) {
        self.compute_bbox_clipped(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
    }

    fn as_quadric(&self) -> Option<&Quadric> {
        Some(self)
    }

    fn as_quadric_mut(&mut self) -> Option<&mut Quadric> {
        Some(self)
    }
}
