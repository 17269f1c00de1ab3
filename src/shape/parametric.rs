#![allow(dead_code)]

//! A parametric surface `{x(u,v), y(u,v), z(u,v)}` over a rectangular
//! (u,v) domain, intersected inside a container shape.
//!
//! Traversal subdivides the domain with an explicit interval stack. For
//! each cell, per-axis bounds of the coordinate functions (from the
//! Lipschitz-style `max_gradient` bound) give an axis-aligned box that the
//! ray either misses (prune) or pierces; cells shrink until their larger
//! parameter span is below `accuracy`. A precomputed tree of per-axis
//! bounds over the first few subdivision levels takes the top off the
//! function evaluation cost.

use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::istack::{IStack, Intersection};
use crate::math::{Transform, Vector2, Vector3, EPSILON, MAX_DISTANCE};
use crate::ray::Ray;
use crate::shape::container::ContainedBy;
use crate::shape::{point_in_clip, ObjectBase, ObjectPtr, Shape};
use crate::stats::Stat;
use crate::thread::TraceThreadData;

const INDEX_U: usize = 0;
const INDEX_V: usize = 1;
const MAX_SECTOR: u32 = 10_000_000;

pub const PRECOMP_X: u8 = 1;
pub const PRECOMP_Y: u8 = 2;
pub const PRECOMP_Z: u8 = 4;

/// Precomputed per-axis bound tree, shared between copies.
#[derive(Debug)]
pub struct PrecompParData {
    flags: u8,
    depth: u32,
    low: [Vec<f64>; 3],
    hi: [Vec<f64>; 3],
}

#[derive(Debug, Clone)]
pub struct Parametric {
    pub base: ObjectBase,
    pub functions: [Arc<fn_vm::Function>; 3],
    pub container: ContainedBy,
    pub umin: f64,
    pub umax: f64,
    pub vmin: f64,
    pub vmax: f64,
    pub accuracy: f64,
    pub max_gradient: f64,
    precomp: Option<Arc<PrecompParData>>,
}

impl Parametric {
    pub fn new(
        fx: Arc<fn_vm::Function>,
        fy: Arc<fn_vm::Function>,
        fz: Arc<fn_vm::Function>,
    ) -> Parametric {
        let mut par = Parametric {
            base: ObjectBase::new(),
            functions: [fx, fy, fz],
            container: ContainedBy::unit_box(),
            umin: 0.0,
            umax: 1.0,
            vmin: 0.0,
            vmax: 1.0,
            accuracy: 0.001,
            max_gradient: 1.0,
            precomp: None,
        };
        par.compute_bbox();
        par
    }

    fn evaluate(&self, axis: usize, u: f64, v: f64, thread: &mut TraceThreadData<'_>) -> f64 {
        let f = self.functions[axis].clone();
        let id = Arc::as_ptr(&self.functions[axis]) as usize;
        let ctx = thread.fn_context(id);
        ctx.set_local(fn_vm::LOCAL_U, u);
        ctx.set_local(fn_vm::LOCAL_V, v);
        ctx.evaluate(&f)
    }

    /// Assume the function attains its maximum gradient over the whole
    /// range and bound its minimum and maximum accordingly.
    fn interval(dx: f64, a: f64, b: f64, max_gradient: f64) -> (f64, f64) {
        let dy = (a - b).abs();
        let mut ofs = max_gradient * (dx - dy / max_gradient) / 2.0;
        if ofs < 0.0 {
            ofs = 0.0;
        }
        (a.min(b) - ofs, a.max(b) + ofs)
    }

    /// Lower/upper bound of one coordinate function over a (u,v) cell.
    fn evaluate_function_interval_uv(
        &self,
        axis: usize,
        low_vect: Vector2,
        hi_vect: Vector2,
        thread: &mut TraceThreadData<'_>,
    ) -> (f64, f64) {
        let f_0_0 = self.evaluate(axis, low_vect.x, low_vect.y, thread);
        let f_0_1 = self.evaluate(axis, low_vect.x, hi_vect.y, thread);
        let f_1_0 = self.evaluate(axis, hi_vect.x, low_vect.y, thread);
        let f_1_1 = self.evaluate(axis, hi_vect.x, hi_vect.y, thread);

        let dv = hi_vect.y - low_vect.y;
        let du = hi_vect.x - low_vect.x;

        // Bound each u-edge along v, then bound across u assuming the
        // extremes line up; that is the worst case either way.
        let (f_0_min, f_0_max) = Parametric::interval(dv, f_0_0, f_0_1, self.max_gradient);
        let (f_1_min, f_1_max) = Parametric::interval(dv, f_1_0, f_1_1, self.max_gradient);
        let (_, hi) = Parametric::interval(du, f_0_max, f_1_max, self.max_gradient);
        let (low, _) = Parametric::interval(du, f_0_min, f_1_min, self.max_gradient);

        (low, hi)
    }

    /// Builds the per-axis bound tree down to `depth` subdivision levels
    /// for the axes named in `flags`.
    pub fn precompute(
        &mut self,
        flags: u8,
        depth: u32,
        thread: &mut TraceThreadData<'_>,
    ) -> RenderResult<()> {
        if depth < 1 || depth > 20 {
            return Err(RenderError::PrecomputeDepth(depth));
        }
        let nmb = 1usize << depth;

        let mut data = PrecompParData {
            flags,
            depth,
            low: [vec![0.0; nmb], vec![0.0; nmb], vec![0.0; nmb]],
            hi: [vec![0.0; nmb], vec![0.0; nmb], vec![0.0; nmb]],
        };

        let last_depth = 1usize << (depth - 1);
        self.precomp_rec(
            &mut data,
            last_depth,
            1,
            self.umin,
            self.vmin,
            self.umax,
            self.vmax,
            thread,
        );
        self.precomp = Some(Arc::new(data));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn precomp_rec(
        &self,
        data: &mut PrecompParData,
        last_depth: usize,
        node: usize,
        umin: f64,
        vmin: f64,
        umax: f64,
        vmax: f64,
        thread: &mut TraceThreadData<'_>,
    ) {
        if node >= last_depth {
            for axis in 0..3 {
                if data.flags & (1 << axis) != 0 {
                    let (low, hi) = self.evaluate_function_interval_uv(
                        axis,
                        Vector2::new(umin, vmin),
                        Vector2::new(umax, vmax),
                        thread,
                    );
                    data.low[axis][node] = low;
                    data.hi[axis][node] = hi;
                }
            }
        } else {
            if umax - umin < vmax - vmin {
                let vmid = (vmin + vmax) / 2.0;
                self.precomp_rec(data, last_depth, 2 * node, umin, vmin, umax, vmid, thread);
                self.precomp_rec(data, last_depth, 2 * node + 1, umin, vmid, umax, vmax, thread);
            } else {
                let umid = (umin + umax) / 2.0;
                self.precomp_rec(data, last_depth, 2 * node, umin, vmin, umid, vmax, thread);
                self.precomp_rec(data, last_depth, 2 * node + 1, umid, vmin, umax, vmax, thread);
            }
            for axis in 0..3 {
                if data.flags & (1 << axis) != 0 {
                    data.hi[axis][node] = data.hi[axis][2 * node].max(data.hi[axis][2 * node + 1]);
                    data.low[axis][node] =
                        data.low[axis][2 * node].min(data.low[axis][2 * node + 1]);
                }
            }
        }
    }
}

impl Shape for Parametric {
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
        thread.stats.bump(Stat::RayParametricBoundTests);

        let bracket = self
            .container
            .intersect(ray.origin, ray.direction, self.base.trans.as_ref());
        let (depth1, depth2, _side1, _side2) = match bracket {
            Some(b) => b,
            None => return false,
        };
        thread.stats.bump(Stat::RayParametricBoundTestsSucceeded);
        thread.stats.bump(Stat::RayParametricTests);

        let (p, d) = match self.base.trans {
            Some(ref t) => (
                t.inverse_transform_point(ray.origin),
                t.inverse_transform_direction(ray.direction),
            ),
            None => (ray.origin, ray.direction),
        };

        let mut depth1 = if depth1 == depth2 { 0.0 } else { depth1 };
        depth1 += 4.0 * self.accuracy;
        if depth1 > depth2 {
            return false;
        }

        let (max_precomp, precomp) = match self.precomp {
            Some(ref pd) => (1usize << pd.depth, Some(pd.clone())),
            None => (0, None),
        };

        let mut intervals_low = [[0.0f64; 32]; 2];
        let mut intervals_hi = [[0.0f64; 32]; 2];
        let mut sector_num = [0u32; 32];

        intervals_low[INDEX_U][0] = self.umin;
        intervals_hi[INDEX_U][0] = self.umax;
        intervals_low[INDEX_V][0] = self.vmin;
        intervals_hi[INDEX_V][0] = self.vmax;
        sector_num[0] = 1;

        let mut t_result = MAX_DISTANCE;
        let mut uv = Vector2::new(0.0, 0.0);
        let mut i: i32 = 0;

        while i >= 0 {
            let idx = i as usize;
            let low_vect = Vector2::new(intervals_low[INDEX_U][idx], intervals_low[INDEX_V][idx]);
            let hi_vect = Vector2::new(intervals_hi[INDEX_U][idx], intervals_hi[INDEX_V][idx]);

            let mut len = hi_vect.x - low_vect.x;
            let mut split = INDEX_U;
            if hi_vect.y - low_vect.y > len {
                len = hi_vect.y - low_vect.y;
                split = INDEX_V;
            }

            let mut t_len = 0.0;
            let mut t_pot_res = 0.0;
            let mut par_x = false;
            let mut par_y = false;
            let mut ray_min = [0.0f64; 3];
            let mut ray_max = [0.0f64; 3];
            let mut pruned = false;

            for axis in 0..3 {
                let use_precomp = match precomp {
                    Some(ref pd) => {
                        (sector_num[idx] as usize) < max_precomp
                            && pd.flags & (1 << axis) != 0
                            && (axis != 2 || sector_num[idx] > 0)
                    }
                    None => false,
                };
                let (low, hi) = if use_precomp {
                    let pd = precomp.as_ref().unwrap();
                    let s = sector_num[idx] as usize;
                    (pd.low[axis][s], pd.hi[axis][s])
                } else {
                    self.evaluate_function_interval_uv(axis, low_vect, hi_vect, thread)
                };

                let dir = crate::math::component(d, axis);
                let orig = crate::math::component(p, axis);
                if dir.abs() < EPSILON {
                    if axis == 0 {
                        par_x = true;
                    }
                    if axis == 1 {
                        par_y = true;
                    }
                    if hi < orig || low > orig {
                        pruned = true;
                        break;
                    }
                } else {
                    let mut rmin = (hi - orig) / dir;
                    let mut rmax = (low - orig) / dir;
                    if rmin > rmax {
                        std::mem::swap(&mut rmin, &mut rmax);
                    }
                    if rmin > depth2 || rmax < depth1 {
                        pruned = true;
                        break;
                    }
                    if rmin > t_result {
                        pruned = true;
                        break;
                    }
                    t_pot_res = rmin;

                    // Each axis window must overlap the ones before it.
                    if axis >= 1 && !par_x && (rmin > ray_max[0] || rmax < ray_min[0]) {
                        pruned = true;
                        break;
                    }
                    if axis == 2 && !par_y && (rmin > ray_max[1] || rmax < ray_min[1]) {
                        pruned = true;
                        break;
                    }

                    ray_min[axis] = rmin;
                    ray_max[axis] = rmax;
                    if rmax - rmin > t_len {
                        t_len = rmax - rmin;
                    }
                }
            }

            if pruned {
                i -= 1;
                continue;
            }

            if t_len < len {
                len = t_len;
            }
            if len < self.accuracy {
                if t_result > t_pot_res && t_pot_res > depth1 {
                    t_result = t_pot_res;
                    uv = low_vect;
                }
                i -= 1;
            } else {
                // Split the larger parameter direction and push both halves.
                sector_num[idx] *= 2;
                if sector_num[idx] >= MAX_SECTOR {
                    sector_num[idx] = MAX_SECTOR;
                }
                sector_num[idx + 1] = sector_num[idx];
                sector_num[idx] += 1;
                i += 1;
                let idx2 = i as usize;
                intervals_low[INDEX_U][idx2] = low_vect.x;
                intervals_hi[INDEX_U][idx2] = hi_vect.x;
                intervals_low[INDEX_V][idx2] = low_vect.y;
                intervals_hi[INDEX_V][idx2] = hi_vect.y;

                let mid = (intervals_hi[split][idx2] + intervals_low[split][idx2]) / 2.0;
                intervals_hi[split][idx2] = mid;
                intervals_low[split][idx2 - 1] = mid;
            }
        }

        if t_result < depth2 {
            thread.stats.bump(Stat::RayParametricTestsSucceeded);
            let ipoint = ray.origin + ray.direction * t_result;
            if self.base.clip.is_empty() || point_in_clip(ipoint, &self.base.clip, thread) {
                stack.push(Intersection::with_uv(t_result, ipoint, uv, self));
                return true;
            }
        }
        false
    }

    fn inside(&self, _point: Vector3, _thread: &mut TraceThreadData<'_>) -> bool {
        false
    }

    fn normal(&self, inter: &Intersection<'_>, thread: &mut TraceThreadData<'_>) -> Vector3 {
        let u = inter.iuv.x;
        let v = inter.iuv.y;

        let base = Vector3::new(
            self.evaluate(0, u, v, thread),
            self.evaluate(1, u, v, thread),
            self.evaluate(2, u, v, thread),
        );
        let du = Vector3::new(
            self.evaluate(0, u + self.accuracy, v, thread),
            self.evaluate(1, u + self.accuracy, v, thread),
            self.evaluate(2, u + self.accuracy, v, thread),
        ) - base;
        let dv = Vector3::new(
            self.evaluate(0, u, v + self.accuracy, thread),
            self.evaluate(1, u, v + self.accuracy, thread),
            self.evaluate(2, u, v + self.accuracy, thread),
        ) - base;

        let mut result = du.cross(dv);
        if let Some(ref t) = self.base.trans {
            result = t.transform_normal(result);
        }
        let len = result.length();
        if len == 0.0 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            result / len
        }
    }

    fn uv_coord(&self, inter: &Intersection<'_>) -> Vector2 {
        inter.iuv
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
        self.compute_bbox();
    }

    fn invert(mut self: Box<Self>) -> ObjectPtr {
        self.base.invert_flag(crate::shape::INVERTED_FLAG);
        self
    }

    fn compute_bbox(&mut self) {
        let mut bbox = self.container.compute_bbox();
        if let Some(ref t) = self.base.trans {
            bbox = bbox.transformed(t);
        }
        self.base.bbox = bbox;
    }
}
