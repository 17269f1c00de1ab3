#![allow(dead_code)]

//! Warps: transformations applied to a pattern's input coordinate before
//! the pattern kind is evaluated.

use crate::math::{Transform, Vector3};
use crate::pattern::noise::{dturbulence, NoiseGen, Turb};

#[derive(Debug, Clone)]
pub enum Warp {
    /// Plain affine warp: the point moves into the pattern's space.
    Transform(Transform),
    /// Classical turbulence displacement.
    Turbulence(Turb),
    /// Tiles space with copies of a slab of the given width along one axis,
    /// optionally mirroring alternate copies.
    Repeat {
        axis: usize,
        width: f64,
        offset: Vector3,
        flip: bool,
    },
}

/// Runs the warp chain over an evaluation point. Warps are stored
/// outermost-first and applied in order.
pub fn warp_point(point: Vector3, warps: &[Warp], generator: NoiseGen) -> Vector3 {
    let mut p = point;
    for warp in warps {
        p = apply_warp(p, warp, generator);
    }
    p
}

fn apply_warp(p: Vector3, warp: &Warp, generator: NoiseGen) -> Vector3 {
    match *warp {
        Warp::Transform(ref trans) => trans.inverse_transform_point(p),
        Warp::Turbulence(ref turb) => p + dturbulence(p, turb) * turb.turbulence,
        Warp::Repeat {
            axis,
            width,
            offset,
            flip,
        } => {
            let v = crate::math::component(p, axis);
            let cell = (v / width).floor();
            let mut local = v - cell * width;
            let mut result = p;
            if flip && (cell as i64) % 2 != 0 {
                local = width - local;
            }
            crate::math::set_component(&mut result, axis, local);
            result + offset * cell
        }
    }
}

/// Like `warp_point`, but skips the turbulence displacement. Marble and
/// wood consume their turbulence internally, so displacing the point as
/// well would apply it twice.
pub fn warp_point_no_turb(point: Vector3, warps: &[Warp], generator: NoiseGen) -> Vector3 {
    let mut p = point;
    for warp in warps {
        if let Warp::Turbulence(_) = warp {
            continue;
        }
        p = apply_warp(p, warp, generator);
    }
    p
}

/// The turbulence a pattern kind keys its own scaling off: the innermost
/// warp, when that warp is a classic turbulence.
pub fn search_for_turb(warps: &[Warp]) -> Option<&Turb> {
    match warps.last() {
        Some(Warp::Turbulence(ref t)) => Some(t),
        _ => None,
    }
}
