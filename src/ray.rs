#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::interior::Interior;
use crate::math::Vector3;

/// What kind of trace produced a ray. Several of the object ray-type flags
/// (`no_image`, `no_reflection`, ...) key off this.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RayType {
    Other,
    Primary,
    Reflection,
    Refraction,
    /// Shot from just below a surface; very close intersections shall not
    /// be suppressed.
    Subsurface,
}

/// Per-trace context threaded down through recursive traces: recursion
/// depth, importance weight, the adaptive-sampling stream index, and the
/// cooperative cancellation flag.
#[derive(Debug, Clone)]
pub struct TraceTicket {
    pub trace_level: u32,
    pub max_trace_level: u32,
    /// Importance weight for threshold culling of deep recursions.
    pub weight: f64,
    /// Stream index for the per-thread jitter sequence, so repeated traces
    /// of the same ray produce identical results.
    pub stream_index: u32,
    cancel: Arc<AtomicBool>,
}

impl TraceTicket {
    pub fn new(max_trace_level: u32, stream_index: u32) -> TraceTicket {
        TraceTicket {
            trace_level: 0,
            max_trace_level,
            weight: 1.0,
            stream_index,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares another ticket's cancellation flag, for driver-owned flags.
    pub fn with_cancel_flag(max_trace_level: u32, stream_index: u32, cancel: Arc<AtomicBool>) -> TraceTicket {
        TraceTicket {
            trace_level: 0,
            max_trace_level,
            weight: 1.0,
            stream_index,
            cancel,
        }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// A ray plus its trace context: type flags, the stack of interiors it has
/// entered, a spectral band tag and the ticket.
///
/// Constructed at the top of each trace and moved by value into recursive
/// traces. All scene data is borrowed.
#[derive(Debug, Clone)]
pub struct Ray<'a> {
    pub origin: Vector3,
    pub direction: Vector3,
    pub ticket: TraceTicket,

    interiors: Vec<&'a Interior>,
    /// Index of the spectral band a monochromatic (dispersion) ray samples.
    spectral_band: u32,

    ray_type: RayType,
    shadow_test: bool,
    photon: bool,
    radiosity: bool,
    monochromatic: bool,
    pretrace: bool,
    hollow: bool,
}

impl<'a> Ray<'a> {
    pub fn new(origin: Vector3, direction: Vector3, ticket: TraceTicket) -> Ray<'a> {
        Ray {
            origin,
            direction,
            ticket,
            interiors: Vec::new(),
            spectral_band: 0,
            ray_type: RayType::Primary,
            shadow_test: false,
            photon: false,
            radiosity: false,
            monochromatic: false,
            pretrace: false,
            hollow: true,
        }
    }

    pub fn evaluate(&self, depth: f64) -> Vector3 {
        self.origin + self.direction * depth
    }

    pub fn set_flags(&mut self, ray_type: RayType, shadow_test: bool, photon: bool) {
        self.ray_type = ray_type;
        self.shadow_test = shadow_test;
        self.photon = photon;
    }

    pub fn set_radiosity(&mut self, radiosity: bool) {
        self.radiosity = radiosity;
    }

    pub fn set_monochromatic(&mut self, band: u32) {
        self.monochromatic = true;
        self.spectral_band = band;
    }

    pub fn spectral_band(&self) -> u32 {
        self.spectral_band
    }

    pub fn is_primary_ray(&self) -> bool {
        self.ray_type == RayType::Primary
    }

    /// Image rays are primary rays plus pure refraction chains.
    pub fn is_image_ray(&self) -> bool {
        self.is_primary_ray()
            || (self.ray_type == RayType::Refraction && !self.radiosity)
    }

    pub fn is_reflection_ray(&self) -> bool {
        self.ray_type == RayType::Reflection
    }

    pub fn is_refraction_ray(&self) -> bool {
        self.ray_type == RayType::Refraction
    }

    pub fn is_subsurface_ray(&self) -> bool {
        self.ray_type == RayType::Subsurface
    }

    pub fn is_shadow_test_ray(&self) -> bool {
        self.shadow_test
    }

    pub fn is_photon_ray(&self) -> bool {
        self.photon
    }

    pub fn is_radiosity_ray(&self) -> bool {
        self.radiosity
    }

    pub fn is_monochromatic_ray(&self) -> bool {
        self.monochromatic
    }

    pub fn is_pretrace_ray(&self) -> bool {
        self.pretrace
    }

    /// True while every entered interior is hollow.
    pub fn is_hollow_ray(&self) -> bool {
        self.hollow
    }

    pub fn append_interior(&mut self, interior: &'a Interior) {
        self.hollow = self.hollow && interior.hollow;
        self.interiors.push(interior);
    }

    /// Removes one occurrence of the given interior. Returns whether it was
    /// present. The hollow invariant is re-derived from what remains.
    pub fn remove_interior(&mut self, interior: &'a Interior) -> bool {
        let pos = self
            .interiors
            .iter()
            .position(|i| std::ptr::eq(*i, interior));
        match pos {
            Some(idx) => {
                self.interiors.swap_remove(idx);
                self.hollow = self.interiors.iter().all(|i| i.hollow);
                true
            }
            None => false,
        }
    }

    pub fn is_interior(&self, interior: &Interior) -> bool {
        self.interiors.iter().any(|i| std::ptr::eq(*i, interior))
    }

    pub fn interiors(&self) -> &[&'a Interior] {
        &self.interiors
    }

    pub fn clear_interiors(&mut self) {
        self.interiors.clear();
        self.hollow = true;
    }
}
