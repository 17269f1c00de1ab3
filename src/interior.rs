#![allow(dead_code)]

use crate::colour::RgbColour;
use crate::math::Transform;
use crate::media::Media;

/// Volumetric properties of the space an object encloses.
///
/// Objects share interiors; rays hold borrowed references to the interiors
/// they have entered.
#[derive(Debug, Clone)]
pub struct Interior {
    pub ior: f64,
    pub old_refract: f64,
    pub dispersion: f64,
    pub disp_nelems: u32,
    pub caustics: f64,
    pub fade_distance: f64,
    pub fade_power: f64,
    pub fade_colour: RgbColour,
    /// Subsurface scattering/absorption coefficients, when enabled.
    pub subsurface: Option<(RgbColour, RgbColour)>,
    pub hollow: bool,
    pub media: Vec<Media>,
}

impl Default for Interior {
    fn default() -> Interior {
        Interior {
            ior: 1.0,
            old_refract: 1.0,
            dispersion: 1.0,
            disp_nelems: 7,
            caustics: 0.0,
            fade_distance: 0.0,
            fade_power: 0.0,
            fade_colour: RgbColour::BLACK,
            subsurface: None,
            hollow: true,
            media: Vec::new(),
        }
    }
}

impl Interior {
    pub fn new() -> Interior {
        Interior::default()
    }

    /// Called once after parsing: finishes every media entry.
    pub fn post_process(&mut self) {
        for m in self.media.iter_mut() {
            m.post_process();
        }
    }

    pub fn transform(&mut self, trans: &Transform) {
        for m in self.media.iter_mut() {
            m.transform(trans);
        }
    }
}
