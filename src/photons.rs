#![allow(dead_code)]

//! The media-facing face of the photon subsystem: stored photons with
//! packed direction bytes, the sincos decode table, and a gatherer with an
//! adaptive radius.

use lazy_static::lazy_static;

use crate::colour::RgbColour;
use crate::math::Vector3;

lazy_static! {
    /// sin/cos for the 256 quantised direction angles; photon directions
    /// are stored as two signed bytes indexing this.
    static ref SIN_COS_DATA: ([f64; 256], [f64; 256]) = {
        let mut sins = [0.0f64; 256];
        let mut coss = [0.0f64; 256];
        for i in 0..256 {
            let angle = std::f64::consts::PI * i as f64 / 255.0;
            sins[i] = angle.sin();
            coss[i] = angle.cos();
        }
        (sins, coss)
    };
}

/// One stored photon. Direction is packed into two bytes the way the
/// photon tracer deposits them.
#[derive(Debug, Copy, Clone)]
pub struct Photon {
    pub loc: Vector3,
    pub colour: RgbColour,
    pub theta: i8,
    pub phi: i8,
}

impl Photon {
    pub fn new(loc: Vector3, colour: RgbColour, direction: Vector3) -> Photon {
        let d = direction.normalize();
        let theta = d.y.asin(); // latitude from the xz plane
        let phi = d.z.atan2(d.x);
        let pack =
            |a: f64| -> i8 { ((a / std::f64::consts::PI) * 255.0).round().max(-127.0).min(127.0) as i8 };
        Photon {
            loc,
            colour,
            theta: pack(theta + std::f64::consts::FRAC_PI_2),
            phi: pack(phi * 0.5),
        }
    }

    /// Unpacks the direction through the sincos table.
    pub fn direction(&self) -> Vector3 {
        let (ref sins, ref coss) = *SIN_COS_DATA;
        let theta = (i32::from(self.theta) + 127) as usize;
        let phi = (i32::from(self.phi) + 127) as usize;

        let y = sins[theta];
        let mut x = coss[theta];
        let z = x * sins[phi];
        x *= coss[phi];
        Vector3::new(x, y, z)
    }
}

/// The photon store for one media pass. Built by the photon tracer before
/// rendering; read-only afterwards.
#[derive(Debug, Default)]
pub struct PhotonMap {
    pub photons: Vec<Photon>,
    /// Starting gather radius.
    pub gather_radius: f64,
    /// Desired number of photons per gather.
    pub min_gather: usize,
}

impl PhotonMap {
    pub fn new() -> PhotonMap {
        PhotonMap {
            photons: Vec::new(),
            gather_radius: 0.1,
            min_gather: 20,
        }
    }

    pub fn num_photons(&self) -> usize {
        self.photons.len()
    }
}

/// Gathers photons around sample points, growing the radius until enough
/// photons are found or the expansion limit is hit.
#[derive(Debug)]
pub struct PhotonGatherer<'a> {
    pub map: &'a PhotonMap,
    pub gathered: Vec<usize>,
    pub gathered_radius: f64,
}

impl<'a> PhotonGatherer<'a> {
    pub fn new(map: &'a PhotonMap) -> PhotonGatherer<'a> {
        PhotonGatherer {
            map,
            gathered: Vec::new(),
            gathered_radius: 0.0,
        }
    }

    /// Collects photon indices within an adaptive radius of `point` and
    /// returns the radius actually used.
    pub fn gather_adaptive(&mut self, point: Vector3) -> f64 {
        let mut radius = self.map.gather_radius;
        for _ in 0..3 {
            self.gather(point, radius);
            if self.gathered.len() >= self.map.min_gather {
                break;
            }
            radius *= 2.0;
        }
        self.gathered_radius = radius;
        radius
    }

    fn gather(&mut self, point: Vector3, radius: f64) {
        self.gathered.clear();
        let r2 = radius * radius;
        for (i, photon) in self.map.photons.iter().enumerate() {
            if (photon.loc - point).length_squared() <= r2 {
                self.gathered.push(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_direction_roundtrips_roughly() {
        for dir in &[
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(0.577, 0.577, 0.577),
        ] {
            let p = Photon::new(Vector3::new(0.0, 0.0, 0.0), RgbColour::WHITE, *dir);
            let d = p.direction();
            // Quantisation to a byte costs accuracy; directions must stay
            // in the same hemisphere-ish neighbourhood.
            assert!(d.normalize().dot(dir.normalize()) > 0.9, "{:?} -> {:?}", dir, d);
        }
    }

    #[test]
    fn gather_finds_nearby_photons() {
        let mut map = PhotonMap::new();
        map.min_gather = 1;
        map.gather_radius = 0.5;
        map.photons.push(Photon::new(
            Vector3::new(0.1, 0.0, 0.0),
            RgbColour::WHITE,
            Vector3::new(0.0, 1.0, 0.0),
        ));
        map.photons.push(Photon::new(
            Vector3::new(5.0, 0.0, 0.0),
            RgbColour::WHITE,
            Vector3::new(0.0, 1.0, 0.0),
        ));

        let mut gatherer = PhotonGatherer::new(&map);
        gatherer.gather_adaptive(Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(gatherer.gathered, vec![0]);
    }

    #[test]
    fn radius_expands_when_sparse() {
        let mut map = PhotonMap::new();
        map.min_gather = 1;
        map.gather_radius = 0.1;
        map.photons.push(Photon::new(
            Vector3::new(0.3, 0.0, 0.0),
            RgbColour::WHITE,
            Vector3::new(0.0, 1.0, 0.0),
        ));

        let mut gatherer = PhotonGatherer::new(&map);
        let r = gatherer.gather_adaptive(Vector3::new(0.0, 0.0, 0.0));
        assert!(r > 0.1);
        assert_eq!(gatherer.gathered.len(), 1);
    }
}
