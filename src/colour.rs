#![allow(dead_code)]

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

const RED_INTENSITY: f64 = 0.297;
const GREEN_INTENSITY: f64 = 0.589;
const BLUE_INTENSITY: f64 = 0.114;

/// A linear RGB radiance/coefficient triple.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RgbColour {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl RgbColour {
    pub const BLACK: RgbColour = RgbColour {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
    };

    pub const WHITE: RgbColour = RgbColour {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
    };

    pub fn new(red: f64, green: f64, blue: f64) -> RgbColour {
        RgbColour { red, green, blue }
    }

    pub fn splat(v: f64) -> RgbColour {
        RgbColour::new(v, v, v)
    }

    pub fn is_zero(&self) -> bool {
        self.red == 0.0 && self.green == 0.0 && self.blue == 0.0
    }

    pub fn is_near_zero(&self, epsilon: f64) -> bool {
        self.red.abs() < epsilon && self.green.abs() < epsilon && self.blue.abs() < epsilon
    }

    pub fn clear(&mut self) {
        *self = RgbColour::BLACK;
    }

    /// Perceptually weighted grey value.
    pub fn greyscale(&self) -> f64 {
        RED_INTENSITY * self.red + GREEN_INTENSITY * self.green + BLUE_INTENSITY * self.blue
    }

    pub fn max_component(&self) -> f64 {
        self.red.max(self.green).max(self.blue)
    }

    /// Componentwise e^x.
    pub fn exp(&self) -> RgbColour {
        RgbColour::new(self.red.exp(), self.green.exp(), self.blue.exp())
    }

    /// Componentwise square.
    pub fn sqr(&self) -> RgbColour {
        *self * *self
    }

    pub fn min(&self, other: RgbColour) -> RgbColour {
        RgbColour::new(
            self.red.min(other.red),
            self.green.min(other.green),
            self.blue.min(other.blue),
        )
    }

    pub fn max(&self, other: RgbColour) -> RgbColour {
        RgbColour::new(
            self.red.max(other.red),
            self.green.max(other.green),
            self.blue.max(other.blue),
        )
    }
}

/// Absolute-difference distance used by the adaptive media sampler.
pub fn colour_distance(a: RgbColour, b: RgbColour) -> f64 {
    (a.red - b.red).abs() + (a.green - b.green).abs() + (a.blue - b.blue).abs()
}

impl Add for RgbColour {
    type Output = RgbColour;
    fn add(self, o: RgbColour) -> RgbColour {
        RgbColour::new(self.red + o.red, self.green + o.green, self.blue + o.blue)
    }
}

impl AddAssign for RgbColour {
    fn add_assign(&mut self, o: RgbColour) {
        *self = *self + o;
    }
}

impl Sub for RgbColour {
    type Output = RgbColour;
    fn sub(self, o: RgbColour) -> RgbColour {
        RgbColour::new(self.red - o.red, self.green - o.green, self.blue - o.blue)
    }
}

impl SubAssign for RgbColour {
    fn sub_assign(&mut self, o: RgbColour) {
        *self = *self - o;
    }
}

impl Mul for RgbColour {
    type Output = RgbColour;
    fn mul(self, o: RgbColour) -> RgbColour {
        RgbColour::new(self.red * o.red, self.green * o.green, self.blue * o.blue)
    }
}

impl MulAssign for RgbColour {
    fn mul_assign(&mut self, o: RgbColour) {
        *self = *self * o;
    }
}

impl Mul<f64> for RgbColour {
    type Output = RgbColour;
    fn mul(self, s: f64) -> RgbColour {
        RgbColour::new(self.red * s, self.green * s, self.blue * s)
    }
}

impl Mul<RgbColour> for f64 {
    type Output = RgbColour;
    fn mul(self, c: RgbColour) -> RgbColour {
        c * self
    }
}

impl MulAssign<f64> for RgbColour {
    fn mul_assign(&mut self, s: f64) {
        *self = *self * s;
    }
}

impl Div<f64> for RgbColour {
    type Output = RgbColour;
    fn div(self, s: f64) -> RgbColour {
        RgbColour::new(self.red / s, self.green / s, self.blue / s)
    }
}

impl DivAssign<f64> for RgbColour {
    fn div_assign(&mut self, s: f64) {
        *self = *self / s;
    }
}

impl Neg for RgbColour {
    type Output = RgbColour;
    fn neg(self) -> RgbColour {
        RgbColour::new(-self.red, -self.green, -self.blue)
    }
}

/// An RGB colour with the two classic transparency channels: `filter`
/// (light passing through picks up the colour) and `transmit` (light passes
/// unchanged).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransColour {
    pub colour: RgbColour,
    pub filter: f64,
    pub transmit: f64,
}

impl TransColour {
    pub fn new(colour: RgbColour, filter: f64, transmit: f64) -> TransColour {
        TransColour {
            colour,
            filter,
            transmit,
        }
    }

    pub fn opaque(colour: RgbColour) -> TransColour {
        TransColour::new(colour, 0.0, 0.0)
    }

    pub const CLEAR: TransColour = TransColour {
        colour: RgbColour::BLACK,
        filter: 0.0,
        transmit: 1.0,
    };

    pub fn opacity(&self) -> f64 {
        1.0 - self.filter - self.transmit
    }

    /// The attenuation a shadow ray suffers passing through a surface of
    /// this colour: transmitted light plus filtered light tinted by the
    /// surface.
    pub fn shadow_attenuation(&self) -> RgbColour {
        RgbColour::splat(self.transmit) + self.colour * self.filter
    }

    /// Linear blend, used by colour blend maps.
    pub fn lerp(&self, other: &TransColour, t: f64) -> TransColour {
        TransColour {
            colour: self.colour * (1.0 - t) + other.colour * t,
            filter: self.filter * (1.0 - t) + other.filter * t,
            transmit: self.transmit * (1.0 - t) + other.transmit * t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = RgbColour::new(0.25, 0.5, 1.0);
        let b = RgbColour::new(0.75, 0.5, 0.0);
        assert_eq!(a + b, RgbColour::WHITE);
        assert_eq!(a * 2.0, RgbColour::new(0.5, 1.0, 2.0));
        assert_eq!(a * b, RgbColour::new(0.1875, 0.25, 0.0));
    }

    #[test]
    fn near_zero() {
        assert!(RgbColour::BLACK.is_zero());
        assert!(RgbColour::splat(1.0e-7).is_near_zero(1.0e-6));
        assert!(!RgbColour::splat(1.0e-5).is_near_zero(1.0e-6));
    }

    #[test]
    fn exp_is_componentwise() {
        let od = RgbColour::new(0.0, 1.0, 2.0);
        let e = (-od).exp();
        assert_eq!(e.red, 1.0);
        assert!((e.green - (-1.0f64).exp()).abs() < 1.0e-15);
        assert!((e.blue - (-2.0f64).exp()).abs() < 1.0e-15);
    }

    #[test]
    fn distance() {
        let a = RgbColour::new(0.0, 0.5, 1.0);
        let b = RgbColour::new(0.5, 0.5, 0.5);
        assert!((colour_distance(a, b) - 1.0).abs() < 1.0e-15);
    }

    #[test]
    fn trans_lerp_endpoints() {
        let a = TransColour::opaque(RgbColour::BLACK);
        let b = TransColour::new(RgbColour::WHITE, 0.5, 0.25);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
    }
}
