#![allow(dead_code)]

//! Solid noise: the three selectable generators plus turbulence.
//!
//! Generator 1 is the classic gradient noise inherited from the earliest
//! renderer versions; generator 2 (the default) is the same lattice noise
//! with its output range corrected to cover [0,1]; generator 3 is the
//! "improved noise" variant with the better gradient distribution. SIMD
//! kernels are external accelerators; this scalar path is the portable
//! implementation everything falls back to.
//!
//! The hash permutation and gradient tables are built once at startup from
//! a fixed seed, so results are deterministic across runs and threads.

use lazy_static::lazy_static;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::math::Vector3;

const NOISE_MINX: i32 = -10000;
const NOISE_MINY: i32 = -10000;
const NOISE_MINZ: i32 = -10000;

const HASH_SIZE: usize = 4096;
const RTABLE_SIZE: usize = 267;

const TABLE_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NoiseGen {
    /// The original generator with its slight range bias.
    Original = 1,
    /// Range-corrected output, the default.
    RangeCorrected = 2,
    /// The improved-distribution variant.
    Perlin = 3,
}

impl Default for NoiseGen {
    fn default() -> NoiseGen {
        NoiseGen::RangeCorrected
    }
}

struct NoiseTables {
    hash: [u16; HASH_SIZE],
    rtable: [f64; RTABLE_SIZE],
    /// Permutation for the improved-noise generator, doubled to avoid
    /// masking on the second lookup.
    perm: [u8; 512],
}

impl NoiseTables {
    fn build() -> NoiseTables {
        let mut rng = SmallRng::seed_from_u64(TABLE_SEED);

        let mut hash = [0u16; HASH_SIZE];
        for (i, h) in hash.iter_mut().enumerate() {
            *h = i as u16;
        }
        for i in (0..HASH_SIZE).rev() {
            let j = (rng.gen::<u32>() as usize) % HASH_SIZE;
            hash.swap(i, j);
        }

        let mut rtable = [0.0f64; RTABLE_SIZE];
        for r in rtable.iter_mut() {
            *r = rng.gen::<f64>() * 2.0 - 1.0;
        }

        let mut perm = [0u8; 512];
        let mut p = [0u8; 256];
        for (i, v) in p.iter_mut().enumerate() {
            *v = i as u8;
        }
        for i in (0..256).rev() {
            let j = (rng.gen::<u32>() as usize) % 256;
            p.swap(i, j);
        }
        for i in 0..512 {
            perm[i] = p[i & 255];
        }

        NoiseTables {
            hash,
            rtable,
            perm,
        }
    }

    #[inline]
    fn hash1(&self, a: i32) -> i32 {
        i32::from(self.hash[(a & 0xfff) as usize])
    }

    #[inline]
    fn hash2d(&self, a: i32, b: i32) -> i32 {
        i32::from(self.hash[((self.hash1(a) ^ (b & 0xfff)) & 0xfff) as usize])
    }

    /// Index of a gradient group for a lattice corner.
    #[inline]
    fn rtable_index(&self, a: i32, b: i32) -> usize {
        (i32::from(self.hash[((a ^ b) & 0xfff) as usize]) & 0xff) as usize
    }
}

lazy_static! {
    static ref TABLES: NoiseTables = NoiseTables::build();
}

/// Lattice cell of one coordinate: integer part (floor), masked index and
/// the in-cell fractions.
#[inline]
fn setup_coordinate(v: f64, noise_min: i32) -> (i32, f64, f64) {
    let tmp = if v >= 0.0 {
        v as i64
    } else {
        (v - (1.0 - crate::math::EPSILON)) as i64
    };
    let idx = ((tmp as i32) - noise_min) & 0xfff;
    let fract = v - tmp as f64;
    (idx, fract, fract - 1.0)
}

#[inline]
fn s_curve(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// One corner's gradient contribution: the group of four table entries is
/// dotted with (0.5, dx, dy, dz) and weighted.
#[inline]
fn incrsump(rtable: &[f64; RTABLE_SIZE], idx: usize, s: f64, x: f64, y: f64, z: f64) -> f64 {
    s * (rtable[idx] * 0.5 + rtable[idx + 1] * x + rtable[idx + 2] * y + rtable[idx + 3] * z)
}

/// Scalar noise in [0, 1].
pub fn noise(point: Vector3, generator: NoiseGen) -> f64 {
    let tables: &NoiseTables = &TABLES;

    if generator == NoiseGen::Perlin {
        // The scale factors correct for bias in the gradient distribution;
        // the result strays below 0 and above 1 by about 5e-4 and is
        // clamped.
        let mut sum = 0.5 * (1.59 * solid_noise(point) + 0.985);
        if sum < 0.0 {
            sum = 0.0;
        }
        if sum > 1.0 {
            sum = 1.0;
        }
        return sum;
    }

    let (ix, x_ix, x_jx) = setup_coordinate(point.x, NOISE_MINX);
    let (iy, y_iy, y_jy) = setup_coordinate(point.y, NOISE_MINY);
    let (iz, z_iz, z_jz) = setup_coordinate(point.z, NOISE_MINZ);

    let sx = s_curve(x_ix);
    let sy = s_curve(y_iy);
    let sz = s_curve(z_iz);
    let tx = 1.0 - sx;
    let ty = 1.0 - sy;
    let tz = 1.0 - sz;

    let ixiy = tables.hash2d(ix, iy);
    let jxiy = tables.hash2d(ix + 1, iy);
    let ixjy = tables.hash2d(ix, iy + 1);
    let jxjy = tables.hash2d(ix + 1, iy + 1);

    let r = &tables.rtable;
    let mut sum = 0.0;
    sum += incrsump(r, tables.rtable_index(ixiy, iz), tx * ty * tz, x_ix, y_iy, z_iz);
    sum += incrsump(r, tables.rtable_index(jxiy, iz), sx * ty * tz, x_jx, y_iy, z_iz);
    sum += incrsump(r, tables.rtable_index(ixjy, iz), tx * sy * tz, x_ix, y_jy, z_iz);
    sum += incrsump(r, tables.rtable_index(jxjy, iz), sx * sy * tz, x_jx, y_jy, z_iz);
    sum += incrsump(r, tables.rtable_index(ixiy, iz + 1), tx * ty * sz, x_ix, y_iy, z_jz);
    sum += incrsump(r, tables.rtable_index(jxiy, iz + 1), sx * ty * sz, x_jx, y_iy, z_jz);
    sum += incrsump(r, tables.rtable_index(ixjy, iz + 1), tx * sy * sz, x_ix, y_jy, z_jz);
    sum += incrsump(r, tables.rtable_index(jxjy, iz + 1), sx * sy * sz, x_jx, y_jy, z_jz);

    let mut sum = match generator {
        NoiseGen::RangeCorrected => (sum + 1.05242) * 0.48985582,
        _ => sum + 0.5,
    };
    if sum < 0.0 {
        sum = 0.0;
    }
    if sum > 1.0 {
        sum = 1.0;
    }
    sum
}

/// Vector-valued noise; each component in roughly [-0.5, 0.5] around zero
/// after the 0.5 recentering below.
pub fn dnoise(point: Vector3) -> Vector3 {
    let tables: &NoiseTables = &TABLES;

    let (ix, x_ix, x_jx) = setup_coordinate(point.x, NOISE_MINX);
    let (iy, y_iy, y_jy) = setup_coordinate(point.y, NOISE_MINY);
    let (iz, z_iz, z_jz) = setup_coordinate(point.z, NOISE_MINZ);

    let sx = s_curve(x_ix);
    let sy = s_curve(y_iy);
    let sz = s_curve(z_iz);
    let tx = 1.0 - sx;
    let ty = 1.0 - sy;
    let tz = 1.0 - sz;

    let ixiy = tables.hash2d(ix, iy);
    let jxiy = tables.hash2d(ix + 1, iy);
    let ixjy = tables.hash2d(ix, iy + 1);
    let jxjy = tables.hash2d(ix + 1, iy + 1);

    let r = &tables.rtable;
    let mut result = Vector3::new(0.0, 0.0, 0.0);

    let corners: [(i32, f64, f64, f64, f64); 8] = [
        (ixiy, tx * ty * tz, x_ix, y_iy, z_iz),
        (jxiy, sx * ty * tz, x_jx, y_iy, z_iz),
        (ixjy, tx * sy * tz, x_ix, y_jy, z_iz),
        (jxjy, sx * sy * tz, x_jx, y_jy, z_iz),
        (ixiy, tx * ty * sz, x_ix, y_iy, z_jz),
        (jxiy, sx * ty * sz, x_jx, y_iy, z_jz),
        (ixjy, tx * sy * sz, x_ix, y_jy, z_jz),
        (jxjy, sx * sy * sz, x_jx, y_jy, z_jz),
    ];

    for (i, &(hash, s, px, py, pz)) in corners.iter().enumerate() {
        let zoff = if i < 4 { iz } else { iz + 1 };
        let idx = tables.rtable_index(hash, zoff);
        result.x += incrsump(r, idx, s, px, py, pz);
        result.y += incrsump(r, idx + 4, s, px, py, pz);
        result.z += incrsump(r, idx + 8, s, px, py, pz);
    }

    result
}

/// The improved-distribution generator: classic hashed-gradient noise over
/// the unit lattice with quintic fade, range about [-1, 1].
pub fn solid_noise(point: Vector3) -> f64 {
    let tables: &NoiseTables = &TABLES;
    let perm = &tables.perm;

    let xf = point.x.floor();
    let yf = point.y.floor();
    let zf = point.z.floor();
    let xi = (xf as i64 & 255) as usize;
    let yi = (yf as i64 & 255) as usize;
    let zi = (zf as i64 & 255) as usize;
    let x = point.x - xf;
    let y = point.y - yf;
    let z = point.z - zf;

    let u = fade(x);
    let v = fade(y);
    let w = fade(z);

    let a = perm[xi] as usize + yi;
    let aa = perm[a] as usize + zi;
    let ab = perm[a + 1] as usize + zi;
    let b = perm[xi + 1] as usize + yi;
    let ba = perm[b] as usize + zi;
    let bb = perm[b + 1] as usize + zi;

    lerp(
        w,
        lerp(
            v,
            lerp(u, grad(perm[aa], x, y, z), grad(perm[ba], x - 1.0, y, z)),
            lerp(
                u,
                grad(perm[ab], x, y - 1.0, z),
                grad(perm[bb], x - 1.0, y - 1.0, z),
            ),
        ),
        lerp(
            v,
            lerp(
                u,
                grad(perm[aa + 1], x, y, z - 1.0),
                grad(perm[ba + 1], x - 1.0, y, z - 1.0),
            ),
            lerp(
                u,
                grad(perm[ab + 1], x, y - 1.0, z - 1.0),
                grad(perm[bb + 1], x - 1.0, y - 1.0, z - 1.0),
            ),
        ),
    )
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

/// Classical turbulence parameters carried by a turbulence warp.
#[derive(Debug, Clone, PartialEq)]
pub struct Turb {
    pub turbulence: Vector3,
    pub octaves: u32,
    pub lambda: f64,
    pub omega: f64,
}

impl Default for Turb {
    fn default() -> Turb {
        Turb {
            turbulence: Vector3::new(0.0, 0.0, 0.0),
            octaves: 6,
            lambda: 2.0,
            omega: 0.5,
        }
    }
}

/// Scalar fractal turbulence: octaves of noise, each scaled by lambda in
/// frequency and omega in amplitude.
pub fn turbulence(point: Vector3, turb: &Turb, generator: NoiseGen) -> f64 {
    let clipped = |v: f64| crate::math::clamp(v, 0.0, 1.0);

    let mut value = if generator as i32 > 1 {
        clipped(2.0 * noise(point, generator) - 0.5)
    } else {
        noise(point, generator)
    };

    let mut l = turb.lambda;
    let mut o = turb.omega.abs();

    for i in 2..=turb.octaves {
        let temp = point * l;
        if generator as i32 > 1 {
            value += o * clipped(2.0 * noise(temp, generator) - 0.5);
        } else {
            value += o * noise(temp, generator);
        }
        if i < turb.octaves {
            l *= turb.lambda;
            o *= turb.omega;
        }
    }

    value
}

/// Vector turbulence used for coordinate displacement.
pub fn dturbulence(point: Vector3, turb: &Turb) -> Vector3 {
    let mut value = dnoise(point);

    let mut l = turb.lambda;
    let mut o = turb.omega.abs();

    for i in 2..=turb.octaves {
        let temp = point * l;
        value += o * dnoise(temp);
        if i < turb.octaves {
            l *= turb.lambda;
            o *= turb.omega;
        }
    }

    value
}

/// sin through one cycle per unit.
pub fn cycloidal(value: f64) -> f64 {
    if value >= 0.0 {
        (value * 2.0 * std::f64::consts::PI).sin()
    } else {
        -((-value) * 2.0 * std::f64::consts::PI).sin()
    }
}

/// 0-1-0 triangle through one cycle per unit.
pub fn triangle_wave(value: f64) -> f64 {
    if value >= 0.0 {
        let offset = value - value.floor();
        if offset >= 0.5 {
            2.0 * (1.0 - offset)
        } else {
            2.0 * offset
        }
    } else {
        triangle_wave(-value)
    }
}


/// Three-coordinate lattice hash shared with the crackle cell generator.
pub(crate) fn hash3d(a: i32, b: i32, c: i32) -> i32 {
    let tables: &NoiseTables = &TABLES;
    let h1 = tables.hash1(a);
    let h2 = i32::from(tables.hash[((h1 ^ (b & 0xfff)) & 0xfff) as usize]);
    i32::from(tables.hash[((h2 ^ (c & 0xfff)) & 0xfff) as usize])
}
