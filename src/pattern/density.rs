#![allow(dead_code)]

//! Density files: binary 3-D voxel grids driving media density patterns.
//!
//! The format is six bytes of big-endian `(sx, sy, sz)` u16 header,
//! followed by `sx*sy*sz` samples of 1, 2 or 4 bytes each (big-endian
//! unsigned), with the sample width auto-detected from the file size.
//! Samples normalise to [0, 1]; the pattern evaluates only inside the unit
//! cube and is zero elsewhere.

use std::io::Read;
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::math::Vector3;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interpolation {
    None,
    Trilinear,
    Tricubic,
}

#[derive(Debug)]
enum Samples {
    Bits8(Vec<u8>),
    Bits16(Vec<u16>),
    Bits32(Vec<u32>),
}

/// The voxel grid. Shared by reference between pattern copies; immutable
/// after load.
#[derive(Debug)]
pub struct DensityGrid {
    sx: usize,
    sy: usize,
    sz: usize,
    samples: Samples,
}

#[derive(Debug, Clone)]
pub struct DensityFilePattern {
    pub grid: Arc<DensityGrid>,
    pub interpolation: Interpolation,
}

impl DensityGrid {
    /// Reads the grid from a byte stream. Malformed sizes are fatal.
    pub fn read<R: Read>(mut input: R) -> RenderResult<DensityGrid> {
        let mut header = [0u8; 6];
        input.read_exact(&mut header)?;
        let sx = u16::from_be_bytes([header[0], header[1]]) as usize;
        let sy = u16::from_be_bytes([header[2], header[3]]) as usize;
        let sz = u16::from_be_bytes([header[4], header[5]]) as usize;

        let mut body = Vec::new();
        input.read_to_end(&mut body)?;
        let count = sx
            .checked_mul(sy)
            .and_then(|v| v.checked_mul(sz))
            .ok_or_else(|| RenderError::InvalidDensityFile("size overflow".into()))?;
        if count == 0 {
            return Err(RenderError::InvalidDensityFile("empty grid".into()));
        }

        let samples = if body.len() == count * 4 {
            let mut v = Vec::with_capacity(count);
            for chunk in body.chunks_exact(4) {
                v.push(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            }
            Samples::Bits32(v)
        } else if body.len() == count * 2 {
            let mut v = Vec::with_capacity(count);
            for chunk in body.chunks_exact(2) {
                v.push(u16::from_be_bytes([chunk[0], chunk[1]]));
            }
            Samples::Bits16(v)
        } else if body.len() == count {
            Samples::Bits8(body)
        } else {
            return Err(RenderError::InvalidDensityFile(format!(
                "{} data bytes do not match {}x{}x{} voxels of any sample width",
                body.len(),
                sx,
                sy,
                sz
            )));
        };

        Ok(DensityGrid {
            sx,
            sy,
            sz,
            samples,
        })
    }

    /// Builds a grid directly from normalised f64 voxels (16-bit storage);
    /// convenient for programmatic grids and tests.
    pub fn from_voxels(sx: usize, sy: usize, sz: usize, voxels: &[f64]) -> DensityGrid {
        assert_eq!(voxels.len(), sx * sy * sz);
        let data = voxels
            .iter()
            .map(|v| (crate::math::clamp(*v, 0.0, 1.0) * f64::from(u16::MAX)) as u16)
            .collect();
        DensityGrid {
            sx,
            sy,
            sz,
            samples: Samples::Bits16(data),
        }
    }

    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.sx, self.sy, self.sz)
    }

    /// Normalised voxel value at integer coordinates (no wrapping).
    fn voxel(&self, x: usize, y: usize, z: usize) -> f64 {
        let idx = z * self.sy * self.sx + y * self.sx + x;
        match self.samples {
            Samples::Bits8(ref v) => f64::from(v[idx]) / f64::from(u8::MAX),
            Samples::Bits16(ref v) => f64::from(v[idx]) / f64::from(u16::MAX),
            Samples::Bits32(ref v) => f64::from(v[idx]) / f64::from(u32::MAX),
        }
    }

    /// Voxel with cyclic index handling, used by the interpolators.
    fn voxel_wrapped(&self, x: isize, y: isize, z: isize) -> f64 {
        let wrap = |i: isize, max: usize| -> usize {
            if i < 0 {
                max - 1
            } else {
                (i as usize) % max
            }
        };
        self.voxel(wrap(x, self.sx), wrap(y, self.sy), wrap(z, self.sz))
    }
}

/// Catmull-Rom cubic through four samples.
fn intp3(t: f64, fa: f64, fb: f64, fc: f64, fd: f64) -> f64 {
    let b = (fc - fa) * 0.5;
    let d = (fd - fb) * 0.5;
    let e = 2.0 * (fb - fc) + b + d;
    let f = -3.0 * (fb - fc) - 2.0 * b - d;
    ((e * t + f) * t + b) * t + fb
}

pub fn density_pattern(point: Vector3, pattern: &DensityFilePattern) -> f64 {
    let grid = &*pattern.grid;
    let (sx, sy, sz) = grid.dimensions();

    let (ex, ey, ez) = (point.x, point.y, point.z);
    if !(ex >= 0.0 && ex < 1.0 && ey >= 0.0 && ey < 1.0 && ez >= 0.0 && ez < 1.0) {
        return 0.0;
    }

    let density = match pattern.interpolation {
        Interpolation::None => {
            let x = (ex * sx as f64) as usize;
            let y = (ey * sy as f64) as usize;
            let z = (ez * sz as f64) as usize;
            if x >= sx || y >= sy || z >= sz {
                0.0
            } else {
                grid.voxel(x, y, z)
            }
        }
        Interpolation::Trilinear => {
            let xx = ex * sx as f64;
            let yy = ey * sy as f64;
            let zz = ez * sz as f64;

            let x1 = xx as usize;
            let y1 = yy as usize;
            let z1 = zz as usize;
            let x2 = (x1 + 1) % sx;
            let y2 = (y1 + 1) % sy;
            let z2 = (z1 + 1) % sz;

            let xx = xx - xx.floor();
            let yy = yy - yy.floor();
            let zz = zz - zz.floor();
            let xi = 1.0 - xx;
            let yi = 1.0 - yy;

            let f111 = grid.voxel(x1, y1, z1);
            let f112 = grid.voxel(x2, y1, z1);
            let f121 = grid.voxel(x1, y2, z1);
            let f122 = grid.voxel(x2, y2, z1);
            let f211 = grid.voxel(x1, y1, z2);
            let f212 = grid.voxel(x2, y1, z2);
            let f221 = grid.voxel(x1, y2, z2);
            let f222 = grid.voxel(x2, y2, z2);

            ((f111 * xi + f112 * xx) * yi + (f121 * xi + f122 * xx) * yy) * (1.0 - zz)
                + ((f211 * xi + f212 * xx) * yi + (f221 * xi + f222 * xx) * yy) * zz
        }
        Interpolation::Tricubic => {
            let xx = ex * sx as f64;
            let yy = ey * sy as f64;
            let zz = ez * sz as f64;

            let x1 = xx as isize;
            let y1 = yy as isize;
            let z1 = zz as isize;

            let xx = xx - xx.floor();
            let yy = yy - yy.floor();
            let zz = zz - zz.floor();

            // Interpolate along z for the 4x4 neighbourhood, then fold the
            // remaining two axes.
            let mut plane = [[0.0f64; 4]; 4];
            for (i, row) in plane.iter_mut().enumerate() {
                let ii = x1 + i as isize - 1;
                for (j, cell) in row.iter_mut().enumerate() {
                    let jj = y1 + j as isize - 1;
                    *cell = intp3(
                        zz,
                        grid.voxel_wrapped(ii, jj, z1 - 1),
                        grid.voxel_wrapped(ii, jj, z1),
                        grid.voxel_wrapped(ii, jj, z1 + 1),
                        grid.voxel_wrapped(ii, jj, z1 + 2),
                    );
                }
            }

            let mut line = [0.0f64; 4];
            for (i, v) in line.iter_mut().enumerate() {
                *v = intp3(yy, plane[i][0], plane[i][1], plane[i][2], plane[i][3]);
            }

            intp3(xx, line[0], line[1], line[2], line[3])
        }
    };

    density.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_grid_8bit() -> Vec<u8> {
        // 2x2x2, 8-bit samples 0..=7 scaled.
        let mut bytes = vec![0, 2, 0, 2, 0, 2];
        bytes.extend((0..8u8).map(|i| i * 32));
        bytes
    }

    #[test]
    fn reads_8bit_grid() {
        let grid = DensityGrid::read(&encoded_grid_8bit()[..]).unwrap();
        assert_eq!(grid.dimensions(), (2, 2, 2));
        assert_eq!(grid.voxel(0, 0, 0), 0.0);
        assert!((grid.voxel(1, 1, 1) - 224.0 / 255.0).abs() < 1.0e-12);
    }

    #[test]
    fn sample_width_autodetected_by_size() {
        // Same header, 16 bytes of data -> 16-bit.
        let mut bytes = vec![0, 2, 0, 2, 0, 2];
        bytes.extend(std::iter::repeat(0xffu8).take(16));
        let grid = DensityGrid::read(&bytes[..]).unwrap();
        match grid.samples {
            Samples::Bits16(_) => {}
            _ => panic!("expected 16-bit samples"),
        }
        assert_eq!(grid.voxel(1, 1, 1), 1.0);
    }

    #[test]
    fn bad_size_is_fatal() {
        let mut bytes = vec![0, 2, 0, 2, 0, 2];
        bytes.extend(std::iter::repeat(0u8).take(11));
        assert!(DensityGrid::read(&bytes[..]).is_err());

        let bytes = vec![0, 0, 0, 0, 0, 0];
        assert!(DensityGrid::read(&bytes[..]).is_err());
    }

    #[test]
    fn big_endian_header() {
        let mut bytes = vec![0, 1, 0, 1, 1, 0]; // 1 x 1 x 256
        bytes.extend(std::iter::repeat(0u8).take(256));
        let grid = DensityGrid::read(&bytes[..]).unwrap();
        assert_eq!(grid.dimensions(), (1, 1, 256));
    }

    #[test]
    fn outside_unit_cube_is_zero() {
        let grid = Arc::new(DensityGrid::from_voxels(2, 2, 2, &[1.0; 8]));
        let pattern = DensityFilePattern {
            grid,
            interpolation: Interpolation::None,
        };
        assert_eq!(density_pattern(Vector3::new(1.5, 0.5, 0.5), &pattern), 0.0);
        assert_eq!(density_pattern(Vector3::new(-0.1, 0.5, 0.5), &pattern), 0.0);
        assert_eq!(density_pattern(Vector3::new(0.5, 0.5, 0.5), &pattern), 1.0);
    }

    #[test]
    fn trilinear_blends_between_voxels() {
        // Gradient along x: 0 at x-cell 0, 1 at x-cell 1.
        let grid = Arc::new(DensityGrid::from_voxels(
            2,
            2,
            2,
            &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        ));
        let pattern = DensityFilePattern {
            grid,
            interpolation: Interpolation::Trilinear,
        };
        let a = density_pattern(Vector3::new(0.3, 0.3, 0.3), &pattern);
        let b = density_pattern(Vector3::new(0.7, 0.3, 0.3), &pattern);
        assert!(a < b);
        assert!(a >= 0.0 && b <= 1.0);
    }

    #[test]
    fn tricubic_matches_constant_field() {
        let grid = Arc::new(DensityGrid::from_voxels(4, 4, 4, &[0.5; 64]));
        let pattern = DensityFilePattern {
            grid,
            interpolation: Interpolation::Tricubic,
        };
        let v = density_pattern(Vector3::new(0.5, 0.5, 0.5), &pattern);
        assert!((v - 0.5).abs() < 1.0e-6);
    }
}
