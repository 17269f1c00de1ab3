#![allow(dead_code)]

//! The crackle pattern: a 3-D Voronoi field over jittered lattice points.
//!
//! Every integer cell owns one pseudo-random point. For an evaluation
//! point, the three nearest cell points under the configured metric are
//! combined by the `form` weights (or, in solid mode, the nearest point
//! seeds a per-cell constant). A candidate point can only live in a cell
//! within a "3d knight move" (no more than one coordinate at distance 2),
//! giving the fixed 81-cell neighbourhood.

use lazy_static::lazy_static;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::math::{Vector3, EPSILON};
use crate::pattern::noise::{hash3d, noise, NoiseGen};
use crate::thread::TraceThreadData;

/// Per-thread cache memory bound; once exceeded, lookups compute on demand
/// without inserting.
const CACHE_BYTE_LIMIT: usize = 30 * 1024 * 1024;

const RANDS_LEN: usize = 32768;
const RANDS_SEED: u64 = 0x1357_9bdf_2468_ace0;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CrackleCellCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// The 81 perturbed sample points of a cell's neighbourhood, plus an LRU
/// stamp.
#[derive(Debug, Clone)]
pub struct CrackleCacheEntry {
    pub data: [Vector3; 81],
    pub last_used: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrackleParams {
    /// Weights combining the three nearest distances.
    pub form: Vector3,
    /// Lp metric exponent; 1 and 2 take specialised paths.
    pub metric: f64,
    /// Added to all distances before combining.
    pub offset: f64,
    /// Solid mode: one random value per Voronoi cell.
    pub solid: bool,
}

impl Default for CrackleParams {
    fn default() -> CrackleParams {
        CrackleParams {
            form: Vector3::new(-1.0, 1.0, 0.0),
            metric: 2.0,
            offset: 0.0,
            solid: false,
        }
    }
}

lazy_static! {
    /// Cell offsets with |delta| <= 2 and at most one coordinate at
    /// distance 2: the neighbourhood that is guaranteed to contain the two
    /// nearest cell points.
    static ref CRACKLE_CUBE_TABLE: Vec<(i32, i32, i32)> = {
        let mut table = Vec::with_capacity(81);
        for addx in -2i32..=2 {
            for addy in -2i32..=2 {
                for addz in -2i32..=2 {
                    let twos = (addx.abs() == 2) as u32
                        + (addy.abs() == 2) as u32
                        + (addz.abs() == 2) as u32;
                    if twos <= 1 {
                        table.push((addx, addy, addz));
                    }
                }
            }
        }
        debug_assert_eq!(table.len(), 81);
        table
    };

    /// Fixed table of uniform doubles the cell jitter is drawn from.
    static ref PATTERN_RANDS: Vec<f64> = {
        let mut rng = SmallRng::seed_from_u64(RANDS_SEED);
        (0..RANDS_LEN).map(|_| rng.gen::<f64>()).collect()
    };
}

fn pattern_rand(seed: usize) -> f64 {
    PATTERN_RANDS[seed % RANDS_LEN]
}

/// The jittered point of an integer cell. Deterministic in the cell
/// coordinates alone.
pub fn pick_in_cube_int(tvx: i32, tvy: i32, tvz: i32) -> Vector3 {
    let seed = hash3d(tvx & 0xfff, tvy & 0xfff, tvz & 0xfff) as usize;
    Vector3::new(
        tvx as f64 + pattern_rand(seed),
        tvy as f64 + pattern_rand(seed + 1),
        tvz as f64 + pattern_rand(seed + 2),
    )
}

/// Same, keyed by the cell containing an arbitrary point.
pub fn pick_in_cube(tv: Vector3) -> Vector3 {
    let fx = (tv.x - EPSILON).floor();
    let fy = (tv.y - EPSILON).floor();
    let fz = (tv.z - EPSILON).floor();
    let seed = hash3d(fx as i32, fy as i32, fz as i32) as usize;
    Vector3::new(
        fx + pattern_rand(seed),
        fy + pattern_rand(seed + 1),
        fz + pattern_rand(seed + 2),
    )
}

fn metric_distance(dv: Vector3, metric: f64) -> f64 {
    if metric == 2.0 {
        dv.length_squared()
    } else if metric == 1.0 {
        dv.x.abs() + dv.y.abs() + dv.z.abs()
    } else {
        dv.x.abs().powf(metric) + dv.y.abs().powf(metric) + dv.z.abs().powf(metric)
    }
}

pub fn crackle_pattern(
    point: Vector3,
    params: &CrackleParams,
    generator: NoiseGen,
    thread: &mut TraceThreadData<'_>,
) -> f64 {
    let use_square = params.metric == 2.0;
    let use_unity = params.metric == 1.0;

    // floor() rather than a mirror-at-zero variant, so no artefact shows
    // around the origin.
    let flox = (point.x - EPSILON).floor() as i32;
    let floy = (point.y - EPSILON).floor() as i32;
    let floz = (point.z - EPSILON).floor() as i32;

    let coord = CrackleCellCoord {
        x: flox,
        y: floy,
        z: floz,
    };
    thread.stats.bump(crate::stats::Stat::CrackleCacheTests);

    let mut computed: Option<CrackleCacheEntry> = None;
    let progress = thread.progress_index();
    if let Some(hit) = thread.crackle_cache.get_mut(&coord) {
        thread
            .stats
            .bump(crate::stats::Stat::CrackleCacheTestsSucceeded);
        hit.last_used = progress;
    } else {
        let mut data = [Vector3::new(0.0, 0.0, 0.0); 81];
        for (slot, &(dx, dy, dz)) in data.iter_mut().zip(CRACKLE_CUBE_TABLE.iter()) {
            *slot = pick_in_cube_int(flox + dx, floy + dy, floz + dz);
        }
        let fresh = CrackleCacheEntry {
            data,
            last_used: progress,
        };

        // Insert only while the per-thread cache stays within its memory
        // bound; past that, compute without caching.
        let entry_size = std::mem::size_of::<(CrackleCellCoord, CrackleCacheEntry)>();
        if thread.crackle_cache.len() * entry_size < CACHE_BYTE_LIMIT {
            thread.crackle_cache.insert(coord, fresh);
        } else {
            computed = Some(fresh);
        }
    }
    let entry: &CrackleCacheEntry = match computed {
        Some(ref fresh) => fresh,
        None => thread
            .crackle_cache
            .get(&coord)
            .expect("present or just inserted"),
    };

    // Track the three nearest sample points, keeping
    // minsum <= minsum2 <= minsum3.
    let mut min_vec_idx = 0usize;
    let mut minsum = metric_distance(entry.data[0] - point, params.metric);
    let mut minsum2 = metric_distance(entry.data[1] - point, params.metric);
    let mut minsum3 = metric_distance(entry.data[2] - point, params.metric);

    if minsum2 < minsum {
        std::mem::swap(&mut minsum, &mut minsum2);
        min_vec_idx = 1;
    }
    if minsum3 < minsum {
        std::mem::swap(&mut minsum, &mut minsum3);
        min_vec_idx = 2;
    }
    if minsum3 < minsum2 {
        std::mem::swap(&mut minsum2, &mut minsum3);
    }

    for i in 3..81 {
        let sum = metric_distance(entry.data[i] - point, params.metric);
        if sum < minsum {
            minsum3 = minsum2;
            minsum2 = minsum;
            minsum = sum;
            min_vec_idx = i;
        } else if sum < minsum2 {
            minsum3 = minsum2;
            minsum2 = sum;
        } else if sum < minsum3 {
            minsum3 = sum;
        }
    }

    if params.offset != 0.0 {
        let o = if use_square {
            params.offset * params.offset
        } else if use_unity {
            params.offset
        } else {
            params.offset.powf(params.metric)
        };
        minsum += o;
        minsum2 += o;
        minsum3 += o;
    }

    let nearest = entry.data[min_vec_idx];

    let tf = if params.solid {
        noise(nearest, generator)
    } else if use_square {
        params.form.x * minsum.sqrt() + params.form.y * minsum2.sqrt() + params.form.z * minsum3.sqrt()
    } else if use_unity {
        params.form.x * minsum + params.form.y * minsum2 + params.form.z * minsum3
    } else {
        let inv = 1.0 / params.metric;
        params.form.x * minsum.powf(inv)
            + params.form.y * minsum2.powf(inv)
            + params.form.z * minsum3.powf(inv)
    };

    crate::math::clamp(tf, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbourhood_has_81_cells() {
        assert_eq!(CRACKLE_CUBE_TABLE.len(), 81);
        // Knight-move rule: at most one coordinate at distance two.
        for &(x, y, z) in CRACKLE_CUBE_TABLE.iter() {
            let twos = (x.abs() == 2) as u32 + (y.abs() == 2) as u32 + (z.abs() == 2) as u32;
            assert!(twos <= 1);
        }
    }

    #[test]
    fn cell_points_stay_in_their_cell() {
        for &(x, y, z) in &[(0, 0, 0), (5, -3, 2), (-7, -7, 100)] {
            let p = pick_in_cube_int(x, y, z);
            assert!(p.x >= x as f64 && p.x < x as f64 + 1.0);
            assert!(p.y >= y as f64 && p.y < y as f64 + 1.0);
            assert!(p.z >= z as f64 && p.z < z as f64 + 1.0);
        }
    }

    #[test]
    fn deterministic_across_threads_and_order() {
        let params = CrackleParams::default();
        let p = Vector3::new(1.3, 2.7, -0.4);
        let q = Vector3::new(-5.1, 0.2, 8.8);

        let mut t1 = TraceThreadData::new(1);
        let a_p = crackle_pattern(p, &params, NoiseGen::default(), &mut t1);
        let a_q = crackle_pattern(q, &params, NoiseGen::default(), &mut t1);

        // Fresh thread, other evaluation order.
        let mut t2 = TraceThreadData::new(99);
        let b_q = crackle_pattern(q, &params, NoiseGen::default(), &mut t2);
        let b_p = crackle_pattern(p, &params, NoiseGen::default(), &mut t2);

        assert_eq!(a_p, b_p);
        assert_eq!(a_q, b_q);
    }

    #[test]
    fn zero_on_voronoi_sites() {
        // With the default form (-1, 1, 0), the value is the distance gap
        // between the two nearest sites: zero exactly on a site... and at
        // cell walls; on a site the nearest distance is 0.
        let params = CrackleParams::default();
        let mut thread = TraceThreadData::new(0);
        let site = pick_in_cube_int(2, 3, 4);
        let v = crackle_pattern(site, &params, NoiseGen::default(), &mut thread);
        assert!(v > 0.0, "adjacent site distance should dominate");
    }

    #[test]
    fn solid_mode_constant_per_cell() {
        let params = CrackleParams {
            solid: true,
            ..CrackleParams::default()
        };
        let mut thread = TraceThreadData::new(0);

        // Both points nearest to the same site.
        let site = pick_in_cube_int(10, 10, 10);
        let a = crackle_pattern(site + Vector3::splat(0.01), &params, NoiseGen::default(), &mut thread);
        let b = crackle_pattern(site - Vector3::splat(0.01), &params, NoiseGen::default(), &mut thread);
        assert_eq!(a, b);
    }

    #[test]
    fn range_is_clamped() {
        let params = CrackleParams {
            form: Vector3::new(5.0, 5.0, 5.0),
            ..CrackleParams::default()
        };
        let mut thread = TraceThreadData::new(0);
        for i in 0..50 {
            let p = Vector3::new(i as f64 * 0.37, 0.0, 0.0);
            let v = crackle_pattern(p, &params, NoiseGen::default(), &mut thread);
            assert!(v >= 0.0 && v <= 1.0);
        }
    }

    #[test]
    fn cache_is_used_on_revisit() {
        let params = CrackleParams::default();
        let mut thread = TraceThreadData::new(0);
        let p = Vector3::new(0.5, 0.5, 0.5);
        crackle_pattern(p, &params, NoiseGen::default(), &mut thread);
        let hits_before = thread.stats.get(crate::stats::Stat::CrackleCacheTestsSucceeded);
        crackle_pattern(p + Vector3::splat(0.1), &params, NoiseGen::default(), &mut thread);
        assert!(thread.stats.get(crate::stats::Stat::CrackleCacheTestsSucceeded) > hits_before);
    }
}
