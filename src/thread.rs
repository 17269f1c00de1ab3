#![allow(dead_code)]

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::istack::IStackPool;
use crate::math::Vector3;
use crate::pattern::crackle::{CrackleCacheEntry, CrackleCellCoord};
use crate::stats::RenderStatistics;

const JITTER_SEQUENCE_LEN: usize = 32768;

/// A cyclic sequence of pre-generated uniform doubles.
///
/// Media sampling draws its jitter from this rather than a live RNG so that
/// a trace is reproducible: positioning the cursor from the ticket's stream
/// index makes repeated traces of the same ray identical.
#[derive(Debug, Clone)]
pub struct RandomDoubleSequence {
    values: Vec<f64>,
    cursor: usize,
}

impl RandomDoubleSequence {
    pub fn new(seed: u64) -> RandomDoubleSequence {
        let mut rng = SmallRng::seed_from_u64(seed);
        let values = (0..JITTER_SEQUENCE_LEN).map(|_| rng.gen::<f64>()).collect();
        RandomDoubleSequence { values, cursor: 0 }
    }

    #[inline]
    pub fn next(&mut self) -> f64 {
        let v = self.values[self.cursor];
        self.cursor = (self.cursor + 1) % self.values.len();
        v
    }

    /// Positions the cursor for the given per-ray stream.
    pub fn position_stream(&mut self, stream_index: u32) {
        // A prime stride scatters neighbouring streams across the table.
        self.cursor = (stream_index as usize).wrapping_mul(97) % self.values.len();
    }
}

/// One-entry isosurface root cache: remembers the last ray segment tested
/// against an isosurface and the minimum function value seen on it, so a
/// shorter co-linear segment can skip the root search entirely.
///
/// Keyed by the owning object's identity *and* the explicit segment
/// endpoints, so a stale identity match cannot validate a different
/// segment.
#[derive(Debug, Clone)]
pub struct IsosurfaceCache {
    pub current: Option<usize>,
    pub pglobal: Vector3,
    pub dglobal: Vector3,
    pub fmax: f64,
}

impl IsosurfaceCache {
    fn new() -> IsosurfaceCache {
        IsosurfaceCache {
            current: None,
            pglobal: Vector3::new(0.0, 0.0, 0.0),
            dglobal: Vector3::new(0.0, 0.0, 0.0),
            fmax: 0.0,
        }
    }
}

/// Mutable per-thread scratch: statistics, pools and caches. One per
/// rendering thread, owned exclusively for the thread's lifetime; nothing
/// in here is shared.
///
/// The lifetime is that of the scene: pooled intersection records borrow
/// scene objects.
pub struct TraceThreadData<'a> {
    pub stats: RenderStatistics,
    pub stack_pool: IStackPool<'a>,

    pub crackle_cache: HashMap<CrackleCellCoord, CrackleCacheEntry>,
    progress_index: u64,

    pub iso_cache: IsosurfaceCache,

    /// Per-function VM contexts, created lazily on first use. Keyed by the
    /// function's shared-allocation identity.
    pub fn_contexts: HashMap<usize, fn_vm::FnContext>,

    pub rands: RandomDoubleSequence,

    /// Set by the media sampler while processing a lit sample; read by the
    /// shadow-colour path to decide photon handling.
    pub lit_object_ignores_photons: bool,
}

impl<'a> TraceThreadData<'a> {
    pub fn new(seed: u64) -> TraceThreadData<'a> {
        TraceThreadData {
            stats: RenderStatistics::new(),
            stack_pool: IStackPool::new(),
            crackle_cache: HashMap::new(),
            progress_index: 0,
            iso_cache: IsosurfaceCache::new(),
            fn_contexts: HashMap::new(),
            rands: RandomDoubleSequence::new(seed),
            lit_object_ignores_photons: false,
        }
    }

    /// Monotone counter used as the crackle cache's LRU timestamp; the
    /// driver bumps it once per work unit.
    pub fn progress_index(&self) -> u64 {
        self.progress_index
    }

    pub fn advance_progress(&mut self) {
        self.progress_index += 1;
    }

    /// The VM context for a function, creating it on first use.
    pub fn fn_context(&mut self, fn_id: usize) -> &mut fn_vm::FnContext {
        self.fn_contexts
            .entry(fn_id)
            .or_insert_with(fn_vm::FnContext::new)
    }
}

impl<'a> std::fmt::Debug for TraceThreadData<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TraceThreadData")
            .field("progress_index", &self.progress_index)
            .field("crackle_cache_len", &self.crackle_cache.len())
            .finish()
    }
}
