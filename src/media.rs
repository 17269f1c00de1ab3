#![allow(dead_code)]

//! Participating media: the sample-based solver for the emission /
//! extinction / in-scattering integral along a ray segment.
//!
//! The segment is first partitioned into lit and unlit spans from the
//! lights that interact with media, sample intervals are distributed over
//! the spans by the configured ratio, and each interval is integrated by
//! one of three strategies: jittered uniform sampling with a
//! variance-driven top-up, stratified sampling, or recursive adaptive
//! subdivision with incremental attenuation.

use crate::colour::{colour_distance, RgbColour};
use crate::lights::{LightSource, LightType};
use crate::math::chi2::chdtri;
use crate::math::{Vector3, EPSILON, MAX_DISTANCE, SMALL_TOLERANCE};
use crate::photons::{PhotonGatherer, PhotonMap};
use crate::ray::Ray;
use crate::stats::Stat;
use crate::texture::{evaluate_density_pigments, Pigment, PigmentMap};
use crate::thread::TraceThreadData;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ScatteringType {
    Isotropic,
    Rayleigh,
    MieHazy,
    MieMurky,
    HenyeyGreenstein,
}

/// Sampling strategy selector.
pub const SAMPLE_METHOD_UNIFORM: u8 = 1;
pub const SAMPLE_METHOD_STRATIFIED: u8 = 2;
pub const SAMPLE_METHOD_ADAPTIVE: u8 = 3;

#[derive(Debug, Clone)]
pub struct Media {
    pub scattering_type: ScatteringType,
    pub intervals: u32,
    pub min_samples: u32,
    pub max_samples: u32,
    pub sample_method: u8,
    pub eccentricity: f64,

    pub absorption: RgbColour,
    pub emission: RgbColour,
    pub extinction: RgbColour,
    pub scattering: RgbColour,

    pub is_constant: bool,
    pub use_absorption: bool,
    pub use_emission: bool,
    pub use_extinction: bool,
    pub use_scattering: bool,

    pub ignore_photons: bool,

    /// Scattering-to-extinction scale.
    pub sc_ext: f64,
    /// Lit : unlit interval weighting.
    pub ratio: f64,
    pub confidence: f64,
    pub variance: f64,
    pub jitter: f64,

    pub aa_threshold: f64,
    pub aa_level: u32,

    pub density: Vec<Pigment>,

    sample_threshold: Vec<f64>,
}

impl Default for Media {
    fn default() -> Media {
        Media {
            scattering_type: ScatteringType::Isotropic,
            intervals: 10,
            min_samples: 1,
            max_samples: 1,
            sample_method: SAMPLE_METHOD_UNIFORM,
            eccentricity: 0.0,
            absorption: RgbColour::BLACK,
            emission: RgbColour::BLACK,
            extinction: RgbColour::BLACK,
            scattering: RgbColour::BLACK,
            is_constant: false,
            use_absorption: false,
            use_emission: false,
            use_extinction: false,
            use_scattering: false,
            ignore_photons: false,
            sc_ext: 1.0,
            ratio: 0.9,
            confidence: 0.9,
            variance: 1.0 / 128.0,
            jitter: 0.0,
            aa_threshold: 0.1,
            aa_level: 3,
            density: Vec::new(),
            sample_threshold: Vec::new(),
        }
    }
}

impl Media {
    pub fn new() -> Media {
        Media::default()
    }

    /// Called once after parsing: derives extinction, the usage flags and
    /// the chi-square variance-threshold table.
    pub fn post_process(&mut self) {
        if self.max_samples > 1 && self.min_samples > self.max_samples {
            log::warn!(
                "media min_samples ({}) exceeds max_samples ({}); the variance test will never run",
                self.min_samples,
                self.max_samples
            );
        }

        self.extinction = self.absorption + self.scattering * self.sc_ext;

        self.is_constant = self.density.is_empty();
        self.use_absorption = !self.absorption.is_zero();
        self.use_emission = !self.emission.is_zero();
        self.use_scattering = !self.scattering.is_zero();
        self.use_extinction = self.use_absorption || self.use_scattering;

        self.sample_threshold = vec![0.0; self.max_samples.max(1) as usize];
        if self.max_samples > 1 {
            let mut t = chdtri((self.max_samples - 1) as f64, self.confidence);
            if t > 0.0 {
                t = self.variance / t;
            } else {
                t = self.variance * EPSILON;
            }
            for i in 0..self.max_samples as usize {
                self.sample_threshold[i] = t * chdtri((i + 1) as f64, self.confidence);
            }
        }
    }

    pub fn transform(&mut self, trans: &crate::math::Transform) {
        for pigment in self.density.iter_mut() {
            pigment.pattern.transform(trans);
        }
    }

    fn all_density_plain(&self) -> bool {
        self.density
            .iter()
            .all(|p| matches!(p.map, PigmentMap::Solid(_)))
    }
}

/// Shadow testing abstraction so the integrator can ask the tracer whether
/// a light reaches a media sample point. `None` means fully occluded;
/// otherwise the direction toward the light and the (possibly attenuated)
/// light colour arriving at the point.
pub trait ShadowTester<'a> {
    fn test_shadow(
        &self,
        light: &LightSource,
        point: Vector3,
        thread: &mut TraceThreadData<'a>,
    ) -> Option<(Vector3, RgbColour)>;
}

/// Shadow tester for contexts with no geometry in play: every light
/// reaches every point at its beam colour.
pub struct UnoccludedShadows;

impl<'a> ShadowTester<'a> for UnoccludedShadows {
    fn test_shadow(
        &self,
        light: &LightSource,
        point: Vector3,
        _thread: &mut TraceThreadData<'a>,
    ) -> Option<(Vector3, RgbColour)> {
        let (direction, _, colour) = light.colour_at(point);
        if colour.is_zero() {
            None
        } else {
            Some((direction, colour))
        }
    }
}

struct LightSourceEntry<'a> {
    light: &'a LightSource,
    s0: f64,
    s1: f64,
}

#[derive(Debug, Copy, Clone)]
struct LitInterval {
    lit: bool,
    s0: f64,
    s1: f64,
    ds: f64,
    l0: usize,
    l1: usize,
}

#[derive(Debug, Copy, Clone)]
struct MediaInterval {
    lit: bool,
    samples: u32,
    s0: f64,
    s1: f64,
    ds: f64,
    od: RgbColour,
    te: RgbColour,
    te2: RgbColour,
    l0: usize,
    l1: usize,
}

impl MediaInterval {
    fn new(lit: bool, s0: f64, s1: f64, l0: usize, l1: usize) -> MediaInterval {
        MediaInterval {
            lit,
            samples: 0,
            s0,
            s1,
            ds: s1 - s0,
            od: RgbColour::BLACK,
            te: RgbColour::BLACK,
            te2: RgbColour::BLACK,
            l0,
            l1,
        }
    }
}

/// The media solver for one trace. Borrows the light list and the photon
/// map; all mutable state lives in the thread scratch.
pub struct MediaFunction<'s, 'a> {
    lights: &'a [LightSource],
    shadow: &'s dyn ShadowTester<'a>,
    photons: Option<&'a PhotonMap>,
}

impl<'s, 'a> MediaFunction<'s, 'a> {
    pub fn new(
        lights: &'a [LightSource],
        shadow: &'s dyn ShadowTester<'a>,
        photons: Option<&'a PhotonMap>,
    ) -> MediaFunction<'s, 'a> {
        MediaFunction {
            lights,
            shadow,
            photons,
        }
    }

    /// Integrates all media along `[0, depth]` of the ray. `colour` holds
    /// the radiance arriving from beyond the segment and is attenuated and
    /// augmented in place; `transm` is scaled by the net transmittance.
    pub fn compute_media(
        &self,
        medias: &[&'a Media],
        ray: &Ray<'a>,
        depth: f64,
        use_global_lights: bool,
        colour: &mut RgbColour,
        transm: &mut f64,
        thread: &mut TraceThreadData<'a>,
    ) {
        if medias.is_empty() {
            return;
        }

        // Aggregate per-trace knobs over the media stack.
        let mut imedia = medias[0];
        let mut aa_threshold = f64::MAX;
        let mut ignore_photons = true;
        let mut use_extinction = false;
        let mut use_scattering = false;
        let mut all_constant_and_light_ray = ray.is_shadow_test_ray();

        for m in medias {
            if m.intervals > imedia.intervals {
                imedia = *m;
            }
            if m.aa_threshold < aa_threshold {
                aa_threshold = m.aa_threshold;
            }
            ignore_photons = ignore_photons && m.ignore_photons;
            use_extinction = use_extinction || m.use_extinction;
            use_scattering = use_scattering || m.use_scattering;
            all_constant_and_light_ray = all_constant_and_light_ray && m.all_density_plain();
        }

        // A shadow ray through non-extinguishing media is unaffected.
        if ray.is_shadow_test_ray() && !use_extinction {
            return;
        }

        let mut lights: Vec<LightSourceEntry<'a>> = Vec::new();
        let mut litintervals: Vec<LitInterval> = Vec::new();
        if !ray.is_shadow_test_ray() {
            self.compute_light_intervals(&mut lights, &mut litintervals, ray, depth, use_global_lights);
        }
        if litintervals.is_empty() {
            litintervals.push(LitInterval {
                lit: false,
                s0: 0.0,
                s1: depth,
                ds: depth,
                l0: 0,
                l1: 0,
            });
        }

        let mut intervals = compute_sample_intervals(&litintervals, imedia);

        // Pad out to the full segment.
        if intervals[0].s0 > 0.0 {
            let s0 = intervals[0].s0;
            intervals.insert(0, MediaInterval::new(false, 0.0, s0, 0, 0));
        }
        if intervals.last().unwrap().s1 < depth {
            let s1 = intervals.last().unwrap().s1;
            intervals.push(MediaInterval::new(false, s1, depth, 0, 0));
        }

        let min_samples = imedia.min_samples.max(1);

        if imedia.sample_method == SAMPLE_METHOD_ADAPTIVE && !all_constant_and_light_ray {
            self.adaptive_sampling(
                medias,
                &lights,
                &mut intervals,
                ray,
                imedia,
                aa_threshold,
                min_samples,
                ignore_photons,
                use_scattering,
                thread,
            );
        } else {
            self.regular_sampling(
                medias,
                &lights,
                &mut intervals,
                ray,
                imedia,
                min_samples,
                ignore_photons,
                use_scattering,
                all_constant_and_light_ray,
                thread,
            );
        }

        // Fold the intervals front to back.
        let mut od = RgbColour::BLACK;
        let mut te = RgbColour::BLACK;
        for i in intervals.iter() {
            let n = 1.0 / f64::from(i.samples.max(1));
            te += i.te * n * (-od).exp();
            od += i.od * n;
        }

        let attenuation = (-od).exp();
        *colour = *colour * attenuation + te;
        *transm *= attenuation.greyscale();
    }

    #[allow(clippy::too_many_arguments)]
    fn regular_sampling(
        &self,
        medias: &[&'a Media],
        lights: &[LightSourceEntry<'a>],
        intervals: &mut [MediaInterval],
        ray: &Ray<'a>,
        imedia: &Media,
        min_samples: u32,
        ignore_photons: bool,
        use_scattering: bool,
        all_constant_and_light_ray: bool,
        thread: &mut TraceThreadData<'a>,
    ) {
        thread
            .stats
            .add(Stat::MediaIntervals, intervals.len() as u64);

        for interval in intervals.iter_mut() {
            for j in 0..min_samples {
                let d0 = if imedia.sample_method == SAMPLE_METHOD_STRATIFIED {
                    (f64::from(j) + 0.5) / f64::from(min_samples)
                        + thread.rands.next() * imedia.jitter / f64::from(min_samples)
                } else {
                    thread.rands.next()
                };
                let method = if imedia.sample_method == SAMPLE_METHOD_STRATIFIED {
                    SAMPLE_METHOD_STRATIFIED
                } else {
                    SAMPLE_METHOD_UNIFORM
                };
                self.one_sample(
                    medias,
                    lights,
                    interval,
                    ray,
                    d0,
                    method,
                    ignore_photons,
                    use_scattering,
                    thread,
                );

                if all_constant_and_light_ray {
                    // Constant media: a single sample is exact.
                    break;
                }
            }
        }

        // Top up with extra samples while the variance stays above the
        // confidence-derived threshold.
        if !ray.is_shadow_test_ray() && imedia.max_samples > min_samples {
            for interval in intervals.iter_mut() {
                if interval.samples >= imedia.max_samples {
                    continue;
                }
                loop {
                    let n = 1.0 / f64::from(interval.samples);
                    let va = (interval.te2 * n - (interval.te * n).sqr()) * n;
                    let threshold = imedia.sample_threshold[(interval.samples - 1) as usize];
                    if va.is_near_zero(threshold) {
                        break;
                    }
                    let d0 = thread.rands.next();
                    self.one_sample(
                        medias,
                        lights,
                        interval,
                        ray,
                        d0,
                        SAMPLE_METHOD_UNIFORM,
                        ignore_photons,
                        use_scattering,
                        thread,
                    );
                    if interval.samples > imedia.max_samples {
                        break;
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn adaptive_sampling(
        &self,
        medias: &[&'a Media],
        lights: &[LightSourceEntry<'a>],
        intervals: &mut [MediaInterval],
        ray: &Ray<'a>,
        imedia: &Media,
        aa_threshold: f64,
        min_samples: u32,
        ignore_photons: bool,
        use_scattering: bool,
        thread: &mut TraceThreadData<'a>,
    ) {
        for interval in intervals.iter_mut() {
            thread.stats.bump(Stat::MediaIntervals);

            let sub_interval_count = ((min_samples + 1) / 2).max(1);
            let dd = 1.0 / f64::from(sub_interval_count);

            let jitter = dd * imedia.jitter * (thread.rands.next() - 0.5);
            let (mut c0, mut od0) = self.one_sample(
                medias,
                lights,
                interval,
                ray,
                jitter,
                SAMPLE_METHOD_ADAPTIVE,
                ignore_photons,
                use_scattering,
                thread,
            );

            interval.te = RgbColour::BLACK;
            interval.od = RgbColour::BLACK;

            let mut d0 = 0.0;
            for _ in 1..=sub_interval_count {
                let d1 = d0 + dd;
                let jitter = d1 + dd * imedia.jitter * (thread.rands.next() - 0.5);
                let (c1, od1) = self.one_sample(
                    medias,
                    lights,
                    interval,
                    ray,
                    jitter,
                    SAMPLE_METHOD_ADAPTIVE,
                    ignore_photons,
                    use_scattering,
                    thread,
                );
                let (mut result, od_result) = self.one_sample_recursive(
                    medias,
                    lights,
                    interval,
                    ray,
                    d0,
                    d1,
                    c0,
                    c1,
                    od0,
                    od1,
                    imedia.aa_level.saturating_sub(1),
                    imedia.jitter,
                    aa_threshold,
                    ignore_photons,
                    use_scattering,
                    thread,
                );

                // Sub-samples run in order, so earlier sub-intervals darken
                // later ones.
                result *= (-(interval.od) * dd).exp();
                // Attenuation inside the sub-interval itself; exact when
                // emission tracks absorption across the sub-interval.
                for (chan, odc) in [
                    (&mut result.red, od_result.red),
                    (&mut result.green, od_result.green),
                    (&mut result.blue, od_result.blue),
                ]
                .iter_mut()
                {
                    if *odc != 0.0 {
                        **chan *= (1.0 - (-*odc * dd).exp()) / (*odc * dd);
                    }
                }
                interval.te += result;

                c0 = c1;
                interval.od += od_result;
                od0 = od1;
                d0 = d1;
            }

            interval.samples = sub_interval_count;
        }
    }

    /// One sample at fraction `d0` of the interval. Returns the sample
    /// colour and optical depth (used by the adaptive path); regular paths
    /// accumulate into the interval directly.
    #[allow(clippy::too_many_arguments)]
    fn one_sample(
        &self,
        medias: &[&'a Media],
        lights: &[LightSourceEntry<'a>],
        interval: &mut MediaInterval,
        ray: &Ray<'a>,
        d0: f64,
        sample_method: u8,
        ignore_photons: bool,
        use_scattering: bool,
        thread: &mut TraceThreadData<'a>,
    ) -> (RgbColour, RgbColour) {
        thread.stats.bump(Stat::MediaSamples);

        let d0 = d0 * interval.ds;
        let d1 = interval.s0 + d0;
        let h = ray.evaluate(d1);

        let mut emission = RgbColour::BLACK;
        let mut extinction = RgbColour::BLACK;
        let mut scattering = RgbColour::BLACK;

        for m in medias {
            let c0 = evaluate_density_pigments(&m.density, h, thread);
            extinction += c0 * m.extinction;
            if !ray.is_shadow_test_ray() {
                emission += c0 * m.emission;
                scattering += c0 * m.scattering;
            }
        }

        let samp_opt_depth = extinction * interval.ds;
        if sample_method != SAMPLE_METHOD_ADAPTIVE {
            interval.od += samp_opt_depth;
        }

        if !ray.is_shadow_test_ray() && use_scattering && !ray.is_photon_ray() {
            if interval.lit {
                // Note for the shadow path: photons are ignored only when
                // every medium here opts out.
                thread.lit_object_ignores_photons = medias.iter().all(|m| m.ignore_photons);

                for entry in lights[interval.l0..=interval.l1.min(lights.len().saturating_sub(1))]
                    .iter()
                {
                    if d1 >= entry.s0 && d1 <= entry.s1 {
                        if let Some((light_dir, light_colour)) =
                            self.shadow.test_shadow(entry.light, h, thread)
                        {
                            scattering_attenuation(
                                medias,
                                &mut emission,
                                scattering,
                                light_colour,
                                ray.direction,
                                light_dir,
                            );
                        }
                    }
                }
            }

            if !ignore_photons {
                if let Some(map) = self.photons {
                    if map.num_photons() > 0 {
                        self.media_photons(medias, &mut emission, scattering, ray, h, thread);
                    }
                }
            }
        }

        let emission = if sample_method == SAMPLE_METHOD_ADAPTIVE {
            // Attenuation is applied incrementally by the caller.
            emission * interval.ds
        } else {
            // Assumes constant extinction over the interval up to d0.
            emission * interval.ds * (-extinction * d0).exp()
        };

        if sample_method != SAMPLE_METHOD_ADAPTIVE {
            interval.te += emission;
            interval.te2 += emission.sqr();
        }

        interval.samples += 1;

        (emission, samp_opt_depth)
    }

    /// Recursive mid-point refinement between two samples at fractions
    /// `d1 < d3`. Returns the averaged colour and optical depth.
    #[allow(clippy::too_many_arguments)]
    fn one_sample_recursive(
        &self,
        medias: &[&'a Media],
        lights: &[LightSourceEntry<'a>],
        interval: &mut MediaInterval,
        ray: &Ray<'a>,
        d1: f64,
        d3: f64,
        c1: RgbColour,
        c3: RgbColour,
        od1: RgbColour,
        od3: RgbColour,
        depth: u32,
        jitter: f64,
        aa_threshold: f64,
        ignore_photons: bool,
        use_scattering: bool,
        thread: &mut TraceThreadData<'a>,
    ) -> (RgbColour, RgbColour) {
        let d2 = 0.5 * (d1 + d3);
        let jdist = d2 + jitter * (d3 - d1) * (thread.rands.next() - 0.5);

        let (c2, od2) = self.one_sample(
            medias,
            lights,
            interval,
            ray,
            jdist,
            SAMPLE_METHOD_ADAPTIVE,
            ignore_photons,
            use_scattering,
            thread,
        );

        if depth == 0 {
            // Flat average of the three samples.
            return ((c1 + c2 + c3) / 3.0, (od1 + od2 + od3) / 3.0);
        }

        let (mut result, mut od_result);
        if colour_distance(c1, c2) > aa_threshold {
            let (r, odr) = self.one_sample_recursive(
                medias,
                lights,
                interval,
                ray,
                d1,
                d2,
                c1,
                c2,
                od1,
                od2,
                depth - 1,
                jitter,
                aa_threshold,
                ignore_photons,
                use_scattering,
                thread,
            );
            result = r / 2.0;
            od_result = odr / 2.0;
        } else {
            // The mid-point will appear again in the other half, so it gets
            // half the weight here.
            result = c1 / 3.0 + c2 / 6.0;
            od_result = od1 / 3.0 + od2 / 6.0;
        }

        if colour_distance(c2, c3) > aa_threshold {
            let (r, odr) = self.one_sample_recursive(
                medias,
                lights,
                interval,
                ray,
                d2,
                d3,
                c2,
                c3,
                od2,
                od3,
                depth - 1,
                jitter,
                aa_threshold,
                ignore_photons,
                use_scattering,
                thread,
            );
            result += r / 2.0;
            od_result += odr / 2.0;
        } else {
            result += c2 / 6.0 + c3 / 3.0;
            od_result += od2 / 6.0 + od3 / 3.0;
        }

        (result, od_result)
    }

    fn media_photons(
        &self,
        medias: &[&'a Media],
        te: &mut RgbColour,
        sc: RgbColour,
        ray: &Ray<'a>,
        h: Vector3,
        thread: &mut TraceThreadData<'a>,
    ) {
        let map = match self.photons {
            Some(m) => m,
            None => return,
        };

        thread.stats.bump(Stat::PhotonGathersPerformed);

        let mut gatherer = PhotonGatherer::new(map);
        let r = gatherer.gather_adaptive(h);

        let mut colour2 = RgbColour::BLACK;
        for &idx in gatherer.gathered.iter() {
            let photon = &map.photons[idx];
            scattering_attenuation(
                medias,
                &mut colour2,
                sc,
                photon.colour,
                ray.direction,
                photon.direction(),
            );
        }

        colour2 *= 3.0 / (std::f64::consts::PI * r * r * r * 4.0);
        *te += colour2;
    }

    /// Lit-interval computation: per light, the sub-segment of `[0, depth]`
    /// it can deposit energy into; the union is then flattened into
    /// disjoint lit/unlit spans.
    fn compute_light_intervals(
        &self,
        lights: &mut Vec<LightSourceEntry<'a>>,
        litintervals: &mut Vec<LitInterval>,
        ray: &Ray<'a>,
        depth: f64,
        use_global_lights: bool,
    ) {
        if use_global_lights {
            for light in self.lights.iter() {
                if light.media_interaction {
                    if let Some((s0, s1)) = one_light_interval(light, ray, depth) {
                        lights.push(LightSourceEntry { light, s0, s1 });
                    }
                }
            }
        }

        if lights.is_empty() {
            return;
        }

        let mut s0: Vec<f64> = lights.iter().map(|l| l.s0).collect();
        let mut s1: Vec<f64> = lights.iter().map(|l| l.s1).collect();
        s0.sort_by(|a, b| a.partial_cmp(b).unwrap());
        s1.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let l1 = lights.len() - 1;
        if s0[0] > 0.0 {
            litintervals.push(LitInterval {
                lit: false,
                s0: 0.0,
                s1: s0[0],
                ds: 0.0,
                l0: 0,
                l1,
            });
        }
        litintervals.push(LitInterval {
            lit: true,
            s0: s0[0],
            s1: s1[0],
            ds: 0.0,
            l0: 0,
            l1,
        });
        for i in 1..lights.len() {
            let back_s1 = litintervals.last().unwrap().s1;
            if s0[i] > back_s1 {
                litintervals.push(LitInterval {
                    lit: false,
                    s0: back_s1,
                    s1: s0[i],
                    ds: 0.0,
                    l0: 0,
                    l1,
                });
                litintervals.push(LitInterval {
                    lit: true,
                    s0: s0[i],
                    s1: s1[i],
                    ds: 0.0,
                    l0: 0,
                    l1,
                });
            } else if s1[i] > back_s1 {
                litintervals.last_mut().unwrap().s1 = s1[i];
            }
        }

        let back_s1 = litintervals.last().unwrap().s1;
        if back_s1 < depth {
            litintervals.push(LitInterval {
                lit: false,
                s0: back_s1,
                s1: depth,
                ds: 0.0,
                l0: 0,
                l1,
            });
        }
        for li in litintervals.iter_mut() {
            li.ds = li.s1 - li.s0;
        }
    }
}

/// The lit sub-segment one light projects onto the ray.
fn one_light_interval(light: &LightSource, ray: &Ray<'_>, depth: f64) -> Option<(f64, f64)> {
    let (t1, t2, insert) = match light.light_type {
        LightType::Point => (0.0, depth, true),
        LightType::Spot => match spot_light_interval(ray, light) {
            Some((t1, t2)) => (t1, t2, t1 < depth && t2 > SMALL_TOLERANCE),
            None => (0.0, 0.0, false),
        },
        LightType::Cylinder => match cylinder_light_interval(ray, light) {
            Some((t1, t2)) => (t1, t2, t1 < depth && t2 > SMALL_TOLERANCE),
            None => (0.0, 0.0, false),
        },
    };

    if insert {
        Some((t1.max(0.0), t2.min(depth)))
    } else {
        None
    }
}

/// Quadratic for the segment of the ray inside a spot cone.
fn spot_light_interval(ray: &Ray<'_>, light: &LightSource) -> Option<(f64, f64)> {
    // cos(falloff) is stored in `falloff`.
    let m = 1.0 / (light.falloff * light.falloff);

    let v1 = ray.origin - light.center;
    let k1 = ray.direction.dot(light.direction);
    let k2 = v1.dot(light.direction);
    let l = v1.length();

    let viewpoint_in_cone = if l > EPSILON {
        k2 / l >= light.falloff
    } else {
        false
    };

    if k1 <= 0.0 && k2 < 0.0 {
        return None;
    }

    let k3 = v1.dot(ray.direction);
    let k4 = v1.length_squared();

    let a = 1.0 - k1 * k1 * m;
    let b = k3 - k1 * k2 * m;
    let c = k4 - k2 * k2 * m;

    if a != 0.0 {
        let d = b * b - a * c;
        if d > EPSILON {
            let d = d.sqrt();
            let mut t1 = (-b + d) / a;
            let mut t2 = (-b - d) / a;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            let l1 = k2 + t1 * k1;
            let l2 = k2 + t2 * k1;

            if l1 <= 0.0 && l2 <= 0.0 {
                return None;
            }
            if l1 <= 0.0 || l2 <= 0.0 {
                // One intersection lies on the mirror cone behind the apex.
                if l1 <= 0.0 {
                    if viewpoint_in_cone {
                        t1 = 0.0;
                        t2 = if t2 > 0.0 { t2 } else { MAX_DISTANCE };
                    } else {
                        t1 = t2;
                        t2 = MAX_DISTANCE;
                    }
                } else if viewpoint_in_cone {
                    t2 = t1;
                    t1 = 0.0;
                } else {
                    t2 = MAX_DISTANCE;
                }
            }
            return Some((t1, t2));
        } else if d > -EPSILON {
            return if viewpoint_in_cone {
                Some((0.0, -b / a))
            } else {
                Some((-b / a, MAX_DISTANCE))
            };
        }
        None
    } else if viewpoint_in_cone {
        Some((0.0, -c / b))
    } else {
        None
    }
}

/// Quadratic for the segment of the ray inside a cylinder beam.
fn cylinder_light_interval(ray: &Ray<'_>, light: &LightSource) -> Option<(f64, f64)> {
    let v1 = ray.origin - light.center;
    let k1 = ray.direction.dot(light.direction);
    let k2 = v1.dot(light.direction);

    if k1 <= 0.0 && k2 < 0.0 {
        return None;
    }

    let a = 1.0 - k1 * k1;
    if a == 0.0 {
        return None;
    }

    let k3 = v1.dot(ray.direction);
    let k4 = v1.length_squared();

    let b = k3 - k1 * k2;
    let c = k4 - k2 * k2 - light.falloff * light.falloff;
    let d = b * b - a * c;
    if d <= EPSILON {
        return None;
    }

    let d = d.sqrt();
    let mut t1 = (-b + d) / a;
    let mut t2 = (-b - d) / a;
    if t1 > t2 {
        std::mem::swap(&mut t1, &mut t2);
    }

    let l1 = k2 + t1 * k1;
    let l2 = k2 + t2 * k1;

    if l1 <= 0.0 && l2 <= 0.0 {
        return None;
    }
    if l1 <= 0.0 {
        t1 = 0.0;
    } else if l2 <= 0.0 {
        t2 = (MAX_DISTANCE - k2) / k1;
    }

    Some((t1, t2))
}

/// Distributes sample intervals over the lit/unlit spans weighted by the
/// media's ratio, never fewer than one per span.
fn compute_sample_intervals(litintervals: &[LitInterval], media: &Media) -> Vec<MediaInterval> {
    let intervals = (media.intervals as usize).max(litintervals.len());
    let mut result = Vec::with_capacity(intervals);

    if litintervals.len() == 1 {
        let li = &litintervals[0];
        if !li.lit && media.is_constant {
            // Constant unlit media integrates exactly with one interval.
            result.push(MediaInterval::new(false, li.s0, li.s1, 0, 0));
        } else {
            let delta = li.ds / intervals as f64;
            for i in 0..intervals {
                result.push(MediaInterval::new(
                    li.lit,
                    li.s0 + delta * i as f64,
                    li.s0 + delta * (i + 1) as f64,
                    li.l0,
                    li.l1,
                ));
            }
        }
    } else {
        let sum: f64 = litintervals
            .iter()
            .map(|li| if li.lit { media.ratio } else { 1.0 - media.ratio })
            .sum();

        let mut remaining = intervals;
        for (idx, li) in litintervals.iter().enumerate() {
            let weight = if li.lit { media.ratio } else { 1.0 - media.ratio };
            let mut n = (weight / sum * intervals as f64) as usize + 1;
            let r = remaining + idx + 1 - litintervals.len();
            if n > r {
                n = r;
            }
            let delta = li.ds / n as f64;
            for j in 0..n {
                result.push(MediaInterval::new(
                    li.lit,
                    li.s0 + delta * j as f64,
                    li.s0 + delta * (j + 1) as f64,
                    li.l0,
                    li.l1,
                ));
            }
            remaining -= n;
        }
    }

    result
}

/// Adds one light's in-scattered contribution, weighted by the stack's
/// averaged phase function at the view/light angle.
fn scattering_attenuation(
    medias: &[&Media],
    output: &mut RgbColour,
    sc: RgbColour,
    light_colour: RgbColour,
    ray_direction: Vector3,
    light_direction: Vector3,
) {
    let mut k = 0.0;
    for m in medias {
        k += match m.scattering_type {
            ScatteringType::Rayleigh => {
                let alpha = light_direction.dot(ray_direction);
                0.799372013 * (1.0 + alpha * alpha)
            }
            ScatteringType::MieHazy => {
                let alpha = light_direction.dot(ray_direction);
                0.576655375 * (1.0 + 9.0 * (0.5 * (1.0 + alpha)).powf(8.0))
            }
            ScatteringType::MieMurky => {
                let alpha = light_direction.dot(ray_direction);
                0.495714547 * (1.0 + 50.0 * (0.5 * (1.0 + alpha)).powf(32.0))
            }
            ScatteringType::HenyeyGreenstein => {
                let alpha = light_direction.dot(ray_direction);
                let g = m.eccentricity;
                let g2 = g * g;
                (1.0 - g2) / (1.0 + g2 - 2.0 * g * alpha).powf(1.5)
            }
            ScatteringType::Isotropic => 1.0,
        };
    }
    k /= medias.len() as f64;

    *output += k * sc * light_colour;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::TraceTicket;

    fn media_ray<'a>() -> Ray<'a> {
        Ray::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0).normalize(),
            TraceTicket::new(5, 0),
        )
    }

    fn absorbing_media(sigma: f64) -> Media {
        let mut m = Media::new();
        m.absorption = RgbColour::splat(sigma);
        m.post_process();
        m
    }

    #[test]
    fn post_process_derives_extinction_and_flags() {
        let mut m = Media::new();
        m.absorption = RgbColour::splat(0.25);
        m.scattering = RgbColour::splat(0.5);
        m.sc_ext = 2.0;
        m.post_process();
        assert_eq!(m.extinction, RgbColour::splat(1.25));
        assert!(m.use_absorption && m.use_scattering && m.use_extinction);
        assert!(m.is_constant);
    }

    #[test]
    fn sample_thresholds_decrease_with_samples() {
        let mut m = Media::new();
        m.max_samples = 10;
        m.post_process();
        // More samples -> tighter variance demanded; the raw chi-square
        // quantile grows with dof, so thresholds grow monotonically in the
        // table while the scale factor keeps them proportioned.
        assert_eq!(m.sample_threshold.len(), 10);
        for w in m.sample_threshold.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn homogeneous_absorption_matches_beer_lambert() {
        // A homogeneous absorbing medium over D = sqrt(3) transmits
        // exp(-0.5 * sqrt(3)).
        let m = absorbing_media(0.5);
        let medias: Vec<&Media> = vec![&m];
        let lights: Vec<LightSource> = Vec::new();
        let shadow = UnoccludedShadows;
        let mf = MediaFunction::new(&lights, &shadow, None);

        let ray = media_ray();
        let depth = 3.0f64.sqrt();
        let mut colour = RgbColour::WHITE;
        let mut transm = 1.0;
        let mut thread = TraceThreadData::new(0);

        mf.compute_media(&medias, &ray, depth, true, &mut colour, &mut transm, &mut thread);

        let expected = (-0.5 * depth).exp();
        assert!(
            (transm - expected).abs() < 1.0e-9,
            "transmittance {} vs {}",
            transm,
            expected
        );
        assert!((colour.red - expected).abs() < 1.0e-9);
    }

    #[test]
    fn emission_adds_radiance() {
        let mut m = Media::new();
        m.emission = RgbColour::splat(0.25);
        m.post_process();
        let medias: Vec<&Media> = vec![&m];
        let lights: Vec<LightSource> = Vec::new();
        let shadow = UnoccludedShadows;
        let mf = MediaFunction::new(&lights, &shadow, None);

        let ray = media_ray();
        let mut colour = RgbColour::BLACK;
        let mut transm = 1.0;
        let mut thread = TraceThreadData::new(0);
        mf.compute_media(&medias, &ray, 2.0, true, &mut colour, &mut transm, &mut thread);

        // No extinction: emission integrates to emission * D.
        assert!((colour.red - 0.5).abs() < 1.0e-9);
        assert!((transm - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn shadow_ray_without_extinction_is_untouched() {
        let mut m = Media::new();
        m.emission = RgbColour::splat(1.0);
        m.post_process();
        let medias: Vec<&Media> = vec![&m];
        let lights: Vec<LightSource> = Vec::new();
        let shadow = UnoccludedShadows;
        let mf = MediaFunction::new(&lights, &shadow, None);

        let mut ray = media_ray();
        ray.set_flags(crate::ray::RayType::Other, true, false);
        let mut colour = RgbColour::WHITE;
        let mut transm = 1.0;
        let mut thread = TraceThreadData::new(0);
        mf.compute_media(&medias, &ray, 2.0, true, &mut colour, &mut transm, &mut thread);
        assert_eq!(colour, RgbColour::WHITE);
        assert_eq!(transm, 1.0);
    }

    #[test]
    fn scattering_brightens_lit_media() {
        let mut m = Media::new();
        m.scattering = RgbColour::splat(0.2);
        m.post_process();
        let medias: Vec<&Media> = vec![&m];
        let lights = vec![LightSource::point(
            Vector3::new(0.0, 5.0, 0.0),
            RgbColour::WHITE,
        )];
        let shadow = UnoccludedShadows;
        let mf = MediaFunction::new(&lights, &shadow, None);

        let ray = media_ray();
        let mut colour = RgbColour::BLACK;
        let mut transm = 1.0;
        let mut thread = TraceThreadData::new(0);
        mf.compute_media(&medias, &ray, 2.0, true, &mut colour, &mut transm, &mut thread);

        assert!(colour.red > 0.0, "in-scattering must add light");
        assert!(transm < 1.0, "scattering extinguishes the beam");
    }

    #[test]
    fn phase_functions_normalised_at_right_angle() {
        // At alpha = 0 the Rayleigh lobe is its base constant.
        let m = {
            let mut m = Media::new();
            m.scattering_type = ScatteringType::Rayleigh;
            m
        };
        let medias: Vec<&Media> = vec![&m];
        let mut out = RgbColour::BLACK;
        scattering_attenuation(
            &medias,
            &mut out,
            RgbColour::WHITE,
            RgbColour::WHITE,
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        assert!((out.red - 0.799372013).abs() < 1.0e-9);
    }

    #[test]
    fn henyey_greenstein_peaks_forward() {
        let m = {
            let mut m = Media::new();
            m.scattering_type = ScatteringType::HenyeyGreenstein;
            m.eccentricity = 0.5;
            m
        };
        let medias: Vec<&Media> = vec![&m];

        let mut forward = RgbColour::BLACK;
        scattering_attenuation(
            &medias,
            &mut forward,
            RgbColour::WHITE,
            RgbColour::WHITE,
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        );
        let mut backward = RgbColour::BLACK;
        scattering_attenuation(
            &medias,
            &mut backward,
            RgbColour::WHITE,
            RgbColour::WHITE,
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        );
        assert!(forward.red > backward.red);
    }

    #[test]
    fn spot_light_interval_brackets_the_cone() {
        // Spot at (0, 5, 0) shining straight down with a 30 degree
        // falloff; a ray along x at y=0 crosses the cone symmetrically.
        let light = LightSource::spot(
            Vector3::new(0.0, 5.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            30.0f64.to_radians(),
            RgbColour::WHITE,
        );
        let ray = Ray::new(
            Vector3::new(-10.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            TraceTicket::new(5, 0),
        );
        let (t1, t2) = spot_light_interval(&ray, &light).unwrap();
        let half_width = 5.0 * 30.0f64.to_radians().tan();
        assert!((t1 - (10.0 - half_width)).abs() < 1.0e-6, "t1 {}", t1);
        assert!((t2 - (10.0 + half_width)).abs() < 1.0e-6, "t2 {}", t2);
    }

    #[test]
    fn cylinder_light_interval_brackets_the_beam() {
        let light = LightSource::cylinder(
            Vector3::new(0.0, 5.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            1.0,
            RgbColour::WHITE,
        );
        let ray = Ray::new(
            Vector3::new(-10.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            TraceTicket::new(5, 0),
        );
        let (t1, t2) = cylinder_light_interval(&ray, &light).unwrap();
        assert!((t1 - 9.0).abs() < 1.0e-9);
        assert!((t2 - 11.0).abs() < 1.0e-9);
    }

    #[test]
    fn interval_allocation_favours_lit_spans() {
        let mut m = Media::new();
        m.intervals = 10;
        m.ratio = 0.9;
        m.post_process();

        let lit = vec![
            LitInterval {
                lit: false,
                s0: 0.0,
                s1: 4.0,
                ds: 4.0,
                l0: 0,
                l1: 0,
            },
            LitInterval {
                lit: true,
                s0: 4.0,
                s1: 6.0,
                ds: 2.0,
                l0: 0,
                l1: 0,
            },
        ];
        let intervals = compute_sample_intervals(&lit, &m);
        let lit_count = intervals.iter().filter(|i| i.lit).count();
        let unlit_count = intervals.len() - lit_count;
        assert!(lit_count > unlit_count);
        assert!(unlit_count >= 1);
        // The intervals tile the segment contiguously.
        for w in intervals.windows(2) {
            assert!((w[0].s1 - w[1].s0).abs() < 1.0e-12);
        }
    }

    #[test]
    fn stratified_sampling_matches_uniform_on_constant_media() {
        for method in &[SAMPLE_METHOD_UNIFORM, SAMPLE_METHOD_STRATIFIED, SAMPLE_METHOD_ADAPTIVE] {
            let mut m = absorbing_media(0.3);
            m.sample_method = *method;
            m.min_samples = 4;
            m.post_process();
            let medias: Vec<&Media> = vec![&m];
            let lights: Vec<LightSource> = Vec::new();
            let shadow = UnoccludedShadows;
            let mf = MediaFunction::new(&lights, &shadow, None);

            let ray = media_ray();
            let mut colour = RgbColour::WHITE;
            let mut transm = 1.0;
            let mut thread = TraceThreadData::new(7);
            mf.compute_media(&medias, &ray, 2.0, true, &mut colour, &mut transm, &mut thread);
            let expected = (-0.3f64 * 2.0).exp();
            assert!(
                (transm - expected).abs() < 1.0e-6,
                "method {}: {} vs {}",
                method,
                transm,
                expected
            );
        }
    }

    #[test]
    fn variance_topup_stays_within_max_samples() {
        let mut m = Media::new();
        m.absorption = RgbColour::splat(0.5);
        m.emission = RgbColour::splat(0.5);
        m.min_samples = 2;
        m.max_samples = 8;
        // Spatially varying density so the variance test has real work.
        m.density = vec![Pigment::new(
            crate::pattern::TPattern::new(crate::pattern::PatternKind::Gradient(Vector3::new(
                1.0, 0.0, 0.0,
            ))),
            PigmentMap::Colours(crate::texture::BlendMap::new(vec![
                crate::texture::BlendMapEntry {
                    value: 0.0,
                    item: crate::colour::TransColour::opaque(RgbColour::BLACK),
                },
                crate::texture::BlendMapEntry {
                    value: 1.0,
                    item: crate::colour::TransColour::opaque(RgbColour::WHITE),
                },
            ])),
        )];
        m.post_process();
        assert!(!m.is_constant);

        let medias: Vec<&Media> = vec![&m];
        let lights: Vec<LightSource> = Vec::new();
        let shadow = UnoccludedShadows;
        let mf = MediaFunction::new(&lights, &shadow, None);

        let ray = media_ray();
        let mut colour = RgbColour::BLACK;
        let mut transm = 1.0;
        let mut thread = TraceThreadData::new(3);
        mf.compute_media(&medias, &ray, 1.0, true, &mut colour, &mut transm, &mut thread);
        assert!(transm > 0.0 && transm < 1.0);
        assert!(thread.stats.get(Stat::MediaSamples) >= 2);
    }
}
