#![allow(dead_code)]

pub mod crackle;
pub mod density;
pub mod fractal;
pub mod noise;
pub mod tiling;
pub mod warp;

use std::sync::Arc;

use crate::math::{clamp, Vector3};
use crate::pattern::crackle::CrackleParams;
use crate::pattern::density::DensityFilePattern;
use crate::pattern::fractal::FractalParams;
use crate::pattern::noise::{
    cycloidal, dturbulence, noise, triangle_wave, turbulence, NoiseGen, Turb,
};
use crate::pattern::tiling::TilingKind;
use crate::pattern::warp::{search_for_turb, warp_point, Warp};
use crate::thread::TraceThreadData;

/// Shape applied to the pattern scalar after frequency/phase wrapping.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WaveType {
    Ramp,
    Sine,
    Triangle,
    Scallop,
    Cubic,
    Poly,
}

/// Slope pattern configuration: projection of the surface normal onto a
/// direction, optionally combined with an altitude term.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopeParams {
    /// Point-at mode: the slope direction is toward a fixed point rather
    /// than along a vector.
    pub point_at: bool,
    pub slope_vector: Vector3,
    /// Shortcut axis: +-1..3 select +-x/y/z; 0 projects onto the vector.
    pub slope_base: i32,
    /// (offset, scale) remapping of the slope value.
    pub slope_mod: (f64, f64),
    pub slope_len: f64,
    pub altit_vector: Vector3,
    pub altit_base: i32,
    pub altit_mod: (f64, f64),
    pub altit_len: f64,
}

impl Default for SlopeParams {
    fn default() -> SlopeParams {
        SlopeParams {
            point_at: false,
            slope_vector: Vector3::new(0.0, 1.0, 0.0),
            slope_base: 2,
            slope_mod: (0.0, 0.0),
            slope_len: 1.0,
            altit_vector: Vector3::new(0.0, 0.0, 0.0),
            altit_base: 0,
            altit_mod: (0.0, 0.0),
            altit_len: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    /// Plain solid noise.
    Bozo,
    Bumps,
    Spotted,
    /// Noise cubed.
    Dents,
    /// 1/f sum of folded noise octaves.
    Granite,
    /// Ten octaves of folded noise.
    Wrinkles,
    /// Banded turbulence.
    Agate { turb_scale: f64 },
    /// x plus turbulence; feeds banded colour maps.
    Marble,
    /// Concentric cylinders around z with optional turbulence.
    Wood,
    /// Fractional projection onto a direction.
    Gradient(Vector3),
    /// Alternating unit cubes.
    Checker,
    Crackle(CrackleParams),
    Fractal(FractalParams),
    Tiling(TilingKind),
    /// Three-colour hexagon tiling (values 0, 1, 2).
    Hexagon,
    /// Four-colour square tiling.
    Square,
    /// Six-colour triangular tiling.
    Triangular,
    /// Surface-slope driven (needs the intersection normal).
    Slope(SlopeParams),
    /// Angle of incidence between ray and normal.
    Aoi,
    DensityFile(DensityFilePattern),
    /// User function via the per-thread VM.
    Function(Arc<fn_vm::Function>),
}

/// Side information available when a pattern is evaluated at an actual
/// surface hit; slope and aoi need it, everything else ignores it.
#[derive(Debug, Copy, Clone)]
pub struct PatternEvalCtx {
    pub pnormal: Option<Vector3>,
    pub ray_direction: Option<Vector3>,
    pub default_noise_gen: NoiseGen,
}

impl Default for PatternEvalCtx {
    fn default() -> PatternEvalCtx {
        PatternEvalCtx {
            pnormal: None,
            ray_direction: None,
            default_noise_gen: NoiseGen::default(),
        }
    }
}

/// A procedural scalar field: pattern kind plus warp chain, frequency,
/// phase and wave shaping. Immutable once built; copies share the
/// expensive internals (density grids, functions) by reference count.
#[derive(Debug, Clone)]
pub struct TPattern {
    pub kind: PatternKind,
    pub warps: Vec<Warp>,
    pub frequency: f64,
    pub phase: f64,
    pub wave: WaveType,
    /// Exponent for the poly wave.
    pub exponent: f64,
    /// Per-pattern noise generator override.
    pub noise_generator: Option<NoiseGen>,
}

impl TPattern {
    pub fn new(kind: PatternKind) -> TPattern {
        TPattern {
            kind,
            warps: Vec::new(),
            frequency: 1.0,
            phase: 0.0,
            wave: WaveType::Ramp,
            exponent: 1.0,
            noise_generator: None,
        }
    }

    pub fn with_turbulence(mut self, turb: Turb) -> TPattern {
        self.warps.push(Warp::Turbulence(turb));
        self
    }

    fn noise_gen(&self, ctx: &PatternEvalCtx) -> NoiseGen {
        self.noise_generator.unwrap_or(ctx.default_noise_gen)
    }

    /// Moves the pattern in space by composing onto (or appending) a
    /// transform warp.
    pub fn transform(&mut self, trans: &crate::math::Transform) {
        if let Some(Warp::Transform(ref mut t)) = self.warps.last_mut() {
            t.compose(trans);
        } else {
            self.warps.push(Warp::Transform(*trans));
        }
    }

    /// Block patterns return discrete tile indices and skip the
    /// frequency/wave post-processing when driving discrete entry lists.
    pub fn is_block_pattern(&self) -> bool {
        matches!(
            self.kind,
            PatternKind::Checker
                | PatternKind::Hexagon
                | PatternKind::Square
                | PatternKind::Triangular
        )
    }

    /// Number of discrete entries a block pattern selects between.
    pub fn block_entry_count(&self) -> usize {
        match self.kind {
            PatternKind::Checker => 2,
            PatternKind::Hexagon => 3,
            PatternKind::Square => 4,
            PatternKind::Triangular => 6,
            _ => 1,
        }
    }

    /// Applies the warp chain and evaluates the raw pattern kind.
    pub fn evaluate_raw(
        &self,
        point: Vector3,
        ctx: &PatternEvalCtx,
        thread: &mut TraceThreadData<'_>,
    ) -> f64 {
        let generator = self.noise_gen(ctx);
        let p = match self.kind {
            // Marble and wood consume their turbulence internally.
            PatternKind::Marble | PatternKind::Wood => {
                warp::warp_point_no_turb(point, &self.warps, generator)
            }
            _ => warp_point(point, &self.warps, generator),
        };

        match self.kind {
            PatternKind::Bozo | PatternKind::Bumps | PatternKind::Spotted => noise(p, generator),
            PatternKind::Dents => {
                let n = noise(p, generator);
                n * n * n
            }
            PatternKind::Granite => granite_pattern(p, generator),
            PatternKind::Wrinkles => wrinkles_pattern(p, generator),
            PatternKind::Agate { turb_scale } => {
                agate_pattern(p, turb_scale, &self.warps, generator)
            }
            PatternKind::Marble => marble_pattern(p, &self.warps, generator),
            PatternKind::Wood => wood_pattern(p, &self.warps),
            PatternKind::Gradient(direction) => {
                let result = p.dot(direction);
                if result > 1.0 {
                    result % 1.0
                } else {
                    result
                }
            }
            PatternKind::Checker => checker_pattern(p),
            PatternKind::Crackle(ref params) => {
                crackle::crackle_pattern(p, params, generator, thread)
            }
            PatternKind::Fractal(ref params) => fractal::fractal_pattern(p, params),
            PatternKind::Tiling(kind) => tiling::tiling_pattern(p, kind),
            PatternKind::Hexagon => tiling::hexagon_pattern(p),
            PatternKind::Square => tiling::square_pattern(p),
            PatternKind::Triangular => tiling::triangular_pattern(p),
            PatternKind::Slope(ref params) => slope_pattern(p, params, ctx),
            PatternKind::Aoi => aoi_pattern(ctx),
            PatternKind::DensityFile(ref df) => density::density_pattern(p, df),
            PatternKind::Function(ref f) => function_pattern(p, f, thread),
        }
    }

    /// Full evaluation: warps, pattern kind, frequency/phase wrap, wave
    /// shaping. The result is in [0, 1] except for the block patterns,
    /// which report small tile indices.
    pub fn evaluate(
        &self,
        point: Vector3,
        ctx: &PatternEvalCtx,
        thread: &mut TraceThreadData<'_>,
    ) -> f64 {
        let mut value = self.evaluate_raw(point, ctx, thread);

        if self.frequency != 0.0 {
            // The modulus sits a hair above one so an exact 1.0 survives.
            value = (value * self.frequency + self.phase) % 1.00001;
        }
        if value < 0.0 {
            value -= value.floor();
        }

        match self.wave {
            WaveType::Ramp => value,
            WaveType::Sine => (1.0 + cycloidal(value)) * 0.5,
            WaveType::Triangle => triangle_wave(value),
            WaveType::Scallop => cycloidal(value * 0.5).abs(),
            WaveType::Cubic => value * value * (-2.0 * value + 3.0),
            WaveType::Poly => value.powf(self.exponent),
        }
    }
}

fn granite_pattern(p: Vector3, generator: NoiseGen) -> f64 {
    let tv1 = p * 4.0;
    let mut result = 0.0;
    let mut freq = 1.0;
    for _ in 0..6 {
        let tv2 = tv1 * freq;
        let temp = if generator == NoiseGen::Original {
            (0.5 - noise(tv2, generator)).abs()
        } else {
            let t = (1.0 - 2.0 * noise(tv2, generator)).abs();
            t.min(0.5)
        };
        result += temp / freq;
        freq *= 2.0;
    }
    result
}

fn wrinkles_pattern(p: Vector3, generator: NoiseGen) -> f64 {
    let folded = |q: Vector3| -> f64 {
        if generator as i32 > 1 {
            clamp(noise(q, generator) * 2.0 - 0.5, 0.0, 1.0)
        } else {
            noise(q, generator)
        }
    };

    let mut value = folded(p);
    let mut lambda = 2.0;
    let mut omega = 0.5;
    for _ in 1..10 {
        value += omega * folded(p * lambda);
        lambda *= 2.0;
        omega *= 0.5;
    }
    value / 2.0
}

fn agate_pattern(p: Vector3, turb_scale: f64, warps: &[Warp], generator: NoiseGen) -> f64 {
    let turb = search_for_turb(warps).cloned().unwrap_or_default();
    let turb_val = turb_scale * turbulence(p, &turb, generator);
    let mut value = 0.5 * (cycloidal(1.3 * turb_val + 1.1 * p.z) + 1.0);
    if value < 0.0 {
        value = 0.0;
    } else {
        value = value.min(1.0);
        value = value.powf(0.77);
    }
    value
}

fn marble_pattern(p: Vector3, warps: &[Warp], generator: NoiseGen) -> f64 {
    let turb_val = match search_for_turb(warps) {
        Some(turb) => turb.turbulence.x * turbulence(p, turb, generator),
        None => 0.0,
    };
    p.x + turb_val
}

fn wood_pattern(p: Vector3, warps: &[Warp]) -> f64 {
    let (wx, wy) = match search_for_turb(warps) {
        Some(turb) => {
            let wt = dturbulence(p, turb);
            (
                cycloidal((p.x + wt.x) * turb.turbulence.x),
                cycloidal((p.y + wt.y) * turb.turbulence.y),
            )
        }
        None => (0.0, 0.0),
    };
    let x = p.x + wx;
    let y = p.y + wy;
    (x * x + y * y).sqrt()
}

fn checker_pattern(p: Vector3) -> f64 {
    let value = (p.x + crate::math::EPSILON).floor()
        + (p.y + crate::math::EPSILON).floor()
        + (p.z + crate::math::EPSILON).floor();
    if (value as i64) & 1 != 0 {
        1.0
    } else {
        0.0
    }
}

fn slope_pattern(p: Vector3, params: &SlopeParams, ctx: &PatternEvalCtx) -> f64 {
    let normal = match ctx.pnormal {
        Some(n) => n,
        None => return 0.0,
    };

    let mut value1 = if params.point_at {
        (params.slope_vector - p).normalize().dot(normal)
    } else if params.slope_base > 0 {
        crate::math::component(normal, (params.slope_base - 1) as usize)
    } else if params.slope_base < 0 {
        -crate::math::component(normal, (-params.slope_base - 1) as usize)
    } else {
        normal.dot(params.slope_vector)
    };

    value1 = clamp(value1, -1.0, 1.0);
    value1 = value1.asin() / std::f64::consts::PI * 2.0;
    value1 = (value1 + 1.0) * 0.5;

    if params.slope_mod.1 != 0.0 {
        value1 = (value1 - params.slope_mod.0) / params.slope_mod.1;
    }

    if params.altit_len == 0.0 {
        // No altitude component configured.
        if value1 == 1.0 {
            return value1 - crate::math::EPSILON;
        }
        return if value1 < 0.0 {
            1.0 + value1 % 1.0
        } else {
            value1 % 1.0
        };
    }

    let mut value2 = if params.altit_base > 0 {
        crate::math::component(p, (params.altit_base - 1) as usize)
    } else if params.altit_base < 0 {
        -crate::math::component(p, (-params.altit_base - 1) as usize)
    } else {
        p.dot(params.altit_vector)
    };

    if params.altit_mod.1 != 0.0 {
        value2 = (value2 - params.altit_mod.0) / params.altit_mod.1;
    }

    let value = params.slope_len * value1 + params.altit_len * value2;

    // 1.0 comes up exactly all the time; keep it at the top of the map
    // rather than wrapping to the bottom.
    if value - 1.0 < crate::math::EPSILON && value >= 1.0 {
        value - crate::math::EPSILON
    } else if value < 0.0 {
        1.0 + value % 1.0
    } else {
        value % 1.0
    }
}

fn aoi_pattern(ctx: &PatternEvalCtx) -> f64 {
    let (normal, direction) = match (ctx.pnormal, ctx.ray_direction) {
        (Some(n), Some(d)) => (n, d),
        _ => return 0.0,
    };
    let cos_angle = clamp(normal.normalize().dot(direction.normalize()), -1.0, 1.0);
    cos_angle.acos() / std::f64::consts::PI
}

fn function_pattern(
    p: Vector3,
    f: &Arc<fn_vm::Function>,
    thread: &mut TraceThreadData<'_>,
) -> f64 {
    let func = f.clone();
    let id = Arc::as_ptr(f) as usize;
    let ctx = thread.fn_context(id);
    ctx.set_local(fn_vm::LOCAL_X, p.x);
    ctx.set_local(fn_vm::LOCAL_Y, p.y);
    ctx.set_local(fn_vm::LOCAL_Z, p.z);
    let value = ctx.evaluate(&func);
    if value > 1.0 {
        value % 1.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_selects_tiles() {
        // The tile at (0.5, 0, 0.5) is tile 0; one cell over in x is tile 1.
        let pattern = TPattern::new(PatternKind::Checker);
        let ctx = PatternEvalCtx::default();
        let mut thread = TraceThreadData::new(0);
        assert_eq!(
            pattern.evaluate_raw(Vector3::new(0.5, 0.0, 0.5), &ctx, &mut thread),
            0.0
        );
        assert_eq!(
            pattern.evaluate_raw(Vector3::new(1.5, 0.0, 0.5), &ctx, &mut thread),
            1.0
        );
    }

    #[test]
    fn scalar_patterns_stay_in_unit_interval() {
        let patterns = vec![
            TPattern::new(PatternKind::Bozo),
            TPattern::new(PatternKind::Dents),
            TPattern::new(PatternKind::Granite),
            TPattern::new(PatternKind::Wrinkles),
            TPattern::new(PatternKind::Agate { turb_scale: 1.0 }),
            TPattern::new(PatternKind::Marble),
            TPattern::new(PatternKind::Wood),
            TPattern::new(PatternKind::Gradient(Vector3::new(1.0, 0.0, 0.0))),
            TPattern::new(PatternKind::Crackle(CrackleParams::default())),
        ];
        let ctx = PatternEvalCtx::default();
        let mut thread = TraceThreadData::new(0);
        for pattern in &patterns {
            for i in 0..40 {
                let p = Vector3::new(i as f64 * 0.73 - 10.0, i as f64 * 0.31, i as f64 * 0.17);
                let v = pattern.evaluate(p, &ctx, &mut thread);
                assert!(v >= 0.0 && v <= 1.0, "{:?} -> {}", pattern.kind, v);
            }
        }
    }

    #[test]
    fn frequency_and_phase_wrap() {
        let mut pattern = TPattern::new(PatternKind::Gradient(Vector3::new(1.0, 0.0, 0.0)));
        pattern.frequency = 2.0;
        pattern.phase = 0.25;
        let ctx = PatternEvalCtx::default();
        let mut thread = TraceThreadData::new(0);
        // Raw value 0.4 -> 0.4*2 + 0.25 = 1.05 -> wraps.
        let v = pattern.evaluate(Vector3::new(0.4, 0.0, 0.0), &ctx, &mut thread);
        assert!((v - (1.05f64 % 1.00001)).abs() < 1.0e-9);
    }

    #[test]
    fn wave_shapes() {
        let mut pattern = TPattern::new(PatternKind::Gradient(Vector3::new(1.0, 0.0, 0.0)));
        let ctx = PatternEvalCtx::default();
        let mut thread = TraceThreadData::new(0);
        let p = Vector3::new(0.25, 0.0, 0.0);

        pattern.wave = WaveType::Sine;
        let v = pattern.evaluate(p, &ctx, &mut thread);
        assert!((v - 1.0).abs() < 1.0e-9); // (1 + sin(pi/2)) / 2

        pattern.wave = WaveType::Triangle;
        let v = pattern.evaluate(p, &ctx, &mut thread);
        assert!((v - 0.5).abs() < 1.0e-9);

        pattern.wave = WaveType::Cubic;
        let v = pattern.evaluate(p, &ctx, &mut thread);
        assert!((v - (0.0625 * 2.5)).abs() < 1.0e-9); // v^2 (3 - 2v)

        pattern.wave = WaveType::Poly;
        pattern.exponent = 2.0;
        let v = pattern.evaluate(p, &ctx, &mut thread);
        assert!((v - 0.0625).abs() < 1.0e-9);
    }

    #[test]
    fn gradient_projects_and_wraps() {
        let pattern = TPattern::new(PatternKind::Gradient(Vector3::new(0.0, 1.0, 0.0)));
        let ctx = PatternEvalCtx::default();
        let mut thread = TraceThreadData::new(0);
        let v = pattern.evaluate_raw(Vector3::new(0.0, 2.75, 0.0), &ctx, &mut thread);
        assert!((v - 0.75).abs() < 1.0e-12);
    }

    #[test]
    fn aoi_is_angle_fraction() {
        let pattern = TPattern::new(PatternKind::Aoi);
        let ctx = PatternEvalCtx {
            pnormal: Some(Vector3::new(0.0, 0.0, 1.0)),
            ray_direction: Some(Vector3::new(0.0, 0.0, -1.0)),
            ..PatternEvalCtx::default()
        };
        let mut thread = TraceThreadData::new(0);
        // Head-on: angle pi -> value 1.
        let v = pattern.evaluate_raw(Vector3::new(0.0, 0.0, 0.0), &ctx, &mut thread);
        assert!((v - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn slope_of_up_normal_is_top_of_range() {
        let pattern = TPattern::new(PatternKind::Slope(SlopeParams::default()));
        let ctx = PatternEvalCtx {
            pnormal: Some(Vector3::new(0.0, 1.0, 0.0)),
            ..PatternEvalCtx::default()
        };
        let mut thread = TraceThreadData::new(0);
        let v = pattern.evaluate_raw(Vector3::new(0.0, 0.0, 0.0), &ctx, &mut thread);
        // asin(1)/pi*2 normalised -> 1, nudged below the wrap.
        assert!(v > 0.99 && v < 1.0);
    }

    #[test]
    fn function_pattern_uses_thread_context() {
        let f = Arc::new(fn_vm::builders::local(fn_vm::LOCAL_X));
        let pattern = TPattern::new(PatternKind::Function(f));
        let ctx = PatternEvalCtx::default();
        let mut thread = TraceThreadData::new(0);
        let v = pattern.evaluate_raw(Vector3::new(0.375, 9.0, 9.0), &ctx, &mut thread);
        assert_eq!(v, 0.375);
        assert_eq!(thread.fn_contexts.len(), 1);
    }

    #[test]
    fn marble_with_turbulence_shifts_bands() {
        let plain = TPattern::new(PatternKind::Marble);
        let turbed = TPattern::new(PatternKind::Marble).with_turbulence(Turb {
            turbulence: Vector3::new(0.5, 0.5, 0.5),
            ..Turb::default()
        });
        let ctx = PatternEvalCtx::default();
        let mut thread = TraceThreadData::new(0);
        let p = Vector3::new(0.4, 0.2, 0.9);
        assert_ne!(
            plain.evaluate(p, &ctx, &mut thread),
            turbed.evaluate(p, &ctx, &mut thread)
        );
    }
}
