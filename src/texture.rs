#![allow(dead_code)]

//! The shading attachments patterns feed: blend maps, pigments, normal
//! perturbation and the finish terms the integrator consumes.

use crate::colour::{RgbColour, TransColour};
use crate::math::Vector3;
use crate::pattern::{PatternEvalCtx, PatternKind, TPattern};
use crate::thread::TraceThreadData;

/// One stop of a blend map.
#[derive(Debug, Clone)]
pub struct BlendMapEntry<T> {
    pub value: f64,
    pub item: T,
}

/// An ordered list of (threshold, item) stops a pattern scalar indexes
/// into.
#[derive(Debug, Clone)]
pub struct BlendMap<T> {
    entries: Vec<BlendMapEntry<T>>,
}

impl<T> BlendMap<T> {
    /// Entries must be sorted ascending by value.
    pub fn new(entries: Vec<BlendMapEntry<T>>) -> BlendMap<T> {
        debug_assert!(entries.windows(2).all(|w| w[0].value <= w[1].value));
        BlendMap { entries }
    }

    pub fn entries(&self) -> &[BlendMapEntry<T>] {
        &self.entries
    }

    /// The two stops bracketing `value` and the blend fraction between
    /// them. A value past the last stop clamps to it; the scan stops at
    /// the first stop at or above the value.
    pub fn search(&self, value: f64) -> (&BlendMapEntry<T>, &BlendMapEntry<T>, f64) {
        let last = self.entries.len() - 1;

        if value >= self.entries[last].value {
            let e = &self.entries[last];
            return (e, e, 0.0);
        }

        let mut prev = 0;
        let mut cur = 0;
        while value > self.entries[cur].value {
            prev = cur;
            cur += 1;
        }
        if value == self.entries[cur].value {
            prev = cur;
        }

        let p = &self.entries[prev];
        let c = &self.entries[cur];
        let fraction = if prev == cur || c.value <= p.value {
            0.0
        } else {
            (value - p.value) / (c.value - p.value)
        };
        (p, c, fraction)
    }
}

/// A pigment: a pattern plus the map translating its scalar into colour.
#[derive(Debug, Clone)]
pub struct Pigment {
    pub pattern: TPattern,
    pub map: PigmentMap,
    /// Fast preview colour used when quality settings skip evaluation.
    pub quick_colour: Option<TransColour>,
}

#[derive(Debug, Clone)]
pub enum PigmentMap {
    /// No pattern dependence at all.
    Solid(TransColour),
    /// Continuous colour map.
    Colours(BlendMap<TransColour>),
    /// Discrete pigment list for the block patterns (checker, hexagon,
    /// square, triangular), or nested pigments for continuous patterns.
    Pigments(Vec<Pigment>),
}

impl Pigment {
    pub fn solid(colour: TransColour) -> Pigment {
        Pigment {
            pattern: TPattern::new(PatternKind::Bozo),
            map: PigmentMap::Solid(colour),
            quick_colour: None,
        }
    }

    pub fn new(pattern: TPattern, map: PigmentMap) -> Pigment {
        Pigment {
            pattern,
            map,
            quick_colour: None,
        }
    }

    pub fn evaluate(
        &self,
        point: Vector3,
        ctx: &PatternEvalCtx,
        thread: &mut TraceThreadData<'_>,
    ) -> TransColour {
        match self.map {
            PigmentMap::Solid(colour) => colour,
            PigmentMap::Colours(ref map) => {
                let value = self.pattern.evaluate(point, ctx, thread);
                let (prev, cur, fraction) = map.search(value);
                prev.item.lerp(&cur.item, fraction)
            }
            PigmentMap::Pigments(ref items) => {
                if items.is_empty() {
                    return TransColour::opaque(RgbColour::BLACK);
                }
                if self.pattern.is_block_pattern() {
                    // Block patterns yield a small tile index directly.
                    let value = self.pattern.evaluate_raw(point, ctx, thread);
                    let idx = (value as usize).min(items.len() - 1);
                    items[idx].evaluate(point, ctx, thread)
                } else {
                    let value = self.pattern.evaluate(point, ctx, thread);
                    let idx = ((value * items.len() as f64) as usize).min(items.len() - 1);
                    items[idx].evaluate(point, ctx, thread)
                }
            }
        }
    }
}

/// Media density stack evaluation: the pigment colours multiply.
pub fn evaluate_density_pigments(
    pigments: &[Pigment],
    point: Vector3,
    thread: &mut TraceThreadData<'_>,
) -> RgbColour {
    let ctx = PatternEvalCtx::default();
    let mut colour = RgbColour::WHITE;
    for pigment in pigments {
        colour *= pigment.evaluate(point, &ctx, thread).colour;
    }
    colour
}

/// Pattern-driven normal perturbation.
#[derive(Debug, Clone)]
pub struct Tnormal {
    pub pattern: TPattern,
    pub amount: f64,
    /// Step used by the gradient estimate.
    pub delta: f64,
}

impl Tnormal {
    pub fn new(pattern: TPattern, amount: f64) -> Tnormal {
        Tnormal {
            pattern,
            amount,
            delta: 0.02,
        }
    }

    pub fn perturb(
        &self,
        normal: Vector3,
        point: Vector3,
        ctx: &PatternEvalCtx,
        thread: &mut TraceThreadData<'_>,
    ) -> Vector3 {
        let perturbed = match self.pattern.kind {
            // The noise-displacement normals have dedicated fast paths.
            PatternKind::Bumps => normal + crate::pattern::noise::dnoise(point) * self.amount,
            PatternKind::Dents => {
                let n = crate::pattern::noise::noise(
                    point,
                    self.pattern
                        .noise_generator
                        .unwrap_or(ctx.default_noise_gen),
                );
                let stir = crate::pattern::noise::dnoise(point) * (n * n * n);
                normal + stir * self.amount
            }
            _ => {
                // Nudge the normal down the pattern gradient.
                let f0 = self.pattern.evaluate(point, ctx, thread);
                let d = self.delta;
                let grad = Vector3::new(
                    self.pattern
                        .evaluate(point + Vector3::new(d, 0.0, 0.0), ctx, thread)
                        - f0,
                    self.pattern
                        .evaluate(point + Vector3::new(0.0, d, 0.0), ctx, thread)
                        - f0,
                    self.pattern
                        .evaluate(point + Vector3::new(0.0, 0.0, d), ctx, thread)
                        - f0,
                ) / d;
                normal - grad * self.amount
            }
        };

        let len = perturbed.length();
        if len == 0.0 {
            normal
        } else {
            perturbed / len
        }
    }
}

/// Surface finish terms consumed by the direct-lighting integrator.
#[derive(Debug, Clone, PartialEq)]
pub struct Finish {
    pub ambient: RgbColour,
    pub diffuse: f64,
}

impl Default for Finish {
    fn default() -> Finish {
        Finish {
            ambient: RgbColour::splat(0.1),
            diffuse: 0.6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub pigment: Pigment,
    pub normal: Option<Tnormal>,
    pub finish: Finish,
}

impl Texture {
    pub fn new(pigment: Pigment) -> Texture {
        Texture {
            pigment,
            normal: None,
            finish: Finish::default(),
        }
    }
}
