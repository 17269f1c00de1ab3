#![allow(dead_code)]

//! Closed-form tilings of the xz plane.
//!
//! The continuous tilings return a per-tile distance ramp packed into
//! disjoint value bands so a blend map can colour tile kinds separately;
//! the discrete ones (hexagon/square/triangular) return a small tile
//! index. The Penrose tilings recursively deflate half-kites and
//! half-darts (P2/P3) or the pentagon family (P1); their empirically tuned
//! distance factors and the band-separating epsilon are load-bearing and
//! reproduced exactly.

use crate::math::{max3, Vector3};

const SQRT3_2: f64 = 0.86602540378443864676372317075294;
const SQRT3: f64 = 1.7320508075688772935274463415059;
const SQRT2: f64 = 1.4142135623730950488016887242097;
const SQRT2_2: f64 = 0.70710678118654752440084436210485;

const SIN18: f64 = 0.30901699437494742410229341718282;
const SIN36: f64 = 0.58778525229247312916870595463907;
const SIN54: f64 = 0.80901699437494742410229341718282;
const SIN72: f64 = 0.95105651629515357211643933337938;
const SIN108: f64 = SIN72;
const SIN144: f64 = SIN36;
const SIN162: f64 = SIN18;
const COS18: f64 = SIN72;
const COS36: f64 = SIN54;
const COS54: f64 = SIN36;
const COS72: f64 = SIN18;
const COS108: f64 = -COS72;
const COS126: f64 = -COS54;
const COS144: f64 = -COS36;
const COS162: f64 = -COS18;
const TAN18: f64 = 0.32491969623290632615587141221513;
const TAN36: f64 = 0.72654252800536088589546675748062;
const TAN54: f64 = 1.3763819204711735382072095819109;
const TAN72: f64 = 3.0776835371752534025702905760369;
const TAN108: f64 = -TAN72;
const TAN126: f64 = -TAN54;
const TAN144: f64 = -TAN36;
const TAN162: f64 = -TAN18;

const PHI: f64 = 1.6180339887498948482045868343656;
const INVPHI: f64 = 0.61803398874989484820458683436564;
const SQRPHI: f64 = 2.6180339887498948482045868343656;
const INVSQRPHI: f64 = 0.38196601125010515179541316563436;

const TILING_EPSILON: f64 = 1e-6;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TilingKind {
    Square,
    Hexagon,
    Triangle,
    Lozenge,
    Rhombus,
    SquareInternal,
    SquareInternal5,
    Penrose1Pentagon,
    PenroseKiteDart,
    PenroseRhombus,
}

pub fn tiling_pattern(point: Vector3, kind: TilingKind) -> f64 {
    match kind {
        TilingKind::Square => tiling_square(point),
        TilingKind::Hexagon => tiling_hexagon(point),
        TilingKind::Triangle => tiling_triangle(point),
        TilingKind::Lozenge => tiling_lozenge(point),
        TilingKind::Rhombus => tiling_rhombus(point),
        TilingKind::SquareInternal => tiling_square_internal(point),
        TilingKind::SquareInternal5 => tiling_square_internal_5(point),
        TilingKind::Penrose1Pentagon => tiling_penrose1(point, false),
        TilingKind::PenroseKiteDart => tiling_penrose(point, false, false),
        TilingKind::PenroseRhombus => tiling_penrose(point, true, false),
    }
}

/// Classical square tiling.
fn tiling_square(p: Vector3) -> f64 {
    let mut x = p.x.abs();
    x -= x.floor();
    let x = 2.0 * (x - 0.5).abs();

    let mut z = p.z.abs();
    z -= z.floor();
    let z = 2.0 * (z - 0.5).abs();

    x.max(z)
}

/// Classical hexagon tiling.
fn tiling_hexagon(p: Vector3) -> f64 {
    let mut x = p.x;
    let mut z = p.z;
    x += 0.5;
    x -= 3.0 * (x / 3.0).floor();
    z -= SQRT3 * (z / SQRT3).floor();

    if z > SQRT3_2 {
        z = SQRT3 - z;
    }
    if x > 1.5 {
        x -= 1.5;
        z = SQRT3_2 - z;
    }
    if SQRT3 * x + z < SQRT3_2 {
        x = 0.5 - x;
        z = SQRT3_2 - z;
    }
    if x > 1.0 {
        x = 2.0 - x;
    }

    let dist1 = 1.0 - z / SQRT3_2;
    let dist2 = 1.0 - (SQRT3 * x + z - SQRT3_2) / SQRT3;
    let answer = dist1.max(dist2);
    answer.max(0.0).min(1.0)
}

fn tiling_triangle(p: Vector3) -> f64 {
    let mut x = p.x;
    let mut z = p.z;
    let mut delta = 0i32;
    x -= x.floor();
    z -= SQRT3 * (z / SQRT3).floor();

    if z > SQRT3_2 {
        z = SQRT3 - z;
        delta = 1 - delta;
    }
    if x > 0.5 {
        x = 1.0 - x;
    }
    if x != 0.0 {
        let slop1 = z / x;
        if slop1 > SQRT3 {
            z = SQRT3_2 - z;
            x = 0.5 - x;
            delta = 1 - delta;
        }
    } else {
        z = SQRT3_2 - z;
        x = 0.5;
    }
    let dist1 = 1.0 - z * 2.0 * SQRT3;
    let dist2 = 1.0 - (SQRT3 * x - z) * SQRT3;
    delta as f64 / 2.0 + 0.5 * dist1.max(dist2)
}

fn tiling_lozenge(p: Vector3) -> f64 {
    let mut x = p.x;
    let mut z = p.z;

    x -= x.floor();
    z -= SQRT3 * (z / SQRT3).floor();

    if z > SQRT3_2 {
        z -= SQRT3_2;
        x += 0.5;
    }
    if 2.0 * z > SQRT3_2 {
        z = SQRT3_2 - z;
        x = 1.5 - x;
    }
    if x > 0.75 {
        x -= 1.0;
    }
    if x != 0.0 {
        let slop1 = z / x;
        if slop1 > SQRT3 {
            z = SQRT3_2 - z;
            x = 0.5 - x;
        }
    }
    let dist1 = 1.0 - z * 4.0 * SQRT3 / 3.0;
    let dist2 = 1.0 - (SQRT3 * x - z).abs() * SQRT3 * 2.0 / 3.0;
    dist1.max(dist2)
}

fn tiling_rhombus(p: Vector3) -> f64 {
    let mut x = p.x;
    let mut z = p.z;
    let mut delta = 0i32;
    x += 0.5;
    x -= 3.0 * (x / 3.0).floor();
    z -= SQRT3 * (z / SQRT3).floor();

    if z > SQRT3_2 {
        z = SQRT3 - z;
        delta = 2 - delta;
    }
    if x > 1.5 {
        x -= 1.5;
        z = SQRT3_2 - z;
        delta = 2 - delta;
    }
    if x < 0.5 {
        x = 1.0 - x;
        delta = 2 - delta;
    }
    x -= 0.5;
    if x != 0.0 {
        let slop1 = z / x;
        if slop1 > SQRT3 {
            // Rotate the vertical rhombus onto the horizontal one.
            let dist1 = x / 2.0 + z * SQRT3_2;
            let dist2 = z / 2.0 - x * SQRT3_2;
            z = dist2;
            x = dist1;
            delta = 1;
        }
    } else {
        let dist1 = x / 2.0 + z * SQRT3_2;
        let dist2 = z / 2.0 - x * SQRT3_2;
        z = dist2;
        x = dist1;
        delta = 1;
    }

    // From here it is the lozenge again.
    if 2.0 * z > SQRT3_2 {
        z = SQRT3_2 - z;
        x = 1.5 - x;
    }
    if x > 0.75 {
        x -= 1.0;
    }
    if x != 0.0 {
        let slop1 = z / x;
        if slop1 > SQRT3 {
            z = SQRT3_2 - z;
            x = 0.5 - x;
        }
    }
    let dist1 = 1.0 - z * 4.0 * SQRT3 / 3.0;
    let dist2 = 1.0 - (SQRT3 * x - z).abs() * SQRT3 * 2.0 / 3.0;
    let answer = dist1.max(dist2) / 3.0 + delta as f64 / 3.0;
    answer.max(0.0).min(1.0)
}

fn tiling_square_internal(p: Vector3) -> f64 {
    let mut x = p.x * SQRT2;
    x -= 4.0 * (x / 4.0).floor();
    x -= 2.0;
    let x = x.abs();

    let mut z = p.z * SQRT2;
    z -= 4.0 * (z / 4.0).floor();
    z -= 2.0;
    let z = z.abs();

    let value_x = x as i32;
    let value_z = z as i32;

    match value_x + value_z * 2 {
        0 => {
            let x = ((x - 0.5).max(0.0)) * 2.0;
            let z = ((z - 0.5).max(0.0)) * 2.0;
            x.max(z) / 3.0
        }
        1 => {
            let mut answer = (2.0 + (1.5 - x).abs() * 2.0) / 3.0;
            if z > 0.5 {
                let dist2 = (3.0 - SQRT2 * (x - z).abs()) / 3.0;
                answer = answer.max(dist2);
            }
            answer
        }
        2 => {
            let mut answer = (1.0 + (1.5 - z).abs() * 2.0) / 3.0;
            if x > 0.5 {
                let dist2 = (2.0 - SQRT2 * (x - z).abs()) / 3.0;
                answer = answer.max(dist2);
            }
            answer
        }
        _ => {
            if x > z {
                let dist1 = (2.0 + (1.5 - x).abs() * 2.0) / 3.0;
                let dist2 = (3.0 - SQRT2 * (z - x).abs()) / 3.0;
                dist1.max(dist2)
            } else {
                let dist1 = (1.0 + (1.5 - z).abs() * 2.0) / 3.0;
                let dist2 = (2.0 - SQRT2 * (x - z).abs()) / 3.0;
                dist1.max(dist2)
            }
        }
    }
}

fn tiling_square_internal_5(p: Vector3) -> f64 {
    let mut x = p.x * SQRT2;
    x -= 4.0 * (x / 4.0).floor();
    x -= 2.0;
    let mir_x = if x < 0.0 { 1.0 } else { 0.0 };
    let x = x.abs();

    let mut z = p.z * SQRT2;
    z -= 4.0 * (z / 4.0).floor();
    z -= 2.0;
    let mir_z = if z < 0.0 { 2.0 } else { 3.0 };
    let z = z.abs();

    let value_x = x as i32;
    let value_z = z as i32;

    match value_x + value_z * 2 {
        0 => {
            let x = ((x - 0.5).max(0.0)) * 2.0;
            let z = ((z - 0.5).max(0.0)) * 2.0;
            // The offset keeps the centre band clear of the others.
            (4.000001 + x.max(z)) / 5.0
        }
        1 => {
            let mut answer = (1.5 - x).abs() * 2.0;
            if z > 0.5 {
                let dist2 = 1.0 - SQRT2 * (x - z).abs();
                answer = answer.max(dist2);
            }
            (answer + mir_x) / 5.0
        }
        2 => {
            let mut answer = (1.5 - z).abs() * 2.0;
            if x > 0.5 {
                let dist2 = 1.0 - SQRT2 * (x - z).abs();
                answer = answer.max(dist2);
            }
            (answer + mir_z) / 5.0
        }
        _ => {
            if x > z {
                let dist1 = (1.5 - x).abs() * 2.0;
                let dist2 = 1.0 - SQRT2 * (z - x).abs();
                (dist1.max(dist2) + mir_x) / 5.0
            } else {
                let dist1 = (1.5 - z).abs() * 2.0;
                let dist2 = 1.0 - SQRT2 * (x - z).abs();
                (dist1.max(dist2) + mir_z) / 5.0
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Penrose P2 ("kite and dart") and P3 ("rhombus") tilings by recursive
// half-kite / half-dart deflation.

fn tiling_penrose_halfkite(p_x: f64, p_z: f64, depth: i32, rhombs: bool) -> f64 {
    let mut x = p_x;
    let mut z = p_z.abs();

    if depth > 0 {
        if z < (x - INVPHI) * TAN144 {
            tiling_penrose_halfdart(x * PHI, z * PHI, depth - 1, rhombs)
        } else {
            x -= COS36;
            z -= SIN36;
            let rot_x = x * COS108 - z * SIN108;
            let rot_z = z * COS108 + x * SIN108;
            tiling_penrose_halfkite(rot_x * PHI, rot_z * PHI, depth - 1, rhombs)
        }
    } else if rhombs {
        if z < (x - INVPHI) * TAN72 {
            let dist1 = (SIN72 * (x - INVPHI) - COS72 * z).abs() * 5.55;
            let dist2 = (SIN108 * (x - 1.0) - COS108 * z).abs() * 5.55;
            max3(1.0 - dist1 / 2.0, 1.0 - dist2 / 2.0, 0.5 + TILING_EPSILON)
        } else {
            let dist1 = z.abs() * 5.55;
            let dist2 = (SIN72 * (x - INVPHI) - COS72 * z).abs() * 5.55;
            max3(0.5 - dist1 / 2.0, 0.5 - dist2 / 2.0, 0.0).min(0.5 - TILING_EPSILON)
        }
    } else {
        let dist1 = (SIN36 * x - COS36 * z).abs() * 4.46;
        let dist2 = (SIN108 * (x - 1.0) - COS108 * z).abs() * 4.46;
        max3(0.5 - dist1 / 2.0, 0.5 - dist2 / 2.0, 0.0).min(0.5 - TILING_EPSILON)
    }
}

fn tiling_penrose_halfdart(p_x: f64, p_z: f64, depth: i32, rhombs: bool) -> f64 {
    let mut x = p_x;
    let z = p_z.abs();

    if depth > 0 {
        if z < (x - INVPHI) * TAN108 {
            let rot_x = x * COS36 + z * SIN36;
            let rot_z = z * COS36 - x * SIN36;
            tiling_penrose_halfkite(rot_x * PHI, rot_z * PHI, depth - 1, rhombs)
        } else {
            x -= 1.0;
            let rot_x = x * COS144 + z * SIN144;
            let rot_z = z * COS144 - x * SIN144;
            tiling_penrose_halfdart(rot_x * PHI, rot_z * PHI, depth - 1, rhombs)
        }
    } else if rhombs {
        let dist1 = (SIN36 * x - COS36 * z).abs() * 5.55;
        let dist2 = (SIN144 * (x - 1.0) - COS144 * z).abs() * 5.55;
        max3(0.5 - dist1 / 2.0, 0.5 - dist2 / 2.0, 0.0).min(0.5 - TILING_EPSILON)
    } else {
        let dist1 = z.abs() * 4.46;
        let dist2 = (SIN144 * (x - 1.0) - COS144 * z).abs() * 4.46;
        max3(1.0 - dist1 / 2.0, 1.0 - dist2 / 2.0, 0.5 + TILING_EPSILON)
    }
}

/// P2/P3 Penrose tiling. `rhombs` selects P3; `center_flag` chooses the
/// rosette at the origin (star vs sun for P2, decagon vs pointed star for
/// P3).
fn tiling_penrose(p: Vector3, rhombs: bool, center_flag: bool) -> f64 {
    let mut x = p.x;
    let mut z = p.z;

    let r = (x * x + z * z).sqrt();
    if r <= crate::math::EPSILON {
        return 1.0;
    }

    z = z.abs();

    // Exploit the five-fold rotational and mirror symmetry.
    if x < r * COS36 {
        let (rot_sin, rot_cos) = if x < r * COS108 {
            (SIN144, COS144)
        } else {
            (SIN72, COS72)
        };
        let rot_x = x * rot_cos + z * rot_sin;
        let rot_z = z * rot_cos - x * rot_sin;
        x = rot_x;
        z = rot_z.abs();
    }

    if rhombs {
        x *= INVPHI;
        z *= INVPHI;
    }

    let dist = (SIN108 * x - COS108 * z).abs() / COS18;
    let mut depth = (dist.ln() / SQRPHI.ln()).ceil() as i32;
    if depth < 0 {
        depth = 0;
    }

    x *= INVSQRPHI.powi(depth);
    z *= INVSQRPHI.powi(depth);

    if depth % 2 != 0 {
        let rot_x = x * COS36 + z * SIN36;
        let rot_z = z * COS36 - x * SIN36;
        x = rot_x;
        z = rot_z.abs();
    }

    let mut depth = depth * 2;

    if center_flag {
        depth += 1;
        x *= INVPHI;
        z *= INVPHI;
    }

    tiling_penrose_halfkite(x, z, depth, rhombs)
}

// ---------------------------------------------------------------------------
// Penrose P1: pentagons, pentagrams, boats and diamonds.

fn penrose1_pentagon_symmetry_r(x: &mut f64, z: &mut f64, r: f64) {
    *z = z.abs();

    if *x < r * COS36 {
        let (rot_sin, rot_cos) = if *x < r * COS108 {
            (SIN144, COS144)
        } else {
            (SIN72, COS72)
        };
        let rot_x = *x * rot_cos + *z * rot_sin;
        let rot_z = *z * rot_cos - *x * rot_sin;
        *x = rot_x;
        *z = rot_z.abs();
    }
}

fn penrose1_pentagon_symmetry(x: &mut f64, z: &mut f64) {
    let r = (*x * *x + *z * *z).sqrt();
    penrose1_pentagon_symmetry_r(x, z, r);
}

fn penrose1_pentagon_dist(p_x: f64, _p_z: f64) -> f64 {
    (p_x - 0.5 / TAN36).abs() * 5.55 * INVPHI
}

fn tiling_penrose1_pentagon1(p_x: f64, p_z: f64, depth: i32) -> f64 {
    let mut x = p_x;
    let mut z = p_z.abs();

    penrose1_pentagon_symmetry(&mut x, &mut z);

    if depth > 0 {
        if z < (x - 0.5 / TAN36) * TAN54 + 0.5 {
            let rot_x = x - 0.5 / TAN36 - INVPHI * 0.5 * COS72 / SIN36;
            let rot_z = z;
            tiling_penrose1_pentagon2(rot_x * PHI, rot_z * PHI, depth - 1, false)
        } else {
            let rot_x = x * COS36 + z * SIN36;
            let rot_z = z * COS36 - x * SIN36;
            tiling_penrose1_star(rot_x * PHI, rot_z * PHI, depth - 1)
        }
    } else {
        let dist = penrose1_pentagon_dist(x, z);
        (1.0 / 6.0 - dist / 6.0).max(0.0).min(1.0 / 6.0 - TILING_EPSILON)
    }
}

fn tiling_penrose1_pentagon2(p_x: f64, p_z: f64, depth: i32, inside_quad: bool) -> f64 {
    let mut x = p_x;
    let mut z = p_z.abs();

    if depth > 0 {
        if inside_quad {
            if z < (x - INVSQRPHI * 0.5 / SIN36) * TAN54 {
                let rot_x = x - 0.5 / SIN36;
                let rot_z = z;
                tiling_penrose1_pentagon1(rot_x * PHI, rot_z * PHI, depth - 1)
            } else if z < (x - INVSQRPHI * 0.5 / SIN36) * TAN162 {
                let rot_x = -x;
                let rot_z = z;
                tiling_penrose1_diamond(rot_x * PHI, rot_z * PHI, depth - 1, true)
            } else {
                let rot_x = x * COS108 - z * SIN108 + INVPHI * 0.5 / SIN36;
                let rot_z = z * COS108 + x * SIN108;
                tiling_penrose1_pentagon2(rot_x * PHI, rot_z * PHI, depth - 1, true)
            }
        } else if z < (x + 0.5 / SIN36) * TAN18 {
            let rot_x = x + 0.5 / SIN36 - INVSQRPHI * 0.5 / SIN36;
            let rot_z = z;
            tiling_penrose1_diamond(rot_x * PHI, rot_z * PHI, depth - 1, false)
        } else {
            let rot_x = -(x * COS36 + z * SIN36) - COS72 * 0.5 / SIN36;
            let rot_z = (z * COS36 - x * SIN36) - SIN72 * 0.5 / SIN36;
            tiling_penrose1_pentagon3(rot_x * PHI, rot_z * PHI, depth - 1, false)
        }
    } else {
        penrose1_pentagon_symmetry(&mut x, &mut z);
        let dist = penrose1_pentagon_dist(x, z);
        (2.0 / 6.0 - dist / 6.0)
            .max(1.0 / 6.0 + TILING_EPSILON)
            .min(2.0 / 6.0 - TILING_EPSILON)
    }
}

fn tiling_penrose1_pentagon3(p_x: f64, p_z: f64, depth: i32, inside_wedge: bool) -> f64 {
    let mut x = p_x;
    let mut z = p_z.abs();

    if depth > 0 {
        if inside_wedge && x > INVSQRPHI * 0.5 * COS72 / SIN36 {
            let rot_x = -(x - INVSQRPHI * 0.5 * COS72 / SIN36 - INVPHI * 0.5 / TAN36);
            let rot_z = z;
            tiling_penrose1_pentagon2(rot_x * PHI, rot_z * PHI, depth - 1, true)
        } else if !inside_wedge && x < 0.5 * COS108 / SIN36 {
            let rot_x = x * COS144 + z * SIN144 - 0.5 / SIN36;
            let rot_z = z * COS144 - x * SIN144;
            tiling_penrose1_pentagon2(rot_x * PHI, rot_z * PHI, depth - 1, false)
        } else if !inside_wedge && z > (x - INVSQRPHI * 0.5 / SIN36) * TAN126 {
            let rot_x = -(x * COS36 - z * SIN36) - COS72 * 0.5 / SIN36;
            let rot_z = (z * COS36 + x * SIN36) - SIN72 * 0.5 / SIN36;
            tiling_penrose1_pentagon3(rot_x * PHI, rot_z * PHI, depth - 1, false)
        } else {
            tiling_penrose1_boat(x * PHI, z * PHI, depth - 1, inside_wedge)
        }
    } else {
        penrose1_pentagon_symmetry(&mut x, &mut z);
        let dist = penrose1_pentagon_dist(x, z);
        (3.0 / 6.0 - dist / 6.0)
            .max(2.0 / 6.0 + TILING_EPSILON)
            .min(3.0 / 6.0 - TILING_EPSILON)
    }
}

fn tiling_penrose1_star(p_x: f64, p_z: f64, depth: i32) -> f64 {
    let x = p_x;
    let z = p_z.abs();

    if depth > 0 {
        if x < INVPHI * 0.5 / TAN36 {
            tiling_penrose1_pentagon1(x * PHI, z * PHI, depth - 1)
        } else {
            let rot_x = -(x - INVPHI / TAN36);
            let rot_z = z;
            tiling_penrose1_pentagon3(rot_x * PHI, rot_z * PHI, depth - 1, true)
        }
    } else {
        let dist = (SIN162 * (x - PHI * 0.5 / SIN36) - COS162 * z).abs() * 5.55 * INVPHI;
        (4.0 / 6.0 - dist / 6.0)
            .max(3.0 / 6.0 + TILING_EPSILON)
            .min(4.0 / 6.0 - TILING_EPSILON)
    }
}

fn tiling_penrose1_boat(p_x: f64, p_z: f64, depth: i32, inside_wedge: bool) -> f64 {
    let mut x = p_x;
    let mut z = p_z.abs();

    if depth > 0 {
        if inside_wedge && x > PHI * 0.5 * COS108 / SIN36 {
            let rot_x = -x;
            let rot_z = z;
            tiling_penrose1_pentagon1(rot_x * PHI, rot_z * PHI, depth - 1)
        } else {
            let (mut rot_x, rot_z) = if inside_wedge {
                (x, z)
            } else {
                (x * COS72 - z * SIN72, z * COS72 + x * SIN72)
            };
            rot_x += 0.5 / SIN36;
            tiling_penrose1_pentagon3(rot_x * PHI, rot_z * PHI, depth - 1, true)
        }
    } else {
        let dist1 = (x - INVPHI * 0.5 * COS72 / SIN36).abs() * 5.55 * INVPHI;
        x = -x;
        penrose1_pentagon_symmetry(&mut x, &mut z);
        let dist2 = (SIN162 * (x - PHI * 0.5 / SIN36) - COS162 * z).abs() * 5.55 * INVPHI;
        max3(
            5.0 / 6.0 - dist1 / 6.0,
            5.0 / 6.0 - dist2 / 6.0,
            4.0 / 6.0 + TILING_EPSILON,
        )
        .min(5.0 / 6.0 - TILING_EPSILON)
    }
}

fn tiling_penrose1_diamond(p_x: f64, p_z: f64, depth: i32, side_a: bool) -> f64 {
    let x = p_x;
    let z = p_z.abs();

    if depth > 0 {
        if side_a {
            tiling_penrose1_pentagon1(x * PHI, z * PHI, depth - 1)
        } else {
            tiling_penrose1_pentagon3(x * PHI, z * PHI, depth - 1, true)
        }
    } else {
        let dist = (SIN18 * (x + INVPHI * 0.5 / SIN36) - COS18 * z).abs() * 5.55 * INVPHI;
        (6.0 / 6.0 - dist / 6.0)
            .max(5.0 / 6.0 + TILING_EPSILON)
            .min(6.0 / 6.0 - TILING_EPSILON)
    }
}

/// P1 Penrose tiling: pentagon at the centre (the pentagram-centred
/// variant is reserved by `center_flag`).
fn tiling_penrose1(p: Vector3, _center_flag: bool) -> f64 {
    let mut x = p.x;
    let mut z = p.z;

    let r = (x * x + z * z).sqrt();
    if r <= crate::math::EPSILON {
        return 1.0;
    }

    penrose1_pentagon_symmetry_r(&mut x, &mut z, r);

    let dist = x * 2.0 * TAN36;
    let mut depth = (dist.ln() / (SQRPHI * SQRPHI).ln()).ceil() as i32;
    if depth < 0 {
        depth = 0;
    }

    x *= (INVSQRPHI * INVSQRPHI).powi(depth);
    z *= (INVSQRPHI * INVSQRPHI).powi(depth);

    tiling_penrose1_pentagon1(x, z, depth * 4)
}

// ---------------------------------------------------------------------------
// Discrete multi-colour tilings.

const XFACTOR: f64 = 0.5;
/// sqrt(3)/2: height of an equilateral triangle.
const ZFACTOR: f64 = 0.866025404;

/// Three-colour hexagon tiling of the xz plane; returns exactly 0, 1 or 2.
pub fn hexagon_pattern(p: Vector3) -> f64 {
    let x = p.x.abs();
    // Map negative z to avoid mirroring across the x axis; 5.196152424 is
    // six triangle heights.
    let z = if p.z < 0.0 {
        5.196152424 - p.z.abs()
    } else {
        p.z
    };

    let mut xs = x / XFACTOR;
    let mut zs = z / ZFACTOR;
    xs -= (xs / 6.0).floor() * 6.0;
    zs -= (zs / 6.0).floor() * 6.0;
    let xm = (xs.floor() as i64 % 6) as i32;
    let zm = (zs.floor() as i64 % 6) as i32;

    let value: i32 = match xm {
        0 | 5 => match zm {
            0 | 5 => 0,
            1 | 2 => 1,
            _ => 2,
        },
        2 | 3 => match zm {
            0 | 1 => 2,
            2 | 3 => 0,
            _ => 1,
        },
        _ => {
            // Diagonal blocks: the hexagon edge splits them, with
            // alternating slope.
            let mut xl = xs - xm as f64;
            let zl = zs - zm as f64;
            if (xm + zm) % 2 == 1 {
                xl = 1.0 - xl;
            }
            if xl == 0.0 {
                xl = 0.0001;
            }
            let below = (zl / xl) < 1.0;
            if below {
                match zm {
                    0 | 3 => 0,
                    2 | 5 => 1,
                    _ => 2,
                }
            } else {
                match zm {
                    0 | 3 => 2,
                    2 | 5 => 0,
                    _ => 1,
                }
            }
        }
    };

    (value % 3) as f64
}

/// Four-colour square tiling; returns exactly 0, 1, 2 or 3.
pub fn square_pattern(p: Vector3) -> f64 {
    let value_x = p.x.floor() as i64;
    let value_z = p.z.floor() as i64;

    if value_x & 1 != 0 {
        if value_z & 1 != 0 {
            2.0
        } else {
            3.0
        }
    } else if value_z & 1 != 0 {
        1.0
    } else {
        0.0
    }
}

/// Six-colour triangular tiling around the origin; returns 0..=5.
pub fn triangular_pattern(p: Vector3) -> f64 {
    let mut xs = p.x - 3.0 * (p.x / 3.0).floor();
    let mut zs = p.z - SQRT3 * (p.z / SQRT3).floor();

    let a = xs.floor() as i32;
    xs -= a as f64;
    let b = if zs < SQRT3_2 { 0 } else { 1 };
    if b != 0 {
        zs = SQRT3 - zs;
    }

    let k = 1.0 - xs;
    let mut answer = 1.0;
    if xs != 0.0 && k != 0.0 {
        let slop1 = zs / xs;
        let slop2 = zs / k;
        answer = match (if slop1 < SQRT3 { 1 } else { 0 }) + (if slop2 < SQRT3 { 2 } else { 0 }) {
            3 => 0.0,
            2 => 1.0,
            _ => 3.0,
        };
    }
    let mask = answer as i32;
    answer = if mask & 1 != 0 {
        (answer + 2.0 * a as f64).rem_euclid(6.0)
    } else {
        (6.0 + answer - 2.0 * a as f64).rem_euclid(6.0)
    };
    if b != 0 {
        answer = 5.0 - answer;
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xz(x: f64, z: f64) -> Vector3 {
        Vector3::new(x, 0.0, z)
    }

    #[test]
    fn continuous_tilings_stay_in_range() {
        let kinds = [
            TilingKind::Square,
            TilingKind::Hexagon,
            TilingKind::Triangle,
            TilingKind::Lozenge,
            TilingKind::Rhombus,
            TilingKind::SquareInternal,
            TilingKind::SquareInternal5,
            TilingKind::PenroseKiteDart,
            TilingKind::PenroseRhombus,
            TilingKind::Penrose1Pentagon,
        ];
        for kind in &kinds {
            for i in 0..25 {
                for j in 0..25 {
                    let p = xz(i as f64 * 0.61 - 7.0, j as f64 * 0.43 - 5.0);
                    let v = tiling_pattern(p, *kind);
                    assert!(
                        v >= 0.0 && v <= 1.0,
                        "{:?} out of range: {} at {:?}",
                        kind,
                        v,
                        p
                    );
                }
            }
        }
    }

    #[test]
    fn square_tiling_peaks_on_cell_edges() {
        assert!((tiling_pattern(xz(0.5, 0.5), TilingKind::Square) - 0.0).abs() < 1.0e-12);
        assert!((tiling_pattern(xz(0.0, 0.5), TilingKind::Square) - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn penrose_bands_are_separated() {
        // P2 splits kites (above 0.5) from darts (below 0.5); no value may
        // land exactly on the band split.
        for i in 0..40 {
            for j in 0..40 {
                let p = xz(i as f64 * 0.31 - 6.0, j as f64 * 0.27 - 5.0);
                let v = tiling_pattern(p, TilingKind::PenroseKiteDart);
                assert!((v - 0.5).abs() >= TILING_EPSILON * 0.5);
            }
        }
    }

    #[test]
    fn penrose_is_five_fold_symmetric() {
        let angle = 2.0 * std::f64::consts::PI / 5.0;
        let p = xz(1.3, 0.4);
        let rotated = xz(
            p.x * angle.cos() - p.z * angle.sin(),
            p.z * angle.cos() + p.x * angle.sin(),
        );
        let a = tiling_pattern(p, TilingKind::PenroseKiteDart);
        let b = tiling_pattern(rotated, TilingKind::PenroseKiteDart);
        assert!((a - b).abs() < 1.0e-6, "{} vs {}", a, b);
    }

    #[test]
    fn hexagon_pattern_returns_three_colours() {
        let mut seen = [false; 3];
        for i in 0..30 {
            for j in 0..30 {
                let v = hexagon_pattern(xz(i as f64 * 0.37, j as f64 * 0.29));
                assert!(v == 0.0 || v == 1.0 || v == 2.0);
                seen[v as usize] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn square_pattern_four_colours() {
        assert_eq!(square_pattern(xz(0.5, 0.5)), 0.0);
        assert_eq!(square_pattern(xz(0.5, 1.5)), 1.0);
        assert_eq!(square_pattern(xz(1.5, 1.5)), 2.0);
        assert_eq!(square_pattern(xz(1.5, 0.5)), 3.0);
    }

    #[test]
    fn triangular_pattern_six_colours() {
        let mut seen = [false; 6];
        for i in 0..60 {
            for j in 0..60 {
                let v = triangular_pattern(xz(i as f64 * 0.17 - 5.0, j as f64 * 0.13 - 4.0));
                assert!(v >= 0.0 && v <= 5.0);
                seen[v as usize] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }
}
