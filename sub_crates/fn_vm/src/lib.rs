#![allow(dead_code)]

//! A tiny stack VM for user-supplied scalar functions.
//!
//! The scene front end compiles expression trees down to a flat postfix
//! program; the render core holds a shared reference to the program and
//! evaluates it through a per-thread `FnContext`, so no synchronisation is
//! needed at sample time.

/// Index of a named local in an `FnContext`.
///
/// The first three slots are the evaluation point's x/y/z; the next two are
/// the u/v parameters of parametric surfaces.
pub const LOCAL_X: usize = 0;
pub const LOCAL_Y: usize = 1;
pub const LOCAL_Z: usize = 2;
pub const LOCAL_U: usize = 3;
pub const LOCAL_V: usize = 4;

const LOCAL_COUNT: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Op {
    /// Push a literal.
    Const(f64),
    /// Push the value of a local slot.
    Local(usize),
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Abs,
    Sqrt,
    Pow,
    Exp,
    Ln,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan2,
    Floor,
    Min,
    Max,
    /// a b c -- (a < b ? c : top), i.e. select on comparison. Used for the
    /// `select()` intrinsic; pops three, pushes one.
    Select,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// The program popped more values than it pushed.
    StackUnderflow(usize),
    /// The program finished with anything other than exactly one value.
    UnbalancedProgram(usize),
    /// A `Local` op referenced a slot outside the context.
    BadLocal(usize),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{:?}", self)
    }
}

/// A compiled scalar function.
///
/// Immutable after compilation; shared between threads by reference.
#[derive(Debug, Clone)]
pub struct Function {
    ops: Vec<Op>,
    /// Worst-case value-stack depth, computed at build time so contexts can
    /// reserve once and never reallocate during evaluation.
    max_depth: usize,
}

impl Function {
    /// Builds a function from a postfix op sequence, verifying stack balance.
    pub fn new(ops: Vec<Op>) -> Result<Function, Error> {
        let mut depth: usize = 0;
        let mut max_depth: usize = 0;
        for (i, op) in ops.iter().enumerate() {
            let (pops, pushes) = op.arity();
            if depth < pops {
                return Err(Error::StackUnderflow(i));
            }
            depth = depth - pops + pushes;
            if depth > max_depth {
                max_depth = depth;
            }
            if let Op::Local(n) = *op {
                if n >= LOCAL_COUNT {
                    return Err(Error::BadLocal(i));
                }
            }
        }
        if depth != 1 {
            return Err(Error::UnbalancedProgram(depth));
        }
        Ok(Function {
            ops: ops,
            max_depth: max_depth,
        })
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }
}

impl Op {
    /// (values popped, values pushed).
    fn arity(&self) -> (usize, usize) {
        match *self {
            Op::Const(_) | Op::Local(_) => (0, 1),
            Op::Neg
            | Op::Abs
            | Op::Sqrt
            | Op::Exp
            | Op::Ln
            | Op::Sin
            | Op::Cos
            | Op::Tan
            | Op::Asin
            | Op::Acos
            | Op::Floor => (1, 1),
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow | Op::Atan2 | Op::Min | Op::Max => {
                (2, 1)
            }
            Op::Select => (3, 1),
        }
    }
}

/// Per-thread evaluation scratch.
///
/// One context per rendering thread; never shared.
#[derive(Debug)]
pub struct FnContext {
    locals: [f64; LOCAL_COUNT],
    stack: Vec<f64>,
}

impl FnContext {
    pub fn new() -> FnContext {
        FnContext {
            locals: [0.0; LOCAL_COUNT],
            stack: Vec::with_capacity(64),
        }
    }

    pub fn set_local(&mut self, slot: usize, value: f64) {
        self.locals[slot] = value;
    }

    /// Runs the program and returns its single result.
    ///
    /// Programs are validated at build time, so evaluation itself cannot
    /// fail; division by zero and domain errors follow IEEE semantics and
    /// surface as inf/NaN for the caller to clamp.
    pub fn evaluate(&mut self, f: &Function) -> f64 {
        let stack = &mut self.stack;
        stack.clear();
        if stack.capacity() < f.max_depth {
            stack.reserve(f.max_depth - stack.capacity());
        }

        for op in f.ops.iter() {
            match *op {
                Op::Const(v) => stack.push(v),
                Op::Local(n) => stack.push(self.locals[n]),
                Op::Neg => {
                    let a = stack.pop().unwrap();
                    stack.push(-a);
                }
                Op::Abs => {
                    let a = stack.pop().unwrap();
                    stack.push(a.abs());
                }
                Op::Sqrt => {
                    let a = stack.pop().unwrap();
                    stack.push(a.sqrt());
                }
                Op::Exp => {
                    let a = stack.pop().unwrap();
                    stack.push(a.exp());
                }
                Op::Ln => {
                    let a = stack.pop().unwrap();
                    stack.push(a.ln());
                }
                Op::Sin => {
                    let a = stack.pop().unwrap();
                    stack.push(a.sin());
                }
                Op::Cos => {
                    let a = stack.pop().unwrap();
                    stack.push(a.cos());
                }
                Op::Tan => {
                    let a = stack.pop().unwrap();
                    stack.push(a.tan());
                }
                Op::Asin => {
                    let a = stack.pop().unwrap();
                    stack.push(a.asin());
                }
                Op::Acos => {
                    let a = stack.pop().unwrap();
                    stack.push(a.acos());
                }
                Op::Floor => {
                    let a = stack.pop().unwrap();
                    stack.push(a.floor());
                }
                Op::Add => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a + b);
                }
                Op::Sub => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a - b);
                }
                Op::Mul => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a * b);
                }
                Op::Div => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a / b);
                }
                Op::Pow => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a.powf(b));
                }
                Op::Atan2 => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a.atan2(b));
                }
                Op::Min => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(if a < b { a } else { b });
                }
                Op::Max => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(if a > b { a } else { b });
                }
                Op::Select => {
                    let c = stack.pop().unwrap();
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(if a < 0.0 { b } else { c });
                }
            }
        }

        stack.pop().unwrap()
    }
}

/// Convenience builders for common container functions used in tests and by
/// the isosurface/parametric defaults.
pub mod builders {
    use super::{Function, Op, LOCAL_U, LOCAL_V, LOCAL_X, LOCAL_Y, LOCAL_Z};

    /// `sqrt(x^2 + y^2 + z^2)` — distance from the origin.
    pub fn radial() -> Function {
        Function::new(vec![
            Op::Local(LOCAL_X),
            Op::Local(LOCAL_X),
            Op::Mul,
            Op::Local(LOCAL_Y),
            Op::Local(LOCAL_Y),
            Op::Mul,
            Op::Add,
            Op::Local(LOCAL_Z),
            Op::Local(LOCAL_Z),
            Op::Mul,
            Op::Add,
            Op::Sqrt,
        ])
        .unwrap()
    }

    /// A single named local, e.g. `x`.
    pub fn local(slot: usize) -> Function {
        Function::new(vec![Op::Local(slot)]).unwrap()
    }

    /// `sin(u) * cos(v)`-style sphere coordinate helpers used by the
    /// parametric tests.
    pub fn sphere_x() -> Function {
        Function::new(vec![
            Op::Local(LOCAL_U),
            Op::Cos,
            Op::Local(LOCAL_V),
            Op::Cos,
            Op::Mul,
        ])
        .unwrap()
    }

    pub fn sphere_y() -> Function {
        Function::new(vec![
            Op::Local(LOCAL_U),
            Op::Sin,
            Op::Local(LOCAL_V),
            Op::Cos,
            Op::Mul,
        ])
        .unwrap()
    }

    pub fn sphere_z() -> Function {
        Function::new(vec![Op::Local(LOCAL_V), Op::Sin]).unwrap()
    }
}
