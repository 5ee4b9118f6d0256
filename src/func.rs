//! Function orchestration: evaluation, Jacobians, directional traces and
//! graph extraction for a user-supplied vector function.
//!
//! A [`Func`] wraps a closure written once against [`Expr`] operands. Each
//! entry point seeds the inputs in the representation it needs — plain
//! scalars for evaluation, dual numbers for forward mode, fresh tape
//! variables for reverse mode — and runs the same closure.

use num_traits::Float;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::dual::Dual;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::tape::{GraphView, Tape, Var};

/// Which differentiation strategy a Jacobian request uses.
///
/// Forward mode costs one function evaluation per input; reverse mode costs
/// one evaluation plus one backward sweep per output. The numbers agree to
/// floating-point tolerance either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Dual-number sweeps, one per input column.
    Forward,
    /// Tape recording with one backward sweep per output row.
    Reverse,
}

/// The result of evaluating a function: a bare scalar when the function has
/// a single output, a vector otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<T> {
    /// Single-output result.
    Scalar(T),
    /// Multi-output result, one entry per declared output.
    Vector(Vec<T>),
}

impl<T: Copy> Value<T> {
    /// The scalar payload. Panics on a vector-valued result.
    pub fn scalar(&self) -> T {
        match self {
            Value::Scalar(y) => *y,
            Value::Vector(_) => panic!("value is vector-valued"),
        }
    }

    /// The result as a flat vector, regardless of output arity.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Value::Scalar(y) => vec![y],
            Value::Vector(ys) => ys,
        }
    }
}

/// A Jacobian: a bare scalar for a 1-input, 1-output function, a row-major
/// matrix (one row per output, one column per input) otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Jacobian<T> {
    /// The single derivative of a 1x1 function.
    Scalar(T),
    /// Rows indexed by output, columns by input.
    Matrix(Vec<Vec<T>>),
}

impl<T: Copy> Jacobian<T> {
    /// The scalar payload. Panics on a matrix.
    pub fn scalar(&self) -> T {
        match self {
            Jacobian::Scalar(d) => *d,
            Jacobian::Matrix(_) => panic!("jacobian is a matrix"),
        }
    }

    /// The rows, regardless of shape.
    pub fn into_rows(self) -> Vec<Vec<T>> {
        match self {
            Jacobian::Scalar(d) => vec![vec![d]],
            Jacobian::Matrix(rows) => rows,
        }
    }
}

/// An evaluation point: a bare scalar stands in for a one-element sequence,
/// so 1-input functions can be called without wrapping.
pub trait IntoPoint<T: Float> {
    /// The point as an owned coordinate vector.
    fn into_point(self) -> Vec<T>;
}

impl<T: Float> IntoPoint<T> for T {
    fn into_point(self) -> Vec<T> {
        vec![self]
    }
}

impl<T: Float> IntoPoint<T> for Vec<T> {
    fn into_point(self) -> Vec<T> {
        self
    }
}

impl<T: Float> IntoPoint<T> for &[T] {
    fn into_point(self) -> Vec<T> {
        self.to_vec()
    }
}

impl<T: Float, const N: usize> IntoPoint<T> for [T; N] {
    fn into_point(self) -> Vec<T> {
        self.to_vec()
    }
}

/// A differentiable vector function with declared input and output arity.
pub struct Func<T, F> {
    f: F,
    num_inputs: usize,
    num_outputs: usize,
    _marker: PhantomData<T>,
}

impl<T, F> Func<T, F>
where
    T: Float,
    F: Fn(&[Expr<T>]) -> Result<Vec<Expr<T>>>,
{
    /// Wraps a closure with its arities.
    ///
    /// Panics if either arity is zero: a function with no inputs or no
    /// outputs is a programming error, not a runtime condition.
    pub fn new(num_inputs: usize, num_outputs: usize, f: F) -> Self {
        assert!(num_inputs > 0, "num_inputs must be positive");
        assert!(num_outputs > 0, "num_outputs must be positive");
        Func {
            f,
            num_inputs,
            num_outputs,
            _marker: PhantomData,
        }
    }

    /// Declared input arity.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Declared output arity.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn check_point(&self, point: &[T]) -> Result<()> {
        if point.len() != self.num_inputs {
            return Err(Error::DimensionMismatch {
                expected: self.num_inputs,
                got: point.len(),
            });
        }
        Ok(())
    }

    /// Runs the closure and asserts the declared output arity. A closure
    /// that returns the wrong number of outputs violates the wrapper's
    /// contract, so this is fatal rather than recoverable.
    fn call(&self, args: &[Expr<T>]) -> Result<Vec<Expr<T>>> {
        let out = (self.f)(args)?;
        assert_eq!(
            out.len(),
            self.num_outputs,
            "function returned {} outputs, declared {}",
            out.len(),
            self.num_outputs
        );
        Ok(out)
    }

    /// Evaluates the function at a point, with no derivative bookkeeping.
    pub fn evaluate(&self, point: impl IntoPoint<T>) -> Result<Value<T>> {
        let point = point.into_point();
        self.check_point(&point)?;
        let args: Vec<Expr<T>> = point.iter().map(|&x| Expr::Scalar(x)).collect();
        let out = self.call(&args)?;
        let values: Vec<T> = out.iter().map(Expr::value).collect();
        Ok(self.shape_value(values))
    }

    fn shape_value(&self, mut values: Vec<T>) -> Value<T> {
        if self.num_outputs == 1 {
            Value::Scalar(values.pop().unwrap())
        } else {
            Value::Vector(values)
        }
    }

    fn shape_jacobian(&self, rows: Vec<Vec<T>>) -> Jacobian<T> {
        if self.num_inputs == 1 && self.num_outputs == 1 {
            Jacobian::Scalar(rows[0][0])
        } else {
            Jacobian::Matrix(rows)
        }
    }

    /// One dual-number sweep per input: column j comes from seeding input j
    /// with tangent one and every other input with tangent zero.
    fn forward_sweep(&self, point: &[T]) -> Result<(Vec<T>, Vec<Vec<T>>)> {
        let mut rows = vec![vec![T::zero(); self.num_inputs]; self.num_outputs];
        let mut values = Vec::with_capacity(self.num_outputs);
        for j in 0..self.num_inputs {
            let args: Vec<Expr<T>> = point
                .iter()
                .enumerate()
                .map(|(k, &x)| {
                    Expr::Dual(if k == j {
                        Dual::variable(x)
                    } else {
                        Dual::constant(x)
                    })
                })
                .collect();
            let out = self.call(&args)?;
            if j == 0 {
                values = out.iter().map(Expr::value).collect();
            }
            for (i, y) in out.iter().enumerate() {
                rows[i][j] = y.tangent();
            }
        }
        Ok((values, rows))
    }

    /// One tape recording, then one backward sweep per output. The inputs
    /// are pushed onto the tape first, in declaration order, so their
    /// creation indices identify the Jacobian columns.
    fn reverse_sweep(&self, point: &[T]) -> Result<(Vec<T>, Vec<Vec<T>>)> {
        let tape: Rc<RefCell<Tape<T>>> = Var::tape();
        let args: Vec<Expr<T>> = point
            .iter()
            .map(|&x| Expr::Node(Var::variable_on(tape.clone(), x)))
            .collect();
        let out = self.call(&args)?;
        let values: Vec<T> = out.iter().map(Expr::value).collect();
        let rows: Vec<Vec<T>> = out
            .iter()
            .map(|y| match y.node() {
                Some(x) => x.backward(self.num_inputs),
                // An output that never touched an input is constant: a
                // zero row.
                None => vec![T::zero(); self.num_inputs],
            })
            .collect();
        Ok((values, rows))
    }

    /// The Jacobian at a point, by the requested mode.
    pub fn jacobian(&self, point: impl IntoPoint<T>, mode: Mode) -> Result<Jacobian<T>> {
        Ok(self.jacobian_with_value(point, mode)?.1)
    }

    /// The function value and Jacobian together, sharing the sweep work.
    pub fn jacobian_with_value(
        &self,
        point: impl IntoPoint<T>,
        mode: Mode,
    ) -> Result<(Value<T>, Jacobian<T>)> {
        let point = point.into_point();
        self.check_point(&point)?;
        let (values, rows) = match mode {
            Mode::Forward => self.forward_sweep(&point)?,
            Mode::Reverse => self.reverse_sweep(&point)?,
        };
        Ok((self.shape_value(values), self.shape_jacobian(rows)))
    }

    /// A single forward sweep seeded with an arbitrary tangent direction:
    /// returns the output values and the Jacobian-vector product J·d in one
    /// function evaluation.
    pub fn trace(
        &self,
        point: impl IntoPoint<T>,
        direction: &[T],
    ) -> Result<(Vec<T>, Vec<T>)> {
        let point = point.into_point();
        self.check_point(&point)?;
        if direction.len() != self.num_inputs {
            return Err(Error::DimensionMismatch {
                expected: self.num_inputs,
                got: direction.len(),
            });
        }
        let args: Vec<Expr<T>> = point
            .iter()
            .zip(direction)
            .map(|(&x, &d)| Expr::Dual(Dual::new(x, d)))
            .collect();
        let out = self.call(&args)?;
        let values = out.iter().map(Expr::value).collect();
        let tangents = out.iter().map(Expr::tangent).collect();
        Ok((values, tangents))
    }

    /// Records the computation at a point and returns its graph for
    /// rendering. Only defined for single-output functions; call it once
    /// per output of a vector function instead.
    pub fn graph(&self, point: impl IntoPoint<T>) -> Result<GraphView<T>> {
        assert_eq!(
            self.num_outputs, 1,
            "graph extraction requires a single-output function"
        );
        let point = point.into_point();
        self.check_point(&point)?;
        let tape: Rc<RefCell<Tape<T>>> = Var::tape();
        let args: Vec<Expr<T>> = point
            .iter()
            .map(|&x| Expr::Node(Var::variable_on(tape.clone(), x)))
            .collect();
        let mut out = self.call(&args)?;
        match out.pop() {
            Some(Expr::Node(x)) => Ok(x.graph()),
            // A constant output records no structure worth drawing.
            _ => panic!("output does not depend on any input"),
        }
    }
}
