//! A closed tagged-variant type over the three differentiable
//! representations.
//!
//! [`Expr`] lets a single user-written closure run unchanged under plain
//! evaluation, forward mode, and reverse mode: the orchestrator picks the
//! variant when it seeds the inputs, and every operator dispatches on it.
//! A bare scalar operand is promoted into the other side's representation
//! (a constant dual number, or a constant leaf node on the same tape)
//! before the operation is applied.
//!
//! Combining a `Dual` operand with a `Node` operand is a programming error
//! and panics: a single evaluation never mixes modes.

use num_traits::Float;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::dual::Dual;
use crate::tape::Var;

/// A value in one of the three differentiable representations.
#[derive(Debug, Clone)]
pub enum Expr<T: Float> {
    /// A plain number: evaluation only, no derivative tracking.
    Scalar(T),
    /// A forward-mode dual number.
    Dual(Dual<T>),
    /// A reverse-mode graph variable.
    Node(Var<T>),
}

const MIXED_MODES: &str = "cannot combine forward-mode and reverse-mode operands";

impl<T: Float> Expr<T> {
    /// The primal value, whatever the representation.
    pub fn value(&self) -> T {
        match self {
            Expr::Scalar(a) => *a,
            Expr::Dual(z) => z.real,
            Expr::Node(x) => x.value(),
        }
    }

    /// The forward-mode tangent. Zero for a scalar (constants have no
    /// derivative); panics for a graph variable, whose derivatives come
    /// from the backward pass instead.
    pub fn tangent(&self) -> T {
        match self {
            Expr::Scalar(_) => T::zero(),
            Expr::Dual(z) => z.dual,
            Expr::Node(_) => panic!("a graph variable has no forward tangent"),
        }
    }

    /// The underlying graph variable, if this is a reverse-mode value.
    pub fn node(&self) -> Option<&Var<T>> {
        match self {
            Expr::Node(x) => Some(x),
            _ => None,
        }
    }

    /// Raises to a plain scalar power.
    pub fn powf(self, exp: T) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(a.powf(exp)),
            Expr::Dual(z) => Expr::Dual(z.powf(exp)),
            Expr::Node(x) => Expr::Node(x.powf(exp)),
        }
    }

    /// Raises to the power of another expression, covering every pairing of
    /// the three representations.
    pub fn pow(self, exp: Expr<T>) -> Self {
        match (self, exp) {
            (Expr::Scalar(a), Expr::Scalar(b)) => Expr::Scalar(a.powf(b)),
            (Expr::Dual(z), Expr::Scalar(p)) => Expr::Dual(z.powf(p)),
            (Expr::Scalar(c), Expr::Dual(w)) => Expr::Dual(w.exp_base(c)),
            (Expr::Dual(z), Expr::Dual(w)) => Expr::Dual(z.pow(w)),
            (Expr::Node(x), Expr::Scalar(p)) => Expr::Node(x.powf(p)),
            (Expr::Scalar(c), Expr::Node(y)) => Expr::Node(y.exp_base(c)),
            (Expr::Node(x), Expr::Node(y)) => Expr::Node(x.pow(y)),
            _ => panic!("{MIXED_MODES}"),
        }
    }
}

impl<T: Float> Neg for Expr<T> {
    type Output = Expr<T>;

    fn neg(self) -> Self::Output {
        match self {
            Expr::Scalar(a) => Expr::Scalar(-a),
            Expr::Dual(z) => Expr::Dual(-z),
            Expr::Node(x) => Expr::Node(-x),
        }
    }
}

impl<T: Float> Add for Expr<T> {
    type Output = Expr<T>;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Expr::Scalar(a), Expr::Scalar(b)) => Expr::Scalar(a + b),
            (Expr::Dual(z), Expr::Scalar(c)) | (Expr::Scalar(c), Expr::Dual(z)) => {
                Expr::Dual(z + c)
            }
            (Expr::Dual(z), Expr::Dual(w)) => Expr::Dual(z + w),
            (Expr::Node(x), Expr::Scalar(c)) | (Expr::Scalar(c), Expr::Node(x)) => {
                Expr::Node(x + c)
            }
            (Expr::Node(x), Expr::Node(y)) => Expr::Node(x + y),
            _ => panic!("{MIXED_MODES}"),
        }
    }
}

impl<T: Float> Sub for Expr<T> {
    type Output = Expr<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Expr::Scalar(a), Expr::Scalar(b)) => Expr::Scalar(a - b),
            (Expr::Dual(z), Expr::Scalar(c)) => Expr::Dual(z - c),
            (Expr::Scalar(c), Expr::Dual(z)) => Expr::Dual(Dual::new(c - z.real, -z.dual)),
            (Expr::Dual(z), Expr::Dual(w)) => Expr::Dual(z - w),
            (Expr::Node(x), Expr::Scalar(c)) => Expr::Node(x - c),
            (Expr::Scalar(c), Expr::Node(x)) => {
                let cvar = x.constant_like(c);
                Expr::Node(cvar - x)
            }
            (Expr::Node(x), Expr::Node(y)) => Expr::Node(x - y),
            _ => panic!("{MIXED_MODES}"),
        }
    }
}

impl<T: Float> Mul for Expr<T> {
    type Output = Expr<T>;

    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Expr::Scalar(a), Expr::Scalar(b)) => Expr::Scalar(a * b),
            (Expr::Dual(z), Expr::Scalar(c)) | (Expr::Scalar(c), Expr::Dual(z)) => {
                Expr::Dual(z * c)
            }
            (Expr::Dual(z), Expr::Dual(w)) => Expr::Dual(z * w),
            (Expr::Node(x), Expr::Scalar(c)) | (Expr::Scalar(c), Expr::Node(x)) => {
                Expr::Node(x * c)
            }
            (Expr::Node(x), Expr::Node(y)) => Expr::Node(x * y),
            _ => panic!("{MIXED_MODES}"),
        }
    }
}

impl<T: Float> Div for Expr<T> {
    type Output = Expr<T>;

    fn div(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Expr::Scalar(a), Expr::Scalar(b)) => Expr::Scalar(a / b),
            (Expr::Dual(z), Expr::Scalar(c)) => Expr::Dual(z / c),
            (Expr::Scalar(c), Expr::Dual(z)) => Expr::Dual(z.recip() * c),
            (Expr::Dual(z), Expr::Dual(w)) => Expr::Dual(z / w),
            (Expr::Node(x), Expr::Scalar(c)) => Expr::Node(x / c),
            (Expr::Scalar(c), Expr::Node(x)) => {
                let cvar = x.constant_like(c);
                Expr::Node(cvar / x)
            }
            (Expr::Node(x), Expr::Node(y)) => Expr::Node(x / y),
            _ => panic!("{MIXED_MODES}"),
        }
    }
}

impl<T: Float> Add<T> for Expr<T> {
    type Output = Expr<T>;

    fn add(self, c: T) -> Self::Output {
        self + Expr::Scalar(c)
    }
}

impl<T: Float> Sub<T> for Expr<T> {
    type Output = Expr<T>;

    fn sub(self, c: T) -> Self::Output {
        self - Expr::Scalar(c)
    }
}

impl<T: Float> Mul<T> for Expr<T> {
    type Output = Expr<T>;

    fn mul(self, c: T) -> Self::Output {
        self * Expr::Scalar(c)
    }
}

impl<T: Float> Div<T> for Expr<T> {
    type Output = Expr<T>;

    fn div(self, c: T) -> Self::Output {
        self / Expr::Scalar(c)
    }
}

macro_rules! scalar_lhs_expr_ops {
    ($($t:ty),*) => {$(
        impl Add<Expr<$t>> for $t {
            type Output = Expr<$t>;

            fn add(self, rhs: Expr<$t>) -> Expr<$t> {
                Expr::Scalar(self) + rhs
            }
        }

        impl Sub<Expr<$t>> for $t {
            type Output = Expr<$t>;

            fn sub(self, rhs: Expr<$t>) -> Expr<$t> {
                Expr::Scalar(self) - rhs
            }
        }

        impl Mul<Expr<$t>> for $t {
            type Output = Expr<$t>;

            fn mul(self, rhs: Expr<$t>) -> Expr<$t> {
                Expr::Scalar(self) * rhs
            }
        }

        impl Div<Expr<$t>> for $t {
            type Output = Expr<$t>;

            fn div(self, rhs: Expr<$t>) -> Expr<$t> {
                Expr::Scalar(self) / rhs
            }
        }
    )*};
}

scalar_lhs_expr_ops!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_variant_is_plain_arithmetic() {
        let y = Expr::Scalar(3.0) * Expr::Scalar(4.0) - 2.0;
        assert_eq!(y.value(), 10.0);
        assert_eq!(y.tangent(), 0.0);
    }

    #[test]
    fn dual_variant_carries_tangent() {
        let x = Expr::Dual(Dual::variable(3.0));
        let y = x.clone() * x + 1.0;
        assert_eq!(y.value(), 10.0);
        assert_eq!(y.tangent(), 6.0);
    }

    #[test]
    fn scalar_promotes_into_dual() {
        // 5 - x and 6 / x with x dual
        let x: Expr<f64> = Expr::Dual(Dual::variable(2.0));
        let y = 5.0 - x.clone();
        assert_eq!(y.value(), 3.0);
        assert_eq!(y.tangent(), -1.0);

        let y = 6.0 / x;
        assert_eq!(y.value(), 3.0);
        assert_eq!(y.tangent(), -1.5);
    }

    #[test]
    fn scalar_promotes_onto_the_tape() {
        let tape = Var::tape();
        let x: Expr<f64> = Expr::Node(Var::variable_on(tape, 2.0));
        let y = 6.0 / x;
        assert_eq!(y.value(), 3.0);
        let row = y.node().unwrap().backward(1);
        assert_eq!(row, vec![-1.5]);
    }

    #[test]
    fn pow_dispatches_across_representations() {
        // scalar^scalar
        let y = Expr::Scalar(2.0_f64).pow(Expr::Scalar(3.0));
        assert_eq!(y.value(), 8.0);

        // scalar^dual
        let x = Expr::Dual(Dual::variable(3.0));
        let y = Expr::Scalar(2.0).pow(x);
        assert_eq!(y.value(), 8.0);
        assert!((y.tangent() - 8.0 * 2.0_f64.ln()).abs() < 1e-12);

        // node^node
        let tape = Var::tape();
        let x = Expr::Node(Var::variable_on(tape.clone(), 2.0));
        let p = Expr::Node(Var::variable_on(tape, 3.0));
        let y = x.pow(p);
        assert_eq!(y.value(), 8.0);
        let row = y.node().unwrap().backward(2);
        assert!((row[0] - 12.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "forward-mode and reverse-mode")]
    fn mixing_modes_panics() {
        let z = Expr::Dual(Dual::variable(1.0));
        let x = Expr::Node(Var::variable_on(Var::tape(), 2.0));
        let _ = z + x;
    }
}
