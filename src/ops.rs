//! The elementary-function library, polymorphic over every differentiable
//! representation.
//!
//! [`Elementary`] is implemented once per representation: plain floats
//! evaluate directly (with domain checks), [`Dual`] applies the chain rule
//! `(f(a), f′(a)·a′)`, [`Var`] records a graph node whose backward rule
//! accumulates `f′(a)` times the node's adjoint into its parent, and
//! [`Expr`](crate::Expr) dispatches on its variant. Forward and reverse mode
//! therefore share one derivative table:
//!
//! | fn | derivative at `a` | domain |
//! |---|---|---|
//! | `sin` | `cos a` | |
//! | `cos` | `−sin a` | |
//! | `tan` | `1/cos²a` | |
//! | `exp` | `exp a` | |
//! | `ln` | `1/a` | `a > 0` |
//! | `log(base)` | `1/(a·ln base)` | `a > 0` |
//! | `asin` | `1/√(1−a²)` | `−1 ≤ a ≤ 1` |
//! | `acos` | `−1/√(1−a²)` | `−1 ≤ a ≤ 1` |
//! | `atan` | `1/(1+a²)` | |
//! | `sinh` | `cosh a` | |
//! | `cosh` | `sinh a` | |
//! | `tanh` | `1/cosh²a` | |
//! | `logistic` | `σ(a)(1−σ(a))` | |
//! | `sqrt` | `1/(2√a)` | `a ≥ 0` |

use num_traits::Float;

use crate::dual::Dual;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::tape::{Op, Var};

/// Elementary functions with automatic derivative propagation.
///
/// Functions with a restricted domain return [`Result`] and reject invalid
/// arguments with [`Error::Domain`] before any numeric work.
///
/// ```
/// use gradtrace::{Dual, Elementary};
///
/// // d/dx sin(x) at x = 1, via a dual number seeded with dual = 2
/// let z = Dual::new(1.0, 2.0).sin();
/// assert_eq!(z.real, 1.0_f64.sin());
/// assert_eq!(z.dual, 2.0 * 1.0_f64.cos());
/// ```
pub trait Elementary<T: Float>: Sized {
    /// Sine.
    fn sin(self) -> Self;
    /// Cosine.
    fn cos(self) -> Self;
    /// Tangent.
    fn tan(self) -> Self;
    /// Exponential, base e.
    fn exp(self) -> Self;
    /// Natural logarithm; the argument must be positive.
    fn ln(self) -> Result<Self>;
    /// Logarithm in an arbitrary base; the argument must be positive.
    fn log(self, base: T) -> Result<Self>;
    /// Inverse sine; the argument must lie in `[-1, 1]`.
    fn asin(self) -> Result<Self>;
    /// Inverse cosine; the argument must lie in `[-1, 1]`.
    fn acos(self) -> Result<Self>;
    /// Inverse tangent.
    fn atan(self) -> Self;
    /// Hyperbolic sine.
    fn sinh(self) -> Self;
    /// Hyperbolic cosine.
    fn cosh(self) -> Self;
    /// Hyperbolic tangent.
    fn tanh(self) -> Self;
    /// Logistic sigmoid `1/(1 + e^{-x})`.
    fn logistic(self) -> Self;
    /// Square root; the argument must be non-negative.
    fn sqrt(self) -> Result<Self>;
}

fn check<T: Float>(ok: bool, op: &'static str, arg: T) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::Domain {
            op,
            arg: num_traits::cast::<T, f64>(arg).unwrap_or(f64::NAN),
        })
    }
}

// `Float` methods on bare `T` are written in qualified form throughout this
// module: the blanket `Elementary` impl would otherwise make method-call
// syntax ambiguous.
fn sigmoid<T: Float>(a: T) -> T {
    T::one() / (T::one() + Float::exp(-a))
}

impl<T: Float> Elementary<T> for T {
    fn sin(self) -> Self {
        Float::sin(self)
    }

    fn cos(self) -> Self {
        Float::cos(self)
    }

    fn tan(self) -> Self {
        Float::tan(self)
    }

    fn exp(self) -> Self {
        Float::exp(self)
    }

    fn ln(self) -> Result<Self> {
        check(self > T::zero(), "log", self)?;
        Ok(Float::ln(self))
    }

    fn log(self, base: T) -> Result<Self> {
        check(self > T::zero(), "log_base", self)?;
        Ok(Float::ln(self) / Float::ln(base))
    }

    fn asin(self) -> Result<Self> {
        check(self >= -T::one() && self <= T::one(), "arcsin", self)?;
        Ok(Float::asin(self))
    }

    fn acos(self) -> Result<Self> {
        check(self >= -T::one() && self <= T::one(), "arccos", self)?;
        Ok(Float::acos(self))
    }

    fn atan(self) -> Self {
        Float::atan(self)
    }

    fn sinh(self) -> Self {
        Float::sinh(self)
    }

    fn cosh(self) -> Self {
        Float::cosh(self)
    }

    fn tanh(self) -> Self {
        Float::tanh(self)
    }

    fn logistic(self) -> Self {
        sigmoid(self)
    }

    fn sqrt(self) -> Result<Self> {
        check(self >= T::zero(), "sqrt", self)?;
        Ok(Float::sqrt(self))
    }
}

impl<T: Float> Elementary<T> for Dual<T> {
    fn sin(self) -> Self {
        Dual::new(Float::sin(self.real), self.dual * Float::cos(self.real))
    }

    fn cos(self) -> Self {
        Dual::new(Float::cos(self.real), -self.dual * Float::sin(self.real))
    }

    fn tan(self) -> Self {
        let c = Float::cos(self.real);
        Dual::new(Float::tan(self.real), self.dual / (c * c))
    }

    fn exp(self) -> Self {
        let e = Float::exp(self.real);
        Dual::new(e, self.dual * e)
    }

    fn ln(self) -> Result<Self> {
        check(self.real > T::zero(), "log", self.real)?;
        Ok(Dual::new(Float::ln(self.real), self.dual / self.real))
    }

    fn log(self, base: T) -> Result<Self> {
        check(self.real > T::zero(), "log_base", self.real)?;
        let ln_base = Float::ln(base);
        Ok(Dual::new(
            Float::ln(self.real) / ln_base,
            self.dual / (self.real * ln_base),
        ))
    }

    fn asin(self) -> Result<Self> {
        check(
            self.real >= -T::one() && self.real <= T::one(),
            "arcsin",
            self.real,
        )?;
        let root = Float::sqrt(T::one() - self.real * self.real);
        Ok(Dual::new(Float::asin(self.real), self.dual / root))
    }

    fn acos(self) -> Result<Self> {
        check(
            self.real >= -T::one() && self.real <= T::one(),
            "arccos",
            self.real,
        )?;
        let root = Float::sqrt(T::one() - self.real * self.real);
        Ok(Dual::new(Float::acos(self.real), -self.dual / root))
    }

    fn atan(self) -> Self {
        Dual::new(
            Float::atan(self.real),
            self.dual / (T::one() + self.real * self.real),
        )
    }

    fn sinh(self) -> Self {
        Dual::new(Float::sinh(self.real), self.dual * Float::cosh(self.real))
    }

    fn cosh(self) -> Self {
        Dual::new(Float::cosh(self.real), self.dual * Float::sinh(self.real))
    }

    fn tanh(self) -> Self {
        let c = Float::cosh(self.real);
        Dual::new(Float::tanh(self.real), self.dual / (c * c))
    }

    fn logistic(self) -> Self {
        let s = sigmoid(self.real);
        Dual::new(s, self.dual * s * (T::one() - s))
    }

    fn sqrt(self) -> Result<Self> {
        check(self.real >= T::zero(), "sqrt", self.real)?;
        let root = Float::sqrt(self.real);
        Ok(Dual::new(root, self.dual / (root + root)))
    }
}

impl<T: Float> Elementary<T> for Var<T> {
    fn sin(self) -> Self {
        let v = self.value();
        self.push_unary(Float::sin(v), Op::Sin(self.index()))
    }

    fn cos(self) -> Self {
        let v = self.value();
        self.push_unary(Float::cos(v), Op::Cos(self.index()))
    }

    fn tan(self) -> Self {
        let v = self.value();
        self.push_unary(Float::tan(v), Op::Tan(self.index()))
    }

    fn exp(self) -> Self {
        let v = self.value();
        self.push_unary(Float::exp(v), Op::Exp(self.index()))
    }

    fn ln(self) -> Result<Self> {
        let v = self.value();
        check(v > T::zero(), "log", v)?;
        Ok(self.push_unary(Float::ln(v), Op::Ln(self.index())))
    }

    fn log(self, base: T) -> Result<Self> {
        let v = self.value();
        check(v > T::zero(), "log_base", v)?;
        let value = Float::ln(v) / Float::ln(base);
        Ok(self.push_unary(value, Op::LogBase(self.index(), base)))
    }

    fn asin(self) -> Result<Self> {
        let v = self.value();
        check(v >= -T::one() && v <= T::one(), "arcsin", v)?;
        Ok(self.push_unary(Float::asin(v), Op::Asin(self.index())))
    }

    fn acos(self) -> Result<Self> {
        let v = self.value();
        check(v >= -T::one() && v <= T::one(), "arccos", v)?;
        Ok(self.push_unary(Float::acos(v), Op::Acos(self.index())))
    }

    fn atan(self) -> Self {
        let v = self.value();
        self.push_unary(Float::atan(v), Op::Atan(self.index()))
    }

    fn sinh(self) -> Self {
        let v = self.value();
        self.push_unary(Float::sinh(v), Op::Sinh(self.index()))
    }

    fn cosh(self) -> Self {
        let v = self.value();
        self.push_unary(Float::cosh(v), Op::Cosh(self.index()))
    }

    fn tanh(self) -> Self {
        let v = self.value();
        self.push_unary(Float::tanh(v), Op::Tanh(self.index()))
    }

    fn logistic(self) -> Self {
        let v = self.value();
        self.push_unary(sigmoid(v), Op::Logistic(self.index()))
    }

    fn sqrt(self) -> Result<Self> {
        let v = self.value();
        check(v >= T::zero(), "sqrt", v)?;
        Ok(self.push_unary(Float::sqrt(v), Op::Sqrt(self.index())))
    }
}

impl<T: Float> Elementary<T> for Expr<T> {
    fn sin(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::sin(a)),
            Expr::Dual(z) => Expr::Dual(z.sin()),
            Expr::Node(x) => Expr::Node(x.sin()),
        }
    }

    fn cos(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::cos(a)),
            Expr::Dual(z) => Expr::Dual(z.cos()),
            Expr::Node(x) => Expr::Node(x.cos()),
        }
    }

    fn tan(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::tan(a)),
            Expr::Dual(z) => Expr::Dual(z.tan()),
            Expr::Node(x) => Expr::Node(x.tan()),
        }
    }

    fn exp(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::exp(a)),
            Expr::Dual(z) => Expr::Dual(z.exp()),
            Expr::Node(x) => Expr::Node(x.exp()),
        }
    }

    fn ln(self) -> Result<Self> {
        match self {
            Expr::Scalar(a) => Elementary::ln(a).map(Expr::Scalar),
            Expr::Dual(z) => z.ln().map(Expr::Dual),
            Expr::Node(x) => x.ln().map(Expr::Node),
        }
    }

    fn log(self, base: T) -> Result<Self> {
        match self {
            Expr::Scalar(a) => Elementary::log(a, base).map(Expr::Scalar),
            Expr::Dual(z) => z.log(base).map(Expr::Dual),
            Expr::Node(x) => x.log(base).map(Expr::Node),
        }
    }

    fn asin(self) -> Result<Self> {
        match self {
            Expr::Scalar(a) => Elementary::asin(a).map(Expr::Scalar),
            Expr::Dual(z) => z.asin().map(Expr::Dual),
            Expr::Node(x) => x.asin().map(Expr::Node),
        }
    }

    fn acos(self) -> Result<Self> {
        match self {
            Expr::Scalar(a) => Elementary::acos(a).map(Expr::Scalar),
            Expr::Dual(z) => z.acos().map(Expr::Dual),
            Expr::Node(x) => x.acos().map(Expr::Node),
        }
    }

    fn atan(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::atan(a)),
            Expr::Dual(z) => Expr::Dual(z.atan()),
            Expr::Node(x) => Expr::Node(x.atan()),
        }
    }

    fn sinh(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::sinh(a)),
            Expr::Dual(z) => Expr::Dual(z.sinh()),
            Expr::Node(x) => Expr::Node(x.sinh()),
        }
    }

    fn cosh(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::cosh(a)),
            Expr::Dual(z) => Expr::Dual(z.cosh()),
            Expr::Node(x) => Expr::Node(x.cosh()),
        }
    }

    fn tanh(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::tanh(a)),
            Expr::Dual(z) => Expr::Dual(z.tanh()),
            Expr::Node(x) => Expr::Node(x.tanh()),
        }
    }

    fn logistic(self) -> Self {
        match self {
            Expr::Scalar(a) => Expr::Scalar(Elementary::logistic(a)),
            Expr::Dual(z) => Expr::Dual(z.logistic()),
            Expr::Node(x) => Expr::Node(x.logistic()),
        }
    }

    fn sqrt(self) -> Result<Self> {
        match self {
            Expr::Scalar(a) => Elementary::sqrt(a).map(Expr::Scalar),
            Expr::Dual(z) => z.sqrt().map(Expr::Dual),
            Expr::Node(x) => x.sqrt().map(Expr::Node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::Var;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    // Dual-number derivatives with dual = 1 against the closed forms.
    #[test]
    fn dual_derivatives_match_closed_forms() {
        let a = 0.7_f64;
        let x = Dual::variable(a);

        assert!(close(x.sin().dual, a.cos()));
        assert!(close(x.cos().dual, -a.sin()));
        assert!(close(x.tan().dual, 1.0 / (a.cos() * a.cos())));
        assert!(close(x.exp().dual, a.exp()));
        assert!(close(x.ln().unwrap().dual, 1.0 / a));
        assert!(close(x.log(2.0).unwrap().dual, 1.0 / (a * 2.0_f64.ln())));
        assert!(close(x.asin().unwrap().dual, 1.0 / (1.0 - a * a).sqrt()));
        assert!(close(x.acos().unwrap().dual, -1.0 / (1.0 - a * a).sqrt()));
        assert!(close(x.atan().dual, 1.0 / (1.0 + a * a)));
        assert!(close(x.sinh().dual, a.cosh()));
        assert!(close(x.cosh().dual, a.sinh()));
        assert!(close(x.tanh().dual, 1.0 / (a.cosh() * a.cosh())));
        let s = 1.0 / (1.0 + (-a).exp());
        assert!(close(x.logistic().dual, s * (1.0 - s)));
        assert!(close(x.sqrt().unwrap().dual, 0.5 / a.sqrt()));
    }

    #[test]
    fn dual_chain_rule_scales_by_seed() {
        let z = Dual::new(1.0, 2.0).sin();
        assert_eq!(z.real, 1.0_f64.sin());
        assert!(close(z.dual, 2.0 * 1.0_f64.cos()));
    }

    #[test]
    fn scalar_evaluation_is_direct() {
        assert_eq!(<f64 as Elementary<f64>>::sin(4.0), 4.0_f64.sin());
        assert_eq!(<f64 as Elementary<f64>>::ln(4.0).unwrap(), 4.0_f64.ln());
        assert_eq!(
            <f64 as Elementary<f64>>::log(5.0, 7.0).unwrap(),
            5.0_f64.ln() / 7.0_f64.ln()
        );
        assert_eq!(<f64 as Elementary<f64>>::logistic(0.0), 0.5);
    }

    #[test]
    fn scalar_domain_violations() {
        assert!(matches!(
            <f64 as Elementary<f64>>::ln(-5.0),
            Err(Error::Domain { op: "log", .. })
        ));
        assert!(matches!(
            <f64 as Elementary<f64>>::ln(0.0),
            Err(Error::Domain { .. })
        ));
        assert!(matches!(
            <f64 as Elementary<f64>>::sqrt(-1.0),
            Err(Error::Domain { op: "sqrt", .. })
        ));
        assert!(matches!(
            <f64 as Elementary<f64>>::asin(2.0),
            Err(Error::Domain { op: "arcsin", .. })
        ));
        assert!(matches!(
            <f64 as Elementary<f64>>::acos(-1.5),
            Err(Error::Domain { op: "arccos", .. })
        ));
        assert!(matches!(
            <f64 as Elementary<f64>>::log(-2.0, 10.0),
            Err(Error::Domain { op: "log_base", .. })
        ));
    }

    #[test]
    fn dual_domain_violations() {
        assert!(Dual::variable(-5.0).ln().is_err());
        assert!(Dual::variable(-1.0).sqrt().is_err());
        assert!(Dual::variable(2.0).asin().is_err());
    }

    #[test]
    fn node_derivatives_match_closed_forms() {
        let a = 0.7_f64;

        let cases: Vec<(fn(Var<f64>) -> Var<f64>, f64)> = vec![
            (|x| x.sin(), a.cos()),
            (|x| x.cos(), -a.sin()),
            (|x| x.tan(), 1.0 / (a.cos() * a.cos())),
            (|x| x.exp(), a.exp()),
            (|x| x.ln().unwrap(), 1.0 / a),
            (|x| x.log(2.0).unwrap(), 1.0 / (a * 2.0_f64.ln())),
            (|x| x.asin().unwrap(), 1.0 / (1.0 - a * a).sqrt()),
            (|x| x.acos().unwrap(), -1.0 / (1.0 - a * a).sqrt()),
            (|x| x.atan(), 1.0 / (1.0 + a * a)),
            (|x| x.sinh(), a.cosh()),
            (|x| x.cosh(), a.sinh()),
            (|x| x.tanh(), 1.0 / (a.cosh() * a.cosh())),
            (|x| x.sqrt().unwrap(), 0.5 / a.sqrt()),
        ];

        for (build, expected) in cases {
            let x = Var::variable_on(Var::tape(), a);
            let y = build(x);
            let row = y.backward(1);
            assert!(close(row[0], expected));
        }

        let x = Var::variable_on(Var::tape(), a);
        let y = x.logistic();
        let s = 1.0 / (1.0 + (-a).exp());
        assert!(close(y.backward(1)[0], s * (1.0 - s)));
    }

    #[test]
    fn node_domain_violations_leave_no_node_behind() {
        let tape = Var::tape();
        let x = Var::variable_on(tape.clone(), -3.0);
        assert!(x.clone().ln().is_err());
        assert!(x.sqrt().is_err());
    }
}
