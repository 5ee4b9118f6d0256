//! Dual numbers for forward-mode automatic differentiation.
//!
//! A dual number `a + a′·ε` (with `ε² = 0`) carries a value and the
//! directional derivative of that value along whatever seed direction was
//! chosen. Arithmetic on dual numbers follows the algebraic rules
//!
//! - `(a + a′·ε) + (b + b′·ε) = (a+b) + (a′+b′)·ε`
//! - `(a + a′·ε) · (b + b′·ε) = ab + (a′b + ab′)·ε`
//! - `(a + a′·ε) / (b + b′·ε) = (a/b) + ((a′b − ab′)/b²)·ε`
//!
//! so the chain rule emerges implicitly from composing operations — it is
//! never written down explicitly.
//!
//! # Example
//!
//! ```
//! use gradtrace::Dual;
//!
//! // f(x) = x² + 2x at x = 3
//! let x = Dual::variable(3.0);
//! let f = x * x + 2.0 * x;
//!
//! assert_eq!(f.real, 15.0); // f(3) = 9 + 6
//! assert_eq!(f.dual, 8.0);  // f'(3) = 2·3 + 2
//! ```

use num_traits::Float;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A dual number `real + dual·ε` representing a value and its directional
/// derivative.
///
/// The `real` component is the primal value; the `dual` component is the
/// tangent along the chosen seed direction. Every operation produces a fresh
/// value — dual numbers are never mutated. Equality compares both components
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<T> {
    /// The primal value.
    pub real: T,
    /// The tangent (directional derivative) component.
    pub dual: T,
}

impl<T: Float> Dual<T> {
    /// Creates a dual number with an explicit real and dual component.
    pub fn new(real: T, dual: T) -> Self {
        Dual { real, dual }
    }

    /// Creates a variable: dual component 1, the "identity direction".
    ///
    /// This is the default seed for the input being differentiated with
    /// respect to.
    ///
    /// ```
    /// use gradtrace::Dual;
    ///
    /// let x = Dual::variable(3.0);
    /// assert_eq!(x.dual, 1.0); // dx/dx = 1
    /// ```
    pub fn variable(real: T) -> Self {
        Dual {
            real,
            dual: T::one(),
        }
    }

    /// Creates a constant: dual component 0.
    pub fn constant(real: T) -> Self {
        Dual {
            real,
            dual: T::zero(),
        }
    }

    /// Reciprocal: `1/(a + a′·ε) = (1/a) + (-a′/a²)·ε`.
    pub fn recip(self) -> Self {
        Dual {
            real: T::one() / self.real,
            dual: -self.dual / (self.real * self.real),
        }
    }

    /// Raises to a plain scalar power: `(a^p, p·a^(p−1)·a′)`.
    ///
    /// ```
    /// use gradtrace::Dual;
    ///
    /// let y = Dual::variable(2.0).powf(3.0);
    /// assert_eq!(y.real, 8.0);
    /// assert_eq!(y.dual, 12.0); // 3·2²
    /// ```
    pub fn powf(self, exp: T) -> Self {
        Dual {
            real: self.real.powf(exp),
            dual: exp * self.real.powf(exp - T::one()) * self.dual,
        }
    }

    /// Raises to a dual-number power:
    /// `(a^b, a^b·(b′·ln a + a′·b/a))`.
    pub fn pow(self, exp: Dual<T>) -> Self {
        let value = self.real.powf(exp.real);
        Dual {
            real: value,
            dual: value * (exp.dual * self.real.ln() + self.dual * exp.real / self.real),
        }
    }

    /// Raises a plain scalar base to this dual number:
    /// `(c^a, c^a·a′·ln c)`.
    pub fn exp_base(self, base: T) -> Self {
        let value = base.powf(self.real);
        Dual {
            real: value,
            dual: value * self.dual * base.ln(),
        }
    }
}

impl<T: Float> Neg for Dual<T> {
    type Output = Dual<T>;

    fn neg(self) -> Self::Output {
        Dual::new(-self.real, -self.dual)
    }
}

impl<T: Float> Add for Dual<T> {
    type Output = Dual<T>;

    fn add(self, rhs: Self) -> Self::Output {
        Dual::new(self.real + rhs.real, self.dual + rhs.dual)
    }
}

impl<T: Float> Sub for Dual<T> {
    type Output = Dual<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        Dual::new(self.real - rhs.real, self.dual - rhs.dual)
    }
}

/// Product rule: `(ab, a′b + ab′)`.
impl<T: Float> Mul for Dual<T> {
    type Output = Dual<T>;

    fn mul(self, rhs: Self) -> Self::Output {
        Dual::new(
            self.real * rhs.real,
            self.dual * rhs.real + self.real * rhs.dual,
        )
    }
}

/// Quotient rule: `(a/b, (a′b − ab′)/b²)`.
impl<T: Float> Div for Dual<T> {
    type Output = Dual<T>;

    fn div(self, rhs: Self) -> Self::Output {
        Dual::new(
            self.real / rhs.real,
            (self.dual * rhs.real - self.real * rhs.dual) / (rhs.real * rhs.real),
        )
    }
}

impl<T: Float> Add<T> for Dual<T> {
    type Output = Dual<T>;

    fn add(self, c: T) -> Self::Output {
        Dual::new(self.real + c, self.dual)
    }
}

impl<T: Float> Sub<T> for Dual<T> {
    type Output = Dual<T>;

    fn sub(self, c: T) -> Self::Output {
        Dual::new(self.real - c, self.dual)
    }
}

impl<T: Float> Mul<T> for Dual<T> {
    type Output = Dual<T>;

    fn mul(self, c: T) -> Self::Output {
        Dual::new(self.real * c, self.dual * c)
    }
}

impl<T: Float> Div<T> for Dual<T> {
    type Output = Dual<T>;

    fn div(self, c: T) -> Self::Output {
        Dual::new(self.real / c, self.dual / c)
    }
}

// Scalar-on-the-left operators. Coherence forbids `impl Add<Dual<T>> for T`
// with a generic T, so these are spelled out per float width.
macro_rules! scalar_lhs_dual_ops {
    ($($t:ty),*) => {$(
        impl Add<Dual<$t>> for $t {
            type Output = Dual<$t>;

            fn add(self, rhs: Dual<$t>) -> Dual<$t> {
                rhs + self
            }
        }

        impl Sub<Dual<$t>> for $t {
            type Output = Dual<$t>;

            fn sub(self, rhs: Dual<$t>) -> Dual<$t> {
                Dual::new(self - rhs.real, -rhs.dual)
            }
        }

        impl Mul<Dual<$t>> for $t {
            type Output = Dual<$t>;

            fn mul(self, rhs: Dual<$t>) -> Dual<$t> {
                rhs * self
            }
        }

        impl Div<Dual<$t>> for $t {
            type Output = Dual<$t>;

            fn div(self, rhs: Dual<$t>) -> Dual<$t> {
                Dual::new(self / rhs.real, -self * rhs.dual / (rhs.real * rhs.real))
            }
        }
    )*};
}

scalar_lhs_dual_ops!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_has_zero_tangent() {
        let c = Dual::constant(5.0);
        assert_eq!(c.real, 5.0);
        assert_eq!(c.dual, 0.0);
    }

    #[test]
    fn variable_has_unit_tangent() {
        let x = Dual::variable(3.0);
        assert_eq!(x.real, 3.0);
        assert_eq!(x.dual, 1.0);
    }

    #[test]
    fn equality_compares_both_components() {
        assert_eq!(Dual::new(1.0, 2.0), Dual::new(1.0, 2.0));
        assert_ne!(Dual::new(1.0, 2.0), Dual::new(1.0, 3.0));
        assert_ne!(Dual::new(1.0, 2.0), Dual::new(4.0, 2.0));
    }

    #[test]
    fn addition_componentwise() {
        let z = Dual::new(1.0, 2.0) + Dual::new(3.0, 4.0);
        assert_eq!(z, Dual::new(4.0, 6.0));
    }

    #[test]
    fn scalar_addition_keeps_tangent() {
        let z = Dual::new(1.0, 2.0) + 5.0;
        assert_eq!(z, Dual::new(6.0, 2.0));
        assert_eq!(5.0 + Dual::new(1.0, 2.0), Dual::new(6.0, 2.0));
    }

    #[test]
    fn multiplication_product_rule() {
        // f(x) = x² at x = 3
        let x = Dual::variable(3.0);
        let y = x * x;
        assert_eq!(y.real, 9.0);
        assert_eq!(y.dual, 6.0);
    }

    #[test]
    fn scalar_multiplication_scales_both() {
        assert_eq!(Dual::new(2.0, 3.0) * 4.0, Dual::new(8.0, 12.0));
        assert_eq!(4.0 * Dual::new(2.0, 3.0), Dual::new(8.0, 12.0));
    }

    #[test]
    fn division_quotient_rule() {
        // f(x) = (x+1)/(x+2) at x = 3: f = 0.8, f' = 1/(x+2)² = 0.04
        let x = Dual::variable(3.0);
        let y = (x + 1.0) / (x + 2.0);
        assert_eq!(y.real, 0.8);
        assert!((y.dual - 0.04_f64).abs() < 1e-12);
    }

    #[test]
    fn scalar_divided_by_dual() {
        // f(x) = 6/x at x = 2: f = 3, f' = -6/x² = -1.5
        let y = 6.0 / Dual::variable(2.0);
        assert_eq!(y, Dual::new(3.0, -1.5));
    }

    #[test]
    fn scalar_minus_dual_negates_tangent() {
        let y = 5.0 - Dual::new(2.0, 3.0);
        assert_eq!(y, Dual::new(3.0, -3.0));
    }

    #[test]
    fn negation() {
        assert_eq!(-Dual::new(3.0, 1.0), Dual::new(-3.0, -1.0));
    }

    #[test]
    fn powf_power_rule() {
        let y = Dual::variable(2.0).powf(3.0);
        assert_eq!(y.real, 8.0);
        assert_eq!(y.dual, 12.0);
    }

    #[test]
    fn pow_dual_exponent() {
        // x^c with c carried as a constant dual must match powf
        let x = Dual::variable(2.0);
        let y = x.pow(Dual::constant(3.0));
        assert_eq!(y.real, 8.0);
        assert!((y.dual - 12.0_f64).abs() < 1e-12);

        // x^x at x = 2: f' = x^x (ln x + 1)
        let y = x.pow(x);
        assert_eq!(y.real, 4.0);
        assert!((y.dual - 4.0 * (2.0_f64.ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn exp_base_rule() {
        // 2^x at x = 3: f' = 2³ ln 2
        let y = Dual::variable(3.0).exp_base(2.0);
        assert_eq!(y.real, 8.0);
        assert!((y.dual - 8.0 * 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn recip_inverse_rule() {
        let y = Dual::variable(2.0).recip();
        assert_eq!(y, Dual::new(0.5, -0.25));
    }

    #[test]
    fn polynomial_chain() {
        // f(x) = x³ - 2x + 1 at x = 2: f = 5, f' = 3x² - 2 = 10
        let x: Dual<f64> = Dual::variable(2.0);
        let f = x.powf(3.0) - 2.0 * x + Dual::constant(1.0);
        assert_eq!(f.real, 5.0);
        assert_eq!(f.dual, 10.0);
    }
}
