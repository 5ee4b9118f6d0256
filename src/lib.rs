#![deny(missing_docs)]
//! Scalar automatic differentiation, forward and reverse.
//!
//! Forward mode rides on [`Dual`] numbers: arithmetic on a `(value,
//! tangent)` pair carries the derivative along with the evaluation.
//!
//! ```
//! use gradtrace::Dual;
//!
//! // f(x) = x^2 + 2x at x = 3
//! let x = Dual::variable(3.0);
//! let y = x * x + 2.0 * x;
//! assert_eq!(y.real, 15.0);
//! assert_eq!(y.dual, 8.0);
//! ```
//!
//! Reverse mode records operations onto a [`Tape`] through [`Var`] handles
//! and replays them backwards, accumulating adjoints.
//!
//! ```
//! use gradtrace::Var;
//!
//! let tape = Var::tape();
//! let x = Var::variable_on(tape, 3.0);
//! let y = x.clone() * x;
//! assert_eq!(y.backward(1), vec![6.0]);
//! ```
//!
//! [`Func`] wraps a closure written against [`Expr`] operands and drives it
//! under either mode, so one definition serves evaluation, Jacobians,
//! directional traces and graph extraction.
//!
//! ```
//! use gradtrace::{Expr, Func, Jacobian, Mode};
//!
//! // f(x) = 4x^3 - 3
//! let f = Func::new(1, 1, |args: &[Expr<f64>]| {
//!     let x = args[0].clone();
//!     Ok(vec![x.powf(3.0) * 4.0 - 3.0])
//! });
//! assert_eq!(f.jacobian(2.0, Mode::Forward).unwrap(), Jacobian::Scalar(48.0));
//! assert_eq!(f.jacobian(2.0, Mode::Reverse).unwrap(), Jacobian::Scalar(48.0));
//! ```

mod dual;
mod error;
mod expr;
mod func;
mod ops;
mod tape;

pub use dual::Dual;
pub use error::{Error, Result};
pub use expr::Expr;
pub use func::{Func, IntoPoint, Jacobian, Mode, Value};
pub use ops::Elementary;
pub use tape::{GraphNode, GraphView, Tape, Var};
