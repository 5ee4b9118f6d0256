//! Reverse-mode automatic differentiation on a recorded computation graph.
//!
//! A [`Tape`] is an arena of graph nodes recorded during a forward
//! evaluation; a [`Var`] is a cheap handle to one node. Every arithmetic
//! operation pushes a fresh node carrying its value and a tag describing the
//! operation and its operands. A node's arena index doubles as its creation
//! index: evaluations that push their declared inputs first can later map an
//! adjoint back to the input column it belongs to.
//!
//! [`Var::backward`] runs one adjoint back-propagation pass rooted at the
//! node it is called on: it computes a depth-first post-order (topological)
//! ordering of the reachable subgraph, zeroes the adjoints in that subgraph,
//! seeds the root with 1 and walks the ordering in reverse, accumulating
//! each node's adjoint into its parents through the local derivative of its
//! operation.
//!
//! ```
//! use gradtrace::Var;
//!
//! let tape = Var::tape();
//! let x = Var::variable_on(tape, 3.0);
//! let y = x.clone() * x.clone(); // y = x²
//! let row = y.backward(1);
//!
//! assert_eq!(y.value(), 9.0);
//! assert_eq!(row[0], 6.0); // dy/dx = 2x
//! ```

use num_traits::Float;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

/// A differentiable variable: a handle to one node on a shared [`Tape`].
///
/// Cloning a `Var` clones the handle, not the node; using the same variable
/// in several places therefore builds a diamond in the graph, and its
/// adjoint accumulates one contribution per use.
#[derive(Clone)]
pub struct Var<T: Float> {
    tape: Rc<RefCell<Tape<T>>>,
    idx: usize,
}

impl<T: Float> Var<T> {
    /// Creates a fresh, empty tape for one evaluation.
    pub fn tape() -> Rc<RefCell<Tape<T>>> {
        Rc::new(RefCell::new(Tape::new()))
    }

    /// Records an input variable on `tape`.
    ///
    /// The inputs of a function must be the first nodes recorded, in input
    /// order: [`Var::backward`] identifies input nodes by `index < num_inputs`
    /// and uses the index as the Jacobian column.
    pub fn variable_on(tape: Rc<RefCell<Tape<T>>>, value: T) -> Self {
        let idx = tape.borrow_mut().push(value, Op::Leaf);
        Self { tape, idx }
    }

    /// Records a constant leaf on `tape`.
    pub fn constant_on(tape: Rc<RefCell<Tape<T>>>, value: T) -> Self {
        let idx = tape.borrow_mut().push(value, Op::Leaf);
        Self { tape, idx }
    }

    /// The value recorded for this node during the forward pass.
    pub fn value(&self) -> T {
        self.tape.borrow().nodes[self.idx].value
    }

    /// The adjoint ∂(root)/∂(this node) left by the most recent backward pass.
    pub fn adjoint(&self) -> T {
        self.tape.borrow().nodes[self.idx].adjoint
    }

    /// The creation index of this node on its tape.
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Back-propagates from this node and returns the Jacobian row
    /// `[∂self/∂input_0, …, ∂self/∂input_{num_inputs−1}]`.
    ///
    /// Adjoints over the reachable subgraph are re-zeroed first, so repeated
    /// passes (one per function output on a shared tape) do not interfere.
    pub fn backward(&self, num_inputs: usize) -> Vec<T> {
        self.tape.borrow_mut().backward_from(self.idx, num_inputs)
    }

    /// Extracts the node/edge set of the subgraph reachable from this node,
    /// for consumption by an external renderer.
    pub fn graph(&self) -> GraphView<T> {
        self.tape.borrow().graph_from(self.idx)
    }

    /// Raises to a plain scalar power. Local derivative: `p·a^(p−1)`.
    pub fn powf(self, exp: T) -> Self {
        let value = self.value().powf(exp);
        unary(&self, value, Op::Powf(self.idx, exp))
    }

    /// Raises to another variable's power. Local derivatives:
    /// `b·a^(b−1)` for the base, `a^b·ln a` for the exponent.
    pub fn pow(self, exp: Var<T>) -> Self {
        binary(&self, &exp, |a, b| a.powf(b), Op::Pow)
    }

    /// Raises a plain scalar base to this variable. Local derivative:
    /// `c^a·ln c`.
    pub fn exp_base(self, base: T) -> Self {
        let value = base.powf(self.value());
        unary(&self, value, Op::Expf(self.idx, base))
    }

    pub(crate) fn push_unary(&self, value: T, op: Op<T>) -> Var<T> {
        unary(self, value, op)
    }

    pub(crate) fn constant_like(&self, value: T) -> Var<T> {
        Var::constant_on(self.tape.clone(), value)
    }
}

impl<T: Float + fmt::Debug> fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("idx", &self.idx)
            .field("value", &self.value())
            .finish()
    }
}

/// The arena of graph nodes recorded during one reverse-mode evaluation.
///
/// Owned behind `Rc<RefCell<..>>` by every [`Var`] that points into it; the
/// whole graph is discarded together once the last handle is dropped. A tape
/// is scoped to a single evaluation, which is what makes the arena index a
/// reliable creation index.
pub struct Tape<T> {
    nodes: Vec<Node<T>>,
}

struct Node<T> {
    value: T,
    adjoint: T,
    op: Op<T>,
}

/// The operation that produced a node, carrying the parent indices and any
/// scalar constants its local derivative needs. Leaves carry `Leaf`.
#[derive(Clone, Copy)]
pub(crate) enum Op<T> {
    Leaf,
    Add(usize, usize),
    Sub(usize, usize),
    Mul(usize, usize),
    Div(usize, usize),
    Neg(usize),
    /// `a^b` with both operands on the tape.
    Pow(usize, usize),
    /// `a^p` with a scalar exponent.
    Powf(usize, T),
    /// `c^a` with a scalar base.
    Expf(usize, T),
    Sin(usize),
    Cos(usize),
    Tan(usize),
    Exp(usize),
    Ln(usize),
    LogBase(usize, T),
    Asin(usize),
    Acos(usize),
    Atan(usize),
    Sinh(usize),
    Cosh(usize),
    Tanh(usize),
    Logistic(usize),
    Sqrt(usize),
}

impl<T: Float> Op<T> {
    fn parents(&self) -> impl Iterator<Item = usize> {
        let (a, b) = match *self {
            Op::Leaf => (None, None),
            Op::Add(a, b) | Op::Sub(a, b) | Op::Mul(a, b) | Op::Div(a, b) | Op::Pow(a, b) => {
                (Some(a), Some(b))
            }
            Op::Neg(a)
            | Op::Powf(a, _)
            | Op::Expf(a, _)
            | Op::Sin(a)
            | Op::Cos(a)
            | Op::Tan(a)
            | Op::Exp(a)
            | Op::Ln(a)
            | Op::LogBase(a, _)
            | Op::Asin(a)
            | Op::Acos(a)
            | Op::Atan(a)
            | Op::Sinh(a)
            | Op::Cosh(a)
            | Op::Tanh(a)
            | Op::Logistic(a)
            | Op::Sqrt(a) => (Some(a), None),
        };
        a.into_iter().chain(b)
    }

    /// Textual tag for graph rendering; empty for leaves.
    fn symbol(&self) -> String {
        match self {
            Op::Leaf => String::new(),
            Op::Add(..) => "+".into(),
            Op::Sub(..) => "-".into(),
            Op::Mul(..) => "x".into(),
            Op::Div(..) => "/".into(),
            Op::Neg(..) => "neg".into(),
            Op::Pow(..) | Op::Powf(..) => "^".into(),
            Op::Expf(_, base) => {
                format!("{}^", num_traits::cast::<T, f64>(*base).unwrap_or(f64::NAN))
            }
            Op::Sin(..) => "sin".into(),
            Op::Cos(..) => "cos".into(),
            Op::Tan(..) => "tan".into(),
            Op::Exp(..) => "exp".into(),
            Op::Ln(..) => "log".into(),
            Op::LogBase(_, base) => {
                format!("log_{}", num_traits::cast::<T, f64>(*base).unwrap_or(f64::NAN))
            }
            Op::Asin(..) => "arcsin".into(),
            Op::Acos(..) => "arccos".into(),
            Op::Atan(..) => "arctan".into(),
            Op::Sinh(..) => "sinh".into(),
            Op::Cosh(..) => "cosh".into(),
            Op::Tanh(..) => "tanh".into(),
            Op::Logistic(..) => "logistic".into(),
            Op::Sqrt(..) => "sqrt".into(),
        }
    }
}

impl<T: Float> Tape<T> {
    fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn push(&mut self, value: T, op: Op<T>) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            value,
            adjoint: T::zero(),
            op,
        });
        idx
    }

    /// Depth-first post-order from `root`: every node appears strictly after
    /// all of its parents. Identity is the arena index, never the value.
    fn topo_order(&self, root: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        self.visit(root, &mut visited, &mut order);
        order
    }

    fn visit(&self, idx: usize, visited: &mut [bool], order: &mut Vec<usize>) {
        if visited[idx] {
            return;
        }
        visited[idx] = true;
        for parent in self.nodes[idx].op.parents() {
            self.visit(parent, visited, order);
        }
        order.push(idx);
    }

    fn val(&self, idx: usize) -> T {
        self.nodes[idx].value
    }

    fn acc(&mut self, idx: usize, amount: T) {
        // Accumulate, never assign: a node used as an operand in several
        // places receives one contribution per use.
        let adjoint = self.nodes[idx].adjoint;
        self.nodes[idx].adjoint = adjoint + amount;
    }

    fn backward_from(&mut self, root: usize, num_inputs: usize) -> Vec<T> {
        let order = self.topo_order(root);

        // Zero the reachable subgraph so passes for other outputs sharing
        // this tape cannot leak adjoints into this one.
        for &idx in &order {
            self.nodes[idx].adjoint = T::zero();
        }
        self.nodes[root].adjoint = T::one();

        let mut row = vec![T::zero(); num_inputs];
        let one = T::one();

        for &idx in order.iter().rev() {
            let go = self.nodes[idx].adjoint;
            if idx < num_inputs {
                row[idx] = go;
            }
            match self.nodes[idx].op {
                Op::Leaf => {}
                Op::Add(a, b) => {
                    self.acc(a, go);
                    self.acc(b, go);
                }
                Op::Sub(a, b) => {
                    self.acc(a, go);
                    self.acc(b, -go);
                }
                Op::Mul(a, b) => {
                    let (av, bv) = (self.val(a), self.val(b));
                    self.acc(a, go * bv);
                    self.acc(b, go * av);
                }
                Op::Div(a, b) => {
                    let (av, bv) = (self.val(a), self.val(b));
                    self.acc(a, go / bv);
                    self.acc(b, -go * av / (bv * bv));
                }
                Op::Neg(a) => self.acc(a, -go),
                Op::Pow(a, b) => {
                    let (av, bv) = (self.val(a), self.val(b));
                    let out = self.val(idx);
                    self.acc(a, go * bv * av.powf(bv - one));
                    self.acc(b, go * out * av.ln());
                }
                Op::Powf(a, p) => {
                    let av = self.val(a);
                    self.acc(a, go * p * av.powf(p - one));
                }
                Op::Expf(a, base) => {
                    let out = self.val(idx);
                    self.acc(a, go * out * base.ln());
                }
                Op::Sin(a) => {
                    let av = self.val(a);
                    self.acc(a, go * av.cos());
                }
                Op::Cos(a) => {
                    let av = self.val(a);
                    self.acc(a, -go * av.sin());
                }
                Op::Tan(a) => {
                    let c = self.val(a).cos();
                    self.acc(a, go / (c * c));
                }
                Op::Exp(a) => {
                    let out = self.val(idx);
                    self.acc(a, go * out);
                }
                Op::Ln(a) => {
                    let av = self.val(a);
                    self.acc(a, go / av);
                }
                Op::LogBase(a, base) => {
                    let av = self.val(a);
                    self.acc(a, go / (av * base.ln()));
                }
                Op::Asin(a) => {
                    let av = self.val(a);
                    self.acc(a, go / (one - av * av).sqrt());
                }
                Op::Acos(a) => {
                    let av = self.val(a);
                    self.acc(a, -go / (one - av * av).sqrt());
                }
                Op::Atan(a) => {
                    let av = self.val(a);
                    self.acc(a, go / (one + av * av));
                }
                Op::Sinh(a) => {
                    let av = self.val(a);
                    self.acc(a, go * av.cosh());
                }
                Op::Cosh(a) => {
                    let av = self.val(a);
                    self.acc(a, go * av.sinh());
                }
                Op::Tanh(a) => {
                    let c = self.val(a).cosh();
                    self.acc(a, go / (c * c));
                }
                Op::Logistic(a) => {
                    let s = one / (one + (-self.val(a)).exp());
                    self.acc(a, go * s * (one - s));
                }
                Op::Sqrt(a) => {
                    let out = self.val(idx);
                    self.acc(a, go / (out + out));
                }
            }
        }
        row
    }

    fn graph_from(&self, root: usize) -> GraphView<T> {
        let mut view = GraphView {
            nodes: Vec::new(),
            edges: HashSet::new(),
        };
        let mut seen = vec![false; self.nodes.len()];
        self.collect(root, &mut seen, &mut view);
        view
    }

    fn collect(&self, idx: usize, seen: &mut [bool], view: &mut GraphView<T>) {
        if seen[idx] {
            return;
        }
        seen[idx] = true;
        view.nodes.push(GraphNode {
            id: idx,
            value: self.nodes[idx].value,
            label: self.nodes[idx].op.symbol(),
        });
        for parent in self.nodes[idx].op.parents() {
            view.edges.insert((parent, idx));
            self.collect(parent, seen, view);
        }
    }
}

/// One node of an extracted computation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode<T> {
    /// Identity of the node, stable within one extraction; suitable as a
    /// rendering key.
    pub id: usize,
    /// The value computed at this node during the forward pass.
    pub value: T,
    /// Textual tag of the producing operation; empty for leaf/input nodes.
    pub label: String,
}

/// The node/edge set of a computation graph, for an external renderer.
///
/// Edges run parent → child and are deduplicated. Neither collection
/// guarantees any particular iteration order; renderers key off
/// [`GraphNode::id`].
#[derive(Debug, Clone)]
pub struct GraphView<T> {
    /// All nodes reachable from the extraction root.
    pub nodes: Vec<GraphNode<T>>,
    /// Directed `(parent, child)` pairs between node ids.
    pub edges: HashSet<(usize, usize)>,
}

fn unary<T: Float>(x: &Var<T>, value: T, op: Op<T>) -> Var<T> {
    let idx = x.tape.borrow_mut().push(value, op);
    Var {
        tape: x.tape.clone(),
        idx,
    }
}

fn binary<T: Float>(
    lhs: &Var<T>,
    rhs: &Var<T>,
    f: impl FnOnce(T, T) -> T,
    op: impl FnOnce(usize, usize) -> Op<T>,
) -> Var<T> {
    assert!(Rc::ptr_eq(&lhs.tape, &rhs.tape), "Vars must share a tape");
    let value = f(lhs.value(), rhs.value());
    let idx = lhs.tape.borrow_mut().push(value, op(lhs.idx, rhs.idx));
    Var {
        tape: lhs.tape.clone(),
        idx,
    }
}

impl<T: Float> Add for Var<T> {
    type Output = Var<T>;

    fn add(self, rhs: Self) -> Self::Output {
        binary(&self, &rhs, |a, b| a + b, Op::Add)
    }
}

impl<T: Float> Sub for Var<T> {
    type Output = Var<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        binary(&self, &rhs, |a, b| a - b, Op::Sub)
    }
}

impl<T: Float> Mul for Var<T> {
    type Output = Var<T>;

    fn mul(self, rhs: Self) -> Self::Output {
        binary(&self, &rhs, |a, b| a * b, Op::Mul)
    }
}

impl<T: Float> Div for Var<T> {
    type Output = Var<T>;

    fn div(self, rhs: Self) -> Self::Output {
        binary(&self, &rhs, |a, b| a / b, Op::Div)
    }
}

impl<T: Float> Neg for Var<T> {
    type Output = Var<T>;

    fn neg(self) -> Self::Output {
        let value = -self.value();
        unary(&self, value, Op::Neg(self.idx))
    }
}

// A bare scalar operand becomes a fresh constant leaf before the operation
// is recorded, so a scalar still occupies one creation slot. Declared
// inputs are recorded before any user arithmetic runs, so these later
// promotions never disturb the input-index contract.
impl<T: Float> Add<T> for Var<T> {
    type Output = Var<T>;

    fn add(self, c: T) -> Self::Output {
        let cvar = self.constant_like(c);
        self + cvar
    }
}

impl<T: Float> Sub<T> for Var<T> {
    type Output = Var<T>;

    fn sub(self, c: T) -> Self::Output {
        let cvar = self.constant_like(c);
        self - cvar
    }
}

impl<T: Float> Mul<T> for Var<T> {
    type Output = Var<T>;

    fn mul(self, c: T) -> Self::Output {
        let cvar = self.constant_like(c);
        self * cvar
    }
}

impl<T: Float> Div<T> for Var<T> {
    type Output = Var<T>;

    fn div(self, c: T) -> Self::Output {
        let cvar = self.constant_like(c);
        self / cvar
    }
}

macro_rules! scalar_lhs_var_ops {
    ($($t:ty),*) => {$(
        impl Add<Var<$t>> for $t {
            type Output = Var<$t>;

            fn add(self, rhs: Var<$t>) -> Var<$t> {
                rhs + self
            }
        }

        impl Sub<Var<$t>> for $t {
            type Output = Var<$t>;

            fn sub(self, rhs: Var<$t>) -> Var<$t> {
                let cvar = rhs.constant_like(self);
                cvar - rhs
            }
        }

        impl Mul<Var<$t>> for $t {
            type Output = Var<$t>;

            fn mul(self, rhs: Var<$t>) -> Var<$t> {
                rhs * self
            }
        }

        impl Div<Var<$t>> for $t {
            type Output = Var<$t>;

            fn div(self, rhs: Var<$t>) -> Var<$t> {
                let cvar = rhs.constant_like(self);
                cvar / rhs
            }
        }
    )*};
}

scalar_lhs_var_ops!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn input(tape: &Rc<RefCell<Tape<f64>>>, value: f64) -> Var<f64> {
        Var::variable_on(tape.clone(), value)
    }

    #[test]
    fn square_has_doubled_adjoint() {
        let tape = Var::tape();
        let x = input(&tape, 3.0);
        let y = x.clone() * x.clone();
        let row = y.backward(1);

        assert_eq!(y.value(), 9.0);
        assert_eq!(row, vec![6.0]);
        assert_eq!(x.adjoint(), 6.0);
    }

    #[test]
    fn diamond_accumulates_contributions() {
        // f(x) = x·x + x at x = 3: f' = 2x + 1 = 7
        let tape = Var::tape();
        let x = input(&tape, 3.0);
        let y = x.clone() * x.clone() + x.clone();
        let row = y.backward(1);
        assert_eq!(row, vec![7.0]);
    }

    #[test]
    fn two_inputs_fill_their_columns() {
        // f(x, y) = x·y - y at (2, 5): ∂f/∂x = 5, ∂f/∂y = 1
        let tape = Var::tape();
        let x = input(&tape, 2.0);
        let y = input(&tape, 5.0);
        let f = x * y.clone() - y;
        let row = f.backward(2);
        assert_eq!(row, vec![5.0, 1.0]);
    }

    #[test]
    fn scalar_operand_becomes_a_constant_leaf() {
        let tape = Var::tape();
        let x = input(&tape, 3.0);
        let y = x.clone() + 2.0;

        // Layout: input, promoted constant, result.
        assert_eq!(x.index(), 0);
        assert_eq!(y.index(), 2);
        assert_eq!(tape.borrow().nodes.len(), 3);
        assert_eq!(tape.borrow().val(1), 2.0);

        let row = y.backward(1);
        assert_eq!(row, vec![1.0]);
    }

    #[test]
    fn reflected_scalar_operators() {
        let tape = Var::tape();
        let x = input(&tape, 2.0);
        let y = 6.0 / x.clone();
        assert_eq!(y.value(), 3.0);
        let row = y.backward(1);
        assert_eq!(row, vec![-1.5]); // -6/x²

        let tape = Var::tape();
        let x = input(&tape, 2.0);
        let y = 5.0 - x;
        assert_eq!(y.value(), 3.0);
        let row = y.backward(1);
        assert_eq!(row, vec![-1.0]);
    }

    #[test]
    fn negation_flips_the_adjoint() {
        let tape = Var::tape();
        let x = input(&tape, 4.0);
        let y = -x;
        let row = y.backward(1);
        assert_eq!(y.value(), -4.0);
        assert_eq!(row, vec![-1.0]);
    }

    #[test]
    fn pow_family() {
        let tape = Var::tape();
        let x = input(&tape, 2.0);
        let y = x.powf(3.0);
        assert_eq!(y.value(), 8.0);
        assert_eq!(y.backward(1), vec![12.0]);

        // x^y at (2, 3): ∂/∂x = 3·2² = 12, ∂/∂y = 8·ln 2
        let tape = Var::tape();
        let x = input(&tape, 2.0);
        let y = input(&tape, 3.0);
        let f = x.pow(y);
        let row = f.backward(2);
        assert!((row[0] - 12.0).abs() < 1e-12);
        assert!((row[1] - 8.0 * 2.0_f64.ln()).abs() < 1e-12);

        // 2^x at x = 3
        let tape = Var::tape();
        let x = input(&tape, 3.0);
        let f = x.exp_base(2.0);
        assert_eq!(f.value(), 8.0);
        let row = f.backward(1);
        assert!((row[0] - 8.0 * 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn topological_order_puts_parents_first() {
        let tape = Var::tape();
        let x = input(&tape, 1.5);
        let y = input(&tape, 2.5);
        let f = (x.clone() * y.clone() + x.clone()) * (y + 1.0) - x;

        let t = tape.borrow();
        let order = t.topo_order(f.index());
        let position: std::collections::HashMap<usize, usize> =
            order.iter().enumerate().map(|(pos, &idx)| (idx, pos)).collect();
        for &idx in &order {
            for parent in t.nodes[idx].op.parents() {
                assert!(position[&parent] < position[&idx]);
            }
        }
    }

    #[test]
    fn repeated_backward_passes_are_idempotent() {
        let tape = Var::tape();
        let x = input(&tape, 3.0);
        let y = x.clone() * x.clone() + x;
        let first = y.backward(1);
        let second = y.backward(1);
        assert_eq!(first, second);
    }

    #[test]
    fn graph_extraction_deduplicates_edges() {
        let tape = Var::tape();
        let x = input(&tape, 3.0);
        let y = x.clone() * x.clone() + 2.0;
        let view = y.graph();

        // input, product, promoted constant, sum
        assert_eq!(view.nodes.len(), 4);
        assert_eq!(view.edges.len(), 3);
        assert!(view.edges.contains(&(0, 1))); // x → x·x, once

        let labels: std::collections::HashMap<usize, &str> = view
            .nodes
            .iter()
            .map(|n| (n.id, n.label.as_str()))
            .collect();
        assert_eq!(labels[&0], "");
        assert_eq!(labels[&1], "x");
        assert_eq!(labels[&3], "+");
    }

    #[test]
    #[should_panic(expected = "share a tape")]
    fn mixing_tapes_panics() {
        let a = Var::variable_on(Var::tape(), 1.0);
        let b = Var::variable_on(Var::tape(), 2.0);
        let _ = a + b;
    }
}
