//! Scalar reverse-mode autodiff.
//!
//! Every arithmetic op builds a new graph node that remembers its parent
//! nodes and the local derivative with respect to each. [`NodeRef::backward`]
//! walks the graph once in reverse topological order and accumulates
//! `d(loss)/d(node)` into every ancestor. Gradients add up across backward
//! calls; callers that accumulate over a mini-batch must zero parameter
//! grads between batches (the trainer owns that step).
//!
//! `log` of a non-positive value and fractional `pow` of a negative base are
//! not guarded: they produce NaN/Inf and flow through later math unchanged.

use std::cell::RefCell;
use std::collections::HashSet;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

#[cfg(test)]
mod tests;

/// Graph node state: forward value, gradient accumulator, and the edges
/// (parents plus aligned local derivatives) recorded at creation.
struct Node {
    data: f64,
    grad: f64,
    parents: Vec<NodeRef>,
    local_grads: Vec<f64>,
}

/// Shared handle to a scalar node in the computation graph.
///
/// Nodes are shared via `Rc<RefCell<_>>`: one parameter leaf can feed many
/// downstream nodes and still receive the sum of their gradients. `data`,
/// `parents`, and the local derivatives are fixed at creation; only `grad`
/// (during backward) and leaf `data` (via [`NodeRef::set_data`], used by the
/// optimizer) mutate afterward. A node is always created after its parents,
/// so the graph is a DAG by construction.
#[derive(Clone)]
pub struct NodeRef(Rc<RefCell<Node>>);

impl NodeRef {
    /// Creates a leaf node with no parents and zero gradient.
    #[must_use]
    pub fn new(data: f64) -> Self {
        NodeRef(Rc::new(RefCell::new(Node {
            data,
            grad: 0.0,
            parents: Vec::new(),
            local_grads: Vec::new(),
        })))
    }

    fn with_graph(data: f64, parents: Vec<NodeRef>, local_grads: Vec<f64>) -> Self {
        NodeRef(Rc::new(RefCell::new(Node {
            data,
            grad: 0.0,
            parents,
            local_grads,
        })))
    }

    /// Forward value.
    #[must_use]
    pub fn data(&self) -> f64 {
        self.0.borrow().data
    }

    /// Gradient of the last backward root with respect to this node.
    #[must_use]
    pub fn grad(&self) -> f64 {
        self.0.borrow().grad
    }

    /// Overwrites the forward value. Only meaningful for parameter leaves;
    /// nodes derived from the old value are not recomputed.
    pub fn set_data(&self, data: f64) {
        self.0.borrow_mut().data = data;
    }

    /// Resets this node's gradient accumulator to zero.
    pub fn zero_grad(&self) {
        self.0.borrow_mut().grad = 0.0;
    }

    /// Scales this node's gradient in place (mini-batch averaging).
    pub fn scale_grad(&self, factor: f64) {
        self.0.borrow_mut().grad *= factor;
    }

    fn add_grad(&self, g: f64) {
        self.0.borrow_mut().grad += g;
    }

    /// `self + other`; local grads 1, 1.
    #[must_use]
    pub fn add(&self, other: &NodeRef) -> NodeRef {
        NodeRef::with_graph(
            self.data() + other.data(),
            vec![self.clone(), other.clone()],
            vec![1.0, 1.0],
        )
    }

    /// `self * other`; local grads `other`, `self`.
    #[must_use]
    pub fn mul(&self, other: &NodeRef) -> NodeRef {
        NodeRef::with_graph(
            self.data() * other.data(),
            vec![self.clone(), other.clone()],
            vec![other.data(), self.data()],
        )
    }

    /// `self^exp`; local grad `exp * self^(exp-1)`.
    #[must_use]
    pub fn pow(&self, exp: f64) -> NodeRef {
        let data = self.data().powf(exp);
        let local = exp * self.data().powf(exp - 1.0);
        NodeRef::with_graph(data, vec![self.clone()], vec![local])
    }

    /// Natural log; local grad `1/self`. NaN for non-positive input.
    #[must_use]
    pub fn log(&self) -> NodeRef {
        let data = self.data().ln();
        let local = 1.0 / self.data();
        NodeRef::with_graph(data, vec![self.clone()], vec![local])
    }

    /// `e^self`; local grad equals the output.
    #[must_use]
    pub fn exp(&self) -> NodeRef {
        let data = self.data().exp();
        NodeRef::with_graph(data, vec![self.clone()], vec![data])
    }

    /// `max(0, self)`; local grad 1 when positive, else 0.
    #[must_use]
    pub fn relu(&self) -> NodeRef {
        let local = if self.data() > 0.0 { 1.0 } else { 0.0 };
        NodeRef::with_graph(self.data().max(0.0), vec![self.clone()], vec![local])
    }

    /// Backpropagates from this node to every ancestor.
    ///
    /// Builds a reverse topological order by depth-first traversal over
    /// parent edges, memoized by `Rc` pointer identity so diamond-shaped
    /// graphs visit each node once. Seeds this node's grad with 1 and then
    /// applies the chain rule in reverse order.
    pub fn backward(&self) {
        let mut topo = Vec::new();
        let mut visited: HashSet<*const RefCell<Node>> = HashSet::new();

        fn build_topo(
            node: &NodeRef,
            visited: &mut HashSet<*const RefCell<Node>>,
            topo: &mut Vec<NodeRef>,
        ) {
            if !visited.insert(Rc::as_ptr(&node.0)) {
                return;
            }
            for parent in &node.0.borrow().parents {
                build_topo(parent, visited, topo);
            }
            topo.push(node.clone());
        }
        build_topo(self, &mut visited, &mut topo);

        self.0.borrow_mut().grad = 1.0;
        for node in topo.iter().rev() {
            let out_grad = node.grad();
            let inner = node.0.borrow();
            for (parent, &local) in inner.parents.iter().zip(inner.local_grads.iter()) {
                parent.add_grad(local * out_grad);
            }
        }
    }
}

// Operator sugar on references, so expressions over borrowed nodes read like
// plain arithmetic: `&a * &b + &c`.

impl Add for &NodeRef {
    type Output = NodeRef;

    fn add(self, rhs: Self) -> NodeRef {
        NodeRef::add(self, rhs)
    }
}

impl Mul for &NodeRef {
    type Output = NodeRef;

    fn mul(self, rhs: Self) -> NodeRef {
        NodeRef::mul(self, rhs)
    }
}

impl Neg for &NodeRef {
    type Output = NodeRef;

    fn neg(self) -> NodeRef {
        self * &NodeRef::new(-1.0)
    }
}

impl Sub for &NodeRef {
    type Output = NodeRef;

    fn sub(self, rhs: Self) -> NodeRef {
        self + &(-rhs)
    }
}

impl Div for &NodeRef {
    type Output = NodeRef;

    fn div(self, rhs: Self) -> NodeRef {
        self * &rhs.pow(-1.0)
    }
}
