//! Tests for the scalar autograd engine.
//!
//! Covers backward correctness of every op, gradient accumulation across
//! shared subgraphs, grad zeroing, and finite-difference agreement for
//! {add, mul} graphs.

use crate::autograd::NodeRef;

#[test]
fn add_backward() {
    let a = NodeRef::new(2.0);
    let b = NodeRef::new(3.0);
    let c = &a + &b;
    assert_eq!(c.data(), 5.0);
    c.backward();
    assert_eq!(a.grad(), 1.0);
    assert_eq!(b.grad(), 1.0);
}

#[test]
fn mul_backward() {
    let a = NodeRef::new(2.0);
    let b = NodeRef::new(3.0);
    let c = &a * &b;
    assert_eq!(c.data(), 6.0);
    c.backward();
    assert_eq!(a.grad(), 3.0);
    assert_eq!(b.grad(), 2.0);
}

#[test]
fn pow_backward() {
    let a = NodeRef::new(2.0);
    let b = a.pow(3.0);
    assert!((b.data() - 8.0).abs() < 1e-10);
    b.backward();
    // d/dx x^3 = 3x^2 = 12 at x=2
    assert!((a.grad() - 12.0).abs() < 1e-10);
}

#[test]
fn log_backward() {
    let a = NodeRef::new(std::f64::consts::E);
    let b = a.log();
    assert!((b.data() - 1.0).abs() < 1e-10);
    b.backward();
    assert!((a.grad() - 1.0 / std::f64::consts::E).abs() < 1e-10);
}

#[test]
fn exp_backward() {
    let a = NodeRef::new(1.0);
    let b = a.exp();
    assert!((b.data() - std::f64::consts::E).abs() < 1e-10);
    b.backward();
    assert!((a.grad() - std::f64::consts::E).abs() < 1e-10);
}

#[test]
fn relu_backward_both_sides() {
    let pos = NodeRef::new(1.5);
    let neg = NodeRef::new(-0.5);
    let out = &pos.relu() + &neg.relu();
    assert_eq!(out.data(), 1.5);
    out.backward();
    assert_eq!(pos.grad(), 1.0);
    assert_eq!(neg.grad(), 0.0);
}

#[test]
fn sub_div_neg_backward() {
    let a = NodeRef::new(6.0);
    let b = NodeRef::new(2.0);
    let c = &a / &b;
    assert!((c.data() - 3.0).abs() < 1e-10);
    c.backward();
    // d(a/b)/da = 1/b, d(a/b)/db = -a/b^2
    assert!((a.grad() - 0.5).abs() < 1e-10);
    assert!((b.grad() + 1.5).abs() < 1e-10);

    let d = NodeRef::new(4.0);
    let e = NodeRef::new(1.0);
    let f = &d - &e;
    assert!((f.data() - 3.0).abs() < 1e-10);
    f.backward();
    assert!((d.grad() - 1.0).abs() < 1e-10);
    assert!((e.grad() + 1.0).abs() < 1e-10);
}

#[test]
fn diamond_graph_accumulates_through_both_paths() {
    // b = a*a reuses a; c = b + a adds a third path. dc/da = 2a + 1 = 7.
    let a = NodeRef::new(3.0);
    let b = &a * &a;
    let c = &b + &a;
    assert_eq!(c.data(), 12.0);
    c.backward();
    assert!((a.grad() - 7.0).abs() < 1e-10);
}

#[test]
fn grads_accumulate_across_backward_calls_until_zeroed() {
    let a = NodeRef::new(2.0);
    let b = NodeRef::new(5.0);
    let c = &a * &b;
    c.backward();
    assert_eq!(a.grad(), 5.0);

    let c2 = &a * &b;
    c2.backward();
    assert_eq!(a.grad(), 10.0, "second backward adds on top");

    a.zero_grad();
    assert_eq!(a.grad(), 0.0);
}

#[test]
fn scale_grad_rescales_accumulator() {
    let a = NodeRef::new(2.0);
    let b = NodeRef::new(4.0);
    (&a * &b).backward();
    a.scale_grad(0.25);
    assert!((a.grad() - 1.0).abs() < 1e-10);
}

#[test]
fn set_data_only_touches_the_leaf() {
    let a = NodeRef::new(1.0);
    let b = NodeRef::new(2.0);
    let c = &a + &b;
    a.set_data(10.0);
    assert_eq!(a.data(), 10.0);
    // Already-built nodes keep their recorded forward value.
    assert_eq!(c.data(), 3.0);
}

#[test]
fn backward_matches_finite_differences_on_add_mul_graph() {
    // f(x, y, z) = (x*y + z) * (x + y), checked leaf by leaf.
    let eval = |x: f64, y: f64, z: f64| (x * y + z) * (x + y);
    let (x0, y0, z0) = (1.3, -0.7, 2.1);

    let x = NodeRef::new(x0);
    let y = NodeRef::new(y0);
    let z = NodeRef::new(z0);
    let f = &(&(&x * &y) + &z) * &(&x + &y);
    f.backward();

    let h = 1e-6;
    let fd_x = (eval(x0 + h, y0, z0) - eval(x0 - h, y0, z0)) / (2.0 * h);
    let fd_y = (eval(x0, y0 + h, z0) - eval(x0, y0 - h, z0)) / (2.0 * h);
    let fd_z = (eval(x0, y0, z0 + h) - eval(x0, y0, z0 - h)) / (2.0 * h);

    assert!((x.grad() - fd_x).abs() < 1e-4, "x: {} vs {}", x.grad(), fd_x);
    assert!((y.grad() - fd_y).abs() < 1e-4, "y: {} vs {}", y.grad(), fd_y);
    assert!((z.grad() - fd_z).abs() < 1e-4, "z: {} vs {}", z.grad(), fd_z);
}

#[test]
fn log_of_non_positive_propagates_nan_not_panic() {
    let a = NodeRef::new(-1.0);
    let b = a.log();
    assert!(b.data().is_nan());
    // The graph stays walkable; the local grad 1/x is still defined here.
    b.backward();
    assert!((a.grad() + 1.0).abs() < 1e-12);
}
