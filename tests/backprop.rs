use scalargrad::{BackpropMode, GradError, Tape};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-12 * expected.abs().max(1.),
        "{actual} != {expected}"
    );
}

#[test]
fn forward_values() {
    let tape = Tape::new();
    for (a, b) in [(1.5, 2.), (-3., 0.25), (0., 7.), (2., -1.)] {
        let (x, y) = (tape.term("a", a), tape.term("b", b));
        assert_eq!((x + y).eval(), a + b);
        assert_eq!((x - y).eval(), a - b);
        assert_eq!((x * y).eval(), a * b);
        assert_eq!(x.relu().eval(), f64::max(0., a));
    }
    let base = tape.term("base", 3.);
    assert_close(base.pow(tape.term("3", 3.)).eval(), 27.);
    assert_close(base.pow(tape.term("half", 0.5)).eval(), 3f64.sqrt());
    assert_eq!(tape.term("neg", -2.).pow(tape.term("2", 2.)).eval(), 4.);
}

#[test]
fn local_gradient_of_multiply() {
    let tape = Tape::new();
    let a = tape.term("a", 3.);
    let b = tape.term("b", 4.);
    (a * b).backprop().unwrap();
    assert_eq!(a.grad(), 4.);
    assert_eq!(b.grad(), 3.);
}

#[test]
fn local_gradient_of_subtract_and_pow() {
    let tape = Tape::new();
    let a = tape.term("a", 3.);
    let b = tape.term("b", 4.);
    (a - b).backprop().unwrap();
    assert_eq!((a.grad(), b.grad()), (1., -1.));

    let p = a.pow(b);
    p.backprop().unwrap();
    assert_close(a.grad(), 4. * 27.);
    assert_close(b.grad(), 81. * 3f64.ln());
}

#[test]
fn chain_rule() {
    let tape = Tape::new();
    let x = tape.term("x", 2.5);
    let w = tape.term("w", -1.5);
    let b = tape.term("b", 0.75);
    let y = x * w + b;
    for mode in [BackpropMode::Overwrite, BackpropMode::Accumulate] {
        y.backprop_with(1., mode).unwrap();
        assert_eq!(w.grad(), x.eval());
        assert_eq!(x.grad(), w.eval());
        assert_eq!(b.grad(), 1.);
    }
}

#[test]
fn relu_boundary() {
    let tape = Tape::new();
    let neg = tape.term("neg", -1.);
    let r = neg.relu();
    assert_eq!(r.eval(), 0.);
    r.backprop().unwrap();
    assert_eq!(neg.grad(), 0.);

    let pos = tape.term("pos", 2.);
    let r = pos.relu();
    assert_eq!(r.eval(), 2.);
    r.backprop().unwrap();
    assert_eq!(pos.grad(), 1.);

    let zero = tape.term("zero", 0.);
    zero.relu().backprop().unwrap();
    assert_eq!(zero.grad(), 0.);
}

#[test]
fn seed_scales_gradients() {
    let tape = Tape::new();
    let a = tape.term("a", 3.);
    let b = tape.term("b", 4.);
    let ab = a * b;
    ab.backprop_with(0.5, BackpropMode::Overwrite).unwrap();
    assert_eq!(ab.grad(), 0.5);
    assert_eq!(a.grad(), 2.);
    assert_eq!(b.grad(), 1.5);
}

#[test]
fn end_to_end() {
    let tape = Tape::new();
    let w0 = tape.term("w0", 0.5);
    let x1 = tape.term("x1", 1.2);
    let y = w0 * x1;
    assert_close(y.eval(), 0.6);
    y.backprop().unwrap();
    assert_close(w0.grad(), 1.2);
    assert_close(x1.grad(), 0.5);
}

#[test]
fn pow_of_non_positive_base() {
    let tape = Tape::new();
    for base in [0., -2.] {
        let b = tape.term_with_grad("b", base, 0.25);
        let e = tape.term("e", 2.);
        let p = b.pow(e);
        assert_eq!(
            p.backprop(),
            Err(GradError::Domain {
                label: "(b ** e)".to_string(),
                base
            })
        );
        assert_eq!(b.grad(), 0.25);
    }

    let b = tape.term("b", -2.);
    let two = tape.constant("2", 2.);
    b.pow(two).backprop().unwrap();
    assert_eq!(b.grad(), -4.);
    assert_eq!(two.grad(), 0.);
}
