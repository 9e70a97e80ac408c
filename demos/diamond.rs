//! Dependency graph in diamond shape. `a` feeds both sums, so its derivative
//! adds up under `Accumulate` and keeps only the last write under `Overwrite`.

use scalargrad::{BackpropMode, Tape};

fn main() {
    let tape = Tape::new();
    let a = tape.term("a", 1.);
    let b = tape.term("b", 3.);
    let c = tape.term("c", 5.);
    let ab = a + b;
    let ac = a + c;
    let abac = ab + ac;

    for mode in [BackpropMode::Overwrite, BackpropMode::Accumulate] {
        abac.backprop_with(1., mode).unwrap();
        println!("{mode:?}");
        println!("abac: {abac:?}");
        println!("a: {a:?}");
        println!("b: {b:?}");
        println!("c: {c:?}");
    }
    abac.dot(&mut std::io::stdout()).unwrap();
}
