//! Implementation of shared memory arena for the terms, aka a tape.
//! See https://rufflewind.com/2016-12-30/reverse-mode-automatic-differentiation

use std::{
    cell::{Cell, RefCell},
    fmt,
    io::Write,
};

use crate::{
    dot::{render, DotSink, GraphSink},
    error::GradError,
    op::{Contributions, Operation},
};

/// Gradient every node starts with unless a leaf is given another seed.
pub const DEFAULT_GRAD_SEED: f64 = 1.;

/// How gradients are written into operands during [`TapeTerm::backprop_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackpropMode {
    /// Each incoming edge assigns the operand's gradient, so the last visit wins.
    /// Only correct when every node has a single consumer.
    Overwrite,
    /// Reachable gradients are zeroed and every edge adds its contribution.
    #[default]
    Accumulate,
}

/// What to do when a gradient comes out as NaN or infinite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NonFinitePolicy {
    #[default]
    Propagate,
    Reject,
}

#[derive(Default, Debug)]
pub struct Tape {
    nodes: RefCell<Vec<TapeNode>>,
    policy: Cell<NonFinitePolicy>,
}

#[derive(Clone, Debug)]
struct TapeNode {
    name: String,
    op: Option<Operation>,
    data: f64,
    grad: f64,
    requires_grad: bool,
}

#[derive(Copy, Clone)]
pub struct TapeTerm<'a> {
    tape: &'a Tape,
    idx: u32,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: NonFinitePolicy) -> Self {
        let tape = Self::default();
        tape.policy.set(policy);
        tape
    }

    pub fn policy(&self) -> NonFinitePolicy {
        self.policy.get()
    }

    pub fn set_policy(&self, policy: NonFinitePolicy) {
        self.policy.set(policy);
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Drop every node so the tape can hold the next graph.
    pub fn clear(&mut self) {
        self.nodes.get_mut().clear();
    }

    /// A variable leaf with the default gradient seed.
    pub fn term<'a>(&'a self, name: impl Into<String>, init: f64) -> TapeTerm<'a> {
        self.term_with_grad(name, init, DEFAULT_GRAD_SEED)
    }

    pub fn term_with_grad<'a>(
        &'a self,
        name: impl Into<String>,
        init: f64,
        grad: f64,
    ) -> TapeTerm<'a> {
        self.push(TapeNode {
            name: name.into(),
            op: None,
            data: init,
            grad,
            requires_grad: true,
        })
    }

    /// A leaf whose gradient is shown but never needed, such as an input or an exponent.
    /// As the exponent of `pow` over a non-positive base it gets no partial instead of
    /// failing with [`GradError::Domain`].
    pub fn constant<'a>(&'a self, name: impl Into<String>, init: f64) -> TapeTerm<'a> {
        self.push(TapeNode {
            name: name.into(),
            op: None,
            data: init,
            grad: 0.,
            requires_grad: false,
        })
    }

    fn push<'a>(&'a self, node: TapeNode) -> TapeTerm<'a> {
        let mut nodes = self.nodes.borrow_mut();
        let idx = nodes.len();
        nodes.push(node);
        TapeTerm {
            tape: self,
            idx: idx as u32,
        }
    }

    fn term0<'a>(&'a self, name: String, op: Operation) -> TapeTerm<'a> {
        let (data, requires_grad) = {
            let nodes = self.nodes.borrow();
            let data = op.eval(|idx| nodes[idx as usize].data);
            let requires_grad = op.operands().any(|idx| nodes[idx as usize].requires_grad);
            (data, requires_grad)
        };
        self.push(TapeNode {
            name,
            op: Some(op),
            data,
            grad: DEFAULT_GRAD_SEED,
            requires_grad,
        })
    }

    fn binary<'a>(
        &'a self,
        lhs: TapeTerm<'a>,
        rhs: TapeTerm<'a>,
        op: fn(u32, u32) -> Operation,
    ) -> TapeTerm<'a> {
        let rhs = self.adopt(rhs);
        let op = op(lhs.idx, rhs.idx);
        let name = format!("({} {} {})", lhs.name(), op.symbol(), rhs.name());
        self.term0(name, op)
    }

    /// Bring `term` onto this tape. A term of another tape is copied together with
    /// everything it was built from, keeping values and gradients; backpropagation
    /// through the result writes the copies, not the originals.
    pub fn adopt<'a>(&'a self, term: TapeTerm<'_>) -> TapeTerm<'a> {
        if std::ptr::eq(self, term.tape) {
            return TapeTerm {
                tape: self,
                idx: term.idx,
            };
        }
        let foreign = term.tape.nodes.borrow();
        let last = term.idx as usize;
        let mut reached = vec![false; last + 1];
        reached[last] = true;
        for idx in (0..=last).rev() {
            if let (true, Some(op)) = (reached[idx], foreign[idx].op) {
                for operand in op.operands() {
                    reached[operand as usize] = true;
                }
            }
        }

        let mut nodes = self.nodes.borrow_mut();
        let mut remap = vec![0u32; last + 1];
        for (idx, node) in foreign[..=last].iter().enumerate() {
            if !reached[idx] {
                continue;
            }
            let mut node = node.clone();
            node.op = node.op.map(|op| op.map_operands(|i| remap[i as usize]));
            remap[idx] = nodes.len() as u32;
            nodes.push(node);
        }
        log::debug!(
            "adopted {} as node {} ({} nodes copied)",
            foreign[last].name,
            remap[last],
            reached.iter().filter(|r| **r).count()
        );
        TapeTerm {
            tape: self,
            idx: remap[last],
        }
    }
}

impl<'a> std::ops::Add for TapeTerm<'a> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        self.tape.binary(self, rhs, Operation::Add)
    }
}

impl<'a> std::ops::Sub for TapeTerm<'a> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self.tape.binary(self, rhs, Operation::Sub)
    }
}

impl<'a> std::ops::Mul for TapeTerm<'a> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.tape.binary(self, rhs, Operation::Mul)
    }
}

impl<'a> TapeTerm<'a> {
    pub fn pow(&self, rhs: Self) -> Self {
        self.tape.binary(*self, rhs, Operation::Pow)
    }

    pub fn relu(&self) -> Self {
        let op = Operation::Relu(self.idx);
        let name = format!("{}({})", op.symbol(), self.name());
        self.tape.term0(name, op)
    }

    pub fn idx(&self) -> u32 {
        self.idx
    }

    pub fn name(&self) -> String {
        self.tape.nodes.borrow()[self.idx as usize].name.clone()
    }

    /// Value computed when the node was built. Never re-evaluated.
    pub fn eval(&self) -> f64 {
        self.tape.nodes.borrow()[self.idx as usize].data
    }

    pub fn grad(&self) -> f64 {
        self.tape.nodes.borrow()[self.idx as usize].grad
    }

    pub fn set_grad(&self, grad: f64) {
        self.tape.nodes.borrow_mut()[self.idx as usize].grad = grad;
    }

    pub fn operation(&self) -> Option<Operation> {
        self.tape.nodes.borrow()[self.idx as usize].op
    }

    pub fn operands(&self) -> Vec<TapeTerm<'a>> {
        self.operation()
            .map(|op| {
                op.operands()
                    .map(|idx| TapeTerm {
                        tape: self.tape,
                        idx,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_leaf(&self) -> bool {
        self.operation().is_none()
    }

    pub fn requires_grad(&self) -> bool {
        self.tape.nodes.borrow()[self.idx as usize].requires_grad
    }

    /// Replace the value of a leaf. Nodes built from it keep their old values.
    pub fn set(&self, value: f64) -> Result<(), GradError> {
        let mut nodes = self.tape.nodes.borrow_mut();
        let node = &mut nodes[self.idx as usize];
        if node.op.is_some() {
            return Err(GradError::NotALeaf {
                label: node.name.clone(),
            });
        }
        node.data = value;
        Ok(())
    }

    /// The entry point to backpropagation
    pub fn backprop(&self) -> Result<(), GradError> {
        self.backprop_with(DEFAULT_GRAD_SEED, BackpropMode::default())
    }

    /// Seed this node with `grad` and propagate it to every node it was built from.
    /// Gradients are committed only if the whole traversal succeeds.
    pub fn backprop_with(&self, grad: f64, mode: BackpropMode) -> Result<(), GradError> {
        let grads = {
            let nodes = self.tape.nodes.borrow();
            log::debug!(
                "backprop {mode:?} from {} over {} nodes",
                nodes[self.idx as usize].name,
                self.idx + 1
            );
            let mut backward = Backward {
                grads: nodes.iter().map(|node| node.grad).collect(),
                nodes: &nodes,
                policy: self.tape.policy(),
            };
            backward.assign(self.idx, grad)?;
            match mode {
                BackpropMode::Overwrite => backward.overwrite(self.idx)?,
                BackpropMode::Accumulate => backward.accumulate(self.idx)?,
            }
            backward.grads
        };
        let mut nodes = self.tape.nodes.borrow_mut();
        for (node, grad) in nodes.iter_mut().zip(grads) {
            node.grad = grad;
        }
        Ok(())
    }

    /// Emit this node and everything it was built from into `sink`.
    pub fn render(&self, sink: &mut impl GraphSink) {
        render(self, sink);
    }

    /// Write graphviz dot file to the given writer.
    pub fn dot(&self, writer: &mut impl Write) -> std::io::Result<()> {
        let mut sink = DotSink::new(writer)?;
        render(self, &mut sink);
        sink.finish()?;
        Ok(())
    }
}

impl fmt::Display for TapeTerm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Debug for TapeTerm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.tape.nodes.borrow();
        let node = &nodes[self.idx as usize];
        f.debug_struct("TapeTerm")
            .field("idx", &self.idx)
            .field("name", &node.name)
            .field("data", &node.data)
            .field("grad", &node.grad)
            .finish()
    }
}

/// Scratch state of one reverse traversal.
struct Backward<'n> {
    nodes: &'n [TapeNode],
    grads: Vec<f64>,
    policy: NonFinitePolicy,
}

impl Backward<'_> {
    fn check(&self, idx: u32, grad: f64) -> Result<(), GradError> {
        if self.policy == NonFinitePolicy::Reject && !grad.is_finite() {
            return Err(GradError::NonFinite {
                label: self.nodes[idx as usize].name.clone(),
                grad,
            });
        }
        Ok(())
    }

    fn assign(&mut self, idx: u32, grad: f64) -> Result<(), GradError> {
        self.check(idx, grad)?;
        self.grads[idx as usize] = grad;
        Ok(())
    }

    fn add(&mut self, idx: u32, grad: f64) -> Result<(), GradError> {
        let sum = self.grads[idx as usize] + grad;
        self.assign(idx, sum)
    }

    fn local_grads(&self, idx: u32) -> Result<Option<Contributions>, GradError> {
        let nodes = self.nodes;
        let node = &nodes[idx as usize];
        let Some(op) = node.op else {
            return Ok(None);
        };
        log::trace!("backward {} grad {}", node.name, self.grads[idx as usize]);
        op.backward(
            self.grads[idx as usize],
            &node.name,
            |i| nodes[i as usize].data,
            |i| nodes[i as usize].requires_grad,
        )
        .map(Some)
    }

    /// Depth-first, once per incoming edge. Both operands are assigned before
    /// the recursion descends into them.
    fn overwrite(&mut self, idx: u32) -> Result<(), GradError> {
        let Some(contributions) = self.local_grads(idx)? else {
            return Ok(());
        };
        for &(operand, grad) in contributions.iter().flatten() {
            self.assign(operand, grad)?;
        }
        for &(operand, _) in contributions.iter().flatten() {
            self.overwrite(operand)?;
        }
        Ok(())
    }

    /// Operands precede their consumers on the tape, so a descending sweep
    /// finalizes every node's gradient before it is propagated further.
    fn accumulate(&mut self, root: u32) -> Result<(), GradError> {
        let mut reached = vec![false; root as usize + 1];
        reached[root as usize] = true;
        for idx in (0..=root).rev() {
            if !reached[idx as usize] {
                continue;
            }
            let Some(contributions) = self.local_grads(idx)? else {
                continue;
            };
            for (operand, grad) in contributions.into_iter().flatten() {
                if !reached[operand as usize] {
                    reached[operand as usize] = true;
                    self.grads[operand as usize] = 0.;
                }
                self.add(operand, grad)?;
            }
        }
        Ok(())
    }
}
