//! Forward and local-gradient rules of every operation a node can be built with.

use crate::error::GradError;

/// The operation that produced a node, with the tape indices of its operands.
/// Operands always precede the node on the tape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Add(u32, u32),
    Sub(u32, u32),
    Mul(u32, u32),
    Pow(u32, u32),
    Relu(u32),
}

/// Gradient contributions of one node to its operands, as `(operand, grad)`.
pub(crate) type Contributions = [Option<(u32, f64)>; 2];

impl Operation {
    pub fn arity(&self) -> usize {
        match self {
            Self::Relu(_) => 1,
            _ => 2,
        }
    }

    /// Infix symbol used in the label of a binary node, or the function name of a unary one.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add(..) => "+",
            Self::Sub(..) => "-",
            Self::Mul(..) => "*",
            Self::Pow(..) => "**",
            Self::Relu(_) => "relu",
        }
    }

    pub fn operands(&self) -> impl Iterator<Item = u32> {
        use Operation::*;
        let pair = match *self {
            Add(lhs, rhs) | Sub(lhs, rhs) | Mul(lhs, rhs) | Pow(lhs, rhs) => [Some(lhs), Some(rhs)],
            Relu(term) => [Some(term), None],
        };
        pair.into_iter().flatten()
    }

    pub(crate) fn eval(&self, value: impl Fn(u32) -> f64) -> f64 {
        use Operation::*;
        match *self {
            Add(lhs, rhs) => value(lhs) + value(rhs),
            Sub(lhs, rhs) => value(lhs) - value(rhs),
            Mul(lhs, rhs) => value(lhs) * value(rhs),
            Pow(lhs, rhs) => value(lhs).powf(value(rhs)),
            Relu(term) => value(term).max(0.),
        }
    }

    /// The same operation reading its operands from other tape indices.
    pub(crate) fn map_operands(&self, f: impl Fn(u32) -> u32) -> Self {
        use Operation::*;
        match *self {
            Add(lhs, rhs) => Add(f(lhs), f(rhs)),
            Sub(lhs, rhs) => Sub(f(lhs), f(rhs)),
            Mul(lhs, rhs) => Mul(f(lhs), f(rhs)),
            Pow(lhs, rhs) => Pow(f(lhs), f(rhs)),
            Relu(term) => Relu(f(term)),
        }
    }

    /// Local gradients of the operands given the gradient `grad` of the result.
    /// `label` names the result in a [`GradError::Domain`].
    ///
    /// Every operand receives its partial, except the exponent of `pow` over a
    /// non-positive base: that partial needs `ln(base)`, so it is an error when
    /// the exponent requires a gradient and is left out when it does not.
    pub(crate) fn backward(
        &self,
        grad: f64,
        label: &str,
        value: impl Fn(u32) -> f64,
        requires_grad: impl Fn(u32) -> bool,
    ) -> Result<Contributions, GradError> {
        use Operation::*;
        let contributions = match *self {
            Add(lhs, rhs) => [Some((lhs, grad)), Some((rhs, grad))],
            Sub(lhs, rhs) => [Some((lhs, grad)), Some((rhs, -grad))],
            Mul(lhs, rhs) => [
                Some((lhs, value(rhs) * grad)),
                Some((rhs, value(lhs) * grad)),
            ],
            Pow(lhs, rhs) => {
                let (base, exp) = (value(lhs), value(rhs));
                let dexp = if base > 0. {
                    Some((rhs, grad * base.powf(exp) * base.ln()))
                } else if requires_grad(rhs) {
                    return Err(GradError::Domain {
                        label: label.to_string(),
                        base,
                    });
                } else {
                    None
                };
                [Some((lhs, grad * exp * base.powf(exp - 1.))), dexp]
            }
            Relu(term) => [
                Some((term, if value(term) > 0. { grad } else { 0. })),
                None,
            ],
        };
        Ok(contributions)
    }
}
