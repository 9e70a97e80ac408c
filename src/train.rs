//! Linear regression of a house price by plain gradient descent.
//!
//! Every step builds a fresh graph from the current weights,
//! `loss = (y - (w0 + w1 * x1 + w2 * x2 + w3 * x3)) ** 2`, backpropagates
//! it and moves each weight against its gradient.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    data::HousingRecord, dot::GraphSink, error::GradError, Config, Tape, TapeTerm,
    DEFAULT_GRAD_SEED,
};

pub const NUM_WEIGHTS: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    /// Bias followed by one weight per feature.
    pub weights: [f64; NUM_WEIGHTS],
}

impl Model {
    pub fn new(weights: [f64; NUM_WEIGHTS]) -> Self {
        Self { weights }
    }

    /// Weights drawn uniformly from `[-1, 1)`.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            weights: std::array::from_fn(|_| rng.gen_range(-1.0..1.0)),
        }
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::random(&mut rng)
    }
}

pub struct LossGraph<'a> {
    pub weights: [TapeTerm<'a>; NUM_WEIGHTS],
    pub prediction: TapeTerm<'a>,
    pub loss: TapeTerm<'a>,
}

/// Weights become variables; features, target and exponent are constants.
pub fn build_loss<'a>(tape: &'a Tape, model: &Model, record: &HousingRecord) -> LossGraph<'a> {
    let weights: [TapeTerm; NUM_WEIGHTS] =
        std::array::from_fn(|i| tape.term(format!("w[{i}]"), model.weights[i]));
    let features = record
        .features()
        .into_iter()
        .enumerate()
        .map(|(i, x)| tape.constant(format!("x[{}]", i + 1), x));
    let prediction = weights[1..]
        .iter()
        .zip(features)
        .fold(weights[0], |acc, (&w, x)| acc + w * x);
    let y = tape.constant("y", record.target());
    let two = tape.constant("2", 2.);
    let loss = (y - prediction).pow(two);
    LossGraph {
        weights,
        prediction,
        loss,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    /// Loss of the weights before the update.
    pub loss: f64,
    pub grads: [f64; NUM_WEIGHTS],
}

pub fn train_step(
    model: &mut Model,
    record: &HousingRecord,
    config: &Config,
) -> Result<StepReport, GradError> {
    step(model, record, config, |_| ())
}

/// Build, backpropagate, hand the loss to `inspect`, then update the weights.
fn step(
    model: &mut Model,
    record: &HousingRecord,
    config: &Config,
    inspect: impl FnOnce(&TapeTerm),
) -> Result<StepReport, GradError> {
    let tape = Tape::new();
    let graph = build_loss(&tape, model, record);
    let loss = graph.loss.eval();
    graph.loss.backprop_with(DEFAULT_GRAD_SEED, config.mode)?;
    inspect(&graph.loss);
    let grads = graph.weights.map(|w| w.grad());
    for (weight, grad) in model.weights.iter_mut().zip(grads) {
        *weight -= config.learning_rate * grad;
    }
    Ok(StepReport { loss, grads })
}

pub fn train(
    model: &mut Model,
    record: &HousingRecord,
    config: &Config,
) -> Result<Vec<StepReport>, GradError> {
    run(model, record, config, |_| ())
}

/// Like [`train`], and renders the graph of the final step into `sink`, with the
/// gradients of that step and the weights it started from.
pub fn train_and_render(
    model: &mut Model,
    record: &HousingRecord,
    config: &Config,
    sink: &mut impl GraphSink,
) -> Result<Vec<StepReport>, GradError> {
    run(model, record, config, |loss| loss.render(sink))
}

fn run(
    model: &mut Model,
    record: &HousingRecord,
    config: &Config,
    render_last: impl FnOnce(&TapeTerm),
) -> Result<Vec<StepReport>, GradError> {
    let mut render_last = Some(render_last);
    let mut reports = Vec::with_capacity(config.iterations);
    for i in 0..config.iterations {
        let last = i + 1 == config.iterations;
        let report = step(model, record, config, |loss| {
            if last {
                if let Some(render) = render_last.take() {
                    render(loss);
                }
            }
        })?;
        log::info!("step {i}: loss {}", report.loss);
        log::debug!("step {i}: grads {:?}", report.grads);
        reports.push(report);
    }
    Ok(reports)
}
