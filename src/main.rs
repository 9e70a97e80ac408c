use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use scalargrad::{
    data::load_first_record,
    train::{train, train_and_render, Model},
    BackpropMode, Config, DotSink,
};

#[derive(Parser, Debug)]
#[command(about = "Fit a house price by gradient descent on a scalar autodiff graph")]
struct Args {
    /// CSV file with area, bedrooms, bathrooms and price columns
    #[arg(short, long, default_value = scalargrad::config::DEFAULT_INPUT_PATH)]
    input: PathBuf,

    #[arg(short = 'n', long, default_value_t = scalargrad::config::DEFAULT_ITERATIONS)]
    iterations: usize,

    #[arg(short, long, default_value_t = scalargrad::config::DEFAULT_LEARNING_RATE)]
    learning_rate: f64,

    /// Seed for the initial weights
    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long, value_enum, default_value_t = Mode::Accumulate)]
    mode: Mode,

    /// Write the loss graph of the final training step as graphviz dot, with the
    /// gradients of that step and the weights before its update
    #[arg(long)]
    dot: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Overwrite,
    Accumulate,
}

impl From<Mode> for BackpropMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Overwrite => BackpropMode::Overwrite,
            Mode::Accumulate => BackpropMode::Accumulate,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            learning_rate: args.learning_rate,
            iterations: args.iterations,
            seed: args.seed,
            mode: args.mode.into(),
            input: args.input,
            dot_output: args.dot,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from(Args::parse());
    config.validate()?;

    let record = load_first_record(&config.input)
        .with_context(|| format!("loading {}", config.input.display()))?;
    log::info!(
        "features {:?}, target {}",
        record.features(),
        record.target()
    );

    let mut model = Model::from_seed(config.seed);
    let reports = match &config.dot_output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut sink = DotSink::new(BufWriter::new(file))?;
            let reports = train_and_render(&mut model, &record, &config, &mut sink)?;
            sink.finish().with_context(|| format!("writing {}", path.display()))?;
            log::info!("wrote {}", path.display());
            reports
        }
        None => train(&mut model, &record, &config)?,
    };

    if let Some(last) = reports.last() {
        println!("grads: {:?}", last.grads);
    }
    println!("weights: {:?}", model.weights);

    Ok(())
}
