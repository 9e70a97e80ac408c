pub mod config;
pub mod data;
pub mod dot;
pub mod error;
mod op;
pub mod tape;
pub mod train;

pub use config::Config;
pub use dot::{render, DotSink, GraphEvent, GraphSink};
pub use error::GradError;
pub use op::Operation;
pub use tape::{BackpropMode, NonFinitePolicy, Tape, TapeTerm, DEFAULT_GRAD_SEED};
