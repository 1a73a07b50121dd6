// Logs module - One artifact per launch, plus tail reading for the control surface

mod reader;
mod sink;

pub use reader::read_last_lines;
pub use sink::{BoundLog, LogSink};
