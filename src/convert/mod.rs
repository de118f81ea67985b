mod engine;
mod writer;

pub use engine::{ConvertEngine, ConvertOutcome, ConvertRequest, Destination};
pub use writer::SheetWriter;
