//! Strategy evaluation and signal recording.

pub mod evaluate;
pub mod recorder;

pub use evaluate::{evaluate, EvalError, EventSnapshot, ResultRecord, StrategyEvaluation};
pub use recorder::{CsvRecorder, MemoryRecorder, RecordSink, RecorderError};
