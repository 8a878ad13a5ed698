use std::error::Error;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum SimulatorError {
    // Input errors
    MissingTraceArgument,
    TraceUnreadable(PathBuf, std::io::Error),
    MalformedTraceLine { line: usize, reason: String },
    EmptyTrace,

    // Configuration errors
    InvalidFetchWidth(usize),
    InvalidResultBusCount(usize),
    EmptySchedulingQueue,

    // System errors
    IoError(std::io::Error),
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorError::MissingTraceArgument => {
                write!(f, "No trace file given (use -i <trace> or a positional argument)")
            },
            SimulatorError::TraceUnreadable(path, err) => {
                write!(f, "Unable to open trace file {}: {}", path.display(), err)
            },
            SimulatorError::MalformedTraceLine { line, reason } => {
                write!(f, "Malformed trace line {}: {}", line, reason)
            },
            SimulatorError::EmptyTrace => write!(f, "Trace file contains no instructions"),
            SimulatorError::InvalidFetchWidth(f_width) => {
                write!(f, "Fetch width must be at least 1 (got {})", f_width)
            },
            SimulatorError::InvalidResultBusCount(r) => {
                write!(f, "Result bus count must be at least 1 (got {})", r)
            },
            SimulatorError::EmptySchedulingQueue => {
                write!(
                    f,
                    "At least one functional unit is required (scheduling queue would be empty)"
                )
            },
            SimulatorError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for SimulatorError {}

impl From<std::io::Error> for SimulatorError {
    fn from(error: std::io::Error) -> Self {
        SimulatorError::IoError(error)
    }
}
