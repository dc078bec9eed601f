// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// No sensor bound or selected
    SensorNotFound(String),
    /// Format or operation not supported by the pipeline
    Unsupported(String),
    /// Pipeline busy streaming
    Busy(String),
    /// Operation timed out
    Timeout(String),
    /// General error from the capture library
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::SensorNotFound(msg) => write!(f, "Sensor not found: {}", msg),
            CliError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            CliError::Busy(msg) => write!(f, "Busy: {}", msg),
            CliError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::InvalidArgs(_) => ExitCode::from(2),
            CliError::SensorNotFound(_) => ExitCode::from(3),
            CliError::Unsupported(_) => ExitCode::from(4),
            CliError::Busy(_) => ExitCode::from(5),
            CliError::Timeout(_) => ExitCode::from(6),
            CliError::General(_) => ExitCode::from(1),
        }
    }
}

/// Map csi_capture::Error to CliError with appropriate exit codes
impl From<csi_capture::Error> for CliError {
    fn from(err: csi_capture::Error) -> Self {
        use csi_capture::Error;

        match err {
            Error::NoSensor => CliError::SensorNotFound("no sensor bound".to_string()),

            Error::FormatUnsupported(fourcc) => {
                CliError::Unsupported(format!("format {} cannot be captured", fourcc))
            }
            Error::OperationNotSupported(op) => {
                CliError::Unsupported(format!("operation {} not available", op))
            }

            Error::Busy => CliError::Busy("streaming in progress".to_string()),

            Error::InvalidFourCC(_) | Error::SlotRange(_) | Error::SlotOccupied(_) => {
                CliError::InvalidArgs(err.to_string())
            }

            Error::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::TimedOut => {
                    CliError::Timeout(format!("Operation timed out: {}", io_err))
                }
                _ => CliError::General(format!("I/O error: {}", io_err)),
            },

            other => CliError::General(other.to_string()),
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csi_capture::{Error, FourCC};

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::InvalidArgs("test".into()).exit_code(),
            ExitCode::from(2)
        );
        assert_eq!(
            CliError::SensorNotFound("test".into()).exit_code(),
            ExitCode::from(3)
        );
        assert_eq!(
            CliError::Unsupported("test".into()).exit_code(),
            ExitCode::from(4)
        );
        assert_eq!(CliError::Busy("test".into()).exit_code(), ExitCode::from(5));
        assert_eq!(
            CliError::Timeout("test".into()).exit_code(),
            ExitCode::from(6)
        );
        assert_eq!(
            CliError::General("test".into()).exit_code(),
            ExitCode::from(1)
        );
    }

    #[test]
    fn test_library_error_mapping() {
        assert!(matches!(
            CliError::from(Error::NoSensor),
            CliError::SensorNotFound(_)
        ));
        assert!(matches!(
            CliError::from(Error::FormatUnsupported(FourCC::RGB24)),
            CliError::Unsupported(_)
        ));
        assert!(matches!(CliError::from(Error::Busy), CliError::Busy(_)));
        assert!(matches!(
            CliError::from(Error::SlotRange(7)),
            CliError::InvalidArgs(_)
        ));
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "i2c");
        assert!(matches!(
            CliError::from(Error::Io(timeout)),
            CliError::Timeout(_)
        ));
        assert!(matches!(
            CliError::from(Error::NoBuffers),
            CliError::General(_)
        ));
    }

    #[test]
    fn test_error_display() {
        let err = CliError::from(Error::FormatUnsupported(FourCC::RGB24));
        assert_eq!(format!("{}", err), "Unsupported: format RGB3 cannot be captured");
    }
}
