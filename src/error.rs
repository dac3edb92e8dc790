//! Error types and macros for reporting fatal errors.

use std::{fmt, io};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Identifies the transport operator responsible for a stability violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum OperatorKind {
    ShellDiffusion,
    Streaming,
    Drift,
    AdiabaticChange,
    AdiabaticFocusing,
}

impl OperatorKind {
    /// All subcycled operators, in the order they are applied.
    pub const ALL: [Self; 5] = [
        Self::ShellDiffusion,
        Self::Streaming,
        Self::Drift,
        Self::AdiabaticChange,
        Self::AdiabaticFocusing,
    ];
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::ShellDiffusion => "perpendicular diffusion",
                Self::Streaming => "parallel streaming",
                Self::Drift => "drift",
                Self::AdiabaticChange => "adiabatic energy change",
                Self::AdiabaticFocusing => "adiabatic focusing",
            }
        )
    }
}

/// Location of a single phase space bin in the distributed grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct BinLocation {
    pub stream: usize,
    pub shell: usize,
    pub species: usize,
    pub energy: usize,
}

impl fmt::Display for BinLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stream {}, shell {}, species {}, energy {}",
            self.stream, self.shell, self.species, self.energy
        )
    }
}

/// Errors that can arise when configuring or advancing the transport engine.
#[derive(Debug)]
pub enum TransportError {
    /// A parameter without a default value was not specified.
    MissingParameter { name: String },
    /// A parameter could not be parsed or lies outside its valid range.
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
    /// An array parameter does not have the required number of entries.
    ParameterLength {
        name: String,
        expected: usize,
        found: usize,
    },
    /// Two options were enabled that cannot be used together.
    ConflictingOptions {
        first: String,
        second: String,
        reason: String,
    },
    /// Satisfying the stability bound of an operator would require more
    /// subcycles than permitted.
    Unstable {
        operator: OperatorKind,
        location: BinLocation,
        time_step: f64,
        required_subcycles: usize,
        max_subcycles: usize,
    },
    /// The gathered records of a stream did not cover all of its nodes.
    IncompleteStream {
        stream: usize,
        expected: usize,
        found: usize,
    },
    /// The parameter file could not be read.
    Io(io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { name } => {
                write!(f, "Required parameter {} was not specified", name)
            }
            Self::InvalidParameter {
                name,
                value,
                reason,
            } => write!(
                f,
                "Invalid value {} for parameter {}: {}",
                value, name, reason
            ),
            Self::ParameterLength {
                name,
                expected,
                found,
            } => write!(
                f,
                "Parameter {} must have {} values, got {}",
                name, expected, found
            ),
            Self::ConflictingOptions {
                first,
                second,
                reason,
            } => write!(f, "Options {} and {} conflict: {}", first, second, reason),
            Self::Unstable {
                operator,
                location,
                time_step,
                required_subcycles,
                max_subcycles,
            } => write!(
                f,
                "Time step {:e} is unstable for {} at {}: {} subcycles required, at most {} allowed",
                time_step, operator, location, required_subcycles, max_subcycles
            ),
            Self::IncompleteStream {
                stream,
                expected,
                found,
            } => write!(
                f,
                "Gathered {} of {} nodes of stream {}",
                found, expected, stream
            ),
            Self::Io(err) => write!(f, "Could not read parameters: {}", err),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(not(feature = "for-testing"))]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        eprintln!($($print_arg)*);
        quit::with_code(1);
    }};
}

#[cfg(feature = "for-testing")]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        panic!($($print_arg)*);
    }};
}

#[macro_export]
macro_rules! exit_on_error {
    ($result:expr, $($print_arg:tt)*) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::exit_with_error!($($print_arg)*, err)
            }
        }
    };
}

#[macro_export]
macro_rules! exit_on_false {
    ($logic:expr, $($print_arg:tt)*) => {
        if $logic {
            true
        } else {
            $crate::exit_with_error!($($print_arg)*)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstable_error_reports_offending_bin() {
        let err = TransportError::Unstable {
            operator: OperatorKind::AdiabaticFocusing,
            location: BinLocation {
                stream: 4,
                shell: 7,
                species: 1,
                energy: 12,
            },
            time_step: 0.5,
            required_subcycles: 20000,
            max_subcycles: 10000,
        };
        let message = err.to_string();
        assert!(message.contains("adiabatic focusing"));
        assert!(message.contains("stream 4, shell 7, species 1, energy 12"));
        assert!(message.contains("20000"));
    }

    #[test]
    fn io_errors_are_exposed_as_source() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let dyn_err: &dyn std::error::Error = &err;
        assert!(dyn_err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }
}
