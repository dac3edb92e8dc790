//! Reading of parameter files.
//!
//! Parameter files consist of lines on the form `name = value`, optionally
//! terminated by a semicolon. Text following `#` or `//` is ignored. Array
//! values are written as comma separated lists, optionally in brackets.

use crate::{error::TransportError, io::utils};
use lazy_static::lazy_static;
use regex::Regex;
use std::{collections::HashMap, fmt::Display, path::Path, str::FromStr};

lazy_static! {
    static ref COMMENT_REGEX: Regex = Regex::new(r"(?m)(#|//).*$").unwrap();
    static ref ASSIGNMENT_REGEX: Regex =
        Regex::new(r"(?m)^\s*([_\w]+)\s*=\s*(.+?)\s*;?\s*$").unwrap();
}

/// Representation of a parameter file.
#[derive(Clone, Debug)]
pub struct ParameterFile {
    text: String,
}

impl ParameterFile {
    /// Reads the parameter file at the given path.
    pub fn new<P: AsRef<Path>>(param_file_path: P) -> Result<Self, TransportError> {
        let text = utils::read_text_file(param_file_path)?;
        Ok(Self::from_text(text))
    }

    /// Creates a parameter file representation from the given text.
    pub fn from_text(text: String) -> Self {
        Self { text }
    }

    /// Parses the parameter file and returns the corresponding parameter set.
    pub fn parse(&self) -> ParameterSet {
        let stripped = COMMENT_REGEX.replace_all(&self.text, "");
        ParameterSet {
            values: ASSIGNMENT_REGEX
                .captures_iter(&stripped)
                .map(|captures| (captures[1].to_string(), captures[2].to_string()))
                .collect(),
        }
    }
}

/// Set of parameter names and values associated with a parameter file.
#[derive(Clone, Debug, Default)]
pub struct ParameterSet {
    values: HashMap<String, String>,
}

impl ParameterSet {
    /// Creates a parameter set from the given name-value pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// Whether a value for the given parameter is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the value of the string parameter with the given name.
    pub fn get_str_param<'a>(&'a self, name: &str) -> Result<&'a str, TransportError> {
        match self.values.get(name) {
            Some(value) => Ok(value.trim_matches('"')),
            None => Err(TransportError::MissingParameter {
                name: name.to_string(),
            }),
        }
    }

    /// Returns the value of the numerical parameter with the given name.
    pub fn get_numerical_param<T>(&self, name: &str) -> Result<T, TransportError>
    where
        T: num::Num + FromStr,
        T::Err: Display,
    {
        let str_value = self.get_str_param(name)?;
        parse_value(name, str_value)
    }

    /// Returns the value of the numerical parameter with the given name, or
    /// the given default if it is not present.
    ///
    /// Values outside the inclusive range `[min_value, max_value]` are rejected.
    pub fn read_numerical_param_with_default_and_limits<T>(
        &self,
        name: &str,
        default: T,
        min_value: T,
        max_value: T,
    ) -> Result<T, TransportError>
    where
        T: num::Num + FromStr + PartialOrd + Display + Copy,
        T::Err: Display,
    {
        let value = if self.contains(name) {
            self.get_numerical_param(name)?
        } else {
            default
        };
        verify_within_limits(name, value, min_value, max_value)?;
        Ok(value)
    }

    /// Returns the value of the integer switch with the given name as a
    /// boolean, or the given default if it is not present.
    pub fn read_switch_with_default(
        &self,
        name: &str,
        default: bool,
    ) -> Result<bool, TransportError> {
        self.read_numerical_param_with_default_and_limits::<u32>(name, default as u32, 0, 1)
            .map(|value| value > 0)
    }

    /// Returns the values of the array parameter with the given name, or the
    /// given defaults if it is not present.
    pub fn read_float_array_with_default(
        &self,
        name: &str,
        default: &[f64],
    ) -> Result<Vec<f64>, TransportError> {
        if !self.contains(name) {
            return Ok(default.to_vec());
        }
        let str_value = self.get_str_param(name)?;
        str_value
            .trim_matches(|c| c == '[' || c == ']' || c == '(' || c == ')')
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_value(name, s))
            .collect()
    }
}

fn parse_value<T>(name: &str, str_value: &str) -> Result<T, TransportError>
where
    T: FromStr,
    T::Err: Display,
{
    str_value
        .parse::<T>()
        .map_err(|err| TransportError::InvalidParameter {
            name: name.to_string(),
            value: str_value.to_string(),
            reason: format!("failed parsing value: {}", err),
        })
}

/// Checks that the given value lies in the inclusive range `[min_value, max_value]`.
pub fn verify_within_limits<T>(
    name: &str,
    value: T,
    min_value: T,
    max_value: T,
) -> Result<(), TransportError>
where
    T: PartialOrd + Display,
{
    if value >= min_value && value <= max_value {
        Ok(())
    } else {
        Err(TransportError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: format!("must be in the range [{}, {}]", min_value, max_value),
        })
    }
}
