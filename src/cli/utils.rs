//! Utilities for parsing command line arguments.

use crate::{exit_on_error, exit_on_false, io::Verbosity};
use clap::ArgMatches;
use indicatif::ProgressStyle;
use lazy_static::lazy_static;
use std::{fmt::Display, str::FromStr};

lazy_static! {
    static ref DEFAULT_PROGRESS_STYLE: ProgressStyle =
        ProgressStyle::default_bar().template("Progress: {bar:40}  {percent}% | ETA: {eta}");
}

pub fn parse_value_string<T>(argument_name: &str, value_string: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    exit_on_error!(
        value_string.parse(),
        "Error: Could not parse value for {0}: {1}",
        argument_name
    )
}

/// Parses the value of the given argument if present.
pub fn get_value_from_parseable_argument<T>(
    arguments: &ArgMatches,
    argument_name: &str,
) -> Option<T>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    arguments
        .value_of(argument_name)
        .map(|value_string| parse_value_string(argument_name, value_string))
}

/// Parses the value of the given argument if present, and verifies that it
/// is at least the given minimum.
pub fn get_value_from_argument_with_min<T>(
    arguments: &ArgMatches,
    argument_name: &str,
    min_value: T,
) -> Option<T>
where
    T: FromStr + PartialOrd + Display + Copy,
    <T as FromStr>::Err: Display,
{
    get_value_from_parseable_argument(arguments, argument_name).map(|value: T| {
        exit_on_false!(
            value >= min_value,
            "Error: Value for {} must be at least {}",
            argument_name,
            min_value
        );
        value
    })
}

pub fn parse_verbosity(arguments: &ArgMatches, support_progress: bool) -> Verbosity {
    if support_progress && arguments.is_present("progress") {
        Verbosity::Progress(DEFAULT_PROGRESS_STYLE.clone())
    } else if arguments.is_present("verbose") {
        Verbosity::Messages
    } else {
        Verbosity::Quiet
    }
}
