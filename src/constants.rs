//! Physical and mathematical constants.

/// Floating-point precision to use for constants.
#[allow(non_camel_case_types)]
pub type fcn = f64;

// Mathematical constants

pub const PI: fcn = std::f64::consts::PI;

// Physical constants

/// Proton mass [g].
pub const M_PROTON: fcn = 1.672_621_9e-24;
/// Speed of light in vacuum [cm/s].
pub const CLIGHT: fcn = 2.997_924_58e10;
/// Proton rest energy [GeV].
pub const MC2_PROTON_GEV: fcn = 0.938_272_088;
/// Astronomical unit [cm].
pub const AU: fcn = 1.495_978_707e13;
/// Length of a day [s].
pub const DAY: fcn = 86400.0;

// Unit conversion factors

/// Conversion factor from mega electron volts to ergs.
pub const MEV_TO_ERG: fcn = 1.602_176_634e-6;
/// Conversion factor from gigavolts to statvolts.
pub const GV_TO_STATVOLT: fcn = 1e9 / 299.792_458;
