//! Operator-split transport of energetic particles along co-moving streams.
//!
//! The distribution function of every stream is stored as an array indexed
//! `[shell, species, energy, mu]` (see [`crate::grid::phase_space::PhaseSpaceLayout`]).
//! One outer step applies, in order, perpendicular diffusion, parallel
//! streaming with pitch-angle scattering, drift, adiabatic energy change,
//! adiabatic focusing, shock injection and the seed population floor.

pub mod adiabatic;
pub mod advection;
pub mod diffusion;
pub mod drift;
pub mod driver;
pub mod seed;
pub mod shock;
pub mod stability;
pub mod stream_list;

use ndarray::{ArrayBase, DataMut, Dimension};

/// Floating-point precision to use for energetic particle transport.
#[allow(non_camel_case_types)]
pub type fep = f64;

/// Smallest value the distribution function may take.
pub const FLOOR: fep = fep::MIN_POSITIVE;

/// Raises every value below [`FLOOR`] to the floor.
pub fn apply_floor<S, D>(values: &mut ArrayBase<S, D>)
where
    S: DataMut<Elem = fep>,
    D: Dimension,
{
    values.mapv_inplace(|value| if value >= FLOOR { value } else { FLOOR });
}

/// Raises the given value to [`FLOOR`] if it lies below it.
pub fn floored(value: fep) -> fep {
    if value >= FLOOR {
        value
    } else {
        FLOOR
    }
}
