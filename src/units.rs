//! Normalization of physical quantities to the internal units of the transport engine.
//!
//! Lengths are measured in AU, speeds in units of the speed of light, times in the
//! light travel time over one AU, kinetic energies per nucleon in units of the
//! proton rest energy, number densities in `MHD_DENSITY_NORM` and magnetic field
//! strengths in `*U_B`.

use crate::constants::{fcn, AU, CLIGHT, DAY, MEV_TO_ERG, M_PROTON, PI};
use lazy_static::lazy_static;

/// Floating-point precision to use for units.
#[allow(non_camel_case_types)]
pub type fun = f64;

/// Unit for number density [1/cm^3].
pub const MHD_DENSITY_NORM: fun = 1.0;
/// Unit for length [cm].
pub const U_L: fun = AU;
/// Unit for speed [cm/s].
pub const U_U: fun = CLIGHT;
/// Unit for time [s].
pub const U_T: fun = U_L / U_U;
/// Conversion factor from MeV to proton rest energies.
pub const ENERGY_NORM: fun = MEV_TO_ERG / (M_PROTON * CLIGHT * CLIGHT);

lazy_static! {
    /// Unit for magnetic flux density [gauss], giving unit Alfvén speed at unit density.
    pub static ref U_B: fun = U_U * fun::sqrt(4.0 * PI * M_PROTON * MHD_DENSITY_NORM);
}

/// Converts a duration in days to internal time units.
pub fn days_to_internal(days: fcn) -> fun {
    days * DAY / U_T
}

/// Converts a speed in cm/s to internal speed units.
pub fn cm_per_s_to_internal(speed: fcn) -> fun {
    speed / U_U
}

/// Converts a kinetic energy per nucleon in MeV to internal energy units.
pub fn mev_to_internal(energy: fcn) -> fun {
    energy * ENERGY_NORM
}

/// Converts a number density in 1/cm^3 to internal density units.
pub fn density_to_internal(density: fcn) -> fun {
    density / MHD_DENSITY_NORM
}

/// Converts a magnetic field strength in gauss to internal field units.
pub fn gauss_to_internal(field: fcn) -> fun {
    field / *U_B
}

/// Converts a flux amplitude in 1/(cm^2 s sr MeV) to internal flux units.
pub fn flux_to_internal(flux: fcn) -> fun {
    flux * (M_PROTON * CLIGHT) / (MHD_DENSITY_NORM * MEV_TO_ERG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn light_crosses_one_au_in_about_eight_minutes() {
        assert_relative_eq!(U_T, 499.004_783_8, epsilon = 1e-6);
        assert_relative_eq!(days_to_internal(1.0), 86400.0 / 499.004_783_8, epsilon = 1e-6);
    }

    #[test]
    fn one_gev_is_about_one_proton_rest_energy() {
        assert_relative_eq!(mev_to_internal(938.272_088), 1.0, epsilon = 1e-6);
    }
}
