//! Validated configuration of the transport engine.
//!
//! All quantities are stored in the internal units described in [`crate::units`]
//! unless explicitly stated otherwise.

use crate::{
    constants::PI,
    error::TransportError,
    params::{verify_within_limits, ParameterFile, ParameterSet},
    transport::fep,
    units,
};
use std::path::Path;

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Numerical algorithm for the adiabatic energy change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum AdiabaticChangeAlgorithm {
    /// First-order upwind advection with the full pitch-angle dependent rate.
    Upwind,
    /// Third-order WENO advection with the full pitch-angle dependent rate.
    Weno3,
    /// First-order upwind advection with the pitch-angle averaged rate.
    IsotropicUpwind,
}

impl AdiabaticChangeAlgorithm {
    /// Returns the algorithm corresponding to the given configuration code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Upwind),
            2 => Some(Self::Weno3),
            3 => Some(Self::IsotropicUpwind),
            _ => None,
        }
    }
}

/// Numerical algorithm for adiabatic focusing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum AdiabaticFocusAlgorithm {
    /// First-order upwind advection including temporal field changes.
    Upwind,
    /// Third-order WENO advection including temporal field changes.
    Weno3,
    /// First-order upwind advection with only the spatial focusing term.
    StaticFieldUpwind,
}

impl AdiabaticFocusAlgorithm {
    /// Returns the algorithm corresponding to the given configuration code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Upwind),
            2 => Some(Self::Weno3),
            3 => Some(Self::StaticFieldUpwind),
            _ => None,
        }
    }
}

/// Dimensions and extent of the stream grid and the phase space grid.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct GridConfig {
    pub num_nodes_per_stream: usize,
    pub num_rows_per_face: usize,
    pub num_columns_per_face: usize,
    pub num_energy_steps: usize,
    pub num_mu_steps: usize,
    /// Radial distance of the inner boundary [AU].
    pub r_scale: fep,
    /// Smallest kinetic energy per nucleon.
    pub e_min: fep,
    /// Largest kinetic energy per nucleon.
    pub e_max: fep,
}

impl GridConfig {
    /// Number of faces of the cube-sphere holding the streams.
    pub const NUM_FACES: usize = 6;
    pub const MIN_NODES_PER_STREAM: usize = 4;
    pub const MIN_ENERGY_STEPS: usize = 3;
    pub const MIN_MU_STEPS: usize = 2;

    /// Total number of streams in the domain.
    pub fn num_streams(&self) -> usize {
        Self::NUM_FACES * self.num_rows_per_face * self.num_columns_per_face
    }
}

/// Mass and charge of a particle species.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct Species {
    /// Mass in nucleons.
    pub mass: fep,
    /// Charge in elementary charges.
    pub charge: fep,
}

/// Non-empty collection of validated particle species.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct SpeciesTable(Vec<Species>);

impl SpeciesTable {
    /// Creates a species table from parallel lists of masses and charges.
    pub fn from_masses_and_charges(
        masses: &[fep],
        charges: &[fep],
    ) -> Result<Self, TransportError> {
        if masses.is_empty() {
            return Err(TransportError::InvalidParameter {
                name: "mass".to_string(),
                value: "[]".to_string(),
                reason: "at least one species is required".to_string(),
            });
        }
        if charges.len() != masses.len() {
            return Err(TransportError::ParameterLength {
                name: "charge".to_string(),
                expected: masses.len(),
                found: charges.len(),
            });
        }
        for (&mass, &charge) in masses.iter().zip(charges) {
            if !(mass > 0.0) {
                return Err(TransportError::InvalidParameter {
                    name: "mass".to_string(),
                    value: mass.to_string(),
                    reason: "masses must be positive".to_string(),
                });
            }
            if charge == 0.0 || !charge.is_finite() {
                return Err(TransportError::InvalidParameter {
                    name: "charge".to_string(),
                    value: charge.to_string(),
                    reason: "charges must be finite and non-zero".to_string(),
                });
            }
        }
        Ok(Self(
            masses
                .iter()
                .zip(charges)
                .map(|(&mass, &charge)| Species { mass, charge })
                .collect(),
        ))
    }

    /// Number of species.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty (never true for a validated table).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the species with the given index.
    pub fn get(&self, species: usize) -> &Species {
        &self.0[species]
    }

    /// Returns an iterator over the species.
    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.0.iter()
    }
}

/// Timing of the simulation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct TimeConfig {
    pub sim_start_time: fep,
    pub sim_stop_time: fep,
    /// Interval between updates of the background flow.
    pub t_del: fep,
    /// Number of transport steps per background update.
    pub num_ep_steps: usize,
}

impl TimeConfig {
    /// Length of a single outer transport step.
    pub fn ep_time_step(&self) -> fep {
        self.t_del / self.num_ep_steps as fep
    }
}

/// Parameters of the ambient solar wind.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct WindConfig {
    pub flow_mag: fep,
    pub density_au: fep,
    pub b_au: fep,
    /// Solar rotation rate [rad per internal time unit].
    pub omega_sun: fep,
    pub azi_sun_start: fep,
}

/// Switches and coefficients of the transport operators.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct TransportConfig {
    pub use_shell_diffusion: bool,
    pub use_parallel_diffusion: bool,
    pub use_drift: bool,
    pub use_adiabatic_change: bool,
    pub use_adiabatic_focus: bool,
    pub adiabatic_change_algorithm: AdiabaticChangeAlgorithm,
    pub adiabatic_focus_algorithm: AdiabaticFocusAlgorithm,
    /// Mean free path at 1 AU and 1 GV [AU].
    pub lamo: fep,
    pub mfp_radial_power: fep,
    pub rigidity_power: fep,
    /// Ratio of perpendicular to parallel diffusion coefficient.
    pub kperxkpar: fep,
    /// Nodes closer than this along a stream are merged [AU].
    pub dsh_min: fep,
    /// Largest number of subcycles any operator may use in one step.
    pub max_subcycles: usize,
}

/// Parameters of the seed spectrum and its use as a boundary condition.
///
/// Spectral parameters are kept in the units of the parameter file and
/// normalized by [`crate::transport::seed::SeedSpectrum`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct SeedConfig {
    pub use_ep_boundary: bool,
    pub use_boundary_function: bool,
    pub boundary_function_init_domain: bool,
    pub check_seed_population: bool,
    /// Flux amplitude [1/(cm^2 s sr MeV/nuc)].
    pub amplitude: fep,
    pub xi: fep,
    pub gamma: fep,
    pub beta: fep,
    /// Reference radius [AU].
    pub r0: fep,
    /// Reference energy [MeV/nuc].
    pub er: fep,
    /// Cutoff energy [MeV/nuc].
    pub ecutoff: fep,
}

/// Parameters of the density gradient shock detection.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct ShockDetectionConfig {
    pub enabled: bool,
    /// Shocks are detected where `-dln(n)/dln(r)` exceeds this value.
    pub detect_threshold: fep,
    pub min_injection_energy: fep,
    pub injection_factor: fep,
}

/// Parameters of the analytic cone CME shock.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct IdealShockConfig {
    pub enabled: bool,
    pub sharpness: fep,
    /// Exponential scale length of the shock profile [AU].
    pub scale_length: fep,
    pub jump: fep,
    pub falloff: fep,
    pub speed: fep,
    pub init_time: fep,
    pub theta: fep,
    pub phi: fep,
    /// Half-width of the cone [rad], or zero for a spherical shock.
    pub width: fep,
}

/// Fully resolved, immutable configuration of the transport engine.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct SolverConfig {
    pub grid: GridConfig,
    pub species: SpeciesTable,
    pub time: TimeConfig,
    pub wind: WindConfig,
    pub transport: TransportConfig,
    pub seed: SeedConfig,
    pub shock: ShockDetectionConfig,
    pub ideal_shock: IdealShockConfig,
    /// Number of outer steps between emitted reports.
    pub dump_freq: usize,
}

impl SolverConfig {
    /// Reads and validates the configuration from the given parameter file.
    pub fn from_param_file<P: AsRef<Path>>(param_file_path: P) -> Result<Self, TransportError> {
        Self::from_param_set(&ParameterFile::new(param_file_path)?.parse())
    }

    /// Builds and validates the configuration from the given parameter set.
    /// Parameters that are not present take their default values.
    pub fn from_param_set(params: &ParameterSet) -> Result<Self, TransportError> {
        let defaults = Self::default();

        let grid = GridConfig {
            num_nodes_per_stream: read_count(
                params,
                "numNodesPerStream",
                defaults.grid.num_nodes_per_stream,
                GridConfig::MIN_NODES_PER_STREAM,
            )?,
            num_rows_per_face: read_count(
                params,
                "numRowsPerFace",
                defaults.grid.num_rows_per_face,
                1,
            )?,
            num_columns_per_face: read_count(
                params,
                "numColumnsPerFace",
                defaults.grid.num_columns_per_face,
                1,
            )?,
            num_energy_steps: read_count(
                params,
                "numEnergySteps",
                defaults.grid.num_energy_steps,
                GridConfig::MIN_ENERGY_STEPS,
            )?,
            num_mu_steps: read_count(
                params,
                "numMuSteps",
                defaults.grid.num_mu_steps,
                GridConfig::MIN_MU_STEPS,
            )?,
            r_scale: read_float(params, "rScale", defaults.grid.r_scale, 1e-5, 1e3)?,
            e_min: units::mev_to_internal(read_float(params, "eMin", 1.0, 1e-6, 1e6)?),
            e_max: units::mev_to_internal(read_float(params, "eMax", 1000.0, 1e-6, 1e8)?),
        };

        let masses = params.read_float_array_with_default("mass", &[1.0])?;
        let charges = params.read_float_array_with_default("charge", &[1.0])?;
        let num_species = params.read_numerical_param_with_default_and_limits::<usize>(
            "numSpecies",
            masses.len(),
            1,
            100,
        )?;
        if masses.len() != num_species {
            return Err(TransportError::ParameterLength {
                name: "mass".to_string(),
                expected: num_species,
                found: masses.len(),
            });
        }
        let species = SpeciesTable::from_masses_and_charges(&masses, &charges)?;

        let time = TimeConfig {
            sim_start_time: units::days_to_internal(read_float(
                params,
                "simStartTime",
                0.0,
                0.0,
                1e5,
            )?),
            sim_stop_time: units::days_to_internal(read_float(
                params,
                "simStopTime",
                1.0,
                0.0,
                1e5,
            )?),
            t_del: units::days_to_internal(read_float(params, "tDel", 1.0 / 24.0, 1e-9, 1e3)?),
            num_ep_steps: read_count(params, "numEpSteps", defaults.time.num_ep_steps, 1)?,
        };

        let wind = WindConfig {
            flow_mag: units::cm_per_s_to_internal(read_float(params, "flowMag", 4e7, 1.0, 1e10)?),
            density_au: units::density_to_internal(read_float(
                params,
                "mhdDensityAu",
                8.3,
                1e-6,
                1e6,
            )?),
            b_au: units::gauss_to_internal(read_float(params, "mhdBAu", 1.6e-5, 1e-12, 1.0)?),
            omega_sun: read_float(params, "omegaSun", defaults.wind.omega_sun, 0.0, 1.0)?,
            azi_sun_start: read_float(
                params,
                "aziSunStart",
                defaults.wind.azi_sun_start,
                -2.0 * PI,
                2.0 * PI,
            )?,
        };

        let change_code = params
            .read_numerical_param_with_default_and_limits::<u32>("adiabaticChangeAlg", 1, 1, 3)?;
        let focus_code = params
            .read_numerical_param_with_default_and_limits::<u32>("adiabaticFocusAlg", 1, 1, 3)?;

        let transport = TransportConfig {
            use_shell_diffusion: params.read_switch_with_default(
                "useShellDiffusion",
                defaults.transport.use_shell_diffusion,
            )?,
            use_parallel_diffusion: params.read_switch_with_default(
                "useParallelDiffusion",
                defaults.transport.use_parallel_diffusion,
            )?,
            use_drift: params.read_switch_with_default("useDrift", defaults.transport.use_drift)?,
            use_adiabatic_change: params.read_switch_with_default(
                "useAdiabaticChange",
                defaults.transport.use_adiabatic_change,
            )?,
            use_adiabatic_focus: params.read_switch_with_default(
                "useAdiabaticFocus",
                defaults.transport.use_adiabatic_focus,
            )?,
            // Codes are range checked above
            adiabatic_change_algorithm: AdiabaticChangeAlgorithm::from_code(change_code)
                .unwrap_or(AdiabaticChangeAlgorithm::Upwind),
            adiabatic_focus_algorithm: AdiabaticFocusAlgorithm::from_code(focus_code)
                .unwrap_or(AdiabaticFocusAlgorithm::Upwind),
            lamo: read_float(params, "lamo", defaults.transport.lamo, 1e-6, 1e3)?,
            mfp_radial_power: read_float(
                params,
                "mfpRadialPower",
                defaults.transport.mfp_radial_power,
                -10.0,
                10.0,
            )?,
            rigidity_power: read_float(
                params,
                "rigidityPower",
                defaults.transport.rigidity_power,
                -10.0,
                10.0,
            )?,
            kperxkpar: read_float(params, "kperxkpar", defaults.transport.kperxkpar, 0.0, 1.0)?,
            dsh_min: read_float(
                params,
                "dsh_min",
                defaults.transport.dsh_min,
                fep::MIN_POSITIVE,
                1.0,
            )?,
            max_subcycles: read_count(params, "maxSubcycles", defaults.transport.max_subcycles, 1)?,
        };

        let seed = SeedConfig {
            use_ep_boundary: params.read_switch_with_default(
                "useEPBoundary",
                defaults.seed.use_ep_boundary,
            )?,
            use_boundary_function: params.read_switch_with_default(
                "useBoundaryFunction",
                defaults.seed.use_boundary_function,
            )?,
            boundary_function_init_domain: params.read_switch_with_default(
                "boundaryFunctionInitDomain",
                defaults.seed.boundary_function_init_domain,
            )?,
            check_seed_population: params.read_switch_with_default(
                "checkSeedPopulation",
                defaults.seed.check_seed_population,
            )?,
            amplitude: read_float(
                params,
                "boundaryFunctAmplitude",
                defaults.seed.amplitude,
                0.0,
                1e20,
            )?,
            xi: read_float(params, "boundaryFunctXi", defaults.seed.xi, 1e-20, 1e20)?,
            gamma: read_float(
                params,
                "boundaryFunctGamma",
                defaults.seed.gamma,
                -20.0,
                20.0,
            )?,
            beta: read_float(params, "boundaryFunctBeta", defaults.seed.beta, -20.0, 20.0)?,
            r0: read_float(params, "boundaryFunctR0", defaults.seed.r0, 1e-6, 1e3)?,
            er: read_float(params, "boundaryFunctEr", defaults.seed.er, 1e-6, 1e6)?,
            ecutoff: read_float(
                params,
                "boundaryFunctEcutoff",
                defaults.seed.ecutoff,
                1e-6,
                1e300,
            )?,
        };

        let shock = ShockDetectionConfig {
            enabled: params.read_switch_with_default("shockSolver", defaults.shock.enabled)?,
            detect_threshold: read_float(
                params,
                "shockDetectPercent",
                defaults.shock.detect_threshold,
                0.0,
                1e6,
            )?,
            min_injection_energy: units::mev_to_internal(read_float(
                params,
                "minInjectionEnergy",
                0.01,
                0.0,
                1e6,
            )?),
            injection_factor: read_float(
                params,
                "shockInjectionFactor",
                defaults.shock.injection_factor,
                0.0,
                1e12,
            )?,
        };

        let ideal_shock = IdealShockConfig {
            enabled: params.read_switch_with_default("idealShock", defaults.ideal_shock.enabled)?,
            sharpness: read_float(
                params,
                "idealShockSharpness",
                defaults.ideal_shock.sharpness,
                1e-6,
                1e6,
            )?,
            scale_length: read_float(
                params,
                "idealShockScaleLength",
                defaults.ideal_shock.scale_length,
                1e-9,
                1e3,
            )?,
            jump: read_float(
                params,
                "idealShockJump",
                defaults.ideal_shock.jump,
                1.0,
                1e3,
            )?,
            falloff: read_float(
                params,
                "idealShockFalloff",
                defaults.ideal_shock.falloff,
                0.0,
                10.0,
            )?,
            speed: units::cm_per_s_to_internal(read_float(
                params,
                "idealShockSpeed",
                1e8,
                0.0,
                3e10,
            )?),
            init_time: units::days_to_internal(read_float(
                params,
                "idealShockInitTime",
                0.5,
                0.0,
                1e5,
            )?),
            theta: read_float(
                params,
                "idealShockTheta",
                defaults.ideal_shock.theta,
                0.0,
                PI,
            )?,
            phi: read_float(
                params,
                "idealShockPhi",
                defaults.ideal_shock.phi,
                -2.0 * PI,
                2.0 * PI,
            )?,
            width: read_float(
                params,
                "idealShockWidth",
                defaults.ideal_shock.width,
                0.0,
                PI,
            )?,
        };

        let dump_freq = read_count(params, "dumpFreq", defaults.dump_freq, 1)?;

        let config = Self {
            grid,
            species,
            time,
            wind,
            transport,
            seed,
            shock,
            ideal_shock,
            dump_freq,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks relations between parameters that cannot be verified one by one.
    pub fn validate(&self) -> Result<(), TransportError> {
        let grid = &self.grid;
        verify_at_least(
            "numNodesPerStream",
            grid.num_nodes_per_stream,
            GridConfig::MIN_NODES_PER_STREAM,
        )?;
        verify_at_least("numRowsPerFace", grid.num_rows_per_face, 1)?;
        verify_at_least("numColumnsPerFace", grid.num_columns_per_face, 1)?;
        verify_at_least(
            "numEnergySteps",
            grid.num_energy_steps,
            GridConfig::MIN_ENERGY_STEPS,
        )?;
        verify_at_least("numMuSteps", grid.num_mu_steps, GridConfig::MIN_MU_STEPS)?;
        verify_at_least("numEpSteps", self.time.num_ep_steps, 1)?;
        verify_at_least("maxSubcycles", self.transport.max_subcycles, 1)?;
        verify_at_least("dumpFreq", self.dump_freq, 1)?;
        verify_within_limits(
            "dsh_min",
            self.transport.dsh_min,
            fep::MIN_POSITIVE,
            fep::INFINITY,
        )?;
        if !(grid.e_min > 0.0) {
            return Err(TransportError::InvalidParameter {
                name: "eMin".to_string(),
                value: grid.e_min.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.grid.e_min >= self.grid.e_max {
            return Err(TransportError::InvalidParameter {
                name: "eMin".to_string(),
                value: self.grid.e_min.to_string(),
                reason: format!("must be smaller than eMax ({})", self.grid.e_max),
            });
        }
        if self.time.sim_stop_time < self.time.sim_start_time {
            return Err(TransportError::InvalidParameter {
                name: "simStopTime".to_string(),
                value: self.time.sim_stop_time.to_string(),
                reason: "must not precede simStartTime".to_string(),
            });
        }
        verify_within_limits("tDel", self.time.t_del, fep::MIN_POSITIVE, fep::INFINITY)?;
        verify_within_limits(
            "boundaryFunctXi",
            self.seed.xi,
            fep::MIN_POSITIVE,
            fep::INFINITY,
        )?;
        verify_within_limits(
            "boundaryFunctR0",
            self.seed.r0,
            fep::MIN_POSITIVE,
            fep::INFINITY,
        )?;
        verify_within_limits(
            "boundaryFunctEr",
            self.seed.er,
            fep::MIN_POSITIVE,
            fep::INFINITY,
        )?;
        verify_within_limits(
            "boundaryFunctEcutoff",
            self.seed.ecutoff,
            fep::MIN_POSITIVE,
            fep::INFINITY,
        )?;
        if self.shock.enabled && self.ideal_shock.enabled {
            return Err(TransportError::ConflictingOptions {
                first: "shockSolver".to_string(),
                second: "idealShock".to_string(),
                reason: "only one shock injection mechanism may be active".to_string(),
            });
        }
        Ok(())
    }

    /// Number of particle species.
    pub fn num_species(&self) -> usize {
        self.species.len()
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig {
                num_nodes_per_stream: 40,
                num_rows_per_face: 2,
                num_columns_per_face: 2,
                num_energy_steps: 20,
                num_mu_steps: 8,
                r_scale: 0.05,
                e_min: units::mev_to_internal(1.0),
                e_max: units::mev_to_internal(1000.0),
            },
            species: SpeciesTable(vec![Species {
                mass: 1.0,
                charge: 1.0,
            }]),
            time: TimeConfig {
                sim_start_time: 0.0,
                sim_stop_time: units::days_to_internal(1.0),
                t_del: units::days_to_internal(1.0 / 24.0),
                num_ep_steps: 30,
            },
            wind: WindConfig {
                flow_mag: units::cm_per_s_to_internal(4e7),
                density_au: units::density_to_internal(8.3),
                b_au: units::gauss_to_internal(1.6e-5),
                omega_sun: 1.429e-3,
                azi_sun_start: 0.0,
            },
            transport: TransportConfig {
                use_shell_diffusion: false,
                use_parallel_diffusion: true,
                use_drift: false,
                use_adiabatic_change: true,
                use_adiabatic_focus: true,
                adiabatic_change_algorithm: AdiabaticChangeAlgorithm::Upwind,
                adiabatic_focus_algorithm: AdiabaticFocusAlgorithm::Upwind,
                lamo: 1.0,
                mfp_radial_power: 0.0,
                rigidity_power: 1.0 / 3.0,
                kperxkpar: 0.01,
                dsh_min: 5e-5,
                max_subcycles: 10000,
            },
            seed: SeedConfig {
                use_ep_boundary: true,
                use_boundary_function: true,
                boundary_function_init_domain: true,
                check_seed_population: true,
                amplitude: 1.0,
                xi: 1.0,
                gamma: 2.0,
                beta: 1.7,
                r0: 1.0,
                er: 1.0,
                ecutoff: 100.0,
            },
            shock: ShockDetectionConfig {
                enabled: false,
                detect_threshold: 4.0,
                min_injection_energy: units::mev_to_internal(0.01),
                injection_factor: 1.0,
            },
            ideal_shock: IdealShockConfig {
                enabled: false,
                sharpness: 1.0,
                scale_length: 0.0046,
                jump: 4.0,
                falloff: 0.0,
                speed: units::cm_per_s_to_internal(1e8),
                init_time: units::days_to_internal(0.5),
                theta: 0.5 * PI,
                phi: 0.0,
                width: 0.0,
            },
            dump_freq: 1,
        }
    }
}

fn read_float(
    params: &ParameterSet,
    name: &str,
    default: fep,
    min_value: fep,
    max_value: fep,
) -> Result<fep, TransportError> {
    let value: fep =
        params.read_numerical_param_with_default_and_limits(name, default, min_value, max_value)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TransportError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be finite".to_string(),
        })
    }
}

fn verify_at_least(name: &str, value: usize, min_value: usize) -> Result<(), TransportError> {
    verify_within_limits(name, value, min_value, usize::MAX)
}

fn read_count(
    params: &ParameterSet,
    name: &str,
    default: usize,
    min_value: usize,
) -> Result<usize, TransportError> {
    params.read_numerical_param_with_default_and_limits(name, default, min_value, usize::MAX)
}
