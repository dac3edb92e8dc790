//! Analytic steady solar wind with a Parker spiral magnetic field.

use super::{BackgroundFlow, PlasmaState, StreamNode};
use crate::{
    config::SolverConfig,
    geometry::{Dim3, SphVec, Vec3},
    grid::StreamGrid,
    transport::{fep, shock::IdealShock},
};
use Dim3::{X, Y, Z};

/// Radial solar wind of constant speed carrying a Parker spiral field.
///
/// The nodes of a stream lie on a radial ray and move outward with the wind.
/// When an ideal shock is configured, density and field strength are
/// compressed by its analytic profile.
#[derive(Clone, Debug)]
pub struct SteadySolarWind {
    grid: StreamGrid,
    r_scale: fep,
    node_spacing: fep,
    start_time: fep,
    flow_mag: fep,
    density_au: fep,
    b_au: fep,
    omega_sun: fep,
    ideal_shock: Option<IdealShock>,
}

impl SteadySolarWind {
    /// Relative step used for finite differences of the field.
    const DIFFERENCE_STEP: fep = 1e-4;

    /// Creates the solar wind described by the given configuration.
    pub fn new(config: &SolverConfig) -> Self {
        let wind = &config.wind;
        Self {
            grid: StreamGrid::from_config(&config.grid),
            r_scale: config.grid.r_scale,
            node_spacing: wind.flow_mag * config.time.t_del,
            start_time: config.time.sim_start_time,
            flow_mag: wind.flow_mag,
            density_au: wind.density_au,
            b_au: wind.b_au,
            omega_sun: wind.omega_sun,
            ideal_shock: IdealShock::from_config(config),
        }
    }

    /// Radius of the node with the given shell index at the given time [AU].
    pub fn node_radius(&self, shell: usize, time: fep) -> fep {
        self.r_scale + shell as fep * self.node_spacing + self.flow_mag * (time - self.start_time)
    }

    fn compression(&self, position: &Vec3<fep>, time: fep) -> fep {
        self.ideal_shock
            .as_ref()
            .map_or(1.0, |shock| shock.compression(position, time))
    }

    /// Computes the magnetic field vector at the given position and time.
    pub fn magnetic_field(&self, position: &Vec3<fep>, time: fep) -> Vec3<fep> {
        let (r, theta, _) = position.to_spherical();
        let b_r = self.b_au / (r * r);
        let b_phi = -b_r * self.omega_sun * r * theta.sin() / self.flow_mag;
        SphVec::new(b_r, 0.0, b_phi).to_cartesian(position) * self.compression(position, time)
    }

    /// Computes the number density at the given position and time.
    pub fn density(&self, position: &Vec3<fep>, time: fep) -> fep {
        let r = position.radius();
        self.density_au / (r * r) * self.compression(position, time)
    }

    fn b_over_b2(&self, position: &Vec3<fep>, time: fep) -> Vec3<fep> {
        let b = self.magnetic_field(position, time);
        b / b.squared_length()
    }

    /// Computes curl(B/B^2) with central differences.
    pub fn curl_b_over_b2(&self, position: &Vec3<fep>, time: fep) -> Vec3<fep> {
        let h = Self::DIFFERENCE_STEP * position.radius();
        let derivative = |along: Dim3, component: Dim3| {
            let mut offset = Vec3::zero();
            offset[along] = h;
            (self.b_over_b2(&(*position + offset), time)[component]
                - self.b_over_b2(&(*position - offset), time)[component])
                / (2.0 * h)
        };
        Vec3::new(
            derivative(Y, Z) - derivative(Z, Y),
            derivative(Z, X) - derivative(X, Z),
            derivative(X, Y) - derivative(Y, X),
        )
    }
}

impl BackgroundFlow for SteadySolarWind {
    fn node_state(&self, stream: usize, shell: usize, time: fep) -> StreamNode {
        let position = self
            .grid
            .node_position(stream, self.node_radius(shell, time));
        let plasma = PlasmaState {
            density: self.density(&position, time),
            b_mag: self.magnetic_field(&position, time).length(),
            velocity: position.normalized() * self.flow_mag,
            curl_b_over_b2: SphVec::from_cartesian(
                &self.curl_b_over_b2(&position, time),
                &position,
            ),
        };
        StreamNode { position, plasma }
    }
}
