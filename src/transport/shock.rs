//! Detection of shocks and injection of shock-accelerated particles.

use super::{fep, seed::SeedSpectrum, stream_list::DedupedStream};
use crate::{
    config::{IdealShockConfig, ShockDetectionConfig, SolverConfig},
    geometry::{angular_separation, Vec3},
    grid::phase_space::EnergyGrid,
    plasma::StreamNode,
};
use ndarray::Array4;

/// Detects shocks from steep drops in density along a stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ShockDetector {
    threshold: fep,
}

impl ShockDetector {
    pub fn new(config: &ShockDetectionConfig) -> Self {
        Self {
            threshold: config.detect_threshold,
        }
    }

    /// Flags the nodes of a stream where `-dln(n)/dln(r)` towards the next
    /// representative exceeds the detection threshold. Merged nodes share the
    /// flag of their representative.
    pub fn detect(&self, nodes: &[StreamNode], deduped: &DedupedStream) -> Vec<bool> {
        let reps = deduped.representatives();
        let mut rep_shocked = vec![false; reps.len()];
        for (k, pair) in reps.windows(2).enumerate() {
            let (inner, outer) = (&nodes[pair[0]], &nodes[pair[1]]);
            let log_radius_change = (outer.radius() / inner.radius()).ln();
            if log_radius_change <= 0.0 {
                continue;
            }
            let gradient = (outer.plasma.density / inner.plasma.density).ln() / log_radius_change;
            rep_shocked[k] = -gradient > self.threshold;
        }
        (0..nodes.len())
            .map(|shell| rep_shocked[deduped.representative_of(shell)])
            .collect()
    }
}

/// Analytic cone-shaped shock expanding at constant speed.
#[derive(Clone, Debug, PartialEq)]
pub struct IdealShock {
    r_scale: fep,
    speed: fep,
    init_time: fep,
    width: fep,
    jump: fep,
    falloff: fep,
    cone_theta: fep,
    cone_phi: fep,
    cone_half_width: fep,
}

impl IdealShock {
    /// Creates the ideal shock described by the given configuration, or
    /// returns `None` if it is disabled.
    pub fn from_config(config: &SolverConfig) -> Option<Self> {
        let shock: &IdealShockConfig = &config.ideal_shock;
        if !shock.enabled {
            return None;
        }
        Some(Self {
            r_scale: config.grid.r_scale,
            speed: shock.speed,
            init_time: shock.init_time,
            width: shock.scale_length / shock.sharpness,
            jump: shock.jump,
            falloff: shock.falloff,
            cone_theta: shock.theta,
            // Cone azimuth is given relative to the initial solar azimuth
            cone_phi: shock.phi + config.wind.azi_sun_start,
            cone_half_width: shock.width,
        })
    }

    /// Whether the shock has been launched at the given time.
    pub fn is_launched(&self, time: fep) -> bool {
        time >= self.init_time
    }

    /// Radial distance of the shock front at the given time [AU].
    pub fn front_radius(&self, time: fep) -> fep {
        self.r_scale + self.speed * (time - self.init_time)
    }

    /// Width of the shock transition [AU].
    pub fn width(&self) -> fep {
        self.width
    }

    /// Compression ratio at the given time, weakening with distance.
    pub fn effective_jump(&self, time: fep) -> fep {
        1.0 + (self.jump - 1.0) * self.front_radius(time).powf(-self.falloff)
    }

    /// Whether the direction of the given position lies inside the cone.
    pub fn in_cone(&self, position: &Vec3<fep>) -> bool {
        if self.cone_half_width <= 0.0 {
            return true;
        }
        let (_, theta, phi) = position.to_spherical();
        angular_separation(theta, phi, self.cone_theta, self.cone_phi) <= self.cone_half_width
    }

    /// Whether the given position lies within the shock transition at the given time.
    pub fn is_shocked(&self, position: &Vec3<fep>, time: fep) -> bool {
        self.is_launched(time)
            && (position.radius() - self.front_radius(time)).abs() <= self.width
            && self.in_cone(position)
    }

    /// Factor by which the plasma at the given position is compressed at the
    /// given time. Equals one ahead of the shock and outside the cone.
    pub fn compression(&self, position: &Vec3<fep>, time: fep) -> fep {
        if !self.is_launched(time) || !self.in_cone(position) {
            return 1.0;
        }
        let offset = (position.radius() - self.front_radius(time)) / self.width;
        1.0 + (self.effective_jump(time) - 1.0) * 0.5 * (1.0 - offset.tanh())
    }

    /// Flags the nodes lying within the shock transition.
    pub fn detect(&self, nodes: &[StreamNode], time: fep) -> Vec<bool> {
        nodes
            .iter()
            .map(|node| self.is_shocked(&node.position, time))
            .collect()
    }
}

/// Mechanism used to locate shocks.
#[derive(Clone, Debug, PartialEq)]
pub enum ShockSource {
    Detected(ShockDetector),
    Ideal(IdealShock),
}

/// Injection of an amplified seed population at shocked nodes.
#[derive(Clone, Debug)]
pub struct ShockInjection {
    source: ShockSource,
    seed: SeedSpectrum,
    factor: fep,
    min_energy: fep,
}

impl ShockInjection {
    /// Creates the shock injection described by the given configuration,
    /// or returns `None` if no shock mechanism is enabled.
    pub fn from_config(config: &SolverConfig) -> Option<Self> {
        let source = if config.shock.enabled {
            ShockSource::Detected(ShockDetector::new(&config.shock))
        } else {
            ShockSource::Ideal(IdealShock::from_config(config)?)
        };
        Some(Self {
            source,
            seed: SeedSpectrum::new(&config.seed),
            factor: config.shock.injection_factor,
            min_energy: config.shock.min_injection_energy,
        })
    }

    /// Flags the shocked nodes of a stream at the given time.
    pub fn shocked_nodes(
        &self,
        nodes: &[StreamNode],
        deduped: &DedupedStream,
        time: fep,
    ) -> Vec<bool> {
        match &self.source {
            ShockSource::Detected(detector) => detector.detect(nodes, deduped),
            ShockSource::Ideal(shock) => shock.detect(nodes, time),
        }
    }

    /// Raises the distribution at every shocked node to the amplified seed
    /// population, for energies not below the minimum injection energy.
    /// Returns the number of shocked nodes.
    pub fn apply(
        &self,
        distribution: &mut Array4<fep>,
        nodes: &[StreamNode],
        deduped: &DedupedStream,
        energy_grid: &EnergyGrid,
        time: fep,
    ) -> usize {
        let shocked = self.shocked_nodes(nodes, deduped, time);
        let mut num_shocked = 0;
        for (shell, node) in nodes.iter().enumerate() {
            if shocked[shell] {
                num_shocked += 1;
                self.seed.raise_shell(
                    distribution,
                    shell,
                    node.radius(),
                    energy_grid,
                    self.factor,
                    self.min_energy,
                );
            }
        }
        num_shocked
    }
}
