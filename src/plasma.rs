//! Background plasma state seen by the energetic particles.

pub mod solar_wind;

use crate::{
    geometry::{SphVec, Vec3},
    transport::fep,
};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Local state of the background plasma at a stream node.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct PlasmaState {
    /// Number density [MHD_DENSITY_NORM].
    pub density: fep,
    /// Magnetic field strength [U_B].
    pub b_mag: fep,
    /// Flow velocity [c].
    pub velocity: Vec3<fep>,
    /// Curl of `B/B^2` in the local spherical basis [1/(U_B AU)].
    pub curl_b_over_b2: SphVec<fep>,
}

/// Position and plasma state of a stream node.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct StreamNode {
    /// Cartesian position [AU].
    pub position: Vec3<fep>,
    pub plasma: PlasmaState,
}

impl StreamNode {
    /// Radial distance of the node [AU].
    pub fn radius(&self) -> fep {
        self.position.radius()
    }
}

/// Provider of the background flow along every stream.
///
/// Nodes are Lagrangian, so the returned positions generally change with time.
pub trait BackgroundFlow: Sync {
    /// Returns the node with the given shell index on the given stream at the given time.
    fn node_state(&self, stream: usize, shell: usize, time: fep) -> StreamNode;
}
