//! The `sepflux` crate transports solar energetic particles along
//! co-moving magnetic field streamlines embedded in a background plasma flow.
//!
//! The distribution function is evolved with an operator-split solver
//! covering streaming and pitch-angle scattering, perpendicular diffusion,
//! drift, adiabatic energy change and focusing, and shock injection. Streams
//! are distributed over workers that exchange neighbour data through a
//! [`comm::Communicator`].

pub mod comm;
pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod params;
pub mod plasma;
pub mod simulation;
pub mod transport;
pub mod units;

#[cfg(feature = "cli")]
pub mod cli;
