//! One-dimensional advection schemes for the energy and pitch-angle axes.
//!
//! The schemes solve `df/dt + a*df/dx = 0` on a uniform grid, given the
//! signed Courant number `a*dt/dx` of every cell.

use super::{fep, floored};

/// How ghost values beyond the ends of an axis are obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeTreatment {
    /// The logarithm of the values is extrapolated linearly.
    PowerLaw,
    /// The edge value is repeated.
    ZeroSlope,
}

impl EdgeTreatment {
    /// Largest factor by which a power-law ghost may differ from its neighbour.
    const MAX_GHOST_RATIO: fep = 1e3;

    /// Computes the ghost value `distance` cells beyond the edge whose
    /// value is `edge` and whose inner neighbour is `inner`.
    ///
    /// Power-law extrapolation is done in log space with the slope bounded
    /// by [`Self::MAX_GHOST_RATIO`], and falls back to the edge value when
    /// the slope is undefined.
    fn ghost_value(self, edge: fep, inner: fep, distance: i32) -> fep {
        match self {
            Self::PowerLaw => {
                let max_log_slope = Self::MAX_GHOST_RATIO.ln();
                let log_slope = (edge / inner).ln().clamp(-max_log_slope, max_log_slope);
                let ghost = edge * fep::exp(distance as fep * log_slope);
                if ghost.is_finite() {
                    ghost
                } else {
                    edge
                }
            }
            Self::ZeroSlope => edge,
        }
    }
}

/// A numerical scheme for one-dimensional advection.
pub trait Advector: Sync + Send {
    /// Largest absolute Courant number for which the scheme is stable.
    fn courant_limit(&self) -> fep;

    /// Advances the given values by one step.
    ///
    /// # Parameters
    ///
    /// - `values`: Values to advance (at least two).
    /// - `courant_numbers`: Signed Courant number of each cell.
    /// - `edges`: How to fill the ghost cells.
    fn advance(&self, values: &mut [fep], courant_numbers: &[fep], edges: EdgeTreatment);
}

/// Copies the values into a buffer padded with `num_ghosts` ghost cells at each end.
fn pad_with_ghosts(values: &[fep], num_ghosts: usize, edges: EdgeTreatment) -> Vec<fep> {
    let n = values.len();
    let mut padded = Vec::with_capacity(n + 2 * num_ghosts);
    for distance in (1..=num_ghosts).rev() {
        padded.push(edges.ghost_value(values[0], values[1], distance as i32));
    }
    padded.extend_from_slice(values);
    let (edge, inner) = (values[n - 1], values[n - 2]);
    for distance in 1..=num_ghosts {
        padded.push(edges.ghost_value(edge, inner, distance as i32));
    }
    padded
}

/// First-order upwind advection. Monotone for Courant numbers up to one.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpwindAdvector;

impl Advector for UpwindAdvector {
    fn courant_limit(&self) -> fep {
        1.0
    }

    fn advance(&self, values: &mut [fep], courant_numbers: &[fep], edges: EdgeTreatment) {
        debug_assert_eq!(values.len(), courant_numbers.len());
        let padded = pad_with_ghosts(values, 1, edges);
        for (i, (value, &nu)) in values.iter_mut().zip(courant_numbers).enumerate() {
            let j = i + 1;
            let change = if nu > 0.0 {
                nu * (padded[j] - padded[j - 1])
            } else {
                nu * (padded[j + 1] - padded[j])
            };
            *value = floored(padded[j] - change);
        }
    }
}

/// Third-order WENO advection with two-stage strong stability preserving
/// Runge-Kutta time integration.
///
/// Spatial derivatives follow the Hamilton-Jacobi WENO reconstruction of
/// Jiang & Peng (2000). Undershoots below the floor are removed after each step.
#[derive(Clone, Copy, Debug, Default)]
pub struct Weno3Advector;

impl Weno3Advector {
    /// Relative size of the regularization of the smoothness ratios.
    const EPSILON: fep = 1e-12;

    /// Computes `-nu*df/dx*dx` for every cell.
    fn evaluate_rate(values: &[fep], courant_numbers: &[fep], edges: EdgeTreatment) -> Vec<fep> {
        let padded = pad_with_ghosts(values, 2, edges);
        // Forward differences; diff[k] = padded[k + 1] - padded[k]
        let diff: Vec<fep> = padded.windows(2).map(|w| w[1] - w[0]).collect();

        let scale = values.iter().fold(0.0, |max: fep, v| max.max(v.abs()));
        let epsilon = Self::EPSILON * scale * scale + fep::MIN_POSITIVE;

        courant_numbers
            .iter()
            .enumerate()
            .map(|(i, &nu)| {
                let j = i + 2;
                let (d_mm, d_m, d_0, d_p) = (diff[j - 2], diff[j - 1], diff[j], diff[j + 1]);
                let central = 0.5 * (d_m + d_0);
                let derivative = if nu > 0.0 {
                    let r = (epsilon + (d_m - d_mm).powi(2)) / (epsilon + (d_0 - d_m).powi(2));
                    let w = 1.0 / (1.0 + 2.0 * r * r);
                    central - 0.5 * w * (d_mm - 2.0 * d_m + d_0)
                } else {
                    let r = (epsilon + (d_p - d_0).powi(2)) / (epsilon + (d_0 - d_m).powi(2));
                    let w = 1.0 / (1.0 + 2.0 * r * r);
                    central - 0.5 * w * (d_p - 2.0 * d_0 + d_m)
                };
                -nu * derivative
            })
            .collect()
    }
}

impl Advector for Weno3Advector {
    fn courant_limit(&self) -> fep {
        0.5
    }

    fn advance(&self, values: &mut [fep], courant_numbers: &[fep], edges: EdgeTreatment) {
        debug_assert_eq!(values.len(), courant_numbers.len());
        let initial = values.to_vec();

        let rate = Self::evaluate_rate(&initial, courant_numbers, edges);
        let stage: Vec<fep> = initial.iter().zip(&rate).map(|(f, r)| f + r).collect();

        let rate = Self::evaluate_rate(&stage, courant_numbers, edges);
        for (((value, f), s), r) in values.iter_mut().zip(&initial).zip(&stage).zip(&rate) {
            *value = floored(0.5 * f + 0.5 * (s + r));
        }
    }
}
