//! Geometric utility objects.

use num::Float;
use std::{
    fmt,
    ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Neg, Sub},
};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Denotes the x-, y- or z-dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dim3 {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Dim3 {
    /// Creates an array for iterating over the x-, y- and z-dimensions.
    pub fn slice() -> [Self; 3] {
        [Self::X, Self::Y, Self::Z]
    }

    /// Returns the number of the dimension.
    pub fn num(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::X => "x",
                Self::Y => "y",
                Self::Z => "z",
            }
        )
    }
}

use Dim3::{X, Y, Z};

/// A 3D cartesian vector.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct Vec3<F>([F; 3]);

impl<F: Float> Vec3<F> {
    /// Creates a new 3D vector given the three components.
    pub fn new(x: F, y: F, z: F) -> Self {
        Self([x, y, z])
    }

    /// Creates a new 3D vector by evaluating the given component
    /// constructor for each dimension.
    pub fn with_each_component<C>(create_component: C) -> Self
    where
        C: Fn(Dim3) -> F,
    {
        Self::new(
            create_component(X),
            create_component(Y),
            create_component(Z),
        )
    }

    /// Creates a new zero vector.
    pub fn zero() -> Self {
        Self::new(F::zero(), F::zero(), F::zero())
    }

    /// Creates a vector from spherical coordinates (radius, colatitude, azimuth).
    pub fn from_spherical(r: F, theta: F, phi: F) -> Self {
        let sin_theta = theta.sin();
        Self::new(
            r * sin_theta * phi.cos(),
            r * sin_theta * phi.sin(),
            r * theta.cos(),
        )
    }

    /// Computes the squared length of the vector.
    pub fn squared_length(&self) -> F {
        self[X] * self[X] + self[Y] * self[Y] + self[Z] * self[Z]
    }

    /// Computes the length of the vector.
    pub fn length(&self) -> F {
        self.squared_length().sqrt()
    }

    /// Computes the dot product of the vector with another vector.
    pub fn dot(&self, other: &Self) -> F {
        self[X] * other[X] + self[Y] * other[Y] + self[Z] * other[Z]
    }

    /// Computes the cross product of the vector with another vector.
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self[Y] * other[Z] - self[Z] * other[Y],
            self[Z] * other[X] - self[X] * other[Z],
            self[X] * other[Y] - self[Y] * other[X],
        )
    }

    /// Returns a normalized version of the vector.
    ///
    /// The zero vector is returned unchanged.
    pub fn normalized(&self) -> Self {
        let length = self.length();
        if length > F::zero() {
            *self / length
        } else {
            *self
        }
    }

    /// Returns the radius, colatitude and azimuth of the point at the tip of the vector.
    pub fn to_spherical(&self) -> (F, F, F) {
        let r = self.length();
        let theta = if r > F::zero() {
            (self[Z] / r).max(-F::one()).min(F::one()).acos()
        } else {
            F::zero()
        };
        let phi = self[Y].atan2(self[X]);
        (r, theta, phi)
    }

    /// Returns the radial distance of the point at the tip of the vector.
    pub fn radius(&self) -> F {
        self.length()
    }
}

impl<F: Float> Index<Dim3> for Vec3<F> {
    type Output = F;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim as usize]
    }
}

impl<F: Float> IndexMut<Dim3> for Vec3<F> {
    fn index_mut(&mut self, dim: Dim3) -> &mut Self::Output {
        &mut self.0[dim as usize]
    }
}

impl<F: Float> Add for Vec3<F> {
    type Output = Self;
    fn add(self, other: Self) -> Self::Output {
        Self::with_each_component(|dim| self[dim] + other[dim])
    }
}

impl<F: Float> AddAssign for Vec3<F> {
    fn add_assign(&mut self, other: Self) {
        for dim in Dim3::slice() {
            self[dim] = self[dim] + other[dim];
        }
    }
}

impl<F: Float> Sub for Vec3<F> {
    type Output = Self;
    fn sub(self, other: Self) -> Self::Output {
        Self::with_each_component(|dim| self[dim] - other[dim])
    }
}

impl<F: Float> Neg for Vec3<F> {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::with_each_component(|dim| -self[dim])
    }
}

impl<F: Float> Mul<F> for Vec3<F> {
    type Output = Self;
    fn mul(self, factor: F) -> Self::Output {
        Self::with_each_component(|dim| self[dim] * factor)
    }
}

impl<F: Float> Div<F> for Vec3<F> {
    type Output = Self;
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn div(self, divisor: F) -> Self::Output {
        let fact = F::one() / divisor;
        self * fact
    }
}

impl<F: Float + fmt::Display> fmt::Display for Vec3<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self[X], self[Y], self[Z])
    }
}

/// A vector given by its components in the local spherical basis
/// (radial, colatitudinal, azimuthal) at some position.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct SphVec<F> {
    pub r: F,
    pub theta: F,
    pub phi: F,
}

impl<F: Float> SphVec<F> {
    /// Creates a new spherical vector from its three components.
    pub fn new(r: F, theta: F, phi: F) -> Self {
        Self { r, theta, phi }
    }

    /// Creates a new zero vector.
    pub fn zero() -> Self {
        Self::new(F::zero(), F::zero(), F::zero())
    }

    /// Converts to a cartesian vector, using the local basis at the given position.
    pub fn to_cartesian(&self, position: &Vec3<F>) -> Vec3<F> {
        let [r_hat, theta_hat, phi_hat] = local_basis(position);
        r_hat * self.r + theta_hat * self.theta + phi_hat * self.phi
    }

    /// Decomposes the given cartesian vector in the local basis at the given position.
    pub fn from_cartesian(vector: &Vec3<F>, position: &Vec3<F>) -> Self {
        let [r_hat, theta_hat, phi_hat] = local_basis(position);
        Self::new(
            vector.dot(&r_hat),
            vector.dot(&theta_hat),
            vector.dot(&phi_hat),
        )
    }

    /// Computes the length of the vector.
    pub fn length(&self) -> F {
        (self.r * self.r + self.theta * self.theta + self.phi * self.phi).sqrt()
    }
}

/// Returns the radial, colatitudinal and azimuthal unit vectors at the given position.
fn local_basis<F: Float>(position: &Vec3<F>) -> [Vec3<F>; 3] {
    let (_, theta, phi) = position.to_spherical();
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    [
        Vec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta),
        Vec3::new(cos_theta * cos_phi, cos_theta * sin_phi, -sin_theta),
        Vec3::new(-sin_phi, cos_phi, F::zero()),
    ]
}

/// Computes the angular separation between two directions given in
/// colatitude and azimuth.
pub fn angular_separation<F: Float>(theta_1: F, phi_1: F, theta_2: F, phi_2: F) -> F {
    let cos_separation =
        theta_1.cos() * theta_2.cos() + theta_1.sin() * theta_2.sin() * (phi_1 - phi_2).cos();
    cos_separation.max(-F::one()).min(F::one()).acos()
}
