//! Computation and representation of inertia-related properties.

use crate::{
    fph,
    quantities::{Orientation, Position},
};
use anyhow::{Result, bail};
use approx::AbsDiffEq;
use nalgebra::{Matrix3, Vector3};

/// The inertia tensor of a physical body, defined with respect to the body's
/// center of mass, together with its cached inverse.
#[derive(Clone, Debug, PartialEq)]
pub struct InertiaTensor {
    matrix: Matrix3<fph>,
    inverse_matrix: Matrix3<fph>,
}

impl InertiaTensor {
    /// Creates a new inertia tensor from the given matrix.
    ///
    /// # Errors
    /// Returns an error if the matrix has non-finite entries or is not
    /// invertible.
    pub fn try_from_matrix(matrix: Matrix3<fph>) -> Result<Self> {
        if !matrix.iter().all(|entry| entry.is_finite()) {
            bail!("Inertia tensor has non-finite entries: {matrix}");
        }
        let Some(inverse_matrix) = matrix.try_inverse() else {
            bail!("Inertia tensor is not invertible: {matrix}");
        };
        Ok(Self {
            matrix,
            inverse_matrix,
        })
    }

    /// Creates a new diagonal inertia tensor with the given diagonal elements.
    ///
    /// # Panics
    /// If any of the elements is not positive.
    pub fn from_diagonal_elements(j_xx: fph, j_yy: fph, j_zz: fph) -> Self {
        assert!(j_xx > 0.0 && j_yy > 0.0 && j_zz > 0.0);
        Self {
            matrix: Matrix3::from_diagonal(&Vector3::new(j_xx, j_yy, j_zz)),
            inverse_matrix: Matrix3::from_diagonal(&Vector3::new(
                j_xx.recip(),
                j_yy.recip(),
                j_zz.recip(),
            )),
        }
    }

    /// Creates the identity inertia tensor.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
            inverse_matrix: Matrix3::identity(),
        }
    }

    /// Returns a reference to the inertia tensor matrix.
    pub fn matrix(&self) -> &Matrix3<fph> {
        &self.matrix
    }

    /// Returns a reference to the inverse of the inertia tensor matrix.
    pub fn inverse_matrix(&self) -> &Matrix3<fph> {
        &self.inverse_matrix
    }

    /// Computes the inertia tensor matrix in the reference frame obtained by
    /// applying the given rotation to the body frame.
    pub fn rotated_matrix(&self, orientation: &Orientation) -> Matrix3<fph> {
        let rotation = orientation.to_rotation_matrix();
        rotation * self.matrix * rotation.transpose()
    }

    /// Computes the inverse of the inertia tensor matrix in the reference
    /// frame obtained by applying the given rotation to the body frame.
    pub fn inverse_rotated_matrix(&self, orientation: &Orientation) -> Matrix3<fph> {
        let rotation = orientation.to_rotation_matrix();
        rotation * self.inverse_matrix * rotation.transpose()
    }
}

impl AbsDiffEq for InertiaTensor {
    type Epsilon = <fph as AbsDiffEq>::Epsilon;

    fn default_epsilon() -> Self::Epsilon {
        fph::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        Matrix3::abs_diff_eq(&self.matrix, &other.matrix, epsilon)
    }
}

/// Computes the inertia tensor of the uniformly dense box with the given mass
/// and per-axis extents. The y- and z-axis moments pair the width with the
/// height and the depth respectively.
pub fn of_uniform_box(mass: fph, extents: &Vector3<fph>) -> InertiaTensor {
    let (width, height, depth) = (extents.x, extents.y, extents.z);
    InertiaTensor::from_diagonal_elements(
        mass * (depth.powi(2) + height.powi(2)) / 12.0,
        mass * (width.powi(2) + height.powi(2)) / 12.0,
        mass * (width.powi(2) + depth.powi(2)) / 12.0,
    )
}

/// Computes the inertia tensor of the uniformly dense ellipsoid with the
/// given mass and per-axis semi-axes.
pub fn of_uniform_ellipsoid(mass: fph, semi_axes: &Vector3<fph>) -> InertiaTensor {
    let (a, b, c) = (semi_axes.x, semi_axes.y, semi_axes.z);
    InertiaTensor::from_diagonal_elements(
        mass * (b.powi(2) + c.powi(2)) / 5.0,
        mass * (a.powi(2) + c.powi(2)) / 5.0,
        mass * (a.powi(2) + b.powi(2)) / 5.0,
    )
}

/// Computes the inertia tensor of the uniformly dense elliptic cylinder with
/// the given mass, semi-axes `extents.x`/`extents.z` and length `extents.y`
/// along the y-axis.
pub fn of_uniform_cylinder(mass: fph, extents: &Vector3<fph>) -> InertiaTensor {
    let (a, length, b) = (extents.x, extents.y, extents.z);
    InertiaTensor::from_diagonal_elements(
        mass * (b.powi(2) / 4.0 + length.powi(2) / 3.0),
        mass * (a.powi(2) + b.powi(2)) / 4.0,
        mass * (a.powi(2) / 4.0 + length.powi(2) / 3.0),
    )
}

/// Computes the inertia tensor of a uniformly dense lane (a long flat board
/// with its length along the x-axis).
pub fn of_uniform_lane(mass: fph, extents: &Vector3<fph>) -> InertiaTensor {
    let (length, height, width) = (extents.x, extents.y, extents.z);
    InertiaTensor::from_diagonal_elements(
        mass * (width.powi(2) / 4.0 + length.powi(2) / 3.0),
        mass * (height.powi(2) + width.powi(2)) / 4.0,
        mass * (height.powi(2) / 4.0 + length.powi(2) / 3.0),
    )
}

/// Computes the inertia tensor of the uniformly dense body whose closed
/// surface is given as consecutive vertex triples forming triangles.
///
/// The tensor is integrated by summing signed tetrahedron contributions over
/// the triangles and is defined with respect to the body's center of mass.
///
/// # Errors
/// Returns an error if the mesh encloses no volume or produces a degenerate
/// tensor.
pub fn of_uniform_convex_mesh(mass: fph, vertices: &[Position]) -> Result<InertiaTensor> {
    let center_of_mass = compute_mesh_center_of_mass(vertices)?;

    // Accumulates 6 times the enclosed volume
    let mut six_volume = 0.0;
    // Main diagonal integrals [x*x, y*y, z*z]
    let mut diag = Vector3::zeros();
    // Off-diagonal integrals [y*z, x*z, x*y]
    let mut offd = Vector3::zeros();

    for triangle in vertices.chunks_exact(3) {
        let a = triangle[0] - center_of_mass;
        let b = triangle[1] - center_of_mass;
        let c = triangle[2] - center_of_mass;

        let det = Matrix3::from_columns(&[a, b, c]).determinant();
        six_volume += det;

        for j in 0..3 {
            let j1 = (j + 1) % 3;
            let j2 = (j + 2) % 3;
            diag[j] += (a[j] * b[j]
                + b[j] * c[j]
                + c[j] * a[j]
                + a[j] * a[j]
                + b[j] * b[j]
                + c[j] * c[j])
                * det;
            offd[j] += (a[j1] * b[j2]
                + b[j1] * c[j2]
                + c[j1] * a[j2]
                + a[j1] * c[j2]
                + b[j1] * a[j2]
                + c[j1] * b[j2]
                + 2.0 * a[j1] * a[j2]
                + 2.0 * b[j1] * b[j2]
                + 2.0 * c[j1] * c[j2])
                * det;
        }
    }

    diag /= six_volume * (60.0 / 6.0);
    offd /= six_volume * (120.0 / 6.0);

    let matrix = mass
        * Matrix3::new(
            diag.y + diag.z,
            -offd.z,
            -offd.y,
            -offd.z,
            diag.x + diag.z,
            -offd.x,
            -offd.y,
            -offd.x,
            diag.x + diag.y,
        );

    InertiaTensor::try_from_matrix(matrix)
}

/// Computes the center of mass of the uniformly dense body whose closed
/// surface is given as consecutive vertex triples forming triangles.
///
/// # Errors
/// Returns an error if the mesh encloses no volume.
pub fn compute_mesh_center_of_mass(vertices: &[Position]) -> Result<Position> {
    let mut six_volume = 0.0;
    let mut weighted_sum = Vector3::zeros();

    for triangle in vertices.chunks_exact(3) {
        let (a, b, c) = (triangle[0], triangle[1], triangle[2]);
        let det = Matrix3::from_columns(&[a.coords, b.coords, c.coords]).determinant();
        weighted_sum += det * (a.coords + b.coords + c.coords);
        six_volume += det;
    }

    if six_volume.abs() < fph::EPSILON {
        bail!("Tried to compute center of mass for mesh enclosing no volume");
    }

    Ok(Position::from(weighted_sum / (six_volume * 4.0)))
}

/// Computes the volume enclosed by the surface given as consecutive vertex
/// triples forming triangles.
pub fn compute_mesh_volume(vertices: &[Position]) -> fph {
    let six_volume: fph = vertices
        .chunks_exact(3)
        .map(|triangle| {
            Matrix3::from_columns(&[
                triangle[0].coords,
                triangle[1].coords,
                triangle[2].coords,
            ])
            .determinant()
        })
        .sum();
    six_volume / 6.0
}
