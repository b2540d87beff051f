//! Physical quantities.

use crate::fph;
use nalgebra::{Matrix3, Point3, Quaternion, Unit, UnitQuaternion, Vector3};

/// A unit vector in 3D space.
pub type Direction = Unit<Vector3<fph>>;

/// A position in 3D space.
pub type Position = Point3<fph>;

/// A velocity in 3D space.
pub type Velocity = Vector3<fph>;

/// An angular velocity in 3D space.
pub type AngularVelocity = Vector3<fph>;

/// An orientation in 3D space.
pub type Orientation = UnitQuaternion<fph>;

/// A momentum in 3D space.
pub type Momentum = Vector3<fph>;

/// An angular momentum in 3D space.
pub type AngularMomentum = Vector3<fph>;

/// A 3D force.
pub type Force = Vector3<fph>;

/// A 3D torque.
pub type Torque = Vector3<fph>;

/// Computes the quaternion representing the instantaneous time derivative of
/// the given [`Orientation`] for a body with the given angular velocity.
pub fn compute_orientation_derivative(
    orientation: &Orientation,
    angular_velocity: &AngularVelocity,
) -> Quaternion<fph> {
    Quaternion::from_imag(0.5 * angular_velocity) * orientation.as_ref()
}

/// Evolves the given [`Orientation`] with the given angular velocity for the
/// given duration and renormalises it.
pub fn advance_orientation(
    orientation: &Orientation,
    angular_velocity: &AngularVelocity,
    duration: fph,
) -> Orientation {
    UnitQuaternion::new_normalize(
        orientation.as_ref()
            + compute_orientation_derivative(orientation, &(angular_velocity * duration)),
    )
}

/// Computes the velocity corresponding to the given momentum and inverse mass.
pub fn compute_velocity(momentum: &Momentum, inverse_mass: fph) -> Velocity {
    momentum * inverse_mass
}

/// Computes the angular velocity corresponding to the given angular momentum
/// and world-space inverse inertia tensor.
pub fn compute_angular_velocity(
    inverse_world_inertia_tensor: &Matrix3<fph>,
    angular_momentum: &AngularMomentum,
) -> AngularVelocity {
    inverse_world_inertia_tensor * angular_momentum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::vector;

    #[test]
    fn advancing_orientation_with_zero_angular_velocity_gives_same_orientation() {
        let orientation = Orientation::from_axis_angle(&Vector3::y_axis(), 0.3);
        let advanced = advance_orientation(&orientation, &Vector3::zeros(), 1.2);
        assert_abs_diff_eq!(advanced, orientation);
    }

    #[test]
    fn advancing_orientation_by_zero_duration_gives_same_orientation() {
        let orientation = Orientation::from_axis_angle(&Vector3::x_axis(), 0.7);
        let advanced = advance_orientation(&orientation, &vector![0.0, 1.2, 0.0], 0.0);
        assert_abs_diff_eq!(advanced, orientation);
    }

    #[test]
    fn advancing_orientation_stays_normalized() {
        let orientation = Orientation::identity();
        let mut advanced = orientation;
        for _ in 0..100 {
            advanced = advance_orientation(&advanced, &vector![0.4, -0.2, 0.9], 1.0 / 120.0);
        }
        assert_abs_diff_eq!(advanced.norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn small_rotation_approximates_axis_angle_rotation() {
        let angular_speed = 0.1;
        let duration = 1e-4;
        let orientation = Orientation::identity();
        let advanced =
            advance_orientation(&orientation, &(Vector3::y() * angular_speed), duration);
        let exact = Orientation::from_axis_angle(&Vector3::y_axis(), angular_speed * duration);
        assert_abs_diff_eq!(advanced, exact, epsilon = 1e-10);
    }

    #[test]
    fn velocity_is_momentum_times_inverse_mass() {
        let momentum = vector![2.0, -4.0, 6.0];
        assert_abs_diff_eq!(
            compute_velocity(&momentum, 0.5),
            vector![1.0, -2.0, 3.0]
        );
    }
}
