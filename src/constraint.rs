//! Constraints on rigid bodies and the sequential-impulse solver.

pub mod ball_joint;
pub mod contact;
pub mod distance;
pub mod hinge;
pub mod solver;
pub mod spring;
pub mod two_body_distance;

use crate::{
    fph,
    quantities::Position,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use anyhow::Result;
use ball_joint::BallJointConstraint;
use distance::{DistanceConstraint, SoftDistanceConstraint};
use hinge::HingeConstraint;
use nalgebra::{Vector3, vector};
use spring::SpringConstraint;
use two_body_distance::TwoBodyDistanceConstraint;

/// Describes a persistent constraint to be added to the simulation. Distances
/// and anchor points are resolved against the current body configurations at
/// registration time.
#[derive(Clone, Debug)]
pub enum ConstraintDescriptor {
    /// Keep a body at its current distance from a world-space point.
    Distance { body: RigidBodyID, point: Position },
    /// Keep the distance between two local anchor points on two bodies.
    TwoBodyDistance {
        body_a: RigidBodyID,
        body_b: RigidBodyID,
        anchor_a: Position,
        anchor_b: Position,
    },
    /// Pin two bodies together at a world-space point.
    BallJoint {
        body_a: RigidBodyID,
        body_b: RigidBodyID,
        point: Position,
    },
    /// Pin two bodies together at a world-space point and constrain their
    /// relative rotation to the given world-space axis.
    Hinge {
        body_a: RigidBodyID,
        body_b: RigidBodyID,
        axis: Vector3<fph>,
        point: Position,
    },
    /// Like `Distance`, softened by the given constraint force mixing term.
    SoftDistance {
        body: RigidBodyID,
        point: Position,
        cfm: fph,
    },
    /// Attract a body towards its rest distance from a world-space point.
    Spring {
        body: RigidBodyID,
        point: Position,
        stiffness: fph,
    },
}

/// A persistent user constraint, solved with sequential impulses alongside
/// the contact constraints.
#[derive(Clone, Debug)]
pub enum UserConstraint {
    Distance(DistanceConstraint),
    TwoBodyDistance(TwoBodyDistanceConstraint),
    BallJoint(BallJointConstraint),
    Hinge(HingeConstraint),
    SoftDistance(SoftDistanceConstraint),
    Spring(SpringConstraint),
}

impl UserConstraint {
    /// Builds the constraint described by the given descriptor, resolving
    /// rest lengths and local anchors against the current body state.
    /// Sleeping is disabled for the involved bodies.
    ///
    /// # Errors
    /// Returns an error if a referenced body does not exist.
    pub(crate) fn from_descriptor(
        descriptor: &ConstraintDescriptor,
        bodies: &mut RigidBodyManager,
    ) -> Result<Self> {
        match *descriptor {
            ConstraintDescriptor::Distance { body, point } => Ok(Self::Distance(
                DistanceConstraint::new(body, point, bodies)?,
            )),
            ConstraintDescriptor::TwoBodyDistance {
                body_a,
                body_b,
                anchor_a,
                anchor_b,
            } => Ok(Self::TwoBodyDistance(TwoBodyDistanceConstraint::new(
                body_a, body_b, anchor_a, anchor_b, bodies,
            )?)),
            ConstraintDescriptor::BallJoint {
                body_a,
                body_b,
                point,
            } => Ok(Self::BallJoint(BallJointConstraint::new(
                body_a, body_b, point, bodies,
            )?)),
            ConstraintDescriptor::Hinge {
                body_a,
                body_b,
                axis,
                point,
            } => Ok(Self::Hinge(HingeConstraint::new(
                body_a, body_b, axis, point, bodies,
            )?)),
            ConstraintDescriptor::SoftDistance { body, point, cfm } => Ok(Self::SoftDistance(
                SoftDistanceConstraint::new(body, point, cfm, bodies)?,
            )),
            ConstraintDescriptor::Spring {
                body,
                point,
                stiffness,
            } => Ok(Self::Spring(SpringConstraint::new(
                body, point, stiffness, bodies,
            )?)),
        }
    }

    /// Warm-start hook, ordered identically to [`Self::solve`]. The
    /// persistent constraints start each step cold; only contact constraints
    /// carry warm impulses.
    pub(crate) fn apply(&mut self, _dt: fph, _bodies: &mut RigidBodyManager) {}

    /// Computes and applies the impulses satisfying this constraint in
    /// isolation against the current body velocities.
    pub(crate) fn solve(&mut self, dt: fph, bodies: &mut RigidBodyManager) {
        match self {
            Self::Distance(constraint) => constraint.solve(bodies),
            Self::TwoBodyDistance(constraint) => constraint.solve(dt, bodies),
            Self::BallJoint(constraint) => constraint.solve(dt, bodies),
            Self::Hinge(constraint) => constraint.solve(dt, bodies),
            Self::SoftDistance(constraint) => constraint.solve(dt, bodies),
            Self::Spring(constraint) => constraint.solve(bodies),
        }
    }
}

/// Adds the given increment to the accumulated impulse, clamps the
/// accumulator to be non-negative, and returns the effectively applied
/// increment.
pub(crate) fn add_and_clamp_sum_nonnegative(sum: &mut fph, increment: fph) -> fph {
    let old_sum = *sum;
    *sum = (old_sum + increment).max(0.0);
    *sum - old_sum
}

/// Adds the given increment to the accumulated impulse, clamps the
/// accumulator to the given bounds, and returns the effectively applied
/// increment.
pub(crate) fn add_and_clamp_sum(sum: &mut fph, increment: fph, lower: fph, upper: fph) -> fph {
    let old_sum = *sum;
    *sum = (old_sum + increment).clamp(lower, upper);
    *sum - old_sum
}

/// Returns an arbitrary unit vector orthogonal to the given vector.
pub(crate) fn orthogonal_vector(vector: &Vector3<fph>) -> Vector3<fph> {
    let shifted = vector![vector.y, vector.z, vector.x];
    shifted.cross(vector).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn clamping_applies_to_the_accumulator_not_the_increment() {
        let mut sum = 0.0;
        let applied = add_and_clamp_sum_nonnegative(&mut sum, -2.0);
        assert_abs_diff_eq!(sum, 0.0);
        assert_abs_diff_eq!(applied, 0.0);

        let applied = add_and_clamp_sum_nonnegative(&mut sum, 3.0);
        assert_abs_diff_eq!(sum, 3.0);
        assert_abs_diff_eq!(applied, 3.0);

        // A large negative increment only undoes what was accumulated
        let applied = add_and_clamp_sum_nonnegative(&mut sum, -5.0);
        assert_abs_diff_eq!(sum, 0.0);
        assert_abs_diff_eq!(applied, -3.0);
    }

    #[test]
    fn bounded_clamping_respects_both_bounds() {
        let mut sum = 0.0;
        assert_abs_diff_eq!(add_and_clamp_sum(&mut sum, 2.0, -1.0, 1.0), 1.0);
        assert_abs_diff_eq!(sum, 1.0);
        assert_abs_diff_eq!(add_and_clamp_sum(&mut sum, -3.0, -1.0, 1.0), -2.0);
        assert_abs_diff_eq!(sum, -1.0);
    }

    #[test]
    fn orthogonal_vector_is_orthogonal_and_unit() {
        for vector in [
            vector![1.0, 0.0, 0.0],
            vector![0.0, 0.0, 1.0],
            vector![0.3, -0.8, 0.5],
        ] {
            let orthogonal = orthogonal_vector(&vector);
            assert_abs_diff_eq!(orthogonal.dot(&vector), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(orthogonal.norm(), 1.0, epsilon = 1e-12);
        }
    }
}
