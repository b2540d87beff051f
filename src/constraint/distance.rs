//! Constraints keeping a body at a fixed distance from a world-space point.

use crate::{
    fph,
    quantities::Position,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use anyhow::{Result, anyhow};

/// Keeps `‖x − p‖` at the distance the body had from the point when the
/// constraint was registered.
#[derive(Clone, Debug)]
pub struct DistanceConstraint {
    body: RigidBodyID,
    point: Position,
    rest_length: fph,
}

impl DistanceConstraint {
    pub(crate) fn new(
        body_id: RigidBodyID,
        point: Position,
        bodies: &mut RigidBodyManager,
    ) -> Result<Self> {
        let body = bodies
            .get_rigid_body_mut(body_id)
            .ok_or_else(|| anyhow!("No rigid body with ID {body_id:?}"))?;
        body.set_sleeping_enabled(false);
        let rest_length = (body.position() - point).norm();
        Ok(Self {
            body: body_id,
            point,
            rest_length,
        })
    }

    pub(crate) fn solve(&mut self, bodies: &mut RigidBodyManager) {
        let Some(body) = bodies.get_rigid_body_mut(self.body) else {
            return;
        };
        if body.is_static() {
            return;
        }

        let offset = body.position() - self.point;
        let jacobian = offset.normalize();

        // The positional error keeps the distance from drifting
        let bias = offset.norm() - self.rest_length;

        let effective_mass = 1.0 / body.inverse_mass();

        let delta_v = body.velocity().dot(&jacobian) + bias;
        let lambda = -effective_mass * delta_v;

        body.apply_linear_impulse(&(jacobian * lambda));
    }
}

/// A [`DistanceConstraint`] softened by a constraint force mixing term on the
/// effective-mass diagonal.
#[derive(Clone, Debug)]
pub struct SoftDistanceConstraint {
    body: RigidBodyID,
    point: Position,
    rest_length: fph,
    cfm: fph,
}

impl SoftDistanceConstraint {
    pub(crate) fn new(
        body_id: RigidBodyID,
        point: Position,
        cfm: fph,
        bodies: &mut RigidBodyManager,
    ) -> Result<Self> {
        let body = bodies
            .get_rigid_body_mut(body_id)
            .ok_or_else(|| anyhow!("No rigid body with ID {body_id:?}"))?;
        body.set_sleeping_enabled(false);
        let rest_length = (body.position() - point).norm();
        Ok(Self {
            body: body_id,
            point,
            rest_length,
            cfm,
        })
    }

    pub(crate) fn solve(&mut self, dt: fph, bodies: &mut RigidBodyManager) {
        let Some(body) = bodies.get_rigid_body_mut(self.body) else {
            return;
        };
        if body.is_static() {
            return;
        }

        let offset = body.position() - self.point;
        let jacobian = offset.normalize();

        let bias = offset.norm() - self.rest_length;

        let effective_mass = 1.0 / (body.inverse_mass() + self.cfm / dt);

        let delta_v = body.velocity().dot(&jacobian) + bias;
        let lambda = -effective_mass * delta_v;

        body.apply_linear_impulse(&(jacobian * lambda));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid_body::BodyDescriptor;
    use approx::assert_abs_diff_eq;
    use nalgebra::{point, vector};

    #[test]
    fn registration_stores_current_distance_and_disables_sleeping() {
        let mut bodies = RigidBodyManager::new();
        let body_id = bodies
            .add_body(&BodyDescriptor {
                position: point![1.0, 2.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();

        let constraint =
            DistanceConstraint::new(body_id, point![0.0, 2.0, 0.0], &mut bodies).unwrap();
        assert_abs_diff_eq!(constraint.rest_length, 1.0);
        assert!(!bodies.rigid_body(body_id).sleeping_enabled());
    }

    #[test]
    fn registration_fails_for_missing_body() {
        let mut bodies = RigidBodyManager::new();
        assert!(DistanceConstraint::new(RigidBodyID(3), Position::origin(), &mut bodies).is_err());
    }

    #[test]
    fn solving_counteracts_outward_velocity() {
        let mut bodies = RigidBodyManager::new();
        let body_id = bodies
            .add_body(&BodyDescriptor {
                position: point![1.0, 0.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();
        bodies
            .rigid_body_mut(body_id)
            .set_velocity(vector![1.0, 0.0, 0.0]);

        let mut constraint =
            DistanceConstraint::new(body_id, Position::origin(), &mut bodies).unwrap();
        constraint.solve(&mut bodies);

        // The radial velocity component is cancelled
        assert_abs_diff_eq!(bodies.rigid_body(body_id).velocity().x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn soft_constraint_applies_smaller_impulse() {
        let mut bodies = RigidBodyManager::new();
        let body_id = bodies
            .add_body(&BodyDescriptor {
                position: point![1.0, 0.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();
        bodies
            .rigid_body_mut(body_id)
            .set_velocity(vector![1.0, 0.0, 0.0]);

        let mut constraint =
            SoftDistanceConstraint::new(body_id, Position::origin(), 0.5, &mut bodies).unwrap();
        constraint.solve(1.0 / 60.0, &mut bodies);

        let remaining = bodies.rigid_body(body_id).velocity().x;
        assert!(remaining > 0.0 && remaining < 1.0);
    }
}
