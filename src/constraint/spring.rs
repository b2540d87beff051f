//! Spring constraint attracting a body towards its rest distance from a
//! world-space point.

use crate::{
    fph,
    quantities::Position,
    rigid_body::{RigidBodyID, RigidBodyManager},
};
use anyhow::{Result, anyhow};

/// A weak spring between a body and a world-space point. The bias is
/// quadratic in the deviation from the rest distance, scaled by a small
/// stiffness.
#[derive(Clone, Debug)]
pub struct SpringConstraint {
    body: RigidBodyID,
    point: Position,
    rest_length: fph,
    stiffness: fph,
}

impl SpringConstraint {
    pub(crate) fn new(
        body_id: RigidBodyID,
        point: Position,
        stiffness: fph,
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
            stiffness,
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

        let deviation = offset.norm() - self.rest_length;
        let bias = 0.5 * deviation * deviation;

        let effective_mass = 1.0 / body.inverse_mass();

        let lambda = -effective_mass * self.stiffness * bias;

        body.apply_linear_impulse(&(jacobian * lambda));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid_body::BodyDescriptor;
    use nalgebra::point;

    #[test]
    fn stretched_spring_pulls_towards_anchor() {
        let mut bodies = RigidBodyManager::new();
        let body_id = bodies
            .add_body(&BodyDescriptor {
                position: point![1.0, 0.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();

        let mut constraint =
            SpringConstraint::new(body_id, Position::origin(), 0.1, &mut bodies).unwrap();

        // Move the body outward so the spring is stretched
        bodies
            .rigid_body_mut(body_id)
            .set_position(point![2.0, 0.0, 0.0]);
        constraint.solve(&mut bodies);

        assert!(bodies.rigid_body(body_id).velocity().x < 0.0);
    }

    #[test]
    fn spring_at_rest_length_applies_no_impulse() {
        let mut bodies = RigidBodyManager::new();
        let body_id = bodies
            .add_body(&BodyDescriptor {
                position: point![1.0, 0.0, 0.0],
                ..BodyDescriptor::default()
            })
            .unwrap();

        let mut constraint =
            SpringConstraint::new(body_id, Position::origin(), 0.1, &mut bodies).unwrap();
        constraint.solve(&mut bodies);

        assert_eq!(bodies.rigid_body(body_id).velocity().x, 0.0);
    }
}
