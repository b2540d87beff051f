//! Contact (collision) constraints: normal impulse with restitution and
//! Baumgarte stabilisation, plus coupled two-axis friction.

use crate::{
    collision::contact::{Contact, ContactKind},
    constraint::{add_and_clamp_sum, add_and_clamp_sum_nonnegative, solver::ConstraintSolverConfig},
    fph,
    rigid_body::RigidBody,
};
use nalgebra::Vector2;

/// Re-applies a fraction of the accumulated impulses from the previous step
/// so that a resting stack starts the iteration near the solution it had
/// already reached. Only warm contacts that are still colliding qualify; the
/// warm flag is consumed so a second application is a no-op.
pub(crate) fn apply(
    contact: &mut Contact,
    body_a: &mut RigidBody,
    body_b: &mut RigidBody,
    config: &ConstraintSolverConfig,
) {
    if !contact.constraint.warm {
        return;
    }

    contact.update(body_a, body_b);
    if contact.kind != ContactKind::Colliding {
        contact.constraint.clear();
        return;
    }

    let r_a = contact.location - body_a.position();
    let r_b = contact.location - body_b.position();

    // Normal impulse
    contact.constraint.normal_impulse_sum *= config.warm_start_factor;
    let normal_sum = contact.constraint.normal_impulse_sum;

    let ra_cross_n = r_a.cross(&contact.normal);
    let rb_cross_n = r_b.cross(&contact.normal);

    let impulse = contact.normal * normal_sum;
    body_a.apply_linear_impulse(&impulse);
    body_b.apply_linear_impulse(&(-impulse));
    body_a.apply_angular_impulse(&(ra_cross_n * normal_sum));
    body_b.apply_angular_impulse(&(-rb_cross_n * normal_sum));

    // Friction
    contact.constraint.tangent_1_impulse_sum *= config.warm_start_factor;
    contact.constraint.tangent_2_impulse_sum *= config.warm_start_factor;
    let tangent_1_sum = contact.constraint.tangent_1_impulse_sum;
    let tangent_2_sum = contact.constraint.tangent_2_impulse_sum;

    let ra_cross_t1 = r_a.cross(&contact.tangent_1);
    let rb_cross_t1 = r_b.cross(&contact.tangent_1);
    let ra_cross_t2 = r_a.cross(&contact.tangent_2);
    let rb_cross_t2 = r_b.cross(&contact.tangent_2);

    let impulse = contact.tangent_1 * tangent_1_sum + contact.tangent_2 * tangent_2_sum;
    body_a.apply_linear_impulse(&impulse);
    body_b.apply_linear_impulse(&(-impulse));
    body_a.apply_angular_impulse(&(ra_cross_t1 * tangent_1_sum + ra_cross_t2 * tangent_2_sum));
    body_b.apply_angular_impulse(&(-rb_cross_t1 * tangent_1_sum - rb_cross_t2 * tangent_2_sum));

    contact.constraint.warm = false;
}

/// One solver iteration for the contact: drives the relative normal velocity
/// (plus bias) to zero and applies Coulomb friction bounded by the current
/// accumulated normal impulse.
pub(crate) fn solve(
    contact: &mut Contact,
    body_a: &mut RigidBody,
    body_b: &mut RigidBody,
    dt: fph,
    config: &ConstraintSolverConfig,
) {
    contact.update(body_a, body_b);
    if contact.kind != ContactKind::Colliding {
        return;
    }

    solve_normal(contact, body_a, body_b, dt, config);
    solve_tangents_coupled(contact, body_a, body_b);

    contact.constraint.warm = true;
}

fn solve_normal(
    contact: &mut Contact,
    body_a: &mut RigidBody,
    body_b: &mut RigidBody,
    dt: fph,
    config: &ConstraintSolverConfig,
) {
    let restitution = body_a
        .response()
        .combined_restitution_coef(body_b.response());

    let r_a = contact.location - body_a.position();
    let r_b = contact.location - body_b.position();
    let ra_cross_n = r_a.cross(&contact.normal);
    let rb_cross_n = r_b.cross(&contact.normal);

    // Restitution with a slop that removes energy near rest, plus Baumgarte
    // stabilisation pushing the bodies out of each other
    let mut bias = restitution * fph::min(contact.v_rel + config.restitution_slop, 0.0);
    bias -= config.baumgarte_factor
        * fph::max(contact.depth - config.penetration_slop, 0.0)
        / dt;

    let effective_mass_inverse_a = body_a.inverse_mass()
        + ra_cross_n.dot(&(body_a.inverse_world_inertia_tensor() * ra_cross_n));
    let effective_mass_inverse_b = body_b.inverse_mass()
        + rb_cross_n.dot(&(body_b.inverse_world_inertia_tensor() * rb_cross_n));
    let effective_mass = 1.0 / (effective_mass_inverse_a + effective_mass_inverse_b);

    let lambda = -effective_mass * (contact.v_rel + bias);

    // Clamp the accumulator, not the increment: the total normal impulse may
    // only push the bodies apart
    let applied = add_and_clamp_sum_nonnegative(&mut contact.constraint.normal_impulse_sum, lambda);

    let impulse = contact.normal * applied;
    body_a.apply_linear_impulse(&impulse);
    body_b.apply_linear_impulse(&(-impulse));
    body_a.apply_angular_impulse(&(ra_cross_n * applied));
    body_b.apply_angular_impulse(&(-rb_cross_n * applied));
}

fn solve_tangents_coupled(contact: &mut Contact, body_a: &mut RigidBody, body_b: &mut RigidBody) {
    let r_a = contact.location - body_a.position();
    let r_b = contact.location - body_b.position();

    let ra_cross_t1 = r_a.cross(&contact.tangent_1);
    let rb_cross_t1 = r_b.cross(&contact.tangent_1);
    let ra_cross_t2 = r_a.cross(&contact.tangent_2);
    let rb_cross_t2 = r_b.cross(&contact.tangent_2);

    let effective_mass_inverse = body_a.effective_mass_inverse_pair(
        &contact.tangent_1,
        &ra_cross_t1,
        &contact.tangent_2,
        &ra_cross_t2,
    ) + body_b.effective_mass_inverse_pair(
        &(-contact.tangent_1),
        &(-rb_cross_t1),
        &(-contact.tangent_2),
        &(-rb_cross_t2),
    );
    let Some(effective_mass) = effective_mass_inverse.try_inverse() else {
        return;
    };

    let relative_velocity = Vector2::new(
        body_a.velocity().dot(&contact.tangent_1) - body_b.velocity().dot(&contact.tangent_1)
            + body_a.angular_velocity().dot(&ra_cross_t1)
            - body_b.angular_velocity().dot(&rb_cross_t1),
        body_a.velocity().dot(&contact.tangent_2) - body_b.velocity().dot(&contact.tangent_2)
            + body_a.angular_velocity().dot(&ra_cross_t2)
            - body_b.angular_velocity().dot(&rb_cross_t2),
    );

    let lambda = -effective_mass * relative_velocity;

    // Coulomb's law bounds the friction impulse by the accumulated normal
    // impulse
    let bound = contact.constraint.normal_impulse_sum
        * body_a.response().combined_friction_coef(body_b.response());

    let applied_1 = add_and_clamp_sum(
        &mut contact.constraint.tangent_1_impulse_sum,
        lambda.x,
        -bound,
        bound,
    );
    let applied_2 = add_and_clamp_sum(
        &mut contact.constraint.tangent_2_impulse_sum,
        lambda.y,
        -bound,
        bound,
    );

    let impulse = contact.tangent_1 * applied_1 + contact.tangent_2 * applied_2;
    body_a.apply_linear_impulse(&impulse);
    body_b.apply_linear_impulse(&(-impulse));
    body_a.apply_angular_impulse(&(ra_cross_t1 * applied_1 + ra_cross_t2 * applied_2));
    body_b.apply_angular_impulse(&(-rb_cross_t1 * applied_1 - rb_cross_t2 * applied_2));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid_body::{BodyDescriptor, RigidBodyID};
    use crate::shape::ShapeDescriptor;
    use approx::assert_abs_diff_eq;
    use nalgebra::{point, vector};

    fn body_pair_in_contact() -> (RigidBody, RigidBody, Contact) {
        let mut body_a = RigidBody::from_descriptor(
            RigidBodyID(0),
            &BodyDescriptor {
                position: point![0.0, 0.495, 0.0],
                scale: nalgebra::Vector3::repeat(0.5),
                shape: ShapeDescriptor::Sphere,
                restitution_coef: 0.0,
                ..BodyDescriptor::default()
            },
        )
        .unwrap();
        let body_b = RigidBody::from_descriptor(
            RigidBodyID(1),
            &BodyDescriptor {
                position: point![0.0, -0.5, 0.0],
                mass: 0.0,
                ..BodyDescriptor::default()
            },
        )
        .unwrap();

        // Falling onto the static box
        body_a.set_velocity(vector![0.0, -1.0, 0.0]);

        let mut contact = Contact {
            location: point![0.0, -0.005, 0.0],
            location_b: point![0.0, 0.0, 0.0],
            depth: 0.005,
            ..Contact::default()
        };
        contact.set_normal(vector![0.0, 1.0, 0.0]);
        contact.update(&body_a, &body_b);

        (body_a, body_b, contact)
    }

    #[test]
    fn solving_contact_gives_nonnegative_normal_impulse_and_kills_approach() {
        let (mut body_a, mut body_b, mut contact) = body_pair_in_contact();
        let config = ConstraintSolverConfig::default();

        for _ in 0..4 {
            solve(&mut contact, &mut body_a, &mut body_b, 1.0 / 240.0, &config);
        }

        assert!(contact.normal_impulse() >= 0.0);
        assert!(body_a.velocity().y > -1e-6);
    }

    #[test]
    fn friction_impulse_magnitude_is_bounded_by_normal_impulse() {
        let (mut body_a, mut body_b, mut contact) = body_pair_in_contact();
        body_a.set_velocity(vector![2.0, -1.0, 0.0]);
        contact.update(&body_a, &body_b);
        let config = ConstraintSolverConfig::default();

        for _ in 0..8 {
            solve(&mut contact, &mut body_a, &mut body_b, 1.0 / 240.0, &config);
        }

        let bound = contact.normal_impulse()
            * body_a.response().combined_friction_coef(body_b.response());
        let (tangent_1, tangent_2) = contact.tangent_impulses();
        assert!(tangent_1.abs() <= bound + 1e-12);
        assert!(tangent_2.abs() <= bound + 1e-12);
    }

    #[test]
    fn warm_start_is_idempotent() {
        let (mut body_a, mut body_b, mut contact) = body_pair_in_contact();
        let config = ConstraintSolverConfig::default();

        solve(&mut contact, &mut body_a, &mut body_b, 1.0 / 240.0, &config);
        assert!(contact.constraint.warm);

        apply(&mut contact, &mut body_a, &mut body_b, &config);
        let momentum_after_first = *body_a.momentum();

        apply(&mut contact, &mut body_a, &mut body_b, &config);
        assert_abs_diff_eq!(body_a.momentum(), &momentum_after_first);
    }

    #[test]
    fn diverging_contact_is_left_alone() {
        let (mut body_a, mut body_b, mut contact) = body_pair_in_contact();
        body_a.set_velocity(vector![0.0, 5.0, 0.0]);
        let config = ConstraintSolverConfig::default();

        solve(&mut contact, &mut body_a, &mut body_b, 1.0 / 240.0, &config);

        assert_eq!(contact.normal_impulse(), 0.0);
        assert_abs_diff_eq!(body_a.velocity(), &vector![0.0, 5.0, 0.0]);
    }
}
