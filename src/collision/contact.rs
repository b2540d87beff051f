//! Contact points between pairs of bodies.

use crate::{
    collision::epa::Penetration,
    fph,
    quantities::Position,
    rigid_body::RigidBody,
};
use nalgebra::{Vector3, vector};

/// Maximum relative normal velocity up to which a contact counts as
/// colliding.
pub const COLLISION_THRESHOLD: fph = 0.1;

/// Whether the bodies at a contact are approaching or separating.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ContactKind {
    #[default]
    Colliding,
    Diverging,
}

/// A point of contact between two bodies A and B.
#[derive(Clone, Debug)]
pub struct Contact {
    /// Contact normal, pointing so that a positive impulse along it pushes
    /// body A out of body B.
    pub normal: Vector3<fph>,
    /// World-space contact location on the surface of body A.
    pub location: Position,
    /// World-space contact location mirrored onto the surface of body B.
    pub location_b: Position,
    /// [`Self::location`] cached in body A's local frame.
    pub local_location: Position,
    /// [`Self::location_b`] cached in body B's local frame.
    pub local_location_b: Position,
    /// First tangent of the orthonormal contact basis.
    pub tangent_1: Vector3<fph>,
    /// Second tangent of the orthonormal contact basis.
    pub tangent_2: Vector3<fph>,
    /// Penetration depth along the normal.
    pub depth: fph,
    /// Relative velocity of the bodies along the normal.
    pub v_rel: fph,
    pub kind: ContactKind,
    pub(crate) constraint: ContactConstraintState,
}

/// Accumulated sequential-impulse state owned by a contact.
#[derive(Clone, Debug, Default)]
pub(crate) struct ContactConstraintState {
    pub normal_impulse_sum: fph,
    pub tangent_1_impulse_sum: fph,
    pub tangent_2_impulse_sum: fph,
    /// Whether accumulated impulses from the previous step are available for
    /// warm-starting.
    pub warm: bool,
}

impl ContactConstraintState {
    pub fn clear(&mut self) {
        self.normal_impulse_sum = 0.0;
        self.tangent_1_impulse_sum = 0.0;
        self.tangent_2_impulse_sum = 0.0;
        self.warm = false;
    }
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            normal: Vector3::zeros(),
            location: Position::origin(),
            location_b: Position::origin(),
            local_location: Position::origin(),
            local_location_b: Position::origin(),
            tangent_1: Vector3::zeros(),
            tangent_2: Vector3::zeros(),
            depth: 0.0,
            v_rel: 0.0,
            kind: ContactKind::default(),
            constraint: ContactConstraintState::default(),
        }
    }
}

impl Contact {
    /// Creates a contact between the given bodies from a penetration found by
    /// the narrow phase.
    pub(crate) fn from_penetration(
        body_a: &RigidBody,
        body_b: &RigidBody,
        penetration: &Penetration,
    ) -> Self {
        let location = Position::from(penetration.location);
        let location_b = location - penetration.normal * penetration.depth;

        let mut contact = Self {
            location,
            location_b,
            local_location: body_a.global_to_local(&location),
            local_location_b: body_b.global_to_local(&location_b),
            depth: penetration.depth,
            ..Self::default()
        };
        contact.set_normal(-penetration.normal);
        contact.update(body_a, body_b);
        contact
    }

    /// Sets the contact normal and derives the orthonormal tangent basis
    /// completing it.
    pub(crate) fn set_normal(&mut self, normal: Vector3<fph>) {
        self.normal = normal;
        let normal = normal.normalize();

        const INV_SQRT_THREE: fph = 0.57735;

        self.tangent_1 = if normal.x.abs() >= INV_SQRT_THREE {
            vector![normal.y, -normal.x, 0.0]
        } else {
            vector![0.0, normal.z, -normal.y]
        }
        .normalize();

        self.tangent_2 = normal.cross(&self.tangent_1);
    }

    /// Recomputes the relative normal velocity and the contact kind. Must be
    /// called whenever the velocity of one of the bodies has changed.
    pub(crate) fn update(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        let velocity_a = body_a.point_velocity(&self.location);
        let velocity_b = body_b.point_velocity(&self.location);

        self.v_rel = self.normal.dot(&(velocity_a - velocity_b));

        // This threshold keeps barely-separating contacts in the solver,
        // which stabilises resting stacks considerably
        self.kind = if self.v_rel > COLLISION_THRESHOLD {
            ContactKind::Diverging
        } else {
            ContactKind::Colliding
        };
    }

    /// The accumulated normal impulse applied through this contact during the
    /// current step.
    pub fn normal_impulse(&self) -> fph {
        self.constraint.normal_impulse_sum
    }

    /// The accumulated tangential impulses applied through this contact
    /// during the current step.
    pub fn tangent_impulses(&self) -> (fph, fph) {
        (
            self.constraint.tangent_1_impulse_sum,
            self.constraint.tangent_2_impulse_sum,
        )
    }
}
