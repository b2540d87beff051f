//! Rigid body simulation.

use crate::{
    collision::gjk::MinkowskiPoint,
    fph,
    material::ContactResponseParameters,
    quantities::{
        self, AngularMomentum, AngularVelocity, Force, Momentum, Orientation, Position, Torque,
        Velocity,
    },
    shape::{ConvexShape, ShapeDescriptor},
};
use anyhow::{Result, bail};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix2, Matrix3, Matrix4, Vector3};
use tumble_containers::{KeyIndexMapper, NoHashSet};
use tumble_geometry::AxisAlignedBox;

/// Threshold on the motion average and momenta below which a body may fall
/// asleep.
pub const SLEEP_THRESHOLD: fph = 0.1;

/// Window parameter of the rolling motion average, per unit of step duration.
const CHANGE_AVERAGE_N: fph = 10.0 / 120.0;

/// Damping applied to the linear momentum when a body falls asleep.
const SLEEP_LINEAR_DAMPING: fph = 0.7;

/// Damping applied to the angular momentum when a body falls asleep.
const SLEEP_ANGULAR_DAMPING: fph = 0.4;

/// Initial motion average, high enough that fresh bodies cannot sleep
/// immediately.
const INITIAL_CHANGE_AVERAGE: fph = 1000.0;

/// Motion average assigned when a body must re-prove quiescence.
const REVALIDATION_CHANGE_AVERAGE: fph = 0.2;

/// Identifier for a [`RigidBody`] in a [`RigidBodyManager`]. IDs are assigned
/// monotonically and define the canonical ordering of body pairs.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Zeroable, Pod)]
pub struct RigidBodyID(pub(crate) u32);

impl nohash_hasher::IsEnabled for RigidBodyID {}

bitflags! {
    #[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
    struct BodyFlags: u8 {
        /// The body has infinite mass and never moves.
        const STATIC = 1 << 0;
        /// The body is allowed to fall asleep.
        const SLEEPING_ENABLED = 1 << 1;
        /// The body is currently asleep.
        const SLEEPING = 1 << 2;
        /// The body belongs to an inactive set and is skipped entirely.
        const INACTIVE = 1 << 3;
        /// The body must stay awake for at least one step.
        const FORCE_WAKEUP = 1 << 4;
        /// The body rests (directly or transitively) on static geometry.
        const GROUNDED = 1 << 5;
    }
}

/// Describes a rigid body to be added to the simulation.
#[derive(Clone, Debug)]
pub struct BodyDescriptor {
    pub position: Position,
    pub orientation: Orientation,
    /// Per-axis scale applied to the shape.
    pub scale: Vector3<fph>,
    /// Mass of the body. Zero makes the body static.
    pub mass: fph,
    /// Friction coefficient in `[0, 1]`.
    pub friction_coef: fph,
    /// Restitution coefficient in `[0, 1]`.
    pub restitution_coef: fph,
    pub shape: ShapeDescriptor,
}

impl Default for BodyDescriptor {
    fn default() -> Self {
        let response = ContactResponseParameters::default();
        Self {
            position: Position::origin(),
            orientation: Orientation::identity(),
            scale: Vector3::repeat(1.0),
            mass: 1.0,
            friction_coef: response.friction_coef,
            restitution_coef: response.restitution_coef,
            shape: ShapeDescriptor::Box,
        }
    }
}

/// A rigid body whose motion is affected by the force and torque it
/// experiences as well as its inertial properties.
///
/// The body stores its linear and angular momentum rather than its linear and
/// angular velocity, since these are the conserved quantities in free motion.
/// The velocities are derived state and are recomputed whenever a momentum
/// changes.
#[derive(Clone, Debug)]
pub struct RigidBody {
    id: RigidBodyID,
    shape: ConvexShape,
    inverse_mass: fph,
    inertia_tensor_body: Matrix3<fph>,
    inverse_inertia_body: Matrix3<fph>,
    inverse_inertia_world: Matrix3<fph>,
    scale: Vector3<fph>,
    position: Position,
    orientation: Orientation,
    momentum: Momentum,
    angular_momentum: AngularMomentum,
    velocity: Velocity,
    angular_velocity: AngularVelocity,
    force: Force,
    torque: Torque,
    response: ContactResponseParameters,
    flags: BodyFlags,
    change_average: fph,
    inactive_set_id: u32,
    contact_partners: NoHashSet<RigidBodyID>,
    model_matrix: Matrix4<fph>,
    aabb: AxisAlignedBox,
}

impl RigidBody {
    /// Creates a new rigid body with the given ID from the given descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor is invalid: negative or non-finite
    /// mass, friction or restitution outside `[0, 1]`, non-positive scale, or
    /// a shape for which no valid inertia tensor can be computed.
    pub fn from_descriptor(id: RigidBodyID, descriptor: &BodyDescriptor) -> Result<Self> {
        if !descriptor.mass.is_finite() || descriptor.mass < 0.0 {
            bail!("Invalid body mass: {}", descriptor.mass);
        }
        if !(0.0..=1.0).contains(&descriptor.friction_coef) {
            bail!("Friction must lie in [0, 1], got {}", descriptor.friction_coef);
        }
        if !(0.0..=1.0).contains(&descriptor.restitution_coef) {
            bail!(
                "Restitution must lie in [0, 1], got {}",
                descriptor.restitution_coef
            );
        }
        if !descriptor
            .scale
            .iter()
            .all(|component| component.is_finite() && *component > 0.0)
        {
            bail!("Scale components must be positive, got {}", descriptor.scale);
        }

        let shape = descriptor.shape.build()?;
        let is_static = descriptor.mass == 0.0;

        let (inverse_mass, inertia_tensor_body, inverse_inertia_body, flags) = if is_static {
            (
                0.0,
                Matrix3::zeros(),
                Matrix3::zeros(),
                BodyFlags::STATIC | BodyFlags::SLEEPING | BodyFlags::SLEEPING_ENABLED,
            )
        } else {
            let inertia_tensor = shape.inertia_tensor(descriptor.mass, &descriptor.scale)?;
            (
                descriptor.mass.recip(),
                *inertia_tensor.matrix(),
                *inertia_tensor.inverse_matrix(),
                BodyFlags::SLEEPING_ENABLED,
            )
        };

        let mut body = Self {
            id,
            shape,
            inverse_mass,
            inertia_tensor_body,
            inverse_inertia_body,
            inverse_inertia_world: Matrix3::zeros(),
            scale: descriptor.scale,
            position: descriptor.position,
            orientation: descriptor.orientation,
            momentum: Momentum::zeros(),
            angular_momentum: AngularMomentum::zeros(),
            velocity: Velocity::zeros(),
            angular_velocity: AngularVelocity::zeros(),
            force: Force::zeros(),
            torque: Torque::zeros(),
            response: ContactResponseParameters::new(
                descriptor.friction_coef,
                descriptor.restitution_coef,
            ),
            flags,
            change_average: INITIAL_CHANGE_AVERAGE,
            inactive_set_id: 0,
            contact_partners: NoHashSet::default(),
            model_matrix: Matrix4::identity(),
            aabb: shape_placeholder_aabb(),
        };
        body.update_derived_state();
        Ok(body)
    }

    /// Returns the ID of the body.
    pub fn id(&self) -> RigidBodyID {
        self.id
    }

    /// Returns the collision shape of the body.
    pub fn shape(&self) -> &ConvexShape {
        &self.shape
    }

    /// Whether the body is static (has infinite mass).
    pub fn is_static(&self) -> bool {
        self.flags.contains(BodyFlags::STATIC)
    }

    /// Whether the body is currently asleep.
    pub fn is_sleeping(&self) -> bool {
        self.flags.contains(BodyFlags::SLEEPING)
    }

    /// Whether the body belongs to an inactive set.
    pub fn is_inactive(&self) -> bool {
        self.flags.contains(BodyFlags::INACTIVE)
    }

    /// Whether the body is allowed to fall asleep.
    pub fn sleeping_enabled(&self) -> bool {
        self.flags.contains(BodyFlags::SLEEPING_ENABLED)
    }

    /// Sets whether the body is allowed to fall asleep. Bodies involved in
    /// persistent constraints have sleeping disabled.
    pub fn set_sleeping_enabled(&mut self, enabled: bool) {
        self.flags.set(BodyFlags::SLEEPING_ENABLED, enabled);
    }

    /// Keeps the body awake for at least one step so that the sleeping
    /// criteria have to be satisfied again before it can fall back asleep.
    pub fn revalidate_sleeping(&mut self) {
        if !self.is_static() {
            self.flags.insert(BodyFlags::FORCE_WAKEUP);
            self.change_average = REVALIDATION_CHANGE_AVERAGE;
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    pub fn scale(&self) -> &Vector3<fph> {
        &self.scale
    }

    pub fn momentum(&self) -> &Momentum {
        &self.momentum
    }

    pub fn angular_momentum(&self) -> &AngularMomentum {
        &self.angular_momentum
    }

    pub fn velocity(&self) -> &Velocity {
        &self.velocity
    }

    pub fn angular_velocity(&self) -> &AngularVelocity {
        &self.angular_velocity
    }

    /// Returns the inverse of the body's mass (zero for static bodies).
    pub fn inverse_mass(&self) -> fph {
        self.inverse_mass
    }

    /// Returns the inverse of the body's inertia tensor in world space.
    pub fn inverse_world_inertia_tensor(&self) -> &Matrix3<fph> {
        &self.inverse_inertia_world
    }

    /// Returns the contact response parameters of the body.
    pub fn response(&self) -> &ContactResponseParameters {
        &self.response
    }

    /// Returns the world-space axis-aligned bounding box of the body.
    pub fn aabb(&self) -> &AxisAlignedBox {
        &self.aabb
    }

    /// Sets the given position for the body and refreshes the derived
    /// geometric state.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
        self.rebuild_model_matrix_and_aabb();
    }

    /// Sets the given orientation for the body and refreshes the derived
    /// geometric state.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.inverse_inertia_world =
            rotated_matrix(&self.inverse_inertia_body, &self.orientation);
        self.rebuild_model_matrix_and_aabb();
    }

    /// Sets the given per-axis scale for the body, recomputing the inertia
    /// tensor and the derived geometric state.
    ///
    /// # Errors
    /// Returns an error if no valid inertia tensor can be computed for the
    /// new scale.
    pub fn set_scale(&mut self, scale: Vector3<fph>) -> Result<()> {
        self.scale = scale;
        if !self.is_static() {
            let inertia_tensor = self
                .shape
                .inertia_tensor(self.inverse_mass.recip(), &self.scale)?;
            self.inertia_tensor_body = *inertia_tensor.matrix();
            self.inverse_inertia_body = *inertia_tensor.inverse_matrix();
        }
        self.update_derived_state();
        Ok(())
    }

    /// Sets the given velocity for the body, recomputing its momentum.
    pub fn set_velocity(&mut self, velocity: Velocity) {
        if self.is_static() {
            return;
        }
        self.momentum = velocity / self.inverse_mass;
        self.velocity = velocity;
    }

    /// Sets the given angular velocity for the body, recomputing its angular
    /// momentum.
    pub fn set_angular_velocity(&mut self, angular_velocity: AngularVelocity) {
        if self.is_static() {
            return;
        }
        self.angular_momentum =
            rotated_matrix(&self.inertia_tensor_body, &self.orientation) * angular_velocity;
        self.angular_velocity = angular_velocity;
    }

    /// Adds the given linear impulse to the body's momentum and re-derives
    /// the velocity. Does nothing for static bodies.
    pub fn apply_linear_impulse(&mut self, impulse: &Momentum) {
        if self.is_static() {
            return;
        }
        self.momentum += impulse;
        self.velocity = quantities::compute_velocity(&self.momentum, self.inverse_mass);
    }

    /// Adds the given angular impulse to the body's angular momentum and
    /// re-derives the angular velocity. Does nothing for static bodies.
    pub fn apply_angular_impulse(&mut self, impulse: &AngularMomentum) {
        if self.is_static() {
            return;
        }
        self.angular_momentum += impulse;
        self.angular_velocity = quantities::compute_angular_velocity(
            &self.inverse_inertia_world,
            &self.angular_momentum,
        );
    }

    /// Applies the given force at the body's center of mass.
    pub fn apply_force_at_center_of_mass(&mut self, force: &Force) {
        self.force += force;
    }

    /// Applies the given force at the given world-space position. This may
    /// result in a torque around the center of mass.
    pub fn apply_force(&mut self, force: &Force, force_position: &Position) {
        self.apply_force_at_center_of_mass(force);
        self.apply_torque(&(force_position - self.position).cross(force));
    }

    /// Applies the given torque around the body's center of mass.
    pub fn apply_torque(&mut self, torque: &Torque) {
        self.torque += torque;
    }

    /// Returns the current total force on the body.
    pub fn force(&self) -> &Force {
        &self.force
    }

    /// Returns the current total torque on the body around the center of
    /// mass.
    pub fn torque(&self) -> &Torque {
        &self.torque
    }

    /// Overwrites the accumulated force with the given value and clears the
    /// accumulated torque.
    pub(crate) fn reset_force_and_torque(&mut self, force: Force) {
        self.force = force;
        self.torque = Torque::zeros();
    }

    /// Advances the body state by one substep of the given duration using
    /// semi-implicit Euler integration, handling the sleeping state
    /// transitions along the way.
    pub fn integrate(&mut self, dt: fph) {
        if self.is_static() || self.is_inactive() {
            return;
        }

        let force_wakeup = self.flags.contains(BodyFlags::FORCE_WAKEUP);

        if self.sleeping_enabled() && !force_wakeup {
            if self.change_average < SLEEP_THRESHOLD
                && self.momentum.norm() < SLEEP_THRESHOLD
                && self.angular_momentum.norm() < SLEEP_THRESHOLD
            {
                self.flags.insert(BodyFlags::SLEEPING);

                // Artificial damping increases stability
                self.momentum *= SLEEP_LINEAR_DAMPING;
                self.angular_momentum *= SLEEP_ANGULAR_DAMPING;
                self.velocity = quantities::compute_velocity(&self.momentum, self.inverse_mass);
                self.angular_velocity = quantities::compute_angular_velocity(
                    &self.inverse_inertia_world,
                    &self.angular_momentum,
                );
            } else if self.is_sleeping() {
                self.flags.remove(BodyFlags::SLEEPING);
            }
        }

        if !self.is_sleeping() || force_wakeup {
            self.momentum += dt * self.force;
            self.angular_momentum += dt * self.torque;
            self.velocity = quantities::compute_velocity(&self.momentum, self.inverse_mass);
            self.angular_velocity = quantities::compute_angular_velocity(
                &self.inverse_inertia_world,
                &self.angular_momentum,
            );

            self.position += dt * self.velocity;
            self.orientation =
                quantities::advance_orientation(&self.orientation, &self.angular_velocity, dt);
            self.inverse_inertia_world =
                rotated_matrix(&self.inverse_inertia_body, &self.orientation);

            self.rebuild_model_matrix_and_aabb();
        }

        let window = CHANGE_AVERAGE_N / dt;
        self.change_average = (window * self.change_average
            + self.velocity.norm()
            + self.angular_velocity.norm())
            / (window + 1.0);
        self.flags.remove(BodyFlags::FORCE_WAKEUP);
    }

    /// Returns the model matrix mapping the body's local space (including
    /// scale) to world space.
    pub fn model_matrix(&self) -> &Matrix4<fph> {
        &self.model_matrix
    }

    /// Transforms the given point from the body's local space to world space.
    pub fn local_to_global(&self, point: &Position) -> Position {
        self.model_matrix.transform_point(point)
    }

    /// Transforms the given point from world space to the body's local space.
    pub fn global_to_local(&self, point: &Position) -> Position {
        let rotated = self
            .orientation
            .inverse_transform_vector(&(point - self.position));
        Position::from(rotated.component_div(&self.scale))
    }

    /// Computes the velocity of the given world-space point when considered
    /// fixed to the body.
    pub fn point_velocity(&self, point: &Position) -> Velocity {
        self.velocity + self.angular_velocity.cross(&(point - self.position))
    }

    /// Returns the world-space point of the body's shape maximising the dot
    /// product with the given world-space direction.
    pub fn support(&self, direction: &Vector3<fph>) -> Position {
        let local_direction = self.orientation.inverse_transform_vector(direction);
        self.local_to_global(&self.shape.support(&local_direction))
    }

    /// Computes the Minkowski-difference support point of this body and the
    /// given body for the given direction, keeping this body's support as the
    /// witness.
    pub fn minkowski_support(&self, direction: &Vector3<fph>, other: &Self) -> MinkowskiPoint {
        let support_a = self.support(direction);
        let support_b = other.support(&-direction);
        MinkowskiPoint {
            point: support_a - support_b,
            witness: support_a.coords,
        }
    }

    /// Computes `1/m·J₁·J₁ + J₂·I⁻¹·J₂` for the given Jacobian blocks.
    pub(crate) fn effective_mass_inverse(
        &self,
        j_linear: &Vector3<fph>,
        j_angular: &Vector3<fph>,
    ) -> fph {
        self.inverse_mass * j_linear.dot(j_linear)
            + j_angular.dot(&(self.inverse_inertia_world * j_angular))
    }

    /// Computes the coupled 2×2 effective-mass inverse for two Jacobian rows.
    pub(crate) fn effective_mass_inverse_pair(
        &self,
        j1_linear: &Vector3<fph>,
        j1_angular: &Vector3<fph>,
        j2_linear: &Vector3<fph>,
        j2_angular: &Vector3<fph>,
    ) -> Matrix2<fph> {
        let m11 = self.effective_mass_inverse(j1_linear, j1_angular);
        let m22 = self.effective_mass_inverse(j2_linear, j2_angular);
        let m12 = self.inverse_mass * j1_linear.dot(j2_linear)
            + j1_angular.dot(&(self.inverse_inertia_world * j2_angular));
        Matrix2::new(m11, m12, m12, m22)
    }

    /// Computes `1/m·J₁·J₁ᵀ + J₂·I⁻¹·J₂ᵀ` for the given 3×3 Jacobian blocks.
    pub(crate) fn effective_mass_inverse_blocks(
        &self,
        j_linear: &Matrix3<fph>,
        j_angular: &Matrix3<fph>,
    ) -> Matrix3<fph> {
        self.inverse_mass * j_linear * j_linear.transpose()
            + j_angular * self.inverse_inertia_world * j_angular.transpose()
    }

    pub(crate) fn is_grounded(&self) -> bool {
        self.flags.contains(BodyFlags::GROUNDED)
    }

    pub(crate) fn set_grounded(&mut self, grounded: bool) {
        self.flags.set(BodyFlags::GROUNDED, grounded);
    }

    pub(crate) fn set_sleeping(&mut self, sleeping: bool) {
        self.flags.set(BodyFlags::SLEEPING, sleeping);
    }

    pub(crate) fn set_inactive(&mut self, inactive: bool) {
        self.flags.set(BodyFlags::INACTIVE, inactive);
    }

    pub(crate) fn inactive_set_id(&self) -> u32 {
        self.inactive_set_id
    }

    pub(crate) fn set_inactive_set_id(&mut self, set_id: u32) {
        self.inactive_set_id = set_id;
    }

    pub(crate) fn set_change_average(&mut self, change_average: fph) {
        self.change_average = change_average;
    }

    pub(crate) fn contact_partners(&self) -> &NoHashSet<RigidBodyID> {
        &self.contact_partners
    }

    pub(crate) fn add_contact_partner(&mut self, partner: RigidBodyID) {
        self.contact_partners.insert(partner);
    }

    pub(crate) fn remove_contact_partner(&mut self, partner: RigidBodyID) {
        self.contact_partners.remove(&partner);
    }

    fn update_derived_state(&mut self) {
        self.velocity = quantities::compute_velocity(&self.momentum, self.inverse_mass);
        self.inverse_inertia_world =
            rotated_matrix(&self.inverse_inertia_body, &self.orientation);
        self.angular_velocity = quantities::compute_angular_velocity(
            &self.inverse_inertia_world,
            &self.angular_momentum,
        );
        self.rebuild_model_matrix_and_aabb();
    }

    fn rebuild_model_matrix_and_aabb(&mut self) {
        self.model_matrix = Matrix4::new_translation(&self.position.coords)
            * self.orientation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale);
        self.aabb = self.shape.aabb().transformed(&self.model_matrix);
    }
}

fn rotated_matrix(matrix: &Matrix3<fph>, orientation: &Orientation) -> Matrix3<fph> {
    let rotation = orientation.to_rotation_matrix();
    rotation * matrix * rotation.transpose()
}

fn shape_placeholder_aabb() -> AxisAlignedBox {
    AxisAlignedBox::new(Position::origin(), Position::origin())
}

/// Manages and operates on the rigid bodies of a simulation.
#[derive(Clone, Debug)]
pub struct RigidBodyManager {
    bodies: Vec<RigidBody>,
    body_indices_by_id: KeyIndexMapper<RigidBodyID>,
    body_id_counter: u32,
}

impl RigidBodyManager {
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            body_indices_by_id: KeyIndexMapper::new(),
            body_id_counter: 0,
        }
    }

    /// Creates a rigid body from the given descriptor and adds it to the
    /// manager.
    ///
    /// # Returns
    /// A new [`RigidBodyID`] referring to the added body.
    ///
    /// # Errors
    /// Returns an error if the descriptor is invalid.
    pub fn add_body(&mut self, descriptor: &BodyDescriptor) -> Result<RigidBodyID> {
        let id = self.create_new_body_id();
        let body = RigidBody::from_descriptor(id, descriptor)?;
        self.bodies.push(body);
        self.body_indices_by_id.push_key(id);
        Ok(id)
    }

    /// Returns a reference to the [`RigidBody`] with the given ID, or
    /// [`None`] if it does not exist.
    pub fn get_rigid_body(&self, id: RigidBodyID) -> Option<&RigidBody> {
        let idx = self.body_indices_by_id.get(id)?;
        Some(&self.bodies[idx])
    }

    /// Returns a mutable reference to the [`RigidBody`] with the given ID, or
    /// [`None`] if it does not exist.
    pub fn get_rigid_body_mut(&mut self, id: RigidBodyID) -> Option<&mut RigidBody> {
        let idx = self.body_indices_by_id.get(id)?;
        Some(&mut self.bodies[idx])
    }

    /// Returns a reference to the [`RigidBody`] with the given ID.
    ///
    /// # Panics
    /// If no body with the given ID exists.
    pub fn rigid_body(&self, id: RigidBodyID) -> &RigidBody {
        self.get_rigid_body(id).expect("Requested missing rigid body")
    }

    /// Returns a mutable reference to the [`RigidBody`] with the given ID.
    ///
    /// # Panics
    /// If no body with the given ID exists.
    pub fn rigid_body_mut(&mut self, id: RigidBodyID) -> &mut RigidBody {
        self.get_rigid_body_mut(id)
            .expect("Requested missing rigid body")
    }

    /// Returns mutable references to the two rigid bodies with the given IDs,
    /// or [`None`] if either of them does not exist.
    ///
    /// # Panics
    /// If the two IDs are equal.
    pub fn get_two_rigid_bodies_mut(
        &mut self,
        id_1: RigidBodyID,
        id_2: RigidBodyID,
    ) -> Option<[&mut RigidBody; 2]> {
        assert_ne!(id_1, id_2);
        let idx_1 = self.body_indices_by_id.get(id_1)?;
        let idx_2 = self.body_indices_by_id.get(id_2)?;
        self.bodies.get_disjoint_mut([idx_1, idx_2]).ok()
    }

    /// Returns the slice of all rigid bodies.
    pub fn rigid_bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Returns the mutable slice of all rigid bodies.
    pub fn rigid_bodies_mut(&mut self) -> &mut [RigidBody] {
        &mut self.bodies
    }

    /// The number of bodies in the manager.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Advances the state of all bodies by one substep of the given duration.
    pub fn integrate_all(&mut self, dt: fph) {
        for body in &mut self.bodies {
            body.integrate(dt);
        }
    }

    /// Overwrites the accumulated force on every body with the given value
    /// and clears the accumulated torques.
    pub fn reset_all_forces_and_torques(&mut self, force: Force) {
        for body in &mut self.bodies {
            body.reset_force_and_torque(force);
        }
    }

    /// Removes all stored rigid bodies and resets the ID counter.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.body_indices_by_id.clear();
        self.body_id_counter = 0;
    }

    fn create_new_body_id(&mut self) -> RigidBodyID {
        let id = RigidBodyID(self.body_id_counter);
        self.body_id_counter = self
            .body_id_counter
            .checked_add(1)
            .expect("Rigid body ID counter overflowed");
        id
    }
}

impl Default for RigidBodyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{abs_diff_eq, assert_abs_diff_eq};
    use nalgebra::{point, vector};
    use proptest::prelude::*;

    prop_compose! {
        fn position_strategy(max_position_coord: fph)(
            position_coord_x in -max_position_coord..max_position_coord,
            position_coord_y in -max_position_coord..max_position_coord,
            position_coord_z in -max_position_coord..max_position_coord,
        ) -> Position {
            point![position_coord_x, position_coord_y, position_coord_z]
        }
    }

    prop_compose! {
        fn force_strategy(max_force_coord: fph)(
            force_coord_x in -max_force_coord..max_force_coord,
            force_coord_y in -max_force_coord..max_force_coord,
            force_coord_z in -max_force_coord..max_force_coord,
        ) -> Force {
            vector![force_coord_x, force_coord_y, force_coord_z]
        }
    }

    fn dummy_dynamic_body() -> RigidBody {
        RigidBody::from_descriptor(RigidBodyID(0), &BodyDescriptor::default()).unwrap()
    }

    fn dummy_static_body() -> RigidBody {
        RigidBody::from_descriptor(
            RigidBodyID(1),
            &BodyDescriptor {
                mass: 0.0,
                ..BodyDescriptor::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn descriptor_with_negative_mass_gives_error() {
        let descriptor = BodyDescriptor {
            mass: -1.0,
            ..BodyDescriptor::default()
        };
        assert!(RigidBody::from_descriptor(RigidBodyID(0), &descriptor).is_err());
    }

    #[test]
    fn descriptor_with_out_of_range_friction_gives_error() {
        let descriptor = BodyDescriptor {
            friction_coef: 1.5,
            ..BodyDescriptor::default()
        };
        assert!(RigidBody::from_descriptor(RigidBodyID(0), &descriptor).is_err());
    }

    #[test]
    fn static_body_has_zero_inverse_mass_and_inertia() {
        let body = dummy_static_body();
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.inverse_world_inertia_tensor(), &Matrix3::zeros());
        assert!(body.is_static());
        assert!(body.is_sleeping());
    }

    #[test]
    fn static_body_ignores_impulses_and_integration() {
        let mut body = dummy_static_body();
        let position = *body.position();
        body.apply_linear_impulse(&vector![1.0, 2.0, 3.0]);
        body.apply_angular_impulse(&vector![1.0, 0.0, 0.0]);
        body.reset_force_and_torque(vector![0.0, -9.0, 0.0]);
        body.integrate(1.0 / 60.0);
        assert_abs_diff_eq!(body.momentum(), &Momentum::zeros());
        assert_abs_diff_eq!(body.velocity(), &Velocity::zeros());
        assert_abs_diff_eq!(body.position(), &position);
    }

    proptest! {
        #[test]
        fn applied_forces_accumulate(
            force_1 in force_strategy(1e3),
            force_2 in force_strategy(1e3),
            force_position in position_strategy(1e3),
        ) {
            let mut body = dummy_dynamic_body();
            body.apply_force_at_center_of_mass(&force_1);
            body.apply_force(&force_2, &force_position);
            prop_assert!(abs_diff_eq!(body.force(), &(force_1 + force_2)));
        }
    }

    proptest! {
        #[test]
        fn force_outside_center_of_mass_gives_torque(
            force in force_strategy(1e3),
            force_position in position_strategy(1e3),
        ) {
            let mut body = dummy_dynamic_body();
            body.apply_force(&force, &force_position);
            prop_assert!(abs_diff_eq!(
                body.torque(),
                &((force_position - body.position()).cross(&force))
            ));
        }
    }

    #[test]
    fn velocity_follows_momentum_after_impulse() {
        let mut body = dummy_dynamic_body();
        body.apply_linear_impulse(&vector![2.0, 0.0, -1.0]);
        assert_abs_diff_eq!(body.velocity(), &vector![2.0, 0.0, -1.0]);
        body.apply_angular_impulse(&vector![0.0, 3.0, 0.0]);
        assert_abs_diff_eq!(
            body.angular_velocity(),
            &(body.inverse_world_inertia_tensor() * body.angular_momentum()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn orientation_stays_normalized_during_integration() {
        let mut body = dummy_dynamic_body();
        body.set_sleeping_enabled(false);
        body.set_angular_velocity(vector![2.0, -3.0, 1.0]);
        for _ in 0..240 {
            body.integrate(1.0 / 240.0);
        }
        assert!((body.orientation().norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn world_aabb_contains_transformed_shape_vertices() {
        let mut body = RigidBody::from_descriptor(
            RigidBodyID(0),
            &BodyDescriptor {
                position: point![1.0, -2.0, 3.0],
                orientation: Orientation::from_axis_angle(&Vector3::y_axis(), 0.9),
                scale: vector![2.0, 1.0, 0.5],
                ..BodyDescriptor::default()
            },
        )
        .unwrap();
        body.set_sleeping_enabled(false);
        body.set_angular_velocity(vector![0.5, 1.0, 0.0]);
        body.integrate(1.0 / 60.0);

        let slack = vector![1e-9, 1e-9, 1e-9];
        let grown = AxisAlignedBox::new(
            body.aabb().lower_corner() - slack,
            body.aabb().upper_corner() + slack,
        );
        for vertex in body.shape().vertices() {
            let world_vertex = body.local_to_global(vertex);
            assert!(grown.contains_point(&world_vertex));
        }
    }

    #[test]
    fn local_global_round_trip() {
        let body = RigidBody::from_descriptor(
            RigidBodyID(0),
            &BodyDescriptor {
                position: point![0.5, 2.0, -1.0],
                orientation: Orientation::from_axis_angle(&Vector3::z_axis(), 1.2),
                scale: vector![2.0, 3.0, 0.5],
                ..BodyDescriptor::default()
            },
        )
        .unwrap();
        let point = point![0.3, -0.1, 0.4];
        assert_abs_diff_eq!(
            body.global_to_local(&body.local_to_global(&point)),
            point,
            epsilon = 1e-12
        );
    }

    #[test]
    fn quiet_body_falls_asleep_and_momenta_are_damped() {
        let mut body = dummy_dynamic_body();
        body.set_change_average(0.0);
        body.apply_linear_impulse(&vector![0.05, 0.0, 0.0]);
        body.integrate(1.0 / 60.0);
        assert!(body.is_sleeping());
        assert_abs_diff_eq!(body.momentum().x, 0.05 * 0.7, epsilon = 1e-12);
    }

    #[test]
    fn force_wakeup_keeps_body_integrating_for_one_step() {
        let mut body = dummy_dynamic_body();
        body.set_change_average(0.0);
        body.integrate(1.0 / 60.0);
        assert!(body.is_sleeping());

        body.revalidate_sleeping();
        body.apply_linear_impulse(&vector![0.01, 0.0, 0.0]);
        let x_before = body.position().x;
        body.integrate(1.0 / 60.0);
        assert!(body.position().x > x_before);
    }

    #[test]
    fn manager_assigns_monotonic_ids_and_resets_on_clear() {
        let mut manager = RigidBodyManager::new();
        let id_1 = manager.add_body(&BodyDescriptor::default()).unwrap();
        let id_2 = manager.add_body(&BodyDescriptor::default()).unwrap();
        assert!(id_1 < id_2);
        manager.clear();
        let id_3 = manager.add_body(&BodyDescriptor::default()).unwrap();
        assert_eq!(id_1, id_3);
    }
}
