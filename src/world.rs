//! The simulation world and its stepping driver.

use crate::{
    collision::{
        CollisionWorld,
        broad_phase::{BroadPhase, SweepAndPruneBroadPhase},
        manifold::ContactManifold,
    },
    constraint::{ConstraintDescriptor, UserConstraint, solver::ConstraintSolver},
    diagnostics::SimulationDiagnostics,
    fph,
    inactivity::InactivityDetector,
    quantities::Force,
    rigid_body::{BodyDescriptor, RigidBody, RigidBodyID, RigidBodyManager},
};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub use crate::constraint::solver::ConstraintSolverConfig;

/// Configuration parameters for the simulation driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Magnitude of the downward gravitational acceleration.
    pub gravity: fph,
    /// Factor scaling the frame duration before substepping.
    pub speedup: u32,
    /// The number of substeps each frame duration is subdivided into.
    pub timestep_divider: u32,
    /// Period, in accumulated frame time, between runs of the inactivity
    /// detector.
    pub inactivity_update_period: fph,
}

impl SimulatorConfig {
    /// Checks that the configuration parameters are valid.
    ///
    /// # Errors
    /// Returns an error if any of the parameters are invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            bail!("Gravity must be finite, got {}", self.gravity);
        }
        if self.speedup == 0 {
            bail!("Speedup must be at least 1");
        }
        if self.timestep_divider == 0 {
            bail!("Timestep divider must be at least 1");
        }
        if !(self.inactivity_update_period > 0.0) {
            bail!(
                "Inactivity update period must be positive, got {}",
                self.inactivity_update_period
            );
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            gravity: 0.9,
            speedup: 2,
            timestep_divider: 4,
            inactivity_update_period: 0.5,
        }
    }
}

/// Configuration parameters for a [`World`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Configuration parameters for the simulation driver.
    pub simulator: SimulatorConfig,
    /// Configuration parameters for the constraint solver.
    pub constraint_solver: ConstraintSolverConfig,
}

/// A world of rigid bodies advanced under gravity, contacts and user
/// constraints.
///
/// Each step subdivides the frame duration into substeps; every substep
/// integrates the bodies, resets the external forces to gravity, finds
/// contacts and solves the constraints. After the substeps, the inactivity
/// detector runs at its own cadence.
#[derive(Debug)]
pub struct World<B: BroadPhase = SweepAndPruneBroadPhase> {
    config: SimulatorConfig,
    initial_config: SimulationConfig,
    bodies: RigidBodyManager,
    collision_world: CollisionWorld<B>,
    constraint_solver: ConstraintSolver,
    inactivity_detector: InactivityDetector,
    diagnostics: SimulationDiagnostics,
    running: bool,
}

impl World<SweepAndPruneBroadPhase> {
    /// Creates a new world with the given configuration, using the
    /// sweep-and-prune broad phase.
    ///
    /// # Errors
    /// Returns an error if any of the configuration parameters are invalid.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_broad_phase(SweepAndPruneBroadPhase::default(), config)
    }
}

impl Default for World<SweepAndPruneBroadPhase> {
    fn default() -> Self {
        Self::new(SimulationConfig::default()).expect("Default simulation config is invalid")
    }
}

impl<B: BroadPhase> World<B> {
    /// Creates a new world with the given broad-phase strategy and
    /// configuration.
    ///
    /// # Errors
    /// Returns an error if any of the configuration parameters are invalid.
    pub fn with_broad_phase(broad_phase: B, config: SimulationConfig) -> Result<Self> {
        config.simulator.validate()?;
        Ok(Self {
            config: config.simulator.clone(),
            inactivity_detector: InactivityDetector::new(
                config.simulator.inactivity_update_period,
            ),
            constraint_solver: ConstraintSolver::new(config.constraint_solver.clone()),
            initial_config: config,
            bodies: RigidBodyManager::new(),
            collision_world: CollisionWorld::new(broad_phase),
            diagnostics: SimulationDiagnostics::default(),
            running: true,
        })
    }

    /// Creates a rigid body from the given descriptor and adds it to the
    /// world.
    ///
    /// # Returns
    /// A stable handle to the new body.
    ///
    /// # Errors
    /// Returns an error if the descriptor is invalid.
    pub fn add_body(&mut self, descriptor: &BodyDescriptor) -> Result<RigidBodyID> {
        self.bodies.add_body(descriptor)
    }

    /// Registers the persistent constraint described by the given descriptor.
    /// Sleeping is disabled for the involved bodies.
    ///
    /// # Errors
    /// Returns an error if a referenced body does not exist.
    pub fn add_constraint(&mut self, descriptor: &ConstraintDescriptor) -> Result<()> {
        let constraint = UserConstraint::from_descriptor(descriptor, &mut self.bodies)?;
        self.constraint_solver.add_constraint(constraint);
        Ok(())
    }

    /// Advances the simulation by the given frame duration, scaled by the
    /// configured speedup and subdivided into substeps. Does nothing while
    /// the world is stopped.
    pub fn step(&mut self, frame_dt: fph) {
        if !self.running || self.bodies.body_count() == 0 {
            return;
        }

        let step_start = Instant::now();

        let scaled_duration = frame_dt * fph::from(self.config.speedup);
        let substep_duration = scaled_duration / fph::from(self.config.timestep_divider);

        for _ in 0..self.config.timestep_divider {
            self.bodies.integrate_all(substep_duration);

            // User forces applied between steps get integrated once before
            // being overwritten by gravity
            self.bodies
                .reset_all_forces_and_torques(Force::new(0.0, -self.config.gravity, 0.0));

            self.collision_world.find_collisions(
                &mut self.bodies,
                &mut self.inactivity_detector,
                &mut self.diagnostics,
            );

            let (active_pairs, manifolds) = self.collision_world.active_pairs_and_manifolds_mut();
            self.constraint_solver
                .solve(substep_duration, &mut self.bodies, active_pairs, manifolds);
        }

        self.inactivity_detector
            .update(scaled_duration, &mut self.bodies);

        log::trace!(
            "Stepped {} bodies through {} substeps in {:.2} ms",
            self.bodies.body_count(),
            self.config.timestep_divider,
            step_start.elapsed().as_secs_f64() * 1e3,
        );
    }

    /// Runs one step of the given duration with temporarily inflated solver
    /// iterations and substep count, letting a freshly constructed stack
    /// settle. The previous settings are restored afterwards.
    pub fn stabilise(&mut self, duration: fph) {
        let iterations_backup = self.constraint_solver.config().n_iterations;
        let divider_backup = self.config.timestep_divider;
        let speedup_backup = self.config.speedup;
        let running_backup = self.running;

        self.running = true;
        self.config.speedup = 1;
        self.constraint_solver.config_mut().n_iterations = 100;
        self.config.timestep_divider = ((duration * 220.0).ceil() as u32).max(1);

        self.step(duration);

        self.running = running_backup;
        self.constraint_solver.config_mut().n_iterations = iterations_backup;
        self.config.timestep_divider = divider_backup;
        self.config.speedup = speedup_backup;
    }

    /// Pauses the simulation; subsequent [`Self::step`] calls do nothing.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Resumes a paused simulation.
    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_speedup(&mut self, speedup: u32) {
        self.config.speedup = speedup.max(1);
    }

    pub fn set_timestep_divider(&mut self, timestep_divider: u32) {
        self.config.timestep_divider = timestep_divider.max(1);
    }

    pub fn set_solver_iterations(&mut self, n_iterations: u32) {
        self.constraint_solver.config_mut().n_iterations = n_iterations;
    }

    /// Returns a reference to the body with the given handle, or [`None`] if
    /// it does not exist.
    pub fn body(&self, id: RigidBodyID) -> Option<&RigidBody> {
        self.bodies.get_rigid_body(id)
    }

    /// Returns a mutable reference to the body with the given handle, or
    /// [`None`] if it does not exist.
    pub fn body_mut(&mut self, id: RigidBodyID) -> Option<&mut RigidBody> {
        self.bodies.get_rigid_body_mut(id)
    }

    /// Returns the slice of all bodies in the world.
    pub fn bodies(&self) -> &[RigidBody] {
        self.bodies.rigid_bodies()
    }

    /// The number of bodies in the world.
    pub fn body_count(&self) -> usize {
        self.bodies.body_count()
    }

    /// Returns the contact manifold currently shared by the given pair of
    /// bodies, if any.
    pub fn contact_manifold(
        &self,
        body_a: RigidBodyID,
        body_b: RigidBodyID,
    ) -> Option<&ContactManifold> {
        self.collision_world.get_manifold(body_a, body_b)
    }

    /// Returns an iterator over all live contact manifolds.
    pub fn contact_manifolds(&self) -> impl Iterator<Item = &ContactManifold> {
        self.collision_world.manifolds()
    }

    /// Returns the diagnostics gathered by the collision and constraint
    /// pipeline.
    pub fn diagnostics(&self) -> &SimulationDiagnostics {
        &self.diagnostics
    }

    /// Removes all bodies, manifolds and constraints and resets the tuning
    /// parameters to their initial values.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.collision_world.clear();
        self.constraint_solver.clear();
        self.inactivity_detector.clear();
        self.diagnostics = SimulationDiagnostics::default();

        self.config = self.initial_config.simulator.clone();
        *self.constraint_solver.config_mut() = self.initial_config.constraint_solver.clone();
        self.running = true;
    }
}
