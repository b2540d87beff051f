//! Interactive 3D rigid-body dynamics for convex polyhedra.
//!
//! The simulation advances a [`world::World`] of rigid bodies under gravity
//! and user-supplied forces. Each step runs a broad phase over body bounding
//! boxes, a GJK + EPA narrow phase producing persistent contact manifolds,
//! and a sequential-impulse constraint solver with warm-starting. Resting
//! stacks are put to sleep per body and deactivated in connected components
//! so that large piles stay numerically quiet.

pub mod collision;
pub mod constraint;
pub mod diagnostics;
pub mod inactivity;
pub mod inertia;
pub mod material;
pub mod quantities;
pub mod rigid_body;
pub mod shape;
pub mod world;

/// Floating point type used for physics simulation.
#[allow(non_camel_case_types)]
pub type fph = f64;

pub use world::{SimulationConfig, SimulatorConfig, World};
