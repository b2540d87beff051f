//! Diagnostics for the simulation pipeline.

/// Counters tracking the work performed by the collision and constraint
/// pipeline. All counts are cumulative except the per-step gauges.
#[derive(Clone, Debug, Default)]
pub struct SimulationDiagnostics {
    /// Number of GJK runs that hit the iteration bound and were treated as
    /// producing no contact.
    pub gjk_nonconvergence_count: u64,
    /// Number of polytope expansions performed across all EPA runs.
    pub epa_expansion_count: u64,
    /// Number of contacts added to manifolds.
    pub contacts_created: u64,
    /// Number of contacts reused unchanged for sleeping body pairs.
    pub contacts_reused: u64,
    /// Number of contacts dropped by manifold maintenance.
    pub contacts_dropped: u64,
    /// Number of candidate pairs emitted by the broad phase in the most
    /// recent substep.
    pub broad_phase_pair_count: usize,
    /// Number of narrow-phase tests performed in the most recent substep.
    pub narrow_phase_test_count: usize,
}

impl SimulationDiagnostics {
    /// Resets the per-step gauges. Called at the beginning of each substep's
    /// collision detection.
    pub(crate) fn begin_collision_pass(&mut self) {
        self.broad_phase_pair_count = 0;
        self.narrow_phase_test_count = 0;
    }
}
