//! Tunables for agent planning and negotiation.
//!
//! [`PlanningConfig`] is embedded in the simulation configuration file under
//! the `planning` key; every field falls back to its default when omitted.

use serde::{Deserialize, Serialize};

/// Planning and negotiation parameters shared by every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Maximum number of time steps a path search may look ahead (default: 100).
    pub search_timeout: u64,

    /// Time steps past the current one scanned for vertex conflicts (default: 4).
    pub conflict_window: u64,

    /// Number of leading path states scanned for swaps (default: 4).
    pub swap_prefix: usize,

    /// Waypoints sent in reply to a single `ask(waypoints)` (default: 2).
    pub max_waypoints_per_locution: usize,

    /// Chebyshev radius an agent can see (default: 2).
    ///
    /// Permanent obstacles are visible regardless of distance.
    pub visibility_radius: u32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            search_timeout: 100,
            conflict_window: 4,
            swap_prefix: 4,
            max_waypoints_per_locution: 2,
            visibility_radius: 2,
        }
    }
}
