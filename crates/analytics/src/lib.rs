//! # Lift Analytics
//!
//! Deterministic rollups, lift, and leaderboards over engagement records.
//!
//! ## Architecture
//!
//! ```text
//! ScopedRecord[] / SchoolReport
//!     │
//!     ├──> Aggregator (group by key, weighted rate)
//!     │
//!     ├──> Lift Calculator (treatment vs control, null when control is 0)
//!     │
//!     ├──> Ranking Engine (search → filter → stable sort, nulls last)
//!     │
//!     └──> Network Composer (per-school rollups → all-schools view)
//! ```
//!
//! Everything here is synchronous and pure over already-loaded records.

mod aggregate;
mod error;
mod export;
mod lift;
mod network;
mod profile;
mod rank;
mod rollup;

pub use aggregate::{
    aggregate, by_content_count, merge_by_name, merge_by_name_and_category, weighted_ratio, EntityAggregate, Metered,
    TreatmentSplit,
};
pub use error::{AnalyticsError, Result};
pub use export::{aggregate_rows, export_rows, leaderboard_rows, ExportRow, LeaderboardRow};
pub use lift::{best_ip_type, compute_lift, lift_for_pair, lift_percent, mean_lift, LiftResult};
pub use network::{
    best_for, compose_network, Coverage, MissingSource, NetworkAggregate, NetworkLift,
    NETWORK_NAME, UNASSIGNED_REGION,
};
pub use profile::ReportProfile;
pub use rank::{filters, rank, Direction, Leaderboard, MetricKey, Predicate, RankQuery};
pub use rollup::{
    brand_aggregates, build_school_rollup, school_aggregates, Normalizer, SchoolRollup,
};
