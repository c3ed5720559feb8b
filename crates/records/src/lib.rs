//! # Lift Records
//!
//! Immutable engagement records and the boundary that produces them.
//!
//! ```text
//! school JSON / brand summary JSON
//!     │
//!     ├──> Raw documents (serde, all fields optional)
//!     │
//!     └──> Fail-closed mapping
//!            ├─ ContentRecord   (per-scope metrics)
//!            ├─ TreatmentPair   (with / without IP usage)
//!            └─ ScopedRecord    (record + grouping labels)
//! ```

mod document;
mod error;
mod normalize;
mod types;

pub use document::{
    AthleteReport, BrandSummaryDocument, IpUsage, RawMetrics, SchoolDocument, SchoolReport,
};
pub use error::{RecordsError, Result};
pub use normalize::{IndustryClassifier, NameAliases, RegionMap};
pub use types::{ContentRecord, IpType, ScopedRecord, TreatmentPair};
