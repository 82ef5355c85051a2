//! Plan module: the work handed to one `bind` call and what comes back.
//!
//! A [`VolumePlan`] orders volumes, each an ordered list of probed
//! [`SourceFile`](crate::probe::SourceFile)s. A [`RunConfig`] fixes the
//! output layout for the whole run. Both are immutable for the duration of
//! a run.

mod config;
mod error;
mod result;
mod types;

pub use config::{Channels, RunConfig};
pub use error::PlanError;
pub use result::{BindResult, FailureReason, VolumeOutcome};
pub use types::{Volume, VolumePlan};
