//! Cleanup of duplicate groups.
//!
//! Cleanup never deletes. [`plan`] picks a keeper per group and
//! [`execute`] either reports what would happen or moves the rest into a
//! quarantine directory with a restore manifest.
//!
//! ```no_run
//! use std::path::Path;
//! use trackdupe::actions::{execute, plan, CleanupMode};
//! use trackdupe::duplicates::DuplicateGroup;
//!
//! let groups: Vec<DuplicateGroup> = Vec::new();
//! let cleanup = plan(&groups);
//! let report = execute(&cleanup, Path::new("."), CleanupMode::DryRun)?;
//! println!("{}", report.summary());
//! # Ok::<(), trackdupe::actions::CleanupError>(())
//! ```

pub mod plan;
pub mod quarantine;

pub use plan::{plan, CleanupPlan, PlanEntry};
pub use quarantine::{
    create_quarantine_dir, execute, CleanupError, CleanupFailure, CleanupMode, CleanupReport, MoveError, MovedFile,
    MANIFEST_FILE,
};
