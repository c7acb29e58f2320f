//! Faculty consultation engine
//!
//! Runs two consultants over a repository context snapshot under a strict
//! time and call budget:
//! - the advisor audits present state with a declarative rule table
//! - the oracle scores maturity and forecasts weighted future scenarios
//!
//! High-value advisor findings are deferred into a SQLite-backed vision
//! queue; the oracle's ritual mode drains that queue into a durable,
//! indexed archive. Results are cached by context fingerprint so repeated
//! runs over an unchanged repository cost nothing.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod advisor;
pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod governor;
pub mod io;
pub mod oracle;
pub mod report;
pub mod types;
pub mod vision;

pub use advisor::{ActionItem, Advisor, AdvisoryReport, AuditCategory, Effort, Impact};
pub use cache::ResultCache;
pub use config::FacultyConfig;
pub use context::{ContextDelta, RepositoryContext};
pub use engine::{ConsultOptions, ConsultationExit, ConsultationOutcome, FacultyEngine};
pub use errors::{ErrorCategory, FacultyError, Result};
pub use governor::{BudgetPressure, ResourceBudget, ResourceGovernor, ServiceClass};
pub use oracle::{ForecastReport, Oracle, RitualResult, RitualStop, Scenario};
pub use report::{ConsultationMode, ConsultationReport};
pub use types::{AnalysisDepth, ConsultantRole, RoleSelection};
pub use vision::{
    Disposition, SearchCriteria, VisionArchive, VisionQueue, VisionRecord, VisionRequest,
    VisionStatus, VisionTrigger,
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
