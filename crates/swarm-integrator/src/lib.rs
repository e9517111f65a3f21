//! Merge-test-retry integration: once every subtask under a parent reaches
//! a terminal state, a node picks up the parent in `Merging` and runs it
//! through [`integrate::integrate_parent`].

pub mod collaborator;
pub mod error;
pub mod git;
pub mod integrate;
pub mod run;

pub use collaborator::{GitCollaborator, NoopCollaborator};
pub use error::{IntegratorError, IntegratorResult};
pub use git::{GitOps, GitWorktree, MergeOutcome, TestOutcome, CONFLICT_OUTPUT_LIMIT_BYTES};
pub use integrate::{integrate_parent, IntegrationOutcome, MAX_MERGE_ATTEMPTS};
pub use run::spawn;
