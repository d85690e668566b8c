pub mod mutation;
pub mod notify;
pub mod policy;
pub mod snapshot;
pub mod workbench;

pub use mutation::{MutationController, MutationIntent, MutationOutcome};
pub use workbench::Workbench;
