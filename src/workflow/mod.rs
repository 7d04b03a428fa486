//! Workflow steps behind each CLI command.
//!
//! Every command loads the same [`context::RunContext`] and shares its
//! resolve, discover and validate front half; they differ only in what
//! happens after it.
mod check;
mod context;
mod discover;
mod eval;
mod generate;

pub use check::run_check;
pub use discover::run_discover;
pub use eval::run_eval;
pub use generate::run_generate;
