// Gateway module for dependency checks - follows the Train Station Pattern
// All external access must go through this gateway

mod checker;
mod types;

pub use checker::{is_newer, DependencyChecker};
pub use types::{Dependency, DependencyStatus};
