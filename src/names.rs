//! Persistent environment model: frames, scopes, and the machine
//! environment.
//!
//! Everything in this module is immutable. "Mutating" operations return
//! a new value and share all unchanged substructure with the original,
//! which is what makes retaining arbitrarily many historical snapshots
//! affordable.

mod env;
mod frame;
mod scope;

pub use env::{Env, Rebound};
pub use frame::{Frame, FrameMeta};
pub use scope::Scope;

/// Well-known identifier of the default lexical scope.
pub const LOCAL: &str = "local";

/// Well-known identifier of the default data stack.
pub const DATA: &str = "data";
