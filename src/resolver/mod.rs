//! Profile resolution engine
//!
//! Pure, synchronous computations over in-memory data: condition evaluation,
//! declared-pattern file matching, per-package status resolution, and
//! container entry override ordering. Everything here is safe to re-run on
//! every state change; nothing mutates its inputs.

mod conditions;
mod matcher;
mod overrides;
mod status;

pub use conditions::*;
pub use matcher::*;
pub use overrides::*;
pub use status::*;
