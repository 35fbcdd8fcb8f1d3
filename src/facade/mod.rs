//! Convenience layer for application code.
//!
//! The core modules stay usable on their own; the facade only gathers the
//! types most programs touch so a single import covers both the async and
//! the blocking surface.

pub mod prelude;
