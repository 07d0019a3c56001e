//! CLI command implementations.

pub mod commit;
