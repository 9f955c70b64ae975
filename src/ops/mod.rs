//! Operational workflows, one module per subcommand.
//!
//! Every workflow returns an exit code: 0 for success, 1 for any detected
//! failure. Hard errors (lost connectivity, spawn failures) propagate as
//! [`PaveError`](crate::PaveError) and are reported by the binary entry
//! point, which also exits 1.

pub mod backend;
pub mod bootstrap;
pub mod cleanup;
pub mod credentials;
pub mod drift;
pub mod github;
pub mod health;
pub mod lint;
pub mod migrate;
pub mod rotate;
pub mod scan;
pub mod status;
pub mod validate;
