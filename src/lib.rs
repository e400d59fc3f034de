pub mod assertions;
pub mod config;
pub mod error;
pub mod eval;
pub mod executor;
pub mod fixture;
#[cfg(feature = "cli")]
pub mod report;
pub mod scenario;
pub mod session;
pub mod spec;
pub mod vars;
