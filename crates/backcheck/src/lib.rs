//! `bcstats-backcheck`: survey vs. back-check comparison engine.
//!
//! Pure engine crate: receives two pre-loaded datasets, returns the
//! difference report, per-collector error rates, and paired test results.
//! No CLI dependencies; CSV loading is provided for convenience.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod hypothesis;
pub mod model;
pub mod normalize;
pub mod preprocess;
pub mod reshape;
pub mod result;
pub mod stats;

pub use config::BackcheckConfig;
pub use dataset::{load_csv, load_csv_file, Dataset};
pub use engine::{run, run_with};
pub use error::BackcheckError;
pub use model::{BackcheckInput, IdentityDim, Tier, Value};
pub use result::BackcheckResult;
