//! Rubeho - ward matching and fishnet grid preparation for the village mapper
//!
//! This library provides the pipeline stages shared by the `prepare`,
//! `fishnet` and `annotations` binaries.

pub mod annotations;
pub mod config;
pub mod error;
pub mod flagging;
pub mod grid;
pub mod matching;
pub mod models;
pub mod pip;
pub mod pipeline;
pub mod projection;
pub mod regions;
pub mod report;
pub mod survey;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use models::{FlaggedWard, GridCell, MatchKey, ProgramLocation, ProgramLocationType, Ward};
