//! rmexport mirrors the documents on a reMarkable tablet onto local disk.
//!
//! The pipeline lives in [`export`], fed by [`filter`] over the [`document`]
//! tree. All device traffic goes through the [`contract::DeviceClient`]
//! trait; [`device`] implements it against the tablet's USB web interface.

pub mod cli;
pub mod contract;
pub mod device;
pub mod document;
pub mod error;
pub mod export;
pub mod filter;

pub use cli::{run, Cli};
