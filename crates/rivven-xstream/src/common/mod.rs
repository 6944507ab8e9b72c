//! # Common CDC Types and Traits
//!
//! Source-agnostic pieces shared by the XStream client:
//!
//! - [`CdcError`] / [`Result`] - error taxonomy with categories and metric codes
//! - [`CdcSource`] - lifecycle trait for streaming sources
//! - [`CdcConfig`] - configuration validation trait

mod error;
mod traits;

pub use error::*;
pub use traits::*;
