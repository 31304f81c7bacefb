//! # RTS Terrain Tools
//!
//! Command-line support for terrain development:
//! - ASCII map previews
//! - Map spec and tech table validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod preview;
pub mod validate;
