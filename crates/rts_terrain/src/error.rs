//! Error types for terrain generation and evaluation.
//!
//! Generation and read queries never fail: degenerate input falls back to
//! defaults. Errors only surface at IO boundaries (loading specs and data
//! tables, snapshots) and from explicit terrain manipulation requests.

use thiserror::Error;

use crate::tile::TilePos;

/// Result type alias using [`TerrainError`].
pub type Result<T> = std::result::Result<T, TerrainError>;

/// Top-level error type for the terrain crate.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Failed to read a data file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or source label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A special feature entry could not be validated.
    #[error("Invalid special feature '{kind}': {reason}")]
    InvalidSpecialFeature {
        /// Feature type as written in the spec.
        kind: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Engine snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// A coordinate fell outside the grid.
    #[error("Tile ({}, {}) is outside the map", .0.x, .0.y)]
    OutOfBounds(TilePos),

    /// A terrain effect was aimed at a tile it cannot modify.
    #[error("Cannot apply {effect} at ({}, {}): {reason}", .pos.x, .pos.y)]
    EffectTargetMismatch {
        /// Effect name.
        effect: String,
        /// Target tile.
        pos: TilePos,
        /// Why the tile does not qualify.
        reason: String,
    },

    /// No reversible effect is recorded for the tile.
    #[error("No terrain effect recorded at ({}, {})", .0.x, .0.y)]
    NoEffectRecorded(TilePos),
}
