//! Rendering engine boundary and per-frame pixel extraction.

/// The engine contract consumed by the capture pipeline.
pub mod engine;
/// Resolution normalization and RGBA8 readback.
pub mod extract;
/// Built-in CPU test pattern engine.
pub mod pattern;
