//! Encoding through a system `ffmpeg` process fed on stdin.

/// The encoder subprocess pipe.
pub mod pipe;
/// Preset argument templates.
pub mod preset;
