//! framecap captures rendered frames and streams them, as raw RGBA8, into an external `ffmpeg`
//! process.
//!
//! - A [`RenderEngine`] renders frames and copies them between targets.
//! - Each [`CaptureSession`] extracts frames at an 8-aligned size and writes them to its
//!   [`EncoderPipe`].
//! - A shared [`GlobalClock`] fixes the loop's time step while any capture is active.
//! - A [`SessionRegistry`] starts and stops sessions by name.
//! - [`FrameLoop`] ties these together, one synchronous call per tick.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// JSON configuration.
pub mod config;
/// Encoder presets and the encoder subprocess pipe.
pub mod encode;
/// Engine boundary and pixel extraction.
pub mod render;
/// Per-tick driver.
pub mod runtime;
/// Sessions, clock and registry.
pub mod session;

pub use crate::foundation::core::{
    BYTES_PER_PIXEL, DIM_ALIGN, FrameRGBA, Resolution, normalize_dim,
};
pub use crate::foundation::error::{CaptureError, CaptureResult};

pub use crate::config::{CaptureConfig, CaptureSettings, RecordWindow, SessionConfig};
pub use crate::encode::pipe::{EncoderConfig, EncoderPipe, PipeReport, locate_encoder};
pub use crate::encode::preset::Preset;
pub use crate::render::engine::RenderEngine;
pub use crate::render::extract::{PixelExtractor, extract};
pub use crate::render::pattern::TestPatternEngine;
pub use crate::runtime::{FrameLoop, RunSummary, TickReport};
pub use crate::session::capture::{CaptureSession, FrameOutcome, SessionState};
pub use crate::session::clock::{ClockStats, FrameRateOverride, GlobalClock, frame_interval};
pub use crate::session::registry::{SessionHandle, SessionRegistry, into_handle};
