//! Capture sessions, the shared pacing clock, and the named session registry.

/// Capture session state machine.
pub mod capture;
/// Shared frame-rate override context.
pub mod clock;
/// Named session lookup and broadcast start/stop.
pub mod registry;
