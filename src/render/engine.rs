use crate::foundation::core::{FrameRGBA, Resolution};
use crate::foundation::error::{CaptureError, CaptureResult};
use std::time::Duration;

/// The rendering engine as seen by the capture pipeline.
///
/// The engine is a black box: it can render its scene into a target of any size, copy one target
/// into another of a different size, and read a target back as RGBA8 bytes. Targets are owned
/// [`FrameRGBA`] values, so releasing one is dropping it.
pub trait RenderEngine {
    /// Size of the engine's main output (the "screen").
    fn viewport(&self) -> Resolution;

    /// Render the scene at logical `time` into `target`, at the target's size.
    fn render(&mut self, target: &mut FrameRGBA, time: Duration) -> CaptureResult<()>;

    /// Copy `source` into `dest`, scaling to `dest`'s size.
    fn blit(&mut self, source: &FrameRGBA, dest: &mut FrameRGBA) -> CaptureResult<()>;

    /// Allocate a target of `size`.
    fn acquire_target(&mut self, size: Resolution) -> CaptureResult<FrameRGBA> {
        Ok(FrameRGBA::new(size))
    }

    /// Read `target` back as tightly packed RGBA8, top row first.
    fn read_back(&mut self, target: &FrameRGBA) -> CaptureResult<Vec<u8>> {
        if target.data.len() != target.size().frame_bytes() {
            return Err(CaptureError::engine(
                "render target data does not match its dimensions",
            ));
        }
        Ok(target.data.clone())
    }
}
