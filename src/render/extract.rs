use crate::foundation::core::{FrameRGBA, Resolution};
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::engine::RenderEngine;
use std::time::Duration;

/// Copy `source` into a temporary target of `requested.normalized()` size and read it back.
///
/// The returned bytes are tightly packed RGBA8, row-major, top row first. The temporary target is
/// dropped before returning, on both the success and the error path.
pub fn extract(
    engine: &mut dyn RenderEngine,
    source: &FrameRGBA,
    requested: Resolution,
) -> CaptureResult<Vec<u8>> {
    let size = requested.normalized();
    let mut tmp = engine.acquire_target(size)?;
    if tmp.size() != size {
        return Err(CaptureError::engine(format!(
            "engine returned a {} target, requested {size}",
            tmp.size()
        )));
    }
    engine.blit(source, &mut tmp)?;
    let bytes = engine.read_back(&tmp)?;
    if bytes.len() != size.frame_bytes() {
        return Err(CaptureError::engine(format!(
            "read back {} bytes, expected {}",
            bytes.len(),
            size.frame_bytes()
        )));
    }
    Ok(bytes)
}

/// Per-session pixel source with a fixed, normalized output size.
///
/// In viewport mode frames are scaled from the engine's screen frame. In render-target mode the
/// extractor owns an intermediate target the engine renders into at the configured resolution;
/// that target lives until the extractor is dropped.
#[derive(Debug)]
pub struct PixelExtractor {
    size: Resolution,
    render_target: Option<FrameRGBA>,
}

impl PixelExtractor {
    /// Extract from the screen frame, at the viewport size rounded for the encoder.
    pub fn for_viewport(viewport: Resolution) -> Self {
        Self {
            size: viewport.normalized(),
            render_target: None,
        }
    }

    /// Allocate a dedicated render target at `requested.normalized()`.
    pub fn with_render_target(
        engine: &mut dyn RenderEngine,
        requested: Resolution,
    ) -> CaptureResult<Self> {
        let size = requested.normalized();
        let target = engine.acquire_target(size)?;
        Ok(Self {
            size,
            render_target: Some(target),
        })
    }

    /// The size of every frame this extractor produces; the encoder must be configured with it.
    pub fn output_size(&self) -> Resolution {
        self.size
    }

    /// Whether frames come from a dedicated render target.
    pub fn has_render_target(&self) -> bool {
        self.render_target.is_some()
    }

    /// Produce one frame's bytes for logical `time`.
    pub fn capture(
        &mut self,
        engine: &mut dyn RenderEngine,
        screen: &FrameRGBA,
        time: Duration,
    ) -> CaptureResult<Vec<u8>> {
        match self.render_target.as_mut() {
            Some(target) => {
                engine.render(target, time)?;
                extract(engine, target, self.size)
            }
            None => extract(engine, screen, self.size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::pattern::TestPatternEngine;

    fn res(w: u32, h: u32) -> Resolution {
        Resolution::new(w, h).unwrap()
    }

    #[test]
    fn extract_output_matches_normalized_size() {
        let mut engine = TestPatternEngine::new(res(320, 200));
        let mut screen = FrameRGBA::new(engine.viewport());
        engine.render(&mut screen, Duration::ZERO).unwrap();

        let bytes = extract(&mut engine, &screen, res(642, 478)).unwrap();
        assert_eq!(bytes.len(), 640 * 480 * 4);
    }

    #[test]
    fn viewport_extractor_rounds_screen_size() {
        let ex = PixelExtractor::for_viewport(res(1366, 766));
        assert_eq!(ex.output_size(), res(1368, 768));
        assert!(!ex.has_render_target());
    }

    #[test]
    fn render_target_extractor_renders_at_configured_size() {
        let mut engine = TestPatternEngine::new(res(64, 64));
        let screen = FrameRGBA::new(engine.viewport());
        let mut ex = PixelExtractor::with_render_target(&mut engine, res(90, 30)).unwrap();
        assert_eq!(ex.output_size(), res(88, 32));

        let bytes = ex
            .capture(&mut engine, &screen, Duration::from_millis(500))
            .unwrap();
        assert_eq!(bytes.len(), 88 * 32 * 4);
        // The screen frame is all zeros; the dedicated target is rendered opaque.
        assert_eq!(bytes[3], 255);
    }
}
