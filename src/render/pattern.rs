use crate::foundation::core::{BYTES_PER_PIXEL, FrameRGBA, Resolution};
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::engine::RenderEngine;
use image::imageops::{self, FilterType};
use std::time::Duration;

/// CPU engine that renders an animated test pattern.
///
/// Red ramps left to right, green ramps top to bottom, and a bright blue bar sweeps across the
/// frame once per `period`. Useful for exercising the capture pipeline without a real renderer.
#[derive(Clone, Debug)]
pub struct TestPatternEngine {
    viewport: Resolution,
    period: Duration,
}

impl TestPatternEngine {
    /// Pattern engine with a one-second sweep period.
    pub fn new(viewport: Resolution) -> Self {
        Self {
            viewport,
            period: Duration::from_secs(2),
        }
    }

    /// Time the bar takes to cross the frame once.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }

    fn bar_span(&self, width: u32, time: Duration) -> (u32, u32) {
        let phase = (time.as_secs_f64() / self.period.as_secs_f64()).fract();
        let start = (phase * f64::from(width)) as u32;
        let len = (width / 16).max(1);
        (start, start.saturating_add(len))
    }
}

fn ramp(v: u32, extent: u32) -> u8 {
    let max = u64::from(extent.saturating_sub(1).max(1));
    ((u64::from(v) * 255) / max).min(255) as u8
}

impl RenderEngine for TestPatternEngine {
    fn viewport(&self) -> Resolution {
        self.viewport
    }

    fn render(&mut self, target: &mut FrameRGBA, time: Duration) -> CaptureResult<()> {
        let size = target.size();
        if target.data.len() != size.frame_bytes() {
            return Err(CaptureError::engine(
                "render target data does not match its dimensions",
            ));
        }

        let (bar_start, bar_end) = self.bar_span(size.width, time);
        for (i, px) in target.data.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let x = (i % size.width as usize) as u32;
            let y = (i / size.width as usize) as u32;
            let in_bar = x >= bar_start && x < bar_end;
            px[0] = ramp(x, size.width);
            px[1] = ramp(y, size.height);
            px[2] = if in_bar { 255 } else { 48 };
            px[3] = 255;
        }
        Ok(())
    }

    fn blit(&mut self, source: &FrameRGBA, dest: &mut FrameRGBA) -> CaptureResult<()> {
        if source.size() == dest.size() {
            dest.data.copy_from_slice(&source.data);
            return Ok(());
        }

        let src = image::RgbaImage::from_raw(source.width, source.height, source.data.clone())
            .ok_or_else(|| CaptureError::engine("blit source data does not match its dimensions"))?;
        let scaled = imageops::resize(&src, dest.width, dest.height, FilterType::Triangle);
        let raw = scaled.as_raw();
        if raw.len() != dest.data.len() {
            return Err(CaptureError::engine(
                "blit destination data does not match its dimensions",
            ));
        }
        dest.data.copy_from_slice(raw);
        Ok(())
    }
}
