use crate::encode::preset::Preset;
use crate::foundation::core::Resolution;
use crate::foundation::error::{CaptureError, CaptureResult};
use std::ffi::OsString;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

static OUTPUT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where the encoder lives and where its output goes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable: a bare name resolved through `PATH`, or a path.
    pub program: PathBuf,
    /// Directory receiving the encoded files.
    pub output_dir: PathBuf,
    /// Overwrite an existing output file.
    pub overwrite: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            output_dir: PathBuf::from("."),
            overwrite: true,
        }
    }
}

impl EncoderConfig {
    /// Use `program` as the encoder executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Write outputs into `output_dir`.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}

/// Check that the encoder executable can be invoked.
///
/// Explicit paths must exist. Every candidate must answer `-version` successfully.
pub fn locate_encoder(program: &Path) -> CaptureResult<PathBuf> {
    if program.as_os_str().is_empty() {
        return Err(CaptureError::availability("encoder program is empty"));
    }
    if program.components().count() > 1 && !program.is_file() {
        return Err(CaptureError::availability(format!(
            "'{}' is missing",
            program.display()
        )));
    }

    let probed = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !probed {
        return Err(CaptureError::availability(format!(
            "'{}' could not be run (is it installed and on PATH?)",
            program.display()
        )));
    }
    Ok(program.to_path_buf())
}

/// Derive a fresh output path for one pipe.
pub fn output_filename(dir: &Path, stream_name: &str, preset: Preset) -> PathBuf {
    let mut stem: String = stream_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':') {
                '_'
            } else {
                c
            }
        })
        .collect();
    if stem.is_empty() {
        stem.push_str("capture");
    }
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = OUTPUT_SEQ.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{stem}_{millis}_{seq:04}.{}", preset.extension()))
}

/// Encoder argument list for raw RGBA8 input of `size` at `frame_rate` read from stdin.
pub fn encoder_args(
    size: Resolution,
    frame_rate: u32,
    preset: Preset,
    out_path: &Path,
    overwrite: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    args.push(if overwrite { "-y" } else { "-n" }.into());
    for a in [
        "-loglevel",
        "warning",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ] {
        args.push(a.into());
    }
    args.push(size.to_string().into());
    args.push("-r".into());
    args.push(frame_rate.to_string().into());
    args.push("-i".into());
    args.push("pipe:0".into());
    args.push("-an".into());
    args.extend(preset.output_args().iter().map(OsString::from));
    args.push(out_path.as_os_str().to_owned());
    args
}

/// Summary of a closed pipe.
#[derive(Clone, Debug)]
pub struct PipeReport {
    /// Output file the encoder wrote.
    pub filename: PathBuf,
    /// Encoder exit status.
    pub status: ExitStatus,
    /// Frames accepted by the pipe.
    pub frames_written: u64,
    /// Bytes accepted by the pipe.
    pub bytes_written: u64,
    /// Everything the encoder printed to stderr, trimmed.
    pub diagnostics: String,
}

/// One running encoder process fed with raw frames on its stdin.
///
/// Frames are written back to back with no framing; the encoder splits them by byte count, so
/// every write must be exactly `size.frame_bytes()` long. A pipe cannot be reopened:
/// [`EncoderPipe::close`] consumes it.
pub struct EncoderPipe {
    name: String,
    filename: PathBuf,
    size: Resolution,
    frame_rate: u32,
    preset: Preset,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    frames_written: u64,
    bytes_written: u64,
}

impl EncoderPipe {
    /// Spawn the encoder for a stream of `size` frames at `frame_rate`.
    pub fn open(
        cfg: &EncoderConfig,
        stream_name: &str,
        size: Resolution,
        frame_rate: u32,
        preset: Preset,
    ) -> CaptureResult<Self> {
        if frame_rate == 0 {
            return Err(CaptureError::validation("encoder frame rate must be non-zero"));
        }
        if !size.is_normalized() {
            return Err(CaptureError::validation(format!(
                "encoder input size {size} is not a multiple of 8"
            )));
        }

        let program = locate_encoder(&cfg.program)?;
        std::fs::create_dir_all(&cfg.output_dir).map_err(|e| {
            CaptureError::config(format!(
                "failed to create output directory '{}': {e}",
                cfg.output_dir.display()
            ))
        })?;
        let filename = output_filename(&cfg.output_dir, stream_name, preset);
        if !cfg.overwrite && filename.exists() {
            return Err(CaptureError::validation(format!(
                "output file '{}' already exists",
                filename.display()
            )));
        }

        let mut child = Command::new(&program)
            .args(encoder_args(size, frame_rate, preset, &filename, cfg.overwrite))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CaptureError::availability(format!(
                    "failed to spawn '{}': {e}",
                    program.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::engine("failed to open encoder stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::engine("failed to open encoder stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(Self {
            name: stream_name.to_string(),
            filename,
            size,
            frame_rate,
            preset,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frames_written: 0,
            bytes_written: 0,
        })
    }

    /// Output file path.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Frame size the encoder was told to expect.
    pub fn size(&self) -> Resolution {
        self.size
    }

    /// Encoded frames per second.
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Preset the encoder runs with.
    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Write one frame. Blocks while the encoder's input buffer is full.
    pub fn write(&mut self, frame: &[u8]) -> CaptureResult<()> {
        if frame.len() != self.size.frame_bytes() {
            return Err(CaptureError::validation(format!(
                "frame is {} bytes, encoder expects {} for {}",
                frame.len(),
                self.size.frame_bytes(),
                self.size
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CaptureError::terminated(format!(
                "'{}' input is already closed",
                self.name
            )));
        };

        if let Err(e) = stdin.write_all(frame) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Err(CaptureError::terminated(format!(
                    "'{}' closed its input: {e}",
                    self.name
                )));
            }
            if let Some(status) = self.exit_status() {
                return Err(CaptureError::terminated(format!(
                    "'{}' exited with {status}: {e}",
                    self.name
                )));
            }
            return Err(CaptureError::pipe_write(format!(
                "failed to write frame to '{}': {e}",
                self.name
            )));
        }

        self.frames_written += 1;
        self.bytes_written += frame.len() as u64;
        Ok(())
    }

    /// Exit status if the encoder has already exited.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.as_mut().and_then(|c| c.try_wait().ok().flatten())
    }

    /// Signal end of input, wait for the encoder to exit and collect its stderr.
    pub fn close(mut self) -> CaptureResult<PipeReport> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| CaptureError::engine("encoder pipe has no process (unexpected)"))?;

        let status = child.wait().map_err(|e| {
            CaptureError::terminated(format!("failed to wait for '{}': {e}", self.name))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CaptureError::engine("encoder stderr drain thread panicked"))?
                .map_err(|e| CaptureError::engine(format!("encoder stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        Ok(PipeReport {
            filename: self.filename.clone(),
            status,
            frames_written: self.frames_written,
            bytes_written: self.bytes_written,
            diagnostics: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
        })
    }
}

impl Drop for EncoderPipe {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(w: u32, h: u32) -> Resolution {
        Resolution::new(w, h).unwrap()
    }

    #[test]
    fn args_describe_raw_rgba_input() {
        let out = Path::new("out/cam_1.mp4");
        let args = encoder_args(res(640, 480), 30, Preset::H264Default, out, true);
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args.first().map(String::as_str), Some("-y"));
        let pos = |s: &str| args.iter().position(|a| a == s).unwrap();
        assert_eq!(args[pos("-f") + 1], "rawvideo");
        assert_eq!(args[pos("-pix_fmt") + 1], "rgba");
        assert_eq!(args[pos("-s") + 1], "640x480");
        assert_eq!(args[pos("-r") + 1], "30");
        assert_eq!(args[pos("-i") + 1], "pipe:0");
        assert!(pos("-r") < pos("-i"));
        assert_eq!(args.last().map(String::as_str), Some("out/cam_1.mp4"));
    }

    #[test]
    fn no_overwrite_uses_dash_n() {
        let args = encoder_args(res(8, 8), 1, Preset::Vp8Default, Path::new("x.webm"), false);
        assert_eq!(args[0], OsString::from("-n"));
        assert!(args.iter().any(|a| a == "libvpx"));
    }

    #[test]
    fn output_filenames_are_unique_and_sanitized() {
        let dir = Path::new("captures");
        let a = output_filename(dir, "Main Camera", Preset::ProRes422);
        let b = output_filename(dir, "Main Camera", Preset::ProRes422);
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Main_Camera_"), "{name}");
        assert!(name.ends_with(".mov"), "{name}");
        assert!(a.starts_with(dir));

        let blank = output_filename(dir, "  ", Preset::H264Default);
        assert!(
            blank
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("capture_")
        );
    }

    #[test]
    fn missing_explicit_path_is_unavailable() {
        let err = locate_encoder(Path::new("definitely/not/here/ffmpeg")).unwrap_err();
        assert!(matches!(err, CaptureError::Availability(_)));
        let err = locate_encoder(Path::new("")).unwrap_err();
        assert!(matches!(err, CaptureError::Availability(_)));
    }

    #[test]
    fn open_rejects_unaligned_size_before_spawning() {
        let cfg = EncoderConfig::default().with_program("definitely/not/here/ffmpeg");
        let err = EncoderPipe::open(&cfg, "cam", res(642, 478), 30, Preset::H264Default)
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::Validation(_)));
    }
}
