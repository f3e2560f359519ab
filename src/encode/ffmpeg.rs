use std::{
    collections::HashSet,
    io::Read,
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    encode::sink::{FrameSink, RenderArtifact, SinkConfig, SinkState},
    foundation::error::{TickdownError, TickdownResult},
    render::surface::PixelSurface,
};

/// One entry in the ordered container/codec preference list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecPreference {
    /// ffmpeg muxer name (`-f`).
    pub container: &'static str,
    /// ffmpeg encoder name (`-c:v`); `None` lets ffmpeg pick its default.
    pub encoder: Option<&'static str>,
    /// Media type reported on the finished artifact.
    pub media_type: &'static str,
}

/// The format a session settled on after probing encoder support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub container: &'static str,
    pub encoder: Option<&'static str>,
    pub media_type: &'static str,
}

/// Richer/most compatible formats first, generic fallback last.
pub fn default_preferences() -> Vec<CodecPreference> {
    vec![
        CodecPreference {
            container: "mp4",
            encoder: Some("libx264"),
            media_type: "video/mp4",
        },
        CodecPreference {
            container: "webm",
            encoder: Some("libvpx-vp9"),
            media_type: "video/webm",
        },
        CodecPreference {
            container: "webm",
            encoder: Some("libvpx"),
            media_type: "video/webm",
        },
        CodecPreference {
            container: "matroska",
            encoder: Some("mpeg4"),
            media_type: "video/x-matroska",
        },
    ]
}

/// Pick the first preference whose encoder is available. Never fails: with
/// nothing supported the sink falls back to ffmpeg's default codec in a
/// matroska container.
pub fn negotiate(prefs: &[CodecPreference], supported: &HashSet<String>) -> NegotiatedFormat {
    for pref in prefs {
        match pref.encoder {
            Some(enc) if supported.contains(enc) => {
                return NegotiatedFormat {
                    container: pref.container,
                    encoder: pref.encoder,
                    media_type: pref.media_type,
                };
            }
            None => {
                return NegotiatedFormat {
                    container: pref.container,
                    encoder: None,
                    media_type: pref.media_type,
                };
            }
            _ => {}
        }
    }

    NegotiatedFormat {
        container: "matroska",
        encoder: None,
        media_type: "video/x-matroska",
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Video encoder names from `ffmpeg -encoders` output.
fn parse_encoder_names(output: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    for line in output.lines() {
        let line = line.trim_start();
        // Listing lines look like " V....D libx264   H.264 / ...". The
        // leading capability field starts with V for video encoders.
        let mut parts = line.split_whitespace();
        let (Some(caps), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        if caps.starts_with('V') && !name.is_empty() && name != "=" {
            names.insert(name.to_string());
        }
    }
    names
}

/// Probe the encoders the local ffmpeg build supports.
pub fn probe_supported_encoders() -> HashSet<String> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();

    match output {
        Ok(out) if out.status.success() => parse_encoder_names(&String::from_utf8_lossy(&out.stdout)),
        _ => HashSet::new(),
    }
}

type ChunkList = Vec<Vec<u8>>;

/// Encoding session over the system `ffmpeg` binary.
///
/// Raw RGBA frames stream to ffmpeg stdin; encoded container bytes stream
/// back from stdout into an in-memory chunk list on a drain thread. `finish`
/// concatenates the chunks into a [`RenderArtifact`].
pub struct FfmpegSink {
    prefs: Vec<CodecPreference>,
    negotiated: Option<NegotiatedFormat>,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<std::thread::JoinHandle<std::io::Result<ChunkList>>>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    cfg: Option<SinkConfig>,
    state: SinkState,
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegSink {
    pub fn new() -> Self {
        Self::with_preferences(default_preferences())
    }

    pub fn with_preferences(prefs: Vec<CodecPreference>) -> Self {
        Self {
            prefs,
            negotiated: None,
            child: None,
            stdin: None,
            stdout_drain: None,
            stderr_drain: None,
            cfg: None,
            state: SinkState::Inactive,
        }
    }

    /// The format chosen at `begin`, if recording has started.
    pub fn negotiated(&self) -> Option<NegotiatedFormat> {
        self.negotiated
    }

    fn validate_config(cfg: &SinkConfig) -> TickdownResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(TickdownError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if cfg.width % 2 != 0 || cfg.height % 2 != 0 {
            // yuv420p output requires even dimensions.
            return Err(TickdownError::validation(
                "encode width/height must be even (required for yuv420p output)",
            ));
        }
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(TickdownError::validation("encode fps must be non-zero"));
        }
        if cfg.bitrate_bps == 0 {
            return Err(TickdownError::validation("encode bitrate must be non-zero"));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: &SinkConfig) -> TickdownResult<()> {
        if self.state == SinkState::Recording {
            return Ok(());
        }
        if self.state == SinkState::Stopped {
            return Err(TickdownError::encode("ffmpeg sink is already finalized"));
        }
        Self::validate_config(cfg)?;

        if !is_ffmpeg_on_path() {
            return Err(TickdownError::encode(
                "ffmpeg is required for encoding, but was not found on PATH",
            ));
        }

        let supported = probe_supported_encoders();
        let negotiated = negotiate(&self.prefs, &supported);
        tracing::debug!(
            container = negotiated.container,
            encoder = negotiated.encoder.unwrap_or("default"),
            "negotiated output format"
        );

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
        ]);

        if let Some(encoder) = negotiated.encoder {
            cmd.args(["-c:v", encoder]);
        }
        cmd.args(["-b:v", &cfg.bitrate_bps.to_string()]);
        cmd.args(["-pix_fmt", "yuv420p"]);
        if negotiated.container == "mp4" {
            // Non-seekable pipe output needs a fragmented MP4.
            cmd.args(["-movflags", "frag_keyframe+empty_moov"]);
        }
        cmd.args(["-f", negotiated.container, "pipe:1"]);

        let mut child = cmd.spawn().map_err(|e| {
            TickdownError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TickdownError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| TickdownError::encode("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| TickdownError::encode("failed to open ffmpeg stderr (unexpected)"))?;

        let stdout_drain = std::thread::spawn(move || {
            let mut chunks: ChunkList = Vec::new();
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    // Tolerate zero-byte chunks by construction: only
                    // non-empty reads are kept.
                    Ok(n) => chunks.push(buf[..n].to_vec()),
                    Err(e) => return Err(e),
                }
            }
            Ok(chunks)
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        self.negotiated = Some(negotiated);
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout_drain = Some(stdout_drain);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg.clone());
        self.state = SinkState::Recording;
        Ok(())
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn push_frame(&mut self, frame: &PixelSurface) -> TickdownResult<()> {
        if self.state != SinkState::Recording {
            return Err(TickdownError::encode("ffmpeg sink is not recording"));
        }
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| TickdownError::encode("ffmpeg sink not started"))?;
        if frame.width() != cfg.width || frame.height() != cfg.height {
            return Err(TickdownError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                cfg.width,
                cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TickdownError::encode("ffmpeg sink is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(frame.data()).map_err(|e| {
            TickdownError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn finish(&mut self) -> TickdownResult<RenderArtifact> {
        if self.state == SinkState::Stopped {
            return Ok(RenderArtifact::default());
        }
        self.state = SinkState::Stopped;

        // Closing stdin signals end-of-stream; ffmpeg flushes and exits.
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(RenderArtifact::default());
        };

        let status = child.wait().map_err(|e| {
            TickdownError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        let chunks = match self.stdout_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| TickdownError::encode("ffmpeg stdout drain thread panicked"))?
                .map_err(|e| TickdownError::encode(format!("ffmpeg stdout read failed: {e}")))?,
            None => Vec::new(),
        };
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| TickdownError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| TickdownError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(TickdownError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in &chunks {
            bytes.extend_from_slice(chunk);
        }

        Ok(RenderArtifact {
            media_type: self
                .negotiated
                .map(|n| n.media_type.to_string())
                .unwrap_or_default(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;

    fn supported(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn negotiate_picks_first_supported_preference() {
        let prefs = default_preferences();
        let n = negotiate(&prefs, &supported(&["libvpx-vp9", "libx264"]));
        assert_eq!(n.encoder, Some("libx264"));
        assert_eq!(n.container, "mp4");
        assert_eq!(n.media_type, "video/mp4");

        let n = negotiate(&prefs, &supported(&["libvpx-vp9"]));
        assert_eq!(n.encoder, Some("libvpx-vp9"));
        assert_eq!(n.container, "webm");
    }

    #[test]
    fn negotiate_with_no_supported_codec_falls_back_to_default() {
        let n = negotiate(&default_preferences(), &supported(&[]));
        assert_eq!(n.encoder, None);
        assert_eq!(n.container, "matroska");
        assert_eq!(n.media_type, "video/x-matroska");
    }

    #[test]
    fn parse_encoders_extracts_video_names_only() {
        let listing = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              H.264 / AVC / MPEG-4 AVC
 V....D libvpx-vp9           libvpx VP9
 A....D aac                  AAC (Advanced Audio Coding)
 S..... srt                  SubRip subtitle
";
        let names = parse_encoder_names(listing);
        assert!(names.contains("libx264"));
        assert!(names.contains("libvpx-vp9"));
        assert!(!names.contains("aac"));
        assert!(!names.contains("srt"));
        assert!(!names.contains("="));
    }

    #[test]
    fn config_validation_catches_bad_values() {
        let fps = Fps::new(30, 1).unwrap();
        let base = SinkConfig {
            width: 640,
            height: 360,
            fps,
            bitrate_bps: 2_000_000,
        };

        FfmpegSink::validate_config(&base).unwrap();

        let mut odd = base.clone();
        odd.width = 641;
        assert!(FfmpegSink::validate_config(&odd).is_err());

        let mut zero = base.clone();
        zero.height = 0;
        assert!(FfmpegSink::validate_config(&zero).is_err());

        let mut no_rate = base;
        no_rate.bitrate_bps = 0;
        assert!(FfmpegSink::validate_config(&no_rate).is_err());
    }

    #[test]
    fn push_frame_before_begin_is_an_error() {
        let mut sink = FfmpegSink::new();
        let err = sink.push_frame(&PixelSurface::new(2, 2));
        assert!(err.is_err());
    }

    #[test]
    fn finish_without_begin_yields_empty_artifact() {
        let mut sink = FfmpegSink::new();
        let artifact = sink.finish().unwrap();
        assert!(artifact.is_empty());
        assert_eq!(sink.state(), SinkState::Stopped);
    }
}
