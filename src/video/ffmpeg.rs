//! ffmpeg command-line implementation of [`TranscodeEngine`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::timeline::{FrameEdge, Resolution, LAST_FRAME_OFFSET_SECS};
use crate::video::engine::TranscodeEngine;
use crate::video::types::SegmentFormat;

/// `scale` to cover the target frame, then `crop` the overflow symmetrically
pub fn cover_filter(resolution: Resolution) -> String {
    let size = resolution.as_filter_size();
    format!("scale={size}:force_original_aspect_ratio=increase,crop={size},setsar=1")
}

/// Direct scale for stills, which are assumed to be pre-composed
pub fn still_filter(resolution: Resolution) -> String {
    format!("scale={},setsar=1", resolution.as_filter_size())
}

/// Keep frames `[start, start + ..)` and restart timestamps at zero
pub fn trim_filter(start: u64) -> String {
    format!("trim=start_frame={start},setpts=PTS-STARTPTS")
}

/// Builder for a single ffmpeg invocation
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    /// Arguments placed before `-i`
    input_args: Vec<String>,
    /// Arguments placed after `-i`
    output_args: Vec<String>,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn frames(self, count: u64) -> Self {
        self.output_arg("-frames:v").output_arg(count.to_string())
    }

    /// Codec, pixel format and rate shared by every segment, no audio
    pub fn normalized(self, format: &SegmentFormat) -> Self {
        self.output_arg("-r")
            .output_arg(format.fps.to_string())
            .output_arg("-c:v")
            .output_arg(format.codec.clone())
            .output_arg("-pix_fmt")
            .output_arg(format.pixel_format.clone())
            .output_arg("-an")
    }

    /// Strip encoder/version tags so identical inputs give identical bytes
    pub fn bitexact(self) -> Self {
        self.output_arg("-fflags")
            .output_arg("+bitexact")
            .output_arg("-flags:v")
            .output_arg("+bitexact")
            .output_arg("-map_metadata")
            .output_arg("-1")
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
        ];
        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Transcoding engine that shells out to the ffmpeg binary
pub struct FfmpegEngine {
    binary: String,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout_secs: None,
        }
    }

    /// Kill and fail any invocation running longer than `secs`
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn extract_frame_command(
        source: &Path,
        edge: FrameEdge,
        format: &SegmentFormat,
        output: &Path,
    ) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(source, output);
        let cmd = match edge {
            FrameEdge::First => cmd,
            FrameEdge::Last => cmd
                .input_arg("-sseof")
                .input_arg(format!("-{}", LAST_FRAME_OFFSET_SECS)),
        };
        cmd.video_filter(cover_filter(format.resolution)).frames(1)
    }

    pub fn render_still_command(image: &Path, frames: u64, format: &SegmentFormat, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(image, output)
            .input_arg("-loop")
            .input_arg("1")
            .input_arg("-framerate")
            .input_arg(format.fps.to_string())
            .video_filter(still_filter(format.resolution))
            .frames(frames)
            .normalized(format)
            .bitexact()
    }

    pub fn slice_still_command(
        master: &Path,
        start: u64,
        frames: u64,
        format: &SegmentFormat,
        output: &Path,
    ) -> FfmpegCommand {
        // The master runs at format.fps, so frame numbers address it exactly
        FfmpegCommand::new(master, output)
            .video_filter(trim_filter(start))
            .frames(frames)
            .normalized(format)
            .bitexact()
    }

    pub fn render_clip_command(source: &Path, format: &SegmentFormat, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(source, output)
            .video_filter(cover_filter(format.resolution))
            .normalized(format)
            .bitexact()
    }

    pub fn concatenate_command(manifest: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(manifest, output)
            .input_arg("-f")
            .input_arg("concat")
            .input_arg("-safe")
            .input_arg("0")
            .output_arg("-c")
            .output_arg("copy")
            .bitexact()
    }

    async fn run(&self, step: &str, cmd: FfmpegCommand) -> Result<()> {
        let args = cmd.build_args();
        debug!("Running {}: {} {}", step, self.binary, args.join(" "));

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let pending = command.output();
        let finished = match self.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), pending).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} timed out after {} seconds, killing ffmpeg", step, secs);
                    return Err(EngineError::TimedOut { step: step.to_string(), secs }.into());
                }
            },
            None => pending.await,
        };

        let output = finished.map_err(|e| EngineError::RenderFailed {
            step: step.to_string(),
            target: cmd.output().to_path_buf(),
            reason: format!("failed to spawn {}: {}", self.binary, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::RenderFailed {
                step: step.to_string(),
                target: cmd.output().to_path_buf(),
                reason: format!("{} ({})", stderr.trim(), output.status),
            }
            .into());
        }

        Ok(())
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn preflight(&self) -> Result<()> {
        let found = which::which(&self.binary).map_err(|_| EngineError::ToolUnavailable {
            tool: self.binary.clone(),
        })?;
        debug!("Using ffmpeg at {}", found.display());
        Ok(())
    }

    async fn extract_frame(
        &self,
        source: &Path,
        edge: FrameEdge,
        format: &SegmentFormat,
        output: &Path,
    ) -> Result<()> {
        let step = match edge {
            FrameEdge::First => "extract first frame",
            FrameEdge::Last => "extract last frame",
        };
        self.run(step, Self::extract_frame_command(source, edge, format, output)).await
    }

    async fn render_still(
        &self,
        image: &Path,
        frames: u64,
        format: &SegmentFormat,
        output: &Path,
    ) -> Result<()> {
        self.run("render still", Self::render_still_command(image, frames, format, output))
            .await
    }

    async fn slice_still(
        &self,
        master: &Path,
        start: u64,
        frames: u64,
        format: &SegmentFormat,
        output: &Path,
    ) -> Result<()> {
        self.run(
            "slice still",
            Self::slice_still_command(master, start, frames, format, output),
        )
        .await
    }

    async fn render_clip(&self, source: &Path, format: &SegmentFormat, output: &Path) -> Result<()> {
        self.run("render clip", Self::render_clip_command(source, format, output))
            .await
    }

    async fn concatenate(&self, manifest: &Path, output: &Path) -> Result<()> {
        self.run("concatenate", Self::concatenate_command(manifest, output))
            .await
            .map_err(|e| EngineError::ConcatenationFailed { reason: e.to_string() }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> SegmentFormat {
        SegmentFormat {
            resolution: Resolution::new(620, 760),
            fps: 30.0,
            pixel_format: "yuv420p".into(),
            codec: "libx264".into(),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_command_layout() {
        let args = FfmpegCommand::new("in.mp4", "out.mp4")
            .input_arg("-sseof")
            .input_arg("-0.1")
            .frames(1)
            .build_args();

        assert_eq!(&args[..3], &["-y", "-loglevel", "error"]);
        let sseof = args.iter().position(|a| a == "-sseof").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(sseof < input);
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_cover_filter() {
        assert_eq!(
            cover_filter(Resolution::new(692, 1032)),
            "scale=692:1032:force_original_aspect_ratio=increase,crop=692:1032,setsar=1"
        );
    }

    #[test]
    fn test_last_frame_seeks_from_end() {
        let first = FfmpegEngine::extract_frame_command(
            Path::new("a.mp4"),
            FrameEdge::First,
            &format(),
            Path::new("f.jpg"),
        )
        .build_args();
        let last = FfmpegEngine::extract_frame_command(
            Path::new("a.mp4"),
            FrameEdge::Last,
            &format(),
            Path::new("f.jpg"),
        )
        .build_args();

        assert!(!first.contains(&"-sseof".to_string()));
        assert_eq!(value_after(&last, "-sseof"), Some("-0.1"));
        assert_eq!(value_after(&last, "-frames:v"), Some("1"));
        assert_eq!(value_after(&last, "-vf"), Some(cover_filter(format().resolution).as_str()));
    }

    #[test]
    fn test_still_render_pins_frame_count() {
        let args = FfmpegEngine::render_still_command(
            Path::new("img.jpg"),
            format().frame_count(5.0),
            &format(),
            Path::new("still_1.mp4"),
        )
        .build_args();

        assert_eq!(value_after(&args, "-loop"), Some("1"));
        assert_eq!(value_after(&args, "-frames:v"), Some("150"));
        assert_eq!(value_after(&args, "-pix_fmt"), Some("yuv420p"));
        assert_eq!(value_after(&args, "-r"), Some("30"));
    }

    #[test]
    fn test_slice_selects_frames_of_master() {
        let args = FfmpegEngine::slice_still_command(
            Path::new("still_master.mp4"),
            240,
            75,
            &format(),
            Path::new("still_3.mp4"),
        )
        .build_args();

        assert_eq!(value_after(&args, "-vf"), Some("trim=start_frame=240,setpts=PTS-STARTPTS"));
        assert_eq!(value_after(&args, "-frames:v"), Some("75"));
        assert!(!args.contains(&"-ss".to_string()));
        assert!(!args.contains(&"-loop".to_string()));
    }

    #[test]
    fn test_clip_and_concat_commands() {
        let clip = FfmpegEngine::render_clip_command(Path::new("a.MP4"), &format(), Path::new("clip_1.mp4"))
            .build_args();
        assert!(clip.contains(&"-an".to_string()));
        assert_eq!(value_after(&clip, "-c:v"), Some("libx264"));

        let concat = FfmpegEngine::concatenate_command(Path::new("list.txt"), Path::new("out.mp4")).build_args();
        assert_eq!(value_after(&concat, "-f"), Some("concat"));
        assert_eq!(value_after(&concat, "-safe"), Some("0"));
        assert_eq!(value_after(&concat, "-c"), Some("copy"));
        assert!(!concat.contains(&"-c:v".to_string()));
    }

    #[test]
    fn test_missing_binary_is_tool_unavailable() {
        let engine = FfmpegEngine::new("definitely-not-a-real-ffmpeg-binary");
        let err = engine.preflight().unwrap_err();
        assert!(matches!(
            err,
            crate::error::MontageError::Engine(EngineError::ToolUnavailable { .. })
        ));
        assert_eq!(err.exit_code(), 2);
    }
}
