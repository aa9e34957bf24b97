use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    timeline::{Resolution, SourcePolicy, Timeline, TimelineEntry},
    video::{SegmentFormat, StillStrategy},
};

/// Main configuration: run settings plus named projects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project used when none is given on the command line
    pub active: String,

    /// Settings shared by every project
    #[serde(default)]
    pub settings: Settings,

    /// Projects by name
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.message().to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up a project by name
    pub fn project(&self, name: &str) -> Result<&ProjectConfig> {
        self.projects.get(name).ok_or_else(|| {
            ConfigError::UnknownProject {
                name: name.to_string(),
                available: self.projects.keys().cloned().collect(),
            }
            .into()
        })
    }

    /// The project named by `active`
    pub fn active_project(&self) -> Result<&ProjectConfig> {
        self.project(&self.active)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        for (name, project) in &self.projects {
            project.validate(name)?;
        }
        Ok(())
    }
}

/// Settings shared by every project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Output frame rate
    pub fps: f64,

    /// Scratch directory, relative to the config file
    pub workdir: PathBuf,

    /// ffmpeg binary name or path
    pub ffmpeg: String,

    /// Video codec every segment is encoded with
    pub codec: String,

    /// Pixel format every segment is normalized to
    pub pixel_format: String,

    /// How shared-source stills are produced
    pub still_strategy: StillStrategy,

    /// Kill any single ffmpeg call running longer than this
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps: 30.0,
            workdir: PathBuf::from("_work"),
            ffmpeg: "ffmpeg".to_string(),
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            still_strategy: StillStrategy::Master,
            timeout_secs: None,
        }
    }
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "settings.fps".to_string(),
                value: self.fps.to_string(),
            }
            .into());
        }

        for (key, value) in [
            ("settings.ffmpeg", &self.ffmpeg),
            ("settings.codec", &self.codec),
            ("settings.pixel_format", &self.pixel_format),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                }
                .into());
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "settings.timeout_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Format every segment of a run at `resolution` is encoded to
    pub fn segment_format(&self, resolution: Resolution) -> SegmentFormat {
        SegmentFormat {
            resolution,
            fps: self.fps,
            pixel_format: self.pixel_format.clone(),
            codec: self.codec.clone(),
        }
    }
}

/// One timeline line as written in the config, e.g. `{ still = 5 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryConfig {
    Still(f64),
    Clip(PathBuf),
}

/// Everything that describes one montage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Image used by stills when no clip frame applies
    pub image: PathBuf,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    pub timeline: Vec<EntryConfig>,

    #[serde(default)]
    pub use_first_frame: bool,

    #[serde(default)]
    pub use_next_video_frame: bool,

    #[serde(default)]
    pub use_last_video_frame: bool,

    /// Output file, relative to the config file
    pub output: PathBuf,
}

impl ProjectConfig {
    fn validate(&self, name: &str) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidValue {
                key: format!("projects.{}.resolution", name),
                value: format!("{}x{}", self.width, self.height),
            }
            .into());
        }

        if self.output.file_name().is_none() {
            return Err(ConfigError::InvalidValue {
                key: format!("projects.{}.output", name),
                value: self.output.display().to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Output file name, used for the artifact inside the workspace
    pub fn output_name(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output.mp4".to_string())
    }

    pub fn policy(&self, base_dir: &Path) -> SourcePolicy {
        SourcePolicy::static_image(base_dir.join(&self.image))
            .with_next_clip_frame(self.use_next_video_frame)
            .with_last_previous_clip_frame(self.use_last_video_frame)
            .with_first_clip_frame(self.use_first_frame)
    }

    /// Build the validated timeline, resolving media paths against `base_dir`
    pub fn timeline(&self, base_dir: &Path, fps: f64) -> Result<Timeline> {
        let entries = self
            .timeline
            .iter()
            .map(|entry| match entry {
                EntryConfig::Still(seconds) => TimelineEntry::still(*seconds),
                EntryConfig::Clip(path) => TimelineEntry::clip(base_dir.join(path)),
            })
            .collect();

        Ok(Timeline::new(entries, self.resolution(), fps, self.policy(base_dir))?)
    }
}
