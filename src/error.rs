use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the Montage-Compositor library
#[derive(Error, Debug)]
pub enum MontageError {
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Transcoding error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Timeline construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("Still at entry {index} has invalid duration {seconds}s (must be positive)")]
    InvalidDuration { index: usize, seconds: f64 },

    #[error("Invalid target resolution: {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Invalid frame rate: {fps}")]
    InvalidFrameRate { fps: f64 },

    #[error("Timeline has no entries")]
    Empty,
}

/// Errors raised while deciding or reading the source of a segment
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No video clip found in timeline (required by {policy} for still {still})")]
    NoClipFound { still: usize, policy: String },

    #[error("Source unavailable: {path} ({reason})")]
    Unavailable { path: PathBuf, reason: String },
}

/// Errors coming from the external transcoding engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{tool} not found in PATH")]
    ToolUnavailable { tool: String },

    #[error("{step} failed for {target}: {reason}")]
    RenderFailed {
        step: String,
        target: PathBuf,
        reason: String,
    },

    #[error("Concatenation failed: {reason}")]
    ConcatenationFailed { reason: String },

    #[error("{step} timed out after {secs} seconds")]
    TimedOut { step: String, secs: u64 },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path} ({reason})")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Unknown project '{name}'")]
    UnknownProject { name: String, available: Vec<String> },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using MontageError
pub type Result<T> = std::result::Result<T, MontageError>;

impl MontageError {
    /// Process exit status for this error. A missing transcoder gets its own code
    /// so wrappers can tell "install ffmpeg" apart from a broken project.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Engine(EngineError::ToolUnavailable { .. }) => 2,
            _ => 1,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Engine(EngineError::ToolUnavailable { tool }) => {
                format!("'{}' was not found in PATH. Install ffmpeg or point settings.ffmpeg at it.", tool)
            }
            Self::Source(SourceError::NoClipFound { policy, .. }) => {
                format!("The selected still policy ({}) needs at least one clip in the timeline.", policy)
            }
            Self::Source(SourceError::Unavailable { path, reason }) => {
                format!("Could not read '{}': {}. Check the path in the project configuration.", path.display(), reason)
            }
            Self::Config(ConfigError::UnknownProject { name, available }) => {
                format!("Project '{}' not found. Available projects: {}", name, available.join(", "))
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_has_distinct_exit_code() {
        let missing: MontageError = EngineError::ToolUnavailable { tool: "ffmpeg".into() }.into();
        let failed: MontageError = EngineError::ConcatenationFailed { reason: "boom".into() }.into();

        assert_eq!(missing.exit_code(), 2);
        assert_eq!(failed.exit_code(), 1);
        assert_ne!(missing.exit_code(), 0);
    }

    #[test]
    fn test_unknown_project_lists_alternatives() {
        let err: MontageError = ConfigError::UnknownProject {
            name: "nope".into(),
            available: vec!["braut".into(), "opa".into()],
        }
        .into();

        assert!(err.user_message().contains("braut, opa"));
    }
}
