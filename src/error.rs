use std::fmt;

/// Crate-level error. Every variant is recovered at the boundary of the
/// operation that raised it; engine state is left as it was before the call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToneError {
    Decode(DecodeError),
    Render(RenderError),
    Playback(PlaybackError),
    Upload(UploadError),
    Config(ConfigError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    Empty,
    UnsupportedFormat { detail: String },
    Malformed { detail: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    NoSource,
    InvalidBuffer { reason: String },
    InvalidSegment { start: f64, end: f64, duration: f64 },
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackError {
    NoSource,
    InvalidSegment { start: f64, end: f64 },
    DeviceRejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadError {
    NoSelection,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io { path: String, reason: String },
    Parse { reason: String },
    Invalid { field: &'static str, reason: String },
}

impl ToneError {
    /// Stable machine-readable code, e.g. `"render.no_source"`.
    pub fn code(&self) -> &'static str {
        match self {
            ToneError::Decode(e) => e.code(),
            ToneError::Render(e) => e.code(),
            ToneError::Playback(e) => e.code(),
            ToneError::Upload(e) => e.code(),
            ToneError::Config(e) => e.code(),
        }
    }
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::Empty => "decode.empty",
            DecodeError::UnsupportedFormat { .. } => "decode.unsupported_format",
            DecodeError::Malformed { .. } => "decode.malformed",
        }
    }
}

impl RenderError {
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::NoSource => "render.no_source",
            RenderError::InvalidBuffer { .. } => "render.invalid_buffer",
            RenderError::InvalidSegment { .. } => "render.invalid_segment",
            RenderError::Interrupted => "render.interrupted",
        }
    }
}

impl PlaybackError {
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackError::NoSource => "playback.no_source",
            PlaybackError::InvalidSegment { .. } => "playback.invalid_segment",
            PlaybackError::DeviceRejected { .. } => "playback.device_rejected",
        }
    }
}

impl UploadError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::NoSelection => "upload.no_selection",
            UploadError::Rejected { .. } => "upload.rejected",
        }
    }
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "config.io",
            ConfigError::Parse { .. } => "config.parse",
            ConfigError::Invalid { .. } => "config.invalid",
        }
    }
}

impl fmt::Display for ToneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneError::Decode(e) => write!(f, "Decode error: {e}"),
            ToneError::Render(e) => write!(f, "Render error: {e}"),
            ToneError::Playback(e) => write!(f, "Playback error: {e}"),
            ToneError::Upload(e) => write!(f, "Upload error: {e}"),
            ToneError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for ToneError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "source contains no audio data"),
            DecodeError::UnsupportedFormat { detail } => write!(f, "unsupported audio format ({detail})"),
            DecodeError::Malformed { detail } => write!(f, "could not decode audio ({detail})"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NoSource => write!(f, "no audio source is loaded"),
            RenderError::InvalidBuffer { reason } => write!(f, "invalid audio buffer: {reason}"),
            RenderError::InvalidSegment { start, end, duration } => write!(
                f,
                "segment [{start:.3}, {end:.3}] is outside the clip (duration {duration:.3}s)"
            ),
            RenderError::Interrupted => write!(f, "render task ended before producing a result"),
        }
    }
}

impl std::error::Error for RenderError {}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::NoSource => write!(f, "nothing to play"),
            PlaybackError::InvalidSegment { start, end } => {
                write!(f, "cannot play segment [{start:.3}, {end:.3}]")
            }
            PlaybackError::DeviceRejected { reason } => write!(f, "device refused to start playback: {reason}"),
        }
    }
}

impl std::error::Error for PlaybackError {}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::NoSelection => write!(f, "select a valid segment before submitting"),
            UploadError::Rejected { reason } => write!(f, "upload failed: {reason}"),
        }
    }
}

impl std::error::Error for UploadError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, reason } => write!(f, "cannot read {path}: {reason}"),
            ConfigError::Parse { reason } => write!(f, "invalid config JSON: {reason}"),
            ConfigError::Invalid { field, reason } => write!(f, "{field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<DecodeError> for ToneError {
    fn from(e: DecodeError) -> Self {
        ToneError::Decode(e)
    }
}

impl From<RenderError> for ToneError {
    fn from(e: RenderError) -> Self {
        ToneError::Render(e)
    }
}

impl From<PlaybackError> for ToneError {
    fn from(e: PlaybackError) -> Self {
        ToneError::Playback(e)
    }
}

impl From<UploadError> for ToneError {
    fn from(e: UploadError) -> Self {
        ToneError::Upload(e)
    }
}

impl From<ConfigError> for ToneError {
    fn from(e: ConfigError) -> Self {
        ToneError::Config(e)
    }
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::FormatError(msg) => DecodeError::UnsupportedFormat { detail: msg.to_string() },
            hound::Error::Unsupported => DecodeError::UnsupportedFormat {
                detail: "unsupported WAV encoding".to_string(),
            },
            other => DecodeError::Malformed { detail: other.to_string() },
        }
    }
}
