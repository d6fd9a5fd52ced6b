use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while opening, sampling or decoding a video.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("cannot open video {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    /// Frame count and temporal id count diverged. Always a decoder or logic bug.
    #[error("frame count ({frames}) does not match temporal id count ({temporal_ids})")]
    Consistency { frames: usize, temporal_ids: usize },

    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: usize, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl VideoError {
    pub fn open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(index: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            index,
            reason: reason.into(),
        }
    }
}

/// Top-level error type for the reelchat runtime.
#[derive(Debug, Error)]
pub enum ReelError {
    #[error(transparent)]
    Video(#[from] VideoError),

    #[error("inference provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_message_carries_both_counts() {
        let err = VideoError::Consistency {
            frames: 29,
            temporal_ids: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("29"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn video_error_converts_into_reel_error() {
        let err: ReelError = VideoError::open("/missing.mp4", "no such file").into();
        assert!(matches!(err, ReelError::Video(VideoError::Open { .. })));
        assert!(err.to_string().contains("/missing.mp4"));
    }
}
