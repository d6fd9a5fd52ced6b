//! Video sampling for multimodal chat.
//!
//! [`VideoEncoder`] opens a video through a [`VideoBackend`], decides a frame
//! budget and temporal packing from its duration and the requested sampling
//! rate, and returns RGB stills together with temporal id groups.

pub mod encoder;
pub mod ffmpeg;
pub mod frame_codec;
pub mod mime_detect;
pub mod plan;
pub mod source;
pub mod synthetic;
pub mod temporal;

pub use encoder::{EncodeSummary, EncodedVideo, SampledFrame, VideoEncoder, VideoPreview};
pub use ffmpeg::FfmpegBackend;
pub use frame_codec::{encode_frame, encode_frames, save_frames, FrameFormat};
pub use mime_detect::{detect_mime_type, is_video, validate_video_file, VideoFileReport};
pub use plan::{uniform_sample, BudgetPath, SamplingPlan};
pub use source::{VideoBackend, VideoSource};
pub use synthetic::{SyntheticBackend, SyntheticVideo};
pub use temporal::{group_ids, temporal_ids, TimeAxis};
