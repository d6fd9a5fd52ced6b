pub mod error;
pub mod traits;
pub mod types;

pub use error::{ReelError, VideoError};
pub use traits::{FrameImage, VideoChatRequest, VideoChatResponse, VisionChatProvider};
pub use types::{Device, GenerationParams, SamplingConfig, TemporalGroup, TemporalId, VideoInfo};
