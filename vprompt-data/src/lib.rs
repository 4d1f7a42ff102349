pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod messages;
pub mod preferences;
pub mod preview;
pub mod upload;

pub use api::{AudioFile, HeicInfo, VoiceSample};
pub use client::{PromptForm, VPromptClient};
pub use config::{AppConfig, ConfigError, PollingConfig, StatusEndpoint};
pub use error::ClientError;
pub use jobs::{
    Backend, GenerationJob, ImageJobRequest, JobController, JobError, JobKind, JobOutcome,
    JobResult, JobStatus, JobView, ValidationError, VoiceJobRequest,
};
pub use messages::{Language, LocalizedText, Notice, NoticeLevel};
pub use preferences::{EmotionLevels, Preferences, VoiceSettings};
pub use preview::{
    build_pipeline, decode_data_url, first_success, texture_bytes, HeicConverter, Preview,
    PreviewError, PreviewSource, PreviewStrategy, TextureFormat, TextureImage,
};
pub use upload::{format_file_size, UploadCandidate, UploadError, UploadFile};
