//! Stage functions
//!
//! The four generation steps of the pipeline sit behind small traits so the
//! orchestrator never depends on a particular model vendor. Each call either
//! returns its complete output or a `StageError` whose message ends up on
//! the job.

pub mod code;
pub mod http;
pub mod script;

pub use code::FallbackCodeGenerator;
pub use http::HttpStageClient;
pub use script::FallbackScriptWriter;

use async_trait::async_trait;
use reel_core::domain::script::{VideoScript, WordTiming};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The generator refused or failed with its own explanation
    #[error("{0}")]
    Rejected(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

impl StageError {
    /// Whether retrying the same call can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StageError::Transport(e) => !e.is_decode(),
            StageError::TimedOut(_) | StageError::Rejected(_) => true,
            StageError::InvalidOutput(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRequest {
    pub prompt: String,
    pub style: String,
    pub target_duration_seconds: u32,
    pub aspect_ratio: String,
    /// Ask for a plain, short script instead of the full treatment
    pub simplified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompts: Vec<String>,
    pub style: String,
    pub aspect_ratio: String,
}

/// One generated image, ready for the artifact store
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrationRequest {
    pub text: String,
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub duration_seconds: f64,
    pub words: Vec<WordTiming>,
}

/// Narration track as seen by the code generator
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub url: String,
    pub duration_seconds: f64,
    pub words: Vec<WordTiming>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeRequest {
    pub script: VideoScript,
    pub image_urls: Vec<String>,
    pub audio: Option<AudioTrack>,
    pub total_frames: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Composition of the parent job when iterating
    pub previous_code: Option<String>,
    pub iteration_feedback: Option<String>,
    /// Problems found in the previous attempt's output, to be fixed
    pub repair_notes: Vec<String>,
}

#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write_script(&self, req: &ScriptRequest) -> Result<VideoScript, StageError>;
}

#[async_trait]
pub trait Illustrator: Send + Sync {
    async fn illustrate(&self, req: &ImageRequest) -> Result<Vec<GeneratedImage>, StageError>;
}

#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, req: &NarrationRequest) -> Result<Narration, StageError>;
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Returns the composition source
    async fn generate_code(&self, req: &CodeRequest) -> Result<String, StageError>;
}

/// The stage implementations a pipeline runs with
#[derive(Clone)]
pub struct Stages {
    pub script_writer: Arc<dyn ScriptWriter>,
    pub illustrator: Arc<dyn Illustrator>,
    pub narrator: Arc<dyn Narrator>,
    pub code_generator: Arc<dyn CodeGenerator>,
}

impl Stages {
    /// Every stage served by one generation service, with template fallbacks
    /// for scripting and code generation.
    pub fn from_service(client: HttpStageClient) -> Self {
        let client = Arc::new(client);
        Self {
            script_writer: Arc::new(FallbackScriptWriter::new(client.clone())),
            illustrator: client.clone(),
            narrator: client.clone(),
            code_generator: Arc::new(FallbackCodeGenerator::new(client)),
        }
    }
}
