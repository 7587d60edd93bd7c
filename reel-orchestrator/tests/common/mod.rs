//! Shared harness for the pipeline integration tests
//!
//! Everything runs in process: jobs in memory, artifacts in a temporary
//! directory, stages scripted in Rust and the render farm served by axum on
//! an ephemeral port.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use reel_core::domain::artifact::ArtifactId;
use reel_core::domain::job::{JobStatus, VideoJob};
use reel_core::domain::render::RenderMode;
use reel_core::domain::script::{ColorPalette, OnScreenText, ScriptScene, VideoScript, WordTiming};
use reel_core::dto::job::{GenerateOptions, GenerateVideo, IterateVideo};
use reel_orchestrator::artifact::FsArtifactStore;
use reel_orchestrator::pipeline::{Pipeline, RetryPolicy};
use reel_orchestrator::render::local::LocalRenderJob;
use reel_orchestrator::render::{
    CompositionRenderer, DistributedRenderBackend, LocalRenderBackend, PollPolicy, RenderBackend,
    RenderError, RenderObserver,
};
use reel_orchestrator::repository::{
    self, ArtifactPatch, CancelOutcome, InMemoryJobRepository, JobRepository, NewJob,
    StaticCreatorDirectory,
};
use reel_orchestrator::scheduler::NoopDispatcher;
use reel_orchestrator::service::VideoService;
use reel_orchestrator::stage::{
    CodeGenerator, CodeRequest, FallbackCodeGenerator, FallbackScriptWriter, GeneratedImage,
    ImageRequest, Illustrator, Narration, NarrationRequest, Narrator, ScriptRequest, ScriptWriter,
    StageError, Stages,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use uuid::Uuid;

pub const CREATOR: &str = "creator-1";

/// Composition returned by [`FakeStages`] unless overridden
pub const GENERATED_CODE: &str =
    "var MyVideo = function() { return React.createElement(AbsoluteFill, null); };\nreturn MyVideo;";

// =============================================================================
// Stages
// =============================================================================

/// Scripted stand-in for the generation service
#[derive(Default)]
pub struct FakeStages {
    /// Every illustration call fails with this message
    pub image_error: Option<String>,
    /// Illustration calls that fail before one succeeds
    pub transient_image_failures: AtomicU32,
    /// Returned by the code generator instead of [`GENERATED_CODE`]
    pub code_override: Option<String>,
    /// Delay before every script is returned
    pub script_delay: Option<Duration>,
    /// Script requests that fail before one succeeds
    pub failed_scripts: AtomicU32,
    pub script_requests: Mutex<Vec<ScriptRequest>>,
    pub code_requests: Mutex<Vec<CodeRequest>>,
}

impl FakeStages {
    pub fn into_stages(self) -> (Arc<Self>, Stages) {
        let fake = Arc::new(self);
        let stages = Stages {
            script_writer: Arc::new(FallbackScriptWriter::new(fake.clone())),
            illustrator: fake.clone(),
            narrator: fake.clone(),
            code_generator: Arc::new(FallbackCodeGenerator::new(fake.clone())),
        };
        (fake, stages)
    }

    pub fn script_requests(&self) -> Vec<ScriptRequest> {
        self.script_requests.lock().unwrap().clone()
    }

    pub fn code_requests(&self) -> Vec<CodeRequest> {
        self.code_requests.lock().unwrap().clone()
    }
}

/// Three equal scenes covering the target duration, two image prompts
pub fn script_for(target_duration_seconds: u32) -> VideoScript {
    let per_scene = (target_duration_seconds / 3).max(1);
    let scenes = ["hook", "explain", "cta"]
        .iter()
        .map(|id| ScriptScene {
            id: id.to_string(),
            duration_seconds: per_scene,
            voiceover: Some(format!("{} line", id)),
            on_screen_text: OnScreenText {
                headline: Some(id.to_uppercase()),
                ..Default::default()
            },
            visual_direction: "slow zoom".to_string(),
            mood: "curious".to_string(),
        })
        .collect();

    VideoScript {
        total_duration_seconds: target_duration_seconds,
        voiceover_script: "hook line. explain line. cta line.".to_string(),
        scenes,
        color_palette: ColorPalette::default(),
        image_prompts: vec!["a server rack".to_string(), "a packet".to_string()],
    }
}

#[async_trait]
impl ScriptWriter for FakeStages {
    async fn write_script(&self, req: &ScriptRequest) -> Result<VideoScript, StageError> {
        self.script_requests.lock().unwrap().push(req.clone());
        if let Some(delay) = self.script_delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self
            .failed_scripts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failed.is_ok() {
            return Err(StageError::Rejected("model overloaded".to_string()));
        }
        Ok(script_for(req.target_duration_seconds))
    }
}

#[async_trait]
impl Illustrator for FakeStages {
    async fn illustrate(&self, req: &ImageRequest) -> Result<Vec<GeneratedImage>, StageError> {
        if let Some(message) = &self.image_error {
            return Err(StageError::Rejected(message.clone()));
        }
        let failed = self
            .transient_image_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failed.is_ok() {
            return Err(StageError::Rejected("rate limited".to_string()));
        }

        Ok(req
            .prompts
            .iter()
            .map(|prompt| GeneratedImage {
                bytes: format!("jpeg:{}", prompt).into_bytes(),
                content_type: "image/jpeg".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl Narrator for FakeStages {
    async fn narrate(&self, req: &NarrationRequest) -> Result<Narration, StageError> {
        let words = req
            .text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| WordTiming {
                word: word.to_string(),
                start: i as f64 * 0.4,
                end: i as f64 * 0.4 + 0.35,
            })
            .collect();
        Ok(Narration {
            bytes: b"mp3-bytes".to_vec(),
            content_type: "audio/mpeg".to_string(),
            duration_seconds: 57.5,
            words,
        })
    }
}

#[async_trait]
impl CodeGenerator for FakeStages {
    async fn generate_code(&self, req: &CodeRequest) -> Result<String, StageError> {
        self.code_requests.lock().unwrap().push(req.clone());
        Ok(self
            .code_override
            .clone()
            .unwrap_or_else(|| GENERATED_CODE.to_string()))
    }
}

// =============================================================================
// Render backends
// =============================================================================

/// Local renderer that writes a fixed file and remembers its scratch dir
#[derive(Default)]
pub struct FakeRenderer {
    pub scratch: Mutex<Option<PathBuf>>,
    pub frames: Mutex<Option<u32>>,
    /// Keep rendering until cancelled or timed out
    pub hang: bool,
}

impl FakeRenderer {
    pub fn scratch(&self) -> Option<PathBuf> {
        self.scratch.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompositionRenderer for FakeRenderer {
    async fn render(
        &self,
        job: &LocalRenderJob<'_>,
        observer: &dyn RenderObserver,
    ) -> Result<(), RenderError> {
        *self.scratch.lock().unwrap() = job.output.parent().map(Path::to_path_buf);
        *self.frames.lock().unwrap() = Some(job.spec.total_frames);

        if self.hang {
            observer.on_progress(0.5).await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        for step in 1..=4 {
            observer.on_progress(step as f64 / 4.0).await;
        }
        tokio::fs::write(&job.output, b"local-mp4").await?;
        Ok(())
    }
}

pub fn local_backend(renderer: Arc<FakeRenderer>) -> Arc<dyn RenderBackend> {
    Arc::new(LocalRenderBackend::new(renderer, Duration::from_secs(10)))
}

/// Render farm answering polls from a script of progress reports
#[derive(Clone)]
pub struct FakeFarm {
    pub base: String,
    state: Arc<FarmState>,
}

struct FarmState {
    reports: Vec<Value>,
    polls: AtomicU32,
    submitted: Mutex<Vec<Value>>,
}

impl FakeFarm {
    /// Serves `reports` in order, repeating the last one. A report with
    /// `"done": true` gets an `outputFile` pointing back at the farm.
    pub async fn start(reports: Vec<Value>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(FarmState {
            reports,
            polls: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
        });

        let output_url = format!("{}/output/out.mp4", base);
        let app = Router::new()
            .route(
                "/functions/render-fn/renders",
                post(
                    |State(state): State<Arc<FarmState>>, Json(body): Json<Value>| async move {
                        state.submitted.lock().unwrap().push(body);
                        Json(json!({"renderId": "r-1", "bucketName": "bucket-a"}))
                    },
                ),
            )
            .route(
                "/functions/render-fn/renders/{id}",
                get(move |State(state): State<Arc<FarmState>>| {
                    let output_url = output_url.clone();
                    async move {
                        let n = state.polls.fetch_add(1, Ordering::SeqCst) as usize;
                        let mut report = state
                            .reports
                            .get(n)
                            .or(state.reports.last())
                            .cloned()
                            .unwrap_or_else(|| json!({"overallProgress": 0.0, "done": false}));
                        if report["done"] == json!(true) {
                            report["outputFile"] = json!(output_url);
                        }
                        Json(report)
                    }
                }),
            )
            .route("/output/out.mp4", get(|| async { b"farm-mp4".to_vec() }))
            .with_state(state.clone());

        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Self { base, state }
    }

    pub fn backend(&self, max_polls: u32) -> Arc<dyn RenderBackend> {
        Arc::new(DistributedRenderBackend::new(
            &self.base,
            "render-fn",
            PollPolicy {
                interval: Duration::from_millis(5),
                max_polls,
            },
        ))
    }

    pub fn polls(&self) -> u32 {
        self.state.polls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<Value> {
        self.state.submitted.lock().unwrap().clone()
    }
}

pub fn progress_report(fraction: f64) -> Value {
    json!({"overallProgress": fraction, "done": false, "fatalErrorEncountered": false, "errors": []})
}

pub fn done_report() -> Value {
    json!({"overallProgress": 1.0, "done": true, "fatalErrorEncountered": false, "errors": []})
}

pub fn fatal_report(fraction: f64, message: &str) -> Value {
    json!({
        "overallProgress": fraction,
        "done": false,
        "fatalErrorEncountered": true,
        "errors": [{"message": message}]
    })
}

// =============================================================================
// Job store
// =============================================================================

/// One progress write as the pipeline asked for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressWrite {
    /// Status entered with the write, `None` for a plain progress update
    pub status: Option<JobStatus>,
    pub progress: u8,
}

/// In-memory job store that remembers every progress write
pub struct RecordingJobs {
    inner: Arc<InMemoryJobRepository>,
    writes: Mutex<Vec<ProgressWrite>>,
}

impl RecordingJobs {
    pub fn new(inner: Arc<InMemoryJobRepository>) -> Self {
        Self {
            inner,
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn writes(&self) -> Vec<ProgressWrite> {
        self.writes.lock().unwrap().clone()
    }

    fn record(&self, status: Option<JobStatus>, progress: u8) {
        self.writes
            .lock()
            .unwrap()
            .push(ProgressWrite { status, progress });
    }
}

#[async_trait]
impl JobRepository for RecordingJobs {
    async fn create(&self, job: NewJob) -> repository::Result<VideoJob> {
        self.inner.create(job).await
    }

    async fn find_by_id(&self, id: Uuid) -> repository::Result<Option<VideoJob>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_creator(
        &self,
        creator_id: &str,
        limit: u32,
    ) -> repository::Result<Vec<VideoJob>> {
        self.inner.find_by_creator(creator_id, limit).await
    }

    async fn find_by_status(&self, status: JobStatus) -> repository::Result<Vec<VideoJob>> {
        self.inner.find_by_status(status).await
    }

    async fn find_latest_child(&self, parent_id: Uuid) -> repository::Result<Option<VideoJob>> {
        self.inner.find_latest_child(parent_id).await
    }

    async fn claim(&self, id: Uuid) -> repository::Result<Option<VideoJob>> {
        self.inner.claim(id).await
    }

    async fn advance(&self, id: Uuid, status: JobStatus, progress: u8) -> repository::Result<bool> {
        self.record(Some(status), progress);
        self.inner.advance(id, status, progress).await
    }

    async fn update_progress(&self, id: Uuid, progress: u8) -> repository::Result<()> {
        self.record(None, progress);
        self.inner.update_progress(id, progress).await
    }

    async fn record_artifacts(&self, id: Uuid, patch: ArtifactPatch) -> repository::Result<()> {
        self.inner.record_artifacts(id, patch).await
    }

    async fn increment_retry(&self, id: Uuid) -> repository::Result<u32> {
        self.inner.increment_retry(id).await
    }

    async fn record_render(
        &self,
        id: Uuid,
        mode: RenderMode,
        duration_seconds: f64,
    ) -> repository::Result<()> {
        self.inner.record_render(id, mode, duration_seconds).await
    }

    async fn complete(
        &self,
        id: Uuid,
        video_id: ArtifactId,
        thumbnail_id: Option<ArtifactId>,
    ) -> repository::Result<bool> {
        self.record(Some(JobStatus::Completed), 100);
        self.inner.complete(id, video_id, thumbnail_id).await
    }

    async fn fail(&self, id: Uuid, error: &str) -> repository::Result<bool> {
        self.inner.fail(id, error).await
    }

    async fn mark_cancelled(&self, id: Uuid) -> repository::Result<bool> {
        self.inner.mark_cancelled(id).await
    }

    async fn request_cancel(&self, id: Uuid) -> repository::Result<Option<CancelOutcome>> {
        self.inner.request_cancel(id).await
    }

    async fn is_cancel_requested(&self, id: Uuid) -> repository::Result<bool> {
        self.inner.is_cancel_requested(id).await
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Service plus pipeline over in-memory collaborators.
///
/// Dispatch is a no-op: tests drive `pipeline.run` themselves.
pub struct TestEnv {
    pub jobs: Arc<InMemoryJobRepository>,
    /// The pipeline's view of `jobs`
    pub recorded: Arc<RecordingJobs>,
    pub artifacts: Arc<FsArtifactStore>,
    pub service: VideoService,
    pub pipeline: Arc<Pipeline>,
    _dir: TempDir,
}

impl TestEnv {
    pub async fn new(stages: Stages, backend: Arc<dyn RenderBackend>) -> Self {
        Self::with_retry(stages, backend, RetryPolicy::NONE).await
    }

    pub async fn with_retry(
        stages: Stages,
        backend: Arc<dyn RenderBackend>,
        retry: RetryPolicy,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(InMemoryJobRepository::new());
        let recorded = Arc::new(RecordingJobs::new(jobs.clone()));
        let artifacts = Arc::new(FsArtifactStore::open(dir.path()).await.unwrap());

        let pipeline =
            Pipeline::new(recorded.clone(), artifacts.clone(), stages, backend).with_retry(retry);
        let service = VideoService::new(
            jobs.clone(),
            Arc::new(StaticCreatorDirectory::open()),
            artifacts.clone(),
            Arc::new(NoopDispatcher),
            50,
        );

        Self {
            jobs,
            recorded,
            artifacts,
            service,
            pipeline: Arc::new(pipeline),
            _dir: dir,
        }
    }

    pub fn artifact_root(&self) -> &Path {
        self.artifacts.root()
    }
}

pub fn generate_request(prompt: &str) -> GenerateVideo {
    GenerateVideo {
        creator_id: CREATOR.to_string(),
        prompt: prompt.to_string(),
        options: GenerateOptions::default(),
    }
}

pub fn iterate_request(feedback: &str) -> IterateVideo {
    IterateVideo {
        creator_id: CREATOR.to_string(),
        feedback: feedback.to_string(),
    }
}
