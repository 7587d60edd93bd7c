//! Orchestrator configuration
//!
//! Defines every tunable of the orchestrator: storage locations, the render
//! backend switch, polling budgets and worker limits. Values come from the
//! environment once at startup; nothing here changes while jobs run.

use reel_core::domain::render::RenderMode;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; `None` keeps jobs in memory
    pub database_url: Option<String>,

    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// Render farm base URL (distributed mode)
    pub render_farm_url: Option<String>,

    /// Render farm function identifier (distributed mode)
    pub render_function: Option<String>,

    /// Delay between two render farm polls
    pub render_poll_interval: Duration,

    /// Polls before a distributed render is declared timed out
    pub render_max_polls: u32,

    /// Program invoked to render locally
    pub renderer_bin: String,

    /// Upper bound for one local render
    pub local_render_timeout: Duration,

    /// Timeout for one request to the render farm or the artifact store
    pub remote_request_timeout: Duration,

    /// HTTP artifact store base URL; takes precedence over `artifact_dir`
    pub artifact_url: Option<String>,

    /// Directory for the filesystem artifact store
    pub artifact_dir: PathBuf,

    /// Public URL serving `artifact_dir`; `file://` URLs when unset
    pub artifact_public_url: Option<String>,

    /// Generation service backing the four pipeline stages
    pub stage_service_url: String,

    /// Timeout for a single stage request
    pub stage_timeout: Duration,

    /// Jobs executed concurrently
    pub max_parallel_jobs: usize,

    /// Automatic retries per stage (0 disables retrying)
    pub stage_max_retries: u32,

    /// First retry delay, doubled after every attempt
    pub stage_retry_base: Duration,

    /// How often queued jobs are swept back into the scheduler
    pub sweep_interval: Duration,

    /// Default page size for job listings
    pub list_page_size: u32,
}

/// Listings never return more than this many jobs.
pub const MAX_PAGE_SIZE: u32 = 100;

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognised variables:
    /// - DATABASE_URL (optional, in-memory store when unset)
    /// - REEL_BIND_ADDR (default: 0.0.0.0:8080)
    /// - REEL_RENDER_FARM_URL, REEL_RENDER_FUNCTION (both set: distributed mode)
    /// - REEL_RENDER_POLL_INTERVAL_MS (default: 2000)
    /// - REEL_RENDER_MAX_POLLS (default: 450)
    /// - REEL_RENDERER_BIN (default: remotion-render)
    /// - REEL_LOCAL_RENDER_TIMEOUT_SECS (default: 900)
    /// - REEL_REMOTE_REQUEST_TIMEOUT_SECS (default: 30)
    /// - REEL_ARTIFACT_URL / REEL_ARTIFACT_DIR (default dir: ./artifacts)
    /// - REEL_ARTIFACT_PUBLIC_URL (optional, base URL serving REEL_ARTIFACT_DIR)
    /// - REEL_STAGE_SERVICE_URL (default: http://localhost:8090)
    /// - REEL_STAGE_TIMEOUT_SECS (default: 300)
    /// - REEL_MAX_PARALLEL_JOBS (default: 4)
    /// - REEL_STAGE_MAX_RETRIES (default: 0)
    /// - REEL_STAGE_RETRY_BASE_MS (default: 500)
    /// - REEL_SWEEP_INTERVAL_SECS (default: 30)
    /// - REEL_LIST_PAGE_SIZE (default: 50)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unparseable or out-of-range numbers fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let millis = |key: &str| parsed::<u64>(text(key)).map(Duration::from_millis);
        let secs = |key: &str| parsed::<u64>(text(key)).map(Duration::from_secs);

        Self {
            database_url: text("DATABASE_URL"),
            bind_addr: text("REEL_BIND_ADDR").unwrap_or(defaults.bind_addr),
            render_farm_url: text("REEL_RENDER_FARM_URL"),
            render_function: text("REEL_RENDER_FUNCTION"),
            render_poll_interval: millis("REEL_RENDER_POLL_INTERVAL_MS")
                .unwrap_or(defaults.render_poll_interval),
            render_max_polls: parsed(text("REEL_RENDER_MAX_POLLS"))
                .unwrap_or(defaults.render_max_polls),
            renderer_bin: text("REEL_RENDERER_BIN").unwrap_or(defaults.renderer_bin),
            local_render_timeout: secs("REEL_LOCAL_RENDER_TIMEOUT_SECS")
                .unwrap_or(defaults.local_render_timeout),
            remote_request_timeout: secs("REEL_REMOTE_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.remote_request_timeout),
            artifact_url: text("REEL_ARTIFACT_URL"),
            artifact_dir: text("REEL_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            artifact_public_url: text("REEL_ARTIFACT_PUBLIC_URL"),
            stage_service_url: text("REEL_STAGE_SERVICE_URL").unwrap_or(defaults.stage_service_url),
            stage_timeout: secs("REEL_STAGE_TIMEOUT_SECS").unwrap_or(defaults.stage_timeout),
            max_parallel_jobs: parsed(text("REEL_MAX_PARALLEL_JOBS"))
                .unwrap_or(defaults.max_parallel_jobs),
            stage_max_retries: parsed(text("REEL_STAGE_MAX_RETRIES"))
                .unwrap_or(defaults.stage_max_retries),
            stage_retry_base: millis("REEL_STAGE_RETRY_BASE_MS")
                .unwrap_or(defaults.stage_retry_base),
            sweep_interval: secs("REEL_SWEEP_INTERVAL_SECS").unwrap_or(defaults.sweep_interval),
            list_page_size: parsed(text("REEL_LIST_PAGE_SIZE"))
                .unwrap_or(defaults.list_page_size),
        }
    }

    /// Render backend selected by this configuration.
    pub fn render_mode(&self) -> RenderMode {
        RenderMode::select(
            self.render_farm_url.as_deref(),
            self.render_function.as_deref(),
        )
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("stage_service_url", Some(self.stage_service_url.as_str())),
            ("render_farm_url", self.render_farm_url.as_deref()),
            ("artifact_url", self.artifact_url.as_deref()),
            ("artifact_public_url", self.artifact_public_url.as_deref()),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("{} must start with http:// or https://", name);
                }
            }
        }

        if self.render_mode() == RenderMode::Distributed {
            if self.render_poll_interval.is_zero() {
                anyhow::bail!("render_poll_interval must be greater than 0");
            }
            if self.render_max_polls == 0 {
                anyhow::bail!("render_max_polls must be greater than 0");
            }
        } else if self.renderer_bin.trim().is_empty() {
            anyhow::bail!("renderer_bin cannot be empty in local render mode");
        }

        if self.remote_request_timeout.is_zero() {
            anyhow::bail!("remote_request_timeout must be greater than 0");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.list_page_size == 0 || self.list_page_size > MAX_PAGE_SIZE {
            anyhow::bail!("list_page_size must be between 1 and {}", MAX_PAGE_SIZE);
        }

        if self.sweep_interval.is_zero() {
            anyhow::bail!("sweep_interval must be greater than 0");
        }

        Ok(())
    }
}

fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "0.0.0.0:8080".to_string(),
            render_farm_url: None,
            render_function: None,
            render_poll_interval: Duration::from_secs(2),
            render_max_polls: 450, // 15 minutes at the default interval
            renderer_bin: "remotion-render".to_string(),
            local_render_timeout: Duration::from_secs(900),
            remote_request_timeout: Duration::from_secs(30),
            artifact_url: None,
            artifact_dir: PathBuf::from("./artifacts"),
            artifact_public_url: None,
            stage_service_url: "http://localhost:8090".to_string(),
            stage_timeout: Duration::from_secs(300),
            max_parallel_jobs: 4,
            stage_max_retries: 0,
            stage_retry_base: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(30),
            list_page_size: 50,
        }
    }
}
