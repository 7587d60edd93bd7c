//! CLI configuration

use anyhow::{Result, anyhow};

#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator API
    pub api_url: String,

    /// Creator id sent with generate/iterate and used for listings
    pub creator_id: Option<String>,
}

impl Config {
    pub fn creator(&self) -> Result<&str> {
        self.creator_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("No creator set; pass --creator or set REEL_CREATOR_ID"))
    }
}
