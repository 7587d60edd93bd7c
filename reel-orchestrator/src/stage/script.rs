//! Script stage fallback
//!
//! A failed or unusable script is asked for once more in simplified form.
//! If that fails too, a five-beat script is built from the prompt alone so
//! the job keeps moving.

use super::{ScriptRequest, ScriptWriter, StageError};
use async_trait::async_trait;
use reel_core::domain::script::{ColorPalette, OnScreenText, ScriptScene, VideoScript};
use std::sync::Arc;

/// Longest topic used in headlines and image prompts.
const TOPIC_CHARS: usize = 60;

/// Share of the video, in percent, given to each beat before the closing one.
const BEAT_SHARES: [u32; 4] = [8, 17, 33, 25];

/// First line of the prompt, shortened for on-screen use.
fn topic(prompt: &str) -> String {
    let line = prompt.lines().map(str::trim).find(|l| !l.is_empty());
    let line = line.unwrap_or("this topic");
    if line.chars().count() <= TOPIC_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(TOPIC_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// Deterministic script: hook, problem, solution, proof and call to action.
///
/// Beat lengths follow [`BEAT_SHARES`] with the remainder going to the call
/// to action, so they always add up to the target duration. Beats that
/// round down to nothing are left out.
pub fn fallback_script(req: &ScriptRequest) -> VideoScript {
    let topic = topic(&req.prompt);
    let total = req.target_duration_seconds.max(1);

    let mut durations: Vec<u32> = BEAT_SHARES.iter().map(|share| total * share / 100).collect();
    let used: u32 = durations.iter().sum();
    durations.push(total - used);

    let beats = [
        (
            "hook",
            format!("Here is what you need to know about {}.", topic),
            topic.clone(),
            "intrigue",
            "Dark background with a subtle glow, bold text entrance",
        ),
        (
            "problem",
            "Most people get this wrong.".to_string(),
            "Stop Guessing.".to_string(),
            "frustration",
            "Moody tones with text revealing the pain point",
        ),
        (
            "solution",
            format!("{} makes it simple.", topic),
            topic.clone(),
            "excitement",
            "Bright accent colors revealing the key idea",
        ),
        (
            "proof",
            "It works, and it has worked for many before you.".to_string(),
            "Proven In Practice".to_string(),
            "authority",
            "Stats and social proof with animated counters",
        ),
        (
            "cta",
            "Start today.".to_string(),
            "Start Today".to_string(),
            "urgency",
            "Strong call to action in brand colors",
        ),
    ];

    let scenes: Vec<ScriptScene> = beats
        .into_iter()
        .zip(durations)
        .filter(|(_, seconds)| *seconds > 0)
        .map(|((id, voiceover, headline, mood, direction), seconds)| ScriptScene {
            id: id.to_string(),
            duration_seconds: seconds,
            voiceover: Some(voiceover),
            on_screen_text: OnScreenText {
                headline: Some(headline),
                ..Default::default()
            },
            visual_direction: direction.to_string(),
            mood: mood.to_string(),
        })
        .collect();

    let voiceover_script = scenes
        .iter()
        .filter_map(|s| s.voiceover.as_deref())
        .collect::<Vec<_>>()
        .join(" ");

    VideoScript {
        total_duration_seconds: total,
        voiceover_script,
        scenes,
        color_palette: ColorPalette::default(),
        image_prompts: vec![
            format!("{}, dramatic lighting, cinematic, professional, 8k", topic),
            "Abstract glowing lines on a dark background, cinematic lighting, 8k".to_string(),
            format!("{}, warm lighting, high quality, cinematic", topic),
        ],
    }
}

/// Script writer that always hands the pipeline a usable script.
///
/// The primary writer gets the request as is, then once more with
/// `simplified` set. Its output is validated both times.
pub struct FallbackScriptWriter {
    primary: Arc<dyn ScriptWriter>,
}

impl FallbackScriptWriter {
    pub fn new(primary: Arc<dyn ScriptWriter>) -> Self {
        Self { primary }
    }
}

#[async_trait]
impl ScriptWriter for FallbackScriptWriter {
    async fn write_script(&self, req: &ScriptRequest) -> Result<VideoScript, StageError> {
        let simplified = ScriptRequest {
            simplified: true,
            ..req.clone()
        };

        for attempt in [req, &simplified] {
            match self.primary.write_script(attempt).await {
                Ok(script) => match script.validate() {
                    Ok(()) => return Ok(script),
                    Err(reason) => tracing::warn!(
                        simplified = attempt.simplified,
                        reason = %reason,
                        "Generated script rejected"
                    ),
                },
                Err(e) => tracing::warn!(
                    simplified = attempt.simplified,
                    error = %e,
                    "Script generation failed"
                ),
            }
        }

        tracing::info!("Using fallback script");
        let script = fallback_script(req);
        script.validate().map_err(StageError::InvalidOutput)?;
        Ok(script)
    }
}
