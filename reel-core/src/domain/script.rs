//! Video script domain types
//!
//! The scripting stage breaks a prompt into timed scenes with narration,
//! on-screen copy, visual direction and image prompts. Imaging, narration
//! and code generation all consume it.

use serde::{Deserialize, Serialize};

/// No scene may outlast the longest video a job can ask for.
pub const MAX_SCENE_SECONDS: u32 = 600;

/// Scene-by-scene breakdown of one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoScript {
    pub total_duration_seconds: u32,
    pub voiceover_script: String,
    pub scenes: Vec<ScriptScene>,
    pub color_palette: ColorPalette,
    #[serde(default)]
    pub image_prompts: Vec<String>,
}

impl VideoScript {
    /// Checks the structural requirements downstream stages rely on.
    pub fn validate(&self) -> Result<(), String> {
        if self.scenes.is_empty() {
            return Err("script has no scenes".to_string());
        }
        if self.voiceover_script.trim().is_empty() {
            return Err("script has no voiceover".to_string());
        }
        if let Some(scene) = self.scenes.iter().find(|s| s.duration_seconds == 0) {
            return Err(format!("scene '{}' has zero duration", scene.id));
        }
        if let Some(scene) = self
            .scenes
            .iter()
            .find(|s| s.duration_seconds > MAX_SCENE_SECONDS)
        {
            return Err(format!(
                "scene '{}' lasts {}s, longer than {}s",
                scene.id, scene.duration_seconds, MAX_SCENE_SECONDS
            ));
        }
        Ok(())
    }

    pub fn scene_seconds(&self) -> u32 {
        self.scenes
            .iter()
            .fold(0u32, |total, s| total.saturating_add(s.duration_seconds))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptScene {
    pub id: String,
    pub duration_seconds: u32,
    #[serde(default)]
    pub voiceover: Option<String>,
    #[serde(default)]
    pub on_screen_text: OnScreenText,
    #[serde(default)]
    pub visual_direction: String,
    #[serde(default)]
    pub mood: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnScreenText {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub subhead: Option<String>,
    #[serde(default)]
    pub bullet_points: Vec<String>,
    #[serde(default)]
    pub emphasis: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            primary: "#6366f1".to_string(),
            secondary: "#7c3aed".to_string(),
            accent: "#22d3ee".to_string(),
            background: "#0a0a0a".to_string(),
        }
    }
}

/// Timing of one spoken word in the narration track, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, seconds: u32) -> ScriptScene {
        ScriptScene {
            id: id.to_string(),
            duration_seconds: seconds,
            voiceover: None,
            on_screen_text: OnScreenText::default(),
            visual_direction: String::new(),
            mood: "intrigue".to_string(),
        }
    }

    #[test]
    fn test_validate_rejects_empty_script() {
        let script = VideoScript {
            total_duration_seconds: 10,
            voiceover_script: "hello".to_string(),
            scenes: vec![],
            color_palette: ColorPalette::default(),
            image_prompts: vec![],
        };
        assert!(script.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_length_scene() {
        let script = VideoScript {
            total_duration_seconds: 10,
            voiceover_script: "hello".to_string(),
            scenes: vec![scene("hook", 4), scene("cta", 0)],
            color_palette: ColorPalette::default(),
            image_prompts: vec![],
        };
        assert_eq!(
            script.validate().unwrap_err(),
            "scene 'cta' has zero duration"
        );
    }

    #[test]
    fn test_validate_rejects_overlong_scene() {
        let script = VideoScript {
            total_duration_seconds: 10,
            voiceover_script: "hello".to_string(),
            scenes: vec![scene("hook", 4), scene("body", 200_000_000)],
            color_palette: ColorPalette::default(),
            image_prompts: vec![],
        };
        assert_eq!(
            script.validate().unwrap_err(),
            "scene 'body' lasts 200000000s, longer than 600s"
        );
        assert_eq!(script.scene_seconds(), 200_000_004);
    }

    #[test]
    fn test_scene_seconds_and_lenient_parse() {
        let json = r##"{
            "total_duration_seconds": 12,
            "voiceover_script": "Ready?",
            "scenes": [
                {"id": "hook", "duration_seconds": 5},
                {"id": "cta", "duration_seconds": 7, "on_screen_text": {"headline": "Go"}}
            ],
            "color_palette": {"primary": "#fff", "secondary": "#000", "accent": "#f00", "background": "#111"}
        }"##;
        let script: VideoScript = serde_json::from_str(json).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.scene_seconds(), 12);
        assert!(script.image_prompts.is_empty());
        assert_eq!(script.scenes[1].on_screen_text.headline.as_deref(), Some("Go"));
    }
}
