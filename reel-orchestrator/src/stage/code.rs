//! Composition code handling
//!
//! Generated compositions are untrusted text. They are cleaned of markdown
//! fences and screened for constructs the renderer sandbox must never see.
//! A rejected composition is sent back to the generator together with what
//! was wrong with it. When generation keeps failing, a template composition
//! is built straight from the script so the job can still render.

use super::{CodeGenerator, CodeRequest, StageError};
use async_trait::async_trait;
use std::sync::Arc;

/// Generator calls made before settling for the template.
pub const MAX_CODE_ATTEMPTS: u32 = 3;

/// Constructs rejected in generated compositions.
pub const FORBIDDEN_CONSTRUCTS: [&str; 8] = [
    "eval(",
    "require(",
    "import ",
    "process.",
    "fetch(",
    "XMLHttpRequest",
    "localStorage",
    "document.cookie",
];

/// Frames at the end of a scene spent on its exit animation.
const EXIT_FRAMES: u32 = 25;

/// Strips a surrounding markdown fence, if any.
pub fn extract_code(raw: &str) -> String {
    let Some(start) = raw.find("```") else {
        return raw.trim().to_string();
    };

    // Skip the language tag on the opening fence line
    let after_fence = &raw[start + 3..];
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => after_fence,
    };
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}

/// First forbidden construct the composition uses, if any
pub fn security_violation(code: &str) -> Option<&'static str> {
    FORBIDDEN_CONSTRUCTS
        .iter()
        .copied()
        .find(|c| code.contains(c))
        .map(str::trim)
}

/// Every reason the composition cannot be rendered; empty when usable.
pub fn code_problems(code: &str) -> Vec<String> {
    if code.trim().is_empty() {
        return vec!["composition is empty".to_string()];
    }

    let mut problems: Vec<String> = FORBIDDEN_CONSTRUCTS
        .iter()
        .filter(|c| code.contains(*c))
        .map(|c| format!("composition uses forbidden construct '{}'", c.trim()))
        .collect();
    if !code.contains("return") {
        problems.push("composition does not return a component".to_string());
    }
    problems
}

pub fn validate_code(code: &str) -> Result<(), String> {
    match code_problems(code).into_iter().next() {
        Some(problem) => Err(problem),
        None => Ok(()),
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Deterministic composition built from the script alone.
///
/// One sequence per scene, placed back to back by scene duration. The first
/// scenes get the generated images as backgrounds and the narration plays
/// across the whole timeline.
pub fn template_composition(req: &CodeRequest) -> String {
    let mut scenes = String::new();
    let mut sequences = Vec::with_capacity(req.script.scenes.len());
    let last = req.script.scenes.len().saturating_sub(1);
    let mut from = 0u32;

    for (i, scene) in req.script.scenes.iter().enumerate() {
        let frames = scene.duration_seconds.saturating_mul(req.fps);
        let is_last = i == last;
        let text = &scene.on_screen_text;

        let mut children = vec![format!(
            "React.createElement(FadeUp, {{ delay: 8 }}, React.createElement(\"div\", \
             {{ style: {{ fontSize: 44, fontWeight: 900, fontFamily: F, color: \"#ffffff\" }} }}, {}))",
            js_string(text.headline.as_deref().unwrap_or_default())
        )];
        if let Some(subhead) = text.subhead.as_deref().filter(|s| !s.is_empty()) {
            children.push(format!(
                "React.createElement(FadeUp, {{ delay: 25, style: {{ fontSize: 22, color: \"#94a3b8\", \
                 fontFamily: F, marginTop: 16 }} }}, {})",
                js_string(subhead)
            ));
        }
        for (bi, bullet) in text.bullet_points.iter().enumerate() {
            children.push(format!(
                "React.createElement(FadeUp, {{ delay: {}, style: {{ fontSize: 18, color: \"#ffffff\", \
                 fontFamily: F, marginTop: 8 }} }}, {})",
                30 + bi * 15,
                js_string(&format!("→ {}", bullet))
            ));
        }

        let (exit, opacity, offset) = if is_last {
            (String::new(), "1", "0")
        } else {
            (
                format!(
                    "var exit = useExit({}, {});",
                    frames.saturating_sub(EXIT_FRAMES),
                    frames
                ),
                "exit.op",
                "exit.y",
            )
        };

        let body = if i < req.image_urls.len() {
            format!(
                "React.createElement(AbsoluteFill, {{ style: {{ opacity: {opacity}, transform: \"translateY(\" + {offset} + \"px)\" }} }},\n      \
                 React.createElement(CinematicBG, {{ src: images[{i}], overlayOpacity: 0.6 }}),\n      \
                 React.createElement(Content, null,\n        {}))",
                children.join(",\n        ")
            )
        } else {
            format!(
                "React.createElement(CenterScene, {{ opacity: {opacity}, translateY: {offset}, seed: {i}, tint: {} }},\n      {})",
                js_string(&req.script.color_palette.primary),
                children.join(",\n      ")
            )
        };

        scenes.push_str(&format!(
            "var Scene{i} = function() {{\n  {exit}\n  return {body};\n}};\n\n"
        ));
        sequences.push(format!(
            "    React.createElement(Sequence, {{ from: {from}, durationInFrames: {frames} }}, React.createElement(Scene{i}, null))"
        ));
        from = from.saturating_add(frames);
    }

    if req.audio.is_some() {
        sequences.insert(
            0,
            format!(
                "    React.createElement(Sequence, {{ from: 0, durationInFrames: {} }}, React.createElement(Audio, {{ src: audioUrl }}))",
                req.total_frames
            ),
        );
    }

    format!(
        "var AbsoluteFill = Remotion.AbsoluteFill;\n\
         var Sequence = Remotion.Sequence;\n\
         var Audio = Remotion.Audio;\n\
         var CenterScene = Components.CenterScene;\n\
         var Content = Components.Content;\n\
         var CinematicBG = Components.CinematicBG;\n\
         var FadeUp = Components.FadeUp;\n\
         var useExit = Components.useExit;\n\
         var F = Theme.F;\n\n\
         {scenes}\
         var MyVideo = function() {{\n  \
         return React.createElement(AbsoluteFill, {{ style: {{ backgroundColor: {} }} }},\n{}\n  );\n}};\n\n\
         return MyVideo;",
        js_string(&req.script.color_palette.background),
        sequences.join(",\n")
    )
}

/// Code generator that never leaves a job without a composition.
///
/// The primary generator gets up to [`MAX_CODE_ATTEMPTS`] tries. Each retry
/// carries the problems found in the previous output as repair notes. Output
/// using a forbidden construct ends the attempts at once. The template
/// composition is used when no attempt produced usable code.
pub struct FallbackCodeGenerator {
    primary: Arc<dyn CodeGenerator>,
}

impl FallbackCodeGenerator {
    pub fn new(primary: Arc<dyn CodeGenerator>) -> Self {
        Self { primary }
    }
}

#[async_trait]
impl CodeGenerator for FallbackCodeGenerator {
    async fn generate_code(&self, req: &CodeRequest) -> Result<String, StageError> {
        let mut attempt_req = req.clone();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            match self.primary.generate_code(&attempt_req).await {
                Ok(raw) => {
                    let code = extract_code(&raw);
                    let problems = code_problems(&code);
                    if problems.is_empty() {
                        return Ok(code);
                    }
                    tracing::warn!(attempt, ?problems, "Generated composition rejected");
                    if let Some(construct) = security_violation(&code) {
                        tracing::warn!(construct, "Unsafe composition, not asking again");
                        break;
                    }
                    attempt_req.repair_notes = problems;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Code generation failed");
                    attempt_req.repair_notes = vec![e.to_string()];
                }
            }
        }

        tracing::info!("Using template composition");
        let code = template_composition(req);
        validate_code(&code).map_err(StageError::InvalidOutput)?;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::AudioTrack;
    use reel_core::domain::script::{ColorPalette, OnScreenText, ScriptScene, VideoScript};

    fn request(scene_seconds: &[u32], images: usize, audio: bool) -> CodeRequest {
        let scenes = scene_seconds
            .iter()
            .enumerate()
            .map(|(i, &seconds)| ScriptScene {
                id: format!("scene-{}", i),
                duration_seconds: seconds,
                voiceover: None,
                on_screen_text: OnScreenText {
                    headline: Some(format!("Headline {}", i)),
                    subhead: None,
                    bullet_points: vec!["one \"quoted\" point".to_string()],
                    emphasis: vec![],
                },
                visual_direction: String::new(),
                mood: "calm".to_string(),
            })
            .collect();

        CodeRequest {
            script: VideoScript {
                total_duration_seconds: scene_seconds.iter().sum(),
                voiceover_script: "Narration".to_string(),
                scenes,
                color_palette: ColorPalette::default(),
                image_prompts: vec![],
            },
            image_urls: (0..images).map(|i| format!("https://img/{}", i)).collect(),
            audio: audio.then(|| AudioTrack {
                url: "https://audio/1".to_string(),
                duration_seconds: 12.0,
                words: vec![],
            }),
            total_frames: scene_seconds.iter().sum::<u32>() * 30,
            fps: 30,
            width: 1080,
            height: 1920,
            previous_code: None,
            iteration_feedback: None,
            repair_notes: Vec::new(),
        }
    }

    struct Fixed(Result<String, String>);

    /// Answers from a queue and remembers the repair notes of every call
    struct Queued {
        answers: std::sync::Mutex<Vec<Result<String, String>>>,
        notes: std::sync::Mutex<Vec<Vec<String>>>,
    }

    impl Queued {
        fn new(mut answers: Vec<Result<String, String>>) -> Self {
            answers.reverse();
            Self {
                answers: std::sync::Mutex::new(answers),
                notes: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CodeGenerator for Queued {
        async fn generate_code(&self, req: &CodeRequest) -> Result<String, StageError> {
            self.notes.lock().unwrap().push(req.repair_notes.clone());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err("no more answers".to_string()))
                .map_err(StageError::Rejected)
        }
    }

    #[async_trait]
    impl CodeGenerator for Fixed {
        async fn generate_code(&self, _req: &CodeRequest) -> Result<String, StageError> {
            self.0.clone().map_err(StageError::Rejected)
        }
    }

    #[test]
    fn test_extract_code_strips_fences() {
        let raw = "Here you go:\n```javascript\nvar A = 1;\nreturn A;\n```\nEnjoy";
        assert_eq!(extract_code(raw), "var A = 1;\nreturn A;");
        assert_eq!(extract_code("  return X;  "), "return X;");
    }

    #[test]
    fn test_validate_code_rejects_forbidden_constructs() {
        assert!(validate_code("return MyVideo;").is_ok());
        assert_eq!(
            validate_code("fetch('https://evil'); return X;").unwrap_err(),
            "composition uses forbidden construct 'fetch('"
        );
        assert!(validate_code("import React from 'react'; return X;").is_err());
        assert!(validate_code("var x = 1;").is_err());
        assert!(validate_code("   ").is_err());
    }

    #[test]
    fn test_template_has_one_sequence_per_scene() {
        let code = template_composition(&request(&[5, 10, 15], 2, true));

        assert!(code.contains("{ from: 0, durationInFrames: 150 }"));
        assert!(code.contains("{ from: 150, durationInFrames: 300 }"));
        assert!(code.contains("{ from: 450, durationInFrames: 450 }"));
        assert!(code.contains("images[1]"));
        assert!(!code.contains("images[2]"));
        assert!(code.contains("{ from: 0, durationInFrames: 900 }, React.createElement(Audio"));
        assert!(code.contains(r#""→ one \"quoted\" point""#));
        assert!(validate_code(&code).is_ok());
    }

    #[test]
    fn test_template_without_audio() {
        let code = template_composition(&request(&[4], 0, false));
        assert!(!code.contains("Audio, {"));
        assert!(!code.contains("useExit("));
    }

    #[tokio::test]
    async fn test_fallback_keeps_valid_primary_output() {
        let generator = FallbackCodeGenerator::new(Arc::new(Fixed(Ok(
            "```js\nvar V = 1;\nreturn V;\n```".to_string(),
        ))));
        let code = generator
            .generate_code(&request(&[5], 0, false))
            .await
            .unwrap();
        assert_eq!(code, "var V = 1;\nreturn V;");
    }

    #[tokio::test]
    async fn test_fallback_replaces_failed_or_unsafe_output() {
        let req = request(&[5, 5], 1, true);

        let failing = FallbackCodeGenerator::new(Arc::new(Fixed(Err("model overloaded".into()))));
        assert_eq!(
            failing.generate_code(&req).await.unwrap(),
            template_composition(&req)
        );

        let unsafe_code =
            FallbackCodeGenerator::new(Arc::new(Fixed(Ok("eval('x'); return X;".into()))));
        assert_eq!(
            unsafe_code.generate_code(&req).await.unwrap(),
            template_composition(&req)
        );
    }

    #[test]
    fn test_code_problems_lists_every_issue() {
        assert!(code_problems("return MyVideo;").is_empty());
        assert_eq!(
            code_problems("eval('a'); fetch('b');"),
            vec![
                "composition uses forbidden construct 'eval('".to_string(),
                "composition uses forbidden construct 'fetch('".to_string(),
                "composition does not return a component".to_string(),
            ]
        );
        assert_eq!(security_violation("import x; return X;"), Some("import"));
        assert_eq!(security_violation("var x = 1;"), None);
    }

    #[test]
    fn test_template_saturates_huge_scene_durations() {
        let code = template_composition(&request(&[200_000_000, 5], 0, false));
        assert!(code.contains(&format!(
            "{{ from: 0, durationInFrames: {} }}",
            u32::MAX
        )));
        assert!(code.contains(&format!("{{ from: {}, durationInFrames: 150 }}", u32::MAX)));
    }

    #[tokio::test]
    async fn test_fallback_sends_problems_back_for_repair() {
        let primary = Arc::new(Queued::new(vec![
            Ok("var V = 1;".to_string()),
            Err("model overloaded".to_string()),
            Ok("var V = 1;\nreturn V;".to_string()),
        ]));
        let generator = FallbackCodeGenerator::new(primary.clone());

        let code = generator
            .generate_code(&request(&[5], 0, false))
            .await
            .unwrap();

        assert_eq!(code, "var V = 1;\nreturn V;");
        assert_eq!(
            *primary.notes.lock().unwrap(),
            vec![
                vec![],
                vec!["composition does not return a component".to_string()],
                vec!["model overloaded".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_gives_up_after_three_attempts() {
        let req = request(&[5, 5], 1, true);
        let primary = Arc::new(Queued::new(vec![Ok("var V = 1;".to_string()); 5]));
        let generator = FallbackCodeGenerator::new(primary.clone());

        assert_eq!(
            generator.generate_code(&req).await.unwrap(),
            template_composition(&req)
        );
        assert_eq!(primary.notes.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unsafe_output_is_not_retried() {
        let req = request(&[5], 0, false);
        let primary = Arc::new(Queued::new(vec![
            Ok("fetch('https://evil'); return X;".to_string()),
            Ok("return Fine;".to_string()),
        ]));
        let generator = FallbackCodeGenerator::new(primary.clone());

        assert_eq!(
            generator.generate_code(&req).await.unwrap(),
            template_composition(&req)
        );
        assert_eq!(primary.notes.lock().unwrap().len(), 1);
    }
}
