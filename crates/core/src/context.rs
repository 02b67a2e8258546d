//! Task-scoped conditioning context.
//!
//! A context is the system instructions for a task type followed by a short
//! digest of the user's recent generations. The pipeline caches the composed
//! text; this module only knows how to build it.

use serde::{Deserialize, Serialize};

/// Number of history lines included in a composed context.
pub const MAX_HISTORY_ENTRIES: usize = 5;

/// Longest prompt excerpt quoted per history line.
const HISTORY_EXCERPT_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    VideoGeneration,
    PromptOptimization,
    CostEstimation,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoGeneration => "video_generation",
            Self::PromptOptimization => "prompt_optimization",
            Self::CostEstimation => "cost_estimation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video_generation" => Some(Self::VideoGeneration),
            "prompt_optimization" => Some(Self::PromptOptimization),
            "cost_estimation" => Some(Self::CostEstimation),
            _ => None,
        }
    }

    /// System instructions for this task.
    pub fn instructions(self) -> &'static str {
        match self {
            Self::VideoGeneration => {
                "Generate a professional product video. Follow the five-part formula: \
                 cinematography, subject, action, context, style. Keep the product in sharp \
                 focus, use professional lighting and avoid text overlays or watermarks."
            }
            Self::PromptOptimization => {
                "Reduce prompt tokens without changing intent. Keep every formula segment, \
                 remove filler words and repeated descriptors."
            }
            Self::CostEstimation => {
                "Price generations by resolution and duration. Recommend testing at 4s/720p \
                 before committing to 1080p/8s renders."
            }
        }
    }
}

/// A previous generation summarized for context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub prompt: String,
    pub status: String,
}

/// Compose instructions and history into one context text.
pub fn compose_context(task: TaskType, history: &[HistoryEntry]) -> String {
    let mut out = String::from(task.instructions());
    let recent: Vec<&HistoryEntry> = history.iter().take(MAX_HISTORY_ENTRIES).collect();
    if recent.is_empty() {
        return out;
    }
    out.push_str("\n\nRecent generations:");
    for entry in recent {
        let excerpt: String = entry.prompt.chars().take(HISTORY_EXCERPT_CHARS).collect();
        out.push_str(&format!("\n- [{}] {excerpt}", entry.status));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_names_round_trip() {
        for t in [
            TaskType::VideoGeneration,
            TaskType::PromptOptimization,
            TaskType::CostEstimation,
        ] {
            assert_eq!(TaskType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TaskType::parse("other"), None);
    }

    #[test]
    fn context_without_history_is_instructions_only() {
        let ctx = compose_context(TaskType::VideoGeneration, &[]);
        assert_eq!(ctx, TaskType::VideoGeneration.instructions());
    }

    #[test]
    fn history_is_truncated() {
        let history: Vec<HistoryEntry> = (0..8)
            .map(|i| HistoryEntry {
                prompt: format!("prompt {i} {}", "x".repeat(300)),
                status: "completed".into(),
            })
            .collect();
        let ctx = compose_context(TaskType::VideoGeneration, &history);
        assert_eq!(ctx.matches("\n- [completed]").count(), MAX_HISTORY_ENTRIES);
        assert!(!ctx.contains(&"x".repeat(200)));
    }
}
