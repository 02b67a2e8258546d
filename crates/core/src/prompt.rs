//! Prompt validation, token estimation and optimization.
//!
//! Prompts follow the five-part formula
//! `cinematography | subject | action | context | style`. The optimizer
//! works segment by segment so that no part of the formula is ever lost,
//! only trimmed.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Shortest prompt the provider produces usable output for.
pub const MIN_PROMPT_CHARS: usize = 50;

/// Longest prompt accepted at admission.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Multiplier for rough token estimation from word count.
const TOKEN_ESTIMATE_MULTIPLIER: f64 = 1.3;

/// Separator between the five prompt segments.
pub const SEGMENT_SEPARATOR: &str = " | ";

/// Words that add tokens without changing what gets rendered.
const FILLER_PATTERN: &str =
    r"(?i)\b(please|basically|actually|just|really|very|literally|simply|kind of|sort of)\b";

static FILLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(FILLER_PATTERN).expect("valid regex"));

/// Keywords that indicate the prompt describes camera work.
const CINEMATOGRAPHY_KEYWORDS: &[&str] = &[
    "shot", "angle", "camera", "dolly", "tracking", "aerial", "pan", "close-up",
];

/// Negative prompt used when the caller supplies none.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, blurry, distorted product, watermarks, \
     text overlays, harsh shadows, unnatural lighting, oversaturated, unprofessional";

// ---------------------------------------------------------------------------
// Validation & estimation
// ---------------------------------------------------------------------------

/// Validate prompt length. Blank padding does not count toward the minimum.
pub fn validate_prompt(text: &str) -> Result<(), CoreError> {
    let len = text.trim().chars().count();
    if len < MIN_PROMPT_CHARS {
        return Err(CoreError::invalid(
            "prompt",
            format!("prompt must be at least {MIN_PROMPT_CHARS} characters (got {len})"),
        ));
    }
    if text.chars().count() > MAX_PROMPT_CHARS {
        return Err(CoreError::invalid(
            "prompt",
            format!(
                "prompt must be at most {MAX_PROMPT_CHARS} characters (got {})",
                text.chars().count()
            ),
        ));
    }
    Ok(())
}

/// Estimate the token count of `text` as `floor(words * 1.3)`.
///
/// Non-decreasing in the number of words.
pub fn estimate_tokens(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    (words as f64 * TOKEN_ESTIMATE_MULTIPLIER) as u32
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

/// Result of [`optimize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizedPrompt {
    pub text: String,
    pub original_tokens: u32,
    pub optimized_tokens: u32,
}

impl OptimizedPrompt {
    pub fn tokens_saved(&self) -> u32 {
        self.original_tokens.saturating_sub(self.optimized_tokens)
    }
}

/// Produce a token-reduced equivalent of `raw`.
///
/// `context` is the conditioning text sent alongside the prompt; descriptors
/// it already states verbatim are not repeated. Each `|` segment keeps at
/// least one descriptor, and if the result would fall below
/// [`MIN_PROMPT_CHARS`] the whitespace-normalized input is returned instead.
///
/// Fails with `InvalidRequest` for prompts outside the accepted length
/// range; malformed input is never optimized.
pub fn optimize(raw: &str, context: &str) -> Result<OptimizedPrompt, CoreError> {
    validate_prompt(raw)?;

    let normalized = collapse_whitespace(raw);
    let context_phrases = context_phrases(context);
    let mut seen: HashSet<String> = HashSet::new();

    let segments: Vec<String> = normalized
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|segment| optimize_segment(segment, &context_phrases, &mut seen))
        .collect();

    let candidate = segments.join(SEGMENT_SEPARATOR);
    let text = if candidate.chars().count() < MIN_PROMPT_CHARS {
        normalized.clone()
    } else {
        candidate
    };

    Ok(OptimizedPrompt {
        original_tokens: estimate_tokens(raw),
        optimized_tokens: estimate_tokens(&text),
        text,
    })
}

fn optimize_segment(
    segment: &str,
    context_phrases: &HashSet<String>,
    seen: &mut HashSet<String>,
) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut first_cleaned: Option<String> = None;

    for descriptor in segment.split(',') {
        let cleaned = strip_filler(descriptor);
        if cleaned.is_empty() {
            continue;
        }
        if first_cleaned.is_none() {
            first_cleaned = Some(cleaned.clone());
        }
        let key = cleaned.to_lowercase();
        if context_phrases.contains(&key) || !seen.insert(key) {
            continue;
        }
        kept.push(cleaned);
    }

    if kept.is_empty() {
        // Never drop a whole segment of the formula.
        return first_cleaned.unwrap_or_else(|| segment.trim().to_string());
    }
    kept.join(", ")
}

fn strip_filler(text: &str) -> String {
    let stripped = FILLER_RE.replace_all(text, "");
    let collapsed = collapse_whitespace(&stripped);
    collapsed
        .trim_matches(|c: char| c == '.' || c == ';' || c.is_whitespace())
        .to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Multi-word phrases in the context, lowercased. Single words are too
/// generic to treat as duplicates.
fn context_phrases(context: &str) -> HashSet<String> {
    context
        .split(|c: char| c == ',' || c == '\n' || c == '.' || c == ';' || c == ':')
        .map(|p| collapse_whitespace(p).to_lowercase())
        .filter(|p| p.split(' ').count() >= 2)
        .collect()
}

// ---------------------------------------------------------------------------
// Five-part formula
// ---------------------------------------------------------------------------

/// The five parts of a structured product-video prompt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, Serialize)]
pub struct PromptParts {
    pub cinematography: String,
    pub subject: String,
    pub action: String,
    pub context: String,
    pub style: String,
}

/// A formatted prompt with its negative prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedPrompt {
    pub main_prompt: String,
    pub negative_prompt: String,
    pub structure: PromptParts,
}

/// Join the parts with [`SEGMENT_SEPARATOR`], falling back to
/// [`DEFAULT_NEGATIVE_PROMPT`] when `negative` is blank.
pub fn format_five_part(parts: PromptParts, negative: Option<&str>) -> FormattedPrompt {
    let main_prompt = [
        parts.cinematography.trim(),
        parts.subject.trim(),
        parts.action.trim(),
        parts.context.trim(),
        parts.style.trim(),
    ]
    .join(SEGMENT_SEPARATOR);

    let negative_prompt = negative
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NEGATIVE_PROMPT)
        .to_string();

    FormattedPrompt {
        main_prompt,
        negative_prompt,
        structure: parts,
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Character, word and token counts for a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptStats {
    pub length_chars: usize,
    pub word_count: usize,
    pub estimated_tokens: u32,
}

/// Validation report with blocking issues and advisory warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptAnalysis {
    pub valid: bool,
    pub analysis: PromptStats,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<&'static str>,
}

const RECOMMENDATIONS: &[&str] = &[
    "Use the structured five-part formula",
    "Include resolution and duration",
    "Add a negative prompt",
    "Test with 4s/720p first",
];

/// Check a prompt and suggest improvements without rejecting it.
pub fn analyze_prompt(prompt: &str) -> PromptAnalysis {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if let Err(CoreError::InvalidRequest(fields)) = validate_prompt(prompt) {
        issues.extend(fields.into_iter().map(|f| f.message));
    }

    let lower = prompt.to_lowercase();
    if !CINEMATOGRAPHY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        warnings.push("Add a description of the camera movement".to_string());
    }
    if !lower.contains("negative") && !lower.contains("not ") && !lower.contains("no ") {
        warnings.push("Consider adding a negative prompt".to_string());
    }
    if !prompt.contains('|') {
        warnings.push("Prompt is not split into the five formula segments".to_string());
    }

    PromptAnalysis {
        valid: issues.is_empty(),
        analysis: PromptStats {
            length_chars: prompt.chars().count(),
            word_count: prompt.split_whitespace().count(),
            estimated_tokens: estimate_tokens(prompt),
        },
        issues,
        warnings,
        recommendations: RECOMMENDATIONS.to_vec(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const STRUCTURED: &str = "close-up tracking shot, dynamic composition | premium wireless \
        earbuds, matte black finish | rotating slowly, showcasing details | minimalist white \
        studio with professional lighting | cinematic, sharp focus, rich colors";

    #[test]
    fn token_estimate_uses_word_ratio() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one"), 1);
        assert_eq!(estimate_tokens("one two three four five six seven eight nine ten"), 13);
    }

    #[test]
    fn token_estimate_is_monotonic_in_length() {
        let mut text = String::new();
        let mut previous = 0;
        for i in 0..200 {
            text.push_str(&format!("word{i} "));
            let tokens = estimate_tokens(&text);
            assert!(tokens >= previous);
            previous = tokens;
        }
    }

    #[test]
    fn rejects_short_and_long_prompts() {
        assert_matches!(optimize("too short", ""), Err(CoreError::InvalidRequest(_)));
        let long = "word ".repeat(500);
        assert_matches!(optimize(&long, ""), Err(CoreError::InvalidRequest(_)));
    }

    #[test]
    fn keeps_every_segment() {
        let out = optimize(STRUCTURED, "").unwrap();
        assert_eq!(out.text.split(SEGMENT_SEPARATOR).count(), 5);
    }

    #[test]
    fn removes_fillers_and_duplicate_descriptors() {
        let raw = "really smooth   tracking shot, very smooth tracking shot | premium earbuds, \
                   premium earbuds | just rotating slowly | white studio | basically cinematic";
        let out = optimize(raw, "").unwrap();
        assert_eq!(
            out.text,
            "smooth tracking shot | premium earbuds | rotating slowly | white studio | cinematic"
        );
        assert!(out.optimized_tokens < out.original_tokens);
        assert!(out.tokens_saved() > 0);
    }

    #[test]
    fn drops_descriptors_already_in_context() {
        let context = "House style: studio lighting, sharp focus.";
        let raw = "slow dolly shot around the bottle | amber perfume bottle, glass cap | \
                   turning in place | marble pedestal, studio lighting | luxurious, sharp focus";
        let out = optimize(raw, context).unwrap();
        assert!(!out.text.contains("studio lighting"));
        assert!(!out.text.contains("sharp focus"));
        assert!(out.text.contains("marble pedestal"));
        assert!(out.text.contains("luxurious"));
    }

    #[test]
    fn segment_entirely_in_context_keeps_first_descriptor() {
        let context = "sharp focus, rich colors";
        let raw = "close-up tracking shot of the device | flagship smartphone with titanium frame \
                   | rotating | studio | sharp focus, rich colors";
        let out = optimize(raw, context).unwrap();
        assert!(out.text.ends_with("| sharp focus"));
    }

    #[test]
    fn falls_back_when_result_too_short() {
        // Fifty-odd characters of which most are filler.
        let raw = "really really really very very very just just just shoe";
        let out = optimize(raw, "").unwrap();
        assert_eq!(out.text, raw);
    }

    #[test]
    fn optimization_is_deterministic() {
        let a = optimize(STRUCTURED, "studio lighting").unwrap();
        let b = optimize(STRUCTURED, "studio lighting").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn five_part_formula_uses_default_negative() {
        let parts = PromptParts {
            cinematography: "tracking shot".into(),
            subject: "premium headphones".into(),
            action: "rotating".into(),
            context: "white studio".into(),
            style: "cinematic".into(),
        };
        let formatted = format_five_part(parts, Some("  "));
        assert_eq!(
            formatted.main_prompt,
            "tracking shot | premium headphones | rotating | white studio | cinematic"
        );
        assert_eq!(formatted.negative_prompt, DEFAULT_NEGATIVE_PROMPT);
    }

    #[test]
    fn analysis_reports_issues_and_warnings() {
        let report = analyze_prompt("a product");
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 1);
        assert!(report.warnings.iter().any(|w| w.contains("camera")));

        let good = analyze_prompt(STRUCTURED);
        assert!(good.valid);
        assert!(!good.warnings.iter().any(|w| w.contains("camera")));
        assert_eq!(good.analysis.word_count, STRUCTURED.split_whitespace().count());
    }
}
