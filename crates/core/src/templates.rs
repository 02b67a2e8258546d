//! Product-video prompt templates, user-saved templates and the prompting
//! guide.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::prompt::{format_five_part, validate_prompt, FormattedPrompt, PromptParts};
use crate::types::{DbId, Timestamp};

/// Product categories with a predefined template.
pub const PRODUCT_TYPES: &[&str] = &["electronics", "fashion", "furniture", "cosmetics"];

/// Template used for electronics and for any unknown category.
const ELECTRONICS: ProductTemplate = ProductTemplate {
    cinematography: "smooth tracking shot with tech aesthetics",
    style: "futuristic, sleek, professional tech showcase",
    features: &["sharp focus on details", "UI highlights", "hand interactions"],
};

/// Only the first few features fit in the subject segment.
const MAX_FEATURES_IN_PROMPT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTemplate {
    pub cinematography: &'static str,
    pub style: &'static str,
    pub features: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateLookup {
    pub product_type: String,
    /// `true` when the fallback category was substituted.
    pub fallback: bool,
    pub template: ProductTemplate,
}

fn template_for(product_type: &str) -> Option<ProductTemplate> {
    let template = match product_type {
        "electronics" => ELECTRONICS,
        "fashion" => ProductTemplate {
            cinematography: "runway-style dolly shot with model",
            style: "editorial, magazine-like, fashionable ambiance",
            features: &["fabric texture focus", "motion flow", "elegant poses"],
        },
        "furniture" => ProductTemplate {
            cinematography: "wide establishing shot transitioning to close-up",
            style: "interior design showcase, modern, spacious",
            features: &["room context", "scale reference", "material quality"],
        },
        "cosmetics" => ProductTemplate {
            cinematography: "macro close-up with shallow depth of field",
            style: "luxurious, beauty-focused, glamorous lighting",
            features: &["product detail", "application demo", "color vibrancy"],
        },
        _ => return None,
    };
    Some(template)
}

/// Look up the template for `product_type`, case-insensitively. Unknown
/// categories get the electronics template.
pub fn product_template(product_type: &str) -> TemplateLookup {
    let normalized = product_type.trim().to_lowercase();
    match template_for(&normalized) {
        Some(template) => TemplateLookup {
            product_type: normalized,
            fallback: false,
            template,
        },
        None => TemplateLookup {
            product_type: normalized,
            fallback: true,
            template: ELECTRONICS,
        },
    }
}

// ---------------------------------------------------------------------------
// Prompt builder
// ---------------------------------------------------------------------------

/// Input for [`build_product_prompt`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductBrief {
    #[validate(length(min = 1, max = 200, message = "product_name must be 1 to 200 characters"))]
    pub product_name: String,
    #[validate(length(min = 1, message = "at least one key feature is required"))]
    pub key_features: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
    #[validate(length(min = 1, max = 200, message = "brand_style must be 1 to 200 characters"))]
    pub brand_style: String,
}

/// Camera work keyed by the audience the video is aimed at.
fn cinematography_for(audience: &str) -> &'static str {
    let audience = audience.to_lowercase();
    if audience.contains("luxury") {
        "slow dolly shot with shallow depth of field"
    } else if audience.contains("youth") || audience.contains("gen z") {
        "fast-paced montage with transitions"
    } else if audience.contains("professional") || audience.contains("business") {
        "stable medium shot with professional framing"
    } else {
        "smooth tracking shot with dynamic angles"
    }
}

/// Compose a five-part product prompt from a brief.
pub fn build_product_prompt(brief: &ProductBrief) -> Result<FormattedPrompt, CoreError> {
    brief.validate()?;

    let features = brief
        .key_features
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .take(MAX_FEATURES_IN_PROMPT)
        .collect::<Vec<_>>()
        .join(", ");
    if features.is_empty() {
        return Err(CoreError::invalid(
            "key_features",
            "at least one non-blank key feature is required",
        ));
    }

    let parts = PromptParts {
        cinematography: cinematography_for(&brief.target_audience).to_string(),
        subject: format!("premium {} featuring {features}", brief.product_name.trim()),
        action: "demonstrating key features, rotating to show details".to_string(),
        context: "elegant studio environment with professional lighting".to_string(),
        style: format!(
            "{}, cinematic, professional, 4K, sharp details, warm lighting",
            brief.brand_style.trim()
        ),
    };
    Ok(format_five_part(parts, None))
}

// ---------------------------------------------------------------------------
// Saved templates
// ---------------------------------------------------------------------------

/// Prefix of every saved template slug.
pub const TEMPLATE_SLUG_PREFIX: &str = "tpl_";

/// A prompt that worked, kept for reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedTemplate {
    pub id: DbId,
    /// Derived from the name; unique across saved templates.
    pub slug: String,
    pub name: String,
    pub prompt: String,
    pub product_type: String,
    pub tags: Vec<String>,
    pub notes: String,
    /// Times the template was loaded for use.
    pub usage_count: u32,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSavedTemplate {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: String,
    pub prompt: String,
    #[validate(length(min = 1, max = 50, message = "product_type must be 1 to 50 characters"))]
    pub product_type: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "at most 20 tags are allowed"))]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "notes must be at most 1000 characters"))]
    pub notes: String,
}

impl NewSavedTemplate {
    /// Validate and normalize: trimmed name, lowercase product type, tags
    /// trimmed, lowercased and deduplicated in order.
    pub fn normalized(self) -> Result<Self, CoreError> {
        self.validate()?;
        validate_prompt(&self.prompt)?;

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::invalid("name", "name must not be blank"));
        }
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(Self {
            name,
            prompt: self.prompt.trim().to_string(),
            product_type: self.product_type.trim().to_lowercase(),
            tags,
            notes: self.notes.trim().to_string(),
        })
    }

    pub fn slug(&self) -> String {
        template_slug(&self.name)
    }
}

/// `"Summer Launch"` becomes `"tpl_summer_launch"`.
pub fn template_slug(name: &str) -> String {
    let body = name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("{TEMPLATE_SLUG_PREFIX}{body}")
}

// ---------------------------------------------------------------------------
// Prompting guide
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestPractices {
    pub prompt_formula: &'static str,
    pub optimization: &'static [&'static str],
    pub common_mistakes: &'static [&'static str],
}

pub const BEST_PRACTICES: BestPractices = BestPractices {
    prompt_formula: "[Cinematography] + [Subject] + [Action] + [Context] + [Style & Ambiance]",
    optimization: &[
        "Test with 4s/720p first ($0.15)",
        "Use reference images for consistency",
        "Include negative prompts",
        "Batch similar videos together",
        "Cache successful prompts",
    ],
    common_mistakes: &[
        "Too vague cinematography",
        "Missing context or ambiance",
        "No negative prompts",
        "Starting with 1080p/8s (expensive)",
    ],
};
