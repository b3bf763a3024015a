//! Custom formats: named scoring rules over parsed release attributes
//!
//! A format matches a release iff every `required` condition passes (after
//! applying its `negate`) and, when any non-required conditions exist, at
//! least one of them passes. Negation inverts the raw condition result
//! only; a negated condition that is satisfied still counts as "matched".

use crate::parser::{ReleaseAttributes, Resolution, Source};
use cinephage_core::{CinephageError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Scoring category a format belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatCategory {
    Resolution,
    ReleaseGroupTier,
    Audio,
    Hdr,
    Streaming,
    Micro,
    LowQuality,
    Banned,
    Enhancement,
    Codec,
    Other,
}

/// Condition payload, tagged by type. Unknown tags and unknown fields are
/// rejected when the definitions are deserialized, not at match time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ConditionKind {
    Resolution { resolution: Resolution },
    Source { source: Source },
    ReleaseTitle { pattern: String },
    ReleaseGroup { pattern: String },
}

/// One rule inside a custom format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatCondition {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub negate: bool,
    pub kind: ConditionKind,
}

impl FormatCondition {
    pub fn resolution(resolution: Resolution) -> Self {
        Self {
            required: false,
            negate: false,
            kind: ConditionKind::Resolution { resolution },
        }
    }

    pub fn source(source: Source) -> Self {
        Self {
            required: false,
            negate: false,
            kind: ConditionKind::Source { source },
        }
    }

    pub fn release_title(pattern: impl Into<String>) -> Self {
        Self {
            required: false,
            negate: false,
            kind: ConditionKind::ReleaseTitle {
                pattern: pattern.into(),
            },
        }
    }

    pub fn release_group(pattern: impl Into<String>) -> Self {
        Self {
            required: false,
            negate: false,
            kind: ConditionKind::ReleaseGroup {
                pattern: pattern.into(),
            },
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn negate(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }
}

/// Named scoring rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomFormat {
    pub id: String,
    pub name: String,
    pub category: FormatCategory,
    /// Informational only; profiles carry the effective score
    pub default_score: i32,
    pub conditions: Vec<FormatCondition>,
}

impl CustomFormat {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: FormatCategory,
        default_score: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            default_score,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: FormatCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

enum CompiledMatcher {
    Resolution(Resolution),
    Source(Source),
    ReleaseTitle(Regex),
    ReleaseGroup(Regex),
}

impl CompiledMatcher {
    fn matches(&self, attrs: &ReleaseAttributes, title: &str) -> bool {
        match self {
            CompiledMatcher::Resolution(resolution) => attrs.resolution == *resolution,
            CompiledMatcher::Source(source) => attrs.source == *source,
            CompiledMatcher::ReleaseTitle(regex) => regex.is_match(title),
            CompiledMatcher::ReleaseGroup(regex) => attrs
                .release_group
                .as_deref()
                .map(|group| regex.is_match(group))
                .unwrap_or(false),
        }
    }
}

struct CompiledCondition {
    required: bool,
    negate: bool,
    matcher: CompiledMatcher,
}

/// A format with its regexes compiled once at load
pub struct CompiledFormat {
    definition: CustomFormat,
    conditions: Vec<CompiledCondition>,
}

impl CompiledFormat {
    fn compile(definition: CustomFormat) -> Result<Self> {
        let mut conditions = Vec::with_capacity(definition.conditions.len());
        for condition in &definition.conditions {
            let matcher = match &condition.kind {
                ConditionKind::Resolution { resolution } => {
                    CompiledMatcher::Resolution(*resolution)
                }
                ConditionKind::Source { source } => CompiledMatcher::Source(*source),
                ConditionKind::ReleaseTitle { pattern } => {
                    CompiledMatcher::ReleaseTitle(compile_pattern(&definition.id, pattern)?)
                }
                ConditionKind::ReleaseGroup { pattern } => {
                    CompiledMatcher::ReleaseGroup(compile_pattern(&definition.id, pattern)?)
                }
            };
            conditions.push(CompiledCondition {
                required: condition.required,
                negate: condition.negate,
                matcher,
            });
        }
        Ok(Self {
            definition,
            conditions,
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn category(&self) -> FormatCategory {
        self.definition.category
    }

    pub fn definition(&self) -> &CustomFormat {
        &self.definition
    }

    /// Match semantics: all required conditions pass (after negate), and at
    /// least one non-required condition passes if any exist.
    pub fn matches(&self, attrs: &ReleaseAttributes, title: &str) -> bool {
        let mut has_optional = false;
        let mut any_optional = false;

        for condition in &self.conditions {
            let raw = condition.matcher.matches(attrs, title);
            let result = if condition.negate { !raw } else { raw };

            if condition.required {
                if !result {
                    return false;
                }
            } else {
                has_optional = true;
                if result {
                    any_optional = true;
                }
            }
        }

        !has_optional || any_optional
    }
}

fn compile_pattern(format_id: &str, pattern: &str) -> Result<Regex> {
    Regex::new(&format!("(?i){}", pattern)).map_err(|err| CinephageError::ConfigurationError {
        field: format!("format {}", format_id),
        message: format!("invalid pattern '{}': {}", pattern, err),
    })
}

/// All registered formats with compiled conditions
pub struct FormatRegistry {
    formats: Vec<CompiledFormat>,
    by_id: HashMap<String, usize>,
}

impl FormatRegistry {
    /// Compile a set of definitions. Fails on the first invalid pattern or
    /// duplicate id, so bad definitions are rejected at load time.
    pub fn build(definitions: Vec<CustomFormat>) -> Result<Self> {
        let mut formats = Vec::with_capacity(definitions.len());
        let mut by_id = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            if by_id.contains_key(&definition.id) {
                return Err(CinephageError::ConfigurationError {
                    field: "formats".to_string(),
                    message: format!("duplicate format id '{}'", definition.id),
                });
            }
            by_id.insert(definition.id.clone(), formats.len());
            formats.push(CompiledFormat::compile(definition)?);
        }
        Ok(Self { formats, by_id })
    }

    pub fn get(&self, id: &str) -> Option<&CompiledFormat> {
        self.by_id.get(id).map(|&idx| &self.formats[idx])
    }

    pub fn all(&self) -> &[CompiledFormat] {
        &self.formats
    }

    /// All formats matching the parsed attributes and raw title
    pub fn evaluate<'a>(
        &'a self,
        attrs: &ReleaseAttributes,
        title: &str,
    ) -> Vec<&'a CompiledFormat> {
        self.formats
            .iter()
            .filter(|format| format.matches(attrs, title))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// Read-mostly registry handle. Rebuilds happen under a write-exclusive
/// swap; readers keep the `Arc` they grabbed.
pub struct SharedFormats {
    inner: RwLock<Arc<FormatRegistry>>,
}

impl SharedFormats {
    pub fn new(registry: FormatRegistry) -> Self {
        Self {
            inner: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn get(&self) -> Arc<FormatRegistry> {
        self.inner.read().unwrap().clone()
    }

    pub fn swap(&self, registry: FormatRegistry) {
        *self.inner.write().unwrap() = Arc::new(registry);
    }
}
