//! Pattern-based entity annotation
//!
//! The shipped annotation backend: one compiled matcher per entity kind,
//! built once behind the model-ready gate. Matches strictly contained in
//! a larger match of another kind are dropped; identical spans merge into
//! a single annotation carrying every kind found there.

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

use super::{DetectedEntity, EntityAnnotation, EntityAnnotator, EntityKind, ExtractionError};

/// Entity annotator backed by a compiled pattern set
pub struct PatternAnnotator {
    kinds: Vec<EntityKind>,
    matchers: OnceLock<Vec<(EntityKind, Regex)>>,
}

impl PatternAnnotator {
    /// Create an annotator covering every entity kind
    pub fn new() -> Self {
        Self::with_kinds(EntityKind::ALL.to_vec())
    }

    /// Create an annotator restricted to the given kinds
    ///
    /// Kinds are always matched in presentation order, whatever order the
    /// caller passes them in; Unknown is never matched.
    pub fn with_kinds(kinds: Vec<EntityKind>) -> Self {
        let kinds = EntityKind::ALL
            .iter()
            .copied()
            .filter(|kind| kinds.contains(kind))
            .collect();

        Self {
            kinds,
            matchers: OnceLock::new(),
        }
    }

    fn pattern_for(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Address => {
                r"\b\d{1,5}[A-Za-z]?\s+(?:[A-Z][A-Za-z]+\s+){0,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Parkway|Pkwy|Way|Court|Ct|Square|Sq)\.?\b"
            }
            EntityKind::Email => r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            EntityKind::FlightNumber => r"\b[A-Z]{2}\s?\d{1,4}\b",
            EntityKind::Iban => r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b",
            EntityKind::Isbn => r"\b97[89][- ]?\d{1,5}[- ]?\d{1,7}[- ]?\d{1,7}[- ]?\d\b",
            EntityKind::Money => {
                r"[$€£]\s?\d+(?:,\d{3})*(?:\.\d{1,2})?|\b\d+(?:,\d{3})*(?:\.\d{1,2})?\s?(?:USD|EUR|GBP)\b"
            }
            EntityKind::PaymentCard => r"\b\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}\b|\b\d{16}\b",
            EntityKind::Phone => {
                r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{2,4}\)[ .-]?)?\b\d{3,4}[ .-]\d{3,4}(?:[ .-]\d{2,4})?\b"
            }
            EntityKind::TrackingNumber => r"\b(?:1Z[0-9A-Z]{16}|9[2345]\d{20,24})\b",
            EntityKind::Url => {
                r#"\b(?:https?://[^\s<>"']+|www\.[^\s<>"']+|[A-Za-z0-9][A-Za-z0-9-]*(?:\.[A-Za-z0-9-]+)*\.(?:com|org|net|edu|gov|io|dev)(?:/[^\s<>"']*)?)"#
            }
            EntityKind::Unknown => r"[^\s\S]", // never matches; Unknown is a mapping fallback only
        }
    }

    fn build_matchers(&self) -> Result<Vec<(EntityKind, Regex)>, ExtractionError> {
        self.kinds
            .iter()
            .map(|&kind| {
                Regex::new(Self::pattern_for(kind))
                    .map(|regex| (kind, regex))
                    .map_err(|e| {
                        ExtractionError::ModelUnavailable(format!(
                            "failed to compile {} matcher: {}",
                            kind.label(),
                            e
                        ))
                    })
            })
            .collect()
    }
}

impl Default for PatternAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityAnnotator for PatternAnnotator {
    async fn ensure_model(&self) -> Result<(), ExtractionError> {
        if self.matchers.get().is_some() {
            return Ok(());
        }

        let matchers = self.build_matchers()?;
        debug!("Compiled {} entity matchers", matchers.len());
        let _ = self.matchers.set(matchers);
        Ok(())
    }

    async fn annotate(&self, text: &str) -> Result<Vec<EntityAnnotation>, ExtractionError> {
        let matchers = self
            .matchers
            .get()
            .ok_or_else(|| ExtractionError::Failed("annotation model not ready".to_string()))?;

        if text.is_empty() {
            return Ok(Vec::new());
        }

        // Collect raw matches, kinds in presentation order
        let mut raw: Vec<(usize, usize, EntityKind)> = Vec::new();
        for (kind, regex) in matchers {
            for found in regex.find_iter(text) {
                let (start, end) = clean_span(*kind, text, found.start(), found.end());
                if start < end {
                    raw.push((start, end, *kind));
                }
            }
        }

        // Drop matches strictly contained within a larger match of another span
        let kept: Vec<&(usize, usize, EntityKind)> = raw
            .iter()
            .filter(|a| {
                !raw.iter().any(|b| {
                    b.0 <= a.0 && a.1 <= b.1 && (b.0 != a.0 || b.1 != a.1)
                })
            })
            .collect();

        // Merge identical spans into one annotation with every kind found
        let mut grouped: BTreeMap<(usize, usize), Vec<DetectedEntity>> = BTreeMap::new();
        for (start, end, kind) in kept {
            grouped
                .entry((*start, *end))
                .or_default()
                .push(DetectedEntity { code: kind.code() });
        }

        Ok(grouped
            .into_iter()
            .map(|((start, end), entities)| EntityAnnotation {
                start,
                end,
                entities,
            })
            .collect())
    }
}

/// Trim trailing punctuation that regularly clings to URL matches
fn clean_span(kind: EntityKind, text: &str, start: usize, mut end: usize) -> (usize, usize) {
    if kind != EntityKind::Url {
        return (start, end);
    }

    while end > start {
        match text[start..end].chars().next_back() {
            Some('.') | Some(',') | Some(')') | Some(']') | Some(';') | Some(':') | Some('!')
            | Some('?') => end -= 1,
            _ => break,
        }
    }
    (start, end)
}
