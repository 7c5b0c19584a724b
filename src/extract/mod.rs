//! Entity Extraction Layer
//!
//! Turns recognized text into typed entity annotations, and defines the
//! flattened item value object handed to the results view.

pub mod patterns;

pub use patterns::PatternAnnotator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of entity kinds the annotator can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Address,
    Email,
    FlightNumber,
    Iban,
    Isbn,
    Money,
    PaymentCard,
    Phone,
    TrackingNumber,
    Url,
    /// Fallback for any unrecognized type code
    Unknown,
}

impl EntityKind {
    /// All concrete kinds, in presentation order
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Address,
        EntityKind::Email,
        EntityKind::FlightNumber,
        EntityKind::Iban,
        EntityKind::Isbn,
        EntityKind::Money,
        EntityKind::PaymentCard,
        EntityKind::Phone,
        EntityKind::TrackingNumber,
        EntityKind::Url,
    ];

    /// Numeric wire code for this kind (annotation backends speak codes)
    pub fn code(&self) -> u32 {
        match self {
            EntityKind::Address => 1,
            EntityKind::Email => 2,
            EntityKind::FlightNumber => 3,
            EntityKind::Iban => 4,
            EntityKind::Isbn => 5,
            EntityKind::Money => 6,
            EntityKind::PaymentCard => 7,
            EntityKind::Phone => 8,
            EntityKind::TrackingNumber => 9,
            EntityKind::Url => 10,
            EntityKind::Unknown => 0,
        }
    }

    /// Total mapping from a wire code; unrecognized codes map to Unknown
    pub fn from_code(code: u32) -> EntityKind {
        match code {
            1 => EntityKind::Address,
            2 => EntityKind::Email,
            3 => EntityKind::FlightNumber,
            4 => EntityKind::Iban,
            5 => EntityKind::Isbn,
            6 => EntityKind::Money,
            7 => EntityKind::PaymentCard,
            8 => EntityKind::Phone,
            9 => EntityKind::TrackingNumber,
            10 => EntityKind::Url,
            _ => EntityKind::Unknown,
        }
    }

    /// Stable display label
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Address => "Address",
            EntityKind::Email => "Email",
            EntityKind::FlightNumber => "Flight Number",
            EntityKind::Iban => "IBAN",
            EntityKind::Isbn => "ISBN",
            EntityKind::Money => "Money",
            EntityKind::PaymentCard => "Payment Card",
            EntityKind::Phone => "Phone",
            EntityKind::TrackingNumber => "Tracking Number",
            EntityKind::Url => "URL",
            EntityKind::Unknown => "Unknown",
        }
    }
}

/// One typed entity detected within an annotation span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedEntity {
    /// Wire code of the entity type
    pub code: u32,
}

/// A span over the recognized text with the entities found in it
#[derive(Debug, Clone)]
pub struct EntityAnnotation {
    /// Byte offset of the span start
    pub start: usize,
    /// Byte offset of the span end (exclusive)
    pub end: usize,
    /// Entities found at this span, in backend order
    pub entities: Vec<DetectedEntity>,
}

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The annotation model could not be made ready
    #[error("entity model unavailable: {0}")]
    ModelUnavailable(String),
    /// Annotation itself failed
    #[error("entity annotation failed: {0}")]
    Failed(String),
}

/// A collaborator able to annotate plain text with typed entities
#[async_trait]
pub trait EntityAnnotator: Send + Sync {
    /// Make sure the annotation model is ready; downloads or compiles it
    /// on first use. Opaque gate with no progress reporting.
    async fn ensure_model(&self) -> Result<(), ExtractionError>;

    /// Annotate the text, returning spans in increasing start order
    async fn annotate(&self, text: &str) -> Result<Vec<EntityAnnotation>, ExtractionError>;
}

/// The value object handed across the screen boundary
///
/// Constructed once per extracted entity and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityItem {
    /// The matched substring of the recognized text
    pub name: String,
    /// Display label of the entity kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description embedding the kind label
    pub description: String,
}

impl EntityItem {
    /// Create an item for a matched name and kind
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        let label = kind.label();
        Self {
            name: name.into(),
            kind: label.to_string(),
            description: format!("Type: {}", label),
        }
    }
}
