//! Field binding and extraction status
//!
//! The engine never touches a form widget. It knows a field only by its
//! [`FieldKey`] and talks to the host through [`FieldRegistry`].

use log::debug;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a logical form slot
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(String);

impl FieldKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presentation state of the armed field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    #[default]
    Idle,
    /// A rectangle is being drawn
    Drawing,
    /// The last drag wrote text into the field
    Matched,
    /// The last drag enclosed no text
    Empty,
}

/// The three visual cues a host renders for a field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Highlight {
    Neutral,
    InProgress,
    NoMatch,
}

impl ExtractionStatus {
    #[must_use]
    pub const fn highlight(self) -> Highlight {
        match self {
            Self::Idle | Self::Matched => Highlight::Neutral,
            Self::Drawing => Highlight::InProgress,
            Self::Empty => Highlight::NoMatch,
        }
    }
}

/// Host side of the field contract
pub trait FieldRegistry {
    /// Store extracted text as the field's value. Only called on a match.
    fn write_field_value(&mut self, field: &FieldKey, text: &str);

    /// Status changed for `field`
    fn on_extraction_status(&mut self, field: &FieldKey, status: ExtractionStatus);
}

/// Writes extraction results into the armed field and tracks its status
#[derive(Debug, Default)]
pub struct FieldBinder {
    status: ExtractionStatus,
    before_drawing: Option<ExtractionStatus>,
}

impl FieldBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> ExtractionStatus {
        self.status
    }

    /// A field was (re-)armed: its status starts over at idle
    pub fn reset(&mut self, field: &FieldKey, registry: &mut dyn FieldRegistry) {
        self.before_drawing = None;
        self.set(field, ExtractionStatus::Idle, registry);
    }

    /// A drag started on `field`
    pub fn begin_drawing(&mut self, field: &FieldKey, registry: &mut dyn FieldRegistry) {
        self.before_drawing = Some(self.status);
        self.set(field, ExtractionStatus::Drawing, registry);
    }

    /// A drag on `field` was abandoned; put back whatever status it had
    /// before the drag so the host sees no spurious result
    pub fn abort(&mut self, field: &FieldKey, registry: &mut dyn FieldRegistry) {
        if let Some(previous) = self.before_drawing.take() {
            self.set(field, previous, registry);
        }
    }

    /// Bind extracted text to the armed field.
    ///
    /// Non-empty text is written and yields `Matched`; empty text leaves the
    /// value alone and yields `Empty`. Without an armed field nothing
    /// happens and the current status is returned unchanged.
    pub fn bind(
        &mut self,
        armed: Option<&FieldKey>,
        extracted: &str,
        registry: &mut dyn FieldRegistry,
    ) -> ExtractionStatus {
        let Some(field) = armed else {
            debug!("Commit with no armed field, ignoring");
            return self.status;
        };
        self.before_drawing = None;

        if extracted.is_empty() {
            self.set(field, ExtractionStatus::Empty, registry);
        } else {
            registry.write_field_value(field, extracted);
            self.set(field, ExtractionStatus::Matched, registry);
        }
        self.status
    }

    fn set(&mut self, field: &FieldKey, status: ExtractionStatus, registry: &mut dyn FieldRegistry) {
        self.status = status;
        registry.on_extraction_status(field, status);
    }
}
