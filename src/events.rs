//! Structured progress events.
//!
//! Stages never print. They hand an `Event` to the `Reporter` passed in by the
//! caller, which decides how (or whether) to render it.

use serde::Serialize;

use crate::models::{
    InteractionCleanReport, ItemCleanReport, JoinReport, LoadReport, MetadataParseReport,
    ReviewParseReport, SaveReport,
};

/// Input file a loading phase reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Reviews,
    Metadata,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    LoadStarted { source: Source, path: String },
    Loaded { source: Source, report: LoadReport },
    ReviewsParsed(ReviewParseReport),
    MetadataParsed(MetadataParseReport),
    InteractionsCleaned(InteractionCleanReport),
    ItemsCleaned(ItemCleanReport),
    JoinEnforced(JoinReport),
    HybridBuilt { rows: usize },
    /// Emitted before a dense matrix is allocated.
    DenseMatrix { users: usize, items: usize },
    MatrixBuilt { users: usize, items: usize },
    Saved(SaveReport),
}

/// Receives events from pipeline stages.
pub trait Reporter {
    fn report(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> Reporter for F {
    fn report(&mut self, event: &Event) {
        self(event)
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&mut self, _event: &Event) {}
}

/// Keeps every event, in order. Handy for tests and embedding callers.
#[derive(Clone, Debug, Default)]
pub struct CollectingReporter {
    pub events: Vec<Event>,
}

impl Reporter for CollectingReporter {
    fn report(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}
