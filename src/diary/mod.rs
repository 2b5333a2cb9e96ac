use thiserror::Error;

mod draft;
mod entry;
mod moods;
mod repository;
mod sweeper;
mod visit;

pub use draft::{DiaryDraft, DraftField};
pub use entry::{derive_title, DiaryCategory, DiaryEntry, UNTITLED};
pub use moods::{Mood, MoodBook};
pub use repository::{EntryRepository, ENTRIES_KEY, LAST_ACCESS_KEY, MOODS_KEY};
pub use sweeper::SweepScheduler;
pub use visit::{visit_message, VisitSnapshot};

/// The diary's error taxonomy. Nothing here is fatal; every failure is
/// contained to the operation that raised it.
#[derive(Debug, Error)]
pub enum DiaryError {
    /// User input failed a precondition: the submitted draft carries no
    /// content once trimmed.
    #[error("diary entries need some content before they can be saved")]
    EmptyContent,
    /// Store read or payload parse failure on load. The repository has
    /// already fallen back to an empty loaded state.
    #[error("failed to read the persisted diary: {0:#}")]
    Read(anyhow::Error),
    /// Store write failure. In-memory state is kept as-is; the gap in
    /// durability is reported, not hidden.
    #[error("failed to persist the diary: {0:#}")]
    Write(anyhow::Error),
}

/// Notifications broadcast to presentation-layer subscribers.
#[derive(Debug, Clone)]
pub enum DiaryEvent {
    /// A new entry was accepted and now heads the list.
    Added { id: String, title: String },
    /// A destructive action awaits explicit confirmation.
    RemovalRequested { id: String, title: String },
    Removed { id: String },
    Toggled { id: String, is_completed: bool },
    /// An expiry sweep ran, evicting `expired` entries.
    Swept { expired: usize },
    /// A fire-and-forget write failed; memory and disk now disagree.
    PersistenceFailed { message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Commit immediately instead of requesting confirmation first. Used by
    /// bulk and automatic paths.
    pub skip_confirm: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Interactive path: the removal is pending until confirmed.
    ConfirmationRequired,
    /// Unknown id (or stale confirmation): a no-op, not an error.
    NotFound,
}
