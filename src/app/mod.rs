use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use time::{Date, Month, OffsetDateTime};

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::diary::{
    DiaryCategory, DiaryDraft, DiaryEntry, DiaryError, DiaryEvent, DraftField, EntryRepository,
    Mood, RemoveOptions, RemoveOutcome, SweepScheduler, VisitSnapshot,
};
use crate::storage::KvStore;

/// One app session: the repository behind its lock, the in-progress draft,
/// and (while running in the foreground) the periodic sweep scheduler.
pub struct DiarySession {
    pub config: Arc<AppConfig>,
    repository: Arc<Mutex<EntryRepository>>,
    scheduler: Option<SweepScheduler>,
    draft: DiaryDraft,
}

impl DiarySession {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn KvStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Arc<AppConfig>,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let repository = EntryRepository::new(store, clock, config.retention_window());
        Self {
            config,
            repository: Arc::new(Mutex::new(repository)),
            scheduler: None,
            draft: DiaryDraft::default(),
        }
    }

    pub fn load(&mut self) -> Result<(), DiaryError> {
        self.repository.lock().load()
    }

    pub fn subscribe(&self) -> Receiver<DiaryEvent> {
        self.repository.lock().subscribe()
    }

    pub fn repository(&self) -> Arc<Mutex<EntryRepository>> {
        self.repository.clone()
    }

    pub fn draft(&self) -> &DiaryDraft {
        &self.draft
    }

    pub fn edit_draft(&mut self, field: DraftField, value: impl Into<String>) {
        self.draft.set_field(field, value);
    }

    pub fn submit_draft(&mut self, category: DiaryCategory) -> Result<DiaryEntry, DiaryError> {
        self.repository.lock().add(&mut self.draft, category)
    }

    pub fn entries_snapshot(&self) -> Vec<DiaryEntry> {
        self.repository.lock().entries().to_vec()
    }

    pub fn expired_snapshot(&self) -> Vec<DiaryEntry> {
        self.repository
            .lock()
            .expired_entries()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn visit(&self) -> VisitSnapshot {
        self.repository.lock().visit()
    }

    pub fn horizon(&self) -> Option<OffsetDateTime> {
        self.repository.lock().horizon()
    }

    pub fn remove(&self, id: &str, options: RemoveOptions) -> RemoveOutcome {
        self.repository.lock().remove(id, options)
    }

    pub fn confirm_removal(&self, id: &str) -> RemoveOutcome {
        self.repository.lock().confirm_removal(id)
    }

    pub fn cancel_removal(&self) {
        self.repository.lock().cancel_removal()
    }

    pub fn toggle_completion(&self, id: &str) -> Option<bool> {
        self.repository.lock().toggle_completion(id)
    }

    pub fn sweep_expired(&self) -> usize {
        self.repository.lock().sweep_expired()
    }

    pub fn set_day_mood(&self, date: Date, mood: Mood) {
        self.repository.lock().set_day_mood(date, mood)
    }

    pub fn moods_in_month(&self, year: i32, month: Month) -> Vec<(Date, Mood)> {
        self.repository.lock().moods_in_month(year, month)
    }

    /// Start the periodic expiry tick. Idempotent while running.
    pub fn start_sweeper(&mut self) -> Result<()> {
        if self.scheduler.is_none() {
            self.scheduler = Some(SweepScheduler::spawn(
                self.repository.clone(),
                self.config.tick_interval(),
            )?);
        }
        Ok(())
    }

    pub fn stop_sweeper(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
    }
}
