use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;
use time::{Date, Duration, Month, OffsetDateTime};

use crate::clock::Clock;
use crate::storage::KvStore;

use super::draft::DiaryDraft;
use super::entry::{derive_title, new_entry_id, sanitize_entries, DiaryCategory, DiaryEntry};
use super::moods::{Mood, MoodBook};
use super::visit::VisitSnapshot;
use super::{DiaryError, DiaryEvent, RemoveOptions, RemoveOutcome};

pub const ENTRIES_KEY: &str = "diary/entries";
pub const LAST_ACCESS_KEY: &str = "diary/last-access";
pub const MOODS_KEY: &str = "diary/moods";

/// The single source of truth for diary state.
///
/// Every mutation updates the in-memory state synchronously, then issues a
/// fire-and-forget write of the full entry list; write failures are reported
/// through the event channel but never rolled back. Consumers observe changes
/// either by reading through the repository or by subscribing to its events,
/// never through shadow copies.
pub struct EntryRepository {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    entries: Vec<DiaryEntry>,
    moods: MoodBook,
    last_access: Option<OffsetDateTime>,
    now: OffsetDateTime,
    horizon: Option<OffsetDateTime>,
    visit: VisitSnapshot,
    pending_removal: Option<String>,
    subscribers: Vec<Sender<DiaryEvent>>,
    loaded: bool,
}

impl EntryRepository {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        let now = clock.now();
        Self {
            store,
            clock,
            retention,
            entries: Vec::new(),
            moods: MoodBook::new(),
            last_access: None,
            now,
            horizon: None,
            visit: VisitSnapshot::default(),
            pending_removal: None,
            subscribers: Vec::new(),
            loaded: false,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<DiaryEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Rehydrate from the store.
    ///
    /// Always leaves the repository in a loaded state: a failed read or an
    /// unparseable entry payload falls back to an empty diary and reports
    /// [`DiaryError::Read`] to the caller.
    pub fn load(&mut self) -> Result<(), DiaryError> {
        let now = self.clock.now();
        self.now = now;

        let read: anyhow::Result<(Option<String>, Option<String>, Option<String>)> = (|| {
            Ok((
                self.store.get(ENTRIES_KEY)?,
                self.store.get(LAST_ACCESS_KEY)?,
                self.store.get(MOODS_KEY)?,
            ))
        })();

        let (raw_entries, raw_last_access, raw_moods) = match read {
            Ok(values) => values,
            Err(err) => {
                self.entries.clear();
                self.moods = MoodBook::new();
                self.recompute_horizon();
                self.visit = VisitSnapshot::default();
                self.last_access = Some(now);
                self.loaded = true;
                return Err(DiaryError::Read(err));
            }
        };

        let previous_access = raw_last_access.as_deref().and_then(parse_epoch_millis);
        self.visit = VisitSnapshot::from_gap(previous_access, now);

        let mut parse_failure: Option<anyhow::Error> = None;

        let away_too_long = previous_access
            .map(|last| now - last >= self.retention)
            .unwrap_or(false);
        if away_too_long {
            // Retention is anchored to visiting: coming back after a full
            // window means the whole stored set is stale, whatever the
            // individual timestamps say.
            self.entries.clear();
            self.persist_entries();
        } else {
            match raw_entries {
                None => self.entries.clear(),
                Some(raw) => match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => {
                        self.entries = sanitize_entries(&value, now);
                        let before = self.entries.len();
                        let retention = self.retention;
                        self.entries.retain(|e| !e.is_expired(retention, now));
                        if self.entries.len() != before {
                            self.persist_entries();
                        }
                    }
                    Err(err) => {
                        self.entries.clear();
                        parse_failure =
                            Some(anyhow::Error::new(err).context("parsing persisted entries"));
                    }
                },
            }
        }

        self.moods = raw_moods
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .map(|value| MoodBook::sanitize(&value))
            .unwrap_or_default();

        self.recompute_horizon();
        self.last_access = Some(now);
        self.persist_last_access(now);
        self.loaded = true;

        match parse_failure {
            Some(err) => Err(DiaryError::Read(err)),
            None => Ok(()),
        }
    }

    /// Submit the draft as a new entry at the head of the list.
    ///
    /// The draft is cleared only on success; a validation failure leaves both
    /// the draft and the entry list untouched.
    pub fn add(
        &mut self,
        draft: &mut DiaryDraft,
        category: DiaryCategory,
    ) -> Result<DiaryEntry, DiaryError> {
        let content = draft.content.trim();
        if content.is_empty() {
            return Err(DiaryError::EmptyContent);
        }

        let now = self.clock.now();
        self.now = now;
        let entry = DiaryEntry {
            id: new_entry_id(),
            title: derive_title(&draft.title, content),
            content: content.to_string(),
            category,
            created_at: now,
            is_completed: false,
        };
        self.entries.insert(0, entry.clone());
        self.recompute_horizon();
        self.touch_access(now);
        self.persist_entries();
        draft.clear();
        self.emit(DiaryEvent::Added {
            id: entry.id.clone(),
            title: entry.title.clone(),
        });
        Ok(entry)
    }

    /// Remove an entry. An unknown id is a no-op, not an error.
    ///
    /// The interactive path is a two-step protocol: without `skip_confirm`
    /// the removal is merely requested and must be committed through
    /// [`confirm_removal`](Self::confirm_removal) (or abandoned via
    /// [`cancel_removal`](Self::cancel_removal)).
    pub fn remove(&mut self, id: &str, options: RemoveOptions) -> RemoveOutcome {
        let Some(entry) = self.entries.iter().find(|entry| entry.id == id) else {
            return RemoveOutcome::NotFound;
        };
        if options.skip_confirm {
            self.commit_removal(id)
        } else {
            let event = DiaryEvent::RemovalRequested {
                id: entry.id.clone(),
                title: entry.title.clone(),
            };
            self.pending_removal = Some(id.to_string());
            self.emit(event);
            RemoveOutcome::ConfirmationRequired
        }
    }

    pub fn confirm_removal(&mut self, id: &str) -> RemoveOutcome {
        if self.pending_removal.as_deref() != Some(id) {
            return RemoveOutcome::NotFound;
        }
        self.pending_removal = None;
        self.commit_removal(id)
    }

    pub fn cancel_removal(&mut self) {
        self.pending_removal = None;
    }

    pub fn pending_removal(&self) -> Option<&str> {
        self.pending_removal.as_deref()
    }

    fn commit_removal(&mut self, id: &str) -> RemoveOutcome {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        if self.entries.len() == before {
            return RemoveOutcome::NotFound;
        }
        let now = self.clock.now();
        self.now = now;
        self.recompute_horizon();
        self.touch_access(now);
        self.persist_entries();
        self.emit(DiaryEvent::Removed { id: id.to_string() });
        RemoveOutcome::Removed
    }

    /// Flip an entry's completed flag. Returns the new value, or `None` when
    /// the id is unknown. Completion never affects expiry.
    pub fn toggle_completion(&mut self, id: &str) -> Option<bool> {
        let entry = self.entries.iter_mut().find(|entry| entry.id == id)?;
        entry.is_completed = !entry.is_completed;
        let is_completed = entry.is_completed;
        let now = self.clock.now();
        self.now = now;
        self.touch_access(now);
        self.persist_entries();
        self.emit(DiaryEvent::Toggled {
            id: id.to_string(),
            is_completed,
        });
        Some(is_completed)
    }

    /// Evict every entry whose expiry instant has arrived. Entries sharing
    /// one instant go together. Returns the eviction count.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now();
        self.now = now;
        let before = self.entries.len();
        let retention = self.retention;
        self.entries.retain(|entry| !entry.is_expired(retention, now));
        let expired = before - self.entries.len();
        self.recompute_horizon();
        self.touch_access(now);
        if expired > 0 {
            self.persist_entries();
        }
        self.emit(DiaryEvent::Swept { expired });
        expired
    }

    /// Periodic clock tick: refresh "now" (the open session counts as
    /// visiting) and sweep once the horizon has been crossed. This is the
    /// sole passive expiry trigger; there are no per-entry timers.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        self.now = now;
        self.last_access = Some(now);
        self.persist_last_access(now);
        match self.horizon {
            Some(horizon) if now >= horizon => self.sweep_expired(),
            _ => 0,
        }
    }

    /// Entries whose expiry has already arrived, without evicting them.
    /// Drives the user-facing bulk-clear confirmation.
    pub fn expired_entries(&self) -> Vec<&DiaryEntry> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| entry.is_expired(self.retention, now))
            .collect()
    }

    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&DiaryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Earliest upcoming expiry among live entries; `None` when empty.
    pub fn horizon(&self) -> Option<OffsetDateTime> {
        self.horizon
    }

    pub fn visit(&self) -> VisitSnapshot {
        self.visit
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn now(&self) -> OffsetDateTime {
        self.now
    }

    pub fn set_day_mood(&mut self, date: Date, mood: Mood) {
        self.moods.set(date, mood);
        self.persist_moods();
    }

    pub fn day_mood(&self, date: Date) -> Option<Mood> {
        self.moods.get(date)
    }

    pub fn moods_in_month(&self, year: i32, month: Month) -> Vec<(Date, Mood)> {
        self.moods.month(year, month)
    }

    pub fn moods(&self) -> &MoodBook {
        &self.moods
    }

    fn touch_access(&mut self, now: OffsetDateTime) {
        self.last_access = Some(now);
        self.visit = VisitSnapshot::fresh(now);
        self.persist_last_access(now);
    }

    fn recompute_horizon(&mut self) {
        let retention = self.retention;
        self.horizon = self
            .entries
            .iter()
            .map(|entry| entry.expires_at(retention))
            .min();
    }

    fn persist_entries(&mut self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(anyhow::Error::new)
            .and_then(|payload| self.store.set(ENTRIES_KEY, &payload));
        if let Err(err) = result {
            let err = DiaryError::Write(err);
            tracing::error!(%err, "entry list write failed");
            self.emit(DiaryEvent::PersistenceFailed {
                message: err.to_string(),
            });
        }
    }

    fn persist_moods(&mut self) {
        let result = self
            .moods
            .to_json()
            .map_err(anyhow::Error::new)
            .and_then(|payload| self.store.set(MOODS_KEY, &payload));
        if let Err(err) = result {
            let err = DiaryError::Write(err);
            tracing::error!(%err, "mood table write failed");
            self.emit(DiaryEvent::PersistenceFailed {
                message: err.to_string(),
            });
        }
    }

    fn persist_last_access(&self, at: OffsetDateTime) {
        let millis = epoch_millis(at).to_string();
        if let Err(err) = self.store.set(LAST_ACCESS_KEY, &millis) {
            tracing::warn!(?err, "last-access write failed");
        }
    }

    fn emit(&mut self, event: DiaryEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

fn epoch_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn parse_epoch_millis(raw: &str) -> Option<OffsetDateTime> {
    let millis: i64 = raw.trim().parse().ok()?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryKvStore;
    use anyhow::anyhow;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use time::macros::{date, datetime};

    const T0: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);
    const RETENTION: Duration = Duration::days(21);

    struct FailingStore;

    impl KvStore for FailingStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("device storage unavailable reading '{key}'"))
        }

        fn set(&self, key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("device storage unavailable writing '{key}'"))
        }
    }

    /// Reads succeed, writes fail.
    struct ReadOnlyStore(MemoryKvStore);

    impl KvStore for ReadOnlyStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("disk full writing '{key}'"))
        }
    }

    fn repository(store: Arc<dyn KvStore>, clock: &ManualClock) -> EntryRepository {
        EntryRepository::new(store, Arc::new(clock.clone()), RETENTION)
    }

    fn seeded_store(entries_json: &str, last_access: Option<OffsetDateTime>) -> Arc<MemoryKvStore> {
        let store = Arc::new(MemoryKvStore::new());
        store.set(ENTRIES_KEY, entries_json).expect("seed entries");
        if let Some(last) = last_access {
            store
                .set(LAST_ACCESS_KEY, &epoch_millis(last).to_string())
                .expect("seed last access");
        }
        store
    }

    fn entry_json(id: &str, created_at: OffsetDateTime) -> String {
        format!(
            r#"{{"id":"{id}","title":"t","content":"c","createdAt":"{}","isCompleted":false}}"#,
            crate::timefmt::format_timestamp(created_at)
        )
    }

    fn draft(content: &str) -> DiaryDraft {
        DiaryDraft {
            title: String::new(),
            content: content.to_string(),
        }
    }

    fn entries_key_writes(store: &MemoryKvStore) -> usize {
        store
            .writes()
            .iter()
            .filter(|key| key.as_str() == ENTRIES_KEY)
            .count()
    }

    #[test]
    fn add_prepends_a_fresh_incomplete_entry() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");

        let mut seen = HashSet::new();
        let first = repo.add(&mut draft("older"), DiaryCategory::Daily).expect("add");
        seen.insert(first.id.clone());

        clock.advance(Duration::minutes(5));
        let mut pending = draft("hello");
        let second = repo.add(&mut pending, DiaryCategory::Work).expect("add");

        assert!(seen.insert(second.id.clone()), "ids must never repeat");
        assert!(pending.is_empty(), "draft is cleared on success");

        let head = &repo.entries()[0];
        assert_eq!(head.content, "hello");
        assert_eq!(head.category, DiaryCategory::Work);
        assert!(!head.is_completed);
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.visit().days_since_last_visit, Some(0));
    }

    #[test]
    fn add_rejects_whitespace_only_content() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");

        let mut pending = draft("   \n\t ");
        pending.title = "still a title".into();
        assert_matches!(
            repo.add(&mut pending, DiaryCategory::Daily),
            Err(DiaryError::EmptyContent)
        );
        assert!(repo.is_empty());
        assert_eq!(pending.title, "still a title", "failed add keeps the draft");
    }

    #[test]
    fn load_prunes_individually_expired_entries() {
        let stale = T0 - RETENTION - Duration::hours(1);
        let fresh = T0 - Duration::days(1);
        let store = seeded_store(
            &format!("[{},{}]", entry_json("old", stale), entry_json("new", fresh)),
            Some(T0 - Duration::hours(2)),
        );
        let clock = ManualClock::new(T0);
        let mut repo = repository(store, &clock);
        repo.load().expect("load");

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.entries()[0].id, "new");
        // expiry invariant: everything readable still has time left
        for entry in repo.entries() {
            assert!(entry.expires_at(RETENTION) > repo.now());
        }
        assert_eq!(repo.horizon(), Some(fresh + RETENTION));
    }

    #[test]
    fn load_after_a_full_window_away_wipes_everything() {
        let last_visit = T0 - RETENTION - Duration::milliseconds(1);
        let store = seeded_store(
            &format!("[{}]", entry_json("recent", T0 - Duration::hours(1))),
            Some(last_visit),
        );
        let clock = ManualClock::new(T0);
        let mut repo = repository(store.clone(), &clock);
        repo.load().expect("load");

        assert!(repo.is_empty(), "stored set is wiped regardless of entry age");
        assert_eq!(repo.horizon(), None);
        assert_eq!(store.get(ENTRIES_KEY).unwrap().as_deref(), Some("[]"));
        // the gap itself is still reported from the pre-wipe stamp
        assert_eq!(repo.visit().days_since_last_visit, Some(21));
    }

    #[test]
    fn first_visit_accepts_stored_entries_as_is() {
        let store = seeded_store(
            &format!("[{}]", entry_json("kept", T0 - Duration::days(30))),
            None,
        );
        // no last-access stamp: per-entry pruning still applies, but there is
        // no whole-set wipe and no visit gap
        let clock = ManualClock::new(T0);
        let mut repo = repository(store, &clock);
        repo.load().expect("load");
        assert!(repo.is_empty(), "entry itself was past its window");
        assert_eq!(repo.visit().days_since_last_visit, None);
    }

    #[test]
    fn load_reports_visit_gap_before_refreshing_access() {
        let store = seeded_store("[]", Some(T0 - Duration::days(2) - Duration::seconds(5)));
        let clock = ManualClock::new(T0);
        let mut repo = repository(store.clone(), &clock);
        repo.load().expect("load");

        assert_eq!(repo.visit().days_since_last_visit, Some(2));
        assert_eq!(
            store.get(LAST_ACCESS_KEY).unwrap().as_deref(),
            Some(epoch_millis(T0).to_string().as_str()),
            "access stamp is refreshed to now"
        );
    }

    #[test]
    fn load_sanitizes_partial_records_per_field() {
        let store = seeded_store(
            r#"[{"title":"","content":"salvaged\nrest","category":"nope","isCompleted":3}]"#,
            Some(T0 - Duration::hours(1)),
        );
        let clock = ManualClock::new(T0);
        let mut repo = repository(store, &clock);
        repo.load().expect("load");

        assert_eq!(repo.len(), 1);
        let entry = &repo.entries()[0];
        assert_eq!(entry.title, "salvaged");
        assert_eq!(entry.category, DiaryCategory::Daily);
        assert!(!entry.is_completed);
        assert!(!entry.id.is_empty());
        assert_eq!(entry.created_at, T0);
    }

    #[test]
    fn load_falls_back_to_empty_on_read_failure() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(FailingStore), &clock);

        assert_matches!(repo.load(), Err(DiaryError::Read(_)));
        assert!(repo.is_loaded(), "never stuck in a loading state");
        assert!(repo.is_empty());
    }

    #[test]
    fn load_falls_back_to_empty_on_unparseable_payload() {
        let store = seeded_store("{not json", Some(T0 - Duration::hours(1)));
        let clock = ManualClock::new(T0);
        let mut repo = repository(store, &clock);

        assert_matches!(repo.load(), Err(DiaryError::Read(_)));
        assert!(repo.is_loaded());
        assert!(repo.is_empty());
    }

    #[test]
    fn sweep_is_idempotent_without_time_passing() {
        let clock = ManualClock::new(T0);
        let store = Arc::new(MemoryKvStore::new());
        let mut repo = repository(store.clone(), &clock);
        repo.load().expect("load");
        repo.add(&mut draft("a"), DiaryCategory::Daily).expect("add");
        repo.add(&mut draft("b"), DiaryCategory::Daily).expect("add");

        clock.advance(RETENTION);
        assert_eq!(repo.sweep_expired(), 2);
        let entries_after_first = repo.entries().to_vec();
        let writes_after_first = entries_key_writes(&store);

        assert_eq!(repo.sweep_expired(), 0);
        assert_eq!(repo.entries(), entries_after_first.as_slice());
        assert_eq!(
            entries_key_writes(&store),
            writes_after_first,
            "a no-op sweep does not rewrite the entry list"
        );
    }

    #[test]
    fn entries_sharing_an_expiry_instant_go_together() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");
        repo.add(&mut draft("first"), DiaryCategory::Daily).expect("add");
        repo.add(&mut draft("twin"), DiaryCategory::Daily).expect("add");
        clock.advance(Duration::hours(1));
        repo.add(&mut draft("younger"), DiaryCategory::Daily).expect("add");

        // land exactly on the older pair's expiry instant: inclusive sweep
        clock.set(T0 + RETENTION);
        assert_eq!(repo.sweep_expired(), 2);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.entries()[0].content, "younger");
        assert_eq!(repo.visit().days_since_last_visit, Some(0));
    }

    #[test]
    fn toggle_round_trips_and_persists_each_time() {
        let clock = ManualClock::new(T0);
        let store = Arc::new(MemoryKvStore::new());
        let mut repo = repository(store.clone(), &clock);
        repo.load().expect("load");
        let entry = repo.add(&mut draft("task"), DiaryCategory::Study).expect("add");
        let baseline = entries_key_writes(&store);

        assert_eq!(repo.toggle_completion(&entry.id), Some(true));
        assert_eq!(repo.toggle_completion(&entry.id), Some(false));
        assert!(!repo.entries()[0].is_completed);
        assert_eq!(entries_key_writes(&store), baseline + 2);

        assert_eq!(repo.toggle_completion("missing"), None);
        assert_eq!(entries_key_writes(&store), baseline + 2);
    }

    #[test]
    fn interactive_removal_waits_for_confirmation() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");
        let entry = repo.add(&mut draft("keep me"), DiaryCategory::Daily).expect("add");
        let events = repo.subscribe();

        assert_eq!(
            repo.remove(&entry.id, RemoveOptions::default()),
            RemoveOutcome::ConfirmationRequired
        );
        assert_eq!(repo.len(), 1, "nothing removed before confirmation");
        assert_matches!(
            events.try_recv(),
            Ok(DiaryEvent::RemovalRequested { ref id, .. }) if *id == entry.id
        );

        assert_eq!(repo.confirm_removal(&entry.id), RemoveOutcome::Removed);
        assert!(repo.is_empty());
    }

    #[test]
    fn cancelled_removal_keeps_the_entry() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");
        let entry = repo.add(&mut draft("keep me"), DiaryCategory::Daily).expect("add");

        repo.remove(&entry.id, RemoveOptions::default());
        repo.cancel_removal();
        assert_eq!(repo.confirm_removal(&entry.id), RemoveOutcome::NotFound);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn skip_confirm_removes_immediately_and_unknown_ids_are_no_ops() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");
        let entry = repo.add(&mut draft("gone"), DiaryCategory::Daily).expect("add");

        assert_eq!(
            repo.remove("no-such-id", RemoveOptions { skip_confirm: true }),
            RemoveOutcome::NotFound
        );
        assert_eq!(
            repo.remove(&entry.id, RemoveOptions { skip_confirm: true }),
            RemoveOutcome::Removed
        );
        assert!(repo.is_empty());
        assert_eq!(repo.horizon(), None);
    }

    #[test]
    fn tick_sweeps_once_the_horizon_is_crossed() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");
        repo.add(&mut draft("short lived"), DiaryCategory::Daily).expect("add");

        clock.advance(RETENTION - Duration::minutes(1));
        assert_eq!(repo.tick(), 0, "horizon not yet reached");
        assert_eq!(repo.len(), 1);

        clock.advance(Duration::minutes(1));
        assert_eq!(repo.tick(), 1);
        assert!(repo.is_empty());
        assert_eq!(repo.horizon(), None);
    }

    #[test]
    fn horizon_tracks_the_earliest_expiry() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(MemoryKvStore::new()), &clock);
        repo.load().expect("load");
        let first = repo.add(&mut draft("first"), DiaryCategory::Daily).expect("add");
        clock.advance(Duration::days(2));
        repo.add(&mut draft("second"), DiaryCategory::Daily).expect("add");

        assert_eq!(repo.horizon(), Some(T0 + RETENTION));
        repo.remove(&first.id, RemoveOptions { skip_confirm: true });
        assert_eq!(repo.horizon(), Some(T0 + Duration::days(2) + RETENTION));
    }

    #[test]
    fn write_failures_keep_memory_state_and_raise_an_event() {
        let clock = ManualClock::new(T0);
        let mut repo = repository(Arc::new(ReadOnlyStore(MemoryKvStore::new())), &clock);
        repo.load().expect("load");
        let events = repo.subscribe();

        let entry = repo.add(&mut draft("survives"), DiaryCategory::Daily).expect("add");
        assert_eq!(repo.len(), 1, "no rollback on write failure");
        assert_eq!(repo.entries()[0].id, entry.id);

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, DiaryEvent::PersistenceFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure, "write failure must be surfaced");
    }

    #[test]
    fn moods_survive_entry_removal() {
        let clock = ManualClock::new(T0);
        let store = Arc::new(MemoryKvStore::new());
        let mut repo = repository(store.clone(), &clock);
        repo.load().expect("load");

        let entry = repo.add(&mut draft("a day to forget"), DiaryCategory::Daily).expect("add");
        repo.set_day_mood(date!(2024 - 05 - 01), Mood::Bad);
        repo.remove(&entry.id, RemoveOptions { skip_confirm: true });

        assert_eq!(repo.day_mood(date!(2024 - 05 - 01)), Some(Mood::Bad));
        assert_eq!(
            repo.moods_in_month(2024, Month::May),
            vec![(date!(2024 - 05 - 01), Mood::Bad)]
        );

        // and they come back on the next load
        let mut reloaded = repository(store, &clock);
        reloaded.load().expect("load");
        assert_eq!(reloaded.day_mood(date!(2024 - 05 - 01)), Some(Mood::Bad));
        assert!(reloaded.is_empty());
    }

    #[test]
    fn persisted_millis_stamp_round_trips() {
        assert_eq!(
            parse_epoch_millis(&epoch_millis(T0).to_string()),
            Some(T0)
        );
        assert_eq!(parse_epoch_millis("not a number"), None);
    }
}
