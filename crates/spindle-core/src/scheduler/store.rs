//! Result store: terminal task records by id.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock};

use crate::domain::{TaskId, TaskRecord, TaskStatus};
use crate::error::SchedulerError;

/// Terminal records, written once per task by the scheduler.
///
/// Readers take a shared lock and clone the record out, so lookups never
/// wait on anything but another task's single-entry insert. A record is
/// never modified after insertion, which is why a poisoned lock is safe to
/// read through.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal record for `id`, or `None` if the task is unknown or has
    /// not finished.
    pub fn get(&self, id: TaskId) -> Option<TaskRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored record, ordered by completion time.
    pub fn all(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.completed_at(), r.id()));
        records
    }

    /// `(completed, failed)` counts.
    pub(crate) fn tally(&self) -> (usize, usize) {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .values()
            .fold((0, 0), |(completed, failed), record| match record.status() {
                TaskStatus::Completed => (completed + 1, failed),
                TaskStatus::Failed => (completed, failed + 1),
                _ => (completed, failed),
            })
    }

    pub(crate) fn insert(&self, record: TaskRecord) -> Result<(), SchedulerError> {
        if !record.status().is_terminal() {
            return Err(SchedulerError::InvalidTask {
                id: record.id(),
                reason: format!("only terminal records are stored, got {}", record.status()),
            });
        }

        let mut records = self
            .records
            .write()
            .map_err(|e| SchedulerError::LockPoisoned(format!("result store: {e}")))?;
        match records.entry(record.id()) {
            Entry::Occupied(_) => Err(SchedulerError::DuplicateTask(record.id())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn finished(title: &str, offset_secs: i64) -> TaskRecord {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = TaskRecord::new(TaskId::generate(), title, 0, t0);
        record.mark_running(t0).unwrap();
        record.mark_completed(t0 + Duration::seconds(offset_secs)).unwrap();
        record
    }

    #[test]
    fn get_returns_exact_record() {
        let store = ResultStore::new();
        let record = finished("a", 1);
        store.insert(record.clone()).unwrap();

        assert_eq!(store.get(record.id()), Some(record.clone()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = ResultStore::new();
        assert!(store.get(TaskId::generate()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn second_insert_for_same_id_is_rejected() {
        let store = ResultStore::new();
        let record = finished("a", 1);
        store.insert(record.clone()).unwrap();

        let err = store.insert(record.clone()).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateTask(id) if id == record.id()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn non_terminal_records_are_rejected() {
        let store = ResultStore::new();
        let record = TaskRecord::new(TaskId::generate(), "pending", 0, Utc::now());

        assert!(matches!(
            store.insert(record),
            Err(SchedulerError::InvalidTask { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn all_is_ordered_by_completion() {
        let store = ResultStore::new();
        store.insert(finished("late", 30)).unwrap();
        store.insert(finished("early", 10)).unwrap();
        store.insert(finished("middle", 20)).unwrap();

        let titles: Vec<_> = store.all().iter().map(|r| r.title().to_string()).collect();
        assert_eq!(titles, ["early", "middle", "late"]);
    }
}
