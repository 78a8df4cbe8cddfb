//! Strongly-typed identifiers.
//!
//! # ULID ベースの ID
//! `TaskId` は ULID を `Id<T>` で包んだもの。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 後から生成した ID ほど大きい（ミリ秒精度）
//! - **調整不要**: producer ごとに独立して生成できる
//! - **シリアライズ**: JSON では素の ULID 文字列（prefix は Display のみ）
//!
//! ## Phantom Type パターン
//! `T` はゼロサイズのマーカー型で、実行時のメモリは消費しない。
//! 別種の ID を取り違えるとコンパイルエラーになる。
//!
//! ## 重複検出
//! producer は `Task::with_id` で ID を指定できる。同じ ID の二度目の
//! `submit` は scheduler が `DuplicateTask` で拒否する。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for id kinds. Provides the prefix used by `Display`.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed id.
///
/// Serializes as the bare ULID string; the prefix is display-only.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Generate a fresh id from the current time.
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for task ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskMarker {}

impl IdMarker for TaskMarker {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of a submitted task.
pub type TaskId = Id<TaskMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        let ulid = Ulid::new();
        let id = TaskId::from_ulid(ulid);

        assert_eq!(id.as_ulid(), ulid);
        assert_eq!(id.to_string(), format!("task-{ulid}"));
    }

    #[test]
    fn generated_ids_are_unique_and_sortable() {
        let id1 = TaskId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TaskId::generate();

        assert_ne!(id1, id2);
        assert!(id1 < id2);
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let id = TaskId::generate();

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_marker_is_zero_sized() {
        assert_eq!(std::mem::size_of::<TaskId>(), std::mem::size_of::<Ulid>());
    }
}
