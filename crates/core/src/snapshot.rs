//! Immutable per-refresh snapshot of both boards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BoardCategory, NormalizedRecord};
use crate::quality::QualityReport;

/// How current a board's data is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    /// Last fetch failed; data is from an earlier refresh or the raw cache.
    Stale { reason: String },
    /// No data has ever been loaded for this board.
    Unavailable { reason: String },
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Fresh => None,
            Self::Stale { reason } | Self::Unavailable { reason } => Some(reason),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Live,
    Cache,
    Demo,
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub category: BoardCategory,
    pub records: Vec<NormalizedRecord>,
    pub quality: QualityReport,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub freshness: Freshness,
    pub origin: DataOrigin,
}

impl BoardSnapshot {
    pub fn unavailable(category: BoardCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            records: Vec::new(),
            quality: QualityReport::empty(category),
            refreshed_at: None,
            freshness: Freshness::Unavailable { reason: reason.into() },
            origin: DataOrigin::None,
        }
    }

    /// Same data, marked stale for `reason`.
    pub fn into_stale(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.freshness = match self.freshness {
            Freshness::Unavailable { .. } => Freshness::Unavailable { reason },
            _ => Freshness::Stale { reason },
        };
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Incremented on every swap; 0 is the initial empty snapshot.
    pub generation: u64,
    pub boards: BTreeMap<BoardCategory, BoardSnapshot>,
}

impl Snapshot {
    pub fn empty() -> Self {
        let boards = BoardCategory::ALL
            .into_iter()
            .map(|category| (category, BoardSnapshot::unavailable(category, "not refreshed yet")))
            .collect();
        Self { generation: 0, boards }
    }

    pub fn board(&self, category: BoardCategory) -> Option<&BoardSnapshot> {
        self.boards.get(&category)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
