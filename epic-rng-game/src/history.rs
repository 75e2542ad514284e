//! Bounded roll history and summary statistics.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::constants::HISTORY_CAPACITY;
use crate::roll::{RollKind, RollOutcome, RollTag};

/// Compact record of one committed roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub base: u64,
    pub final_points: u64,
    pub tag: RollTag,
    pub kind: RollKind,
    pub dice: usize,
}

impl From<&RollOutcome> for HistoryEntry {
    fn from(outcome: &RollOutcome) -> Self {
        Self {
            base: outcome.base,
            final_points: outcome.final_points,
            tag: outcome.tag,
            kind: outcome.kind,
            dice: outcome.sub_rolls.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollStatistics {
    pub total_rolls: usize,
    pub total_points: u64,
    pub average_points: u64,
    pub best: HistoryEntry,
    /// Share of critical-tagged rolls, in percent.
    pub critical_rate: f64,
}

/// Newest-first ring of recent rolls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollHistory {
    entries: VecDeque<HistoryEntry>,
}

impl RollHistory {
    pub fn record(&mut self, outcome: &RollOutcome) {
        self.push(HistoryEntry::from(outcome));
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Newest entries first, at most `limit` of them.
    #[must_use]
    pub fn newest(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Rebuild from a newest-first list, keeping the capacity bound.
    #[must_use]
    pub fn from_newest(entries: Vec<HistoryEntry>) -> Self {
        let mut history = Self {
            entries: entries.into(),
        };
        history.entries.truncate(HISTORY_CAPACITY);
        history
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn statistics(&self) -> Option<RollStatistics> {
        let best = self
            .entries
            .iter()
            .reduce(|best, entry| if entry.final_points > best.final_points { entry } else { best })?
            .clone();
        let total_rolls = self.entries.len();
        let total_points = self
            .entries
            .iter()
            .fold(0_u64, |sum, entry| sum.saturating_add(entry.final_points));
        let count = u64::try_from(total_rolls).unwrap_or(u64::MAX).max(1);
        let criticals = self.entries.iter().filter(|entry| entry.tag.is_critical()).count();
        let critical_rate = crate::numbers::usize_to_f64(criticals) / crate::numbers::usize_to_f64(total_rolls) * 100.0;
        Some(RollStatistics {
            total_rolls,
            total_points,
            average_points: total_points / count,
            best,
            critical_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(points: u64, tag: RollTag) -> HistoryEntry {
        HistoryEntry {
            base: points,
            final_points: points,
            tag,
            kind: RollKind::Single,
            dice: 1,
        }
    }

    #[test]
    fn history_keeps_newest_hundred() {
        let mut history = RollHistory::default();
        for points in 0..150 {
            history.push(entry(points, RollTag::Normal));
        }
        assert_eq!(history.len(), 100);
        assert_eq!(history.newest(1)[0].final_points, 149);
        assert_eq!(history.iter().last().map(|e| e.final_points), Some(50));
    }

    #[test]
    fn statistics_summarize_history() {
        let mut history = RollHistory::default();
        assert!(history.statistics().is_none());
        history.push(entry(10, RollTag::Normal));
        history.push(entry(25, RollTag::Critical));
        history.push(entry(5, RollTag::Normal));
        history.push(entry(7, RollTag::LuckyCritical));
        let stats = history.statistics().unwrap();
        assert_eq!(stats.total_rolls, 4);
        assert_eq!(stats.total_points, 47);
        assert_eq!(stats.average_points, 11);
        assert_eq!(stats.best.final_points, 25);
        assert!((stats.critical_rate - 50.0).abs() < 1e-9);
    }
}
