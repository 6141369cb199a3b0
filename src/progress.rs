//! Progress and badge engine: pure state transitions, no I/O.

use crate::badges::{Badge, UnlockCondition, UnlockedBadges, CATALOG};
use crate::domain::{HistoryEntry, HistoryLog, Progress};

pub const POINTS_PER_CORRECT: u32 = 10;

pub fn apply_correct_answer(p: Progress) -> Progress {
  Progress {
    points: p.points.saturating_add(POINTS_PER_CORRECT),
    streak: p.streak.saturating_add(1),
  }
}

pub fn apply_incorrect_answer(p: Progress) -> Progress {
  Progress { points: p.points, streak: 0 }
}

/// Prepend `entry` to its category. Other categories are untouched.
pub fn append_history_entry(mut log: HistoryLog, entry: HistoryEntry) -> HistoryLog {
  log.entries_mut(entry.category()).insert(0, entry);
  log
}

fn condition_met(condition: UnlockCondition, log: &HistoryLog, streak: u32) -> bool {
  match condition {
    UnlockCondition::AnyHistory => !log.is_empty(),
    UnlockCondition::StreakAtLeast(n) => streak >= n,
    UnlockCondition::CategoryCount(category, n) => log.count(category) >= n,
  }
}

/// Badges whose condition holds now and that are not yet unlocked, in catalog order.
pub fn evaluate_badges(
  log: &HistoryLog,
  streak: u32,
  already_unlocked: &UnlockedBadges,
) -> Vec<&'static Badge> {
  CATALOG
    .iter()
    .filter(|b| !already_unlocked.contains(b.id))
    .filter(|b| condition_met(b.condition, log, streak))
    .collect()
}
