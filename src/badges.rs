//! Static badge catalog and the unlocked-badge set.
//!
//! The catalog order matters: it is the evaluation order, and therefore the
//! order in which simultaneous unlocks are surfaced to the learner.

use serde::{Deserialize, Serialize};

use crate::domain::Category;

/// When a badge unlocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlockCondition {
  /// At least one history entry in any category.
  AnyHistory,
  /// Current streak at or above the threshold.
  StreakAtLeast(u32),
  /// History length of one category at or above the threshold.
  CategoryCount(Category, usize),
}

#[derive(Debug)]
pub struct Badge {
  pub id: &'static str,
  pub name: &'static str,
  pub description: &'static str,
  pub icon: &'static str,
  pub condition: UnlockCondition,
}

pub static CATALOG: [Badge; 8] = [
  Badge {
    id: "first_correct",
    name: "أول خطوة صحيحة!",
    description: "أكملت أول تمرين بنجاح.",
    icon: "🎉",
    condition: UnlockCondition::AnyHistory,
  },
  Badge {
    id: "streak_5",
    name: "نار مشتعلة!",
    description: "حققت سلسلة 5 إجابات صحيحة متتالية.",
    icon: "🔥",
    condition: UnlockCondition::StreakAtLeast(5),
  },
  Badge {
    id: "streak_10",
    name: "عبقري اللغة!",
    description: "حققت سلسلة 10 إجابات صحيحة متتالية.",
    icon: "🚀",
    condition: UnlockCondition::StreakAtLeast(10),
  },
  Badge {
    id: "mcq_10",
    name: "خبير الاختيارات",
    description: "أكملت 10 تمارين اختر من متعدد.",
    icon: "🎯",
    condition: UnlockCondition::CategoryCount(Category::MultipleChoice, 10),
  },
  Badge {
    id: "fill_10",
    name: "سيد الفراغات",
    description: "أكملت 10 تمارين املأ الفراغ.",
    icon: "✏️",
    condition: UnlockCondition::CategoryCount(Category::FillInBlank, 10),
  },
  Badge {
    id: "read_10",
    name: "القارئ الماهر",
    description: "أكملت 10 تمارين قراءة.",
    icon: "📚",
    condition: UnlockCondition::CategoryCount(Category::ReadingComprehension, 10),
  },
  Badge {
    id: "dict_10",
    name: "الكاتب الدقيق",
    description: "أكملت 10 تمارين إملاء.",
    icon: "✍️",
    condition: UnlockCondition::CategoryCount(Category::Dictation, 10),
  },
  Badge {
    id: "sent_10",
    name: "مهندس الجمل",
    description: "أكملت 10 تمارين بناء الجمل.",
    icon: "🏗️",
    condition: UnlockCondition::CategoryCount(Category::SentenceBuilder, 10),
  },
];

pub fn find(id: &str) -> Option<&'static Badge> {
  CATALOG.iter().find(|b| b.id == id)
}

/// Ids of unlocked badges in unlock order. Only grows; only holds catalog ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnlockedBadges(Vec<String>);

impl UnlockedBadges {
  /// Build from persisted ids, dropping unknown ids and duplicates.
  /// Returns the set and the number of ids dropped.
  pub fn from_ids(ids: Vec<String>) -> (Self, usize) {
    let total = ids.len();
    let mut set = Self::default();
    for id in ids {
      if let Some(b) = find(&id) {
        set.insert(b);
      }
    }
    let dropped = total - set.0.len();
    (set, dropped)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.0.iter().any(|x| x == id)
  }

  /// Returns false if the badge was already unlocked.
  pub fn insert(&mut self, badge: &'static Badge) -> bool {
    if self.contains(badge.id) {
      return false;
    }
    self.0.push(badge.id.to_string());
    true
  }

  pub fn ids(&self) -> &[String] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }
}
