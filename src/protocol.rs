//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::badges::Badge;
use crate::domain::{Answer, GeneratedExercise, HistoryLog, Screen};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetSession,
    Login {
        name: String,
    },
    Logout,
    Navigate {
        screen: Screen,
    },
    Back,
    LoadExercise,
    NextExercise,
    SubmitAnswer {
        answer: Answer,
    },
    DismissBadge,
    History,
    Achievements,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionOut,
    },
    Exercise {
        exercise: GeneratedExercise,
    },
    AnswerResult {
        #[serde(flatten)]
        result: AnswerOut,
    },
    Badge {
        badge: Option<BadgeOut>,
    },
    History {
        history: HistoryLog,
    },
    Achievements {
        badges: Vec<BadgeOut>,
    },
    Error {
        message: String,
    },
}

/// A catalog badge as shown to the learner.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeOut {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub unlocked: bool,
}

impl BadgeOut {
    pub fn new(b: &'static Badge, unlocked: bool) -> Self {
        Self { id: b.id, name: b.name, description: b.description, icon: b.icon, unlocked }
    }
}

/// Snapshot of the learner-visible session state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub screen: Screen,
    pub name: Option<String>,
    pub points: u32,
    pub streak: u32,
    pub unlocked_badges: Vec<String>,
    /// Badge notification currently on display, if any.
    pub pending_badge: Option<BadgeOut>,
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub correct: bool,
    pub expected: String,
    pub explanation: String,
    pub points: u32,
    pub streak: u32,
    pub badge: Option<BadgeOut>,
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LoginIn {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateIn {
    pub screen: Screen,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub answer: Answer,
}

#[derive(Serialize)]
pub struct DismissOut {
    /// The next queued badge, now on display.
    pub badge: Option<BadgeOut>,
}

#[derive(Serialize)]
pub struct HistoryOut {
    pub history: HistoryLog,
}

#[derive(Serialize)]
pub struct AchievementsOut {
    pub badges: Vec<BadgeOut>,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: &'static str,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
