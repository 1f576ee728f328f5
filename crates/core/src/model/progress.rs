use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CertificationId, ProgressId};

/// Server-owned summary of a user's attempt at one certification.
///
/// One record exists per (user, certification) pair; the backend enforces
/// uniqueness. The client mirrors these records read-only and treats them
/// as the source of truth whenever they disagree with optimistic local
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: ProgressId,
    pub certification_id: CertificationId,
    pub current_question: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub points: u32,
    pub is_completed: bool,
    pub last_active_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// True for attempts that were started but not finished.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        !self.is_completed && self.current_question > 0
    }

    /// Score as a percentage of answered-correctly over total, `0` when the
    /// record has no questions.
    #[must_use]
    pub fn score_percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.correct_answers) / f64::from(self.total_questions) * 100.0
    }
}
