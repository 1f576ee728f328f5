//! Wire shapes for the REST backend.
//!
//! Reference data (questions, answers) converts into the domain types
//! before it reaches the quiz state machine, so answer correctness never
//! travels further than the conversion boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cert_core::model::{
    Answer, AnswerId, CategoryId, CertificationId, CertificationSlug, Question, QuestionError,
    QuestionId,
};

//
// ─── CERTIFICATION INFO ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// `GET /api/certifications/{slug}/info`. Identity-sensitive: the
/// `has_started` / `current_question` fields describe the *current* user,
/// so cache entries for this shape must be identity-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationInfo {
    pub id: CertificationId,
    pub name: String,
    pub slug: CertificationSlug,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub min_score_for_certificate: u32,
    /// True when this user already has a progress record for the
    /// certification; the caller should route into the quiz at
    /// `current_question` instead of showing the start screen.
    pub has_started: bool,
    #[serde(default)]
    pub current_question: u32,
}

/// `POST /api/certifications/{slug}/start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub redirect_to: String,
}

//
// ─── QUIZ CONTENT ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDto {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDto {
    pub id: QuestionId,
    pub text: String,
    pub points: u32,
    pub answers: Vec<AnswerDto>,
}

impl QuestionDto {
    /// Convert into the domain question, sealing answer correctness
    /// behind [`Question::grade`].
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the backend sent malformed reference
    /// data.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let answers = self
            .answers
            .into_iter()
            .map(|a| Answer::new(a.id, a.text, a.is_correct))
            .collect();
        Question::new(self.id, self.text, self.points, answers)
    }
}

/// `GET /api/certifications/{slug}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizContent {
    pub id: CertificationId,
    pub name: String,
    pub questions: Vec<QuestionDto>,
}

impl QuizContent {
    /// Convert all questions, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` encountered.
    pub fn into_questions(self) -> Result<Vec<Question>, QuestionError> {
        self.questions
            .into_iter()
            .map(QuestionDto::into_question)
            .collect()
    }
}

//
// ─── ACTIVITY ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub points: u32,
}

/// `GET /api/users/activity?limit=N`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPage {
    pub activities: Vec<ActivityItem>,
    pub total_count: u32,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
