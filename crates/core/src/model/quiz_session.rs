use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{AnswerId, CertificationId, CertificationSlug, QuestionId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors emitted by the quiz session state machine.
///
/// Ordering violations (`OutOfOrder`, `AlreadyAnswered`) signal a refused
/// call: the session is left exactly as it was, and callers treat the
/// refusal as a no-op rather than a fatal condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no questions available for this certification")]
    Empty,

    #[error("attempt was already started")]
    AlreadyStarted,

    #[error("a start request is already in flight")]
    StartInFlight,

    #[error("attempt is not in progress")]
    NotInProgress,

    #[error("question {got} is not the current question")]
    OutOfOrder { got: QuestionId },

    #[error("question {0} was already answered")]
    AlreadyAnswered(QuestionId),

    #[error("answer {answer} does not belong to question {question}")]
    UnknownAnswer {
        question: QuestionId,
        answer: AnswerId,
    },

    #[error("attempt is incomplete: {answered} of {total} questions answered")]
    Incomplete { answered: usize, total: usize },
}

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one certification attempt.
///
/// `InProgress` is re-entrant across reloads: resuming an attempt the
/// server already knows about jumps straight from `NotStarted` to
/// `InProgress`, skipping `Starting`. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    NotStarted,
    Starting,
    InProgress,
    Completing,
    Completed,
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// How a question came to be answered within this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerChoice {
    /// Chosen locally during this session; graded optimistically.
    Selected {
        answer_id: AnswerId,
        correct: bool,
        points_awarded: u32,
    },
    /// Answered in an earlier session; the server reports it as done but
    /// the original choice is unknown. Not re-answerable.
    Restored,
}

/// One answered question, in answer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsweredQuestion {
    pub question_id: QuestionId,
    pub choice: AnswerChoice,
}

/// Result of an accepted `answer_question` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question_id: QuestionId,
    pub answer_id: AnswerId,
    pub correct: bool,
    pub points_awarded: u32,
    /// True when this was the last question and the attempt is ready to
    /// be finalized.
    pub quiz_complete: bool,
}

/// Final score payload submitted to the backend on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinalScore {
    pub correct_answers: u32,
    pub points: u32,
    pub is_completed: bool,
}

/// Aggregated view of attempt progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

//
// ─── QUIZ SESSION ──────────────────────────────────────────────────────────────
//

/// In-memory state for one certification attempt.
///
/// Steps through an ordered question list, recording answers optimistically
/// (scoring uses the locally held question data, no round trip) and
/// reconciling against server-confirmed progress at defined checkpoints
/// only. The current index never moves backwards and never exceeds the
/// question count; completion is a one-way transition.
pub struct QuizSession {
    certification_id: CertificationId,
    slug: CertificationSlug,
    questions: Vec<Question>,
    phase: QuizPhase,
    current_index: usize,
    answers: Vec<AnsweredQuestion>,
    correct_count: u32,
    total_points: u32,
    /// Highest question index the server has confirmed, when known.
    confirmed_index: Option<usize>,
}

impl QuizSession {
    /// Create a fresh, not-yet-started attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if no questions are provided.
    pub fn new(
        certification_id: CertificationId,
        slug: CertificationSlug,
        questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }

        Ok(Self {
            certification_id,
            slug,
            questions,
            phase: QuizPhase::NotStarted,
            current_index: 0,
            answers: Vec::new(),
            correct_count: 0,
            total_points: 0,
            confirmed_index: None,
        })
    }

    #[must_use]
    pub fn certification_id(&self) -> CertificationId {
        self.certification_id
    }

    #[must_use]
    pub fn slug(&self) -> &CertificationSlug {
        &self.slug
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The question awaiting an answer, or `None` once all are answered.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    #[must_use]
    pub fn answers(&self) -> &[AnsweredQuestion] {
        &self.answers
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.questions.len().saturating_sub(self.current_index)
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == QuizPhase::Completed
    }

    /// Highest question index confirmed by the server, when known.
    #[must_use]
    pub fn confirmed_index(&self) -> Option<usize> {
        self.confirmed_index
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        QuizProgress {
            total: self.total_questions(),
            answered: self.answered_count(),
            remaining: self.remaining(),
            is_complete: self.is_completed(),
        }
    }

    /// True if the given question may no longer be answered.
    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.answers.iter().any(|a| a.question_id == question_id)
    }

    // ─── Start ─────────────────────────────────────────────────────────────

    /// Mark a start request as in flight.
    ///
    /// Gating on phase (not a lock) serializes starts: a second call while
    /// one is pending is refused, so the start endpoint is never
    /// double-submitted.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::StartInFlight` if a start is pending, or
    /// `QuizError::AlreadyStarted` once the attempt is past `NotStarted`.
    pub fn begin_start(&mut self) -> Result<(), QuizError> {
        match self.phase {
            QuizPhase::NotStarted => {
                self.phase = QuizPhase::Starting;
                Ok(())
            }
            QuizPhase::Starting => Err(QuizError::StartInFlight),
            _ => Err(QuizError::AlreadyStarted),
        }
    }

    /// Record that the server accepted the start request.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotInProgress` unless a start was in flight.
    pub fn start_succeeded(&mut self) -> Result<(), QuizError> {
        if self.phase != QuizPhase::Starting {
            return Err(QuizError::NotInProgress);
        }
        self.phase = QuizPhase::InProgress;
        self.confirmed_index = Some(0);
        Ok(())
    }

    /// Roll back to `NotStarted` after a failed start request.
    ///
    /// No partial state is retained, so a manual retry observes the exact
    /// pre-start session.
    pub fn start_failed(&mut self) {
        if self.phase == QuizPhase::Starting {
            self.phase = QuizPhase::NotStarted;
            self.confirmed_index = None;
        }
    }

    // ─── Resume ────────────────────────────────────────────────────────────

    /// Rehydrate an attempt the server already knows about.
    ///
    /// Questions before `from_index` are marked answered without their
    /// original choice (the server is authoritative for the aggregate
    /// score); they are not re-answerable. An index past the question list
    /// is clamped to its end.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyStarted` unless the session is still in
    /// `NotStarted`.
    pub fn resume(&mut self, from_index: usize) -> Result<(), QuizError> {
        if self.phase != QuizPhase::NotStarted {
            return Err(QuizError::AlreadyStarted);
        }

        let from_index = from_index.min(self.questions.len());
        self.answers = self.questions[..from_index]
            .iter()
            .map(|q| AnsweredQuestion {
                question_id: q.id(),
                choice: AnswerChoice::Restored,
            })
            .collect();
        self.current_index = from_index;
        self.confirmed_index = Some(from_index);
        self.phase = QuizPhase::InProgress;
        Ok(())
    }

    /// Merge a server-confirmed question index into local state.
    ///
    /// The server wins on conflict, but only ever forward: a stale lower
    /// value never rewinds locally answered questions. Call this at
    /// checkpoints (start, finish, resume), not on every local mutation.
    pub fn reconcile(&mut self, server_index: usize) {
        let server_index = server_index.min(self.questions.len());
        match self.confirmed_index {
            Some(confirmed) if confirmed >= server_index => {}
            _ => self.confirmed_index = Some(server_index),
        }
        while self.current_index < server_index {
            let question_id = self.questions[self.current_index].id();
            if !self.is_answered(question_id) {
                self.answers.push(AnsweredQuestion {
                    question_id,
                    choice: AnswerChoice::Restored,
                });
            }
            self.current_index += 1;
        }
    }

    // ─── Answering ─────────────────────────────────────────────────────────

    /// Record an answer for the current question and advance.
    ///
    /// Synchronous and optimistic: scoring uses the locally held question
    /// data and the UI may reflect the result immediately. Only the
    /// question at the current index is accepted, and only once; a refused
    /// call leaves the session untouched.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotInProgress`, `OutOfOrder`, `AlreadyAnswered`,
    /// or `UnknownAnswer`. None of these mutate the session.
    pub fn answer_question(
        &mut self,
        question_id: QuestionId,
        answer_id: AnswerId,
    ) -> Result<AnswerOutcome, QuizError> {
        if self.phase != QuizPhase::InProgress {
            return Err(QuizError::NotInProgress);
        }
        if self.is_answered(question_id) {
            return Err(QuizError::AlreadyAnswered(question_id));
        }
        let Some(current) = self.questions.get(self.current_index) else {
            return Err(QuizError::OutOfOrder { got: question_id });
        };
        if current.id() != question_id {
            return Err(QuizError::OutOfOrder { got: question_id });
        }
        let Some(grade) = current.grade(answer_id) else {
            return Err(QuizError::UnknownAnswer {
                question: question_id,
                answer: answer_id,
            });
        };

        self.answers.push(AnsweredQuestion {
            question_id,
            choice: AnswerChoice::Selected {
                answer_id,
                correct: grade.correct,
                points_awarded: grade.points_awarded,
            },
        });
        self.current_index += 1;
        if grade.correct {
            self.correct_count += 1;
        }
        self.total_points += grade.points_awarded;

        Ok(AnswerOutcome {
            question_id,
            answer_id,
            correct: grade.correct,
            points_awarded: grade.points_awarded,
            quiz_complete: self.current_index == self.questions.len(),
        })
    }

    // ─── Completion ────────────────────────────────────────────────────────

    /// The final score payload for this attempt as currently known.
    #[must_use]
    pub fn final_score(&self) -> FinalScore {
        FinalScore {
            correct_answers: self.correct_count,
            points: self.total_points,
            is_completed: true,
        }
    }

    /// Transition into `Completing` and produce the submission payload.
    ///
    /// Re-entrant from `Completing` (a failed submission is retried with
    /// the same payload) and from `Completed` (a duplicate call observes
    /// the already-final score with no side effect).
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Incomplete` if questions remain unanswered, or
    /// `QuizError::NotInProgress` if the attempt never started.
    pub fn begin_completion(&mut self) -> Result<FinalScore, QuizError> {
        match self.phase {
            QuizPhase::InProgress => {
                if self.current_index < self.questions.len() {
                    return Err(QuizError::Incomplete {
                        answered: self.answered_count(),
                        total: self.total_questions(),
                    });
                }
                self.phase = QuizPhase::Completing;
                Ok(self.final_score())
            }
            QuizPhase::Completing | QuizPhase::Completed => Ok(self.final_score()),
            QuizPhase::NotStarted | QuizPhase::Starting => Err(QuizError::NotInProgress),
        }
    }

    /// Record that the backend accepted the final score.
    ///
    /// Idempotent: calling this again in `Completed` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotInProgress` unless a completion was begun.
    pub fn completion_succeeded(&mut self) -> Result<(), QuizError> {
        match self.phase {
            QuizPhase::Completing => {
                self.phase = QuizPhase::Completed;
                self.confirmed_index = Some(self.questions.len());
                Ok(())
            }
            QuizPhase::Completed => Ok(()),
            _ => Err(QuizError::NotInProgress),
        }
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("certification_id", &self.certification_id)
            .field("slug", &self.slug)
            .field("phase", &self.phase)
            .field("questions_len", &self.questions.len())
            .field("current_index", &self.current_index)
            .field("answered", &self.answers.len())
            .field("correct_count", &self.correct_count)
            .field("total_points", &self.total_points)
            .field("confirmed_index", &self.confirmed_index)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
