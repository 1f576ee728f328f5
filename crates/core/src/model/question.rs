use thiserror::Error;

use crate::model::ids::{AnswerId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors that can occur while building quiz reference data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question has no answer options")]
    NoAnswers,

    #[error("question has duplicate answer id {0}")]
    DuplicateAnswer(AnswerId),

    #[error("question has no correct answer marked")]
    NoCorrectAnswer,
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// One selectable answer option.
///
/// Correctness is deliberately not readable from the answer itself; it can
/// only be queried through [`Question::grade`] once a choice is submitted,
/// so a rendering layer holding `&Answer` cannot peek at the solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    id: AnswerId,
    text: String,
    is_correct: bool,
}

impl Answer {
    #[must_use]
    pub fn new(id: AnswerId, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id,
            text: text.into(),
            is_correct,
        }
    }

    #[must_use]
    pub fn id(&self) -> AnswerId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Outcome of grading a submitted answer choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerGrade {
    pub correct: bool,
    pub points_awarded: u32,
}

/// Immutable reference data for a single quiz question.
///
/// Fetched once per attempt; never mutated afterwards. `points` is the
/// score awarded for a correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    points: u32,
    answers: Vec<Answer>,
}

impl Question {
    /// Build a question from its answer options.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the option list is empty, contains a
    /// duplicate answer id, or marks no option as correct.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        points: u32,
        answers: Vec<Answer>,
    ) -> Result<Self, QuestionError> {
        if answers.is_empty() {
            return Err(QuestionError::NoAnswers);
        }
        for (i, answer) in answers.iter().enumerate() {
            if answers[..i].iter().any(|a| a.id == answer.id) {
                return Err(QuestionError::DuplicateAnswer(answer.id));
            }
        }
        if !answers.iter().any(|a| a.is_correct) {
            return Err(QuestionError::NoCorrectAnswer);
        }

        Ok(Self {
            id,
            text: text.into(),
            points,
            answers,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Answer options in presentation order.
    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Grade a submitted choice, returning `None` if the answer id does not
    /// belong to this question.
    #[must_use]
    pub fn grade(&self, answer_id: AnswerId) -> Option<AnswerGrade> {
        let answer = self.answers.iter().find(|a| a.id == answer_id)?;
        Some(AnswerGrade {
            correct: answer.is_correct,
            points_awarded: if answer.is_correct { self.points } else { 0 },
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn two_option_question() -> Question {
        Question::new(
            QuestionId::new(1),
            "What does S3 stand for?",
            10,
            vec![
                Answer::new(AnswerId::new(1), "Simple Storage Service", true),
                Answer::new(AnswerId::new(2), "Super Storage System", false),
            ],
        )
        .unwrap()
    }

    #[test]
    fn grade_awards_points_for_correct_choice() {
        let question = two_option_question();
        let grade = question.grade(AnswerId::new(1)).unwrap();
        assert!(grade.correct);
        assert_eq!(grade.points_awarded, 10);
    }

    #[test]
    fn grade_awards_nothing_for_wrong_choice() {
        let question = two_option_question();
        let grade = question.grade(AnswerId::new(2)).unwrap();
        assert!(!grade.correct);
        assert_eq!(grade.points_awarded, 0);
    }

    #[test]
    fn grade_rejects_foreign_answer_id() {
        let question = two_option_question();
        assert!(question.grade(AnswerId::new(99)).is_none());
    }

    #[test]
    fn question_requires_answers() {
        let err = Question::new(QuestionId::new(1), "Q", 5, Vec::new()).unwrap_err();
        assert!(matches!(err, QuestionError::NoAnswers));
    }

    #[test]
    fn question_rejects_duplicate_answer_ids() {
        let err = Question::new(
            QuestionId::new(1),
            "Q",
            5,
            vec![
                Answer::new(AnswerId::new(1), "A", true),
                Answer::new(AnswerId::new(1), "B", false),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateAnswer(_)));
    }

    #[test]
    fn question_requires_a_correct_option() {
        let err = Question::new(
            QuestionId::new(1),
            "Q",
            5,
            vec![Answer::new(AnswerId::new(1), "A", false)],
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::NoCorrectAnswer));
    }
}
