mod ids;
mod progress;
mod question;
mod quiz_session;
mod user;

pub use ids::{
    AnswerId, CategoryId, CertificationId, CertificationSlug, ParseIdError, ProgressId,
    QuestionId, UserId,
};
pub use progress::ProgressRecord;
pub use question::{Answer, AnswerGrade, Question, QuestionError};
pub use quiz_session::{
    AnswerChoice, AnswerOutcome, AnsweredQuestion, FinalScore, QuizError, QuizPhase,
    QuizProgress, QuizSession,
};
pub use user::{AuthStatus, AuthToken, SessionState, User};
