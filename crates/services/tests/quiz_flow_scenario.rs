//! End-to-end attempt scenarios against an in-memory backend fake:
//! start, answer, finish, resume, and the retry paths around each
//! checkpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cert_core::model::{
    AnswerId, AuthToken, CertificationId, CertificationSlug, FinalScore, ProgressId,
    ProgressRecord, QuestionId, QuizPhase, User,
};
use cert_core::time::{fixed_clock, fixed_now};

use services::api::{
    ActivityPage, AnswerDto, CertificationApi, CertificationInfo, QuestionDto, QuizContent,
    StartResponse,
};
use services::error::RequestError;
use services::{
    AuthApi, CredentialStore, InMemoryCredentialStore, QuizFlowError, QuizFlowService,
    RevalidatingCache, SessionStore,
};

const QUESTION_COUNT: u64 = 10;
const POINTS_PER_QUESTION: u32 = 10;

fn correct_answer(question: u64) -> AnswerId {
    AnswerId::new(question * 10 + 1)
}

fn wrong_answer(question: u64) -> AnswerId {
    AnswerId::new(question * 10 + 2)
}

fn http_error(status: reqwest::StatusCode) -> RequestError {
    RequestError::Http {
        status,
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
    }
}

//
// ─── BACKEND FAKE ──────────────────────────────────────────────────────────────
//

/// Minimal stand-in for the REST backend: one certification with ten
/// ten-point questions, a per-user progress record, and failure toggles
/// for the two write endpoints.
struct FakeBackend {
    started: AtomicBool,
    server_index: AtomicU32,
    fail_start: AtomicBool,
    fail_submit: AtomicBool,
    submissions: Mutex<Vec<FinalScore>>,
    info_calls: AtomicUsize,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicBool::new(false),
            server_index: AtomicU32::new(0),
            fail_start: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            submissions: Mutex::new(Vec::new()),
            info_calls: AtomicUsize::new(0),
        })
    }

    fn submissions(&self) -> Vec<FinalScore> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificationApi for FakeBackend {
    async fn certification_info(
        &self,
        slug: &CertificationSlug,
    ) -> Result<CertificationInfo, RequestError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CertificationInfo {
            id: CertificationId::new(1),
            name: "AWS Cloud Practitioner".into(),
            slug: slug.clone(),
            description: None,
            category: None,
            total_questions: QUESTION_COUNT as u32,
            min_score_for_certificate: 70,
            has_started: self.started.load(Ordering::SeqCst),
            current_question: self.server_index.load(Ordering::SeqCst),
        })
    }

    async fn start_certification(
        &self,
        slug: &CertificationSlug,
    ) -> Result<StartResponse, RequestError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(http_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(StartResponse {
            redirect_to: format!("/quiz/{slug}"),
        })
    }

    async fn quiz_content(&self, _slug: &CertificationSlug) -> Result<QuizContent, RequestError> {
        let questions = (1..=QUESTION_COUNT)
            .map(|id| QuestionDto {
                id: QuestionId::new(id),
                text: format!("Question {id}"),
                points: POINTS_PER_QUESTION,
                answers: vec![
                    AnswerDto {
                        id: correct_answer(id),
                        text: "right".into(),
                        is_correct: true,
                    },
                    AnswerDto {
                        id: wrong_answer(id),
                        text: "wrong".into(),
                        is_correct: false,
                    },
                ],
            })
            .collect();
        Ok(QuizContent {
            id: CertificationId::new(1),
            name: "AWS Cloud Practitioner".into(),
            questions,
        })
    }

    async fn user_progress(&self) -> Result<Vec<ProgressRecord>, RequestError> {
        Ok(vec![
            ProgressRecord {
                id: ProgressId::new(1),
                certification_id: CertificationId::new(1),
                current_question: 10,
                total_questions: 10,
                correct_answers: 8,
                points: 80,
                is_completed: true,
                last_active_at: fixed_now(),
            },
            ProgressRecord {
                id: ProgressId::new(2),
                certification_id: CertificationId::new(2),
                current_question: 3,
                total_questions: 10,
                correct_answers: 0,
                points: 0,
                is_completed: false,
                last_active_at: fixed_now(),
            },
            ProgressRecord {
                id: ProgressId::new(3),
                certification_id: CertificationId::new(3),
                current_question: 10,
                total_questions: 10,
                correct_answers: 10,
                points: 100,
                is_completed: true,
                last_active_at: fixed_now(),
            },
        ])
    }

    async fn user_activity(&self, _limit: u32) -> Result<ActivityPage, RequestError> {
        Ok(ActivityPage {
            activities: Vec::new(),
            total_count: 0,
        })
    }

    async fn submit_final_score(
        &self,
        _slug: &CertificationSlug,
        score: &FinalScore,
    ) -> Result<ProgressRecord, RequestError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(http_error(reqwest::StatusCode::BAD_GATEWAY));
        }
        self.submissions.lock().unwrap().push(*score);
        self.server_index
            .store(QUESTION_COUNT as u32, Ordering::SeqCst);
        Ok(ProgressRecord {
            id: ProgressId::new(1),
            certification_id: CertificationId::new(1),
            current_question: QUESTION_COUNT as u32,
            total_questions: QUESTION_COUNT as u32,
            correct_answers: score.correct_answers,
            points: score.points,
            is_completed: true,
            last_active_at: fixed_now(),
        })
    }
}

/// Identity fake for the session store; these scenarios never touch the
/// auth endpoints.
struct NullAuthApi;

#[async_trait]
impl AuthApi for NullAuthApi {
    async fn me(&self, _token: &AuthToken) -> Result<User, RequestError> {
        Err(http_error(reqwest::StatusCode::UNAUTHORIZED))
    }

    async fn logout(&self, _token: &AuthToken) -> Result<(), RequestError> {
        Ok(())
    }
}

fn build_flow(backend: Arc<FakeBackend>) -> QuizFlowService {
    let session = Arc::new(SessionStore::new(
        Arc::new(InMemoryCredentialStore::new()) as Arc<dyn CredentialStore>,
        Arc::new(NullAuthApi),
        fixed_clock(),
    ));
    QuizFlowService::new(
        backend as Arc<dyn CertificationApi>,
        Arc::new(RevalidatingCache::new()),
        session,
    )
}

fn slug() -> CertificationSlug {
    CertificationSlug::new("aws-ccp")
}

//
// ─── SCENARIOS ─────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn full_attempt_submits_the_expected_payload_once() {
    let backend = FakeBackend::new();
    let flow = build_flow(Arc::clone(&backend));

    let info = flow.load_info(&slug()).await.unwrap();
    assert!(!info.has_started);

    let mut session = flow.load_quiz(&slug()).await.unwrap();
    let response = flow.start(&mut session).await.unwrap();
    assert_eq!(response.redirect_to, "/quiz/aws-ccp");
    assert_eq!(session.phase(), QuizPhase::InProgress);

    for id in 1..=QUESTION_COUNT {
        let outcome = flow
            .answer(&mut session, QuestionId::new(id), correct_answer(id))
            .unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.quiz_complete, id == QUESTION_COUNT);
    }

    let score = flow.finish(&mut session).await.unwrap();
    assert_eq!(
        score,
        FinalScore {
            correct_answers: 10,
            points: 100,
            is_completed: true
        }
    );
    assert!(session.is_completed());
    assert_eq!(backend.submissions(), vec![score]);

    // a duplicate finish observes the final score without resubmitting
    let replay = flow.finish(&mut session).await.unwrap();
    assert_eq!(replay, score);
    assert_eq!(backend.submissions().len(), 1);

    // the info read now reflects the completed attempt
    let info = flow.load_info(&slug()).await.unwrap();
    assert!(info.has_started);
    assert_eq!(info.current_question, 10);
}

#[tokio::test]
async fn failed_start_leaves_a_retryable_session() {
    let backend = FakeBackend::new();
    let flow = build_flow(Arc::clone(&backend));
    let mut session = flow.load_quiz(&slug()).await.unwrap();

    backend.fail_start.store(true, Ordering::SeqCst);
    let err = flow.start(&mut session).await.unwrap_err();
    assert!(matches!(err, QuizFlowError::Request(_)));
    assert_eq!(session.phase(), QuizPhase::NotStarted);
    assert!(!backend.started.load(Ordering::SeqCst));

    backend.fail_start.store(false, Ordering::SeqCst);
    flow.start(&mut session).await.unwrap();
    assert_eq!(session.phase(), QuizPhase::InProgress);
}

#[tokio::test]
async fn failed_submission_keeps_the_score_for_a_manual_retry() {
    let backend = FakeBackend::new();
    let flow = build_flow(Arc::clone(&backend));
    let mut session = flow.load_quiz(&slug()).await.unwrap();
    flow.start(&mut session).await.unwrap();
    for id in 1..=QUESTION_COUNT {
        session
            .answer_question(QuestionId::new(id), correct_answer(id))
            .unwrap();
    }

    backend.fail_submit.store(true, Ordering::SeqCst);
    let err = flow.finish(&mut session).await.unwrap_err();
    assert!(matches!(err, QuizFlowError::Request(_)));
    assert_eq!(session.phase(), QuizPhase::Completing);
    assert_eq!(session.total_points(), 100, "local score survives the failure");
    assert!(backend.submissions().is_empty());

    backend.fail_submit.store(false, Ordering::SeqCst);
    let score = flow.finish(&mut session).await.unwrap();
    assert_eq!(score.points, 100);
    assert_eq!(backend.submissions().len(), 1);
}

#[tokio::test]
async fn resumed_attempt_answers_only_the_remaining_questions() {
    let backend = FakeBackend::new();
    backend.started.store(true, Ordering::SeqCst);
    backend.server_index.store(5, Ordering::SeqCst);
    let flow = build_flow(Arc::clone(&backend));

    let info = flow.load_info(&slug()).await.unwrap();
    assert!(info.has_started);

    let mut session = flow.load_quiz(&slug()).await.unwrap();
    flow.resume(&mut session, info.current_question as usize)
        .unwrap();
    assert_eq!(session.phase(), QuizPhase::InProgress);
    assert_eq!(session.current_index(), 5);

    // earlier questions are locked, later ones answer normally
    assert!(
        session
            .answer_question(QuestionId::new(1), correct_answer(1))
            .is_err()
    );
    for id in 6..=QUESTION_COUNT {
        session
            .answer_question(QuestionId::new(id), correct_answer(id))
            .unwrap();
    }

    let score = flow.finish(&mut session).await.unwrap();
    // restored answers carry no local score; only this session's five count
    assert_eq!(score.correct_answers, 5);
    assert_eq!(score.points, 50);
}

#[tokio::test]
async fn wrong_answers_reach_the_backend_in_the_final_payload() {
    let backend = FakeBackend::new();
    let flow = build_flow(Arc::clone(&backend));
    let mut session = flow.load_quiz(&slug()).await.unwrap();
    flow.start(&mut session).await.unwrap();

    for id in 1..=QUESTION_COUNT {
        let answer = if id % 2 == 0 {
            wrong_answer(id)
        } else {
            correct_answer(id)
        };
        session.answer_question(QuestionId::new(id), answer).unwrap();
    }

    let score = flow.finish(&mut session).await.unwrap();
    assert_eq!(score.correct_answers, 5);
    assert_eq!(score.points, 50);
    assert!(score.is_completed);
    assert_eq!(backend.submissions(), vec![score]);
}

#[tokio::test]
async fn progress_overview_aggregates_the_user_records() {
    let backend = FakeBackend::new();
    let flow = build_flow(backend);

    let overview = flow.progress_overview().await.unwrap();
    assert_eq!(overview.total_certifications, 3);
    assert_eq!(overview.completed_certifications, 2);
    assert_eq!(overview.in_progress_certifications, 1);
    assert_eq!(overview.average_score, 90);
    assert_eq!(overview.total_points, 180);
}

#[tokio::test]
async fn repeated_progress_reads_within_the_window_hit_the_cache() {
    let backend = FakeBackend::new();
    let flow = build_flow(Arc::clone(&backend));

    let first = flow.load_progress().await.unwrap();
    let second = flow.load_progress().await.unwrap();
    assert_eq!(first.len(), 3);
    assert!(Arc::ptr_eq(&first, &second), "served from the same cached value");
}

#[tokio::test]
async fn activity_feed_loads_through_the_cache() {
    let backend = FakeBackend::new();
    let flow = build_flow(backend);

    let page = flow.load_activity(5).await.unwrap();
    assert!(page.activities.is_empty());
    assert_eq!(page.total_count, 0);
}
