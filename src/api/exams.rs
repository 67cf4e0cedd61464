use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::api::envelope::Envelope;
use crate::api::errors::ApiError;
use crate::api::extract::{JsonBody, PathParams};
use crate::api::guards::{restrict, RequestIdentity, ANY_ROLE, INSTRUCTOR_ONLY, STUDENT_ONLY};
use crate::api::procedures::{self, CallContext};
use crate::core::state::AppState;
use crate::db::types::Role;
use crate::db::{ProcedureCall, SqlType};
use crate::schemas::exam::{
    AvailableExam, Correction, ExamQuestion, GenerateExamRequest, GeneratedExam, InstructorExam,
    QuestionGrade, QuestionGradeRequest, SubmissionRejected, SubmissionSummary,
    SubmitAnswersRequest, SubmittedAnswer, TakenExam,
};
use crate::services::answer_batch::{AnswerBatch, BatchOutcome};
use crate::services::outcome::{self, Outcome};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", restrict(INSTRUCTOR_ONLY, post(generate_exam)))
        .route("/instructor/my-exams", restrict(INSTRUCTOR_ONLY, get(instructor_exams)))
        .route("/assign-grade", restrict(INSTRUCTOR_ONLY, post(assign_question_grade)))
        .route("/:id/validate", restrict(INSTRUCTOR_ONLY, get(validate_exam_grade)))
        .route("/:id/finalize", restrict(INSTRUCTOR_ONLY, post(finalize_exam)))
        .route("/student/available", restrict(STUDENT_ONLY, get(available_exams)))
        .route("/student/my-exams", restrict(STUDENT_ONLY, get(student_exams)))
        .route("/student/submit-answers", restrict(STUDENT_ONLY, post(submit_answers)))
        .route("/student/:exam_id/correct", restrict(STUDENT_ONLY, get(correct_exam)))
        .route("/:id/questions", restrict(ANY_ROLE, get(exam_questions)))
}

/// The generator answers with a `Result` column on success; otherwise its
/// leftmost column carries the reason.
async fn generate_exam(
    identity: RequestIdentity,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<GenerateExamRequest>,
) -> Result<Envelope<GeneratedExam>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while generating exam");
    let (Some(title), Some(kind), Some(duration), Some(exam_grade), Some(course_id)) = (
        payload.title,
        payload.kind,
        payload.duration,
        payload.exam_grade,
        payload.course_id,
    ) else {
        return Err(ApiError::bad_request(
            "Please provide title, type, duration, exam grade, and course ID",
        ));
    };
    let (Some(tf_count), Some(mcq_count)) = (payload.tf_count, payload.mcq_count) else {
        return Err(ApiError::bad_request("Please provide TF count and MCQ count"));
    };

    let call = ProcedureCall::new("sp_exam_genration")
        .input("title", SqlType::VarChar(150), title.as_str())
        .input("type", SqlType::VarChar(50), kind.as_str())
        .input("exam_duration", SqlType::Int, duration)
        .input("tf_count", SqlType::Int, tf_count)
        .input("mcq_count", SqlType::Int, mcq_count)
        .input("exam_grade", SqlType::Int, exam_grade)
        .input("created_by", SqlType::Int, identity.subject_id)
        .input("course_id", SqlType::Int, course_id);
    let result = procedures::call(&state, call, CTX).await?;
    let row = procedures::require_row(&result)?;

    let Some(message) = row.text("result") else {
        let reason = procedures::status_message(row, "message")
            .unwrap_or_else(|| CTX.failure().to_string());
        return Err(ApiError::BadRequest(reason));
    };

    Ok(Envelope::data(GeneratedExam {
        exam_id: row.int("exam_id"),
        title,
        kind,
        duration,
        tf_count,
        mcq_count,
        exam_grade,
        course_id,
    })
    .with_message(message)
    .created())
}

async fn instructor_exams(
    identity: RequestIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<InstructorExam>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching instructor exams");

    let call = ProcedureCall::new("sp_get_instructor_exams").input(
        "instructor_id",
        SqlType::Int,
        identity.subject_id,
    );
    let result = procedures::call(&state, call, CTX).await?;
    // A listing that carries a message instead of exams means nothing to show.
    if let Some(message) = result.first_row().and_then(|row| row.text("message")) {
        return Err(ApiError::NotFound(message));
    }

    Ok(Envelope::list(result.recordset().iter().map(InstructorExam::from_row).collect()))
}

async fn assign_question_grade(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<QuestionGradeRequest>,
) -> Result<Envelope<QuestionGrade>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while assigning question grade");
    let (Some(exam_id), Some(question_id), Some(question_grade)) =
        (payload.exam_id, payload.question_id, payload.question_grade)
    else {
        return Err(ApiError::bad_request(
            "Please provide exam ID, question ID, and question grade",
        ));
    };

    let call = ProcedureCall::new("sp_assign_question_grade")
        .input("exam_id", SqlType::Int, exam_id)
        .input("question_id", SqlType::Int, question_id)
        .input("question_grade", SqlType::Int, question_grade);
    let result = procedures::call(&state, call, CTX).await?;
    let row = procedures::require_row(&result)?;
    let message = succeeded(procedures::status_message(row, "message"))?;

    Ok(Envelope::data(QuestionGrade { exam_id, question_id, question_grade })
        .with_message(message))
}

async fn validate_exam_grade(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while validating exam grade");

    let call = ProcedureCall::new("sp_validate_exam_grade").input("exam_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    let row = procedures::require_row(&result)?;
    let message = succeeded(procedures::status_message(row, "result"))?;

    Ok(Envelope::message(message))
}

/// Finalization may emit several status rows; the last one is the verdict.
async fn finalize_exam(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<()>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while finalizing exam");

    let call = ProcedureCall::new("sp_finalize_exam").input("exam_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    let verdict = result.last_row().ok_or_else(|| ApiError::Internal {
        message: "No response from database".to_string(),
        detail: None,
    })?;
    let message = succeeded(procedures::status_message(verdict, "result"))?;

    Ok(Envelope::message(message))
}

/// Passes a status text through when it reads as success; anything else,
/// including no text at all, is a client error carrying the text.
fn succeeded(message: Option<String>) -> Result<String, ApiError> {
    let message = message.unwrap_or_default();
    match outcome::classify(&message) {
        Outcome::Succeeded => Ok(message),
        _ => Err(ApiError::BadRequest(message)),
    }
}

async fn available_exams(
    identity: RequestIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<AvailableExam>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching available exams");

    let call = ProcedureCall::new("sp_get_available_exams_for_student").input(
        "student_id",
        SqlType::Int,
        identity.subject_id,
    );
    let result = procedures::call(&state, call, CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(AvailableExam::from_row).collect()))
}

async fn student_exams(
    identity: RequestIdentity,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<TakenExam>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching student exams");

    let call = ProcedureCall::new("sp_select_student_exams").input(
        "student_id",
        SqlType::Int,
        identity.subject_id,
    );
    let result = procedures::call(&state, call, CTX).await?;
    Ok(Envelope::list(result.recordset().iter().map(TakenExam::from_row).collect()))
}

/// Each answer is its own call. Nothing is rolled back when some fail:
/// 201 when all were stored, 207 when some were, 400 when none were.
async fn submit_answers(
    identity: RequestIdentity,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SubmitAnswersRequest>,
) -> Result<Response, ApiError> {
    let (Some(exam_id), Some(serde_json::Value::Array(items))) = (payload.exam_id, payload.answers)
    else {
        return Err(ApiError::bad_request("Please provide exam ID and an array of answers"));
    };
    if items.is_empty() {
        return Err(ApiError::bad_request("Please provide exam ID and an array of answers"));
    }
    let answers = items
        .iter()
        .map(SubmittedAnswer::parse)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            ApiError::bad_request("Each answer must have questionId and studentAnswer")
        })?;

    let mut batch = AnswerBatch::new();
    for answer in &answers {
        let call = ProcedureCall::new("sp_submit_exam_answers")
            .input("exam_id", SqlType::Int, exam_id)
            .input("student_id", SqlType::Int, identity.subject_id)
            .input("question_id", SqlType::Int, answer.question_id)
            .input("student_answer", SqlType::VarChar(255), answer.student_answer.as_str());
        let outcome = state.gateway().execute(call).await;
        if let Err(err) = &outcome {
            tracing::warn!(
                exam_id,
                question_id = answer.question_id,
                error = %err,
                "Answer submission failed"
            );
        }
        batch.record(i64::from(answer.question_id), outcome);
    }

    let total_answers = answers.len();
    let response = match batch.finish() {
        BatchOutcome::AllSucceeded { success_count } => Envelope::data(SubmissionSummary {
            exam_id,
            total_answers,
            success_count,
            errors: None,
        })
        .with_message(format!("All {success_count} answers submitted successfully"))
        .created()
        .into_response(),
        BatchOutcome::Partial { success_count, errors } => {
            let message = format!("{success_count} answers submitted, {} failed", errors.len());
            Envelope::data(SubmissionSummary {
                exam_id,
                total_answers,
                success_count,
                errors: Some(errors),
            })
            .with_message(message)
            .with_status(StatusCode::MULTI_STATUS)
            .into_response()
        }
        BatchOutcome::AllFailed { errors } => (
            StatusCode::BAD_REQUEST,
            Json(SubmissionRejected { success: false, message: "Failed to submit answers", errors }),
        )
            .into_response(),
    };
    Ok(response)
}

async fn correct_exam(
    identity: RequestIdentity,
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<i32>,
) -> Result<Envelope<Correction>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while correcting exam");

    let call = ProcedureCall::new("exam_correction")
        .input("exam_id", SqlType::Int, exam_id)
        .input("student_id", SqlType::Int, identity.subject_id);
    let result = procedures::call(&state, call, CTX).await?;
    let correction = Correction::from_rows(result.recordset())
        .ok_or_else(|| ApiError::not_found("No exam data found"))?;

    Ok(Envelope::data(correction).with_message("Exam corrected successfully"))
}

async fn exam_questions(
    identity: RequestIdentity,
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Envelope<Vec<ExamQuestion>>, ApiError> {
    const CTX: CallContext = CallContext::new("An error occurred while fetching exam questions");

    let call = ProcedureCall::new("sp_select_exam_question").input("exam_id", SqlType::Int, id);
    let result = procedures::call(&state, call, CTX).await?;
    if result.recordset().is_empty() {
        return Err(ApiError::not_found("No questions found for this exam"));
    }

    let with_grade = identity.role == Role::Instructor;
    Ok(Envelope::list(
        result.recordset().iter().map(|row| ExamQuestion::from_row(row, with_grade)).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::db::types::Role;
    use crate::db::{GatewayError, ProcedureResult, Row, SqlValue};
    use crate::test_support::{self, ScriptedGateway};

    fn answers(ids: &[i32]) -> serde_json::Value {
        json!(ids
            .iter()
            .map(|id| json!({"questionId": id, "studentAnswer": "A"}))
            .collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn two_of_five_failing_is_multi_status() {
        let gateway = ScriptedGateway::new().reply("sp_submit_exam_answers", |call| {
            match call.value("question_id") {
                Some(SqlValue::Int(2)) => Ok(ProcedureResult::from_rows(vec![Row::from(
                    json!({"message": "Question is not part of this exam"}),
                )])),
                Some(SqlValue::Int(4)) => Err(GatewayError::Procedure {
                    procedure: "sp_submit_exam_answers".into(),
                    message: "Answer already recorded".into(),
                    code: None,
                }),
                _ => Ok(ProcedureResult::from_rows(vec![Row::from(
                    json!({"message": "Answer submitted successfully"}),
                )])),
            }
        });
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(10, Role::Student);

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/exams/student/submit-answers",
                Some(&token),
                Some(json!({"examId": 3, "answers": answers(&[1, 2, 3, 4, 5])})),
            )
            .await;

        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "3 answers submitted, 2 failed");
        assert_eq!(body["data"]["successCount"], 3);
        assert_eq!(body["data"]["totalAnswers"], 5);
        assert_eq!(
            body["data"]["errors"],
            json!([
                {"questionId": 2, "error": "Question is not part of this exam"},
                {"questionId": 4, "error": "Answer already recorded"}
            ])
        );
        assert_eq!(ctx.gateway.calls().len(), 5);
        let call = ctx.gateway.called("sp_submit_exam_answers").expect("call");
        assert_eq!(call.value("student_id"), Some(&SqlValue::Int(10)));
    }

    #[tokio::test]
    async fn complete_batch_is_created() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(10, Role::Student);

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/exams/student/submit-answers",
                Some(&token),
                Some(json!({"examId": "3", "answers": answers(&[1, 2])})),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "All 2 answers submitted successfully");
        assert!(body["data"].get("errors").is_none());
    }

    #[tokio::test]
    async fn failed_batch_lists_errors_at_top_level() {
        let ctx = test_support::test_app(ScriptedGateway::new().unavailable()).await;
        let token = ctx.token(10, Role::Student);

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/exams/student/submit-answers",
                Some(&token),
                Some(json!({"examId": 3, "answers": answers(&[7])})),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Failed to submit answers");
        assert_eq!(body["errors"][0]["questionId"], 7);
    }

    #[tokio::test]
    async fn malformed_batches_never_reach_database() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(10, Role::Student);

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/exams/student/submit-answers",
                Some(&token),
                Some(json!({"examId": 3, "answers": "A"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide exam ID and an array of answers");

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/exams/student/submit-answers",
                Some(&token),
                Some(json!({"examId": 3, "answers": [{"questionId": 1}]})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Each answer must have questionId and studentAnswer");
        assert!(ctx.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn instructors_cannot_submit_answers() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/exams/student/submit-answers",
                Some(&token),
                Some(json!({"examId": 3, "answers": answers(&[1])})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied. Only Student can access this resource.");
    }

    #[tokio::test]
    async fn generation_reports_routine_verdict() {
        let gateway = ScriptedGateway::new().reply("sp_exam_genration", |call| {
            let row = match call.value("mcq_count") {
                Some(SqlValue::Int(0)) => {
                    json!({"Exam_ID": 12, "Result": "Exam generated successfully"})
                }
                _ => json!({"": "Not enough MCQ questions for this course"}),
            };
            Ok(ProcedureResult::from_rows(vec![Row::from(row)]))
        });
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);
        let mut request = json!({
            "title": "Midterm",
            "type": "Exam",
            "duration": 60,
            "tfCount": 5,
            "mcqCount": 0,
            "examGrade": 20,
            "courseId": 2
        });

        let (status, body) =
            ctx.send(Method::POST, "/api/exams/generate", Some(&token), Some(request.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Exam generated successfully");
        assert_eq!(body["data"]["examId"], 12);
        assert_eq!(body["data"]["mcqCount"], 0);
        let call = ctx.gateway.called("sp_exam_genration").expect("call");
        assert_eq!(call.value("created_by"), Some(&SqlValue::Int(1)));

        request["mcqCount"] = json!(10);
        let (status, body) =
            ctx.send(Method::POST, "/api/exams/generate", Some(&token), Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Not enough MCQ questions for this course");
    }

    #[tokio::test]
    async fn generation_requires_counts() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) = ctx
            .send(
                Method::POST,
                "/api/exams/generate",
                Some(&token),
                Some(json!({
                    "title": "Midterm",
                    "type": "Exam",
                    "duration": 60,
                    "examGrade": 20,
                    "courseId": 2
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide TF count and MCQ count");
    }

    #[tokio::test]
    async fn invalid_grade_total_is_not_mistaken_for_valid() {
        let gateway = ScriptedGateway::new().rows(
            "sp_validate_exam_grade",
            vec![json!({"Result": "Exam grade is invalid: questions total 18 of 20"})],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) =
            ctx.send(Method::GET, "/api/exams/3/validate", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Exam grade is invalid: questions total 18 of 20");
    }

    #[tokio::test]
    async fn finalization_reads_last_status_row() {
        let gateway = ScriptedGateway::new().rows(
            "sp_finalize_exam",
            vec![
                json!({"Result": "Grades validated"}),
                json!({"Result": "Exam finalized successfully"}),
            ],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) =
            ctx.send(Method::POST, "/api/exams/3/finalize", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Exam finalized successfully");
    }

    #[tokio::test]
    async fn question_grades_are_hidden_from_students() {
        let gateway = ScriptedGateway::new().rows(
            "sp_select_exam_question",
            vec![json!({
                "question_id": 1,
                "question_text": "Pick one",
                "question_type": "MCQ",
                "question_grade": 5,
                "choice1": "A",
                "choice2": "B"
            })],
        );
        let ctx = test_support::test_app(gateway).await;

        let student = ctx.token(10, Role::Student);
        let (status, body) =
            ctx.send(Method::GET, "/api/exams/3/questions", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"][0].get("questionGrade").is_none());

        let instructor = ctx.token(1, Role::Instructor);
        let (_, body) =
            ctx.send(Method::GET, "/api/exams/3/questions", Some(&instructor), None).await;
        assert_eq!(body["data"][0]["questionGrade"], 5);
    }

    #[tokio::test]
    async fn empty_listing_message_is_not_found() {
        let gateway = ScriptedGateway::new().rows(
            "sp_get_instructor_exams",
            vec![json!({"message": "No exams found for this instructor"})],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Instructor);

        let (status, body) =
            ctx.send(Method::GET, "/api/exams/instructor/my-exams", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "No exams found for this instructor");
    }

    #[tokio::test]
    async fn correction_reports_final_grade() {
        let gateway = ScriptedGateway::new().rows(
            "exam_correction",
            vec![
                json!({"final_grade": 15, "question_id": 1, "correct_ans": "A", "student_answer": "A", "result": 1}),
                json!({"final_grade": 15, "question_id": 2, "correct_ans": "B", "student_answer": "C", "result": 0}),
            ],
        );
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(10, Role::Student);

        let (status, body) =
            ctx.send(Method::GET, "/api/exams/student/3/correct", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["finalGrade"], 15);
        assert_eq!(body["data"]["questions"][1]["correctAnswer"], "B");
        let call = ctx.gateway.called("exam_correction").expect("call");
        assert_eq!(call.value("student_id"), Some(&SqlValue::Int(10)));
    }
}
