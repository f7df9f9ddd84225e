use actix_web::{http::header, web, HttpResponse};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::backup;
use crate::db::models::{parse_score, validate_score, SubjectTopper};
use crate::error::AppError;
use tracing::{info, error, warn};

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    pub roll_number: String,
}

/// A grade arrives either as a JSON number or as text typed into a form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Number(f64),
    Text(String),
}

impl ScoreInput {
    pub fn into_score(self) -> Result<f64, AppError> {
        match self {
            ScoreInput::Number(n) => validate_score(n),
            ScoreInput::Text(s) => parse_score(&s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub subject: String,
    pub grade: ScoreInput,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: i64,
    pub grades_removed: u64,
}

#[derive(Debug, Serialize)]
pub struct TopperResponse {
    pub subject: String,
    pub topper: Option<SubjectTopper>,
}

#[derive(Debug, Serialize)]
pub struct AverageResponse {
    pub subject: String,
    pub average: Option<f64>,
}

pub async fn list_students(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let students = state.db.list_students().await?;
    Ok(HttpResponse::Ok().json(students))
}

pub async fn create_student(
    req: web::Json<CreateStudentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received create request for roll number: {}", req.roll_number);

    match state.db.create_student(req.name.trim(), req.roll_number.trim()).await {
        Ok(student) => Ok(HttpResponse::Created().json(student)),
        Err(e) => {
            warn!("Create failed for roll number {}: {}", req.roll_number, e);
            Err(e)
        }
    }
}

pub async fn view_student(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let student_id = path.into_inner();

    let report = state
        .db
        .student_report(student_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Student {}", student_id)))?;

    Ok(HttpResponse::Ok().json(report))
}

pub async fn delete_student(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let student_id = path.into_inner();
    info!("Received delete request for student {}", student_id);

    let grades_removed = state.db.delete_student(student_id).await?;

    Ok(HttpResponse::Ok().json(DeleteResponse {
        deleted: student_id,
        grades_removed,
    }))
}

pub async fn add_grade(
    path: web::Path<i64>,
    req: web::Json<GradeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let student_id = path.into_inner();
    let GradeRequest { subject, grade } = req.into_inner();
    let subject = subject.trim().to_string();

    let score = grade.into_score().map_err(|e| {
        warn!("Rejected grade for student {} in {}: {}", student_id, subject, e);
        e
    })?;

    let grade = state.db.upsert_grade(student_id, &subject, score).await?;
    Ok(HttpResponse::Ok().json(grade))
}

pub async fn list_grades(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let student_id = path.into_inner();

    if state.db.get_student(student_id).await?.is_none() {
        return Err(AppError::not_found(format!("Student {}", student_id)));
    }

    let grades = state.db.grades_for_student(student_id).await?;
    Ok(HttpResponse::Ok().json(grades))
}

pub async fn subject_topper(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let subject = path.into_inner();
    let topper = state.db.subject_topper(&subject).await?;
    Ok(HttpResponse::Ok().json(TopperResponse { subject, topper }))
}

pub async fn class_average(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let subject = path.into_inner();
    let average = state.db.class_average(&subject).await?;
    Ok(HttpResponse::Ok().json(AverageResponse { subject, average }))
}

pub async fn download_backup(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let content = backup::export(&state.db).await.map_err(|e| {
        error!("Backup export failed: {}", e);
        e
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", backup::BACKUP_FILENAME),
        ))
        .body(content))
}
