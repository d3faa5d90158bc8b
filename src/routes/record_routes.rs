// src/routes/record_routes.rs
//
// Medical records (visit history). Soft-deleted like appointments.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, ROLE_ADMIN, ROLE_DOCTOR},
};

fn ensure_doctor_or_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role_id == ROLE_ADMIN || auth.role_id == ROLE_DOCTOR {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only doctors or admins can manage medical records".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_record).get(list_records))
        .route("/today", get(records_today))
        .route("/date/{date}", get(records_by_date))
        .route(
            "/{record_id}",
            get(get_record).put(update_record).delete(delete_record),
        )
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecordRow {
    pub record_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub record_date: NaiveDate,
    pub status: i16,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
    pub specialty_name: Option<String>,
    pub patient_first_name: String,
    pub patient_last_name: String,
}

const RECORD_SELECT: &str = r#"
    SELECT mr.record_id, mr.doctor_id, mr.patient_id, mr.record_date, mr.status,
           du.first_name AS doctor_first_name,
           du.last_name  AS doctor_last_name,
           s.specialty_name,
           pu.first_name AS patient_first_name,
           pu.last_name  AS patient_last_name
    FROM medical_record mr
    JOIN doctor d ON d.doctor_id = mr.doctor_id
    JOIN app_user du ON du.user_id = d.user_id
    LEFT JOIN specialty s ON s.specialty_id = d.specialty_id
    JOIN patient p ON p.patient_id = mr.patient_id
    JOIN app_user pu ON pu.user_id = p.user_id
"#;

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub doctor_id: i64,
    pub patient_id: i64,
    /// Defaults to today.
    pub record_date: Option<NaiveDate>,
}

pub async fn create_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateRecordRequest>,
) -> Result<Json<ApiOk<RecordRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let record_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO medical_record (doctor_id, patient_id, record_date)
        VALUES ($1, $2, COALESCE($3, CURRENT_DATE))
        RETURNING record_id
        "#,
    )
    .bind(req.doctor_id)
    .bind(req.patient_id)
    .bind(req.record_date)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("RECORD_CREATE_FAILED", format!("{e}")))?;

    get_record(State(state), auth, Path(record_id)).await
}

pub async fn list_records(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<RecordRow>>>, ApiError> {
    let sql = format!("{RECORD_SELECT} WHERE mr.status = 1 ORDER BY mr.record_date DESC");
    let rows: Vec<RecordRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn records_today(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<RecordRow>>>, ApiError> {
    let sql = format!(
        "{RECORD_SELECT} WHERE mr.status = 1 AND mr.record_date = CURRENT_DATE ORDER BY mr.record_id"
    );
    let rows: Vec<RecordRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn records_by_date(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(date): Path<String>,
) -> Result<Json<ApiOk<Vec<RecordRow>>>, ApiError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest("VALIDATION_ERROR", "date must be YYYY-MM-DD".into())
    })?;

    let sql = format!(
        "{RECORD_SELECT} WHERE mr.status = 1 AND mr.record_date = $1 ORDER BY mr.record_id"
    );
    let rows: Vec<RecordRow> = sqlx::query_as(&sql)
        .bind(date)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_record(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(record_id): Path<i64>,
) -> Result<Json<ApiOk<RecordRow>>, ApiError> {
    let sql = format!("{RECORD_SELECT} WHERE mr.record_id = $1 AND mr.status = 1");
    let row: RecordRow = sqlx::query_as(&sql)
        .bind(record_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "record not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub record_date: NaiveDate,
}

pub async fn update_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(record_id): Path<i64>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<Json<ApiOk<RecordRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let res = sqlx::query(
        r#"UPDATE medical_record SET record_date = $2 WHERE record_id = $1 AND status = 1"#,
    )
    .bind(record_id)
    .bind(req.record_date)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "record not found".into()));
    }

    get_record(State(state), auth, Path(record_id)).await
}

pub async fn delete_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(record_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let res = sqlx::query(r#"UPDATE medical_record SET status = 0 WHERE record_id = $1"#)
        .bind(record_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "record not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}
