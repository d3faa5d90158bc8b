// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, ROLE_ADMIN},
};

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role_id == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admins can manage patient profiles".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route("/search", get(search_patients))
        .route(
            "/{patient_id}",
            get(get_patient).patch(update_patient).delete(delete_patient),
        )
        .route("/{patient_id}/appointments", get(patient_appointments))
        .route(
            "/{patient_id}/appointments/upcoming",
            get(patient_upcoming_appointments),
        )
        .route("/{patient_id}/records", get(patient_records))
        .route("/{patient_id}/stats", get(patient_stats))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PatientRow {
    pub patient_id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub status: i16,
}

const PATIENT_SELECT: &str = r#"
    SELECT p.patient_id, p.user_id, u.first_name, u.last_name, u.email, u.phone,
           u.city, p.status
    FROM patient p
    JOIN app_user u ON u.user_id = p.user_id
"#;

pub async fn list_patients(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    let sql = format!("{PATIENT_SELECT} WHERE p.status = 1 ORDER BY u.last_name, u.first_name");
    let rows: Vec<PatientRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<i64>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let sql = format!("{PATIENT_SELECT} WHERE p.patient_id = $1");
    let row: PatientRow = sqlx::query_as(&sql)
        .bind(patient_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "patient not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub user_id: i64,
}

pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    ensure_admin(&auth)?;

    let patient_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO patient (user_id)
        VALUES ($1)
        RETURNING patient_id
        "#,
    )
    .bind(req.user_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("PATIENT_CREATE_FAILED", format!("{e}")))?;

    get_patient(State(state), auth, Path(patient_id)).await
}

#[derive(Debug, Deserialize)]
pub struct UpdatePatientRequest {
    pub status: Option<i16>,
}

fn validate_status(status: i16) -> Result<(), ApiError> {
    if status != 0 && status != 1 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "status must be 0 or 1".into(),
        ));
    }
    Ok(())
}

/// Flipping status back to 1 reactivates a soft-deleted patient.
pub async fn update_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<i64>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    ensure_admin(&auth)?;

    if let Some(status) = req.status {
        validate_status(status)?;
    }

    let res = sqlx::query(
        r#"
        UPDATE patient
        SET status = COALESCE($2, status)
        WHERE patient_id = $1
        "#,
    )
    .bind(patient_id)
    .bind(req.status)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "patient not found".into()));
    }

    get_patient(State(state), auth, Path(patient_id)).await
}

pub async fn delete_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(r#"UPDATE patient SET status = 0 WHERE patient_id = $1"#)
        .bind(patient_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "patient not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn search_patients(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    let pattern = format!("%{}%", query.q.trim());

    let sql = format!(
        r#"{PATIENT_SELECT}
        WHERE p.status = 1
          AND (u.first_name ILIKE $1 OR u.last_name ILIKE $1
               OR u.email ILIKE $1 OR u.id_number ILIKE $1)
        ORDER BY u.last_name, u.first_name"#
    );
    let rows: Vec<PatientRow> = sqlx::query_as(&sql)
        .bind(&pattern)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   Patient-scoped lookups
   ============================================================ */

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PatientAppointmentRow {
    pub appointment_id: i64,
    pub appt_date: NaiveDate,
    pub appt_time: NaiveTime,
    pub kind: Option<String>,
    pub doctor_id: i64,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
    pub specialty_name: Option<String>,
}

const PATIENT_APPOINTMENT_SELECT: &str = r#"
    SELECT a.appointment_id, a.appt_date, a.appt_time, a.kind,
           d.doctor_id,
           u.first_name AS doctor_first_name,
           u.last_name  AS doctor_last_name,
           s.specialty_name
    FROM appointment a
    JOIN doctor d ON d.doctor_id = a.doctor_id
    JOIN app_user u ON u.user_id = d.user_id
    LEFT JOIN specialty s ON s.specialty_id = d.specialty_id
"#;

pub async fn patient_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<PatientAppointmentRow>>>, ApiError> {
    let sql = format!(
        "{PATIENT_APPOINTMENT_SELECT} WHERE a.patient_id = $1 AND a.status = 1 ORDER BY a.appt_date DESC, a.appt_time DESC"
    );
    let rows: Vec<PatientAppointmentRow> = sqlx::query_as(&sql)
        .bind(patient_id)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn patient_upcoming_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<PatientAppointmentRow>>>, ApiError> {
    let sql = format!(
        r#"{PATIENT_APPOINTMENT_SELECT}
        WHERE a.patient_id = $1 AND a.status = 1
          AND (a.appt_date > CURRENT_DATE
               OR (a.appt_date = CURRENT_DATE AND a.appt_time >= CURRENT_TIME))
        ORDER BY a.appt_date, a.appt_time"#
    );
    let rows: Vec<PatientAppointmentRow> = sqlx::query_as(&sql)
        .bind(patient_id)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PatientRecordRow {
    pub record_id: i64,
    pub record_date: NaiveDate,
    pub doctor_id: i64,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
    pub specialty_name: Option<String>,
}

pub async fn patient_records(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<PatientRecordRow>>>, ApiError> {
    let rows: Vec<PatientRecordRow> = sqlx::query_as(
        r#"
        SELECT mr.record_id, mr.record_date,
               d.doctor_id,
               u.first_name AS doctor_first_name,
               u.last_name  AS doctor_last_name,
               s.specialty_name
        FROM medical_record mr
        JOIN doctor d ON d.doctor_id = mr.doctor_id
        JOIN app_user u ON u.user_id = d.user_id
        LEFT JOIN specialty s ON s.specialty_id = d.specialty_id
        WHERE mr.patient_id = $1 AND mr.status = 1
        ORDER BY mr.record_date DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Serialize)]
pub struct PatientStats {
    pub total_appointments: i64,
    pub total_records: i64,
    pub upcoming_appointments: i64,
    pub completed_appointments: i64,
}

pub async fn patient_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<i64>,
) -> Result<Json<ApiOk<PatientStats>>, ApiError> {
    let total_appointments: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM appointment WHERE patient_id = $1 AND status = 1"#,
    )
    .bind(patient_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let total_records: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM medical_record WHERE patient_id = $1 AND status = 1"#,
    )
    .bind(patient_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let upcoming_appointments: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM appointment
        WHERE patient_id = $1 AND status = 1
          AND (appt_date > CURRENT_DATE
               OR (appt_date = CURRENT_DATE AND appt_time >= CURRENT_TIME))
        "#,
    )
    .bind(patient_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let completed_appointments: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM appointment
        WHERE patient_id = $1 AND status = 1
          AND (appt_date < CURRENT_DATE
               OR (appt_date = CURRENT_DATE AND appt_time < CURRENT_TIME))
        "#,
    )
    .bind(patient_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: PatientStats {
            total_appointments,
            total_records,
            upcoming_appointments,
            completed_appointments,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_status_is_binary() {
        assert!(validate_status(0).is_ok());
        assert!(validate_status(1).is_ok());

        assert!(validate_status(2).is_err());
        assert!(validate_status(-1).is_err());
    }
}
