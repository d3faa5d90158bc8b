// src/routes/doctor_routes.rs

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
            "Only admins can manage doctor profiles".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors).post(create_doctor))
        .route(
            "/{doctor_id}",
            get(get_doctor).patch(update_doctor).delete(delete_doctor),
        )
        .route("/{doctor_id}/availability", get(doctor_availability))
        .route("/{doctor_id}/appointments", get(doctor_appointments))
        .route("/{doctor_id}/records", get(doctor_records))
        .route("/{doctor_id}/stats", get(doctor_stats))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorRow {
    pub doctor_id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty_id: Option<i64>,
    pub specialty_name: Option<String>,
    pub status: i16,
}

const DOCTOR_SELECT: &str = r#"
    SELECT d.doctor_id, d.user_id, u.first_name, u.last_name, u.email, u.phone,
           d.specialty_id, s.specialty_name, d.status
    FROM doctor d
    JOIN app_user u ON u.user_id = d.user_id
    LEFT JOIN specialty s ON s.specialty_id = d.specialty_id
"#;

pub async fn list_doctors(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<DoctorRow>>>, ApiError> {
    let sql = format!("{DOCTOR_SELECT} WHERE d.status = 1 ORDER BY u.last_name, u.first_name");
    let rows: Vec<DoctorRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<i64>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    let sql = format!("{DOCTOR_SELECT} WHERE d.doctor_id = $1");
    let row: DoctorRow = sqlx::query_as(&sql)
        .bind(doctor_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "doctor not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: i64,
    pub specialty_id: Option<i64>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    ensure_admin(&auth)?;

    let doctor_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO doctor (user_id, specialty_id)
        VALUES ($1, $2)
        RETURNING doctor_id
        "#,
    )
    .bind(req.user_id)
    .bind(req.specialty_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("DOCTOR_CREATE_FAILED", format!("{e}")))?;

    get_doctor(State(state), auth, Path(doctor_id)).await
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub specialty_id: Option<i64>,
    pub status: Option<i16>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<i64>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<ApiOk<DoctorRow>>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE doctor
        SET specialty_id = COALESCE($2, specialty_id),
            status = COALESCE($3, status)
        WHERE doctor_id = $1
        "#,
    )
    .bind(doctor_id)
    .bind(req.specialty_id)
    .bind(req.status)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "doctor not found".into()));
    }

    get_doctor(State(state), auth, Path(doctor_id)).await
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(r#"UPDATE doctor SET status = 0 WHERE doctor_id = $1"#)
        .bind(doctor_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "doctor not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}

/* ============================================================
   Doctor-scoped lookups
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct DateFilter {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorSlotRow {
    pub slot_id: i64,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub status: i16,
}

pub async fn doctor_availability(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<i64>,
    Query(q): Query<DateFilter>,
) -> Result<Json<ApiOk<Vec<DoctorSlotRow>>>, ApiError> {
    let rows: Vec<DoctorSlotRow> = match q.date {
        Some(date) => {
            sqlx::query_as(
                r#"
                SELECT slot_id, slot_date, slot_time, status
                FROM availability_slot
                WHERE doctor_id = $1 AND slot_date = $2
                ORDER BY slot_time
                "#,
            )
            .bind(doctor_id)
            .bind(date)
            .fetch_all(&state.db)
            .await
        }
        None => {
            sqlx::query_as(
                r#"
                SELECT slot_id, slot_date, slot_time, status
                FROM availability_slot
                WHERE doctor_id = $1
                ORDER BY slot_date, slot_time
                "#,
            )
            .bind(doctor_id)
            .fetch_all(&state.db)
            .await
        }
    }
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorAppointmentRow {
    pub appointment_id: i64,
    pub appt_date: NaiveDate,
    pub appt_time: NaiveTime,
    pub kind: Option<String>,
    pub patient_id: i64,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_phone: Option<String>,
}

pub async fn doctor_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<i64>,
    Query(q): Query<DateFilter>,
) -> Result<Json<ApiOk<Vec<DoctorAppointmentRow>>>, ApiError> {
    let base = r#"
        SELECT a.appointment_id, a.appt_date, a.appt_time, a.kind,
               p.patient_id,
               u.first_name AS patient_first_name,
               u.last_name  AS patient_last_name,
               u.phone      AS patient_phone
        FROM appointment a
        JOIN patient p ON p.patient_id = a.patient_id
        JOIN app_user u ON u.user_id = p.user_id
        WHERE a.doctor_id = $1 AND a.status = 1
    "#;

    let rows: Vec<DoctorAppointmentRow> = match q.date {
        Some(date) => {
            let sql = format!("{base} AND a.appt_date = $2 ORDER BY a.appt_time");
            sqlx::query_as(&sql)
                .bind(doctor_id)
                .bind(date)
                .fetch_all(&state.db)
                .await
        }
        None => {
            let sql = format!("{base} ORDER BY a.appt_date, a.appt_time");
            sqlx::query_as(&sql)
                .bind(doctor_id)
                .fetch_all(&state.db)
                .await
        }
    }
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DoctorRecordRow {
    pub record_id: i64,
    pub record_date: NaiveDate,
    pub patient_id: i64,
    pub patient_first_name: String,
    pub patient_last_name: String,
}

pub async fn doctor_records(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<DoctorRecordRow>>>, ApiError> {
    let rows: Vec<DoctorRecordRow> = sqlx::query_as(
        r#"
        SELECT mr.record_id, mr.record_date,
               p.patient_id,
               u.first_name AS patient_first_name,
               u.last_name  AS patient_last_name
        FROM medical_record mr
        JOIN patient p ON p.patient_id = mr.patient_id
        JOIN app_user u ON u.user_id = p.user_id
        WHERE mr.doctor_id = $1 AND mr.status = 1
        ORDER BY mr.record_date DESC
        "#,
    )
    .bind(doctor_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Serialize)]
pub struct DoctorStats {
    pub total_appointments: i64,
    pub distinct_patients: i64,
    pub appointments_today: i64,
    pub free_slots_today: i64,
}

pub async fn doctor_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<i64>,
) -> Result<Json<ApiOk<DoctorStats>>, ApiError> {
    let total_appointments: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM appointment WHERE doctor_id = $1 AND status = 1"#,
    )
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let distinct_patients: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT patient_id) FROM appointment
        WHERE doctor_id = $1 AND status = 1
        "#,
    )
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let appointments_today: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM appointment
        WHERE doctor_id = $1 AND status = 1 AND appt_date = CURRENT_DATE
        "#,
    )
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let free_slots_today: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM availability_slot
        WHERE doctor_id = $1 AND status = 1 AND slot_date = CURRENT_DATE
        "#,
    )
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: DoctorStats {
            total_appointments,
            distinct_patients,
            appointments_today,
            free_slots_today,
        },
    }))
}
