// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
    scheduling::{self, ScheduleError},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_appointment).get(list_appointments))
        .route("/today", get(appointments_today))
        .route("/upcoming", get(appointments_upcoming))
        .route("/stats", get(appointment_stats))
        .route("/date/{date}", get(appointments_by_date))
        .route(
            "/{appointment_id}",
            get(get_appointment).put(update_appointment).delete(delete_appointment),
        )
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AppointmentRow {
    pub appointment_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appt_date: NaiveDate,
    pub appt_time: NaiveTime,
    pub kind: Option<String>,
    pub notes: Option<String>,
    pub status: i16,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
    pub specialty_name: Option<String>,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_phone: Option<String>,
    pub patient_email: String,
}

// Shared joined projection; callers append WHERE/ORDER/LIMIT.
const APPOINTMENT_SELECT: &str = r#"
    SELECT
      a.appointment_id, a.doctor_id, a.patient_id,
      a.appt_date, a.appt_time, a.kind, a.notes, a.status,
      du.first_name AS doctor_first_name,
      du.last_name  AS doctor_last_name,
      s.specialty_name,
      pu.first_name AS patient_first_name,
      pu.last_name  AS patient_last_name,
      pu.phone      AS patient_phone,
      pu.email      AS patient_email
    FROM appointment a
    JOIN doctor d ON d.doctor_id = a.doctor_id
    JOIN app_user du ON du.user_id = d.user_id
    LEFT JOIN specialty s ON s.specialty_id = d.specialty_id
    JOIN patient p ON p.patient_id = a.patient_id
    JOIN app_user pu ON pu.user_id = p.user_id
"#;

/* ============================================================
   POST /appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appt_date: NaiveDate,
    pub appt_time: NaiveTime,
    pub kind: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    // TODO: check and occupy the availability slot here. Today only
    // reschedule (PUT) and cancel (DELETE) touch slot state, so creating an
    // appointment leaves the slot free and double-booking is possible.
    let appointment_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO appointment (doctor_id, patient_id, appt_date, appt_time, kind, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING appointment_id
        "#,
    )
    .bind(req.doctor_id)
    .bind(req.patient_id)
    .bind(req.appt_date)
    .bind(req.appt_time)
    .bind(&req.kind)
    .bind(&req.notes)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_CREATE_FAILED", format!("{e}")))?;

    get_appointment(State(state), auth, Path(appointment_id)).await
}

/* ============================================================
   GET /appointments, /today, /upcoming, /date/{date}, /{id}
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    let sql = format!(
        "{APPOINTMENT_SELECT} WHERE a.status = 1 ORDER BY a.appt_date DESC, a.appt_time DESC"
    );
    let rows: Vec<AppointmentRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn appointments_today(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    let sql = format!(
        "{APPOINTMENT_SELECT} WHERE a.status = 1 AND a.appt_date = CURRENT_DATE ORDER BY a.appt_time"
    );
    let rows: Vec<AppointmentRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<i64>,
}

pub async fn appointments_upcoming(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<UpcomingQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    let limit = q.limit.unwrap_or(10).clamp(1, 100);

    let sql = format!(
        r#"{APPOINTMENT_SELECT}
        WHERE a.status = 1
          AND (a.appt_date > CURRENT_DATE
               OR (a.appt_date = CURRENT_DATE AND a.appt_time >= CURRENT_TIME))
        ORDER BY a.appt_date ASC, a.appt_time ASC
        LIMIT $1"#
    );
    let rows: Vec<AppointmentRow> = sqlx::query_as(&sql)
        .bind(limit)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn appointments_by_date(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(date): Path<String>,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest("VALIDATION_ERROR", "date must be YYYY-MM-DD".into())
    })?;

    let sql = format!(
        "{APPOINTMENT_SELECT} WHERE a.status = 1 AND a.appt_date = $1 ORDER BY a.appt_time"
    );
    let rows: Vec<AppointmentRow> = sqlx::query_as(&sql)
        .bind(date)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.appointment_id = $1 AND a.status = 1");
    let row: AppointmentRow = sqlx::query_as(&sql)
        .bind(appointment_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "appointment not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   PUT /appointments/{id} (reschedule)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appt_date: NaiveDate,
    pub appt_time: NaiveTime,
    pub status: Option<i16>,
}

#[derive(Debug, sqlx::FromRow)]
struct StoredSlotRef {
    doctor_id: i64,
    appt_date: NaiveDate,
    appt_time: NaiveTime,
    status: i16,
}

async fn load_slot_ref(state: &AppState, appointment_id: i64) -> Result<StoredSlotRef, ApiError> {
    sqlx::query_as::<_, StoredSlotRef>(
        r#"
        SELECT doctor_id, appt_date, appt_time, status
        FROM appointment
        WHERE appointment_id = $1 AND status = 1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or(ScheduleError::NotFound.into())
}

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let stored = load_slot_ref(&state, appointment_id).await?;

    // Only a real date/time change goes through the slot table; a Conflict
    // aborts before anything is written.
    scheduling::reschedule_if_changed(
        &state.db,
        stored.doctor_id,
        (stored.appt_date, stored.appt_time),
        (req.appt_date, req.appt_time),
    )
    .await?;

    let status = req.status.unwrap_or(stored.status);

    sqlx::query(
        r#"
        UPDATE appointment
        SET appt_date = $2, appt_time = $3, status = $4
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(req.appt_date)
    .bind(req.appt_time)
    .bind(status)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_UPDATE_FAILED", format!("{e}")))?;

    get_appointment(State(state), auth, Path(appointment_id)).await
}

/* ============================================================
   DELETE /appointments/{id} (soft delete + release)
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    let stored = load_slot_ref(&state, appointment_id).await?;

    scheduling::release_slot(&state.db, stored.doctor_id, stored.appt_date, stored.appt_time)
        .await?;

    sqlx::query(r#"UPDATE appointment SET status = 0 WHERE appointment_id = $1"#)
        .bind(appointment_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: true }))
}

/* ============================================================
   GET /appointments/stats
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct AppointmentStats {
    pub total: i64,
    pub today: i64,
    pub upcoming: i64,
    pub completed: i64,
}

pub async fn appointment_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<AppointmentStats>>, ApiError> {
    let total: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM appointment WHERE status = 1"#,
    )
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let today: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM appointment WHERE status = 1 AND appt_date = CURRENT_DATE"#,
    )
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let upcoming: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM appointment
        WHERE status = 1
          AND (appt_date > CURRENT_DATE
               OR (appt_date = CURRENT_DATE AND appt_time >= CURRENT_TIME))
        "#,
    )
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let completed: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM appointment
        WHERE status = 1
          AND (appt_date < CURRENT_DATE
               OR (appt_date = CURRENT_DATE AND appt_time < CURRENT_TIME))
        "#,
    )
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: AppointmentStats {
            total,
            today,
            upcoming,
            completed,
        },
    }))
}
