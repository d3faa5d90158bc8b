// src/routes/reminder_routes.rs
//
// Doctor reminders: a (doctor, date, time) note shown on the dashboard.
// A reminder can be minted directly or copied from an appointment.

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
    models::{AppState, ROLE_ADMIN, ROLE_DOCTOR},
};

fn ensure_doctor_or_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role_id == ROLE_ADMIN || auth.role_id == ROLE_DOCTOR {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only doctors or admins can manage reminders".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reminder).get(list_reminders))
        .route("/from-appointment/{appointment_id}", post(reminder_from_appointment))
        .route("/today", get(reminders_today))
        .route("/upcoming", get(reminders_upcoming))
        .route("/stats", get(reminder_stats))
        .route("/doctor/{doctor_id}", get(reminders_by_doctor))
        .route(
            "/{reminder_id}",
            get(get_reminder).put(update_reminder).delete(delete_reminder),
        )
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReminderRow {
    pub reminder_id: i64,
    pub doctor_id: i64,
    pub reminder_date: NaiveDate,
    pub reminder_time: NaiveTime,
    pub status: i16,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
}

const REMINDER_SELECT: &str = r#"
    SELECT rm.reminder_id, rm.doctor_id, rm.reminder_date, rm.reminder_time, rm.status,
           u.first_name AS doctor_first_name,
           u.last_name  AS doctor_last_name
    FROM reminder rm
    JOIN doctor d ON d.doctor_id = rm.doctor_id
    JOIN app_user u ON u.user_id = d.user_id
"#;

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub doctor_id: i64,
    pub reminder_date: NaiveDate,
    pub reminder_time: NaiveTime,
}

pub async fn create_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateReminderRequest>,
) -> Result<Json<ApiOk<ReminderRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let reminder_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO reminder (doctor_id, reminder_date, reminder_time)
        VALUES ($1, $2, $3)
        RETURNING reminder_id
        "#,
    )
    .bind(req.doctor_id)
    .bind(req.reminder_date)
    .bind(req.reminder_time)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("REMINDER_CREATE_FAILED", format!("{e}")))?;

    get_reminder(State(state), auth, Path(reminder_id)).await
}

/// Copies the appointment's doctor/date/time into a reminder row.
pub async fn reminder_from_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<ReminderRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let reminder_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO reminder (doctor_id, reminder_date, reminder_time)
        SELECT doctor_id, appt_date, appt_time
        FROM appointment
        WHERE appointment_id = $1 AND status = 1
        RETURNING reminder_id
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "appointment not found".into()))?;

    get_reminder(State(state), auth, Path(reminder_id)).await
}

pub async fn list_reminders(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ReminderRow>>>, ApiError> {
    let sql = format!(
        "{REMINDER_SELECT} WHERE rm.status = 1 ORDER BY rm.reminder_date DESC, rm.reminder_time DESC"
    );
    let rows: Vec<ReminderRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn reminders_today(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ReminderRow>>>, ApiError> {
    let sql = format!(
        "{REMINDER_SELECT} WHERE rm.status = 1 AND rm.reminder_date = CURRENT_DATE ORDER BY rm.reminder_time"
    );
    let rows: Vec<ReminderRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn reminders_upcoming(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ReminderRow>>>, ApiError> {
    let sql = format!(
        r#"{REMINDER_SELECT}
        WHERE rm.status = 1
          AND (rm.reminder_date > CURRENT_DATE
               OR (rm.reminder_date = CURRENT_DATE AND rm.reminder_time >= CURRENT_TIME))
        ORDER BY rm.reminder_date, rm.reminder_time"#
    );
    let rows: Vec<ReminderRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn reminders_by_doctor(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<ReminderRow>>>, ApiError> {
    let sql = format!(
        "{REMINDER_SELECT} WHERE rm.status = 1 AND rm.doctor_id = $1 ORDER BY rm.reminder_date, rm.reminder_time"
    );
    let rows: Vec<ReminderRow> = sqlx::query_as(&sql)
        .bind(doctor_id)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_reminder(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(reminder_id): Path<i64>,
) -> Result<Json<ApiOk<ReminderRow>>, ApiError> {
    let sql = format!("{REMINDER_SELECT} WHERE rm.reminder_id = $1 AND rm.status = 1");
    let row: ReminderRow = sqlx::query_as(&sql)
        .bind(reminder_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "reminder not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReminderRequest {
    pub reminder_date: NaiveDate,
    pub reminder_time: NaiveTime,
}

pub async fn update_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reminder_id): Path<i64>,
    Json(req): Json<UpdateReminderRequest>,
) -> Result<Json<ApiOk<ReminderRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE reminder
        SET reminder_date = $2, reminder_time = $3
        WHERE reminder_id = $1 AND status = 1
        "#,
    )
    .bind(reminder_id)
    .bind(req.reminder_date)
    .bind(req.reminder_time)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "reminder not found".into()));
    }

    get_reminder(State(state), auth, Path(reminder_id)).await
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reminder_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let res = sqlx::query(r#"UPDATE reminder SET status = 0 WHERE reminder_id = $1"#)
        .bind(reminder_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "reminder not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}

/* ============================================================
   GET /reminders/stats
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ReminderStatsQuery {
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReminderStats {
    pub total: i64,
    pub today: i64,
    pub pending: i64,
    pub overdue: i64,
}

pub async fn reminder_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ReminderStatsQuery>,
) -> Result<Json<ApiOk<ReminderStats>>, ApiError> {
    let count = |cond: &'static str| {
        let sql = format!(
            "SELECT COUNT(*) FROM reminder WHERE ($1::BIGINT IS NULL OR doctor_id = $1) AND status = 1 AND {cond}"
        );
        let db = state.db.clone();
        let doctor_id = q.doctor_id;
        async move {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(doctor_id)
                .fetch_one(&db)
                .await
                .map_err(ApiError::db)
        }
    };

    let total = count("TRUE").await?;
    let today = count("reminder_date = CURRENT_DATE").await?;
    let pending = count(
        "(reminder_date > CURRENT_DATE OR (reminder_date = CURRENT_DATE AND reminder_time >= CURRENT_TIME))",
    )
    .await?;
    let overdue = count(
        "(reminder_date < CURRENT_DATE OR (reminder_date = CURRENT_DATE AND reminder_time < CURRENT_TIME))",
    )
    .await?;

    Ok(Json(ApiOk {
        data: ReminderStats {
            total,
            today,
            pending,
            overdue,
        },
    }))
}
