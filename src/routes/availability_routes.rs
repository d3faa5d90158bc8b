// src/routes/availability_routes.rs
//
// Doctors publish bookable (date, time) slots here. Slot status only has two
// states (1 free, 0 occupied); booking flips happen in scheduling.rs, this
// module is the direct CRUD surface.

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, ROLE_ADMIN, ROLE_DOCTOR},
    scheduling::SlotStatus,
};

fn ensure_doctor_or_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role_id == ROLE_ADMIN || auth.role_id == ROLE_DOCTOR {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only doctors or admins can manage availability".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_slot).get(list_slots))
        .route("/bulk", post(create_slots_bulk))
        .route("/generate", post(generate_slots))
        .route("/check", get(check_slot))
        .route("/occupied", get(occupied_times))
        .route("/stats", get(slot_stats))
        .route("/date/{date}", get(slots_by_date))
        .route("/doctor/{doctor_id}", get(slots_by_doctor))
        .route("/{slot_id}", get(get_slot).put(update_slot).delete(delete_slot))
        .route("/{slot_id}/status", patch(set_slot_status))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SlotRow {
    pub slot_id: i64,
    pub doctor_id: i64,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub status: i16,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SlotDetailRow {
    pub slot_id: i64,
    pub doctor_id: i64,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub status: i16,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
    pub specialty_name: Option<String>,
}

const SLOT_DETAIL_SELECT: &str = r#"
    SELECT
      av.slot_id, av.doctor_id, av.slot_date, av.slot_time, av.status,
      u.first_name AS doctor_first_name,
      u.last_name  AS doctor_last_name,
      s.specialty_name
    FROM availability_slot av
    JOIN doctor d ON d.doctor_id = av.doctor_id
    JOIN app_user u ON u.user_id = d.user_id
    LEFT JOIN specialty s ON s.specialty_id = d.specialty_id
"#;

/* ============================================================
   POST / (single), /bulk (one date, many times), /generate
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub doctor_id: i64,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
}

pub async fn create_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateSlotRequest>,
) -> Result<Json<ApiOk<SlotRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let slot: SlotRow = sqlx::query_as::<_, SlotRow>(
        r#"
        INSERT INTO availability_slot (doctor_id, slot_date, slot_time)
        VALUES ($1, $2, $3)
        RETURNING slot_id, doctor_id, slot_date, slot_time, status
        "#,
    )
    .bind(req.doctor_id)
    .bind(req.slot_date)
    .bind(req.slot_time)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("SLOT_CREATE_FAILED", format!("{e}")))?;

    Ok(Json(ApiOk { data: slot }))
}

#[derive(Debug, Deserialize)]
pub struct BulkSlotsRequest {
    pub doctor_id: i64,
    pub slot_date: NaiveDate,
    pub times: Vec<NaiveTime>,
}

#[derive(Debug, Serialize)]
pub struct InsertedCount {
    pub inserted: u64,
}

pub async fn create_slots_bulk(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<BulkSlotsRequest>,
) -> Result<Json<ApiOk<InsertedCount>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    if req.times.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "times must not be empty".into(),
        ));
    }

    let mut inserted = 0u64;
    for time in &req.times {
        let res = sqlx::query(
            r#"
            INSERT INTO availability_slot (doctor_id, slot_date, slot_time)
            VALUES ($1, $2, $3)
            ON CONFLICT (doctor_id, slot_date, slot_time) DO NOTHING
            "#,
        )
        .bind(req.doctor_id)
        .bind(req.slot_date)
        .bind(time)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::BadRequest("SLOT_CREATE_FAILED", format!("{e}")))?;
        inserted += res.rows_affected();
    }

    Ok(Json(ApiOk {
        data: InsertedCount { inserted },
    }))
}

#[derive(Debug, Deserialize)]
pub struct GenerateSlotsRequest {
    pub doctor_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub times: Vec<NaiveTime>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedCount {
    pub inserted: u64,
    pub total_slots: u64,
}

/// Cross product of a date range and a time list; already-published slots are
/// skipped rather than reset.
pub async fn generate_slots(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<GenerateSlotsRequest>,
) -> Result<Json<ApiOk<GeneratedCount>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    if req.times.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "times must not be empty".into(),
        ));
    }
    if req.end_date < req.start_date {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "end_date must not be before start_date".into(),
        ));
    }

    let mut inserted = 0u64;
    let mut total = 0u64;
    let mut date = req.start_date;
    while date <= req.end_date {
        for time in &req.times {
            total += 1;
            let res = sqlx::query(
                r#"
                INSERT INTO availability_slot (doctor_id, slot_date, slot_time)
                VALUES ($1, $2, $3)
                ON CONFLICT (doctor_id, slot_date, slot_time) DO NOTHING
                "#,
            )
            .bind(req.doctor_id)
            .bind(date)
            .bind(time)
            .execute(&state.db)
            .await
            .map_err(|e| ApiError::BadRequest("SLOT_CREATE_FAILED", format!("{e}")))?;
            inserted += res.rows_affected();
        }
        date = date + Duration::days(1);
    }

    Ok(Json(ApiOk {
        data: GeneratedCount {
            inserted,
            total_slots: total,
        },
    }))
}

/* ============================================================
   Reads
   ============================================================ */

pub async fn list_slots(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<SlotDetailRow>>>, ApiError> {
    let sql = format!(
        "{SLOT_DETAIL_SELECT} WHERE av.status = 1 ORDER BY av.slot_date DESC, av.slot_time"
    );
    let rows: Vec<SlotDetailRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_slot(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(slot_id): Path<i64>,
) -> Result<Json<ApiOk<SlotDetailRow>>, ApiError> {
    let sql = format!("{SLOT_DETAIL_SELECT} WHERE av.slot_id = $1");
    let row: SlotDetailRow = sqlx::query_as(&sql)
        .bind(slot_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "slot not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn slots_by_date(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(date): Path<String>,
) -> Result<Json<ApiOk<Vec<SlotDetailRow>>>, ApiError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest("VALIDATION_ERROR", "date must be YYYY-MM-DD".into())
    })?;

    let sql = format!(
        "{SLOT_DETAIL_SELECT} WHERE av.slot_date = $1 ORDER BY u.last_name, u.first_name, av.slot_time"
    );
    let rows: Vec<SlotDetailRow> = sqlx::query_as(&sql)
        .bind(date)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct DoctorSlotsQuery {
    pub date: Option<NaiveDate>,
    /// When true, only free slots from today on (the patient booking view).
    pub open: Option<bool>,
}

pub async fn slots_by_doctor(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<i64>,
    Query(q): Query<DoctorSlotsQuery>,
) -> Result<Json<ApiOk<Vec<SlotRow>>>, ApiError> {
    let open = q.open.unwrap_or(false);

    let rows: Vec<SlotRow> = match (q.date, open) {
        (Some(date), true) => {
            sqlx::query_as(
                r#"
                SELECT slot_id, doctor_id, slot_date, slot_time, status
                FROM availability_slot
                WHERE doctor_id = $1 AND slot_date = $2 AND status = 1
                ORDER BY slot_time
                "#,
            )
            .bind(doctor_id)
            .bind(date)
            .fetch_all(&state.db)
            .await
        }
        (Some(date), false) => {
            sqlx::query_as(
                r#"
                SELECT slot_id, doctor_id, slot_date, slot_time, status
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
        (None, true) => {
            sqlx::query_as(
                r#"
                SELECT slot_id, doctor_id, slot_date, slot_time, status
                FROM availability_slot
                WHERE doctor_id = $1 AND status = 1 AND slot_date >= CURRENT_DATE
                ORDER BY slot_date, slot_time
                "#,
            )
            .bind(doctor_id)
            .fetch_all(&state.db)
            .await
        }
        (None, false) => {
            sqlx::query_as(
                r#"
                SELECT slot_id, doctor_id, slot_date, slot_time, status
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

#[derive(Debug, Deserialize)]
pub struct CheckSlotQuery {
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Serialize)]
pub struct CheckSlotResponse {
    pub exists: bool,
    pub available: bool,
    pub slot_id: Option<i64>,
}

pub async fn check_slot(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<CheckSlotQuery>,
) -> Result<Json<ApiOk<CheckSlotResponse>>, ApiError> {
    let row: Option<(i64, i16)> = sqlx::query_as(
        r#"
        SELECT slot_id, status
        FROM availability_slot
        WHERE doctor_id = $1 AND slot_date = $2 AND slot_time = $3
        "#,
    )
    .bind(q.doctor_id)
    .bind(q.date)
    .bind(q.time)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let resp = match row {
        Some((slot_id, status)) => CheckSlotResponse {
            exists: true,
            available: SlotStatus::from_i16(status) == SlotStatus::Free,
            slot_id: Some(slot_id),
        },
        None => CheckSlotResponse {
            exists: false,
            available: false,
            slot_id: None,
        },
    };

    Ok(Json(ApiOk { data: resp }))
}

#[derive(Debug, Deserialize)]
pub struct OccupiedQuery {
    pub doctor_id: i64,
    pub date: NaiveDate,
}

pub async fn occupied_times(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<OccupiedQuery>,
) -> Result<Json<ApiOk<Vec<NaiveTime>>>, ApiError> {
    let times: Vec<NaiveTime> = sqlx::query_scalar(
        r#"
        SELECT slot_time
        FROM availability_slot
        WHERE doctor_id = $1 AND slot_date = $2 AND status = 0
        ORDER BY slot_time
        "#,
    )
    .bind(q.doctor_id)
    .bind(q.date)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: times }))
}

/* ============================================================
   Mutations on a single slot
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateSlotRequest {
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub status: i16,
}

pub async fn update_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slot_id): Path<i64>,
    Json(req): Json<UpdateSlotRequest>,
) -> Result<Json<ApiOk<SlotRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let status = SlotStatus::from_i16(req.status).as_i16();

    let slot: SlotRow = sqlx::query_as::<_, SlotRow>(
        r#"
        UPDATE availability_slot
        SET slot_date = $2, slot_time = $3, status = $4
        WHERE slot_id = $1
        RETURNING slot_id, doctor_id, slot_date, slot_time, status
        "#,
    )
    .bind(slot_id)
    .bind(req.slot_date)
    .bind(req.slot_time)
    .bind(status)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("SLOT_UPDATE_FAILED", format!("{e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "slot not found".into()))?;

    Ok(Json(ApiOk { data: slot }))
}

#[derive(Debug, Deserialize)]
pub struct SetSlotStatusRequest {
    pub status: i16,
}

pub async fn set_slot_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slot_id): Path<i64>,
    Json(req): Json<SetSlotStatusRequest>,
) -> Result<Json<ApiOk<SlotRow>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let status = SlotStatus::from_i16(req.status).as_i16();

    let slot: SlotRow = sqlx::query_as::<_, SlotRow>(
        r#"
        UPDATE availability_slot
        SET status = $2
        WHERE slot_id = $1
        RETURNING slot_id, doctor_id, slot_date, slot_time, status
        "#,
    )
    .bind(slot_id)
    .bind(status)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "slot not found".into()))?;

    Ok(Json(ApiOk { data: slot }))
}

/// Hard delete; slots are the only rows in the system removed outright.
pub async fn delete_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slot_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    ensure_doctor_or_admin(&auth)?;

    let res = sqlx::query(r#"DELETE FROM availability_slot WHERE slot_id = $1"#)
        .bind(slot_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "slot not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}

/* ============================================================
   GET /availability/stats
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct SlotStatsQuery {
    pub doctor_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SlotStats {
    pub total: i64,
    pub free: i64,
    pub occupied: i64,
    pub free_today: i64,
}

pub async fn slot_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<SlotStatsQuery>,
) -> Result<Json<ApiOk<SlotStats>>, ApiError> {
    // $1 IS NULL folds the optional doctor filter into one statement.
    let count = |cond: &'static str| {
        let sql = format!(
            "SELECT COUNT(*) FROM availability_slot WHERE ($1::BIGINT IS NULL OR doctor_id = $1) AND {cond}"
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
    let free = count("status = 1").await?;
    let occupied = count("status = 0").await?;
    let free_today = count("status = 1 AND slot_date = CURRENT_DATE").await?;

    Ok(Json(ApiOk {
        data: SlotStats {
            total,
            free,
            occupied,
            free_today,
        },
    }))
}
