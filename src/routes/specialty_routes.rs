// src/routes/specialty_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
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
            "Only admins can manage specialties".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_specialties).post(create_specialty))
        .route("/search", get(search_specialties))
        .route(
            "/{specialty_id}",
            get(get_specialty).put(update_specialty).delete(delete_specialty),
        )
        .route("/{specialty_id}/doctors", get(doctors_in_specialty))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SpecialtyRow {
    pub specialty_id: i64,
    pub specialty_name: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SpecialtyDoctorRow {
    pub doctor_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SpecialtyNameRequest {
    pub specialty_name: String,
}

fn validate_specialty_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "specialty_name is required".into(),
        ));
    }
    Ok(())
}

pub async fn list_specialties(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<SpecialtyRow>>>, ApiError> {
    let rows: Vec<SpecialtyRow> = sqlx::query_as(
        r#"SELECT specialty_id, specialty_name FROM specialty ORDER BY specialty_name"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn search_specialties(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<SpecialtyRow>>>, ApiError> {
    let pattern = format!("%{}%", query.q.trim());

    let rows: Vec<SpecialtyRow> = sqlx::query_as(
        r#"
        SELECT specialty_id, specialty_name
        FROM specialty
        WHERE specialty_name ILIKE $1
        ORDER BY specialty_name
        "#,
    )
    .bind(&pattern)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_specialty(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(specialty_id): Path<i64>,
) -> Result<Json<ApiOk<SpecialtyRow>>, ApiError> {
    let row: SpecialtyRow = sqlx::query_as(
        r#"SELECT specialty_id, specialty_name FROM specialty WHERE specialty_id = $1"#,
    )
    .bind(specialty_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "specialty not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn create_specialty(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<SpecialtyNameRequest>,
) -> Result<Json<ApiOk<SpecialtyRow>>, ApiError> {
    ensure_admin(&auth)?;
    validate_specialty_name(&req.specialty_name)?;

    let row: SpecialtyRow = sqlx::query_as(
        r#"
        INSERT INTO specialty (specialty_name)
        VALUES ($1)
        RETURNING specialty_id, specialty_name
        "#,
    )
    .bind(req.specialty_name.trim())
    .fetch_one(&state.db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => ApiError::Conflict(
            "SPECIALTY_EXISTS",
            "a specialty with that name already exists".into(),
        ),
        other => ApiError::db(other),
    })?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn update_specialty(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(specialty_id): Path<i64>,
    Json(req): Json<SpecialtyNameRequest>,
) -> Result<Json<ApiOk<SpecialtyRow>>, ApiError> {
    ensure_admin(&auth)?;
    validate_specialty_name(&req.specialty_name)?;

    let row: SpecialtyRow = sqlx::query_as(
        r#"
        UPDATE specialty
        SET specialty_name = $2
        WHERE specialty_id = $1
        RETURNING specialty_id, specialty_name
        "#,
    )
    .bind(specialty_id)
    .bind(req.specialty_name.trim())
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "specialty not found".into()))?;

    Ok(Json(ApiOk { data: row }))
}

/// Hard delete, refused while active doctors are assigned to the specialty.
pub async fn delete_specialty(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(specialty_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    ensure_admin(&auth)?;

    let in_use: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM doctor WHERE specialty_id = $1 AND status = 1"#,
    )
    .bind(specialty_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    if in_use > 0 {
        return Err(ApiError::Conflict(
            "SPECIALTY_IN_USE",
            format!("{in_use} active doctor(s) are assigned to this specialty"),
        ));
    }

    let res = sqlx::query(r#"DELETE FROM specialty WHERE specialty_id = $1"#)
        .bind(specialty_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "specialty not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}

pub async fn doctors_in_specialty(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(specialty_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<SpecialtyDoctorRow>>>, ApiError> {
    let rows: Vec<SpecialtyDoctorRow> = sqlx::query_as(
        r#"
        SELECT d.doctor_id, u.first_name, u.last_name, u.email
        FROM doctor d
        JOIN app_user u ON u.user_id = d.user_id
        WHERE d.specialty_id = $1 AND d.status = 1
        ORDER BY u.last_name, u.first_name
        "#,
    )
    .bind(specialty_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_specialty_name() {
        assert!(validate_specialty_name("Cardiology").is_ok());
        assert!(validate_specialty_name("").is_err());
        assert!(validate_specialty_name("   ").is_err());
    }
}
