// src/routes/role_routes.rs

use axum::{
    extract::{Path, State},
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
            "Only admins can manage roles".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route(
            "/{role_id}",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/{role_id}/users", get(users_with_role))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RoleRow {
    pub role_id: i64,
    pub role_name: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RoleUserRow {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleNameRequest {
    pub role_name: String,
}

fn validate_role_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "role_name is required".into(),
        ));
    }
    Ok(())
}

pub async fn list_roles(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<RoleRow>>>, ApiError> {
    let roles: Vec<RoleRow> = sqlx::query_as(
        r#"SELECT role_id, role_name FROM role ORDER BY role_id"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: roles }))
}

pub async fn get_role(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(role_id): Path<i64>,
) -> Result<Json<ApiOk<RoleRow>>, ApiError> {
    let role: RoleRow = sqlx::query_as(
        r#"SELECT role_id, role_name FROM role WHERE role_id = $1"#,
    )
    .bind(role_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "role not found".into()))?;

    Ok(Json(ApiOk { data: role }))
}

pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<RoleNameRequest>,
) -> Result<Json<ApiOk<RoleRow>>, ApiError> {
    ensure_admin(&auth)?;
    validate_role_name(&req.role_name)?;

    let role: RoleRow = sqlx::query_as(
        r#"
        INSERT INTO role (role_name)
        VALUES ($1)
        RETURNING role_id, role_name
        "#,
    )
    .bind(req.role_name.trim())
    .fetch_one(&state.db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            ApiError::Conflict("ROLE_EXISTS", "a role with that name already exists".into())
        }
        other => ApiError::db(other),
    })?;

    Ok(Json(ApiOk { data: role }))
}

pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(role_id): Path<i64>,
    Json(req): Json<RoleNameRequest>,
) -> Result<Json<ApiOk<RoleRow>>, ApiError> {
    ensure_admin(&auth)?;
    validate_role_name(&req.role_name)?;

    let role: RoleRow = sqlx::query_as(
        r#"
        UPDATE role
        SET role_name = $2
        WHERE role_id = $1
        RETURNING role_id, role_name
        "#,
    )
    .bind(role_id)
    .bind(req.role_name.trim())
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "role not found".into()))?;

    Ok(Json(ApiOk { data: role }))
}

/// Roles are hard-deleted, but never while active users still hold them.
pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(role_id): Path<i64>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    ensure_admin(&auth)?;

    let in_use: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM app_user WHERE role_id = $1 AND status = 1"#,
    )
    .bind(role_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    if in_use > 0 {
        return Err(ApiError::Conflict(
            "ROLE_IN_USE",
            format!("{in_use} active user(s) still hold this role"),
        ));
    }

    let res = sqlx::query(r#"DELETE FROM role WHERE role_id = $1"#)
        .bind(role_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "role not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}

pub async fn users_with_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(role_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<RoleUserRow>>>, ApiError> {
    ensure_admin(&auth)?;

    let users: Vec<RoleUserRow> = sqlx::query_as(
        r#"
        SELECT user_id, first_name, last_name, email
        FROM app_user
        WHERE role_id = $1 AND status = 1
        ORDER BY last_name, first_name
        "#,
    )
    .bind(role_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: users }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_role_name() {
        assert!(validate_role_name("receptionist").is_ok());
        assert!(validate_role_name("").is_err());
        assert!(validate_role_name("  ").is_err());
    }
}
