// src/routes/user_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, OkData, OkResponse, ROLE_ADMIN, ROLE_PATIENT},
};

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role_id == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admins can manage users".into(),
        ))
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserPublicRow {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub role_id: i64,
    pub role_name: Option<String>,
    pub status: i16,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub role_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub role_id: Option<i64>,
    pub status: Option<i16>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{user_id}", get(get_user).patch(update_user))
        .route("/{user_id}/disable", post(disable_user))
}

const USER_SELECT: &str = r#"
    SELECT u.user_id, u.first_name, u.last_name, u.email, u.phone, u.city,
           u.role_id, r.role_name, u.status, u.created_at
    FROM app_user u
    LEFT JOIN role r ON r.role_id = u.role_id
"#;

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<UserPublicRow>>>, ApiError> {
    ensure_admin(&auth)?;

    let sql = format!("{USER_SELECT} WHERE u.status = 1 ORDER BY u.created_at DESC LIMIT 200");
    let users: Vec<UserPublicRow> = sqlx::query_as(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: users }))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    ensure_admin(&auth)?;

    let sql = format!("{USER_SELECT} WHERE u.user_id = $1");
    let user: UserPublicRow = sqlx::query_as(&sql)
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "user not found".into()))?;

    Ok(Json(ApiOk { data: user }))
}

fn validate_role(role_id: i64) -> Result<(), ApiError> {
    if !(1..=3).contains(&role_id) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "role_id must be one of 1..3".into(),
        ));
    }
    Ok(())
}

fn validate_required(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} is required"),
        ));
    }
    Ok(())
}

fn validate_password(pw: &str) -> Result<(), ApiError> {
    if pw.trim().len() < 8 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    ensure_admin(&auth)?;

    validate_required(&req.first_name, "first_name")?;
    validate_required(&req.last_name, "last_name")?;
    validate_required(&req.email, "email")?;
    validate_password(&req.password)?;
    let role_id = req.role_id.unwrap_or(ROLE_PATIENT);
    validate_role(role_id)?;

    let email = req.email.trim().to_lowercase();
    let pw_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let user_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO app_user (first_name, last_name, email, phone, city, password_hash, role_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING user_id
        "#,
    )
    .bind(req.first_name.trim())
    .bind(req.last_name.trim())
    .bind(&email)
    .bind(&req.phone)
    .bind(&req.city)
    .bind(&pw_hash)
    .bind(role_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            ApiError::Conflict("EMAIL_TAKEN", "email is already registered".into())
        }
        other => ApiError::db(other),
    })?;

    get_user(State(state), auth, Path(user_id)).await
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiOk<UserPublicRow>>, ApiError> {
    ensure_admin(&auth)?;

    if let Some(role_id) = req.role_id {
        validate_role(role_id)?;
    }
    if let Some(status) = req.status {
        if status != 0 && status != 1 {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "status must be 0 or 1".into(),
            ));
        }
    }

    let res = sqlx::query(
        r#"
        UPDATE app_user
        SET first_name = COALESCE($2, first_name),
            last_name  = COALESCE($3, last_name),
            phone      = COALESCE($4, phone),
            city       = COALESCE($5, city),
            role_id    = COALESCE($6, role_id),
            status     = COALESCE($7, status)
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(req.first_name.as_deref().map(str::trim))
    .bind(req.last_name.as_deref().map(str::trim))
    .bind(&req.phone)
    .bind(&req.city)
    .bind(req.role_id)
    .bind(req.status)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "user not found".into()));
    }

    get_user(State(state), auth, Path(user_id)).await
}

pub async fn disable_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(r#"UPDATE app_user SET status = 0 WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "user not found".into()));
    }

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_role_bounds() {
        assert!(validate_role(1).is_ok());
        assert!(validate_role(3).is_ok());

        assert!(validate_role(0).is_err());
        assert!(validate_role(4).is_err());
        assert!(validate_role(-1).is_err());
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("Ana", "first_name").is_ok());
        assert!(validate_required("", "first_name").is_err());
        assert!(validate_required("   ", "first_name").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("short").is_err());
    }
}
