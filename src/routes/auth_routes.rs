// src/routes/auth_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{
    auth::{generate_access_token, hash_access_token, hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        role_to_string, AppState, LoginRequest, LoginResponse, LoginResponseData, MeResponse,
        MeResponseData, OkData, OkResponse, SessionInfo, SessionTokenRow, UserProfile, UserRow,
        ROLE_DOCTOR, ROLE_PATIENT,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/* ============================================================
   POST /auth/register
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub id_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    /// Defaults to the patient role; doctors additionally get a profile row.
    pub role_id: Option<i64>,
    pub specialty_id: Option<i64>,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let e = email.trim();
    if e.is_empty() || !e.contains('@') {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "a valid email is required".into(),
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

fn validate_name(name: &str, field: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} is required"),
        ));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_name(&req.first_name, "first_name")?;
    validate_name(&req.last_name, "last_name")?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    let email = req.email.trim().to_lowercase();
    let role_id = req.role_id.unwrap_or(ROLE_PATIENT);

    let taken: Option<i64> = sqlx::query_scalar(
        r#"SELECT user_id FROM app_user WHERE email = $1"#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    if taken.is_some() {
        return Err(ApiError::Conflict(
            "EMAIL_TAKEN",
            "email is already registered".into(),
        ));
    }

    let pw_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let user_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO app_user (
            first_name, last_name, age, gender, id_number, address, city,
            email, phone, password_hash, role_id
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING user_id
        "#,
    )
    .bind(req.first_name.trim())
    .bind(req.last_name.trim())
    .bind(req.age)
    .bind(&req.gender)
    .bind(&req.id_number)
    .bind(&req.address)
    .bind(&req.city)
    .bind(&email)
    .bind(&req.phone)
    .bind(&pw_hash)
    .bind(role_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    // Role-specific profile row, so the account is immediately bookable.
    match role_id {
        ROLE_PATIENT => {
            sqlx::query(r#"INSERT INTO patient (user_id) VALUES ($1)"#)
                .bind(user_id)
                .execute(&state.db)
                .await
                .map_err(ApiError::db)?;
        }
        ROLE_DOCTOR => {
            sqlx::query(r#"INSERT INTO doctor (user_id, specialty_id) VALUES ($1, $2)"#)
                .bind(user_id)
                .bind(req.specialty_id)
                .execute(&state.db)
                .await
                .map_err(ApiError::db)?;
        }
        _ => {}
    }

    issue_session(&state, user_id).await
}

/* ============================================================
   POST /auth/login
   ============================================================ */

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, first_name, last_name, email, password_hash, role_id, status
        FROM app_user
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if user.status != 1 {
        return Err(ApiError::Forbidden(
            "ACCOUNT_DISABLED",
            "Account is disabled".into(),
        ));
    }

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    issue_session(&state, user.user_id).await
}

async fn issue_session(state: &AppState, user_id: i64) -> Result<Json<LoginResponse>, ApiError> {
    let token = generate_access_token();
    let token_hash = hash_access_token(&token);
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token (user_id, session_token_hash, expires_at)
        VALUES ($1, $2, $3)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let user = load_profile(state, user_id).await?;

    Ok(Json(LoginResponse {
        data: LoginResponseData {
            access_token: token,
            expires_at: session.expires_at,
            user,
        },
    }))
}

async fn load_profile(state: &AppState, user_id: i64) -> Result<UserProfile, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, first_name, last_name, email, password_hash, role_id, status
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "user not found".into()))?;

    Ok(UserProfile {
        user_id: user.user_id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        role_id: user.role_id,
        role: role_to_string(user.role_id),
    })
}

/* ============================================================
   POST /auth/logout, GET /auth/me
   ============================================================ */

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<OkResponse>, ApiError> {
    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
        "#,
    )
    .bind(auth.session_token_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MeResponse>, ApiError> {
    let user = load_profile(&state, auth.user_id).await?;

    let expires_at: chrono::DateTime<Utc> = sqlx::query_scalar(
        r#"SELECT expires_at FROM session_token WHERE session_token_id = $1"#,
    )
    .bind(auth.session_token_id)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(MeResponse {
        data: MeResponseData {
            user,
            session: SessionInfo {
                session_token_id: auth.session_token_id,
                expires_at,
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("").is_err());
        assert!(validate_email("   ").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ana", "first_name").is_ok());
        assert!(validate_name("  ", "first_name").is_err());
    }
}
