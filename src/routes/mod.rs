use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod availability_routes;
pub mod doctor_routes;
pub mod home_routes;
pub mod patient_routes;
pub mod record_routes;
pub mod reminder_routes;
pub mod role_routes;
pub mod specialty_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1/users", user_routes::router())
        .nest("/api/v1/roles", role_routes::router())
        .nest("/api/v1/specialties", specialty_routes::router())
        .nest("/api/v1/doctors", doctor_routes::router())
        .nest("/api/v1/patients", patient_routes::router())
        .nest("/api/v1/appointments", appointment_routes::router())
        .nest("/api/v1/availability", availability_routes::router())
        .nest("/api/v1/records", record_routes::router())
        .nest("/api/v1/reminders", reminder_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}
