use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, NewPasswordRequest, RegisterRequest,
            RegisterResponse, ResetRequest,
        },
        password,
        repo_types::{NewUser, UniqueField, UserRepoError},
        reset::generate_reset_token,
    },
    error::{AppError, AppResult},
    mail::OutgoingEmail,
    state::AppState,
    validation::ValidatedJson,
};

const USER_EXISTS: &str = "User already exists";
const USERNAME_TAKEN: &str = "Username already taken";
const USER_NOT_FOUND: &str = "User not found";
const INVALID_RESET_TOKEN: &str = "Invalid or expired token";

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/reset-password", post(request_password_reset))
        .route("/reset-password/:token", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(mut payload): ValidatedJson<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if state.users.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict(USER_EXISTS.into()));
    }
    if state.users.find_by_username(&payload.username).await?.is_some() {
        warn!(username = %payload.username, "username already taken");
        return Err(AppError::Conflict(USERNAME_TAKEN.into()));
    }

    let hash = password::hash(payload.password).await?;
    let user = state
        .users
        .create(NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &hash,
        })
        .await
        .map_err(|e| match e {
            UserRepoError::Duplicate(UniqueField::Email) => AppError::Conflict(USER_EXISTS.into()),
            UserRepoError::Duplicate(UniqueField::Username) => {
                AppError::Conflict(USERNAME_TAKEN.into())
            }
            UserRepoError::Other(e) => AppError::Internal(e),
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(Json(RegisterResponse {
        message: "User created successfully",
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = match state.users.find_by_username(&payload.username).await? {
        Some(u) => u,
        None => {
            warn!(username = %payload.username, "login unknown username");
            return Err(AppError::NotFound(USER_NOT_FOUND.into()));
        }
    };

    if !password::verify(payload.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = state.jwt.issue(user.id, &user.username)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful",
        user,
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = payload.email.trim().to_lowercase();
    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "password reset for unknown email");
            return Err(AppError::NotFound(USER_NOT_FOUND.into()));
        }
    };

    let reset = generate_reset_token(OffsetDateTime::now_utc());
    state
        .users
        .set_reset_token(user.id, &reset.token, reset.expires_at)
        .await?;

    let link = format!(
        "{}/reset-password/{}",
        state.config.reset_url_base, reset.token
    );
    state
        .mailer
        .send(&OutgoingEmail {
            to: user.email.clone(),
            subject: "Password Reset".into(),
            text: format!(
                "You requested a password reset.\n\n\
                 Use the link below to choose a new password:\n{link}\n\n\
                 The link expires in 15 minutes. If you did not ask for this, ignore this email."
            ),
        })
        .await?;

    info!(user_id = %user.id, "password reset link sent");
    Ok(Json(MessageResponse {
        message: "Password reset link sent to your email",
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidatedJson(payload): ValidatedJson<NewPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let now = OffsetDateTime::now_utc();
    let user = match state.users.find_by_reset_token(&token, now).await? {
        Some(u) => u,
        None => {
            warn!("reset attempted with unknown or expired token");
            return Err(AppError::NotFound(INVALID_RESET_TOKEN.into()));
        }
    };

    let hash = password::hash(payload.new_password).await?;
    if !state
        .users
        .reset_password(user.id, &token, &hash, now)
        .await?
    {
        warn!(user_id = %user.id, "reset token consumed concurrently");
        return Err(AppError::NotFound(INVALID_RESET_TOKEN.into()));
    }

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password has been reset successfully",
    }))
}
