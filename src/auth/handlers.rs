use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AddressRequest, AuthResponse, EmailRequest, LoginRequest, OtpSentPayload, PublicUser,
            RefreshRequest, RegisterRequest, ResetPasswordRequest, ResetTokenPayload,
            VerifyEmailQuery, VerifyOtpRequest,
        },
        extractors::AuthUser,
        repo_types::Address,
        reset::{PasswordResetService, ResetRejection},
        services::{is_too_short, AuthService, Registration, SessionTokens, MIN_PASSWORD_LEN},
    },
    envelope::Envelope,
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn reset_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/addresses", get(list_addresses).post(add_address))
}

fn auth_response(tokens: SessionTokens) -> AuthResponse {
    AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: tokens.user.into(),
    }
}

fn rejected<T>(rejection: ResetRejection) -> Envelope<T> {
    Envelope::rejected(rejection.to_string(), rejection.wait_time_seconds())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = AuthService::from_ref(&state)
        .register(Registration {
            full_name: payload.full_name,
            email: payload.email,
            password: payload.password,
            phone: payload.phone,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Envelope<PublicUser>, AppError> {
    let user = AuthService::from_ref(&state).verify_email(&query.token).await?;
    Ok(Envelope::ok("Email verified", user.into()))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Envelope<()>, AppError> {
    AuthService::from_ref(&state)
        .resend_verification(&payload.email)
        .await?;
    Ok(Envelope::done(
        "If the account exists, a new verification link has been sent.",
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let tokens = AuthService::from_ref(&state)
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(auth_response(tokens)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let tokens = AuthService::from_ref(&state)
        .refresh(&payload.refresh_token)
        .await?;
    Ok(Json(auth_response(tokens)))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Envelope<OtpSentPayload>, AppError> {
    let outcome = PasswordResetService::from_ref(&state)
        .request_reset(&payload.email)
        .await?;
    Ok(match outcome {
        Ok(sent) => Envelope::ok(
            "A verification code has been sent to your email.",
            OtpSentPayload {
                masked_email: sent.masked_email,
            },
        ),
        Err(rejection) => rejected(rejection),
    })
}

#[instrument(skip(state, payload))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Envelope<OtpSentPayload>, AppError> {
    let outcome = PasswordResetService::from_ref(&state)
        .resend_otp(&payload.email)
        .await?;
    Ok(match outcome {
        Ok(sent) => Envelope::ok(
            "A new verification code has been sent to your email.",
            OtpSentPayload {
                masked_email: sent.masked_email,
            },
        ),
        Err(rejection) => rejected(rejection),
    })
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Envelope<ResetTokenPayload>, AppError> {
    let outcome = PasswordResetService::from_ref(&state)
        .verify_otp(&payload.email, payload.otp.trim())
        .await?;
    Ok(match outcome {
        Ok(verified) => Envelope::ok(
            "OTP verified.",
            ResetTokenPayload {
                reset_token: verified.reset_token,
            },
        ),
        Err(rejection) => rejected(rejection),
    })
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Envelope<()>, AppError> {
    // A mismatch is answered by the reset flow itself.
    if payload.new_password == payload.confirm_password && is_too_short(&payload.new_password) {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let outcome = PasswordResetService::from_ref(&state)
        .reset_password(
            &payload.email,
            &payload.reset_token,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;
    Ok(match outcome {
        Ok(()) => Envelope::done("Your password has been reset."),
        Err(rejection) => rejected(rejection),
    })
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = AuthService::from_ref(&state).me(user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn list_addresses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Address>>, AppError> {
    Ok(Json(
        AuthService::from_ref(&state).list_addresses(user_id).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn add_address(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AddressRequest>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let address = AuthService::from_ref(&state)
        .add_address(user_id, payload.into())
        .await?;
    info!(user_id = %user_id, address_id = %address.id, "address added");
    Ok((StatusCode::CREATED, Json(address)))
}
