use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use cohort_db::clock;
use cohort_db::models::NewUser;
use cohort_types::api::{
    AuthResponse, ChangePasswordRequest, Claims, ForgotPasswordRequest, LoginRequest,
    RegisterRequest, ResetPasswordRequest, SendVerificationRequest, VerifyEmailRequest,
};
use cohort_types::models::Role;

use crate::error::ApiError;
use crate::{AppState, blocking, convert};

const CODE_TTL_MINUTES: i64 = 15;
const RESET_TTL_MINUTES: i64 = 60;
const TOKEN_TTL_DAYS: i64 = 7;
const MIN_PASSWORD_LEN: usize = 8;

pub async fn send_verification(
    State(state): State<AppState>,
    Json(req): Json<SendVerificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;

    let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
    let code_hash = sha256_hex(&code);

    let addr = email.clone();
    blocking(&state, move |db| {
        if db.get_user_by_email(&addr)?.is_some() {
            return Err(ApiError::Conflict("email already registered"));
        }
        let expires_at = clock::after(chrono::Duration::minutes(CODE_TTL_MINUTES));
        db.upsert_email_verification(&addr, &code_hash, &expires_at)?;
        Ok(())
    })
    .await?;

    state
        .mailer
        .send(
            &email,
            "Your verification code",
            &format!("Your verification code is {}. It expires in 15 minutes.", code),
        )
        .await?;

    info!("Verification code sent to {}", email);
    Ok(Json(json!({ "sent": true })))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let code_hash = sha256_hex(req.code.trim());

    let verified = blocking(&state, move |db| Ok(db.verify_email_code(&email, &code_hash)?)).await?;
    if !verified {
        return Err(ApiError::bad_request("invalid or expired code"));
    }

    Ok(Json(json!({ "verified": true })))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let college_id = req.college_id.trim().to_string();
    let email = normalize_email(&req.email)?;

    // Validate input
    if name.chars().count() < 2 || name.chars().count() > 64 {
        return Err(ApiError::bad_request("name must be 2-64 characters"));
    }
    if college_id.is_empty() || college_id.len() > 32 {
        return Err(ApiError::bad_request("college id must be 1-32 characters"));
    }
    // Login treats identifiers with '@' as emails.
    if college_id.contains('@') {
        return Err(ApiError::bad_request("college id must not contain '@'"));
    }
    check_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let (n, cid, addr) = (name.clone(), college_id, email);
    blocking(&state, move |db| {
        if !db.is_email_verified(&addr)? {
            return Err(ApiError::Forbidden("email not verified"));
        }
        if db.email_or_college_id_taken(&addr, &cid)? {
            return Err(ApiError::Conflict("email or college id already registered"));
        }
        db.create_user(&NewUser {
            id: &user_id.to_string(),
            name: &n,
            college_id: &cid,
            email: &addr,
            password_hash: &password_hash,
        })?;
        Ok(())
    })
    .await?;

    info!("Registered user {} ({})", name, user_id);

    let token = create_token(&state.jwt_secret, user_id, &name, Role::User)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            name,
            role: Role::User,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Emails are stored lowercased; college ids are matched as typed.
    let identifier = match req.identifier.trim() {
        id if id.contains('@') => id.to_lowercase(),
        id => id.to_string(),
    };
    let user = blocking(&state, move |db| Ok(db.get_user_by_login(&identifier)?))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&user.password, &req.password) {
        return Err(ApiError::Unauthorized);
    }
    if user.banned_at.is_some() {
        warn!("Banned user {} tried to log in", user.id);
        return Err(ApiError::Forbidden("account suspended"));
    }

    let user_id = convert::uuid(&user.id, "user");
    let role = convert::enum_value(&user.role, Role::User);
    let token = create_token(&state.jwt_secret, user_id, &user.name, role)?;

    Ok(Json(AuthResponse {
        user_id,
        name: user.name,
        role,
        token,
    }))
}

/// Always answers 202 so the endpoint can't be used to probe for accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;

    let raw_token = hex::encode(rand::rng().random::<[u8; 32]>());
    let token_hash = sha256_hex(&raw_token);

    let addr = email.clone();
    let found = blocking(&state, move |db| {
        let Some(user) = db.get_user_by_email(&addr)? else {
            return Ok(false);
        };
        let expires_at = clock::after(chrono::Duration::minutes(RESET_TTL_MINUTES));
        db.create_password_reset(&token_hash, &user.id, &expires_at)?;
        Ok(true)
    })
    .await?;

    if found {
        state
            .mailer
            .send(
                &email,
                "Reset your password",
                &format!("Use this token to reset your password within an hour: {}", raw_token),
            )
            .await?;
    }

    Ok(StatusCode::ACCEPTED)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_password(&req.new_password)?;
    let password_hash = hash_password(&req.new_password)?;
    let token_hash = sha256_hex(req.token.trim());

    let user_id = blocking(&state, move |db| {
        let user_id = db
            .consume_password_reset(&token_hash)?
            .ok_or_else(|| ApiError::bad_request("invalid or expired token"))?;
        db.update_password(&user_id, &password_hash)?;
        Ok(user_id)
    })
    .await?;

    info!("Password reset for user {}", user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_password(&req.new_password)?;

    let uid = claims.sub.to_string();
    let user = blocking(&state, move |db| Ok(db.get_user_by_id(&uid)?))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if !verify_password(&user.password, &req.current_password) {
        return Err(ApiError::Forbidden("current password is incorrect"));
    }

    let password_hash = hash_password(&req.new_password)?;
    blocking(&state, move |db| Ok(db.update_password(&user.id, &password_hash)?)).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn create_token(secret: &str, user_id: Uuid, name: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(ApiError::bad_request("invalid email address"));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN || password.len() > 128 {
        return Err(ApiError::bad_request("password must be 8-128 characters"));
    }
    Ok(())
}

// Hash password with Argon2id
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(stored: &str, candidate: &str) -> bool {
    // Accounts with an unparseable hash (e.g. the assistant) can never log in.
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

pub(crate) fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Sara@Uni.Example ").unwrap(), "sara@uni.example");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@uni.example").is_err());
        assert!(normalize_email("sara@localhost").is_err());
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "wrong horse"));
        assert!(!verify_password("!", "anything"));
    }

    #[test]
    fn test_token_carries_role() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "Sara", Role::Admin).unwrap();
        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"secret"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, id);
        assert!(data.claims.is_admin());
    }
}
