use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpMessage, HttpRequest, web};
use futures_util::future::{Ready, ready};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::AppState;
use crate::error::ApiError;
use crate::models::{Role, User};

pub const USER_COOKIE: &str = "user";
pub const TOKEN_COOKIE: &str = "token";
const SESSION_DAYS: i64 = 7;

/// The identity carried by the `user` cookie (or a verified token).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            id: user.id.clone(),
            name: user.name.clone(),
            email: Some(user.email.clone()),
            role: user.role,
            department: Some(user.department.clone()),
        }
    }
}

/// Identity minted by `/api/auth/admin-login`.
pub static ADMIN_IDENTITY: Lazy<SessionUser> = Lazy::new(|| SessionUser {
    id: "admin-1".to_string(),
    name: "관리자".to_string(),
    email: Some("admin@example.com".to_string()),
    role: Role::Admin,
    department: Some("시스템관리".to_string()),
});

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub exp: usize,
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        SessionUser {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            department: None,
        }
    }
}

pub fn create_token(user: &SessionUser, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize;

    let claims = Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn validate_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{salt}{password}"));
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(salt: &str, password: &str, hash: &str) -> bool {
    hash_password(salt, password) == hash
}

pub fn session_cookie(user: &SessionUser) -> Result<Cookie<'static>, serde_json::Error> {
    let json = serde_json::to_string(user)?;
    Ok(Cookie::build(USER_COOKIE, urlencoding::encode(&json).into_owned())
        .path("/")
        .max_age(CookieDuration::days(SESSION_DAYS))
        .same_site(SameSite::Lax)
        .http_only(false)
        .finish())
}

pub fn token_cookie(token: String) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token)
        .path("/")
        .max_age(CookieDuration::days(SESSION_DAYS))
        .same_site(SameSite::Lax)
        .http_only(true)
        .finish()
}

pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

pub fn decode_session_cookie(raw: &str) -> Option<SessionUser> {
    let decoded = urlencoding::decode(raw).ok()?;
    match serde_json::from_str(&decoded) {
        Ok(user) => Some(user),
        Err(err) => {
            log::debug!("ignoring unreadable user cookie: {err}");
            None
        }
    }
}

/// Resolves the caller from the `user` cookie, falling back to a bearer
/// token or the `token` cookie.
pub fn session_from_request(req: &HttpRequest, secret: &str) -> Option<SessionUser> {
    if let Some(user) = req
        .cookie(USER_COOKIE)
        .and_then(|c| decode_session_cookie(c.value()))
    {
        return Some(user);
    }

    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer
        .or_else(|| req.cookie(TOKEN_COOKIE).map(|c| c.value().to_string()))
        .and_then(|token| validate_token(&token, secret))
        .map(SessionUser::from)
}

/// Extractor for handlers that need the caller's identity.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<SessionUser>() {
            return ready(Ok(CurrentUser(user.clone())));
        }

        let secret = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.jwt_secret.clone())
            .unwrap_or_default();

        ready(
            session_from_request(req, &secret)
                .map(CurrentUser)
                .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string())),
        )
    }
}
