use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{DateTime, Utc};
use domain::Admin;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default bearer token lifetime: one day
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// Request body for login and for registering another admin
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response for a successful login
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The bearer token
    pub token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Lifetime in seconds from now
    pub expires_in: i64,
}

/// Error body shared by every route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Build a `(status, {"error": ...})` response
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// Identity attached to a request once its bearer token has been accepted
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin {
    pub email: String,
}

/// Token metadata for tracking expiry and owner
#[derive(Debug, Clone)]
struct TokenMetadata {
    /// When the token was issued
    issued_at: DateTime<Utc>,
    /// Lifetime in seconds
    expires_in: i64,
    /// Admin the token was issued to
    email: String,
}

impl TokenMetadata {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let expiry_time = self.issued_at + chrono::Duration::seconds(self.expires_in);
        now >= expiry_time
    }
}

/// Why a bearer token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Missing,
    Malformed,
    Unknown,
    Expired,
}

impl TokenRejection {
    pub fn message(self) -> &'static str {
        match self {
            TokenRejection::Missing => "Not authorized, no token",
            TokenRejection::Malformed => "Not authorized, expected a Bearer token",
            TokenRejection::Unknown => "Not authorized, token failed",
            TokenRejection::Expired => "Not authorized, token has expired",
        }
    }
}

impl IntoResponse for TokenRejection {
    fn into_response(self) -> Response {
        error_response(StatusCode::UNAUTHORIZED, self.message())
    }
}

/// Issued bearer tokens, kept in memory for the lifetime of the process
pub struct TokenStore {
    tokens: RwLock<HashMap<String, TokenMetadata>>,
    ttl_secs: i64,
}

impl TokenStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a fresh token for `email`
    pub fn issue(&self, email: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let metadata = TokenMetadata {
            issued_at: Utc::now(),
            expires_in: self.ttl_secs,
            email: email.to_string(),
        };
        self.tokens
            .write()
            .expect("Failed to acquire write lock on tokens")
            .insert(token.clone(), metadata);
        token
    }

    /// Check a token, dropping it if it has expired
    pub fn validate(&self, token: &str) -> Result<AuthenticatedAdmin, TokenRejection> {
        let now = Utc::now();
        let mut tokens = self
            .tokens
            .write()
            .expect("Failed to acquire write lock on tokens");

        let Some(metadata) = tokens.get(token) else {
            return Err(TokenRejection::Unknown);
        };
        if metadata.is_expired(now) {
            tokens.remove(token);
            return Err(TokenRejection::Expired);
        }
        Ok(AuthenticatedAdmin {
            email: metadata.email.clone(),
        })
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL_SECS)
    }
}

/// Shared state for the user routes and the bearer gate
#[derive(Clone)]
pub struct AuthState {
    pub repo: Arc<dyn datastore::Repository>,
    pub tokens: Arc<TokenStore>,
}

impl AuthState {
    pub fn new(repo: Arc<dyn datastore::Repository>, tokens: Arc<TokenStore>) -> Self {
        Self { repo, tokens }
    }
}

/// Salted SHA-256 of a password, hex encoded
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_admin(email: &str, password: &str) -> Admin {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    Admin {
        email: email.trim().to_lowercase(),
        password_hash: hash_password(&salt, password),
        salt,
    }
}

/// Register `email` as an admin unless it already exists.
/// Returns whether an account was created.
pub fn ensure_admin(
    repo: &dyn datastore::Repository,
    email: &str,
    password: &str,
) -> datastore::Result<bool> {
    let created = repo.add_admin(new_admin(email, password))?;
    if created {
        tracing::info!(email = %email, "admin account registered");
    }
    Ok(created)
}

fn verify(admin: &Admin, password: &str) -> bool {
    hash_password(&admin.salt, password) == admin.password_hash
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
fn bearer_token(request: &Request) -> Result<&str, TokenRejection> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(TokenRejection::Missing)?
        .to_str()
        .map_err(|_| TokenRejection::Malformed)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(TokenRejection::Malformed),
    }
}

/// Middleware rejecting requests without a valid bearer token.
///
/// On success the caller's [`AuthenticatedAdmin`] is added to the request
/// extensions.
pub async fn require_bearer(
    State(tokens): State<Arc<TokenStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let admin = match bearer_token(&request).and_then(|token| tokens.validate(token)) {
        Ok(admin) => admin,
        Err(rejection) => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = ?rejection,
                "rejected unauthenticated request"
            );
            return rejection.into_response();
        }
    };
    request.extensions_mut().insert(admin);
    next.run(request).await
}

/// Handler for admin login
async fn login(State(state): State<AuthState>, Json(request): Json<Credentials>) -> Response {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Email and password are required");
    }

    let email = request.email.trim().to_lowercase();
    let admin = match state.repo.get_admin(&email) {
        Ok(admin) => admin,
        Err(e) => {
            tracing::error!(error = %e, "failed to look up admin");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
    };

    match admin {
        Some(admin) if verify(&admin, &request.password) => {
            let token = state.tokens.issue(&admin.email);
            tracing::info!(email = %admin.email, "admin logged in");
            let response = LoginResponse {
                token,
                token_type: "Bearer".to_string(),
                expires_in: state.tokens.ttl_secs(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        _ => {
            tracing::warn!(email = %email, "failed login attempt");
            error_response(StatusCode::UNAUTHORIZED, "Invalid email or password")
        }
    }
}

/// Handler registering another admin account
async fn add_admin(
    State(state): State<AuthState>,
    Extension(caller): Extension<AuthenticatedAdmin>,
    Json(request): Json<Credentials>,
) -> Response {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Email and password are required");
    }

    match ensure_admin(state.repo.as_ref(), &request.email, &request.password) {
        Ok(true) => {
            tracing::info!(by = %caller.email, "admin added");
            let body = serde_json::json!({ "message": "Admin added" });
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Ok(false) => error_response(StatusCode::CONFLICT, "Admin already exists"),
        Err(e) => {
            tracing::error!(error = %e, "failed to store admin");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add admin")
        }
    }
}

/// Create the router for the user routes (`/users/...`)
pub fn create_router(state: AuthState) -> Router {
    let protected = Router::new()
        .route("/users/add", post(add_admin))
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/users/login", post(login))
        .merge(protected)
        .with_state(state)
}
