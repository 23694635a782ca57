use auth_service::{AuthenticatedAdmin, TokenStore, error_response, require_bearer};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use domain::{Live, NewLive};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query parameters for listing lives
#[derive(Debug, Default, Deserialize)]
pub struct ListLivesParams {
    /// `"true"` selects live records; any other non-empty value selects ended ones
    #[serde(default, rename = "isLive")]
    pub is_live: Option<String>,
}

impl ListLivesParams {
    fn filter(&self) -> Option<bool> {
        self.is_live
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(|value| value == "true")
    }
}

/// Request body for registering a live
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLiveRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub is_live: Option<bool>,
}

impl CreateLiveRequest {
    fn validate(self) -> Result<NewLive, &'static str> {
        let title = self.title.trim();
        let url = self.url.trim();
        if title.is_empty() {
            return Err("Title is required");
        }
        if url.is_empty() {
            return Err("Url is required");
        }
        Ok(NewLive {
            title: title.to_string(),
            url: url.to_string(),
            is_live: self.is_live.unwrap_or(true),
        })
    }
}

/// Response for a successful deletion
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Handler listing lives, newest first
async fn list_lives(
    State(repo): State<Arc<dyn datastore::Repository>>,
    Query(params): Query<ListLivesParams>,
) -> Response {
    let filter = params.filter();
    match repo.list_lives(filter) {
        Ok(lives) => {
            tracing::debug!(filter = ?filter, count = lives.len(), "listed lives");
            (StatusCode::OK, Json(lives)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to list lives");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch lives")
        }
    }
}

/// Handler registering a new live
async fn create_live(
    State(repo): State<Arc<dyn datastore::Repository>>,
    Extension(admin): Extension<AuthenticatedAdmin>,
    Json(request): Json<CreateLiveRequest>,
) -> Response {
    let new = match request.validate() {
        Ok(new) => new,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let live = Live::create(new, chrono::Utc::now());
    if let Err(e) = repo.add_live(live.clone()) {
        tracing::error!(error = %e, "failed to store live");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add live");
    }

    tracing::info!(
        id = %live.id,
        url = %live.url,
        is_live = live.is_live,
        by = %admin.email,
        "live added"
    );
    (StatusCode::CREATED, Json(live)).into_response()
}

/// Handler deleting a live; unknown ids still succeed
async fn delete_live(
    State(repo): State<Arc<dyn datastore::Repository>>,
    Extension(admin): Extension<AuthenticatedAdmin>,
    Path(id): Path<String>,
) -> Response {
    match repo.delete_live(&id) {
        Ok(existed) => {
            tracing::info!(id = %id, existed, by = %admin.email, "live deleted");
            let response = DeleteResponse {
                message: "Live deleted".to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, id = %id, "failed to delete live");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete live")
        }
    }
}

/// Create the router for the lives API (`/lives`, `/lives/{id}`)
///
/// Reads are public; creation and deletion go through the bearer gate.
pub fn create_router(repo: Arc<dyn datastore::Repository>, tokens: Arc<TokenStore>) -> Router {
    let protected = Router::new()
        .route("/lives", axum::routing::post(create_live))
        .route("/lives/{id}", delete(delete_live))
        .route_layer(middleware::from_fn_with_state(tokens, require_bearer));

    Router::new()
        .route("/lives", get(list_lives))
        .merge(protected)
        .with_state(repo)
}
