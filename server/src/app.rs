use auth_service::{AuthState, TokenStore};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Every API route under `/api`, with CORS and request tracing
pub fn build_router(repo: Arc<dyn datastore::Repository>, tokens: Arc<TokenStore>) -> Router {
    let api = lives_service::create_router(repo.clone(), tokens.clone())
        .merge(auth_service::create_router(AuthState::new(repo, tokens)));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use datastore::{InMemoryRepository, Repository};
    use http::{Request, StatusCode, header};
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn admin_flow_end_to_end() {
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        auth_service::ensure_admin(repo.as_ref(), "admin@example.com", "pw").unwrap();
        let app = build_router(repo, Arc::new(TokenStore::default()));

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/users/login",
                serde_json::json!({ "email": "admin@example.com", "password": "pw" }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let mut ids = Vec::new();
        for (title, url) in [
            ("First", "https://www.youtube.com/watch?v=one"),
            ("Second", "https://youtu.be/two"),
        ] {
            let (status, body) = send(
                &app,
                json_request(
                    "POST",
                    "/api/lives",
                    serde_json::json!({ "title": title, "url": url }),
                    Some(&token),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["id"].as_str().unwrap().to_string());
        }

        let (status, _) = send(
            &app,
            Request::delete(format!("/api/lives/{}", ids[0]))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Request::get("/api/lives?isLive=true").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let lives = body.as_array().unwrap();
        assert_eq!(lives.len(), 1);
        assert_eq!(lives[0]["id"], ids[1].as_str());
        assert_eq!(lives[0]["url"], "https://www.youtube.com/embed/two");
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let app = build_router(
            Arc::new(InMemoryRepository::new()),
            Arc::new(TokenStore::default()),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/lives")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
