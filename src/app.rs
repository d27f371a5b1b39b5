use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::{accounts, auth};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(accounts::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(config: &AppConfig, app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::basic;
    use axum::{
        body::Body,
        http::{header::AUTHORIZATION, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<String>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            req = req.header(AUTHORIZATION, auth);
        }
        let res = app
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    async fn login_token(app: &Router, username: &str, password: &str) -> String {
        let auth = Some(basic::encode(username, password));
        let (status, body) = call(app, Method::POST, "/login", auth).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn register_login_profile_delete_flow() {
        let app = build_app(AppState::fake());

        let auth = Some(basic::encode("alice", "p@ss:word"));
        let (status, user) = call(&app, Method::POST, "/register", auth).await;
        assert_eq!(status, StatusCode::OK, "{user}");
        assert_eq!(user["username"], "alice");
        let id = user["id"].as_str().unwrap().to_owned();
        assert!(user["dateJoined"].as_str().unwrap().ends_with('Z'));

        let token = login_token(&app, "alice", "p@ss:word").await;

        let bearer = format!("Bearer {token}");
        let (status, me) = call(&app, Method::GET, "/user", Some(bearer.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], id);

        let (status, public) = call(&app, Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(public["username"], "alice");

        let (status, exists) = call(&app, Method::GET, "/exists?username=alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exists["user_exists"], true);

        let (status, _) = call(&app, Method::DELETE, "/user", Some(bearer.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, exists) = call(&app, Method::GET, "/exists?username=alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exists["user_exists"], false);

        // Token still verifies but its account is gone.
        let (status, _) = call(&app, Method::GET, "/user", Some(bearer)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let app = build_app(AppState::fake());
        let first = Some(basic::encode("bob", "pw"));
        let (status, _) = call(&app, Method::POST, "/register", first).await;
        assert_eq!(status, StatusCode::OK);
        let second = Some(basic::encode("bob", "other"));
        let (status, body) = call(&app, Method::POST, "/register", second).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "username taken");
    }

    #[tokio::test]
    async fn malformed_basic_header_is_generic_bad_request() {
        let app = build_app(AppState::fake());
        for auth in [None, Some("Bearer abc".to_string()), Some("Basic ***".to_string())] {
            let (status, body) = call(&app, Method::POST, "/register", auth).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "bad request");
        }
    }

    #[tokio::test]
    async fn bad_login_does_not_reveal_which_part_failed() {
        let app = build_app(AppState::fake());
        let auth = Some(basic::encode("carol", "right"));
        call(&app, Method::POST, "/register", auth).await;

        let wrong = Some(basic::encode("carol", "wrong"));
        let wrong = call(&app, Method::POST, "/login", wrong).await;
        let unknown = Some(basic::encode("nobody", "right"));
        let unknown = call(&app, Method::POST, "/login", unknown).await;
        assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn bearer_failures_are_uniform_unauthorized() {
        let app = build_app(AppState::fake());
        for auth in [
            None,
            Some("Bearer".to_string()),
            Some("Token abc".to_string()),
            Some("Bearer not.a.token".to_string()),
        ] {
            let (status, body) = call(&app, Method::GET, "/user", auth).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "unauthorized");
        }
    }

    #[tokio::test]
    async fn unknown_or_invalid_user_id_is_not_found() {
        let app = build_app(AppState::fake());
        let uri = format!("/users/{}", uuid::Uuid::new_v4());
        let (status, _) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::GET, "/users/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exists_requires_username_query() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/exists", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no username query");
        let (status, _) = call(&app, Method::GET, "/exists?username=", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
