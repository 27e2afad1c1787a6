use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::state::AppState;
use crate::{auth, expenses};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .nest("/expense", expenses::router(state.clone()))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "3000".into())
    )
        .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fake::{fakes, Fakes};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register_and_login(app: &Router, username: &str, email: &str) -> String {
        let (status, _) = call(
            app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": username, "email": email, "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": username, "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    fn reset_token_from(text: &str) -> String {
        text.split("/reset-password/")
            .nth(1)
            .unwrap()
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect()
    }

    #[tokio::test]
    async fn health() {
        let app = build_app(fakes().state);
        let res = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_login_add_expense_flow() {
        let Fakes { state, users, .. } = fakes();
        let app = build_app(state.clone());

        let (status, body) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "alice1", "email": "a@b.com", "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["user"]["username"], "alice1");
        assert!(body["user"].get("password_hash").is_none());

        let stored = users.all();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0].password_hash, "Passw0rd");

        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice1", "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert!(body["user"].get("password_hash").is_none());
        let token = body["token"].as_str().unwrap().to_string();
        let claims = state.jwt.verify(&token).unwrap();
        assert_eq!(claims.sub, stored[0].id);

        let (status, body) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&token),
            Some(json!({
                "total": 12.5,
                "datespent": "2024-03-05",
                "items": [{ "itemName": "coffee", "amount": 4.5 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["total"], 12.5);
        assert_eq!(body["user_id"], stored[0].id.to_string());
        assert_eq!(body["items"], json!([{ "itemName": "coffee", "amount": 4.5 }]));
        assert_eq!(body["additionaldetails"], "");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let Fakes { state, users, .. } = fakes();
        let app = build_app(state);
        register_and_login(&app, "alice1", "a@b.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "other1", "email": "A@B.com", "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");

        let (status, body) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "alice1", "email": "new@b.com", "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Username already taken");
        assert_eq!(users.all().len(), 1);
    }

    #[tokio::test]
    async fn registration_validation_messages() {
        let app = build_app(fakes().state);
        let (status, body) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "al", "email": "a@b.com", "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Invalid username format. Username must be alphanumeric and between 3 and 20 characters"
        );

        let (status, body) = call(&app, Method::POST, "/register", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "All required fields must be filled");

        let (status, body) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": null, "email": "a@b.com", "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "All required fields must be filled");

        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice1", "password": null })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please input username and password");
    }

    #[tokio::test]
    async fn login_failures() {
        let app = build_app(fakes().state);
        register_and_login(&app, "alice1", "a@b.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please input username and password");

        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "nobody", "password": "Passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice1", "password": "Wrong0ne" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn expense_routes_require_a_valid_token() {
        let app = build_app(fakes().state);

        let (status, body) = call(&app, Method::GET, "/expense/get-expenses", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");

        let (status, _) = call(
            &app,
            Method::GET,
            "/expense/get-expenses",
            Some("not.a.jwt"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            None,
            Some(json!({ "total": 1, "datespent": "2024-01-01", "items": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn add_expense_validation() {
        let app = build_app(fakes().state);
        let token = register_and_login(&app, "alice1", "a@b.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&token),
            Some(json!({ "total": 5, "datespent": "2024-03-05", "items": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Items must be an array and must not be empty");

        let (status, body) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&token),
            Some(json!({
                "total": 5,
                "datespent": "2024-03-05",
                "items": [{ "itemName": "tea", "amount": -1 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Items must have a valid name and amount");

        let (status, body) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&token),
            Some(json!({
                "total": 5,
                "datespent": "2024-03-05",
                "items": "tea"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Items must be an array and must not be empty");

        let (status, body) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&token),
            Some(json!({
                "total": 5,
                "datespent": "2024-03-05",
                "items": [{ "itemName": "tea", "amount": 5 }],
                "additionaldetails": 42
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Additional details must be written in text");
    }

    #[tokio::test]
    async fn add_expense_accepts_local_datetime() {
        let app = build_app(fakes().state);
        let token = register_and_login(&app, "alice1", "a@b.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&token),
            Some(json!({
                "total": 5,
                "datespent": "2024-03-05T10:00:00",
                "items": [{ "itemName": "tea", "amount": 5 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["datespent"], "2024-03-05T10:00:00Z");
    }

    #[tokio::test]
    async fn list_filters_by_month_and_sorts_descending() {
        let app = build_app(fakes().state);
        let token = register_and_login(&app, "alice1", "a@b.com").await;
        let other = register_and_login(&app, "bob22", "bob@b.com").await;

        for date in ["2024-02-29", "2024-03-01", "2024-03-31T23:30:00Z", "2024-03-15", "2024-04-01"] {
            let (status, _) = call(
                &app,
                Method::POST,
                "/expense/add-expense",
                Some(&token),
                Some(json!({
                    "total": 1,
                    "datespent": date,
                    "items": [{ "itemName": "x", "amount": 1 }]
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&other),
            Some(json!({
                "total": 9,
                "datespent": "2024-03-10",
                "items": [{ "itemName": "y", "amount": 9 }]
            })),
        )
        .await;

        let (status, body) = call(
            &app,
            Method::GET,
            "/expense/get-expenses?month=3&year=2024",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let dates: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["datespent"].as_str().unwrap())
            .collect();
        assert_eq!(
            dates,
            vec!["2024-03-31T23:30:00Z", "2024-03-15T00:00:00Z", "2024-03-01T00:00:00Z"]
        );

        let (status, body) =
            call(&app, Method::GET, "/expense/get-expenses", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (status, body) = call(
            &app,
            Method::GET,
            "/expense/get-expenses?month=13&year=2024",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid month or year");
    }

    #[tokio::test]
    async fn get_expense_by_id() {
        let app = build_app(fakes().state);
        let token = register_and_login(&app, "alice1", "a@b.com").await;
        let other = register_and_login(&app, "bob22", "bob@b.com").await;

        let (_, created) = call(
            &app,
            Method::POST,
            "/expense/add-expense",
            Some(&token),
            Some(json!({
                "total": 3,
                "datespent": "2024-03-05",
                "items": [{ "itemName": "bread", "amount": 3 }],
                "additionaldetails": "bakery"
            })),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/expense/get-expense/{}", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["additionaldetails"], "bakery");

        let (status, body) = call(
            &app,
            Method::GET,
            "/expense/get-expense/not-a-uuid",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid expense ID");

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/expense/get-expense/{}", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Expense not found");

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/expense/get-expense/{}", id),
            Some(&other),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let Fakes { state, users, mailer } = fakes();
        let app = build_app(state);
        register_and_login(&app, "alice1", "a@b.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/reset-password",
            None,
            Some(json!({ "email": "nobody@b.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let (status, body) = call(
            &app,
            Method::POST,
            "/reset-password",
            None,
            Some(json!({ "email": "a@b.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Password reset link sent to your email");

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        let token = reset_token_from(&sent[0].text);
        assert_eq!(token.len(), 64);
        assert!(users.all()[0].reset_token_expires_at.is_some());

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/reset-password/{}", token),
            None,
            Some(json!({ "newPassword": "weak" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Password must be"));

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/reset-password/{}", token),
            None,
            Some(json!({ "newPassword": "N3wPassword" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stored = &users.all()[0];
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_token_expires_at.is_none());

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/reset-password/{}", token),
            None,
            Some(json!({ "newPassword": "An0therOne" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Invalid or expired token");

        let (status, _) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice1", "password": "N3wPassword" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let Fakes { state, users, .. } = fakes();
        let app = build_app(state);
        register_and_login(&app, "alice1", "a@b.com").await;
        let user_id = users.all()[0].id;

        use crate::auth::repo::UserRepo;
        let past = time::OffsetDateTime::now_utc() - time::Duration::minutes(1);
        users.set_reset_token(user_id, "abc123", past).await.unwrap();

        let (status, body) = call(
            &app,
            Method::POST,
            "/reset-password/abc123",
            None,
            Some(json!({ "newPassword": "N3wPassword" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Invalid or expired token");
    }
}
