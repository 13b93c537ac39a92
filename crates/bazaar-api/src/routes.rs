use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{conversations, listings, messages, notifications};

pub fn build(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::get_messages).post(messages::post_conversation_message),
        )
        .route("/messages", post(messages::send_message))
        .route("/notifications", get(notifications::get_notifications))
        .route(
            "/notifications/{notification_id}/read",
            put(notifications::mark_notification_read),
        )
        .route("/listings/{listing_id}", get(listings::get_listing))
        .route("/services/{service_id}", get(listings::get_service))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::auth::{AppStateInner, issue_token};
    use bazaar_db::Database;

    use super::*;

    const SECRET: &str = "router-test-secret";

    struct Harness {
        app: Router,
        state: AppState,
        tokens: Vec<String>,
        ids: Vec<i64>,
    }

    fn harness(names: &[&str]) -> Harness {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        let mut tokens = Vec::new();
        for name in names {
            let id = db.create_user(name, "hash").unwrap();
            tokens.push(issue_token(SECRET, id, name).unwrap());
            ids.push(id);
        }
        let state = AppStateInner::new(db, SECRET);
        Harness {
            app: build(state.clone()),
            state,
            tokens,
            ids,
        }
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let h = harness(&["alice"]);

        let (status, _) = call(&h.app, Method::GET, "/notifications", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&h.app, Method::GET, "/notifications", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let forged = issue_token("someone-else", h.ids[0], "alice").unwrap();
        let (status, _) = call(&h.app, Method::GET, "/conversations", Some(&forged), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&h.app, Method::GET, "/notifications", Some(&h.tokens[0]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn conversation_creation_statuses() {
        let h = harness(&["alice", "bob"]);
        let (alice, bob) = (&h.tokens[0], &h.tokens[1]);

        let (status, body) = call(
            &h.app,
            Method::POST,
            "/conversations",
            Some(alice),
            Some(json!({ "other_user_id": h.ids[1] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_i64().unwrap();

        let (status, body) = call(
            &h.app,
            Method::POST,
            "/conversations",
            Some(bob),
            Some(json!({ "other_user_id": h.ids[0] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"].as_i64(), Some(id));

        let (status, body) = call(&h.app, Method::POST, "/conversations", Some(alice), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "other_user_id is required");

        let (status, _) = call(
            &h.app,
            Method::POST,
            "/conversations",
            Some(alice),
            Some(json!({ "other_user_id": h.ids[0] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &h.app,
            Method::POST,
            "/conversations",
            Some(alice),
            Some(json!({ "other_user_id": 9999 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn message_flow_over_http() {
        let h = harness(&["alice", "bob", "mallory"]);
        let (status, body) = call(
            &h.app,
            Method::POST,
            "/conversations",
            Some(&h.tokens[0]),
            Some(json!({ "other_user_id": h.ids[1] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let conv = body["id"].as_i64().unwrap();

        let send = |token: &str, content: &str, conversation_id: i64| {
            let token = token.to_string();
            let body = json!({ "conversation_id": conversation_id, "content": content });
            let app = h.app.clone();
            async move { call(&app, Method::POST, "/messages", Some(&token), Some(body)).await }
        };

        let (status, _) = send(&h.tokens[0], "   ", conv).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&h.tokens[0], "hello", conv + 1).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&h.tokens[2], "hello", conv).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&h.tokens[0], "hello bob", conv).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].as_i64().is_some());
        assert!(body.get("warning").is_none());

        let uri = format!("/conversations/{}/messages", conv);
        let (status, _) = call(
            &h.app,
            Method::POST,
            &uri,
            Some(&h.tokens[1]),
            Some(json!({ "content": "hi alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&h.app, Method::GET, &uri, Some(&h.tokens[1]), None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "hello bob");
        assert_eq!(messages[0]["sender_username"], "alice");
        assert_eq!(messages[1]["content"], "hi alice");

        let (status, _) = call(&h.app, Method::GET, &uri, Some(&h.tokens[2]), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&h.app, Method::GET, "/conversations", Some(&h.tokens[0]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["other_username"], "bob");
        assert_eq!(body[0]["last_message"], "hi alice");
    }

    #[tokio::test]
    async fn inbox_and_read_transition_over_http() {
        let h = harness(&["alice", "bob"]);
        let conv = h.state.db.find_or_create_conversation(h.ids[0], h.ids[1]).unwrap().0.id;
        let (status, _) = call(
            &h.app,
            Method::POST,
            "/messages",
            Some(&h.tokens[0]),
            Some(json!({ "conversation_id": conv, "content": "ping" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, inbox) = call(&h.app, Method::GET, "/notifications", Some(&h.tokens[1]), None).await;
        assert_eq!(inbox.as_array().unwrap().len(), 1);
        assert_eq!(inbox[0]["type"], "new_message");
        assert_eq!(inbox[0]["is_read"], false);
        assert_eq!(inbox[0]["additional_data"]["conversation_id"], conv);
        let id = inbox[0]["id"].as_i64().unwrap();
        let read_uri = format!("/notifications/{}/read", id);

        // Alice cannot read Bob's notification, but gets no hint either.
        let (status, body) = call(&h.app, Method::PUT, &read_uri, Some(&h.tokens[0]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
        let (_, inbox) = call(&h.app, Method::GET, "/notifications", Some(&h.tokens[1]), None).await;
        assert_eq!(inbox[0]["is_read"], false);

        for _ in 0..2 {
            let (status, body) = call(&h.app, Method::PUT, &read_uri, Some(&h.tokens[1]), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "success": true }));
        }
        let (_, inbox) = call(&h.app, Method::GET, "/notifications", Some(&h.tokens[1]), None).await;
        assert_eq!(inbox[0]["is_read"], true);
    }

    #[tokio::test]
    async fn listing_views_notify_owner_only_for_other_viewers() {
        let h = harness(&["owner", "visitor"]);
        let ad = h.state.db.create_listing(h.ids[0], "ad", "Desk", "Oak", Some(40.0)).unwrap();
        let uri = format!("/listings/{}", ad);

        let (status, body) = call(&h.app, Method::GET, &uri, Some(&h.tokens[0]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Desk");

        let (status, _) = call(&h.app, Method::GET, &uri, Some(&h.tokens[1]), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, inbox) = call(&h.app, Method::GET, "/notifications", Some(&h.tokens[0]), None).await;
        assert_eq!(inbox.as_array().unwrap().len(), 1);
        assert_eq!(inbox[0]["type"], "ad_view");
        assert_eq!(inbox[0]["related_id"], ad);

        let (status, _) = call(&h.app, Method::GET, &format!("/services/{}", ad), Some(&h.tokens[1]), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&h.app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listing_view_reports_failed_notification() {
        let h = harness(&["owner", "visitor"]);
        let ad = h.state.db.create_listing(h.ids[0], "ad", "Bike", "", None).unwrap();
        h.state
            .db
            .with_conn(|conn| Ok(conn.execute_batch("DROP TABLE notifications")?))
            .unwrap();

        let uri = format!("/listings/{}", ad);
        let (status, body) = call(&h.app, Method::GET, &uri, Some(&h.tokens[1]), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Bike");
        assert_eq!(body["warning"], crate::fanout::DELIVERY_WARNING);
    }

    #[tokio::test]
    async fn register_then_login() {
        let h = harness(&[]);
        let creds = json!({ "username": "carol", "password": "correct horse" });

        let (status, body) = call(&h.app, Method::POST, "/auth/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, _) = call(&h.app, Method::GET, "/notifications", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&h.app, Method::POST, "/auth/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(&h.app, Method::POST, "/auth/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "carol");

        let wrong = json!({ "username": "carol", "password": "battery staple" });
        let (status, _) = call(&h.app, Method::POST, "/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let short = json!({ "username": "dave", "password": "short" });
        let (status, _) = call(&h.app, Method::POST, "/auth/register", None, Some(short)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
