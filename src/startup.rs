use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    response::Html,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    auth,
    handlers,
    middleware::{metrics_middleware, request_id_middleware},
    models::{user_input::normalize_email, NewUser, Role, UserPatch},
    openapi::ApiDoc,
    store::{Store, UserStore},
    AppResult,
};

pub fn build_router(state: Arc<crate::AppState>) -> Router {
    // CORS configuration; the origin is validated when the config is loaded
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(HeaderValue::from_str(&state.config.cors_origin).ok()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true);

    // Auth routes
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth_handler::register))
        .route("/login", post(handlers::auth_handler::login))
        .route("/me", get(handlers::auth_handler::get_me))
        .route("/otp/request", post(handlers::auth_handler::request_otp))
        .route("/otp/verify", post(handlers::auth_handler::verify_otp))
        .route("/password/reset", post(handlers::auth_handler::reset_password));

    // Pharmacy and stock routes - /mine is static so it wins over /{id}
    let pharmacy_routes = Router::new()
        .route("/mine", get(handlers::pharmacies_handler::get_my_pharmacies))
        .route(
            "/{id}",
            get(handlers::pharmacies_handler::get_pharmacy).put(handlers::pharmacies_handler::update_pharmacy),
        )
        .route(
            "/{id}/stock",
            post(handlers::pharmacies_handler::add_stock_entry).put(handlers::pharmacies_handler::replace_stock),
        )
        .route(
            "/{id}/stock/{index}",
            put(handlers::pharmacies_handler::update_stock_entry)
                .delete(handlers::pharmacies_handler::remove_stock_entry),
        )
        .route("/{id}/low-stock", get(handlers::pharmacies_handler::get_low_stock));

    // Admin routes
    let admin_routes = Router::new()
        .route("/users", get(handlers::admin_handler::list_users))
        .route(
            "/users/{id}",
            get(handlers::admin_handler::get_user)
                .put(handlers::admin_handler::update_user)
                .delete(handlers::admin_handler::delete_user),
        )
        .route("/users/{id}/status", put(handlers::admin_handler::set_user_status))
        .route("/pharmacies", get(handlers::admin_handler::list_pharmacies))
        .route(
            "/pharmacies/{id}",
            get(handlers::admin_handler::get_pharmacy).delete(handlers::admin_handler::delete_pharmacy),
        )
        .route("/stats", get(handlers::admin_handler::get_stats));

    // Chat routes
    let chat_routes = Router::new()
        .route(
            "/messages",
            get(handlers::chat_handler::get_my_messages).post(handlers::chat_handler::post_message),
        )
        .route("/conversations", get(handlers::chat_handler::list_conversations))
        .route(
            "/conversations/{patientId}",
            get(handlers::chat_handler::get_conversation).post(handlers::chat_handler::reply),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/search", get(handlers::search_handler::search_pharmacies))
        .nest("/api/auth", auth_routes)
        .nest("/api/pharmacies", pharmacy_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/chat", chat_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/swagger-ui", get(swagger_ui))
        .route_layer(from_fn(metrics_middleware))
        .layer(
            // Outermost first: the request id is recorded into the trace span
            ServiceBuilder::new()
                .layer(cors)
                .map_response(|response: axum::response::Response<_>| response.map(Body::new))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                    )
                }))
                .layer(from_fn(request_id_middleware)),
        )
        .with_state(state)
}

/// Creates the configured admin account, or re-activates it with the configured password.
pub async fn seed_admin(store: &dyn Store, email: &str, password: &str) -> AppResult<()> {
    let email = normalize_email(email)?;
    let password_hash = auth::hash_password(password).await?;

    match store.find_user_by_email(&email).await? {
        Some(existing) if existing.role == Role::Admin => {
            store
                .update_user(
                    existing.id,
                    UserPatch {
                        is_active: Some(true),
                        password_hash: Some(password_hash),
                        ..Default::default()
                    },
                )
                .await?;
            tracing::info!(user_id = %existing.id, "Admin account refreshed");
        }
        Some(existing) => {
            tracing::warn!(user_id = %existing.id, role = %existing.role, "ADMIN_EMAIL belongs to a non-admin account; not seeding");
        }
        None => {
            let (admin, _) = store
                .create_user(
                    NewUser {
                        role: Role::Admin,
                        email,
                        password_hash,
                        full_name: "Administrator".to_string(),
                        phone: None,
                    },
                    None,
                )
                .await?;
            tracing::info!(user_id = %admin.id, "Admin account seeded");
        }
    }

    Ok(())
}

async fn swagger_ui() -> Html<&'static str> {
    Html(r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>MedFinder API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: '/api-docs/openapi.json',
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
    "#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{OtpCache, OtpDelivery};
    use crate::store::MemoryStore;
    use crate::{AppConfig, AppState, MetricsState};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    const ADMIN_EMAIL: &str = "admin@medfinder.test";
    const ADMIN_PASSWORD: &str = "admin password";

    /// Keeps issued codes so tests can complete the reset flow.
    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingDelivery {
        fn last_code_for(&self, email: &str) -> Option<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, code)| code.clone())
        }
    }

    #[async_trait]
    impl OtpDelivery for RecordingDelivery {
        async fn deliver(&self, email: &str, code: &str) -> AppResult<()> {
            self.sent.lock().unwrap().push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    struct TestApp {
        router: Router,
        delivery: Arc<RecordingDelivery>,
    }

    impl TestApp {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            seed_admin(store.as_ref(), ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

            let delivery = Arc::new(RecordingDelivery::default());
            let config = AppConfig::for_tests();
            let state = Arc::new(AppState {
                store,
                otp: OtpCache::new(config.otp_ttl_secs),
                otp_delivery: delivery.clone(),
                config,
                metrics: Arc::new(MetricsState::detached()),
            });

            TestApp {
                router: build_router(state),
                delivery,
            }
        }

        async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
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

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn login(&self, email: &str, password: &str, role: &str) -> String {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({"email": email, "password": password, "role": role})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "login failed: {}", body);
            body["token"].as_str().unwrap().to_string()
        }

        async fn register_patient(&self, email: &str) -> (String, String) {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "role": "patient",
                        "email": email,
                        "password": "patient password",
                        "fullName": "Kamala Silva"
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            let id = body["user"]["id"].as_str().unwrap().to_string();
            (id, self.login(email, "patient password", "patient").await)
        }

        /// Registers an owner with a storefront at (lat, lng); returns (pharmacy id, token).
        async fn register_owner(&self, email: &str, name: &str, lat: f64, lng: f64) -> (String, String) {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "role": "pharmacy",
                        "email": email,
                        "password": "owner password",
                        "fullName": "Owner",
                        "pharmacy": {"name": name, "address": "Main Street", "latitude": lat, "longitude": lng}
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            let pharmacy_id = body["pharmacy"]["id"].as_str().unwrap().to_string();
            (pharmacy_id, self.login(email, "owner password", "pharmacy").await)
        }
    }

    #[tokio::test]
    async fn health_reports_store_status() {
        let app = TestApp::new().await;
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "ok");
    }

    #[tokio::test]
    async fn request_id_is_echoed_or_generated() {
        let app = TestApp::new().await;

        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "trace-me-123")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "trace-me-123");

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        let generated = response.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }

    #[tokio::test]
    async fn openapi_document_lists_search() {
        let app = TestApp::new().await;
        let (status, body) = app.send(Method::GET, "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/search"].is_object());
    }

    #[tokio::test]
    async fn search_rejects_missing_coordinates() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(Method::GET, "/api/search?longitude=80.2973&medicineName=para", None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("latitude"));

        let (status, _) = app
            .send(Method::GET, "/api/search?latitude=abc&longitude=80.2973", None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn owner_stock_is_searchable_nearest_first() {
        let app = TestApp::new().await;
        let (near_id, near_token) = app.register_owner("near@example.com", "Near Pharmacy", 6.0830, 80.2975).await;
        let (far_id, far_token) = app.register_owner("far@example.com", "Far Pharmacy", 6.1000, 80.3000).await;

        for (id, token) in [(&near_id, &near_token), (&far_id, &far_token)] {
            let (status, _) = app
                .send(
                    Method::POST,
                    &format!("/api/pharmacies/{}/stock", id),
                    Some(token),
                    Some(json!({"medicineName": "Paracetamol 500mg", "price": 12.5, "quantity": 40})),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = app
            .send(
                Method::GET,
                "/api/search?latitude=6.0825&longitude=80.2973&medicineName=PARA",
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let results = body.as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["name"], "Near Pharmacy");
        assert_eq!(results[1]["name"], "Far Pharmacy");
        assert!(results[0]["distanceMeters"].as_f64().unwrap() <= results[1]["distanceMeters"].as_f64().unwrap());
        assert_eq!(results[0]["matches"][0]["medicineName"], "Paracetamol 500mg");

        // Nothing within a 100 m radius of a point far away
        let (status, body) = app
            .send(
                Method::GET,
                "/api/search?latitude=7.2906&longitude=80.6337&medicineName=para&maxDistance=100",
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn stock_edits_are_owner_only_and_index_checked() {
        let app = TestApp::new().await;
        let (pharmacy_id, owner) = app.register_owner("owner@example.com", "Fort Pharmacy", 6.03, 80.21).await;
        let (_, intruder) = app.register_owner("other@example.com", "Other Pharmacy", 6.04, 80.22).await;
        let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/pharmacies/{}/stock", pharmacy_id),
                Some(&owner),
                Some(json!({"entries": [
                    {"medicineName": "Amoxicillin", "price": 30, "quantity": 4},
                    {"medicineName": "Cetirizine", "price": 8, "quantity": 120, "isAvailable": false}
                ]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stock"].as_array().unwrap().len(), 2);

        let stock_uri = format!("/api/pharmacies/{}/stock", pharmacy_id);
        let entry = json!({"medicineName": "Aspirin", "price": 2});
        let (status, _) = app.send(Method::POST, &stock_uri, Some(&intruder), Some(entry.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.send(Method::POST, &stock_uri, Some(&admin), Some(entry.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.send(Method::POST, &stock_uri, None, Some(entry)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/pharmacies/{}/stock/1", pharmacy_id),
                Some(&owner),
                Some(json!({"isAvailable": true})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stock"][1]["isAvailable"], true);

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/pharmacies/{}/stock/5", pharmacy_id), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .send(Method::DELETE, &format!("/api/pharmacies/{}/stock/0", pharmacy_id), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stock"][0]["medicineName"], "Cetirizine");

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/api/pharmacies/{}/stock", pharmacy_id),
                Some(&owner),
                Some(json!({"medicineName": "Aspirin", "price": 2, "colour": "red"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    }

    #[tokio::test]
    async fn low_stock_uses_threshold_and_allows_admin() {
        let app = TestApp::new().await;
        let (pharmacy_id, owner) = app.register_owner("low@example.com", "Low Pharmacy", 6.03, 80.21).await;
        let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;

        app.send(
            Method::PUT,
            &format!("/api/pharmacies/{}/stock", pharmacy_id),
            Some(&owner),
            Some(json!({"entries": [
                {"medicineName": "A", "price": 1, "quantity": 3},
                {"medicineName": "B", "price": 1, "quantity": 50},
                {"medicineName": "C", "price": 1}
            ]})),
        )
        .await;

        let (status, body) = app
            .send(Method::GET, &format!("/api/pharmacies/{}/low-stock", pharmacy_id), Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threshold"], 10);
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/pharmacies/{}/low-stock?threshold=100", pharmacy_id),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn registration_rules() {
        let app = TestApp::new().await;

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"role": "admin", "email": "x@example.com", "password": "long enough", "fullName": "X"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"role": "pharmacy", "email": "y@example.com", "password": "long enough", "fullName": "Y"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"role": "patient", "email": "z@example.com", "password": "short", "fullName": "Z"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        app.register_patient("dup@example.com").await;
        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"role": "patient", "email": "DUP@example.com", "password": "long enough", "fullName": "D"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "dup@example.com", "password": "patient password", "role": "pharmacy"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_hides_password_hash() {
        let app = TestApp::new().await;
        let (_, token) = app.register_patient("me@example.com").await;
        let (status, body) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "me@example.com");
        assert!(body.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn admin_moderation() {
        let app = TestApp::new().await;
        let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;
        let (patient_id, patient) = app.register_patient("mod@example.com").await;
        let (pharmacy_id, _) = app.register_owner("shop@example.com", "Shop", 6.03, 80.21).await;

        let (status, _) = app.send(Method::GET, "/api/admin/users", Some(&patient), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(Method::GET, "/api/admin/users?role=patient", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = app.send(Method::GET, "/api/admin/stats", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patients"], 1);
        assert_eq!(body["pharmacyOwners"], 1);
        assert_eq!(body["admins"], 1);
        assert_eq!(body["pharmacies"], 1);

        // Deactivation takes effect on the next request, before the token expires
        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/admin/users/{}/status", patient_id),
                Some(&admin),
                Some(json!({"isActive": false})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isActive"], false);
        let (status, _) = app.send(Method::GET, "/api/auth/me", Some(&patient), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // A blank phone clears the stored number
        let user_uri = format!("/api/admin/users/{}", patient_id);
        let (status, body) = app
            .send(Method::PUT, &user_uri, Some(&admin), Some(json!({"phone": "0771234567"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "0771234567");
        let (status, body) = app
            .send(Method::PUT, &user_uri, Some(&admin), Some(json!({"phone": "  "})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["phone"].is_null());

        let (status, body) = app.send(Method::GET, "/api/auth/me", Some(&admin), None).await;
        let admin_id = body["id"].as_str().unwrap().to_string();
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .send(Method::DELETE, &format!("/api/admin/users/{}", admin_id), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/api/admin/users/{}/status", admin_id),
                Some(&admin),
                Some(json!({"isActive": false})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/admin/pharmacies/{}", pharmacy_id), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .send(Method::GET, &format!("/api/pharmacies/{}", pharmacy_id), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_an_owner_removes_their_pharmacy() {
        let app = TestApp::new().await;
        let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;
        let (pharmacy_id, owner) = app.register_owner("gone@example.com", "Gone", 6.03, 80.21).await;

        let (_, me) = app.send(Method::GET, "/api/auth/me", Some(&owner), None).await;
        let owner_id = me["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/admin/users/{}", owner_id), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(Method::GET, &format!("/api/pharmacies/{}", pharmacy_id), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.send(Method::GET, "/api/auth/me", Some(&owner), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn password_reset_via_otp() {
        let app = TestApp::new().await;
        app.register_patient("forgot@example.com").await;

        // Unknown accounts get the same answer and no code
        let (status, _) = app
            .send(Method::POST, "/api/auth/otp/request", None, Some(json!({"email": "nobody@example.com"})))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(app.delivery.last_code_for("nobody@example.com").is_none());

        let (status, _) = app
            .send(Method::POST, "/api/auth/otp/request", None, Some(json!({"email": "Forgot@Example.com"})))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let code = app.delivery.last_code_for("forgot@example.com").unwrap();

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/otp/verify",
                None,
                Some(json!({"email": "forgot@example.com", "code": code})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let reset_token = body["resetToken"].as_str().unwrap().to_string();

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/otp/verify",
                None,
                Some(json!({"email": "forgot@example.com", "code": code})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let reset = json!({"resetToken": reset_token, "newPassword": "brand new password"});
        let (status, _) = app
            .send(Method::POST, "/api/auth/password/reset", None, Some(reset.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        app.login("forgot@example.com", "brand new password", "patient").await;

        let (status, _) = app.send(Method::POST, "/api/auth/password/reset", None, Some(reset)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn repeated_wrong_codes_lock_the_reset_flow() {
        let app = TestApp::new().await;
        app.register_patient("guess@example.com").await;

        app.send(Method::POST, "/api/auth/otp/request", None, Some(json!({"email": "guess@example.com"})))
            .await;
        let code = app.delivery.last_code_for("guess@example.com").unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for _ in 0..5 {
            let (status, _) = app
                .send(
                    Method::POST,
                    "/api/auth/otp/verify",
                    None,
                    Some(json!({"email": "guess@example.com", "code": wrong})),
                )
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/otp/verify",
                None,
                Some(json!({"email": "guess@example.com", "code": code})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("resetToken").is_none());
    }

    #[tokio::test]
    async fn support_chat_round_trip() {
        let app = TestApp::new().await;
        let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;
        let (patient_id, patient) = app.register_patient("chat@example.com").await;

        let (status, _) = app
            .send(
                Method::POST,
                "/api/chat/messages",
                Some(&patient),
                Some(json!({"body": "Is insulin available in Galle?"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .send(Method::POST, "/api/chat/messages", Some(&patient), Some(json!({"body": "   "})))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = app.send(Method::GET, "/api/chat/conversations", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["patientId"], patient_id.as_str());
        assert_eq!(body[0]["messageCount"], 1);

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/chat/conversations/{}", patient_id),
                Some(&admin),
                Some(json!({"body": "Yes, try Fort Pharmacy."})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app.send(Method::GET, "/api/chat/messages", Some(&patient), None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["senderRole"], "patient");
        assert_eq!(messages[1]["senderRole"], "admin");

        let (status, _) = app.send(Method::GET, "/api/chat/conversations", Some(&patient), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
