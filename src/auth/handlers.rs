use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            is_valid_email, normalize_email, ChangePasswordRequest, ForgotPasswordRequest,
            LoginForm, MessageResponse, PublicUser, RegisterRequest, TokenResponse,
        },
        extractors::AuthUser,
        password::hash_password,
        repo_types::NewUser,
    },
    db::RepoError,
    error::{AppError, AppForm, AppJson, AppResult},
    state::AppState,
};

const RESET_REQUESTED: &str = "If the account exists, a password reset link has been sent";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/change-password", post(change_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> AppResult<Json<PublicUser>> {
    payload.email = normalize_email(&payload.email);
    payload.validate().map_err(AppError::Validation)?;

    if state.users.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::EmailAlreadyRegistered);
    }

    let hash = hash_password(&payload.password)?;
    let created = state
        .users
        .create(NewUser {
            email: &payload.email,
            username: payload.username.trim(),
            password_hash: &hash,
        })
        .await;

    let user = match created {
        Ok(u) => u,
        // Lost a race with a concurrent registration.
        Err(RepoError::UniqueViolation(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err(AppError::EmailAlreadyRegistered);
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(user.into()))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    AppForm(form): AppForm<LoginForm>,
) -> AppResult<Json<TokenResponse>> {
    let email = normalize_email(&form.username);
    let user = state.credentials.authenticate(&email, &form.password).await?;
    let access_token = state.credentials.issue_access_token(&user)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.credentials.keys().access_ttl().as_secs(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::field("email", "must be a valid email address"));
    }

    match state.users.find_by_email(&email).await? {
        Some(user) if user.is_active => {
            let token = state.credentials.issue_password_reset_token(&user).await?;
            // Delivery failures stay server-side so the response does not
            // reveal that the account exists.
            if let Err(e) = state.notifier.send_reset_token(&user, &token).await {
                error!(error = %e, user_id = %user.id, "reset token delivery failed");
            }
        }
        _ => info!("password reset requested for unknown or inactive account"),
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED,
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    if payload.new_password.is_empty() {
        return Err(AppError::field("new_password", "must not be empty"));
    }
    state
        .credentials
        .redeem_password_reset_token(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token for missing user");
        AppError::InvalidToken
    })?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
        let res = build_app(state.clone()).oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn register(email: &str, username: &str, password: &str) -> Request<Body> {
        post_json(
            "/register",
            json!({ "email": email, "username": username, "password": password }),
        )
    }

    #[tokio::test]
    async fn register_login_change_password_scenario() {
        let state = AppState::fake();

        let (status, body) = send(&state, register("a@x.com", "a", "pw1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "a@x.com");
        assert_eq!(body["username"], "a");
        assert!(body.get("password_hash").is_none());

        let (status, body) = send(&state, register("a@x.com", "other", "pw2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Email already registered");

        let (status, body) = send(&state, post_form("/token", "username=a%40x.com&password=pw1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
        assert_eq!(body["token_type"], "bearer");

        let (status, body) = send(&state, post_form("/token", "username=a%40x.com&password=wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Incorrect email or password");

        let (status, body) = send(
            &state,
            post_json("/change-password", json!({ "token": "bogus", "new_password": "z" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid or expired reset token");
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let state = AppState::fake();
        let (status, _) = send(&state, register("Case@X.com", "c", "pw")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, register("case@x.COM", "c2", "pw")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, post_form("/token", "username=CASE%40x.com&password=pw")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let state = AppState::fake();
        send(&state, register("a@x.com", "a", "pw1")).await;

        let wrong_pw = send(&state, post_form("/token", "username=a%40x.com&password=nope")).await;
        let unknown = send(&state, post_form("/token", "username=b%40x.com&password=pw1")).await;
        assert_eq!(wrong_pw, unknown);
        assert_eq!(unknown.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_rejects_malformed_input() {
        let state = AppState::fake();
        let (status, body) = send(&state, register("not-an-email", "a", "pw")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["field"], "email");

        let (status, _) = send(&state, post_json("/register", json!({ "email": "a@x.com" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn forgot_then_change_password() {
        let state = AppState::fake();
        send(&state, register("a@x.com", "a", "pw1")).await;

        let (status, known) = send(&state, post_json("/forgot-password", json!({ "email": "a@x.com" }))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, unknown) = send(&state, post_json("/forgot-password", json!({ "email": "z@x.com" }))).await;
        assert_eq!(known, unknown);

        let token = state.test_notifier().last_token().expect("token delivered");

        let change = json!({ "token": token, "new_password": "pw2" });
        let (status, _) = send(&state, post_json("/change-password", change.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&state, post_form("/token", "username=a%40x.com&password=pw2")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, post_form("/token", "username=a%40x.com&password=pw1")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&state, post_json("/change-password", change)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid or expired reset token");
    }

    #[tokio::test]
    async fn me_requires_a_valid_token() {
        let state = AppState::fake();
        send(&state, register("a@x.com", "a", "pw1")).await;
        let (_, body) = send(&state, post_form("/token", "username=a%40x.com&password=pw1")).await;
        let token = body["access_token"].as_str().expect("token").to_string();

        let req = Request::get("/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "a@x.com");

        let (status, _) = send(&state, Request::get("/me").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::get("/me")
            .header(header::AUTHORIZATION, "Bearer garbage")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid or expired token");
    }
}
