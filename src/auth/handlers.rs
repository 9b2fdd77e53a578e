use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};

use crate::{
    api::ok,
    auth::{
        auth::bearer_token,
        jwt::{generate_access_token, generate_refresh_token, verify_token_of_type},
        password::{PasswordError, verify_password},
    },
    config::Config,
    error::AppError,
    model::user::User,
    models::{LoginReqDto, TokenPair, TokenType},
    state::AppState,
    store::UserStore,
};

/// Issues an access/refresh pair and records the refresh `jti`.
async fn issue_tokens(state: &AppState, config: &Config, user: &User) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(
        user.id,
        &user.username,
        user.role.id(),
        &config.jwt_secret,
        config.access_token_ttl,
    )?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user.id,
        &user.username,
        user.role.id(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    let expires_at = Utc::now() + Duration::seconds(config.refresh_token_ttl as i64);
    state
        .store
        .store_refresh_token(user.id, &refresh_claims.jti, expires_at)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Login
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = Object, example = json!({
            "success": true,
            "data": { "access_token": "eyJ...", "refresh_token": "eyJ..." }
        })),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(state, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::BadRequest("Username or password required".to_string()));
    }

    let db_user = state
        .store
        .find_user_by_username(user.username.trim())
        .await?
        .ok_or_else(|| {
            info!("Invalid credentials: user not found");
            AppError::Unauthorized("Invalid credentials")
        })?;

    match verify_password(&user.password, &db_user.password) {
        Ok(()) => debug!("Password verified"),
        Err(PasswordError::Mismatch) => {
            info!("Invalid credentials: password mismatch");
            return Err(AppError::Unauthorized("Invalid credentials"));
        }
        Err(e) => return Err(e.into()),
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return Err(AppError::Forbidden("Account is disabled"));
    }

    let pair = issue_tokens(&state, &config, &db_user).await?;

    if let Err(e) = state.store.touch_last_login(db_user.id).await {
        // intentionally not failing login
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(ok(pair))
}

/// Rotate refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair; the presented refresh token is spent"),
        (status = 401, description = "Missing, invalid, expired or already used refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;

    let claims = verify_token_of_type(token, &config.jwt_secret, TokenType::Refresh)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token"))?;

    // spending the old token first makes a replayed token fail here
    let user_id = state
        .store
        .revoke_refresh_token(&claims.jti)
        .await?
        .ok_or(AppError::Unauthorized("Refresh token already used"))?;

    let user = state
        .store
        .get_user(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized("Account is disabled"))?;

    let pair = issue_tokens(&state, &config, &user).await?;
    debug!(user_id, "Refresh token rotated");
    Ok(ok(pair))
}

/// Logout
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Refresh token revoked (or was never valid)")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Ok(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    // only refresh tokens can logout
    let Ok(claims) = verify_token_of_type(token, &config.jwt_secret, TokenType::Refresh) else {
        return HttpResponse::NoContent().finish();
    };

    // idempotent
    if let Err(e) = state.store.revoke_refresh_token(&claims.jti).await {
        warn!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use actix_web::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::{PASSWORD, fixture, send, test_app};

    #[actix_web::test]
    async fn login_then_rotate_refresh_token_once() {
        let fx = fixture().await;
        let app = test_app!(fx);

        let (status, _) = send!(
            app,
            fx.request(Method::POST, "/auth/login", None)
                .set_json(json!({ "username": "supervisor", "password": "wrong-password" }))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send!(
            app,
            fx.request(Method::POST, "/auth/login", None)
                .set_json(json!({ "username": "Supervisor", "password": PASSWORD }))
        );
        assert_eq!(status, StatusCode::OK);
        let access = body["data"]["access_token"].as_str().unwrap().to_string();
        let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

        let (status, _) = send!(
            app,
            fx.request(Method::GET, "/api/users/me", None)
                .insert_header(("Authorization", format!("Bearer {access}")))
        );
        assert_eq!(status, StatusCode::OK);

        // refresh tokens are not access tokens
        let (status, _) = send!(
            app,
            fx.request(Method::GET, "/api/users/me", None)
                .insert_header(("Authorization", format!("Bearer {refresh}")))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send!(
            app,
            fx.request(Method::POST, "/auth/refresh", None)
                .insert_header(("Authorization", format!("Bearer {refresh}")))
        );
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["refresh_token"].is_string());

        let (status, body) = send!(
            app,
            fx.request(Method::POST, "/auth/refresh", None)
                .insert_header(("Authorization", format!("Bearer {refresh}")))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Refresh token already used");
    }

    #[actix_web::test]
    async fn logout_spends_the_refresh_token() {
        let fx = fixture().await;
        let app = test_app!(fx);

        let (_, body) = send!(
            app,
            fx.request(Method::POST, "/auth/login", None)
                .set_json(json!({ "username": "ravi", "password": PASSWORD }))
        );
        let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

        let (status, _) = send!(
            app,
            fx.request(Method::POST, "/auth/logout", None)
                .insert_header(("Authorization", format!("Bearer {refresh}")))
        );
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send!(
            app,
            fx.request(Method::POST, "/auth/refresh", None)
                .insert_header(("Authorization", format!("Bearer {refresh}")))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn health_is_public() {
        let fx = fixture().await;
        let app = test_app!(fx);

        let (status, body) = send!(app, fx.request(Method::GET, "/health", None));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
    }
}
