use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{auth, error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/check_auth", get(check_auth))
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Response, AppError> {
    let user = match auth::register_user(&state, &body.username, &body.password).await {
        Ok(user) => user,
        Err(AppError::BadRequest(msg)) => return Ok(message(StatusCode::BAD_REQUEST, msg)),
        Err(err) => return Err(err),
    };

    let (jar, authorized) =
        auth::authenticate(&state, state.cookies.jar(), &user.username, &body.password).await;
    if authorized {
        Ok((jar, message(StatusCode::OK, "Signup successful")).into_response())
    } else {
        Ok(message(StatusCode::UNAUTHORIZED, "Signup failed"))
    }
}

async fn login(State(state): State<AppState>, Json(body): Json<Credentials>) -> Response {
    let (jar, authorized) =
        auth::authenticate(&state, state.cookies.jar(), &body.username, &body.password).await;
    if authorized {
        (jar, message(StatusCode::OK, "Login successful")).into_response()
    } else {
        message(StatusCode::UNAUTHORIZED, "Login failed")
    }
}

// Logout always succeeds from the client's point of view.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (jar, revoked) = auth::deauthenticate(&state, &headers, state.cookies.jar()).await;
    if !revoked {
        debug!("logout did not revoke a stored session");
    }
    (jar, message(StatusCode::OK, "Logout successful")).into_response()
}

async fn check_auth(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match auth::validate(&state, &headers, state.cookies.jar()).await {
        Ok((jar, check)) => (
            jar,
            Json(json!({ "authorized": check.is_authorized() })),
        )
            .into_response(),
        Err(err) => {
            debug!(error = %err, "check_auth rejected");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "authorized": false })),
            )
                .into_response()
        }
    }
}
