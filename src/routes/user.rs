use axum::{middleware, routing::get, Json, Router};

use crate::{
    auth::{self, AuthenticatedUser, CurrentUser},
    error::AppError,
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, auth::require_session))
}

async fn me(current: CurrentUser) -> Result<Json<AuthenticatedUser>, AppError> {
    let user = current.require_user()?;
    Ok(Json(user.clone()))
}
