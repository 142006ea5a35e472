pub mod public;
pub mod user;

use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api = public::router().merge(user::router(state.clone()));
    Router::new().nest("/api", api).with_state(state)
}
