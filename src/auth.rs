use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    error::{AppError, CookieError, StoreError},
    models::{
        session::{Session, SessionStatus},
        user::User,
    },
    password::{hash_password, verify_password},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "session-id";
pub const SESSION_DURATION_HOURS: i64 = 2;

const REVOKE_ATTEMPTS: u32 = 3;
const REVOKE_BACKOFF_MS: u64 = 50;

pub fn session_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(SESSION_DURATION_HOURS)
}

#[derive(Debug, Clone)]
pub enum SessionCheck {
    Authorized(Session),
    Unauthorized,
}

impl SessionCheck {
    pub fn is_authorized(&self) -> bool {
        matches!(self, SessionCheck::Authorized(_))
    }
}

pub async fn register_user(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username must not be empty".into()));
    }
    if password.is_empty() {
        return Err(AppError::BadRequest("password must not be empty".into()));
    }
    if find_user(state, username).await?.is_some() {
        return Err(username_taken());
    }

    let now = Utc::now();
    let mut user = User {
        user_id: 0,
        username: username.to_owned(),
        password_hash: hash_password(password)?,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    user.user_id = match state.store.create(&user).await {
        Ok(user_id) => user_id,
        Err(StoreError::Database(sqlx::Error::Database(err))) if err.is_unique_violation() => {
            return Err(username_taken());
        }
        Err(err) => return Err(err.into()),
    };
    info!(user_id = user.user_id, "registered user");
    Ok(user)
}

pub async fn authenticate(
    state: &AppState,
    jar: PrivateCookieJar,
    username: &str,
    password: &str,
) -> (PrivateCookieJar, bool) {
    let user = match find_user(state, username.trim()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("login for unknown username");
            return (jar, false);
        }
        Err(err) => {
            warn!(error = %err, "user lookup failed during login");
            return (jar, false);
        }
    };
    if !verify_password(password, &user.password_hash) {
        info!(user_id = user.user_id, "password check failed");
        return (jar, false);
    }

    let session = match activate_session(state, user).await {
        Ok(session) => session,
        Err(err) => {
            warn!(error = %err, "could not open session");
            return (jar, false);
        }
    };
    match state.cookies.write(
        jar,
        SESSION_COOKIE,
        &session.session_id.to_string(),
        session.expires_at,
    ) {
        Ok(jar) => {
            info!(
                user_id = session.user_id,
                session_id = session.session_id,
                "session opened"
            );
            (jar, true)
        }
        Err(err) => {
            warn!(error = %err, session_id = session.session_id, "could not write session cookie");
            (state.cookies.jar(), false)
        }
    }
}

pub async fn validate(
    state: &AppState,
    headers: &HeaderMap,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, SessionCheck), AppError> {
    let session_id = read_session_id(state, headers)?;
    let Some(session) = find_session(state, session_id).await? else {
        debug!(session_id, "cookie refers to no stored session");
        let jar = state.cookies.clear(jar, SESSION_COOKIE);
        return Ok((jar, SessionCheck::Unauthorized));
    };

    let now = Utc::now();
    match session.status(now) {
        SessionStatus::Revoked => Ok((jar, SessionCheck::Unauthorized)),
        SessionStatus::Expired => {
            info!(session_id, "session expired");
            let (jar, _) = end_session(state, jar, Some(session)).await;
            Ok((jar, SessionCheck::Unauthorized))
        }
        SessionStatus::ExpiringSoon => refresh(state, jar, session, now).await,
        SessionStatus::Active => Ok((jar, SessionCheck::Authorized(session))),
    }
}

/// Logs out. The cookie is always cleared; the return value says whether
/// the stored session ended up revoked.
pub async fn deauthenticate(
    state: &AppState,
    headers: &HeaderMap,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, bool) {
    let session = match read_session_id(state, headers) {
        Ok(session_id) => match find_session(state, session_id).await {
            Ok(session) => session,
            Err(err) => {
                warn!(session_id, error = %err, "session lookup failed during logout");
                None
            }
        },
        Err(err) => {
            debug!(error = %err, "logout without a readable session cookie");
            None
        }
    };
    end_session(state, jar, session).await
}

pub async fn current_user(state: &AppState, session: &Session) -> Result<Option<User>, AppError> {
    let users = state
        .store
        .load(&User::by_id(session.user_id), &["user_id"])
        .await?;
    Ok(users.into_iter().next())
}

async fn activate_session(state: &AppState, mut user: User) -> Result<Session, AppError> {
    let now = Utc::now();
    let mut session = Session {
        session_id: 0,
        user_id: user.user_id,
        created_at: now,
        expires_at: session_expiry(now),
        revoked_at: None,
    };
    session.session_id = state.store.create(&session).await?;

    user.is_active = true;
    user.updated_at = now;
    state.store.update(&user, &["user_id"]).await?;
    Ok(session)
}

async fn refresh(
    state: &AppState,
    jar: PrivateCookieJar,
    session: Session,
    now: DateTime<Utc>,
) -> Result<(PrivateCookieJar, SessionCheck), AppError> {
    let mut refreshed = session.clone();
    refreshed.expires_at = session_expiry(now);

    // Loses against a concurrent refresh that already moved further.
    if !state
        .store
        .advance(&refreshed, "expires_at", &["session_id"])
        .await?
    {
        return Ok((jar, SessionCheck::Authorized(session)));
    }

    debug!(
        session_id = refreshed.session_id,
        expires_at = %refreshed.expires_at,
        "session refreshed"
    );
    let jar = state.cookies.write(
        jar,
        SESSION_COOKIE,
        &refreshed.session_id.to_string(),
        refreshed.expires_at,
    )?;
    Ok((jar, SessionCheck::Authorized(refreshed)))
}

async fn end_session(
    state: &AppState,
    jar: PrivateCookieJar,
    session: Option<Session>,
) -> (PrivateCookieJar, bool) {
    let jar = state.cookies.clear(jar, SESSION_COOKIE);
    let Some(session) = session else {
        return (jar, false);
    };
    if session.is_revoked() {
        return (jar, true);
    }

    let mut attempt = 1;
    loop {
        match revoke(state, &session).await {
            Ok(()) => {
                info!(
                    session_id = session.session_id,
                    user_id = session.user_id,
                    "session revoked"
                );
                return (jar, true);
            }
            Err(err) if attempt >= REVOKE_ATTEMPTS => {
                error!(
                    session_id = session.session_id,
                    error = %err,
                    "giving up on revocation, stored session is still active"
                );
                return (jar, false);
            }
            Err(err) => {
                warn!(session_id = session.session_id, attempt, error = %err, "revocation failed, retrying");
                tokio::time::sleep(StdDuration::from_millis(
                    REVOKE_BACKOFF_MS * u64::from(attempt),
                ))
                .await;
                attempt += 1;
            }
        }
    }
}

async fn revoke(state: &AppState, session: &Session) -> Result<(), AppError> {
    let now = Utc::now();
    let mut revoked = session.clone();
    revoked.revoked_at = Some(now);
    state.store.update(&revoked, &["session_id"]).await?;

    if let Some(mut user) = current_user(state, session).await? {
        user.is_active = false;
        user.updated_at = now;
        state.store.update(&user, &["user_id"]).await?;
    }
    Ok(())
}

fn username_taken() -> AppError {
    AppError::BadRequest("username already taken".into())
}

fn read_session_id(state: &AppState, headers: &HeaderMap) -> Result<i64, AppError> {
    let raw = state.cookies.read(headers, SESSION_COOKIE)?;
    raw.parse()
        .map_err(|_| AppError::Cookie(CookieError::InvalidValue))
}

async fn find_session(state: &AppState, session_id: i64) -> Result<Option<Session>, AppError> {
    let sessions = state
        .store
        .load(&Session::by_id(session_id), &["session_id"])
        .await?;
    Ok(sessions.into_iter().next())
}

async fn find_user(state: &AppState, username: &str) -> Result<Option<User>, AppError> {
    let users = state
        .store
        .load(&User::by_username(username), &["username"])
        .await?;
    Ok(users.into_iter().next())
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub session_id: i64,
    pub username: String,
    pub is_active: bool,
}

pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let (jar, check) = match validate(&state, request.headers(), state.cookies.jar()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            match &err {
                AppError::Cookie(_) => debug!(error = %err, "request without valid session cookie"),
                _ => warn!(error = %err, "session validation failed"),
            }
            return AppError::Unauthorized.into_response();
        }
    };
    let SessionCheck::Authorized(session) = check else {
        return (jar, AppError::Unauthorized).into_response();
    };

    let user = match current_user(&state, &session).await {
        Ok(Some(user)) => user,
        Ok(None) => return (jar, AppError::Unauthorized).into_response(),
        Err(err) => return (jar, err).into_response(),
    };
    request.extensions_mut().insert(AuthenticatedUser {
        user_id: user.user_id,
        session_id: session.session_id,
        username: user.username,
        is_active: user.is_active,
    });

    (jar, next.run(request).await).into_response()
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }
}
