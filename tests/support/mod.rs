#![allow(dead_code)]

use std::{collections::BTreeMap, fs::File, net::SocketAddr};

use anyhow::Context;
use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar};
use cashflow::{
    config::{AppConfig, StoreConfig},
    db::init_pool,
    models::{session::Session, user::User},
    state::AppState,
};
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use time::OffsetDateTime;

pub struct TestApp {
    pub state: AppState,
    _root: TempDir,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for test app")?;
        let db_path = root.path().join("cashflow.sqlite");
        File::create(&db_path)?;

        let config = AppConfig {
            database_url: format!("sqlite://{}", db_path.to_string_lossy()),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cookie_secret: b"integration-test-cookie-secret-0123".to_vec(),
            store: StoreConfig::default(),
        };

        let db = init_pool(&config.database_url)?;
        sqlx::migrate!("./migrations").run(&db).await?;

        Ok(Self {
            state: AppState::new(config, db),
            _root: root,
        })
    }

    pub async fn session(&self, session_id: i64) -> Session {
        self.state
            .store
            .load(&Session::by_id(session_id), &["session_id"])
            .await
            .expect("load session")
            .pop()
            .expect("session exists")
    }

    pub async fn sessions_of(&self, user_id: i64) -> Vec<Session> {
        let template = Session {
            user_id,
            ..Session::default()
        };
        self.state
            .store
            .load(&template, &["user_id"])
            .await
            .expect("load sessions")
    }

    pub async fn execute(&self, sql: &str) {
        sqlx::query(sql)
            .execute(self.state.store.pool())
            .await
            .expect("raw statement");
    }

    /// Makes every later write of `statement` (INSERT or UPDATE) on `table` fail.
    pub async fn reject_writes(&self, statement: &str, table: &str) {
        self.execute(&format!(
            "CREATE TRIGGER reject_{table}_{statement} BEFORE {statement} ON {table} \
             BEGIN SELECT RAISE(ABORT, 'writes rejected'); END"
        ))
        .await;
    }

    pub async fn user(&self, user_id: i64) -> User {
        self.state
            .store
            .load(&User::by_id(user_id), &["user_id"])
            .await
            .expect("load user")
            .pop()
            .expect("user exists")
    }

    /// Rewrites the stored expiry, bypassing the protocol.
    pub async fn set_expiry(&self, session_id: i64, expires_at: DateTime<Utc>) {
        let mut session = self.session(session_id).await;
        session.expires_at = expires_at;
        self.state
            .store
            .update(&session, &["session_id"])
            .await
            .expect("update session expiry");
    }
}

/// Client-side cookie storage: keeps what the server sets, drops what the
/// server expires, sends name/value pairs back.
#[derive(Debug, Default, Clone)]
pub struct Browser {
    cookies: BTreeMap<String, String>,
}

impl Browser {
    pub fn absorb(&mut self, jar: PrivateCookieJar) {
        let response = jar.into_response();
        self.absorb_headers(response.headers());
    }

    pub fn absorb_headers(&mut self, headers: &HeaderMap) {
        let now = OffsetDateTime::now_utc();
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Ok(cookie) = Cookie::parse_encoded(raw.to_owned()) else {
                continue;
            };
            if cookie.expires_datetime().is_some_and(|at| at <= now) {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_owned(), cookie.value().to_owned());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_owned(), value.to_owned());
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.cookie_header() {
            headers.insert(header::COOKIE, value);
        }
        headers
    }

    pub fn cookie_header(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| {
                Cookie::new(name.clone(), value.clone())
                    .encoded()
                    .to_string()
            })
            .collect();
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}

/// Flips one character of a sealed cookie value.
pub fn tamper(value: &str) -> String {
    let mut bytes = value.as_bytes().to_vec();
    let index = bytes.len() / 2;
    bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
    String::from_utf8(bytes).expect("sealed cookies are ascii")
}
