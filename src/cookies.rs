use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, Key, PrivateCookieJar, SameSite};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha512};
use time::OffsetDateTime;

use crate::error::CookieError;

pub const MAX_COOKIE_BYTES: usize = 4096;

// 96-bit nonce plus 128-bit tag, before base64.
const SEAL_OVERHEAD: usize = 12 + 16;

#[derive(Clone)]
pub struct CookieCodec {
    key: Key,
}

impl CookieCodec {
    pub fn new(secret: &[u8]) -> Self {
        let digest = Sha512::digest(secret);
        Self {
            key: Key::from(&digest[..]),
        }
    }

    pub fn jar(&self) -> PrivateCookieJar {
        PrivateCookieJar::new(self.key.clone())
    }

    pub fn write(
        &self,
        jar: PrivateCookieJar,
        name: &str,
        value: &str,
        expires: DateTime<Utc>,
    ) -> Result<PrivateCookieJar, CookieError> {
        if name.len() + 1 + sealed_len(value.len()) > MAX_COOKIE_BYTES {
            return Err(CookieError::ValueTooLong);
        }
        let expires = OffsetDateTime::from_unix_timestamp(expires.timestamp())
            .map_err(|_| CookieError::InvalidExpiry)?;
        Ok(jar.add(session_cookie(name, value, expires)))
    }

    pub fn clear(&self, jar: PrivateCookieJar, name: &str) -> PrivateCookieJar {
        jar.add(session_cookie(name, "", OffsetDateTime::UNIX_EPOCH))
    }

    pub fn read(&self, headers: &HeaderMap, name: &str) -> Result<String, CookieError> {
        let cookies = CookieJar::from_headers(headers);
        let sealed = cookies.get(name).ok_or(CookieError::NotFound)?;
        let opened = self
            .jar()
            .decrypt(sealed.clone())
            .ok_or(CookieError::InvalidValue)?;
        Ok(opened.value().to_owned())
    }
}

fn session_cookie(name: &str, value: &str, expires: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((name.to_owned(), value.to_owned()))
        .path("/")
        .expires(expires)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

fn sealed_len(plain_len: usize) -> usize {
    (plain_len + SEAL_OVERHEAD).div_ceil(3) * 4
}
