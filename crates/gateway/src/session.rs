//! Signed session cookies.
//!
//! The cookie value is `<uuid>.<sig>` where `sig` is the unpadded base64url
//! HMAC-SHA256 of the uuid under the session secret. A missing, malformed
//! or badly signed cookie is replaced with a fresh session.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chatptk_core::session::SessionId;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies session cookies.
#[derive(Clone)]
pub struct SessionCookies {
    mac: HmacSha256,
    name: String,
    max_age_secs: u64,
}

impl std::fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookies")
            .field("name", &self.name)
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

impl SessionCookies {
    pub fn new(
        secret: &str,
        name: impl Into<String>,
        max_age_secs: u64,
    ) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret.as_bytes())?,
            name: name.into(),
            max_age_secs,
        })
    }

    pub fn from_config(
        secret: &str,
        config: &chatptk_config::SessionConfig,
    ) -> Result<Self, hmac::digest::InvalidLength> {
        Self::new(secret, config.cookie_name.clone(), config.ttl_minutes * 60)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Cookie value for `id`.
    pub fn sign(&self, id: &SessionId) -> String {
        format!("{}.{}", id, self.signature(id.as_str()))
    }

    /// Session id carried by a cookie value, if its signature checks out.
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, sig) = value.rsplit_once('.')?;
        uuid::Uuid::parse_str(id).ok()?;
        let provided = URL_SAFE_NO_PAD.decode(sig).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&provided).ok()?;
        Some(SessionId::from(id))
    }

    /// Session for this request, plus a `Set-Cookie` value when a new one was issued.
    pub fn resolve(&self, headers: &HeaderMap) -> (SessionId, Option<HeaderValue>) {
        if let Some(id) = self.find(headers) {
            return (id, None);
        }

        let id = SessionId::new();
        debug!(session = %id, "Issuing new session");
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name,
            self.sign(&id),
            self.max_age_secs
        );
        (id, HeaderValue::from_str(&cookie).ok())
    }

    fn find(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.name)
            .find_map(|(_, value)| self.verify(value))
    }
}

/// Attach a freshly issued cookie to a response.
pub fn attach(headers: &mut HeaderMap, cookie: Option<HeaderValue>) {
    if let Some(cookie) = cookie {
        headers.insert(SET_COOKIE, cookie);
    }
}
