//! Credential cookies: parsing, policies and per-response accumulation.

use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;

/// Default cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Default cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Default cookie name for the sliding session token.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Which credential a cookie carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Access,
    Refresh,
    Session,
}

impl CredentialKind {
    pub const ALL: [CredentialKind; 3] = [Self::Access, Self::Refresh, Self::Session];
}

/// Attributes attached to a credential cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    /// Not readable from scripts
    pub http_only: bool,
    /// Only sent over HTTPS (production)
    pub secure: bool,
    pub same_site_strict: bool,
    pub path: String,
    /// Lifetime in seconds
    pub max_age: u64,
}

impl CookiePolicy {
    fn attributes(&self, max_age: u64) -> String {
        let mut attrs = String::new();
        if self.http_only {
            attrs.push_str("; HttpOnly");
        }
        if self.same_site_strict {
            attrs.push_str("; SameSite=Strict");
        }
        attrs.push_str(&format!("; Path={}; Max-Age={}", self.path, max_age));
        if self.secure {
            attrs.push_str("; Secure");
        }
        attrs
    }

    /// `Set-Cookie` value storing `value` under `name`.
    pub fn set_cookie(&self, name: &str, value: &str) -> String {
        format!("{}={}{}", name, value, self.attributes(self.max_age))
    }

    /// `Set-Cookie` value removing `name`.
    pub fn clear_cookie(&self, name: &str) -> String {
        format!("{}={}", name, self.attributes(0))
    }
}

/// Name and lifetime of one credential cookie.
#[derive(Debug, Clone)]
pub struct CookieSpec {
    pub name: String,
    pub max_age: u64,
}

/// Cookie configuration for all credential kinds.
///
/// The refresh cookie must outlive the access cookie, otherwise the browser
/// drops the refresh token first and rotation can never happen. Startup
/// validation enforces this for configured values.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    pub access: CookieSpec,
    pub refresh: CookieSpec,
    pub session: CookieSpec,
}

/// Access cookie default lifetime: 15 minutes
pub const ACCESS_COOKIE_MAX_AGE: u64 = 15 * 60;

/// Refresh cookie default lifetime: 7 days
pub const REFRESH_COOKIE_MAX_AGE: u64 = 7 * 24 * 60 * 60;

/// Session cookie default lifetime: 1 hour
pub const SESSION_COOKIE_MAX_AGE: u64 = 60 * 60;

impl CookieSettings {
    /// Default names and lifetimes.
    pub fn new(secure: bool) -> Self {
        Self {
            secure,
            access: CookieSpec {
                name: ACCESS_COOKIE_NAME.to_string(),
                max_age: ACCESS_COOKIE_MAX_AGE,
            },
            refresh: CookieSpec {
                name: REFRESH_COOKIE_NAME.to_string(),
                max_age: REFRESH_COOKIE_MAX_AGE,
            },
            session: CookieSpec {
                name: SESSION_COOKIE_NAME.to_string(),
                max_age: SESSION_COOKIE_MAX_AGE,
            },
        }
    }

    fn spec(&self, kind: CredentialKind) -> &CookieSpec {
        match kind {
            CredentialKind::Access => &self.access,
            CredentialKind::Refresh => &self.refresh,
            CredentialKind::Session => &self.session,
        }
    }

    pub fn name(&self, kind: CredentialKind) -> &str {
        &self.spec(kind).name
    }

    pub fn policy(&self, kind: CredentialKind) -> CookiePolicy {
        CookiePolicy {
            http_only: true,
            secure: self.secure,
            same_site_strict: true,
            path: "/".to_string(),
            max_age: self.spec(kind).max_age,
        }
    }

    /// Read every credential kind out of the jar.
    pub fn inbound(&self, jar: &CredentialJar) -> InboundCredentials {
        let read = |kind| jar.read(self.name(kind)).map(str::to_string);
        InboundCredentials {
            access: read(CredentialKind::Access),
            refresh: read(CredentialKind::Refresh),
            session: read(CredentialKind::Session),
        }
    }
}

/// Credentials presented by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundCredentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub session: Option<String>,
}

/// A change to the stored credentials, decided by a resolver and carried out
/// by the jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialEffect {
    Write { kind: CredentialKind, value: String },
    Delete { kind: CredentialKind },
}

impl CredentialEffect {
    pub fn write(kind: CredentialKind, value: impl Into<String>) -> Self {
        Self::Write {
            kind,
            value: value.into(),
        }
    }

    /// Delete every credential kind.
    pub fn clear_all() -> Vec<Self> {
        CredentialKind::ALL
            .into_iter()
            .map(|kind| Self::Delete { kind })
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Pending {
    Set(String),
    Removed,
}

/// Cookies of a single request/response exchange.
///
/// Reads see the inbound `Cookie` header overlaid with anything written or
/// deleted during this request. Writes and deletes accumulate, last one per
/// name wins, and are emitted as `Set-Cookie` headers on the outbound response.
#[derive(Debug, Clone, Default)]
pub struct CredentialJar {
    inbound: HashMap<String, String>,
    pending: Vec<(String, Pending, CookiePolicy)>,
}

impl CredentialJar {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut inbound = HashMap::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(cookie_header) = value.to_str() else {
                continue;
            };
            for part in cookie_header.split(';') {
                if let Some((key, value)) = part.trim().split_once('=') {
                    inbound
                        .entry(key.trim().to_string())
                        .or_insert_with(|| value.trim().to_string());
                }
            }
        }
        Self {
            inbound,
            pending: Vec::new(),
        }
    }

    pub fn read(&self, name: &str) -> Option<&str> {
        match self.pending.iter().find(|(n, _, _)| n == name) {
            Some((_, Pending::Set(value), _)) => Some(value.as_str()),
            Some((_, Pending::Removed, _)) => None,
            None => self
                .inbound
                .get(name)
                .map(String::as_str)
                .filter(|v| !v.is_empty()),
        }
    }

    pub fn write(&mut self, name: &str, value: &str, policy: CookiePolicy) {
        self.pending.retain(|(n, _, _)| n != name);
        self.pending
            .push((name.to_string(), Pending::Set(value.to_string()), policy));
    }

    /// Remove a credential. Deleting a credential that is not present is a no-op.
    pub fn delete(&mut self, name: &str, policy: CookiePolicy) {
        if self.read(name).is_none() {
            return;
        }
        self.expire(name, policy);
    }

    /// Remove a credential whether or not it is present.
    pub fn expire(&mut self, name: &str, policy: CookiePolicy) {
        self.pending.retain(|(n, _, _)| n != name);
        self.pending.push((name.to_string(), Pending::Removed, policy));
    }

    /// Carry out resolver effects using the configured cookie policies.
    pub fn apply(&mut self, settings: &CookieSettings, effects: &[CredentialEffect]) {
        for effect in effects {
            match effect {
                CredentialEffect::Write { kind, value } => {
                    self.write(settings.name(*kind), value, settings.policy(*kind))
                }
                CredentialEffect::Delete { kind } => {
                    self.delete(settings.name(*kind), settings.policy(*kind))
                }
            }
        }
    }

    /// Pending `Set-Cookie` header values, in write order.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|(name, pending, policy)| match pending {
                Pending::Set(value) => policy.set_cookie(name, value),
                Pending::Removed => policy.clear_cookie(name),
            })
            .collect()
    }

    /// Append pending cookies to `response`.
    ///
    /// Cookies the response already sets (written by an inner handler later in
    /// the request) take precedence and are left alone.
    pub fn write_to(&self, response: &mut Response) {
        let already_set: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split_once('=').map(|(name, _)| name.trim().to_string()))
            .collect();

        let headers = response.headers_mut();
        for ((name, _, _), value) in self.pending.iter().zip(self.set_cookie_headers()) {
            if already_set.iter().any(|n| n == name) {
                continue;
            }
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::error!(cookie = %name, error = %e, "Invalid cookie value"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn headers_with(cookie: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static(cookie));
        headers
    }

    #[test]
    fn test_from_headers_multiple_cookies() {
        let jar = CredentialJar::from_headers(&headers_with(
            "foo=bar; access_token=abc123; refresh_token=xyz789",
        ));

        assert_eq!(jar.read("access_token"), Some("abc123"));
        assert_eq!(jar.read("refresh_token"), Some("xyz789"));
        assert_eq!(jar.read("foo"), Some("bar"));
        assert_eq!(jar.read("session"), None);
    }

    #[test]
    fn test_from_headers_trims_whitespace() {
        let jar = CredentialJar::from_headers(&headers_with("  access_token = abc123  ; foo=bar"));
        assert_eq!(jar.read("access_token"), Some("abc123"));
        assert_eq!(jar.read("foo"), Some("bar"));
    }

    #[test]
    fn test_from_headers_without_cookie_header() {
        let jar = CredentialJar::from_headers(&HeaderMap::new());
        assert_eq!(jar.read("access_token"), None);
    }

    #[test]
    fn test_policy_formatting() {
        let settings = CookieSettings::new(false);
        let policy = settings.policy(CredentialKind::Access);

        assert_eq!(
            policy.set_cookie("access_token", "tok"),
            "access_token=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=900"
        );
        assert_eq!(
            policy.clear_cookie("access_token"),
            "access_token=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn test_secure_only_in_production() {
        let dev = CookieSettings::new(false).policy(CredentialKind::Refresh);
        let prod = CookieSettings::new(true).policy(CredentialKind::Refresh);

        assert!(!dev.set_cookie("r", "v").contains("Secure"));
        assert!(prod.set_cookie("r", "v").ends_with("; Secure"));
    }

    #[test]
    fn test_refresh_outlives_access_by_default() {
        let settings = CookieSettings::new(false);
        assert!(settings.refresh.max_age > settings.access.max_age);
    }

    #[test]
    fn test_read_sees_inbound_and_writes() {
        let settings = CookieSettings::new(false);
        let mut jar = CredentialJar::from_headers(&headers_with("access_token=old"));
        assert_eq!(jar.read("access_token"), Some("old"));

        jar.write("access_token", "new", settings.policy(CredentialKind::Access));
        assert_eq!(jar.read("access_token"), Some("new"));

        jar.delete("access_token", settings.policy(CredentialKind::Access));
        assert_eq!(jar.read("access_token"), None);
    }

    #[test]
    fn test_last_write_wins() {
        let settings = CookieSettings::new(false);
        let policy = settings.policy(CredentialKind::Access);
        let mut jar = CredentialJar::default();

        jar.write("access_token", "one", policy.clone());
        jar.write("access_token", "two", policy);

        let headers = jar.set_cookie_headers();
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("access_token=two;"));
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let settings = CookieSettings::new(false);
        let mut jar = CredentialJar::from_headers(&headers_with("foo=bar"));

        jar.delete("access_token", settings.policy(CredentialKind::Access));
        assert!(jar.set_cookie_headers().is_empty());
    }

    #[test]
    fn test_expire_absent_still_clears() {
        let settings = CookieSettings::new(false);
        let mut jar = CredentialJar::default();

        jar.expire("session", settings.policy(CredentialKind::Session));
        assert_eq!(
            jar.set_cookie_headers(),
            vec!["session=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0".to_string()]
        );
        assert_eq!(jar.read("session"), None);
    }

    #[test]
    fn test_delete_twice_emits_once() {
        let settings = CookieSettings::new(false);
        let mut jar = CredentialJar::from_headers(&headers_with("refresh_token=r"));

        jar.delete("refresh_token", settings.policy(CredentialKind::Refresh));
        jar.delete("refresh_token", settings.policy(CredentialKind::Refresh));

        let headers = jar.set_cookie_headers();
        assert_eq!(headers.len(), 1);
        assert!(headers[0].contains("Max-Age=0"));
    }

    #[test]
    fn test_apply_effects() {
        let settings = CookieSettings::new(false);
        let mut jar =
            CredentialJar::from_headers(&headers_with("access_token=a; refresh_token=r"));

        let mut effects = CredentialEffect::clear_all();
        effects.push(CredentialEffect::write(CredentialKind::Access, "fresh"));
        jar.apply(&settings, &effects);

        let headers = jar.set_cookie_headers();
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().any(|h| h.starts_with("refresh_token=;")));
        assert!(headers.iter().any(|h| h.starts_with("access_token=fresh;")));
    }

    #[test]
    fn test_write_to_respects_inner_cookies() {
        let settings = CookieSettings::new(false);
        let mut jar = CredentialJar::default();
        jar.write("access_token", "outer", settings.policy(CredentialKind::Access));
        jar.write("refresh_token", "outer", settings.policy(CredentialKind::Refresh));

        let mut response = (
            [(header::SET_COOKIE, "access_token=; Path=/; Max-Age=0")],
            "ok",
        )
            .into_response();
        jar.write_to(&mut response);

        let cookies: Vec<&str> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.contains(&"access_token=; Path=/; Max-Age=0"));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=outer;")));
    }
}
