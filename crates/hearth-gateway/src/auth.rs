//! Basic-auth credential extraction.
//!
//! The hub forwards the cloud account username and password for newer
//! devices as an `Authorization: Basic` header on discovery requests. The
//! header is optional: a missing, malformed, or half-empty header simply
//! means discovery runs without credentials.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use hearth_core::Credentials;

/// Device credentials taken from an `Authorization: Basic` header.
#[derive(Debug, Clone, Default)]
pub struct BasicAuth(pub Option<Credentials>);

impl BasicAuth {
    /// Decode a raw `Authorization` header value.
    ///
    /// Returns `None` unless the value is a well-formed Basic header whose
    /// username and password are both non-empty.
    #[must_use]
    pub fn decode(header: &str) -> Option<Credentials> {
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Credentials::from_parts(Some(username.to_string()), Some(password.to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BasicAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(None));
        };

        let credentials = header.to_str().ok().and_then(Self::decode);
        if credentials.is_none() {
            tracing::debug!("Ignoring unusable Authorization header");
        }

        Ok(Self(credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn basic(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn decodes_username_and_password() {
        let creds = BasicAuth::decode(&basic("me@example.com:hunter2")).unwrap();
        assert_eq!(creds.username, "me@example.com");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn password_may_contain_colons() {
        let creds = BasicAuth::decode(&basic("me:a:b")).unwrap();
        assert_eq!(creds.password, "a:b");
    }

    #[test]
    fn rejects_partial_or_foreign_headers() {
        assert!(BasicAuth::decode(&basic("me:")).is_none());
        assert!(BasicAuth::decode(&basic(":secret")).is_none());
        assert!(BasicAuth::decode(&basic("no-colon")).is_none());
        assert!(BasicAuth::decode("Bearer abc.def").is_none());
        assert!(BasicAuth::decode("Basic !!!not-base64").is_none());
    }

    #[tokio::test]
    async fn extractor_tolerates_missing_header() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        let BasicAuth(creds) = BasicAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(creds.is_none());
    }

    #[tokio::test]
    async fn extractor_reads_header() {
        let (mut parts, ()) = Request::builder()
            .header(AUTHORIZATION, basic("me:pw"))
            .body(())
            .unwrap()
            .into_parts();
        let BasicAuth(creds) = BasicAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(creds, Some(Credentials::new("me", "pw")));
    }
}
