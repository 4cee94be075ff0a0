//! Transports for the encoded session id
//!
//! The store never touches cookies directly; it asks a [`TokenCarrier`] for
//! the inbound token and hands it the outbound one. [`CookieToken`] is the
//! default. [`HeaderToken`] serves API clients that keep the token themselves.

use salvo_core::http::cookie::time::{Duration, OffsetDateTime};
use salvo_core::http::cookie::{Cookie, SameSite as CookieSameSite};
use salvo_core::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use salvo_core::{Request, Response};

use crate::config::{SameSite, SessionOptions};
use crate::error::SessionError;

/// Reads and writes the session token for a session name
pub trait TokenCarrier: Send + Sync + 'static {
    /// Get the inbound token for `name`, or `TokenNotPresent`
    fn get_token(&self, req: &Request, name: &str) -> Result<String, SessionError>;

    /// Write `value` for `name` on the response. An empty value with a
    /// negative max age removes the token on the client.
    fn set_token(
        &self,
        res: &mut Response,
        name: &str,
        value: &str,
        options: &SessionOptions,
    ) -> Result<(), SessionError>;
}

/// Carries the token in an HTTP cookie named after the session
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieToken;

impl CookieToken {
    /// Build the cookie for `name` from the session options
    pub fn build_cookie(name: &str, value: &str, options: &SessionOptions) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((name.to_string(), value.to_string()))
            .path(options.path.clone())
            .http_only(options.http_only)
            .secure(options.secure);

        if let Some(domain) = &options.domain {
            cookie_builder = cookie_builder.domain(domain.clone());
        }

        // Zero leaves a browser-session cookie. Expires is left unset when it
        // falls outside the representable range; Max-Age still applies.
        if options.max_age > 0 {
            let max_age = Duration::seconds(options.max_age);
            cookie_builder = cookie_builder.max_age(max_age);
            if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
                cookie_builder = cookie_builder.expires(expires);
            }
        } else if options.max_age < 0 {
            cookie_builder = cookie_builder
                .max_age(Duration::seconds(options.max_age))
                .expires(OffsetDateTime::UNIX_EPOCH + Duration::seconds(1));
        }

        if let Some(same_site) = options.same_site {
            cookie_builder = cookie_builder.same_site(match same_site {
                SameSite::Strict => CookieSameSite::Strict,
                SameSite::Lax => CookieSameSite::Lax,
                SameSite::None => CookieSameSite::None,
            });
        }

        cookie_builder.build()
    }
}

impl TokenCarrier for CookieToken {
    fn get_token(&self, req: &Request, name: &str) -> Result<String, SessionError> {
        let cookie = req
            .cookie(name)
            .ok_or_else(|| SessionError::TokenNotPresent(name.to_string()))?;
        let value = cookie.value();

        // URL decode the value (cookies may be URL encoded)
        Ok(match urlencoding::decode(value) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => value.to_string(),
        })
    }

    fn set_token(
        &self,
        res: &mut Response,
        name: &str,
        value: &str,
        options: &SessionOptions,
    ) -> Result<(), SessionError> {
        res.add_cookie(Self::build_cookie(name, value, options));
        Ok(())
    }
}

/// Carries the token in a header, optionally behind a scheme such as `Bearer`.
///
/// One header carries one token, so a `HeaderToken` serves a single session
/// name; the name argument is ignored.
#[derive(Clone, Debug)]
pub struct HeaderToken {
    header: HeaderName,
    scheme: Option<String>,
}

impl HeaderToken {
    /// Raw token in the given header
    pub fn new(header: HeaderName) -> Self {
        Self {
            header,
            scheme: None,
        }
    }

    /// `Authorization: Bearer <token>`
    pub fn bearer() -> Self {
        Self {
            header: AUTHORIZATION,
            scheme: Some("Bearer".to_string()),
        }
    }

    /// The header carrying the token
    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl TokenCarrier for HeaderToken {
    fn get_token(&self, req: &Request, name: &str) -> Result<String, SessionError> {
        let not_present = || SessionError::TokenNotPresent(name.to_string());
        let raw = req
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .ok_or_else(not_present)?;

        let token = match &self.scheme {
            Some(scheme) => match raw.split_once(' ') {
                Some((given, token)) if given.eq_ignore_ascii_case(scheme) => token.trim(),
                _ => return Err(not_present()),
            },
            None => raw,
        };

        if token.is_empty() {
            return Err(not_present());
        }
        Ok(token.to_string())
    }

    fn set_token(
        &self,
        res: &mut Response,
        _name: &str,
        value: &str,
        _options: &SessionOptions,
    ) -> Result<(), SessionError> {
        if value.is_empty() {
            res.headers_mut().remove(&self.header);
            return Ok(());
        }

        let value = match &self.scheme {
            Some(scheme) => format!("{} {}", scheme, value),
            None => value.to_string(),
        };
        let value =
            HeaderValue::from_str(&value).map_err(|e| SessionError::InvalidToken(e.to_string()))?;
        res.headers_mut().insert(self.header.clone(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_round_trip() {
        let carrier = CookieToken;
        let mut res = Response::new();
        let options = SessionOptions {
            domain: Some("example.com".to_string()),
            secure: true,
            http_only: true,
            same_site: Some(SameSite::Strict),
            ..SessionOptions::with_max_age(3600)
        };
        carrier.set_token(&mut res, "sid", "token-value", &options).unwrap();

        let cookie = res.cookie("sid").unwrap();
        assert_eq!(cookie.value(), "token-value");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(CookieSameSite::Strict));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));

        let mut req = Request::new();
        req.cookies_mut().add(Cookie::new("sid", "token-value"));
        assert_eq!(carrier.get_token(&req, "sid").unwrap(), "token-value");
    }

    #[test]
    fn test_cookie_missing() {
        let req = Request::new();
        assert!(matches!(
            CookieToken.get_token(&req, "sid"),
            Err(SessionError::TokenNotPresent(_))
        ));
    }

    #[test]
    fn test_cookie_clearing() {
        let mut res = Response::new();
        CookieToken
            .set_token(&mut res, "sid", "", &SessionOptions::with_max_age(-1))
            .unwrap();

        let cookie = res.cookie("sid").unwrap();
        assert_eq!(cookie.value(), "");
        assert!(cookie.max_age().unwrap().is_negative());
    }

    #[test]
    fn test_session_cookie_without_max_age() {
        let cookie = CookieToken::build_cookie("sid", "v", &SessionOptions::with_max_age(0));
        assert_eq!(cookie.max_age(), None);
        assert_eq!(cookie.expires(), None);
    }

    #[test]
    fn test_cookie_with_unbounded_max_age() {
        let cookie = CookieToken::build_cookie("sid", "v", &SessionOptions::with_max_age(i64::MAX));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(i64::MAX)));
        assert_eq!(cookie.expires(), None);
    }

    #[test]
    fn test_bearer_header() {
        let carrier = HeaderToken::bearer();
        let mut res = Response::new();
        carrier
            .set_token(&mut res, "sid", "abc", &SessionOptions::default())
            .unwrap();
        assert_eq!(res.headers().get(AUTHORIZATION).unwrap(), "Bearer abc");

        let mut req = Request::new();
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(carrier.get_token(&req, "sid").unwrap(), "abc");

        let mut basic = Request::new();
        basic
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(carrier.get_token(&basic, "sid").is_err());

        carrier
            .set_token(&mut res, "sid", "", &SessionOptions::with_max_age(-1))
            .unwrap();
        assert!(res.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_raw_header() {
        let carrier = HeaderToken::new(HeaderName::from_static("x-session-token"));
        let mut req = Request::new();
        req.headers_mut()
            .insert("x-session-token", HeaderValue::from_static("raw-token"));
        assert_eq!(carrier.get_token(&req, "sid").unwrap(), "raw-token");
    }
}
