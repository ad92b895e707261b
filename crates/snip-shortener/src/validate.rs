use crate::error::{Result, ShortenerError};
use std::borrow::Cow;
use url::Url;

/// Longest url every storage backend can hold.
pub const MAX_URL_LEN: usize = 768;

/// Checks that `url` is an absolute http(s) url with a host.
///
/// A url without a scheme is checked as if it started with `http://`; the
/// input itself is not rewritten.
pub fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(ShortenerError::InvalidUrl("url cannot be empty".to_string()));
    }
    if url.len() > MAX_URL_LEN {
        return Err(ShortenerError::InvalidUrl(format!(
            "url is longer than {MAX_URL_LEN} bytes"
        )));
    }

    let candidate: Cow<'_, str> = if url.contains("://") {
        Cow::Borrowed(url)
    } else {
        Cow::Owned(format!("http://{url}"))
    };

    let parsed = Url::parse(&candidate)
        .map_err(|err| ShortenerError::InvalidUrl(format!("{err}: {url}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(url, "scheme must be http or https"));
    }
    if parsed.host_str().unwrap_or_default().is_empty() {
        return Err(invalid(url, "missing host"));
    }

    Ok(())
}

fn invalid(url: &str, reason: &str) -> ShortenerError {
    ShortenerError::InvalidUrl(format!("{reason}: {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("https://github.com/").is_ok());
        assert!(validate_url("http://example.com/path?q=1#frag").is_ok());
        assert!(validate_url("HTTPS://EXAMPLE.COM").is_ok());
        assert!(validate_url("http://localhost:8080/x").is_ok());
        assert!(validate_url("http://user:pw@example.com").is_ok());
        assert!(validate_url("http://[::1]:8080/").is_ok());
    }

    #[test]
    fn accepts_what_browsers_accept() {
        // empty port means the default one
        assert!(validate_url("http://example.com:/path").is_ok());
        // spaces in the path are percent-encoded
        assert!(validate_url("http://example.com/a b").is_ok());
    }

    #[test]
    fn missing_scheme_defaults_to_http() {
        assert!(validate_url("example.com").is_ok());
        assert!(validate_url("example.com/some/path").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(ShortenerError::InvalidUrl(_))
        ));
        assert!(validate_url("javascript://alert(1)").is_err());
    }

    #[test]
    fn rejects_missing_host() {
        assert!(validate_url("http://").is_err());
        assert!(validate_url("http://?q=1").is_err());
        assert!(validate_url("http://:80/").is_err());
        assert!(validate_url("://example.com").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(validate_url("").is_err());
        assert!(validate_url("   ").is_err());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("http://exa mple.com").is_err());
        assert!(validate_url("http://example.com:notaport").is_err());
        assert!(validate_url("http://[::1").is_err());
        assert!(validate_url("http://[not-an-ip]/").is_err());
    }

    #[test]
    fn rejects_overlong_urls() {
        let url = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert!(validate_url(&url).is_err());
    }
}
