use contracts::{UrlValidator, SCRIPT_URI_PREFIX};
use url::Url;

/// HTTPS, or plain HTTP against a local development host.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardUrlValidator;

impl UrlValidator for StandardUrlValidator {
    fn is_secure(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if parsed.scheme() == "https" {
            return true;
        }
        matches!(parsed.scheme(), "http")
            && parsed.host_str().is_some_and(|host| {
                host == "localhost" || host == "127.0.0.1" || host.ends_with(".localhost")
            })
    }

    fn is_alternate_scheme_uri(&self, url: &str) -> bool {
        url.starts_with(SCRIPT_URI_PREFIX)
    }
}
