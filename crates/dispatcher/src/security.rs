use contracts::{RtcErrorCode, UrlValidator};

/// How an admitted URL is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    /// Sandboxed-script URI
    Script,
}

/// Rejects substituted URLs that are neither secure nor a recognized alternate scheme.
pub struct SecurityGate<'a, U: ?Sized> {
    validator: &'a U,
}

impl<'a, U> SecurityGate<'a, U>
where
    U: UrlValidator + ?Sized,
{
    pub fn new(validator: &'a U) -> Self {
        Self { validator }
    }

    pub fn classify(&self, url: &str) -> Result<Transport, RtcErrorCode> {
        if self.validator.is_alternate_scheme_uri(url) {
            Ok(Transport::Script)
        } else if self.validator.is_secure(url) {
            Ok(Transport::Http)
        } else {
            Err(RtcErrorCode::InsecureUrl)
        }
    }
}
