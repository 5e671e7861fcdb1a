/// Classifies URLs before they are dispatched.
pub trait UrlValidator: Send + Sync {
    /// HTTPS, or a local development host
    fn is_secure(&self, url: &str) -> bool;

    /// A recognized non-HTTP scheme that may still be dispatched (sandboxed scripts)
    fn is_alternate_scheme_uri(&self, url: &str) -> bool;
}
