//! # Adapters
//!
//! Default implementations of the RTC collaborator traits.
//!
//! - [`ReqwestHttpClient`]: callouts and error beacons over HTTP
//! - [`TemplateResolver`]: `NAME` / `NAME(arg)` placeholder substitution
//! - [`StandardUrlValidator`]: HTTPS / localhost / sandboxed-script classification
//! - [`mock`]: in-memory collaborators for tests

mod http;
pub mod mock;
mod template;
mod url_validator;

pub use http::{ReqwestHttpClient, ReqwestResponse};
pub use template::TemplateResolver;
pub use url_validator::StandardUrlValidator;
