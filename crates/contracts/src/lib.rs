//! # Contracts
//!
//! Shared data structures and collaborator traits of the RTC (Real-Time Config) batch.
//! Every other crate depends on this one; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All budgets and `rtc_time` values are milliseconds
//! - `rtc_time` is measured from the start of the batch, not from the individual callout

mod callout;
mod cancel;
mod config;
mod consent;
mod constants;
mod error;
mod http;
mod macros;
mod resolver;
mod url_validator;

pub use callout::*;
pub use cancel::StillCurrent;
pub use config::*;
pub use consent::*;
pub use constants::*;
pub use error::*;
pub use http::*;
pub use macros::*;
pub use resolver::*;
pub use url_validator::UrlValidator;
