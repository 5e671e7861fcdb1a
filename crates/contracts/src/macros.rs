//! Macro values bound into URL templates

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::MacroError;

pub type MacroResult = Result<Option<String>, MacroError>;

/// Synchronous resolver; receives the macro's argument, if any.
pub type MacroFn = Arc<dyn Fn(Option<&str>) -> MacroResult + Send + Sync>;

/// Asynchronous resolver; receives the macro's argument, if any.
pub type DeferredMacroFn = Arc<dyn Fn(Option<String>) -> BoxFuture<'static, MacroResult> + Send + Sync>;

/// Name to value bindings of a callout
pub type MacroTable = HashMap<String, MacroValue>;

/// Macro names a template may reference
pub type MacroAllowlist = HashSet<String>;

#[derive(Clone)]
pub enum MacroValue {
    Constant(String),
    Resolver(MacroFn),
    Deferred(DeferredMacroFn),
}

impl MacroValue {
    pub fn constant(value: impl Into<String>) -> Self {
        MacroValue::Constant(value.into())
    }

    pub fn resolver(f: impl Fn(Option<&str>) -> MacroResult + Send + Sync + 'static) -> Self {
        MacroValue::Resolver(Arc::new(f))
    }

    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MacroResult> + Send + 'static,
    {
        MacroValue::Deferred(Arc::new(move |arg| f(arg).boxed()))
    }

    /// Resolve the value, awaiting deferred resolvers.
    pub async fn resolve(&self, arg: Option<&str>) -> MacroResult {
        match self {
            MacroValue::Constant(value) => Ok(Some(value.clone())),
            MacroValue::Resolver(f) => f(arg),
            MacroValue::Deferred(f) => f(arg.map(str::to_owned)).await,
        }
    }

    /// Resolve without suspending. Deferred resolvers yield nothing.
    pub fn resolve_now(&self, arg: Option<&str>) -> MacroResult {
        match self {
            MacroValue::Constant(value) => Ok(Some(value.clone())),
            MacroValue::Resolver(f) => f(arg),
            MacroValue::Deferred(_) => Ok(None),
        }
    }
}

impl fmt::Debug for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            MacroValue::Resolver(_) => f.write_str("Resolver(..)"),
            MacroValue::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for MacroValue {
    fn from(value: &str) -> Self {
        MacroValue::constant(value)
    }
}

impl From<String> for MacroValue {
    fn from(value: String) -> Self {
        MacroValue::Constant(value)
    }
}
