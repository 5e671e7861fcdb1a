//! Batch orchestration
//!
//! One `execute()` call runs one batch through
//! `Init -> Validate -> (Aborted | Filter -> Macros -> Dispatch -> Collect -> Done)`.

use config_loader::{filter_for_consent, ConfigLoader};
use contracts::{
    CalloutResult, ConsentProvider, ConsentSnapshot, HttpClient, MacroTable, RtcConfig,
    StillCurrent, UrlValidator, VariableResolver,
};
use futures::future::{self, Either};
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::BudgetedDispatcher;
use crate::macros::assign_macros;
use crate::reporter::{ErrorReporter, ReporterConfig};
use crate::resolver::{CalloutResolver, Resolution};
use crate::security::SecurityGate;
use crate::session::Session;
use crate::vendors::VendorRegistry;

/// Batch lifecycle, traced at debug level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Init,
    Validate,
    Aborted,
    Filter,
    Macros,
    Dispatch,
    Collect,
    Done,
}

impl BatchState {
    fn enter(self) -> Self {
        debug!(state = ?self, "RTC batch state");
        self
    }
}

/// Entry point of the RTC subsystem.
///
/// Holds the collaborators shared by every batch. A batch owns nothing
/// beyond its own `execute()` call.
pub struct RealTimeConfigManager<V, H, U> {
    resolver: V,
    http: H,
    url_validator: U,
    registry: VendorRegistry,
    reporter_config: ReporterConfig,
}

impl<V, H, U> RealTimeConfigManager<V, H, U>
where
    V: VariableResolver + Sync,
    H: HttpClient,
    U: UrlValidator,
{
    /// Create a manager with the built-in vendor registry
    pub fn new(resolver: V, http: H, url_validator: U) -> Self {
        Self {
            resolver,
            http,
            url_validator,
            registry: VendorRegistry::builtin(),
            reporter_config: ReporterConfig::default(),
        }
    }

    pub fn with_registry(mut self, registry: VendorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_reporter_config(mut self, config: ReporterConfig) -> Self {
        self.reporter_config = config;
        self
    }

    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    /// Validate `raw_config` and run its callouts.
    ///
    /// Returns `None` when the config is invalid. Otherwise returns one result
    /// per callout in declaration order, minus callouts cancelled by the
    /// still-current check.
    #[instrument(name = "rtc_execute", skip_all)]
    pub async fn execute<C>(
        &self,
        raw_config: &str,
        custom_macros: MacroTable,
        consent: &C,
        still_current: StillCurrent,
    ) -> Option<Vec<CalloutResult>>
    where
        C: ConsentProvider + Sync + ?Sized,
    {
        BatchState::Init.enter();
        BatchState::Validate.enter();
        let config = match ConfigLoader::load_from_str(raw_config, &self.url_validator) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Invalid RTC config, batch aborted");
                BatchState::Aborted.enter();
                observability::record_batch_aborted();
                return None;
            }
        };

        Some(
            self.execute_config(config, custom_macros, consent, still_current)
                .await,
        )
    }

    /// Run the callouts of an already validated config.
    pub async fn execute_config<C>(
        &self,
        config: RtcConfig,
        custom_macros: MacroTable,
        consent: &C,
        still_current: StillCurrent,
    ) -> Vec<CalloutResult>
    where
        C: ConsentProvider + Sync + ?Sized,
    {
        let snapshot = ConsentSnapshot::capture(consent);

        BatchState::Filter.enter();
        let config = filter_for_consent(config, snapshot.state);

        BatchState::Macros.enter();
        let timeout_millis = config.timeout_millis;
        let macros = assign_macros(custom_macros, timeout_millis, &snapshot);
        let session = Session::new();
        let resolutions = CalloutResolver::new(&self.registry).resolve_all(&config, &macros);

        BatchState::Dispatch.enter();
        let dispatcher = BudgetedDispatcher::new(
            &session,
            &self.resolver,
            &self.http,
            SecurityGate::new(&self.url_validator),
            ErrorReporter::new(&self.resolver, &self.http, &self.reporter_config),
            still_current,
            timeout_millis,
        );

        let attempted = resolutions.len();
        info!(callouts = attempted, timeout_ms = timeout_millis, "Starting RTC batch");

        let pending = resolutions.into_iter().map(|resolution| match resolution {
            Resolution::Dispatch(callout) => Either::Left(dispatcher.dispatch(callout)),
            Resolution::Rejected {
                callout,
                error,
                error_reporting_url,
            } => Either::Right(future::ready(Some(dispatcher.reject(
                &callout,
                error,
                error_reporting_url.as_deref(),
            )))),
        });
        let settled = future::join_all(pending).await;

        BatchState::Collect.enter();
        let results: Vec<CalloutResult> = settled.into_iter().flatten().collect();
        for result in &results {
            observability::record_callout_result(result);
        }
        observability::record_batch_completed(attempted, results.len());

        BatchState::Done.enter();
        info!(
            attempted,
            returned = results.len(),
            failed = results.iter().filter(|r| r.is_error()).count(),
            elapsed_ms = session.elapsed_millis(),
            "RTC batch finished"
        );
        results
    }
}
