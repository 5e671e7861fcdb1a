//! Budgeted two-phase callout dispatch
//!
//! Each callout gets one time budget of `timeoutMillis`, spent first on macro
//! expansion and then on the network fetch. Whatever expansion consumes is
//! no longer available to the fetch.

use std::time::Duration;

use contracts::{
    CalloutResult, Credentials, ExpandError, FetchOptions, HttpClient, HttpResponse,
    RtcErrorCode, StillCurrent, UrlValidator, VariableResolver, MAX_URL_LENGTH,
    TRUNCATION_SUFFIX,
};
use serde_json::Value;
use tokio::time::{self, Instant};
use tracing::{debug, instrument};

use crate::reporter::{classify_transport_error, normalize_body, normalize_script, ErrorReporter};
use crate::resolver::ResolvedCallout;
use crate::security::{SecurityGate, Transport};
use crate::session::Session;

/// Terminal state of the fetch phase
enum FetchOutcome {
    Response(Option<Value>),
    Failed(RtcErrorCode),
    Cancelled,
}

impl FetchOutcome {
    fn from_transport_error(error: &contracts::TransportError) -> Self {
        match classify_transport_error(error) {
            Some(code) => FetchOutcome::Failed(code),
            None => FetchOutcome::Cancelled,
        }
    }

    fn from_normalized(result: Result<Option<Value>, RtcErrorCode>) -> Self {
        match result {
            Ok(response) => FetchOutcome::Response(response),
            Err(code) => FetchOutcome::Failed(code),
        }
    }
}

/// Runs callouts of one batch against the batch's [`Session`].
pub struct BudgetedDispatcher<'a, V, H, U: ?Sized> {
    session: &'a Session,
    resolver: &'a V,
    http: &'a H,
    gate: SecurityGate<'a, U>,
    reporter: ErrorReporter<'a, V, H>,
    still_current: StillCurrent,
    budget: Duration,
}

impl<'a, V, H, U> BudgetedDispatcher<'a, V, H, U>
where
    V: VariableResolver + Sync,
    H: HttpClient,
    U: UrlValidator + ?Sized,
{
    pub fn new(
        session: &'a Session,
        resolver: &'a V,
        http: &'a H,
        gate: SecurityGate<'a, U>,
        reporter: ErrorReporter<'a, V, H>,
        still_current: StillCurrent,
        timeout_millis: u64,
    ) -> Self {
        Self {
            session,
            resolver,
            http,
            gate,
            reporter,
            still_current,
            budget: Duration::from_millis(timeout_millis),
        }
    }

    /// Result of a callout that fails before reaching the network,
    /// stamped with the batch's elapsed time.
    pub fn reject(
        &self,
        callout: &str,
        error: RtcErrorCode,
        error_reporting_url: Option<&str>,
    ) -> CalloutResult {
        self.reporter
            .report(error, callout, error_reporting_url, self.session.elapsed_millis())
    }

    fn fail(&self, callout: &ResolvedCallout, error: RtcErrorCode) -> CalloutResult {
        self.reject(&callout.callout, error, callout.error_reporting_url.as_deref())
    }

    /// Run one callout to completion.
    ///
    /// Returns `None` only when the still-current check fails or the
    /// collaborators report a cancellation.
    #[instrument(name = "rtc_dispatch", skip_all, fields(callout = %callout.callout))]
    pub async fn dispatch(&self, callout: ResolvedCallout) -> Option<CalloutResult> {
        let mut remaining = self.budget;

        // Phase 1: macro expansion
        let expand_started = Instant::now();
        let expanded = time::timeout(
            remaining,
            self.resolver
                .expand_async(&callout.template, &callout.macros, &callout.allowlist),
        )
        .await;

        let url = match expanded {
            Ok(Ok(url)) => url,
            Ok(Err(ExpandError::Cancelled)) => {
                debug!("Macro expansion cancelled");
                return None;
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Macro expansion failed");
                return Some(self.fail(&callout, RtcErrorCode::MacroExpandTimeout));
            }
            Err(_) => return Some(self.fail(&callout, RtcErrorCode::MacroExpandTimeout)),
        };

        if !self.still_current.check() {
            debug!("Ad request no longer current after macro expansion");
            return None;
        }
        remaining = remaining.saturating_sub(expand_started.elapsed());

        // Admission: quota, security, duplicates
        let transport = match self
            .session
            .guard()
            .admit(&url, |candidate| self.gate.classify(candidate))
        {
            Ok(transport) => transport,
            Err(code) => return Some(self.fail(&callout, code)),
        };
        let url = truncate_url(url);

        // Phase 2: fetch
        debug!(url = %url, remaining_ms = remaining.as_millis() as u64, "Sending RTC callout");
        let outcome = time::timeout(remaining, self.fetch(&url, transport))
            .await
            .unwrap_or(FetchOutcome::Failed(RtcErrorCode::Timeout));

        let rtc_time = self.session.elapsed_millis();
        match outcome {
            FetchOutcome::Response(response) => {
                debug!(rtc_time_ms = rtc_time, has_response = response.is_some(), "RTC callout succeeded");
                Some(CalloutResult::success(callout.callout, response, rtc_time))
            }
            FetchOutcome::Failed(code) => Some(self.reporter.report(
                code,
                &callout.callout,
                callout.error_reporting_url.as_deref(),
                rtc_time,
            )),
            FetchOutcome::Cancelled => {
                debug!("Ad request no longer current during fetch");
                None
            }
        }
    }

    async fn fetch(&self, url: &str, transport: Transport) -> FetchOutcome {
        match transport {
            Transport::Http => {
                let options = FetchOptions {
                    credentials: Credentials::Include,
                };
                let response = match self.http.fetch_json(url, options).await {
                    Ok(response) => response,
                    Err(e) => return FetchOutcome::from_transport_error(&e),
                };
                if !self.still_current.check() {
                    return FetchOutcome::Cancelled;
                }

                let text = match response.text().await {
                    Ok(text) => text,
                    Err(e) => return FetchOutcome::from_transport_error(&e),
                };
                if !self.still_current.check() {
                    return FetchOutcome::Cancelled;
                }

                FetchOutcome::from_normalized(normalize_body(&text))
            }
            Transport::Script => {
                let value = match self.http.fetch_script(url).await {
                    Ok(value) => value,
                    Err(e) => return FetchOutcome::from_transport_error(&e),
                };
                if !self.still_current.check() {
                    return FetchOutcome::Cancelled;
                }

                FetchOutcome::from_normalized(normalize_script(value))
            }
        }
    }
}

/// Cut an over-long URL, drop a dangling percent-escape and mark it truncated.
pub fn truncate_url(url: String) -> String {
    if url.len() <= MAX_URL_LENGTH {
        return url;
    }

    let mut cut = MAX_URL_LENGTH - TRUNCATION_SUFFIX.len();
    while !url.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = strip_dangling_escape(&url[..cut]);
    format!("{head}{TRUNCATION_SUFFIX}")
}

/// Strip a trailing `%` or `%` plus one word character.
fn strip_dangling_escape(s: &str) -> &str {
    let bytes = s.as_bytes();
    match bytes {
        [.., b'%'] => &s[..s.len() - 1],
        [.., b'%', last] if last.is_ascii_alphanumeric() || *last == b'_' => &s[..s.len() - 2],
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use adapters::mock::{MockFailure, MockHttpClient, MockReply};
    use adapters::{StandardUrlValidator, TemplateResolver};
    use contracts::{MacroTable, MacroValue};
    use serde_json::json;

    use crate::macros::build_allowlist;
    use crate::reporter::ReporterConfig;

    fn callout(template: &str, macros: MacroTable) -> ResolvedCallout {
        ResolvedCallout {
            callout: crate::resolver::callout_label(template),
            template: template.to_string(),
            allowlist: build_allowlist(&macros),
            macros,
            error_reporting_url: Some("https://err.test/?e=ERROR_TYPE".to_string()),
        }
    }

    fn slow_macro(name: &str, delay_ms: u64) -> MacroTable {
        let mut macros = MacroTable::new();
        macros.insert(
            name.to_string(),
            MacroValue::deferred(move |_| async move {
                time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Some("v".to_string()))
            }),
        );
        macros
    }

    struct Harness {
        session: Session,
        http: MockHttpClient,
        reporter_config: ReporterConfig,
    }

    impl Harness {
        fn new(http: MockHttpClient) -> Self {
            Self {
                session: Session::new(),
                http,
                reporter_config: ReporterConfig {
                    always_report: true,
                    ..ReporterConfig::default()
                },
            }
        }

        fn dispatcher(
            &self,
            still_current: StillCurrent,
            timeout_millis: u64,
        ) -> BudgetedDispatcher<'_, TemplateResolver, MockHttpClient, StandardUrlValidator> {
            BudgetedDispatcher::new(
                &self.session,
                &TemplateResolver,
                &self.http,
                SecurityGate::new(&StandardUrlValidator),
                ErrorReporter::new(&TemplateResolver, &self.http, &self.reporter_config),
                still_current,
                timeout_millis,
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_with_response() {
        let harness = Harness::new(
            MockHttpClient::new()
                .with_reply("https://a.test/x", MockReply::json(json!({"targeting": {"k": "v"}})))
                .with_default_reply(MockReply::json(json!({})).delayed(Duration::from_millis(30))),
        );
        let dispatcher = harness.dispatcher(StillCurrent::always(), 1000);

        let result = dispatcher
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(result.callout, "a.test/x");
        assert_eq!(result.response, Some(json!({"targeting": {"k": "v"}})));
        assert_eq!(result.error, None);
        assert_eq!(harness.http.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_body_is_success_without_response() {
        let harness = Harness::new(MockHttpClient::new().with_default_reply(MockReply::body("")));
        let result = harness
            .dispatcher(StillCurrent::always(), 1000)
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(result, CalloutResult::success("a.test/x", None, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_json() {
        let harness = Harness::new(MockHttpClient::new().with_default_reply(MockReply::body("{oops")));
        let result = harness
            .dispatcher(StillCurrent::always(), 1000)
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(result.error, Some(RtcErrorCode::MalformedJsonResponse));
        assert_eq!(harness.http.beacons(), vec!["https://err.test/?e=4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_body_is_malformed() {
        let harness = Harness::new(MockHttpClient::new().with_default_reply(MockReply::body("null")));
        let result = harness
            .dispatcher(StillCurrent::always(), 1000)
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(result.error, Some(RtcErrorCode::MalformedJsonResponse));
        assert_eq!(result.response, None);
        assert_eq!(harness.http.beacons(), vec!["https://err.test/?e=4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures() {
        let harness = Harness::new(
            MockHttpClient::new()
                .with_reply("https://a.test/net", MockReply::failure(MockFailure::Network))
                .with_reply("https://a.test/slow", MockReply::failure(MockFailure::Timeout))
                .with_reply("https://a.test/503", MockReply::failure(MockFailure::Status(503)))
                .with_reply("https://a.test/body", MockReply::body_failure(MockFailure::Network)),
        );
        let dispatcher = harness.dispatcher(StillCurrent::always(), 1000);

        let cases = [
            ("https://a.test/net", RtcErrorCode::NetworkFailure),
            ("https://a.test/slow", RtcErrorCode::Timeout),
            ("https://a.test/503", RtcErrorCode::NetworkFailure),
            ("https://a.test/body", RtcErrorCode::NetworkFailure),
        ];
        for (url, expected) in cases {
            let result = dispatcher.dispatch(callout(url, MacroTable::new())).await.unwrap();
            assert_eq!(result.error, Some(expected), "url: {url}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_exceeding_budget_times_out() {
        let harness = Harness::new(
            MockHttpClient::new()
                .with_default_reply(MockReply::json(json!({})).delayed(Duration::from_millis(500))),
        );
        let result = harness
            .dispatcher(StillCurrent::always(), 200)
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(result.error, Some(RtcErrorCode::Timeout));
        assert_eq!(result.rtc_time, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_body_counts_against_budget() {
        let harness = Harness::new(
            MockHttpClient::new().with_default_reply(
                MockReply::json(json!({}))
                    .delayed(Duration::from_millis(100))
                    .with_body_delay(Duration::from_millis(150)),
            ),
        );
        let result = harness
            .dispatcher(StillCurrent::always(), 200)
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(result.error, Some(RtcErrorCode::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_macro_expansion_over_budget() {
        let harness = Harness::new(MockHttpClient::new());
        let result = harness
            .dispatcher(StillCurrent::always(), 100)
            .dispatch(callout("https://a.test/?v=SLOW", slow_macro("SLOW", 150)))
            .await
            .unwrap();
        assert_eq!(result.error, Some(RtcErrorCode::MacroExpandTimeout));
        assert_eq!(result.rtc_time, 100);
        assert_eq!(harness.http.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expansion_time_is_deducted_from_fetch_budget() {
        // 60ms expansion + 60ms fetch exceeds a 100ms budget even though
        // each phase alone fits.
        let harness = Harness::new(
            MockHttpClient::new()
                .with_default_reply(MockReply::json(json!({})).delayed(Duration::from_millis(60))),
        );
        let result = harness
            .dispatcher(StillCurrent::always(), 100)
            .dispatch(callout("https://a.test/?v=SLOW", slow_macro("SLOW", 60)))
            .await
            .unwrap();
        assert_eq!(result.error, Some(RtcErrorCode::Timeout));
        assert_eq!(result.rtc_time, 100);
        assert_eq!(harness.http.requests(), vec!["https://a.test/?v=v"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insecure_url_never_fetched() {
        let harness = Harness::new(MockHttpClient::new());
        let result = harness
            .dispatcher(StillCurrent::always(), 1000)
            .dispatch(callout("http://insecure.test/x", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(result.error, Some(RtcErrorCode::InsecureUrl));
        assert_eq!(result.callout, "insecure.test/x");
        assert_eq!(harness.http.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_transport() {
        let harness = Harness::new(
            MockHttpClient::new()
                .with_reply("amp-script:rtc.ok", MockReply::script(json!({"targeting": {}})))
                .with_reply("amp-script:rtc.bad", MockReply::script(json!(7))),
        );
        let dispatcher = harness.dispatcher(StillCurrent::always(), 1000);

        let ok = dispatcher
            .dispatch(callout("amp-script:rtc.ok", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(ok.response, Some(json!({"targeting": {}})));

        let bad = dispatcher
            .dispatch(callout("amp-script:rtc.bad", MacroTable::new()))
            .await
            .unwrap();
        assert_eq!(bad.error, Some(RtcErrorCode::MalformedJsonResponse));
        assert_eq!(harness.http.script_call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_after_expansion() {
        let harness = Harness::new(MockHttpClient::new());
        let result = harness
            .dispatcher(StillCurrent::new(|| false), 1000)
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await;
        assert_eq!(result, None);
        assert_eq!(harness.http.request_count(), 0);
        assert!(harness.http.beacons().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_reading_body() {
        let current = Arc::new(AtomicBool::new(true));
        let harness = Harness::new(
            MockHttpClient::new()
                .with_default_reply(MockReply::json(json!({})).with_body_delay(Duration::from_millis(50))),
        );
        let still_current = {
            let current = current.clone();
            StillCurrent::new(move || current.load(Ordering::SeqCst))
        };
        let dispatcher = harness.dispatcher(still_current, 1000);

        let flip = async {
            time::sleep(Duration::from_millis(10)).await;
            current.store(false, Ordering::SeqCst);
        };
        let (result, ()) = tokio::join!(
            dispatcher.dispatch(callout("https://a.test/x", MacroTable::new())),
            flip
        );
        assert_eq!(result, None);
        assert_eq!(harness.http.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_cancellation_produces_no_result() {
        let harness = Harness::new(
            MockHttpClient::new().with_default_reply(MockReply::failure(MockFailure::Cancelled)),
        );
        let result = harness
            .dispatcher(StillCurrent::always(), 1000)
            .dispatch(callout("https://a.test/x", MacroTable::new()))
            .await;
        assert_eq!(result, None);
    }

    #[test]
    fn test_truncate_url_boundary() {
        let base = "https://a.test/?q=";
        let exact = format!("{base}{}", "a".repeat(MAX_URL_LENGTH - base.len()));
        assert_eq!(truncate_url(exact.clone()), exact);

        let long = format!("{exact}b");
        let truncated = truncate_url(long.clone());
        assert_eq!(truncated.len(), MAX_URL_LENGTH);
        assert!(truncated.ends_with("&__trunc__=1"));
        assert_eq!(
            &truncated[..MAX_URL_LENGTH - 12],
            &long[..MAX_URL_LENGTH - 12]
        );
    }

    #[test]
    fn test_truncate_strips_dangling_escape() {
        let cut = MAX_URL_LENGTH - TRUNCATION_SUFFIX.len();
        let base = "https://a.test/?q=";

        // "%2" straddles the cut point
        let mut url = format!("{base}{}", "a".repeat(cut - base.len() - 2));
        url.push_str("%2C");
        url.push_str(&"z".repeat(100));
        let truncated = truncate_url(url);
        assert!(truncated.ends_with("aa&__trunc__=1"), "got tail: {}", &truncated[truncated.len() - 20..]);
        assert_eq!(truncated.len(), cut - 2 + TRUNCATION_SUFFIX.len());

        // lone "%" right before the cut point
        let mut url = format!("{base}{}", "a".repeat(cut - base.len() - 1));
        url.push_str("%2C");
        url.push_str(&"z".repeat(100));
        let truncated = truncate_url(url);
        assert_eq!(truncated.len(), cut - 1 + TRUNCATION_SUFFIX.len());
        assert!(truncated.ends_with("aa&__trunc__=1"));
    }
}
