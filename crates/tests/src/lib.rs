//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试 (结果的 JSON 形状)
//! - 模拟 e2e 测试：完整 RTC 批次，使用内存中的 HTTP 客户端与暂停的 tokio 时钟

#[cfg(test)]
mod contract_tests {
    use contracts::{CalloutResult, RtcErrorCode};
    use serde_json::json;

    #[test]
    fn test_callout_result_shape() {
        let error = CalloutResult::failure("doesnotexist", RtcErrorCode::UnknownVendor, 0);
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"callout": "doesnotexist", "error": "UnknownVendor", "rtcTime": 0})
        );

        let success = CalloutResult::success("a.test/x", Some(json!({"targeting": {}})), 12);
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            json!({"callout": "a.test/x", "response": {"targeting": {}}, "rtcTime": 12})
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use adapters::mock::{MockHttpClient, MockReply};
    use adapters::{StandardUrlValidator, TemplateResolver};
    use config_loader::ConfigLoader;
    use contracts::{
        CalloutResult, ConsentSnapshot, ConsentState, MacroTable, MacroValue, RtcErrorCode,
        StillCurrent, MAX_URL_LENGTH,
    };
    use dispatcher::{merge_rtc_responses, RealTimeConfigManager, ReporterConfig};
    use serde_json::{json, Map};

    type Manager = RealTimeConfigManager<TemplateResolver, MockHttpClient, StandardUrlValidator>;

    fn manager(http: MockHttpClient) -> Manager {
        RealTimeConfigManager::new(TemplateResolver, http, StandardUrlValidator)
            .with_reporter_config(ReporterConfig {
                page_href: "https://publisher.test/article".to_string(),
                always_report: true,
                ..ReporterConfig::default()
            })
    }

    async fn execute(manager: &Manager, config: &str) -> Option<Vec<CalloutResult>> {
        manager
            .execute(
                config,
                MacroTable::new(),
                &ConsentSnapshot::default(),
                StillCurrent::always(),
            )
            .await
    }

    fn errors(results: &[CalloutResult]) -> Vec<Option<RtcErrorCode>> {
        results.iter().map(|r| r.error).collect()
    }

    /// 超过 5 个 callout 时，只有前 5 个被发出
    #[tokio::test(start_paused = true)]
    async fn test_e2e_callout_cap() {
        let manager = manager(MockHttpClient::new());
        let urls: Vec<String> = (1..=7).map(|i| format!("https://a.test/{i}")).collect();
        let config = json!({ "urls": urls }).to_string();

        let results = execute(&manager, &config).await.unwrap();

        assert_eq!(results.len(), 7);
        assert_eq!(manager.http().request_count(), 5);
        assert!(results[..5].iter().all(|r| !r.is_error()));
        assert_eq!(
            errors(&results[5..]),
            vec![Some(RtcErrorCode::MaxCalloutsExceeded); 2]
        );
    }

    /// 重复 URL 只发出一次网络请求
    #[tokio::test(start_paused = true)]
    async fn test_e2e_duplicate_url() {
        let manager = manager(MockHttpClient::new());
        let mut macros = MacroTable::new();
        macros.insert("PATH".to_string(), MacroValue::constant("x"));

        // Different templates, same URL after substitution
        let results = manager
            .execute(
                r#"{"urls": ["https://a.test/x", "https://a.test/PATH"]}"#,
                macros,
                &ConsentSnapshot::default(),
                StillCurrent::always(),
            )
            .await
            .unwrap();

        assert_eq!(errors(&results), vec![None, Some(RtcErrorCode::DuplicateUrl)]);
        assert_eq!(manager.http().requests(), vec!["https://a.test/x"]);
    }

    /// 不安全 URL 不会到达 HTTP 客户端
    #[tokio::test(start_paused = true)]
    async fn test_e2e_insecure_url() {
        let manager = manager(MockHttpClient::new());

        let results = execute(&manager, r#"{"urls": ["http://insecure.test/x"]}"#)
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![CalloutResult::failure("insecure.test/x", RtcErrorCode::InsecureUrl, 0)]
        );
        assert_eq!(manager.http().request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_unknown_vendor() {
        let manager = manager(MockHttpClient::new());

        let results = execute(&manager, r#"{"vendors": {"doesnotexist": {}}}"#)
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![CalloutResult::failure("doesnotexist", RtcErrorCode::UnknownVendor, 0)]
        );
        assert_eq!(manager.http().request_count(), 0);
    }

    /// timeoutMillis: 2000 被钳制为 1000
    #[tokio::test(start_paused = true)]
    async fn test_e2e_timeout_clamped() {
        let config = r#"{"urls": ["https://a.test/x"], "timeoutMillis": 2000}"#;
        assert_eq!(
            ConfigLoader::load_from_str(config, &StandardUrlValidator)
                .unwrap()
                .timeout_millis,
            1000
        );

        let manager = manager(MockHttpClient::new().with_default_reply(
            MockReply::json(json!({})).delayed(Duration::from_millis(1500)),
        ));
        let results = execute(&manager, config).await.unwrap();

        assert_eq!(
            results,
            vec![CalloutResult::failure("a.test/x", RtcErrorCode::Timeout, 1000)]
        );
        assert_eq!(manager.http().requests(), vec!["https://a.test/x"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_validation_idempotent() {
        let config = r#"{
            "vendors": {"medianet": {"CID": "abc"}},
            "urls": ["https://a.test/x", {"url": "https://b.test/y", "errorReportingUrl": "https://e.test/"}],
            "timeoutMillis": "750ms",
            "errorReportingUrl": "http://insecure.test/err"
        }"#;
        let first = ConfigLoader::load_from_str(config, &StandardUrlValidator).unwrap();
        let second = ConfigLoader::load_from_str(config, &StandardUrlValidator).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.timeout_millis, 750);
        assert_eq!(first.error_reporting_url, None);
    }

    /// INSUFFICIENT 同意状态下，无覆盖的 vendor 不产生任何结果
    #[tokio::test(start_paused = true)]
    async fn test_e2e_insufficient_consent_drops_vendor() {
        let manager = manager(MockHttpClient::new());
        let config = r#"{
            "vendors": {
                "medianet": {"CID": "abc"},
                "prebidappnexus": {"PLACEMENT_ID": "1", "sendRegardlessOfConsentState": ["INSUFFICIENT"]}
            }
        }"#;

        let results = manager
            .execute(
                config,
                MacroTable::new(),
                &ConsentSnapshot::with_state(ConsentState::Insufficient),
                StillCurrent::always(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].callout, "prebidappnexus");
        assert_eq!(manager.http().request_count(), 1);
    }

    /// 宏展开超出预算：MacroExpandTimeout，且不发出网络请求
    #[tokio::test(start_paused = true)]
    async fn test_e2e_macro_expansion_over_budget() {
        let manager = manager(MockHttpClient::new());
        let mut macros = MacroTable::new();
        macros.insert(
            "SLOW".to_string(),
            MacroValue::deferred(|_| async {
                tokio::time::sleep(Duration::from_millis(5000)).await;
                Ok(Some("late".to_string()))
            }),
        );

        let results = manager
            .execute(
                r#"{"urls": ["https://a.test/?v=SLOW"], "timeoutMillis": 300}"#,
                macros,
                &ConsentSnapshot::default(),
                StillCurrent::always(),
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![CalloutResult::failure("a.test/", RtcErrorCode::MacroExpandTimeout, 300)]
        );
        assert_eq!(manager.http().request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_truncation_boundary() {
        let base = "https://a.test/?q=";
        let exact = format!("{base}{}", "a".repeat(MAX_URL_LENGTH - base.len()));
        let long = format!("{exact}a");
        let manager = manager(MockHttpClient::new());

        let results = execute(&manager, &json!({ "urls": [exact.clone(), long] }).to_string())
            .await
            .unwrap();

        assert!(results.iter().all(|r| !r.is_error()));
        let requests = manager.http().requests();
        assert_eq!(requests[0], exact);
        assert_eq!(requests[1].len(), MAX_URL_LENGTH);
        assert!(requests[1].ends_with("&__trunc__=1"));
    }

    /// 结果顺序为声明顺序 (先自定义 URL，后 vendor)，与完成顺序无关
    #[tokio::test(start_paused = true)]
    async fn test_e2e_declaration_order() {
        let http = MockHttpClient::new()
            .with_reply(
                "https://slow.test/",
                MockReply::json(json!({})).delayed(Duration::from_millis(400)),
            )
            .with_default_reply(MockReply::json(json!({})).delayed(Duration::from_millis(5)));
        let manager = manager(http);
        let config = r#"{
            "vendors": {"medianet": {"CID": "c"}, "doesnotexist": {}},
            "urls": ["https://slow.test/", "https://fast.test/"]
        }"#;

        let results = execute(&manager, config).await.unwrap();
        let labels: Vec<&str> = results.iter().map(|r| r.callout.as_str()).collect();

        assert_eq!(labels, vec!["slow.test/", "fast.test/", "medianet", "doesnotexist"]);
        assert_eq!(results[0].rtc_time, 400);
        assert_eq!(results[1].rtc_time, 5);
    }

    /// 广告请求失效后，未完成的 callout 不返回结果
    #[tokio::test(start_paused = true)]
    async fn test_e2e_cancellation_shortens_results() {
        let http = MockHttpClient::new()
            .with_reply(
                "https://slow.test/",
                MockReply::json(json!({})).delayed(Duration::from_millis(500)),
            )
            .with_default_reply(MockReply::json(json!({})));
        let manager = manager(http);

        let current = Arc::new(AtomicBool::new(true));
        let still_current = {
            let current = current.clone();
            StillCurrent::new(move || current.load(Ordering::SeqCst))
        };
        let invalidate = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            current.store(false, Ordering::SeqCst);
        };

        let consent = ConsentSnapshot::default();
        let (results, ()) = tokio::join!(
            manager.execute(
                r#"{"urls": ["https://fast.test/", "https://slow.test/"]}"#,
                MacroTable::new(),
                &consent,
                still_current,
            ),
            invalidate
        );
        let results = results.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].callout, "fast.test/");
        assert_eq!(manager.http().request_count(), 2);
    }

    /// 错误 beacon 使用 ERROR_TYPE 与 HREF 展开
    #[tokio::test(start_paused = true)]
    async fn test_e2e_error_beacon() {
        let manager = manager(MockHttpClient::new().with_default_reply(MockReply::body("<html>")));
        let config = r#"{
            "urls": [{"url": "https://a.test/x", "errorReportingUrl": "https://err.test/?e=ERROR_TYPE&h=HREF&t=TIMEOUT"}]
        }"#;

        let results = execute(&manager, config).await.unwrap();

        assert_eq!(errors(&results), vec![Some(RtcErrorCode::MalformedJsonResponse)]);
        assert_eq!(
            manager.http().beacons(),
            vec!["https://err.test/?e=4&h=https%3A%2F%2Fpublisher.test%2Farticle&t=TIMEOUT"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_invalid_config_aborts() {
        let manager = manager(MockHttpClient::new());
        assert_eq!(execute(&manager, r#"{"vendors": {}, "urls": []}"#).await, None);
        assert_eq!(manager.http().request_count(), 0);
    }

    /// 批次结果合并到广告定向参数
    #[tokio::test(start_paused = true)]
    async fn test_e2e_merge_into_targeting() {
        let http = MockHttpClient::new()
            .with_reply(
                "https://a.test/x",
                MockReply::json(json!({
                    "targeting": {"seg": ["s1"]},
                    "categoryExclusions": ["sports"]
                }))
                .delayed(Duration::from_millis(20)),
            )
            .with_reply("https://b.test/y", MockReply::body("not json"));
        let manager = manager(http);

        let results = execute(&manager, r#"{"urls": ["https://a.test/x", "https://b.test/y"]}"#).await;
        let mut targeting = Map::new();
        let params =
            merge_rtc_responses(results.as_deref(), &mut targeting, manager.registry()).unwrap();

        assert_eq!(params.artc.as_deref(), Some("20,0"));
        assert_eq!(params.ati, "2,4");
        assert_eq!(params.ard, "a.test/x,b.test/y");
        assert_eq!(
            serde_json::Value::Object(targeting),
            json!({"targeting": {"seg": ["s1"]}, "categoryExclusions": ["sports"]})
        );
    }
}
