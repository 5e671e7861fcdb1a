//! 同意状态过滤
//!
//! 当同意状态不足时，只保留声明了 `sendRegardlessOfConsentState` 的条目。

use contracts::{ConsentOverride, ConsentState, RtcConfig};
use tracing::{debug, warn};

/// 按当前同意状态过滤 urls 与 vendors
///
/// 状态缺失、`SUFFICIENT`、`UNKNOWN_NOT_REQUIRED` 时原样返回。
pub fn filter_for_consent(mut config: RtcConfig, state: Option<ConsentState>) -> RtcConfig {
    let Some(state) = state else {
        return config;
    };
    if state.permits_all() {
        return config;
    }

    let globally_valid = is_valid_for_consent_state(
        config.send_regardless_of_consent_state.as_ref(),
        state,
        false,
    );

    let (urls_before, vendors_before) = (config.urls.len(), config.vendors.len());

    config
        .urls
        .retain(|entry| is_valid_for_consent_state(entry.consent_override(), state, globally_valid));
    config.vendors.retain(|vendor| {
        is_valid_for_consent_state(
            vendor.send_regardless_of_consent_state.as_ref(),
            state,
            globally_valid,
        )
    });

    debug!(
        consent_state = %state,
        globally_valid,
        urls_dropped = urls_before - config.urls.len(),
        vendors_dropped = vendors_before - config.vendors.len(),
        "RTC consent filter applied"
    );

    config
}

/// 判断单个条目在当前同意状态下是否可以发出
///
/// - 缺失或 `false`：回退到 `fallback`
/// - `true`：保留
/// - 状态名数组：包含当前状态时保留，否则丢弃；无法识别的名字仅警告
/// - 其它类型：警告并回退到 `fallback`
pub fn is_valid_for_consent_state(
    consent_override: Option<&ConsentOverride>,
    state: ConsentState,
    fallback: bool,
) -> bool {
    match consent_override {
        None | Some(ConsentOverride::Flag(false)) => fallback,
        Some(ConsentOverride::Flag(true)) => true,
        Some(ConsentOverride::States(names)) => {
            let mut matched = false;
            for name in names {
                match ConsentState::from_name(name) {
                    Some(listed) => matched |= listed == state,
                    None => warn!(name = %name, "Invalid RTC consent state name, ignored"),
                }
            }
            matched
        }
        Some(ConsentOverride::Invalid(value)) => {
            warn!(
                value = %value,
                "Invalid sendRegardlessOfConsentState, expected boolean or array of consent states"
            );
            fallback
        }
    }
}
