//! # Dispatcher
//!
//! RTC 批次调度模块。
//!
//! 负责：
//! - 为每个 callout 解析 URL 模板与宏 (`resolver`, `vendors`, `macros`)
//! - 在共享时间预算内完成宏展开与网络请求 (`dispatcher`)
//! - 限额、去重与安全检查 (`session`, `security`)
//! - 将所有结果规范化为 `CalloutResult`，按声明顺序返回 (`manager`)
//! - 合并响应到广告定向参数 (`merge`)

pub mod dispatcher;
pub mod macros;
pub mod manager;
pub mod merge;
pub mod reporter;
pub mod resolver;
pub mod security;
pub mod session;
pub mod vendors;

pub use contracts::{CalloutResult, RtcConfig, RtcErrorCode};
pub use dispatcher::{truncate_url, BudgetedDispatcher};
pub use macros::{assign_macros, build_allowlist};
pub use manager::{BatchState, RealTimeConfigManager};
pub use merge::{merge_rtc_responses, RtcParams};
pub use reporter::{ErrorReporter, ReporterConfig};
pub use resolver::{callout_label, CalloutResolver, Resolution, ResolvedCallout};
pub use security::{SecurityGate, Transport};
pub use session::{DedupGuard, Session};
pub use vendors::{VendorDefinition, VendorRegistry};
