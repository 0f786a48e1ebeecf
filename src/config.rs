use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub bip: BipConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 远程报表服务接入配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BipConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// 远程目录中的报表定义路径
    pub report_path: String,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
}

/// 报表业务参数
///
/// 豁免PO清单和默认起始日期属于会随业务变化的外部数据,
/// 只能从配置注入, 不允许写死在对账算法里。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub business_unit: String,
    pub po_number_filter: String,
    pub default_from_date: NaiveDate,
    /// 本位币差额强制清零的PO号集合
    pub exempt_po_numbers: HashSet<String>,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            bip: BipConfig {
                endpoint: std::env::var("BIP_ENDPOINT")
                    .unwrap_or_else(|_| "https://localhost/reportservice".to_string()),
                username: std::env::var("BIP_USERNAME").unwrap_or_default(),
                password: std::env::var("BIP_PASSWORD").unwrap_or_default(),
                report_path: std::env::var("BIP_REPORT_PATH").unwrap_or_else(|_| {
                    "/Custom/Procurement/Purchasing/PO Report/PO_RECP_INV_V8.xdo".to_string()
                }),
                poll_interval_secs: std::env::var("BIP_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                poll_timeout_secs: std::env::var("BIP_POLL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            },
            report: ReportConfig {
                business_unit: std::env::var("REPORT_BUSINESS_UNIT")
                    .unwrap_or_else(|_| "Saudi Arabia BU".to_string()),
                po_number_filter: std::env::var("REPORT_PO_FILTER")
                    .unwrap_or_else(|_| "*".to_string()),
                default_from_date: parse_default_from_date(
                    &std::env::var("REPORT_DEFAULT_FROM_DATE")
                        .unwrap_or_else(|_| "01-01-2020".to_string()),
                ),
                exempt_po_numbers: std::env::var("REPORT_EXEMPT_PO_NUMBERS")
                    .unwrap_or_else(|_| "SA-AFR-PO-170664,SA-AFR-PO-178578".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        }
    }
}

/// 日期格式 MM-DD-YYYY, 无法解析时回退到纪元日期并告警
fn parse_default_from_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%m-%d-%Y").unwrap_or_else(|_| {
        tracing::warn!("invalid REPORT_DEFAULT_FROM_DATE '{}', using 1970-01-01", raw);
        NaiveDate::default()
    })
}
