use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 报表请求参数 (提交后不可变)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub business_unit: String,
    /// 采购订单号过滤器, 支持通配 ("*" = 全部)
    pub po_number_filter: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub output_format: OutputFormat,
}

/// 报表输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Spreadsheet,
}

impl OutputFormat {
    /// 远程服务侧的格式标识
    pub fn as_wire(&self) -> &'static str {
        match self {
            OutputFormat::Spreadsheet => "excel",
        }
    }
}

/// 调度作业状态
///
/// 远程状态字符串的语义:
/// - SUCCESS: 生成和投递都成功
/// - PROBLEM: 生成成功但投递/通知失败, 产物仍然可下载
/// - 其余非终态字符串一律视为仍在运行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Submitted,
    Running,
    Succeeded,
    SucceededWithWarnings,
    Failed,
    Cancelled,
    Skipped,
}

impl JobStatus {
    /// 解析远程服务返回的状态字符串
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SUCCESS" => JobStatus::Succeeded,
            "PROBLEM" => JobStatus::SucceededWithWarnings,
            "FAILED" => JobStatus::Failed,
            "CANCELLED" | "CANCELED" => JobStatus::Cancelled,
            "SKIPPED" => JobStatus::Skipped,
            _ => JobStatus::Running,
        }
    }

    /// 终态成功: 产物已可下载
    pub fn is_terminal_success(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::SucceededWithWarnings
        )
    }

    /// 终态失败: 不会再产出任何工件
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Cancelled | JobStatus::Skipped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCESS",
            JobStatus::SucceededWithWarnings => "PROBLEM",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Skipped => "SKIPPED",
        };
        write!(f, "{}", label)
    }
}

/// 调度作业 (作业ID在提交时分配, 实例ID在完成后解析)
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub job_id: String,
    pub instance_id: Option<String>,
    pub status: JobStatus,
}

/// 作业ID → 实例ID 的解析结果
///
/// FallbackGuessed 表示实例查询失败后用 "作业ID + 1" 推算的结果,
/// 该启发式依赖远程服务未文档化的ID分配行为, 只能作为降级路径,
/// 返回前必须以 warn 级别日志暴露给调用方。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InstanceResolution {
    Resolved { instance_id: String },
    FallbackGuessed { instance_id: String },
}

impl InstanceResolution {
    pub fn instance_id(&self) -> &str {
        match self {
            InstanceResolution::Resolved { instance_id }
            | InstanceResolution::FallbackGuessed { instance_id } => instance_id,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, InstanceResolution::FallbackGuessed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_mapping() {
        assert_eq!(JobStatus::from_remote("SUCCESS"), JobStatus::Succeeded);
        assert_eq!(
            JobStatus::from_remote("problem"),
            JobStatus::SucceededWithWarnings
        );
        assert_eq!(JobStatus::from_remote("FAILED"), JobStatus::Failed);
        assert_eq!(JobStatus::from_remote("Cancelled"), JobStatus::Cancelled);
        assert_eq!(JobStatus::from_remote("CANCELED"), JobStatus::Cancelled);
        assert_eq!(JobStatus::from_remote("SKIPPED"), JobStatus::Skipped);
        assert_eq!(JobStatus::from_remote("SCHEDULED"), JobStatus::Running);
        assert_eq!(JobStatus::from_remote(""), JobStatus::Running);
    }

    #[test]
    fn problem_status_is_downloadable() {
        assert!(JobStatus::SucceededWithWarnings.is_terminal_success());
        assert!(!JobStatus::SucceededWithWarnings.is_terminal_failure());
    }

    #[test]
    fn skipped_is_terminal_failure() {
        assert!(JobStatus::Skipped.is_terminal_failure());
    }

    #[test]
    fn fallback_resolution_is_flagged() {
        let guessed = InstanceResolution::FallbackGuessed {
            instance_id: "101".to_string(),
        };
        assert!(guessed.is_fallback());
        assert_eq!(guessed.instance_id(), "101");

        let resolved = InstanceResolution::Resolved {
            instance_id: "101".to_string(),
        };
        assert!(!resolved.is_fallback());
    }
}
