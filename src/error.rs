use crate::models::JobStatus;
use thiserror::Error;

/// 远程报表服务传输层错误 (不区分具体协议)
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Transport(err.to_string())
    }
}

/// 报表获取阶段错误 (提交 → 轮询 → 实例解析 → 下载)
#[derive(Debug, Error)]
pub enum FetchError {
    /// 远程拒绝调度请求, 或响应中没有可识别的作业ID
    #[error("report submission failed: {0}")]
    Submission(String),

    /// 远程报告终态失败 (FAILED / CANCELLED / SKIPPED)
    #[error("job {job_id} finished with status {status}")]
    JobFailed { job_id: String, status: JobStatus },

    /// 轮询超出配置的时间预算
    #[error("timed out waiting for job {job_id}")]
    Timeout { job_id: String },

    /// 作业成功但没有任何输出描述符
    #[error("no output found for instance {instance_id}")]
    NoOutput { instance_id: String },

    /// 输出描述符缺少文档ID
    #[error("output descriptor for instance {instance_id} has no output id")]
    NoOutputId { instance_id: String },

    /// 实例查询失败且作业ID无法用于回退推算
    #[error("cannot resolve an instance id for job {job_id}")]
    InstanceUnresolved { job_id: String },

    /// base64 文档解码失败
    #[error("document decode failed: {0}")]
    Decode(String),

    /// 调用方通过取消令牌放弃了作业
    #[error("job was cancelled by the caller")]
    Cancelled,

    /// 下载阶段传输错误, 不重试直接上抛
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// 报表加工阶段错误 (合并 → 对账 → 导出)
#[derive(Debug, Error)]
pub enum ProcessError {
    /// 工件没有工作表, 或首个工作表没有表格数据
    #[error("artifact contains no usable sheet data")]
    EmptyArtifact,

    #[error("workbook parse error: {0}")]
    Workbook(String),

    #[error("required column '{column}' missing from combined report")]
    MissingColumn { column: String },

    /// 交易币金额为零而本位币金额非零, 无法推导汇率
    #[error("zero transaction-currency base for PO {po_number}, invoice {invoice_number}")]
    ZeroConversionBase {
        po_number: String,
        invoice_number: String,
    },

    #[error("csv write error: {0}")]
    Csv(String),
}

/// 端到端管线错误: 获取或加工任一阶段的失败原样上抛
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}
