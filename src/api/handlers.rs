use crate::bip::BipClient;
use crate::service::{PipelineOutput, ReportPipeline};
use crate::service::exporter;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 请求体: 报表执行参数
#[derive(Debug, Deserialize)]
pub struct RunReportRequest {
    /// 缺省取配置默认起始日期
    pub from_date: Option<NaiveDate>,
    /// 缺省取当天
    pub to_date: Option<NaiveDate>,
    /// false = 只取原始工件, 不做加工
    #[serde(default = "default_process")]
    pub process: bool,
}

fn default_process() -> bool {
    true
}

/// 请求体: 按作业ID重新下载
#[derive(Debug, Deserialize)]
pub struct DownloadReportRequest {
    pub job_id: String,
}

/// 响应中的单个文件
#[derive(Debug, Serialize)]
pub struct ReportFile {
    pub filename: String,
    pub content_base64: String,
    pub size: usize,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub message: String,
    pub job_id: Option<String>,
    pub files: Vec<ReportFile>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 调度 + 轮询 + 下载 (+ 可选加工) 一体化接口
pub async fn run_report(
    State(pipeline): State<Arc<ReportPipeline<BipClient>>>,
    Json(req): Json<RunReportRequest>,
) -> Response {
    let to_date = req.to_date.unwrap_or_else(|| Local::now().date_naive());
    let request = pipeline.build_request(req.from_date, to_date);
    let from_date = request.from_date;
    let cancel = CancellationToken::new();

    match pipeline.run(request, req.process, &cancel).await {
        Ok(run) => {
            let files = match run.output {
                PipelineOutput::Raw(bytes) => vec![to_file(
                    exporter::raw_artifact_filename(from_date, to_date, Local::now().naive_local()),
                    &bytes,
                )],
                PipelineOutput::Reports(reports) => reports
                    .into_iter()
                    .map(|(filename, bytes)| to_file(filename, &bytes))
                    .collect(),
            };
            let response = ReportResponse {
                success: true,
                message: format!(
                    "Report job {} completed, {} file(s) ready",
                    run.job.job_id,
                    files.len()
                ),
                job_id: Some(run.job.job_id),
                files,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(format!("Error: {}", e)),
    }
}

/// 按已有作业ID重新下载原始工件
pub async fn download_report(
    State(pipeline): State<Arc<ReportPipeline<BipClient>>>,
    Json(req): Json<DownloadReportRequest>,
) -> Response {
    match pipeline.download_raw(&req.job_id).await {
        Ok((resolution, bytes)) => {
            let mut message = format!(
                "Downloaded {} bytes from instance {}",
                bytes.len(),
                resolution.instance_id()
            );
            if resolution.is_fallback() {
                // 降级解析结果必须让调用方可见
                message.push_str(" (instance id guessed from job id, low confidence)");
            }
            let filename = format!("PO_Report_{}.xls", req.job_id);
            let response = ReportResponse {
                success: true,
                message,
                job_id: Some(req.job_id),
                files: vec![to_file(filename, &bytes)],
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(format!("Error: {}", e)),
    }
}

fn to_file(filename: String, bytes: &[u8]) -> ReportFile {
    ReportFile {
        filename,
        content_base64: STANDARD.encode(bytes),
        size: bytes.len(),
    }
}

fn error_response(message: String) -> Response {
    let response = ReportResponse {
        success: false,
        message,
        job_id: None,
        files: Vec::new(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
}
