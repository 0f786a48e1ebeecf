use crate::config::BipConfig;
use crate::error::ServiceError;
use crate::models::{JobStatus, ReportRequest};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 远程报表服务接口
///
/// 核心管线只依赖这五个操作, 不关心传输协议和鉴权方式。
#[async_trait]
pub trait ReportService: Send + Sync {
    /// 提交调度请求, 返回作业ID
    async fn submit_job(&self, request: &ReportRequest) -> Result<String, ServiceError>;

    /// 查询作业状态
    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus, ServiceError>;

    /// 查询作业的实例ID列表 (远程返回顺序必须原样保留)
    async fn list_instances(&self, job_id: &str) -> Result<Vec<String>, ServiceError>;

    /// 查询实例的输出描述符列表
    async fn list_outputs(&self, instance_id: &str) -> Result<Vec<OutputDescriptor>, ServiceError>;

    /// 拉取输出文档内容
    async fn fetch_document(&self, output_id: &str) -> Result<DocumentData, ServiceError>;
}

/// 输出描述符
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDescriptor {
    #[serde(default)]
    pub output_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// 文档内容: 二进制或 base64 文本 (由远程决定)
#[derive(Debug, Clone)]
pub enum DocumentData {
    Binary(Vec<u8>),
    Text(String),
}

/// BI Publisher 风格调度服务的 HTTP 客户端
pub struct BipClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    report_path: String,
}

#[derive(Debug, Serialize)]
struct WireParameter<'a> {
    name: &'a str,
    values: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ScheduleReportBody<'a> {
    report_path: &'a str,
    output_format: &'a str,
    parameters: Vec<WireParameter<'a>>,
}

#[derive(Debug, Deserialize)]
struct ScheduleReportResponse {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct JobInstancesResponse {
    #[serde(default)]
    instances: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JobOutputsResponse {
    #[serde(default)]
    outputs: Vec<OutputDescriptor>,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    data: String,
}

impl BipClient {
    pub fn new(config: &BipConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            report_path: config.report_path.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let resp = self
            .http
            .get(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Self::parse_json(resp).await
    }

    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ServiceError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ReportService for BipClient {
    async fn submit_job(&self, request: &ReportRequest) -> Result<String, ServiceError> {
        let body = ScheduleReportBody {
            report_path: &self.report_path,
            output_format: request.output_format.as_wire(),
            parameters: vec![
                WireParameter {
                    name: "p_business_group",
                    values: vec![request.business_unit.clone()],
                },
                WireParameter {
                    name: "p_po_number",
                    values: vec![request.po_number_filter.clone()],
                },
                WireParameter {
                    name: "p_From_date",
                    values: vec![request.from_date.format("%m-%d-%Y").to_string()],
                },
                WireParameter {
                    name: "p_To_date",
                    values: vec![request.to_date.format("%m-%d-%Y").to_string()],
                },
            ],
        };

        let resp = self
            .http
            .post(self.url("/jobs"))
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        let parsed: ScheduleReportResponse = Self::parse_json(resp).await?;

        // 不同版本的服务把ID放在不同字段里
        parsed
            .job_id
            .or(parsed.request_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ServiceError::Malformed("response carries no job id".to_string()))
    }

    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus, ServiceError> {
        let resp: JobStatusResponse = self.get_json(&format!("/jobs/{}/status", job_id)).await?;
        Ok(JobStatus::from_remote(&resp.status))
    }

    async fn list_instances(&self, job_id: &str) -> Result<Vec<String>, ServiceError> {
        let resp: JobInstancesResponse =
            self.get_json(&format!("/jobs/{}/instances", job_id)).await?;
        Ok(resp.instances)
    }

    async fn list_outputs(&self, instance_id: &str) -> Result<Vec<OutputDescriptor>, ServiceError> {
        let resp: JobOutputsResponse = self
            .get_json(&format!("/instances/{}/outputs", instance_id))
            .await?;
        Ok(resp.outputs)
    }

    async fn fetch_document(&self, output_id: &str) -> Result<DocumentData, ServiceError> {
        let resp = self
            .http
            .get(self.url(&format!("/outputs/{}/document", output_id)))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);

        if is_json {
            let doc: DocumentResponse = resp
                .json()
                .await
                .map_err(|e| ServiceError::Malformed(e.to_string()))?;
            Ok(DocumentData::Text(doc.data))
        } else {
            Ok(DocumentData::Binary(resp.bytes().await?.to_vec()))
        }
    }
}
