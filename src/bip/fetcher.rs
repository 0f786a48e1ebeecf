use crate::bip::client::{DocumentData, ReportService};
use crate::error::FetchError;
use crate::models::{InstanceResolution, Job, JobStatus, ReportRequest};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 报表工件获取器: 提交 → 轮询 → 实例解析 → 下载
///
/// 轮询期间的瞬时远程错误只记日志并在时间预算内重试;
/// 提交和下载阶段的错误不重试, 原样上抛。
pub struct ArtifactFetcher<S> {
    service: S,
    poll_interval: Duration,
    timeout: Duration,
}

impl<S: ReportService> ArtifactFetcher<S> {
    pub fn new(service: S, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            service,
            poll_interval,
            timeout,
        }
    }

    /// 完整生命周期: 提交请求并取回原始工件
    pub async fn fetch_report(
        &self,
        request: &ReportRequest,
        cancel: &CancellationToken,
    ) -> Result<(Job, Vec<u8>), FetchError> {
        let job_id = self.submit(request).await?;
        info!(
            "Report job {} submitted ({} .. {})",
            job_id,
            request.from_date.format("%m-%d-%Y"),
            request.to_date.format("%m-%d-%Y")
        );

        let (status, resolution) = self.await_completion(&job_id, cancel).await?;
        let artifact = self.download(resolution.instance_id()).await?;
        info!("Downloaded {} bytes for job {}", artifact.len(), job_id);

        let job = Job {
            instance_id: Some(resolution.instance_id().to_string()),
            job_id,
            status,
        };
        Ok((job, artifact))
    }

    /// 重新下载已有作业的工件, 不再重新调度
    pub async fn download_for_job(
        &self,
        job_id: &str,
    ) -> Result<(InstanceResolution, Vec<u8>), FetchError> {
        let resolution = self.resolve_instance_id(job_id).await?;
        let artifact = self.download(resolution.instance_id()).await?;
        Ok((resolution, artifact))
    }

    /// 提交调度请求
    pub async fn submit(&self, request: &ReportRequest) -> Result<String, FetchError> {
        let job_id = self
            .service
            .submit_job(request)
            .await
            .map_err(|e| FetchError::Submission(e.to_string()))?;
        if job_id.trim().is_empty() {
            return Err(FetchError::Submission(
                "remote returned an empty job id".to_string(),
            ));
        }
        Ok(job_id)
    }

    /// 轮询直到终态, 成功后解析实例ID
    ///
    /// 取消令牌在每次远程调用前和每次休眠前各检查一次;
    /// 时间预算在每次远程调用前检查, 预算耗尽后不再发出任何远程调用。
    pub async fn await_completion(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(JobStatus, InstanceResolution), FetchError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if Instant::now() >= deadline {
                return Err(FetchError::Timeout {
                    job_id: job_id.to_string(),
                });
            }

            match self.service.get_job_status(job_id).await {
                Ok(status) if status.is_terminal_success() => {
                    info!("Job {} finished with status {}", job_id, status);
                    let resolution = self.resolve_instance_id(job_id).await?;
                    return Ok((status, resolution));
                }
                Ok(status) if status.is_terminal_failure() => {
                    return Err(FetchError::JobFailed {
                        job_id: job_id.to_string(),
                        status,
                    });
                }
                Ok(status) => {
                    tracing::debug!("Job {} still {}", job_id, status);
                }
                Err(e) => {
                    warn!("Status query for job {} failed, will retry: {}", job_id, e);
                }
            }

            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// 作业ID → 实例ID
    ///
    /// 实例查询失败或为空时退化为 "作业ID + 1" 推算, 结果只能算低置信度。
    pub async fn resolve_instance_id(
        &self,
        job_id: &str,
    ) -> Result<InstanceResolution, FetchError> {
        match self.service.list_instances(job_id).await {
            Ok(instances) => {
                if let Some(instance_id) = instances.into_iter().next() {
                    info!("Resolved job {} to instance {}", job_id, instance_id);
                    return Ok(InstanceResolution::Resolved { instance_id });
                }
                warn!("Job {} has no instances, guessing instance id", job_id);
            }
            Err(e) => {
                warn!(
                    "Instance lookup for job {} failed ({}), guessing instance id",
                    job_id, e
                );
            }
        }
        self.fallback_guess(job_id)
    }

    fn fallback_guess(&self, job_id: &str) -> Result<InstanceResolution, FetchError> {
        let numeric: i64 = job_id
            .trim()
            .parse()
            .map_err(|_| FetchError::InstanceUnresolved {
                job_id: job_id.to_string(),
            })?;
        let instance_id = (numeric + 1).to_string();
        warn!(
            "Using fallback instance id {} for job {} (job id + 1)",
            instance_id, job_id
        );
        Ok(InstanceResolution::FallbackGuessed { instance_id })
    }

    /// 下载首个输出描述符的文档内容
    pub async fn download(&self, instance_id: &str) -> Result<Vec<u8>, FetchError> {
        let outputs = self.service.list_outputs(instance_id).await?;
        let first = outputs
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NoOutput {
                instance_id: instance_id.to_string(),
            })?;
        let output_id = first
            .output_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| FetchError::NoOutputId {
                instance_id: instance_id.to_string(),
            })?;

        match self.service.fetch_document(&output_id).await? {
            DocumentData::Binary(bytes) => Ok(bytes),
            DocumentData::Text(text) => decode_base64_document(&text),
        }
    }
}

/// base64 文本解码, 先补齐缺失的 '=' 填充再解
fn decode_base64_document(text: &str) -> Result<Vec<u8>, FetchError> {
    let mut padded = text.trim().to_string();
    let missing = padded.len() % 4;
    if missing != 0 {
        padded.push_str(&"=".repeat(4 - missing));
    }
    STANDARD
        .decode(padded.as_bytes())
        .map_err(|e| FetchError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bip::client::OutputDescriptor;
    use crate::error::ServiceError;
    use crate::models::OutputFormat;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 脚本化的远程服务: 按序吐出状态, 记录调用次数
    struct ScriptedService {
        statuses: Mutex<VecDeque<JobStatus>>,
        status_calls: AtomicUsize,
        instances: Result<Vec<String>, ()>,
        outputs: Vec<OutputDescriptor>,
        document: Option<DocumentData>,
    }

    impl Default for ScriptedService {
        fn default() -> Self {
            Self {
                statuses: Mutex::new(VecDeque::new()),
                status_calls: AtomicUsize::new(0),
                instances: Ok(vec!["3001".to_string()]),
                outputs: vec![OutputDescriptor {
                    output_id: Some("9001".to_string()),
                    name: Some("PO_RECP_INV_V8.xls".to_string()),
                }],
                document: Some(DocumentData::Binary(vec![1, 2, 3])),
            }
        }
    }

    impl ScriptedService {
        fn with_statuses(statuses: &[JobStatus]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().cloned().collect()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ReportService for ScriptedService {
        async fn submit_job(&self, _request: &ReportRequest) -> Result<String, ServiceError> {
            Ok("2995978".to_string())
        }

        async fn get_job_status(&self, _job_id: &str) -> Result<JobStatus, ServiceError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.statuses.lock().unwrap().pop_front();
            Ok(next.unwrap_or(JobStatus::Running))
        }

        async fn list_instances(&self, _job_id: &str) -> Result<Vec<String>, ServiceError> {
            self.instances
                .clone()
                .map_err(|_| ServiceError::Transport("instance lookup refused".to_string()))
        }

        async fn list_outputs(
            &self,
            _instance_id: &str,
        ) -> Result<Vec<OutputDescriptor>, ServiceError> {
            Ok(self.outputs.clone())
        }

        async fn fetch_document(&self, _output_id: &str) -> Result<DocumentData, ServiceError> {
            match &self.document {
                Some(doc) => Ok(doc.clone()),
                None => Err(ServiceError::Transport("no document".to_string())),
            }
        }
    }

    fn fetcher(service: ScriptedService, interval: u64, timeout: u64) -> ArtifactFetcher<ScriptedService> {
        ArtifactFetcher::new(
            service,
            Duration::from_secs(interval),
            Duration::from_secs(timeout),
        )
    }

    fn request() -> ReportRequest {
        ReportRequest {
            business_unit: "Saudi Arabia BU".to_string(),
            po_number_filter: "*".to_string(),
            from_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 12, 4).unwrap(),
            output_format: OutputFormat::Spreadsheet,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_two_sleeps() {
        let service = ScriptedService::with_statuses(&[
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Succeeded,
        ]);
        let f = fetcher(service, 1, 60);
        let start = Instant::now();

        let (status, resolution) = f
            .await_completion("2995978", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(status, JobStatus::Succeeded);
        assert_eq!(
            resolution,
            InstanceResolution::Resolved {
                instance_id: "3001".to_string()
            }
        );
        assert_eq!(f.service.status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_stops_remote_calls() {
        let f = fetcher(ScriptedService::default(), 2, 5);

        let err = f
            .await_completion("2995978", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { ref job_id } if job_id == "2995978"));
        // 0s, 2s, 4s 三次查询; 6s 时预算耗尽, 不再发起远程调用
        assert_eq!(f.service.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_propagates_status() {
        let service =
            ScriptedService::with_statuses(&[JobStatus::Running, JobStatus::Failed]);
        let f = fetcher(service, 1, 60);

        let err = f
            .await_completion("2995978", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchError::JobFailed {
                status: JobStatus::Failed,
                ..
            }
        ));
        assert_eq!(f.service.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_status_still_yields_artifact() {
        let service = ScriptedService::with_statuses(&[JobStatus::SucceededWithWarnings]);
        let f = fetcher(service, 1, 60);

        let (status, resolution) = f
            .await_completion("2995978", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(status, JobStatus::SucceededWithWarnings);
        assert!(!resolution.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_checked_before_first_remote_call() {
        let f = fetcher(ScriptedService::default(), 1, 60);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f.await_completion("2995978", &cancel).await.unwrap_err();

        assert!(matches!(err, FetchError::Cancelled));
        assert_eq!(f.service.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_status_errors_are_retried() {
        struct FlakyService {
            inner: ScriptedService,
            fail_first: AtomicUsize,
        }

        #[async_trait]
        impl ReportService for FlakyService {
            async fn submit_job(&self, request: &ReportRequest) -> Result<String, ServiceError> {
                self.inner.submit_job(request).await
            }
            async fn get_job_status(&self, job_id: &str) -> Result<JobStatus, ServiceError> {
                if self.fail_first.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n > 0).then(|| n - 1)
                }).is_ok()
                {
                    return Err(ServiceError::Transport("connection reset".to_string()));
                }
                self.inner.get_job_status(job_id).await
            }
            async fn list_instances(&self, job_id: &str) -> Result<Vec<String>, ServiceError> {
                self.inner.list_instances(job_id).await
            }
            async fn list_outputs(
                &self,
                instance_id: &str,
            ) -> Result<Vec<OutputDescriptor>, ServiceError> {
                self.inner.list_outputs(instance_id).await
            }
            async fn fetch_document(&self, output_id: &str) -> Result<DocumentData, ServiceError> {
                self.inner.fetch_document(output_id).await
            }
        }

        let service = FlakyService {
            inner: ScriptedService::with_statuses(&[JobStatus::Succeeded]),
            fail_first: AtomicUsize::new(2),
        };
        let f = ArtifactFetcher::new(service, Duration::from_secs(1), Duration::from_secs(60));

        let (status, _) = f
            .await_completion("2995978", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn instance_lookup_failure_falls_back_to_increment() {
        let service = ScriptedService {
            instances: Err(()),
            ..ScriptedService::default()
        };
        let f = fetcher(service, 1, 60);

        let resolution = f.resolve_instance_id("2995978").await.unwrap();
        assert_eq!(
            resolution,
            InstanceResolution::FallbackGuessed {
                instance_id: "2995979".to_string()
            }
        );
    }

    #[tokio::test]
    async fn empty_instance_list_falls_back_to_increment() {
        let service = ScriptedService {
            instances: Ok(Vec::new()),
            ..ScriptedService::default()
        };
        let f = fetcher(service, 1, 60);

        let resolution = f.resolve_instance_id("100").await.unwrap();
        assert!(resolution.is_fallback());
        assert_eq!(resolution.instance_id(), "101");
    }

    #[tokio::test]
    async fn first_instance_wins_in_remote_order() {
        let service = ScriptedService {
            instances: Ok(vec!["7".to_string(), "5".to_string()]),
            ..ScriptedService::default()
        };
        let f = fetcher(service, 1, 60);

        let resolution = f.resolve_instance_id("100").await.unwrap();
        assert_eq!(resolution.instance_id(), "7");
    }

    #[tokio::test]
    async fn non_numeric_job_id_cannot_be_guessed() {
        let service = ScriptedService {
            instances: Ok(Vec::new()),
            ..ScriptedService::default()
        };
        let f = fetcher(service, 1, 60);

        let err = f.resolve_instance_id("job-abc").await.unwrap_err();
        assert!(matches!(err, FetchError::InstanceUnresolved { .. }));
    }

    #[tokio::test]
    async fn download_decodes_text_document_with_missing_padding() {
        // "PO data!" → base64 "UE8gZGF0YSE=", 去掉填充后长度不是4的倍数
        let service = ScriptedService {
            document: Some(DocumentData::Text("UE8gZGF0YSE".to_string())),
            ..ScriptedService::default()
        };
        let f = fetcher(service, 1, 60);

        let bytes = f.download("3001").await.unwrap();
        assert_eq!(bytes, b"PO data!");
    }

    #[tokio::test]
    async fn download_without_outputs_fails() {
        let service = ScriptedService {
            outputs: Vec::new(),
            ..ScriptedService::default()
        };
        let f = fetcher(service, 1, 60);

        let err = f.download("3001").await.unwrap_err();
        assert!(matches!(err, FetchError::NoOutput { .. }));
    }

    #[tokio::test]
    async fn download_without_output_id_fails() {
        let service = ScriptedService {
            outputs: vec![OutputDescriptor {
                output_id: None,
                name: Some("orphan".to_string()),
            }],
            ..ScriptedService::default()
        };
        let f = fetcher(service, 1, 60);

        let err = f.download("3001").await.unwrap_err();
        assert!(matches!(err, FetchError::NoOutputId { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_report_runs_full_lifecycle() {
        let service = ScriptedService::with_statuses(&[JobStatus::Running, JobStatus::Succeeded]);
        let f = fetcher(service, 1, 60);

        let (job, artifact) = f
            .fetch_report(&request(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(job.job_id, "2995978");
        assert_eq!(job.instance_id.as_deref(), Some("3001"));
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(artifact, vec![1, 2, 3]);
    }
}
