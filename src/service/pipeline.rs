use crate::bip::{ArtifactFetcher, ReportService};
use crate::config::ReportConfig;
use crate::error::{FetchError, PipelineError};
use crate::models::{InstanceResolution, Job, OutputFormat, ReportRequest};
use crate::service::{combiner, exporter, reconciler};
use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 管线产出: 原始工件, 或三张派生报表
#[derive(Debug)]
pub enum PipelineOutput {
    Raw(Vec<u8>),
    Reports(IndexMap<String, Vec<u8>>),
}

/// 一次管线执行的结果
#[derive(Debug)]
pub struct PipelineRun {
    pub job: Job,
    pub output: PipelineOutput,
}

/// 端到端报表管线: 获取 → 合并 → 对账 → 导出
///
/// 每次调用独占自己的数据, 管线自身不持有任何跨调用的可变状态,
/// 并发调用互不影响。
pub struct ReportPipeline<S> {
    fetcher: ArtifactFetcher<S>,
    report: ReportConfig,
}

impl<S: ReportService> ReportPipeline<S> {
    pub fn new(fetcher: ArtifactFetcher<S>, report: ReportConfig) -> Self {
        Self { fetcher, report }
    }

    /// 用配置的业务参数组装请求; 起始日期缺省取配置默认值
    pub fn build_request(&self, from_date: Option<NaiveDate>, to_date: NaiveDate) -> ReportRequest {
        ReportRequest {
            business_unit: self.report.business_unit.clone(),
            po_number_filter: self.report.po_number_filter.clone(),
            from_date: from_date.unwrap_or(self.report.default_from_date),
            to_date,
            output_format: OutputFormat::Spreadsheet,
        }
    }

    /// 执行完整管线
    ///
    /// process = false 时直接返回原始工件; 否则三张报表要么全部
    /// 派生成功要么一张都不返回, 不存在部分结果。
    pub async fn run(
        &self,
        request: ReportRequest,
        process: bool,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun, PipelineError> {
        let (job, artifact) = self.fetcher.fetch_report(&request, cancel).await?;

        if !process {
            return Ok(PipelineRun {
                job,
                output: PipelineOutput::Raw(artifact),
            });
        }

        // 工件在分解为合并表后即弃用, 不跨阶段缓存
        let combined = combiner::combine(&artifact)?;
        drop(artifact);

        let aggregated = reconciler::aggregate(&combined, &self.report.exempt_po_numbers)?;
        let detailed = reconciler::detail(&combined)?;
        info!(
            "对账完成: 合并 {} 行 → 汇总 {} 组, 明细 {} 行",
            combined.rows.len(),
            aggregated.len(),
            detailed.len()
        );

        let generated_at = Local::now().naive_local();
        let reports = exporter::export_reports(
            &combined,
            &aggregated,
            &detailed,
            request.from_date,
            request.to_date,
            generated_at,
        )?;

        Ok(PipelineRun {
            job,
            output: PipelineOutput::Reports(reports),
        })
    }

    /// 为已有作业重新下载原始工件 (不重新调度)
    pub async fn download_raw(
        &self,
        job_id: &str,
    ) -> Result<(InstanceResolution, Vec<u8>), FetchError> {
        self.fetcher.download_for_job(job_id).await
    }
}
