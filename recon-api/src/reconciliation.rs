//! Orchestration facade (spec.md §4.5.2, §4.6): composes the blob store, gateway
//! config store, ingest pipeline and reconciler into `preview()`/`run()`, plus report
//! generation. Follows the multi-`Arc<dyn Trait>` facade composition pattern.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono::Utc;
use recon_config::union_charge_keywords;
use recon_config::GatewayConfigStore;
use recon_config::GatewayConfigType;
use recon_config::GatewayFileConfig;
use recon_engine::mint_run_id;
use recon_engine::plan as build_plan;
use recon_engine::NoopAuditHook;
use recon_engine::ReconcileError;
use recon_engine::ReconciliationAuditHook;
use recon_engine::ReconciliationPlan;
use recon_engine::RunSummary;
use recon_ingest::classify_external;
use recon_ingest::classify_internal;
use recon_ingest::read_and_normalize;
use recon_ingest::NormalizedTable;
use recon_store::GatewaySide;
use recon_store::PersistOutcome;
use recon_store::ReconciliationRun;
use recon_store::RunStatus;
use recon_store::TransactionFilter;
use recon_store::TransactionStore;

use crate::blob::BlobStore;
use crate::error::FacadeResult;
use crate::report;
use crate::report::ReportFormat;
use crate::telemetry::PipelineTelemetry;

/// One reconciliation run's outcome, returned synchronously to the caller (spec.md §6.2).
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub gateway: String,
    pub status: RunStatus,
    pub summary: RunSummary,
    pub saved: PersistOutcome,
}

struct LoadedTables {
    external_config: GatewayFileConfig,
    internal_config: GatewayFileConfig,
    external_table: NormalizedTable,
    internal_table: NormalizedTable,
    external_file: String,
    internal_file: String,
}

fn find_by_stem(files: &[String], stem: &str) -> Option<String> {
    files.iter().find(|name| name.rsplit_once('.').map(|(base, _)| base) == Some(stem)).cloned()
}

/// Composes a blob store, gateway config store and transaction store into the
/// reconciliation pipeline. One facade serves every gateway; `preview`/`run` each take
/// the gateway family name (spec.md §3.1) as their first argument.
pub struct ReconciliationFacade {
    blobs: Arc<dyn BlobStore>,
    configs: Arc<dyn GatewayConfigStore>,
    transactions: Arc<dyn TransactionStore>,
    telemetry: Option<Arc<PipelineTelemetry>>,
    hook: Arc<dyn ReconciliationAuditHook>,
}

impl ReconciliationFacade {
    #[must_use]
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        configs: Arc<dyn GatewayConfigStore>,
        transactions: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            blobs,
            configs,
            transactions,
            telemetry: None,
            hook: Arc::new(NoopAuditHook),
        }
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<PipelineTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    #[must_use]
    pub fn with_audit_hook(mut self, hook: Arc<dyn ReconciliationAuditHook>) -> Self {
        self.hook = hook;
        self
    }

    async fn locate_pair(&self, gateway: &str, external_prefix: &str, internal_prefix: &str) -> FacadeResult<(String, String)> {
        let files = self.blobs.list(gateway).await?;
        let external = find_by_stem(&files, external_prefix);
        let internal = find_by_stem(&files, internal_prefix);

        let mut missing = Vec::new();
        if external.is_none() {
            missing.push(format!("{external_prefix}.*"));
        }
        if internal.is_none() {
            missing.push(format!("{internal_prefix}.*"));
        }
        if !missing.is_empty() {
            return Err(ReconcileError::MissingPairedFile {
                gateway: gateway.to_string(),
                missing,
            }
            .into());
        }

        match (external, internal) {
            (Some(external), Some(internal)) => Ok((external, internal)),
            _ => Err(ReconcileError::MissingPairedFile {
                gateway: gateway.to_string(),
                missing: vec!["unexpected missing pair".to_string()],
            }
            .into()),
        }
    }

    async fn load_tables(&self, gateway: &str) -> FacadeResult<LoadedTables> {
        let external_config = self.configs.get_config(gateway, GatewayConfigType::External).await?;
        let internal_config = self.configs.get_config(gateway, GatewayConfigType::Internal).await?;
        let (external_file, internal_file) = self
            .locate_pair(gateway, &external_config.filename_prefix, &internal_config.filename_prefix)
            .await?;

        let external_bytes = self.blobs.read(gateway, &external_file).await?;
        let internal_bytes = self.blobs.read(gateway, &internal_file).await?;
        let external_table = read_and_normalize(&external_bytes, &external_file, &external_config)?;
        let internal_table = read_and_normalize(&internal_bytes, &internal_file, &internal_config)?;

        self.blobs.archive(gateway, &external_file, &external_bytes).await;
        self.blobs.archive(gateway, &internal_file, &internal_bytes).await;

        Ok(LoadedTables {
            external_config,
            internal_config,
            external_table,
            internal_table,
            external_file,
            internal_file,
        })
    }

    async fn build_plan(&self, gateway: &str) -> FacadeResult<(String, ReconciliationPlan, String, String)> {
        let loaded = self.load_tables(gateway).await?;
        let keywords = union_charge_keywords(&loaded.external_config, &loaded.internal_config);
        let run_id = mint_run_id();
        let external_gateway = format!("{gateway}{}", GatewaySide::External.suffix());
        let internal_gateway = format!("{gateway}{}", GatewaySide::Internal.suffix());

        let external_partitions =
            classify_external(&loaded.external_table, gateway, &keywords, &run_id, &loaded.external_file);
        let internal_partitions = classify_internal(
            &loaded.internal_table,
            gateway,
            &loaded.internal_config,
            &run_id,
            &loaded.internal_file,
        );

        let pool = self
            .transactions
            .load_carry_forward_pool(&external_gateway, &internal_gateway)
            .await?;
        let plan = build_plan(gateway, &run_id, external_partitions, internal_partitions, pool, &keywords, self.hook.as_ref())?;

        Ok((run_id, plan, external_gateway, internal_gateway))
    }

    /// Steps 1–6 of the reconciliation pass, without writing (spec.md §4.5.3). Never
    /// calls `apply_reclassifications` or `persist_run` — genuinely free of DB side
    /// effects, unlike the reclassify-on-preview behavior documented in spec.md §9.
    pub async fn preview(&self, gateway: &str) -> FacadeResult<RunSummary> {
        let (_, plan, _, _) = self.build_plan(gateway).await?;
        Ok(plan.summary)
    }

    /// The full pipeline: builds the plan, applies carry-forward reclassifications,
    /// then persists the run and its partitions (spec.md §4.6).
    pub async fn run(&self, gateway: &str, created_by_id: Option<String>) -> FacadeResult<RunResult> {
        let outcome = self.run_inner(gateway, created_by_id).await;
        if outcome.is_err() {
            if let Some(telemetry) = &self.telemetry {
                telemetry.record_run_failed();
            }
        }
        outcome
    }

    async fn run_inner(&self, gateway: &str, created_by_id: Option<String>) -> FacadeResult<RunResult> {
        let (run_id, plan, external_gateway, internal_gateway) = self.build_plan(gateway).await?;

        let reclassified = plan.reclassifications.len();
        self.transactions.apply_reclassifications(plan.reclassifications).await?;

        let run = ReconciliationRun {
            run_id: run_id.clone(),
            gateway: gateway.to_string(),
            status: RunStatus::Completed,
            total_external: plan.summary.total_external,
            total_internal: plan.summary.total_internal,
            matched: plan.summary.matched,
            unmatched_external: plan.summary.unmatched_external,
            unmatched_internal: plan.summary.unmatched_internal,
            carry_forward_matched: plan.summary.carry_forward_matched,
            created_by_id,
            created_at: Utc::now(),
        };

        let saved = self
            .transactions
            .persist_run(run, plan.partitions, plan.carry_forward_matched_keys, external_gateway, internal_gateway)
            .await?;

        if let Some(telemetry) = &self.telemetry {
            telemetry.record_run_completed(saved.total, saved.duplicates_skipped);
            telemetry.record_carry_forward(plan.summary.carry_forward_matched, reclassified);
        }

        Ok(RunResult {
            run_id,
            gateway: gateway.to_string(),
            status: RunStatus::Completed,
            summary: plan.summary,
            saved,
        })
    }

    /// Renders a report over the stored transactions for one gateway (spec.md §4.7,
    /// §6.2). `date_from`/`date_to`/`run_id` narrow the rows the same way they narrow
    /// the filename.
    pub async fn report(
        &self,
        gateway: &str,
        format: ReportFormat,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        run_id: Option<&str>,
    ) -> FacadeResult<(String, Vec<u8>)> {
        let filter = TransactionFilter {
            gateway_like: None,
            date_from: date_from.map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default()),
            date_to: date_to.map(|date| date.and_hms_opt(23, 59, 59).unwrap_or_default()),
            run_id: run_id.map(str::to_string),
        };
        let mut transactions = self.transactions.query_transactions(filter).await?;
        transactions.retain(|tx| tx.gateway.starts_with(gateway));

        let bytes = match format {
            ReportFormat::Csv => report::write_csv(&transactions)?,
            ReportFormat::Xlsx => report::write_xlsx(&transactions)?,
        };

        if let Some(telemetry) = &self.telemetry {
            telemetry.record_report_generated();
        }

        let filename = report::report_filename(gateway, format, date_from, date_to, run_id);
        Ok((filename, bytes))
    }
}
