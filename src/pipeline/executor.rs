// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Pipeline executor
//!
//! Orchestrates the execution of pipeline stages in dependency order.
//!
//! Each round dispatches every stage whose dependencies have all succeeded,
//! at most `max_parallel` at a time, and waits for the whole round before
//! computing the next one. After a round with a failure nothing else is
//! dispatched: the remaining stages are reported as skipped.

use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use crate::dataset::Dataset;
use crate::errors::{FailureKind, KgError, KgResult};
use crate::executors::{create_default_executors, Executor, StageContext, StageSummary};
use crate::pipeline::{DagBuilder, Pipeline, PipelineValidator, Stage};
use crate::store::{connect_with_retry, GraphStore, StoreConnector};
use crate::validator::ValidationReport;

/// Pipeline execution options
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Only show what would be done
    pub dry_run: bool,
    /// Only run specific stages
    pub stages: Vec<String>,
    /// Directory for per-run stage logs; overrides the descriptor
    pub log_dir: Option<PathBuf>,
    /// Overrides `execution.max_parallel`
    pub max_parallel: Option<usize>,
    /// Base for relative paths (reports, logs)
    pub working_dir: PathBuf,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            stages: Vec::new(),
            log_dir: None,
            max_parallel: None,
            working_dir: PathBuf::from("."),
        }
    }
}

/// Why a stage failed
#[derive(Debug)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub error: KgError,
}

impl StageFailure {
    pub fn new(error: KgError) -> Self {
        Self {
            kind: error.failure_kind(),
            error,
        }
    }

    /// Validation report, when the stage failed validation
    pub fn report(&self) -> Option<&ValidationReport> {
        match &self.error {
            KgError::ValidationFailed { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Final state of one stage
#[derive(Debug)]
pub enum StageStatus {
    Succeeded(StageSummary),
    Failed(StageFailure),
    Skipped { blocked_by: String },
}

impl StageStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Outcome of one stage in a run
#[derive(Debug)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
    pub duration: Duration,
    /// Stage log file, when logs are written
    pub log: Option<PathBuf>,
}

/// Result of executing a pipeline
#[derive(Debug)]
pub struct PipelineResult {
    pub run_id: String,
    /// One report per selected stage, in dependency order
    pub stages: Vec<StageReport>,
    /// Total execution time
    pub duration: Duration,
    /// Whether all stages succeeded
    pub success: bool,
    /// blake3 digest of the dataset the run loaded
    pub dataset_digest: String,
    /// Rounds of stage names; the plan for a dry run
    pub plan: Vec<Vec<String>>,
    pub dry_run: bool,
}

impl PipelineResult {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Failed stages, in dependency order
    pub fn failures(&self) -> impl Iterator<Item = &StageReport> {
        self.stages
            .iter()
            .filter(|s| matches!(s.status, StageStatus::Failed(_)))
    }

    pub fn first_failure(&self) -> Option<&StageReport> {
        self.failures().next()
    }

    /// Failed stages followed by skipped ones
    pub fn problems(&self) -> Vec<&StageReport> {
        let skipped = self
            .stages
            .iter()
            .filter(|s| matches!(s.status, StageStatus::Skipped { .. }));
        self.failures().chain(skipped).collect()
    }
}

/// Pipeline executor
pub struct PipelineExecutor {
    /// Registered executors by action name
    executors: HashMap<String, Box<dyn Executor>>,
}

impl PipelineExecutor {
    /// Create an executor with no actions registered
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Create an executor with every built-in action registered
    pub fn with_default_executors() -> Self {
        Self {
            executors: create_default_executors(),
        }
    }

    /// Register an executor for an action
    pub fn register_executor(&mut self, action: &str, executor: Box<dyn Executor>) {
        self.executors.insert(action.to_string(), executor);
    }

    /// Execute a pipeline
    ///
    /// Descriptor problems and connection failures are returned as errors
    /// before any stage runs. Stage failures are reported in the result.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        dataset: &Dataset,
        connector: &dyn StoreConnector,
        options: &ExecutionOptions,
    ) -> KgResult<PipelineResult> {
        let start = Instant::now();

        let dag = DagBuilder::build(pipeline)?;

        let validation = PipelineValidator::validate(pipeline, Some(dataset))?;
        for warning in &validation.warnings {
            debug!(pipeline = %pipeline.name, "{}", warning);
        }
        if !validation.is_valid() {
            return Err(KgError::InvalidPipeline {
                reason: validation.errors.join("; "),
                help: Some("Run 'kgpipe validate' for details".into()),
            });
        }

        let selected = self.select(pipeline, options)?;

        for &idx in &selected {
            let stage = &pipeline.stages[idx];
            self.executor_for(stage)?.validate_stage(stage)?;
        }

        let batches = dag.batches()?;
        let plan: Vec<Vec<String>> = batches
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .filter(|idx| selected.contains(idx))
                    .map(|&idx| pipeline.stages[idx].name.clone())
                    .collect::<Vec<_>>()
            })
            .filter(|batch| !batch.is_empty())
            .collect();

        let run_id = new_run_id();
        let mut result = PipelineResult {
            run_id,
            stages: Vec::new(),
            duration: Duration::ZERO,
            success: true,
            dataset_digest: dataset.digest.clone(),
            plan,
            dry_run: options.dry_run,
        };

        if options.dry_run {
            result.duration = start.elapsed();
            return Ok(result);
        }

        let store = connect_with_retry(connector, &pipeline.store.retry_policy()).await?;

        let log_dir = match options.log_dir.as_ref().or(pipeline.execution.log_dir.as_ref()) {
            Some(dir) => {
                let dir = options.working_dir.join(dir).join(&result.run_id);
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| KgError::FileWriteError {
                        path: dir.clone(),
                        error: e.to_string(),
                    })?;
                Some(dir)
            }
            None => None,
        };

        let max_parallel = options
            .max_parallel
            .unwrap_or(pipeline.execution.max_parallel)
            .max(1);

        info!(
            pipeline = %pipeline.name,
            run = %result.run_id,
            stages = selected.len(),
            max_parallel,
            dataset = %dataset.digest,
            "Pipeline started"
        );

        // Plan order: reports and skip attribution follow the rounds
        let order: Vec<usize> = batches
            .into_iter()
            .flatten()
            .filter(|idx| selected.contains(idx))
            .collect();

        let run = Run {
            pipeline,
            dataset,
            store,
            working_dir: &options.working_dir,
            log_dir: log_dir.as_deref(),
            selected: &selected,
        };
        let mut reports = self.dispatch(&run, &order, max_parallel).await;

        result.stages = order
            .iter()
            .filter_map(|idx| reports.remove(idx))
            .collect();
        result.success = result.stages.iter().all(|s| s.status.is_success());
        result.duration = start.elapsed();

        if result.success {
            info!(pipeline = %pipeline.name, elapsed = ?result.duration, "Pipeline succeeded");
        } else if let Some(first) = result.first_failure() {
            error!(pipeline = %pipeline.name, stage = %first.name, "Pipeline failed");
        }

        Ok(result)
    }

    /// Indices of the stages to run
    fn select(&self, pipeline: &Pipeline, options: &ExecutionOptions) -> KgResult<HashSet<usize>> {
        if options.stages.is_empty() {
            return Ok((0..pipeline.stages.len()).collect());
        }

        options
            .stages
            .iter()
            .map(|name| {
                pipeline
                    .stages
                    .iter()
                    .position(|s| &s.name == name)
                    .ok_or_else(|| KgError::StageNotFound {
                        stage: name.clone(),
                    })
            })
            .collect()
    }

    fn executor_for(&self, stage: &Stage) -> KgResult<&dyn Executor> {
        self.executors
            .get(stage.action_name())
            .map(|e| e.as_ref())
            .ok_or_else(|| KgError::ExecutorNotFound {
                action: stage.action_name().to_string(),
            })
    }

    /// Run the rounds; `order` is the selected stages in dependency order
    async fn dispatch(
        &self,
        run: &Run<'_>,
        order: &[usize],
        max_parallel: usize,
    ) -> HashMap<usize, StageReport> {
        let stages = &run.pipeline.stages;
        let mut reports: HashMap<usize, StageReport> = HashMap::new();
        let mut pending: Vec<usize> = order.to_vec();
        let mut halted_by: Option<String> = None;

        while !pending.is_empty() {
            let mut ready = Vec::new();
            let mut waiting = Vec::new();

            for idx in pending {
                let blocker = run.blocker(idx, &reports).or_else(|| halted_by.clone());
                if let Some(blocked_by) = blocker {
                    info!(stage = %stages[idx].name, blocked_by = %blocked_by, "Stage skipped");
                    reports.insert(idx, skipped(&stages[idx].name, blocked_by));
                } else if run.dependencies_done(idx, &reports) {
                    ready.push(idx);
                } else {
                    waiting.push(idx);
                }
            }

            if ready.is_empty() {
                // Everything left is blocked or skipped
                for idx in waiting {
                    let blocked_by = run.blocker(idx, &reports).unwrap_or_default();
                    reports.insert(idx, skipped(&stages[idx].name, blocked_by));
                }
                break;
            }

            let finished: Vec<(usize, StageReport)> = stream::iter(ready.iter().map(|&idx| async move {
                (idx, self.run_stage(run, &stages[idx]).await)
            }))
            .buffer_unordered(max_parallel)
            .collect()
            .await;

            for (idx, report) in finished {
                reports.insert(idx, report);
            }

            // First failure of the round, in dependency order
            if let Some(&failed) = ready
                .iter()
                .find(|idx| matches!(reports[*idx].status, StageStatus::Failed(_)))
            {
                halted_by = Some(stages[failed].name.clone());
            }

            pending = waiting;
        }

        reports
    }

    /// Run one stage in its own session
    async fn run_stage(&self, run: &Run<'_>, stage: &Stage) -> StageReport {
        let start = Instant::now();
        info!(stage = %stage.name, action = stage.action_name(), "Stage started");

        let (status, notes) = match self.execute_stage(run, stage).await {
            Ok((summary, notes)) => (StageStatus::Succeeded(summary), notes),
            Err((error, notes)) => (StageStatus::Failed(StageFailure::new(error)), notes),
        };
        let duration = start.elapsed();

        match &status {
            StageStatus::Succeeded(summary) => {
                info!(stage = %stage.name, elapsed = ?duration, "{}", summary.message)
            }
            StageStatus::Failed(failure) => {
                error!(stage = %stage.name, kind = %failure.kind, "{}", failure.error)
            }
            StageStatus::Skipped { .. } => {}
        }

        let log = match run.log_dir {
            Some(dir) => write_stage_log(dir, stage, &status, &notes, duration).await,
            None => None,
        };

        StageReport {
            name: stage.name.clone(),
            status,
            duration,
            log,
        }
    }

    /// Open a session, run the executor, close the session on every path
    async fn execute_stage(
        &self,
        run: &Run<'_>,
        stage: &Stage,
    ) -> Result<(StageSummary, Vec<String>), (KgError, Vec<String>)> {
        let executor = self.executor_for(stage).map_err(|e| (e, Vec::new()))?;
        let mut session = run.store.session().await.map_err(|e| (e, Vec::new()))?;

        let env = stage.merged_env(&run.pipeline.env);
        let (outcome, notes) = {
            let mut ctx = StageContext::new(stage, run.dataset, env, run.working_dir, session.as_mut());
            let outcome = executor.execute(&mut ctx).await;
            (outcome, ctx.notes().to_vec())
        };

        let closed = session.close().await;
        match (outcome, closed) {
            (Ok(summary), Ok(())) => Ok((summary, notes)),
            (Ok(_), Err(e)) => Err((e, notes)),
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!(stage = %stage.name, "Closing session failed: {}", close_error);
                }
                Err((e, notes))
            }
        }
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::with_default_executors()
    }
}

/// Shared state of one run
struct Run<'a> {
    pipeline: &'a Pipeline,
    dataset: &'a Dataset,
    store: Arc<dyn GraphStore>,
    working_dir: &'a Path,
    log_dir: Option<&'a Path>,
    selected: &'a HashSet<usize>,
}

impl Run<'_> {
    /// Selected dependencies of a stage, in declaration order
    fn dependencies(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.pipeline.stages[idx].depends_on.iter().filter_map(move |name| {
            self.pipeline
                .stages
                .iter()
                .position(|s| &s.name == name)
                .filter(|dep| self.selected.contains(dep))
        })
    }

    /// First dependency that failed or was skipped
    fn blocker(&self, idx: usize, reports: &HashMap<usize, StageReport>) -> Option<String> {
        self.dependencies(idx)
            .find(|dep| matches!(reports.get(dep), Some(r) if !r.status.is_success()))
            .map(|dep| self.pipeline.stages[dep].name.clone())
    }

    fn dependencies_done(&self, idx: usize, reports: &HashMap<usize, StageReport>) -> bool {
        self.dependencies(idx)
            .all(|dep| matches!(reports.get(&dep), Some(r) if r.status.is_success()))
    }
}

fn skipped(name: &str, blocked_by: String) -> StageReport {
    StageReport {
        name: name.to_string(),
        status: StageStatus::Skipped { blocked_by },
        duration: Duration::ZERO,
        log: None,
    }
}

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique per process and per call, sortable by start time
fn new_run_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "run-{}-{:03}-{}-{}",
        now.as_secs(),
        now.subsec_millis(),
        std::process::id(),
        RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}

async fn write_stage_log(
    dir: &Path,
    stage: &Stage,
    status: &StageStatus,
    notes: &[String],
    duration: Duration,
) -> Option<PathBuf> {
    let mut content = format!("stage: {}\naction: {}\n", stage.name, stage.action_name());
    for note in notes {
        content.push_str(note);
        content.push('\n');
    }
    match status {
        StageStatus::Succeeded(summary) => {
            content.push_str(&format!("status: succeeded in {:.2}s\n", duration.as_secs_f64()));
            content.push_str(&format!("summary: {}\n", summary.message));
        }
        StageStatus::Failed(failure) => {
            content.push_str(&format!("status: failed ({})\n", failure.kind));
            content.push_str(&format!("error: {}\n", failure.error));
        }
        StageStatus::Skipped { blocked_by } => {
            content.push_str(&format!("status: skipped (blocked by {})\n", blocked_by));
        }
    }

    let path = dir.join(format!("{}.log", stage.name));
    match tokio::fs::write(&path, content).await {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(path = %path.display(), "Could not write stage log: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryConnector, MemoryGraphStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DATASET: &str = r#"
entity_types:
  - { label: Disease, key: name }
  - { label: Symptom, key: name }
relationship_types:
  - { type: HAS_SYMPTOM, sources: [Disease], targets: [Symptom] }
entities:
  - { label: Disease, key: Dengue Fever }
  - { label: Symptom, key: Fever }
relationships:
  - { type: HAS_SYMPTOM, from: { label: Disease, key: Dengue Fever }, to: { label: Symptom, key: Fever } }
"#;

    const PIPELINE: &str = r#"
name: small
stages:
  - { name: schema, action: { type: schema } }
  - { name: entities, action: { type: load_entities, labels: [Disease, Symptom] }, depends_on: [schema] }
  - { name: links, action: { type: link, relationships: [HAS_SYMPTOM] }, depends_on: [entities] }
  - name: validate
    action:
      type: validate
      coverage: [{ id: disease-has-symptom, label: Disease, type: HAS_SYMPTOM }]
    depends_on: [links]
  - name: smoke-check
    action:
      type: smoke_check
      probes: [{ id: ping, query: { kind: ping } }]
    depends_on: [links]
"#;

    fn fixtures() -> (Pipeline, Dataset) {
        (
            Pipeline::from_yaml(PIPELINE).unwrap(),
            Dataset::from_yaml(DATASET).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_full_run() {
        let (pipeline, dataset) = fixtures();
        let store = MemoryGraphStore::new();
        let connector = MemoryConnector::new(store.clone());

        let result = PipelineExecutor::default()
            .execute(&pipeline, &dataset, &connector, &ExecutionOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.stages.len(), 5);
        assert_eq!(result.dataset_digest, dataset.digest);
        assert_eq!(
            result.plan,
            vec![
                vec!["schema"],
                vec!["entities"],
                vec!["links"],
                vec!["validate", "smoke-check"],
            ]
        );
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_connect() {
        struct Unreachable;

        #[async_trait]
        impl StoreConnector for Unreachable {
            fn uri(&self) -> &str {
                "unreachable://"
            }

            async fn connect(&self) -> KgResult<Arc<dyn GraphStore>> {
                panic!("dry run must not connect");
            }
        }

        let (pipeline, dataset) = fixtures();
        let options = ExecutionOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = PipelineExecutor::default()
            .execute(&pipeline, &dataset, &Unreachable, &options)
            .await
            .unwrap();
        assert!(result.dry_run);
        assert!(result.stages.is_empty());
        assert_eq!(result.plan.len(), 4);
    }

    /// Fails every time, counting calls
    struct Failing(Arc<AtomicUsize>);

    #[async_trait]
    impl Executor for Failing {
        async fn execute(&self, ctx: &mut StageContext<'_>) -> KgResult<StageSummary> {
            self.0.fetch_add(1, Ordering::SeqCst);
            ctx.note("about to fail");
            Err(KgError::Store {
                message: "disk full".into(),
            })
        }

        fn validate_stage(&self, _stage: &Stage) -> KgResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_skips_dependents() {
        let (pipeline, dataset) = fixtures();
        let store = MemoryGraphStore::new();
        let connector = MemoryConnector::new(store.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let mut executor = PipelineExecutor::default();
        executor.register_executor("link", Box::new(Failing(Arc::clone(&calls))));

        let dir = tempfile::tempdir().unwrap();
        let options = ExecutionOptions {
            log_dir: Some(PathBuf::from("logs")),
            working_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let result = executor
            .execute(&pipeline, &dataset, &connector, &options)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.first_failure().unwrap().name, "links");

        let problems: Vec<(&str, &str)> = result
            .problems()
            .iter()
            .map(|s| (s.name.as_str(), s.status.label()))
            .collect();
        assert_eq!(
            problems,
            vec![
                ("links", "failed"),
                ("validate", "skipped"),
                ("smoke-check", "skipped")
            ]
        );
        match &result.stage("validate").unwrap().status {
            StageStatus::Skipped { blocked_by } => assert_eq!(blocked_by, "links"),
            other => panic!("unexpected status {:?}", other),
        }

        let log = result.stage("links").unwrap().log.clone().unwrap();
        let content = std::fs::read_to_string(log).unwrap();
        assert!(content.contains("about to fail"));
        assert!(content.contains("status: failed (internal error)"));
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_failed_round_halts_independent_stages() {
        let yaml = r#"
name: halting
stages:
  - { name: schema, action: { type: schema } }
  - { name: entities, action: { type: load_entities, labels: [Disease, Symptom] }, depends_on: [schema] }
  - { name: broken, action: { type: link, relationships: [HAS_SYMPTOM] }, depends_on: [entities] }
  - name: side
    action: { type: smoke_check, probes: [{ id: ping, query: { kind: ping } }] }
    depends_on: [entities]
  - name: later
    action: { type: smoke_check, probes: [{ id: ping, query: { kind: ping } }] }
    depends_on: [side]
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let dataset = Dataset::from_yaml(DATASET).unwrap();
        let connector = MemoryConnector::new(MemoryGraphStore::new());

        let mut executor = PipelineExecutor::default();
        executor.register_executor("link", Box::new(Failing(Arc::new(AtomicUsize::new(0)))));

        let result = executor
            .execute(&pipeline, &dataset, &connector, &ExecutionOptions::default())
            .await
            .unwrap();

        // `broken` and `side` share a round; `side` finishes, `later` never runs
        assert!(result.stage("side").unwrap().status.is_success());
        assert_eq!(result.first_failure().unwrap().name, "broken");
        match &result.stage("later").unwrap().status {
            StageStatus::Skipped { blocked_by } => assert_eq!(blocked_by, "broken"),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reports_follow_plan_order() {
        let (pipeline, dataset) = fixtures();
        let result = PipelineExecutor::default()
            .execute(
                &pipeline,
                &dataset,
                &MemoryConnector::new(MemoryGraphStore::new()),
                &ExecutionOptions::default(),
            )
            .await
            .unwrap();

        let reported: Vec<&str> = result.stages.iter().map(|s| s.name.as_str()).collect();
        let planned: Vec<&str> = result.plan.iter().flatten().map(String::as_str).collect();
        assert_eq!(reported, planned);
    }

    #[tokio::test]
    async fn test_misordered_pipeline_is_rejected_before_connecting() {
        // `links` may start before `entities` has created its endpoints
        let misordered = [
            r#"
name: misordered
stages:
  - { name: schema, action: { type: schema } }
  - { name: entities, action: { type: load_entities, labels: [Disease, Symptom] }, depends_on: [schema] }
  - { name: links, action: { type: link, relationships: [HAS_SYMPTOM] }, depends_on: [schema] }
"#,
            r#"
name: misordered
stages:
  - { name: schema, action: { type: schema } }
  - { name: links, action: { type: link, relationships: [HAS_SYMPTOM] }, depends_on: [schema] }
  - { name: entities, action: { type: load_entities, labels: [Disease, Symptom] }, depends_on: [schema] }
"#,
        ];

        for yaml in misordered {
            let pipeline = Pipeline::from_yaml(yaml).unwrap();
            let dataset = Dataset::from_yaml(DATASET).unwrap();
            let store = MemoryGraphStore::new();

            let err = PipelineExecutor::default()
                .execute(
                    &pipeline,
                    &dataset,
                    &MemoryConnector::new(store.clone()),
                    &ExecutionOptions::default(),
                )
                .await
                .unwrap_err();

            match err {
                KgError::InvalidPipeline { reason, .. } => assert!(reason.contains("links"), "{}", reason),
                other => panic!("unexpected error {}", other),
            }
            let snapshot = store.snapshot().await;
            assert!(snapshot.constraints.is_empty());
            assert!(snapshot.entities.is_empty());
        }
    }

    #[test]
    fn test_run_ids_are_unique() {
        let ids: HashSet<String> = (0..100).map(|_| new_run_id()).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.starts_with("run-")));
    }

    #[tokio::test]
    async fn test_selected_stage_runs_alone() {
        let (pipeline, dataset) = fixtures();
        let store = MemoryGraphStore::new();
        let connector = MemoryConnector::new(store.clone());
        let executor = PipelineExecutor::default();

        executor
            .execute(&pipeline, &dataset, &connector, &ExecutionOptions::default())
            .await
            .unwrap();

        let options = ExecutionOptions {
            stages: vec!["validate".into()],
            ..Default::default()
        };
        let result = executor
            .execute(&pipeline, &dataset, &connector, &options)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.stages.len(), 1);

        let options = ExecutionOptions {
            stages: vec!["nope".into()],
            ..Default::default()
        };
        let err = executor
            .execute(&pipeline, &dataset, &connector, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, KgError::StageNotFound { .. }));
    }
}
