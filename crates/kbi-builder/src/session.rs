//! Project and pipeline sessions.
//!
//! A [`Project`] owns the store, the generated-artifact layout and the lock
//! directory of one project. A [`PipelineSession`] is the entry point the
//! front-end talks to for one pipeline: every call validates, takes the
//! scoped lock, mutates the store, regenerates the affected artifacts and,
//! for node definitions, runs the node.

use std::sync::Arc;

use serde::Serialize;

use crate::change::{ChangeDetector, NodeChange};
use crate::config::{ProjectConfig, ProjectLayout, StoreConfig};
use crate::db::models::{CatalogDefinition, NodeDefinition, Parameter, ParameterValue};
use crate::db::{open_pool, Store};
use crate::engine::{ExecutionEngine, KedroCli, RunRequest, RunResult};
use crate::error::{BuilderError, BuilderResult};
use crate::generator::ArtifactGenerator;
use crate::lock::{pipeline_scope, ProjectLock, CATALOG_SCOPE};
use crate::template::{JinjaRenderer, TemplateRender};

/// Result of submitting a node definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Identical to the stored definition; nothing was written or run.
    Unchanged,
    /// Stored, regenerated and run.
    Executed { change: NodeChange, result: RunResult },
}

/// An opened project.
#[derive(Clone)]
pub struct Project {
    config: ProjectConfig,
    layout: ProjectLayout,
    store: Store,
    lock: ProjectLock,
    generator: ArtifactGenerator,
}

impl Project {
    /// Open the project at `config.project_path`, creating the builder data
    /// directory and store on first use.
    pub async fn open(config: ProjectConfig, store_config: &StoreConfig) -> BuilderResult<Self> {
        let layout = ProjectLayout::resolve(&config)?;
        tokio::fs::create_dir_all(layout.data_dir()).await?;

        let pool = open_pool(&layout.store_path(), store_config).await?;
        let store = Store::new(pool);
        let lock = ProjectLock::new(layout.locks_dir());
        let generator = ArtifactGenerator::new(layout.clone(), Arc::new(JinjaRenderer::new()));

        tracing::info!(
            project = %layout.project_name(),
            store = %layout.store_path().display(),
            "Project opened"
        );

        Ok(Self {
            config,
            layout,
            store,
            lock,
            generator,
        })
    }

    /// Replace the artifact renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRender>) -> Self {
        self.generator = ArtifactGenerator::new(self.layout.clone(), renderer);
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Engine configured for this project.
    pub fn default_engine(&self) -> Arc<dyn ExecutionEngine> {
        Arc::new(KedroCli::new(self.config.engine_command.clone()))
    }

    /// Open a session on `pipeline`, creating its row if needed.
    ///
    /// The pipeline's package directory must already exist in the Kedro
    /// project; it is never scaffolded here.
    pub async fn session(
        &self,
        pipeline: &str,
        engine: Arc<dyn ExecutionEngine>,
    ) -> BuilderResult<PipelineSession> {
        if !crate::db::models::node::is_identifier(pipeline) {
            return Err(BuilderError::Validation(format!(
                "pipeline name '{}' is not a valid identifier",
                pipeline
            )));
        }
        self.layout.ensure_pipeline_skeleton(pipeline)?;

        if self.store.ensure_pipeline(pipeline).await? {
            tracing::info!(pipeline = %pipeline, "Pipeline created");
        }

        Ok(PipelineSession {
            project: self.clone(),
            pipeline: pipeline.to_string(),
            engine,
            detector: ChangeDetector::new(),
        })
    }

    /// Names of all known pipelines.
    pub async fn pipelines(&self) -> BuilderResult<Vec<String>> {
        self.store.list_pipelines().await
    }

    /// Nodes of `pipeline` in definition order. Reads never create the
    /// pipeline; an unknown pipeline has no nodes.
    pub async fn nodes(&self, pipeline: &str) -> BuilderResult<Vec<NodeDefinition>> {
        self.store.list_nodes(pipeline).await
    }

    pub async fn parameters(&self, pipeline: &str) -> BuilderResult<Vec<Parameter>> {
        self.store.list_parameters(pipeline).await
    }

    pub async fn imports(&self, pipeline: &str) -> BuilderResult<Option<String>> {
        Ok(self.store.get_pipeline(pipeline).await?.and_then(|p| p.imports))
    }

    /// All catalog entries in definition order.
    pub async fn catalog(&self) -> BuilderResult<Vec<CatalogDefinition>> {
        self.store.list_catalog().await
    }

    /// Insert or replace a catalog entry and regenerate the catalog.
    pub async fn define_catalog_entry(&self, entry: CatalogDefinition) -> BuilderResult<()> {
        let entry = entry.normalize()?;
        let _guard = self.lock.acquire(CATALOG_SCOPE).await?;

        self.store.put_catalog_entry(&entry).await?;
        tracing::info!(entry = %entry.name, entry_type = ?entry.entry_type, "Catalog entry stored");

        self.regenerate_catalog_locked().await
    }

    /// Remove a catalog entry and regenerate the catalog. Returns whether the
    /// entry existed; removing a missing entry is not an error.
    pub async fn delete_catalog_entry(&self, name: &str) -> BuilderResult<bool> {
        let _guard = self.lock.acquire(CATALOG_SCOPE).await?;

        let removed = self.store.delete_catalog_entry(name).await?;
        tracing::info!(entry = %name, removed, "Catalog entry deleted");

        self.regenerate_catalog_locked().await?;
        Ok(removed)
    }

    async fn regenerate_catalog_locked(&self) -> BuilderResult<()> {
        self.generator
            .regenerate_catalog(&self.store)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Catalog regeneration failed"))?;
        Ok(())
    }
}

/// Front-end entry point for one pipeline.
pub struct PipelineSession {
    project: Project,
    pipeline: String,
    engine: Arc<dyn ExecutionEngine>,
    detector: ChangeDetector,
}

impl PipelineSession {
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    fn store(&self) -> &Store {
        &self.project.store
    }

    fn generator(&self) -> &ArtifactGenerator {
        &self.project.generator
    }

    fn request(&self, node: Option<&str>) -> RunRequest {
        RunRequest {
            project_path: self.project.layout.kedro_root().to_path_buf(),
            pipeline: self.pipeline.clone(),
            node: node.map(str::to_string),
        }
    }

    /// Submit a node definition.
    ///
    /// An identical resubmission is a no-op unless an earlier generation
    /// failed, in which case the pipeline is regenerated and the node run.
    pub async fn define_node(&self, definition: NodeDefinition) -> BuilderResult<NodeOutcome> {
        if definition.pipeline != self.pipeline {
            return Err(BuilderError::Validation(format!(
                "node '{}' belongs to pipeline '{}', not '{}'",
                definition.name, definition.pipeline, self.pipeline
            )));
        }
        definition.validate()?;

        let _guard = self.project.lock.acquire(&pipeline_scope(&self.pipeline)).await?;

        let existing = self.store().get_node(&self.pipeline, &definition.name).await?;
        let stale = self
            .store()
            .get_pipeline(&self.pipeline)
            .await?
            .map(|p| p.nodes_stale)
            .unwrap_or(false);

        let change = self.detector.decide(existing.as_ref(), &definition);
        if !change.is_write() && !stale {
            tracing::info!(pipeline = %self.pipeline, node = %definition.name, "Node unchanged");
            return Ok(NodeOutcome::Unchanged);
        }

        if change.is_write() {
            self.store().put_node_marking_stale(&definition).await?;
            tracing::info!(
                pipeline = %self.pipeline,
                node = %definition.name,
                change = ?change,
                "Node stored"
            );
        } else {
            tracing::info!(
                pipeline = %self.pipeline,
                node = %definition.name,
                "Node unchanged but artifacts are stale; regenerating"
            );
        }

        self.regenerate_nodes_locked().await?;

        let result = self
            .engine
            .run(&self.request(Some(&definition.run_name())))
            .await
            .inspect_err(|e| {
                tracing::error!(pipeline = %self.pipeline, node = %definition.name, error = %e, "Node run failed")
            })?;

        Ok(NodeOutcome::Executed { change, result })
    }

    async fn regenerate_nodes_locked(&self) -> BuilderResult<()> {
        self.generator()
            .regenerate_nodes(self.store(), &self.pipeline)
            .await
            .inspect_err(|e| {
                tracing::error!(pipeline = %self.pipeline, error = %e, "Node artifact regeneration failed")
            })?;
        self.store().set_nodes_stale(&self.pipeline, false).await
    }

    pub async fn node(&self, name: &str) -> BuilderResult<Option<NodeDefinition>> {
        self.store().get_node(&self.pipeline, name).await
    }

    /// Nodes in definition order.
    pub async fn nodes(&self) -> BuilderResult<Vec<NodeDefinition>> {
        self.project.nodes(&self.pipeline).await
    }

    /// Replace the pipeline's import block. Trailing whitespace is dropped;
    /// the artifacts pick the block up on the next regeneration.
    pub async fn update_imports(&self, text: &str) -> BuilderResult<()> {
        let _guard = self.project.lock.acquire(&pipeline_scope(&self.pipeline)).await?;

        let trimmed = text.trim_end();
        let imports = (!trimmed.is_empty()).then_some(trimmed);
        self.store().set_imports(&self.pipeline, imports).await?;

        tracing::info!(pipeline = %self.pipeline, lines = trimmed.lines().count(), "Imports stored");
        Ok(())
    }

    pub async fn imports(&self) -> BuilderResult<Option<String>> {
        self.project.imports(&self.pipeline).await
    }

    /// Insert or replace a parameter and regenerate the parameter document.
    pub async fn define_parameter(&self, name: &str, value: ParameterValue) -> BuilderResult<()> {
        let _guard = self.project.lock.acquire(&pipeline_scope(&self.pipeline)).await?;

        self.store().put_parameter(&self.pipeline, name, &value).await?;
        tracing::info!(
            pipeline = %self.pipeline,
            parameter = %name,
            value_type = value.type_name(),
            "Parameter stored"
        );

        self.regenerate_parameters_locked().await
    }

    /// Remove a parameter and regenerate the parameter document. Returns
    /// whether the parameter existed.
    pub async fn delete_parameter(&self, name: &str) -> BuilderResult<bool> {
        let _guard = self.project.lock.acquire(&pipeline_scope(&self.pipeline)).await?;

        let removed = self.store().delete_parameter(&self.pipeline, name).await?;
        tracing::info!(pipeline = %self.pipeline, parameter = %name, removed, "Parameter deleted");

        self.regenerate_parameters_locked().await?;
        Ok(removed)
    }

    async fn regenerate_parameters_locked(&self) -> BuilderResult<()> {
        self.generator()
            .regenerate_parameters(self.store(), &self.pipeline)
            .await
            .inspect_err(|e| {
                tracing::error!(pipeline = %self.pipeline, error = %e, "Parameter regeneration failed")
            })?;
        Ok(())
    }

    pub async fn parameters(&self) -> BuilderResult<Vec<Parameter>> {
        self.project.parameters(&self.pipeline).await
    }

    pub async fn define_catalog_entry(&self, entry: CatalogDefinition) -> BuilderResult<()> {
        self.project.define_catalog_entry(entry).await
    }

    pub async fn delete_catalog_entry(&self, name: &str) -> BuilderResult<bool> {
        self.project.delete_catalog_entry(name).await
    }

    /// Run the pipeline, or one node of it, without touching definitions.
    pub async fn run(&self, node: Option<&str>) -> BuilderResult<RunResult> {
        let _guard = self.project.lock.acquire(&pipeline_scope(&self.pipeline)).await?;

        self.engine
            .run(&self.request(node))
            .await
            .inspect_err(|e| tracing::error!(pipeline = %self.pipeline, node = ?node, error = %e, "Run failed"))
    }

    /// Re-render every artifact of the pipeline and the project catalog.
    pub async fn regenerate(&self) -> BuilderResult<()> {
        let _pipeline_guard = self.project.lock.acquire(&pipeline_scope(&self.pipeline)).await?;
        let _catalog_guard = self.project.lock.acquire(CATALOG_SCOPE).await?;

        self.regenerate_nodes_locked().await?;
        self.regenerate_parameters_locked().await?;
        self.project.regenerate_catalog_locked().await?;

        tracing::info!(pipeline = %self.pipeline, "Pipeline regenerated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::NodeField;
    use crate::template::PIPELINE_TEMPLATE;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records run requests; fails when `fail` is set.
    #[derive(Default)]
    struct FakeEngine {
        requests: Mutex<Vec<RunRequest>>,
        fail: AtomicBool,
    }

    impl FakeEngine {
        fn calls(&self) -> Vec<RunRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutionEngine for FakeEngine {
        async fn run(&self, request: &RunRequest) -> BuilderResult<RunResult> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(BuilderError::Execution {
                    pipeline: request.pipeline.clone(),
                    node: request.node.clone(),
                    exit_code: Some(1),
                    message: "ZeroDivisionError: division by zero\n".to_string(),
                });
            }
            Ok(RunResult {
                pipeline: request.pipeline.clone(),
                node: request.node.clone(),
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 1,
            })
        }
    }

    /// Records rendered template names; fails when `fail` is set.
    #[derive(Default)]
    struct RecordingRenderer {
        inner: JinjaRenderer,
        rendered: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl RecordingRenderer {
        fn count(&self, name: &str) -> usize {
            self.rendered.lock().unwrap().iter().filter(|n| *n == name).count()
        }
    }

    impl TemplateRender for RecordingRenderer {
        fn render(&self, name: &str, context: &serde_json::Value) -> BuilderResult<String> {
            self.rendered.lock().unwrap().push(name.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(BuilderError::Generation("renderer unavailable".to_string()));
            }
            self.inner.render(name, context)
        }
    }

    struct Fixture {
        _dir: TempDir,
        project: Project,
        engine: Arc<FakeEngine>,
        renderer: Arc<RecordingRenderer>,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("churn");
            std::fs::create_dir_all(&root).unwrap();

            let config = ProjectConfig::for_path(&root);
            let layout = ProjectLayout::resolve(&config).unwrap();
            for pipeline in ["p", "etl"] {
                std::fs::create_dir_all(layout.pipeline_dir(pipeline)).unwrap();
            }

            let renderer = Arc::new(RecordingRenderer::default());
            let project = Project::open(config, &StoreConfig::default())
                .await
                .unwrap()
                .with_renderer(renderer.clone());

            Self {
                _dir: dir,
                project,
                engine: Arc::new(FakeEngine::default()),
                renderer,
            }
        }

        async fn session(&self, pipeline: &str) -> PipelineSession {
            self.project.session(pipeline, self.engine.clone()).await.unwrap()
        }

        fn read(&self, path: &Path) -> String {
            std::fs::read_to_string(path).unwrap()
        }
    }

    fn n1() -> NodeDefinition {
        NodeDefinition::new("p", "n1", "def n1(): return 1").with_outputs("o1")
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;

        let outcome = session.define_node(n1()).await.unwrap();
        assert!(matches!(
            outcome,
            NodeOutcome::Executed { change: NodeChange::Create, .. }
        ));
        assert_eq!(session.nodes().await.unwrap().len(), 1);
        assert!(fx
            .read(&fx.project.layout().nodes_path("p"))
            .contains("def n1(): return 1"));
        assert_eq!(fx.engine.calls(), vec![session.request(Some("n1"))]);

        let renders = fx.renderer.count(PIPELINE_TEMPLATE);
        let outcome = session.define_node(n1()).await.unwrap();
        assert_eq!(outcome, NodeOutcome::Unchanged);
        assert_eq!(fx.renderer.count(PIPELINE_TEMPLATE), renders);
        assert_eq!(fx.engine.calls().len(), 1);

        assert!(!session.delete_parameter("never_defined").await.unwrap());
    }

    #[tokio::test]
    async fn test_single_field_change_is_one_regeneration() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;
        session.define_node(n1()).await.unwrap();

        let before = fx.renderer.count(PIPELINE_TEMPLATE);
        let changed = n1().with_tags(["nightly"]);
        let outcome = session.define_node(changed.clone()).await.unwrap();

        match outcome {
            NodeOutcome::Executed { change, .. } => {
                assert_eq!(change, NodeChange::Update { changed: vec![NodeField::Tags] })
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(fx.renderer.count(PIPELINE_TEMPLATE), before + 1);
        assert_eq!(session.node("n1").await.unwrap(), Some(changed));
        assert_eq!(session.nodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_node_for_other_pipeline_is_rejected() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;

        let ghost = NodeDefinition::new("ghost", "n1", "def n1(): return 1");
        let err = session.define_node(ghost.clone()).await.unwrap_err();
        assert!(matches!(err, BuilderError::Validation(_)));

        let err = fx.project.store().put_node(&ghost).await.unwrap_err();
        assert!(matches!(err, BuilderError::Validation(_)));
        assert!(fx.project.store().get_pipeline("ghost").await.unwrap().is_none());
        assert!(fx.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_definition_writes_nothing() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;

        let bad = n1().with_confirms(std::collections::BTreeMap::from([(
            "a".to_string(),
            "b".to_string(),
        )]));
        let err = session.define_node(bad).await.unwrap_err();
        assert!(matches!(err, BuilderError::Validation(_)));
        assert!(session.nodes().await.unwrap().is_empty());
        assert_eq!(fx.renderer.count(PIPELINE_TEMPLATE), 0);
    }

    #[tokio::test]
    async fn test_execution_failure_keeps_definition() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;
        fx.engine.fail.store(true, Ordering::SeqCst);

        let err = session.define_node(n1()).await.unwrap_err();
        match &err {
            BuilderError::Execution { exit_code, message, .. } => {
                assert_eq!(*exit_code, Some(1));
                assert_eq!(message, "ZeroDivisionError: division by zero\n");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(session.node("n1").await.unwrap(), Some(n1()));
        assert!(fx.project.layout().assembly_path("p").exists());

        // Artifacts are current, so the same definition is now a no-op.
        fx.engine.fail.store(false, Ordering::SeqCst);
        assert_eq!(session.define_node(n1()).await.unwrap(), NodeOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_generation_failure_then_identical_resubmission_runs() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;
        fx.renderer.fail.store(true, Ordering::SeqCst);

        let err = session.define_node(n1()).await.unwrap_err();
        assert!(matches!(err, BuilderError::Generation(_)));
        assert!(err.is_retry_safe());
        assert_eq!(session.node("n1").await.unwrap(), Some(n1()));
        assert!(fx.engine.calls().is_empty());

        let pipeline = fx.project.store().get_pipeline("p").await.unwrap().unwrap();
        assert!(pipeline.nodes_stale);

        fx.renderer.fail.store(false, Ordering::SeqCst);
        let outcome = session.define_node(n1()).await.unwrap();
        assert!(matches!(
            outcome,
            NodeOutcome::Executed { change: NodeChange::NoOp, .. }
        ));
        assert_eq!(fx.engine.calls().len(), 1);

        let pipeline = fx.project.store().get_pipeline("p").await.unwrap().unwrap();
        assert!(!pipeline.nodes_stale);
        assert_eq!(session.define_node(n1()).await.unwrap(), NodeOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_node_order_is_stable_across_updates() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;

        session.define_node(n1()).await.unwrap();
        session
            .define_node(NodeDefinition::new("p", "n2", "def n2(o1): return o1").with_inputs("o1"))
            .await
            .unwrap();
        session
            .define_node(NodeDefinition { body: "def n1(): return 2".into(), ..n1() })
            .await
            .unwrap();

        let names: Vec<String> = session.nodes().await.unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["n1", "n2"]);

        let steps = fx.read(&fx.project.layout().nodes_path("p"));
        let first = steps.find("def n1").unwrap();
        let second = steps.find("def n2").unwrap();
        assert!(first < second);
        assert!(steps.contains("return 2"));
    }

    #[tokio::test]
    async fn test_parameters() {
        let fx = Fixture::new().await;
        let session = fx.session("etl").await;

        session.define_parameter("rate", ParameterValue::Float(2.0)).await.unwrap();
        session.define_parameter("label", ParameterValue::String("north".into())).await.unwrap();
        session.define_parameter("blob", ParameterValue::Bytes(vec![0, 1, 2])).await.unwrap();
        session.define_parameter("rate", ParameterValue::Float(0.5)).await.unwrap();

        let params = session.parameters().await.unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].value, ParameterValue::Float(0.5));
        assert_eq!(params[2].value, ParameterValue::Bytes(vec![0, 1, 2]));

        let doc = fx.read(&fx.project.layout().parameters_path("etl"));
        assert!(doc.contains("rate: 0.5\nlabel: north\nblob: !!binary AAEC\n"));

        assert!(ParameterValue::from_json("cfg", json!({"a": 1})).is_err());
        assert!(ParameterValue::from_json("cols", json!(["a"])).is_err());

        assert!(session.delete_parameter("label").await.unwrap());
        let doc = fx.read(&fx.project.layout().parameters_path("etl"));
        assert!(!doc.contains("label"));
        assert!(fx.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_catalog() {
        let fx = Fixture::new().await;
        let session = fx.session("etl").await;

        let entry: CatalogDefinition =
            serde_json::from_value(json!({"name": "a", "fields": {"x": 1, "type": "T1"}})).unwrap();
        session.define_catalog_entry(entry).await.unwrap();
        fx.project
            .define_catalog_entry(CatalogDefinition::new("b", Some("T2")))
            .await
            .unwrap();

        let doc = fx.read(&fx.project.layout().catalog_path());
        let type_at = doc.find("  type: T1").unwrap();
        let x_at = doc.find("  x: 1").unwrap();
        assert!(type_at < x_at);

        assert!(session.delete_catalog_entry("a").await.unwrap());
        assert!(!session.delete_catalog_entry("a").await.unwrap());
        let doc = fx.read(&fx.project.layout().catalog_path());
        assert!(!doc.contains("a:"));
        assert!(doc.contains("b:\n  type: T2\n"));

        let names: Vec<String> = fx.project.catalog().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b"]);
        assert!(fx.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_imports_are_trimmed_and_not_regenerated() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;

        session.update_imports("import pandas as pd\n\n   \n").await.unwrap();
        assert_eq!(session.imports().await.unwrap().as_deref(), Some("import pandas as pd"));
        assert!(!fx.project.layout().nodes_path("p").exists());

        session.define_node(n1()).await.unwrap();
        let steps = fx.read(&fx.project.layout().nodes_path("p"));
        assert!(steps.contains("import pandas as pd\n\n\ndef n1(): return 1\n"));

        session.update_imports("  ").await.unwrap();
        assert_eq!(session.imports().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_regenerate_is_byte_identical() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;
        session.define_node(n1()).await.unwrap();
        session.define_parameter("k", ParameterValue::Integer(3)).await.unwrap();
        fx.project
            .define_catalog_entry(CatalogDefinition::new("o1", Some("MemoryDataset")))
            .await
            .unwrap();

        let layout = fx.project.layout();
        let paths = [
            layout.nodes_path("p"),
            layout.assembly_path("p"),
            layout.parameters_path("p"),
            layout.catalog_path(),
        ];

        session.regenerate().await.unwrap();
        let first: Vec<Vec<u8>> = paths.iter().map(|p| std::fs::read(p).unwrap()).collect();
        session.regenerate().await.unwrap();
        let second: Vec<Vec<u8>> = paths.iter().map(|p| std::fs::read(p).unwrap()).collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_run_whole_pipeline() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;

        let result = session.run(None).await.unwrap();
        assert_eq!(result.node, None);
        assert_eq!(fx.engine.calls(), vec![session.request(None)]);
    }

    #[tokio::test]
    async fn test_session_requires_skeleton() {
        let fx = Fixture::new().await;

        let err = fx.project.session("missing", fx.engine.clone()).await.err().unwrap();
        assert!(matches!(err, BuilderError::ProjectNotInitialized(_)));
        assert!(fx.project.pipelines().await.unwrap().is_empty());

        let err = fx.project.session("bad name", fx.engine.clone()).await.err().unwrap();
        assert!(matches!(err, BuilderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_namespaced_node_runs_by_qualified_name() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;

        session.define_node(n1().with_namespace("prep")).await.unwrap();
        assert_eq!(fx.engine.calls(), vec![session.request(Some("prep.n1"))]);
    }

    #[tokio::test]
    async fn test_non_finite_float_parameters() {
        let fx = Fixture::new().await;
        let session = fx.session("etl").await;

        session.define_parameter("rate", ParameterValue::Float(f64::NAN)).await.unwrap();
        session.define_parameter("cap", ParameterValue::Float(f64::INFINITY)).await.unwrap();
        session.define_parameter("other", ParameterValue::Integer(1)).await.unwrap();

        let params = session.parameters().await.unwrap();
        assert_eq!(params.len(), 3);
        assert!(matches!(params[0].value, ParameterValue::Float(f) if f.is_nan()));
        assert_eq!(params[1].value, ParameterValue::Float(f64::INFINITY));

        let doc = fx.read(&fx.project.layout().parameters_path("etl"));
        assert!(doc.contains("rate: .nan\ncap: .inf\nother: 1\n"));
    }

    #[tokio::test]
    async fn test_reads_do_not_create_pipelines() {
        let fx = Fixture::new().await;

        assert!(fx.project.nodes("p").await.unwrap().is_empty());
        assert!(fx.project.parameters("p").await.unwrap().is_empty());
        assert_eq!(fx.project.imports("p").await.unwrap(), None);
        assert!(fx.project.pipelines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_operations_wait_for_pipeline_lock() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;
        let blocked = std::time::Duration::from_millis(200);

        std::fs::create_dir_all(fx.project.layout().locks_dir()).unwrap();
        let held = crate::lock::open_lock_file(&fx.project.lock.path(&pipeline_scope("p"))).unwrap();
        held.lock().unwrap();

        assert!(tokio::time::timeout(blocked, session.define_node(n1())).await.is_err());
        assert!(tokio::time::timeout(
            blocked,
            session.define_parameter("k", ParameterValue::Integer(1))
        )
        .await
        .is_err());
        assert!(session.nodes().await.unwrap().is_empty());
        assert!(session.parameters().await.unwrap().is_empty());
        assert!(fx.engine.calls().is_empty());

        drop(held);
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(10), session.define_node(n1()))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, NodeOutcome::Executed { change: NodeChange::Create, .. }));
    }

    #[tokio::test]
    async fn test_catalog_operations_wait_for_catalog_lock() {
        let fx = Fixture::new().await;
        let session = fx.session("p").await;
        let blocked = std::time::Duration::from_millis(200);

        std::fs::create_dir_all(fx.project.layout().locks_dir()).unwrap();
        let held = crate::lock::open_lock_file(&fx.project.lock.path(CATALOG_SCOPE)).unwrap();
        held.lock().unwrap();

        let entry = CatalogDefinition::new("a", Some("MemoryDataset"));
        assert!(tokio::time::timeout(blocked, fx.project.define_catalog_entry(entry.clone()))
            .await
            .is_err());
        assert!(tokio::time::timeout(blocked, session.regenerate()).await.is_err());
        assert!(fx.project.catalog().await.unwrap().is_empty());

        drop(held);
        tokio::time::timeout(std::time::Duration::from_secs(10), fx.project.define_catalog_entry(entry))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fx.project.catalog().await.unwrap().len(), 1);
    }
}
