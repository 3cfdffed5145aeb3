//! Project configuration and on-disk layout.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BuilderError, BuilderResult};

/// Project configuration loaded from environment variables.
///
/// Environment variables are prefixed with `KBI_`:
/// - `KBI_PROJECT_PATH`: Directory holding the notebook project (default: ".")
/// - `KBI_DATA_DIR`: Builder data directory inside the project (default: "kbi_data")
/// - `KBI_KEDRO_DIR`: Kedro workspace directory inside the data directory (default: "kedro_project")
/// - `KBI_KEDRO_PROJECT`: Kedro project directory name (default: "kbi-project")
/// - `KBI_PACKAGE`: Python package of the Kedro project (default: "kbi_project")
/// - `KBI_ENGINE_COMMAND`: Command running pipelines, e.g. `python -m kedro` (default: "kedro")
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Directory holding the notebook project
    #[serde(default = "default_project_path")]
    pub project_path: PathBuf,

    /// Builder data directory name
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Kedro workspace directory name
    #[serde(default = "default_kedro_dir")]
    pub kedro_dir: String,

    /// Kedro project directory name
    #[serde(default = "default_kedro_project")]
    pub kedro_project: String,

    /// Python package name of the Kedro project
    #[serde(default = "default_package")]
    pub package: String,

    /// Executable used to run pipelines
    #[serde(default = "default_engine_command")]
    pub engine_command: String,
}

fn default_project_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> String {
    "kbi_data".to_string()
}

fn default_kedro_dir() -> String {
    "kedro_project".to_string()
}

fn default_kedro_project() -> String {
    "kbi-project".to_string()
}

fn default_package() -> String {
    "kbi_project".to_string()
}

fn default_engine_command() -> String {
    "kedro".to_string()
}

impl ProjectConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `KBI_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("KBI_").from_env::<ProjectConfig>()
    }

    /// Configuration rooted at `project_path` with default names.
    pub fn for_path(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            ..Self::default()
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_path: default_project_path(),
            data_dir: default_data_dir(),
            kedro_dir: default_kedro_dir(),
            kedro_project: default_kedro_project(),
            package: default_package(),
            engine_command: default_engine_command(),
        }
    }
}

/// Resolved paths of one project.
///
/// ```text
/// <project>/
///   kbi_data/
///     <project-name>.db
///     locks/<scope>.lock
///     kedro_project/kbi-project/
///       conf/base/catalog.yml
///       conf/base/parameters_<pipeline>.yml
///       src/kbi_project/pipelines/<pipeline>/{nodes.py,pipeline.py}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    project_name: String,
    data_dir: PathBuf,
    kedro_root: PathBuf,
    package: String,
}

impl ProjectLayout {
    /// Resolve the layout for a configuration.
    ///
    /// The project directory itself must exist; nothing below it is checked
    /// here.
    pub fn resolve(config: &ProjectConfig) -> BuilderResult<Self> {
        let root = std::fs::canonicalize(&config.project_path)
            .map_err(|_| BuilderError::ProjectNotInitialized(config.project_path.clone()))?;

        let project_name = root
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                BuilderError::Config(format!(
                    "cannot derive a project name from {}",
                    root.display()
                ))
            })?
            .to_string();

        let data_dir = root.join(&config.data_dir);
        let kedro_root = data_dir
            .join(&config.kedro_dir)
            .join(&config.kedro_project);

        Ok(Self {
            project_name,
            data_dir,
            kedro_root,
            package: config.package.clone(),
        })
    }

    /// Project name, taken from the project directory name.
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Builder data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// SQLite store file, one per project.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.project_name))
    }

    /// Directory holding the scoped lock files.
    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir.join("locks")
    }

    /// Kedro project root; the execution engine runs from here.
    pub fn kedro_root(&self) -> &Path {
        &self.kedro_root
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.kedro_root.join("conf").join("base")
    }

    /// Generated catalog document, project-global.
    pub fn catalog_path(&self) -> PathBuf {
        self.conf_dir().join("catalog.yml")
    }

    /// Generated parameter document of one pipeline.
    pub fn parameters_path(&self, pipeline: &str) -> PathBuf {
        self.conf_dir().join(format!("parameters_{}.yml", pipeline))
    }

    /// Pipeline package directory, created by the project skeleton.
    pub fn pipeline_dir(&self, pipeline: &str) -> PathBuf {
        self.kedro_root
            .join("src")
            .join(&self.package)
            .join("pipelines")
            .join(pipeline)
    }

    /// Generated steps module of one pipeline.
    pub fn nodes_path(&self, pipeline: &str) -> PathBuf {
        self.pipeline_dir(pipeline).join("nodes.py")
    }

    /// Generated assembly module of one pipeline.
    pub fn assembly_path(&self, pipeline: &str) -> PathBuf {
        self.pipeline_dir(pipeline).join("pipeline.py")
    }

    /// Fail with `ProjectNotInitialized` unless the pipeline skeleton exists.
    pub fn ensure_pipeline_skeleton(&self, pipeline: &str) -> BuilderResult<()> {
        let dir = self.pipeline_dir(pipeline);
        if dir.is_dir() {
            Ok(())
        } else {
            Err(BuilderError::ProjectNotInitialized(dir))
        }
    }
}
