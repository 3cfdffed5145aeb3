mod input;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbi_builder::{
    config::{ProjectConfig, StoreConfig},
    db::models::{CatalogDefinition, NodeDefinition},
    engine::RunResult,
    NodeOutcome, Project,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kbi")]
#[command(version, about = "KBI - build Kedro pipelines one node at a time", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (overrides KBI_PROJECT_PATH)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Define (or redefine) a node and run it
    ///
    /// The node body is read from a file, or from standard input with `-`.
    /// Bindings take a dataset name, a JSON list, or a JSON object.
    ///
    /// Examples:
    ///     kbi node etl clean --body clean.py --inputs raw --outputs clean_df
    ///     kbi node etl score --body - --inputs '["clean_df", "params:rate"]' --outputs scored
    #[command(verbatim_doc_comment)]
    Node {
        /// Pipeline name
        pipeline: String,

        /// Node name; also the function the body defines
        name: String,

        /// File holding the function source (`-` for stdin)
        #[arg(short, long)]
        body: PathBuf,

        #[arg(short, long)]
        inputs: Option<String>,

        #[arg(short, long)]
        outputs: Option<String>,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        confirms: Option<String>,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// Replace a pipeline's import block
    Imports {
        pipeline: String,

        /// File holding the imports (`-` for stdin)
        source: PathBuf,
    },

    /// Manage catalog entries
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },

    /// Manage pipeline parameters
    Param {
        #[command(subcommand)]
        command: ParamCommands,
    },

    /// Run a pipeline, or one node of it
    Run {
        pipeline: String,

        #[arg(short, long)]
        node: Option<String>,
    },

    /// Re-render every artifact of a pipeline and the catalog
    Regenerate { pipeline: String },

    /// Show the stored definition of a pipeline
    Show { pipeline: String },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Define (or replace) a catalog entry
    ///
    /// Examples:
    ///     kbi catalog set companies --type pandas.CSVDataset --field filepath=data/01_raw/companies.csv
    ///     kbi catalog set companies --file companies.yml
    #[command(verbatim_doc_comment)]
    Set {
        name: String,

        /// Dataset type
        #[arg(short = 't', long = "type")]
        entry_type: Option<String>,

        /// Field as KEY=VALUE; VALUE may be JSON (repeatable)
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,

        /// YAML file with the entry's fields (`-` for stdin)
        #[arg(long, conflicts_with_all = ["entry_type", "fields"])]
        file: Option<PathBuf>,
    },

    /// Remove a catalog entry
    Rm { name: String },

    /// List catalog entries
    List,
}

#[derive(Subcommand)]
enum ParamCommands {
    /// Define (or replace) a parameter; VALUE is a JSON scalar or plain text
    Set {
        pipeline: String,
        name: String,
        value: String,

        /// Treat VALUE as base64-encoded bytes
        #[arg(long)]
        base64: bool,
    },

    /// Remove a parameter
    Rm { pipeline: String, name: String },

    /// List parameters
    List { pipeline: String },
}

/// Initialize tracing with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,kbi=info,kbi_builder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = ProjectConfig::from_env().context("Failed to load KBI_ configuration")?;
    if let Some(path) = cli.project {
        config.project_path = path;
    }
    let store_config = StoreConfig::from_env().context("Failed to load KBI_STORE_ configuration")?;

    let project = Project::open(config, &store_config)
        .await
        .context("Failed to open project")?;
    let json = cli.json;

    match cli.command {
        Commands::Node {
            pipeline,
            name,
            body,
            inputs,
            outputs,
            tags,
            confirms,
            namespace,
        } => {
            let mut definition = NodeDefinition::new(&pipeline, &name, input::read_source(&body)?);
            if let Some(raw) = inputs {
                definition = definition.with_inputs(input::parse_binding(&raw)?);
            }
            if let Some(raw) = outputs {
                definition = definition.with_outputs(input::parse_binding(&raw)?);
            }
            if let Some(raw) = confirms {
                definition = definition.with_confirms(input::parse_binding(&raw)?);
            }
            if let Some(ns) = namespace {
                definition = definition.with_namespace(ns);
            }
            definition = definition.with_tags(tags);

            let session = project.session(&pipeline, project.default_engine()).await?;
            let outcome = session.define_node(definition).await?;

            if json {
                print_json(&outcome)?;
            } else {
                match outcome {
                    NodeOutcome::Unchanged => println!("Node '{}' unchanged", name),
                    NodeOutcome::Executed { change, result } => {
                        println!("Node '{}' stored ({:?})", name, change);
                        print_run(&result);
                    }
                }
            }
        }

        Commands::Imports { pipeline, source } => {
            let text = input::read_source(&source)?;
            let session = project.session(&pipeline, project.default_engine()).await?;
            session.update_imports(&text).await?;
            if !json {
                println!("Imports of '{}' updated", pipeline);
            }
        }

        Commands::Catalog { command } => match command {
            CatalogCommands::Set {
                name,
                entry_type,
                fields,
                file,
            } => {
                let entry = match file {
                    Some(path) => CatalogDefinition::from_yaml(&name, &input::read_source(&path)?)?,
                    None => {
                        let mut entry = CatalogDefinition::new(&name, entry_type.as_deref());
                        for raw in &fields {
                            let (key, value) = input::parse_field(raw)?;
                            entry = entry.with_field(key, value);
                        }
                        entry
                    }
                };
                project.define_catalog_entry(entry).await?;
                if !json {
                    println!("Catalog entry '{}' stored", name);
                }
            }
            CatalogCommands::Rm { name } => {
                let removed = project.delete_catalog_entry(&name).await?;
                if !json {
                    if removed {
                        println!("Catalog entry '{}' removed", name);
                    } else {
                        println!("Catalog entry '{}' was not defined", name);
                    }
                }
            }
            CatalogCommands::List => {
                let entries = project.catalog().await?;
                if json {
                    print_json(&entries)?;
                } else {
                    for entry in entries {
                        println!(
                            "{}\t{}",
                            entry.name,
                            entry.entry_type.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
        },

        Commands::Param { command } => match command {
            ParamCommands::Set {
                pipeline,
                name,
                value,
                base64,
            } => {
                let value = input::parse_parameter(&name, &value, base64)?;
                let session = project.session(&pipeline, project.default_engine()).await?;
                session.define_parameter(&name, value).await?;
                if !json {
                    println!("Parameter '{}' of '{}' stored", name, pipeline);
                }
            }
            ParamCommands::Rm { pipeline, name } => {
                let session = project.session(&pipeline, project.default_engine()).await?;
                let removed = session.delete_parameter(&name).await?;
                if !json {
                    if removed {
                        println!("Parameter '{}' of '{}' removed", name, pipeline);
                    } else {
                        println!("Parameter '{}' of '{}' was not defined", name, pipeline);
                    }
                }
            }
            ParamCommands::List { pipeline } => {
                let parameters = project.parameters(&pipeline).await?;
                if json {
                    print_json(&parameters)?;
                } else {
                    for p in parameters {
                        println!("{}\t{}\t{:?}", p.name, p.value.type_name(), p.value);
                    }
                }
            }
        },

        Commands::Run { pipeline, node } => {
            let session = project.session(&pipeline, project.default_engine()).await?;
            let result = session.run(node.as_deref()).await?;
            if json {
                print_json(&result)?;
            } else {
                print_run(&result);
            }
        }

        Commands::Regenerate { pipeline } => {
            let session = project.session(&pipeline, project.default_engine()).await?;
            session.regenerate().await?;
            if !json {
                println!("Artifacts of '{}' regenerated", pipeline);
            }
        }

        Commands::Show { pipeline } => {
            #[derive(Serialize)]
            struct Summary {
                pipeline: String,
                imports: Option<String>,
                nodes: Vec<NodeDefinition>,
                parameters: Vec<kbi_builder::db::models::Parameter>,
            }

            let summary = Summary {
                pipeline: pipeline.clone(),
                imports: project.imports(&pipeline).await?,
                nodes: project.nodes(&pipeline).await?,
                parameters: project.parameters(&pipeline).await?,
            };

            if json {
                print_json(&summary)?;
            } else {
                println!("Pipeline: {}", summary.pipeline);
                if let Some(imports) = &summary.imports {
                    println!("Imports:\n{}", imports);
                }
                println!("Nodes:");
                for node in &summary.nodes {
                    println!(
                        "  {}  inputs={}  outputs={}",
                        node.name,
                        serde_json::to_string(&node.inputs)?,
                        serde_json::to_string(&node.outputs)?
                    );
                }
                println!("Parameters:");
                for p in &summary.parameters {
                    println!("  {} ({})", p.name, p.value.type_name());
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_run(result: &RunResult) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
    println!("Run of '{}' finished in {} ms", result.pipeline, result.duration_ms);
}
