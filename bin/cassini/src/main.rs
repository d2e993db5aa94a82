//! Cassini command line browser.
//!
//! Serves a project bundle from memory and runs one command against it:
//! - walking the tier tree by identifier path
//! - reading and editing tier metadata
//! - creating child tiers

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use cassini_documents::{DocumentBackend, FsBackend};
use cassini_engine::fixture::ProjectBundle;
use cassini_engine::{Cassini, EngineConfig, LaunchTarget, TierModel};
use cassini_types::{NewChildInfo, TierPath};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "cassini")]
#[command(about = "Browse and edit a Cassini tier tree")]
struct Args {
	/// Project bundle with trees, tier infos and documents
	#[arg(short, long, value_name = "PATH")]
	project: PathBuf,

	/// Read and write documents below this directory instead of the bundle
	#[arg(short, long, value_name = "DIR")]
	root: Option<PathBuf>,

	/// Engine configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show the tier at an identifier path and its children
	Tree {
		/// Identifiers from the root, e.g. `1 1`
		ids: Vec<String>,
	},
	/// Resolve a tier name to its identifier path
	Lookup { name: String },
	/// Print the metadata of a notebook tier
	Meta {
		name: String,
		/// Only the user-curated entries
		#[arg(long)]
		additional: bool,
	},
	/// Set one metadata entry and save
	Set {
		name: String,
		key: String,
		/// JSON value; bare words are taken as strings
		value: String,
	},
	/// Create a child tier
	NewChild {
		parent: String,
		id: String,
		#[arg(long)]
		description: Option<String>,
		#[arg(long)]
		template: Option<String>,
	},
	/// Open a tier: print a notebook's document path or ask the server to open a folder
	Open { name: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => EngineConfig::load(path)?,
		None => EngineConfig::default(),
	};
	let bundle = ProjectBundle::load(&args.project)
		.with_context(|| format!("loading project {}", args.project.display()))?;
	let backend: Arc<dyn DocumentBackend> = match &args.root {
		Some(root) => Arc::new(FsBackend::new(root)),
		None => Arc::new(bundle.backend()),
	};
	info!(project = %args.project.display(), trees = bundle.project.trees.len(), "loaded project");

	let cassini = Cassini::builder(Arc::new(bundle.service()))
		.backend(backend)
		.config(config)
		.build();
	if cassini.initialize().await.is_none() {
		bail!("project has no root tier");
	}

	let result = run(&cassini, args.command).await;
	cassini.shutdown();
	result
}

async fn run(cassini: &Cassini, command: Command) -> anyhow::Result<()> {
	match command {
		Command::Tree { ids } => {
			let path = TierPath::new(ids);
			let node = cassini
				.cache()
				.get(&path, false)
				.await
				.with_context(|| format!("no tier at {path}"))?;
			let node = node.snapshot();
			println!("{} ({})", node.name, node.folder);
			if let Some(info) = &node.info {
				println!("  {info}");
			}
			for (id, child) in &node.children {
				match &child.outcome {
					Some(outcome) => println!("{id}\t{}\t{outcome}", child.name),
					None => println!("{id}\t{}", child.name),
				}
			}
		}
		Command::Lookup { name } => {
			let node = cassini
				.cache()
				.lookup(&name)
				.await
				.with_context(|| format!("unknown tier {name:?}"))?;
			println!("{}", node.path());
		}
		Command::Meta { name, additional } => {
			let notebook = notebook(cassini, &name).await?;
			let meta = if additional {
				notebook.additional_meta()
			} else {
				notebook.meta()
			};
			println!("{}", serde_json::to_string_pretty(&meta)?);
		}
		Command::Set { name, key, value } => {
			let notebook = notebook(cassini, &name).await?;
			let value = serde_json::from_str::<serde_json::Value>(&value)
				.unwrap_or(serde_json::Value::String(value));
			if !notebook.set_meta_value(&key, value) {
				bail!("{key} was not changed");
			}
			notebook.save().await?;
			debug!(name, key, "saved metadata");
		}
		Command::NewChild {
			parent,
			id,
			description,
			template,
		} => {
			let mut info = NewChildInfo::new(parent, id);
			if let Some(description) = description {
				info = info.description(description);
			}
			if let Some(template) = template {
				info = info.template(template);
			}
			let child = cassini.new_child(info).await?;
			println!("{}\t{}", child.path(), child.name());
		}
		Command::Open { name } => {
			let model = cassini.model(&name, false).await?;
			match cassini.launch_target(&model).await? {
				LaunchTarget::Notebook(path) => println!("{path}"),
				LaunchTarget::Folder { opened: true } => println!("opened {name}"),
				LaunchTarget::Folder { opened: false } => bail!("server did not open {name}"),
			}
		}
	}
	Ok(())
}

async fn notebook(cassini: &Cassini, name: &str) -> anyhow::Result<Arc<cassini_engine::NotebookTierModel>> {
	let model = cassini.model(name, false).await?;
	let TierModel::Notebook(notebook) = model else {
		bail!("{name} is a folder tier");
	};
	notebook.ready().await?;
	Ok(notebook)
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("cassini=debug,cassini_engine=debug,info")
		} else {
			EnvFilter::new("warn")
		}
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
