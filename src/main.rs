//! kcascade CLI: scoped knowledge with overrides and version history.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use knowledge_cascade::access::{self, Caller, Capability, Role};
use knowledge_cascade::config::EngineConfig;
use knowledge_cascade::engine::KnowledgeEngine;
use knowledge_cascade::item::{KnowledgeId, NewKnowledge};
use knowledge_cascade::overrides::OverrideRequest;
use knowledge_cascade::scope::{ResolutionContext, ScopeKey};
use knowledge_cascade::value::attributes_from_json;

#[derive(Parser)]
#[command(
    name = "kcascade",
    version,
    about = "Hierarchical knowledge overrides with version history"
)]
struct Cli {
    /// Data directory for persistent storage.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Identity recorded as the creator of new items.
    #[arg(long = "as", global = true, default_value = "cli")]
    identity: String,

    /// Caller role: system-admin, tenant-admin:<tenant>, or reader.
    /// Writes and deletes need an admin role.
    #[arg(long = "role", global = true, default_value = "reader")]
    roles: Vec<Role>,

    #[command(subcommand)]
    command: Commands,
}

/// A scope given as qualifier flags. No flags selects System.
#[derive(Args)]
struct ScopeArgs {
    /// Tenant id.
    #[arg(long)]
    tenant: Option<String>,

    /// Agent name (requires --tenant and --activation).
    #[arg(long)]
    agent: Option<String>,

    /// Activation name (requires --tenant and --agent).
    #[arg(long)]
    activation: Option<String>,
}

impl ScopeArgs {
    fn scope(&self) -> Result<ScopeKey> {
        Ok(ScopeKey::from_parts(
            self.tenant.as_deref(),
            self.agent.as_deref(),
            self.activation.as_deref(),
        )?)
    }
}

/// A runtime context to resolve for.
#[derive(Args)]
struct ContextArgs {
    /// Tenant id.
    #[arg(long)]
    tenant: String,

    /// Agent name.
    #[arg(long)]
    agent: Option<String>,

    /// Activation name.
    #[arg(long)]
    activation: Option<String>,
}

impl ContextArgs {
    fn context(&self) -> ResolutionContext {
        ResolutionContext {
            tenant: self.tenant.clone(),
            agent: self.agent.clone(),
            activation: self.activation.clone(),
        }
    }
}

/// Content of a new version.
#[derive(Args)]
struct ContentArgs {
    /// Inline content.
    #[arg(long, conflicts_with = "file")]
    content: Option<String>,

    /// Read content from a file.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Content type label.
    #[arg(long, default_value = "text")]
    content_type: String,

    /// Attributes as a JSON object.
    #[arg(long)]
    attributes: Option<String>,
}

impl ContentArgs {
    fn content(&self) -> Result<String> {
        match (&self.content, &self.file) {
            (Some(content), _) => Ok(content.clone()),
            (None, Some(path)) => std::fs::read_to_string(path).into_diagnostic(),
            (None, None) => miette::bail!("either --content or --file is required"),
        }
    }

    fn new_knowledge(&self, name: &str, scope: ScopeKey, identity: &str) -> Result<NewKnowledge> {
        let mut req =
            NewKnowledge::new(name, scope, self.content()?, &self.content_type).by(identity);
        if let Some(json) = &self.attributes {
            req = req.with_attributes(attributes_from_json(json)?);
        }
        Ok(req)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a version to a chain, or return the one holding identical content.
    Create {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        content: ContentArgs,
    },

    /// Record new content for an existing name.
    Update {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        content: ContentArgs,
    },

    /// Copy an item into a narrower scope, optionally with new content.
    Override {
        /// Id of the item to copy.
        source: String,
        /// Target scope.
        #[command(flatten)]
        target: ScopeArgs,
        /// Replacement content.
        #[arg(long)]
        content: Option<String>,
        /// Replacement content type.
        #[arg(long)]
        content_type: Option<String>,
        /// Replacement attributes as a JSON object.
        #[arg(long)]
        attributes: Option<String>,
    },

    /// Show one item by id.
    Get { id: String },

    /// Show the latest version of one chain.
    Latest {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show every version of one chain, newest first.
    Versions {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// List the latest item of every chain at one scope.
    List {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Resolve effective knowledge for a context (all names, or one).
    Resolve {
        name: Option<String>,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Show the latest item of a name at each reachable scope.
    Layers {
        name: String,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Delete every version of a name at exactly one scope.
    DeleteChain {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Delete one version by id.
    Delete { id: String },

    /// Show engine info and statistics.
    Info,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().build())
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let engine = KnowledgeEngine::new(config)?;
    let caller = Caller::new(cli.identity.clone(), cli.roles.clone());

    match cli.command {
        Commands::Create {
            name,
            scope,
            content,
        } => {
            let scope = scope.scope()?;
            access::authorize(&caller, Capability::Write, &scope)?;
            let (item, created) =
                engine.create_or_return(content.new_knowledge(&name, scope, &caller.identity)?)?;
            print_json(&serde_json::json!({ "created": created, "item": item }))?;
        }

        Commands::Update {
            name,
            scope,
            content,
        } => {
            let scope = scope.scope()?;
            access::authorize(&caller, Capability::Write, &scope)?;
            let item = engine.update(content.new_knowledge(&name, scope, &caller.identity)?)?;
            print_json(&item)?;
        }

        Commands::Override {
            source,
            target,
            content,
            content_type,
            attributes,
        } => {
            let target = target.scope()?;
            access::authorize(&caller, Capability::Write, &target)?;
            let mut req = OverrideRequest::new(source.parse()?, target, &caller.identity);
            if let Some(content) = content {
                req = req.with_content(content);
            }
            if let Some(content_type) = content_type {
                req = req.with_content_type(content_type);
            }
            if let Some(json) = attributes {
                req = req.with_attributes(attributes_from_json(&json)?);
            }
            print_json(&engine.override_item(req)?)?;
        }

        Commands::Get { id } => {
            let item = engine.get(&id.parse()?)?;
            access::authorize(&caller, Capability::Read, &item.scope)?;
            print_json(&item)?;
        }

        Commands::Latest { name, scope } => {
            let scope = scope.scope()?;
            access::authorize(&caller, Capability::Read, &scope)?;
            print_json(&engine.latest(&name, &scope)?)?;
        }

        Commands::Versions { name, scope } => {
            let scope = scope.scope()?;
            access::authorize(&caller, Capability::Read, &scope)?;
            print_json(&engine.all_versions(&name, &scope)?)?;
        }

        Commands::List { scope } => {
            let scope = scope.scope()?;
            access::authorize(&caller, Capability::Read, &scope)?;
            print_json(&engine.list_scope(&scope)?)?;
        }

        Commands::Resolve { name, context } => {
            let ctx = context.context();
            access::authorize(&caller, Capability::Read, &ScopeKey::tenant(&ctx.tenant))?;
            match name {
                Some(name) => print_json(&engine.resolve_one(&name, &ctx)?)?,
                None => print_json(&engine.resolve_all(&ctx)?)?,
            }
        }

        Commands::Layers { name, context } => {
            let ctx = context.context();
            access::authorize(&caller, Capability::Read, &ScopeKey::tenant(&ctx.tenant))?;
            print_json(&engine.layers(&name, &ctx)?)?;
        }

        Commands::DeleteChain { name, scope } => {
            let scope = scope.scope()?;
            access::authorize(&caller, Capability::Delete, &scope)?;
            let deleted = engine.delete_all_versions(&name, &scope)?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }

        Commands::Delete { id } => {
            let id: KnowledgeId = id.parse()?;
            // An unknown id reports deleted = false rather than an error.
            let deleted = match engine.get(&id) {
                Ok(item) => {
                    access::authorize(&caller, Capability::Delete, &item.scope)?;
                    engine.delete_one(&id)?
                }
                Err(knowledge_cascade::error::KnowledgeError::NotFound { .. }) => false,
                Err(e) => return Err(e.into()),
            };
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }

        Commands::Info => {
            print_json(&engine.info()?)?;
        }
    }

    Ok(())
}

/// Config file first, then `--data-dir`, then the XDG default directory.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if config.data_dir.is_none() {
        config.data_dir = Some(EngineConfig::default_data_dir()?);
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
