use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stash_core::{admin, modules, ContainerRecord, Content, ItemStack, RecordStore, VoidEntry};
use stash_store::SqliteStore;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "stash_cli", about = "Container store administration")]
struct Cli {
    /// SQLite record store.
    #[arg(long, global = true, default_value = "./stash.db")]
    db: String,
    #[arg(long, global = true, default_value = "./content")]
    content_dir: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect the void audit log.
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Inspect persisted containers.
    Container {
        #[command(subcommand)]
        command: ContainerCommand,
    },
    /// Load and validate the content directory.
    Content,
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// List audit rows, newest first.
    List {
        /// Only rows voided from this actor.
        #[arg(long)]
        actor: Option<String>,
        /// Include rows that were already recovered.
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one audit row with its decoded item.
    Show { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ContainerCommand {
    List,
    Show { id: String },
    /// Print a fresh item for a persisted container as JSON.
    Recreate { id: String },
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map_or_else(|| ms.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn describe_item(item: &ItemStack) -> String {
    match &item.name {
        Some(name) => format!("{} x{} \"{name}\"", item.kind, item.amount),
        None => format!("{} x{}", item.kind, item.amount),
    }
}

fn audit_line(entry: &VoidEntry) -> String {
    let status = match (&entry.recovered_at_ms, &entry.recovered_by) {
        (Some(at), Some(by)) => format!("recovered by {by} at {}", format_ms(*at)),
        (Some(at), None) => format!("recovered at {}", format_ms(*at)),
        _ => "open".to_string(),
    };
    format!(
        "#{:<6} {} {:<16} {} x{:<4} from {} ({}) [{status}]",
        entry.id,
        format_ms(entry.created_at_ms),
        entry.actor_name.as_deref().unwrap_or("-"),
        entry.item_kind,
        entry.amount,
        entry.container_type,
        entry.container_id,
    )
}

fn container_report(record: &ContainerRecord, content: Option<&Content>) -> Vec<String> {
    let mut lines = vec![
        format!("container {}", record.id),
        format!("  type:    {}", record.type_id),
        format!(
            "  owner:   {}",
            record
                .owner
                .as_ref()
                .map_or_else(|| "-".to_string(), |o| format!("{} ({})", o.name, o.id))
        ),
        format!("  created: {}", format_ms(record.created_at_ms)),
        format!("  updated: {}", format_ms(record.updated_at_ms)),
        format!(
            "  storage: {} items in {}/{} slots",
            record.item_count(),
            record.contents.iter().flatten().count(),
            record.contents.len()
        ),
    ];
    for (slot, item) in record.contents.iter().enumerate() {
        if let Some(item) = item {
            lines.push(format!("    [{slot:>3}] {}", describe_item(item)));
        }
    }
    for (socket, module) in &record.sockets {
        let type_id = module.module_type().unwrap_or_else(|| "?".to_string());
        let enabled = if module.is_enabled() { "on" } else { "off" };
        let mut line = format!("  socket {socket}: {type_id} {} [{enabled}]", module.module_id);
        if let Some(def) = content.and_then(|c| c.installed_def(module)) {
            let state = modules::load_state(module, def.kind);
            line.push_str(&format!(" {state:?}"));
        }
        lines.push(line);
    }
    lines
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn audit(store: &mut SqliteStore, command: AuditCommand) -> Result<()> {
    match command {
        AuditCommand::List { actor, all, json } => {
            let actor = actor
                .as_deref()
                .map(stash_core::ActorId::parse)
                .transpose()?;
            let entries = admin::list_void_entries(store, actor, all)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("no audit rows");
            } else {
                for entry in &entries {
                    println!("{}", audit_line(entry));
                }
            }
        }
        AuditCommand::Show { id } => {
            let entry = store
                .void_entry(id)?
                .ok_or(stash_core::StashError::AuditEntryNotFound(id))?;
            println!("{}", audit_line(&entry));
            if let Some(location) = &entry.location {
                println!("  location: {location}");
            }
            match stash_core::decode_item(&entry.payload) {
                Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
                None => println!("  payload unreadable ({} bytes)", entry.payload.len()),
            }
        }
    }
    Ok(())
}

fn container(store: &mut SqliteStore, content_dir: &str, command: ContainerCommand) -> Result<()> {
    match command {
        ContainerCommand::List => {
            let summaries = store.list_containers()?;
            if summaries.is_empty() {
                println!("no containers");
            }
            for s in summaries {
                println!(
                    "{} {:<12} sockets={} owner={} updated={}",
                    s.id,
                    s.type_id,
                    s.socket_count,
                    s.owner_name.as_deref().unwrap_or("-"),
                    format_ms(s.updated_at_ms)
                );
            }
        }
        ContainerCommand::Show { id } => {
            let id = admin::parse_container_id(&id)?;
            let record = store
                .load(id)?
                .ok_or(stash_core::StashError::UnknownContainer(id))?;
            // Content only adds module state detail; a missing directory is not fatal here.
            let content = match stash_content::load_content(content_dir) {
                Ok(content) => Some(content),
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "content unavailable, showing raw sockets");
                    None
                }
            };
            for line in container_report(&record, content.as_ref()) {
                println!("{line}");
            }
        }
        ContainerCommand::Recreate { id } => {
            let id = admin::parse_container_id(&id)?;
            let content = stash_content::load_content(content_dir)?;
            let item = admin::recreate_container_item(store, &content, id)?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
    }
    Ok(())
}

fn check_content(content_dir: &str) -> Result<()> {
    let content = stash_content::load_content(content_dir)?;
    let mut containers: Vec<_> = content.containers.values().collect();
    containers.sort_by(|a, b| a.id.cmp(&b.id));
    println!("content {} OK", content.content_version);
    for def in containers {
        println!(
            "  container {:<12} rows={} sockets={} paginated={}",
            def.id,
            def.rows,
            def.upgrade_sockets,
            def.paginated()
        );
    }
    let mut modules: Vec<_> = content.modules.values().collect();
    modules.sort_by(|a, b| a.id.cmp(&b.id));
    for def in modules {
        println!("  module    {:<12} kind={}", def.id, def.kind.label());
    }
    println!("  {} items", content.items.defs().len());
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Content => check_content(&cli.content_dir)?,
        Commands::Audit { command } => {
            let mut store = SqliteStore::open(&cli.db)
                .with_context(|| format!("opening record store {}", cli.db))?;
            audit(&mut store, command)?;
        }
        Commands::Container { command } => {
            let mut store = SqliteStore::open(&cli.db)
                .with_context(|| format!("opening record store {}", cli.db))?;
            container(&mut store, &cli.content_dir, command)?;
        }
    }
    Ok(())
}
