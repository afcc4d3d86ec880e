use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use autoagenda_ops::{api, config, diagnose, lint, patch, suites, watchdog, workflows};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use url::Url;

use anyhow::Context;

/// Convert a workflow name into a filesystem-friendly file name
fn file_name_for(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}.json", safe.trim_matches('-'))
}

/// Attempt to locate a default workflow JSON file in the current directory.
///
/// Preference is given to a file named `workflow.json`. If exactly one other
/// `.json` file exists, that is returned. Otherwise an error is produced.
fn default_json_path() -> anyhow::Result<PathBuf> {
    let preferred = PathBuf::from("workflow.json");
    if preferred.exists() {
        return Ok(preferred);
    }

    let mut json_files = vec![];
    for entry in fs::read_dir(".")? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|ext| ext == "json").unwrap_or(false) {
            json_files.push(path);
        }
    }

    if json_files.len() == 1 {
        Ok(json_files.remove(0))
    } else if json_files.is_empty() {
        Err(anyhow::anyhow!("No JSON files found"))
    } else {
        Err(anyhow::anyhow!(
            "Multiple JSON files found. Please specify which one to push"
        ))
    }
}

fn load_config() -> anyhow::Result<config::N8nConfig> {
    config::N8nConfig::from_env().with_context(|| {
        "Failed to load configuration. Please ensure N8N_API_URL and N8N_API_KEY are set.\n\
        Example:\n  \
        export N8N_API_URL=http://localhost:5678\n  \
        export N8N_API_KEY=your-api-key-here"
    })
}

fn read_definition(path: &PathBuf) -> anyhow::Result<serde_json::Value> {
    let data =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

fn write_definition(path: &PathBuf, definition: &serde_json::Value) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(definition)?;
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Build, deploy, patch and test the AutoAgenda workflows hosted on an n8n instance.\n\
Set the N8N_API_URL and N8N_API_KEY environment variables (or a .env file) to authenticate.\n\n\
Examples:\n  \
autoagenda-ops list --active\n  \
autoagenda-ops generate BB_00_Global_Error_Handler\n  \
autoagenda-ops push --id pCJIr9DZYmXTt6qv workflows/BB_01_Telegram_Gateway.json\n  \
autoagenda-ops test e2e",
    after_help = "ENVIRONMENT VARIABLES:\n    N8N_API_URL       Base URL of the n8n instance (default: http://localhost:5678)\n    N8N_API_KEY       API key for authentication\n    N8N_ACCESS_TOKEN  Accepted as a fallback for N8N_API_KEY",
    arg_required_else_help = true
)]
struct Cli {
    /// Abort the whole run after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List workflows on the n8n server
    List {
        /// Only show active (published) workflows
        #[arg(long)]
        active: bool,
    },
    /// Print a full report of all workflows, grouped by activation state
    Report,
    /// Create a new empty workflow with the given name and download it as JSON
    New {
        /// Name for the newly created workflow (required)
        name: String,
    },
    /// Download a workflow JSON file from the server
    Pull {
        /// ID of the workflow to download
        id: String,
        /// Optional path to save the workflow JSON. Can be a directory
        /// or a file. Defaults to workflows/<name>.json.
        path: Option<PathBuf>,
    },
    /// Upload a workflow JSON file to the server
    ///
    /// If no ID or path is provided, the command will attempt to
    /// locate a single JSON file in the current directory and read
    /// the `id` field from it. The body is sanitized to the fields the
    /// Public API accepts on update.
    Push {
        /// ID of the workflow to update. If omitted, the ID will be
        /// read from the JSON file.
        #[arg(long)]
        id: Option<String>,
        /// Path to the workflow JSON file to upload
        path: Option<PathBuf>,
    },
    /// Delete a workflow from the server
    Delete {
        /// ID of the workflow to delete
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Activate (publish) a workflow so its webhooks go live
    Activate {
        /// Workflow ID, or its exact name with --name
        target: String,
        /// Treat the target as a workflow name instead of an ID
        #[arg(long)]
        name: bool,
    },
    /// Deactivate (unpublish) a workflow
    Deactivate {
        /// Workflow ID, or its exact name with --name
        target: String,
        /// Treat the target as a workflow name instead of an ID
        #[arg(long)]
        name: bool,
    },
    /// List recent executions
    Executions {
        /// Filter by workflow ID
        #[arg(long)]
        workflow: Option<String>,
        /// Filter by status (success, error, running, waiting)
        #[arg(long)]
        status: Option<String>,
        /// Maximum number of executions to fetch
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Fetch a single execution with its run data
    Execution {
        /// ID of the execution
        id: String,
    },
    /// POST a JSON payload to a production webhook path
    Trigger {
        /// Webhook path, e.g. bb03-main
        path: String,
        /// Inline JSON payload, or @file to read it from disk
        #[arg(long)]
        data: Option<String>,
    },
    /// Generate workflow definition JSON from the built-in generators
    Generate {
        /// Generator name; omit to generate all of them
        name: Option<String>,
        /// Output directory
        #[arg(long, default_value = "workflows")]
        out: PathBuf,
        /// Lint each definition and fail instead of writing broken JSON
        #[arg(long)]
        check: bool,
    },
    /// Lint workflow definition files without touching the server
    Lint {
        /// Definition files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Apply offline surgery to a workflow definition file
    Patch {
        /// Definition file to patch in place
        file: PathBuf,
        #[command(subcommand)]
        op: PatchOp,
    },
    /// Run an integration suite against the live webhook surface
    Test {
        /// Suite to run: smoke, e2e, security, edge or all
        suite: String,
        /// Override the instance base URL (defaults to the configured host)
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Probe the instance connectivity step by step
    Diagnose,
}

#[derive(Subcommand)]
enum PatchOp {
    /// Insert a logging code node in front of each target node
    InjectLogging {
        /// Node name to instrument; repeatable
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
    },
    /// Rewrite executeWorkflow resource-locator references to plain IDs
    FlattenRefs {
        /// JSON file mapping workflow names to IDs
        #[arg(long)]
        map: PathBuf,
    },
    /// Apply a regex replacement to every code node
    RewriteCode {
        /// Regex applied to each jsCode parameter
        #[arg(long)]
        pattern: String,
        /// Replacement text ($1-style groups allowed)
        #[arg(long)]
        replace: String,
    },
    /// Replace an exact text literal in the raw file
    ReplaceText {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Some(seconds) = cli.timeout {
        watchdog::arm(if seconds == 0 {
            watchdog::DEFAULT_TIMEOUT_SECS
        } else {
            seconds
        });
    }

    match cli.command {
        Commands::List { active } => {
            let cfg = load_config()?;
            println!("Fetching workflows from {}...", cfg.host);
            let workflows = if active {
                api::list_active_workflows(&cfg).await
            } else {
                api::list_workflows(&cfg).await
            }
            .with_context(|| "Failed to list workflows. Please check your N8N_API_URL and N8N_API_KEY")?;

            if workflows.is_empty() {
                println!("No workflows found on the server.");
            } else {
                println!("Found {} workflow(s):", workflows.len());
                for wf in workflows {
                    let status = if wf.active { "ACTIVE" } else { "INACTIVE" };
                    println!("  {}: {} [{}]", wf.id, wf.name, status);
                }
            }
        }
        Commands::Report => {
            let cfg = load_config()?;
            println!("=== N8N Workflows Report ===");
            println!("Connected to: {}\n", cfg.host);

            let all = api::list_workflows(&cfg).await?;
            println!("Total workflows found: {}\n", all.len());

            let (active, inactive): (Vec<_>, Vec<_>) = all.into_iter().partition(|wf| wf.active);

            for (title, group) in [("Active", &active), ("Inactive", &inactive)] {
                println!("{} workflows ({}):", title, group.len());
                println!("{}", "-".repeat(50));
                for wf in group {
                    println!("  • ID: {}", wf.id);
                    println!("    Name: {}", wf.name);
                    println!("    Created: {}", wf.created_at.as_deref().unwrap_or("N/A"));
                    println!("    Updated: {}", wf.updated_at.as_deref().unwrap_or("N/A"));
                    println!();
                }
            }
        }
        Commands::New { name } => {
            if name.trim().is_empty() {
                return Err(anyhow::anyhow!("Workflow name cannot be empty"));
            }
            let cfg = load_config()?;

            println!("Creating new workflow: \"{}\"", name);
            let wf = api::create_empty_workflow(&cfg, &name)
                .await
                .with_context(|| format!("Failed to create workflow \"{}\"", name))?;

            println!("Created workflow with ID: {}", wf.id);

            let wf_json = api::get_workflow(&cfg, &wf.id)
                .await
                .with_context(|| format!("Failed to download workflow {}", wf.id))?;

            let dir = PathBuf::from("workflows");
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            let json_path = dir.join(file_name_for(&wf.name));
            write_definition(&json_path, &wf_json)?;

            println!("✓ Created workflow {} at {}", wf.id, json_path.display());
        }
        Commands::Pull { id, path } => {
            let cfg = load_config()?;
            let wf_json = api::get_workflow(&cfg, &id)
                .await
                .with_context(|| format!("Failed to download workflow {}", id))?;

            let name = wf_json
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(&id)
                .to_string();

            let json_path = match path {
                Some(p) if p.is_dir() || p.extension().is_none() => p.join(file_name_for(&name)),
                Some(p) => p,
                None => PathBuf::from("workflows").join(file_name_for(&name)),
            };

            if let Some(parent) = json_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create directory {}", parent.display()))?;
                }
            }

            if json_path.exists() {
                if !Confirm::new()
                    .with_prompt(format!("Overwrite {}?", json_path.display()))
                    .default(false)
                    .interact()?
                {
                    println!("Aborted");
                    return Ok(());
                }
            }

            write_definition(&json_path, &wf_json)?;
            println!("✓ Downloaded workflow {} to {}", id, json_path.display());
        }
        Commands::Push { id, path } => {
            let cfg = load_config()?;

            let path = match path {
                Some(p) => p,
                None => default_json_path()
                    .with_context(|| "Unable to determine workflow JSON file. Please specify a path.")?,
            };

            let json = read_definition(&path)?;

            // Command line argument overrides the JSON field.
            let id = match id {
                Some(v) => v,
                None => json
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| {
                        anyhow::anyhow!("Workflow ID not provided and not found in JSON")
                    })?,
            };

            println!("Uploading {} to workflow {}...", path.display(), id);

            let body = patch::sanitize_for_update(&json);
            let wf = api::update_workflow(&cfg, &id, &body)
                .await
                .with_context(|| format!("Failed to update workflow {}", id))?;
            println!("✓ Updated workflow {}: {}", wf.id, wf.name);
        }
        Commands::Delete { id, yes } => {
            let cfg = load_config()?;

            if !yes
                && !Confirm::new()
                    .with_prompt(format!("Delete workflow {} from {}?", id, cfg.host))
                    .default(false)
                    .interact()?
            {
                println!("Aborted");
                return Ok(());
            }

            api::delete_workflow(&cfg, &id)
                .await
                .with_context(|| format!("Failed to delete workflow {}", id))?;
            println!("✓ Deleted workflow {}", id);
        }
        Commands::Activate { target, name } => {
            let cfg = load_config()?;
            let id = resolve_target(&cfg, &target, name).await?;

            api::activate_workflow(&cfg, &id)
                .await
                .with_context(|| format!("Failed to activate workflow {}", id))?;

            // Activation propagates to the webhook router asynchronously;
            // verify after it has settled.
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            let wf_json = api::get_workflow(&cfg, &id).await?;
            let is_active = wf_json
                .get("active")
                .and_then(|a| a.as_bool())
                .unwrap_or(false);
            let wf_name = wf_json.get("name").and_then(|n| n.as_str()).unwrap_or("?");
            println!(
                "✓ Workflow '{}' ({}) is now {}",
                wf_name,
                id,
                if is_active { "ACTIVE" } else { "INACTIVE" }
            );
        }
        Commands::Deactivate { target, name } => {
            let cfg = load_config()?;
            let id = resolve_target(&cfg, &target, name).await?;

            api::deactivate_workflow(&cfg, &id)
                .await
                .with_context(|| format!("Failed to deactivate workflow {}", id))?;
            println!("✓ Deactivated workflow {}", id);
        }
        Commands::Executions {
            workflow,
            status,
            limit,
        } => {
            let cfg = load_config()?;
            let executions =
                api::list_executions(&cfg, workflow.as_deref(), limit, status.as_deref())
                    .await
                    .with_context(|| "Failed to list executions")?;

            if executions.is_empty() {
                println!("No executions found.");
            } else {
                println!("Found {} execution(s):", executions.len());
                for ex in executions {
                    println!(
                        "  {} | workflow {} | {} | started {} | stopped {}",
                        ex.id,
                        ex.workflow_id.as_deref().unwrap_or("?"),
                        ex.status.as_deref().unwrap_or("unknown"),
                        ex.started_at.as_deref().unwrap_or("N/A"),
                        ex.stopped_at.as_deref().unwrap_or("N/A"),
                    );
                }
            }
        }
        Commands::Execution { id } => {
            let cfg = load_config()?;
            let execution = api::get_execution(&cfg, &id)
                .await
                .with_context(|| format!("Failed to fetch execution {}", id))?;
            println!("{}", serde_json::to_string_pretty(&execution)?);
        }
        Commands::Trigger { path, data } => {
            let cfg = load_config()?;
            let payload = match data {
                Some(raw) if raw.starts_with('@') => {
                    let file = PathBuf::from(&raw[1..]);
                    read_definition(&file)?
                }
                Some(raw) => serde_json::from_str(&raw)
                    .with_context(|| "Failed to parse --data as JSON")?,
                None => serde_json::json!({}),
            };

            println!("POST {}", cfg.webhook_endpoint(&path));
            let (status, body) = api::trigger_webhook(&cfg, &path, &payload).await?;
            println!("HTTP {}", status);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Generate { name, out, check } => {
            let selected: Vec<&str> = match &name {
                Some(n) => {
                    if !workflows::names().contains(&n.as_str()) {
                        return Err(anyhow::anyhow!(
                            "Unknown generator '{}'. Available: {}",
                            n,
                            workflows::names().join(", ")
                        ));
                    }
                    vec![n.as_str()]
                }
                None => workflows::names(),
            };

            for gen_name in selected {
                let definition = workflows::build(gen_name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown generator '{}'", gen_name))?;

                if check {
                    let issues = lint::lint_definition(&definition);
                    if !issues.is_empty() {
                        for issue in &issues {
                            println!("  ✗ {}: {}", gen_name, issue);
                        }
                        return Err(anyhow::anyhow!("{} failed lint", gen_name));
                    }
                }

                let path = workflows::write_definition(&out, &definition)?;
                println!("✓ Generated {}", path.display());
            }
        }
        Commands::Lint { files } => {
            let mut total_issues = 0;
            for file in &files {
                let definition = read_definition(file)?;
                let issues = lint::lint_definition(&definition);
                if issues.is_empty() {
                    println!("✓ {}", file.display());
                } else {
                    println!("✗ {}:", file.display());
                    for issue in &issues {
                        println!("    {}", issue);
                    }
                    total_issues += issues.len();
                }
            }
            if total_issues > 0 {
                return Err(anyhow::anyhow!("{} lint issue(s) found", total_issues));
            }
        }
        Commands::Patch { file, op } => match op {
            PatchOp::InjectLogging { targets } => {
                let mut definition = read_definition(&file)?;
                let target_refs: Vec<&str> = targets.iter().map(|t| t.as_str()).collect();
                let injected = patch::inject_logging(&mut definition, &target_refs);
                write_definition(&file, &definition)?;
                println!("✓ Injected {} logger(s) into {}", injected, file.display());
            }
            PatchOp::FlattenRefs { map } => {
                let ids: HashMap<String, String> = serde_json::from_str(
                    &fs::read_to_string(&map)
                        .with_context(|| format!("Failed to read {}", map.display()))?,
                )
                .with_context(|| format!("Failed to parse ID map in {}", map.display()))?;

                let mut definition = read_definition(&file)?;
                let fixed = patch::flatten_workflow_refs(&mut definition, &ids);
                write_definition(&file, &definition)?;
                println!("✓ Rewrote {} reference(s) in {}", fixed, file.display());
            }
            PatchOp::RewriteCode { pattern, replace } => {
                let re = regex::Regex::new(&pattern)
                    .with_context(|| format!("Invalid regex '{}'", pattern))?;
                let mut definition = read_definition(&file)?;
                let changed = patch::rewrite_code_nodes(&mut definition, &re, &replace);
                write_definition(&file, &definition)?;
                println!("✓ Rewrote {} code node(s) in {}", changed, file.display());
            }
            PatchOp::ReplaceText { from, to } => {
                let content = fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let (patched, count) = patch::replace_literal(&content, &from, &to);
                if count > 0 {
                    // Make sure the surgery did not break the JSON.
                    serde_json::from_str::<serde_json::Value>(&patched)
                        .with_context(|| "Replacement would produce invalid JSON; aborting")?;
                    fs::write(&file, patched)
                        .with_context(|| format!("Failed to write {}", file.display()))?;
                }
                println!("✓ Replaced {} occurrence(s) in {}", count, file.display());
            }
        },
        Commands::Test { suite, base_url } => {
            let base = match base_url {
                Some(raw) => Url::parse(&raw).with_context(|| format!("Invalid URL '{}'", raw))?,
                None => load_config()?.host,
            };

            println!("Running '{}' suite against {}", suite, base);
            let ok = suites::run(&suite, base).await?;
            if !ok {
                return Err(anyhow::anyhow!("Some steps failed"));
            }
        }
        Commands::Diagnose => {
            let cfg = load_config()?;
            let ok = diagnose::run(&cfg).await?;
            if !ok {
                return Err(anyhow::anyhow!("Some probes failed"));
            }
        }
    }
    Ok(())
}

async fn resolve_target(
    cfg: &config::N8nConfig,
    target: &str,
    by_name: bool,
) -> anyhow::Result<String> {
    if !by_name {
        return Ok(target.to_string());
    }
    println!("Looking up workflow named '{}'...", target);
    match api::find_workflow_by_name(cfg, target).await? {
        Some(wf) => {
            println!("Found workflow '{}' (ID: {})", wf.name, wf.id);
            Ok(wf.id)
        }
        None => Err(anyhow::anyhow!("Workflow '{}' not found", target)),
    }
}
