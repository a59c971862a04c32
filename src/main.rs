mod assistant;
mod case;
mod classification;
mod config;
mod documents;
mod draft;
mod schema;
mod session;
mod storage;
mod store;
mod tui;
mod validation;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use config::{ConfigFile, Overrides, ResolvedConfig};
use tracing_subscriber::EnvFilter;

use crate::assistant::HttpAssistant;
use crate::documents::{DocumentClient, format_action_steps};
use crate::session::Session;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

#[derive(Parser, Debug)]
#[command(
    name = "zant",
    about = "Guided workplace accident notification: chat with the assistant, fix the form, get the documents",
    long_about = None,
)]
struct Args {
    /// Profile to use from config file
    #[arg(short, long, env = "ZANT_PROFILE")]
    profile: Option<String>,

    /// Override backend URL
    #[arg(long, env = "ZANT_BACKEND_URL")]
    backend: Option<String>,

    /// Override request timeout, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Where generated document archives are saved
    #[arg(long, value_name = "DIR")]
    download_dir: Option<PathBuf>,

    /// Where the session (history, case, case id) is persisted
    #[arg(long, value_name = "DIR", env = "ZANT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep the session in memory only; nothing is read from or written to disk
    #[arg(long)]
    ephemeral: bool,

    /// Send one message to the assistant, print the reply and exit
    #[arg(short, long, value_name = "MESSAGE")]
    send: Option<String>,

    /// Print the current case as JSON and exit
    #[arg(long)]
    show: bool,

    /// Generate the documents for the current case, save the archive and exit
    #[arg(long)]
    download: bool,

    /// Erase the persisted session and exit
    #[arg(long)]
    reset: bool,

    /// Write a default config file to ~/.config/zant/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

impl Args {
    fn headless(&self) -> bool {
        self.send.is_some() || self.show || self.download || self.reset
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: zant");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        &Overrides {
            profile: args.profile.as_deref(),
            backend_url: args.backend.as_deref(),
            request_timeout_secs: args.timeout,
            download_dir: args.download_dir.as_deref(),
            data_dir: args.data_dir.as_deref(),
        },
    );

    // The TUI owns the terminal, so its log goes to a file.
    let log_dir = (!args.headless()).then_some(resolved.data_dir.as_path());
    init_tracing(log_dir)?;

    let storage: Arc<dyn KeyValueStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::open(&resolved.data_dir)?)
    };
    let mut session = Session::open(storage);
    tracing::info!(
        profile = %resolved.profile_name,
        backend = %resolved.backend_url,
        ephemeral = args.ephemeral,
        merge_policy = session.store().policy_name(),
        "session opened"
    );

    // ── Headless modes (plain stdout, no TUI) ─────────────────────────────────
    if args.reset {
        session.clear();
        println!("Session cleared.");
        return Ok(());
    }
    if let Some(message) = &args.send {
        return run_send(&mut session, &resolved, message).await;
    }
    if args.show {
        let case = session.case();
        println!("{}", serde_json::to_string_pretty(&*case)?);
        return Ok(());
    }
    if args.download {
        return run_download(&mut session, &resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(session, resolved).await
}

fn init_tracing(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env("ZANT_LOG").unwrap_or_else(|_| EnvFilter::new("zant=info"));
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join(format!("zant-{}.log", chrono::Local::now().format("%Y-%m-%d")));
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

// ── --send ────────────────────────────────────────────────────────────────────

async fn run_send(session: &mut Session, resolved: &ResolvedConfig, message: &str) -> Result<()> {
    let backend = HttpAssistant::new(&resolved.backend_url, resolved.request_timeout)?;
    session.send_message(&backend, message).await?;

    if let Some(reply) = session.history().last() {
        println!();
        println!("{}", reply.content);
    }
    let missing = session.missing_fields();
    if !missing.is_empty() {
        println!();
        println!("  Brakujące pola");
        for m in missing {
            if m.reason.is_empty() {
                println!("    {}", m.field);
            } else {
                println!("    {:<26}{}", m.field, m.reason);
            }
        }
    }
    if let Some(id) = session.current_case_id() {
        println!();
        println!("  case {id}");
    }
    Ok(())
}

// ── --download ────────────────────────────────────────────────────────────────

async fn run_download(session: &mut Session, resolved: &ResolvedConfig) -> Result<()> {
    let client = DocumentClient::new(&resolved.backend_url, resolved.request_timeout)?;
    let case = session.case();
    let outcome = client.download(&case, &resolved.download_dir).await?;

    println!();
    println!("  Zapisano {}", outcome.path.display());
    for entry in &outcome.entries {
        println!("    {entry}");
    }
    if let Some(steps) = outcome.steps.filter(|s| !s.is_empty()) {
        let text = format_action_steps(&steps);
        println!();
        println!("{text}");
        session.append_assistant_message(text);
    }
    Ok(())
}

// ── --profiles ────────────────────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    println!();
    println!("  Profiles");
    for name in file.profile_names() {
        let Some(p) = file.profiles.get(name) else { continue };
        let marker = if name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    backend   {}", p.backend_url);
        println!("    timeout   {}s", p.request_timeout_secs);
        if let Some(dir) = &p.download_dir {
            println!("    download  {}", dir.display());
        }
        println!();
    }
}

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "zant", &mut std::io::stdout());
    Ok(())
}
