use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use pyrunner::banner::{BannerInfo, print_banner, usage_text};
use pyrunner::cache::PackageCache;
use pyrunner::config::Settings;
use pyrunner::consts::{
    BATCH_INSTALL_TIMEOUT, CHUNK_LIMIT, DEFAULT_HEALTH_PORT, DEFAULT_PYTHON, MESSAGE_LIMIT,
    PACKAGE_INSTALL_TIMEOUT, STDERR_LIMIT, STDOUT_LIMIT, WARM_UP_PACKAGES, default_scratch_dir,
};
use pyrunner::delivery::{Dispatcher, Reply};
use pyrunner::engine::pipeline::ExecutionEngine;
use pyrunner::events::{Event, EventBus};
use pyrunner::installer::pip::Pip;
use pyrunner::{health, imports, logging};

#[derive(Parser)]
#[command(
    name = "pyrunner",
    version,
    about = "Run Python files, installing whatever they import first."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Python interpreter used to probe, install and run
    #[arg(long, env = "PYRUNNER_PYTHON", default_value = DEFAULT_PYTHON, global = true)]
    python: PathBuf,

    /// Bytes of stdout kept per run
    #[arg(long, default_value_t = STDOUT_LIMIT, global = true)]
    stdout_limit: usize,

    /// Bytes of stderr kept per run
    #[arg(long, default_value_t = STDERR_LIMIT, global = true)]
    stderr_limit: usize,

    /// Cap on a whole reply, in bytes
    #[arg(long, default_value_t = MESSAGE_LIMIT, global = true)]
    message_limit: usize,

    /// Largest single message sent back, in bytes
    #[arg(long, default_value_t = CHUNK_LIMIT, global = true)]
    chunk_limit: usize,

    /// Seconds allowed for the batched package install
    #[arg(long, default_value_t = BATCH_INSTALL_TIMEOUT.as_secs(), global = true)]
    batch_timeout: u64,

    /// Seconds allowed for each per-package fallback install
    #[arg(long, default_value_t = PACKAGE_INSTALL_TIMEOUT.as_secs(), global = true)]
    package_timeout: u64,

    /// Kill runs after this many seconds (default: never)
    #[arg(long, global = true)]
    run_timeout: Option<u64>,

    /// Where submissions are written while they run
    #[arg(long, env = "PYRUNNER_SCRATCH_DIR", global = true)]
    scratch_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run files once, concurrently, and print their replies
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print replies as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Serve the health endpoint and run file paths read from stdin
    Serve {
        /// Port for the liveness endpoint
        #[arg(long, env = "PORT", default_value_t = DEFAULT_HEALTH_PORT)]
        port: u16,

        /// Skip probing common packages at startup
        #[arg(long, default_value_t = false)]
        no_warm_up: bool,
    },
    /// Print the third-party modules a file imports
    Imports { file: PathBuf },
}

impl Cli {
    fn settings(&self) -> Settings {
        let (health_port, warm_up) = match &self.command {
            Command::Serve { port, no_warm_up } => (*port, !no_warm_up),
            _ => (DEFAULT_HEALTH_PORT, false),
        };
        Settings {
            python: self.python.clone(),
            stdout_limit: self.stdout_limit,
            stderr_limit: self.stderr_limit,
            message_limit: self.message_limit,
            chunk_limit: self.chunk_limit,
            batch_timeout: Duration::from_secs(self.batch_timeout),
            package_timeout: Duration::from_secs(self.package_timeout),
            run_timeout: self.run_timeout.map(Duration::from_secs),
            scratch_dir: self.scratch_dir.clone().unwrap_or_else(default_scratch_dir),
            health_port,
            warm_up,
        }
    }
}

/// Everything a front-end needs, wired once at startup.
struct Service {
    engine: Arc<ExecutionEngine>,
    dispatcher: Arc<Dispatcher>,
    cache: Arc<PackageCache>,
    events: Arc<EventBus>,
}

fn build_service(settings: &Settings) -> Service {
    let cache = Arc::new(PackageCache::new());
    let events = Arc::new(EventBus::default());
    let manager = Arc::new(Pip::new(settings.python.clone()));

    let engine = Arc::new(
        settings
            .build_engine(manager, Arc::clone(&cache))
            .with_events(Arc::clone(&events)),
    );
    let dispatcher = Arc::new(
        Dispatcher::new(engine.clone(), settings.delivery_config())
            .with_events(Arc::clone(&events)),
    );

    Service {
        engine,
        dispatcher,
        cache,
        events,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let settings = cli.settings();
    settings.validate()?;

    match &cli.command {
        Command::Imports { file } => {
            let source = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            for module in imports::extract(&source) {
                println!("{module}");
            }
            Ok(())
        }
        Command::Run { files, json } => run_files(&settings, files, *json).await,
        Command::Serve { .. } => serve(&settings).await,
    }
}

/// Read `file` from disk and submit it under its own name.
async fn submit_path(dispatcher: &Dispatcher, file: &Path) -> Result<Reply> {
    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dispatcher.submit(&name, &contents).await
}

async fn run_files(settings: &Settings, files: &[PathBuf], json: bool) -> Result<()> {
    let service = build_service(settings);

    // One task per file: a file that never exits must not hold up the others.
    let handles: Vec<_> = files
        .iter()
        .cloned()
        .map(|file| {
            let dispatcher = Arc::clone(&service.dispatcher);
            tokio::spawn(async move {
                let reply = submit_path(&dispatcher, &file).await;
                (file, reply)
            })
        })
        .collect();

    let mut entries = Vec::new();
    for joined in futures::future::join_all(handles).await {
        let (file, reply) = joined.context("run task panicked")?;
        let label = file.display().to_string();
        if json {
            entries.push(match reply {
                Ok(reply) => serde_json::json!({
                    "file": label,
                    "ok": reply.ok,
                    "chunks": reply.chunks,
                }),
                Err(e) => serde_json::json!({
                    "file": label,
                    "ok": false,
                    "chunks": [format!("Error: {e:#}")],
                }),
            });
        } else {
            print_reply(&label, reply);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }
    Ok(())
}

fn print_reply(label: &str, reply: Result<Reply>) {
    match reply {
        Ok(reply) => {
            println!("\n=> {label}");
            for chunk in reply.chunks {
                println!("{chunk}");
            }
        }
        Err(e) => eprintln!("\n{label}: error: {e:#}"),
    }
}

async fn serve(settings: &Settings) -> Result<()> {
    let service = build_service(settings);

    let (health_addr, _health) = health::spawn(settings.health_addr()).await?;

    print_banner(&BannerInfo {
        python: &settings.python,
        health: health_addr,
        scratch_dir: &settings.scratch_dir,
        run_timeout: settings.run_timeout,
        message_limit: settings.message_limit,
    });

    if settings.warm_up {
        let engine = Arc::clone(&service.engine);
        tokio::spawn(async move {
            let found = engine.installer().warm_up(WARM_UP_PACKAGES).await;
            tracing::info!(found, "warm-up done");
        });
    }

    let mut progress = service.events.subscribe();
    tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(event) => eprintln!("{}", describe(&event)),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\npyrunner> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Ctrl+D (EOF)
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "/start" | "/help" => print!("{}", usage_text()),
            "/cache" => {
                let names = service.cache.snapshot();
                println!("{} cached: {}", names.len(), names.join(", "));
            }
            path => {
                let file = PathBuf::from(path);
                let dispatcher = Arc::clone(&service.dispatcher);
                // Detached: runs have no time limit and must not block the prompt.
                tokio::spawn(async move {
                    let reply = submit_path(&dispatcher, &file).await;
                    if let Err(e) = &reply {
                        warn!(file = %file.display(), error = %e, "submission rejected");
                    }
                    print_reply(&file.display().to_string(), reply);
                });
            }
        }
    }

    println!("goodbye.");
    Ok(())
}

fn describe(event: &Event) -> String {
    let status = match event {
        Event::Received { .. } => "received".to_string(),
        Event::Resolving { modules, .. } if modules.is_empty() => {
            "no third-party imports".to_string()
        }
        Event::Resolving { modules, .. } => format!("resolving {}", modules.join(", ")),
        Event::Running { .. } => "running".to_string(),
        Event::Finished { ok: true, .. } => "finished".to_string(),
        Event::Finished { ok: false, .. } => "failed".to_string(),
    };
    format!("[{}] {status}", event.request())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_labels_every_event_with_its_request() {
        let running = Event::Running {
            request: "job.py".to_string(),
        };
        assert_eq!(describe(&running), "[job.py] running");

        let resolving = Event::Resolving {
            request: "job.py".to_string(),
            modules: vec!["numpy".to_string(), "requests".to_string()],
        };
        assert_eq!(describe(&resolving), "[job.py] resolving numpy, requests");

        let failed = Event::Finished {
            request: "bad.py".to_string(),
            ok: false,
        };
        assert_eq!(describe(&failed), "[bad.py] failed");
    }
}
