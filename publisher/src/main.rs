//! nbpublish - Entry Point
//!
//! Bundles Jupyter notebooks and deploys them to a content publishing
//! server, either from the command line or through the extension endpoint.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use connect_models::AppMode;
use nbpublish::app::options::AppOptions;
use nbpublish::app::run::run;
use nbpublish::bundle::{make_source_bundle, make_static_bundle};
use nbpublish::deploy::{self, Deployer};
use nbpublish::environment::{EnvironmentIntrospector, PythonIntrospector};
use nbpublish::filesys::file::File;
use nbpublish::http::verify::verify_server;
use nbpublish::logs::{init_logging, LogOptions};
use nbpublish::mock::{self, Repository, DEFAULT_API_KEY};
use nbpublish::render::{NbconvertRenderer, NotebookRenderer};
use nbpublish::storage::layout::StorageLayout;
use nbpublish::storage::settings::{load_settings, Settings};
use nbpublish::utils::{app_name_for, version_info};
use secrecy::SecretString;
use tracing::{error, info};
use url::Url;

/// Environment variable holding the publishing server API key
const API_KEY_ENV: &str = "CONNECT_API_KEY";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        }
        return;
    }

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings = match load_settings(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: cli_args
            .get("log-level")
            .and_then(|level| level.parse().ok())
            .unwrap_or_else(|| settings.log_level.clone()),
        log_dir: settings.log_dir.clone(),
        json_format: settings.json_logs,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    if let Err(e) = dispatch(&cli_args, &settings).await {
        error!("{:#}", e);
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn dispatch(cli_args: &HashMap<String, String>, settings: &Settings) -> anyhow::Result<()> {
    if let Some(dir) = cli_args.get("detect-environment") {
        return detect_environment(Path::new(dir)).await;
    }

    if let Some(address) = cli_args.get("verify-server") {
        return match verify_server(address).await? {
            Some(canonical) => {
                println!("{} {}", "verified:".green().bold(), canonical);
                Ok(())
            }
            None => bail!("{} is not a publishing server", address),
        };
    }

    if cli_args.contains_key("mock-server") {
        return mock_server(cli_args).await;
    }

    if cli_args.contains_key("deploy") {
        return deploy_notebook(cli_args, settings).await;
    }

    if cli_args.contains_key("serve") {
        let mut options = AppOptions::from(settings);
        if let Some(port) = cli_args.get("port") {
            options.server.port = port.parse().context("invalid --port")?;
        }
        if let Some(dir) = cli_args.get("notebooks-dir") {
            options.notebooks_dir = PathBuf::from(dir);
        }
        info!("Running notebook publisher with options: {:?}", options);
        let renderer: Arc<dyn NotebookRenderer> = Arc::new(NbconvertRenderer::new());
        run(options, renderer, await_shutdown_signal()).await?;
        return Ok(());
    }

    println!("{}", usage());
    Ok(())
}

fn usage() -> &'static str {
    "Usage:
  nbpublish --version
  nbpublish --serve [--port=<port>] [--notebooks-dir=<dir>]
  nbpublish --deploy --server=<url> --notebook=<path> --mode=<static|jupyter-static>
            [--title=<title>] [--app-id=<id>] [--extra=<file>,<file>] [--api-key=<key>]
  nbpublish --verify-server=<url>
  nbpublish --detect-environment=<dir>
  nbpublish --mock-server [--host=<host>] [--port=<port>]"
}

async fn detect_environment(dir: &Path) -> anyhow::Result<()> {
    let environment = PythonIntrospector::new().detect(dir).await?;
    println!("{}", serde_json::to_string_pretty(&environment.to_payload(None))?);
    Ok(())
}

async fn mock_server(cli_args: &HashMap<String, String>) -> anyhow::Result<()> {
    let host = cli_args.get("host").map(String::as_str).unwrap_or("127.0.0.1");
    let port = cli_args.get("port").map(String::as_str).unwrap_or("3939");
    let addr = format!("{}:{}", host, port);

    let server = mock::start(&addr, Repository::new(""), await_shutdown_signal()).await?;
    println!("{} {}", "mock server:".green().bold(), server.url);
    println!("{} {}", "api key:".green().bold(), DEFAULT_API_KEY);

    server.handle.await??;
    Ok(())
}

async fn deploy_notebook(cli_args: &HashMap<String, String>, settings: &Settings) -> anyhow::Result<()> {
    let server = cli_args
        .get("server")
        .ok_or_else(|| anyhow!("--server=<url> is required"))?;
    let server = Url::parse(server).context("invalid --server")?;
    let notebook = File::new(
        cli_args
            .get("notebook")
            .ok_or_else(|| anyhow!("--notebook=<path> is required"))?,
    );
    let mode: AppMode = cli_args
        .get("mode")
        .map(String::as_str)
        .unwrap_or("static")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let app_id = cli_args
        .get("app-id")
        .map(|id| id.parse::<u64>())
        .transpose()
        .context("invalid --app-id")?;
    let api_key = cli_args
        .get("api-key")
        .cloned()
        .or_else(|| env::var(API_KEY_ENV).ok())
        .ok_or_else(|| anyhow!("an API key is required: pass --api-key or set {}", API_KEY_ENV))?;

    if !notebook.exists().await {
        bail!("notebook {} does not exist", notebook.path().display());
    }
    let notebook_name = notebook
        .name()
        .ok_or_else(|| anyhow!("notebook path has no file name"))?
        .to_string();
    let stem = Path::new(&notebook_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&notebook_name)
        .to_string();
    let title = cli_args.get("title").cloned().unwrap_or_else(|| stem.clone());

    let bundle = match mode {
        AppMode::Static => {
            let output = NbconvertRenderer::new().render(notebook.path(), &title).await?;
            make_static_bundle(&output.filename, &output.html)?
        }
        AppMode::JupyterStatic => {
            let environment = PythonIntrospector::new().detect(notebook.dir()).await?;
            let extra_files: Vec<String> = cli_args
                .get("extra")
                .map(|extra| {
                    extra
                        .split(',')
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let contents = notebook.read_bytes().await?;
            make_source_bundle(&notebook_name, &contents, &environment, &extra_files, notebook.dir())?
        }
    };

    let options = AppOptions::from(settings);
    let deployer = Deployer::new(options.poll.clone());
    let outcome = deploy::deploy(
        &server,
        SecretString::from(api_key),
        &options.client,
        &deployer,
        deploy::DeployRequest {
            app_id,
            name: app_name_for(&stem),
            title,
            bundle,
        },
    )
    .await?;

    println!("{} {}", "app id:".green().bold(), outcome.app_id);
    println!("{} {}", "config url:".green().bold(), outcome.config_url);
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
