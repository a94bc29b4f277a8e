use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pixelme::api;
use pixelme::assets::UiAssets;
use pixelme::models::{AppConfig, DataUri, RunSnapshot, RunStatus, Stage};
use pixelme::server;
use pixelme::services::{
    controller::user_message, spawn_idle_sweeper, CredentialSource, PipelineController,
    RunOutcome, SharePayload, TransformClient, PORTRAIT_FILE_NAME,
};

#[derive(Parser)]
#[command(name = "pixelme")]
#[command(about = "PixelMe - turn a selfie into a pixel art portrait")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Turn a photo into a pixel art portrait without starting the server
    Stylize {
        /// Source photo (PNG, JPEG or WebP)
        input: PathBuf,

        /// Output image path
        #[arg(short, long, default_value = PORTRAIT_FILE_NAME)]
        output: PathBuf,

        /// Also write the isolated subject to this path
        #[arg(long)]
        keep_intermediate: Option<PathBuf>,
    },
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PixelMe API",
        description = "Turn a selfie into a pixel art portrait",
        version = "0.1.0",
        license(name = "MIT")
    ),
    paths(
        api::handle_new_session,
        api::handle_submit,
        api::handle_get_run,
        api::handle_reset,
        api::handle_download,
        api::handle_share,
        api::handle_events,
        api::handle_get_credential,
        api::handle_set_credential,
        api::handle_clear_credential,
    ),
    components(schemas(
        api::SessionResponse,
        api::SubmitRequest,
        api::CredentialRequest,
        api::CredentialStatus,
        RunSnapshot,
        Stage,
        RunStatus,
        SharePayload,
        CredentialSource,
    )),
    tags(
        (name = "Run", description = "Upload a photo and follow its pipeline run"),
        (name = "Credential", description = "Per-session model API key")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => run_server().await,
        Some(Commands::Stylize {
            input,
            output,
            keep_intermediate,
        }) => run_stylize_command(&input, &output, keep_intermediate.as_deref()).await,
        None => {
            run_status_command();
            Ok(())
        }
    }
}

/// Load configuration from `CONFIG_FILE` plus environment overrides
fn load_config() -> AppConfig {
    let config_file = std::env::var("CONFIG_FILE").ok().map(PathBuf::from);
    AppConfig::load(config_file.as_deref()).with_env_overrides(|key| std::env::var(key).ok())
}

/// Run both stages on a local file (no server needed)
async fn run_stylize_command(
    input: &Path,
    output: &Path,
    keep_intermediate: Option<&Path>,
) -> anyhow::Result<()> {
    // Minimal logging for CLI
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelme=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = load_config();
    let credential = config.default_api_key().ok_or_else(|| {
        anyhow::anyhow!("No API key configured. Set GEMINI_API_KEY or api_key in CONFIG_FILE")
    })?;

    let mime = mime_guess::from_path(input).first_or_octet_stream();
    let bytes = std::fs::read(input)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", input.display()))?;
    let image = DataUri::from_bytes(mime.essence_str(), &bytes);
    if !image.is_supported_upload() {
        anyhow::bail!(
            "Unsupported image type {} (use PNG, JPEG or WebP)",
            image.mime()
        );
    }

    let client = TransformClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create model client: {e}"))?;
    let controller = PipelineController::new(Arc::new(client));

    // Print each stage as the run moves through it
    let mut events = controller.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(snapshot) = events.recv().await {
            if let Some(message) = snapshot.message {
                println!("[{:>3}%] {message}", snapshot.progress);
            }
            if !matches!(snapshot.status, RunStatus::Processing) {
                break;
            }
        }
    });

    let handle = controller.submit(image, Some(credential)).await?;
    let outcome = handle.wait().await;
    let _ = progress.await;

    match outcome {
        RunOutcome::Completed(portrait) => {
            if let Some(path) = keep_intermediate {
                if let Some(isolated) = controller.current().await.isolated_image {
                    std::fs::write(path, isolated.decode())?;
                    println!("Isolated subject written to {}", path.display());
                }
            }

            let png_bytes = portrait.decode();
            std::fs::write(output, &png_bytes)?;
            println!("Created {} ({} bytes)", output.display(), png_bytes.len());
            Ok(())
        }
        RunOutcome::Failed(e) => anyhow::bail!("{} ({e})", user_message(&e)),
        RunOutcome::Abandoned => anyhow::bail!("Run was abandoned before it finished"),
    }
}

/// Display status and configuration information
fn run_status_command() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let bind_addr = std::env::var("BIND_ADDR").ok();
    let config_file = std::env::var("CONFIG_FILE").ok();
    let ui_dir = std::env::var("UI_DIR").ok();
    let config = load_config();

    println!("PixelMe v{VERSION}");
    println!("Turn a selfie into a pixel art portrait\n");

    println!("Environment Variables:");
    println!(
        "  BIND_ADDR   = {}",
        bind_addr.as_deref().unwrap_or("0.0.0.0:3000 (default)")
    );
    println!(
        "  CONFIG_FILE = {}",
        config_file.as_deref().unwrap_or("(not set)")
    );
    println!("  UI_DIR      = {}", ui_dir.as_deref().unwrap_or("(not set)"));

    let embedded = UiAssets::list_embedded();
    println!("\nUI Assets:");
    match ui_dir {
        Some(ref path) if PathBuf::from(path).exists() => {
            println!("  {path} (falling back to {} embedded files)", embedded.len())
        }
        _ => println!("  embedded ({} files)", embedded.len()),
    }

    println!("\nModel:");
    println!("  Endpoint: {}", config.model.endpoint);
    println!("  Name:     {}", config.model.name);
    match config.default_api_key() {
        Some(key) => println!("  API key:  {}", key.hint()),
        None => println!("  API key:  (not set, users must supply their own)"),
    }

    println!("\nCommands:");
    println!("  pixelme serve             Start the HTTP server");
    println!("  pixelme stylize <PHOTO>   Turn a photo into {PORTRAIT_FILE_NAME}");
    println!("\nRun 'pixelme --help' for more details.");
}

/// Run the HTTP server
async fn run_server() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelme=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let ui_dir = std::env::var("UI_DIR").ok().map(PathBuf::from);
    let config = load_config();

    tracing::info!(
        endpoint = %config.model.endpoint,
        model = %config.model.name,
        server_key = config.default_api_key().is_some(),
        ui = ?ui_dir.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "embedded".to_string()),
        "Configuration loaded"
    );

    let state = server::create_app_state(config, ui_dir)?;

    // Drop sessions nobody has used for a while
    let idle = Duration::from_secs(state.config.session_idle_secs);
    spawn_idle_sweeper(state.sessions.clone(), idle);
    tracing::info!(idle_secs = idle.as_secs(), "Session sweeper started");

    let app = server::build_router(state)
        // OpenAPI documentation (production only)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "PixelMe server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
