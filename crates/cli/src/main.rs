mod config_commands;
mod consent_commands;
mod tool_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    toolbay_config::ToolbayConfig,
    toolbay_sandbox::{FsToolCatalog, JsonConsentStore, VirtualContentServer},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "toolbay", about = "Toolbay — sandboxed host for tool UIs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of the discovered one.
    #[arg(long, global = true, env = "TOOLBAY_CONFIG")]
    config: Option<PathBuf>,

    /// Custom data directory (overrides config and platform default).
    #[arg(long, global = true, env = "TOOLBAY_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tool content over the loopback HTTP front end.
    Serve {
        /// Address to bind to (overrides config value). Must be loopback.
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides config value).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Installed tools.
    Tools {
        #[command(subcommand)]
        action: tool_commands::ToolsAction,
    },
    /// Per-tool consent for declared policy relaxations.
    Consent {
        #[command(subcommand)]
        action: consent_commands::ConsentAction,
    },
    /// Print the content-security policy a tool's documents receive.
    Policy {
        /// Tool id.
        tool: String,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays pipeable.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load the explicit config file if one was given, else discover one, then
/// apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<ToolbayConfig> {
    let mut config = match &cli.config {
        Some(path) => toolbay_config::load_config(path)?,
        None => toolbay_config::discover_and_load(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

/// Catalog and consent store shared by the commands that need them.
pub(crate) struct Services {
    pub config: ToolbayConfig,
    pub catalog: Arc<FsToolCatalog>,
    pub consent: Arc<JsonConsentStore>,
}

impl Services {
    async fn open(config: ToolbayConfig) -> anyhow::Result<Self> {
        let catalog = Arc::new(FsToolCatalog::load(&config.tools, &config.content.asset_dir));
        let data_dir = toolbay_config::data_dir(&config);
        let consent = Arc::new(
            JsonConsentStore::open(&data_dir)
                .await
                .with_context(|| format!("failed to open consent store in {}", data_dir.display()))?,
        );
        Ok(Self {
            config,
            catalog,
            consent,
        })
    }
}

async fn serve(services: Services, bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut server = services.config.server.clone();
    if let Some(bind) = bind {
        server.bind = bind;
    }
    if let Some(port) = port {
        server.port = port;
    }

    let content = Arc::new(VirtualContentServer::new(
        &services.config.content,
        services.catalog,
        services.consent,
    ));
    let listener = toolbay_web::bind(&server).await?;
    println!("http://{}/", listener.local_addr()?);

    toolbay_web::serve(listener, content, async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "toolbay starting");

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Serve { bind, port } => serve(Services::open(config).await?, bind, port).await,
        Commands::Tools { action } => {
            tool_commands::handle_tools(&Services::open(config).await?, action)
        },
        Commands::Consent { action } => {
            consent_commands::handle_consent(&Services::open(config).await?, action).await
        },
        Commands::Policy { tool } => {
            tool_commands::print_policy(&Services::open(config).await?, &tool).await
        },
        Commands::Config { action } => config_commands::handle_config(&config, cli.config, action),
    }
}
