use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scribe::api;
use scribe::api::middleware::SecurityConfig;
use scribe::config::EngineConfig;
use scribe::engine::Engine;
use scribe::mcp;
use scribe::vcs::GitCli;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Surgical documentation writes for AI-assisted development")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Engine tunables shared by both server modes.
#[derive(Args)]
struct EngineArgs {
    /// Trunk branch name; skips main/master/remote-default resolution
    #[arg(long, env = "SCRIBE_TRUNK")]
    trunk: Option<String>,

    /// Prefix for derived feature branch names
    #[arg(long, env = "SCRIBE_BRANCH_PREFIX", default_value = "docs")]
    branch_prefix: String,

    /// Idle seconds after which a session expires
    #[arg(long, env = "SCRIBE_SESSION_IDLE_SECS", default_value = "1800")]
    session_idle_secs: u64,

    /// Timeout in seconds for each version-control call
    #[arg(long, env = "SCRIBE_VCS_TIMEOUT_SECS", default_value = "30")]
    vcs_timeout_secs: u64,

    /// Token overlap ratio above which a section counts as affected
    #[arg(long, env = "SCRIBE_IMPACT_THRESHOLD", default_value = "0.5")]
    impact_threshold: f64,
}

impl EngineArgs {
    fn build(self) -> Engine {
        let config = EngineConfig {
            trunk_override: self.trunk,
            branch_prefix: self.branch_prefix,
            session_idle: Duration::from_secs(self.session_idle_secs),
            vcs_timeout: Duration::from_secs(self.vcs_timeout_secs),
            impact_threshold: self.impact_threshold,
        };
        let vcs = Arc::new(GitCli::new(config.vcs_timeout));
        Engine::new(vcs, config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Scribe HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "17015")]
        port: u16,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Start MCP server via stdio (for Claude Code integration)
    Mcp {
        /// Proxy tool calls to a running Scribe server (SCRIBE_URL) instead
        /// of driving a local engine
        #[arg(long)]
        remote: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

/// Initialize tracing with output to stderr (for MCP mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "scribe=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // MCP mode: log to stderr so stdout is clean for protocol
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // MCP mode needs stderr for logging since stdout is the protocol channel
    let use_stderr = matches!(cli.command, Some(Commands::Mcp { .. }));
    init_tracing(use_stderr);

    match cli.command {
        Some(Commands::Serve { port, engine }) => {
            serve(port, engine.build()).await?;
        }
        Some(Commands::Mcp { remote: true, .. }) => {
            mcp::run_remote_stdio_server(mcp::ScribeClient::from_env()).await?;
        }
        Some(Commands::Mcp { remote: false, engine }) => {
            mcp::run_stdio_server(engine.build()).await?;
        }
        None => {
            // Default: start server on the default port
            let config = EngineConfig::default();
            let vcs = Arc::new(GitCli::new(config.vcs_timeout));
            serve(17015, Engine::new(vcs, config)).await?;
        }
    }

    Ok(())
}

async fn serve(port: u16, engine: Engine) -> anyhow::Result<()> {
    tracing::info!("Starting Scribe server on port {}", port);

    let app = api::create_router_with_security(engine, SecurityConfig::from_env());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Scribe server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
