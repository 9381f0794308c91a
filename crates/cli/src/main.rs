use clap::{Parser, Subcommand};

mod logging;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Chat relay CLI: LINE webhook and direct-call bridge to an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: CHATRELAY_CONFIG_PATH or ~/.chatrelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay (health, GET /call, POST /callback; TLS listener when key/cert/CA are set).
    Serve {
        /// Config file path (default: CHATRELAY_CONFIG_PATH or ~/.chatrelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Plain HTTP port (default from PORT, config, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one message to a running relay via GET /call and print the response.
    Call {
        /// Message text
        message: String,

        /// Config file path (default: CHATRELAY_CONFIG_PATH or ~/.chatrelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Relay base URL (default http://127.0.0.1:<configured port>)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // `.env` in the working directory (or a parent) fills variables the environment does not set.
    let dotenv_path = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("chatrelay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            init_console_logger();
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port, dotenv_path).await {
                // The logger may not be installed yet (e.g. bad config), so also print.
                log::error!("serve failed: {:#}", e);
                eprintln!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Call {
            message,
            config,
            url,
        }) => {
            init_console_logger();
            if let Err(e) = run_call(message, config, url).await {
                log::error!("call failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn init_console_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(relay::config::default_config_path);
    let dir = relay::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    dotenv_path: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let (config, path) = relay::config::load_config(config_path)?;
    let mut settings = relay::config::Settings::resolve(&config)?;
    if let Some(p) = port {
        settings.port = p;
    }
    let log_file = logging::init_logging(&settings.logging)?;
    log::info!("config: {}", path.display());
    if let Some(env_file) = dotenv_path {
        log::info!("environment file: {}", env_file.display());
    }
    log::info!("logging to {}", log_file.display());
    log::info!("starting relay on {}:{}", settings.bind, settings.port);
    relay::gateway::run_gateway(settings).await
}

async fn run_call(
    message: String,
    config_path: Option<std::path::PathBuf>,
    url: Option<String>,
) -> anyhow::Result<()> {
    let (config, _) = relay::config::load_config(config_path)?;
    let target = relay::config::CallTarget::resolve(&config)?;
    let base = url.unwrap_or_else(|| format!("http://127.0.0.1:{}", target.port));
    let endpoint = format!("{}/call", base.trim_end_matches('/'));

    let mut req = reqwest::Client::new()
        .get(&endpoint)
        .query(&[("message", message.as_str())]);
    if let Some(k) = target.key {
        req = req.bearer_auth(k);
    } else {
        log::warn!("no call key configured (HTTP_CALL_KEY or call.key); the relay will reject the call");
    }
    let res = req.send().await?;
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        anyhow::bail!("{} returned {}", endpoint, status);
    }
    println!("{}", body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use relay::config::{CallTarget, Config, Settings};
    use std::io::Write;

    /// Names read from the `.env` file below. Only this test touches them in this binary.
    const VARS: [&str; 5] = [
        "OPENAI_API_KEY",
        "CHANNEL_ACCESS_TOKEN",
        "CHANNEL_SECRET",
        "HTTP_CALL_KEY",
        "PORT",
    ];

    #[test]
    fn env_file_values_feed_settings_without_overriding_the_environment() {
        let dir = std::env::temp_dir().join(format!("chatrelay-dotenv-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let env_file = dir.join(".env");
        std::fs::File::create(&env_file)
            .and_then(|mut f| {
                f.write_all(
                    b"OPENAI_API_KEY=sk-from-dotenv\n\
                      CHANNEL_ACCESS_TOKEN=line-token\n\
                      CHANNEL_SECRET=line-secret\n\
                      HTTP_CALL_KEY=from-dotenv\n\
                      PORT=4321\n",
                )
            })
            .unwrap();

        for name in VARS {
            std::env::remove_var(name);
        }
        // Already set in the environment: the file must not replace it.
        std::env::set_var("HTTP_CALL_KEY", "from-shell");

        dotenvy::from_path(&env_file).unwrap();
        let settings = Settings::resolve(&Config::default()).unwrap();
        assert_eq!(settings.completion.api_key, "sk-from-dotenv");
        assert!(settings.webhook_enabled());
        assert_eq!(settings.call_key.as_deref(), Some("from-shell"));
        assert_eq!(settings.port, 4321);

        let target = CallTarget::resolve(&Config::default()).unwrap();
        assert_eq!(target.key.as_deref(), Some("from-shell"));
        assert_eq!(target.port, 4321);

        for name in VARS {
            std::env::remove_var(name);
        }
        let _ = std::fs::remove_dir_all(dir);
    }
}
