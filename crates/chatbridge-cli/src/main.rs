//! chatbridge — host for the AI-chat page bridge.

use tracing::info;
use tracing_subscriber::EnvFilter;

use chatbridge_core::BridgeConfig;

mod demo;
mod watch;

fn print_help() {
    println!("chatbridge — relay between AI chat pages and a local bridge process");
    println!();
    println!("Usage: chatbridge <command>");
    println!();
    println!("Commands:");
    println!("  watch <[id=]url>...      Run the connector with in-memory pages");
    println!("  health                   Query the bridge health endpoint");
    println!("  demo [tab]               Play the external side against the bridge socket");
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  CHATBRIDGE_CONFIG_DIR    Directory holding config.json (default: ./data)");
    println!("  CHATBRIDGE_HOST          Bridge host (default: 127.0.0.1)");
    println!("  CHATBRIDGE_PORT          Bridge port (default: 5577)");
    println!("  CHATBRIDGE_TOKEN         Bearer token for the socket");
    println!("  RUST_LOG                 Log filter (default: info)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        std::process::exit(1);
    }

    let config = BridgeConfig::from_env()?;
    info!("Bridge endpoint {}:{}", config.host, config.port);

    match args[1].as_str() {
        "watch" => {
            if args.len() < 3 {
                eprintln!("Usage: chatbridge watch <[id=]url>...");
                std::process::exit(1);
            }
            watch::run(config, &args[2..]).await?;
        }
        "health" => {
            let url = config.health_url();
            match chatbridge_connector::check_health(&url).await {
                Ok(report) => {
                    println!("Bridge is healthy");
                    println!("  Status:             {}", report.status);
                    println!("  Uptime:             {}s", report.uptime_secs());
                    println!("  Active connections: {}", report.active_connections);
                    println!("  Active tabs:        {}", report.active_tabs);
                }
                Err(e) => {
                    eprintln!("Bridge is not reachable at {}: {}", url, e);
                    std::process::exit(1);
                }
            }
        }
        "demo" => {
            let tab = args.get(2).map(String::as_str).unwrap_or(demo::DEFAULT_TAB);
            demo::run(&config, tab).await?;
        }
        "--help" | "-h" | "help" => print_help(),
        other => {
            eprintln!("Unknown command: {}. Use 'chatbridge help' for usage.", other);
            std::process::exit(1);
        }
    }

    Ok(())
}
