use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::{Parser, Subcommand};
use serde_json::json;
use rpc_dispatch::config::{load_config, DispatchConfig};
use rpc_dispatch::discovery::StaticDiscovery;
use rpc_dispatch::dispatch::Dispatcher;
use rpc_dispatch::load_balancer::{BalancerGroup, StrategyRegistry};
use rpc_dispatch::observability::logging;
use rpc_dispatch::transport::TcpConnector;

#[derive(Parser)]
#[command(name = "dispatch-cli")]
#[command(about = "Inspect node selection and connection pooling", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "dispatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the sequence of nodes a strategy would pick
    Pick {
        service: String,
        /// Strategy name; defaults to balancer.default_strategy
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Open and release connections through the dispatcher, then print pool stats
    Probe {
        service: String,
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(short = 'n', long, default_value_t = 4)]
        count: usize,
        /// Hold every connection until all are acquired
        #[arg(long)]
        hold: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init_logging("warn");

    let registry = StrategyRegistry::with_defaults();
    let group = Arc::new(BalancerGroup::new(&registry, &config.balancer.strategies)?);
    let mut discovery = StaticDiscovery::new();
    for event in discovery.diff(&config.nodes) {
        group.apply(&event);
    }

    match cli.command {
        Commands::Pick {
            service,
            strategy,
            count,
        } => {
            let strategy = strategy.unwrap_or_else(|| config.balancer.default_strategy.clone());
            let mut picks = Vec::with_capacity(count);
            for _ in 0..count {
                let node = group.pick(&strategy, &service)?;
                picks.push(json!({ "id": node.id, "address": node.address, "weight": node.weight }));
            }
            let out = json!({ "service": service, "strategy": strategy, "picks": picks });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Probe {
            service,
            strategy,
            count,
            hold,
        } => {
            let strategy = strategy.unwrap_or_else(|| config.balancer.default_strategy.clone());
            probe(&config, group, &service, &strategy, count, hold).await?;
        }
    }

    Ok(())
}

async fn probe(
    config: &DispatchConfig,
    group: Arc<BalancerGroup>,
    service: &str,
    strategy: &str,
    count: usize,
    hold: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let connector = TcpConnector::new(config.pool.connect_timeout());
    let dispatcher = Dispatcher::new(group, connector, config.pool.pool_config())?
        .with_acquire_timeout(config.pool.acquire_timeout().unwrap_or(Duration::from_secs(5)));

    let mut held = Vec::new();
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        match dispatcher.acquire(strategy, service).await {
            Ok((node, conn)) => {
                results.push(json!({ "node": node.to_string(), "connection": conn.id().to_string() }));
                if hold {
                    held.push(conn);
                } else {
                    conn.put();
                }
            }
            Err(e) => results.push(json!({ "error": e.to_string() })),
        }
    }
    drop(held);

    let pools: Vec<_> = dispatcher
        .stats()
        .into_iter()
        .map(|(address, stats)| json!({ "address": address, "stats": stats }))
        .collect();
    let out = json!({ "service": service, "strategy": strategy, "acquires": results, "pools": pools });
    println!("{}", serde_json::to_string_pretty(&out)?);

    dispatcher.close();
    Ok(())
}
