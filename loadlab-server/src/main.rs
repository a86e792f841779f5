use clap::Parser;
use loadlab_common::Endpoint;
use loadlab_server::config::{DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT};
use loadlab_server::memory::CountingAllocator;
use loadlab_server::{Server, ServerConfig};
use std::net::{IpAddr, SocketAddr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

#[derive(Parser, Debug)]
#[command(name = "loadlab-server", about = "Synthetic workload server for load testing")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = ServerConfig { address: SocketAddr::new(args.host, args.port) };

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    // Print the route table once the server signals it is bound.
    tokio::spawn(async move {
        if let Ok(addr) = ready_rx.await {
            println!("Listening on {}", addr);
            for endpoint in Endpoint::ALL {
                tracing::info!("  {:<13} {}", endpoint.label(), endpoint.description());
            }
        }
    });

    Server::new(config).run(ready_tx).await?;
    Ok(())
}
