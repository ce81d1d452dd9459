use peerlink::relay::{DEFAULT_RELAY_PORT, RelayServer};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let bind_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("0.0.0.0:{}", DEFAULT_RELAY_PORT));

    println!("   peerlink relay");
    println!("   Binding to {}", bind_addr);
    println!("   Press Ctrl+C to stop\n");

    let server = RelayServer::bind(&bind_addr).await?;
    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down");
            Ok(())
        }
    }
}
