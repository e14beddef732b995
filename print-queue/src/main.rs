use print_queue::{Server, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. .env + logging
    let config = setup_environment()?;

    print_banner();
    tracing::info!("Vicanto print queue starting...");

    // 2. Run until SIGINT/SIGTERM
    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!("Print queue failed to start: {}", e);
        return Err(e.into());
    }

    Ok(())
}
