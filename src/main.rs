use neos_provider::{serve, try_init_logging, NeosProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    try_init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting NEOS provider");
    serve(NeosProvider::new()).await
}
