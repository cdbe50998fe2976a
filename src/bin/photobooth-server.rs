//! Photobooth compositing service
//!
//! Serves the processing, download and admin routes over HTTP.

#[cfg(feature = "server")]
use photobooth::cli;

#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "server"))]
fn main() {
    panic!("Server feature not enabled. Please rebuild with --features server");
}
