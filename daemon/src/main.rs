//! Shim binary that calls into the `daemon` library's `inner_main`.
use clap::Parser as _;
use eyre::Result;
use oidc_bridge_daemon::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    oidc_bridge_daemon::inner_main(Cli::parse()).await
}
