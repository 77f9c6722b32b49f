//! GamePilot CLI entry point. Command handling lives in `cli`.

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cli::run().await
}
