use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    lift_cli::main_entry().await
}
