use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    textvar_cli::main_entry().await
}
