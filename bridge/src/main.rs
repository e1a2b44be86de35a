mod host;
mod simulated;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
