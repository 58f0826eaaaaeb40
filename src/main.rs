#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ult_tracker::run().await
}
