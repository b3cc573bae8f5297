use clap::Parser;
use db_query_lib::config::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GatewayConfig::parse();
    db_query_lib::run(config).await
}
