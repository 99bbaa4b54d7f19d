use dispatch_engine::{Config, Engine, Result, Server, demo};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env_or_default();
    config.setup_tracing();

    let engine = demo::install(Engine::builder(config)).build()?;
    tracing::info!(
        routes = engine.routes().len(),
        filters = engine.filters().len(),
        "Engine ready"
    );

    Server::new(engine).start().await
}
