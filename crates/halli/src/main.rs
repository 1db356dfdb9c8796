use std::path::PathBuf;

use halli::{HalliServer, ServerConfig, ServerError};
use halli_session::{AccountStore, LocalAccountStore, SqlAccountStore};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    halli::logging::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;

    tracing::info!(
        port = config.port,
        use_database = config.use_database,
        "starting Halli Galli server"
    );

    if config.use_database {
        let accounts = SqlAccountStore::connect(&config.database_url).await?;
        serve(config, accounts).await
    } else {
        tracing::info!("local mode: accounts are accepted without persistence");
        serve(config, LocalAccountStore).await
    }
}

async fn serve<A: AccountStore>(
    config: ServerConfig,
    accounts: A,
) -> Result<(), ServerError> {
    let server = HalliServer::bind(&config, accounts).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, exiting");
            Ok(())
        }
    }
}
