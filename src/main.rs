use std::io::{Error, ErrorKind};
use std::sync::Arc;

use log::*;

use pollbooth::config::Config;
use pollbooth::store::{MemoryStore, PgStore, PollStore};
use pollbooth::AppState;

/**
 * Create the store the application runs against.
 *
 * Without a `DATABASE_URL` everything lives in memory and is gone on exit.
 */
async fn create_store(config: &Config) -> Result<Arc<dyn PollStore>, Error> {
    match &config.database_url {
        Some(database_url) => {
            let store = PgStore::connect(database_url, config.pool_size)
                .await
                .map_err(|err| {
                    error!("Could not initialize pool! {:?}", err);
                    Error::new(ErrorKind::Other, err)
                })?;
            store.ensure_schema().await.map_err(|err| {
                error!("Could not create the schema! {:?}", err);
                Error::new(ErrorKind::Other, err)
            })?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL is not set, polls will only be kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[async_std::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let config = Config::from_env().map_err(|err| {
        error!("Invalid configuration: {}", err);
        Error::new(ErrorKind::InvalidInput, err)
    })?;
    let listen_addr = config.listen_addr.clone();

    let store = create_store(&config).await?;
    let state = AppState::new(store, config).map_err(|err| {
        error!("Failed to load templates: {}", err);
        Error::new(ErrorKind::Other, err)
    })?;

    info!("Listening on {}", listen_addr);
    let app = pollbooth::app(state);
    app.listen(listen_addr).await?;
    Ok(())
}
