use anyhow::Result;
use rollcall_store::{EmbeddingCipher, Store};
use rollcalld::config::{Config, DEFAULT_STORE_SECRET};
use rollcalld::engine;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();
    if config.store_secret == DEFAULT_STORE_SECRET {
        tracing::warn!(
            "ROLLCALL_STORE_SECRET not set; embeddings are sealed under the default dev secret"
        );
    }

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let cipher = EmbeddingCipher::from_secret(&config.store_secret);
    let store = Store::open(&config.db_path, cipher)?;
    tracing::info!(db = %config.db_path.display(), "embedding store opened");

    let _engine = engine::spawn_engine(store, config.match_config());
    tracing::info!(
        threshold = config.match_threshold,
        duplicate_policy = ?config.duplicate_policy,
        wait_timeout = ?config.wait_timeout(),
        "rollcalld ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
