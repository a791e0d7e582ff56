//! filesyncd — TLS file synchronization daemon.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use filesync_core::config::{Config, Environment};
use filesync_core::message::Action;
use filesync_services::{FileStoreFactory, LruCache, UserStore};

use filesyncd::auth::Authenticator;
use filesyncd::handlers;
use filesyncd::mux::Mux;
use filesyncd::server::{self, FileServer};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();
    tracing::info!(port = config.port, env = ?config.env, "filesyncd starting");

    let file_cache = Arc::new(LruCache::new(config.cache.file_size));
    let meta_cache = Arc::new(LruCache::new(config.cache.meta_size));
    let stores = Arc::new(FileStoreFactory::new(
        &config.data_dir,
        file_cache,
        meta_cache,
    ));
    let users = Arc::new(UserStore::new());
    let authenticator = Authenticator::new(users, stores, config.auth.challenge_len);

    let mut mux = Mux::new(authenticator);
    mux.handle(Action::Status, handlers::handle_status);
    mux.handle(Action::Download, handlers::handle_download);
    mux.handle(Action::Upload, handlers::handle_upload);
    mux.handle(Action::Delete, handlers::handle_delete);
    mux.handle(Action::Chunk, handlers::handle_chunk);
    mux.handle(Action::List, handlers::handle_list);
    if config.env == Environment::Development {
        mux.handle(Action::Echo, handlers::handle_echo);
    }

    let tls = server::load_tls_config(&config.tls).context("failed to load TLS material")?;
    let server = FileServer::new(Arc::new(mux), tls);
    server.listen_and_serve(config.port).await?;

    tracing::info!("server stopped");
    Ok(())
}
