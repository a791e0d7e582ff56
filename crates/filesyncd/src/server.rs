//! TLS listener — binds TCP, wraps accepted sockets in TLS, and hands each
//! connection to the mux.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;
use tokio_rustls::rustls::{Certificate, PrivateKey, ServerConfig};
use tokio_rustls::TlsAcceptor;

use filesync_core::config::TlsConfig;

use crate::mux::Mux;

/// Accepts connections and spawns one mux task per connection.
pub struct FileServer {
    mux: Arc<Mux>,
    acceptor: TlsAcceptor,
}

impl FileServer {
    pub fn new(mux: Arc<Mux>, tls: ServerConfig) -> Self {
        Self {
            mux,
            acceptor: TlsAcceptor::from(Arc::new(tls)),
        }
    }

    /// Accept connections until a fatal accept error. Transient errors
    /// (timeouts) are logged and skipped; anything else shuts the mux down
    /// so every live session unwinds, then stops the listener.
    pub async fn listen_and_serve(&self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        tracing::info!(port, "listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    let acceptor = self.acceptor.clone();
                    let mux = self.mux.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => mux.serve_conn(tls_stream).await,
                            Err(e) => {
                                tracing::warn!(%peer, error = %e, "tls handshake failed");
                            }
                        }
                    });
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                    ) =>
                {
                    tracing::warn!(error = %e, "transient accept error, continuing");
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed, shutting down");
                    self.mux.shutdown();
                    return Err(e).context("accept failed");
                }
            }
        }
    }
}

// ── TLS material ─────────────────────────────────────────────────────────────

/// Build the server TLS config from the configured certificate and key.
pub fn load_tls_config(tls: &TlsConfig) -> Result<ServerConfig> {
    let certs = load_certs(&tls.cert_path())?;
    let key = load_private_key(&tls.key_path())?;
    ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate or key")
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open certificate file {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .with_context(|| format!("failed to read certificates from {}", path.display()))?;
    if certs.is_empty() {
        bail!("no certificates found in {}", path.display());
    }
    Ok(certs.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open private key file {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut reader)
        .with_context(|| format!("failed to read private keys from {}", path.display()))?;
    if keys.is_empty() {
        // Retry as PKCS#1; openssl still emits "BEGIN RSA PRIVATE KEY".
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(file);
        keys = rustls_pemfile::rsa_private_keys(&mut reader)
            .with_context(|| format!("failed to read private keys from {}", path.display()))?;
    }
    match keys.into_iter().next() {
        Some(key) => Ok(PrivateKey(key)),
        None => bail!("no private key found in {}", path.display()),
    }
}
