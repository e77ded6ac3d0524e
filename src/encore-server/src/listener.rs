//! Accept loop and connection ceiling.

use crate::error::ServerError;
use crate::session::{serve, Shared};
use encore_core::ServerConfig;
use encore_protocol::SessionId;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixListener;

const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl ListenAddr {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }
}

/// Connection-level slice of the server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub listen: ListenAddr,
    pub max_connections: usize,
    pub connection_timeout: Duration,
}

impl From<&ServerConfig> for ServerSettings {
    fn from(config: &ServerConfig) -> Self {
        let listen = match config.unix_socket_path() {
            Some(path) => ListenAddr::Unix(path),
            None => ListenAddr::tcp(config.hostname.as_str(), config.port),
        };
        Self {
            listen,
            max_connections: config.max_connections,
            connection_timeout: Duration::from_secs(config.connection_timeout),
        }
    }
}

enum Endpoint {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix { listener: UnixListener, path: PathBuf },
}

/// A bound listener, ready to [`run`](Server::run).
pub struct Server {
    endpoint: Endpoint,
    shared: Arc<Shared>,
    limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Server {
    pub async fn bind(settings: &ServerSettings, shared: Arc<Shared>) -> Result<Self, ServerError> {
        let endpoint = match &settings.listen {
            ListenAddr::Unix(path) => bind_unix(path.clone())?,
            ListenAddr::Tcp { host, port } => Endpoint::Tcp(bind_tcp(host, *port).await?),
        };
        Ok(Self {
            endpoint,
            shared,
            limit: Arc::new(Semaphore::new(settings.max_connections)),
            max_connections: settings.max_connections,
        })
    }

    /// Bound TCP address; `None` for unix sockets.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.endpoint {
            Endpoint::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Endpoint::Unix { .. } => None,
        }
    }

    /// Accepts clients until `shutdown` flips, then waits for open sessions
    /// to wind down. A unix socket file is removed on the way out.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let mut sessions = JoinSet::new();
        let mut next_id: SessionId = 1;
        tracing::info!(endpoint = %self.describe(), max_connections = self.max_connections, "listening");

        loop {
            let accepted = tokio::select! {
                _ = shutdown.changed() => break,
                Some(_) = sessions.join_next(), if !sessions.is_empty() => continue,
                accepted = self.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            let Ok(permit) = Arc::clone(&self.limit).try_acquire_owned() else {
                tracing::warn!(%peer, max = self.max_connections, "connection limit reached; dropping client");
                drop(stream);
                continue;
            };
            let id = next_id;
            next_id += 1;
            let shared = Arc::clone(&self.shared);
            let shutdown = shutdown.clone();
            sessions.spawn(async move {
                let _permit = permit;
                let result = match stream {
                    Accepted::Tcp(stream) => serve(stream, id, peer, shared, shutdown).await,
                    #[cfg(unix)]
                    Accepted::Unix(stream) => serve(stream, id, peer, shared, shutdown).await,
                };
                if let Err(e) = result {
                    tracing::debug!(session = id, error = %e, "session ended with an i/o error");
                }
            });
        }

        tracing::info!(open = sessions.len(), "shutting down listener");
        while sessions.join_next().await.is_some() {}
        #[cfg(unix)]
        remove_socket_file(&self.endpoint);
        Ok(())
    }

    async fn accept(&self) -> io::Result<(Accepted, String)> {
        match &self.endpoint {
            Endpoint::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                stream.set_nodelay(true)?;
                Ok((Accepted::Tcp(stream), addr.to_string()))
            }
            #[cfg(unix)]
            Endpoint::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                Ok((Accepted::Unix(stream), "unix".to_string()))
            }
        }
    }

    fn describe(&self) -> String {
        match &self.endpoint {
            Endpoint::Tcp(listener) => listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp".to_string()),
            #[cfg(unix)]
            Endpoint::Unix { path, .. } => format!("unix:{}", path.display()),
        }
    }
}

enum Accepted {
    Tcp(tokio::net::TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

async fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    let addr = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ServerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| ServerError::ResolveEmpty {
            host: host.to_string(),
            port,
        })?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: PathBuf) -> Result<Endpoint, ServerError> {
    clear_stale_socket(&path)?;
    let listener = UnixListener::bind(&path).map_err(|source| ServerError::BindUnix {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Endpoint::Unix { listener, path })
}

#[cfg(not(unix))]
fn bind_unix(path: PathBuf) -> Result<Endpoint, ServerError> {
    Err(ServerError::UnsupportedUnix {
        path: path.display().to_string(),
    })
}

/// Removes a socket file left behind by a previous run. A live socket is an
/// error.
#[cfg(unix)]
fn clear_stale_socket(path: &Path) -> Result<(), ServerError> {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if !metadata.file_type().is_socket() {
        return Err(ServerError::UnixNotSocket {
            path: path.display().to_string(),
        });
    }
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(ServerError::UnixInUse {
            path: path.display().to_string(),
        });
    }
    tracing::info!(path = %path.display(), "removing stale unix socket");
    fs::remove_file(path).map_err(|source| ServerError::UnixCleanup {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(unix)]
fn remove_socket_file(endpoint: &Endpoint) {
    let Endpoint::Unix { path, .. } = endpoint else {
        return;
    };
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(error = %e, path = %path.display(), "failed to remove unix socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let config = ServerConfig {
            max_connections: 3,
            connection_timeout: 9,
            ..ServerConfig::default()
        };
        let settings = ServerSettings::from(&config);
        assert_eq!(settings.max_connections, 3);
        assert_eq!(settings.connection_timeout, Duration::from_secs(9));
        assert_eq!(settings.listen, ListenAddr::tcp("127.0.0.1", 6600));
    }

    #[test]
    fn unix_hostname_yields_path() {
        let config = ServerConfig {
            hostname: "unix:/run/encore.sock".into(),
            ..ServerConfig::default()
        };
        let settings = ServerSettings::from(&config);
        assert_eq!(settings.listen, ListenAddr::Unix(PathBuf::from("/run/encore.sock")));
    }

    #[cfg(unix)]
    #[test]
    fn stale_socket_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encore.sock");
        {
            let _stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
        }
        assert!(path.exists());
        clear_stale_socket(&path).unwrap();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn live_socket_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encore.sock");
        let _live = std::os::unix::net::UnixListener::bind(&path).unwrap();
        assert!(matches!(
            clear_stale_socket(&path),
            Err(ServerError::UnixInUse { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn regular_file_is_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encore.sock");
        fs::write(&path, b"hello").unwrap();
        assert!(matches!(
            clear_stale_socket(&path),
            Err(ServerError::UnixNotSocket { .. })
        ));
    }
}
