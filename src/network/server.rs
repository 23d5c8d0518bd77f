//! TCP Server
//!
//! Accepts connections and serves them one after another.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{PoolError, Result};

use super::Connection;

/// Poll interval of the non-blocking accept loop
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Requests a running server to stop
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Stop accepting; the current connection finishes first
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// TCP server for a pool worker
pub struct Server {
    config: Config,
    listener: TcpListener,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Bind to `config.listen_addr`
    pub fn bind(config: Config) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            PoolError::Config(format!("cannot listen on {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            listener,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve connections until shut down (blocking)
    ///
    /// Handles are released when the loop exits.
    pub fn run(&self, dispatcher: &mut Dispatcher) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr()?);

        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(false)?;
                    tracing::debug!("Accepted connection from {}", addr);

                    let mut connection = match Connection::new(stream) {
                        Ok(connection) => connection,
                        Err(e) => {
                            tracing::warn!("Failed to set up connection from {}: {}", addr, e);
                            continue;
                        }
                    };
                    if let Err(e) = connection
                        .set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms)
                    {
                        tracing::warn!("Failed to set timeouts for {}: {}", addr, e);
                    }
                    if let Err(e) = connection.handle(dispatcher) {
                        tracing::warn!("Connection {} ended with error: {}", addr, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        dispatcher.release();
        tracing::info!("Server stopped");
        Ok(())
    }
}
