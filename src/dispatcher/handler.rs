//! Request dispatcher
//!
//! Owns the VFS and executes one request at a time.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::Result;
use crate::pool::{HandlePool, OPAQUE_DIR_NAME};
use crate::protocol::{Command, Request, Response};
use crate::storage::{FsStore, SlotStore};
use crate::vfs::Vfs;

use super::LogLevel;

/// Callback applying a new log level to the installed subscriber
pub type LogHook = Box<dyn Fn(LogLevel) -> Result<()> + Send>;

/// Executes requests against a lazily initialized pool
pub struct Dispatcher {
    config: Config,
    vfs: Vfs,

    /// Set after the first successful initialization
    initialized_once: bool,

    log_level: LogLevel,
    log_hook: Option<LogHook>,
}

impl Dispatcher {
    /// Create a dispatcher over `{data_dir}/.opaque`
    ///
    /// The directory is created if needed; slots are not acquired until
    /// the first request that needs them.
    pub fn open(config: Config) -> Result<Self> {
        let store = FsStore::open(&config.data_dir.join(OPAQUE_DIR_NAME))?;
        Ok(Self::with_store(config, Box::new(store)))
    }

    /// Create a dispatcher over an arbitrary slot store
    pub fn with_store(config: Config, store: Box<dyn SlotStore>) -> Self {
        let vfs = Vfs::new(HandlePool::new(store), config.page_size);
        Self {
            config,
            vfs,
            initialized_once: false,
            log_level: LogLevel::default(),
            log_hook: None,
        }
    }

    /// Install the callback used by `setLogLevel`
    pub fn with_log_hook(mut self, hook: LogHook) -> Self {
        self.log_hook = Some(hook);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn vfs_mut(&mut self) -> &mut Vfs {
        &mut self.vfs
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Release every live handle; the next request re-acquires them
    pub fn release(&mut self) {
        if self.vfs.pool().is_acquired() {
            self.vfs.release();
            tracing::info!("Released pool handles");
        }
    }

    /// Acquire the pool if it is not currently held
    ///
    /// Only the first initialization honors `clear_on_init`.
    pub fn ensure_initialized(&mut self) -> Result<()> {
        if self.vfs.pool().is_acquired() {
            return Ok(());
        }

        let clear = self.config.clear_on_init && !self.initialized_once;
        self.acquire(clear)
    }

    fn acquire(&mut self, clear: bool) -> Result<()> {
        let policy = HandlePool::policy_from_config(&self.config);
        self.vfs
            .pool_mut()
            .initialize(self.config.initial_capacity, clear, &policy)?;
        self.initialized_once = true;
        Ok(())
    }

    // =========================================================================
    // Request handling
    // =========================================================================

    /// Handle one request; never panics and never drops a request
    pub fn handle(&mut self, request: Request) -> Response {
        let id = request.id;
        tracing::trace!("Request #{}: {}", id, request.operation);

        let command = match Command::parse(&request.operation, &request.args) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("Rejected request #{}: {}", id, e);
                return Response::error(id, e.to_string());
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(command)));
        match outcome {
            Ok(Ok(result)) => Response::ok(id, result),
            Ok(Err(e)) => {
                tracing::debug!("Request #{} ({}) failed: {}", id, request.operation, e);
                Response::error(id, e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Request #{} ({}) panicked: {}", id, request.operation, message);
                Response::error(id, format!("internal error: {}", message))
            }
        }
    }

    /// Execute a parsed command
    pub fn execute(&mut self, command: Command) -> Result<Value> {
        if command.needs_pool() {
            self.ensure_initialized()?;
        }

        let result = match command {
            Command::GetCapacity => {
                let pool = self.vfs.pool();
                json!({ "capacity": pool.capacity(), "fileCount": pool.bound_count() })
            }
            Command::AddCapacity { count } => {
                let capacity = self.vfs.pool_mut().add_capacity(count)?;
                json!({ "capacity": capacity })
            }
            Command::ReserveMinimumCapacity { minimum } => {
                let capacity = self.vfs.pool_mut().reserve_minimum_capacity(minimum)?;
                json!({ "capacity": capacity })
            }
            Command::GetFileCount => json!({ "count": self.vfs.pool().bound_count() }),
            Command::GetFileList => json!({ "files": self.vfs.pool().bound_paths() }),
            Command::ReadFile { filename } => {
                let data = self.vfs.read_file(&filename)?;
                json!({ "data": data })
            }
            Command::WriteFile { filename, data } => {
                let written = self.vfs.write_file(&filename, &data)?;
                json!({ "bytesWritten": written })
            }
            Command::ImportDatabase { filename, data } => {
                let written = self.vfs.import_database(&filename, &data)?;
                json!({ "bytesWritten": written })
            }
            Command::PersistDirtyPages {
                filename,
                pages,
                page_size,
            } => {
                let page_size = page_size.unwrap_or(self.config.page_size);
                let stats = self.vfs.persist_dirty_pages(&filename, &pages, page_size)?;
                json!({ "pagesWritten": stats.pages_written, "bytesWritten": stats.bytes_written })
            }
            Command::DeleteFile { filename } => {
                let existed = self.vfs.access(&filename);
                self.vfs.delete(&filename)?;
                json!({ "deleted": existed })
            }
            Command::FileExists { filename } => json!({ "exists": self.vfs.access(&filename) }),
            Command::GetDirtyPages { filename } => json!({ "pages": self.vfs.dirty_pages(&filename) }),
            Command::ResetDirtyPages { filename } => {
                self.vfs.reset_dirty(&filename);
                Value::Null
            }
            Command::WipeFiles => {
                self.vfs.release();
                self.acquire(true)?;
                tracing::info!("Wiped all files");
                json!({ "capacity": self.vfs.pool().capacity() })
            }
            Command::Cleanup => {
                self.release();
                Value::Null
            }
            Command::SetLogLevel { level } => {
                let level: LogLevel = level.parse()?;
                if let Some(hook) = &self.log_hook {
                    hook(level)?;
                }
                self.log_level = level;
                json!({ "level": level.as_str() })
            }
        };
        Ok(result)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
