//! Startup acquisition and recovery
//!
//! A slot may still be held by another context (a previous instance that
//! has not released it yet), so acquisition is retried with backoff.
//! On the final attempt any slot still busy is deleted from the backing
//! store: its contents are lost, but initialization never blocks forever
//! on a stuck foreign handle.

use crate::error::{PoolError, Result};
use crate::storage::{AcquireError, SlotHandle, SlotStore};

use super::handle_pool::{acquire_error, HandlePool, Slot};
use super::retry::{retry, Attempt, Backoff, RetryError, RetryPolicy};

type Acquired = Vec<(String, Box<dyn SlotHandle>)>;

impl HandlePool {
    /// Acquire every slot in the backing store and rebuild the pool views
    pub(super) fn acquire_all(&mut self, clear: bool, policy: &RetryPolicy) -> Result<()> {
        let names = self.store.list()?;
        if names.is_empty() {
            return Ok(());
        }

        let store = self.store.as_mut();
        let acquired = match retry(policy, |attempt| try_acquire(store, &names, attempt)) {
            Ok(acquired) => acquired,
            Err(RetryError::Permanent(e)) => return Err(e),
            Err(RetryError::Exhausted { last, .. }) => return Err(last),
            Err(RetryError::TimedOut { attempts }) => {
                tracing::error!("Gave up acquiring slots after {} attempt(s)", attempts);
                return Err(PoolError::AcquireTimeout { attempts });
            }
        };

        if acquired.is_empty() {
            return Err(PoolError::NoHandlesAcquired { found: names.len() });
        }

        if let Err(e) = self.register(acquired, clear) {
            self.release_all();
            return Err(e);
        }
        Ok(())
    }

    /// Add acquired handles to the pool, sorting them into bound/available
    fn register(&mut self, acquired: Acquired, clear: bool) -> Result<()> {
        for (name, handle) in acquired {
            let id = self.slots.len();
            self.slots.push(Slot { name, handle });

            if clear {
                self.associate(id, "", 0)?;
                continue;
            }

            match self.associated_path(id) {
                Some(path) if self.bound.contains_key(&path) => {
                    tracing::warn!(
                        "Path {} claimed by more than one slot; clearing slot {}",
                        path,
                        id
                    );
                    self.associate(id, "", 0)?;
                }
                Some(path) => {
                    self.bound.insert(path, id);
                    self.available.remove(&id);
                }
                None => {
                    self.available.insert(id);
                }
            }
        }
        Ok(())
    }
}

/// One acquisition pass over `names`
fn try_acquire(
    store: &mut dyn SlotStore,
    names: &[String],
    attempt: Attempt,
) -> std::result::Result<Acquired, Backoff<PoolError>> {
    let mut acquired: Acquired = Vec::with_capacity(names.len());
    let mut busy = Vec::new();

    for name in names {
        match store.acquire(name) {
            Ok(handle) => acquired.push((name.clone(), handle)),
            Err(AcquireError::Busy) => busy.push(name.clone()),
            Err(AcquireError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Slot {} vanished during acquisition", name);
            }
            Err(e) => return Err(Backoff::Permanent(acquire_error(name, e))),
        }
    }

    if busy.is_empty() {
        return Ok(acquired);
    }

    if !attempt.is_final {
        tracing::warn!(
            "{} slot(s) busy on attempt {}; releasing {} and retrying",
            busy.len(),
            attempt.number,
            acquired.len()
        );
        drop(acquired);
        return Err(Backoff::Transient(PoolError::HandleBusy(busy.join(", "))));
    }

    for name in &busy {
        tracing::warn!("Slot {} still busy after final attempt; deleting it (data lost)", name);
        if let Err(e) = store.remove(name) {
            tracing::warn!("Failed to delete busy slot {}: {}", name, e);
        }
    }

    Ok(acquired)
}
