//! Worker thread
//!
//! Runs a [`Dispatcher`] on its own thread, fed by a channel. Requests
//! are handled strictly in the order they arrive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use serde_json::Value;

use crate::error::{PoolError, Result};
use crate::protocol::{Request, Response};

use super::Dispatcher;

/// A request plus the channel its response goes back on
struct Envelope {
    request: Request,
    reply: Sender<Response>,
}

/// Spawns dispatcher threads
pub struct Worker;

impl Worker {
    /// Move `dispatcher` onto a new thread and return a handle to it
    pub fn spawn(dispatcher: Dispatcher) -> Result<WorkerHandle> {
        let (sender, receiver) = channel::unbounded::<Envelope>();

        let thread = thread::Builder::new()
            .name("poolvfs-worker".to_string())
            .spawn(move || {
                let mut dispatcher = dispatcher;
                tracing::debug!("Worker started");
                for envelope in receiver.iter() {
                    let response = dispatcher.handle(envelope.request);
                    // The caller may have timed out and gone away
                    let _ = envelope.reply.send(response);
                }
                dispatcher.release();
                tracing::debug!("Worker stopped");
                dispatcher
            })?;

        Ok(WorkerHandle {
            sender: Some(sender),
            next_id: AtomicU64::new(1),
            thread: Some(thread),
        })
    }
}

/// Caller side of a running worker
pub struct WorkerHandle {
    sender: Option<Sender<Envelope>>,
    next_id: AtomicU64,
    thread: Option<JoinHandle<Dispatcher>>,
}

impl WorkerHandle {
    /// Send a prepared request and wait for its response
    pub fn send(&self, request: Request) -> Result<Response> {
        let reply = self.submit(request)?;
        reply
            .recv()
            .map_err(|_| PoolError::Worker("worker stopped before responding".to_string()))
    }

    /// Call `operation` with `args`, assigning the next request id
    pub fn call(&self, operation: &str, args: Value) -> Result<Response> {
        self.send(self.request(operation, args))
    }

    /// Like [`call`](Self::call), giving up after `timeout`
    pub fn call_timeout(&self, operation: &str, args: Value, timeout: Duration) -> Result<Response> {
        let request = self.request(operation, args);
        let id = request.id;
        let reply = self.submit(request)?;
        reply.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => {
                PoolError::Worker(format!("request #{} timed out after {:?}", id, timeout))
            }
            RecvTimeoutError::Disconnected => {
                PoolError::Worker("worker stopped before responding".to_string())
            }
        })
    }

    /// Stop the worker after queued requests drain; returns the dispatcher
    pub fn shutdown(mut self) -> Result<Dispatcher> {
        self.sender.take();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| PoolError::Worker("worker thread panicked".to_string())),
            None => Err(PoolError::Worker("worker already stopped".to_string())),
        }
    }

    fn request(&self, operation: &str, args: Value) -> Request {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Request::new(id, operation, args)
    }

    fn submit(&self, request: Request) -> Result<channel::Receiver<Response>> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| PoolError::Worker("worker stopped".to_string()))?;

        let (reply, receiver) = channel::bounded(1);
        sender
            .send(Envelope { request, reply })
            .map_err(|_| PoolError::Worker("worker stopped".to_string()))?;
        Ok(receiver)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
