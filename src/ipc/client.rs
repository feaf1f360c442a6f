//! Query client: one blocking round trip to launchd per call

use std::sync::Arc;
use std::time::Duration;

use crate::common::config::{Config, QueryConfig};
use crate::common::{Error, Result};
use crate::locator::{ForeignStateReader, GlobalStateLocator, NativeAllocTable};

use super::decode::decode_reply;
use super::info::ProcessInfo;
use super::protocol::QueryMessage;
use super::transport::Transport;
use super::xpc::XpcPipeTransport;

/// Per-client query settings
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub shmem_size: usize,
    pub not_found_codes: Vec<i64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryConfig::default().into()
    }
}

impl From<QueryConfig> for QueryOptions {
    fn from(config: QueryConfig) -> Self {
        Self {
            shmem_size: config.shmem_size,
            not_found_codes: config.not_found_codes,
        }
    }
}

/// Check that `pid` is a positive `pid_t`
pub fn validate_pid(pid: i64) -> Result<i32> {
    match i32::try_from(pid) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(Error::InvalidArgument { pid }),
    }
}

/// Client for launchd's process-info query
///
/// Holds no mutable state; share it freely when `R` and `T` are `Sync`.
#[derive(Debug)]
pub struct QueryClient<R, T> {
    locator: R,
    transport: T,
    options: QueryOptions,
}

/// Client over this process's real XPC state
pub type NativeQueryClient = QueryClient<GlobalStateLocator<NativeAllocTable>, XpcPipeTransport>;

impl NativeQueryClient {
    /// Build a client from configuration
    ///
    /// Fails with `UnsupportedPlatform` when the pipe primitive or the
    /// allocation table cannot be found.
    pub fn native(config: &Config) -> Result<Self> {
        let transport = XpcPipeTransport::detect();
        transport.ensure_available()?;
        let locator = GlobalStateLocator::native(config.layout())?;
        Ok(Self::new(locator, transport).with_options(config.query.clone().into()))
    }
}

impl<R: ForeignStateReader, T: Transport> QueryClient<R, T> {
    pub fn new(locator: R, transport: T) -> Self {
        Self {
            locator,
            transport,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn locator(&self) -> &R {
        &self.locator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ask launchd about `pid`
    ///
    /// Returns an empty [`ProcessInfo`] when launchd has no record of the
    /// process. The pipe is re-resolved on every call and nothing is retried.
    pub fn get_process_info(&self, pid: i64) -> Result<ProcessInfo> {
        let pid = validate_pid(pid)?;
        self.transport.ensure_available()?;
        let pipe = self.locator.resolve_pipe()?;

        let message = QueryMessage::process_info(pid, self.options.shmem_size);
        tracing::debug!(pid, "querying launchd");
        let reply = self.transport.send(&pipe, &message)?;

        let info = decode_reply(&reply, &self.options.not_found_codes)?;
        tracing::trace!(pid, attributes = info.len(), "decoded launchd reply");
        Ok(info)
    }
}

/// Runs queries on tokio's blocking pool, optionally bounded by a timeout
///
/// A query that times out is abandoned; its blocking thread keeps waiting on
/// the pipe until launchd answers.
pub struct AsyncQueryClient<R, T> {
    inner: Arc<QueryClient<R, T>>,
    timeout: Option<Duration>,
}

impl<R, T> Clone for AsyncQueryClient<R, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<R, T> AsyncQueryClient<R, T>
where
    R: ForeignStateReader + Send + Sync + 'static,
    T: Transport + Send + Sync + 'static,
{
    pub fn new(client: QueryClient<R, T>) -> Self {
        Self {
            inner: Arc::new(client),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn client(&self) -> &QueryClient<R, T> {
        &self.inner
    }

    pub async fn get_process_info(&self, pid: i64) -> Result<ProcessInfo> {
        let client = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || client.get_process_info(pid));

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => task.await,
        };

        joined.map_err(|e| Error::Internal(format!("query task failed: {}", e)))?
    }
}
