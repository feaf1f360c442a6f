//! Stub locator and recording stub transport

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::common::{Error, Result};
use crate::ipc::protocol::{QueryMessage, QueryReply};
use crate::ipc::transport::Transport;
use crate::locator::{ForeignStateReader, PipeHandle};

#[derive(Debug, Clone, Copy)]
enum LocatorOutcome {
    Pipe,
    Uninitialized,
    Mismatch,
}

/// Locator returning a fixed outcome and counting resolves
#[derive(Debug)]
pub struct StubLocator {
    outcome: LocatorOutcome,
    resolves: AtomicUsize,
}

impl StubLocator {
    fn with(outcome: LocatorOutcome) -> Self {
        Self {
            outcome,
            resolves: AtomicUsize::new(0),
        }
    }

    /// Always resolves to a dummy pipe
    pub fn ok() -> Self {
        Self::with(LocatorOutcome::Pipe)
    }

    pub fn uninitialized() -> Self {
        Self::with(LocatorOutcome::Uninitialized)
    }

    pub fn layout_mismatch() -> Self {
        Self::with(LocatorOutcome::Mismatch)
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

impl ForeignStateReader for StubLocator {
    fn resolve_pipe(&self) -> Result<PipeHandle> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            LocatorOutcome::Pipe => Ok(PipeHandle::new(NonNull::<c_void>::dangling(), 0x1103)),
            LocatorOutcome::Uninitialized => Err(Error::UninitializedState { slot: 1 }),
            LocatorOutcome::Mismatch => Err(Error::layout_mismatch("stub")),
        }
    }
}

type Responder = Box<dyn Fn(&QueryMessage) -> Result<QueryReply> + Send + Sync>;

/// Transport answering from a closure and recording every request
pub struct StubTransport {
    available: bool,
    responder: Responder,
    calls: AtomicUsize,
    pids: Mutex<Vec<i64>>,
}

impl StubTransport {
    /// Answer each request with `respond(message)`
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&QueryMessage) -> Result<QueryReply> + Send + Sync + 'static,
    {
        Self {
            available: true,
            responder: Box::new(respond),
            calls: AtomicUsize::new(0),
            pids: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same reply
    pub fn replying(reply: QueryReply) -> Self {
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Fail every request with a transport status
    pub fn failing(status: i64) -> Self {
        Self::new(move |_| Err(Error::Transport { status }))
    }

    /// Pretend the pipe primitive is missing
    pub fn unavailable() -> Self {
        let mut stub = Self::new(|_| Err(Error::Internal("unavailable stub was sent to".into())));
        stub.available = false;
        stub
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Pids of every request sent, in order
    pub fn seen_pids(&self) -> Vec<i64> {
        self.pids.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Transport for StubTransport {
    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::UnsupportedPlatform("stub transport unavailable".to_string()))
        }
    }

    fn send(&self, _pipe: &PipeHandle, message: &QueryMessage) -> Result<QueryReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let (Some(pid), Ok(mut pids)) = (message.pid(), self.pids.lock()) {
            pids.push(pid);
        }
        (self.responder)(message)
    }
}
