//! Transport seam between the query client and the pipe primitive
//!
//! The real implementation is [`XpcPipeTransport`](super::xpc::XpcPipeTransport).
//! Tests substitute their own.

use crate::common::Result;
use crate::locator::PipeHandle;

use super::protocol::{QueryMessage, QueryReply};

/// Synchronous request/reply over an already-connected pipe
pub trait Transport {
    /// Fail with `UnsupportedPlatform` when the primitive is missing
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    /// Send `message` and block for the reply
    ///
    /// A non-success status from the primitive is returned as
    /// `Error::Transport`. Implementations add no retries.
    fn send(&self, pipe: &PipeHandle, message: &QueryMessage) -> Result<QueryReply>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn ensure_available(&self) -> Result<()> {
        (**self).ensure_available()
    }

    fn send(&self, pipe: &PipeHandle, message: &QueryMessage) -> Result<QueryReply> {
        (**self).send(pipe, message)
    }
}
