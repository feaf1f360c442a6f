//! IPC with launchd over its bootstrap pipe
//!
//! Builds the dump-process request, sends it with `xpc_pipe_routine`, and
//! decodes the reply into [`ProcessInfo`].

pub mod client;
pub mod decode;
pub mod dump;
pub mod info;
pub mod protocol;
pub mod transport;
pub mod xpc;

pub use client::{AsyncQueryClient, NativeQueryClient, QueryClient, QueryOptions};
pub use info::{AttrValue, ProcessInfo};
pub use transport::Transport;
pub use xpc::XpcPipeTransport;
