//! launchd process info over the private XPC bootstrap pipe
//!
//! This library asks launchd directly about a running process, reusing the
//! pipe libxpc already opened in this process, and decodes the answer into a
//! [`ProcessInfo`] map.
//!
//! ```no_run
//! let info = launchd_procinfo::get_process_info(1)?;
//! println!("{:?}", info.get_str("name"));
//! # Ok::<(), launchd_procinfo::Error>(())
//! ```

pub mod cli;
pub mod commands;
pub mod common;
pub mod ipc;
pub mod locator;
pub mod provenance;
pub mod testing;

pub use common::config::Config;
pub use common::{Error, Result};
pub use ipc::{AsyncQueryClient, AttrValue, NativeQueryClient, ProcessInfo, QueryClient};
pub use locator::{BootstrapLayout, ForeignStateReader, GlobalStateLocator, PipeHandle};
pub use provenance::LaunchProvenance;

/// Query launchd about `pid` with default settings
///
/// The pid is validated before anything touches the platform, so a bad pid
/// is `InvalidArgument` even where XPC is unsupported.
pub fn get_process_info(pid: i64) -> Result<ProcessInfo> {
    ipc::client::validate_pid(pid)?;
    NativeQueryClient::native(&Config::default())?.get_process_info(pid)
}
