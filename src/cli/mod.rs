//! CLI command handling
//!
//! Runs queries through the library and formats output.

use std::time::Duration;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::Result;
use crate::ipc::{AsyncQueryClient, NativeQueryClient, ProcessInfo, Transport, XpcPipeTransport};
use crate::locator::{ForeignStateReader, GlobalStateLocator};
use crate::provenance::LaunchProvenance;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Query { pid, json, timeout } => {
            let mut client = AsyncQueryClient::new(NativeQueryClient::native(&config)?);
            if let Some(secs) = timeout {
                client = client.with_timeout(Duration::from_secs(secs));
            }
            let info = client.get_process_info(pid).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(pid, &info);
            }
            Ok(())
        }

        Commands::Provenance { pid, json } => {
            let info = NativeQueryClient::native(&config)?.get_process_info(pid)?;
            let provenance = LaunchProvenance::from_info(&info);

            if json {
                println!("{}", serde_json::to_string_pretty(&provenance)?);
            } else if provenance.is_empty() {
                println!("No launch provenance recorded for pid {}", pid);
            } else {
                print_field("submitted by", provenance.submitted_by_name.as_deref());
                print_field(
                    "submitted by pid",
                    provenance.submitted_by_pid.map(|p| p.to_string()).as_deref(),
                );
                print_field("plist", provenance.plist_path.as_deref());
                print_field("program", provenance.program_path.as_deref());
            }
            Ok(())
        }

        Commands::Doctor => {
            doctor(&config);
            Ok(())
        }
    }
}

fn print_info(pid: i64, info: &ProcessInfo) {
    if info.is_empty() {
        println!("No launchd record for pid {}", pid);
        return;
    }
    let width = info.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in info.iter() {
        println!("{:width$}  {}", key, value, width = width);
    }
}

fn print_field(label: &str, value: Option<&str>) {
    if let Some(value) = value {
        println!("{:16}  {}", label, value);
    }
}

fn doctor(config: &Config) {
    let os = os_info::get();
    println!("OS:               {} {}", os.os_type(), os.version());

    let layout = config.layout();
    println!(
        "Layout:           slot {} flags@{} port@{} pipe@{} max_flags {:#x}",
        layout.slot_index,
        layout.flags_offset,
        layout.port_offset,
        layout.pipe_offset,
        layout.max_flags
    );

    let transport = XpcPipeTransport::detect();
    match transport.ensure_available() {
        Ok(()) => println!("xpc_pipe_routine: found"),
        Err(e) => println!("xpc_pipe_routine: missing ({})", e),
    }

    match GlobalStateLocator::native(layout).and_then(|l| l.resolve_pipe()) {
        Ok(pipe) => println!(
            "Bootstrap pipe:   {:p} (bootstrap port {:#x})",
            pipe.as_ptr(),
            pipe.bootstrap_port()
        ),
        Err(e) => println!("Bootstrap pipe:   unavailable ({})", e),
    }
}
