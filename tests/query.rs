//! Query path tests against simulated launchd state
//!
//! These drive the public client API end to end with the in-crate test
//! doubles: a simulated allocation table behind the real locator, and a stub
//! transport standing in for `xpc_pipe_routine`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use launchd_procinfo::ipc::protocol::{QueryReply, XpcValue, KEY_ERROR};
use launchd_procinfo::testing::{SimulatedGlobalData, SimulatedTable, StubLocator, StubTransport};
use launchd_procinfo::{
    AsyncQueryClient, AttrValue, BootstrapLayout, Config, Error, ForeignStateReader, GlobalStateLocator,
    LaunchProvenance, QueryClient,
};

fn simulated_locator(table: SimulatedTable) -> GlobalStateLocator<SimulatedTable> {
    GlobalStateLocator::new(table, BootstrapLayout::LP64).unwrap()
}

fn finder_reply() -> QueryReply {
    QueryReply::from_fields([
        ("responsiblePid", XpcValue::Int64(1)),
        ("name", XpcValue::from("Finder")),
    ])
}

#[test]
fn test_nonpositive_pids_rejected_without_ipc() {
    let client = QueryClient::new(StubLocator::ok(), StubTransport::replying(finder_reply()));
    for pid in [0, -1, i64::MIN] {
        let err = client.get_process_info(pid).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { pid: p } if p == pid));
    }
    assert_eq!(client.transport().calls(), 0);
}

#[test]
fn test_unknown_pid_is_empty_result() {
    let reply = QueryReply::from_fields([(KEY_ERROR, XpcValue::Int64(3))]);
    let client = QueryClient::new(StubLocator::ok(), StubTransport::replying(reply));
    let info = client.get_process_info(99_999).unwrap();
    assert!(info.is_empty());
}

#[test]
fn test_finder_reply_has_exactly_two_entries() {
    let client = QueryClient::new(StubLocator::ok(), StubTransport::replying(finder_reply()));
    let info = client.get_process_info(512).unwrap();

    assert_eq!(info.len(), 2);
    assert_eq!(info.get("name"), Some(&AttrValue::String("Finder".into())));
    assert_eq!(info.get("responsiblePid"), Some(&AttrValue::Int(1)));
}

#[test]
fn test_field_order_does_not_matter() {
    let reversed = QueryReply::from_fields([
        ("name", XpcValue::from("Finder")),
        ("responsiblePid", XpcValue::Int64(1)),
    ]);
    let a = QueryClient::new(StubLocator::ok(), StubTransport::replying(finder_reply()));
    let b = QueryClient::new(StubLocator::ok(), StubTransport::replying(reversed));
    assert_eq!(a.get_process_info(512).unwrap(), b.get_process_info(512).unwrap());
}

#[test]
fn test_missing_field_is_omitted() {
    let reply = QueryReply::from_fields([("name", XpcValue::from("Finder"))]);
    let client = QueryClient::new(StubLocator::ok(), StubTransport::replying(reply));
    let info = client.get_process_info(512).unwrap();
    assert_eq!(info.get_str("name"), Some("Finder"));
    assert!(!info.contains_key("responsiblePid"));
}

#[test]
fn test_unknown_fields_ignored() {
    let reply = QueryReply::from_fields([
        ("name", XpcValue::from("Finder")),
        ("spawn-constraint", XpcValue::Uint64(4)),
        ("endpoints", XpcValue::Array(vec![XpcValue::from("com.apple.finder")])),
    ]);
    let client = QueryClient::new(StubLocator::ok(), StubTransport::replying(reply));
    let info = client.get_process_info(512).unwrap();
    assert_eq!(info.len(), 1);
}

#[test]
fn test_unset_once_flag_is_uninitialized_and_never_sends() {
    let locator = simulated_locator(SimulatedTable::uninitialized());
    assert!(matches!(
        locator.resolve_pipe(),
        Err(Error::UninitializedState { .. })
    ));

    let client = QueryClient::new(locator, StubTransport::replying(finder_reply()));
    let err = client.get_process_info(512).unwrap_err();
    assert!(matches!(err, Error::UninitializedState { .. }));
    assert!(err.is_retryable());
    assert_eq!(client.transport().calls(), 0);
}

#[test]
fn test_out_of_range_flags_is_layout_mismatch() {
    let mut data = SimulatedGlobalData::valid();
    data.flags = u64::MAX;
    let locator = simulated_locator(SimulatedTable::initialized(data));
    assert!(matches!(locator.resolve_pipe(), Err(Error::LayoutMismatch(_))));

    let client = QueryClient::new(locator, StubTransport::replying(finder_reply()));
    assert!(matches!(
        client.get_process_info(512),
        Err(Error::LayoutMismatch(_))
    ));
    assert_eq!(client.transport().calls(), 0);
}

#[test]
fn test_configured_max_flags_applies_to_real_locator() {
    let config = Config::parse("[layout]\nmax_flags = 2\n").unwrap();
    let layout = config.layout();
    assert_eq!(layout.max_flags, 2);

    let table = SimulatedTable::initialized(SimulatedGlobalData::valid());
    let locator = GlobalStateLocator::new(table, layout).unwrap();
    let client = QueryClient::new(locator, StubTransport::replying(finder_reply()));
    assert!(matches!(
        client.get_process_info(512),
        Err(Error::LayoutMismatch(_))
    ));
    assert_eq!(client.transport().calls(), 0);
}

#[test]
fn test_configured_offset_past_record_rejected() {
    let err = Config::parse("[layout]\npipe_offset = 64\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let layout = BootstrapLayout {
        pipe_offset: 64,
        ..BootstrapLayout::LP64
    };
    let table = SimulatedTable::initialized(SimulatedGlobalData::valid());
    assert!(matches!(
        GlobalStateLocator::new(table, layout),
        Err(Error::LayoutMismatch(_))
    ));
}

#[test]
fn test_simulated_state_end_to_end() {
    let locator = simulated_locator(SimulatedTable::initialized(SimulatedGlobalData::valid()));
    let transport = StubTransport::new(|message| {
        assert_eq!(message.pid(), Some(830));
        Ok(QueryReply::default().with_dump(
            "com.apple.Terminal.12 = {\n\
             \tpath = (submitted by smd.411)\n\
             \tprogram = /System/Applications/Utilities/Terminal.app/Contents/MacOS/Terminal\n\
             \tresponsible pid = 830\n\
             \tpid = 830\n\
             }\n",
        ))
    });
    let client = QueryClient::new(locator, transport);
    let info = client.get_process_info(830).unwrap();

    assert_eq!(info.get_str("name"), Some("com.apple.Terminal.12"));
    assert_eq!(info.get_int("responsiblePid"), Some(830));

    let provenance = LaunchProvenance::from_info(&info);
    assert_eq!(provenance.submitted_by_name.as_deref(), Some("smd"));
    assert_eq!(provenance.submitted_by_pid, Some(411));
    assert!(provenance.program_path.unwrap().ends_with("/Terminal"));
}

#[test]
fn test_concurrent_queries_are_independent() {
    const N: i64 = 32;
    let transport = StubTransport::new(|message| {
        let pid = message.pid().unwrap_or_default();
        thread::sleep(Duration::from_millis(1));
        Ok(QueryReply::from_fields([
            ("pid", XpcValue::Int64(pid)),
            ("name", XpcValue::String(format!("proc-{}", pid))),
        ]))
    });
    let client = Arc::new(QueryClient::new(StubLocator::ok(), transport));

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (1..=N)
            .map(|pid| {
                let client = Arc::clone(&client);
                s.spawn(move || (pid, client.get_process_info(pid)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.len(), N as usize);
    for (pid, result) in results {
        let info = result.unwrap();
        assert_eq!(info.get_int("pid"), Some(pid));
        assert_eq!(info.get_str("name"), Some(format!("proc-{}", pid).as_str()));
    }
    assert_eq!(client.transport().calls(), N as usize);
    assert_eq!(client.locator().resolves(), N as usize);
}

#[tokio::test]
async fn test_async_client_returns_result() {
    let client = AsyncQueryClient::new(QueryClient::new(
        StubLocator::ok(),
        StubTransport::replying(finder_reply()),
    ));
    let info = client.get_process_info(512).await.unwrap();
    assert_eq!(info.get_str("name"), Some("Finder"));
}

#[tokio::test]
async fn test_async_client_times_out() {
    let transport = StubTransport::new(|_| {
        thread::sleep(Duration::from_millis(500));
        Ok(QueryReply::default())
    });
    let client = AsyncQueryClient::new(QueryClient::new(StubLocator::ok(), transport))
        .with_timeout(Duration::from_millis(20));
    let err = client.get_process_info(512).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(limit) if limit == Duration::from_millis(20)));
    assert!(err.to_string().ends_with("20ms"));
}

#[tokio::test]
async fn test_async_client_concurrent() {
    let transport = StubTransport::new(|message| {
        Ok(QueryReply::from_fields([(
            "pid",
            XpcValue::Int64(message.pid().unwrap_or_default()),
        )]))
    });
    let client = AsyncQueryClient::new(QueryClient::new(StubLocator::ok(), transport));

    let tasks: Vec<_> = (1..=8)
        .map(|pid| {
            let client = client.clone();
            tokio::spawn(async move { (pid, client.get_process_info(pid).await) })
        })
        .collect();

    for task in tasks {
        let (pid, result) = task.await.unwrap();
        assert_eq!(result.unwrap().get_int("pid"), Some(pid));
    }
}

#[cfg(not(target_os = "macos"))]
#[test]
fn test_native_query_unsupported_off_macos() {
    assert!(matches!(
        launchd_procinfo::get_process_info(1),
        Err(Error::UnsupportedPlatform(_))
    ));
    assert!(matches!(
        launchd_procinfo::get_process_info(0),
        Err(Error::InvalidArgument { .. })
    ));
}
