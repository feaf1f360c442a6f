//! Test doubles for the query path
//!
//! A simulated allocation table backed by real memory, plus a stub locator
//! and a recording stub transport. Used by unit tests and by the integration
//! tests under `tests/`.

mod simulated;
mod stubs;

pub use simulated::{SimulatedGlobalData, SimulatedTable};
pub use stubs::{StubLocator, StubTransport};
