//! Client side of the live board: shared by every front end.
//!
//! - [`selection`]: pure derivation of the current stream, the archive and the
//!   search results, driven by a single reducer.
//! - [`controller`]: applies fetched data to that state and polls the current
//!   stream's liveness while it is on screen.
//! - [`client`]: HTTP access to the lives API, including admin operations.

pub mod client;
pub mod controller;
pub mod error;
pub mod poller;
pub mod selection;

pub use client::{ApiClient, LivesSource};
pub use controller::{BoardController, BoardOptions};
pub use error::{Error, Result};
pub use selection::{Action, ArchiveEntry, BoardState, Mode, Snapshot};
