//! Streams WZL texture libraries from disk or an HTTP origin.
//!
//! ```no_run
//! use wzlstream::{loader::{Loader, LoaderEvent, LoaderOptions}, transport::LocalTransport};
//!
//! let transport = LocalTransport::new("data/hum.wzx", "data/hum.wzl");
//! let (mut loader, events) = Loader::with_channel("hum", transport, LoaderOptions::default());
//!
//! loader.load(&[42]).unwrap();
//!
//! for event in events {
//!     if let LoaderEvent::ArchiveLoaded { .. } = event {
//!         break;
//!     }
//! }
//! ```
pub mod config;
pub mod loader;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod fixtures;

pub use loader::{Loader, LoaderError, LoaderEvent, LoaderOptions};
pub use transport::{open_archive, Transport, TransportError};
pub use wzl::{Sprite, WzlError};
