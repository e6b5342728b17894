//! Where archive bytes come from.
//!
//! The loader only ever talks to a [`Transport`]. [`LocalTransport`] reads the
//! `.wzx`/`.wzl` pair from disk, [`RemoteTransport`] fetches them from an HTTP
//! origin with range requests and [`Fallback`] switches from the first to the
//! second when the local pair is missing.
use std::path::PathBuf;

mod fallback;
mod local;
mod remote;

pub use fallback::Fallback;
pub use local::LocalTransport;
pub use remote::{RemoteOptions, RemoteTransport};

use crate::config::Config;

pub static INDEX_EXTENSION: &str = "wzx";
pub static DATA_EXTENSION: &str = "wzl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Local,
    Remote,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IOError: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Resource unavailable: {0}")]
    Unavailable(String),
}

/// The four operations the loader needs from a backend.
///
/// Every call blocks and is made from the loader's worker thread.
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Human readable origin, for logs.
    fn describe(&self) -> String;

    /// Index offsets below this are corrupt and read as empty slots.
    fn min_data_offset(&self) -> u32 {
        0
    }

    /// Raw `.wzx` bytes.
    fn fetch_index(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Prepares data reads and returns the data length, 0 if unknown.
    fn open_data(&mut self, slot_count: usize) -> Result<u64, TransportError>;

    /// Up to `len` bytes starting at `offset`. Short only at the end of data.
    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, TransportError>;

    /// `completed` is true once every slot was loaded.
    fn close(&mut self, completed: bool) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn kind(&self) -> TransportKind {
        (**self).kind()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn min_data_offset(&self) -> u32 {
        (**self).min_data_offset()
    }

    fn fetch_index(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).fetch_index()
    }

    fn open_data(&mut self, slot_count: usize) -> Result<u64, TransportError> {
        (**self).open_data(slot_count)
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, TransportError> {
        (**self).read_range(offset, len)
    }

    fn close(&mut self, completed: bool) -> Result<(), TransportError> {
        (**self).close(completed)
    }
}

/// `<data_dir>/<name>.wzx` and `<data_dir>/<name>.wzl`
pub fn archive_paths(data_dir: impl Into<PathBuf>, name: &str) -> (PathBuf, PathBuf) {
    let data_dir = data_dir.into();

    (
        data_dir.join(format!("{name}.{INDEX_EXTENSION}")),
        data_dir.join(format!("{name}.{DATA_EXTENSION}")),
    )
}

/// Picks the backend for archive `name` from the config.
///
/// With both a data directory and a base url the local pair is preferred and
/// the origin is the fallback. Mirroring writes into the data directory.
pub fn open_archive(config: &Config, name: &str) -> eyre::Result<Box<dyn Transport>> {
    let remote_options = config.remote_options();

    let res: Box<dyn Transport> = match (&config.data_dir, &config.base_url) {
        (Some(data_dir), Some(base_url)) => {
            let (index_path, data_path) = archive_paths(data_dir, name);
            let local = LocalTransport::new(&index_path, &data_path);
            let mut remote = RemoteTransport::new(base_url, name, remote_options);

            if config.mirror {
                remote = remote.mirror(index_path, data_path);
            }

            Box::new(Fallback::new(local, remote))
        }
        (Some(data_dir), None) => {
            let (index_path, data_path) = archive_paths(data_dir, name);

            Box::new(LocalTransport::new(index_path, data_path))
        }
        (None, Some(base_url)) => Box::new(RemoteTransport::new(base_url, name, remote_options)),
        (None, None) => {
            return Err(eyre::eyre!(
                "Neither a data directory nor a base url is configured"
            ))
        }
    };

    Ok(res)
}
