use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::debug;

use super::{Transport, TransportError, TransportKind};

/// Reads the archive pair straight from disk.
pub struct LocalTransport {
    index_path: PathBuf,
    data_path: PathBuf,
    data: Option<File>,
}

impl LocalTransport {
    pub fn new(index_path: impl AsRef<Path>, data_path: impl AsRef<Path>) -> Self {
        Self {
            index_path: index_path.as_ref().to_path_buf(),
            data_path: data_path.as_ref().to_path_buf(),
            data: None,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}

impl Transport for LocalTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    fn describe(&self) -> String {
        self.data_path.display().to_string()
    }

    fn fetch_index(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(std::fs::read(&self.index_path)?)
    }

    fn open_data(&mut self, _slot_count: usize) -> Result<u64, TransportError> {
        let file = OpenOptions::new().read(true).open(&self.data_path)?;
        let length = file.metadata()?.len();

        debug!("Opened {} ({length} bytes)", self.data_path.display());

        self.data = Some(file);

        Ok(length)
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, TransportError> {
        let file = self
            .data
            .as_mut()
            .ok_or_else(|| TransportError::Unavailable("data file is not open".to_string()))?;

        file.seek(SeekFrom::Start(offset))?;

        let mut res = vec![];
        file.take(len).read_to_end(&mut res)?;

        Ok(res)
    }

    fn close(&mut self, _completed: bool) -> Result<(), TransportError> {
        self.data = None;

        Ok(())
    }
}
