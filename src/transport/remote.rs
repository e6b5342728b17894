use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use byte_writer::ByteWriter;
use log::{debug, info, warn};
use wzl::constants::{DATA_HEADER_LENGTH, DATA_SLOT_COUNT_OFFSET, MIN_DATA_OFFSET};

use super::{Transport, TransportError, TransportKind, DATA_EXTENSION, INDEX_EXTENSION};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy)]
pub struct RemoteOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

struct Mirror {
    index_path: PathBuf,
    data_path: PathBuf,
    part: Option<File>,
}

impl Mirror {
    fn part_path(&self) -> PathBuf {
        let mut res = self.data_path.clone().into_os_string();
        res.push(".part");

        PathBuf::from(res)
    }
}

/// Fetches the archive from `{base}/data/` with plain GETs and range requests.
///
/// With a mirror configured, fetched bytes are also written to disk so a
/// later run can use the local pair instead.
pub struct RemoteTransport {
    agent: ureq::Agent,
    index_url: String,
    data_url: String,
    mirror: Option<Mirror>,
}

impl RemoteTransport {
    pub fn new(base_url: impl AsRef<str>, name: &str, options: RemoteOptions) -> Self {
        let base_url = base_url.as_ref();
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let name = name.to_lowercase();

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout_read(options.read_timeout)
            .build();

        Self {
            agent,
            index_url: format!("{base_url}data/{name}.{INDEX_EXTENSION}"),
            data_url: format!("{base_url}data/{name}.{DATA_EXTENSION}"),
            mirror: None,
        }
    }

    pub fn mirror(mut self, index_path: impl AsRef<Path>, data_path: impl AsRef<Path>) -> Self {
        self.mirror = Some(Mirror {
            index_path: index_path.as_ref().to_path_buf(),
            data_path: data_path.as_ref().to_path_buf(),
            part: None,
        });

        self
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    fn persist_index(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let Some(mirror) = &self.mirror else {
            return Ok(());
        };

        if let Some(parent) = mirror.index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&mirror.index_path, bytes)?;

        Ok(())
    }
}

/// The origin may serve the index deflated or not. Raw bytes win when
/// inflating fails.
fn maybe_inflate(bytes: Vec<u8>) -> Vec<u8> {
    match wzl::inflate(&bytes) {
        Ok(inflated) => inflated,
        Err(_) => bytes,
    }
}

fn convert_error(e: ureq::Error) -> TransportError {
    match e {
        ureq::Error::Status(code, _) => TransportError::Status(code),
        other => TransportError::Network(other.to_string()),
    }
}

fn read_body(response: ureq::Response, limit: u64) -> Result<Vec<u8>, TransportError> {
    let mut res = vec![];
    response.into_reader().take(limit).read_to_end(&mut res)?;

    Ok(res)
}

impl Transport for RemoteTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Remote
    }

    fn describe(&self) -> String {
        self.data_url.clone()
    }

    fn min_data_offset(&self) -> u32 {
        MIN_DATA_OFFSET
    }

    fn fetch_index(&mut self) -> Result<Vec<u8>, TransportError> {
        let response = self
            .agent
            .get(&self.index_url)
            .call()
            .map_err(convert_error)?;

        let bytes = maybe_inflate(read_body(response, u64::MAX)?);

        // a failed mirror write is not a failed fetch
        if let Err(err) = self.persist_index(&bytes) {
            warn!("Cannot mirror {}: {err}", self.index_url);
        }

        Ok(bytes)
    }

    fn open_data(&mut self, slot_count: usize) -> Result<u64, TransportError> {
        let length = match self.agent.head(&self.data_url).call() {
            Ok(response) => match response
                .header("Content-Length")
                .and_then(|length| length.trim().parse::<u64>().ok())
            {
                Some(length) => length,
                None => {
                    warn!(
                        "{} has no Content-Length, reading without an upper bound",
                        self.data_url
                    );
                    0
                }
            },
            // ranged GETs may still work where HEAD does not
            Err(err) => {
                warn!(
                    "Cannot probe length of {}: {}, reading without an upper bound",
                    self.data_url,
                    convert_error(err)
                );
                0
            }
        };

        if let Some(mirror) = &mut self.mirror {
            let part_path = mirror.part_path();

            if let Some(parent) = part_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut part = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&part_path)?;

            let mut header = ByteWriter::with_capacity(DATA_HEADER_LENGTH);
            header.pad_to(DATA_HEADER_LENGTH);
            header.replace_with_u32(DATA_SLOT_COUNT_OFFSET, slot_count as u32);
            part.write_all(&header.data)?;

            debug!("Mirroring {} into {}", self.data_url, part_path.display());

            mirror.part = Some(part);
        }

        Ok(length)
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, TransportError> {
        if len == 0 {
            return Ok(vec![]);
        }

        let end = offset + len - 1;
        let response = self
            .agent
            .get(&self.data_url)
            .set("Range", &format!("bytes={offset}-{end}"))
            .call()
            .map_err(convert_error)?;

        let res = if response.status() == 206 {
            read_body(response, len)?
        } else {
            // Range was ignored, the body starts at byte 0
            let mut body = response.into_reader();
            std::io::copy(&mut body.by_ref().take(offset), &mut std::io::sink())?;
            let mut res = vec![];
            body.take(len).read_to_end(&mut res)?;
            res
        };

        if let Some(part) = self.mirror.as_mut().and_then(|mirror| mirror.part.as_mut()) {
            part.seek(SeekFrom::Start(offset))?;
            part.write_all(&res)?;
        }

        Ok(res)
    }

    fn close(&mut self, completed: bool) -> Result<(), TransportError> {
        let Some(mirror) = &mut self.mirror else {
            return Ok(());
        };

        let Some(mut part) = mirror.part.take() else {
            return Ok(());
        };

        part.flush()?;
        drop(part);

        if completed {
            std::fs::rename(mirror.part_path(), &mirror.data_path)?;
            info!("Mirrored {} to {}", self.data_url, mirror.data_path.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{io::Cursor, thread};

    use tiny_http::{Response, Server, StatusCode};

    use super::*;
    use crate::fixtures::{zlib, Origin, Quirks};

    fn data_bytes() -> Vec<u8> {
        (0..200u32).map(|i| i as u8).collect()
    }

    #[test]
    fn urls_are_normalized() {
        let transport = RemoteTransport::new("http://origin", "Hum", RemoteOptions::default());

        assert_eq!(transport.index_url(), "http://origin/data/hum.wzx");
        assert_eq!(transport.data_url(), "http://origin/data/hum.wzl");

        let transport = RemoteTransport::new("http://origin/", "hum", RemoteOptions::default());
        assert_eq!(transport.index_url(), "http://origin/data/hum.wzx");
    }

    #[test]
    fn inflate_fallback_keeps_raw_bytes() {
        assert_eq!(maybe_inflate(b"plain".to_vec()), b"plain");
        assert_eq!(maybe_inflate(zlib(b"packed")), b"packed");
    }

    #[test]
    fn fetches_index_and_ranges() {
        let origin = Origin::new("hum", zlib(b"index"), data_bytes(), true);
        let mut transport = RemoteTransport::new(&origin.url, "Hum", RemoteOptions::default());

        assert_eq!(transport.fetch_index().unwrap(), b"index");
        assert_eq!(transport.open_data(3).unwrap(), 200);
        assert_eq!(transport.read_range(64, 4).unwrap(), vec![64, 65, 66, 67]);
        assert_eq!(transport.read_range(198, 100).unwrap(), vec![198, 199]);
        transport.close(true).unwrap();
    }

    #[test]
    fn range_ignored_by_server() {
        let origin = Origin::new("hum", b"index".to_vec(), data_bytes(), false);
        let mut transport = RemoteTransport::new(&origin.url, "hum", RemoteOptions::default());

        transport.open_data(3).unwrap();

        assert_eq!(transport.read_range(100, 3).unwrap(), vec![100, 101, 102]);
    }

    #[test]
    fn missing_archive_is_a_status_error() {
        let origin = Origin::new("hum", vec![], vec![0], true);
        let mut transport = RemoteTransport::new(&origin.url, "mon", RemoteOptions::default());

        assert!(matches!(
            transport.fetch_index(),
            Err(TransportError::Status(404))
        ));
    }

    #[test]
    fn unreachable_origin_is_a_network_error() {
        // nothing listens on the discard port
        let mut transport =
            RemoteTransport::new("http://127.0.0.1:9", "hum", RemoteOptions::default());

        assert!(matches!(
            transport.fetch_index(),
            Err(TransportError::Network(_))
        ));
    }

    #[test]
    fn mirror_writes_pair_on_completion() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("nested").join("hum.wzx");
        let data_path = dir.path().join("nested").join("hum.wzl");

        let origin = Origin::new("hum", b"index".to_vec(), data_bytes(), true);
        let mut transport = RemoteTransport::new(&origin.url, "hum", RemoteOptions::default())
            .mirror(&index_path, &data_path);

        transport.fetch_index().unwrap();
        assert_eq!(std::fs::read(&index_path).unwrap(), b"index");

        transport.open_data(7).unwrap();
        transport.read_range(100, 4).unwrap();

        // still a part file
        assert!(!data_path.exists());

        transport.close(true).unwrap();

        let mirrored = std::fs::read(&data_path).unwrap();
        assert_eq!(&mirrored[0x2C..0x30], &[7, 0, 0, 0]);
        assert_eq!(&mirrored[100..104], &[100, 101, 102, 103]);
    }

    #[test]
    fn cancelled_mirror_is_not_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("hum.wzl");

        let origin = Origin::new("hum", b"index".to_vec(), data_bytes(), true);
        let mut transport = RemoteTransport::new(&origin.url, "hum", RemoteOptions::default())
            .mirror(dir.path().join("hum.wzx"), &data_path);

        transport.open_data(1).unwrap();
        transport.read_range(64, 4).unwrap();
        transport.close(false).unwrap();

        assert!(!data_path.exists());
    }

    #[test]
    fn rejected_head_means_unknown_length() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("hum.wzl");

        let origin = Origin::with_quirks(
            "hum",
            b"index".to_vec(),
            data_bytes(),
            Quirks {
                reject_head: true,
                ..Default::default()
            },
        );
        let mut transport = RemoteTransport::new(&origin.url, "hum", RemoteOptions::default())
            .mirror(dir.path().join("hum.wzx"), &data_path);

        assert_eq!(transport.open_data(2).unwrap(), 0);
        assert_eq!(transport.read_range(64, 2).unwrap(), vec![64, 65]);

        transport.close(true).unwrap();

        let mirrored = std::fs::read(&data_path).unwrap();
        assert_eq!(&mirrored[0x2C..0x30], &[2, 0, 0, 0]);
        assert_eq!(&mirrored[64..66], &[64, 65]);
    }

    #[test]
    fn header_without_content_length() {
        // no known length: tiny_http answers chunked, without Content-Length
        let server = Server::http("127.0.0.1:0").unwrap();
        let url = format!("http://{}", server.server_addr().to_ip().unwrap());

        let handle = thread::spawn(move || {
            let request = server.recv().unwrap();
            let body = Cursor::new(Vec::<u8>::new());
            let response = Response::new(StatusCode(200), vec![], body, None, None);
            let _ = request.respond(response);
        });

        let mut transport = RemoteTransport::new(&url, "hum", RemoteOptions::default());
        assert_eq!(transport.open_data(1).unwrap(), 0);

        handle.join().unwrap();
    }
}
