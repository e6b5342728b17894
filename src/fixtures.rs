//! Synthetic archives and a small HTTP origin serving them.
use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use byte_writer::ByteWriter;
use flate2::{write::ZlibEncoder, Compression};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use wzl::constants::{DATA_HEADER_LENGTH, DATA_SLOT_COUNT_OFFSET, INDEX_HEADER_LENGTH};

use crate::transport::archive_paths;

pub fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(vec![], Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Header plus payload of one slot, as stored in the data file.
pub fn sprite_record(
    color_bits: u8,
    width: i16,
    height: i16,
    payload: &[u8],
    compressed: bool,
) -> Vec<u8> {
    let mut writer = ByteWriter::new();

    writer.append_u8(color_bits);
    writer.append_u8(compressed as u8);
    writer.append_u16(0);
    writer.append_i16(width);
    writer.append_i16(height);
    writer.append_i16(0);
    writer.append_i16(0);
    writer.append_u32(payload.len() as u32);
    writer.append_u8_slice(payload);

    writer.into_bytes()
}

/// Uncompressed 8-bit sprite with every pixel set to palette entry `fill`.
pub fn indexed_sprite(width: i16, height: i16, fill: u8) -> Vec<u8> {
    let stride = (width as usize).div_ceil(4) * 4;

    sprite_record(8, width, height, &vec![fill; stride * height as usize], false)
}

/// Zlib compressed 8-bit sprite, every pixel set to `fill`.
pub fn compressed_sprite(width: i16, height: i16, fill: u8) -> Vec<u8> {
    let stride = (width as usize).div_ceil(4) * 4;

    sprite_record(8, width, height, &zlib(&vec![fill; stride * height as usize]), true)
}

/// Claims to be compressed but is not zlib.
pub fn broken_sprite(width: i16, height: i16) -> Vec<u8> {
    sprite_record(8, width, height, b"not zlib at all", true)
}

/// Lays out slots the way a real archive does: records packed in slot
/// order after the 64 byte data header.
pub struct ArchiveBuilder {
    data: ByteWriter,
    offsets: Vec<u32>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        let mut data = ByteWriter::new();
        data.pad_to(DATA_HEADER_LENGTH);

        Self {
            data,
            offsets: vec![],
        }
    }

    pub fn empty(&mut self) -> &mut Self {
        self.offsets.push(0);
        self
    }

    pub fn record(&mut self, record: &[u8]) -> &mut Self {
        self.offsets.push(self.data.get_offset() as u32);
        self.data.append_u8_slice(record);
        self
    }

    pub fn index_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();

        writer.append_zeroes(INDEX_HEADER_LENGTH);
        writer.append_u32(self.offsets.len() as u32);
        self.offsets.iter().for_each(|&offset| writer.append_u32(offset));

        writer.into_bytes()
    }

    pub fn data_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.data.get_offset());

        writer.append_u8_slice(&self.data.data);
        writer.replace_with_u32(DATA_SLOT_COUNT_OFFSET, self.offsets.len() as u32);

        writer.into_bytes()
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        let (index_path, data_path) = archive_paths(dir, name);

        std::fs::write(&index_path, self.index_bytes()).unwrap();
        std::fs::write(&data_path, self.data_bytes()).unwrap();

        (index_path, data_path)
    }
}

/// `bytes=a-b`
fn parse_range(value: &str) -> Option<(usize, usize)> {
    let (start, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;

    Some((start.parse().ok()?, end.parse().ok()?))
}

fn status(code: u16) -> Response<Cursor<Vec<u8>>> {
    Response::from_data(Vec::<u8>::new()).with_status_code(StatusCode(code))
}

/// Ways an origin misbehaves.
#[derive(Debug, Clone, Copy)]
pub struct Quirks {
    pub honour_range: bool,
    /// The first `failures` requests of any kind get 503.
    pub failures: usize,
    /// HEAD gets 405.
    pub reject_head: bool,
    /// The first `range_failures` ranged GETs get 503.
    pub range_failures: usize,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            honour_range: true,
            failures: 0,
            reject_head: false,
            range_failures: 0,
        }
    }
}

struct Files {
    index_path: String,
    data_path: String,
    index: Vec<u8>,
    data: Vec<u8>,
    quirks: Quirks,
}

impl Files {
    fn respond(&mut self, request: &Request) -> Response<Cursor<Vec<u8>>> {
        let url = request.url();

        if url == self.index_path && request.method() == &Method::Get {
            return Response::from_data(self.index.clone());
        }

        if url != self.data_path {
            return status(404);
        }

        if self.quirks.reject_head && request.method() == &Method::Head {
            return status(405);
        }

        let range = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Range"))
            .and_then(|header| parse_range(header.value.as_str()));

        if range.is_some() && self.quirks.range_failures > 0 {
            self.quirks.range_failures -= 1;
            return status(503);
        }

        match range {
            Some((start, end)) if self.quirks.honour_range && request.method() == &Method::Get => {
                if start >= self.data.len() {
                    return status(416);
                }

                let end = end.min(self.data.len() - 1);
                let content_range = format!("bytes {start}-{end}/{}", self.data.len());

                Response::from_data(self.data[start..=end].to_vec())
                    .with_status_code(StatusCode(206))
                    .with_header(
                        Header::from_bytes(&b"Content-Range"[..], content_range.into_bytes())
                            .unwrap(),
                    )
            }
            // HEAD keeps the Content-Length and drops the body
            _ => Response::from_data(self.data.clone()),
        }
    }
}

/// Serves `/data/<name>.wzx` and `/data/<name>.wzl` on a random local port.
pub struct Origin {
    pub url: String,
    server: Arc<Server>,
    requests: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl Origin {
    pub fn new(name: &str, index: Vec<u8>, data: Vec<u8>, honour_range: bool) -> Self {
        Self::with_quirks(
            name,
            index,
            data,
            Quirks {
                honour_range,
                ..Default::default()
            },
        )
    }

    /// The first `failures` requests are answered with 503.
    pub fn with_failures(
        name: &str,
        index: Vec<u8>,
        data: Vec<u8>,
        honour_range: bool,
        failures: usize,
    ) -> Self {
        Self::with_quirks(
            name,
            index,
            data,
            Quirks {
                honour_range,
                failures,
                ..Default::default()
            },
        )
    }

    pub fn with_quirks(name: &str, index: Vec<u8>, data: Vec<u8>, quirks: Quirks) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let url = format!("http://{}", server.server_addr().to_ip().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));

        let mut files = Files {
            index_path: format!("/data/{name}.wzx"),
            data_path: format!("/data/{name}.wzl"),
            index,
            data,
            quirks,
        };

        let handle = {
            let server = server.clone();
            let requests = requests.clone();

            thread::spawn(move || {
                for request in server.incoming_requests() {
                    let seen = requests.fetch_add(1, Ordering::SeqCst);

                    let response = if seen < files.quirks.failures {
                        status(503)
                    } else {
                        files.respond(&request)
                    };

                    let _ = request.respond(response);
                }
            })
        };

        Self {
            url,
            server,
            requests,
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for Origin {
    fn drop(&mut self) {
        self.server.unblock();

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ranges() {
        assert_eq!(parse_range("bytes=0-63"), Some((0, 63)));
        assert_eq!(parse_range("bytes=10-"), None);
        assert_eq!(parse_range("items=0-1"), None);
    }

    #[test]
    fn builder_layout() {
        let mut builder = ArchiveBuilder::new();
        builder.empty().record(&indexed_sprite(2, 2, 0)).empty();

        let index = wzl::ArchiveIndex::from_bytes(&builder.index_bytes()).unwrap();
        assert_eq!(index.offsets(), &[0, 64, 0]);

        let data = builder.data_bytes();
        assert_eq!(&data[0x2C..0x30], &[3, 0, 0, 0]);
        // header plus two rows of four
        assert_eq!(data.len(), 64 + 16 + 8);
    }
}
