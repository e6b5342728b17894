//! Background streaming of one archive.
//!
//! A [`Loader`] owns one worker thread which indexes the archive, then reads
//! windows of the data file and decodes every sprite inside them. Callers
//! steer it with priority requests and get results as [`LoaderEvent`]s.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::debug;
use wzl::{Sprite, WzlError};

use crate::{retry::RetryPolicy, transport::Transport};

mod schedule;
mod worker;

use worker::Worker;

pub const DEFAULT_LOCAL_CHUNK_SIZE: u64 = 512 * 1024;
pub const DEFAULT_REMOTE_CHUNK_SIZE: u64 = 256 * 1024;
pub const DEFAULT_AUTO_LOAD_DELAY: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Minimum window when reading from disk
    pub local_chunk_size: u64,
    /// Minimum window when reading from an origin
    pub remote_chunk_size: u64,
    /// Wait up to `auto_load_delay` for a priority request before loading
    /// the next slot in order.
    pub on_demand: bool,
    pub auto_load_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            local_chunk_size: DEFAULT_LOCAL_CHUNK_SIZE,
            remote_chunk_size: DEFAULT_REMOTE_CHUNK_SIZE,
            on_demand: false,
            auto_load_delay: DEFAULT_AUTO_LOAD_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Cannot parse index: {source}")]
    Index {
        #[from]
        source: WzlError,
    },
    #[error("Gave up after {attempts} failed attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("Loader is cancelled")]
    Cancelled,
    #[error("Cannot spawn loader thread: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
    #[error("Loader thread panicked")]
    Panicked,
}

#[derive(Debug)]
pub enum LoaderEvent {
    /// Fired once per slot. Empty slots come as [`Sprite::empty`].
    SpriteLoaded {
        archive: String,
        slot: usize,
        sprite: Sprite,
    },
    /// Every slot is loaded. Fired once and last.
    ArchiveLoaded { archive: String },
    /// Nothing more will load. Only with a malformed index or a bounded
    /// retry policy.
    ArchiveFailed { archive: String, reason: LoaderError },
}

impl LoaderEvent {
    pub fn archive(&self) -> &str {
        match self {
            LoaderEvent::SpriteLoaded { archive, .. }
            | LoaderEvent::ArchiveLoaded { archive }
            | LoaderEvent::ArchiveFailed { archive, .. } => archive,
        }
    }
}

pub(crate) enum Command {
    Priority(usize),
    Wake,
}

/// Cancel flag plus a gate held while the final event is emitted, so a
/// cancel that returns first always suppresses it.
#[derive(Default)]
pub(crate) struct CancelToken {
    flag: AtomicBool,
    gate: Mutex<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn cancel(&self) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Runs `f` unless cancelled, with cancel held off until it returns.
    pub fn unless_cancelled(&self, f: impl FnOnce()) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        if self.is_cancelled() {
            return false;
        }

        f();

        true
    }
}

pub type EventSink = Box<dyn FnMut(LoaderEvent) + Send + 'static>;

/// Streams one archive on a background thread.
///
/// Nothing happens until the first [`Loader::load`]. Priority requests made
/// before that are kept and served first.
pub struct Loader {
    archive: String,
    commands: Sender<Command>,
    cancel: Arc<CancelToken>,
    finished: Arc<AtomicBool>,
    worker: Option<Worker>,
    handle: Option<JoinHandle<()>>,
}

impl Loader {
    /// `sink` runs on the worker thread. It must not call [`Loader::cancel`]
    /// on this loader: the final event is emitted with the cancel gate held,
    /// so that call would deadlock.
    pub fn new(
        archive: impl Into<String>,
        transport: impl Transport + 'static,
        options: LoaderOptions,
        sink: impl FnMut(LoaderEvent) + Send + 'static,
    ) -> Self {
        let archive = archive.into();
        let (commands, receiver) = mpsc::channel();
        let cancel = Arc::new(CancelToken::default());
        let finished = Arc::new(AtomicBool::new(false));

        let worker = Worker::new(
            archive.clone(),
            Box::new(transport),
            options,
            Box::new(sink),
            receiver,
            cancel.clone(),
            finished.clone(),
        );

        Self {
            archive,
            commands,
            cancel,
            finished,
            worker: Some(worker),
            handle: None,
        }
    }

    /// Same as [`Loader::new`] with events going into a channel.
    ///
    /// Whoever reads the channel may cancel freely, it is not the worker.
    pub fn with_channel(
        archive: impl Into<String>,
        transport: impl Transport + 'static,
        options: LoaderOptions,
    ) -> (Self, Receiver<LoaderEvent>) {
        let (sender, receiver) = mpsc::channel();

        let loader = Self::new(archive, transport, options, move |event| {
            // receiver gone means nobody listens anymore
            let _ = sender.send(event);
        });

        (loader, receiver)
    }

    pub fn archive(&self) -> &str {
        &self.archive
    }

    /// Queues `slots` and starts the worker if it is not running yet.
    pub fn load(&mut self, slots: &[usize]) -> Result<(), LoaderError> {
        if self.cancel.is_cancelled() {
            return Err(LoaderError::Cancelled);
        }

        self.request_priority(slots);

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let handle = thread::Builder::new()
            .name(format!("wzl-{}", self.archive))
            .spawn(move || worker.run())
            .map_err(|source| LoaderError::Spawn { source })?;

        debug!("Started loader for {}", self.archive);

        self.handle = Some(handle);

        Ok(())
    }

    /// Asks for `slots` to be loaded next, in order. Loaded or unknown slots
    /// are dropped when their turn comes.
    pub fn request_priority(&self, slots: &[usize]) {
        for &slot in slots {
            // worker already gone
            if self.commands.send(Command::Priority(slot)).is_err() {
                return;
            }
        }
    }

    /// Stops the worker. No [`LoaderEvent::ArchiveLoaded`] is fired once this
    /// returns.
    pub fn cancel(&self) {
        if self.cancel.cancel() {
            debug!("Cancelling loader for {}", self.archive);
            let _ = self.commands.send(Command::Wake);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the worker has exited, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Waits for the worker to exit. Returns at once if it never started.
    pub fn join(&mut self) -> Result<(), LoaderError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| LoaderError::Panicked),
            None => Ok(()),
        }
    }
}
