use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError, TryRecvError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use wzl::{constants::SPRITE_HEADER_LENGTH, ArchiveIndex, Sprite, SpriteHeader, SpriteRecord};

use super::{
    schedule::Schedule, CancelToken, Command, EventSink, LoaderError, LoaderEvent, LoaderOptions,
};
use crate::{
    retry::Backoff,
    transport::{Transport, TransportError, TransportKind},
};

// once the Loader is dropped nothing can wake us, so sleep in steps
const DETACHED_POLL: Duration = Duration::from_millis(50);

enum Stop {
    Cancelled,
    Failed(LoaderError),
}

/// Everything the background thread owns.
pub(super) struct Worker {
    archive: String,
    transport: Box<dyn Transport>,
    options: LoaderOptions,
    sink: EventSink,
    commands: Receiver<Command>,
    cancel: Arc<CancelToken>,
    finished: Arc<AtomicBool>,
    priority: VecDeque<usize>,
    detached: bool,
}

impl Worker {
    pub fn new(
        archive: String,
        transport: Box<dyn Transport>,
        options: LoaderOptions,
        sink: EventSink,
        commands: Receiver<Command>,
        cancel: Arc<CancelToken>,
        finished: Arc<AtomicBool>,
    ) -> Self {
        Self {
            archive,
            transport,
            options,
            sink,
            commands,
            cancel,
            finished,
            priority: VecDeque::new(),
            detached: false,
        }
    }

    pub fn run(mut self) {
        match self.stream() {
            Ok(()) => self.complete(),
            Err(Stop::Cancelled) => {
                info!("Loading {} cancelled", self.archive);
                self.close(false);
            }
            Err(Stop::Failed(reason)) => {
                error!("Loading {} failed: {reason}", self.archive);
                self.close(false);

                let archive = self.archive.clone();
                let sink = &mut self.sink;

                self.cancel
                    .unless_cancelled(|| sink(LoaderEvent::ArchiveFailed { archive, reason }));
            }
        }

        self.finished.store(true, Ordering::SeqCst);
    }

    fn complete(&mut self) {
        if self.cancel.is_cancelled() {
            self.close(false);
            return;
        }

        self.close(true);

        let archive = self.archive.clone();
        let sink = &mut self.sink;

        if self
            .cancel
            .unless_cancelled(|| sink(LoaderEvent::ArchiveLoaded { archive }))
        {
            info!("Loaded {}", self.archive);
        }
    }

    fn close(&mut self, completed: bool) {
        if let Err(err) = self.transport.close(completed) {
            warn!("Cannot close {}: {err}", self.transport.describe());
        }
    }

    fn emit(&mut self, slot: usize, sprite: Sprite) {
        (self.sink)(LoaderEvent::SpriteLoaded {
            archive: self.archive.clone(),
            slot,
            sprite,
        });
    }

    /// Moves queued commands into the priority queue without blocking.
    fn collect_commands(&mut self) {
        while !self.detached {
            match self.commands.try_recv() {
                Ok(Command::Priority(slot)) => self.priority.push_back(slot),
                Ok(Command::Wake) => (),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.detached = true,
            }
        }
    }

    fn check(&mut self) -> Result<(), Stop> {
        if self.cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }

        self.collect_commands();

        Ok(())
    }

    /// Sleeps up to `timeout` while still taking commands. With
    /// `until_priority` a priority request ends the wait early and true is
    /// returned.
    fn wait(&mut self, timeout: Duration, until_priority: bool) -> Result<bool, Stop> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Stop::Cancelled);
            }

            let now = Instant::now();

            if now >= deadline {
                return Ok(false);
            }

            let remaining = deadline - now;

            if self.detached {
                thread::sleep(remaining.min(DETACHED_POLL));
                continue;
            }

            match self.commands.recv_timeout(remaining) {
                Ok(Command::Priority(slot)) => {
                    self.priority.push_back(slot);

                    if until_priority {
                        return Ok(true);
                    }
                }
                Ok(Command::Wake) => (),
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => self.detached = true,
            }
        }
    }

    fn retry(&mut self, backoff: &mut Backoff, reason: String) -> Result<(), Stop> {
        match backoff.failure() {
            Some(delay) => {
                debug!("Retrying {} in {delay:?}", self.archive);
                self.wait(delay, false).map(|_| ())
            }
            None => Err(Stop::Failed(LoaderError::RetriesExhausted {
                attempts: backoff.failures(),
                last: reason,
            })),
        }
    }

    /// Gets the index and opens the data. Returns the data length, 0 if
    /// unknown.
    fn index(&mut self) -> Result<(ArchiveIndex, u64), Stop> {
        let mut backoff = self.options.retry.backoff();

        let index = loop {
            self.check()?;

            match self.transport.fetch_index() {
                Ok(bytes) => {
                    break ArchiveIndex::from_bytes_normalized(
                        &bytes,
                        self.transport.min_data_offset(),
                    )
                    .map_err(|err| Stop::Failed(err.into()))?;
                }
                Err(err) => {
                    warn!(
                        "Cannot fetch index of {} from {}: {err}",
                        self.archive,
                        self.transport.describe()
                    );
                    self.retry(&mut backoff, err.to_string())?;
                }
            }
        };

        backoff.success();

        let data_length = loop {
            self.check()?;

            match self.transport.open_data(index.slot_count()) {
                Ok(length) => break length,
                Err(err) => {
                    warn!(
                        "Cannot open data of {} at {}: {err}",
                        self.archive,
                        self.transport.describe()
                    );
                    self.retry(&mut backoff, err.to_string())?;
                }
            }
        };

        info!(
            "{} has {} slots, streaming from {}",
            self.archive,
            index.slot_count(),
            self.transport.describe()
        );

        Ok((index, data_length))
    }

    /// First usable priority request. Loaded and unknown slots are dropped.
    fn next_priority(&mut self, schedule: &Schedule) -> Option<usize> {
        while let Some(slot) = self.priority.pop_front() {
            if schedule.wants(slot) {
                return Some(slot);
            }

            debug!("Dropping request for slot {slot} of {}", self.archive);
        }

        None
    }

    fn stream(&mut self) -> Result<(), Stop> {
        let (index, data_length) = self.index()?;

        // read after indexing, a fallback may have switched backends
        let chunk_size = match self.transport.kind() {
            TransportKind::Local => self.options.local_chunk_size,
            TransportKind::Remote => self.options.remote_chunk_size,
        };

        let mut schedule = Schedule::new(index);
        let mut backoff = self.options.retry.backoff();

        loop {
            self.check()?;

            if schedule.is_complete() {
                return Ok(());
            }

            let slot = match self.next_priority(&schedule) {
                Some(slot) => slot,
                None => {
                    let delay = self.options.auto_load_delay;
                    let woken = self.options.on_demand && self.wait(delay, true)?;

                    // a request for a loaded slot still ends the wait
                    let requested = if woken {
                        self.next_priority(&schedule)
                    } else {
                        None
                    };

                    match requested.or_else(|| schedule.next_sequential()) {
                        Some(slot) => slot,
                        None => return Ok(()),
                    }
                }
            };

            if schedule.index().is_empty_slot(slot) {
                schedule.mark_loaded(slot);
                self.emit(slot, Sprite::empty());
                continue;
            }

            match self.load_window(&mut schedule, slot, chunk_size, data_length) {
                Ok(()) if schedule.is_loaded(slot) => backoff.success(),
                Ok(()) => {
                    let reason = if schedule.has_failed(slot) {
                        format!("slot {slot} does not decode")
                    } else {
                        format!("slot {slot} is cut short")
                    };

                    warn!("{reason} in {}", self.archive);
                    self.retry(&mut backoff, reason)?;
                }
                Err(err) => {
                    warn!(
                        "Cannot read slot {slot} of {} from {}: {err}",
                        self.archive,
                        self.transport.describe()
                    );
                    self.retry(&mut backoff, err.to_string())?;
                }
            }
        }
    }

    /// Reads the window starting at `target` and decodes every sprite in it.
    fn load_window(
        &mut self,
        schedule: &mut Schedule,
        target: usize,
        chunk_size: u64,
        data_length: u64,
    ) -> Result<(), TransportError> {
        let Some((start, len)) = schedule.window(target, chunk_size, data_length) else {
            warn!(
                "Slot {target} of {} points past the end of data",
                self.archive
            );
            schedule.mark_failed(target);
            return Ok(());
        };

        let mut window = self.transport.read_range(start, len)?;

        // the target record is read whole even when it outgrows the window
        if window.len() as u64 == len {
            if let Ok(header) = SpriteHeader::parse(&window) {
                let mut needed = (SPRITE_HEADER_LENGTH + header.stored_length()) as u64;

                if data_length != 0 {
                    needed = needed.min(data_length - start);
                }

                if needed > len {
                    let rest = self.transport.read_range(start + len, needed - len)?;
                    window.extend(rest);
                }
            }
        }

        self.unpack(schedule, target, start, &window);

        debug!(
            "Read {} bytes at {start} of {} for slot {target}, {} slots left",
            window.len(),
            self.archive,
            schedule.remaining()
        );

        Ok(())
    }

    /// Walks slots upwards from `target` while their records lie inside the
    /// window. Empty slots met on the way are emitted too.
    fn unpack(&mut self, schedule: &mut Schedule, target: usize, start: u64, window: &[u8]) {
        let end = start + window.len() as u64;

        for slot in target..schedule.slot_count() {
            if self.cancel.is_cancelled() {
                return;
            }

            let offset = schedule.index().offset(slot).unwrap_or(0) as u64;

            if offset == 0 {
                if schedule.mark_loaded(slot) {
                    self.emit(slot, Sprite::empty());
                }

                continue;
            }

            if offset < start || offset >= end {
                break;
            }

            if schedule.is_loaded(slot) {
                continue;
            }

            let Some(record) = SpriteRecord::read(&window[(offset - start) as usize..]) else {
                break;
            };

            match record.decode() {
                Ok(sprite) => {
                    schedule.mark_loaded(slot);
                    self.emit(slot, sprite);
                }
                Err(err) => {
                    warn!("Cannot decode slot {slot} of {}: {err}", self.archive);
                    schedule.mark_failed(slot);
                }
            }
        }
    }
}
