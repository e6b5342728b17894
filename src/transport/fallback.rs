use log::{info, warn};

use super::{Transport, TransportError, TransportKind};

/// Uses `primary` until it fails to produce the index or open the data, then
/// `secondary` for the rest of its life.
pub struct Fallback<A, B> {
    primary: A,
    secondary: B,
    switched: bool,
}

impl<A: Transport, B: Transport> Fallback<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self {
            primary,
            secondary,
            switched: false,
        }
    }

    pub fn is_switched(&self) -> bool {
        self.switched
    }

    fn active(&self) -> &dyn Transport {
        if self.switched {
            &self.secondary
        } else {
            &self.primary
        }
    }

    fn active_mut(&mut self) -> &mut dyn Transport {
        if self.switched {
            &mut self.secondary
        } else {
            &mut self.primary
        }
    }

    fn switch(&mut self, err: &TransportError) {
        warn!(
            "{} unusable ({err}), switching to {}",
            self.primary.describe(),
            self.secondary.describe()
        );

        if let Err(err) = self.primary.close(false) {
            warn!("Cannot close {}: {err}", self.primary.describe());
        }

        self.switched = true;
    }
}

impl<A: Transport, B: Transport> Transport for Fallback<A, B> {
    fn kind(&self) -> TransportKind {
        self.active().kind()
    }

    fn describe(&self) -> String {
        self.active().describe()
    }

    fn min_data_offset(&self) -> u32 {
        self.active().min_data_offset()
    }

    fn fetch_index(&mut self) -> Result<Vec<u8>, TransportError> {
        if !self.switched {
            match self.primary.fetch_index() {
                Ok(bytes) => return Ok(bytes),
                Err(err) => self.switch(&err),
            }
        }

        self.secondary.fetch_index()
    }

    fn open_data(&mut self, slot_count: usize) -> Result<u64, TransportError> {
        if !self.switched {
            match self.primary.open_data(slot_count) {
                Ok(length) => return Ok(length),
                Err(err) => self.switch(&err),
            }

            info!("Index came from disk, data comes from {}", self.secondary.describe());
        }

        self.secondary.open_data(slot_count)
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, TransportError> {
        self.active_mut().read_range(offset, len)
    }

    fn close(&mut self, completed: bool) -> Result<(), TransportError> {
        self.active_mut().close(completed)
    }
}
