use std::mem::offset_of;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;

use crate::Core::error::{ChannelError, Result};
use crate::Core::signal::{FutexSignal, LocalSignal, Signal};
use crate::Core::{SharedBuffer, SharedMemoryBackend};
use crate::Wire::layout::{
    results_data_offset, results_region_size, ResultsHeader, RESULTS_FAULTED, RESULTS_MAGIC,
    VISIT_ELEMENT_SIZE, VISIT_RECORDS_OFFSET,
};
use crate::Wire::marshal::{self, get_u32};
use crate::Wire::messages::VisitRecord;

/// Smallest usable batch buffer: the count slot plus one record.
pub const MIN_BUFFER_SIZE: usize = 2 * VISIT_ELEMENT_SIZE;

/// The two events of the results channel.
#[derive(Clone)]
pub struct ResultsSignals {
    pub results_ready: Arc<dyn Signal>,
    pub results_consumed: Arc<dyn Signal>,
}

impl ResultsSignals {
    pub fn in_region(region: &Arc<dyn SharedMemoryBackend>) -> Result<Self> {
        let ready: Arc<dyn Signal> = Arc::new(FutexSignal::new(
            Arc::clone(region),
            offset_of!(ResultsHeader, results_ready),
        )?);
        let consumed: Arc<dyn Signal> = Arc::new(FutexSignal::new(
            Arc::clone(region),
            offset_of!(ResultsHeader, results_consumed),
        )?);
        Ok(Self {
            results_ready: ready,
            results_consumed: consumed,
        })
    }

    pub fn local() -> Self {
        Self {
            results_ready: Arc::new(LocalSignal::new()),
            results_consumed: Arc::new(LocalSignal::new()),
        }
    }
}

/// View of a results region shared by the host and the agent.
pub struct ResultsRegion {
    region: Arc<dyn SharedMemoryBackend>,
    buffer: SharedBuffer,
    signals: ResultsSignals,
}

impl ResultsRegion {
    /// Initialize a fresh region with a batch buffer of `buffer_size` bytes. Host side.
    pub fn create(
        region: Arc<dyn SharedMemoryBackend>,
        buffer_size: usize,
        signals: ResultsSignals,
    ) -> Result<Self> {
        let needed = results_region_size(buffer_size);
        if buffer_size < MIN_BUFFER_SIZE || buffer_size > u32::MAX as usize || region.size() < needed {
            return Err(ChannelError::Overrun {
                offset: 0,
                needed,
                capacity: region.size(),
            });
        }

        unsafe {
            std::ptr::write(
                region.as_ptr() as *mut ResultsHeader,
                ResultsHeader {
                    magic: RESULTS_MAGIC,
                    buffer_size: buffer_size as u32,
                    state: AtomicU32::new(0),
                    results_ready: CachePadded::new(AtomicU32::new(0)),
                    results_consumed: CachePadded::new(AtomicU32::new(0)),
                },
            );
        }

        let buffer = SharedBuffer::new(Arc::clone(&region), results_data_offset(), buffer_size)?;
        Ok(Self {
            region,
            buffer,
            signals,
        })
    }

    /// Bind to an initialized region; the buffer size comes from its header. Agent side.
    pub fn attach(region: Arc<dyn SharedMemoryBackend>, signals: ResultsSignals) -> Result<Self> {
        if region.size() < results_data_offset() {
            return Err(ChannelError::BadRegion("results"));
        }
        let header = unsafe { &*(region.as_ptr() as *const ResultsHeader) };
        let buffer_size = header.buffer_size as usize;
        if header.magic != RESULTS_MAGIC
            || buffer_size < MIN_BUFFER_SIZE
            || region.size() < results_region_size(buffer_size)
        {
            return Err(ChannelError::BadRegion("results"));
        }

        let buffer = SharedBuffer::new(Arc::clone(&region), results_data_offset(), buffer_size)?;
        Ok(Self {
            region,
            buffer,
            signals,
        })
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn signals(&self) -> &ResultsSignals {
        &self.signals
    }

    pub fn region(&self) -> &Arc<dyn SharedMemoryBackend> {
        &self.region
    }

    fn header(&self) -> &ResultsHeader {
        unsafe { &*(self.region.as_ptr() as *const ResultsHeader) }
    }

    /// Mark the results channel dead and wake both sides.
    ///
    /// Called by the agent when the host never drained a batch, and by the
    /// host on a malformed batch. Nothing is written to the buffer afterwards.
    pub fn fault(&self) {
        self.header().state.store(RESULTS_FAULTED, Ordering::Release);
        for signal in [&self.signals.results_ready, &self.signals.results_consumed] {
            if let Err(e) = signal.signal() {
                log::error!("failed to wake peer after results fault: {}", e);
            }
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.header().state.load(Ordering::Acquire) == RESULTS_FAULTED
    }

    /// Largest number of visit records one batch may carry.
    pub fn max_batch_records(&self) -> usize {
        self.buffer_size() / VISIT_ELEMENT_SIZE - 1
    }
}

/// Length of a batch of `count` records as both peers compute it.
///
/// The count prefix is charged a whole element slot, so a batch is four bytes
/// longer than the records it carries. Peers rely on this exact figure.
pub fn batch_len(count: u32) -> Option<usize> {
    (count as usize)
        .checked_add(1)?
        .checked_mul(VISIT_ELEMENT_SIZE)
}

/// Host end of the results channel.
///
/// Holds one scratch buffer of `BufferSize` bytes that every extraction reuses.
pub struct ResultsChannel {
    region: ResultsRegion,
    scratch: Box<[u8]>,
}

impl ResultsChannel {
    pub fn new(region: ResultsRegion) -> Self {
        let scratch = vec![0u8; region.buffer_size()].into_boxed_slice();
        Self { region, scratch }
    }

    pub fn region(&self) -> &ResultsRegion {
        &self.region
    }

    pub fn buffer_size(&self) -> usize {
        self.region.buffer_size()
    }

    /// Block until the agent publishes a batch. Returns `false` on timeout.
    pub fn wait_ready(&self, timeout: Duration) -> Result<bool> {
        Ok(self.region.signals.results_ready.wait_timeout(timeout)?)
    }

    /// Drain the batch the agent published.
    ///
    /// Returns the first `(N + 1) * 8` bytes of the buffer, where `N` is the
    /// count in its first four bytes. The slice borrows the scratch buffer and
    /// stays valid until the next extraction.
    pub fn extract_batch(&mut self) -> Result<&[u8]> {
        if self.region.is_faulted() {
            return Err(ChannelError::ChannelFaulted);
        }
        self.region.signals.results_ready.reset();
        self.region.buffer.read_into(&mut self.scratch)?;

        let count = get_u32(&self.scratch, 0);
        let len = match batch_len(count).filter(|&len| len <= self.scratch.len()) {
            Some(len) => len,
            None => {
                log::error!("visit batch of {} records overruns the buffer", count);
                self.region.fault();
                return Err(ChannelError::BatchOverrun {
                    count,
                    capacity: self.scratch.len(),
                });
            }
        };

        self.region.signals.results_consumed.signal()?;
        log::trace!("drained visit batch of {} records ({} bytes)", count, len);
        Ok(&self.scratch[..len])
    }

    /// Wait up to `timeout` for a batch and drain it; `None` when none arrived.
    pub fn receive_batch(&mut self, timeout: Duration) -> Result<Option<&[u8]>> {
        if !self.wait_ready(timeout)? {
            log::trace!("no visit batch within {:?}", timeout);
            return Ok(None);
        }
        self.extract_batch().map(Some)
    }

    /// Drain batches into `sink` until `shutdown` is set. Returns the number of
    /// batches delivered.
    pub fn run<F>(&mut self, shutdown: &AtomicBool, poll_interval: Duration, mut sink: F) -> Result<u64>
    where
        F: FnMut(VisitBatch<'_>) -> Result<()>,
    {
        let mut batches = 0u64;
        while !shutdown.load(Ordering::Acquire) {
            if let Some(bytes) = self.receive_batch(poll_interval)? {
                sink(VisitBatch::parse(bytes)?)?;
                batches += 1;
            }
        }
        log::debug!("results channel stopped after {} batches", batches);
        Ok(batches)
    }
}

/// Read-only view over an extracted batch.
#[derive(Debug, Clone, Copy)]
pub struct VisitBatch<'a> {
    bytes: &'a [u8],
    count: u32,
}

impl<'a> VisitBatch<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let count = bytes
            .get(0..4)
            .map(|raw| get_u32(raw, 0))
            .ok_or(ChannelError::Overrun {
                offset: 0,
                needed: 4,
                capacity: bytes.len(),
            })?;
        let records_end = (count as usize)
            .checked_mul(VISIT_ELEMENT_SIZE)
            .and_then(|len| len.checked_add(VISIT_RECORDS_OFFSET));
        match records_end {
            Some(end) if end <= bytes.len() => Ok(Self { bytes, count }),
            _ => Err(ChannelError::BatchOverrun {
                count,
                capacity: bytes.len(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<VisitRecord>> + 'a {
        let bytes = self.bytes;
        (0..self.count as usize)
            .map(move |i| marshal::read(bytes, VISIT_RECORDS_OFFSET + i * VISIT_ELEMENT_SIZE))
    }

    pub fn to_vec(&self) -> Result<Vec<VisitRecord>> {
        self.iter().collect()
    }
}
