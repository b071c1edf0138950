use std::mem::offset_of;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::Core::error::{ChannelError, Result};
use crate::Core::signal::{FutexSignal, LocalSignal, Signal};
use crate::Core::{SharedBuffer, SharedMemoryBackend};
use crate::Wire::layout::{
    control_data_offset, control_region_size, ControlHeader, CycleState, CONTROL_MAGIC,
    MAX_MSG_SIZE,
};

/// The three events of the control channel.
#[derive(Clone)]
pub struct ControlSignals {
    pub requested: Arc<dyn Signal>,
    pub response_ready: Arc<dyn Signal>,
    pub response_consumed: Arc<dyn Signal>,
}

impl ControlSignals {
    /// Futex events living in the region header; usable across processes.
    pub fn in_region(region: &Arc<dyn SharedMemoryBackend>) -> Result<Self> {
        let word = |offset: usize| -> Result<Arc<dyn Signal>> {
            let signal: Arc<dyn Signal> = Arc::new(FutexSignal::new(Arc::clone(region), offset)?);
            Ok(signal)
        };
        Ok(Self {
            requested: word(offset_of!(ControlHeader, requested))?,
            response_ready: word(offset_of!(ControlHeader, response_ready))?,
            response_consumed: word(offset_of!(ControlHeader, response_consumed))?,
        })
    }

    /// Condition-variable events for endpoints sharing one process.
    pub fn local() -> Self {
        Self {
            requested: Arc::new(LocalSignal::new()),
            response_ready: Arc::new(LocalSignal::new()),
            response_consumed: Arc::new(LocalSignal::new()),
        }
    }
}

/// View of a control region shared by the host and the agent.
///
/// The region starts with a [`ControlHeader`] followed by a message buffer of
/// `MAX_MSG_SIZE` bytes. Which side may touch the buffer is decided by the
/// signals and the cycle-state word in the header.
pub struct ControlChannel {
    region: Arc<dyn SharedMemoryBackend>,
    buffer: SharedBuffer,
    signals: ControlSignals,
}

impl ControlChannel {
    /// Initialize the header of a fresh region. Host side.
    pub fn create(region: Arc<dyn SharedMemoryBackend>, signals: ControlSignals) -> Result<Self> {
        let needed = control_region_size();
        if region.size() < needed {
            return Err(ChannelError::Overrun {
                offset: 0,
                needed,
                capacity: region.size(),
            });
        }

        unsafe {
            std::ptr::write(
                region.as_ptr() as *mut ControlHeader,
                ControlHeader {
                    magic: CONTROL_MAGIC,
                    capacity: *MAX_MSG_SIZE as u32,
                    state: AtomicU32::new(CycleState::Idle as u32),
                    requested: CachePadded::new(AtomicU32::new(0)),
                    response_ready: CachePadded::new(AtomicU32::new(0)),
                    response_consumed: CachePadded::new(AtomicU32::new(0)),
                },
            );
        }

        let buffer = SharedBuffer::new(Arc::clone(&region), control_data_offset(), *MAX_MSG_SIZE)?;
        Ok(Self {
            region,
            buffer,
            signals,
        })
    }

    /// Bind to a region initialized by [`ControlChannel::create`]. Agent side.
    pub fn attach(region: Arc<dyn SharedMemoryBackend>, signals: ControlSignals) -> Result<Self> {
        if region.size() < control_region_size() {
            return Err(ChannelError::BadRegion("control"));
        }
        let header = unsafe { &*(region.as_ptr() as *const ControlHeader) };
        if header.magic != CONTROL_MAGIC || header.capacity as usize != *MAX_MSG_SIZE {
            return Err(ChannelError::BadRegion("control"));
        }

        let buffer = SharedBuffer::new(Arc::clone(&region), control_data_offset(), *MAX_MSG_SIZE)?;
        Ok(Self {
            region,
            buffer,
            signals,
        })
    }

    fn header(&self) -> &ControlHeader {
        unsafe { &*(self.region.as_ptr() as *const ControlHeader) }
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn signals(&self) -> &ControlSignals {
        &self.signals
    }

    pub fn region(&self) -> &Arc<dyn SharedMemoryBackend> {
        &self.region
    }

    /// Raw value of the cycle-state word.
    pub fn raw_state(&self) -> u32 {
        self.header().state.load(Ordering::Acquire)
    }

    pub fn state(&self) -> Option<CycleState> {
        CycleState::from_raw(self.raw_state())
    }

    fn transition(&self, from: CycleState, to: CycleState) -> std::result::Result<(), u32> {
        self.header()
            .state
            .compare_exchange(from as u32, to as u32, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }

    /// Agent: take the channel for one request.
    ///
    /// Fails with `ChannelBusy` while another request is in flight, so two
    /// requests can never interleave in the buffer.
    pub fn claim(&self) -> Result<()> {
        match self.transition(CycleState::Idle, CycleState::Requested) {
            Ok(()) => Ok(()),
            Err(raw) if raw == CycleState::Faulted as u32 => Err(ChannelError::ChannelFaulted),
            Err(raw) if CycleState::from_raw(raw).is_some() => Err(ChannelError::ChannelBusy),
            Err(raw) => Err(ChannelError::UnexpectedState(raw)),
        }
    }

    /// Host: move a posted request into the responding phase.
    pub fn begin_response(&self) -> Result<()> {
        self.transition(CycleState::Requested, CycleState::Responding)
            .map_err(|raw| match CycleState::from_raw(raw) {
                Some(CycleState::Faulted) => ChannelError::ChannelFaulted,
                _ => ChannelError::UnexpectedState(raw),
            })
    }

    /// Agent: hand the channel back after acknowledging the final page.
    pub fn release(&self) -> Result<()> {
        self.transition(CycleState::Responding, CycleState::Idle)
            .map_err(|raw| match CycleState::from_raw(raw) {
                Some(CycleState::Faulted) => ChannelError::ChannelFaulted,
                _ => ChannelError::UnexpectedState(raw),
            })
    }

    /// Agent: give up a claim whose request was never posted.
    pub fn abandon(&self) {
        let _ = self.transition(CycleState::Requested, CycleState::Idle);
    }

    /// Host: end the current request without a response and wake the agent.
    ///
    /// The channel stays usable; the buffer still holds the request.
    pub fn fail_request(&self) -> Result<()> {
        self.transition(CycleState::Responding, CycleState::Failed)
            .map_err(|raw| match CycleState::from_raw(raw) {
                Some(CycleState::Faulted) => ChannelError::ChannelFaulted,
                _ => ChannelError::UnexpectedState(raw),
            })?;
        Ok(self.signals.response_ready.signal()?)
    }

    /// Agent: acknowledge a failed request and return the channel to `Idle`.
    pub fn clear_failure(&self) -> Result<()> {
        self.transition(CycleState::Failed, CycleState::Idle)
            .map_err(ChannelError::UnexpectedState)
    }

    /// Mark the channel dead and wake whichever side is waiting on a page.
    ///
    /// Either peer may call this; every later claim fails with `ChannelFaulted`.
    pub fn fault(&self) {
        self.header()
            .state
            .store(CycleState::Faulted as u32, Ordering::Release);
        for signal in [&self.signals.response_ready, &self.signals.response_consumed] {
            if let Err(e) = signal.signal() {
                log::error!("failed to wake peer after fault: {}", e);
            }
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.raw_state() == CycleState::Faulted as u32
    }
}
