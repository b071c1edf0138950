use crossbeam_utils::CachePadded;
use lazy_static::lazy_static;
use std::sync::atomic::AtomicU32;

use super::marshal::WireRecord;
use super::messages::{
    full_page_size, GetSequencePointsRequest, TrackAssemblyRequest, TrackAssemblyResponse,
    VisitRecord,
};

/// Identifies an initialized control region ("COVER_CT").
pub const CONTROL_MAGIC: u64 = 0x434F_5645_525F_4354;

/// Identifies an initialized results region ("COVER_RS").
pub const RESULTS_MAGIC: u64 = 0x434F_5645_525F_5253;

/// Value of `ResultsHeader::state` after a fault.
pub const RESULTS_FAULTED: u32 = 1;

/// Size of one element of a results batch; the count prefix is charged one
/// element slot when computing a batch length.
pub const VISIT_ELEMENT_SIZE: usize = VisitRecord::SIZE;

/// Byte offset of the first visit record in a results batch.
pub const VISIT_RECORDS_OFFSET: usize = 4;

lazy_static! {
    /// Bytes the host copies out of the control buffer for every request.
    pub static ref READ_SIZE: usize = TrackAssemblyRequest::SIZE.max(GetSequencePointsRequest::SIZE);

    /// Capacity of the control buffer: the largest request, response or full page.
    pub static ref MAX_MSG_SIZE: usize = (*READ_SIZE)
        .max(TrackAssemblyResponse::SIZE)
        .max(full_page_size());
}

/// Gate word serialising control-channel cycles across processes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// No request in flight; an agent may claim the channel.
    Idle = 0,
    /// An agent wrote a request and raised the request signal.
    Requested = 1,
    /// The host is dispatching and publishing response pages.
    Responding = 2,
    /// A peer hit a fatal error or gave up waiting; the channel is dead.
    Faulted = 3,
    /// The host could not answer this request; the agent returns the
    /// channel to `Idle` once it has seen the failure.
    Failed = 4,
}

impl CycleState {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(CycleState::Idle),
            1 => Some(CycleState::Requested),
            2 => Some(CycleState::Responding),
            3 => Some(CycleState::Faulted),
            4 => Some(CycleState::Failed),
            _ => None,
        }
    }
}

/// Header at the start of the control region; the message buffer follows it.
///
/// Each signal word sits on its own cache line so the two processes polling
/// different words do not contend.
#[repr(C, align(128))]
pub struct ControlHeader {
    /// [`CONTROL_MAGIC`] once the host initialized the region.
    pub magic: u64,

    /// Capacity of the message buffer in bytes (`MAX_MSG_SIZE`).
    pub capacity: u32,

    /// Current [`CycleState`].
    pub state: AtomicU32,

    /// Agent -> host: a request is waiting in the buffer.
    pub requested: CachePadded<AtomicU32>,

    /// Host -> agent: a response page is waiting in the buffer.
    pub response_ready: CachePadded<AtomicU32>,

    /// Agent -> host: the response page was read.
    pub response_consumed: CachePadded<AtomicU32>,
}

/// Header at the start of the results region; the batch buffer follows it.
#[repr(C, align(128))]
pub struct ResultsHeader {
    /// [`RESULTS_MAGIC`] once the host initialized the region.
    pub magic: u64,

    /// Capacity of the batch buffer in bytes, negotiated by the host.
    pub buffer_size: u32,

    /// Zero while live; [`RESULTS_FAULTED`] once either side gave up.
    pub state: AtomicU32,

    /// Agent -> host: a batch is waiting in the buffer.
    pub results_ready: CachePadded<AtomicU32>,

    /// Host -> agent: the batch was drained.
    pub results_consumed: CachePadded<AtomicU32>,
}

/// Offset of the control message buffer within its region.
pub fn control_data_offset() -> usize {
    std::mem::size_of::<ControlHeader>()
}

/// Total size of a control region.
pub fn control_region_size() -> usize {
    control_data_offset() + *MAX_MSG_SIZE
}

/// Offset of the results batch buffer within its region.
pub fn results_data_offset() -> usize {
    std::mem::size_of::<ResultsHeader>()
}

/// Total size of a results region holding `buffer_size` batch bytes.
pub fn results_region_size(buffer_size: usize) -> usize {
    results_data_offset() + buffer_size
}
