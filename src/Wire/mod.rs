pub mod layout;
pub mod marshal;
pub mod messages;

pub use layout::{CycleState, ControlHeader, ResultsHeader, MAX_MSG_SIZE, READ_SIZE};
pub use marshal::{read, write, WireRecord, FIXED_STRING_UNITS};
pub use messages::{
    GetSequencePointsRequest, GetSequencePointsResponse, MessageType, Request,
    SequencePointRecord, TrackAssemblyRequest, TrackAssemblyResponse, VisitKind, VisitRecord,
    PAGE_CAPACITY,
};
