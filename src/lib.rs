// Module naming follows project convention (Core = shared memory and signalling primitives)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Wire;
#[allow(non_snake_case)]
pub mod Channel;
#[allow(non_snake_case)]
pub mod Protocol;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}
pub mod ffi;

pub use Channel::{AgentEndpoint, ChannelBuilder, HostEndpoint, ResultsChannel, VisitBatch};
pub use Core::{ChannelError, Result};
pub use Protocol::{ChannelCoordinator, InstrumentationDecision, MessageDispatcher, TimeoutPolicy};
pub use Wire::{SequencePointRecord, VisitKind, VisitRecord};
