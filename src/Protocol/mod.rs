pub mod coordinator;
pub mod dispatcher;

pub use coordinator::{ChannelCoordinator, CycleReport, TimeoutPolicy};
pub use dispatcher::{InstrumentationDecision, MessageDispatcher};
