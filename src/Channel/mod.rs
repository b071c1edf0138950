pub mod agent;
pub mod builder;
pub mod control;
mod debug;
pub mod results;

pub use agent::AgentEndpoint;
pub use builder::{ChannelBuilder, HostEndpoint};
pub use control::{ControlChannel, ControlSignals};
pub use results::{batch_len, ResultsChannel, ResultsRegion, ResultsSignals, VisitBatch, MIN_BUFFER_SIZE};
