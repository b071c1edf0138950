use std::fmt;

use super::{AgentEndpoint, ControlChannel, ResultsChannel, ResultsRegion};
use crate::Core::SharedBuffer;
use crate::Protocol::ChannelCoordinator;

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_shared_buffer(self, f)
    }
}

impl fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_control_channel(self, f)
    }
}

impl fmt::Debug for ResultsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_results_region(self, f)
    }
}

impl fmt::Debug for ResultsChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_results_channel(self, f)
    }
}

impl fmt::Debug for AgentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_agent_endpoint(self, f)
    }
}

impl<D> fmt::Debug for ChannelCoordinator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_channel_coordinator(self, f)
    }
}
