use std::fmt;

use crate::Channel::{AgentEndpoint, ControlChannel, ResultsChannel, ResultsRegion};
use crate::Core::SharedBuffer;
use crate::Protocol::ChannelCoordinator;

/// Debug function for SharedBuffer
///
/// Shows the window location without touching its contents
pub fn debug_shared_buffer(buffer: &SharedBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedBuffer")
        .field("region", &format_args!("{:p}", buffer.region().as_ptr()))
        .field("capacity", &buffer.capacity())
        .finish_non_exhaustive()
}

/// Debug function for ControlChannel
///
/// Shows:
/// - Region handle and size
/// - Cycle state, decoded when valid
/// - Which signals are currently raised
pub fn debug_control_channel(channel: &ControlChannel, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let signals = channel.signals();
    f.debug_struct("ControlChannel")
        .field("region", &channel.region().raw_handle())
        .field("size", &channel.region().size())
        .field("state", &channel.state().ok_or(channel.raw_state()))
        .field("requested", &signals.requested.is_signaled())
        .field("response_ready", &signals.response_ready.is_signaled())
        .field("response_consumed", &signals.response_consumed.is_signaled())
        .finish()
}

pub fn debug_results_region(region: &ResultsRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let signals = region.signals();
    f.debug_struct("ResultsRegion")
        .field("region", &region.region().raw_handle())
        .field("buffer_size", &region.buffer_size())
        .field("results_ready", &signals.results_ready.is_signaled())
        .field("results_consumed", &signals.results_consumed.is_signaled())
        .finish()
}

pub fn debug_results_channel(channel: &ResultsChannel, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResultsChannel")
        .field("region", channel.region())
        .field("scratch", &"<opaque>")
        .finish()
}

pub fn debug_agent_endpoint(agent: &AgentEndpoint, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AgentEndpoint")
        .field("control", agent.control())
        .field("results", agent.results())
        .field("timeout", &agent.timeout())
        .finish_non_exhaustive()
}

pub fn debug_channel_coordinator<D>(
    coordinator: &ChannelCoordinator<D>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("ChannelCoordinator")
        .field("control", coordinator.control())
        .field("timeout", &coordinator.timeout())
        .field("policy", &coordinator.policy())
        .finish_non_exhaustive()
}
