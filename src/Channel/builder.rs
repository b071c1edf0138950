use std::sync::Arc;
use std::time::Duration;

use super::agent::AgentEndpoint;
use super::control::{ControlChannel, ControlSignals};
use super::results::{ResultsChannel, ResultsRegion, ResultsSignals};
use crate::Core::error::Result;
use crate::Core::{attach_shared_memory, create_shared_memory, HeapSharedMemory, SharedMemoryBackend};
use crate::Protocol::coordinator::{ChannelCoordinator, TimeoutPolicy};
use crate::Protocol::dispatcher::{InstrumentationDecision, MessageDispatcher};
use crate::Wire::layout::{control_region_size, results_data_offset, results_region_size};

pub const DEFAULT_NAME_PREFIX: &str = "covershm";
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the host owns once its regions exist.
pub struct HostEndpoint<D> {
    pub coordinator: ChannelCoordinator<D>,
    pub results: ResultsChannel,
}

pub struct ChannelBuilder {
    pid: u32,
    name_prefix: String,
    buffer_size: usize,
    timeout: Duration,
    timeout_policy: TimeoutPolicy,
    poll_interval: Duration,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            pid: std::process::id(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE, // 8191 visits per batch
            timeout: DEFAULT_TIMEOUT,
            timeout_policy: TimeoutPolicy::default(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process id of the monitored process; part of both region names.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Size of the results batch buffer in bytes. Host side only; the agent
    /// reads it from the region header.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn control_region_name(&self) -> String {
        format!("{}_{}_control", self.name_prefix, self.pid)
    }

    pub fn results_region_name(&self) -> String {
        format!("{}_{}_results", self.name_prefix, self.pid)
    }

    /// Create both named regions under /dev/shm and the host endpoints over them.
    ///
    /// The regions are unlinked when the returned endpoints are dropped.
    pub fn build_host<D: InstrumentationDecision>(self, decision: D) -> Result<HostEndpoint<D>> {
        let control_name = self.control_region_name();
        let results_name = self.results_region_name();

        let control_region: Arc<dyn SharedMemoryBackend> =
            Arc::from(create_shared_memory(control_region_size(), &control_name)?);
        let control_signals = ControlSignals::in_region(&control_region)?;
        let control = ControlChannel::create(control_region, control_signals)?;

        let results_region: Arc<dyn SharedMemoryBackend> = Arc::from(create_shared_memory(
            results_region_size(self.buffer_size),
            &results_name,
        )?);
        let results_signals = ResultsSignals::in_region(&results_region)?;
        let results = ResultsRegion::create(results_region, self.buffer_size, results_signals)?;

        log::info!(
            "host regions ready: {} and {} ({}-byte batches)",
            control_name,
            results_name,
            self.buffer_size
        );
        Ok(self.host_endpoint(control, results, decision))
    }

    /// Map the regions a host created for this pid.
    pub fn build_agent(self) -> Result<AgentEndpoint> {
        let control_name = self.control_region_name();
        let results_name = self.results_region_name();

        let control_region: Arc<dyn SharedMemoryBackend> =
            Arc::from(attach_shared_memory(&control_name, control_region_size())?);
        let control_signals = ControlSignals::in_region(&control_region)?;
        let control = ControlChannel::attach(control_region, control_signals)?;

        let results_region: Arc<dyn SharedMemoryBackend> =
            Arc::from(attach_shared_memory(&results_name, results_data_offset())?);
        let results_signals = ResultsSignals::in_region(&results_region)?;
        let results = ResultsRegion::attach(results_region, results_signals)?;

        log::info!("agent attached to {} and {}", control_name, results_name);
        Ok(AgentEndpoint::new(control, results, self.timeout))
    }

    /// Both endpoints over heap regions with in-process signals, for a host
    /// and agent sharing one address space.
    pub fn build_in_process<D: InstrumentationDecision>(
        self,
        decision: D,
    ) -> Result<(HostEndpoint<D>, AgentEndpoint)> {
        let control_region: Arc<dyn SharedMemoryBackend> =
            Arc::new(HeapSharedMemory::new(control_region_size())?);
        let control_signals = ControlSignals::local();
        let host_control = ControlChannel::create(Arc::clone(&control_region), control_signals.clone())?;
        let agent_control = ControlChannel::attach(control_region, control_signals)?;

        let results_region: Arc<dyn SharedMemoryBackend> =
            Arc::new(HeapSharedMemory::new(results_region_size(self.buffer_size))?);
        let results_signals = ResultsSignals::local();
        let host_results = ResultsRegion::create(
            Arc::clone(&results_region),
            self.buffer_size,
            results_signals.clone(),
        )?;
        let agent_results = ResultsRegion::attach(results_region, results_signals)?;

        let agent = AgentEndpoint::new(agent_control, agent_results, self.timeout);
        Ok((self.host_endpoint(host_control, host_results, decision), agent))
    }

    fn host_endpoint<D: InstrumentationDecision>(
        &self,
        control: ControlChannel,
        results: ResultsRegion,
        decision: D,
    ) -> HostEndpoint<D> {
        let coordinator = ChannelCoordinator::new(
            control,
            MessageDispatcher::new(decision),
            self.timeout,
            self.timeout_policy,
        )
        .with_poll_interval(self.poll_interval);
        HostEndpoint {
            coordinator,
            results: ResultsChannel::new(results),
        }
    }
}
