use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::dispatcher::{InstrumentationDecision, MessageDispatcher};
use crate::Channel::control::ControlChannel;
use crate::Core::error::{ChannelError, Result, WaitPhase};

/// What the host does when the agent does not acknowledge a response page
/// within the wait window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Fail the request with `ChannelTimedOut` and fault the channel.
    #[default]
    Fail,
    /// Log a warning and carry on as if the page had been acknowledged.
    Continue,
}

/// Outcome of one served request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Pages published, including the final (or only) response.
    pub pages: usize,
    /// Size of the final response in bytes.
    pub response_size: usize,
}

/// Host end of the control channel.
///
/// Serves one request per cycle:
/// reset the request signal, copy the request out of the shared buffer,
/// dispatch it, then publish the response page by page, waiting for the
/// agent's acknowledgement after each. Cycles never overlap.
pub struct ChannelCoordinator<D> {
    control: ControlChannel,
    dispatcher: MessageDispatcher<D>,
    scratch: Box<[u8]>,
    timeout: Duration,
    policy: TimeoutPolicy,
    poll_interval: Duration,
}

impl<D> ChannelCoordinator<D> {
    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    pub fn dispatcher(&self) -> &MessageDispatcher<D> {
        &self.dispatcher
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }
}

impl<D: InstrumentationDecision> ChannelCoordinator<D> {
    pub fn new(
        control: ControlChannel,
        dispatcher: MessageDispatcher<D>,
        timeout: Duration,
        policy: TimeoutPolicy,
    ) -> Self {
        Self {
            control,
            dispatcher,
            scratch: vec![0u8; MessageDispatcher::<D>::max_msg_size()].into_boxed_slice(),
            timeout,
            policy,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// How long [`ChannelCoordinator::run`] blocks before re-checking its shutdown flag.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Block until the agent posts a request. Returns `false` on timeout.
    pub fn wait_for_request(&self, timeout: Duration) -> Result<bool> {
        Ok(self.control.signals().requested.wait_timeout(timeout)?)
    }

    /// Serve the posted request.
    ///
    /// A failing [`InstrumentationDecision`] fails only this request: the
    /// agent sees `RequestFailed` and the channel returns to idle. Any other
    /// failure faults the channel: the agent is woken and sees
    /// `ChannelFaulted`, and later requests are refused.
    pub fn process_request(&mut self) -> Result<CycleReport> {
        match self.serve_cycle() {
            Ok(report) => Ok(report),
            Err(e @ ChannelError::Decision(_)) => {
                log::warn!("request failed: {}", e);
                self.control.fail_request()?;
                Err(e)
            }
            Err(e) => {
                log::error!("control channel faulted: {}", e);
                self.control.fault();
                Err(e)
            }
        }
    }

    /// Serve requests until `shutdown` is set or the channel faults.
    ///
    /// Requests the decision could not answer still count as served.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<u64> {
        let mut served = 0u64;
        while !shutdown.load(Ordering::Acquire) {
            if self.wait_for_request(self.poll_interval)? {
                match self.process_request() {
                    Ok(_) | Err(ChannelError::Decision(_)) => served += 1,
                    Err(e) => return Err(e),
                }
            }
        }
        log::debug!("control channel stopped after {} requests", served);
        Ok(served)
    }

    fn serve_cycle(&mut self) -> Result<CycleReport> {
        let Self {
            control,
            dispatcher,
            scratch,
            timeout,
            policy,
            ..
        } = self;

        let signals = control.signals();
        signals.requested.reset();
        signals.response_consumed.reset();
        control.begin_response()?;

        let read_size = MessageDispatcher::<D>::read_size();
        control.buffer().read_into(&mut scratch[..read_size])?;

        let mut pages = 0usize;
        let response_size = dispatcher.dispatch(&mut scratch[..], |page| {
            pages += 1;
            publish(control, page, *timeout, *policy)
        })?;
        publish(control, &scratch[..response_size], *timeout, *policy)?;
        pages += 1;

        log::debug!("served request in {} page(s)", pages);
        Ok(CycleReport {
            pages,
            response_size,
        })
    }
}

/// Write one response page, signal it and wait for the agent to take it.
fn publish(control: &ControlChannel, page: &[u8], timeout: Duration, policy: TimeoutPolicy) -> Result<()> {
    control.buffer().write_from(page)?;

    let signals = control.signals();
    signals.response_ready.signal()?;
    if !signals.response_consumed.wait_timeout(timeout)? {
        match policy {
            TimeoutPolicy::Fail => {
                return Err(ChannelError::ChannelTimedOut(WaitPhase::ResponseConsumed));
            }
            TimeoutPolicy::Continue => {
                log::warn!(
                    "agent did not acknowledge a {}-byte page within {:?}; continuing",
                    page.len(),
                    timeout
                );
            }
        }
    }
    if control.is_faulted() {
        return Err(ChannelError::ChannelFaulted);
    }
    signals.response_consumed.reset();
    Ok(())
}
