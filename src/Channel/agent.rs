use std::time::Duration;

use super::control::ControlChannel;
use super::results::ResultsRegion;
use crate::Core::error::{ChannelError, Result, WaitPhase};
use crate::Wire::layout::{CycleState, MAX_MSG_SIZE, VISIT_RECORDS_OFFSET};
use crate::Wire::marshal;
use crate::Wire::messages::{
    decode_page, GetSequencePointsRequest, Request, SequencePointRecord, TrackAssemblyRequest,
    TrackAssemblyResponse, VisitRecord,
};

/// The agent's end of both channels.
///
/// Runs inside the monitored process: posts control requests, collects the
/// (possibly paged) responses, and publishes visit batches.
pub struct AgentEndpoint {
    control: ControlChannel,
    results: ResultsRegion,
    timeout: Duration,
    message: Box<[u8]>,
    batch: Box<[u8]>,
}

impl AgentEndpoint {
    pub fn new(control: ControlChannel, results: ResultsRegion, timeout: Duration) -> Self {
        let batch = vec![0u8; results.buffer_size()].into_boxed_slice();
        Self {
            control,
            results,
            timeout,
            message: vec![0u8; *MAX_MSG_SIZE].into_boxed_slice(),
            batch,
        }
    }

    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    pub fn results(&self) -> &ResultsRegion {
        &self.results
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask the host whether `assembly` loaded from `module` should be instrumented.
    pub fn track_assembly(&mut self, module: &str, assembly: &str) -> Result<bool> {
        let request = Request::TrackAssembly(TrackAssemblyRequest::new(module, assembly)?);
        self.post(&request)?;
        self.await_page()?;
        let response: TrackAssemblyResponse = marshal::read(&self.message, 0)?;
        self.acknowledge()?;
        self.control.release()?;
        Ok(response.track)
    }

    /// Fetch every sequence point of `function_token` in `module`, following
    /// the host's pages until the last one.
    pub fn get_sequence_points(
        &mut self,
        module: &str,
        function_token: i32,
    ) -> Result<Vec<SequencePointRecord>> {
        let request = Request::GetSequencePoints(GetSequencePointsRequest::new(function_token, module)?);
        self.post(&request)?;

        let mut points = Vec::new();
        loop {
            self.await_page()?;
            let page = decode_page(&self.message, &mut points)?;
            self.acknowledge()?;
            if !page.more {
                break;
            }
        }
        self.control.release()?;
        Ok(points)
    }

    /// Publish `visits` to the host, split into as many batches as the
    /// results buffer requires. Each batch is drained before the next is written.
    pub fn send_visits(&mut self, visits: &[VisitRecord]) -> Result<()> {
        let per_batch = self.results.max_batch_records();
        for chunk in visits.chunks(per_batch.max(1)) {
            self.send_batch(chunk)?;
        }
        Ok(())
    }

    fn send_batch(&mut self, visits: &[VisitRecord]) -> Result<()> {
        if self.results.is_faulted() {
            return Err(ChannelError::ChannelFaulted);
        }
        let count = visits.len() as u32;
        marshal::put_u32(&mut self.batch, 0, count);
        let mut offset = VISIT_RECORDS_OFFSET;
        for visit in visits {
            offset = marshal::write(visit, &mut self.batch, offset)?;
        }
        self.results.buffer().write_from(&self.batch[..offset])?;

        let signals = self.results.signals();
        signals.results_ready.signal()?;
        if !signals.results_consumed.wait_timeout(self.timeout)? {
            // The host may still be copying this batch; never write the buffer again
            log::error!("host did not drain a batch of {} visits within {:?}", count, self.timeout);
            self.results.fault();
            return Err(ChannelError::ChannelTimedOut(WaitPhase::ResultsConsumed));
        }
        if self.results.is_faulted() {
            return Err(ChannelError::ChannelFaulted);
        }
        signals.results_consumed.reset();
        Ok(())
    }

    /// Claim the channel, write the request and raise the request signal.
    fn post(&mut self, request: &Request) -> Result<()> {
        self.control.claim()?;
        let written = match request.encode(&mut self.message) {
            Ok(written) => written,
            Err(e) => {
                self.control.abandon();
                return Err(e);
            }
        };
        if let Err(e) = self.control.buffer().write_from(&self.message[..written]) {
            self.control.abandon();
            return Err(e);
        }
        log::trace!("posted {:?} request ({} bytes)", request.message_type(), written);
        self.control.signals().requested.signal()?;
        Ok(())
    }

    /// Wait for the next response page and copy it out of the shared buffer.
    ///
    /// A timeout faults the channel: the host may still answer this request,
    /// so the buffer can no longer be trusted for the next one.
    fn await_page(&mut self) -> Result<()> {
        let ready = &self.control.signals().response_ready;
        if !ready.wait_timeout(self.timeout)? {
            log::error!("host did not respond within {:?}", self.timeout);
            self.control.fault();
            return Err(ChannelError::ChannelTimedOut(WaitPhase::ResponseReady));
        }
        match self.control.state() {
            Some(CycleState::Faulted) => return Err(ChannelError::ChannelFaulted),
            Some(CycleState::Failed) => {
                ready.reset();
                self.control.clear_failure()?;
                return Err(ChannelError::RequestFailed);
            }
            _ => {}
        }
        ready.reset();
        let len = self.message.len().min(self.control.buffer().capacity());
        self.control.buffer().read_into(&mut self.message[..len])
    }

    fn acknowledge(&self) -> Result<()> {
        Ok(self.control.signals().response_consumed.signal()?)
    }
}
