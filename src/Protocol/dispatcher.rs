use std::sync::Arc;

use crate::Core::error::{BoxError, ChannelError, Result};
use crate::Wire::layout::{MAX_MSG_SIZE, READ_SIZE};
use crate::Wire::marshal;
use crate::Wire::messages::{
    encode_page, GetSequencePointsRequest, Request, SequencePointRecord, TrackAssemblyRequest,
    TrackAssemblyResponse, PAGE_CAPACITY,
};

/// Decides what the agent instruments. Implemented outside this crate by the
/// filtering and symbol-reading layers of the host.
pub trait InstrumentationDecision {
    /// Should `assembly`, loaded from `module`, be instrumented?
    fn should_track(&self, module: &str, assembly: &str) -> std::result::Result<bool, BoxError>;

    /// Sequence points of `function_token` in `module`, in instrumentation order.
    fn sequence_points_for(
        &self,
        module: &str,
        function_token: i32,
    ) -> std::result::Result<Vec<SequencePointRecord>, BoxError>;
}

impl<T: InstrumentationDecision + ?Sized> InstrumentationDecision for Arc<T> {
    fn should_track(&self, module: &str, assembly: &str) -> std::result::Result<bool, BoxError> {
        (**self).should_track(module, assembly)
    }

    fn sequence_points_for(
        &self,
        module: &str,
        function_token: i32,
    ) -> std::result::Result<Vec<SequencePointRecord>, BoxError> {
        (**self).sequence_points_for(module, function_token)
    }
}

impl<T: InstrumentationDecision + ?Sized> InstrumentationDecision for Box<T> {
    fn should_track(&self, module: &str, assembly: &str) -> std::result::Result<bool, BoxError> {
        (**self).should_track(module, assembly)
    }

    fn sequence_points_for(
        &self,
        module: &str,
        function_token: i32,
    ) -> std::result::Result<Vec<SequencePointRecord>, BoxError> {
        (**self).sequence_points_for(module, function_token)
    }
}

/// Turns a request in the message buffer into its response, in place.
pub struct MessageDispatcher<D> {
    decision: D,
}

impl<D: InstrumentationDecision> MessageDispatcher<D> {
    pub fn new(decision: D) -> Self {
        Self { decision }
    }

    pub fn decision(&self) -> &D {
        &self.decision
    }

    /// Bytes of the control buffer that hold a request.
    pub fn read_size() -> usize {
        *READ_SIZE
    }

    /// Capacity the message buffer needs for any request, response or page.
    pub fn max_msg_size() -> usize {
        *MAX_MSG_SIZE
    }

    /// Decode the request at the start of `buffer`, run its handler and encode
    /// the response back into `buffer`. Returns the size of the response.
    ///
    /// Responses spanning several pages hand every page but the last to
    /// `send_partial`, which must not return before the peer consumed it. The
    /// last page is left in `buffer` like a single response.
    ///
    /// If the collaborator fails, `buffer` still holds the request untouched.
    pub fn dispatch<F>(&self, buffer: &mut [u8], mut send_partial: F) -> Result<usize>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        match Request::decode(buffer)? {
            Request::TrackAssembly(request) => self.track_assembly(&request, buffer),
            Request::GetSequencePoints(request) => {
                self.sequence_points(&request, buffer, &mut send_partial)
            }
        }
    }

    fn track_assembly(&self, request: &TrackAssemblyRequest, buffer: &mut [u8]) -> Result<usize> {
        let track = self
            .decision
            .should_track(&request.module_name, &request.assembly_name)
            .map_err(ChannelError::Decision)?;
        log::debug!(
            "track assembly {} ({}): {}",
            request.assembly_name,
            request.module_name,
            track
        );
        marshal::write(&TrackAssemblyResponse { track }, buffer, 0)
    }

    fn sequence_points<F>(
        &self,
        request: &GetSequencePointsRequest,
        buffer: &mut [u8],
        send_partial: &mut F,
    ) -> Result<usize>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let points = self
            .decision
            .sequence_points_for(&request.module_name, request.function_token)
            .map_err(ChannelError::Decision)?;
        log::debug!(
            "sequence points for token {:#x} in {}: {}",
            request.function_token,
            request.module_name,
            points.len()
        );

        let mut remaining: &[SequencePointRecord] = &points;
        loop {
            let (page, rest) = remaining.split_at(remaining.len().min(PAGE_CAPACITY));
            let more = !rest.is_empty();
            let written = encode_page(buffer, more, page)?;
            if !more {
                return Ok(written);
            }
            send_partial(&buffer[..written])?;
            remaining = rest;
        }
    }
}
