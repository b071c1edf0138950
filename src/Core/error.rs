use std::fmt;
use std::io;

use thiserror::Error;

/// Boxed error returned by the instrumentation-decision collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The blocking step a channel was in when its wait window expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Agent waiting for the host to publish a response page.
    ResponseReady,
    /// Host waiting for the agent to acknowledge a response page.
    ResponseConsumed,
    /// Agent waiting for the host to drain a visit batch.
    ResultsConsumed,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitPhase::ResponseReady => "response ready",
            WaitPhase::ResponseConsumed => "response consumed",
            WaitPhase::ResultsConsumed => "results consumed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("unknown message type tag {0}")]
    UnknownMessageType(i32),

    #[error("unknown visit kind {0}")]
    UnknownVisitKind(i32),

    #[error("fixed-width string is not valid UTF-16")]
    MalformedString,

    #[error("buffer overrun: {needed} bytes at offset {offset} exceed capacity {capacity}")]
    Overrun {
        offset: usize,
        needed: usize,
        capacity: usize,
    },

    #[error("sequence point page declares {0} records")]
    BadPageCount(i32),

    #[error("results batch of {count} records does not fit a {capacity}-byte buffer")]
    BatchOverrun { count: u32, capacity: usize },

    #[error("unexpected control channel state {0}")]
    UnexpectedState(u32),

    #[error("shared memory is not an initialized {0} region")]
    BadRegion(&'static str),

    #[error("name of {units} UTF-16 units exceeds the fixed width of {capacity}")]
    NameTooLong { units: usize, capacity: usize },

    #[error("name contains an embedded NUL")]
    EmbeddedNul,

    #[error("channel timed out waiting for {0}")]
    ChannelTimedOut(WaitPhase),

    #[error("control channel already has a request in flight")]
    ChannelBusy,

    #[error("channel was faulted by a peer")]
    ChannelFaulted,

    /// The host could not answer this request; the channel is idle again.
    #[error("host could not answer the request")]
    RequestFailed,

    #[error("instrumentation decision failed: {0}")]
    Decision(#[source] BoxError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    /// Protocol errors terminate the channel; nothing defines a recovery.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            ChannelError::UnknownMessageType(_)
                | ChannelError::UnknownVisitKind(_)
                | ChannelError::MalformedString
                | ChannelError::Overrun { .. }
                | ChannelError::BadPageCount(_)
                | ChannelError::BatchOverrun { .. }
                | ChannelError::UnexpectedState(_)
                | ChannelError::BadRegion(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
