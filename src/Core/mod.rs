pub mod SharedMemory;
pub mod buffer;
pub mod error;
pub mod futex;
pub mod signal;

pub use buffer::SharedBuffer;
pub use error::{BoxError, ChannelError, Result, WaitPhase};
pub use signal::{FutexSignal, LocalSignal, Signal};
pub use SharedMemory::{
    attach_shared_memory, create_shared_memory, HeapSharedMemory, RawHandle, SharedMemoryBackend,
};
