use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::futex::{futex_wait, futex_wake_all};
use super::SharedMemory::SharedMemoryBackend;

const UNSIGNALED: u32 = 0;
const SIGNALED: u32 = 1;

/// Manual-reset event shared by the two endpoints of a channel.
///
/// A signalled event stays signalled until one side calls [`Signal::reset`].
pub trait Signal: Send + Sync {
    fn signal(&self) -> io::Result<()>;

    fn reset(&self);

    /// Block until signalled or until `timeout` elapses.
    /// Returns `false` when the wait timed out.
    fn wait_timeout(&self, timeout: Duration) -> io::Result<bool>;

    fn is_signaled(&self) -> bool;
}

/// Event backed by a futex word inside a shared region; works across processes.
pub struct FutexSignal {
    region: Arc<dyn SharedMemoryBackend>,
    word: *const AtomicU32,
}

// The word is only touched through atomics and the region is kept alive by `region`.
unsafe impl Send for FutexSignal {}
unsafe impl Sync for FutexSignal {}

impl FutexSignal {
    /// Bind to the `u32` word at byte `offset` of `region`.
    pub fn new(region: Arc<dyn SharedMemoryBackend>, offset: usize) -> io::Result<Self> {
        let size = std::mem::size_of::<AtomicU32>();
        if offset % std::mem::align_of::<AtomicU32>() != 0 || offset + size > region.size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("signal word at offset {} is misaligned or out of range", offset),
            ));
        }
        let word = unsafe { region.as_ptr().add(offset) as *const AtomicU32 };
        Ok(Self { region, word })
    }

    fn word(&self) -> &AtomicU32 {
        unsafe { &*self.word }
    }

    pub fn region(&self) -> &Arc<dyn SharedMemoryBackend> {
        &self.region
    }
}

impl Signal for FutexSignal {
    fn signal(&self) -> io::Result<()> {
        self.word().store(SIGNALED, Ordering::Release);
        futex_wake_all(self.word())
    }

    fn reset(&self) {
        self.word().store(UNSIGNALED, Ordering::Release);
    }

    fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.word().load(Ordering::Acquire) == SIGNALED {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            futex_wait(self.word(), UNSIGNALED, deadline - now)?;
        }
    }

    fn is_signaled(&self) -> bool {
        self.word().load(Ordering::Acquire) == SIGNALED
    }
}

/// In-process event for endpoints that share an address space.
#[derive(Default)]
pub struct LocalSignal {
    state: Mutex<bool>,
    cond: Condvar,
}

impl LocalSignal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Signal for LocalSignal {
    fn signal(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        *state = true;
        self.cond.notify_all();
        Ok(())
    }

    fn reset(&self) {
        *self.state.lock() = false;
    }

    fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !*state {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return Ok(*state);
            }
        }
        Ok(true)
    }

    fn is_signaled(&self) -> bool {
        *self.state.lock()
    }
}
