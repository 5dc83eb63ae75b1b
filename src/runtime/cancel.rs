//! Cancellation tied to the transport link.
//!
//! The application cancels the token when the MQTT connection drops. Action
//! handlers race their work against [`CancellationToken::cancelled`], lifecycle
//! controllers stop publishing, and worker and telemetry loops return.
//!
//! `WAITERS` must cover every task that can wait on the token at the same
//! time. For the link token that is one per lifecycle worker, one per action
//! racing it, plus the telemetry task. Past that capacity the waker registry
//! overflows, wakes every waiter early and they all poll again.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

use crate::config::MAX_WAITERS;

struct State<const WAITERS: usize> {
    cancelled: bool,
    waiters: MultiWakerRegistration<WAITERS>,
}

/// A resettable, many-waiter cancellation flag.
pub struct CancellationToken<M: RawMutex, const WAITERS: usize = MAX_WAITERS> {
    state: Mutex<M, RefCell<State<WAITERS>>>,
}

impl<M: RawMutex, const WAITERS: usize> CancellationToken<M, WAITERS> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                cancelled: false,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    /// Cancels the token and wakes every task waiting on it.
    pub fn cancel(&self) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.cancelled = true;
            state.waiters.wake();
        });
    }

    /// Re-arms the token, typically after the transport reconnected.
    pub fn reset(&self) {
        self.state.lock(|state| state.borrow_mut().cancelled = false);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock(|state| state.borrow().cancelled)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                if state.cancelled {
                    Poll::Ready(())
                } else {
                    state.waiters.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }
}

impl<M: RawMutex, const WAITERS: usize> Default for CancellationToken<M, WAITERS> {
    fn default() -> Self {
        Self::new()
    }
}
