//! Coalescing scheduler
//!
//! Collapses bursts of triggers into at most one running execution plus one
//! trailing execution that uses the freshest arguments.
//!
//! ```text
//!            trigger               exec done, delay > 0
//!   Idle ───────────────▶ Running ─────────────────────▶ Cooldown{Empty|WithPending}
//!    ▲                      │  ▲                                   │
//!    │ exec done, nothing   │  │ cooldown over with pending        │ cooldown over,
//!    └──────────────────────┘  └───────────────────────────────────┤ nothing pending
//!    ▲                                                             │
//!    └─────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::sleep;
use tracing::{debug, error, warn};

type Callback<A> = Arc<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug)]
enum State<A> {
    Idle,
    Running { pending: Option<A> },
    CooldownEmpty,
    CooldownWithPending(A),
}

/// What happens after an execution finished
enum Next<A> {
    Idle,
    Immediate(A),
    Cooldown,
}

struct Inner<A> {
    wait: Duration,
    delay: Duration,
    callback: Callback<A>,
    state: Mutex<State<A>>,
}

/// Debounces calls to an async callback.
///
/// At most one callback execution is in flight per instance and at most one
/// pending argument set is retained; newer triggers overwrite older pending ones.
pub struct CoalescingScheduler<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for CoalescingScheduler<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Send + 'static> CoalescingScheduler<A> {
    pub fn new<F, Fut>(wait: Duration, delay: Duration, callback: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: Callback<A> = Arc::new(move |args| callback(args).boxed());
        Self {
            inner: Arc::new(Inner {
                wait,
                delay,
                callback,
                state: Mutex::new(State::Idle),
            }),
        }
    }

    /// Requests an execution with `args`.
    ///
    /// When the scheduler is idle this starts an execution and returns once the
    /// callback has run. Otherwise `args` becomes the pending call and the
    /// method returns immediately.
    pub async fn trigger(&self, args: A) {
        {
            let mut state = self.inner.lock_state();
            match &mut *state {
                State::Idle => *state = State::Running { pending: None },
                State::Running { pending } => {
                    debug!("Execution in flight, replacing pending call");
                    *pending = Some(args);
                    return;
                }
                State::CooldownEmpty | State::CooldownWithPending(_) => {
                    debug!("Cooling down, replacing pending call");
                    *state = State::CooldownWithPending(args);
                    return;
                }
            }
        }

        Arc::clone(&self.inner).run(args).await;
    }

    pub fn is_idle(&self) -> bool {
        matches!(*self.inner.lock_state(), State::Idle)
    }
}

impl<A: Send + 'static> Inner<A> {
    fn lock_state(&self) -> MutexGuard<'_, State<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(self: Arc<Self>, args: A) -> BoxFuture<'static, ()> {
        async move {
            self.execute(args).await;
            match self.finish() {
                Next::Idle => {}
                Next::Immediate(next) => {
                    tokio::spawn(Arc::clone(&self).run(next));
                }
                Next::Cooldown => {
                    tokio::spawn(Arc::clone(&self).cool_down());
                }
            }
        }
        .boxed()
    }

    async fn execute(&self, mut args: A) {
        if !self.wait.is_zero() {
            sleep(self.wait).await;
            if let State::Running { pending } = &mut *self.lock_state()
                && let Some(latest) = pending.take()
            {
                args = latest;
            }
        }

        match AssertUnwindSafe((self.callback)(args)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Scheduled execution failed: {:#}", e),
            Err(_) => error!("Scheduled execution panicked"),
        }
    }

    fn finish(&self) -> Next<A> {
        let mut state = self.lock_state();
        let pending = match &mut *state {
            State::Running { pending } => pending.take(),
            _ => None,
        };

        if !self.delay.is_zero() {
            *state = match pending {
                Some(args) => State::CooldownWithPending(args),
                None => State::CooldownEmpty,
            };
            return Next::Cooldown;
        }

        match pending {
            Some(args) => {
                *state = State::Running { pending: None };
                Next::Immediate(args)
            }
            None => {
                *state = State::Idle;
                Next::Idle
            }
        }
    }

    async fn cool_down(self: Arc<Self>) {
        sleep(self.delay).await;

        let next = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, State::Idle) {
                State::CooldownWithPending(args) => {
                    *state = State::Running { pending: None };
                    Some(args)
                }
                _ => None,
            }
        };

        if let Some(args) = next {
            self.run(args).await;
        }
    }
}
