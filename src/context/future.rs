// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Context propagation across cooperative tasks.
//!
//! [`scoped`] captures an immutable snapshot of the spawner's context-local
//! state at the instant of wrapping and gives the future its own private
//! copy: the state is swapped in before every poll and swapped back out
//! after, so concurrently scheduled tasks on one thread each see exactly the
//! state that was visible where they were spawned, and none of their
//! mutations leak to the spawner or to siblings.
//!
//! Preemptible threads deliberately have no equivalent: a new thread always
//! starts from default state.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::context::state::{self, ScopeState};

/// A future running under its own snapshot of context-local state.
///
/// Created by [`scoped`]. The inner future is boxed, so `Scoped` is `Unpin`
/// and can be wrapped at spawn sites without pinning ceremony.
pub struct Scoped<F> {
    // Taken in `drop` so the inner future can be destroyed under the task's
    // own state; `Some` for the whole polling lifetime otherwise.
    inner: Option<Pin<Box<F>>>,
    // The task's private state between polls. Taken while polling.
    state: Option<ScopeState>,
}

/// Wrap `future` with a snapshot of the current execution context, taken now.
pub fn scoped<F: Future>(future: F) -> Scoped<F> {
    Scoped {
        inner: Some(Box::pin(future)),
        state: Some(state::snapshot()),
    }
}

// Swaps the spawner's state back in when the poll ends, on every exit path
// including panics, and parks the task's state for the next poll.
struct SwapBack<'a> {
    prev: Option<ScopeState>,
    slot: &'a mut Option<ScopeState>,
}

impl Drop for SwapBack<'_> {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            *self.slot = Some(state::swap(prev));
        }
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let task_state = this
            .state
            .take()
            .expect("Scoped future polled after completion");
        let prev = state::swap(task_state);
        let _swap_back = SwapBack {
            prev: Some(prev),
            slot: &mut this.state,
        };
        this.inner
            .as_mut()
            .expect("Scoped future polled after completion")
            .as_mut()
            .poll(cx)
    }
}

// Cancellation runs the inner future's destructors, and any scope guards it
// still holds must unwind against the task's parked state, not whatever
// context happens to be live on the dropping thread.
impl<F> Drop for Scoped<F> {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        match self.state.take() {
            Some(task_state) => {
                let prev = state::swap(task_state);
                let _swap_back = SwapBack {
                    prev: Some(prev),
                    slot: &mut self.state,
                };
                drop(inner);
            }
            None => drop(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::state::with;
    use crate::fields;

    // Minimal single-future executor; the crate itself stays runtime-agnostic
    // so unit tests don't reach for tokio.
    fn block_on<F: Future>(fut: F) -> F::Output {
        use std::sync::Arc;
        use std::task::{Wake, Waker};

        struct NoopWaker;
        impl Wake for NoopWaker {
            fn wake(self: Arc<Self>) {}
        }

        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);
        let mut fut = Box::pin(fut);
        loop {
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(out) => return out,
                Poll::Pending => std::thread::yield_now(),
            }
        }
    }

    // Yields once, so interleaved polls actually exercise the swap logic.
    struct YieldOnce(bool);
    impl Future for YieldOnce {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    #[test]
    fn test_snapshot_at_wrap_time() {
        let token = with(|state| state.path.push("spawn-point"));
        let fut = scoped(async { with(|state| state.path.as_str().to_string()) });
        with(|state| state.path.pop(token));

        // The wrap-time path is visible inside the task even though the
        // spawner has since left the scope.
        assert_eq!(block_on(fut), "spawn-point");
        with(|state| assert!(state.path.is_empty()));
    }

    #[test]
    fn test_task_mutations_do_not_leak() {
        let fut = scoped(async {
            let token = with(|state| state.entries.enter(fields! { "task-only" => 1 }));
            YieldOnce(false).await;
            with(|state| assert_eq!(state.entries.depth(), 1));
            with(|state| state.entries.exit(token));
        });
        block_on(fut);
        with(|state| {
            assert!(state.entries.effective().is_empty());
            assert_eq!(state.entries.depth(), 0);
        });
    }

    #[test]
    fn test_cancellation_unwinds_in_the_task_context() {
        use crate::context::scopes::ContextScope;
        use std::sync::Arc;
        use std::task::{Wake, Waker};

        struct NoopWaker;
        impl Wake for NoopWaker {
            fn wake(self: Arc<Self>) {}
        }
        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);

        let token = with(|state| state.path.push("parent"));
        let mut fut = scoped(async {
            let _guard = ContextScope::enter("child");
            YieldOnce(false).await;
        });
        // The task is mid-flight with a live scope guard.
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());

        with(|state| state.path.pop(token));
        // Cancelling must run the guard's cleanup against the task's own
        // snapshot; the spawner's path stays empty.
        drop(fut);
        with(|state| assert!(state.path.is_empty()));
    }

    #[test]
    fn test_sibling_snapshots_are_independent() {
        let make = |segment: &'static str| {
            scoped(async move {
                let token = with(|state| state.path.push(segment));
                YieldOnce(false).await;
                let seen = with(|state| state.path.as_str().to_string());
                with(|state| state.path.pop(token));
                seen
            })
        };
        let mut a = make("a");
        let mut b = make("b");

        // Interleave polls by hand to simulate cooperative scheduling.
        use std::sync::Arc;
        use std::task::{Wake, Waker};
        struct NoopWaker;
        impl Wake for NoopWaker {
            fn wake(self: Arc<Self>) {}
        }
        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);

        assert!(Pin::new(&mut a).poll(&mut cx).is_pending());
        assert!(Pin::new(&mut b).poll(&mut cx).is_pending());
        assert_eq!(Pin::new(&mut a).poll(&mut cx), Poll::Ready("a".to_string()));
        assert_eq!(Pin::new(&mut b).poll(&mut cx), Poll::Ready("b".to_string()));
        with(|state| assert!(state.path.is_empty()));
    }
}
