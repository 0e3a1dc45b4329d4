// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Runtime-agnostic deadline for a [`Future`].

use std::{
    future::Future,
    pin::pin,
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use futures::{
    channel::oneshot,
    future::{self, Either},
};

/// Armed timer thread, signaling [`Timer::elapsed`] once its duration passes.
///
/// Dropping the [`Timer`] disarms it, so the thread exits right away instead
/// of sleeping out the whole duration.
struct Timer {
    elapsed: oneshot::Receiver<()>,
    disarm: mpsc::Sender<()>,
}

/// Spawns a new [`Timer`] thread elapsing after the given `dur`.
fn arm(dur: Duration) -> (Timer, thread::JoinHandle<()>) {
    // TODO: Replace `thread::spawn` with async runtime agnostic sleep, once
    //       it's available.
    let (sender, elapsed) = oneshot::channel();
    let (disarm, disarmed) = mpsc::channel::<()>();
    let handle = thread::spawn(move || {
        if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(dur) {
            _ = sender.send(());
        }
    });
    (Timer { elapsed, disarm }, handle)
}

/// Polls the given `fut` until it resolves or the `dur` elapses, whatever
/// happens first.
///
/// Returns [`None`] if the `dur` elapsed, dropping the `fut` at its current
/// suspension point. A `fut` blocking the thread can't be interrupted this
/// way.
pub(crate) async fn timeout<F: Future>(
    dur: Duration,
    fut: F,
) -> Option<F::Output> {
    let (Timer { elapsed, disarm }, _) = arm(dur);

    let out = match future::select(pin!(fut), elapsed).await {
        Either::Left((out, _)) => Some(out),
        Either::Right(_) => None,
    };
    drop(disarm);
    out
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use futures::{executor::block_on, future};

    use super::{arm, timeout};

    #[test]
    fn resolves_in_time() {
        let out = block_on(timeout(Duration::from_secs(5), async { 42 }));

        assert_eq!(out, Some(42));
    }

    #[test]
    fn elapses() {
        let out = block_on(timeout(
            Duration::from_millis(10),
            future::pending::<()>(),
        ));

        assert_eq!(out, None);
    }

    #[test]
    fn timer_signals_once_elapsed() {
        let (timer, handle) = arm(Duration::from_millis(10));

        assert_eq!(block_on(timer.elapsed), Ok(()));
        handle.join().unwrap();
    }

    #[test]
    fn dropped_timer_releases_its_thread() {
        let started = Instant::now();
        let (timer, handle) = arm(Duration::from_secs(3600));

        drop(timer);
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
