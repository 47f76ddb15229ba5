//! Edge-triggered button handlers
//!
//! Every registration runs its own polling task with its own
//! [`EdgeDetector`]. Registering the same button and transition twice gives
//! two independent loops, and each fires on its own.
//!
//! The loops are not aligned with the sync loop; a handler may observe state
//! that changed between a sync cycle and its own sample.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::state::ButtonId;

// Transition a handler is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    Pressed,
    Released,
}

impl Transition {
    fn target(self) -> bool {
        matches!(self, Transition::Pressed)
    }
}

/// Handler invoked once per matching transition
pub type ButtonHandler = Box<dyn FnMut() + Send + 'static>;

/// Press/release edge detection for one registration
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    watch: Transition,
    previous: bool,
}

impl EdgeDetector {
    /// `initial` is the button state sampled at registration time
    pub fn new(watch: Transition, initial: bool) -> Self {
        Self {
            watch,
            previous: initial,
        }
    }

    /// Feeds the current sample, returns whether the handler should fire
    pub fn step(&mut self, current: bool) -> bool {
        let fire = current != self.previous && current == self.watch.target();
        self.previous = current;
        fire
    }
}

/// Stops one handler registration
///
/// Dropping the handle leaves the loop running.
#[derive(Debug)]
pub struct DispatchHandle {
    button: ButtonId,
    transition: Transition,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DispatchHandle {
    pub fn button(&self) -> ButtonId {
        self.button
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn stop(&self) {
        debug!("Stopping {:?} handler for {}", self.transition, self.button);
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for it to exit
    pub async fn join(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawns the polling loop for one registration
///
/// `sample` is called once immediately to seed the detector, then once per
/// `interval`.
pub(crate) fn spawn_dispatcher<S>(
    runtime: &Handle,
    button: ButtonId,
    transition: Transition,
    sample: S,
    mut handler: ButtonHandler,
    interval: Duration,
    cancel: CancellationToken,
) -> DispatchHandle
where
    S: Fn() -> bool + Send + 'static,
{
    let mut detector = EdgeDetector::new(transition, sample());
    info!("Registered {:?} handler for button {}", transition, button);

    let token = cancel.clone();
    let task = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        // The first tick completes immediately and would re-sample the seed
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if detector.step(sample()) {
                debug!("Button {} {:?}, running handler", button, transition);
                handler();
            }
        }
        debug!("{:?} handler for button {} finished", transition, button);
    });

    DispatchHandle {
        button,
        transition,
        cancel,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    const SEQUENCE: [bool; 5] = [false, false, true, true, false];

    fn fired_at(transition: Transition) -> Vec<usize> {
        let mut detector = EdgeDetector::new(transition, SEQUENCE[0]);
        SEQUENCE
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, current)| detector.step(**current))
            .map(|(index, _)| index)
            .collect()
    }

    #[test]
    fn pressed_fires_once_on_rising_edge() {
        // Fires between samples 2 and 3 (index 1 -> 2)
        assert_eq!(fired_at(Transition::Pressed), vec![2]);
    }

    #[test]
    fn released_fires_once_on_falling_edge() {
        // Fires between samples 4 and 5 (index 3 -> 4)
        assert_eq!(fired_at(Transition::Released), vec![4]);
    }

    #[test]
    fn held_at_registration_does_not_fire() {
        let mut detector = EdgeDetector::new(Transition::Pressed, true);
        assert!(!detector.step(true));
        assert!(!detector.step(false));
        assert!(detector.step(true));
    }

    #[tokio::test]
    async fn loop_fires_handler_and_stops() {
        let pressed = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));

        let source = pressed.clone();
        let counter = count.clone();
        let handle = spawn_dispatcher(
            &Handle::current(),
            ButtonId::C,
            Transition::Pressed,
            move || source.load(Ordering::SeqCst),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(1),
            CancellationToken::new(),
        );

        pressed.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(2), async {
            while count.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("handler never fired");

        // Held down: no further calls
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.stop();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("dispatcher did not stop");
    }
}
