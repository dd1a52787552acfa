use crate::error::Error;
use crossbeam::channel::{self, Sender};
use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{error, trace};

/// Frames counted in the current window, and the count of the last complete window.
#[derive(Debug, Default)]
pub struct FpsCounter {
    count: AtomicU32,
    snapshot: AtomicU32,
}

impl FpsCounter {
    /// Count one processed frame.
    pub fn tick(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Close the current window: its count becomes the snapshot and counting restarts at 0.
    pub fn roll(&self) -> u32 {
        let fps = self.count.swap(0, Ordering::SeqCst);
        self.snapshot.store(fps, Ordering::SeqCst);
        fps
    }

    /// Frames per second over the last complete window.
    pub fn current(&self) -> u32 {
        self.snapshot.load(Ordering::SeqCst)
    }

    /// Frames counted so far in the current window.
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        self.snapshot.store(0, Ordering::SeqCst);
    }
}

/// Thread rolling an [`FpsCounter`] once per period.
pub struct FpsTimer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl FpsTimer {
    pub fn start(counter: Arc<FpsCounter>, period: Duration) -> Result<Self, Error> {
        let (stop, stopped) = channel::bounded::<()>(1);
        let ticker = channel::tick(period);

        let handle = thread::Builder::new()
            .name("fps-timer".to_owned())
            .spawn(move || loop {
                crossbeam::select! {
                    recv(ticker) -> _ => {
                        let fps = counter.roll();
                        trace!(message = "rolled fps window", fps);
                    }
                    recv(stopped) -> _ => break,
                }
            })
            .map_err(|e| Error::SpawnThread(e, "fps-timer"))?;

        Ok(Self { stop, handle })
    }

    pub fn stop(self) {
        // a disconnected receiver means the thread is already gone
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            error!(message = "fps timer thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_snapshots_and_resets() {
        let counter = FpsCounter::default();
        for _ in 0..30 {
            counter.tick();
        }
        assert_eq!(counter.roll(), 30);
        assert_eq!(counter.current(), 30);
        assert_eq!(counter.pending(), 0);

        counter.tick();
        assert_eq!(counter.current(), 30);
        assert_eq!(counter.pending(), 1);
    }

    #[test]
    fn reset_zeroes_both() {
        let counter = FpsCounter::default();
        counter.tick();
        counter.roll();
        counter.tick();
        counter.reset();
        assert_eq!((counter.current(), counter.pending()), (0, 0));
    }

    #[test]
    fn timer_rolls_until_stopped() {
        let counter = Arc::new(FpsCounter::default());
        for _ in 0..5 {
            counter.tick();
        }
        let timer = FpsTimer::start(counter.clone(), Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(100));
        timer.stop();

        assert_eq!(counter.pending(), 0);
        counter.tick();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.pending(), 1);
    }
}
