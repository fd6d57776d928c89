// src/engine/ticker.rs

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// One periodic timer per scheduler loop, stopped by the pipeline's halt
/// signal.
///
/// The first tick fires one `period` after creation. Missed ticks are
/// delayed, never bursted, so a slow drain cannot pile up ticks.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    halt: watch::Receiver<bool>,
}

impl Ticker {
    pub fn new(period: Duration, halt: watch::Receiver<bool>) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, halt }
    }

    /// Wait for the next tick. Returns `false` once halted; the loop must
    /// then stop.
    pub async fn next(&mut self) -> bool {
        if *self.halt.borrow() {
            return false;
        }

        let halted = tokio::select! {
            _ = self.interval.tick() => false,
            _ = self.halt.wait_for(|halted| *halted) => true,
        };

        !halted && !*self.halt.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticks_until_halted() {
        let (tx, rx) = watch::channel(false);
        let mut ticker = Ticker::new(Duration::from_millis(20), rx);

        let start = Instant::now();
        assert!(ticker.next().await);
        assert!(ticker.next().await);
        assert!(start.elapsed() >= Duration::from_millis(40));

        tx.send_replace(true);
        assert!(!ticker.next().await);
    }

    #[tokio::test]
    async fn halt_interrupts_a_pending_wait() {
        let (tx, rx) = watch::channel(false);
        let mut ticker = Ticker::new(Duration::from_secs(3600), rx);

        let waiter = tokio::spawn(async move { ticker.next().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace(true);

        let halted = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("ticker did not observe halt")
            .unwrap();
        assert!(!halted);
    }
}
