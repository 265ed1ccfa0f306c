// crates/annex-daemon/src/scheduler.rs
//
// Block clock for the Annex flywheel daemon.
//
// Advances the block height at a fixed wall-clock interval and publishes it
// on a watch channel. Transactions submitted without an explicit height are
// stamped with the latest published value.

use std::time::Duration;

use tokio::sync::watch;

use annex_core::BlockNumber;

/// Publishes a monotonically increasing block height.
pub struct BlockClock {
    interval: Duration,
    height: watch::Sender<BlockNumber>,
}

impl BlockClock {
    /// Create a clock starting at `start`, and a receiver for its height.
    pub fn new(start: BlockNumber, interval_ms: u64) -> (Self, watch::Receiver<BlockNumber>) {
        let (height, rx) = watch::channel(start);
        let clock = Self {
            interval: Duration::from_millis(interval_ms.max(1)),
            height,
        };
        (clock, rx)
    }

    /// Run the clock until ctrl-c or until every receiver is gone.
    pub async fn run(&self) {
        tracing::info!(
            "Block clock started at block {} ({:?} per block)",
            *self.height.borrow(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Block clock received shutdown signal");
                    break;
                }
                _ = self.height.closed() => {
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.advance_block();
                }
            }
        }
    }

    /// Advance the height by one.
    pub fn advance_block(&self) -> BlockNumber {
        self.height.send_modify(|h| *h += 1);
        let height = *self.height.borrow();
        tracing::trace!("Block {}", height);
        height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_block_publishes() {
        let (clock, rx) = BlockClock::new(41, 10);
        assert_eq!(*rx.borrow(), 41);
        assert_eq!(clock.advance_block(), 42);
        assert_eq!(*rx.borrow(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_on_interval() {
        let (clock, rx) = BlockClock::new(0, 100);
        let handle = tokio::spawn(async move { clock.run().await });

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(*rx.borrow(), 3);

        drop(rx);
        handle.await.unwrap();
    }
}
