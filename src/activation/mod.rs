use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::timeout;

pub mod strategy;

pub use strategy::{
    ActivationStrategy, DetachedOpenStrategy, LauncherCommandStrategy, ResidentProcessStrategy,
};

use crate::config::DeliveryConfig;

/// Tries an ordered list of activation techniques, stopping at the first
/// success.
///
/// Activation is inherently unreliable from a constrained caller, so
/// failure is made harmless instead: the durable record outlives any number
/// of failed attempts and stays eligible for the next trigger.
#[derive(Clone)]
pub struct ActivationInvoker {
    strategies: Arc<[Arc<dyn ActivationStrategy>]>,
    attempt_timeout: Duration,
}

impl ActivationInvoker {
    /// Default tier order for this platform.
    pub fn new(config: &DeliveryConfig) -> Self {
        Self::with_strategies(
            vec![
                Arc::new(DetachedOpenStrategy) as Arc<dyn ActivationStrategy>,
                Arc::new(LauncherCommandStrategy),
                Arc::new(ResidentProcessStrategy),
            ],
            config.attempt_timeout,
        )
    }

    /// Custom tier list; tests and embedders inject their own techniques.
    pub fn with_strategies(
        strategies: Vec<Arc<dyn ActivationStrategy>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            strategies: strategies.into(),
            attempt_timeout,
        }
    }

    /// Attempt to open `url`; first success wins and later tiers never run.
    ///
    /// Returns `false` when every tier failed or timed out. No record state
    /// changes either way.
    pub async fn activate(&self, url: &str) -> bool {
        for strategy in self.strategies.iter() {
            let for_attempt = Arc::clone(strategy);
            let url_owned = url.to_string();
            let attempt = tokio::task::spawn_blocking(move || for_attempt.attempt(&url_owned));

            match timeout(self.attempt_timeout, attempt).await {
                Ok(Ok(Ok(()))) => {
                    info!("[activation] {} opened {url}", strategy.name());
                    return true;
                }
                Ok(Ok(Err(err))) => {
                    debug!("[activation] {} failed for {url}: {err:#}", strategy.name());
                }
                Ok(Err(join_err)) => {
                    warn!("[activation] {} panicked: {join_err}", strategy.name());
                }
                Err(_) => {
                    // The blocking task keeps running; whatever it reports
                    // after this point is discarded.
                    debug!(
                        "[activation] {} timed out after {:?}",
                        strategy.name(),
                        self.attempt_timeout
                    );
                }
            }
        }

        warn!("[activation] all strategies exhausted for {url}");
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;

    struct Scripted {
        succeed: bool,
        hits: Arc<AtomicUsize>,
    }

    impl ActivationStrategy for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn attempt(&self, _url: &str) -> anyhow::Result<()> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(anyhow!("scripted failure"))
            }
        }
    }

    struct Stuck;

    impl ActivationStrategy for Stuck {
        fn name(&self) -> &'static str {
            "stuck"
        }

        fn attempt(&self, _url: &str) -> anyhow::Result<()> {
            std::thread::sleep(Duration::from_millis(400));
            Ok(())
        }
    }

    fn scripted(succeed: bool) -> (Arc<dyn ActivationStrategy>, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let strategy = Arc::new(Scripted {
            succeed,
            hits: Arc::clone(&hits),
        });
        (strategy, hits)
    }

    #[tokio::test]
    async fn first_success_wins_and_later_tiers_never_run() {
        let (fail, fail_hits) = scripted(false);
        let (succeed, succeed_hits) = scripted(true);
        let (never, never_hits) = scripted(false);

        let invoker = ActivationInvoker::with_strategies(
            vec![fail, succeed, never],
            Duration::from_millis(100),
        );

        assert!(invoker.activate("tickhq://create-ticket?source=share&id=x").await);
        assert_eq!(fail_hits.load(Ordering::SeqCst), 1);
        assert_eq!(succeed_hits.load(Ordering::SeqCst), 1);
        assert_eq!(never_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhaustion_reports_failure() {
        let (a, _) = scripted(false);
        let (b, _) = scripted(false);
        let invoker = ActivationInvoker::with_strategies(vec![a, b], Duration::from_millis(100));
        assert!(!invoker.activate("quicknote://add-note").await);
    }

    #[tokio::test]
    async fn a_stuck_tier_is_abandoned_and_the_next_one_tried() {
        let (succeed, succeed_hits) = scripted(true);
        let invoker = ActivationInvoker::with_strategies(
            vec![Arc::new(Stuck) as Arc<dyn ActivationStrategy>, succeed],
            Duration::from_millis(50),
        );

        let started = std::time::Instant::now();
        assert!(invoker.activate("taskbox://add-task").await);
        assert_eq!(succeed_hits.load(Ordering::SeqCst), 1);
        // The stuck tier cost one budget, not its full sleep.
        assert!(started.elapsed() < Duration::from_millis(300));
    }
}
