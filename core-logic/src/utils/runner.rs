use crate::traits::{FarmingSession, FarmingStats};
use anyhow::Result;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

pub struct SessionRunner;

impl SessionRunner {
    /// Runs every session concurrently and waits for all of them.
    ///
    /// Ctrl+C cancels the parent token; sessions finish their current step
    /// and return what they have.
    pub async fn run_sessions(sessions: Vec<Box<dyn FarmingSession>>) -> Result<FarmingStats> {
        let token = CancellationToken::new();
        let cloned_token = token.clone();

        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("🛑 Received Ctrl+C. Stopping after the current action...");
                    cloned_token.cancel();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        Self::run_with_token(sessions, token).await
    }

    /// Same as [`SessionRunner::run_sessions`] but driven by a caller-owned token.
    ///
    /// Each session gets a child of `token`, so a session stopping itself
    /// leaves the others running.
    pub async fn run_with_token(
        sessions: Vec<Box<dyn FarmingSession>>,
        token: CancellationToken,
    ) -> Result<FarmingStats> {
        let mut set = JoinSet::new();
        let start_time = std::time::Instant::now();
        info!("Starting {} farming sessions...", sessions.len());

        for session in sessions {
            let span = tracing::info_span!("farming", user = %session.label());
            let child_token = token.child_token();

            set.spawn(
                async move {
                    let label = session.label().to_string();
                    match session.run(child_token).await {
                        Ok(stats) => Ok(stats),
                        Err(e) => {
                            error!("Session {} failed: {:?}", label, e);
                            Err(e)
                        }
                    }
                }
                .instrument(span),
            );
        }

        let mut totals = FarmingStats::default();

        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(stats)) => totals.merge(&stats),
                Ok(Err(_)) => {
                    // Already logged inside the session span
                }
                Err(e) => {
                    error!("A session task panicked or failed to join: {:?}", e);
                }
            }
        }

        let rate = if totals.total() > 0 {
            (totals.success as f64 / totals.total() as f64) * 100.0
        } else {
            0.0
        };

        info!(
            "Total Time: {:.1}s | Success: {} | Failed: {} | Success Rate: {:.2}%",
            start_time.elapsed().as_secs_f64(),
            totals.success,
            totals.failed,
            rate
        );

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedSession {
        name: String,
        stats: FarmingStats,
        fail: bool,
    }

    #[async_trait]
    impl FarmingSession for FixedSession {
        fn label(&self) -> &str {
            &self.name
        }

        async fn run(&self, _token: CancellationToken) -> Result<FarmingStats> {
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(self.stats.clone())
        }
    }

    #[tokio::test]
    async fn test_totals_skip_failed_sessions() {
        let sessions: Vec<Box<dyn FarmingSession>> = vec![
            Box::new(FixedSession {
                name: "alice".into(),
                stats: FarmingStats {
                    success: 2,
                    failed: 1,
                },
                fail: false,
            }),
            Box::new(FixedSession {
                name: "bob".into(),
                stats: FarmingStats {
                    success: 5,
                    failed: 5,
                },
                fail: true,
            }),
            Box::new(FixedSession {
                name: "carol".into(),
                stats: FarmingStats {
                    success: 1,
                    failed: 0,
                },
                fail: false,
            }),
        ];

        let totals = SessionRunner::run_with_token(sessions, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(totals.success, 3);
        assert_eq!(totals.failed, 1);
    }

    struct StoppingSession {
        name: String,
        stop_self: bool,
    }

    #[async_trait]
    impl FarmingSession for StoppingSession {
        fn label(&self) -> &str {
            &self.name
        }

        async fn run(&self, token: CancellationToken) -> Result<FarmingStats> {
            if self.stop_self {
                token.cancel();
            } else {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            Ok(FarmingStats {
                success: u64::from(!token.is_cancelled()),
                failed: u64::from(token.is_cancelled()),
            })
        }
    }

    #[tokio::test]
    async fn test_session_stop_does_not_reach_other_sessions() {
        let parent = CancellationToken::new();
        let sessions: Vec<Box<dyn FarmingSession>> = vec![
            Box::new(StoppingSession {
                name: "alice".into(),
                stop_self: true,
            }),
            Box::new(StoppingSession {
                name: "bob".into(),
                stop_self: false,
            }),
        ];

        let totals = SessionRunner::run_with_token(sessions, parent.clone())
            .await
            .unwrap();
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.success, 1);
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_every_session() {
        let parent = CancellationToken::new();
        parent.cancel();
        let sessions: Vec<Box<dyn FarmingSession>> = vec![
            Box::new(StoppingSession {
                name: "alice".into(),
                stop_self: false,
            }),
            Box::new(StoppingSession {
                name: "bob".into(),
                stop_self: false,
            }),
        ];

        let totals = SessionRunner::run_with_token(sessions, parent).await.unwrap();
        assert_eq!(totals.failed, 2);
    }
}
