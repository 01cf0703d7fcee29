//! Reconciliation of lapsed rounds and season reset

use tracing::{debug, info, warn};

use super::{LedgerEvent, PickEngine, ReconcileReport, ResetSummary};
use crate::cache::Freshness;
use crate::error::{Error, Result};
use crate::traits::{CacheKind, Classification, Round};

impl PickEngine {
    /// Resolve the points of every pending pick of a round
    ///
    /// Idempotent. Rounds that are still open are left alone. When results
    /// cannot be fetched, or have not been published yet, picks stay pending
    /// and a later call resolves them.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: the round is not in the schedule
    /// - [`Error::ProviderUnavailable`]: the schedule cannot be obtained
    pub async fn reconcile(&self, round: u32) -> Result<ReconcileReport> {
        let round_info = self.find_round(round).await?;
        self.reconcile_round(&round_info).await
    }

    /// Reconcile every lapsed round that still has pending picks
    pub async fn reconcile_lapsed(&self) -> Result<Vec<ReconcileReport>> {
        let today = self.clock.today();
        let mut reports = Vec::new();

        for round in self.schedule().await? {
            if round.is_open(today) {
                continue;
            }
            match self.reconcile_round(&round).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Reconciliation of round {} failed: {}", round.number, e),
            }
        }

        Ok(reports)
    }

    /// Run reconciliation and absorb failures, for read paths
    pub(super) async fn reconcile_quietly(&self) {
        if let Err(e) = self.reconcile_lapsed().await {
            self.degraded("reconciliation", &e);
        }
    }

    async fn reconcile_round(&self, round: &Round) -> Result<ReconcileReport> {
        let today = self.clock.today();
        if round.is_open(today) {
            debug!("Round {} is still open, nothing to reconcile", round.number);
            return Ok(ReconcileReport {
                round: round.number,
                resolved: 0,
                pending: 0,
            });
        }

        // Concurrent passes over one round run one after another
        let _guard = self.round_locks.lock(&round.number).await;

        let pending: Vec<_> = self
            .store
            .picks_for_round(round.number)
            .await?
            .into_iter()
            .filter(|pick| pick.is_pending())
            .collect();

        if pending.is_empty() {
            return Ok(ReconcileReport {
                round: round.number,
                resolved: 0,
                pending: 0,
            });
        }

        let results = match self.results(round).await {
            Ok(results) if results.is_empty() => {
                debug!("No results published yet for round {}", round.number);
                return Ok(ReconcileReport {
                    round: round.number,
                    resolved: 0,
                    pending: pending.len(),
                });
            }
            Ok(results) => results,
            Err(e) if e.is_provider_unavailable() => {
                self.degraded(&format!("results {}", round.number), &e);
                return Ok(ReconcileReport {
                    round: round.number,
                    resolved: 0,
                    pending: pending.len(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut resolved = 0;
        for pick in &pending {
            let Some(driver) = pick.driver.as_deref() else {
                continue;
            };
            let points = self.points.points_for_driver(&results, driver);

            if self
                .store
                .resolve_points(&pick.user, round.number, driver, points)
                .await?
            {
                resolved += 1;
                self.emit_event(LedgerEvent::PointsResolved {
                    user: pick.user.clone(),
                    round: round.number,
                    driver: driver.to_string(),
                    points,
                });
            } else {
                debug!(
                    "Pick of {} for round {} changed during reconciliation, skipped",
                    pick.user, round.number
                );
            }
        }

        let report = ReconcileReport {
            round: round.number,
            resolved,
            pending: pending.len() - resolved,
        };
        info!(
            "Reconciled round {}: {} resolved, {} pending",
            round.number, report.resolved, report.pending
        );
        self.emit_event(LedgerEvent::RoundReconciled {
            round: report.round,
            resolved: report.resolved,
            pending: report.pending,
        });

        Ok(report)
    }

    /// Finishing order of a round through the cache
    ///
    /// Results stored after the race day never expire; results stored on race
    /// day expire after the pending TTL. Empty results are never stored.
    async fn results(&self, round: &Round) -> Result<Vec<Classification>> {
        let year = self.year;
        let number = round.number;
        let freshness = Freshness::SettledAfter {
            date: round.date,
            ttl: self.cache_config.pending_results_ttl(),
        };

        self.cache
            .get_if(
                CacheKind::Results,
                &format!("{}/{}", year, number),
                freshness,
                || self.bounded("results", self.provider.results(year, number)),
                |results: &Vec<Classification>| !results.is_empty(),
            )
            .await
    }

    /// Clear the ledger and create one empty pick per (player, round)
    ///
    /// The schedule is fetched from the provider first. When it cannot be
    /// fetched the ledger is left untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::ProviderUnavailable`]: the schedule cannot be fetched
    pub async fn reset_season(&self) -> Result<ResetSummary> {
        let schedule = self
            .bounded("schedule", self.provider.schedule(self.year))
            .await
            .map_err(|e| {
                warn!("Refusing to reset season {}: {}", self.year, e);
                e
            })?;

        if schedule.is_empty() {
            return Err(Error::provider(
                self.provider.provider_name(),
                format!("Empty schedule for season {}", self.year),
            ));
        }

        let rounds: Vec<u32> = schedule.iter().map(|r| r.number).collect();
        self.store.reset(&self.players, &rounds).await?;

        let purged = self.cache.invalidate(None).await?;
        debug!("Purged {} cached lookups", purged);
        self.store.flush().await?;

        let summary = ResetSummary {
            players: self.players.len(),
            rounds: rounds.len(),
        };
        info!(
            "Season {} reset: {} players x {} rounds",
            self.year, summary.players, summary.rounds
        );
        self.emit_event(LedgerEvent::SeasonReset {
            players: summary.players,
            rounds: summary.rounds,
        });

        Ok(summary)
    }
}
