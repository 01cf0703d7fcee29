//! Subcommands and their output
//!
//! Every command is one engine operation. Output is a plain-text table by
//! default or a JSON document with `--json`.

use clap::Subcommand;
use gridpick_core::{Error, PickEngine, PickOutcome, Result};
use serde::Serialize;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wipe the ledger and open a fresh season from the current schedule
    ResetSeason {
        /// Confirm that every pick and usage counter may be deleted
        #[arg(long)]
        yes: bool,
    },

    /// Submit or change a pick
    Pick {
        /// Username
        user: String,
        /// Round number
        round: u32,
        /// Driver code (e.g. VER)
        driver: String,
    },

    /// Resolve points of lapsed rounds (all of them unless a round is given)
    Reconcile {
        /// Round number
        #[arg(long)]
        round: Option<u32>,
    },

    /// Season standings
    Standings,

    /// Cumulative points per player after each round
    Progression,

    /// Every pick of every player
    Sheets,

    /// One player's season: picks, points and lock state per round
    Board {
        /// Username
        #[arg(long)]
        user: String,
    },

    /// Drivers a player may still pick
    Availability {
        /// Username
        #[arg(long)]
        user: String,
    },

    /// Race calendar
    Schedule,

    /// Players without a pick for a round (the current round by default)
    Reminders {
        /// Round number
        #[arg(long)]
        round: Option<u32>,
    },

    /// Team a driver races for this season
    Team {
        /// Driver code
        driver: String,
    },

    /// Check usage counters and picks against the roster
    Audit,
}

/// How a command finished when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The audit found inconsistencies
    FindingsReported,
}

struct Printer {
    json: bool,
}

impl Printer {
    fn print<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

/// Run one command against the engine
pub async fn execute(engine: &PickEngine, command: Command, json: bool) -> Result<Outcome> {
    let out = Printer { json };

    match command {
        Command::ResetSeason { yes } => {
            if !yes {
                return Err(Error::config(
                    "reset-season deletes every pick; re-run with --yes to confirm",
                ));
            }
            let summary = engine.reset_season().await?;
            out.print(&summary, || {
                println!(
                    "Season {} reset: {} player(s), {} round(s)",
                    engine.year(),
                    summary.players,
                    summary.rounds
                )
            })?;
        }

        Command::Pick {
            user,
            round,
            driver,
        } => {
            let driver = driver.to_uppercase();
            let outcome = engine.submit_pick(&user, round, &driver).await?;
            let (label, previous) = match &outcome {
                PickOutcome::Created => ("created", None),
                PickOutcome::Changed { previous } => ("changed", Some(previous.as_str())),
                PickOutcome::Unchanged => ("unchanged", None),
            };
            let doc = serde_json::json!({
                "user": user,
                "round": round,
                "driver": driver,
                "outcome": label,
                "previous": previous,
            });
            out.print(&doc, || match previous {
                Some(prev) => println!("{}: round {} changed {} -> {}", user, round, prev, driver),
                None => println!("{}: round {} {} ({})", user, round, driver, label),
            })?;
        }

        Command::Reconcile { round } => {
            let reports = match round {
                Some(round) => vec![engine.reconcile(round).await?],
                None => engine.reconcile_lapsed().await?,
            };
            out.print(&reports, || {
                for r in &reports {
                    println!(
                        "Round {:>2}: {} resolved, {} pending",
                        r.round, r.resolved, r.pending
                    );
                }
            })?;
        }

        Command::Standings => {
            let standings = engine.standings().await?;
            out.print(&standings, || {
                for (place, entry) in standings.iter().enumerate() {
                    println!("{:>2}. {:<16} {:>4}", place + 1, entry.user, entry.total);
                }
            })?;
        }

        Command::Progression => {
            let rows = engine.progression().await?;
            out.print(&rows, || {
                for row in &rows {
                    let cells: Vec<String> = row
                        .rounds
                        .iter()
                        .zip(&row.cumulative)
                        .map(|(round, total)| format!("R{}:{}", round, total))
                        .collect();
                    println!("{:<16} {}", row.user, cells.join(" "));
                }
            })?;
        }

        Command::Sheets => {
            let sheets = engine.season_sheets().await?;
            out.print(&sheets, || {
                for sheet in &sheets {
                    println!("{} ({} pts)", sheet.user, sheet.total);
                    for pick in &sheet.picks {
                        println!(
                            "  R{:<2} {:<4} {}",
                            pick.round,
                            pick.driver.as_deref().unwrap_or("-"),
                            points_cell(pick.points)
                        );
                    }
                }
            })?;
        }

        Command::Board { user } => {
            let board = engine.season_board(&user).await?;
            out.print(&board, || {
                for row in &board {
                    println!(
                        "R{:<2} {} {:<28} {:<4} {:>4} {}",
                        row.round.number,
                        row.round.date,
                        row.round.name,
                        row.driver.as_deref().unwrap_or("-"),
                        points_cell(row.points),
                        if row.open { "open" } else { "locked" }
                    );
                }
            })?;
        }

        Command::Availability { user } => {
            let drivers = engine.driver_availability(&user).await?;
            out.print(&drivers, || {
                for d in &drivers {
                    println!(
                        "{:<4} {:<24} used {} {}",
                        d.driver.code,
                        d.driver.name,
                        d.used,
                        if d.eligible { "" } else { "(capped)" }
                    );
                }
            })?;
        }

        Command::Schedule => {
            let rounds = engine.schedule().await?;
            out.print(&rounds, || {
                for r in &rounds {
                    println!("R{:<2} {} {}", r.number, r.date, r.name);
                }
            })?;
        }

        Command::Reminders { round } => {
            let round = match round {
                Some(round) => Some(round),
                None => engine.current_round().await?.map(|r| r.number),
            };
            let Some(round) = round else {
                out.print(&Vec::<String>::new(), || println!("Season finished, nothing to remind"))?;
                return Ok(Outcome::Done);
            };

            let missing = engine.missing_picks(round).await?;
            let doc = serde_json::json!({ "round": round, "missing": missing });
            out.print(&doc, || {
                if missing.is_empty() {
                    println!("Everyone has picked for round {}", round);
                } else {
                    println!("Round {}: no pick yet from {}", round, missing.join(", "));
                }
            })?;
        }

        Command::Team { driver } => {
            let team = engine.team_for(&driver.to_uppercase()).await;
            out.print(&team, || match &team.url {
                Some(url) => println!("{} ({})", team.name, url),
                None => println!("{}", team.name),
            })?;
        }

        Command::Audit => {
            let findings = engine.audit().await?;
            let lines: Vec<String> = findings.iter().map(ToString::to_string).collect();
            out.print(&lines, || {
                if lines.is_empty() {
                    println!("Ledger is consistent");
                }
                for line in &lines {
                    println!("{}", line);
                }
            })?;
            if !findings.is_empty() {
                return Ok(Outcome::FindingsReported);
            }
        }
    }

    Ok(Outcome::Done)
}

fn points_cell(points: Option<u32>) -> String {
    points.map_or_else(|| "-".to_string(), |p| p.to_string())
}
