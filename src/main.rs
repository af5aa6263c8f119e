use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};

use crate::core::{db::LeagueDb, distribution::distribute_monkeys, settings::Settings};

mod core;
mod error;
mod util;
mod web;

#[derive(Parser, Debug)]
#[command(name = "MonkeyCongress")]
#[command(version = "0.1")]
#[command(about = "Tracks players, congresses and rounds for a monkey ball league.", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: RunType,
}

#[derive(Subcommand, Debug)]
enum RunType {
    /// Create the league database and its tables.
    /// Running this against an existing database leaves its contents untouched.
    Init { db_file: PathBuf },

    /// Run the web server.
    Run {
        /// Location of the Json settings file.
        /// Defaults are used when no file is provided.
        #[arg(short, long)]
        settings_file: Option<PathBuf>,

        db_file: PathBuf,
    },

    /// Roll a monkey distribution for a set of registered players.
    Distribute {
        /// Players taking part, 4 at most.
        #[arg(short = 'p', long, use_value_delimiter = true, value_delimiter = ',')]
        players: Vec<String>,

        /// Seed for a reproducible roll.
        #[arg(short, long)]
        seed: Option<u64>,

        db_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        RunType::Init { db_file } => {
            LeagueDb::init(&db_file).await?;
            log::info!("League database ready at {}", db_file.display());
            Ok(())
        }
        RunType::Run {
            settings_file,
            db_file,
        } => {
            let settings = match settings_file {
                Some(file) => {
                    log::info!("Loading settings from {}", file.display());
                    Settings::load(&file)?
                }
                None => {
                    log::info!("Settings file was not provided, using defaults.");
                    Settings::default()
                }
            };

            let db = LeagueDb::init(&db_file).await?;
            log::info!("Loaded database {}", db_file.display());

            web::run_http_server(Arc::new(db), Arc::new(settings)).await
        }
        RunType::Distribute {
            players,
            seed,
            db_file,
        } => {
            let db = LeagueDb::load(&db_file).await?;

            let mut roster = vec![];
            for tag in &players {
                roster.push(db.find_player(tag).await?);
            }

            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let distribution = distribute_monkeys(&roster, &mut rng)?;
            for assignment in &distribution.assignments {
                println!(
                    "{:<20} {:<8} {}",
                    assignment.player_tag,
                    assignment.assigned_monkey.name(),
                    if assignment.got_preference { "(preferred)" } else { "" }
                );
            }
            println!("{}", distribution.message);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Args, RunType};

    #[test]
    fn test_args() {
        let args = Args::parse_from(["monkeycongress", "distribute", "-p", "a,b,c", "-s", "7", "league.db"]);
        match args.command {
            RunType::Distribute { players, seed, db_file } => {
                assert_eq!(players, vec!["a", "b", "c"]);
                assert_eq!(seed, Some(7));
                assert_eq!(db_file.to_str(), Some("league.db"));
            }
            other => panic!("Unexpected command {:?}", other),
        }

        let args = Args::parse_from(["monkeycongress", "run", "league.db"]);
        assert!(matches!(args.command, RunType::Run { settings_file: None, .. }));
    }
}
