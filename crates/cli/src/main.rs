use std::sync::Arc;

use anyhow::{Context, Result};
use camroute_agents::{CompletionBackend, PlanRouteRequest, PlannerConfig, RoutePlanner};
use camroute_core::{NewLocation, TransportMode};
use camroute_observability::{init_tracing, AppMetrics};
use camroute_storage::Store;
use clap::{Parser, Subcommand};
use serde::Serialize;

type Planner = RoutePlanner<Store, CompletionBackend>;

#[derive(Debug, Parser)]
#[command(name = "camroute")]
#[command(about = "Cameroon route planner CLI")]
struct Cli {
    /// SQLite URL; without it everything lives in memory for this run.
    #[arg(long, env = "CAMROUTE_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan a route between two free-text addresses without saving it.
    Optimize {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "car")]
        mode: String,
    },
    /// Plan and save a route between two stored locations.
    Plan {
        #[arg(long)]
        departure_id: i64,
        #[arg(long)]
        destination_id: i64,
        #[arg(long, default_value = "car")]
        mode: String,
        #[arg(long)]
        user: Option<String>,
    },
    Resolve {
        address: String,
    },
    Analyze {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "car")]
        mode: String,
    },
    Locations {
        #[command(subcommand)]
        command: LocationCommand,
    },
    History {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        page: Option<String>,
    },
    Stats,
    Compare {
        #[arg(required = true, num_args = 2..)]
        ids: Vec<i64>,
    },
}

#[derive(Debug, Subcommand)]
enum LocationCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<String>,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    Delete {
        id: i64,
    },
    Search {
        query: String,
    },
    /// Insert the bundled sample locations if the catalogue is empty.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("camroute_cli");
    let cli = Cli::parse();

    let planner = build_planner(cli.database_url.as_deref()).await?;

    match cli.command {
        Command::Optimize { from, to, mode } => {
            print_json(&planner.preview(&from, &to, &mode).await?)?;
        }
        Command::Plan {
            departure_id,
            destination_id,
            mode,
            user,
        } => {
            let detail = planner
                .plan_route(PlanRouteRequest {
                    departure_id,
                    destination_id,
                    transport_mode: mode,
                    user_id: user,
                })
                .await?;
            print_json(&detail)?;
        }
        Command::Resolve { address } => {
            let outcome = planner.optimizer().resolver().locate(address.trim()).await;
            if outcome.used_fallback {
                eprintln!("warning: coordinates could not be resolved, showing the default point");
            }
            print_json(&outcome.value)?;
        }
        Command::Analyze { from, to, mode } => {
            let mode = TransportMode::parse(&mode)
                .with_context(|| format!("invalid --mode '{mode}', expected car, public, walking or bike"))?;
            let outcome = planner
                .optimizer()
                .analyzer()
                .assess(from.trim(), to.trim(), mode)
                .await;
            if outcome.used_fallback {
                eprintln!("warning: analysis unavailable, showing the fallback estimate");
            }
            print_json(&outcome.value)?;
        }
        Command::Locations { command } => match command {
            LocationCommand::List { search, page } => {
                print_json(
                    &planner
                        .list_locations(search.as_deref(), page.as_deref())
                        .await?,
                )?;
            }
            LocationCommand::Add {
                name,
                address,
                lat,
                lon,
            } => {
                let location = planner
                    .create_location(NewLocation {
                        name,
                        address,
                        latitude: lat,
                        longitude: lon,
                    })
                    .await?;
                print_json(&location)?;
            }
            LocationCommand::Delete { id } => {
                print_json(&planner.delete_location(id).await?)?;
            }
            LocationCommand::Search { query } => {
                print_json(&planner.quick_search(Some(&query)).await?)?;
            }
            LocationCommand::Seed => {
                let created = planner.seed_sample_locations().await?;
                println!("{} sample locations created", created.len());
            }
        },
        Command::History { user, page } => {
            print_json(
                &planner
                    .route_history(user.as_deref(), page.as_deref())
                    .await?,
            )?;
        }
        Command::Stats => print_json(&planner.statistics().await?)?,
        Command::Compare { ids } => print_json(&planner.compare_routes(&ids).await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_planner(database_url: Option<&str>) -> Result<Planner> {
    let metrics = AppMetrics::shared();
    let config = PlannerConfig::from_env()?;

    let store = match database_url {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };

    let backend = CompletionBackend::from_config(config.gemini.clone())?;
    if !backend.is_enabled() {
        eprintln!("note: CAMROUTE_GEMINI_API_KEY is not set, answers use fallback estimates");
    }

    Ok(RoutePlanner::new(Arc::new(store), backend, &config, metrics))
}
