use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use driftpad::api::{self, AppState};
use driftpad::config::EngineConfig;
use driftpad::db::{self, SeedData};
use driftpad::models::{LocationContext, VirtualLocation};
use driftpad::palette::Theme;
use driftpad::ports::Viewport;

#[derive(Parser)]
#[command(name = "driftpad")]
#[command(about = "Location-aware creative prompts for a drawing surface")]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP host
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Location slug to use instead of device geolocation
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Serve one prompt and print it
    Next {
        /// Location slug to serve prompts for
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Print the theme for a place
    Palette {
        #[arg(long, allow_hyphen_values = true, requires = "lon", conflicts_with = "slug")]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,

        /// Slug of a stored location
        #[arg(long)]
        slug: Option<String>,
    },
    /// Load locations, prompts and drawings from a JSON file
    Seed { file: PathBuf },
    /// Apply pending database migrations
    Migrate,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "driftpad=debug,tower_http=debug".into()),
    );

    // Logs go to stderr so `next` and `palette` output stays parseable
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let db = match path {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

/// Host viewport; `DRIFTPAD_MOBILE=1` selects mobile image sizing.
fn viewport_from_env() -> Viewport {
    let is_mobile = std::env::var("DRIFTPAD_MOBILE")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    if is_mobile {
        Viewport {
            width: 390.0,
            height: 844.0,
            is_mobile,
        }
    } else {
        Viewport::default()
    }
}

async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Driftpad listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port, location }) => {
            let state = AppState::new(
                open_database(cli.database)?,
                EngineConfig::from_env(),
                viewport_from_env(),
            );
            if let Some(slug) = location {
                state.engine.override_location(&slug).await;
            }
            serve(state, port).await?;
        }
        Some(Commands::Next { location }) => {
            let state = AppState::new(
                open_database(cli.database)?,
                EngineConfig::from_env(),
                viewport_from_env(),
            );
            if let Some(slug) = location {
                state.engine.override_location(&slug).await;
            }
            let outcome = state.engine.load_next().await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Some(Commands::Palette { lat, lon, slug }) => {
            let context = match (slug, lat, lon) {
                (Some(slug), _, _) => {
                    let db = open_database(cli.database)?;
                    let location = db
                        .get_active_location_by_slug(&slug)?
                        .ok_or_else(|| anyhow::anyhow!("No active location with slug {}", slug))?;
                    LocationContext::Named(location)
                }
                (None, Some(lat), Some(lon)) => LocationContext::Virtual(VirtualLocation::at(lat, lon)),
                _ => anyhow::bail!("Provide --slug or both --lat and --lon"),
            };
            println!("{}", serde_json::to_string_pretty(&Theme::for_context(&context))?);
        }
        Some(Commands::Seed { file }) => {
            let data = SeedData::from_file(&file)?;
            let summary = open_database(cli.database)?.seed(data)?;
            println!(
                "Seeded {} locations, {} prompts, {} drawings",
                summary.locations, summary.prompts, summary.drawings
            );
        }
        Some(Commands::Migrate) => {
            open_database(cli.database)?;
            println!("Database is up to date");
        }
        None => {
            let state = AppState::new(
                open_database(cli.database)?,
                EngineConfig::from_env(),
                viewport_from_env(),
            );
            serve(state, 3000).await?;
        }
    }

    Ok(())
}
