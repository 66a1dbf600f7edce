use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use sprintboard::{
    api,
    board::BoardController,
    config::{BoardConfig, DEFAULT_PORT},
    db::Database,
    models::{Board, Epic, SprintId},
    ranking::DropTarget,
    store::SprintStore,
};

#[derive(Parser)]
#[command(name = "sprintboard")]
#[command(about = "Sprint board with drag-and-drop epic ranking")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "SPRINTBOARD_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, env = "SPRINTBOARD_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Print every sprint with its ranked epics
    Board,
    /// Move an epic onto another epic or onto a sprint
    Move {
        /// Epic to move
        epic: Uuid,

        /// Place the epic where this epic currently is
        #[arg(long, conflicts_with = "onto_sprint", required_unless_present = "onto_sprint")]
        onto_epic: Option<Uuid>,

        /// Append the epic to the end of this sprint
        #[arg(long)]
        onto_sprint: Option<SprintId>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "sprintboard=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let db = match path {
        Some(path) => Database::open(path)?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(db: Database, config: BoardConfig) -> anyhow::Result<()> {
    let port = config.port;
    tracing::info!("Starting sprintboard server on port {}", port);

    let app = api::create_router_with_config(db, &config);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("sprintboard listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn print_epic(epic: &Epic) {
    let rank = epic
        .current_rank()
        .map_or_else(|| "-".to_string(), |r| r.to_string());
    let progress = epic.work_items;
    println!(
        "  {:>3}. {} [{}/{}] ({})",
        rank, epic.name, progress.completed, progress.total, epic.id
    );
}

fn print_board(board: &Board) {
    for sprint in &board.sprints {
        let dates = match (sprint.sprint.start_date, sprint.sprint.end_date) {
            (Some(start), Some(end)) => format!(" {} - {}", start, end),
            (Some(start), None) => format!(" from {}", start),
            _ => String::new(),
        };
        println!("{}{} ({} epics)", sprint.sprint.label(), dates, sprint.epics.len());
        for epic in &sprint.epics {
            print_epic(epic);
        }
    }

    if !board.ungrouped.is_empty() {
        println!("Ungrouped ({} epics)", board.ungrouped.len());
        for epic in &board.ungrouped {
            print_epic(epic);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = BoardConfig::from_env();
    if cli.db.is_some() {
        config.db_path = cli.db;
    }
    let db = open_database(config.db_path.clone())?;

    match cli.command {
        Some(Commands::Serve { port }) => {
            config.port = port;
            serve(db, config).await?;
        }
        Some(Commands::Board) => {
            let board = db.load_board().await?;
            print_board(&board);
        }
        Some(Commands::Move {
            epic,
            onto_epic,
            onto_sprint,
        }) => {
            let target = match (onto_epic, onto_sprint) {
                (Some(id), _) => DropTarget::Epic(id),
                (None, Some(id)) => DropTarget::Sprint(id),
                (None, None) => anyhow::bail!("Either --onto-epic or --onto-sprint is required"),
            };

            let controller = BoardController::new(db);
            let outcome = controller.commit_move(epic, target).await?;
            println!(
                "Moved epic {} ({:?}, {} writes)",
                outcome.epic_id,
                outcome.kind,
                outcome.writes.len()
            );

            let board = controller.store().load_board().await?;
            print_board(&board);
        }
        None => serve(db, config).await?,
    }

    Ok(())
}
