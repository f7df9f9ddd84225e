use actix_web::{web, App, HttpServer};
use actix_cors::Cors;
use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::net::TcpListener;
use std::path::PathBuf;
use student_tracker::config::CorsConfig;
use student_tracker::console::Console;
use student_tracker::{backup, AppState, DbOperations, Settings};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Student and grade tracker
#[derive(Parser, Debug)]
#[command(name = "student-tracker")]
#[command(version)]
#[command(about = "Track students and their subject grades")]
struct Cli {
    /// Database URL, overriding configuration (e.g. sqlite:students.db)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Run the interactive numbered menu
    Console,
    /// Create the tables if they do not exist and exit
    InitDb,
    /// Write a plain-text backup of every student and grade
    Backup {
        #[arg(short, long, default_value = backup::BACKUP_FILENAME)]
        output: PathBuf,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn build_cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
    } else {
        Cors::default()
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec!["Content-Type"])
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    let level = match (&command, cli.debug) {
        (_, true) => "debug",
        // keep the menu readable
        (Command::Console, false) => "warn",
        _ => "info",
    };
    init_logging(level);

    let mut config = Settings::new().context("Failed to load configuration")?;
    if let Some(url) = cli.database {
        config.database.url = url;
    }
    info!("Configuration loaded successfully");

    match command {
        Command::Serve => serve(config).await,
        Command::Console => {
            let db = DbOperations::connect(&config.database).await?;
            let result = Console::new(&db, std::io::stdin().lock(), std::io::stdout())
                .run()
                .await;
            db.close().await;
            Ok(result?)
        }
        Command::InitDb => {
            let db = DbOperations::connect(&config.database).await?;
            db.close().await;
            println!("Database initialized successfully at {}", config.database.url);
            Ok(())
        }
        Command::Backup { output } => {
            let db = DbOperations::connect(&config.database).await?;
            let content = backup::export(&db).await;
            db.close().await;
            std::fs::write(&output, content?)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Backup written to {}", output.display());
            Ok(())
        }
    }
}

async fn serve(config: Settings) -> anyhow::Result<()> {
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let state = AppState::new(config.clone()).await?;
    let data = web::Data::new(state.clone());

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    let cors = config.cors.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors))
            .app_data(data.clone())
            .configure(student_tracker::web::configure)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    state.shutdown().await?;
    info!("Server stopped");
    Ok(())
}
