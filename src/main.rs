// Entry point and console front-end.
//
// Without a subcommand the binary runs an interactive menu:
// - [1] uploads a CSV of production records,
// - [2] registers a single record field by field,
// - [3] opens a chat with the data assistant,
// - [4] writes the PDF report,
// - [5] previews the summary tables.
// The same actions are available as subcommands for scripted use.
mod chat;
mod config;
mod error;
mod gateway;
mod layout;
mod loader;
mod output;
mod reports;
mod types;
mod util;

use chat::{Assistant, ChatMessage, OpenRouterClient, Role};
use clap::{Parser, Subcommand};
use config::Config;
use error::AppError;
use gateway::{RecordStore, RestGateway};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use types::{ProductionRecord, REQUIRED_COLUMNS};

/// Renewable-energy production monitor: CSV upload, record registration,
/// data assistant and PDF reports against a remote store.
#[derive(Parser, Debug)]
#[command(name = "energia_report", version, about, long_about = None)]
struct Cli {
    /// Directory where PDF reports are written
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a CSV file of production records
    Upload { file: PathBuf },
    /// Register one production record interactively
    Register,
    /// Ask the data assistant a single question
    Chat { message: String },
    /// Generate the PDF report
    Report,
    /// Print the summary tables
    Dashboard,
}

struct App<'a> {
    store: &'a dyn RecordStore,
    assistant: Assistant<'a>,
    config: &'a Config,
    output_dir: PathBuf,
}

/// One trimmed line from `input`; `None` once input is exhausted or unreadable.
fn next_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Print `prompt` and read one line from stdin.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    next_line(&mut io::stdin().lock())
}

async fn handle_upload(app: &App<'_>, path: &Path) {
    match loader::ingest_file(app.store, path).await {
        Ok(report) => println!(
            "Carga finalizada. Registros exitosos: {}. Registros fallidos: {}\n",
            util::format_int(report.succeeded),
            util::format_int(report.failed)
        ),
        Err(AppError::Validation { missing }) => println!(
            "El archivo CSV no tiene las columnas requeridas: {}\n",
            missing.join(", ")
        ),
        Err(AppError::Io(e)) => println!("No se pudo abrir el archivo: {}\n", e),
        Err(e) => {
            tracing::error!("CSV upload failed: {}", e);
            println!("Error al procesar el archivo CSV\n");
        }
    }
}

async fn handle_register(app: &App<'_>) {
    let labels = ["Departamento", "Tecnología", "Producción (MWh)", "Fecha (AAAA-MM-DD)", "Año", "Mes", "Día"];
    let mut record = ProductionRecord::default();
    for (column, label) in REQUIRED_COLUMNS.iter().zip(labels) {
        let Some(value) = read_line(&format!("{}: ", label)) else {
            println!();
            return;
        };
        record.set_field(column, value);
    }
    match loader::register(app.store, &record).await {
        Ok(result) if result.success => println!("Registro agregado exitosamente\n"),
        Ok(result) => println!(
            "{}\n",
            result.error.unwrap_or_else(|| "Error al agregar registro".to_string())
        ),
        Err(AppError::Validation { missing }) => {
            println!("Completa los campos obligatorios: {}\n", missing.join(", "))
        }
        Err(e) => println!("Error al agregar registro: {}\n", e),
    }
}

async fn ask(app: &App<'_>, message: &str, history: &mut Vec<ChatMessage>) {
    let result = app.assistant.send_message(message, history).await;
    match (result.success, result.reply) {
        (true, Some(reply)) => {
            println!("Asistente: {}\n", reply);
            history.push(ChatMessage::new(Role::User, message));
            history.push(ChatMessage::new(Role::Assistant, reply));
        }
        _ => println!(
            "Asistente: {}\n",
            result.error.unwrap_or_else(|| chat::CHAT_FAILED_MESSAGE.to_string())
        ),
    }
}

async fn handle_chat(app: &App<'_>) {
    if let Err(e) = app.config.require_openrouter_key() {
        println!("{}\n", e);
        return;
    }
    println!("Escribe tu pregunta (línea vacía para volver al menú).");
    if app.assistant.context().cached().is_none() {
        println!("Los datos de sensores se cargan con la primera pregunta.");
    }
    let mut history = Vec::new();
    while let Some(message) = read_line("Tú: ") {
        if message.is_empty() {
            break;
        }
        ask(app, &message, &mut history).await;
    }
}

async fn handle_report(app: &App<'_>) {
    println!("Generando reporte...");
    match reports::generate_report(app.store, &app.output_dir, chrono::Local::now()).await {
        Ok(result) => println!("📄 Reporte PDF generado: {}\n", result.file_name),
        Err(e) => {
            tracing::error!("report generation failed: {}", e);
            println!("Base de datos desconectada, no se puede generar el reporte\n");
        }
    }
}

async fn handle_dashboard(app: &App<'_>) {
    match reports::load_statistics(app.store).await {
        Ok((_, stats)) => output::preview_statistics(&stats),
        Err(e) => {
            tracing::error!("could not load statistics: {}", e);
            println!("Base de datos desconectada, no se pueden mostrar los datos\n");
        }
    }
}

async fn menu(app: &App<'_>) {
    loop {
        println!("Sistema de Monitoreo Energético");
        println!("[1] Subir archivo CSV");
        println!("[2] Registrar producción");
        println!("[3] Chat con el asistente");
        println!("[4] Generar reporte PDF");
        println!("[5] Ver resumen");
        println!("[0] Salir\n");
        let Some(choice) = read_line("Opción: ") else {
            println!();
            break;
        };
        match choice.as_str() {
            "1" => match read_line("Ruta del archivo CSV: ") {
                Some(path) if !path.is_empty() => handle_upload(app, Path::new(&path)).await,
                _ => println!("Selecciona un archivo CSV\n"),
            },
            "2" => handle_register(app).await,
            "3" => handle_chat(app).await,
            "4" => handle_report(app).await,
            "5" => handle_dashboard(app).await,
            "0" => {
                println!("Saliendo.");
                break;
            }
            _ => println!("Opción inválida. Elige un número del 0 al 5.\n"),
        }
    }
}

async fn run(cli: Cli) -> error::Result<()> {
    let config = Config::from_env()?;
    let gateway = RestGateway::new(config.store_url.as_str(), config.store_api_key.as_str());
    let completion = OpenRouterClient::new(
        config.openrouter_base_url.as_str(),
        config.openrouter_api_key.clone().unwrap_or_default(),
    );
    let assistant = Assistant::new(&gateway, &completion, config.chat_model.as_str(), &config.think)?;
    let app = App {
        store: &gateway,
        assistant,
        config: &config,
        output_dir: cli.output_dir,
    };

    match cli.command {
        None => menu(&app).await,
        Some(Command::Upload { file }) => handle_upload(&app, &file).await,
        Some(Command::Register) => handle_register(&app).await,
        Some(Command::Chat { message }) => {
            app.config.require_openrouter_key()?;
            ask(&app, &message, &mut Vec::new()).await;
        }
        Some(Command::Report) => handle_report(&app).await,
        Some(Command::Dashboard) => handle_dashboard(&app).await,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
