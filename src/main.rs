// Módulos de la aplicación
mod api_client;
mod app_state;
mod comparison;
mod config;
mod error;
mod ingest;
mod models;
mod rag;
mod render;
mod stats;
mod transcript;

#[cfg(test)]
mod test_support;

use crate::api_client::ApiClient;
use crate::app_state::{
    AppState, BuildPhase, BuildSubmission, QueryPhase, QuerySubmission, Rejection,
    CLEARING_MESSAGE,
};
use crate::models::ApproachId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
Comandos:
  <pregunta>              consulta el grafo con el enfoque actual
  /build <texto>          extrae entidades y relaciones del texto
  /rebuild <texto>        igual, pero borrando antes el grafo existente
  /approach <enfoque>     graph | rag | hybrid | comparison
  /stats                  estadísticas del grafo
  /costs                  costes acumulados
  /history                muestra la conversación
  /reset                  vacía la conversación
  /help                   esta ayuda
  /quit                   salir";

/// Línea introducida por el operador, ya interpretada.
#[derive(Debug, PartialEq)]
enum Command {
    Question(String),
    Build { text: String, clear_existing: bool },
    Approach(String),
    Stats,
    Costs,
    History,
    Reset,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Question(line.to_string());
    }

    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim().to_string();
    match name {
        "/build" => Command::Build { text: rest, clear_existing: false },
        "/rebuild" => Command::Build { text: rest, clear_existing: true },
        "/approach" => Command::Approach(rest),
        "/stats" => Command::Stats,
        "/costs" => Command::Costs,
        "/history" => Command::History,
        "/reset" => Command::Reset,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging (a stderr, la consola usa stdout)
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env()?;
    let client = ApiClient::from_config(&cfg);
    info!("Backend GraphRAG configurado en {}", client.base_url());

    // 3. Crear el estado de la sesión y cargar estadísticas y costes
    let app_state = AppState::new(client, cfg.default_approach);
    app_state.initial_load().await;
    if !app_state.graph_stats().is_available() {
        warn!("No se pudieron cargar las estadísticas iniciales; ¿está el backend en marcha?");
    }
    println!("{}", render::render_header(&app_state.graph_stats(), &app_state.costs()));
    println!("Enfoque actual: {}", app_state.approach().display_name());
    println!("{HELP}");

    // 4. Bucle de la consola hasta /quit, EOF o Ctrl-C
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Señal de apagado recibida.");
                break;
            }
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Command::Quit => break,
            command => {
                handle_command(&app_state, command);
            }
        }
    }

    info!("✅ Consola cerrada correctamente.");
    Ok(())
}

/// Ejecuta un comando. Las llamadas de red se lanzan en tareas para que el
/// operador pueda seguir escribiendo; la máquina de estados rechaza los
/// envíos duplicados. Devuelve la tarea lanzada, si la hay.
fn handle_command(app_state: &AppState, command: Command) -> Option<JoinHandle<()>> {
    match command {
        Command::Question(question) => {
            if app_state.query_phase() == QueryPhase::Idle {
                let approach = app_state.approach();
                println!(
                    "{}",
                    if approach.is_comparison() { "Comparando enfoques..." } else { "Pensando..." }
                );
            }
            let state = app_state.clone();
            Some(tokio::spawn(async move {
                let outcome = state.submit_question(&question).await;
                report_question(&state, outcome);
            }))
        }
        Command::Build { text, clear_existing } => {
            if clear_existing
                && !text.trim().is_empty()
                && app_state.build_phase() == BuildPhase::Idle
            {
                println!("ℹ {CLEARING_MESSAGE}");
            }
            let state = app_state.clone();
            Some(tokio::spawn(async move {
                let outcome = state.submit_build(&text, clear_existing).await;
                report_build(&state, outcome);
            }))
        }
        Command::Approach(name) => {
            match name.parse::<ApproachId>() {
                Ok(approach) => {
                    app_state.set_approach(approach);
                    println!("Enfoque actual: {}", approach.display_name());
                }
                Err(e) => println!("{e}"),
            }
            None
        }
        Command::Stats => {
            let state = app_state.clone();
            Some(tokio::spawn(async move {
                state.refresh_graph_stats().await;
                println!("{}", render::render_stats_panel(&state.graph_stats()));
            }))
        }
        Command::Costs => {
            let state = app_state.clone();
            Some(tokio::spawn(async move {
                state.refresh_costs().await;
                println!("{}", render::render_cost_panel(&state.costs()));
            }))
        }
        Command::History => {
            println!("{}", render::render_transcript(&app_state.transcript()));
            None
        }
        Command::Reset => {
            let cleared = app_state.transcript_len();
            app_state.reset_transcript();
            println!("Conversación vaciada ({cleared} mensajes).");
            None
        }
        Command::Help => {
            println!("{HELP}");
            None
        }
        Command::Unknown(name) => {
            warn!("Comando desconocido: {}", name);
            println!("Comando desconocido: {name} (usa /help)");
            None
        }
        Command::Empty | Command::Quit => None,
    }
}

fn rejection_message(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::EmptyInput => "Escribe una pregunta o un texto antes de enviarlo.",
        Rejection::QueryInFlight => "Ya hay una consulta en curso; espera la respuesta.",
        Rejection::BuildInFlight => "Ya hay una construcción en curso; espera a que termine.",
    }
}

fn report_question(state: &AppState, outcome: QuerySubmission) {
    match outcome {
        QuerySubmission::Rejected(rejection) => println!("{}", rejection_message(rejection)),
        QuerySubmission::Answered | QuerySubmission::Failed(_) => {
            if let Some(entry) = state.transcript().last() {
                println!("{}", render::render_entry(entry));
            }
            println!("{}", render::render_header(&state.graph_stats(), &state.costs()));
        }
        QuerySubmission::Discarded => {
            println!("Respuesta descartada: la conversación se vació mientras tanto.");
        }
    }
}

fn report_build(state: &AppState, outcome: BuildSubmission) {
    if let BuildSubmission::Rejected(Rejection::BuildInFlight) = outcome {
        println!("{}", rejection_message(Rejection::BuildInFlight));
        return;
    }
    if let Some(status) = state.build_status() {
        println!("{}", render::render_build_status(&status));
    }
    println!("{}", render::render_header(&state.graph_stats(), &state.costs()));
}
