//! Estado de la sesión y máquina de estados de la conversación.
//!
//! `AppState` es el único dueño de la transcripción, del enfoque elegido, de
//! los indicadores de espera y de las instantáneas de estadísticas y costes.
//! Todo cambio pasa por sus transiciones; el `Mutex` nunca se mantiene a
//! través de un `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    api_client::ApiClient,
    comparison,
    error::{ClientError, ErrorKind},
    ingest,
    models::{ApproachId, BuildResult, BuildStatus, CostSnapshot, GraphStats, Snapshot},
    rag, stats,
    transcript::{Resolution, Transcript, TranscriptEntry},
};

pub const CLEARING_MESSAGE: &str = "Limpiando los datos existentes del grafo...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPhase {
    #[default]
    Idle,
    AwaitingQueryResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildPhase {
    #[default]
    Idle,
    AwaitingBuildResponse,
}

/// Motivo por el que una transición se ignoró sin tocar la red.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyInput,
    QueryInFlight,
    BuildInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySubmission {
    Rejected(Rejection),
    Answered,
    /// Respuesta recibida, pero la transcripción se vació mientras tanto.
    Discarded,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSubmission {
    Rejected(Rejection),
    Built(BuildResult),
    Failed(ErrorKind),
}

#[derive(Debug)]
struct SessionState {
    transcript: Transcript,
    input_draft: String,
    selected_approach: ApproachId,
    query_phase: QueryPhase,
    build_phase: BuildPhase,
    build_status: Option<BuildStatus>,
    graph_stats: Snapshot<GraphStats>,
    costs: Snapshot<CostSnapshot>,
}

#[derive(Clone)]
pub struct AppState {
    client: ApiClient,
    state: Arc<Mutex<SessionState>>,
}

impl AppState {
    pub fn new(client: ApiClient, default_approach: ApproachId) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(SessionState {
                transcript: Transcript::default(),
                input_draft: String::new(),
                selected_approach: default_approach,
                query_phase: QueryPhase::Idle,
                build_phase: BuildPhase::Idle,
                build_status: None,
                graph_stats: Snapshot::NotLoaded,
                costs: Snapshot::NotLoaded,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Lecturas ---

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.state().transcript.entries().to_vec()
    }

    pub fn transcript_len(&self) -> usize {
        self.state().transcript.len()
    }

    pub fn approach(&self) -> ApproachId {
        self.state().selected_approach
    }

    pub fn input_draft(&self) -> String {
        self.state().input_draft.clone()
    }

    pub fn query_phase(&self) -> QueryPhase {
        self.state().query_phase
    }

    pub fn build_phase(&self) -> BuildPhase {
        self.state().build_phase
    }

    pub fn build_status(&self) -> Option<BuildStatus> {
        self.state().build_status.clone()
    }

    pub fn graph_stats(&self) -> Snapshot<GraphStats> {
        self.state().graph_stats.clone()
    }

    pub fn costs(&self) -> Snapshot<CostSnapshot> {
        self.state().costs.clone()
    }

    // --- Transiciones síncronas ---

    /// Cambia el enfoque para el próximo envío; no afecta a una llamada en vuelo.
    pub fn set_approach(&self, approach: ApproachId) {
        self.state().selected_approach = approach;
    }

    pub fn set_input_draft(&self, text: impl Into<String>) {
        self.state().input_draft = text.into();
    }

    /// Vacía la transcripción. Sin efectos en el backend; válido en cualquier estado.
    pub fn reset_transcript(&self) {
        let mut state = self.state();
        if !state.transcript.is_empty() {
            info!(entries = state.transcript.len(), "Transcripción vaciada");
        }
        state.transcript.clear();
    }

    // --- Consultas ---

    /// Envía el borrador actual como pregunta.
    pub async fn submit_input(&self) -> QuerySubmission {
        let draft = self.input_draft();
        self.submit_question(&draft).await
    }

    /// Añade la pregunta a la transcripción antes de la llamada y la despacha
    /// al cliente de consulta o al de comparación según el enfoque elegido.
    /// Si ya hay una pregunta en vuelo o la pregunta está vacía no hace nada.
    pub async fn submit_question(&self, question: &str) -> QuerySubmission {
        let ticket = {
            let mut state = self.state();
            if question.trim().is_empty() {
                return QuerySubmission::Rejected(Rejection::EmptyInput);
            }
            if state.query_phase == QueryPhase::AwaitingQueryResponse {
                return QuerySubmission::Rejected(Rejection::QueryInFlight);
            }
            state.query_phase = QueryPhase::AwaitingQueryResponse;
            state.input_draft.clear();
            let approach = state.selected_approach;
            state.transcript.append_pending(question.to_string(), approach)
        };

        let approach = ticket.approach();
        let outcome = match approach.retrieval() {
            Some(retrieval) => rag::query(&self.client, question, retrieval)
                .await
                .map(Resolution::Answer),
            None => comparison::compare(&self.client, question)
                .await
                .map(Resolution::Comparison),
        };

        match outcome {
            Ok(resolution) => {
                let kept = self.state().transcript.resolve(ticket, resolution);
                if !kept {
                    info!(%approach, "Respuesta descartada: la transcripción se vació durante la consulta");
                }
                self.refresh_costs().await;
                self.state().query_phase = QueryPhase::Idle;
                if kept {
                    QuerySubmission::Answered
                } else {
                    QuerySubmission::Discarded
                }
            }
            Err(e) => {
                error!(%approach, "Error en la consulta: {}", e);
                let kind = e.kind();
                let kept = self
                    .state()
                    .transcript
                    .resolve(ticket, Resolution::Failure(e.to_string()));
                self.state().query_phase = QueryPhase::Idle;
                if kept {
                    QuerySubmission::Failed(kind)
                } else {
                    QuerySubmission::Discarded
                }
            }
        }
    }

    // --- Construcción del grafo ---

    /// Envía texto para construir el grafo. El texto vacío sólo deja un
    /// estado de error, sin llamada de red. Termine como termine, se intentan
    /// refrescar estadísticas y costes.
    pub async fn submit_build(&self, text: &str, clear_existing: bool) -> BuildSubmission {
        {
            let mut state = self.state();
            if state.build_phase == BuildPhase::AwaitingBuildResponse {
                return BuildSubmission::Rejected(Rejection::BuildInFlight);
            }
            if let Err(e) = ingest::validate_text(text) {
                state.build_status = Some(BuildStatus::error(e.to_string()));
                return BuildSubmission::Rejected(Rejection::EmptyInput);
            }
            state.build_phase = BuildPhase::AwaitingBuildResponse;
            state.build_status = clear_existing.then(|| BuildStatus::info(CLEARING_MESSAGE));
        }

        let submission = match ingest::build_graph(&self.client, text, clear_existing).await {
            Ok(result) => {
                self.state().build_status = Some(BuildStatus::success_from(&result));
                BuildSubmission::Built(result)
            }
            Err(e) => {
                error!("Error construyendo el grafo: {}", e);
                self.state().build_status = Some(BuildStatus::error(format!(
                    "Error al construir el grafo: {e}"
                )));
                BuildSubmission::Failed(e.kind())
            }
        };

        self.refresh_all().await;
        self.state().build_phase = BuildPhase::Idle;
        submission
    }

    // --- Instantáneas ---

    /// Carga inicial de estadísticas y costes.
    pub async fn initial_load(&self) {
        self.refresh_all().await;
    }

    /// Refresca ambas instantáneas a la vez; cada una gana con su última lectura.
    pub async fn refresh_all(&self) {
        futures::join!(self.refresh_graph_stats(), self.refresh_costs());
    }

    pub async fn refresh_graph_stats(&self) {
        let snapshot = into_snapshot(stats::fetch_graph_stats(&self.client).await, "estadísticas");
        self.state().graph_stats = snapshot;
    }

    pub async fn refresh_costs(&self) {
        let snapshot = into_snapshot(stats::fetch_cost_snapshot(&self.client).await, "costes");
        self.state().costs = snapshot;
    }
}

/// Un fallo de refresco nunca se propaga: deja el panel como no disponible.
fn into_snapshot<T>(result: Result<T, ClientError>, what: &str) -> Snapshot<T> {
    match result {
        Ok(value) => Snapshot::Available {
            value,
            fetched_at: Utc::now(),
        },
        Err(e) => {
            warn!("No se pudieron cargar las {what}: {e}");
            Snapshot::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}
