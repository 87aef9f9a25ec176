//! Backend GraphRAG simulado para los tests: un servidor axum en un puerto
//! efímero con los cinco endpoints, contadores por endpoint, interruptores de
//! fallo y compuertas para retener respuestas.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::api_client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Build,
    Query,
    Comparison,
    Stats,
    Costs,
}

impl Endpoint {
    fn label(&self) -> &'static str {
        match self {
            Self::Build => "Build",
            Self::Query => "Query",
            Self::Comparison => "Comparison",
            Self::Stats => "Stats",
            Self::Costs => "Costs",
        }
    }
}

type ApiFailure = (StatusCode, Json<Value>);

#[derive(Default)]
struct MockGraph {
    /// nombre -> etiqueta
    entities: BTreeMap<String, String>,
    relationships: u64,
}

#[derive(Default)]
struct Ledger {
    total_cost: f64,
    total_tokens: u64,
    total_operations: u64,
    by_operation: BTreeMap<String, f64>,
}

impl Ledger {
    fn charge(&mut self, operation: &str, cost: f64, tokens: u64) {
        self.total_cost += cost;
        self.total_tokens += tokens;
        self.total_operations += 1;
        *self.by_operation.entry(operation.to_string()).or_default() += cost;
    }
}

#[derive(Default)]
struct Inner {
    hits: HashMap<Endpoint, usize>,
    failing: HashSet<Endpoint>,
    held: HashMap<Endpoint, Arc<Semaphore>>,
    graph: MockGraph,
    ledger: Ledger,
    last_clear_existing: Option<bool>,
    last_verbose: Option<bool>,
    last_approach: Option<String>,
    wrong_approach_tag: bool,
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Inner>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MockBackend {
    shared: Shared,
    base_url: String,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let shared = Shared::default();
        let app = Router::new()
            .route("/graph/build", post(build_handler))
            .route("/graph/query", post(query_handler))
            .route("/comparison/query", post(comparison_handler))
            .route("/graph/stats", get(stats_handler))
            .route("/costs/current", get(costs_handler))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("no se pudo abrir un puerto para el backend simulado");
        let addr = listener.local_addr().expect("dirección local");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            shared,
            base_url: format!("http://{addr}"),
            server,
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.base_url.clone())
    }

    pub fn hits(&self, endpoint: Endpoint) -> usize {
        self.shared.lock().hits.get(&endpoint).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.shared.lock().hits.values().sum()
    }

    pub fn fail(&self, endpoint: Endpoint, failing: bool) {
        let mut inner = self.shared.lock();
        if failing {
            inner.failing.insert(endpoint);
        } else {
            inner.failing.remove(&endpoint);
        }
    }

    /// Retiene las respuestas de `endpoint` hasta `release`.
    pub fn hold(&self, endpoint: Endpoint) {
        self.shared
            .lock()
            .held
            .insert(endpoint, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, endpoint: Endpoint) {
        if let Some(gate) = self.shared.lock().held.remove(&endpoint) {
            gate.add_permits(1024);
        }
    }

    pub async fn wait_for_hits(&self, endpoint: Endpoint, expected: usize) {
        for _ in 0..500 {
            if self.hits(endpoint) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{endpoint:?} no recibió {expected} peticiones a tiempo");
    }

    pub fn set_wrong_approach_tag(&self, wrong: bool) {
        self.shared.lock().wrong_approach_tag = wrong;
    }

    pub fn last_clear_existing(&self) -> Option<bool> {
        self.shared.lock().last_clear_existing
    }

    pub fn last_verbose(&self) -> Option<bool> {
        self.shared.lock().last_verbose
    }

    pub fn last_approach(&self) -> Option<String> {
        self.shared.lock().last_approach.clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// URL de un puerto local en el que no escucha nadie.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("no se pudo reservar un puerto");
    let addr = listener.local_addr().expect("dirección local");
    drop(listener);
    format!("http://{addr}")
}

// --- Handlers ---

/// Cuenta la petición, espera la compuerta si la hay y aplica el fallo forzado.
async fn enter(shared: &Shared, endpoint: Endpoint) -> Result<(), ApiFailure> {
    let gate = {
        let mut inner = shared.lock();
        *inner.hits.entry(endpoint).or_default() += 1;
        inner.held.get(&endpoint).cloned()
    };
    if let Some(gate) = gate {
        let _permit = gate.acquire().await;
    }

    if shared.lock().failing.contains(&endpoint) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{} backend failure", endpoint.label()) })),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
struct BuildRequest {
    text: String,
    #[serde(default)]
    clear_existing: bool,
}

async fn build_handler(
    State(shared): State<Shared>,
    Json(req): Json<BuildRequest>,
) -> Result<Json<Value>, ApiFailure> {
    shared.lock().last_clear_existing = Some(req.clear_existing);
    enter(&shared, Endpoint::Build).await?;

    if req.text.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No text provided" })),
        ));
    }

    let mut inner = shared.lock();
    if req.clear_existing {
        inner.graph = MockGraph::default();
    }

    let found = extract_entities(&req.text);
    let before = inner.graph.entities.len();
    for (i, name) in found.iter().enumerate() {
        let label = if i == 0 { "Person" } else { "Organization" };
        inner
            .graph
            .entities
            .entry(name.clone())
            .or_insert_with(|| label.to_string());
    }
    let entities_created = inner.graph.entities.len() - before;
    let relationships_created = found.len().saturating_sub(1) as u64;
    inner.graph.relationships += relationships_created;
    inner.ledger.charge("graph_build", 0.002, 400);

    Ok(Json(json!({
        "result": {
            "stats": {
                "nodes": inner.graph.entities.len(),
                "relationships": inner.graph.relationships,
            },
            "entities_created": entities_created,
            "relationships_created": relationships_created,
            "entities_failed": 0,
        }
    })))
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    approach: String,
    #[serde(default)]
    verbose: bool,
}

async fn query_handler(
    State(shared): State<Shared>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Value>, ApiFailure> {
    {
        let mut inner = shared.lock();
        inner.last_verbose = Some(req.verbose);
        inner.last_approach = Some(req.approach.clone());
    }
    enter(&shared, Endpoint::Query).await?;

    let mut inner = shared.lock();
    inner.ledger.charge("query", 0.001, 150);
    let (answer, context) = answer_for(&inner.graph, &req.question);
    let approach = if inner.wrong_approach_tag {
        let other = if req.approach == "rag" { "graph" } else { "rag" };
        other.to_string()
    } else {
        req.approach.clone()
    };

    Ok(Json(json!({
        "answer": answer,
        "context": context,
        "question": req.question,
        "approach": approach,
    })))
}

#[derive(Deserialize)]
struct ComparisonRequest {
    question: String,
}

async fn comparison_handler(
    State(shared): State<Shared>,
    Json(req): Json<ComparisonRequest>,
) -> Result<Json<Value>, ApiFailure> {
    enter(&shared, Endpoint::Comparison).await?;

    let mut inner = shared.lock();
    inner.ledger.charge("comparison", 0.003, 450);
    let (answer, context) = answer_for(&inner.graph, &req.question);
    let first = context.split(", ").next().unwrap_or_default().to_string();

    let runs = [
        ("graph", "Graph-only", context.clone(), 0.1, 0.2),
        ("rag", "Text retrieval", first, 0.05, 0.15),
        ("hybrid", "Hybrid", format!("{context} | {}", req.question), 0.15, 0.25),
    ];

    let mut results = serde_json::Map::new();
    let mut fastest = ("graph", f64::MAX);
    let mut richest = ("graph", 0usize);
    for (key, name, context, retrieval_time, answer_time) in runs {
        let total_time = retrieval_time + answer_time;
        let context_length = context.chars().count();
        if total_time < fastest.1 {
            fastest = (key, total_time);
        }
        if context_length > richest.1 {
            richest = (key, context_length);
        }
        results.insert(
            key.to_string(),
            json!({
                "name": name,
                "answer": answer,
                "context": context,
                "context_length": context_length,
                "total_time": total_time,
                "retrieval_time": retrieval_time,
                "answer_time": answer_time,
            }),
        );
    }

    Ok(Json(json!({
        "results": results,
        "performance_summary": { "fastest": fastest.0, "richest_context": richest.0 },
    })))
}

async fn stats_handler(State(shared): State<Shared>) -> Result<Json<Value>, ApiFailure> {
    enter(&shared, Endpoint::Stats).await?;

    let inner = shared.lock();
    let mut by_label: BTreeMap<&str, u64> = BTreeMap::new();
    for label in inner.graph.entities.values() {
        *by_label.entry(label.as_str()).or_default() += 1;
    }
    let entity_types: Vec<Value> = by_label
        .into_iter()
        .map(|(label, count)| json!({ "labels": [label], "count": count }))
        .collect();

    Ok(Json(json!({
        "data": {
            "nodes": inner.graph.entities.len(),
            "relationships": inner.graph.relationships,
            "entity_types": entity_types,
        }
    })))
}

async fn costs_handler(State(shared): State<Shared>) -> Result<Json<Value>, ApiFailure> {
    enter(&shared, Endpoint::Costs).await?;

    let inner = shared.lock();
    let ledger = &inner.ledger;
    let average = if ledger.total_operations > 0 {
        ledger.total_cost / ledger.total_operations as f64
    } else {
        0.0
    };

    Ok(Json(json!({
        "data": {
            "total_cost": ledger.total_cost,
            "total_tokens": ledger.total_tokens,
            "total_operations": ledger.total_operations,
            "average_cost_per_operation": average,
            "costs_by_operation": ledger.by_operation,
        }
    })))
}

/// Extractor mínimo: palabras en mayúscula, sin puntuación y sin repetir.
fn extract_entities(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().next().is_some_and(char::is_uppercase) && !found.iter().any(|f| f == word) {
            found.push(word.to_string());
        }
    }
    found
}

fn answer_for(graph: &MockGraph, question: &str) -> (String, String) {
    if graph.entities.is_empty() {
        return (
            "No information found in the knowledge graph.".to_string(),
            String::new(),
        );
    }

    let mentioned: Vec<&String> = graph
        .entities
        .keys()
        .filter(|name| question.contains(name.as_str()))
        .collect();
    let relevant: Vec<&String> = if mentioned.is_empty() {
        graph.entities.keys().collect()
    } else {
        mentioned
    };

    let names: Vec<&str> = relevant.iter().map(|s| s.as_str()).collect();
    let context = relevant
        .iter()
        .map(|name| format!("{name} ({})", graph.entities[*name]))
        .collect::<Vec<_>>()
        .join(", ");
    (format!("Known entities: {}", names.join(", ")), context)
}
