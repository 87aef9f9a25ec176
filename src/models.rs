//! Modelos de dominio: enfoques de recuperación, resultados de consulta,
//! estadísticas del grafo y costes acumulados devueltos por el backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Estrategia real de recuperación que el backend sabe ejecutar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approach {
    Graph,
    Rag,
    Hybrid,
}

impl Approach {
    pub const ALL: [Approach; 3] = [Approach::Graph, Approach::Rag, Approach::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Rag => "rag",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Graph => "Graph",
            Self::Rag => "RAG",
            Self::Hybrid => "Hybrid",
        }
    }
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selección del operador: un enfoque concreto o la comparación de todos.
/// `Comparison` es un meta-enfoque y nunca aparece dentro de un resultado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproachId {
    Graph,
    Rag,
    Hybrid,
    Comparison,
}

impl ApproachId {
    /// El enfoque real asociado, o `None` para la comparación.
    pub fn retrieval(&self) -> Option<Approach> {
        match self {
            Self::Graph => Some(Approach::Graph),
            Self::Rag => Some(Approach::Rag),
            Self::Hybrid => Some(Approach::Hybrid),
            Self::Comparison => None,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Self::Comparison)
    }

    pub fn as_str(&self) -> &'static str {
        match self.retrieval() {
            Some(approach) => approach.as_str(),
            None => "comparison",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self.retrieval() {
            Some(approach) => approach.display_name(),
            None => "Comparison",
        }
    }
}

impl From<Approach> for ApproachId {
    fn from(approach: Approach) -> Self {
        match approach {
            Approach::Graph => Self::Graph,
            Approach::Rag => Self::Rag,
            Approach::Hybrid => Self::Hybrid,
        }
    }
}

impl fmt::Display for ApproachId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApproachId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "graph" => Ok(Self::Graph),
            "rag" => Ok(Self::Rag),
            "hybrid" => Ok(Self::Hybrid),
            "comparison" => Ok(Self::Comparison),
            other => Err(format!(
                "Enfoque no soportado: {other} (usa graph, rag, hybrid o comparison)"
            )),
        }
    }
}

// --- Consultas ---

/// Resultado de una consulta con un único enfoque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub context: String,
    pub approach: Approach,
}

/// Ejecución de un enfoque dentro de una comparación. Los tiempos están en
/// segundos y los calcula el backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachRun {
    pub name: String,
    pub answer: String,
    #[serde(default)]
    pub context: String,
    pub context_length: usize,
    pub total_time: f64,
    pub retrieval_time: f64,
    pub answer_time: f64,
}

impl ApproachRun {
    pub fn context_length_matches(&self) -> bool {
        self.context.chars().count() == self.context_length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub fastest: Approach,
    pub richest_context: Approach,
}

/// Resultado de la comparación: una ejecución por enfoque real más el
/// resumen de rendimiento que decide el backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub question: String,
    pub results: BTreeMap<Approach, ApproachRun>,
    pub performance_summary: PerformanceSummary,
}

// --- Estadísticas del grafo ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeCount {
    pub labels: Vec<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: u64,
    pub relationships: u64,
    #[serde(default)]
    pub entity_types: Vec<EntityTypeCount>,
}

impl GraphStats {
    /// Densidad de un grafo dirigido: relaciones / (n·(n-1)), 0 si n <= 1.
    pub fn density(&self) -> f64 {
        if self.nodes > 1 {
            self.relationships as f64 / (self.nodes as f64 * (self.nodes - 1) as f64)
        } else {
            0.0
        }
    }

    /// Tipos de entidad ordenados de mayor a menor número de nodos.
    pub fn entity_types_by_count(&self) -> Vec<&EntityTypeCount> {
        let mut types: Vec<&EntityTypeCount> = self.entity_types.iter().collect();
        types.sort_by(|a, b| b.count.cmp(&a.count));
        types
    }

    pub fn max_entity_count(&self) -> u64 {
        self.entity_types.iter().map(|t| t.count).max().unwrap_or(0)
    }

    pub fn entity_type_count(&self) -> usize {
        self.entity_types.len()
    }
}

// --- Costes ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_operations: u64,
    pub average_cost_per_operation: f64,
    #[serde(default)]
    pub costs_by_operation: BTreeMap<String, f64>,
}

impl CostSnapshot {
    /// Operaciones ordenadas de mayor a menor coste.
    pub fn operations_by_cost(&self) -> Vec<(&str, f64)> {
        let mut ops: Vec<(&str, f64)> = self
            .costs_by_operation
            .iter()
            .map(|(op, cost)| (op.as_str(), *cost))
            .collect();
        ops.sort_by(|a, b| b.1.total_cmp(&a.1));
        ops
    }

    pub fn operation_label(operation: &str) -> String {
        operation.replace('_', " ")
    }

    /// Comprueba que la media coincide con total / operaciones.
    pub fn average_is_consistent(&self) -> bool {
        if self.total_operations == 0 {
            return true;
        }
        let expected = self.total_cost / self.total_operations as f64;
        (expected - self.average_cost_per_operation).abs() <= 1e-6_f64.max(expected.abs() * 1e-3)
    }
}

// --- Construcción del grafo ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub nodes: u64,
    pub relationships: u64,
}

/// Delta estructural devuelto por la ingesta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub stats: BuildStats,
    pub entities_created: u64,
    pub relationships_created: u64,
    #[serde(default)]
    pub entities_failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDetails {
    pub entities_created: u64,
    pub relationships_created: u64,
    pub entities_failed: u64,
    pub nodes: u64,
    pub relationships: u64,
}

/// Estado visible del último intento de construcción.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStatus {
    pub kind: StatusKind,
    pub message: String,
    pub details: Option<BuildDetails>,
}

impl BuildStatus {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            message: message.into(),
            details: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
            details: None,
        }
    }

    pub fn success_from(result: &BuildResult) -> Self {
        Self {
            kind: StatusKind::Success,
            message: format!(
                "¡Grafo construido correctamente! Se crearon {} nodos y {} relaciones.",
                result.stats.nodes, result.stats.relationships
            ),
            details: Some(BuildDetails {
                entities_created: result.entities_created,
                relationships_created: result.relationships_created,
                entities_failed: result.entities_failed,
                nodes: result.stats.nodes,
                relationships: result.stats.relationships,
            }),
        }
    }
}

// --- Instantáneas ---

/// Última copia conocida de un agregado del backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
    NotLoaded,
    Available { value: T, fetched_at: DateTime<Utc> },
    /// La última lectura falló; no se muestran datos antiguos como actuales.
    Unavailable { reason: String },
}

impl<T> Snapshot<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Available { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::NotLoaded
    }
}
