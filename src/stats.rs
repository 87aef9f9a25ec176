//! Lectores de agregados del backend: estadísticas del grafo y costes acumulados.
//! Lecturas puras e idempotentes.

use tracing::warn;

use crate::{
    api_client::{self, ApiClient},
    error::ClientError,
    models::{CostSnapshot, GraphStats},
};

pub const STATS_ENDPOINT: &str = "/graph/stats";
pub const COSTS_ENDPOINT: &str = "/costs/current";

pub async fn fetch_graph_stats(client: &ApiClient) -> Result<GraphStats, ClientError> {
    let response = client.get(STATS_ENDPOINT).await?;
    api_client::decode(
        api_client::unwrap_field(response, "data")?,
        "estadísticas del grafo",
    )
}

pub async fn fetch_cost_snapshot(client: &ApiClient) -> Result<CostSnapshot, ClientError> {
    let response = client.get(COSTS_ENDPOINT).await?;
    let costs: CostSnapshot =
        api_client::decode(api_client::unwrap_field(response, "data")?, "costes")?;
    if !costs.average_is_consistent() {
        warn!(
            total_cost = costs.total_cost,
            total_operations = costs.total_operations,
            average = costs.average_cost_per_operation,
            "El coste medio por operación no cuadra con los totales"
        );
    }
    Ok(costs)
}
