//! Presentación en texto plano del estado de la sesión para la consola.

use crate::{
    models::{ApproachRun, BuildStatus, CostSnapshot, GraphStats, Snapshot, StatusKind},
    transcript::{Role, TranscriptContent, TranscriptEntry},
};

const BAR_WIDTH: usize = 16;

pub fn format_ms(seconds: f64) -> String {
    format!("{:.0}ms", seconds * 1000.0)
}

pub fn format_cost(cost: f64) -> String {
    format!("${cost:.4}")
}

pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn bar(count: u64, max: u64) -> String {
    let filled = if max == 0 {
        0
    } else {
        ((count as f64 / max as f64) * BAR_WIDTH as f64).round() as usize
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)))
}

pub fn render_entry(entry: &TranscriptEntry) -> String {
    let time = entry.timestamp.format("%H:%M:%S");
    match &entry.content {
        TranscriptContent::Question(question) => format!("[{time}] > {question}"),
        TranscriptContent::Answer(result) => {
            let mut out = format!(
                "[{time}] [{}]\nRespuesta: {}",
                result.approach.display_name(),
                result.answer
            );
            if !result.context.is_empty() {
                out.push_str(&format!("\nContexto: {}", result.context));
            }
            out
        }
        TranscriptContent::Comparison(result) => {
            let summary = &result.performance_summary;
            let mut out = format!(
                "[{time}] Resumen de rendimiento\n  Más rápido: {}\n  Contexto más rico: {}",
                summary.fastest.display_name(),
                summary.richest_context.display_name()
            );
            for run in result.results.values() {
                out.push('\n');
                out.push_str(&render_run(run));
            }
            out
        }
        TranscriptContent::Failure(message) => format!("[{time}] ⚠ {message}"),
    }
}

fn render_run(run: &ApproachRun) -> String {
    format!(
        "── {} ({})\n  Respuesta: {}\n  Context ({} chars): {}\n  Recuperación: {} · Generación: {}",
        run.name,
        format_ms(run.total_time),
        run.answer,
        run.context_length,
        run.context,
        format_ms(run.retrieval_time),
        format_ms(run.answer_time)
    )
}

pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    if entries.is_empty() {
        return "(la conversación está vacía)".to_string();
    }
    let body = entries
        .iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n\n");
    let questions = entries.iter().filter(|e| e.role == Role::User).count();
    let comparisons = entries.iter().filter(|e| e.is_comparison()).count();
    let errors = entries.iter().filter(|e| e.is_error()).count();
    format!("{body}\n\n[{questions} preguntas, {comparisons} comparaciones, {errors} errores]")
}

/// Línea de cabecera con totales de coste y tamaño del grafo, si se conocen.
pub fn render_header(stats: &Snapshot<GraphStats>, costs: &Snapshot<CostSnapshot>) -> String {
    let mut parts = vec!["GraphRAG".to_string()];
    if let Some(costs) = costs.value() {
        parts.push(format_cost(costs.total_cost));
        parts.push(format!("{} tokens", format_thousands(costs.total_tokens)));
    }
    if let Some(stats) = stats.value() {
        parts.push(format!("{} nodos", stats.nodes));
        parts.push(format!("{} relaciones", stats.relationships));
    }
    parts.join(" | ")
}

pub fn render_stats_panel(stats: &Snapshot<GraphStats>) -> String {
    let Some(stats) = stats.value() else {
        return "No hay datos del grafo disponibles".to_string();
    };

    let mut out = format!(
        "Nodos: {}\nRelaciones: {}\nDensidad: {:.1}%\nTipos de entidad: {}",
        stats.nodes,
        stats.relationships,
        stats.density() * 100.0,
        stats.entity_type_count()
    );
    let max = stats.max_entity_count();
    for entity_type in stats.entity_types_by_count() {
        out.push_str(&format!(
            "\n  {:<24} {} {}",
            entity_type.labels.join(", "),
            bar(entity_type.count, max),
            entity_type.count
        ));
    }
    out
}

pub fn render_cost_panel(costs: &Snapshot<CostSnapshot>) -> String {
    let Some(costs) = costs.value() else {
        return "No hay datos de costes disponibles".to_string();
    };

    let mut out = format!(
        "Coste total: {}\nTokens: {}\nOperaciones: {}\nCoste medio/op: {}",
        format_cost(costs.total_cost),
        format_thousands(costs.total_tokens),
        costs.total_operations,
        format_cost(costs.average_cost_per_operation)
    );
    for (operation, cost) in costs.operations_by_cost() {
        out.push_str(&format!(
            "\n  {:<24} {}",
            CostSnapshot::operation_label(operation),
            format_cost(cost)
        ));
    }
    out
}

pub fn render_build_status(status: &BuildStatus) -> String {
    let icon = match status.kind {
        StatusKind::Info => "ℹ",
        StatusKind::Success => "✔",
        StatusKind::Error => "✖",
    };
    let mut out = format!("{icon} {}", status.message);
    if let (StatusKind::Success, Some(details)) = (status.kind, &status.details) {
        out.push_str(&format!(
            "\n  • Entidades creadas: {}\n  • Relaciones creadas: {}",
            details.entities_created, details.relationships_created
        ));
        out.push_str(&format!(
            "\n  • Grafo: {} nodos, {} relaciones",
            details.nodes, details.relationships
        ));
        if details.entities_failed > 0 {
            out.push_str(&format!(
                "\n  • Entidades fallidas: {}",
                details.entities_failed
            ));
        }
    }
    out
}
