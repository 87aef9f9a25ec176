//! Transcripción de la conversación: secuencia ordenada y sólo de añadido.
//!
//! Cada pregunta se añade en dos pasos: `append_pending` (entrada del usuario,
//! antes de la llamada de red) y `resolve` (entrada del asistente). Un
//! `reset` invalida las preguntas pendientes de generaciones anteriores.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ApproachId, ComparisonResult, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptContent {
    Question(String),
    Answer(QueryResult),
    Comparison(ComparisonResult),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub role: Role,
    pub content: TranscriptContent,
    pub timestamp: DateTime<Utc>,
    pub approach: Option<ApproachId>,
}

impl TranscriptEntry {
    fn new(role: Role, content: TranscriptContent, approach: Option<ApproachId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
            approach,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self.content, TranscriptContent::Comparison(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.content, TranscriptContent::Failure(_))
    }
}

/// Resultado de una pregunta ya enviada, listo para añadirse como respuesta.
#[derive(Debug, Clone)]
pub enum Resolution {
    Answer(QueryResult),
    Comparison(ComparisonResult),
    Failure(String),
}

/// Pregunta pendiente de respuesta.
#[derive(Debug)]
#[must_use]
pub struct PendingTicket {
    generation: u64,
    approach: ApproachId,
}

impl PendingTicket {
    pub fn approach(&self) -> ApproachId {
        self.approach
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    generation: u64,
}

impl Transcript {
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Añade la pregunta del usuario y devuelve el ticket para resolverla.
    /// El enfoque viaja en el ticket y sólo se anota en la respuesta.
    pub fn append_pending(&mut self, question: String, approach: ApproachId) -> PendingTicket {
        self.entries.push(TranscriptEntry::new(
            Role::User,
            TranscriptContent::Question(question),
            None,
        ));
        PendingTicket {
            generation: self.generation,
            approach,
        }
    }

    /// Añade la respuesta del asistente. Devuelve `false` si la transcripción
    /// se vació mientras la pregunta estaba en vuelo (la respuesta se descarta).
    pub fn resolve(&mut self, ticket: PendingTicket, resolution: Resolution) -> bool {
        if ticket.generation != self.generation {
            return false;
        }

        let entry = match resolution {
            Resolution::Answer(result) => TranscriptEntry::new(
                Role::Assistant,
                TranscriptContent::Answer(result),
                Some(ticket.approach),
            ),
            Resolution::Comparison(result) => TranscriptEntry::new(
                Role::Assistant,
                TranscriptContent::Comparison(result),
                Some(ticket.approach),
            ),
            Resolution::Failure(message) => TranscriptEntry::new(
                Role::Assistant,
                TranscriptContent::Failure(format!("Error: {message}")),
                None,
            ),
        };
        self.entries.push(entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }
}
