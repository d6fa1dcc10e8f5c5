//! Typed view of the persisted voting record.
//!
//! The store validates model output only as JSON, so a record on disk may
//! lack fields or carry extra ones. These types are what downstream readers
//! deserialize into; every field tolerates absence.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One session's minutes, as extracted by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingRecord {
    #[serde(default)]
    pub metadata_ata: SessionMetadata,
    #[serde(default)]
    pub votacoes: Vec<VotingEvent>,
}

/// Session-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Echo of the document digest sent in the prompt.
    #[serde(default)]
    pub ata_id: String,
    #[serde(default)]
    pub titulo_sessao: String,
    /// `YYYY-MM-DD` as produced by the model; not validated.
    #[serde(default)]
    pub data_sessao: String,
    #[serde(default)]
    pub numero_sessao: Option<i64>,
    #[serde(default)]
    pub tipo_sessao: String,
}

/// A single matter put to a vote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingEvent {
    #[serde(default)]
    pub objeto_da_votacao: String,
    /// PL/PDL identifiers referenced by the matter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projetos_relacionados: Vec<String>,
    #[serde(default)]
    pub resumo: String,
    #[serde(default)]
    pub resultado: String,
    #[serde(default)]
    pub votos: Vec<MemberVote>,
}

/// How one council member voted.
///
/// `voto` is free text ("Sim", "Não", "contrário", "ausente", ...): the
/// model's vocabulary is not fixed, so it is not an enum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberVote {
    pub vereador: String,
    pub voto: String,
}

impl VotingRecord {
    /// Read a canonical record written by [`crate::pipeline::store`].
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Total votes cast across all events.
    pub fn vote_count(&self) -> usize {
        self.votacoes.iter().map(|v| v.votos.len()).sum()
    }
}
