//! Deterministic repair of a selection's stage ordering.

use crate::stages::StageId;

/// Enforces the ordering rules on a parsed selection.
///
/// Analysis runs first, the code reader is present whenever the modifier is
/// and precedes both planner and modifier, and the modifier runs last.
/// Returns the repaired order plus one note per repair applied.
#[must_use]
pub fn normalize(selected: &[StageId]) -> (Vec<StageId>, Vec<String>) {
    let mut stages = selected.to_vec();
    let mut notes = Vec::new();

    match stages.iter().position(|s| *s == StageId::RepositoryAnalysis) {
        Some(0) => {}
        Some(index) => {
            stages.remove(index);
            stages.insert(0, StageId::RepositoryAnalysis);
            notes.push("moved repository_analysis to the front".to_string());
        }
        None => {
            stages.insert(0, StageId::RepositoryAnalysis);
            notes.push("inserted repository_analysis as the first stage".to_string());
        }
    }

    if stages.contains(&StageId::Modifier) && !stages.contains(&StageId::CodeReader) {
        stages.insert(1, StageId::CodeReader);
        notes.push("inserted code_reader because gpt needs code content".to_string());
    }

    if let Some(reader) = stages.iter().position(|s| *s == StageId::CodeReader) {
        let first_consumer = stages
            .iter()
            .position(|s| matches!(s, StageId::Planner | StageId::Modifier));
        if let Some(consumer) = first_consumer.filter(|c| *c < reader) {
            stages.remove(reader);
            stages.insert(consumer, StageId::CodeReader);
            notes.push("moved code_reader before planner and gpt".to_string());
        }
    }

    if let Some(modifier) = stages.iter().position(|s| *s == StageId::Modifier) {
        if modifier != stages.len() - 1 {
            stages.remove(modifier);
            stages.push(StageId::Modifier);
            notes.push("moved gpt to the end".to_string());
        }
    }

    (stages, notes)
}
