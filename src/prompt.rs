//! Prompt construction for check-in enrichment.

use crate::model::CheckIn;

/// Build the generation prompt from a check-in's mood, energy and notes.
///
/// Pure and total: same check-in, same prompt, no failure modes. Absent notes
/// are substituted with an empty string rather than omitted, so the prompt
/// shape stays fixed.
pub fn build_prompt(check_in: &CheckIn) -> String {
    let notes = check_in.notes.as_deref().unwrap_or("");
    format!(
        "You are a well-being assistant. The user reported mood: {}, \
         energy level: {}. Notes: {}. Write a short recommendation \
         (1-2 sentences) and, if possible, state your confidence in the \
         recommendation as a number between 0 and 1.",
        check_in.mood, check_in.energy_level, notes
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnergyLevel, Mood};
    use chrono::Utc;

    fn check_in(notes: Option<&str>) -> CheckIn {
        CheckIn {
            id: 1,
            user_id: 1,
            mood: Mood::Happy,
            energy_level: EnergyLevel::High,
            notes: notes.map(String::from),
            created_at: Utc::now(),
            generated_message_id: None,
        }
    }

    #[test]
    fn prompt_includes_mood_energy_and_notes() {
        let prompt = build_prompt(&check_in(Some("Great day")));
        assert!(prompt.contains("mood: HAPPY"));
        assert!(prompt.contains("energy level: HIGH"));
        assert!(prompt.contains("Notes: Great day."));
    }

    #[test]
    fn prompt_substitutes_empty_string_for_missing_notes() {
        let prompt = build_prompt(&check_in(None));
        assert!(prompt.contains("Notes: ."));
    }

    #[test]
    fn prompt_is_deterministic() {
        let ci = check_in(Some("same"));
        assert_eq!(build_prompt(&ci), build_prompt(&ci));
    }
}
