//! Spoken reminder phrasing.

use rand::Rng;

use crate::domain::ScheduleEntry;

/// Chooses one of `count` phrasings
pub trait PhraseSelector: Send + Sync {
    /// Must return a value in `0..count`; `count` is never zero
    fn pick(&self, count: usize) -> usize;
}

/// Uniformly random phrasing
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPhrases;

impl PhraseSelector for RandomPhrases {
    fn pick(&self, count: usize) -> usize {
        rand::thread_rng().gen_range(0..count)
    }
}

/// Always the first phrasing. Deterministic, for tests and quiet setups.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstPhrase;

impl PhraseSelector for FirstPhrase {
    fn pick(&self, _count: usize) -> usize {
        0
    }
}

const TEMPLATES: [&str; 3] = [
    "{user}, it is time for {action_lower}",
    "Reminder: {action}",
    "{user}, you have {action} scheduled now",
];

/// Build the spoken reminder for `entry`
pub fn voice_message(
    entry: &ScheduleEntry,
    user_name: &str,
    selector: &dyn PhraseSelector,
) -> String {
    let index = selector.pick(TEMPLATES.len()).min(TEMPLATES.len() - 1);
    let mut message = TEMPLATES[index]
        .replace("{user}", user_name)
        .replace("{action_lower}", &entry.action_name.to_lowercase())
        .replace("{action}", &entry.action_name);

    let objective = entry.objective.trim();
    if !objective.is_empty() {
        message.push_str(". ");
        message.push_str(objective);
    }
    message
}
