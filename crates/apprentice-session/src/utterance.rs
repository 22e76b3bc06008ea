//! What the agent says to the trainer. Pure functions of session state.

use apprentice_core::types::{Confidence, TopicBinding};

pub const COMPLETION_INVITATION: &str =
    "I think I have a great understanding now! You can finalize this knowledge or continue teaching me.";

pub const QUESTIONS_PREAMBLE: &str =
    "Thanks! I have a few more questions to make sure I understand correctly:\n\n";

pub const NO_QUESTIONS_PROMPT: &str =
    "Thanks! I don't have specific questions right now. Tell me more, such as exceptions or edge cases, so I can understand this topic better.";

pub const UNBOUND_NOTICE: &str =
    "No topic is bound to this session, so I can't save or check what you teach yet. I'm keeping your notes and will save them once a topic is chosen.";

const TEACH_PROMPT: &str = "Please explain the core concepts, rules, or policies to me.";

const BULLET: &str = "• ";

/// The agent's reply after a successful analysis.
///
/// At or above `threshold` the trainer is invited to finish; below it every
/// open question is listed as a bullet, in the order given.
pub fn next_utterance(confidence: Confidence, open_questions: &[String], threshold: u8) -> String {
    if confidence.value() >= threshold {
        return COMPLETION_INVITATION.to_string();
    }
    if open_questions.is_empty() {
        return NO_QUESTIONS_PROMPT.to_string();
    }
    let mut text = String::from(QUESTIONS_PREAMBLE);
    for question in open_questions {
        text.push_str(BULLET);
        text.push_str(question);
        text.push('\n');
    }
    text
}

/// The first thing the agent says when a session opens.
pub fn opening_utterance(topic: Option<&TopicBinding>, summary: Option<&str>) -> String {
    let Some(topic) = topic else {
        return UNBOUND_NOTICE.to_string();
    };
    match summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => format!(
            "Here's what I currently know about **{}**:\n\n{}\n\n{}",
            topic.topic_name, summary, TEACH_PROMPT
        ),
        None => format!(
            "I'm ready to learn about **{}**. {}",
            topic.topic_name, TEACH_PROMPT
        ),
    }
}

/// Bullet lines of an utterance, without the bullet marker.
pub fn bullets(utterance: &str) -> Vec<&str> {
    utterance
        .lines()
        .filter_map(|line| line.strip_prefix(BULLET))
        .collect()
}
