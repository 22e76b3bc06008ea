//! Line commands and text rendering for the interactive trainer.

use apprentice_core::types::{KnowledgeGap, TopicBinding};
use apprentice_session::{
    AnalysisStatus, Finalized, TrainingSession, TurnReport, WriteFailure, WriteStatus,
};

pub const HELP: &str = "\
Type your explanation and press Enter. Commands:
  :retry               ask the agent to analyze again
  :retry-writes        resubmit knowledge that failed to save
  :finalize            condense what you taught into one stored document
  :bind <id> [name]    bind a topic to a session that has none
  :status              show confidence and open questions
  :help                show this help
  :quit                end the session
Start a line with :: to teach text that begins with a colon.";

/// One line of operator input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Teach(String),
    Retry,
    RetryWrites,
    Finalize,
    Bind(TopicBinding),
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if let Some(literal) = trimmed.strip_prefix("::") {
        return Input::Teach(format!(":{}", literal));
    }
    let Some(command) = trimmed.strip_prefix(':') else {
        return Input::Teach(trimmed.to_string());
    };
    // Only a word right after the colon is a command; ":) yes" is an answer.
    if !command.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Input::Teach(trimmed.to_string());
    }

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match name {
        "retry" => Input::Retry,
        "retry-writes" => Input::RetryWrites,
        "finalize" => Input::Finalize,
        "status" => Input::Status,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        "bind" if !rest.is_empty() => {
            let (topic_id, topic_name) = match rest.split_once(char::is_whitespace) {
                Some((id, name)) if !name.trim().is_empty() => (id, name.trim()),
                _ => (rest, rest),
            };
            Input::Bind(TopicBinding::new(topic_id, topic_name))
        }
        _ => Input::Unknown(trimmed.to_string()),
    }
}

/// Text shown to the operator after a turn.
pub fn render_report(report: &TurnReport) -> String {
    let mut out = String::new();
    if let Some(utterance) = &report.utterance {
        out.push_str(utterance.trim_end());
        out.push('\n');
    }
    match &report.analysis {
        AnalysisStatus::Completed => {
            out.push_str(&format!("[confidence {}]\n", report.confidence));
        }
        AnalysisStatus::Failed {
            error,
            retryable: true,
        } => {
            out.push_str(&format!(
                "[analysis failed: {}; type :retry to try again]\n",
                error
            ));
        }
        AnalysisStatus::Failed { error, .. } => {
            out.push_str(&format!("[analysis failed: {}]\n", error));
        }
        AnalysisStatus::Skipped => {}
    }
    match report.write {
        WriteStatus::Deferred => out.push_str("[kept locally until a topic is bound]\n"),
        WriteStatus::Rejected => out.push_str("[knowledge writer has stopped]\n"),
        WriteStatus::Queued { .. } | WriteStatus::NoIncrement => {}
    }
    out.push_str(&render_failures(&report.failed_writes));
    out
}

pub fn render_failures(failures: &[WriteFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for failure in failures {
        let label = match failure.sequence {
            Some(sequence) => format!("write #{}", sequence),
            None => "unqueued write".to_string(),
        };
        out.push_str(&format!(
            "[{} not saved after {} attempt(s): {}]\n",
            label, failure.attempts, failure.kind
        ));
    }
    out.push_str("[type :retry-writes to resubmit]\n");
    out
}

pub fn render_finalized(finalized: &Finalized) -> String {
    let mut out = format!(
        "Knowledge finalized and saved ({} answer(s) included).\n",
        finalized.qa_pairs
    );
    if !finalized.crystallized_text.is_empty() {
        out.push('\n');
        out.push_str(finalized.crystallized_text.trim_end());
        out.push('\n');
    }
    out
}

pub fn render_status(session: &TrainingSession) -> String {
    let topic = session
        .topic()
        .map(|t| format!("{} ({})", t.topic_name, t.topic_id))
        .unwrap_or_else(|| "none".to_string());
    let mut out = format!(
        "topic: {}\nstep: {}\nconfidence: {}\nanswers: {}\npending writes: {}\n",
        topic,
        session.step(),
        session.confidence(),
        session.qa_pairs().len(),
        session.pending_writes(),
    );
    if !session.deferred_increments().is_empty() {
        out.push_str(&format!(
            "deferred: {}\n",
            session.deferred_increments().len()
        ));
    }
    for question in session.open_questions() {
        out.push_str(&format!("  ? {}\n", question));
    }
    out
}

pub fn render_gaps(gaps: &[KnowledgeGap]) -> String {
    if gaps.is_empty() {
        return "No open knowledge gaps.\n".to_string();
    }
    let mut out = String::new();
    for gap in gaps {
        out.push_str(&format!(
            "{:<12} x{:<4} {}\n",
            gap.id.as_str(),
            gap.frequency,
            gap.question_text
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use apprentice_client::ClientError;
    use apprentice_core::types::{AgentId, Confidence, GapId, GapStatus, KnowledgeChunk};
    use apprentice_session::{AnalysisFailure, Step, WriteFailureKind};

    fn report(analysis: AnalysisStatus, utterance: Option<&str>) -> TurnReport {
        TurnReport {
            step: Step::Clarifying,
            confidence: Confidence::clamped(40),
            open_questions: vec![],
            utterance: utterance.map(str::to_string),
            analysis,
            write: WriteStatus::Queued { sequence: 1 },
            failed_writes: vec![],
        }
    }

    #[test]
    fn test_parse_teaching_text() {
        assert_eq!(
            parse_input("  Returns are accepted within 30 days \n"),
            Input::Teach("Returns are accepted within 30 days".to_string())
        );
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input(":retry"), Input::Retry);
        assert_eq!(parse_input(":retry-writes"), Input::RetryWrites);
        assert_eq!(parse_input(":status"), Input::Status);
        assert_eq!(parse_input(":help"), Input::Help);
        assert_eq!(parse_input(":quit"), Input::Quit);
        assert_eq!(parse_input(":exit"), Input::Quit);
        assert_eq!(parse_input(":frobnicate"), Input::Unknown(":frobnicate".to_string()));
        assert_eq!(parse_input(":bind"), Input::Unknown(":bind".to_string()));
        assert_eq!(parse_input(":finalize"), Input::Finalize);
    }

    #[test]
    fn test_colon_answers_are_taught() {
        assert_eq!(
            parse_input(":) yes, always"),
            Input::Teach(":) yes, always".to_string())
        );
        assert_eq!(
            parse_input("::retry is what staff type"),
            Input::Teach(":retry is what staff type".to_string())
        );
        assert_eq!(parse_input("::"), Input::Teach(":".to_string()));
        assert_eq!(parse_input(":"), Input::Teach(":".to_string()));
    }

    #[test]
    fn test_parse_bind() {
        assert_eq!(
            parse_input(":bind t1 Return Policy"),
            Input::Bind(TopicBinding::new("t1", "Return Policy"))
        );
        assert_eq!(
            parse_input(":bind t2"),
            Input::Bind(TopicBinding::new("t2", "t2"))
        );
    }

    #[test]
    fn test_render_completed_turn() {
        let text = render_report(&report(
            AnalysisStatus::Completed,
            Some("Thanks! I have a few more questions:\n\n• Why?\n"),
        ));
        assert!(text.starts_with("Thanks!"));
        assert!(text.contains("• Why?\n[confidence 40%]\n"));
    }

    #[test]
    fn test_render_failed_analysis() {
        let text = render_report(&report(
            AnalysisStatus::Failed {
                error: AnalysisFailure::Client(ClientError::Timeout),
                retryable: true,
            },
            None,
        ));
        assert!(text.starts_with("[analysis failed:"));
        assert!(text.contains(":retry"));
    }

    #[test]
    fn test_render_failed_writes() {
        let mut turn = report(AnalysisStatus::Skipped, Some("No topic."));
        turn.write = WriteStatus::Deferred;
        turn.failed_writes.push(WriteFailure {
            sequence: Some(3),
            chunk: KnowledgeChunk {
                agent_id: AgentId::new("a1"),
                topic_id: "t1".into(),
                text: "Seed".to_string(),
            },
            attempts: 4,
            kind: WriteFailureKind::Exhausted(ClientError::Timeout),
            failed_at: Default::default(),
        });
        let text = render_report(&turn);
        assert!(text.contains("[kept locally until a topic is bound]"));
        assert!(text.contains("[write #3 not saved after 4 attempt(s): retries exhausted:"));
        assert!(text.ends_with("[type :retry-writes to resubmit]\n"));
    }

    #[test]
    fn test_render_unqueued_failure() {
        let text = render_failures(&[WriteFailure {
            sequence: None,
            chunk: KnowledgeChunk {
                agent_id: AgentId::new("a1"),
                topic_id: "t1".into(),
                text: "Seed".to_string(),
            },
            attempts: 0,
            kind: WriteFailureKind::WriterStopped,
            failed_at: Default::default(),
        }]);
        assert!(text.starts_with("[unqueued write not saved after 0 attempt(s): writer stopped]"));
        assert!(!text.contains("#0"));
    }

    #[test]
    fn test_render_finalized() {
        let text = render_finalized(&Finalized {
            crystallized_text: "Returns: 30 days.\n".to_string(),
            qa_pairs: 2,
        });
        assert_eq!(
            text,
            "Knowledge finalized and saved (2 answer(s) included).\n\nReturns: 30 days.\n"
        );
    }

    #[test]
    fn test_render_gaps() {
        assert_eq!(render_gaps(&[]), "No open knowledge gaps.\n");
        let text = render_gaps(&[KnowledgeGap {
            id: GapId::new("g1"),
            question_text: "Do you ship internationally?".to_string(),
            frequency: 3,
            status: GapStatus::Open,
        }]);
        assert!(text.starts_with("g1"));
        assert!(text.contains("x3"));
        assert!(text.trim_end().ends_with("Do you ship internationally?"));
    }
}
