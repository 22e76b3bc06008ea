//! Which open question a trainer's answer is attributed to.

/// Label used when an answer arrives while no question is open.
pub const GENERAL_CLARIFICATION: &str = "General Clarification";

/// Picks the question an incoming answer is bound to.
pub trait QuestionBinding: Send + Sync {
    fn bind(&self, open_questions: &[String]) -> String;

    fn name(&self) -> &'static str;
}

/// Always binds to the first open question, or to [`GENERAL_CLARIFICATION`]
/// when none is open.
///
/// The trainer may have been answering a different question when several are
/// pending; the answer is still attributed to the first one.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindToFirstOpenQuestion;

impl QuestionBinding for BindToFirstOpenQuestion {
    fn bind(&self, open_questions: &[String]) -> String {
        open_questions
            .first()
            .cloned()
            .unwrap_or_else(|| GENERAL_CLARIFICATION.to_string())
    }

    fn name(&self) -> &'static str {
        "bind_to_first_open_question"
    }
}
