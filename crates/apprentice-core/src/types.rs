use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of an agent in the management console.
    AgentId
);
string_id!(
    /// Identifier of a topic an agent is taught about.
    TopicId
);
string_id!(
    /// Identifier of a recorded knowledge gap.
    GapId
);

// =============================================================================
// Confidence
// =============================================================================

/// How well the accumulated explanation covers a topic, always in `0..=100`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(u8);

impl Confidence {
    pub const MIN: Confidence = Confidence(0);
    pub const MAX: Confidence = Confidence(100);

    /// Clamp an arbitrary integer score into range.
    pub fn clamped(raw: i64) -> Self {
        Confidence(raw.clamp(0, 100) as u8)
    }

    /// Clamp a possibly fractional score into range. Non-finite values map to 0.
    pub fn from_score(raw: f64) -> Self {
        if !raw.is_finite() {
            return Confidence::MIN;
        }
        Confidence(raw.round().clamp(0.0, 100.0) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// =============================================================================
// Knowledge
// =============================================================================

/// The topic a training session is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBinding {
    pub topic_id: TopicId,
    pub topic_name: String,
}

impl TopicBinding {
    pub fn new(topic_id: impl Into<TopicId>, topic_name: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            topic_name: topic_name.into(),
        }
    }
}

/// One immutable unit of taught text stored against an agent and topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub agent_id: AgentId,
    pub topic_id: TopicId,
    pub text: String,
}

/// A clarifying question together with the trainer's answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    #[serde(rename = "q")]
    pub question: String,
    #[serde(rename = "a")]
    pub answer: String,
}

impl QaPair {
    /// The increment appended to the session context for this pair.
    pub fn as_block(&self) -> String {
        format!("Q: {}\nA: {}", self.question, self.answer)
    }
}

/// Normalized result of a confidence analysis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub confidence: Confidence,
    pub questions: Vec<String>,
}

// =============================================================================
// Knowledge gaps
// =============================================================================

/// Lifecycle status of a knowledge gap.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    #[default]
    Open,
    Closed,
}

/// A question the agent could not answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGap {
    pub id: GapId,
    pub question_text: String,
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub status: GapStatus,
}

/// Whether the resolver reused an existing topic or created one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    Found,
    Created,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Result of mapping an unanswered question onto a topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapResolution {
    pub topic_id: TopicId,
    pub topic_name: String,
    #[serde(default)]
    pub action: ResolutionAction,
}

impl GapResolution {
    pub fn binding(&self) -> TopicBinding {
        TopicBinding {
            topic_id: self.topic_id.clone(),
            topic_name: self.topic_name.clone(),
        }
    }
}
