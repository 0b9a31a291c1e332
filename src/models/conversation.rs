use serde::{Deserialize, Serialize};

/// One completed question/answer exchange. Immutable once appended to a
/// session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub input: String,
    pub output: String,
    pub sequence_index: usize,
}

impl ConversationTurn {
    pub fn new(input: &str, output: &str, sequence_index: usize) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            sequence_index,
        }
    }
}
