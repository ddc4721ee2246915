//! Conversation transcript - the ordered blocks an engine consumes and extends.
//!
//! A transcript is owned exclusively by its conversation. Prompts are appended
//! between runs; a finished run hands back a replacement transcript.

use serde::{Deserialize, Serialize};

use super::foundation::RunId;

/// Who produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRole {
    System,
    User,
    Assistant,
    ToolCall,
    ToolUse,
}

/// One entry of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub role: BlockRole,
    pub text: String,
    /// Structured payload for tool blocks (call input or tool result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Block {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: BlockRole::User,
            text: text.into(),
            data: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: BlockRole::System,
            text: text.into(),
            data: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: BlockRole::Assistant,
            text: text.into(),
            data: None,
        }
    }

    /// A tool invocation requested by the model.
    pub fn tool_call(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            role: BlockRole::ToolCall,
            text: name.into(),
            data: Some(input),
        }
    }

    /// The result of a local tool execution.
    pub fn tool_use(name: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            role: BlockRole::ToolUse,
            text: name.into(),
            data: Some(result),
        }
    }
}

/// Ordered sequence of conversation blocks tagged with the owning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub run_id: RunId,
    blocks: Vec<Block>,
}

impl Transcript {
    /// Creates an empty transcript for a run.
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Puts `prompt` first unless the transcript already opens with a system block.
    ///
    /// Returns whether a block was inserted.
    pub fn ensure_system_prompt(&mut self, prompt: &str) -> bool {
        if self.blocks.first().is_some_and(|b| b.role == BlockRole::System) {
            return false;
        }
        self.blocks.insert(0, Block::system(prompt));
        true
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Text of the most recent user block, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.blocks
            .iter()
            .rev()
            .find(|b| b.role == BlockRole::User)
            .map(|b| b.text.as_str())
    }
}
