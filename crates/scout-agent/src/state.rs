//! Conversation state threaded through the workflow nodes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum ChatMessage {
    User(String),
    Assistant(String),
    System(String),
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant(text.into())
    }

    /// Text carried by the message regardless of role
    pub fn content(&self) -> &str {
        match self {
            Self::User(text) | Self::Assistant(text) | Self::System(text) => text,
        }
    }

    /// Convert to an LLM message. System entries have no LLM counterpart
    /// inside a transcript and are dropped.
    pub fn to_llm_message(&self) -> Option<scout_ai::Message> {
        match self {
            Self::User(text) => Some(scout_ai::Message::user(text.clone())),
            Self::Assistant(text) => Some(scout_ai::Message::assistant(text.clone())),
            Self::System(_) => None,
        }
    }
}

/// Routing decision made by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextAction {
    Research,
    Respond,
    End,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextAction::Research => "research",
            NextAction::Respond => "respond",
            NextAction::End => "end",
        }
    }
}

/// Status of the current turn. Once `Error`, the turn only terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    InProgress,
    Completed,
    Error,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Error => "error",
        }
    }
}

/// Outcome of a single tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    Result(String),
    Error(String),
}

/// A tool invocation made during research, serialized as
/// `{tool, query, result}` or `{tool, query, error}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool: String,
    /// Arguments the model supplied
    pub query: Value,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolRecord {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchData {
    pub query: String,
    pub raw_results: Vec<ToolRecord>,
    pub synthesis: String,
}

/// Full state of one conversation turn.
///
/// Every node consumes the state and returns the complete next state; fields
/// a node does not touch pass through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub user_input: String,
    pub next_action: Option<NextAction>,
    pub research_data: Option<ResearchData>,
    pub tools_used: Vec<String>,
    pub conversation_id: String,
    pub user_id: String,
    pub current_agent: Option<String>,
    pub workflow_status: WorkflowStatus,
    #[serde(default)]
    pub working_memory: Map<String, Value>,

    // Extension fields; no node reads them
    #[serde(default)]
    pub session_data: Map<String, Value>,
    #[serde(default)]
    pub long_term_memory: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plan: Option<Vec<String>>,
    #[serde(default)]
    pub tool_results: Map<String, Value>,
}

impl ConversationState {
    /// Fresh state for a new turn: the user's message is the whole transcript
    pub fn new(
        user_input: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let user_input = user_input.into();
        Self {
            messages: vec![ChatMessage::user(user_input.clone())],
            user_input,
            next_action: None,
            research_data: None,
            tools_used: Vec::new(),
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            current_agent: Some("supervisor".to_string()),
            workflow_status: WorkflowStatus::InProgress,
            working_memory: Map::new(),
            session_data: Map::new(),
            long_term_memory: None,
            timestamp: None,
            plan: None,
            tool_results: Map::new(),
        }
    }

    /// Carry the cross-turn fields of a previous turn's final state into
    /// this one. The previous transcript is placed before the new user message.
    pub fn seeded_from(mut self, previous: &ConversationState) -> Self {
        let mut messages = previous.messages.clone();
        messages.append(&mut self.messages);
        self.messages = messages;
        self.session_data = previous.session_data.clone();
        self.long_term_memory = previous.long_term_memory.clone();
        self
    }

    /// Record an agent failure: append a visible message and mark the turn failed
    pub fn fail(&mut self, message: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(message));
        self.workflow_status = WorkflowStatus::Error;
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_wire_format() {
        let msg = ChatMessage::assistant("hello");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "assistant", "content": "hello"})
        );
        let back: ChatMessage =
            serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(back, ChatMessage::user("hi"));
    }

    #[test]
    fn test_tool_record_wire_format() {
        let ok = ToolRecord {
            tool: "web_search".into(),
            query: json!({"query": "rust"}),
            outcome: ToolOutcome::Result("found".into()),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"tool": "web_search", "query": {"query": "rust"}, "result": "found"})
        );

        let failed: ToolRecord = serde_json::from_value(
            json!({"tool": "tavily_search", "query": {}, "error": "timeout"}),
        )
        .unwrap();
        assert!(failed.is_error());
    }

    #[test]
    fn test_status_and_action_serialization() {
        assert_eq!(
            serde_json::to_value(WorkflowStatus::InProgress).unwrap(),
            json!("in_progress")
        );
        assert_eq!(
            serde_json::to_value(NextAction::Research).unwrap(),
            json!("research")
        );
    }

    #[test]
    fn test_new_state() {
        let state = ConversationState::new("hi", "c1", "u1");
        assert_eq!(state.messages, vec![ChatMessage::user("hi")]);
        assert_eq!(state.workflow_status, WorkflowStatus::InProgress);
        assert_eq!(state.current_agent.as_deref(), Some("supervisor"));
        assert!(state.next_action.is_none());
    }

    #[test]
    fn test_seeded_from_carries_transcript_and_memory() {
        let mut previous = ConversationState::new("first", "c1", "u1");
        previous.messages.push(ChatMessage::assistant("answer"));
        previous
            .session_data
            .insert("theme".into(), json!("dark"));
        previous.tools_used.push("web_search".into());
        previous.workflow_status = WorkflowStatus::Completed;

        let state = ConversationState::new("second", "c1", "u1").seeded_from(&previous);
        assert_eq!(
            state.messages,
            vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("answer"),
                ChatMessage::user("second"),
            ]
        );
        assert_eq!(state.session_data["theme"], json!("dark"));
        assert!(state.tools_used.is_empty());
        assert_eq!(state.workflow_status, WorkflowStatus::InProgress);
    }

    #[test]
    fn test_fail_appends_message() {
        let mut state = ConversationState::new("hi", "c1", "u1");
        state.fail("Research failed: boom");
        assert_eq!(state.workflow_status, WorkflowStatus::Error);
        assert_eq!(
            state.last_message().map(|m| m.content()),
            Some("Research failed: boom")
        );
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = ConversationState::new("hi", "c1", "u1");
        state.plan = Some(vec!["step".into()]);
        state.long_term_memory = Some(json!({"k": 1}));
        let value = serde_json::to_value(&state).unwrap();
        let back: ConversationState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
