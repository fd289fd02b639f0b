//! End-to-end turns through the standard supervisor/research/respond graph

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use scout_agent::testing::{EchoTool, FailingTool, ScriptedProvider, test_model};
use scout_agent::{
    AgentContext, BoxedTool, ChatMessage, CheckpointStore, MemoryCheckpointStore, StepUpdate,
    ToolSet, Workflow, WorkflowStatus,
};
use serde_json::json;

struct Harness {
    workflow: Workflow,
    llm: Arc<ScriptedProvider>,
    store: Arc<MemoryCheckpointStore>,
}

fn harness(llm: ScriptedProvider) -> Harness {
    let llm = Arc::new(llm);
    let ctx = AgentContext::new(llm.clone(), test_model())
        .with_timeouts(Duration::from_secs(30), Duration::from_secs(5));
    let tools = ToolSet::from_tools([
        Arc::new(EchoTool::new("web_search")) as BoxedTool,
        Arc::new(FailingTool::new("tavily_search", "invalid api key")) as BoxedTool,
    ]);
    let store = Arc::new(MemoryCheckpointStore::new());
    let workflow = Workflow::with_agents(Arc::new(ctx), tools, store.clone());
    Harness {
        workflow,
        llm,
        store,
    }
}

fn step_names(updates: &[StepUpdate]) -> Vec<String> {
    updates
        .iter()
        .map(|u| match u {
            StepUpdate::Step { node, .. } => node.clone(),
            StepUpdate::Error { .. } => "error".to_string(),
        })
        .collect()
}

#[tokio::test]
async fn test_direct_answer_turn() {
    let h = harness(ScriptedProvider::new().reply("respond").reply("Hi! How can I help?"));

    let outcome = h.workflow.process_message("Hello", "conv-1", "user-1").await;

    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert_eq!(outcome.response, "Hi! How can I help?");
    assert!(outcome.tools_used.is_empty());
    assert!(outcome.research_data.is_none());
    assert_eq!(outcome.conversation_id, "conv-1");
    assert_eq!(h.llm.call_count(), 2);
}

#[tokio::test]
async fn test_classifier_failure_ends_turn_after_supervisor() {
    let h = harness(ScriptedProvider::new().fail("connection refused").reply("unused"));

    let updates: Vec<StepUpdate> = h
        .workflow
        .stream_process_message("Hello", "conv-1", "user-1")
        .collect()
        .await;
    assert_eq!(step_names(&updates), vec!["supervisor"]);
    assert_eq!(h.llm.call_count(), 1);

    let outcome = h.workflow.process_message("Hello", "conv-2", "user-1").await;
    assert_eq!(outcome.status, WorkflowStatus::Error);
    assert!(
        outcome.response.starts_with("Supervisor error: "),
        "got: {}",
        outcome.response
    );
    assert!(outcome.tools_used.is_empty());
    assert!(outcome.research_data.is_none());
}

#[tokio::test]
async fn test_research_turn_survives_tool_failure() {
    let h = harness(
        ScriptedProvider::new()
            .reply("research")
            .tool_calls(vec![
                ("web_search", json!({"query": "rust 2024 edition"})),
                ("tavily_search", json!({"query": "rust 2024 edition"})),
            ])
            .reply("The 2024 edition shipped with Rust 1.85."),
    );

    let outcome = h
        .workflow
        .process_message("latest on the rust 2024 edition", "conv-2", "user-1")
        .await;

    assert_eq!(outcome.status, WorkflowStatus::Completed);
    assert_eq!(outcome.response, "The 2024 edition shipped with Rust 1.85.");
    assert_eq!(outcome.tools_used, vec!["web_search", "tavily_search"]);

    let data = outcome.research_data.unwrap();
    assert_eq!(data.raw_results.len(), 2);
    assert!(!data.raw_results[0].is_error());
    assert!(data.raw_results[1].is_error());

    // synthesis appended by research, then repeated by respond
    let history = h.workflow.history("conv-2").unwrap().unwrap();
    assert_eq!(
        history,
        vec![
            ChatMessage::user("latest on the rust 2024 edition"),
            ChatMessage::assistant("The 2024 edition shipped with Rust 1.85."),
            ChatMessage::assistant("The 2024 edition shipped with Rust 1.85."),
        ]
    );
}

fn synthesis_fails() -> ScriptedProvider {
    ScriptedProvider::new()
        .reply("research")
        .tool_calls(vec![("web_search", json!({"query": "x"}))])
        .fail("context window exceeded")
}

#[tokio::test]
async fn test_synthesis_failure_ends_turn_with_error() {
    let h = harness(synthesis_fails());
    let outcome = h.workflow.process_message("find x", "conv-3", "user-1").await;
    assert_eq!(outcome.status, WorkflowStatus::Error);
    assert!(outcome.response.starts_with("Research failed: "));
    assert!(outcome.response.contains("context window exceeded"));
    assert!(outcome.research_data.is_none());
    assert!(outcome.tools_used.is_empty());

    // respond is skipped
    let h = harness(synthesis_fails());
    let updates: Vec<_> = h
        .workflow
        .stream_process_message("find x", "conv-4", "user-1")
        .collect()
        .await;
    assert_eq!(step_names(&updates), vec!["supervisor", "research"]);
}

#[tokio::test]
async fn test_stream_yields_one_update_per_node() {
    let h = harness(
        ScriptedProvider::new()
            .reply("research")
            .tool_calls(vec![("web_search", json!({"query": "x"}))])
            .reply("summary"),
    );

    let updates: Vec<_> = h
        .workflow
        .stream_process_message("find x", "conv-5", "user-1")
        .collect()
        .await;

    assert_eq!(step_names(&updates), vec!["supervisor", "research", "respond"]);
    match &updates[2] {
        StepUpdate::Step { state, .. } => {
            assert_eq!(state.workflow_status, WorkflowStatus::Completed);
            assert_eq!(state.current_agent.as_deref(), Some("respond"));
        }
        other => panic!("unexpected update: {:?}", other),
    }

    let wire = serde_json::to_value(&updates[0]).unwrap();
    assert_eq!(wire["supervisor"]["next_action"], "research");
}

#[tokio::test]
async fn test_empty_input_ends_after_supervisor() {
    let h = harness(ScriptedProvider::new());

    let updates: Vec<_> = h
        .workflow
        .stream_process_message("", "conv-6", "user-1")
        .collect()
        .await;
    assert_eq!(step_names(&updates), vec!["supervisor"]);

    let outcome = h.workflow.process_message("  ", "conv-7", "user-1").await;
    assert_eq!(outcome.status, WorkflowStatus::Error);
    assert!(outcome.response.starts_with("Supervisor error: "));
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn test_second_turn_sees_previous_transcript() {
    let h = harness(
        ScriptedProvider::new()
            .reply("respond")
            .reply("Nice to meet you, Ada.")
            .reply("respond")
            .reply("Your name is Ada."),
    );

    h.workflow
        .process_message("My name is Ada", "conv-8", "user-1")
        .await;

    let mut previous = h.store.load("conv-8").unwrap().unwrap();
    previous
        .session_data
        .insert("locale".into(), json!("en-GB"));
    previous.plan = Some(vec!["greet".into()]);
    h.store.save(&previous).unwrap();

    let outcome = h
        .workflow
        .process_message("What is my name?", "conv-8", "user-1")
        .await;
    assert_eq!(outcome.response, "Your name is Ada.");

    let state = h.store.load("conv-8").unwrap().unwrap();
    assert_eq!(state.messages.len(), 4);
    assert_eq!(state.messages[2], ChatMessage::user("What is my name?"));
    assert_eq!(state.session_data["locale"], "en-GB");
    // per-turn fields start fresh
    assert!(state.plan.is_none());
    assert_eq!(state.user_input, "What is my name?");
}

#[tokio::test]
async fn test_untouched_fields_pass_through_nodes() {
    let h = harness(ScriptedProvider::new().reply("respond").reply("ok"));

    let mut seeded = scout_agent::ConversationState::new("earlier", "conv-9", "user-1");
    seeded.session_data.insert("k".into(), json!(1));
    seeded.long_term_memory = Some(json!({"likes": "tea"}));
    h.store.save(&seeded).unwrap();

    let updates: Vec<_> = h
        .workflow
        .stream_process_message("hi", "conv-9", "user-1")
        .collect()
        .await;

    for update in &updates {
        let StepUpdate::Step { state, .. } = update else {
            panic!("unexpected error update");
        };
        assert_eq!(state.session_data["k"], 1);
        assert_eq!(state.long_term_memory, Some(json!({"likes": "tea"})));
        assert!(state.plan.is_none());
    }
}

#[tokio::test]
async fn test_reset_drops_conversation() {
    let h = harness(ScriptedProvider::new().reply("respond").reply("ok"));
    h.workflow.process_message("hi", "conv-10", "user-1").await;
    assert_eq!(h.workflow.conversation_count(), 1);

    assert!(h.workflow.reset("conv-10").unwrap());
    assert!(h.workflow.history("conv-10").unwrap().is_none());
    assert!(!h.workflow.reset("conv-10").unwrap());
}

#[tokio::test]
async fn test_panicking_provider_becomes_workflow_error() {
    let h = harness(ScriptedProvider::new().panic());

    let outcome = h.workflow.process_message("Hello", "conv-11", "user-1").await;
    assert_eq!(outcome.status, WorkflowStatus::Error);
    assert!(outcome.response.starts_with("Workflow error: node 'supervisor' panicked"));
    assert!(outcome.tools_used.is_empty());
    assert!(outcome.research_data.is_none());
}

#[tokio::test]
async fn test_concurrent_conversations_are_independent() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let workflow = |llm: ScriptedProvider| {
        let ctx = AgentContext::new(Arc::new(llm), test_model());
        Workflow::with_agents(Arc::new(ctx), ToolSet::new(), store.clone())
    };
    let wa = workflow(ScriptedProvider::new().reply("respond").reply("one"));
    let wb = workflow(ScriptedProvider::new().reply("respond").reply("two"));

    let (a, b) = tokio::join!(
        wa.process_message("first", "conv-a", "user-1"),
        wb.process_message("second", "conv-b", "user-2"),
    );

    assert_eq!(a.status, WorkflowStatus::Completed);
    assert_eq!(b.status, WorkflowStatus::Completed);
    assert_eq!(a.response, "one");
    assert_eq!(b.response, "two");
    assert_eq!(store.len(), 2);
    assert_eq!(
        wa.history("conv-a").unwrap().unwrap(),
        vec![ChatMessage::user("first"), ChatMessage::assistant("one")]
    );
    assert_eq!(
        wa.history("conv-b").unwrap().unwrap(),
        vec![ChatMessage::user("second"), ChatMessage::assistant("two")]
    );
}
