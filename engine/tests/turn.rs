//! End-to-end turns with a scripted model and a recording consent gate.

use std::collections::VecDeque;
use std::sync::Mutex;

use warden_engine::{
    ChatMessage, ConsentDecision, ConsentFut, ConsentGate, ConsentRequest, MODEL_FAILURE_MESSAGE,
    ModelClient, ModelError, ModelFut, Role, Session, TOOL_OUTCOME_DELIMITER, ToolSettings,
    Toolbox,
};

struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    fn new(replies: impl IntoIterator<Item = Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok((*t).to_string())))
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

impl ModelClient for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ModelFut<'a> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyCompletion));
        Box::pin(async move { reply })
    }
}

struct RecordingGate {
    decision: ConsentDecision,
    requests: Mutex<Vec<ConsentRequest>>,
}

impl RecordingGate {
    fn new(decision: ConsentDecision) -> Self {
        Self {
            decision,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn granting() -> Self {
        Self::new(ConsentDecision::Granted)
    }

    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ConsentGate for RecordingGate {
    fn request<'a>(&'a self, request: &'a ConsentRequest) -> ConsentFut<'a> {
        self.requests.lock().unwrap().push(request.clone());
        let decision = self.decision;
        Box::pin(async move { decision })
    }
}

fn toolbox() -> Toolbox {
    Toolbox::builtin(ToolSettings::default()).unwrap()
}

fn write_call(path: &str, content: &str) -> String {
    format!(
        "Saving it now.\n<tool_use><tool_name>write_file</tool_name><path>{path}</path><content>{content}</content></tool_use>"
    )
}

fn read_call(path: &str) -> String {
    format!("Let me look.\n<tool_use><tool_name>read_file</tool_name><path>{path}</path></tool_use>")
}

fn outcome(reply: &str) -> &str {
    reply
        .split_once(TOOL_OUTCOME_DELIMITER)
        .map(|(_, outcome)| outcome)
        .expect("reply carries a tool outcome")
}

#[tokio::test]
async fn plain_completion_is_returned_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let model = ScriptedModel::replying(&["Just an answer, no tools."]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let reply = session.turn("hi", Some(dir.path()), &model, &gate, &tools).await;

    assert_eq!(reply, "Just an answer, no tools.");
    assert_eq!(gate.count(), 0);
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(
        session.transcript().last().map(ChatMessage::content),
        Some("Just an answer, no tools.")
    );
}

#[tokio::test]
async fn write_then_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let write = write_call("notes/a.txt", "hello");
    let read = read_call("notes/a.txt");
    let model = ScriptedModel::replying(&[write.as_str(), read.as_str()]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let first = session.turn("save", Some(dir.path()), &model, &gate, &tools).await;
    assert!(first.starts_with(&write));
    assert!(outcome(&first).starts_with("Wrote 5 bytes to "));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes/a.txt")).unwrap(),
        "hello"
    );

    let second = session.turn("show", Some(dir.path()), &model, &gate, &tools).await;
    assert!(outcome(&second).contains("hello"));
    assert_eq!(gate.count(), 2);
}

#[tokio::test]
async fn repeated_write_is_idempotent_and_asks_each_time() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let write = write_call("same.txt", "payload");
    let model = ScriptedModel::replying(&[write.as_str(), write.as_str()]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let first = session.turn("one", Some(dir.path()), &model, &gate, &tools).await;
    let second = session.turn("two", Some(dir.path()), &model, &gate, &tools).await;

    assert_eq!(outcome(&first), outcome(&second));
    assert!(outcome(&first).starts_with("Wrote 7 bytes"));
    assert_eq!(gate.count(), 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("same.txt")).unwrap(),
        "payload"
    );
}

#[tokio::test]
async fn denied_write_leaves_filesystem_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let write = write_call("denied.txt", "nope");
    let model = ScriptedModel::replying(&[write.as_str()]);
    let gate = RecordingGate::new(ConsentDecision::Denied);
    let mut session = Session::new();

    let reply = session.turn("write", Some(dir.path()), &model, &gate, &tools).await;

    assert!(outcome(&reply).starts_with("Permission denied"));
    assert!(!outcome(&reply).starts_with("Failed to"));
    assert!(!dir.path().join("denied.txt").exists());
    assert_eq!(gate.count(), 1);
}

#[tokio::test]
async fn denied_read_does_not_reveal_contents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("secret.txt"), "classified").unwrap();
    let tools = toolbox();
    let read = read_call("secret.txt");
    let model = ScriptedModel::replying(&[read.as_str()]);
    let gate = RecordingGate::new(ConsentDecision::Denied);
    let mut session = Session::new();

    let reply = session.turn("read", Some(dir.path()), &model, &gate, &tools).await;

    assert!(outcome(&reply).starts_with("Permission denied"));
    assert!(!reply.contains("classified"));
}

#[tokio::test]
async fn missing_file_gets_not_found_message() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let read = read_call("missing/x.txt");
    let model = ScriptedModel::replying(&[read.as_str()]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let reply = session.turn("read", Some(dir.path()), &model, &gate, &tools).await;

    assert!(outcome(&reply).starts_with("File not found: "));
    assert!(!outcome(&reply).starts_with("Failed to"));
}

#[tokio::test]
async fn unknown_operation_is_reported_without_prompting() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let model = ScriptedModel::replying(&[
        "<tool_use><tool_name>delete_file</tool_name><path>a.txt</path></tool_use>",
    ]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let reply = session.turn("delete", Some(dir.path()), &model, &gate, &tools).await;

    assert!(outcome(&reply).starts_with("Unrecognized operation 'delete_file'"));
    assert_eq!(gate.count(), 0);
    assert!(!dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn no_trusted_root_skips_consent() {
    let tools = toolbox();
    let write = write_call("a.txt", "x");
    let model = ScriptedModel::replying(&[write.as_str()]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let reply = session.turn("write", None, &model, &gate, &tools).await;

    assert!(outcome(&reply).contains("no project folder is open"));
    assert_eq!(gate.count(), 0);
}

#[tokio::test]
async fn escaping_path_is_rejected_before_consent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("proj");
    std::fs::create_dir(&root).unwrap();
    let tools = toolbox();
    let write = write_call("../../x", "escape");
    let model = ScriptedModel::replying(&[write.as_str()]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let reply = session.turn("write", Some(root.as_path()), &model, &gate, &tools).await;

    assert!(outcome(&reply).starts_with("Tool call rejected: "));
    assert_eq!(gate.count(), 0);
    assert!(!dir.path().join("x").exists());
}

#[tokio::test]
async fn model_failure_returns_fixed_message() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let model = ScriptedModel::new([Err(ModelError::Status {
        status: 500,
        body: "boom".to_string(),
    })]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let reply = session.turn("hello", Some(dir.path()), &model, &gate, &tools).await;

    assert_eq!(reply, MODEL_FAILURE_MESSAGE);
    assert!(!reply.contains("boom"));
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(
        session.transcript().last().map(ChatMessage::role),
        Some(Role::User)
    );
}

#[tokio::test]
async fn preamble_is_sent_once_and_never_stored() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let model = ScriptedModel::replying(&["first", "second"]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    session.turn("one", Some(dir.path()), &model, &gate, &tools).await;
    session.turn("two", Some(dir.path()), &model, &gate, &tools).await;

    let requests = model.requests();
    let roles: Vec<Role> = requests[1].iter().map(ChatMessage::role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
    assert!(
        session
            .transcript()
            .messages()
            .iter()
            .all(|m| m.role() != Role::System)
    );
}

#[tokio::test]
async fn transcript_records_combined_text() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let write = write_call("log.txt", "entry");
    let model = ScriptedModel::replying(&[write.as_str(), "ok"]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    let reply = session.turn("log", Some(dir.path()), &model, &gate, &tools).await;
    session.turn("next", Some(dir.path()), &model, &gate, &tools).await;

    let stored = &session.transcript().messages()[1];
    assert_eq!(stored.role(), Role::Assistant);
    assert_eq!(stored.content(), reply);

    // The next request replays the combined text, not a separate tool turn.
    let second_request = &model.requests()[1];
    assert_eq!(second_request.len(), 4);
    assert!(second_request[2].content().contains(TOOL_OUTCOME_DELIMITER));
}

#[tokio::test]
async fn only_first_block_is_executed() {
    let dir = tempfile::tempdir().unwrap();
    let tools = toolbox();
    let text = format!("{}\n{}", write_call("one.txt", "1"), write_call("two.txt", "2"));
    let model = ScriptedModel::replying(&[text.as_str()]);
    let gate = RecordingGate::granting();
    let mut session = Session::new();

    session.turn("both", Some(dir.path()), &model, &gate, &tools).await;

    assert!(dir.path().join("one.txt").exists());
    assert!(!dir.path().join("two.txt").exists());
    assert_eq!(gate.count(), 1);
}
