//! End-to-end conversations against the SQLite history store.

use std::sync::Arc;

use uuid::Uuid;

use mentor_assistant::{Assistant, MockChatModel, PromptCatalog, PromptRole, Purpose};
use mentor_core::history::SessionHistoryStore;
use mentor_core::types::Role;
use mentor_storage::{Database, OwnerRepository, SessionRepository, SqliteHistoryStore};

fn catalog() -> Arc<PromptCatalog> {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../prompts");
    Arc::new(PromptCatalog::from_dir(dir))
}

struct Fixture {
    assistant: Assistant,
    history: Arc<SqliteHistoryStore>,
    sessions: SessionRepository,
    owner_id: i64,
    model: Arc<MockChatModel>,
}

fn fixture(model: MockChatModel) -> Fixture {
    let db = Database::in_memory().unwrap();
    let owner = OwnerRepository::new(db.clone())
        .create("learner", None, "hash", "token")
        .unwrap();
    let history = Arc::new(SqliteHistoryStore::new(db.clone()));
    let model = Arc::new(model);
    Fixture {
        assistant: Assistant::new(catalog(), model.clone(), history.clone()),
        history,
        sessions: SessionRepository::new(db),
        owner_id: owner.id,
        model,
    }
}

#[tokio::test]
async fn biomes_follow_up_lands_at_positions_three_and_four() {
    let f = fixture(MockChatModel::with_responses([
        "Biomes are large ecological areas.",
        "A biome is a community of plants and animals.",
    ]));
    let sid = Uuid::new_v4();
    f.sessions.create(sid, f.owner_id, "Biomes").unwrap();
    assert!(f.history.read_history(sid).unwrap().is_empty());

    f.assistant
        .analyze_text(sid, "Tundra, desert and rainforest are biomes.")
        .await
        .unwrap();
    f.assistant
        .follow_up_question(sid, "What is a biome?")
        .await
        .unwrap();

    let turns = f.history.read_history(sid).unwrap();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[2].message.role, Role::Human);
    assert_eq!(turns[2].message.content, "What is a biome?");
    assert_eq!(turns[3].message.role, Role::Ai);
    assert_eq!(
        turns[3].message.content,
        "A biome is a community of plants and animals."
    );
    assert_eq!(
        f.sessions.get(f.owner_id, sid).unwrap().unwrap().title,
        "Biomes"
    );
}

#[tokio::test]
async fn analysis_prompt_uses_shipped_templates() {
    let f = fixture(MockChatModel::new());
    let sid = Uuid::new_v4();
    f.sessions.create(sid, f.owner_id, "Cells").unwrap();

    f.assistant.analyze_text(sid, "Cells divide.").await.unwrap();

    let catalog = f.assistant.pipelines().catalog();
    let system = catalog
        .get_prompt(Purpose::TextAnalysis, PromptRole::System)
        .unwrap();
    let prefix = catalog
        .get_prompt(Purpose::TextAnalysis, PromptRole::Human)
        .unwrap();
    let call = &f.model.calls()[0];
    assert_eq!(call[0].content, system.as_ref());
    assert_eq!(call[1].content, format!("{}Cells divide.", prefix));
}

#[tokio::test]
async fn provider_failure_leaves_sqlite_history_untouched() {
    let f = fixture(MockChatModel::failing("upstream 503"));
    let sid = Uuid::new_v4();
    f.sessions.create(sid, f.owner_id, "Biomes").unwrap();

    assert!(f.assistant.analyze_text(sid, "text").await.is_err());
    assert!(f.history.read_history(sid).unwrap().is_empty());
}

#[tokio::test]
async fn deleting_session_removes_its_turns() {
    let f = fixture(MockChatModel::new());
    let sid = Uuid::new_v4();
    f.sessions.create(sid, f.owner_id, "Biomes").unwrap();
    f.assistant.analyze_text(sid, "one").await.unwrap();
    f.assistant.follow_up_question(sid, "two").await.unwrap();
    f.history
        .append_turn(sid, &mentor_core::types::ChatMessage::human("five"))
        .unwrap();
    assert_eq!(f.history.read_history(sid).unwrap().len(), 5);

    assert!(f.sessions.delete(f.owner_id, sid).unwrap());
    assert!(f.history.read_history(sid).unwrap().is_empty());
}

#[tokio::test]
async fn follow_up_on_unknown_session_fails_without_turns() {
    let f = fixture(MockChatModel::new());
    let ghost = Uuid::new_v4();
    // The model answers, but the foreign key rejects the pair.
    assert!(f.assistant.follow_up_question(ghost, "hi").await.is_err());
    assert!(f.history.read_history(ghost).unwrap().is_empty());
}
