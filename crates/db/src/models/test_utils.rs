use sqlx::SqlitePool;

use super::agent_status::ReportAgentStatus;
use crate::DBService;

pub(crate) async fn setup_test_pool() -> SqlitePool {
    DBService::new_in_memory()
        .await
        .expect("failed to open sqlite memory db")
        .pool
}

/// A status report for `agent_id` with a capitalised display name.
pub(crate) fn report_for(agent_id: &str, status: &str) -> ReportAgentStatus {
    let mut chars = agent_id.chars();
    let name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    ReportAgentStatus {
        agent_id: agent_id.to_string(),
        name,
        role: "Agent".to_string(),
        emoji: "🤖".to_string(),
        department: None,
        location: "Mac Studio HQ".to_string(),
        status: status.to_string(),
        current_task: None,
        progress: None,
        blockers: None,
        metadata: None,
    }
}
