use chrono::{DateTime, TimeZone, Utc};
use db::models::{
    agent_status::{AgentStatus, CreateAgentStatus},
    department::{CreateDepartment, Department},
    project::{CreateProject, Project},
};
use serde::Serialize;
use sqlx::SqlitePool;
use ts_rs::TS;

const HQ: &str = "Mac Studio HQ";
const VPS: &str = "Luna Labs VPS";

/// (name, description, head agent, location)
const DEPARTMENTS: &[(&str, &str, &str, &str)] = &[
    ("Executive", "Executive leadership", "main", HQ),
    ("HR", "Human Resources", "harper-hr", HQ),
    ("Research", "Research & Development", "reese-research", HQ),
    ("Finance", "Finance & Accounting", "finley-finance", HQ),
    ("Engineering", "Software Engineering", "ethan-engineering", VPS),
    ("Marketing", "Marketing & Growth", "morgan-marketing", HQ),
    ("DevOps", "DevOps & Infrastructure", "devon-devops", VPS),
    ("Partnerships", "Partnerships & BD", "sam-partnerships", HQ),
    ("QA", "Quality Assurance", "riley-qa", VPS),
    ("Security", "Security & Compliance", "casey-security", VPS),
    ("Design", "Product Design", "dana-design", HQ),
    ("Analytics", "Data & Analytics", "dakota-analytics", HQ),
    ("Release", "Release Management", "parker-release", VPS),
];

/// (agent id, name, role, emoji, department, location)
const AGENTS: &[(&str, &str, &str, &str, &str, &str)] = &[
    ("main", "Unc Lumen", "CTO", "💎", "Executive", HQ),
    ("luna-coo", "Luna", "Chief of Staff", "🌙", "Executive", HQ),
    ("maven-cpo", "Maven", "Chief Product Officer", "📋", "Executive", HQ),
    ("lumi", "Lumi", "Personal Assistant", "🌸", "Executive", HQ),
    ("harper-hr", "Harper", "HR Director", "👔", "HR", HQ),
    ("reese-research", "Reese", "Research Director", "🔬", "Research", HQ),
    ("finley-finance", "Finley", "Finance Director", "💰", "Finance", HQ),
    ("ethan-engineering", "Ethan", "Engineering Director", "⚙️", "Engineering", VPS),
    ("morgan-marketing", "Morgan", "Marketing Director", "📣", "Marketing", HQ),
    ("devon-devops", "Devon", "DevOps Director", "🔧", "DevOps", VPS),
    ("sam-partnerships", "Sam", "Partnerships Director", "🤝", "Partnerships", HQ),
    ("riley-qa", "Riley", "QA Director", "🔍", "QA", VPS),
    ("casey-security", "Casey", "Security Director", "🛡️", "Security", VPS),
    ("avery-qa-lead", "Avery", "QA Lead", "✅", "QA", VPS),
    ("parker-release", "Parker", "Release Manager", "📦", "Release", VPS),
    ("dana-design", "Dana", "Design Director", "🎨", "Design", HQ),
    ("dakota-analytics", "Dakota", "Analytics Director", "📊", "Analytics", HQ),
];

#[derive(Debug, Clone, Copy, Default, Serialize, TS, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub departments: usize,
    pub agents: usize,
    pub projects: usize,
}

fn date(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}

fn projects() -> Vec<CreateProject> {
    let project = |name: &str, owner: &str, status: &str, progress: i32, milestone: &str| {
        CreateProject {
            name: name.to_string(),
            owner: owner.to_string(),
            status: Some(status.to_string()),
            progress: Some(progress),
            next_milestone: Some(milestone.to_string()),
            blockers: None,
            start_date: None,
            target_date: None,
            metadata: None,
        }
    };
    let awaiting_decision = Some(vec!["Awaiting GO/NO-GO decision".to_string()]);

    vec![
        CreateProject {
            start_date: date(2026, 2, 1),
            target_date: date(2026, 3, 15),
            ..project("AgentShield", "main", "in_progress", 60, "Sprint 1 Complete")
        },
        CreateProject {
            blockers: awaiting_decision.clone(),
            ..project("MaxRewards AI", "maven-cpo", "planned", 20, "Customer Interviews")
        },
        CreateProject {
            blockers: awaiting_decision,
            ..project("ExpenseAI", "maven-cpo", "planned", 20, "Customer Interviews")
        },
        project("Hyundai Dealership Agents", "maven-cpo", "in_progress", 40, "TBD"),
        CreateProject {
            start_date: date(2026, 2, 5),
            ..project("Command Center", "main", "in_progress", 0, "MVP Dashboard")
        },
    ]
}

/// Upserts the baseline organisation. Safe to run repeatedly: existing rows
/// are matched on their unique names and only refreshed.
pub async fn seed(pool: &SqlitePool) -> Result<SeedSummary, sqlx::Error> {
    let mut summary = SeedSummary::default();

    for (name, description, head, location) in DEPARTMENTS {
        Department::upsert(
            pool,
            &CreateDepartment {
                name: name.to_string(),
                description: Some(description.to_string()),
                location: location.to_string(),
                head_agent_id: Some(head.to_string()),
            },
        )
        .await?;
        summary.departments += 1;
    }

    for (agent_id, name, role, emoji, department, location) in AGENTS {
        AgentStatus::ensure(
            pool,
            &CreateAgentStatus {
                agent_id: agent_id.to_string(),
                name: name.to_string(),
                role: role.to_string(),
                emoji: Some(emoji.to_string()),
                department: Some(department.to_string()),
                location: location.to_string(),
                status: Some("idle".to_string()),
                current_task: None,
                progress: None,
                blockers: None,
                metadata: None,
            },
        )
        .await?;
        summary.agents += 1;
    }

    for project in projects() {
        Project::upsert(pool, &project).await?;
        summary.projects += 1;
    }

    tracing::info!(
        departments = summary.departments,
        agents = summary.agents,
        projects = summary.projects,
        "Seed complete"
    );
    Ok(summary)
}
