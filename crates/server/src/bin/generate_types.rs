use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    const HEADER: &str = "// This file was generated by `generate_types`. Do not edit it manually.\n\
         // Run `cargo run --bin generate_types` to regenerate.\n\n";

    let decls: Vec<String> = vec![
        db::models::activity::ActivityLog::decl(),
        db::models::activity::CreateActivityLog::decl(),
        db::models::activity::ActivityFilter::decl(),
        db::models::agent_message::AgentMessage::decl(),
        db::models::agent_message::CreateAgentMessage::decl(),
        db::models::agent_message::MessageFilter::decl(),
        db::models::agent_message::MessagePage::decl(),
        db::models::agent_status::AgentStatus::decl(),
        db::models::agent_status::AgentStatusWithHistory::decl(),
        db::models::agent_status::ReportAgentStatus::decl(),
        db::models::agent_status::CreateAgentStatus::decl(),
        db::models::agent_status::UpdateAgentStatus::decl(),
        db::models::agent_status::AgentStatusFilter::decl(),
        db::models::status_history::StatusHistory::decl(),
        db::models::department::Department::decl(),
        db::models::department::CreateDepartment::decl(),
        db::models::department::UpdateDepartment::decl(),
        db::models::project::Project::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::task::TaskStatus::decl(),
        db::models::task::TaskPriority::decl(),
        db::models::task::Task::decl(),
        db::models::task::TaskWithProject::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        db::models::task::TaskFilter::decl(),
        db::models::council_proposal::ProposalStatus::decl(),
        db::models::council_proposal::CouncilProposal::decl(),
        db::models::council_proposal::CreateCouncilProposal::decl(),
        db::models::council_proposal::ProposalFilter::decl(),
        db::models::council_proposal::ProposalWithActivity::decl(),
        db::models::council_vote::VoteChoice::decl(),
        db::models::council_vote::CouncilVote::decl(),
        db::models::council_vote::CastVote::decl(),
        db::models::council_vote::ProposalStats::decl(),
        db::models::council_discussion::CouncilDiscussion::decl(),
        db::models::council_discussion::CreateCouncilDiscussion::decl(),
        db::models::stats::CompanyStats::decl(),
        db::models::stats::AgentStats::decl(),
        db::models::stats::ProjectStats::decl(),
        services::services::council::ProposalDetail::decl(),
        services::services::events::EventKind::decl(),
        server::error::ApiError::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{HEADER}{body}\n")
}

fn main() -> std::io::Result<()> {
    let check_mode = env::args().any(|x| x == "--check");
    let shared_path = Path::new("shared");
    let types_path = shared_path.join("types.ts");

    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("✅ shared/types.ts is up to date.");
            return Ok(());
        }
        eprintln!("❌ shared/types.ts is not up to date. Please run 'cargo run --bin generate_types' and commit the changes.");
        std::process::exit(1);
    }

    fs::create_dir_all(shared_path)?;
    fs::write(&types_path, generated)?;
    println!("✅ TypeScript types written to {}", types_path.display());
    Ok(())
}
