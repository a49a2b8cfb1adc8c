use std::sync::Arc;

use dashmap::DashMap;
use db::models::{
    activity::{ActivityLog, CreateActivityLog},
    council_discussion::{CouncilDiscussion, CreateCouncilDiscussion},
    council_proposal::{
        CouncilProposal, CreateCouncilProposal, ProposalFilter, ProposalStatus,
        ProposalWithActivity,
    },
    council_vote::{CastVote, CouncilVote, ProposalStats, VoteTally},
};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ts_rs::TS;
use uuid::Uuid;

/// Discussions embedded per proposal in list responses.
const LIST_DISCUSSION_PREVIEW: i64 = 5;

#[derive(Debug, Error)]
pub enum CouncilError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("Proposal not found")]
    NotFound,
    #[error("Only the proposer can withdraw this proposal")]
    Forbidden,
    #[error("Proposal is already {0}")]
    InvalidState(ProposalStatus),
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDetail {
    pub proposal: ProposalWithActivity,
    pub stats: ProposalStats,
}

/// Result of a ballot: the stored vote and the proposal as it stands after
/// the vote was counted.
#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub vote: CouncilVote,
    pub proposal: CouncilProposal,
    /// Set when this ballot resolved the proposal.
    pub resolved: Option<ProposalStatus>,
}

#[derive(Debug, Clone)]
pub struct DiscussionReceipt {
    pub discussion: CouncilDiscussion,
    pub proposal: CouncilProposal,
}

/// Proposal lifecycle: open → voting / deliberating → approved / rejected,
/// or withdrawn by the proposer at any point before resolution.
///
/// Mutations on one proposal are serialized through a per-proposal mutex and
/// each runs in a single transaction. The resolving update is additionally
/// conditional on the row not being terminal yet.
#[derive(Clone)]
pub struct CouncilService {
    pool: SqlitePool,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CouncilService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock(&self, proposal_id: Uuid) -> ProposalGuard<'_> {
        let lock = self.locks.entry(proposal_id).or_default().clone();
        ProposalGuard {
            locks: &*self.locks,
            proposal_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    pub async fn create(&self, data: &CreateCouncilProposal) -> Result<CouncilProposal, CouncilError> {
        require("title", &data.title)?;
        require("description", &data.description)?;
        require("proposedBy", &data.proposed_by)?;
        if let Some(required) = data.required_votes
            && required < 1
        {
            return Err(CouncilError::Validation(
                "requiredVotes must be at least 1".to_string(),
            ));
        }
        if let Some(threshold) = data.vote_threshold
            && !(threshold > 0.0 && threshold <= 1.0)
        {
            return Err(CouncilError::Validation(
                "voteThreshold must be greater than 0 and at most 1".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let proposal = CouncilProposal::create(&mut *tx, data).await?;
        ActivityLog::create(
            &mut *tx,
            &CreateActivityLog::new("system", format!("Council Proposal: {}", proposal.title))
                .agent(Some(&proposal.proposed_by))
                .project(proposal.project_id)
                .description(Some(truncate(&proposal.description, 200)))
                .metadata(json!({
                    "proposalId": proposal.id,
                    "proposalType": proposal.proposal_type,
                })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            proposal_id = %proposal.id,
            proposed_by = %proposal.proposed_by,
            "Council proposal created"
        );
        Ok(proposal)
    }

    pub async fn list(
        &self,
        filter: &ProposalFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProposalWithActivity>, i64), CouncilError> {
        let proposals =
            CouncilProposal::find_filtered(&self.pool, filter, limit, offset.max(0)).await?;
        let total = CouncilProposal::count_filtered(&self.pool, filter).await?;

        let mut entries = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            let votes = CouncilVote::find_by_proposal(&self.pool, proposal.id).await?;
            let discussions =
                CouncilDiscussion::find_latest(&self.pool, proposal.id, LIST_DISCUSSION_PREVIEW)
                    .await?;
            entries.push(ProposalWithActivity {
                proposal,
                votes,
                discussions,
            });
        }
        Ok((entries, total))
    }

    pub async fn detail(&self, proposal_id: Uuid) -> Result<ProposalDetail, CouncilError> {
        let proposal = CouncilProposal::find_by_id(&self.pool, proposal_id)
            .await?
            .ok_or(CouncilError::NotFound)?;
        let votes = CouncilVote::find_by_proposal(&self.pool, proposal_id).await?;
        let discussions = CouncilDiscussion::find_by_proposal(&self.pool, proposal_id).await?;

        let stats = ProposalStats::new(
            VoteTally::from_votes(&votes),
            proposal.required_votes,
            proposal.vote_threshold,
        );
        Ok(ProposalDetail {
            proposal: ProposalWithActivity {
                proposal,
                votes,
                discussions,
            },
            stats,
        })
    }

    /// Records (or replaces) the voter's ballot and resolves the proposal
    /// once the vote count reaches quorum.
    pub async fn cast_vote(
        &self,
        proposal_id: Uuid,
        ballot: &CastVote,
    ) -> Result<VoteReceipt, CouncilError> {
        require("agentId", &ballot.agent_id)?;
        if let Some(weight) = ballot.weight
            && !(weight.is_finite() && weight >= 0.0)
        {
            return Err(CouncilError::Validation(
                "weight must be a non-negative number".to_string(),
            ));
        }

        let _guard = self.lock(proposal_id).await;

        let mut tx = self.pool.begin().await?;
        let proposal = CouncilProposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(CouncilError::NotFound)?;
        if proposal.status.is_terminal() {
            return Err(CouncilError::InvalidState(proposal.status));
        }

        let vote = CouncilVote::upsert(&mut *tx, proposal_id, ballot).await?;
        if proposal.status == ProposalStatus::Open {
            CouncilProposal::leave_open(&mut *tx, proposal_id, ProposalStatus::Voting).await?;
        } else {
            CouncilProposal::touch(&mut *tx, proposal_id).await?;
        }

        let votes = CouncilVote::find_by_proposal(&mut *tx, proposal_id).await?;
        let tally = VoteTally::from_votes(&votes);
        let mut resolved = None;
        if let Some(outcome) = tally.outcome(proposal.required_votes, proposal.vote_threshold)
            && CouncilProposal::resolve(&mut *tx, proposal_id, outcome)
                .await?
                .is_some()
        {
            resolved = Some(outcome);
        }

        let description = match &vote.reasoning {
            Some(reasoning) => reasoning.clone(),
            None => format!("Agent {} voted {}", vote.agent_id, vote.vote),
        };
        ActivityLog::create(
            &mut *tx,
            &CreateActivityLog::new(
                "system",
                format!("Vote: {} on \"{}\"", vote.vote, proposal.title),
            )
            .agent(Some(&vote.agent_id))
            .description(Some(&description))
            .metadata(json!({ "proposalId": proposal_id, "vote": vote.vote })),
        )
        .await?;

        let proposal = CouncilProposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(CouncilError::NotFound)?;
        tx.commit().await?;

        if let Some(outcome) = resolved {
            tracing::info!(
                proposal_id = %proposal_id,
                approve = tally.approve,
                reject = tally.reject,
                abstain = tally.abstain,
                "Council proposal {}",
                outcome
            );
        }

        Ok(VoteReceipt {
            vote,
            proposal,
            resolved,
        })
    }

    /// Adds a discussion entry. The first entry on an open proposal moves it
    /// to deliberating; discussion never resolves a proposal and stays
    /// possible after resolution.
    pub async fn discuss(
        &self,
        proposal_id: Uuid,
        data: &CreateCouncilDiscussion,
    ) -> Result<DiscussionReceipt, CouncilError> {
        require("agentId", &data.agent_id)?;
        require("message", &data.message)?;

        let _guard = self.lock(proposal_id).await;

        let mut tx = self.pool.begin().await?;
        let proposal = CouncilProposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(CouncilError::NotFound)?;

        if let Some(parent_id) = data.parent_id {
            let parent = CouncilDiscussion::find_by_id(&mut *tx, parent_id).await?;
            if parent.is_none_or(|p| p.proposal_id != proposal_id) {
                return Err(CouncilError::Validation(
                    "parentId must reference a discussion on this proposal".to_string(),
                ));
            }
        }

        let discussion = CouncilDiscussion::create(&mut *tx, proposal_id, data).await?;
        if proposal.status == ProposalStatus::Open {
            CouncilProposal::leave_open(&mut *tx, proposal_id, ProposalStatus::Deliberating)
                .await?;
        } else if !proposal.status.is_terminal() {
            CouncilProposal::touch(&mut *tx, proposal_id).await?;
        }

        let proposal = CouncilProposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(CouncilError::NotFound)?;
        tx.commit().await?;

        Ok(DiscussionReceipt {
            discussion,
            proposal,
        })
    }

    /// Only the proposer may withdraw, and only before resolution.
    pub async fn withdraw(
        &self,
        proposal_id: Uuid,
        requester: &str,
    ) -> Result<CouncilProposal, CouncilError> {
        require("agentId", requester)?;

        let _guard = self.lock(proposal_id).await;

        let mut tx = self.pool.begin().await?;
        let proposal = CouncilProposal::find_by_id(&mut *tx, proposal_id)
            .await?
            .ok_or(CouncilError::NotFound)?;
        if proposal.proposed_by != requester {
            return Err(CouncilError::Forbidden);
        }
        if proposal.status.is_terminal() {
            return Err(CouncilError::InvalidState(proposal.status));
        }

        let withdrawn = CouncilProposal::resolve(&mut *tx, proposal_id, ProposalStatus::Withdrawn)
            .await?
            .ok_or(CouncilError::InvalidState(proposal.status))?;
        ActivityLog::create(
            &mut *tx,
            &CreateActivityLog::new(
                "system",
                format!("Proposal withdrawn: {}", withdrawn.title),
            )
            .agent(Some(requester))
            .metadata(json!({ "proposalId": proposal_id, "action": "withdrawn" })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(proposal_id = %proposal_id, "Council proposal withdrawn");
        Ok(withdrawn)
    }
}

/// Holds a proposal's mutex. On drop the registry entry is removed unless
/// another caller already holds or waits on it, so the map only tracks
/// proposals with mutations in flight.
struct ProposalGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    proposal_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProposalGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.proposal_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn require(field: &str, value: &str) -> Result<(), CouncilError> {
    if value.trim().is_empty() {
        return Err(CouncilError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            activity::ActivityFilter,
            council_vote::{CastVote, VoteChoice},
        },
    };

    use super::*;

    async fn service() -> CouncilService {
        let db = DBService::new_in_memory().await.expect("db");
        CouncilService::new(db.pool)
    }

    fn proposal(by: &str) -> CreateCouncilProposal {
        CreateCouncilProposal {
            title: "Ship ExpenseAI".into(),
            description: "GO/NO-GO for the ExpenseAI pilot".into(),
            proposed_by: by.into(),
            project_id: None,
            proposal_type: None,
            required_votes: Some(3),
            vote_threshold: Some(0.6),
            voting_closes_at: None,
        }
    }

    fn ballot(agent: &str, vote: VoteChoice) -> CastVote {
        CastVote {
            agent_id: agent.into(),
            vote,
            reasoning: None,
            weight: None,
        }
    }

    async fn status_of(council: &CouncilService, id: Uuid) -> ProposalStatus {
        council.detail(id).await.unwrap().proposal.proposal.status
    }

    #[tokio::test]
    async fn two_approvals_and_one_rejection_approve() {
        let council = service().await;
        let p = council.create(&proposal("maven-cpo")).await.unwrap();

        council
            .cast_vote(p.id, &ballot("main", VoteChoice::Approve))
            .await
            .unwrap();
        let second = council
            .cast_vote(p.id, &ballot("lumi", VoteChoice::Approve))
            .await
            .unwrap();
        assert_eq!(second.proposal.status, ProposalStatus::Voting);
        assert!(second.resolved.is_none());

        let third = council
            .cast_vote(p.id, &ballot("luna-coo", VoteChoice::Reject))
            .await
            .unwrap();
        assert_eq!(third.resolved, Some(ProposalStatus::Approved));
        assert_eq!(third.proposal.status, ProposalStatus::Approved);
        assert!(third.proposal.resolved_at.is_some());
    }

    #[tokio::test]
    async fn one_approval_and_two_rejections_reject() {
        let council = service().await;
        let p = council.create(&proposal("maven-cpo")).await.unwrap();
        for (agent, choice) in [
            ("main", VoteChoice::Approve),
            ("lumi", VoteChoice::Reject),
            ("luna-coo", VoteChoice::Reject),
        ] {
            council.cast_vote(p.id, &ballot(agent, choice)).await.unwrap();
        }
        assert_eq!(status_of(&council, p.id).await, ProposalStatus::Rejected);
    }

    #[tokio::test]
    async fn two_of_three_votes_keep_voting() {
        let council = service().await;
        let p = council.create(&proposal("maven-cpo")).await.unwrap();
        assert_eq!(p.status, ProposalStatus::Open);

        council
            .cast_vote(p.id, &ballot("main", VoteChoice::Approve))
            .await
            .unwrap();
        council
            .cast_vote(p.id, &ballot("lumi", VoteChoice::Approve))
            .await
            .unwrap();

        let detail = council.detail(p.id).await.unwrap();
        assert_eq!(detail.proposal.proposal.status, ProposalStatus::Voting);
        assert_eq!(detail.stats.total_votes, 2);
        assert!(!detail.stats.meets_quorum);
        assert!(detail.stats.meets_threshold);
    }

    #[tokio::test]
    async fn revote_replaces_earlier_ballot() {
        let council = service().await;
        let p = council.create(&proposal("maven-cpo")).await.unwrap();

        let mut first = ballot("main", VoteChoice::Reject);
        first.reasoning = Some("too early".into());
        council.cast_vote(p.id, &first).await.unwrap();
        council
            .cast_vote(p.id, &ballot("main", VoteChoice::Approve))
            .await
            .unwrap();

        let detail = council.detail(p.id).await.unwrap();
        assert_eq!(detail.proposal.votes.len(), 1);
        assert_eq!(detail.proposal.votes[0].vote, VoteChoice::Approve);
        assert_eq!(detail.proposal.votes[0].reasoning, None);
    }

    #[tokio::test]
    async fn terminal_proposals_reject_votes_and_withdrawal() {
        let council = service().await;
        let mut quick = proposal("maven-cpo");
        quick.required_votes = Some(1);
        let p = council.create(&quick).await.unwrap();
        council
            .cast_vote(p.id, &ballot("main", VoteChoice::Approve))
            .await
            .unwrap();

        let late_vote = council
            .cast_vote(p.id, &ballot("lumi", VoteChoice::Reject))
            .await;
        assert!(matches!(
            late_vote,
            Err(CouncilError::InvalidState(ProposalStatus::Approved))
        ));

        let withdraw = council.withdraw(p.id, "maven-cpo").await;
        assert!(matches!(
            withdraw,
            Err(CouncilError::InvalidState(ProposalStatus::Approved))
        ));

        let detail = council.detail(p.id).await.unwrap();
        assert_eq!(detail.proposal.proposal.status, ProposalStatus::Approved);
        assert_eq!(detail.proposal.votes.len(), 1);
    }

    #[tokio::test]
    async fn discussion_never_reopens_terminal_proposals() {
        let council = service().await;
        let mut quick = proposal("maven-cpo");
        quick.required_votes = Some(1);
        let approved = council.create(&quick).await.unwrap();
        council
            .cast_vote(approved.id, &ballot("main", VoteChoice::Approve))
            .await
            .unwrap();

        let rejected = council.create(&quick).await.unwrap();
        council
            .cast_vote(rejected.id, &ballot("main", VoteChoice::Reject))
            .await
            .unwrap();

        let withdrawn = council.create(&proposal("maven-cpo")).await.unwrap();
        council.withdraw(withdrawn.id, "maven-cpo").await.unwrap();

        for (id, expected) in [
            (approved.id, ProposalStatus::Approved),
            (rejected.id, ProposalStatus::Rejected),
            (withdrawn.id, ProposalStatus::Withdrawn),
        ] {
            let receipt = council
                .discuss(
                    id,
                    &CreateCouncilDiscussion {
                        agent_id: "lumi".into(),
                        message: "for the record".into(),
                        discussion_type: None,
                        parent_id: None,
                    },
                )
                .await
                .unwrap();
            assert_eq!(receipt.proposal.status, expected);
            assert_eq!(status_of(&council, id).await, expected);
        }
    }

    #[tokio::test]
    async fn lock_registry_only_tracks_mutations_in_flight() {
        let council = service().await;
        for _ in 0..100 {
            let missing = council
                .cast_vote(Uuid::new_v4(), &ballot("main", VoteChoice::Approve))
                .await;
            assert!(matches!(missing, Err(CouncilError::NotFound)));
        }
        assert_eq!(council.locks.len(), 0);

        let mut quick = proposal("maven-cpo");
        quick.required_votes = Some(1);
        let p = council.create(&quick).await.unwrap();
        council
            .cast_vote(p.id, &ballot("main", VoteChoice::Approve))
            .await
            .unwrap();
        let late = council
            .cast_vote(p.id, &ballot("lumi", VoteChoice::Approve))
            .await;
        assert!(late.is_err());
        assert_eq!(council.locks.len(), 0);
    }

    #[tokio::test]
    async fn only_proposer_can_withdraw() {
        let council = service().await;
        let p = council.create(&proposal("maven-cpo")).await.unwrap();

        let denied = council.withdraw(p.id, "main").await;
        assert!(matches!(denied, Err(CouncilError::Forbidden)));
        assert_eq!(status_of(&council, p.id).await, ProposalStatus::Open);

        let withdrawn = council.withdraw(p.id, "maven-cpo").await.unwrap();
        assert_eq!(withdrawn.status, ProposalStatus::Withdrawn);
        assert!(withdrawn.resolved_at.is_some());

        let again = council.withdraw(p.id, "maven-cpo").await;
        assert!(matches!(
            again,
            Err(CouncilError::InvalidState(ProposalStatus::Withdrawn))
        ));
    }

    #[tokio::test]
    async fn missing_description_persists_nothing() {
        let council = service().await;
        let mut bad = proposal("maven-cpo");
        bad.description = "   ".into();

        let result = council.create(&bad).await;
        assert!(matches!(result, Err(CouncilError::Validation(_))));

        let (entries, total) = council
            .list(&ProposalFilter::default(), 50, 0)
            .await
            .unwrap();
        assert!(entries.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn invalid_quorum_settings_are_rejected() {
        let council = service().await;
        let mut zero_votes = proposal("main");
        zero_votes.required_votes = Some(0);
        assert!(matches!(
            council.create(&zero_votes).await,
            Err(CouncilError::Validation(_))
        ));

        let mut bad_threshold = proposal("main");
        bad_threshold.vote_threshold = Some(0.0);
        assert!(matches!(
            council.create(&bad_threshold).await,
            Err(CouncilError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_proposal_is_not_found() {
        let council = service().await;
        let id = Uuid::new_v4();
        assert!(matches!(
            council.cast_vote(id, &ballot("main", VoteChoice::Approve)).await,
            Err(CouncilError::NotFound)
        ));
        assert!(matches!(
            council.withdraw(id, "main").await,
            Err(CouncilError::NotFound)
        ));
        assert!(matches!(council.detail(id).await, Err(CouncilError::NotFound)));
    }

    #[tokio::test]
    async fn negative_weight_is_rejected() {
        let council = service().await;
        let p = council.create(&proposal("main")).await.unwrap();
        let mut heavy = ballot("lumi", VoteChoice::Approve);
        heavy.weight = Some(-1.0);
        assert!(matches!(
            council.cast_vote(p.id, &heavy).await,
            Err(CouncilError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn first_event_decides_between_voting_and_deliberating() {
        let council = service().await;
        let discussed = council.create(&proposal("main")).await.unwrap();
        let receipt = council
            .discuss(
                discussed.id,
                &CreateCouncilDiscussion {
                    agent_id: "lumi".into(),
                    message: "What is the budget?".into(),
                    discussion_type: Some("question".into()),
                    parent_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.proposal.status, ProposalStatus::Deliberating);

        // a vote on a deliberating proposal counts but keeps the status
        let voted = council
            .cast_vote(discussed.id, &ballot("lumi", VoteChoice::Approve))
            .await
            .unwrap();
        assert_eq!(voted.proposal.status, ProposalStatus::Deliberating);

        let voted_first = council.create(&proposal("main")).await.unwrap();
        council
            .cast_vote(voted_first.id, &ballot("lumi", VoteChoice::Approve))
            .await
            .unwrap();
        let receipt = council
            .discuss(
                voted_first.id,
                &CreateCouncilDiscussion {
                    agent_id: "main".into(),
                    message: "Agreed".into(),
                    discussion_type: None,
                    parent_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.proposal.status, ProposalStatus::Voting);
        assert_eq!(receipt.discussion.discussion_type, "comment");
    }

    #[tokio::test]
    async fn discussion_parent_must_belong_to_proposal() {
        let council = service().await;
        let a = council.create(&proposal("main")).await.unwrap();
        let b = council.create(&proposal("main")).await.unwrap();
        let on_a = council
            .discuss(
                a.id,
                &CreateCouncilDiscussion {
                    agent_id: "lumi".into(),
                    message: "first".into(),
                    discussion_type: None,
                    parent_id: None,
                },
            )
            .await
            .unwrap();

        let cross = council
            .discuss(
                b.id,
                &CreateCouncilDiscussion {
                    agent_id: "lumi".into(),
                    message: "reply".into(),
                    discussion_type: None,
                    parent_id: Some(on_a.discussion.id),
                },
            )
            .await;
        assert!(matches!(cross, Err(CouncilError::Validation(_))));
    }

    #[tokio::test]
    async fn list_embeds_votes_and_latest_discussions() {
        let council = service().await;
        let p = council.create(&proposal("main")).await.unwrap();
        council.create(&proposal("lumi")).await.unwrap();
        for i in 0..7 {
            council
                .discuss(
                    p.id,
                    &CreateCouncilDiscussion {
                        agent_id: "lumi".into(),
                        message: format!("note {i}"),
                        discussion_type: None,
                        parent_id: None,
                    },
                )
                .await
                .unwrap();
        }
        council
            .cast_vote(p.id, &ballot("lumi", VoteChoice::Abstain))
            .await
            .unwrap();

        let filter = ProposalFilter {
            proposed_by: Some("main".into()),
            ..Default::default()
        };
        let (entries, total) = council.list(&filter, 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].votes.len(), 1);
        assert_eq!(entries[0].discussions.len(), 5);
        assert_eq!(entries[0].discussions[0].message, "note 6");
    }

    #[tokio::test]
    async fn create_and_vote_write_activity() {
        let council = service().await;
        let p = council.create(&proposal("maven-cpo")).await.unwrap();
        council
            .cast_vote(p.id, &ballot("main", VoteChoice::Approve))
            .await
            .unwrap();

        let feed = ActivityLog::find(&council.pool, &ActivityFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(feed.len(), 2);
        assert!(feed.iter().all(|a| a.activity_type == "system"));
        assert_eq!(feed[0].title, "Vote: approve on \"Ship ExpenseAI\"");
        assert_eq!(feed[1].title, "Council Proposal: Ship ExpenseAI");
    }

    #[tokio::test]
    async fn concurrent_votes_resolve_exactly_once() {
        let council = service().await;
        let p = council.create(&proposal("maven-cpo")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let council = council.clone();
            handles.push(tokio::spawn(async move {
                council
                    .cast_vote(p.id, &ballot(&format!("agent-{i}"), VoteChoice::Approve))
                    .await
            }));
        }

        let mut resolutions = 0;
        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(receipt) => {
                    accepted += 1;
                    if receipt.resolved.is_some() {
                        resolutions += 1;
                    }
                }
                Err(CouncilError::InvalidState(ProposalStatus::Approved)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(resolutions, 1);
        assert_eq!(accepted, 3);
        let detail = council.detail(p.id).await.unwrap();
        assert_eq!(detail.proposal.proposal.status, ProposalStatus::Approved);
        assert_eq!(detail.stats.total_votes, 3);
        assert_eq!(council.locks.len(), 0);
    }
}
