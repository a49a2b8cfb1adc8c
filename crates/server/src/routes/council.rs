use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    council_discussion::{CouncilDiscussion, CreateCouncilDiscussion},
    council_proposal::{
        CouncilProposal, CreateCouncilProposal, ProposalFilter, ProposalStatus,
        ProposalWithActivity,
    },
    council_vote::{CastVote, CouncilVote},
    empty_as_none, page_limit,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{council::ProposalDetail, events::Event};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, QueryParams},
};

const PROPOSAL_PAGE_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<ProposalStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub proposed_by: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawProposal {
    pub agent_id: String,
}

#[derive(Debug, Serialize)]
pub struct ProposalEnvelope {
    pub proposal: CouncilProposal,
}

#[derive(Debug, Serialize)]
pub struct ProposalList {
    pub proposals: Vec<ProposalWithActivity>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct VoteEnvelope {
    pub vote: CouncilVote,
}

#[derive(Debug, Serialize)]
pub struct DiscussionEnvelope {
    pub discussion: CouncilDiscussion,
}

pub async fn create_proposal(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateCouncilProposal>,
) -> Result<ResponseJson<ApiResponse<ProposalEnvelope>>, ApiError> {
    let proposal = deployment.council().create(&payload).await?;
    deployment.publish(Event::proposal_update(&proposal, "created"));
    Ok(ResponseJson(ApiResponse::success(ProposalEnvelope {
        proposal,
    })))
}

pub async fn get_proposals(
    State(deployment): State<DeploymentImpl>,
    QueryParams(query): QueryParams<ProposalQuery>,
) -> Result<ResponseJson<ApiResponse<ProposalList>>, ApiError> {
    let filter = ProposalFilter {
        status: query.status,
        proposed_by: query.proposed_by,
    };
    let (proposals, total) = deployment
        .council()
        .list(
            &filter,
            page_limit(query.limit, PROPOSAL_PAGE_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(ProposalList {
        proposals,
        total,
    })))
}

pub async fn get_proposal(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProposalDetail>>, ApiError> {
    let detail = deployment.council().detail(id).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn cast_vote(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<CastVote>,
) -> Result<ResponseJson<ApiResponse<VoteEnvelope>>, ApiError> {
    let receipt = deployment.council().cast_vote(id, &payload).await?;
    let action = match receipt.resolved {
        Some(_) => "resolved",
        None => "voted",
    };
    deployment.publish(Event::proposal_update(&receipt.proposal, action));
    Ok(ResponseJson(ApiResponse::success(VoteEnvelope {
        vote: receipt.vote,
    })))
}

pub async fn discuss(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<CreateCouncilDiscussion>,
) -> Result<ResponseJson<ApiResponse<DiscussionEnvelope>>, ApiError> {
    let receipt = deployment.council().discuss(id, &payload).await?;
    deployment.publish(Event::proposal_update(&receipt.proposal, "discussed"));
    Ok(ResponseJson(ApiResponse::success(DiscussionEnvelope {
        discussion: receipt.discussion,
    })))
}

pub async fn withdraw(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<WithdrawProposal>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let proposal = deployment.council().withdraw(id, &payload.agent_id).await?;
    deployment.publish(Event::proposal_update(&proposal, "withdrawn"));
    Ok(ResponseJson(ApiResponse::ok()))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/proposals", get(get_proposals).post(create_proposal))
        .route("/proposals/{id}", get(get_proposal))
        .route("/proposals/{id}/vote", post(cast_vote))
        .route("/proposals/{id}/discuss", post(discuss))
        .route("/proposals/{id}/withdraw", post(withdraw))
}
