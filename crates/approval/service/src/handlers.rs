//! Request handlers for the approval API.
//!
//! Authentication is an external collaborator: the only identity
//! resolution done here is reading the `x-user-id` header the auth
//! proxy injects.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use approval_storage::QueryWindow;
use approval_types::{
    FieldDef, FormSubmission, FormTemplate, Priority, ReviewAction, SubmissionId, TemplateId,
    UserId, Workflow, WorkflowId, WorkflowStep,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Resolve the acting user from the request headers.
fn acting_user(headers: &HeaderMap) -> ApiResult<UserId> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(UserId::new)
        .ok_or_else(|| ApiError::Forbidden("missing x-user-id header".into()))
}

// ── Health ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ── Submissions ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    pub form_template_id: String,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    #[serde(default)]
    pub priority: Priority,
}

pub async fn create_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSubmissionRequest>,
) -> ApiResult<(StatusCode, Json<FormSubmission>)> {
    let actor = acting_user(&headers)?;
    let submission = state
        .engine
        .submit(
            &TemplateId::new(payload.form_template_id),
            &actor,
            payload.data,
            payload.priority,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub comment: Option<String>,
}

pub async fn submission_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ActionRequest>,
) -> ApiResult<Json<FormSubmission>> {
    let actor = acting_user(&headers)?;
    let action: ReviewAction = payload.action.parse().map_err(ApiError::Approval)?;
    let submission = state
        .engine
        .act(&SubmissionId::new(id), &actor, action, payload.comment)
        .await?;
    Ok(Json(submission))
}

pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FormSubmission>> {
    let submission = state.engine.get(&SubmissionId::new(id)).await?;
    Ok(Json(submission))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub status: String,
}

pub async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<DeletedResponse>> {
    let actor = acting_user(&headers)?;
    state.engine.delete(&SubmissionId::new(id), &actor).await?;
    Ok(Json(DeletedResponse {
        status: "deleted".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

pub async fn list_submissions(
    State(state): State<AppState>,
    Query(window): Query<WindowParams>,
) -> ApiResult<Json<Vec<FormSubmission>>> {
    let submissions = state
        .engine
        .list(QueryWindow {
            limit: window.limit,
            offset: window.offset,
        })
        .await?;
    Ok(Json(submissions))
}

// ── Workflows ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WorkflowStepPayload {
    pub order: u32,
    pub role_id: String,
    pub department_id: Option<String>,
    pub approver_id: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct WorkflowPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub activate: bool,
    pub steps: Vec<WorkflowStepPayload>,
}

fn build_workflow(payload: WorkflowPayload) -> ApiResult<Workflow> {
    let mut workflow = Workflow::new(payload.name).with_description(payload.description);
    if payload.activate {
        workflow = workflow.activated();
    }
    for step in payload.steps {
        let mut definition = WorkflowStep::new(step.order, approval_types::RoleId::new(step.role_id));
        if let Some(dept) = step.department_id {
            definition = definition.with_department(approval_types::DepartmentId::new(dept));
        }
        if let Some(approver) = step.approver_id {
            definition = definition.with_approver(UserId::new(approver));
        }
        if !step.required {
            definition = definition.optional();
        }
        workflow.add_step(definition)?;
    }
    Ok(workflow)
}

pub async fn create_workflow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WorkflowPayload>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let actor = acting_user(&headers)?;
    let workflow = build_workflow(payload)?;
    let stored = state.engine.create_workflow(&actor, workflow).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<WorkflowPayload>,
) -> ApiResult<Json<Workflow>> {
    let actor = acting_user(&headers)?;
    let mut workflow = build_workflow(payload)?;
    workflow.id = WorkflowId::new(id);
    let stored = state.engine.update_workflow(&actor, workflow).await?;
    Ok(Json(stored))
}

pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<DeletedResponse>> {
    let actor = acting_user(&headers)?;
    state
        .engine
        .delete_workflow(&actor, &WorkflowId::new(id))
        .await?;
    Ok(Json(DeletedResponse {
        status: "deleted".to_string(),
    }))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    let workflow = state.engine.get_workflow(&WorkflowId::new(id)).await?;
    Ok(Json(workflow))
}

pub async fn list_workflows(
    State(state): State<AppState>,
    Query(window): Query<WindowParams>,
) -> ApiResult<Json<Vec<Workflow>>> {
    let workflows = state
        .engine
        .list_workflows(QueryWindow {
            limit: window.limit,
            offset: window.offset,
        })
        .await?;
    Ok(Json(workflows))
}

// ── Templates ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TemplatePayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub workflow_id: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

pub async fn create_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TemplatePayload>,
) -> ApiResult<(StatusCode, Json<FormTemplate>)> {
    let actor = acting_user(&headers)?;
    let mut template = FormTemplate::new(payload.name, WorkflowId::new(payload.workflow_id))
        .with_description(payload.description);
    template.fields = payload.fields;
    let stored = state.engine.create_template(&actor, template).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
