//! API router configuration.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Submissions
        .route("/submissions", post(handlers::create_submission))
        .route("/submissions", get(handlers::list_submissions))
        .route("/submissions/:id", get(handlers::get_submission))
        .route("/submissions/:id", delete(handlers::delete_submission))
        .route("/submissions/:id/action", post(handlers::submission_action))
        // Workflows
        .route("/workflows", post(handlers::create_workflow))
        .route("/workflows", get(handlers::list_workflows))
        .route("/workflows/:id", get(handlers::get_workflow))
        .route("/workflows/:id", put(handlers::update_workflow))
        .route("/workflows/:id", delete(handlers::delete_workflow))
        // Templates
        .route("/templates", post(handlers::create_template));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_directory::{FirstById, InMemoryDirectory};
    use approval_effects::{EffectsExecutor, LoggingDispatcher};
    use approval_engine::ApprovalEngine;
    use approval_storage::{InMemoryStore, TemplateStore, WorkflowStore};
    use approval_types::{
        FormTemplate, Role, RoleId, TemplateId, User, Workflow, WorkflowStep,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_router() -> (Router, TemplateId) {
        let directory = Arc::new(InMemoryDirectory::new());
        let storage = Arc::new(InMemoryStore::new());
        let (queue, _executor) = EffectsExecutor::channel(Arc::new(LoggingDispatcher));
        let engine = Arc::new(ApprovalEngine::with_selection_policy(
            directory.clone(),
            storage.clone(),
            queue,
            Arc::new(FirstById),
        ));

        directory.add_role(Role::new("employee", "Employee"));
        directory.add_role(Role::new("manager", "Manager"));
        directory.add_user(User::new(
            "alice",
            "Alice",
            "alice@example.com",
            RoleId::new("employee"),
        ));
        directory.add_user(User::new(
            "bob",
            "Bob",
            "bob@example.com",
            RoleId::new("manager"),
        ));

        let mut workflow = Workflow::new("Sign-off").activated();
        workflow
            .add_step(WorkflowStep::new(1, RoleId::new("manager")))
            .unwrap();
        let workflow_id = workflow.id.clone();
        storage.create_workflow(workflow).await.unwrap();
        let template = FormTemplate::new("Request", workflow_id);
        let template_id = template.id.clone();
        storage.create_template(template).await.unwrap();

        (create_router(AppState::new(engine)), template_id)
    }

    fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = test_router().await;
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submission_lifecycle_over_http() {
        let (router, template_id) = test_router().await;

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/submissions",
                Some("alice"),
                json!({ "form_template_id": template_id.0, "priority": "high", "data": {} }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let submission = body_json(response).await;
        assert_eq!(submission["status"], "pending");
        let id = submission["id"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/submissions/{id}/action"),
                Some("bob"),
                json!({ "action": "approve" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["status"], "approved");

        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/submissions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_identity_is_forbidden() {
        let (router, template_id) = test_router().await;
        let response = router
            .oneshot(json_request(
                "POST",
                "/api/v1/submissions",
                None,
                json!({ "form_template_id": template_id.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_action_is_bad_request() {
        let (router, template_id) = test_router().await;

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/submissions",
                Some("alice"),
                json!({ "form_template_id": template_id.0 }),
            ))
            .await
            .unwrap();
        let submission = body_json(response).await;
        let id = submission["id"].as_str().unwrap();

        let response = router
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/submissions/{id}/action"),
                Some("bob"),
                json!({ "action": "escalate" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unauthorized_actor_is_forbidden() {
        let (router, template_id) = test_router().await;

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/submissions",
                Some("alice"),
                json!({ "form_template_id": template_id.0 }),
            ))
            .await
            .unwrap();
        let submission = body_json(response).await;
        let id = submission["id"].as_str().unwrap();

        let response = router
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/submissions/{id}/action"),
                Some("alice"),
                json!({ "action": "approve" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_pending_delete_conflicts() {
        let (router, template_id) = test_router().await;

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/submissions",
                Some("alice"),
                json!({ "form_template_id": template_id.0 }),
            ))
            .await
            .unwrap();
        let submission = body_json(response).await;
        let id = submission["id"].as_str().unwrap();

        let mut request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/submissions/{id}"))
            .header("x-user-id", "alice");
        request = request.header("content-type", "application/json");
        let response = router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_submission_is_not_found() {
        let (router, _) = test_router().await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/submissions/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_workflow_and_template_creation_over_http() {
        let (router, _) = test_router().await;

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/workflows",
                Some("alice"),
                json!({
                    "name": "Purchase",
                    "activate": true,
                    "steps": [{ "order": 1, "role_id": "manager" }]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let workflow = body_json(response).await;
        let workflow_id = workflow["id"].as_str().unwrap();

        let response = router
            .oneshot(json_request(
                "POST",
                "/api/v1/templates",
                Some("alice"),
                json!({ "name": "Purchase Form", "workflow_id": workflow_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
