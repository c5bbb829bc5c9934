use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
    tasks::{
        dto::{CreateTaskRequest, ListParams, MessageResponse, PageEnvelope, UpdateTaskRequest},
        repo_types::Task,
        services::{self, TASK_NOT_FOUND},
    },
};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

/// A path segment that does not even decode cannot name a task.
fn task_id(path: Result<Path<String>, PathRejection>) -> AppResult<String> {
    path.map(|Path(id)| id).map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "undecodable task id");
        AppError::NotFound(TASK_NOT_FOUND.into())
    })
}

#[instrument(skip(state, user, query), fields(user_id = %user.id))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<PageEnvelope>> {
    let Query(params) = query?;
    let page = services::list_tasks(state.tasks.as_ref(), &user, params.into()).await?;
    Ok(Json(page))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let Json(req) = payload?;
    let task = services::create_task(state.tasks.as_ref(), &user, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state, user, path), fields(user_id = %user.id))]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<String>, PathRejection>,
) -> AppResult<Json<Task>> {
    let id = task_id(path)?;
    let task = services::get_task(state.tasks.as_ref(), &user, &id).await?;
    Ok(Json(task))
}

#[instrument(skip(state, user, path, payload), fields(user_id = %user.id))]
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> AppResult<Json<Task>> {
    let id = task_id(path)?;
    let Json(req) = payload?;
    let task = services::update_task(state.tasks.as_ref(), &user, &id, req).await?;
    Ok(Json(task))
}

#[instrument(skip(state, user, path), fields(user_id = %user.id))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<String>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let id = task_id(path)?;
    services::delete_task(state.tasks.as_ref(), &user, &id).await?;
    Ok(Json(MessageResponse {
        message: "Task removed successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn task_routes_require_authentication() {
        let app = TestApp::new();
        let id = uuid::Uuid::new_v4();
        for (method, uri) in [
            (Method::GET, "/api/tasks".to_string()),
            (Method::POST, "/api/tasks".to_string()),
            (Method::GET, format!("/api/tasks/{id}")),
            (Method::PUT, format!("/api/tasks/{id}")),
            (Method::DELETE, format!("/api/tasks/{id}")),
        ] {
            let (status, body) = app.send(method, &uri, None, Some(json!({}))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["message"], "Not authorized, no token");
        }
    }

    #[tokio::test]
    async fn create_get_update_delete_cycle() {
        let app = TestApp::new();
        let (user_id, token) = app.register("owner@x.com").await;

        let task = app
            .create_task(&token, json!({ "title": "Write report", "description": "Q3 numbers" }))
            .await;
        assert_eq!(task["status"], "Pending");
        assert_eq!(task["ownerId"], user_id.as_str());
        let id = task["id"].as_str().unwrap().to_string();
        let uri = format!("/api/tasks/{id}");

        let (status, fetched) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, task);

        let (status, updated) = app
            .send(Method::PUT, &uri, Some(&token), Some(json!({ "status": "In Progress", "title": "" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "In Progress");
        assert_eq!(updated["title"], "Write report");
        assert_eq!(updated["description"], "Q3 numbers");

        let (status, body) = app.send(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Task removed successfully");

        let (status, _) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn owner_id_in_body_is_ignored() {
        let app = TestApp::new();
        let (victim_id, _) = app.register("victim@x.com").await;
        let (attacker_id, token) = app.register("attacker@x.com").await;
        let task = app
            .create_task(&token, json!({ "title": "sneaky", "ownerId": victim_id }))
            .await;
        assert_eq!(task["ownerId"], attacker_id.as_str());
    }

    #[tokio::test]
    async fn validation_errors_are_bad_request() {
        let app = TestApp::new();
        let (_, token) = app.register("v@x.com").await;

        let (status, body) = app
            .send(Method::POST, "/api/tasks", Some(&token), Some(json!({ "description": "no title" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Task requires a title");

        let (status, _) = app
            .send(Method::POST, "/api/tasks", Some(&token), Some(json!({ "title": "x", "status": "Done" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let task = app.create_task(&token, json!({ "title": "x" })).await;
        let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());
        let (status, _) = app
            .send(Method::PUT, &uri, Some(&token), Some(json!({ "status": "Finished" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn other_users_get_forbidden_without_task_contents() {
        let app = TestApp::new();
        let (_, alice) = app.register("alice@x.com").await;
        let (_, mallory) = app.register("mallory@x.com").await;
        let task = app
            .create_task(&alice, json!({ "title": "Alice's secret plan", "description": "classified" }))
            .await;
        let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

        for (method, body) in [
            (Method::GET, None),
            (Method::PUT, Some(json!({ "title": "pwned" }))),
            (Method::DELETE, None),
        ] {
            let (status, res) = app.send(method, &uri, Some(&mallory), body).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            let text = res.to_string();
            assert!(!text.contains("secret plan"));
            assert!(!text.contains("classified"));
        }

        let (status, still_there) = app.send(Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(still_there["title"], "Alice's secret plan");
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let app = TestApp::new();
        let (_, token) = app.register("n@x.com").await;
        let (status, body) = app
            .send(Method::GET, &format!("/api/tasks/{}", uuid::Uuid::new_v4()), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Task not found");
        let (status, _) = app.send(Method::DELETE, "/api/tasks/12345", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Invalid UTF-8 once percent-decoded.
        let (status, body) = app.send(Method::GET, "/api/tasks/%FF", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Task not found");
    }

    #[tokio::test]
    async fn unparseable_list_query_keeps_the_json_error_shape() {
        let app = TestApp::new();
        let (_, token) = app.register("dup@x.com").await;
        for uri in ["/api/tasks?page=1&page=2", "/api/tasks?status=Pending&status=Completed"] {
            let (status, body) = app.send(Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            let message = body["message"].as_str().unwrap_or_default();
            assert!(message.contains("duplicate field"), "{uri}: {body}");
        }
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let app = TestApp::new();
        let (_, token) = app.register("lister@x.com").await;
        let (_, other) = app.register("other@x.com").await;
        app.create_task(&other, json!({ "title": "other api task" })).await;

        app.create_task(&token, json!({ "title": "T1", "status": "Pending" })).await;
        let t2 = app
            .create_task(&token, json!({ "title": "Finish backend API documentation", "status": "Completed" }))
            .await;
        for i in 0..10 {
            app.create_task(&token, json!({ "title": format!("filler {i}") })).await;
        }

        let (status, page) = app
            .send(Method::GET, "/api/tasks?status=Completed", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["items"], json!([t2]));
        assert_eq!(page["totalCount"], 1);
        assert_eq!(page["pageCount"], 1);

        let (_, page) = app
            .send(Method::GET, "/api/tasks?keyword=api&status=All", Some(&token), None)
            .await;
        assert_eq!(page["totalCount"], 1);

        let (_, page) = app.send(Method::GET, "/api/tasks", Some(&token), None).await;
        assert_eq!(page["totalCount"], 12);
        assert_eq!(page["pageCount"], 2);
        assert_eq!(page["pageSize"], 10);
        assert_eq!(page["page"], 1);
        assert_eq!(page["items"].as_array().unwrap().len(), 10);
        assert_eq!(page["items"][0]["title"], "filler 9");

        let (_, page) = app
            .send(Method::GET, "/api/tasks?page=2&limit=10&keyword=", Some(&token), None)
            .await;
        assert_eq!(page["items"].as_array().unwrap().len(), 2);

        let (status, page) = app
            .send(Method::GET, "/api/tasks?page=7&limit=5", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["items"], json!([]));
        assert_eq!(page["pageCount"], 3);

        let (_, page) = app
            .send(Method::GET, "/api/tasks?status=Nonsense", Some(&token), None)
            .await;
        assert_eq!(page["totalCount"], 0);
    }
}
