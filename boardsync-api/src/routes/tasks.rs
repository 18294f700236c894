/// Task endpoints
///
/// Read endpoints are cache-backed: a hit is served straight from the
/// response cache, a miss recomputes the snapshot from the store and
/// caches it. Responses carry `{"data": ..., "source": "cache"|"store"}`
/// so clients (and tests) can tell which path served them.
///
/// Mutation endpoints are thin wrappers over the
/// [`MutationService`](crate::mutation::MutationService), which owns the
/// persist → invalidate → broadcast sequence.
use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use boardsync_shared::{
    auth::middleware::AuthContext,
    models::{
        task::{AssignTaskRequest, CreateTaskRequest, Task, TaskView, UpdateTaskRequest},
        user::UserSummary,
    },
};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    app::AppState,
    cache::CacheKey,
    error::{validation_error, ApiError, ApiResult},
};

/// Projects tasks into views with assignee names resolved in one pass
async fn views_with_names(state: &AppState, tasks: Vec<Task>) -> Vec<TaskView> {
    let names: HashMap<i64, String> = state
        .store
        .users()
        .await
        .into_iter()
        .map(|u| (u.id, u.full_name))
        .collect();

    tasks
        .iter()
        .map(|task| {
            let name = task.assignee.and_then(|id| names.get(&id).cloned());
            TaskView::from_task(task, name)
        })
        .collect()
}

fn cached(data: Value) -> Json<Value> {
    Json(json!({ "data": data, "source": "cache" }))
}

fn fresh(data: Value) -> Json<Value> {
    Json(json!({ "data": data, "source": "store" }))
}

/// `GET /api/v1/tasks` — all tasks, cache-backed
pub async fn list_all_tasks(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if let Some(data) = state.cache.get(&CacheKey::AllTasks) {
        return Ok(cached(data));
    }

    let observed = state.cache.generation();
    let views = views_with_names(&state, state.store.all_tasks().await).await;
    let data = serde_json::to_value(&views)?;
    state.cache.set_if_current(CacheKey::AllTasks, data.clone(), observed);
    Ok(fresh(data))
}

/// `GET /api/v1/tasks/my-tasks` — the caller's tasks, cache-backed
pub async fn list_my_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let key = CacheKey::MyTasks(auth.user_id);
    if let Some(data) = state.cache.get(&key) {
        return Ok(cached(data));
    }

    let observed = state.cache.generation();
    let views = views_with_names(&state, state.store.tasks_for(auth.user_id).await).await;
    let data = serde_json::to_value(&views)?;
    state.cache.set_if_current(key, data.clone(), observed);
    Ok(fresh(data))
}

/// `GET /api/v1/tasks/:id` — a single task, cache-backed
pub async fn get_task_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let key = CacheKey::TaskById(id);
    if let Some(data) = state.cache.get(&key) {
        return Ok(cached(data));
    }

    let observed = state.cache.generation();
    let task = state
        .store
        .task(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    let assignee_name = match task.assignee {
        Some(user_id) => state.store.user(user_id).await.map(|u| u.full_name),
        None => None,
    };
    let data = serde_json::to_value(TaskView::from_task(&task, assignee_name))?;
    state.cache.set_if_current(key, data.clone(), observed);
    Ok(fresh(data))
}

/// `GET /api/v1/tasks/users` — user directory (id, name, email only)
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users: Vec<UserSummary> = state
        .store
        .users()
        .await
        .iter()
        .map(|u| u.summary())
        .collect();
    Ok(Json(json!({ "data": users })))
}

/// `POST /api/v1/tasks` — create a task
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    req.validate().map_err(validation_error)?;

    let view = state.mutations.create(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Task created successfully",
            "data": { "task_id": view.task_id },
        })),
    ))
}

/// `PUT /api/v1/tasks/:id` — partial update
///
/// The body's `task_id` must match the path ID, otherwise 400.
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Value>> {
    req.validate().map_err(validation_error)?;
    if req.task_id != id {
        return Err(ApiError::BadRequest(
            "Task ID in body must match the path".to_string(),
        ));
    }

    state.mutations.update(id, req).await?;

    Ok(Json(json!({ "message": "Task updated successfully" })))
}

/// `PUT /api/v1/tasks/assign` — reassign a task
pub async fn assign_task(
    State(state): State<AppState>,
    Json(req): Json<AssignTaskRequest>,
) -> ApiResult<Json<Value>> {
    req.validate().map_err(validation_error)?;

    let view = state.mutations.assign(req).await?;

    Ok(Json(json!({
        "message": format!("Task {} assigned successfully", view.task_id),
    })))
}

/// `DELETE /api/v1/tasks/:id` — delete a task
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.mutations.delete(id).await?;

    Ok(Json(json!({ "message": "Task deleted successfully" })))
}
