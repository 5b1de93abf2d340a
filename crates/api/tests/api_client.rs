//! Integration tests for [`TaskboardApi`] against an in-process axum
//! backend.

use assert_matches::assert_matches;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use taskboard_api::requests::{NewTask, NextTask};
use taskboard_api::{ApiError, TaskboardApi};
use taskboard_core::log::LogType;
use taskboard_core::role::{Actor, Role};
use taskboard_core::task::{Priority, TaskStatus};
use taskboard_core::worker::Availability;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn employee() -> Actor {
    Actor {
        id: 7,
        username: "dana".into(),
        full_name: "Dana Park".into(),
        role: Role::Employee,
    }
}

fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("User-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn reads_operator_collections() {
    let router = Router::new()
        .route(
            "/api/tasks/recent",
            get(|| async {
                Json(json!([
                    {"taskId": "t-1", "name": "Export", "status": "RUNNING", "progress": 30, "workerId": "worker-1", "priority": 1},
                    {"taskId": "t-2", "name": "Import", "status": "PENDING"}
                ]))
            }),
        )
        .route(
            "/api/workers",
            get(|| async {
                Json(json!([{"workerId": "worker-1", "status": "IDLE", "tasksProcessed": 4, "currentTaskId": "t-1"}]))
            }),
        )
        .route(
            "/api/tasks/statistics",
            get(|| async { Json(json!({"pending": 1, "running": 1, "completed": 5, "failed": 0})) }),
        )
        .route(
            "/api/logs",
            get(|| async {
                Json(json!([
                    {"message": "newest", "type": "SUCCESS"},
                    {"message": "oldest", "type": "INFO"}
                ]))
            }),
        );
    let api = TaskboardApi::new(serve(router).await);

    let tasks = api.fetch_tasks("/tasks/recent").await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].priority, Priority::CRITICAL);
    assert_eq!(tasks[1].priority, Priority::MEDIUM);

    let workers = api.fetch_workers("/workers").await.unwrap();
    assert!(workers[0].availability.is_working());

    let stats = api.fetch_statistics("/tasks/statistics").await.unwrap();
    assert_eq!(stats.completed, 5);

    let logs = api.fetch_logs("/logs").await.unwrap();
    assert_eq!(logs[0].message, "oldest");
    assert_eq!(logs[1].kind, LogType::Success);
}

#[tokio::test]
async fn operator_requests_carry_no_identity_header() {
    let router = Router::new().route(
        "/api/workers",
        get(|headers: HeaderMap| async move {
            assert!(user_id(&headers).is_none());
            Json(json!([]))
        }),
    );
    let api = TaskboardApi::new(serve(router).await).for_actor(&Actor::operator());
    assert!(api.fetch_workers("/workers").await.unwrap().is_empty());
}

#[tokio::test]
async fn employee_dashboard_and_actions_send_identity() {
    let router = Router::new()
        .route(
            "/api/employee/tasks/dashboard",
            get(|headers: HeaderMap| async move {
                assert_eq!(user_id(&headers).as_deref(), Some("7"));
                Json(json!({
                    "currentTask": {"taskId": "t-5", "name": "Audit", "status": "RUNNING", "assignedTo": {"id": 7}},
                    "stats": {"totalAssigned": 3, "totalCompleted": 2, "totalFailed": 0, "isWorking": true, "averageTimeMinutes": 4.5},
                    "recentTasks": [{"taskId": "t-4", "status": "COMPLETED"}]
                }))
            }),
        )
        .route(
            "/api/employee/tasks/get-next",
            post(|| async { Json(json!({"message": "No tasks available"})) }),
        )
        .route(
            "/api/employee/tasks/{id}/complete",
            post(|Path(id): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(user_id(&headers).as_deref(), Some("7"));
                Json(json!({
                    "taskId": id,
                    "status": "COMPLETED",
                    "completionMessage": body["message"],
                    "assignedTo": {"id": 7}
                }))
            }),
        )
        .route(
            "/api/employee/tasks/{id}/progress",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["progress"], 60);
                Json(json!({"message": "Progress updated"}))
            }),
        );
    let api = TaskboardApi::new(serve(router).await).for_actor(&employee());

    let dashboard = api
        .fetch_employee_dashboard("/employee/tasks/dashboard")
        .await
        .unwrap();
    assert_eq!(dashboard.current_task.unwrap().assignee.as_deref(), Some("employee-7"));
    assert!(dashboard.stats.is_working);
    assert_eq!(dashboard.recent_tasks.len(), 1);

    assert_matches!(
        api.get_next_task().await.unwrap(),
        NextTask::Unavailable(msg) if msg == "No tasks available"
    );

    api.update_progress("t-5", 60).await.unwrap();

    let done = api.complete_task("t-5", "all good").await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.completion_message.as_deref(), Some("all good"));
}

#[tokio::test]
async fn server_error_payload_becomes_user_message() {
    let router = Router::new().route(
        "/api/employee/tasks/{id}/fail",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Task is not assigned to you"})),
            )
        }),
    );
    let api = TaskboardApi::new(serve(router).await).for_actor(&employee());

    let err = api.fail_task("t-9", "blocked").await.unwrap_err();
    assert_matches!(err, ApiError::ApiError { status: 400, .. });
    assert_eq!(err.user_message("Failed to update task"), "Task is not assigned to you");
}

#[tokio::test]
async fn admin_creates_task_with_priority() {
    let router = Router::new().route(
        "/api/admin/tasks",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["priority"], 1);
            assert_eq!(body["description"], "Rotate keys");
            Json(json!({"taskId": "t-new", "name": body["name"], "status": "PENDING", "priority": body["priority"]}))
        }),
    );
    let admin = Actor {
        id: 1,
        username: "root".into(),
        full_name: "Admin".into(),
        role: Role::Admin,
    };
    let api = TaskboardApi::new(serve(router).await).for_actor(&admin);

    let created = api
        .create_task(
            "/admin/tasks",
            &NewTask::Assignment {
                name: "Key rotation".into(),
                description: "Rotate keys".into(),
                priority: Priority::CRITICAL,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.id, "t-new");
    assert_eq!(created.status, TaskStatus::Pending);
    assert_eq!(created.priority, Priority::CRITICAL);
}

#[tokio::test]
async fn login_maps_user_record() {
    let router = Router::new().route(
        "/api/auth/login",
        post(|Json(body): Json<Value>| async move {
            if body["password"] == "secret" {
                Ok(Json(json!({"id": 7, "username": "dana", "fullName": "Dana Park", "role": "EMPLOYEE", "status": "ACTIVE"})))
            } else {
                Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid username or password"}))))
            }
        }),
    );
    let api = TaskboardApi::new(serve(router).await);

    let actor = api.login("dana", "secret").await.unwrap();
    assert_eq!(actor, employee());

    let err = api.login("dana", "wrong").await.unwrap_err();
    assert_eq!(err.user_message("Login failed"), "Invalid username or password");
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let router = Router::new().route("/api/workers", get(|| async { "not json" }));
    let api = TaskboardApi::new(serve(router).await);
    assert_matches!(api.fetch_workers("/workers").await, Err(ApiError::Decode(_)));
}

#[tokio::test]
async fn employees_map_onto_workers() {
    let router = Router::new().route(
        "/api/admin/employees",
        get(|| async {
            Json(json!([{"id": 3, "username": "sam", "fullName": "Sam", "email": "s@x", "status": "ACTIVE",
                "stats": {"totalAssigned": 2, "totalCompleted": 1, "totalFailed": 1, "isWorking": false, "averageTimeMinutes": 3.0}}]))
        }),
    );
    let api = TaskboardApi::new(serve(router).await);
    let workers = api.fetch_employees("/admin/employees").await.unwrap();
    assert_eq!(workers[0].id, "employee-3");
    assert_eq!(workers[0].availability, Availability::Employee { is_working: false });
}
