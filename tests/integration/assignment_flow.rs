use rotaplan_lib::commands::optimization::{optimization_accept, optimization_propose, AcceptInput};
use rotaplan_lib::commands::snapshot::snapshot_import;
use rotaplan_lib::commands::AppState;
use rotaplan_lib::config::AppConfig;
use rotaplan_lib::db::repositories::member_repository::MemberRepository;
use rotaplan_lib::db::repositories::task_repository::TaskRepository;
use rotaplan_lib::db::DbPool;
use rotaplan_lib::models::assignment::UnassignedReason;
use rotaplan_lib::models::constraints::{OptimizationConstraints, PeriodConfig, PeriodUnit};
use rotaplan_lib::models::snapshot::Snapshot;
use rotaplan_lib::models::task::STATUS_ASSIGNED;
use rotaplan_lib::services::assignment_service::OptimizationRequest;
use serde_json::json;
use tempfile::tempdir;

fn weekly_trash(week: u32) -> serde_json::Value {
    let day = 3 + 7 * week;
    let (month, day) = if day > 31 { (4, day - 31) } else { (3, day) };
    json!({
        "id": format!("trash-w{week}"),
        "title": "Take out the trash",
        "startAt": format!("2025-{month:02}-{day:02}T19:00:00Z"),
        "endAt": format!("2025-{month:02}-{day:02}T19:30:00Z"),
        "groupId": "flat",
        "parentId": "trash",
    })
}

fn snapshot() -> Snapshot {
    serde_json::from_value(json!({
        "groups": [{ "id": "flat", "name": "Flat 3B" }],
        "members": [
            { "groupId": "flat", "id": "alice", "name": "Alice", "role": "admin" },
            { "groupId": "flat", "id": "bob", "name": "Bob" }
        ],
        "tasks": [
            weekly_trash(0),
            weekly_trash(1),
            weekly_trash(2),
            weekly_trash(3),
            weekly_trash(4),
            {
                "id": "dishes-w0",
                "title": "Dishes",
                "dueDate": "2025-03-04",
                "startTime": "18:00",
                "durationMinutes": 30,
                "groupId": "flat",
                "parentId": "dishes"
            },
            {
                "id": "laundry",
                "title": "Laundry",
                "startAt": "2025-03-05T10:00:00Z",
                "endAt": "2025-03-05T11:00:00Z",
                "groupId": "flat",
                "assigneeId": "bob"
            }
        ],
        "availabilities": [
            {
                "memberId": "bob",
                "startAt": "2025-03-10T00:00:00Z",
                "endAt": "2025-03-11T00:00:00Z",
                "reason": "conference"
            }
        ]
    }))
    .expect("valid snapshot")
}

fn setup() -> (tempfile::TempDir, AppState) {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("rotaplan.sqlite");
    let pool = DbPool::new(&db_path).expect("db pool");
    let config = AppConfig {
        database_path: db_path,
        ..AppConfig::default()
    };
    let state = AppState::new(pool, config).expect("app state");
    snapshot_import(&state, snapshot()).expect("import snapshot");
    (dir, state)
}

fn request(start: &str, constraints: Option<OptimizationConstraints>) -> OptimizationRequest {
    OptimizationRequest {
        group_id: "flat".into(),
        period_start: start.into(),
        period: PeriodConfig::default(),
        constraints,
    }
}

#[test]
fn propose_accept_and_repropose() {
    let (_dir, state) = setup();

    let proposal =
        optimization_propose(&state, request("2025-03-03T00:00:00Z", None)).expect("propose");
    let result = &proposal.result;

    // trash-w4 falls after the period end and belongs to the next period.
    assert_eq!(result.stats.total_tasks, 5);
    assert_eq!(result.assignments.len(), 5);
    assert!(result.unassigned_tasks.is_empty());

    let trash_w1 = result
        .assignments
        .iter()
        .find(|a| a.task_id == "trash-w1")
        .expect("trash-w1 assigned");
    assert_eq!(trash_w1.member_id, "alice", "bob is away that week");
    assert_eq!(trash_w1.week_index, 1);

    let total_hours: f64 = result
        .stats
        .workload_distribution
        .iter()
        .map(|load| load.hours)
        .sum();
    assert!((total_hours - 2.5).abs() < 1e-9);

    // Proposing does not persist anything.
    let again =
        optimization_propose(&state, request("2025-03-03T00:00:00Z", None)).expect("propose");
    assert_eq!(again.result, proposal.result);

    let report = optimization_accept(&state, AcceptInput::from(proposal.clone())).expect("accept");
    assert_eq!(report.applied.len(), 5);

    let stored = state
        .db()
        .with_connection(|conn| TaskRepository::find_by_id(conn, "trash-w1"))
        .expect("query")
        .expect("row");
    assert_eq!(stored.assignee_id.as_deref(), Some("alice"));
    assert_eq!(stored.status, STATUS_ASSIGNED);

    let after =
        optimization_propose(&state, request("2025-03-03T00:00:00Z", None)).expect("propose");
    assert_eq!(after.result.stats.total_tasks, 0);
    assert!(after.result.unassigned_tasks.is_empty());
}

#[test]
fn accepting_twice_reports_commit_failure() {
    let (_dir, state) = setup();

    let proposal =
        optimization_propose(&state, request("2025-03-03T00:00:00Z", None)).expect("propose");
    optimization_accept(&state, AcceptInput::from(proposal.clone())).expect("first accept");

    let error = optimization_accept(&state, AcceptInput::from(proposal.clone()))
        .expect_err("second accept must fail");
    assert_eq!(error.code, "COMMIT_FAILED");
    let details = error.details.expect("details");
    assert_eq!(details["taskId"], proposal.result.assignments[0].task_id.as_str());
    assert_eq!(details["applied"], json!([]));
}

#[test]
fn previous_period_hands_the_task_over() {
    let (_dir, state) = setup();

    let first =
        optimization_propose(&state, request("2025-03-03T00:00:00Z", None)).expect("propose");
    optimization_accept(&state, AcceptInput::from(first.clone())).expect("accept");
    let last_holder = first
        .result
        .assignments
        .iter()
        .find(|a| a.task_id == "trash-w3")
        .map(|a| a.member_id.clone())
        .expect("trash-w3 assigned");

    let next = optimization_propose(
        &state,
        request(
            "2025-03-31T00:00:00Z",
            Some(OptimizationConstraints {
                consider_previous_period: true,
                ..Default::default()
            }),
        ),
    )
    .expect("propose next period");

    assert_eq!(next.result.assignments.len(), 1);
    let handoff = &next.result.assignments[0];
    assert_eq!(handoff.task_id, "trash-w4");
    assert_ne!(handoff.member_id, last_holder);
    assert!(handoff
        .score_breakdown
        .iter()
        .any(|entry| entry.label == "clean handoff from previous period"));
}

#[test]
fn unknown_group_is_a_data_source_error() {
    let (_dir, state) = setup();
    let mut unknown = request("2025-03-03T00:00:00Z", None);
    unknown.group_id = "house".into();

    let error = optimization_propose(&state, unknown).expect_err("unknown group");
    assert_eq!(error.code, "DATA_SOURCE_ERROR");
}

#[test]
fn bad_snapshot_rolls_back_the_whole_import() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("rollback.sqlite")).expect("db pool");
    let state = AppState::new(pool, AppConfig::default()).expect("app state");

    // The member points at a group that does not exist.
    let broken: Snapshot = serde_json::from_value(json!({
        "groups": [{ "id": "flat", "name": "Flat 3B" }],
        "members": [{ "groupId": "ghost", "id": "carol", "name": "Carol" }],
        "tasks": [weekly_trash(0)]
    }))
    .expect("valid json");
    let error = snapshot_import(&state, broken).expect_err("foreign key violation");
    assert_eq!(error.code, "CONFLICT");

    let group_kept = state
        .db()
        .with_connection(|conn| MemberRepository::group_exists(conn, "flat"))
        .expect("query");
    assert!(!group_kept);
}

#[test]
fn conflicts_past_the_period_end_still_count() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("late.sqlite")).expect("db pool");
    let state = AppState::new(pool, AppConfig::default()).expect("app state");

    // The shift starts on the last evening of the period and ends after it.
    let late: Snapshot = serde_json::from_value(json!({
        "groups": [{ "id": "late", "name": "Night shift" }],
        "members": [
            { "groupId": "late", "id": "alice", "name": "Alice" },
            { "groupId": "late", "id": "bob", "name": "Bob" }
        ],
        "tasks": [
            {
                "id": "t",
                "title": "Close up",
                "startAt": "2025-03-09T23:30:00Z",
                "endAt": "2025-03-10T00:30:00Z",
                "groupId": "late"
            },
            {
                "id": "inventory",
                "title": "Inventory",
                "startAt": "2025-03-10T00:20:00Z",
                "endAt": "2025-03-10T01:00:00Z",
                "groupId": "late",
                "assigneeId": "bob"
            }
        ],
        "availabilities": [
            {
                "memberId": "alice",
                "startAt": "2025-03-10T00:10:00Z",
                "endAt": "2025-03-10T05:00:00Z"
            }
        ]
    }))
    .expect("valid snapshot");
    snapshot_import(&state, late).expect("import snapshot");

    let proposal = optimization_propose(
        &state,
        OptimizationRequest {
            group_id: "late".into(),
            period_start: "2025-03-03T00:00:00Z".into(),
            period: PeriodConfig {
                duration: 1,
                unit: PeriodUnit::Weeks,
            },
            constraints: None,
        },
    )
    .expect("propose");

    let result = &proposal.result;
    assert!(result.assignments.is_empty(), "{:?}", result.assignments);
    assert_eq!(result.unassigned_tasks.len(), 1);
    assert_eq!(result.unassigned_tasks[0].task_id, "t");
    assert_eq!(result.unassigned_tasks[0].reason, UnassignedReason::NoEligibleMember);
}
