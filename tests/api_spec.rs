use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use sprintboard::api::create_router;
use sprintboard::board::CommitOutcome;
use sprintboard::db::Database;
use sprintboard::models::*;

fn setup() -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db);
    TestServer::new(app).expect("Failed to create test server")
}

async fn create_sprint(server: &TestServer, id: &str, start: Option<&str>) -> Sprint {
    server
        .post("/api/v1/sprints")
        .json(&json!({ "id": id, "start_date": start, "end_date": null }))
        .await
        .json::<Sprint>()
}

async fn create_epic(server: &TestServer, name: &str) -> Epic {
    server
        .post("/api/v1/epics")
        .json(&CreateEpicInput {
            name: name.to_string(),
        })
        .await
        .json::<Epic>()
}

async fn schedule(server: &TestServer, epic: &Epic, sprint: &str) -> CommitOutcome {
    let response = server
        .post("/api/v1/board/moves")
        .json(&json!({
            "epic_id": epic.id,
            "target": { "kind": "sprint", "id": sprint },
        }))
        .await;
    response.assert_status_ok();
    response.json::<CommitOutcome>()
}

fn names(epics: &[Epic]) -> Vec<&str> {
    epics.iter().map(|e| e.name.as_str()).collect()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();
        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }
}

mod sprints {
    use super::*;

    #[tokio::test]
    async fn creates_and_lists_sprints() {
        let server = setup();

        let response = server
            .post("/api/v1/sprints")
            .json(&json!({ "id": "007", "start_date": "2025-03-03", "end_date": "2025-03-14" }))
            .await;
        response.assert_status(StatusCode::CREATED);

        create_sprint(&server, "backlog", None).await;

        let sprints: Vec<Sprint> = server.get("/api/v1/sprints").await.json();
        let ids: Vec<String> = sprints.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["007", "backlog"]);
    }

    #[tokio::test]
    async fn duplicate_sprint_is_a_conflict() {
        let server = setup();
        create_sprint(&server, "007", None).await;

        let response = server
            .post("/api/v1/sprints")
            .json(&json!({ "id": "007" }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn inverted_dates_are_rejected() {
        let server = setup();

        let response = server
            .post("/api/v1/sprints")
            .json(&json!({ "id": "007", "start_date": "2025-03-14", "end_date": "2025-03-03" }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn get_sprint_returns_ranked_epics() {
        let server = setup();
        create_sprint(&server, "007", None).await;
        let a = create_epic(&server, "A").await;
        let b = create_epic(&server, "B").await;
        schedule(&server, &a, "007").await;
        schedule(&server, &b, "007").await;

        let response = server.get("/api/v1/sprints/007").await;

        response.assert_status_ok();
        let sprint: SprintView = response.json();
        assert_eq!(sprint.epic_count, 2);
        assert_eq!(names(&sprint.epics), vec!["A", "B"]);
        assert_eq!(sprint.epics[1].current_rank(), Some(2));
    }

    #[tokio::test]
    async fn unknown_sprint_is_not_found() {
        let server = setup();
        server.get("/api/v1/sprints/404").await.assert_status_not_found();
    }
}

mod board {
    use super::*;

    async fn seeded() -> (TestServer, Vec<Epic>) {
        let server = setup();
        create_sprint(&server, "007", Some("2025-03-03")).await;
        create_sprint(&server, "008", Some("2025-03-17")).await;

        let mut epics = Vec::new();
        for (name, sprint) in [("A", "007"), ("B", "007"), ("C", "007"), ("D", "008")] {
            let epic = create_epic(&server, name).await;
            schedule(&server, &epic, sprint).await;
            epics.push(epic);
        }
        create_epic(&server, "Loose").await;
        (server, epics)
    }

    #[tokio::test]
    async fn renders_sprints_and_ungrouped_epics() {
        let (server, _) = seeded().await;

        let board: BoardView = server.get("/api/v1/board").await.json();

        assert_eq!(board.sprints.len(), 2);
        assert_eq!(names(&board.sprints[0].epics), vec!["A", "B", "C"]);
        assert_eq!(names(&board.sprints[1].epics), vec!["D"]);
        assert_eq!(names(&board.ungrouped), vec!["Loose"]);
    }

    #[tokio::test]
    async fn collapsed_sprints_keep_their_counts() {
        let (server, _) = seeded().await;

        let board: BoardView = server
            .get("/api/v1/board")
            .add_query_param("collapsed", "007")
            .add_query_param("hide_ungrouped", true)
            .await
            .json();

        let collapsed = &board.sprints[0];
        assert!(collapsed.collapsed);
        assert_eq!(collapsed.epic_count, 3);
        assert!(collapsed.epics.is_empty());
        assert!(!board.sprints[1].collapsed);
        assert!(board.ungrouped.is_empty());
    }

    #[tokio::test]
    async fn filters_to_selected_sprints() {
        let (server, _) = seeded().await;

        let board: BoardView = server
            .get("/api/v1/board")
            .add_query_param("sprint", "008")
            .await
            .json();

        assert_eq!(board.sprints.len(), 1);
        assert_eq!(board.sprints[0].sprint.id.as_str(), "008");
    }

    #[tokio::test]
    async fn moving_onto_an_epic_reorders() {
        let (server, epics) = seeded().await;
        let (a, c) = (&epics[0], &epics[2]);

        let response = server
            .post("/api/v1/board/moves")
            .json(&json!({
                "epic_id": c.id,
                "target": { "kind": "epic", "id": a.id },
            }))
            .await;

        response.assert_status_ok();
        let outcome: CommitOutcome = response.json();
        assert_eq!(outcome.writes.len(), 3);

        let sprint: SprintView = server.get("/api/v1/sprints/007").await.json();
        assert_eq!(names(&sprint.epics), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn moving_onto_a_sprint_appends() {
        let (server, epics) = seeded().await;

        let outcome = schedule(&server, &epics[1], "008").await;

        assert_eq!(outcome.sprints.len(), 2);
        let board: BoardView = server.get("/api/v1/board").await.json();
        assert_eq!(names(&board.sprints[0].epics), vec!["A", "C"]);
        assert_eq!(names(&board.sprints[1].epics), vec!["D", "B"]);
        assert_eq!(board.sprints[1].epics[1].current_rank(), Some(2));
    }

    #[tokio::test]
    async fn unknown_epic_is_not_found() {
        let (server, epics) = seeded().await;

        let response = server
            .post("/api/v1/board/moves")
            .json(&json!({
                "epic_id": uuid::Uuid::new_v4(),
                "target": { "kind": "epic", "id": epics[0].id },
            }))
            .await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn dropping_onto_an_ungrouped_epic_is_rejected() {
        let (server, epics) = seeded().await;
        let loose = server.get("/api/v1/epics").await.json::<Vec<Epic>>().remove(0);

        let response = server
            .post("/api/v1/board/moves")
            .json(&json!({
                "epic_id": epics[0].id,
                "target": { "kind": "epic", "id": loose.id },
            }))
            .await;

        response.assert_status_bad_request();
    }
}

mod epics {
    use super::*;

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let server = setup();
        let response = server
            .post("/api/v1/epics")
            .json(&json!({ "name": "  " }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn unknown_epic_is_not_found() {
        let server = setup();
        server
            .get(&format!("/api/v1/epics/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn work_items_roll_up_into_progress() {
        let server = setup();
        let epic = create_epic(&server, "Checkout").await;

        let response = server
            .post(&format!("/api/v1/epics/{}/work-items", epic.id))
            .json(&json!({ "title": "Cart", "points": 3 }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let item: WorkItem = response.json();

        server
            .post(&format!("/api/v1/work-items/{}/complete", item.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let epic: Epic = server.get(&format!("/api/v1/epics/{}", epic.id)).await.json();
        assert_eq!(epic.work_items.total, 1);
        assert_eq!(epic.work_items.completed_points, 3);
    }

    #[tokio::test]
    async fn completing_an_unknown_work_item_is_not_found() {
        let server = setup();
        server
            .post(&format!("/api/v1/work-items/{}/complete", uuid::Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }
}
