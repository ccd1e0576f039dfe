#[cfg(test)]
mod integration_tests {
    use crate::caller::permissions;
    use crate::handlers::schedules::{CreateScheduleRequest, ScheduleActivityInput};
    use crate::schemas::{ApiResponse, ErrorResponse};
    use crate::test_utils::test_utils::{
        as_user, days_from_today, seed_activity, seed_admin, seed_district, seed_form_field,
        seed_notification, seed_schedule, seed_tehsil, seed_user, setup_test_app, setup_test_server, today,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use model::entities::activity_field::FieldKind;
    use model::entities::user::RoleLevel;
    use model::entities::{complaint_history, district_activity, notification, tehsil_activity, user, user_activity};
    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
    use serde_json::{json, Value};

    // "hello" in base64; small enough for every media rule.
    const PIXEL: &str = "aGVsbG8=";

    fn upload(file_name: &str) -> Value {
        json!({ "file_name": file_name, "content_type": "image/png", "data": PIXEL })
    }

    /// Performs a row of an activity whose form is `topic` (text) and `photos`.
    async fn perform(server: &TestServer, actor: &user::Model, tehsil_activity_id: i32, topic: &str) {
        let (name, value) = as_user(actor);
        server
            .post(&format!("/api/v1/tehsil-activities/{tehsil_activity_id}/submissions"))
            .add_header(name, value)
            .json(&json!({ "values": { "topic": topic, "photos": [upload("crowd.png")] } }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["database"], "connected");
        assert_eq!(body["storage"], "memory: available");
    }

    #[tokio::test]
    async fn test_request_without_caller_is_unauthorized() {
        let (server, _state) = setup_test_server().await;

        let response = server.get("/api/v1/schedules").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: ErrorResponse = response.json();
        assert_eq!(body.code, "UNAUTHORIZED");
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_unknown_caller_is_unauthorized() {
        let (server, _state) = setup_test_server().await;

        let response = server
            .get("/api/v1/schedules")
            .add_header(
                axum::http::HeaderName::from_static("x-user-id"),
                axum::http::HeaderValue::from_static("4242"),
            )
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_schedule_fans_out_to_active_tehsils() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        for name in ["Model Town", "Cantt", "Raiwind"] {
            seed_tehsil(db, lahore.id, name, true).await;
        }
        seed_tehsil(db, lahore.id, "Closed Tehsil", false).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[permissions::CREATE_SCHEDULE, permissions::VIEW_SCHEDULE]).await;
        let (name, value) = as_user(&admin);

        let request = CreateScheduleRequest {
            districts: vec![lahore.id],
            activities: vec![ScheduleActivityInput {
                activity_id: meeting.id,
                frequency_id: None,
                description: Some("Monthly meeting".to_string()),
            }],
            from_date: today(),
            to_date: days_from_today(10),
        };

        let response = server
            .post("/api/v1/schedules")
            .add_header(name.clone(), value.clone())
            .json(&request)
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.message, "Schedule created successfully");
        let created = body.data.as_array().expect("created schedules");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["tehsil_activity_count"], 3);

        let schedule_id = created[0]["id"].as_i64().unwrap() as i32;
        let rows = tehsil_activity::Entity::find()
            .filter(tehsil_activity::Column::DistrictActivityId.eq(schedule_id))
            .all(db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
        let headers: Vec<_> = rows.iter().filter(|r| r.tehsil_id.is_none()).collect();
        assert_eq!(headers.len(), 1);
        assert!(headers[0].is_assigned);
        assert!(rows.iter().filter(|r| r.tehsil_id.is_some()).all(|r| !r.is_assigned));

        // Listings leave the district-level row out.
        let listing = server
            .get("/api/v1/schedules")
            .add_header(name, value)
            .await;
        listing.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = listing.json();
        assert_eq!(body.data["grouped"], false);
        assert_eq!(body.data["instances"]["total"], 3);
        for item in body.data["instances"]["items"].as_array().unwrap() {
            assert_eq!(item["status"], "unassigned");
            assert!(item["tehsil"].is_object());
        }
    }

    #[tokio::test]
    async fn test_schedule_rejects_reversed_window() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[permissions::CREATE_SCHEDULE]).await;
        let (name, value) = as_user(&admin);

        let response = server
            .post("/api/v1/schedules")
            .add_header(name, value)
            .json(&json!({
                "districts": [lahore.id],
                "activities": [{ "activity_id": meeting.id }],
                "from_date": days_from_today(3),
                "to_date": today(),
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = response.json();
        assert!(body.fields.unwrap().contains_key("to_date"));
        assert_eq!(district_activity::Entity::find().count(db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upcoming_schedule_cannot_be_performed() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        seed_form_field(db, meeting.id, "topic", FieldKind::Text, true, 0).await;
        let admin = seed_admin(db, &[]).await;
        let (_, rows) = seed_schedule(
            db,
            lahore.id,
            meeting.id,
            admin.id,
            days_from_today(5),
            days_from_today(10),
            &[(cantt.id, true)],
        )
        .await;
        let officer = seed_user(
            db,
            "tpwo.cantt",
            "TPWO",
            RoleLevel::Tehsil,
            &[permissions::PERFORM],
            &[],
            &[cantt.id],
        )
        .await;
        let (name, value) = as_user(&officer);

        let listing = server
            .get("/api/v1/schedules")
            .add_header(name.clone(), value.clone())
            .await;
        listing.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = listing.json();
        let item = &body.data["instances"]["items"][0];
        assert_eq!(item["status"], "upcoming");
        assert_eq!(item["is_upcoming"], true);
        assert_eq!(item["is_expired_for_viewing"], false);

        let form = server
            .get(&format!("/api/v1/tehsil-activities/{}/form", rows[0].id))
            .add_header(name.clone(), value.clone())
            .await;
        form.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = form.json();
        assert_eq!(body.data["view"], "upcoming_schedule");
        assert!(body.data["fields"].as_array().unwrap().is_empty());

        let response = server
            .post(&format!("/api/v1/tehsil-activities/{}/submissions", rows[0].id))
            .add_header(name, value)
            .json(&json!({ "values": { "topic": "Hygiene" } }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "Schedule is not started yet.");
        assert_eq!(user_activity::Entity::find().count(db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unassigned_row_cannot_be_performed() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        seed_form_field(db, meeting.id, "topic", FieldKind::Text, true, 0).await;
        let admin = seed_admin(db, &[]).await;
        let (_, rows) = seed_schedule(
            db,
            lahore.id,
            meeting.id,
            admin.id,
            days_from_today(-1),
            days_from_today(5),
            &[(cantt.id, false)],
        )
        .await;
        let officer = seed_user(
            db,
            "tpwo.cantt",
            "TPWO",
            RoleLevel::Tehsil,
            &[permissions::PERFORM],
            &[],
            &[cantt.id],
        )
        .await;
        let (name, value) = as_user(&officer);

        let form = server
            .get(&format!("/api/v1/tehsil-activities/{}/form", rows[0].id))
            .add_header(name.clone(), value.clone())
            .await;
        form.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = form.json();
        assert_eq!(body.data["view"], "not_assigned");
        assert!(body.data["fields"].as_array().unwrap().is_empty());

        let response = server
            .post(&format!("/api/v1/tehsil-activities/{}/submissions", rows[0].id))
            .add_header(name, value)
            .json(&json!({ "values": { "topic": "Hygiene" } }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "Activity has not been assigned yet.");

        let stored = tehsil_activity::Entity::find_by_id(rows[0].id)
            .one(db)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_assigned);
        assert!(!stored.is_performed);
        assert_eq!(user_activity::Entity::find().count(db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lapsed_assigned_schedule_is_expired() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let raiwind = seed_tehsil(db, lahore.id, "Raiwind", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[permissions::VIEW_SCHEDULE, permissions::PERFORM]).await;
        let (_, rows) = seed_schedule(
            db,
            lahore.id,
            meeting.id,
            admin.id,
            days_from_today(-7),
            days_from_today(-1),
            &[(cantt.id, true), (raiwind.id, false)],
        )
        .await;
        let (name, value) = as_user(&admin);

        let listing = server
            .get("/api/v1/schedules")
            .add_header(name.clone(), value.clone())
            .await;
        listing.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = listing.json();
        let items = body.data["instances"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        for item in items {
            let expired = item["status"] == "expired";
            // Only an assigned row can be expired, and never while upcoming.
            if expired {
                assert_eq!(item["is_assigned"], true);
            }
            assert!(!(expired && item["is_upcoming"] == true));
            assert_eq!(item["is_expired_for_assigning"], true);
        }
        let assigned = items.iter().find(|i| i["id"] == rows[0].id).unwrap();
        assert_eq!(assigned["status"], "expired");
        assert_eq!(assigned["is_expired_for_viewing"], true);
        let unassigned = items.iter().find(|i| i["id"] == rows[1].id).unwrap();
        assert_eq!(unassigned["status"], "unassigned");
        assert_eq!(unassigned["is_expired_for_viewing"], false);

        let filtered = server
            .get("/api/v1/schedules")
            .add_query_param("status", "expired")
            .add_header(name.clone(), value.clone())
            .await;
        filtered.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = filtered.json();
        assert_eq!(body.data["instances"]["total"], 1);

        let response = server
            .post(&format!("/api/v1/tehsil-activities/{}/submissions", rows[0].id))
            .add_header(name, value)
            .json(&json!({ "values": {} }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "Schedule has been expired.");
    }

    #[tokio::test]
    async fn test_assigning_lapsed_schedule_is_refused() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[permissions::ASSIGN_TO_TEHSILS]).await;
        let (schedule, rows) = seed_schedule(
            db,
            lahore.id,
            meeting.id,
            admin.id,
            days_from_today(-7),
            days_from_today(-1),
            &[(cantt.id, false)],
        )
        .await;
        let (name, value) = as_user(&admin);

        let detail = server
            .get(&format!("/api/v1/schedules/{}", schedule.id))
            .add_header(name.clone(), value.clone())
            .await;
        detail.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = detail.json();
        assert_eq!(body.data["view"], "schedule_expired");

        let response = server
            .put(&format!("/api/v1/tehsil-activities/{}/assignment", rows[0].id))
            .add_header(name, value)
            .json(&json!({ "from_date": today(), "to_date": days_from_today(2) }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "Schedule has been expired.");
    }

    #[tokio::test]
    async fn test_assignment_sets_tehsil_window() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let dpwo = seed_user(
            db,
            "dpwo.lahore",
            "DPWO",
            RoleLevel::District,
            &[permissions::ASSIGN_TO_TEHSILS],
            &[lahore.id],
            &[],
        )
        .await;
        let (_, rows) = seed_schedule(
            db,
            lahore.id,
            meeting.id,
            dpwo.id,
            today(),
            days_from_today(10),
            &[(cantt.id, false)],
        )
        .await;
        let (name, value) = as_user(&dpwo);

        let response = server
            .put(&format!("/api/v1/tehsil-activities/{}/assignment", rows[0].id))
            .add_header(name, value)
            .json(&json!({ "from_date": days_from_today(1), "to_date": days_from_today(3) }))
            .await;

        response.assert_status(StatusCode::OK);
        let stored = tehsil_activity::Entity::find_by_id(rows[0].id)
            .one(db)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_assigned);
        assert!(stored.assigned_at.is_some());
        assert_eq!(stored.from_date, Some(days_from_today(1)));
        assert_eq!(stored.to_date, Some(days_from_today(3)));
    }

    #[tokio::test]
    async fn test_district_caller_never_sees_foreign_districts() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let multan = seed_district(db, "Multan").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let shujabad = seed_tehsil(db, multan.id, "Shujabad", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[]).await;
        for (district_id, tehsil_id) in [(lahore.id, cantt.id), (multan.id, shujabad.id)] {
            seed_schedule(
                db,
                district_id,
                meeting.id,
                admin.id,
                today(),
                days_from_today(5),
                &[(tehsil_id, true)],
            )
            .await;
        }
        let dpwo = seed_user(
            db,
            "dpwo.lahore",
            "DPWO",
            RoleLevel::District,
            &[permissions::VIEW_SCHEDULE],
            &[lahore.id],
            &[],
        )
        .await;
        let (name, value) = as_user(&dpwo);

        let own = server
            .get("/api/v1/schedules")
            .add_header(name.clone(), value.clone())
            .await;
        own.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = own.json();
        assert_eq!(body.data["instances"]["total"], 1);
        assert_eq!(body.data["instances"]["items"][0]["district"]["id"], lahore.id);

        let foreign = server
            .get("/api/v1/schedules")
            .add_query_param("district", multan.id)
            .add_header(name.clone(), value.clone())
            .await;
        foreign.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = foreign.json();
        assert_eq!(body.data["instances"]["total"], 0);

        let grouped = server
            .get("/api/v1/schedules")
            .add_query_param("grouped", true)
            .add_query_param("district", multan.id)
            .add_header(name, value)
            .await;
        grouped.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = grouped.json();
        assert_eq!(body.data["schedules"]["total"], 0);
    }

    #[tokio::test]
    async fn test_multi_image_submission_keeps_upload_order() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let walk = seed_activity(db, "Awareness Walk").await;
        seed_form_field(db, walk.id, "participants", FieldKind::Integer, true, 0).await;
        seed_form_field(db, walk.id, "photos", FieldKind::MultiImages, true, 1).await;
        let admin = seed_admin(db, &[]).await;
        let (_, rows) = seed_schedule(
            db,
            lahore.id,
            walk.id,
            admin.id,
            days_from_today(-1),
            days_from_today(3),
            &[(cantt.id, true)],
        )
        .await;
        let officer = seed_user(
            db,
            "tpwo.cantt",
            "TPWO",
            RoleLevel::Tehsil,
            &[permissions::PERFORM],
            &[],
            &[cantt.id],
        )
        .await;
        let (name, value) = as_user(&officer);

        let response = server
            .post(&format!("/api/v1/tehsil-activities/{}/submissions", rows[0].id))
            .add_header(name, value)
            .json(&json!({
                "values": {
                    "participants": "42",
                    "photos": [upload("first.png"), upload("second.jpg"), upload("third.png")],
                }
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.message, "Activity performed successfully");
        assert_eq!(body.data["values"]["participants"]["value"], 42);

        let photos = &body.data["values"]["photos"];
        assert_eq!(photos["type"], "images");
        let links = photos["value"].as_array().unwrap();
        assert_eq!(links.len(), 3);
        let extensions: Vec<&str> = links
            .iter()
            .map(|l| l["key"].as_str().unwrap().rsplit('.').next().unwrap())
            .collect();
        assert_eq!(extensions, vec!["png", "jpg", "png"]);
        for link in links {
            let key = link["key"].as_str().unwrap();
            assert_eq!(link["url"], format!("/storage/{key}"));
            assert!(state.media.exists(key).await.unwrap());
        }

        let stored = tehsil_activity::Entity::find_by_id(rows[0].id)
            .one(db)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_performed);
        assert_eq!(stored.performed_by, Some(officer.id));
    }

    #[tokio::test]
    async fn test_invalid_submission_reports_every_field() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let walk = seed_activity(db, "Awareness Walk").await;
        seed_form_field(db, walk.id, "participants", FieldKind::Integer, true, 0).await;
        seed_form_field(db, walk.id, "photos", FieldKind::MultiImages, true, 1).await;
        let admin = seed_admin(db, &[permissions::PERFORM]).await;
        let (_, rows) = seed_schedule(
            db,
            lahore.id,
            walk.id,
            admin.id,
            today(),
            days_from_today(3),
            &[(cantt.id, true)],
        )
        .await;
        let (name, value) = as_user(&admin);

        let response = server
            .post(&format!("/api/v1/tehsil-activities/{}/submissions", rows[0].id))
            .add_header(name, value)
            .json(&json!({
                "values": { "participants": "many", "photos": [upload("notes.exe")] }
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = response.json();
        let fields = body.fields.unwrap();
        assert!(fields.contains_key("participants"));
        assert!(fields.contains_key("photos"));
        assert_eq!(user_activity::Entity::find().count(db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let (server, state) = setup_test_server().await;
        let admin = seed_admin(
            &state.db,
            &[permissions::ASSIGN_TO_TEHSILS, permissions::PERFORM, permissions::DELETE_SCHEDULE],
        )
        .await;
        let (name, value) = as_user(&admin);

        server
            .get("/api/v1/schedules/9999")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/v1/tehsil-activities/9999/submissions")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "values": {} }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete("/api/v1/schedules/9999")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_district_level_row_cannot_be_assigned() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        seed_tehsil(db, lahore.id, "Cantt", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[permissions::CREATE_SCHEDULE, permissions::ASSIGN_TO_TEHSILS]).await;
        let (name, value) = as_user(&admin);

        server
            .post("/api/v1/schedules")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "districts": [lahore.id],
                "activities": [{ "activity_id": meeting.id }],
                "from_date": today(),
                "to_date": days_from_today(4),
            }))
            .await
            .assert_status(StatusCode::CREATED);
        let header = tehsil_activity::Entity::find()
            .filter(tehsil_activity::Column::TehsilId.is_null())
            .one(db)
            .await
            .unwrap()
            .unwrap();

        server
            .put(&format!("/api/v1/tehsil-activities/{}/assignment", header.id))
            .add_header(name, value)
            .json(&json!({ "from_date": today(), "to_date": days_from_today(1) }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unscheduled_activity_is_recorded_as_performed() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let visit = seed_activity(db, "School Visit").await;
        seed_form_field(db, visit.id, "school", FieldKind::Text, true, 0).await;
        let officer = seed_user(
            db,
            "tpwo.cantt",
            "TPWO",
            RoleLevel::Tehsil,
            &[permissions::PERFORM_UNSCHEDULED],
            &[],
            &[cantt.id],
        )
        .await;
        let (name, value) = as_user(&officer);

        let response = server
            .post("/api/v1/unscheduled-activities")
            .add_header(name, value)
            .json(&json!({
                "activity_id": visit.id,
                "values": { "school": "Government High School" },
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["submission"]["is_unscheduled"], true);

        let schedule_id = body.data["district_activity_id"].as_i64().unwrap() as i32;
        let schedule = district_activity::Entity::find_by_id(schedule_id)
            .one(db)
            .await
            .unwrap()
            .unwrap();
        assert!(schedule.is_unscheduled);
        assert_eq!(schedule.district_id, lahore.id);
        assert_eq!(schedule.from_date, today());
        assert_eq!(schedule.to_date, today());

        let rows = tehsil_activity::Entity::find()
            .filter(tehsil_activity::Column::DistrictActivityId.eq(schedule_id))
            .all(db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tehsil_id, Some(cantt.id));
        assert!(rows[0].is_assigned);
        assert!(rows[0].is_performed);
    }

    #[tokio::test]
    async fn test_unscheduled_activity_needs_explicit_permission() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let visit = seed_activity(db, "School Visit").await;
        let admin = seed_admin(db, &[permissions::PERFORM]).await;
        let (name, value) = as_user(&admin);

        let response = server
            .post("/api/v1/unscheduled-activities")
            .add_header(name, value)
            .json(&json!({ "activity_id": visit.id, "values": {} }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(district_activity::Entity::find().count(db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleting_schedule_removes_its_tree() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[permissions::DELETE_SCHEDULE]).await;
        let (schedule, _) = seed_schedule(
            db,
            lahore.id,
            meeting.id,
            admin.id,
            today(),
            days_from_today(2),
            &[(cantt.id, true)],
        )
        .await;
        let (name, value) = as_user(&admin);

        let response = server
            .delete(&format!("/api/v1/schedules/{}", schedule.id))
            .add_header(name, value)
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(district_activity::Entity::find().count(db).await.unwrap(), 0);
        assert_eq!(tehsil_activity::Entity::find().count(db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dashboard_counts_follow_scope() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let multan = seed_district(db, "Multan").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let shujabad = seed_tehsil(db, multan.id, "Shujabad", true).await;
        let meeting = seed_activity(db, "Community Meeting").await;
        let admin = seed_admin(db, &[permissions::VIEW_DASHBOARD]).await;
        seed_schedule(db, lahore.id, meeting.id, admin.id, today(), days_from_today(3), &[(cantt.id, true)]).await;
        seed_schedule(db, multan.id, meeting.id, admin.id, today(), days_from_today(3), &[(shujabad.id, false)]).await;
        let dpwo = seed_user(
            db,
            "dpwo.lahore",
            "DPWO",
            RoleLevel::District,
            &[permissions::VIEW_DASHBOARD],
            &[lahore.id],
            &[],
        )
        .await;

        let (name, value) = as_user(&admin);
        let all = server.get("/api/v1/dashboard").add_header(name, value).await;
        all.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = all.json();
        assert_eq!(body.data["cards"]["scheduled"], 2);

        let (name, value) = as_user(&dpwo);
        let own = server.get("/api/v1/dashboard").add_header(name, value).await;
        own.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = own.json();
        assert_eq!(body.data["cards"]["scheduled"], 1);
    }

    #[tokio::test]
    async fn test_notification_read_is_limited_to_its_owner() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let owner = seed_user(db, "dpwo.lahore", "DPWO", RoleLevel::District, &[], &[lahore.id], &[]).await;
        let other = seed_user(db, "dpwo.other", "DPWO", RoleLevel::District, &[], &[lahore.id], &[]).await;
        let note = seed_notification(db, owner.id, "New schedule").await;

        let (name, value) = as_user(&other);
        let foreign = server
            .post(&format!("/api/v1/notifications/{}/read", note.id))
            .add_header(name.clone(), value.clone())
            .await;
        foreign.assert_status(StatusCode::NOT_FOUND);
        let listing = server.get("/api/v1/notifications").add_header(name, value).await;
        let body: ApiResponse<Value> = listing.json();
        assert_eq!(body.data["total"], 0);

        let unread = notification::Entity::find_by_id(note.id).one(db).await.unwrap().unwrap();
        assert!(unread.read_at.is_none());

        let (name, value) = as_user(&owner);
        let response = server
            .post(&format!("/api/v1/notifications/{}/read", note.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert!(body.data["read_at"].is_string());

        let still_unread = server
            .get("/api/v1/notifications")
            .add_query_param("unread", true)
            .add_header(name, value)
            .await;
        let body: ApiResponse<Value> = still_unread.json();
        assert_eq!(body.data["total"], 0);
    }

    #[tokio::test]
    async fn test_call_center_agent_sees_only_own_complaints() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let agent_permissions = [permissions::CALLCENTER, permissions::VIEW_COMPLAINTS];
        let first = seed_user(
            db,
            "agent.one",
            crate::caller::CALL_CENTER_AGENT_ROLE,
            RoleLevel::CallCenter,
            &agent_permissions,
            &[],
            &[],
        )
        .await;
        let second = seed_user(
            db,
            "agent.two",
            crate::caller::CALL_CENTER_AGENT_ROLE,
            RoleLevel::CallCenter,
            &agent_permissions,
            &[],
            &[],
        )
        .await;

        let mut logged = Vec::new();
        for (agent, subject) in [(&first, "Water supply"), (&second, "Street lights")] {
            let (name, value) = as_user(agent);
            let response = server
                .post("/api/v1/complaints")
                .add_header(name, value)
                .json(&json!({
                    "complainant_name": "Citizen",
                    "subject": subject,
                    "description": "No service for a week",
                    "call_type": "complaint",
                }))
                .await;
            response.assert_status(StatusCode::CREATED);
            let body: ApiResponse<Value> = response.json();
            logged.push(body.data["id"].as_i64().unwrap());
        }

        let (name, value) = as_user(&first);
        let listing = server
            .get("/api/v1/complaints")
            .add_header(name.clone(), value.clone())
            .await;
        listing.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = listing.json();
        assert_eq!(body.data["counts"]["overall"], 1);
        assert_eq!(body.data["complaints"]["items"][0]["subject"], "Water supply");

        server
            .get(&format!("/api/v1/complaints/{}", logged[1]))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post(&format!("/api/v1/complaints/{}/action", logged[1]))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "status": "resolved" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        for (status, remarks) in [("resolved", "Called back"), ("reopened", "Still broken")] {
            let response = server
                .post(&format!("/api/v1/complaints/{}/action", logged[0]))
                .add_header(name.clone(), value.clone())
                .json(&json!({ "status": status, "remarks": remarks }))
                .await;
            response.assert_status(StatusCode::OK);
            let body: ApiResponse<Value> = response.json();
            assert_eq!(body.data["complaint"]["status"], status);
        }

        let detail = server
            .get(&format!("/api/v1/complaints/{}", logged[0]))
            .add_header(name, value)
            .await;
        let body: ApiResponse<Value> = detail.json();
        let history = body.data["history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["remarks"], "Called back");
        assert_eq!(history[1]["status"], "reopened");
        assert_eq!(complaint_history::Entity::find().count(db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_foreign_district_filter_cannot_widen_scope() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let multan = seed_district(db, "Multan").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let shujabad = seed_tehsil(db, multan.id, "Shujabad", true).await;
        let walk = seed_activity(db, "Awareness Walk").await;
        seed_form_field(db, walk.id, "topic", FieldKind::Text, true, 0).await;
        seed_form_field(db, walk.id, "photos", FieldKind::MultiImages, true, 1).await;
        let admin = seed_admin(db, &[permissions::PERFORM]).await;
        let (_, lahore_rows) =
            seed_schedule(db, lahore.id, walk.id, admin.id, today(), days_from_today(3), &[(cantt.id, true)]).await;
        let (_, multan_rows) =
            seed_schedule(db, multan.id, walk.id, admin.id, today(), days_from_today(3), &[(shujabad.id, true)]).await;
        perform(&server, &admin, lahore_rows[0].id, "Hygiene").await;
        perform(&server, &admin, multan_rows[0].id, "Sanitation").await;

        let dpwo = seed_user(
            db,
            "dpwo.lahore",
            "DPWO",
            RoleLevel::District,
            &[permissions::LINE_LIST_REPORT, permissions::VIEW_CALENDAR, permissions::VIEW_DASHBOARD],
            &[lahore.id],
            &[],
        )
        .await;
        let (name, value) = as_user(&dpwo);

        for path in ["/api/v1/reports/performed", "/api/v1/reports/activities", "/api/v1/media"] {
            let own = server.get(path).add_header(name.clone(), value.clone()).await;
            own.assert_status(StatusCode::OK);
            let body: ApiResponse<Value> = own.json();
            assert_eq!(body.data["total"], 1, "{path}");

            let foreign = server
                .get(path)
                .add_query_param("district", multan.id)
                .add_header(name.clone(), value.clone())
                .await;
            foreign.assert_status(StatusCode::OK);
            let body: ApiResponse<Value> = foreign.json();
            assert_eq!(body.data["total"], 0, "{path}");
        }

        let own = server.get("/api/v1/calendar").add_header(name.clone(), value.clone()).await;
        own.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = own.json();
        let events = body.data["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["district"]["name"], "Lahore");

        let foreign = server
            .get("/api/v1/calendar")
            .add_query_param("district", multan.id)
            .add_header(name, value)
            .await;
        foreign.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = foreign.json();
        assert!(body.data["events"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feedbacks_follow_author_district() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let multan = seed_district(db, "Multan").await;
        let near = seed_user(db, "ado.lahore", "ADO", RoleLevel::District, &[], &[lahore.id], &[]).await;
        let far = seed_user(db, "ado.multan", "ADO", RoleLevel::District, &[], &[multan.id], &[]).await;
        for (author, title) in [(&near, "Need banners"), (&far, "Late transport")] {
            let (name, value) = as_user(author);
            server
                .post("/api/v1/feedbacks")
                .add_header(name, value)
                .json(&json!({ "title": title, "description": "Please look into it" }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let dpwo = seed_user(
            db,
            "dpwo.lahore",
            "DPWO",
            RoleLevel::District,
            &[permissions::VIEW_FEEDBACKS],
            &[lahore.id],
            &[],
        )
        .await;
        let (name, value) = as_user(&dpwo);
        let response = server.get("/api/v1/feedbacks").add_header(name, value).await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["total"], 1);
        assert_eq!(body.data["items"][0]["title"], "Need banners");
    }

    #[tokio::test]
    async fn test_field_holding_data_is_locked() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let walk = seed_activity(db, "Awareness Walk").await;
        let topic = seed_form_field(db, walk.id, "topic", FieldKind::Text, true, 0).await;
        let photos = seed_form_field(db, walk.id, "photos", FieldKind::MultiImages, true, 1).await;
        let admin = seed_admin(db, &[permissions::PERFORM, permissions::ASSIGN_FIELDS]).await;
        let (_, rows) =
            seed_schedule(db, lahore.id, walk.id, admin.id, today(), days_from_today(3), &[(cantt.id, true)]).await;
        perform(&server, &admin, rows[0].id, "Hygiene").await;
        let (name, value) = as_user(&admin);

        let retype = server
            .put(&format!("/api/v1/activity-fields/{}", topic.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "field_type": "textarea" }))
            .await;
        retype.assert_status(StatusCode::CONFLICT);
        let body: ErrorResponse = retype.json();
        assert_eq!(body.code, "CONFLICT");

        let retitle = server
            .put(&format!("/api/v1/activity-fields/{}", topic.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "title": "Talk topic" }))
            .await;
        retitle.assert_status(StatusCode::OK);

        server
            .delete(&format!("/api/v1/activity-fields/{}", photos.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_performed_report_exports_csv() {
        let (server, state) = setup_test_server().await;
        let db = &state.db;

        let lahore = seed_district(db, "Lahore").await;
        let cantt = seed_tehsil(db, lahore.id, "Cantt", true).await;
        let walk = seed_activity(db, "Awareness Walk").await;
        seed_form_field(db, walk.id, "topic", FieldKind::Text, true, 0).await;
        seed_form_field(db, walk.id, "photos", FieldKind::MultiImages, true, 1).await;
        let admin = seed_admin(db, &[permissions::PERFORM, permissions::LINE_LIST_REPORT]).await;
        let (_, rows) =
            seed_schedule(db, lahore.id, walk.id, admin.id, today(), days_from_today(3), &[(cantt.id, true)]).await;
        perform(&server, &admin, rows[0].id, "Hygiene").await;
        let (name, value) = as_user(&admin);

        let response = server
            .get("/api/v1/reports/performed/export")
            .add_header(name, value)
            .await;

        response.assert_status(StatusCode::OK);
        let content_type = response.header("content-type");
        assert!(content_type.to_str().unwrap().starts_with("text/csv"));
        let text = response.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID,Activity,District,Tehsil,Performed By,Performed At,Type"));
        assert!(lines[0].ends_with("photos,topic"));
        assert!(lines[1].contains("Awareness Walk,Lahore,Cantt,admin"));
        assert!(lines[1].contains("Scheduled"));
        assert!(lines[1].ends_with("Hygiene"));
    }

    #[tokio::test]
    async fn test_calendar_rejects_overlong_range() {
        let (server, state) = setup_test_server().await;
        let officer = seed_user(
            &state.db,
            "dpwo.lahore",
            "DPWO",
            RoleLevel::District,
            &[permissions::VIEW_CALENDAR],
            &[],
            &[],
        )
        .await;
        let (name, value) = as_user(&officer);

        let wide = server
            .get("/api/v1/calendar")
            .add_query_param("start", today())
            .add_query_param("end", days_from_today(62))
            .add_header(name.clone(), value.clone())
            .await;
        wide.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = wide.json();
        assert!(body.fields.unwrap().contains_key("end"));

        server
            .get("/api/v1/calendar")
            .add_query_param("start", today())
            .add_query_param("end", days_from_today(61))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (server, _state) = setup_test_server().await;

        let response = server.get("/api-docs/openapi.json").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert!(body["paths"]["/api/v1/schedules"].is_object());
    }

    #[tokio::test]
    async fn test_prometheus_metrics_endpoint() {
        let (server, _state) = setup_test_server().await;

        // The metrics recorder is process-global and only installed outside tests.
        let response = server.get("/metrics").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
