#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::openapi::{PathItemType, RefOr, schema::Schema};
    use utoipa::OpenApi;

    fn object_properties(name: &str) -> Vec<String> {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.expect("components are generated");
        match components.schemas.get(name) {
            Some(RefOr::T(Schema::Object(obj))) => obj.properties.keys().cloned().collect(),
            _ => panic!("{name} should be an object schema"),
        }
    }

    #[test]
    fn test_openapi_schema_generation() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();

        for name in [
            "ErrorResponse",
            "HealthResponse",
            "CreateScheduleRequest",
            "TehsilActivityResponse",
            "SubmissionResponse",
            "ScheduleStatus",
        ] {
            assert!(components.schemas.contains_key(name), "missing schema {name}");
        }

        assert!(serde_json::to_string(&openapi).is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let properties = object_properties("ErrorResponse");
        for key in ["error", "code", "success", "fields"] {
            assert!(properties.iter().any(|p| p == key), "missing {key}");
        }
    }

    #[test]
    fn test_health_response_schema_structure() {
        let properties = object_properties("HealthResponse");
        for key in ["status", "version", "database", "storage"] {
            assert!(properties.iter().any(|p| p == key), "missing {key}");
        }
    }

    #[test]
    fn test_instance_schema_exposes_derived_status() {
        let properties = object_properties("TehsilActivityResponse");
        for key in ["status", "is_upcoming", "is_expired_for_viewing", "is_expired_for_assigning"] {
            assert!(properties.iter().any(|p| p == key), "missing {key}");
        }
    }

    #[test]
    fn test_scheduling_paths_are_documented() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        let schedules = paths.get("/api/v1/schedules").expect("schedules path");
        assert!(schedules.operations.contains_key(&PathItemType::Get));
        assert!(schedules.operations.contains_key(&PathItemType::Post));

        let submit = paths
            .get("/api/v1/tehsil-activities/{tehsil_activity_id}/submissions")
            .expect("submissions path");
        let post = submit.operations.get(&PathItemType::Post).expect("submit operation");
        assert!(post.responses.responses.contains_key("201"));
        assert!(post.responses.responses.contains_key("403"));

        assert!(paths.contains_key("/api/v1/unscheduled-activities"));
    }

    #[test]
    fn test_health_failure_references_error_component() {
        let openapi = ApiDoc::openapi();
        let health = openapi.paths.paths.get("/health").expect("health path");
        let get = health.operations.get(&PathItemType::Get).expect("health operation");
        let failure = get.responses.responses.get("500").expect("500 response");

        let json = serde_json::to_string(failure).unwrap();
        assert!(json.contains("#/components/schemas/ErrorResponse"), "{json}");
    }

    #[test]
    fn test_all_error_responses_reference_correct_schema() {
        let openapi_json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(!openapi_json.contains("crate::schemas::ErrorResponse"));
        assert!(openapi_json.contains("#/components/schemas/ErrorResponse"));
    }
}
