use std::time::Duration;

use assert_matches::assert_matches;
use dispatcher_job_client::types::SimulateRequest;
use dispatcher_job_client::{ApiError, HttpJobsApi, JobFamily, JobStatus, JobType, JobsApi};
use httpmock::prelude::*;
use rstest::*;
use serde_json::json;
use url::Url;
use uuid::Uuid;

const JOB_ID: &str = "3d3c7f8e-6c55-4bb2-9f55-0f6e5a3b7c21";

#[fixture]
fn server() -> MockServer {
    MockServer::start()
}

fn client(server: &MockServer) -> HttpJobsApi {
    let base = Url::parse(&server.base_url()).unwrap();
    HttpJobsApi::new(base, Duration::from_secs(5)).unwrap()
}

#[rstest]
#[tokio::test]
async fn fetch_recent_normalizes_status_casing(server: MockServer) {
    let mock = server.mock(|when, then| {
        when.method(GET).path("/jobs/recent");
        then.status(200).json_body(json!({
            "active_jobs": [{
                "id": JOB_ID,
                "type": "SOLVER_SIMULATION",
                "status": "PROCESSING",
                "progress_percentage": 40.0,
                "progress_message": "iterating",
                "created_at": "2024-05-01T10:00:00Z",
                "estimated_duration": 300
            }],
            "recent_jobs": [{
                "id": "6c3f8f4a-1b2c-4d5e-8f90-123456789abc",
                "type": "SPOT_SIMULATION",
                "status": "Completed",
                "created_at": "2024-05-01T09:00:00Z",
                "completed_at": "2024-05-01T09:00:31Z",
                "actual_duration": 31
            }],
            "credits_info": {"remaining": 12}
        }));
    });

    let recent = client(&server).fetch_recent().await.unwrap();

    mock.assert();
    assert_eq!(recent.active_jobs[0].status, JobStatus::Processing);
    assert_eq!(recent.active_jobs[0].job_type, JobType::SolverSimulation);
    assert_eq!(recent.recent_jobs[0].status, JobStatus::Completed);
    assert_eq!(recent.credits_info, Some(json!({"remaining": 12})));
}

#[rstest]
#[tokio::test]
async fn fetch_details_unwraps_job(server: MockServer) {
    server.mock(|when, then| {
        when.method(GET).path(format!("/jobs/{JOB_ID}/details"));
        then.status(200).json_body(json!({
            "job": {
                "id": JOB_ID,
                "type": "SPOT_SIMULATION",
                "status": "completed",
                "created_at": "2024-05-01T10:00:00Z",
                "input_data": {"boards": ["AhKd2c"], "players": 2},
                "result_data": {"equity": [0.61, 0.39]}
            }
        }));
    });

    let job = client(&server).fetch_details(Uuid::parse_str(JOB_ID).unwrap()).await.unwrap();

    assert_eq!(job.summary.status, JobStatus::Completed);
    assert_eq!(job.result_data, Some(json!({"equity": [0.61, 0.39]})));
    assert_eq!(job.input_data["players"], 2);
}

#[rstest]
#[case(401, "Your session has expired. Please sign in again.")]
#[case(403, "You do not have permission to perform this action.")]
#[case(404, "The requested job could not be found.")]
#[case(500, "The server encountered an internal error. Please try again later.")]
#[case(409, "Job is already completed")]
#[tokio::test]
async fn cancel_maps_error_statuses(server: MockServer, #[case] status: u16, #[case] expected: &str) {
    server.mock(|when, then| {
        when.method(POST).path(format!("/jobs/{JOB_ID}/cancel"));
        then.status(status).json_body(json!({"success": false, "message": "Job is already completed"}));
    });

    let err = client(&server).cancel(Uuid::parse_str(JOB_ID).unwrap()).await.unwrap_err();

    assert_eq!(err.user_message(), expected);
}

#[rstest]
#[tokio::test]
async fn submit_posts_to_family_route(server: MockServer) {
    let mock = server.mock(|when, then| {
        when.method(POST).path("/spot/simulate").json_body(json!({
            "job_type": null,
            "input_data": {"boards": ["AhKd2c"]}
        }));
        then.status(202).json_body(json!({
            "job": {"id": JOB_ID, "status": "QUEUED"},
            "credits_info": null
        }));
    });

    let request = SimulateRequest { job_type: None, input_data: json!({"boards": ["AhKd2c"]}) };
    let response = client(&server).submit(JobFamily::Spot, &request).await.unwrap();

    mock.assert();
    assert_eq!(response.job.status, JobStatus::Queued);
    assert_eq!(response.job.id.to_string(), JOB_ID);
}

#[rstest]
#[tokio::test]
async fn base_url_path_prefix_is_kept(server: MockServer) {
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/jobs/recent");
        then.status(200).json_body(json!({"active_jobs": [], "recent_jobs": []}));
    });

    let base = Url::parse(&server.url("/api/")).unwrap();
    let recent = HttpJobsApi::new(base, Duration::from_secs(5)).unwrap().fetch_recent().await.unwrap();

    mock.assert();
    assert!(recent.active_jobs.is_empty());
    assert!(recent.credits_info.is_none());
}

#[rstest]
#[tokio::test]
async fn malformed_body_is_a_decode_error(server: MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/jobs/recent");
        then.status(200).body("not json");
    });

    let err = client(&server).fetch_recent().await.unwrap_err();

    assert_matches!(err, ApiError::Decode { operation: "fetch_recent", .. });
}
