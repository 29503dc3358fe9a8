mod common;

use axum::extract::State;
use foodgram_api::routes::health::health_check;

#[tokio::test]
async fn health_check_reports_database_down_without_failing() {
    let state = common::offline_state();
    let response = health_check(State(state)).await;
    assert_eq!(response.0.message, "Health check");

    let data = serde_json::to_value(response.0.data.expect("health data")).unwrap();
    assert_eq!(data["status"], "ok");
    assert_eq!(data["database"], "down");
}
