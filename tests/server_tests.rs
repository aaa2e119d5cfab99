use actix_web::{App, test, web};
use assert_json_diff::{assert_json_eq, assert_json_include};
use serde_json::json;

use coderun::engine::{Engine, EngineConfig};
use coderun::routes::{json_error_handler, post_execute_handler};

// Helper function to build the app under test without the artificial delay
fn test_engine() -> web::Data<Engine> {
    web::Data::new(Engine::new(EngineConfig {
        response_delay_ms: 0,
        ..Default::default()
    }))
}

#[actix_web::test]
async fn test_post_execute_javascript() {
    let app = test::init_service(
        App::new()
            .app_data(test_engine())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_execute_handler),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(json!({
            "source": "console.log('A');\nconsole.log('B');",
            "language": "JavaScript"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body.clone(),
        expected: json!({
            "output": "A\nB\n",
            "error": "",
            "exitCode": 0,
            "status": { "id": 3, "description": "Success" }
        })
    );
    assert!(body["executionTime"].as_f64().unwrap() >= 0.0);
    assert!(body["memory"].as_u64().unwrap() > 0);
}

#[actix_web::test]
async fn test_post_execute_empty_body_is_no_code() {
    let app = test::init_service(
        App::new()
            .app_data(test_engine())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_execute_handler),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(json!({}))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_eq!(
        body,
        json!({
            "output": "No code to execute",
            "error": "",
            "exitCode": 0,
            "executionTime": 0.0,
            "memory": 0,
            "status": { "id": 3, "description": "No Code" }
        })
    );
}

#[actix_web::test]
async fn test_post_execute_code_error() {
    let app = test::init_service(
        App::new()
            .app_data(test_engine())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_execute_handler),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(json!({
            "source": "console.log('before'); undefinedFn();",
            "language": "js",
            "stdin": ""
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body,
        expected: json!({
            "output": "before\n",
            "error": "ReferenceError: undefinedFn is not defined",
            "exitCode": 1,
            "status": { "id": 4, "description": "Code Error" }
        })
    );
}

#[actix_web::test]
async fn test_post_execute_malformed_json() {
    let app = test::init_service(
        App::new()
            .app_data(test_engine())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(post_execute_handler),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/execute")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"source\": ")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_eq!(body, json!({ "reason": "ERR_INVALID_ARGUMENT", "code": 1 }));
}
