use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use splitsmart::repository::Repositories;
use splitsmart::routes;
use splitsmart::service::SplitService;

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .wrap(routes::security_headers())
                .app_data(web::Data::new(SplitService::new(Repositories::in_memory())))
                .configure(routes::configure),
        )
        .await
    };
}

async fn body(resp: ServiceResponse) -> Value {
    test::read_body_json(resp).await
}

#[actix_web::test]
async fn health_check() {
    let app = app!();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(resp).await["status"], "OK");
}

#[actix_web::test]
async fn group_lifecycle_with_balances() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/groups")
        .set_json(json!({ "name": "Lisbon trip", "description": "May" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let group_id = body(resp).await["data"]["id"].as_str().unwrap().to_string();

    let mut members = Vec::new();
    for name in ["Ana", "Ben", "Cy"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/groups/{group_id}/members"))
            .set_json(json!({ "name": name }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        members.push(body(resp).await["data"]["id"].as_str().unwrap().to_string());
    }

    let split: Vec<Value> = members.iter().map(|id| json!({ "memberId": id })).collect();
    let req = test::TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/expenses"))
        .set_json(json!({
            "description": "Dinner",
            "amount": 90,
            "splitType": "equal",
            "paidBy": members[0],
            "splitBetween": split,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let expense = body(resp).await;
    assert_eq!(expense["data"]["category"], "General");
    assert_eq!(expense["data"]["split"][0]["amount"], 30.0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/groups/{group_id}/balances"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body(resp).await;
    let ana = &report["data"]["balances"][&members[0]];
    assert_eq!(ana["memberName"], "Ana");
    assert_eq!(ana["net"], 60.0);
    assert_eq!(report["data"]["summary"]["totalSettlements"], 2);
    assert_eq!(report["data"]["settlements"][0]["toName"], "Ana");
    assert_eq!(report["data"]["settlements"][0]["amount"], 30.0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/expenses?groupId={group_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(body(resp).await["count"], 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/groups/{group_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/expenses").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(body(resp).await["count"], 0);
}

#[actix_web::test]
async fn mismatched_split_is_a_bad_request() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/groups")
        .set_json(json!({ "name": "Flat" }))
        .to_request();
    let group_id = body(test::call_service(&app, req).await).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut members = Vec::new();
    for name in ["Ana", "Ben"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/groups/{group_id}/members"))
            .set_json(json!({ "name": name }))
            .to_request();
        members.push(body(test::call_service(&app, req).await).await["data"]["id"].clone());
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/expenses"))
        .set_json(json!({
            "description": "Rent",
            "amount": 100,
            "splitType": "unequal",
            "paidBy": members[0],
            "splitBetween": [
                { "memberId": members[0], "amount": 60 },
                { "memberId": members[1], "amount": 39 },
            ],
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let payload = body(resp).await;
    let error = &payload["error"];
    assert_eq!(error["field"], "splitBetween");
    assert_eq!(
        error["message"],
        "Split amounts (99.00) don't match expense amount (100.00)"
    );
}

#[actix_web::test]
async fn unknown_members_are_listed() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/groups")
        .set_json(json!({ "name": "Flat" }))
        .to_request();
    let group_id = body(test::call_service(&app, req).await).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/expenses"))
        .set_json(json!({
            "description": "Rent",
            "amount": 10,
            "splitType": "equal",
            "splitBetween": [{ "memberId": "ghost" }],
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let payload = body(resp).await;
    let error = &payload["error"];
    assert_eq!(error["field"], "splitBetween");
    assert_eq!(error["invalidMembers"], json!(["ghost"]));
}

#[actix_web::test]
async fn missing_resources_are_not_found() {
    let app = app!();

    let missing = uuid::Uuid::new_v4().to_string();
    let req = test::TestRequest::get()
        .uri(&format!("/api/groups/{missing}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let payload = body(resp).await;
    assert_eq!(payload["error"]["message"], "Group not found");
    assert_eq!(payload["error"]["id"], missing.as_str());

    let req = test::TestRequest::get().uri("/api/nowhere").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(resp).await["error"], "Route not found");
}

#[actix_web::test]
async fn malformed_json_is_rejected() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/groups")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body(resp).await["error"]["message"].is_string());
}

#[actix_web::test]
async fn path_ids_must_be_uuids() {
    let app = app!();

    let req = test::TestRequest::get().uri("/api/groups/nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let payload = body(resp).await;
    assert_eq!(payload["error"]["message"], "Invalid groupId format");
    assert_eq!(payload["error"]["field"], "groupId");

    let group = uuid::Uuid::new_v4();
    let req = test::TestRequest::delete()
        .uri(&format!("/api/groups/{group}/members/not-a-member"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(resp).await["error"]["field"], "memberId");

    let req = test::TestRequest::delete().uri("/api/expenses/123").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(resp).await["error"]["message"], "Invalid expenseId format");
}

#[actix_web::test]
async fn responses_carry_security_headers() {
    let app = app!();

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

    let headers = resp.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert!(headers.contains_key("strict-transport-security"));
    assert!(headers.contains_key("content-security-policy"));
}

#[actix_web::test]
async fn group_with_unpaid_expense_stays_readable() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/groups")
        .set_json(json!({ "name": "Office" }))
        .to_request();
    let group_id = body(test::call_service(&app, req).await).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut members = Vec::new();
    for name in ["Ana", "Ben"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/groups/{group_id}/members"))
            .set_json(json!({ "name": name }))
            .to_request();
        members.push(body(test::call_service(&app, req).await).await["data"]["id"].clone());
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/groups/{group_id}/expenses"))
        .set_json(json!({
            "description": "Coffee",
            "amount": 10,
            "splitType": "equal",
            "splitBetween": [{ "memberId": members[0] }, { "memberId": members[1] }],
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri(&format!("/api/groups/{group_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let payload = body(resp).await;
    assert_eq!(payload["data"]["expenses"].as_array().unwrap().len(), 1);
    assert_eq!(payload["data"]["settlements"], json!([]));
}
