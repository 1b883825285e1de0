use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use member::notify::MemoryNotifier;
use member::{MemberConfig, MemberModule};
use memberd_core::{Module, PaginationConfig, Paginator};
use memberd_sql::DbPool;

async fn json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn member_lifecycle_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let pool = DbPool::open_sqlite(&dir.path().join("members.sqlite")).unwrap();
    let paginator = Paginator::new(PaginationConfig {
        default_limit: 2,
        max_limit: 5,
    })
    .unwrap();
    let notifier = Arc::new(MemoryNotifier::default());
    let module = MemberModule::new(
        pool,
        &MemberConfig {
            id_prefix: "CUS-".into(),
        },
        paginator,
        notifier.clone(),
    )
    .unwrap();
    assert_eq!(module.name(), "member");
    let app = Router::new().nest("/member", module.routes());

    let members: Vec<_> = ["ann", "bob", "cat", "dan", "eve"]
        .iter()
        .map(|n| serde_json::json!({ "merchantId": "shop-1", "firstName": n, "email": format!("{n}@shop.io") }))
        .collect();
    let (status, body) = json(&app, post("/member/members/@import", serde_json::json!({ "members": members }))).await;
    assert_eq!(status, StatusCode::OK);
    let imported = body["data"]["imported"].as_array().unwrap().clone();
    assert_eq!(imported.len(), 5);
    let ids: Vec<String> = imported
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert!(ids.iter().all(|id| id.starts_with("CUS-")));

    // Default limit from config, page window and meta.
    let (status, body) = json(&app, get("/member/members?page=3&orderBy=firstName")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["limit"], 2);
    assert_eq!(body["meta"]["totalPages"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Limit above the configured max.
    let (status, _) = json(&app, get("/member/members?limit=6")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A value with the id prefix is an exact id lookup.
    let uri = format!("/member/members?search={}", ids[1]);
    let (_, body) = json(&app, get(&uri)).await;
    assert_eq!(body["meta"]["totalRecords"], 1);
    assert_eq!(body["data"][0]["email"], "bob@shop.io");

    // Re-importing a stored email rejects the whole batch.
    let (status, body) = json(
        &app,
        post(
            "/member/members/@import",
            serde_json::json!({ "members": [
                { "merchantId": "shop-1", "email": "new@shop.io" },
                { "merchantId": "shop-1", "email": "EVE@shop.io" },
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["data"][0]["id"], "eve@shop.io");
    let (_, body) = json(&app, get("/member/members?search=new@shop.io")).await;
    assert_eq!(body["meta"]["totalRecords"], 0);

    // Delete one, then notify everyone: the deleted id fails, the rest go out.
    let req = Request::delete(format!("/member/members/{}", ids[0]))
        .body(Body::empty())
        .unwrap();
    let (status, _) = json(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = json(
        &app,
        post(
            "/member/members/@send",
            serde_json::json!({ "ids": &ids, "subject": "Sale", "body": "50% off" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], ids[0].as_str());
    assert_eq!(body["message"], "1 item(s) failed");
    assert_eq!(body["result"]["sent"].as_array().unwrap().len(), 4);
    assert_eq!(notifier.sent().len(), 4);

    let (status, _) = json(&app, get(&format!("/member/members/{}", ids[0]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = json(&app, get(&format!("/member/members/{}", ids[2]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["firstName"], "cat");
}
