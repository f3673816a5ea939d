//! Clients and projects: ownership, company visibility and archiving.

use crate::test_utils::TestApp;
use axum::http::StatusCode;
use serde_json::{Value, json};

fn ids(list: &[Value]) -> Vec<&str> {
    list.iter().map(|v| v["id"].as_str().unwrap()).collect()
}

#[test_log::test(tokio::test)]
async fn test_create_client() {
    let app = TestApp::new();
    let token = app.company_user("ana@example.com", "Acme SL").await;

    let client = app.create_client(&token, "  Construcciones Pérez  ").await;
    assert_eq!(client["name"], "Construcciones Pérez");
    assert_eq!(client["status"], "active");
    assert_eq!(client["company"]["nombre"], "Acme SL");
    assert_eq!(client["ownerId"], app.user("ana@example.com").await.id.to_string());

    app.server
        .post("/client")
        .authorization_bearer(&token)
        .json(&json!({ "name": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_log::test(tokio::test)]
async fn test_client_names_are_unique_per_owner() {
    let app = TestApp::new();
    let ana = app.verified_user("ana@example.com").await;
    let bea = app.verified_user("bea@example.com").await;

    app.create_client(&ana, "Acme").await;

    let response = app
        .server
        .post("/client")
        .authorization_bearer(&ana)
        .json(&json!({ "name": "Acme" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert!(body["error"].is_string());

    // Another owner may reuse the name
    app.create_client(&bea, "Acme").await;
}

#[test_log::test(tokio::test)]
async fn test_unverified_users_cannot_create_records() {
    let app = TestApp::new();
    let (token, _) = app.register("ana@example.com").await;

    app.server
        .post("/client")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Acme" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Reading is still allowed
    let response = app.server.get("/client").authorization_bearer(&token).await;
    response.assert_status_ok();
    let clients: Vec<Value> = response.json();
    assert!(clients.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_company_members_share_records() {
    let app = TestApp::new();
    let ana = app.company_user("ana@example.com", "Acme SL").await;
    let luis = app.company_user("luis@example.com", "Acme SL").await;
    let solo = app.verified_user("solo@example.com").await;

    let ana_client = app.create_client(&ana, "Cliente de Ana").await;
    let luis_client = app.create_client(&luis, "Cliente de Luis").await;
    let solo_client = app.create_client(&solo, "Cliente propio").await;

    let response = app.server.get("/client").authorization_bearer(&ana).await;
    response.assert_status_ok();
    let listed: Vec<Value> = response.json();
    let listed = ids(&listed);
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&ana_client["id"].as_str().unwrap()));
    assert!(listed.contains(&luis_client["id"].as_str().unwrap()));

    // Without a company only own records are visible
    let response = app.server.get("/client").authorization_bearer(&solo).await;
    let listed: Vec<Value> = response.json();
    assert_eq!(ids(&listed), vec![solo_client["id"].as_str().unwrap()]);

    let solo_path = format!("/client/{}", solo_client["id"].as_str().unwrap());
    app.server
        .get(&solo_path)
        .authorization_bearer(&ana)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Company peers can read each other's records but not change them
    let luis_path = format!("/client/{}", luis_client["id"].as_str().unwrap());
    app.server.get(&luis_path).authorization_bearer(&ana).await.assert_status_ok();
    app.server
        .patch(&luis_path)
        .authorization_bearer(&ana)
        .json(&json!({ "phone": "600000000" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .delete(&luis_path)
        .authorization_bearer(&ana)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .patch(&format!("{luis_path}/archive"))
        .authorization_bearer(&ana)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[test_log::test(tokio::test)]
async fn test_update_client() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;
    let client = app.create_client(&token, "Acme").await;
    app.create_client(&token, "Otro").await;
    let path = format!("/client/{}", client["id"].as_str().unwrap());

    let response = app
        .server
        .patch(&path)
        .authorization_bearer(&token)
        .json(&json!({ "phone": "600123123", "address": "Calle Luna 4" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["phone"], "600123123");
    assert_eq!(body["address"], "Calle Luna 4");

    app.server
        .patch(&path)
        .authorization_bearer(&token)
        .json(&json!({ "name": "Otro" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[test_log::test(tokio::test)]
async fn test_archive_and_recover_client() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;
    let client = app.create_client(&token, "Acme").await;
    let id = client["id"].as_str().unwrap();

    let response = app
        .server
        .patch(&format!("/client/{id}/archive"))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "archived");

    let active: Vec<Value> = app.server.get("/client").authorization_bearer(&token).await.json();
    assert!(active.is_empty());
    let archived: Vec<Value> = app
        .server
        .get("/client/archived/list")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(ids(&archived), vec![id]);

    let response = app
        .server
        .patch(&format!("/client/{id}/recover"))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "active");

    let active: Vec<Value> = app.server.get("/client").authorization_bearer(&token).await.json();
    assert_eq!(ids(&active), vec![id]);
    let archived: Vec<Value> = app
        .server
        .get("/client/archived/list")
        .authorization_bearer(&token)
        .await
        .json();
    assert!(archived.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_delete_client() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;
    let client = app.create_client(&token, "Acme").await;
    let path = format!("/client/{}", client["id"].as_str().unwrap());

    app.server.delete(&path).authorization_bearer(&token).await.assert_status_ok();
    app.server
        .get(&path)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete(&path)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let profile: Value = app.server.get("/user").authorization_bearer(&token).await.json();
    assert_eq!(profile["user"]["clients"], json!([]));
}

#[test_log::test(tokio::test)]
async fn test_project_requires_visible_client() {
    let app = TestApp::new();
    let ana = app.verified_user("ana@example.com").await;
    let bea = app.verified_user("bea@example.com").await;
    let bea_client = app.create_client(&bea, "Cliente de Bea").await;

    app.server
        .post("/project")
        .authorization_bearer(&ana)
        .json(&json!({ "nombre": "Reforma", "clientId": bea_client["id"] }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .post("/project")
        .authorization_bearer(&ana)
        .json(&json!({ "nombre": "Reforma", "clientId": uuid::Uuid::new_v4() }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn test_project_lifecycle() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;
    let client = app.create_client(&token, "Acme").await;
    let client_id = client["id"].as_str().unwrap();

    let project = app.create_project(&token, client_id, "Reforma cocina").await;
    assert_eq!(project["nombre"], "Reforma cocina");
    assert_eq!(project["descripcion"], "Obra");
    assert_eq!(project["clientId"], client_id);
    let id = project["id"].as_str().unwrap();
    let path = format!("/project/{id}");

    // Same name under the same client conflicts
    app.server
        .post("/project")
        .authorization_bearer(&token)
        .json(&json!({ "nombre": "Reforma cocina", "clientId": client_id }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let other_client = app.create_client(&token, "Otro").await;
    app.create_project(&token, other_client["id"].as_str().unwrap(), "Reforma cocina")
        .await;

    let response = app
        .server
        .put(&path)
        .authorization_bearer(&token)
        .json(&json!({ "descripcion": "Cocina y baño" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["nombre"], "Reforma cocina");
    assert_eq!(body["descripcion"], "Cocina y baño");

    app.server
        .put(&path)
        .authorization_bearer(&token)
        .json(&json!({ "nombre": "" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .patch(&format!("{path}/archive"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    let active: Vec<Value> = app.server.get("/project").authorization_bearer(&token).await.json();
    assert_eq!(active.len(), 1);
    let archived: Vec<Value> = app
        .server
        .get("/project/archived/list")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(ids(&archived), vec![id]);

    app.server
        .patch(&format!("{path}/recover"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    let active: Vec<Value> = app.server.get("/project").authorization_bearer(&token).await.json();
    assert_eq!(active.len(), 2);

    app.server.delete(&path).authorization_bearer(&token).await.assert_status_ok();
    app.server
        .get(&path)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn test_company_peers_see_projects_but_cannot_change_them() {
    let app = TestApp::new();
    let ana = app.company_user("ana@example.com", "Acme SL").await;
    let luis = app.company_user("luis@example.com", "Acme SL").await;

    let client = app.create_client(&ana, "Acme").await;
    let project = app
        .create_project(&ana, client["id"].as_str().unwrap(), "Reforma")
        .await;
    let path = format!("/project/{}", project["id"].as_str().unwrap());

    app.server.get(&path).authorization_bearer(&luis).await.assert_status_ok();
    app.server
        .put(&path)
        .authorization_bearer(&luis)
        .json(&json!({ "descripcion": "cambio" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .delete(&path)
        .authorization_bearer(&luis)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // A peer may open projects for a shared client
    app.create_project(&luis, client["id"].as_str().unwrap(), "Ampliación")
        .await;
}
