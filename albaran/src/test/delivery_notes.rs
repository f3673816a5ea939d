//! Delivery notes: creation, the sign-once rule, deletion and PDF export.

use crate::test_utils::TestApp;
use axum::http::{StatusCode, header};
use axum_test::multipart::{MultipartForm, Part};
use base64::{Engine as _, engine::general_purpose};
use serde_json::{Value, json};
use std::future::IntoFuture;

/// A 1x1 PNG.
const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn signature_form(file_name: &str) -> MultipartForm {
    let png = general_purpose::STANDARD.decode(TINY_PNG).unwrap();
    MultipartForm::new().add_part(
        "firma",
        Part::bytes(png).file_name(file_name.to_string()).mime_type("image/png"),
    )
}

fn note_id(note: &Value) -> &str {
    note["id"].as_str().unwrap()
}

#[test_log::test(tokio::test)]
async fn test_create_and_read_note() {
    let app = TestApp::new();
    let token = app.company_user("ana@example.com", "Acme SL").await;

    let note = app.create_note(&token).await;
    assert_eq!(note["tipo"], "horas");
    assert_eq!(note["signed"], false);
    assert!(note["firma"].is_null());
    assert!(note["pdfUrl"].is_null());
    assert_eq!(note["company"]["nombre"], "Acme SL");
    assert_eq!(note["items"].as_array().unwrap().len(), 1);

    let response = app
        .server
        .get(&format!("/deliverynote/{}", note_id(&note)))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let fetched: Value = response.json();
    assert_eq!(fetched["id"], note["id"]);
    assert_eq!(fetched["clientId"], note["clientId"]);

    let listed: Vec<Value> = app.server.get("/deliverynote").authorization_bearer(&token).await.json();
    assert_eq!(listed.len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_create_note_validation() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;
    let client = app.create_client(&token, "Acme").await;
    let project = app.create_project(&token, client["id"].as_str().unwrap(), "Reforma").await;

    let bad_kind = app
        .server
        .post("/deliverynote")
        .authorization_bearer(&token)
        .json(&json!({ "tipo": "dias", "clientId": client["id"], "projectId": project["id"], "items": [] }))
        .await;
    bad_kind.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/deliverynote")
        .authorization_bearer(&token)
        .json(&json!({
            "tipo": "materiales",
            "clientId": client["id"],
            "projectId": project["id"],
            "items": [{ "tipo": "material", "cantidad": 3 }],
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Item 1: descripcion is required");

    // References must be visible to the caller
    app.server
        .post("/deliverynote")
        .authorization_bearer(&token)
        .json(&json!({
            "tipo": "horas",
            "clientId": client["id"],
            "projectId": uuid::Uuid::new_v4(),
            "items": [],
        }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
async fn test_sign_once() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;
    let note = app.create_note(&token).await;
    let sign_path = format!("/deliverynote/sign/{}", note_id(&note));

    app.server
        .patch(&sign_path)
        .authorization_bearer(&token)
        .multipart(signature_form("firma.gif"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .patch(&sign_path)
        .authorization_bearer(&token)
        .multipart(signature_form("firma.png"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let firma = body["firma"].as_str().unwrap().to_string();
    assert!(firma.starts_with("/firmas/"));

    let stored: Value = app
        .server
        .get(&format!("/deliverynote/{}", note_id(&note)))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(stored["signed"], true);
    assert_eq!(stored["firma"], firma.as_str());

    // The image is served from the signatures mount
    app.server.get(&firma).await.assert_status_ok();

    let response = app
        .server
        .patch(&sign_path)
        .authorization_bearer(&token)
        .multipart(signature_form("otra.png"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Delivery note is already signed");

    // Only the first signature was kept on disk
    let files = std::fs::read_dir(&app.config.storage.signatures_dir).unwrap().count();
    assert_eq!(files, 1);
}

#[test_log::test(tokio::test)]
async fn test_company_peer_can_sign() {
    let app = TestApp::new();
    let ana = app.company_user("ana@example.com", "Acme SL").await;
    let luis = app.company_user("luis@example.com", "Acme SL").await;
    let outsider = app.verified_user("otro@example.com").await;
    let note = app.create_note(&ana).await;
    let sign_path = format!("/deliverynote/sign/{}", note_id(&note));

    app.server
        .patch(&sign_path)
        .authorization_bearer(&outsider)
        .multipart(signature_form("firma.png"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .patch(&sign_path)
        .authorization_bearer(&luis)
        .multipart(signature_form("firma.png"))
        .await
        .assert_status_ok();
}

#[test_log::test(tokio::test)]
async fn test_unverified_company_member_cannot_sign() {
    let app = TestApp::new();
    let ana = app.company_user("ana@example.com", "Acme SL").await;
    let note = app.create_note(&ana).await;

    // Joins the company by name without ever verifying the email
    let (pending, _) = app.register("pending@example.com").await;
    app.server
        .patch("/user/company")
        .authorization_bearer(&pending)
        .json(&json!({ "nombre": "Acme SL", "cif": "B12345678", "direccion": "Calle Mayor 1, Madrid" }))
        .await
        .assert_status_ok();

    app.server
        .patch(&format!("/deliverynote/sign/{}", note_id(&note)))
        .authorization_bearer(&pending)
        .multipart(signature_form("firma.png"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let stored: Value = app
        .server
        .get(&format!("/deliverynote/{}", note_id(&note)))
        .authorization_bearer(&ana)
        .await
        .json();
    assert_eq!(stored["signed"], false);
    assert!(stored["firma"].is_null());
}

#[test_log::test(tokio::test)]
async fn test_concurrent_signatures_keep_separate_files() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;

    for _ in 0..5 {
        let first = app.create_note(&token).await;
        let second = app.create_note(&token).await;
        let first_path = format!("/deliverynote/sign/{}", note_id(&first));
        let second_path = format!("/deliverynote/sign/{}", note_id(&second));

        let (a, b) = tokio::join!(
            app.server
                .patch(&first_path)
                .authorization_bearer(&token)
                .multipart(signature_form("firma.png"))
                .into_future(),
            app.server
                .patch(&second_path)
                .authorization_bearer(&token)
                .multipart(signature_form("firma.png"))
                .into_future(),
        );
        a.assert_status_ok();
        b.assert_status_ok();

        let (a, b): (Value, Value) = (a.json(), b.json());
        assert_ne!(a["firma"], b["firma"]);
        app.server.get(a["firma"].as_str().unwrap()).await.assert_status_ok();
        app.server.get(b["firma"].as_str().unwrap()).await.assert_status_ok();
    }

    let files = std::fs::read_dir(&app.config.storage.signatures_dir).unwrap().count();
    assert_eq!(files, 10);
}

#[test_log::test(tokio::test)]
async fn test_delete_rules() {
    let app = TestApp::new();
    let ana = app.company_user("ana@example.com", "Acme SL").await;
    let luis = app.company_user("luis@example.com", "Acme SL").await;

    let draft = app.create_note(&ana).await;
    let draft_path = format!("/deliverynote/{}", note_id(&draft));

    app.server
        .delete(&draft_path)
        .authorization_bearer(&luis)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server.delete(&draft_path).authorization_bearer(&ana).await.assert_status_ok();
    app.server
        .get(&draft_path)
        .authorization_bearer(&ana)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let signed = app.create_note(&ana).await;
    app.server
        .patch(&format!("/deliverynote/sign/{}", note_id(&signed)))
        .authorization_bearer(&ana)
        .multipart(signature_form("firma.png"))
        .await
        .assert_status_ok();

    let response = app
        .server
        .delete(&format!("/deliverynote/{}", note_id(&signed)))
        .authorization_bearer(&ana)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Cannot delete a signed delivery note");
}

#[test_log::test(tokio::test)]
async fn test_pdf_download() {
    let app = TestApp::new();
    let token = app.company_user("ana@example.com", "Acme SL").await;
    let note = app.create_note(&token).await;
    let id = note_id(&note);

    app.server
        .patch(&format!("/deliverynote/sign/{id}"))
        .authorization_bearer(&token)
        .multipart(signature_form("firma.png"))
        .await
        .assert_status_ok();

    let response = app
        .server
        .get(&format!("/deliverynote/pdf/{id}"))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "application/pdf");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        format!("attachment; filename=\"albaran-{id}.pdf\"").as_str()
    );
    assert!(response.as_bytes().starts_with(b"%PDF"));

    let on_disk = app.config.storage.pdf_dir.join(format!("albaran-{id}.pdf"));
    assert!(on_disk.exists());

    let stored: Value = app
        .server
        .get(&format!("/deliverynote/{id}"))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(stored["pdfUrl"], format!("/pdfs/albaran-{id}.pdf"));

    app.server
        .get(&format!("/pdfs/albaran-{id}.pdf"))
        .await
        .assert_status_ok();
}

#[test_log::test(tokio::test)]
async fn test_pdf_survives_deleted_client() {
    let app = TestApp::new();
    let token = app.verified_user("ana@example.com").await;
    let note = app.create_note(&token).await;

    app.server
        .delete(&format!("/client/{}", note["clientId"].as_str().unwrap()))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();

    let response = app
        .server
        .get(&format!("/deliverynote/pdf/{}", note_id(&note)))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    assert!(response.as_bytes().starts_with(b"%PDF"));
}
