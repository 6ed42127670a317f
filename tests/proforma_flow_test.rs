//! Quotation workflow over HTTP: numbering, totals, line edits, reports
//! and document downloads.

mod common;

use axum::http::{header, Method};
use common::{response_bytes, response_json, TestApp};
use serde_json::{json, Value};

struct Seeded {
    admin: String,
    client_id: String,
    ph: (String, String),
    turbidity: (String, String),
}

async fn seed(app: &TestApp) -> Seeded {
    let admin = app.admin_token().await;
    let client = app.seed_client("Hidro Andes").await;
    let ph = app.seed_catalog(&admin, "pH", "100.00", "u pH").await;
    let turbidity = app.seed_catalog(&admin, "Turbidez", "75", "NTU").await;
    Seeded {
        admin,
        client_id: client["id"].as_str().expect("client id").to_string(),
        ph,
        turbidity,
    }
}

async fn create_proforma(app: &TestApp, seeded: &Seeded, token: Option<&str>) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/proformas",
            Some(json!({
                "client_id": seeded.client_id,
                "analyses": [
                    { "parameter_id": seeded.ph.0, "method_id": seeded.ph.1 },
                    { "parameter_id": seeded.turbidity.0, "method_id": seeded.turbidity.1, "quantity": 2 }
                ]
            })),
            token,
        )
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

#[tokio::test]
async fn proforma_numbers_are_sequential() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let proforma = create_proforma(&app, &seeded, None).await;
        numbers.push(proforma["proforma_number"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(numbers, vec!["PRF-0001", "PRF-0002", "PRF-0003"]);

    let response = app.request(Method::GET, "/api/proformas", None, None).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn totals_follow_lines_and_tax_rate() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;

    let proforma = create_proforma(&app, &seeded, Some(&seeded.admin)).await;
    assert_eq!(proforma["subtotal"], "250.00");
    assert_eq!(proforma["tax_amount"], "30.00");
    assert_eq!(proforma["total"], "280.00");
    assert_eq!(proforma["created_by"], "admin");
    assert_eq!(proforma["client_name"], "Hidro Andes");

    let analyses = proforma["analyses"].as_array().expect("analyses");
    assert_eq!(analyses.len(), 2);
    assert_eq!(analyses[0]["parameter_name"], "pH");
    assert_eq!(analyses[0]["unit"], "u pH");
    assert_eq!(analyses[1]["subtotal"], "150.00");
    assert_eq!(analyses[1]["order"], 1);

    let id = proforma["id"].as_str().expect("proforma id");
    let ph_line = analyses[0]["id"].as_str().expect("line id");
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/proformas/{}/remove_analysis", id),
            Some(json!({ "analysis_id": ph_line })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated = response_json(response).await;
    assert_eq!(updated["subtotal"], "150.00");
    assert_eq!(updated["tax_amount"], "18.00");
    assert_eq!(updated["total"], "168.00");
    assert_eq!(updated["analyses"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn editing_a_line_recalculates_the_proforma() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let proforma = create_proforma(&app, &seeded, None).await;
    let id = proforma["id"].as_str().expect("proforma id");
    let line = proforma["analyses"][0]["id"].as_str().expect("line id");

    let response = app
        .request(
            Method::PUT,
            &format!("/api/analysis/{}", line),
            Some(json!({ "unit_price": "40.50", "quantity": 2 })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["subtotal"], "81.00");

    let response = app
        .request(Method::GET, &format!("/api/proformas/{}", id), None, None)
        .await;
    let detail = response_json(response).await;
    assert_eq!(detail["subtotal"], "231.00");
    assert_eq!(detail["tax_amount"], "27.72");
    assert_eq!(detail["total"], "258.72");

    let response = app
        .request(
            Method::POST,
            &format!("/api/proformas/{}/add_analysis", id),
            Some(json!({ "parameter_id": seeded.ph.0, "method_id": seeded.ph.1 })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);
    assert_eq!(response_json(response).await["order"], 2);
}

#[tokio::test]
async fn invalid_lines_are_rejected_before_anything_is_stored() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;

    let response = app
        .request(
            Method::POST,
            "/api/proformas",
            Some(json!({
                "client_id": seeded.client_id,
                "analyses": [
                    { "parameter_id": seeded.ph.0, "method_id": seeded.ph.1 },
                    { "parameter_id": seeded.ph.0, "method_id": seeded.ph.1, "quantity": 0 }
                ]
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app.request(Method::GET, "/api/proformas", None, None).await;
    assert_eq!(response_json(response).await.as_array().map(Vec::len), Some(0));

    // The failed attempt did not consume a number
    let proforma = create_proforma(&app, &seeded, None).await;
    assert_eq!(proforma["proforma_number"], "PRF-0001");
}

#[tokio::test]
async fn remove_analysis_checks_proforma_then_body() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let proforma = create_proforma(&app, &seeded, None).await;
    let id = proforma["id"].as_str().expect("proforma id");

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/proformas/{}/remove_analysis", id),
            Some(json!({})),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(response_json(response).await["message"], "analysis_id requerido");

    let response = app
        .request(
            Method::DELETE,
            "/api/proformas/9b2f6c1e-0000-4000-8000-000000000000/remove_analysis",
            Some(json!({})),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/proformas/{}/remove_analysis", id),
            Some(json!({ "analysis_id": "9b2f6c1e-0000-4000-8000-000000000000" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn reorder_skips_unknown_lines() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let proforma = create_proforma(&app, &seeded, None).await;
    let id = proforma["id"].as_str().expect("proforma id");
    let first = proforma["analyses"][0]["id"].as_str().expect("line id");
    let second = proforma["analyses"][1]["id"].as_str().expect("line id");

    let response = app
        .request(
            Method::POST,
            "/api/analysis/reorder",
            Some(json!({
                "analysis_orders": [
                    { "id": first, "order": 1 },
                    { "id": second, "order": 0 },
                    { "id": "9b2f6c1e-0000-4000-8000-000000000000", "order": 5 }
                ]
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["msg"], "Orden actualizado exitosamente");

    let response = app
        .request(Method::GET, &format!("/api/analysis?proforma_id={}", id), None, None)
        .await;
    let lines = response_json(response).await;
    assert_eq!(lines[0]["id"], second);
    assert_eq!(lines[1]["id"], first);
}

#[tokio::test]
async fn one_informe_per_proforma() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let proforma = create_proforma(&app, &seeded, None).await;
    let id = proforma["id"].as_str().expect("proforma id");

    let body = json!({
        "proforma_id": id,
        "tomado_por": "Cliente",
        "analizado_por": "Lab",
        "resultados": [
            { "parameter": "pH", "unit": "u pH", "resultados": "7.2", "limite": "6.5-8.5" },
            { "parameter": "Turbidez", "unit": "NTU", "resultados": "1.1" }
        ]
    });
    let response = app
        .request(Method::POST, "/api/informes", Some(body.clone()), None)
        .await;
    assert_eq!(response.status(), 201);
    let informe = response_json(response).await;
    assert_eq!(informe["resultados"].as_array().map(Vec::len), Some(2));

    let response = app.request(Method::POST, "/api/informes", Some(body), None).await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "Ya existe un informe para esta proforma"
    );

    let response = app
        .request(Method::GET, &format!("/api/proformas/{}/informe", id), None, None)
        .await;
    assert_eq!(response.status(), 200);
    let summary = response_json(response).await;
    assert_eq!(summary["client_name"], "Hidro Andes");
    assert_eq!(summary["analysis_data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn pdf_downloads_are_generated_on_demand() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let proforma = create_proforma(&app, &seeded, None).await;
    let id = proforma["id"].as_str().expect("proforma id");

    let response = app
        .request(Method::GET, &format!("/api/proformas/{}/pdf", id), None, None)
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = response_bytes(response).await;
    assert!(bytes.starts_with(b"%PDF"));

    let response = app
        .request(Method::GET, &format!("/api/proformas/{}/informe_pdf", id), None, None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn deleting_a_proforma_removes_its_lines() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let proforma = create_proforma(&app, &seeded, None).await;
    let id = proforma["id"].as_str().expect("proforma id");

    let response = app
        .request(Method::DELETE, &format!("/api/proformas/{}", id), None, None)
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(Method::GET, &format!("/api/analysis?proforma_id={}", id), None, None)
        .await;
    assert_eq!(response_json(response).await.as_array().map(Vec::len), Some(0));

    let response = app
        .request(Method::GET, &format!("/api/proformas/{}", id), None, None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn method_and_technique_must_match_the_parameter_category() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let noise_method = app
        .seed_entry(&seeded.admin, "methods", "ISO 1996", "ruido")
        .await;
    let noise_technique = app
        .seed_entry(&seeded.admin, "techniques", "Sonometría", "ruido")
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/proformas",
            Some(json!({
                "client_id": seeded.client_id,
                "analyses": [{ "parameter_id": seeded.ph.0, "method_id": noise_method }]
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "El método no corresponde a la categoría del parámetro"
    );

    let response = app
        .request(
            Method::POST,
            "/api/proformas",
            Some(json!({
                "client_id": seeded.client_id,
                "analyses": [{
                    "parameter_id": seeded.ph.0,
                    "method_id": seeded.ph.1,
                    "technique_id": noise_technique
                }]
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "La técnica no corresponde a la categoría del parámetro"
    );

    let proforma = create_proforma(&app, &seeded, None).await;
    let line = proforma["analyses"][0]["id"].as_str().expect("line id");
    let response = app
        .request(
            Method::PUT,
            &format!("/api/analysis/{}", line),
            Some(json!({ "method_id": noise_method })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "El método no corresponde a la categoría del parámetro"
    );
}

#[tokio::test]
async fn oversized_amounts_are_rejected() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;

    for line in [
        json!({
            "parameter_id": seeded.ph.0,
            "method_id": seeded.ph.1,
            "unit_price": "50000000000000000000000000000",
            "quantity": 2
        }),
        json!({
            "parameter_id": seeded.ph.0,
            "method_id": seeded.ph.1,
            "quantity": 2_000_000
        }),
    ] {
        let response = app
            .request(
                Method::POST,
                "/api/proformas",
                Some(json!({ "client_id": seeded.client_id, "analyses": [line] })),
                None,
            )
            .await;
        assert_eq!(response.status(), 400);
    }

    let proforma = create_proforma(&app, &seeded, None).await;
    let line = proforma["analyses"][0]["id"].as_str().expect("line id");
    let response = app
        .request(
            Method::PUT,
            &format!("/api/analysis/{}", line),
            Some(json!({ "unit_price": "1000000000" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn technique_can_be_cleared_from_a_line() {
    let app = TestApp::new().await;
    let seeded = seed(&app).await;
    let technique = app
        .seed_entry(&seeded.admin, "techniques", "Electrometría", "agua")
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/proformas",
            Some(json!({
                "client_id": seeded.client_id,
                "analyses": [{
                    "parameter_id": seeded.ph.0,
                    "method_id": seeded.ph.1,
                    "technique_id": technique
                }]
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);
    let proforma = response_json(response).await;
    let line = proforma["analyses"][0]["id"].as_str().expect("line id");
    assert_eq!(proforma["analyses"][0]["technique_name"], "Electrometría");

    // Omitting the technique keeps it
    let response = app
        .request(
            Method::PUT,
            &format!("/api/analysis/{}", line),
            Some(json!({ "quantity": 3 })),
            None,
        )
        .await;
    assert_eq!(response_json(response).await["technique_id"], technique.as_str());

    let response = app
        .request(
            Method::PUT,
            &format!("/api/analysis/{}", line),
            Some(json!({ "clear_technique": true })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated = response_json(response).await;
    assert!(updated["technique_id"].is_null());
    assert!(updated["technique_name"].is_null());
    assert_eq!(updated["quantity"], 3);
}
