//! Catalog maintenance over HTTP: parameters, methods and techniques
//! guarded by the lines that use them, plus the flat sample catalogs.

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::{json, Value};

async fn proforma_with_line(app: &TestApp, parameter: &str, method: &str) -> Value {
    let client = app.seed_client("Hidro Andes").await;
    let response = app
        .request(
            Method::POST,
            "/api/proformas",
            Some(json!({
                "client_id": client["id"],
                "analyses": [{ "parameter_id": parameter, "method_id": method }]
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

fn catalog_row(tipo: &str, parametro: &str, precio: &str) -> Value {
    json!({
        "tipo": tipo,
        "parametro": parametro,
        "unidad": "mg/L",
        "metodo": "SM 5210-B",
        "tecnica": "Incubación",
        "precio": precio
    })
}

#[tokio::test]
async fn category_of_a_used_parameter_is_locked() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (parameter, method) = app.seed_catalog(&admin, "pH", "100", "u pH").await;
    let proforma = proforma_with_line(&app, &parameter, &method).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/parameters/{}", parameter),
            Some(json!({ "name": "pH", "category": "ruido" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "No se puede cambiar la categoría del parámetro porque está en uso en proformas"
    );

    let response = app
        .request(
            Method::PUT,
            &format!("/api/methods/{}", method),
            Some(json!({ "name": "Método pH", "category": "ruido" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Renaming within the same category is still allowed
    let response = app
        .request(
            Method::PUT,
            &format!("/api/parameters/{}", parameter),
            Some(json!({ "name": "pH de campo", "category": "agua", "default_price": "100" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::GET,
            &format!("/api/analysis?proforma_id={}", proforma["id"].as_str().unwrap()),
            None,
            None,
        )
        .await;
    let lines = response_json(response).await;
    assert_eq!(lines[0]["category"], "agua");
    assert_eq!(lines[0]["parameter_name"], "pH de campo");
}

#[tokio::test]
async fn category_of_a_used_technique_is_locked() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (parameter, method) = app.seed_catalog(&admin, "pH", "100", "u pH").await;
    let technique = app
        .seed_entry(&admin, "techniques", "Electrometría", "agua")
        .await;
    let client = app.seed_client("Hidro Andes").await;
    let response = app
        .request(
            Method::POST,
            "/api/proformas",
            Some(json!({
                "client_id": client["id"],
                "analyses": [{
                    "parameter_id": parameter,
                    "method_id": method,
                    "technique_id": technique
                }]
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/techniques/{}", technique),
            Some(json!({ "name": "Electrometría", "category": "emisiones" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "No se puede cambiar la categoría de la técnica porque está en uso en proformas"
    );
}

#[tokio::test]
async fn unused_entries_can_move_between_categories() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (parameter, _) = app.seed_catalog(&admin, "Ruido diurno", "80", "dB").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/parameters/{}", parameter),
            Some(json!({ "name": "Ruido diurno", "category": "ruido", "default_unit": "dB" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated = response_json(response).await;
    assert_eq!(updated["category"], "ruido");
    assert_eq!(updated["default_unit"], "dB");
}

#[tokio::test]
async fn entries_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (parameter, method) = app.seed_catalog(&admin, "pH", "100", "u pH").await;
    let proforma = proforma_with_line(&app, &parameter, &method).await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/parameters/{}", parameter),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "No se puede eliminar el parámetro porque está en uso en proformas"
    );

    let response = app
        .request(Method::DELETE, &format!("/api/methods/{}", method), None, Some(&admin))
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/proformas/{}", proforma["id"].as_str().unwrap()),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/parameters/{}", parameter),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(Method::GET, &format!("/api/parameters/{}", parameter), None, None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn catalog_writes_need_an_admin() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/parameters",
            Some(json!({ "name": "pH", "category": "agua" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .request(
            Method::POST,
            "/api/tipos-muestra",
            Some(catalog_row("Agua", "DBO5", "20")),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .request(
            Method::POST,
            "/api/catalogo-analisis",
            Some(catalog_row("Agua", "DBO5", "20")),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn sample_types_crud() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app
        .request(
            Method::POST,
            "/api/tipos-muestra",
            Some(catalog_row("Agua residual", "DBO5", "20")),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 201);
    let created = response_json(response).await;
    assert_eq!(created["precio"], "20.00");
    let id = created["id"].as_str().expect("tipo id").to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/tipos-muestra/{}", id),
            Some(catalog_row("Agua residual", "DBO5", "22.5")),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["precio"], "22.50");

    let response = app
        .request(Method::GET, &format!("/api/tipos-muestra/{}", id), None, None)
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["parametro"], "DBO5");

    let response = app.request(Method::GET, "/api/tipos-muestra", None, None).await;
    assert_eq!(response_json(response).await.as_array().map(Vec::len), Some(1));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/tipos-muestra/{}", id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(Method::GET, &format!("/api/tipos-muestra/{}", id), None, None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn sample_type_search_is_capped_and_needs_two_characters() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    for n in 0..12 {
        let response = app
            .request(
                Method::POST,
                "/api/tipos-muestra",
                Some(catalog_row("Agua", &format!("Coliformes {:02}", n), "10")),
                Some(&admin),
            )
            .await;
        assert_eq!(response.status(), 201);
    }
    app.request(
        Method::POST,
        "/api/tipos-muestra",
        Some(catalog_row("Suelo", "Plomo", "30")),
        Some(&admin),
    )
    .await;

    let response = app
        .request(Method::GET, "/api/tipos-muestra/search?q=c", None, None)
        .await;
    assert_eq!(response_json(response).await.as_array().map(Vec::len), Some(0));

    let response = app
        .request(Method::GET, "/api/tipos-muestra/search?q=COLI", None, None)
        .await;
    let hits = response_json(response).await;
    assert_eq!(hits.as_array().map(Vec::len), Some(10));
    assert_eq!(hits[0]["parametro"], "Coliformes 00");

    let response = app
        .request(Method::GET, "/api/tipos-muestra/search?q=plo", None, None)
        .await;
    let hits = response_json(response).await;
    assert_eq!(hits.as_array().map(Vec::len), Some(1));
    assert_eq!(hits[0]["tipo"], "Suelo");
}

#[tokio::test]
async fn analysis_catalog_crud_and_validation() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app
        .request(
            Method::POST,
            "/api/catalogo-analisis",
            Some(catalog_row("Agua", "Nitratos", "-1")),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::POST,
            "/api/catalogo-analisis",
            Some(catalog_row("Agua", "Nitratos", "15")),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 201);
    let id = response_json(response).await["id"]
        .as_str()
        .expect("catalog id")
        .to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/catalogo-analisis/{}", id),
            Some(catalog_row("Agua potable", "Nitratos", "17")),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated = response_json(response).await;
    assert_eq!(updated["tipo"], "Agua potable");
    assert_eq!(updated["precio"], "17.00");

    let response = app
        .request(Method::GET, "/api/catalogo-analisis", None, None)
        .await;
    assert_eq!(response_json(response).await.as_array().map(Vec::len), Some(1));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/catalogo-analisis/{}", id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/catalogo-analisis/{}", id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 404);
}
