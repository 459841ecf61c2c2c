use actix_web::{HttpResponse, Responder};
use serde::Serialize;

use crate::models::{AgeGroup, Technique, Theme};

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub techniques: Vec<CatalogEntry>,
    pub themes: Vec<CatalogEntry>,
    pub age_groups: Vec<CatalogEntry>,
}

fn entry(id: &str, label: &str) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        label: label.to_string(),
    }
}

/// GET /api/catalog
/// Public list of known techniques, themes and age groups
pub async fn get_catalog() -> impl Responder {
    HttpResponse::Ok().json(CatalogResponse {
        techniques: Technique::KNOWN.iter().map(|t| entry(t.id(), t.label())).collect(),
        themes: Theme::KNOWN.iter().map(|t| entry(t.id(), t.label())).collect(),
        age_groups: AgeGroup::KNOWN.iter().map(|a| entry(a.id(), a.label())).collect(),
    })
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::TestState;
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_catalog_is_public() {
        let state = TestState::new();
        let app = test::init_service(App::new().configure(|cfg| state.configure(cfg))).await;

        let req = test::TestRequest::get().uri("/api/catalog").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp["techniques"].as_array().unwrap().len(), 8);
        assert_eq!(resp["themes"].as_array().unwrap().len(), 10);
        assert_eq!(resp["ageGroups"].as_array().unwrap().len(), 6);
        assert_eq!(resp["techniques"][0]["id"], "COLORING");
        assert!(resp["ageGroups"][1]["label"].is_string());
    }
}
