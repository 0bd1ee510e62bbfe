use chrono::{DateTime, Utc};
use serde::Deserialize;

use pvz_auth::Role;
use pvz_core::PickupPointId;
use pvz_infra::{ListFilter, Page, PickupPointSummary};
use pvz_pickup_points::{City, PickupPoint};
use pvz_receptions::{Product, ProductType, Reception};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct DummyLoginRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePickupPointRequest {
    pub city: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReceptionRequest {
    pub pvz_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    #[serde(rename = "type")]
    pub product_type: String,
    pub pvz_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_role(s: &str) -> Result<Role, axum::response::Response> {
    s.parse()
        .map_err(|e| errors::domain_error_to_response("invalid_role", e))
}

pub fn parse_city(s: &str) -> Result<City, axum::response::Response> {
    s.parse()
        .map_err(|e| errors::domain_error_to_response("invalid_city", e))
}

pub fn parse_product_type(s: &str) -> Result<ProductType, axum::response::Response> {
    s.parse()
        .map_err(|e| errors::domain_error_to_response("invalid_product_type", e))
}

pub fn parse_pickup_point_id(s: &str) -> Result<PickupPointId, axum::response::Response> {
    s.parse()
        .map_err(|e| errors::domain_error_to_response("invalid_id", e))
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, axum::response::Response> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| {
                errors::json_error(
                    axum::http::StatusCode::BAD_REQUEST,
                    "invalid_date",
                    format!("{field} must be an RFC 3339 timestamp: {e}"),
                )
            })
    })
    .transpose()
}

impl ListQuery {
    pub fn filter(&self) -> Result<ListFilter, axum::response::Response> {
        let start = parse_date("startDate", self.start_date.as_deref())?;
        let end = parse_date("endDate", self.end_date.as_deref())?;
        ListFilter::new(start, end).map_err(|e| errors::domain_error_to_response("invalid_date", e))
    }

    pub fn page(&self) -> Result<Page, axum::response::Response> {
        Page::new(self.page, self.limit)
            .map_err(|e| errors::domain_error_to_response("invalid_pagination", e))
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn pickup_point_to_json(p: &PickupPoint) -> serde_json::Value {
    serde_json::json!({
        "id": p.id.to_string(),
        "registrationDate": p.registration_date.to_rfc3339(),
        "city": p.city.as_str(),
    })
}

pub fn reception_to_json(r: &Reception) -> serde_json::Value {
    serde_json::json!({
        "id": r.id.to_string(),
        "dateTime": r.date_time.to_rfc3339(),
        "pvzId": r.pickup_point_id.to_string(),
        "status": r.status.as_str(),
        "closedAt": r.closed_at.map(|t| t.to_rfc3339()),
    })
}

pub fn product_to_json(p: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": p.id.to_string(),
        "dateTime": p.date_time.to_rfc3339(),
        "type": p.product_type.as_str(),
        "receptionId": p.reception_id.to_string(),
    })
}

pub fn summary_to_json(s: &PickupPointSummary) -> serde_json::Value {
    serde_json::json!({
        "pvz": pickup_point_to_json(&s.pickup_point),
        "receptions": s.receptions.iter().map(|r| serde_json::json!({
            "reception": reception_to_json(&r.reception),
            "products": r.products.iter().map(product_to_json).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn reception_json_uses_wire_field_names() {
        let pvz = PickupPointId::new();
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).unwrap();
        let json = reception_to_json(&Reception::open(pvz, at));

        assert_eq!(json["pvzId"], pvz.to_string());
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["dateTime"], "2025-04-01T09:30:00+00:00");
        assert!(json["closedAt"].is_null());
    }

    #[test]
    fn rejects_unknown_enumeration_tokens() {
        assert_eq!(parse_city("Новосибирск").unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_product_type("мебель").unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_role("admin").unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_pickup_point_id("nope").unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn list_query_validates_window_and_page() {
        let inverted = ListQuery {
            start_date: Some("2025-04-02T00:00:00Z".into()),
            end_date: Some("2025-04-01T00:00:00Z".into()),
            ..Default::default()
        };
        assert!(inverted.filter().is_err());

        let garbage = ListQuery {
            start_date: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(garbage.filter().is_err());

        let too_big = ListQuery {
            limit: Some(31),
            ..Default::default()
        };
        assert!(too_big.page().is_err());

        let defaults = ListQuery::default();
        assert!(!defaults.filter().unwrap().is_windowed());
        assert_eq!(defaults.page().unwrap().limit(), 10);
    }
}
