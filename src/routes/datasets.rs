use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppError,
    services::{
        engine::{
            sanitize_table, Choice, ColumnMapping, DateRange, FilterMode, HourBucket, RankMetric,
            RevenueSource, SanitizeReport,
        },
        report::{build_report, Report, ReportQuery},
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/datasets/:id/prepare", post(prepare_dataset))
        .route("/datasets/:id/report", post(report_dataset))
}

#[derive(Debug, Default, Deserialize)]
pub struct MappingRequest {
    time: Option<String>,
    performer: Option<String>,
    spend: Option<String>,
    sales: Option<String>,
    revenue: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    mapping: MappingRequest,
    unit_price: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PrepareResponse {
    dataset_id: String,
    report: SanitizeReport,
    rows_dropped: usize,
    date_range: Option<DateRange>,
    hours: Vec<HourBucket>,
    performers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    #[serde(default)]
    mode: FilterMode,
    hours: Option<Vec<String>>,
    performers: Option<Vec<String>>,
    #[serde(default)]
    rank_by: RankMetric,
    detail_limit: Option<usize>,
}

impl PrepareRequest {
    /// A named revenue column wins over a unit price.
    fn column_mapping(self, default_unit_price: Option<f64>) -> ColumnMapping {
        let MappingRequest {
            time,
            performer,
            spend,
            sales,
            revenue,
        } = self.mapping;
        let revenue = match (revenue, self.unit_price.or(default_unit_price)) {
            (Some(column), _) => Some(RevenueSource::Column(column)),
            (None, Some(unit_price)) => Some(RevenueSource::Derived { unit_price }),
            (None, None) => None,
        };
        ColumnMapping {
            time,
            performer,
            spend,
            sales,
            revenue,
        }
    }
}

async fn prepare_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PrepareRequest>,
) -> Result<Json<PrepareResponse>, AppError> {
    let table = state.store.raw(&id)?;
    let mapping = request.column_mapping(state.config.default_unit_price);
    tracing::info!("Preparing dataset {} with {:?}", id, mapping);

    let dataset = sanitize_table(&table, &mapping, state.config.min_year)?;
    let dataset = state.store.insert_clean(&id, dataset);

    Ok(Json(PrepareResponse {
        dataset_id: id,
        report: dataset.report().clone(),
        rows_dropped: dataset.report().rows_dropped(),
        date_range: dataset.date_bounds(),
        hours: dataset.hours(),
        performers: dataset.performers(),
    }))
}

async fn report_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<Report>, AppError> {
    let dataset = state.store.clean(&id)?;

    let date_range = match (request.start, request.end, dataset.date_bounds()) {
        (None, None, _) => None,
        (Some(start), Some(end), _) => Some(DateRange::new(start, end)),
        (start, end, Some(bounds)) => Some(DateRange::new(
            start.unwrap_or(bounds.start),
            end.unwrap_or(bounds.end),
        )),
        (Some(day), None, None) | (None, Some(day), None) => Some(DateRange::single(day)),
    };

    let hours = match request.hours {
        Some(labels) => Choice::Only(
            labels
                .iter()
                .map(|label| label.parse::<HourBucket>())
                .collect::<Result<_, _>>()?,
        ),
        None => Choice::All,
    };
    let performers = match request.performers {
        Some(ids) => Choice::only(ids.into_iter().map(|id| id.trim().to_string())),
        None => Choice::All,
    };

    let query = ReportQuery {
        date_range,
        mode: request.mode,
        hours,
        performers,
        rank_by: request.rank_by,
        detail_limit: request.detail_limit,
    };
    tracing::debug!("Report query for {}: {:?}", id, query);

    Ok(Json(build_report(&dataset, &query)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app, config::Config};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const CSV: &str = "日期与时间,主播姓名,千川消耗,销售数量,销售额\n\
                       46023.25,Amy,100,2,\n\
                       2026-01-01 10:00,A,50,1,\n\
                       2026-01-01 14:00,B,50,5,\n\
                       2026-01-02 10:00,B,80,2,\n\
                       2026-01-02 11:00,C,0,3,\n\
                       1999-12-31 09:00,D,10,1,\n";

    async fn call(state: &Arc<AppState>, uri: &str, body: Body, json: bool) -> (StatusCode, Value) {
        let mut request = Request::post(uri);
        if json {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        let response = app(state.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(state: &Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
        call(state, uri, Body::from(body.to_string()), true).await
    }

    async fn prepared() -> (Arc<AppState>, String) {
        let state = Arc::new(AppState::new(Config::default()));
        let (status, body) = call(&state, "/sheets/inspect?filename=live.csv", Body::from(CSV), false).await;
        assert_eq!(status, StatusCode::OK);
        let id = body["dataset_id"].as_str().unwrap().to_string();

        let (status, body) = post_json(
            &state,
            &format!("/datasets/{}/prepare", id),
            json!({
                "mapping": {
                    "time": "日期与时间",
                    "performer": "主播姓名",
                    "spend": "千川消耗",
                    "sales": "销售数量"
                },
                "unit_price": 50.0
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["rows_read"], 6);
        assert_eq!(body["report"]["rows_kept"], 4);
        assert_eq!(body["report"]["non_positive_spend"], 1);
        assert_eq!(body["report"]["implausible_year"], 1);
        assert_eq!(body["rows_dropped"], 2);
        assert_eq!(body["date_range"]["start"], "2026-01-01");
        assert_eq!(body["hours"], json!(["6:00", "10:00", "14:00"]));
        assert_eq!(body["performers"], json!(["A", "Amy", "B"]));

        (state, id)
    }

    #[tokio::test]
    async fn test_upload_prepare_report() {
        let (state, id) = prepared().await;
        let (status, body) = post_json(
            &state,
            &format!("/datasets/{}/report", id),
            json!({ "performers": ["Amy"] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matched_rows"], 1);
        assert_eq!(body["rankings"][0]["performer_id"], "Amy");
        assert_eq!(body["rankings"][0]["total_revenue"], 100.0);
        assert_eq!(body["rankings"][0]["roi"], 1.0);
        assert_eq!(body["rankings"][0]["cost_per_sale"], 50.0);
        assert_eq!(body["rows"][0]["hour"], "6:00");
    }

    #[tokio::test]
    async fn test_hour_selection_narrows_performers() {
        let (state, id) = prepared().await;
        let (status, body) = post_json(
            &state,
            &format!("/datasets/{}/report", id),
            json!({ "start": "2026-01-01", "end": "2026-01-01", "hours": ["10:00"] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["legal_performers"], json!(["A"]));
        assert_eq!(body["matched_rows"], 1);
    }

    #[tokio::test]
    async fn test_empty_primary_selection() {
        let (state, id) = prepared().await;
        let (status, body) = post_json(
            &state,
            &format!("/datasets/{}/report", id),
            json!({ "mode": "performer_then_time", "performers": [] }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "SELECTION_REQUIRED");
        assert_eq!(body["dimension"], "performer");
    }

    #[tokio::test]
    async fn test_bad_hour_label() {
        let (state, id) = prepared().await;
        let (status, body) = post_json(
            &state,
            &format!("/datasets/{}/report", id),
            json!({ "hours": ["6:30"] }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "INVALID_SELECTION");
    }

    #[tokio::test]
    async fn test_period_without_data() {
        let (state, id) = prepared().await;
        let (status, body) = post_json(
            &state,
            &format!("/datasets/{}/report", id),
            json!({ "start": "2025-06-01", "end": "2025-06-30" }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "EMPTY_DATASET");
    }

    #[tokio::test]
    async fn test_unknown_dataset() {
        let state = Arc::new(AppState::new(Config::default()));
        let (status, body) = post_json(&state, "/datasets/ds_nope/report", json!({})).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_mapping_column() {
        let state = Arc::new(AppState::new(Config::default()));
        let (_, body) = call(&state, "/sheets/inspect?filename=live.csv", Body::from(CSV), false).await;
        let id = body["dataset_id"].as_str().unwrap();

        let (status, body) = post_json(
            &state,
            &format!("/datasets/{}/prepare", id),
            json!({
                "mapping": {
                    "time": "日期与时间",
                    "performer": "主播",
                    "spend": "千川消耗",
                    "sales": "销售数量",
                    "revenue": "销售额"
                }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "COLUMN_MAPPING");
        assert_eq!(body["role"], "performer");
    }

    #[test]
    fn test_revenue_column_wins_over_unit_price() {
        let request = PrepareRequest {
            mapping: MappingRequest {
                revenue: Some("销售额".into()),
                ..Default::default()
            },
            unit_price: Some(10.0),
        };
        assert_eq!(
            request.column_mapping(None).revenue,
            Some(RevenueSource::Column("销售额".into()))
        );

        let request = PrepareRequest {
            mapping: MappingRequest::default(),
            unit_price: None,
        };
        assert_eq!(
            request.column_mapping(Some(99.0)).revenue,
            Some(RevenueSource::Derived { unit_price: 99.0 })
        );
    }
}
