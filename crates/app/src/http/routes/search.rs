use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::state::AppState;
use coursefinder_core::domain::course::CourseSummary;
use coursefinder_core::domain::query::{CourseFilter, PageRequest, SortKey};
use coursefinder_core::error::CoreError;
use coursefinder_core::types::start_date::parse_start_date;
use coursefinder_infra::search::CourseIndexError;

const MAX_KEYWORD_LEN: usize = 256;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub course_type: Option<String>,
    pub start_date: Option<String>,
    pub sort: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub total: usize,
    pub courses: Vec<CourseSummary>,
}

#[derive(Debug, Error)]
pub enum SearchApiError {
    #[error("{0}")]
    StartDate(#[from] CoreError),
    #[error("keyword too long (max {0} chars)")]
    KeywordTooLong(usize),
    #[error("search failure: {0}")]
    Search(#[from] CourseIndexError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, SearchApiError> {
    let (filter, sort, page) = translate_params(params, state.config.max_page_size)?;
    debug!(?filter, ?sort, ?page, "course search");
    let outcome = state.search.search(&filter, sort, page)?;

    Ok(Json(SearchResponse {
        total: outcome.total,
        courses: outcome.courses,
    }))
}

/// Turns raw query parameters into the typed filter, sort key and page
/// window. Date parsing is the only thing that can fail here; everything
/// else falls back to defaults.
fn translate_params(
    params: SearchParams,
    max_page_size: usize,
) -> Result<(CourseFilter, SortKey, PageRequest), SearchApiError> {
    if let Some(keyword) = params.keyword.as_deref() {
        if keyword.chars().count() > MAX_KEYWORD_LEN {
            return Err(SearchApiError::KeywordTooLong(MAX_KEYWORD_LEN));
        }
    }

    let start_date = params
        .start_date
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(parse_start_date)
        .transpose()?;

    let filter = CourseFilter {
        keyword: params.keyword,
        min_age: params.min_age,
        max_age: params.max_age,
        min_price: params.min_price,
        max_price: params.max_price,
        category: params.category,
        course_type: params.course_type,
        start_date,
    };
    let sort = SortKey::resolve(params.sort.as_deref());
    let defaults = PageRequest::default();
    let page = PageRequest {
        page: params.page.unwrap_or(defaults.page),
        size: params.size.unwrap_or(defaults.size).clamp(1, max_page_size),
    };

    Ok((filter, sort, page))
}

impl IntoResponse for SearchApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            SearchApiError::StartDate(_) | SearchApiError::KeywordTooLong(_) => {
                StatusCode::BAD_REQUEST
            }
            SearchApiError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
