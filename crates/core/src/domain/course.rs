use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course record as it lives in the search index. Field names follow the
/// index schema (camelCase in JSON; `type` maps to `course_type`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDocument {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub grade_range: String,
    pub min_age: i64,
    pub max_age: i64,
    pub price: f64,
    pub next_session_date: DateTime<Utc>,
}

/// The reduced projection returned to callers: description, gradeRange and the
/// age bounds are dropped from the response shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub price: f64,
    pub next_session_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Count over the full filtered set, independent of the page window.
    pub total: usize,
    pub courses: Vec<CourseSummary>,
}
