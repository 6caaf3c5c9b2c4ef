use thiserror::Error;
use tracing::info;

use crate::state::AppState;
use coursefinder_core::domain::course::CourseDocument;
use coursefinder_infra::search::CourseIndexError;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("seed parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("course index error: {0}")]
    Index(#[from] CourseIndexError),
}

/// Bulk-loads the configured seed file into the index. Courses are keyed by
/// id, so re-running against an already-loaded index is a no-op in effect.
pub fn load_seed_courses(state: &AppState) -> Result<usize, LoaderError> {
    let Some(path) = state.config.seed_path.as_deref() else {
        info!("no seed file configured; skipping course load");
        return Ok(0);
    };
    let contents = std::fs::read_to_string(path)?;
    let courses: Vec<CourseDocument> = serde_json::from_str(&contents)?;
    state.search.upsert_courses(&courses)?;
    info!(count = courses.len(), path = %path.display(), "seed courses indexed");
    Ok(courses.len())
}
