use std::sync::Arc;

use thiserror::Error;

use crate::config::AppConfig;
use crate::state::AppState;
use coursefinder_infra::search::{CourseIndex, CourseIndexError};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("course index error: {0}")]
    CourseIndex(#[from] CourseIndexError),
}

pub fn build_state(config: AppConfig) -> Result<AppState, WiringError> {
    let search = CourseIndex::open_or_create(&config.index_dir)?;
    Ok(AppState {
        config: Arc::new(config),
        search: Arc::new(search),
    })
}
