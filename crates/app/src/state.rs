use std::sync::Arc;

use crate::config::AppConfig;
use coursefinder_infra::search::CourseIndex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub search: Arc<CourseIndex>,
}
