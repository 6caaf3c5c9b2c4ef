use chrono::{DateTime, Utc};

/// Optional filters for a course search. An absent field applies no
/// constraint; empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub keyword: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category: Option<String>,
    pub course_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
}

impl CourseFilter {
    pub fn keyword(&self) -> Option<&str> {
        non_empty(self.keyword.as_deref())
    }

    pub fn category(&self) -> Option<&str> {
        non_empty(self.category.as_deref())
    }

    pub fn course_type(&self) -> Option<&str> {
        non_empty(self.course_type.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    NextSessionDate,
}

impl Default for SortKey {
    fn default() -> Self {
        Self::NextSessionDate
    }
}

impl SortKey {
    /// Resolves the raw sort parameter case-insensitively. Anything other
    /// than "priceasc"/"pricedesc" falls back to the default session-date
    /// ordering rather than failing.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(str::to_lowercase).as_deref() {
            Some("priceasc") => Self::PriceAsc,
            Some("pricedesc") => Self::PriceDesc,
            _ => Self::NextSessionDate,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    /// Zero-based page number.
    pub page: usize,
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 10 }
    }
}

impl PageRequest {
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    pub fn limit(&self) -> usize {
        self.size
    }
}
