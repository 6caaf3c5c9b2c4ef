pub mod course;
pub mod query;
