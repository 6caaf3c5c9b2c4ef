use std::ops::Bound;
use std::path::Path;

use chrono::{DateTime, Utc};
use coursefinder_core::domain::course::{CourseDocument, CourseSummary, SearchOutcome};
use coursefinder_core::domain::query::{CourseFilter, PageRequest, SortKey};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, RangeQuery, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, SchemaBuilder, Value, FAST, INDEXED, STORED, STRING, TEXT,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{DocAddress, Index, IndexReader, Order, ReloadPolicy, TantivyDocument, Term};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourseIndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),
    #[error("missing field in schema: {0}")]
    MissingField(&'static str),
    #[error("missing stored value: {0}")]
    MissingValue(&'static str),
    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(&'static str),
}

#[derive(Debug, Clone)]
struct CourseFields {
    id: Field,
    title: Field,
    description: Field,
    category: Field,
    course_type: Field,
    grade_range: Field,
    min_age: Field,
    max_age: Field,
    price: Field,
    next_session_date: Field,
}

/// The course search index. Holds one tantivy index whose documents follow
/// the `courses` schema; all query building, sorting and pagination for the
/// search endpoint happens here.
pub struct CourseIndex {
    index: Index,
    reader: IndexReader,
    fields: CourseFields,
}

impl CourseIndex {
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, CourseIndexError> {
        let dir = path.as_ref();
        std::fs::create_dir_all(dir)?;

        let schema = build_schema();
        let index = if dir.join("meta.json").exists() {
            Index::open_in_dir(dir)?
        } else {
            Index::create_in_dir(dir, schema)?
        };
        Self::from_index(index)
    }

    fn from_index(index: Index) -> Result<Self, CourseIndexError> {
        let schema = index.schema();
        let fields = CourseFields::from_schema(&schema)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Runs one course search: builds the conjunctive query from the filter,
    /// counts the full match set, and collects the requested page in the
    /// resolved sort order.
    pub fn search(
        &self,
        filter: &CourseFilter,
        sort: SortKey,
        page: PageRequest,
    ) -> Result<SearchOutcome, CourseIndexError> {
        let searcher = self.reader.searcher();
        let query = build_query(&self.index, &self.fields, filter)?;

        let total = searcher.search(&query, &Count)?;

        let offset = page.offset();
        let window = page.limit().saturating_add(offset).max(1);
        let addresses: Vec<DocAddress> = match sort {
            SortKey::PriceAsc => searcher
                .search(
                    &query,
                    &TopDocs::with_limit(window).order_by_fast_field::<f64>("price", Order::Asc),
                )?
                .into_iter()
                .map(|(_, address)| address)
                .collect(),
            SortKey::PriceDesc => searcher
                .search(
                    &query,
                    &TopDocs::with_limit(window).order_by_fast_field::<f64>("price", Order::Desc),
                )?
                .into_iter()
                .map(|(_, address)| address)
                .collect(),
            SortKey::NextSessionDate => searcher
                .search(
                    &query,
                    &TopDocs::with_limit(window)
                        .order_by_fast_field::<i64>("nextSessionDate", Order::Asc),
                )?
                .into_iter()
                .map(|(_, address)| address)
                .collect(),
        };

        let mut courses = Vec::new();
        for address in addresses.into_iter().skip(offset).take(page.limit()) {
            let doc: TantivyDocument = searcher.doc(address)?;
            courses.push(self.document_to_summary(&doc)?);
        }

        Ok(SearchOutcome { total, courses })
    }

    /// Bulk upsert, keyed by id: an existing document with the same id is
    /// replaced rather than duplicated. One commit for the whole batch.
    pub fn upsert_courses(&self, courses: &[CourseDocument]) -> Result<(), CourseIndexError> {
        let mut writer = self.index.writer::<TantivyDocument>(50_000_000)?;
        for course in courses {
            writer.delete_term(Term::from_field_text(self.fields.id, &course.id));
            writer.add_document(self.course_to_document(course))?;
        }
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn delete_all(&self) -> Result<(), CourseIndexError> {
        let mut writer = self.index.writer::<TantivyDocument>(50_000_000)?;
        writer.delete_all_documents()?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn num_docs(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }

    fn course_to_document(&self, course: &CourseDocument) -> TantivyDocument {
        let mut document = TantivyDocument::default();
        document.add_text(self.fields.id, &course.id);
        document.add_text(self.fields.title, &course.title);
        document.add_text(self.fields.description, &course.description);
        document.add_text(self.fields.category, &course.category);
        document.add_text(self.fields.course_type, &course.course_type);
        document.add_text(self.fields.grade_range, &course.grade_range);
        document.add_i64(self.fields.min_age, course.min_age);
        document.add_i64(self.fields.max_age, course.max_age);
        document.add_f64(self.fields.price, course.price);
        document.add_i64(
            self.fields.next_session_date,
            course.next_session_date.timestamp(),
        );
        document
    }

    fn document_to_summary(&self, doc: &TantivyDocument) -> Result<CourseSummary, CourseIndexError> {
        let id = get_string(doc, self.fields.id).ok_or(CourseIndexError::MissingValue("id"))?;
        let title =
            get_string(doc, self.fields.title).ok_or(CourseIndexError::MissingValue("title"))?;
        let category = get_string(doc, self.fields.category)
            .ok_or(CourseIndexError::MissingValue("category"))?;
        let course_type = get_string(doc, self.fields.course_type)
            .ok_or(CourseIndexError::MissingValue("type"))?;
        let price =
            get_f64(doc, self.fields.price).ok_or(CourseIndexError::MissingValue("price"))?;
        let next_session = get_i64(doc, self.fields.next_session_date)
            .ok_or(CourseIndexError::MissingValue("nextSessionDate"))?;

        Ok(CourseSummary {
            id,
            title,
            category,
            course_type,
            price,
            next_session_date: timestamp_to_datetime(next_session, "nextSessionDate")?,
        })
    }
}

impl CourseFields {
    fn from_schema(schema: &Schema) -> Result<Self, CourseIndexError> {
        Ok(Self {
            id: schema
                .get_field("id")
                .map_err(|_| CourseIndexError::MissingField("id"))?,
            title: schema
                .get_field("title")
                .map_err(|_| CourseIndexError::MissingField("title"))?,
            description: schema
                .get_field("description")
                .map_err(|_| CourseIndexError::MissingField("description"))?,
            category: schema
                .get_field("category")
                .map_err(|_| CourseIndexError::MissingField("category"))?,
            course_type: schema
                .get_field("type")
                .map_err(|_| CourseIndexError::MissingField("type"))?,
            grade_range: schema
                .get_field("gradeRange")
                .map_err(|_| CourseIndexError::MissingField("gradeRange"))?,
            min_age: schema
                .get_field("minAge")
                .map_err(|_| CourseIndexError::MissingField("minAge"))?,
            max_age: schema
                .get_field("maxAge")
                .map_err(|_| CourseIndexError::MissingField("maxAge"))?,
            price: schema
                .get_field("price")
                .map_err(|_| CourseIndexError::MissingField("price"))?,
            next_session_date: schema
                .get_field("nextSessionDate")
                .map_err(|_| CourseIndexError::MissingField("nextSessionDate"))?,
        })
    }
}

fn build_schema() -> Schema {
    let mut builder = SchemaBuilder::default();
    builder.add_text_field("id", STRING | STORED);
    builder.add_text_field("title", TEXT | STORED);
    builder.add_text_field("description", TEXT);
    builder.add_text_field("category", STRING | STORED);
    builder.add_text_field("type", STRING | STORED);
    builder.add_text_field("gradeRange", STRING | STORED);
    builder.add_i64_field("minAge", INDEXED | FAST);
    builder.add_i64_field("maxAge", INDEXED | FAST);
    builder.add_f64_field("price", INDEXED | STORED | FAST);
    builder.add_i64_field("nextSessionDate", INDEXED | STORED | FAST);
    builder.build()
}

/// Builds the conjunctive query for a filter set. Each present filter
/// contributes one clause; absent or empty filters contribute nothing, so an
/// unfiltered request matches every document. Scores are never used for
/// ordering (sorting is by field), so Must doubles as a filter clause.
fn build_query(
    index: &Index,
    fields: &CourseFields,
    filter: &CourseFilter,
) -> Result<Box<dyn Query>, CourseIndexError> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

    if let Some(keyword) = filter.keyword() {
        if let Some(keyword_query) = build_keyword_query(index, fields, keyword)? {
            clauses.push((Occur::Must, keyword_query));
        }
    }

    if let Some(min_age) = filter.min_age {
        clauses.push((
            Occur::Must,
            Box::new(RangeQuery::new(
                Bound::Included(Term::from_field_i64(fields.min_age, min_age)),
                Bound::Unbounded,
            )),
        ));
    }

    if let Some(max_age) = filter.max_age {
        clauses.push((
            Occur::Must,
            Box::new(RangeQuery::new(
                Bound::Unbounded,
                Bound::Included(Term::from_field_i64(fields.max_age, max_age)),
            )),
        ));
    }

    if let Some(min_price) = filter.min_price {
        clauses.push((
            Occur::Must,
            Box::new(RangeQuery::new(
                Bound::Included(Term::from_field_f64(fields.price, min_price)),
                Bound::Unbounded,
            )),
        ));
    }

    if let Some(max_price) = filter.max_price {
        clauses.push((
            Occur::Must,
            Box::new(RangeQuery::new(
                Bound::Unbounded,
                Bound::Included(Term::from_field_f64(fields.price, max_price)),
            )),
        ));
    }

    if let Some(category) = filter.category() {
        let term = Term::from_field_text(fields.category, category);
        clauses.push((
            Occur::Must,
            Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
        ));
    }

    if let Some(course_type) = filter.course_type() {
        let term = Term::from_field_text(fields.course_type, course_type);
        clauses.push((
            Occur::Must,
            Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
        ));
    }

    if let Some(start_date) = filter.start_date {
        clauses.push((
            Occur::Must,
            Box::new(RangeQuery::new(
                Bound::Included(Term::from_field_i64(
                    fields.next_session_date,
                    start_date.timestamp(),
                )),
                Bound::Unbounded,
            )),
        ));
    }

    if clauses.is_empty() {
        Ok(Box::new(AllQuery))
    } else {
        Ok(Box::new(BooleanQuery::from(clauses)))
    }
}

/// Full-text clause for the keyword: the text is tokenized with the title
/// field's analyzer and each token becomes a Should term over title and
/// description. The keyword is always literal text, never query syntax, so
/// field overrides or stray quotes cannot reach other fields or fail the
/// query. A keyword with no tokens contributes no clause.
fn build_keyword_query(
    index: &Index,
    fields: &CourseFields,
    keyword: &str,
) -> Result<Option<Box<dyn Query>>, CourseIndexError> {
    let mut analyzer = index.tokenizer_for_field(fields.title)?;
    let mut terms: Vec<(Occur, Box<dyn Query>)> = Vec::new();
    let mut stream = analyzer.token_stream(keyword);
    stream.process(&mut |token| {
        for field in [fields.title, fields.description] {
            let term = Term::from_field_text(field, &token.text);
            terms.push((
                Occur::Should,
                Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
            ));
        }
    });
    if terms.is_empty() {
        return Ok(None);
    }
    Ok(Some(Box::new(BooleanQuery::from(terms))))
}

fn get_string(doc: &TantivyDocument, field: Field) -> Option<String> {
    doc.get_first(field)?.as_str().map(|val| val.to_string())
}

fn get_i64(doc: &TantivyDocument, field: Field) -> Option<i64> {
    doc.get_first(field)?.as_i64()
}

fn get_f64(doc: &TantivyDocument, field: Field) -> Option<f64> {
    doc.get_first(field)?.as_f64()
}

fn timestamp_to_datetime(ts: i64, field: &'static str) -> Result<DateTime<Utc>, CourseIndexError> {
    DateTime::<Utc>::from_timestamp(ts, 0).ok_or(CourseIndexError::InvalidTimestamp(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn course(
        id: &str,
        title: &str,
        description: &str,
        category: &str,
        course_type: &str,
        min_age: i64,
        max_age: i64,
        price: f64,
        session_day: u32,
    ) -> CourseDocument {
        CourseDocument {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            course_type: course_type.to_string(),
            grade_range: "3-5".to_string(),
            min_age,
            max_age,
            price,
            next_session_date: Utc.with_ymd_and_hms(2025, 7, session_day, 10, 0, 0).unwrap(),
        }
    }

    // A(price=10, age 5-10, Math), B(price=20, age 8-12, Math),
    // C(price=15, age 5-9, Science); session order A < C < B.
    fn seeded_index() -> CourseIndex {
        let index = Index::create_in_ram(build_schema());
        let course_index = CourseIndex::from_index(index).unwrap();
        course_index
            .upsert_courses(&[
                course("A", "Algebra Basics", "Intro to equations", "Math", "COURSE", 5, 10, 10.0, 1),
                course("B", "Advanced Geometry", "Proofs and shapes", "Math", "COURSE", 8, 12, 20.0, 15),
                course("C", "Chemistry Club", "Weekly experiments with magnets", "Science", "CLUB", 5, 9, 15.0, 10),
            ])
            .unwrap();
        course_index
    }

    fn ids(outcome: &SearchOutcome) -> Vec<&str> {
        outcome.courses.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn no_filters_matches_all_in_session_date_order() {
        let index = seeded_index();
        let outcome = index
            .search(&CourseFilter::default(), SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 3);
        assert_eq!(ids(&outcome), vec!["A", "C", "B"]);
    }

    #[test]
    fn min_age_bound_filters_lower_starts() {
        let index = seeded_index();
        let filter = CourseFilter {
            min_age: Some(6),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 1);
        assert_eq!(ids(&outcome), vec!["B"]);
    }

    #[test]
    fn max_age_bound_filters_higher_ends() {
        let index = seeded_index();
        let filter = CourseFilter {
            max_age: Some(10),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(ids(&outcome), vec!["A", "C"]);
    }

    #[test]
    fn both_age_bounds_apply_together() {
        let index = seeded_index();
        let filter = CourseFilter {
            min_age: Some(6),
            max_age: Some(12),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["B"]);
    }

    #[test]
    fn inverted_age_bounds_return_empty_not_error() {
        let index = seeded_index();
        let filter = CourseFilter {
            min_age: Some(9),
            max_age: Some(5),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 0);
        assert!(outcome.courses.is_empty());
    }

    #[test]
    fn price_bounds_filter_by_price() {
        let index = seeded_index();
        let filter = CourseFilter {
            min_price: Some(12.0),
            max_price: Some(18.0),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["C"]);
    }

    #[test]
    fn price_sort_ascending_and_descending() {
        let index = seeded_index();
        let asc = index
            .search(&CourseFilter::default(), SortKey::PriceAsc, PageRequest::default())
            .unwrap();
        assert_eq!(ids(&asc), vec!["A", "C", "B"]);

        let desc = index
            .search(&CourseFilter::default(), SortKey::PriceDesc, PageRequest::default())
            .unwrap();
        assert_eq!(ids(&desc), vec!["B", "C", "A"]);
    }

    #[test]
    fn category_filter_with_price_sort_scenario() {
        let index = seeded_index();
        let filter = CourseFilter {
            category: Some("Math".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::PriceAsc, PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(ids(&outcome), vec!["A", "B"]);
    }

    #[test]
    fn type_filter_exact_match() {
        let index = seeded_index();
        let filter = CourseFilter {
            course_type: Some("CLUB".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["C"]);
    }

    #[test]
    fn keyword_matches_title_and_description() {
        let index = seeded_index();
        let by_description = CourseFilter {
            keyword: Some("magnets".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&by_description, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["C"]);

        let by_title = CourseFilter {
            keyword: Some("geometry".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&by_title, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["B"]);
    }

    #[test]
    fn keyword_with_field_syntax_is_taken_literally() {
        let index = seeded_index();
        // "category:Science" must not become a filter on the category field;
        // as literal text it matches no title or description.
        let filter = CourseFilter {
            keyword: Some("category:Science".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 0);
    }

    #[test]
    fn keyword_with_unbalanced_quote_does_not_error() {
        let index = seeded_index();
        let filter = CourseFilter {
            keyword: Some("\"unbalanced".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 0);

        let quoted_match = CourseFilter {
            keyword: Some("\"geometry".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&quoted_match, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["B"]);
    }

    #[test]
    fn multi_word_keyword_matches_any_token() {
        let index = seeded_index();
        let filter = CourseFilter {
            keyword: Some("algebra magnets".to_string()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["A", "C"]);
    }

    #[test]
    fn empty_keyword_applies_no_constraint() {
        let index = seeded_index();
        let filter = CourseFilter {
            keyword: Some(String::new()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(outcome.total, 3);
    }

    #[test]
    fn start_date_keeps_sessions_on_or_after() {
        let index = seeded_index();
        let filter = CourseFilter {
            start_date: Some(Utc.with_ymd_and_hms(2025, 7, 5, 0, 0, 0).unwrap()),
            ..CourseFilter::default()
        };
        let outcome = index
            .search(&filter, SortKey::default(), PageRequest::default())
            .unwrap();
        assert_eq!(ids(&outcome), vec!["C", "B"]);
    }

    #[test]
    fn pagination_windows_with_invariant_total() {
        let index = seeded_index();
        let mut seen = Vec::new();
        for page in 0..3 {
            let outcome = index
                .search(
                    &CourseFilter::default(),
                    SortKey::default(),
                    PageRequest { page, size: 1 },
                )
                .unwrap();
            assert_eq!(outcome.total, 3);
            assert_eq!(outcome.courses.len(), 1);
            seen.push(outcome.courses[0].id.clone());
        }
        assert_eq!(seen, vec!["A", "C", "B"]);

        let past_end = index
            .search(
                &CourseFilter::default(),
                SortKey::default(),
                PageRequest { page: 3, size: 1 },
            )
            .unwrap();
        assert_eq!(past_end.total, 3);
        assert!(past_end.courses.is_empty());
    }

    #[test]
    fn identical_requests_yield_identical_outcomes() {
        let index = seeded_index();
        let filter = CourseFilter {
            category: Some("Math".to_string()),
            ..CourseFilter::default()
        };
        let first = index
            .search(&filter, SortKey::PriceAsc, PageRequest::default())
            .unwrap();
        let second = index
            .search(&filter, SortKey::PriceAsc, PageRequest::default())
            .unwrap();
        assert_eq!(first.total, second.total);
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn upsert_replaces_by_id() {
        let index = seeded_index();
        index
            .upsert_courses(&[course(
                "A",
                "Algebra Basics II",
                "More equations",
                "Math",
                "COURSE",
                5,
                10,
                11.0,
                2,
            )])
            .unwrap();
        assert_eq!(index.num_docs(), 3);

        let outcome = index
            .search(&CourseFilter::default(), SortKey::PriceAsc, PageRequest::default())
            .unwrap();
        let updated = outcome.courses.iter().find(|c| c.id == "A").unwrap();
        assert_eq!(updated.title, "Algebra Basics II");
        assert_eq!(updated.price, 11.0);
    }

    #[test]
    fn summary_drops_unprojected_fields() {
        let index = seeded_index();
        let outcome = index
            .search(&CourseFilter::default(), SortKey::default(), PageRequest { page: 0, size: 1 })
            .unwrap();
        let summary = &outcome.courses[0];
        assert_eq!(summary.id, "A");
        assert_eq!(summary.category, "Math");
        assert_eq!(summary.course_type, "COURSE");
        assert_eq!(
            summary.next_session_date,
            Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap()
        );
    }
}
