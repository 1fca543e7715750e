//! Pagination integration tests
//!
//! Page through collections the way a client would:
//! - Forward and backward traversal with and without a sort
//! - Completeness and no overlap across pages (property test)
//! - Deterministic tie-breaking
//! - Cursor tokens round-trip every sort value type (property test)
//! - Rejected cursors and page sizes

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use exemplar_core::{
    CollectionId, Error, ExampleId, Payload, RevisionKind, SortDirection, SortValue,
    SortValueType, Timestamp,
};
use exemplar_engine::{
    Cursor, Database, ExampleSortKey, ExampleState, Page, PageQuery, SortSpec, TimeRange,
    VersionBound,
};
use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};

// ============================================================================
// Helpers
// ============================================================================

fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(1_716_854_400 + secs)
}

/// Collection of examples with `input.score` set from `scores`
fn scored_dataset(scores: &[Option<i64>]) -> (Arc<Database>, CollectionId, Vec<ExampleId>) {
    let db = Database::ephemeral();
    let c = db.create_collection("scored", None, json!({})).unwrap();
    if scores.is_empty() {
        return (db, c, Vec::new());
    }
    let payloads = scores
        .iter()
        .map(|score| {
            let input = match score {
                Some(n) => json!({ "score": n }),
                None => json!({}),
            };
            Payload::new(input, json!({}), json!({}))
        })
        .collect();
    let (_, ids) = db.insert_examples(c, None, payloads).unwrap();
    (db, c, ids)
}

fn score_sort(direction: SortDirection) -> SortSpec {
    SortSpec::new(ExampleSortKey::input("score", SortValueType::Int), direction)
}

fn ids(page: &Page<ExampleState>) -> Vec<ExampleId> {
    page.nodes().map(|s| s.example_id).collect()
}

fn score_of(state: &ExampleState) -> Option<i64> {
    state.input.get("score").and_then(JsonValue::as_i64)
}

fn with_sort(query: PageQuery, sort: &Option<SortSpec>) -> PageQuery {
    match sort {
        Some(spec) => query.sort(spec.clone()),
        None => query,
    }
}

/// Walk every page front to back
fn walk_forward(
    db: &Database,
    c: CollectionId,
    sort: &Option<SortSpec>,
    size: usize,
) -> Vec<ExampleId> {
    let mut seen = Vec::new();
    let mut query = with_sort(PageQuery::first(size), sort);
    loop {
        let page = db.fetch_page(c, VersionBound::Latest, &query).unwrap();
        assert!(page.len() <= size);
        seen.extend(ids(&page));
        if !page.has_next_page {
            break;
        }
        let end = page.end_cursor.expect("non-empty page has an end cursor");
        query = with_sort(PageQuery::after(size, end), sort);
    }
    seen
}

/// Walk every page back to front, returning rows in query order
fn walk_backward(
    db: &Database,
    c: CollectionId,
    sort: &Option<SortSpec>,
    size: usize,
) -> Vec<ExampleId> {
    let mut pages: Vec<Vec<ExampleId>> = Vec::new();
    let mut query = with_sort(PageQuery::last(size), sort);
    loop {
        let page = db.fetch_page(c, VersionBound::Latest, &query).unwrap();
        assert!(page.len() <= size);
        pages.push(ids(&page));
        if !page.has_previous_page {
            break;
        }
        let start = page.start_cursor.expect("non-empty page has a start cursor");
        query = with_sort(PageQuery::before(size, start), sort);
    }
    pages.into_iter().rev().flatten().collect()
}

/// Order a client should see: descending id unsorted; otherwise
/// `(score, id)` with nulls lowest, flipped for descending
fn expected_order(
    ids: &[ExampleId],
    scores: &[Option<i64>],
    direction: Option<SortDirection>,
) -> Vec<ExampleId> {
    let mut rows: Vec<(Option<i64>, ExampleId)> =
        scores.iter().copied().zip(ids.iter().copied()).collect();
    rows.sort_by(|a, b| match direction {
        None => b.1.cmp(&a.1),
        Some(SortDirection::Ascending) => a.cmp(b),
        Some(SortDirection::Descending) => b.cmp(a),
    });
    rows.into_iter().map(|(_, id)| id).collect()
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_five_examples_two_per_page() {
    let (db, c, inserted) = scored_dataset(&[Some(1); 5]);

    let first = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::first(2))
        .unwrap();
    assert_eq!(ids(&first), vec![inserted[4], inserted[3]]);
    assert!(first.has_next_page);
    assert!(!first.has_previous_page);

    let second = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::after(2, first.end_cursor.clone().unwrap()),
        )
        .unwrap();
    assert_eq!(ids(&second), vec![inserted[2], inserted[1]]);
    assert!(second.has_next_page);

    let third = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::after(2, second.end_cursor.clone().unwrap()),
        )
        .unwrap();
    assert_eq!(ids(&third), vec![inserted[0]]);
    assert!(!third.has_next_page);
}

#[test]
fn test_edge_cursors_name_their_rows() {
    let (db, c, _) = scored_dataset(&[Some(3), None, Some(7)]);
    let page = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::first(10).sort(score_sort(SortDirection::Descending)),
        )
        .unwrap();

    for edge in &page.edges {
        let cursor = Cursor::decode(&edge.cursor).unwrap();
        assert_eq!(cursor.row, edge.node.example_id.as_u64());
        let sort = cursor.sort.unwrap();
        assert_eq!(sort.value_type, SortValueType::Int);
        assert_eq!(sort.value, score_of(&edge.node).map(SortValue::Int));
    }
    assert_eq!(page.start_cursor.as_ref(), page.edges.first().map(|e| &e.cursor));
    assert_eq!(page.end_cursor.as_ref(), page.edges.last().map(|e| &e.cursor));
}

#[test]
fn test_ties_break_on_example_id() {
    let (db, c, inserted) = scored_dataset(&[Some(1), Some(2), Some(1), None, Some(1)]);

    let asc = walk_forward(&db, c, &Some(score_sort(SortDirection::Ascending)), 2);
    assert_eq!(
        asc,
        vec![inserted[3], inserted[0], inserted[2], inserted[4], inserted[1]]
    );

    let desc = walk_forward(&db, c, &Some(score_sort(SortDirection::Descending)), 2);
    assert_eq!(
        desc,
        vec![inserted[1], inserted[4], inserted[2], inserted[0], inserted[3]]
    );

    // Same query twice, same answer
    assert_eq!(
        walk_forward(&db, c, &Some(score_sort(SortDirection::Descending)), 2),
        desc
    );
}

#[test]
fn test_sort_by_updated_at() {
    let db = Database::ephemeral();
    let c = db.create_collection("dated", None, json!({})).unwrap();
    let mut examples = Vec::new();
    for secs in 1..=4 {
        let e = db.create_example(c).unwrap();
        let v = db.create_version_at(c, None, json!({}), at(secs)).unwrap();
        db.append_revision_at(v, e, RevisionKind::Create, Payload::empty())
            .unwrap();
        examples.push(e);
    }
    // Touching the oldest example makes it the most recently updated
    let v = db.create_version_at(c, None, json!({}), at(10)).unwrap();
    db.append_revision_at(v, examples[0], RevisionKind::Patch, Payload::empty())
        .unwrap();

    let sort = Some(SortSpec::descending(ExampleSortKey::UpdatedAt));
    assert_eq!(
        walk_forward(&db, c, &sort, 3),
        vec![examples[0], examples[3], examples[2], examples[1]]
    );
    assert_eq!(walk_backward(&db, c, &sort, 3), walk_forward(&db, c, &sort, 3));
}

#[test]
fn test_pages_at_an_earlier_version() {
    let (db, c, inserted) = scored_dataset(&[Some(1), Some(2)]);
    let before = db.latest_version(c).unwrap().unwrap();
    db.append_revision(c, inserted[1], RevisionKind::Delete, Payload::empty())
        .unwrap();

    let now = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::first(5))
        .unwrap();
    assert_eq!(ids(&now), vec![inserted[0]]);

    let then = db
        .fetch_page(c, before.id, &PageQuery::first(5))
        .unwrap();
    assert_eq!(ids(&then), vec![inserted[1], inserted[0]]);
}

#[test]
fn test_filter_applies_before_paging() {
    let db = Database::ephemeral();
    let c = db.create_collection("windowed", None, json!({})).unwrap();
    let mut examples = Vec::new();
    for secs in 1..=6 {
        let e = db.create_example(c).unwrap();
        let v = db.create_version_at(c, None, json!({}), at(secs)).unwrap();
        db.append_revision_at(v, e, RevisionKind::Create, Payload::empty())
            .unwrap();
        examples.push(e);
    }

    let window = TimeRange::new(at(2), at(5));
    let first = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::first(2).filter(window))
        .unwrap();
    assert_eq!(ids(&first), vec![examples[3], examples[2]]);
    assert!(first.has_next_page);

    let rest = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::after(2, first.end_cursor.unwrap()).filter(window),
        )
        .unwrap();
    assert_eq!(ids(&rest), vec![examples[1]]);
    assert!(!rest.has_next_page);

    let odd = move |row: &ExampleState| row.example_id.as_u64() % 2 == 1;
    let page = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::first(10).filter(odd))
        .unwrap();
    assert!(page.nodes().all(|s| s.example_id.as_u64() % 2 == 1));
    assert_eq!(page.len(), 3);
}

#[test]
fn test_default_page_size_from_config() {
    let (db, c, _) = scored_dataset(&vec![None; 60]);
    let page = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::default())
        .unwrap();
    assert_eq!(page.len(), db.config().default_page_size);
    assert!(page.has_next_page);
}

#[test]
fn test_list_versions_newest_first() {
    let db = Database::ephemeral();
    let c = db.create_collection("versions", None, json!({})).unwrap();
    let versions: Vec<_> = (1..=5)
        .map(|secs| db.create_version_at(c, None, json!({}), at(secs)).unwrap())
        .collect();

    let first = db.list_versions(c, Some(2), None).unwrap();
    let got: Vec<_> = first.nodes().map(|v| v.id).collect();
    assert_eq!(got, vec![versions[4], versions[3]]);
    assert!(first.has_next_page);

    let rest = db
        .list_versions(c, Some(10), first.end_cursor.as_deref())
        .unwrap();
    let got: Vec<_> = rest.nodes().map(|v| v.id).collect();
    assert_eq!(got, vec![versions[2], versions[1], versions[0]]);
    assert!(!rest.has_next_page);
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_garbage_cursor_is_malformed() {
    let (db, c, _) = scored_dataset(&[Some(1), Some(2)]);
    for token in ["not-a-real-cursor", "", "!!!!", "eyJyb3ciOiJ4In0"] {
        let err = db
            .fetch_page(c, VersionBound::Latest, &PageQuery::after(2, token))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedCursor { .. }), "{token}: {err:?}");
    }
}

#[test]
fn test_cursor_from_another_sort_is_rejected() {
    let (db, c, _) = scored_dataset(&[Some(1), Some(2), Some(3)]);

    let unsorted = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::first(1))
        .unwrap();
    let token = unsorted.end_cursor.unwrap();
    let err = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::after(1, token).sort(score_sort(SortDirection::Ascending)),
        )
        .unwrap_err();
    assert!(matches!(err, Error::CursorSortMismatch { .. }));

    let sorted = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::first(1).sort(score_sort(SortDirection::Ascending)),
        )
        .unwrap();
    let token = sorted.end_cursor.unwrap();
    let err = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::after(1, token.clone()))
        .unwrap_err();
    assert!(matches!(err, Error::CursorSortMismatch { .. }));

    let float_sort = SortSpec::ascending(ExampleSortKey::input("score", SortValueType::Float));
    let err = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::after(1, token).sort(float_sort),
        )
        .unwrap_err();
    assert!(matches!(err, Error::CursorSortMismatch { .. }));
}

#[test]
fn test_cursor_of_same_typed_sort_positions_by_value() {
    let (db, c, inserted) = scored_dataset(&[Some(30), Some(10), Some(20)]);

    let by_score = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::first(1).sort(score_sort(SortDirection::Ascending)),
        )
        .unwrap();
    assert_eq!(ids(&by_score), vec![inserted[1]]);
    let token = by_score.end_cursor.unwrap();

    // Same INT tag, other expression: the cursor's (10, row) pair is kept
    // as the anchor, and every id sorts below a value of 10
    let by_id = db
        .fetch_page(
            c,
            VersionBound::Latest,
            &PageQuery::after(5, token).sort(SortSpec::descending(ExampleSortKey::Id)),
        )
        .unwrap();
    assert_eq!(ids(&by_id), vec![inserted[2], inserted[1], inserted[0]]);
}

#[test]
fn test_page_size_bounds() {
    let (db, c, _) = scored_dataset(&[Some(1)]);
    let max = db.config().max_page_size;

    let err = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::first(0))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));

    let err = db
        .fetch_page(c, VersionBound::Latest, &PageQuery::first(max + 1))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));

    assert_eq!(
        db.fetch_page(c, VersionBound::Latest, &PageQuery::first(max))
            .unwrap()
            .len(),
        1
    );
}

// ============================================================================
// Properties
// ============================================================================

fn arb_sort() -> impl Strategy<Value = Option<SortDirection>> {
    prop_oneof![
        Just(None),
        Just(Some(SortDirection::Ascending)),
        Just(Some(SortDirection::Descending)),
    ]
}

fn arb_sort_value() -> impl Strategy<Value = SortValue> {
    prop_oneof![
        any::<i64>().prop_map(SortValue::Int),
        // Dyadic rationals survive a JSON round trip exactly
        (-1_000_000i64..1_000_000).prop_map(|n| SortValue::Float(n as f64 / 8.0)),
        Just(SortValue::Float(f64::NAN)),
        Just(SortValue::Float(f64::INFINITY)),
        Just(SortValue::Float(f64::NEG_INFINITY)),
        ".*".prop_map(SortValue::Text),
        // Years 1970 through 2099
        (0u64..4_102_444_800_000_000)
            .prop_map(|micros| SortValue::Timestamp(Timestamp::from_micros(micros))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Paging forward or backward visits every row exactly once, in query
    /// order, whatever the page size.
    #[test]
    fn pages_cover_everything_once(
        scores in prop::collection::vec(prop::option::of(0i64..4), 0..25),
        direction in arb_sort(),
        size in 1usize..7,
    ) {
        let (db, c, inserted) = scored_dataset(&scores);
        let sort = direction.map(score_sort);

        let forward = walk_forward(&db, c, &sort, size);
        let unique: HashSet<ExampleId> = forward.iter().copied().collect();
        prop_assert_eq!(unique.len(), forward.len());
        prop_assert_eq!(&forward, &expected_order(&inserted, &scores, direction));

        let backward = walk_backward(&db, c, &sort, size);
        prop_assert_eq!(&backward, &forward);
    }

    /// Rows with equal sort values come back in the same order every time,
    /// ordered by id in the sort's direction.
    #[test]
    fn ties_are_deterministic(
        n in 1usize..15,
        direction in prop_oneof![Just(SortDirection::Ascending), Just(SortDirection::Descending)],
        size in 1usize..5,
    ) {
        let (db, c, inserted) = scored_dataset(&vec![Some(9); n]);
        let sort = Some(score_sort(direction));
        let first = walk_forward(&db, c, &sort, size);
        let second = walk_forward(&db, c, &sort, size);
        prop_assert_eq!(&first, &second);

        let mut expected = inserted.clone();
        if direction == SortDirection::Descending {
            expected.reverse();
        }
        prop_assert_eq!(first, expected);
    }

    /// Decoding an encoded cursor gives back the same cursor.
    #[test]
    fn cursor_round_trip(
        row in any::<u64>(),
        value in prop::option::of(arb_sort_value()),
        value_type in prop_oneof![
            Just(SortValueType::Int),
            Just(SortValueType::Float),
            Just(SortValueType::Text),
            Just(SortValueType::Timestamp),
        ],
        sorted in any::<bool>(),
    ) {
        let cursor = if !sorted {
            Cursor::new(row)
        } else {
            let value_type = value.as_ref().map_or(value_type, SortValue::value_type);
            Cursor::sorted(row, value_type, value)
        };
        let token = cursor.encode();
        prop_assert!(token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        let decoded = Cursor::decode(&token).unwrap();
        prop_assert_eq!(decoded.row, cursor.row);
        prop_assert_eq!(
            decoded.sort.as_ref().map(|s| s.value_type),
            cursor.sort.as_ref().map(|s| s.value_type)
        );
        let same_value = match (decoded.sort.and_then(|s| s.value), cursor.sort.and_then(|s| s.value)) {
            (Some(SortValue::Float(a)), Some(SortValue::Float(b))) if a.is_nan() => b.is_nan(),
            (a, b) => a.cmp(&b) == Ordering::Equal,
        };
        prop_assert!(same_value);
    }
}
