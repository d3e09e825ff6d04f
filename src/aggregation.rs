// Unique-Customer Aggregation & Pagination Engine
//
// Merges customer records that share the same name across every address
// book into one logical customer (union of phone numbers), sorts the merged
// result by name, and serves page-bounded windows with accurate metadata.
//
// The pipeline is group -> order -> paginate. Each stage is a pure function
// over its input; the engine holds no state between calls, so every
// aggregate() recomputes from a fresh read of the record source.

use crate::error::{AddressBookError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// RECORD SOURCE
// ============================================================================

/// Supplies the full set of raw customer records at request time.
///
/// Anything that can produce a snapshot of records satisfies the role; the
/// production implementation reads SQLite (see db::SqliteRecordSource).
/// Failures surface as SourceUnavailable and abort the whole aggregation.
pub trait RecordSource {
    fn fetch_all(&self) -> Result<Vec<CustomerRecord>>;
}

// ============================================================================
// DATA MODEL
// ============================================================================

/// One raw stored customer entry, independent of which address book it
/// belongs to. Snapshot input to the engine; never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub name: String,
    pub phone_numbers: BTreeSet<String>,
}

/// All records sharing one name, merged into a single logical customer.
///
/// Request-scoped and never persisted. The phone number set is the
/// deduplicated union of every matching record's numbers; BTreeSet keeps
/// serialization order stable so identical inputs produce identical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedCustomer {
    pub name: String,
    pub phone_numbers: BTreeSet<String>,
}

/// A bounded window of ordered merged customers plus page metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// The zero-based page number the caller asked for.
    pub page: i64,

    /// The page size the caller asked for, echoed unchanged even when the
    /// engine could not fill it.
    pub requested_page_size: i64,

    /// Number of elements actually returned in `results`.
    pub current_page_size: usize,

    /// Total count of merged customers across the whole dataset.
    pub total_size: usize,

    /// ceil(total_size / requested_page_size); 0 when the dataset is empty.
    pub total_pages: usize,

    pub results: Vec<MergedCustomer>,
}

// ============================================================================
// GROUPER
// ============================================================================

/// Group records by exact name and union their phone number sets.
///
/// Name equality is case-sensitive with no trimming or normalization.
/// Output order is unspecified; ordering is the orderer's job.
/// Empty input yields empty output.
pub fn group(records: Vec<CustomerRecord>) -> Vec<MergedCustomer> {
    let mut by_name: HashMap<String, BTreeSet<String>> = HashMap::new();

    for record in records {
        by_name
            .entry(record.name)
            .or_default()
            .extend(record.phone_numbers);
    }

    by_name
        .into_iter()
        .map(|(name, phone_numbers)| MergedCustomer {
            name,
            phone_numbers,
        })
        .collect()
}

// ============================================================================
// ORDERER
// ============================================================================

/// Sort merged customers ascending by name (ordinal comparison).
///
/// Names are already distinct after grouping, so the order is total without
/// a secondary key and deterministic for any input permutation.
pub fn order(mut merged: Vec<MergedCustomer>) -> Vec<MergedCustomer> {
    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}

// ============================================================================
// PAGINATOR
// ============================================================================

/// Slice the ordered sequence into the requested window and compute page
/// metadata.
///
/// Rejects `page < 0` and `page_size < 1` with InvalidPaginationRequest.
/// A window past the last element is not an error: it yields an empty
/// result with total_size/total_pages still describing the full dataset.
pub fn paginate(ordered: Vec<MergedCustomer>, page: i64, page_size: i64) -> Result<Page> {
    if page < 0 || page_size < 1 {
        return Err(AddressBookError::InvalidPaginationRequest { page, page_size });
    }

    let total_size = ordered.len();
    let size = page_size as usize;
    let total_pages = total_size.div_ceil(size);

    let start = (page as usize).saturating_mul(size);
    let results: Vec<MergedCustomer> = if start >= total_size {
        Vec::new()
    } else {
        ordered
            .into_iter()
            .skip(start)
            .take(size)
            .collect()
    };

    Ok(Page {
        page,
        requested_page_size: page_size,
        current_page_size: results.len(),
        total_size,
        total_pages,
        results,
    })
}

// ============================================================================
// AGGREGATION ENGINE (FACADE)
// ============================================================================

/// Composes group -> order -> paginate over a fresh pull from the record
/// source. Stateless: every call re-reads and re-groups from scratch, so a
/// call always reflects the source's current snapshot.
pub struct AggregationEngine<S: RecordSource> {
    source: S,
}

impl<S: RecordSource> AggregationEngine<S> {
    pub fn new(source: S) -> Self {
        AggregationEngine { source }
    }

    /// Run one aggregation request. Either the full pipeline succeeds or
    /// the error propagates; there is no partial output.
    pub fn aggregate(&self, page: i64, page_size: i64) -> Result<Page> {
        let records = self.source.fetch_all()?;
        let merged = group(records);
        let ordered = order(merged);
        paginate(ordered, page, page_size)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, phones: &[&str]) -> CustomerRecord {
        CustomerRecord {
            name: name.to_string(),
            phone_numbers: phones.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn phones(numbers: &[&str]) -> BTreeSet<String> {
        numbers.iter().map(|p| p.to_string()).collect()
    }

    /// In-memory source for pipeline tests.
    struct FixedSource {
        records: Vec<CustomerRecord>,
    }

    impl RecordSource for FixedSource {
        fn fetch_all(&self) -> Result<Vec<CustomerRecord>> {
            Ok(self.records.clone())
        }
    }

    /// Source that always fails, to exercise the no-partial-results rule.
    struct BrokenSource;

    impl RecordSource for BrokenSource {
        fn fetch_all(&self) -> Result<Vec<CustomerRecord>> {
            Err(AddressBookError::SourceUnavailable(
                "connection refused".to_string(),
            ))
        }
    }

    fn sample_records() -> Vec<CustomerRecord> {
        vec![
            record("Jose", &["123"]),
            record("Jose", &["456"]),
            record("Anna", &["789"]),
        ]
    }

    // ------------------------------------------------------------------------
    // Grouper
    // ------------------------------------------------------------------------

    #[test]
    fn test_group_merges_same_name() {
        let merged = group(sample_records());

        assert_eq!(merged.len(), 2);

        let jose = merged.iter().find(|m| m.name == "Jose").unwrap();
        assert_eq!(jose.phone_numbers, phones(&["123", "456"]));

        let anna = merged.iter().find(|m| m.name == "Anna").unwrap();
        assert_eq!(anna.phone_numbers, phones(&["789"]));
    }

    #[test]
    fn test_group_deduplicates_shared_numbers() {
        // Same number for the same customer in two books counts once.
        let merged = group(vec![
            record("Jose", &["123", "456"]),
            record("Jose", &["123", "789"]),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].phone_numbers, phones(&["123", "456", "789"]));
    }

    #[test]
    fn test_group_is_case_sensitive() {
        let merged = group(vec![record("jose", &["123"]), record("Jose", &["456"])]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_group_empty_input() {
        assert!(group(Vec::new()).is_empty());
    }

    #[test]
    fn test_group_keeps_empty_phone_sets() {
        let merged = group(vec![record("Anna", &[])]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].phone_numbers.is_empty());
    }

    // ------------------------------------------------------------------------
    // Orderer
    // ------------------------------------------------------------------------

    #[test]
    fn test_order_sorts_by_name_ascending() {
        let ordered = order(vec![
            MergedCustomer {
                name: "Zoe".to_string(),
                phone_numbers: BTreeSet::new(),
            },
            MergedCustomer {
                name: "Anna".to_string(),
                phone_numbers: BTreeSet::new(),
            },
            MergedCustomer {
                name: "Jose".to_string(),
                phone_numbers: BTreeSet::new(),
            },
        ]);

        let names: Vec<&str> = ordered.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Anna", "Jose", "Zoe"]);
    }

    #[test]
    fn test_order_is_deterministic_for_any_permutation() {
        let merged = group(sample_records());
        let mut reversed = merged.clone();
        reversed.reverse();

        assert_eq!(order(merged), order(reversed));
    }

    // ------------------------------------------------------------------------
    // Paginator
    // ------------------------------------------------------------------------

    #[test]
    fn test_paginate_first_page() {
        let ordered = order(group(sample_records()));
        let page = paginate(ordered, 0, 2).unwrap();

        assert_eq!(page.page, 0);
        assert_eq!(page.requested_page_size, 2);
        assert_eq!(page.total_size, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.current_page_size, 2);
        assert_eq!(page.results[0].name, "Anna");
        assert_eq!(page.results[0].phone_numbers, phones(&["789"]));
        assert_eq!(page.results[1].name, "Jose");
        assert_eq!(page.results[1].phone_numbers, phones(&["123", "456"]));
    }

    #[test]
    fn test_paginate_second_page_of_size_one() {
        let ordered = order(group(sample_records()));
        let page = paginate(ordered, 1, 1).unwrap();

        assert_eq!(page.total_size, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.current_page_size, 1);
        assert_eq!(page.results[0].name, "Jose");
        assert_eq!(page.results[0].phone_numbers, phones(&["123", "456"]));
    }

    #[test]
    fn test_paginate_last_page_partially_filled() {
        let ordered = order(group(vec![
            record("Anna", &[]),
            record("Jose", &[]),
            record("Zoe", &[]),
        ]));
        let page = paginate(ordered, 1, 2).unwrap();

        assert_eq!(page.total_size, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.current_page_size, 1);
        assert_eq!(page.requested_page_size, 2);
        assert_eq!(page.results[0].name, "Zoe");
    }

    #[test]
    fn test_paginate_past_last_page_is_empty_not_error() {
        let ordered = order(group(sample_records()));
        let page = paginate(ordered, 5, 2).unwrap();

        assert!(page.results.is_empty());
        assert_eq!(page.current_page_size, 0);
        // Metadata still reflects the full dataset.
        assert_eq!(page.total_size, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.requested_page_size, 2);
    }

    #[test]
    fn test_paginate_empty_dataset() {
        let page = paginate(Vec::new(), 0, 20).unwrap();

        assert_eq!(page.total_size, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.current_page_size, 0);
        assert!(page.results.is_empty());
    }

    #[test]
    fn test_paginate_rejects_negative_page() {
        let err = paginate(Vec::new(), -1, 20).unwrap_err();
        assert!(matches!(
            err,
            AddressBookError::InvalidPaginationRequest { page: -1, .. }
        ));
    }

    #[test]
    fn test_paginate_rejects_zero_page_size() {
        let err = paginate(Vec::new(), 0, 0).unwrap_err();
        assert!(matches!(
            err,
            AddressBookError::InvalidPaginationRequest { page_size: 0, .. }
        ));
    }

    #[test]
    fn test_page_sizes_sum_to_total() {
        let records: Vec<CustomerRecord> = (0..7)
            .map(|i| record(&format!("customer-{}", i), &["555"]))
            .collect();
        let engine = AggregationEngine::new(FixedSource { records });

        let first = engine.aggregate(0, 3).unwrap();
        assert_eq!(first.total_pages, 3);

        let mut seen = 0;
        for p in 0..first.total_pages {
            let page = engine.aggregate(p as i64, 3).unwrap();
            seen += page.current_page_size;
        }
        assert_eq!(seen, first.total_size);
    }

    // ------------------------------------------------------------------------
    // Facade
    // ------------------------------------------------------------------------

    #[test]
    fn test_aggregate_pipeline() {
        let engine = AggregationEngine::new(FixedSource {
            records: sample_records(),
        });
        let page = engine.aggregate(0, 20).unwrap();

        assert_eq!(page.total_size, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.results[0].name, "Anna");
        assert_eq!(page.results[1].name, "Jose");
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let engine = AggregationEngine::new(FixedSource {
            records: sample_records(),
        });

        let first = serde_json::to_string(&engine.aggregate(0, 20).unwrap()).unwrap();
        let second = serde_json::to_string(&engine.aggregate(0, 20).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ordering_holds_across_page_boundaries() {
        let records: Vec<CustomerRecord> = (0..10)
            .map(|i| record(&format!("customer-{:02}", i), &[]))
            .collect();
        let engine = AggregationEngine::new(FixedSource { records });

        let first = engine.aggregate(0, 4).unwrap();
        let second = engine.aggregate(1, 4).unwrap();

        let last_of_first = &first.results.last().unwrap().name;
        let first_of_second = &second.results.first().unwrap().name;
        assert!(last_of_first < first_of_second);
    }

    #[test]
    fn test_aggregate_source_failure_returns_no_page() {
        let engine = AggregationEngine::new(BrokenSource);
        let err = engine.aggregate(0, 20).unwrap_err();
        assert!(matches!(err, AddressBookError::SourceUnavailable(_)));
    }

    #[test]
    fn test_page_serializes_with_camel_case_fields() {
        let engine = AggregationEngine::new(FixedSource {
            records: sample_records(),
        });
        let json = serde_json::to_value(engine.aggregate(0, 20).unwrap()).unwrap();

        assert_eq!(json["page"], 0);
        assert_eq!(json["requestedPageSize"], 20);
        assert_eq!(json["currentPageSize"], 2);
        assert_eq!(json["totalSize"], 2);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["results"][0]["name"], "Anna");
        assert_eq!(json["results"][1]["phoneNumbers"][0], "123");
    }
}
