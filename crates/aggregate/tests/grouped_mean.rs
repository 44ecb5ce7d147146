//! Grouped means over in-memory field streams, under both strategies.

use approx::assert_relative_eq;
use spidi_aggregate::{grouped_mean, AggregateError, GroupedMeanConfig, RangeFilter, Strategy};
use spidi_io::{Field, FieldIter, FieldMeta, FieldSink, FieldSource, IoError, MemoryStore};

const STRATEGIES: [Strategy; 2] = [Strategy::SinglePass, Strategy::Replay];

fn record(group: i64, value: f64, year: i64) -> Field {
    Field::new(
        vec![value, value * 10.0],
        FieldMeta::new().with("group", group).with("year", year),
    )
}

/// Groups A = 1 with values [1, 3], B = 2 with [2], C = 3 with no records
/// once the year filter applies.
fn three_groups() -> MemoryStore {
    MemoryStore::from(vec![
        record(2, 2.0, 2001),
        record(1, 1.0, 2000),
        record(3, 99.0, 1950),
        record(1, 3.0, 2002),
    ])
}

fn run(source: &MemoryStore, config: &GroupedMeanConfig) -> Vec<Field> {
    let mut sink = MemoryStore::new();
    grouped_mean(source, &mut sink, config).unwrap();
    sink.into_fields()
}

#[test]
fn means_per_group_and_empty_group_absent() {
    for strategy in STRATEGIES {
        let config = GroupedMeanConfig::new("group")
            .with_filter(RangeFilter::new("year", 2000, 2010))
            .with_strategy(strategy);
        let out = run(&three_groups(), &config);

        assert_eq!(out.len(), 2, "{strategy:?}");
        assert_eq!(out[0].meta().get("group"), Some(1));
        assert_relative_eq!(out[0].values()[0], 2.0);
        assert_relative_eq!(out[0].values()[1], 20.0);
        assert_eq!(out[1].meta().get("group"), Some(2));
        assert_relative_eq!(out[1].values()[0], 2.0);
    }
}

#[test]
fn filter_excludes_single_record() {
    for strategy in STRATEGIES {
        let config = GroupedMeanConfig::new("group")
            .with_filter(RangeFilter::new("year", 2000, 2001))
            .with_strategy(strategy);
        let out = run(&three_groups(), &config);

        assert_eq!(out[0].meta().get("group"), Some(1));
        assert_relative_eq!(out[0].values()[0], 1.0);
    }
}

#[test]
fn emission_follows_ascending_key_order() {
    let source = MemoryStore::from(vec![
        record(9, 1.0, 2000),
        record(-2, 1.0, 2000),
        record(4, 1.0, 2000),
        record(9, 3.0, 2000),
    ]);
    for strategy in STRATEGIES {
        let out = run(&source, &GroupedMeanConfig::new("group").with_strategy(strategy));
        let keys: Vec<i64> = out.iter().map(|f| f.meta().get("group").unwrap()).collect();
        assert_eq!(keys, vec![-2, 4, 9]);
    }
}

#[test]
fn representative_metadata_is_last_contributor() {
    for strategy in STRATEGIES {
        let out = run(
            &three_groups(),
            &GroupedMeanConfig::new("group").with_strategy(strategy),
        );
        assert_eq!(out[0].meta().get("year"), Some(2002));
    }
}

#[test]
fn nan_propagates_per_grid_point() {
    let source = MemoryStore::from(vec![
        Field::new(vec![1.0, f64::NAN], FieldMeta::new().with("group", 1)),
        Field::new(vec![3.0, 5.0], FieldMeta::new().with("group", 1)),
    ]);
    for strategy in STRATEGIES {
        let out = run(&source, &GroupedMeanConfig::new("group").with_strategy(strategy));
        assert_relative_eq!(out[0].values()[0], 2.0);
        assert!(out[0].values()[1].is_nan());
    }
}

#[test]
fn missing_group_key_is_fatal() {
    let source = MemoryStore::from(vec![
        record(1, 1.0, 2000),
        Field::new(vec![1.0, 1.0], FieldMeta::new().with("year", 2000)),
    ]);
    for strategy in STRATEGIES {
        let mut sink = MemoryStore::new();
        let result = grouped_mean(
            &source,
            &mut sink,
            &GroupedMeanConfig::new("group").with_strategy(strategy),
        );
        assert!(matches!(
            result,
            Err(AggregateError::Io(IoError::MissingKey { .. }))
        ));
        assert!(sink.is_empty());
    }
}

#[test]
fn grid_size_change_is_fatal() {
    let source = MemoryStore::from(vec![
        Field::new(vec![1.0, 2.0], FieldMeta::new().with("group", 1)),
        Field::new(vec![1.0], FieldMeta::new().with("group", 1)),
    ]);
    for strategy in STRATEGIES {
        let mut sink = MemoryStore::new();
        let result = grouped_mean(
            &source,
            &mut sink,
            &GroupedMeanConfig::new("group").with_strategy(strategy),
        );
        assert!(matches!(
            result,
            Err(AggregateError::FieldLength {
                expected: 2,
                got: 1
            })
        ));
    }
}

/// Source that counts how many passes are opened over it.
struct CountingSource {
    inner: MemoryStore,
    passes: std::cell::Cell<usize>,
}

impl FieldSource for CountingSource {
    fn fields(&self) -> Result<FieldIter<'_>, IoError> {
        self.passes.set(self.passes.get() + 1);
        self.inner.fields()
    }
}

#[test]
fn pass_counts_per_strategy() {
    let single = CountingSource {
        inner: three_groups(),
        passes: std::cell::Cell::new(0),
    };
    let mut sink = MemoryStore::new();
    grouped_mean(&single, &mut sink, &GroupedMeanConfig::new("group")).unwrap();
    assert_eq!(single.passes.get(), 1);

    let replay = CountingSource {
        inner: three_groups(),
        passes: std::cell::Cell::new(0),
    };
    let config = GroupedMeanConfig::new("group").with_strategy(Strategy::Replay);
    let summary = grouped_mean(&replay, &mut sink, &config).unwrap();
    // One discovery pass plus one pass per group.
    assert_eq!(replay.passes.get(), 1 + summary.groups().len());
}

/// Sink that fails after accepting `limit` fields.
struct FailingSink {
    limit: usize,
    written: usize,
}

impl FieldSink for FailingSink {
    fn write(&mut self, _values: &[f64], _meta: &FieldMeta) -> Result<(), IoError> {
        if self.written == self.limit {
            return Err(IoError::Io {
                reason: "disk full".to_string(),
            });
        }
        self.written += 1;
        Ok(())
    }
}

#[test]
fn sink_failure_aborts_the_run() {
    let mut sink = FailingSink {
        limit: 1,
        written: 0,
    };
    let result = grouped_mean(&three_groups(), &mut sink, &GroupedMeanConfig::new("group"));
    assert!(matches!(result, Err(AggregateError::Io(IoError::Io { .. }))));
    assert_eq!(sink.written, 1);
}
