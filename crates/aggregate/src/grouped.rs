//! Grouped element-wise means over a field stream.

use std::collections::{BTreeMap, BTreeSet};

use spidi_io::{Field, FieldMeta, FieldSink, FieldSource};
use tracing::{debug, info};

use crate::config::{GroupedMeanConfig, Strategy};
use crate::error::AggregateError;

/// Outcome of a [`grouped_mean`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    groups: Vec<i64>,
    emitted: Vec<i64>,
    n_records: usize,
}

impl AggregateSummary {
    /// Every distinct key value seen in the stream, ascending.
    pub fn groups(&self) -> &[i64] {
        &self.groups
    }

    /// Key values for which a mean was written, in write order.
    pub fn emitted(&self) -> &[i64] {
        &self.emitted
    }

    /// Number of records that contributed to some mean.
    pub fn n_records(&self) -> usize {
        self.n_records
    }
}

/// Running element-wise sum for one group.
struct Accumulator {
    sum: Vec<f64>,
    count: usize,
    meta: FieldMeta,
}

impl Accumulator {
    fn new(field: Field) -> Self {
        let (sum, meta) = field.into_parts();
        Self {
            sum,
            count: 1,
            meta,
        }
    }

    /// Adds `field`; its metadata becomes the group's representative metadata.
    fn add(&mut self, field: Field) {
        let (values, meta) = field.into_parts();
        for (s, v) in self.sum.iter_mut().zip(values) {
            *s += v;
        }
        self.count += 1;
        self.meta = meta;
    }

    fn mean(mut self) -> (Vec<f64>, FieldMeta) {
        let n = self.count as f64;
        for s in &mut self.sum {
            *s /= n;
        }
        (self.sum, self.meta)
    }
}

/// Grid size shared by every contributing field of a run.
#[derive(Default)]
struct GridCheck(Option<usize>);

impl GridCheck {
    fn check(&mut self, field: &Field) -> Result<(), AggregateError> {
        match self.0 {
            None => {
                self.0 = Some(field.len());
                Ok(())
            }
            Some(expected) if expected == field.len() => Ok(()),
            Some(expected) => Err(AggregateError::FieldLength {
                expected,
                got: field.len(),
            }),
        }
    }
}

/// Compute the mean field of every group in `source` and write it to `sink`.
///
/// Records are grouped by the integer metadata key `config.key()`. A record
/// contributes to its group only if it passes every range filter; filters
/// never create or remove groups, but a group with no contributing records
/// writes nothing. Means are written in ascending key order, each tagged with
/// the metadata of the group's last contributing record. NaN values
/// propagate: any NaN in a group makes the mean NaN at that grid point.
///
/// With [`Strategy::SinglePass`] the stream is read once and nothing is
/// written until it has been consumed. With [`Strategy::Replay`] the distinct
/// keys are listed first and the stream is re-read once per group, so only
/// one running sum is held at a time.
///
/// # Errors
///
/// Returns [`AggregateError::InvalidConfig`] for an invalid configuration,
/// [`AggregateError::FieldLength`] when contributing fields differ in grid
/// size, and [`AggregateError::Io`] for read or write failures and for
/// records lacking the grouping key or a filter key.
#[tracing::instrument(skip_all, fields(key = config.key(), strategy = ?config.strategy()))]
pub fn grouped_mean<S, W>(
    source: &S,
    sink: &mut W,
    config: &GroupedMeanConfig,
) -> Result<AggregateSummary, AggregateError>
where
    S: FieldSource + ?Sized,
    W: FieldSink + ?Sized,
{
    config.validate()?;
    let summary = match config.strategy() {
        Strategy::SinglePass => single_pass(source, sink, config)?,
        Strategy::Replay => replay(source, sink, config)?,
    };
    info!(
        n_groups = summary.groups.len(),
        n_emitted = summary.emitted.len(),
        n_records = summary.n_records,
        "grouped mean complete"
    );
    Ok(summary)
}

fn single_pass<S, W>(
    source: &S,
    sink: &mut W,
    config: &GroupedMeanConfig,
) -> Result<AggregateSummary, AggregateError>
where
    S: FieldSource + ?Sized,
    W: FieldSink + ?Sized,
{
    let mut groups = BTreeSet::new();
    let mut accumulators: BTreeMap<i64, Accumulator> = BTreeMap::new();
    let mut grid = GridCheck::default();
    let mut n_records = 0usize;

    for field in source.fields()? {
        let field = field?;
        let key = field.meta().require(config.key())?;
        groups.insert(key);
        if !config.accepts(field.meta())? {
            continue;
        }
        grid.check(&field)?;
        n_records += 1;
        match accumulators.get_mut(&key) {
            Some(acc) => acc.add(field),
            None => {
                accumulators.insert(key, Accumulator::new(field));
            }
        }
    }

    let mut emitted = Vec::with_capacity(accumulators.len());
    for (key, acc) in accumulators {
        debug!(key, count = acc.count, "writing group mean");
        let (mean, meta) = acc.mean();
        sink.write(&mean, &meta)?;
        emitted.push(key);
    }

    Ok(AggregateSummary {
        groups: groups.into_iter().collect(),
        emitted,
        n_records,
    })
}

fn replay<S, W>(
    source: &S,
    sink: &mut W,
    config: &GroupedMeanConfig,
) -> Result<AggregateSummary, AggregateError>
where
    S: FieldSource + ?Sized,
    W: FieldSink + ?Sized,
{
    let groups = source.distinct_values(config.key())?;
    let mut grid = GridCheck::default();
    let mut emitted = Vec::with_capacity(groups.len());
    let mut n_records = 0usize;

    for &key in &groups {
        let mut acc: Option<Accumulator> = None;
        for field in source.fields()? {
            let field = field?;
            if field.meta().require(config.key())? != key || !config.accepts(field.meta())? {
                continue;
            }
            grid.check(&field)?;
            n_records += 1;
            match acc.as_mut() {
                Some(a) => a.add(field),
                None => acc = Some(Accumulator::new(field)),
            }
        }

        match acc {
            Some(acc) => {
                debug!(key, count = acc.count, "writing group mean");
                let (mean, meta) = acc.mean();
                sink.write(&mean, &meta)?;
                emitted.push(key);
            }
            None => debug!(key, "no contributing records; group skipped"),
        }
    }

    Ok(AggregateSummary {
        groups,
        emitted,
        n_records,
    })
}
