//! Iterator Traits and Combinators for Range Queries
//!
//! A chunk query is assembled from small iterators:
//!
//! - each intersecting block contributes a streaming decode iterator
//! - a non-empty head contributes a snapshot iterator (`StreamsIterator`)
//! - `NonOverlappingIterator` concatenates them; blocks are time-disjoint by
//!   the chunk invariant, so no merge is needed
//! - `TimeRangedIterator` clips the result to the query window (both ends
//!   inclusive)
//! - for backward queries, every sub-iterator is drained and reversed
//!   (`ReversedEntryIterator`) and the sub-iterator list is reversed before
//!   concatenation
//!
//! Iterators follow the cursor protocol of `next() -> bool` with accessors
//! for the current element, a sticky `error()`, and an idempotent `close()`
//! that releases pooled resources exactly once.

use serde::{Deserialize, Serialize};

use logchunk_core::Entry;

use crate::error::{Error, Result};
use crate::stats::QueryContext;

/// Direction of a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// A single extracted metric sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Timestamp in nanoseconds since epoch
    pub timestamp: i64,
    /// Extracted value
    pub value: f64,
    /// xxhash64 of the line the sample was extracted from, before any
    /// pipeline rewriting
    pub hash: u64,
}

/// Cursor over log entries
pub trait EntryIterator {
    /// Advance to the next entry; `false` on exhaustion, error, or
    /// cancellation
    fn next(&mut self) -> bool;

    /// The current entry; only valid after `next()` returned `true`
    fn entry(&self) -> Entry;

    /// Labels of the current entry, in `{name="value", ...}` form
    fn labels(&self) -> String;

    /// The sticky error, if iteration terminated abnormally
    fn error(&self) -> Option<Error>;

    /// Release pooled resources. Idempotent; returns the sticky error.
    fn close(&mut self) -> Result<()>;
}

/// Cursor over extracted samples
pub trait SampleIterator {
    fn next(&mut self) -> bool;
    fn sample(&self) -> Sample;
    fn labels(&self) -> String;
    fn error(&self) -> Option<Error>;
    fn close(&mut self) -> Result<()>;
}

/// Iterator over nothing; used for empty blocks and out-of-window heads
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIterator;

impl EntryIterator for NoopIterator {
    fn next(&mut self) -> bool {
        false
    }

    fn entry(&self) -> Entry {
        Entry::new(0, bytes::Bytes::new())
    }

    fn labels(&self) -> String {
        String::new()
    }

    fn error(&self) -> Option<Error> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl SampleIterator for NoopIterator {
    fn next(&mut self) -> bool {
        false
    }

    fn sample(&self) -> Sample {
        Sample::default()
    }

    fn labels(&self) -> String {
        String::new()
    }

    fn error(&self) -> Option<Error> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Concatenates time-disjoint sub-iterators in order
pub struct NonOverlappingIterator<'a> {
    ctx: QueryContext,
    iters: std::collections::VecDeque<Box<dyn EntryIterator + 'a>>,
    curr: Option<Box<dyn EntryIterator + 'a>>,
    err: Option<Error>,
    closed: bool,
}

impl<'a> NonOverlappingIterator<'a> {
    pub fn new(ctx: QueryContext, iters: Vec<Box<dyn EntryIterator + 'a>>) -> Self {
        Self {
            ctx,
            iters: iters.into(),
            curr: None,
            err: None,
            closed: false,
        }
    }
}

impl EntryIterator for NonOverlappingIterator<'_> {
    fn next(&mut self) -> bool {
        if self.err.is_some() || self.closed {
            return false;
        }
        loop {
            match self.curr.as_mut() {
                Some(it) => {
                    if it.next() {
                        return true;
                    }
                    if let Some(e) = it.error() {
                        self.err = Some(e);
                    }
                    let _ = it.close();
                    self.curr = None;
                    if self.err.is_some() {
                        return false;
                    }
                }
                None => {
                    // Cancellation is checked between sub-iterators, i.e. at
                    // block boundaries.
                    if self.ctx.is_cancelled() {
                        self.err = Some(Error::Cancelled);
                        return false;
                    }
                    match self.iters.pop_front() {
                        Some(it) => self.curr = Some(it),
                        None => return false,
                    }
                }
            }
        }
    }

    fn entry(&self) -> Entry {
        match &self.curr {
            Some(it) => it.entry(),
            None => Entry::new(0, bytes::Bytes::new()),
        }
    }

    fn labels(&self) -> String {
        match &self.curr {
            Some(it) => it.labels(),
            None => String::new(),
        }
    }

    fn error(&self) -> Option<Error> {
        self.err.clone()
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            if let Some(mut it) = self.curr.take() {
                if let Err(e) = it.close() {
                    self.err.get_or_insert(e);
                }
            }
            while let Some(mut it) = self.iters.pop_front() {
                if let Err(e) = it.close() {
                    self.err.get_or_insert(e);
                }
            }
        }
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Clips an ascending iterator to `[mint, maxt]`, both ends inclusive
pub struct TimeRangedIterator<'a> {
    inner: Box<dyn EntryIterator + 'a>,
    mint: i64,
    maxt: i64,
    done: bool,
}

impl<'a> TimeRangedIterator<'a> {
    pub fn new(inner: Box<dyn EntryIterator + 'a>, mint: i64, maxt: i64) -> Self {
        Self {
            inner,
            mint,
            maxt,
            done: false,
        }
    }
}

impl EntryIterator for TimeRangedIterator<'_> {
    fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        loop {
            if !self.inner.next() {
                self.done = true;
                return false;
            }
            let ts = self.inner.entry().timestamp;
            if ts < self.mint {
                continue;
            }
            if ts > self.maxt {
                // Input is ascending, nothing further can be in range.
                self.done = true;
                let _ = self.inner.close();
                return false;
            }
            return true;
        }
    }

    fn entry(&self) -> Entry {
        self.inner.entry()
    }

    fn labels(&self) -> String {
        self.inner.labels()
    }

    fn error(&self) -> Option<Error> {
        self.inner.error()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Yields an ascending sub-iterator's entries in reverse order
///
/// The inner iterator is drained (and closed) at construction; a sticky
/// inner error surfaces as the construction result instead of a partial
/// reversal.
pub struct ReversedEntryIterator {
    entries: Vec<(Entry, String)>,
    curr: Option<(Entry, String)>,
}

impl ReversedEntryIterator {
    pub fn new(mut inner: Box<dyn EntryIterator + '_>) -> Result<Self> {
        let mut entries = Vec::new();
        while inner.next() {
            entries.push((inner.entry(), inner.labels()));
        }
        inner.close()?;
        Ok(Self {
            entries,
            curr: None,
        })
    }
}

impl EntryIterator for ReversedEntryIterator {
    fn next(&mut self) -> bool {
        self.curr = self.entries.pop();
        self.curr.is_some()
    }

    fn entry(&self) -> Entry {
        match &self.curr {
            Some((e, _)) => e.clone(),
            None => Entry::new(0, bytes::Bytes::new()),
        }
    }

    fn labels(&self) -> String {
        match &self.curr {
            Some((_, l)) => l.clone(),
            None => String::new(),
        }
    }

    fn error(&self) -> Option<Error> {
        None
    }

    fn close(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// One materialized per-label stream of a head snapshot
#[derive(Debug, Clone)]
pub struct Stream {
    pub labels: String,
    pub entries: Vec<Entry>,
}

impl Stream {
    pub fn new(labels: String) -> Self {
        Self {
            labels,
            entries: Vec::new(),
        }
    }
}

struct StreamCursor {
    labels: String,
    entries: Vec<Entry>,
    front: usize,
    back: usize,
}

impl StreamCursor {
    fn peek(&self, direction: Direction) -> Option<&Entry> {
        if self.front >= self.back {
            return None;
        }
        match direction {
            Direction::Forward => self.entries.get(self.front),
            Direction::Backward => self.entries.get(self.back - 1),
        }
    }

    fn take(&mut self, direction: Direction) -> Entry {
        match direction {
            Direction::Forward => {
                let e = self.entries[self.front].clone();
                self.front += 1;
                e
            }
            Direction::Backward => {
                self.back -= 1;
                self.entries[self.back].clone()
            }
        }
    }
}

/// Merges per-label entry streams by timestamp in the requested direction
///
/// Each stream is individually time-ordered; the merge picks the smallest
/// (forward) or largest (backward) front timestamp across streams, breaking
/// ties by stream insertion order.
pub struct StreamsIterator {
    streams: Vec<StreamCursor>,
    direction: Direction,
    curr: Option<(Entry, usize)>,
}

impl StreamsIterator {
    pub fn new(streams: Vec<Stream>, direction: Direction) -> Self {
        Self {
            streams: streams
                .into_iter()
                .map(|s| StreamCursor {
                    labels: s.labels,
                    back: s.entries.len(),
                    entries: s.entries,
                    front: 0,
                })
                .collect(),
            direction,
            curr: None,
        }
    }
}

impl EntryIterator for StreamsIterator {
    fn next(&mut self) -> bool {
        let mut best: Option<(usize, i64)> = None;
        for (i, s) in self.streams.iter().enumerate() {
            let Some(e) = s.peek(self.direction) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, best_ts)) => match self.direction {
                    Direction::Forward => e.timestamp < best_ts,
                    Direction::Backward => e.timestamp > best_ts,
                },
            };
            if better {
                best = Some((i, e.timestamp));
            }
        }
        match best {
            Some((i, _)) => {
                let e = self.streams[i].take(self.direction);
                self.curr = Some((e, i));
                true
            }
            None => {
                self.curr = None;
                false
            }
        }
    }

    fn entry(&self) -> Entry {
        match &self.curr {
            Some((e, _)) => e.clone(),
            None => Entry::new(0, bytes::Bytes::new()),
        }
    }

    fn labels(&self) -> String {
        match &self.curr {
            Some((_, i)) => self.streams[*i].labels.clone(),
            None => String::new(),
        }
    }

    fn error(&self) -> Option<Error> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One materialized per-label series of a head snapshot
#[derive(Debug, Clone)]
pub struct Series {
    pub labels: String,
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn new(labels: String) -> Self {
        Self {
            labels,
            samples: Vec::new(),
        }
    }
}

/// Merges per-label sample series by ascending timestamp
pub struct MultiSeriesIterator {
    series: Vec<(Series, usize)>,
    curr: Option<(Sample, usize)>,
}

impl MultiSeriesIterator {
    pub fn new(series: Vec<Series>) -> Self {
        Self {
            series: series.into_iter().map(|s| (s, 0)).collect(),
            curr: None,
        }
    }
}

impl SampleIterator for MultiSeriesIterator {
    fn next(&mut self) -> bool {
        let mut best: Option<(usize, i64)> = None;
        for (i, (s, pos)) in self.series.iter().enumerate() {
            let Some(sample) = s.samples.get(*pos) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, best_ts)) => sample.timestamp < best_ts,
            };
            if better {
                best = Some((i, sample.timestamp));
            }
        }
        match best {
            Some((i, _)) => {
                let (s, pos) = &mut self.series[i];
                self.curr = Some((s.samples[*pos], i));
                *pos += 1;
                true
            }
            None => {
                self.curr = None;
                false
            }
        }
    }

    fn sample(&self) -> Sample {
        match &self.curr {
            Some((s, _)) => *s,
            None => Sample::default(),
        }
    }

    fn labels(&self) -> String {
        match &self.curr {
            Some((_, i)) => self.series[*i].0.labels.clone(),
            None => String::new(),
        }
    }

    fn error(&self) -> Option<Error> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Concatenates time-disjoint sample sub-iterators in order
pub struct NonOverlappingSampleIterator<'a> {
    ctx: QueryContext,
    iters: std::collections::VecDeque<Box<dyn SampleIterator + 'a>>,
    curr: Option<Box<dyn SampleIterator + 'a>>,
    err: Option<Error>,
    closed: bool,
}

impl<'a> NonOverlappingSampleIterator<'a> {
    pub fn new(ctx: QueryContext, iters: Vec<Box<dyn SampleIterator + 'a>>) -> Self {
        Self {
            ctx,
            iters: iters.into(),
            curr: None,
            err: None,
            closed: false,
        }
    }
}

impl SampleIterator for NonOverlappingSampleIterator<'_> {
    fn next(&mut self) -> bool {
        if self.err.is_some() || self.closed {
            return false;
        }
        loop {
            match self.curr.as_mut() {
                Some(it) => {
                    if it.next() {
                        return true;
                    }
                    if let Some(e) = it.error() {
                        self.err = Some(e);
                    }
                    let _ = it.close();
                    self.curr = None;
                    if self.err.is_some() {
                        return false;
                    }
                }
                None => {
                    if self.ctx.is_cancelled() {
                        self.err = Some(Error::Cancelled);
                        return false;
                    }
                    match self.iters.pop_front() {
                        Some(it) => self.curr = Some(it),
                        None => return false,
                    }
                }
            }
        }
    }

    fn sample(&self) -> Sample {
        match &self.curr {
            Some(it) => it.sample(),
            None => Sample::default(),
        }
    }

    fn labels(&self) -> String {
        match &self.curr {
            Some(it) => it.labels(),
            None => String::new(),
        }
    }

    fn error(&self) -> Option<Error> {
        self.err.clone()
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            if let Some(mut it) = self.curr.take() {
                if let Err(e) = it.close() {
                    self.err.get_or_insert(e);
                }
            }
            while let Some(mut it) = self.iters.pop_front() {
                if let Err(e) = it.close() {
                    self.err.get_or_insert(e);
                }
            }
        }
        match &self.err {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Clips an ascending sample iterator to `[mint, maxt]`, both ends inclusive
pub struct TimeRangedSampleIterator<'a> {
    inner: Box<dyn SampleIterator + 'a>,
    mint: i64,
    maxt: i64,
    done: bool,
}

impl<'a> TimeRangedSampleIterator<'a> {
    pub fn new(inner: Box<dyn SampleIterator + 'a>, mint: i64, maxt: i64) -> Self {
        Self {
            inner,
            mint,
            maxt,
            done: false,
        }
    }
}

impl SampleIterator for TimeRangedSampleIterator<'_> {
    fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        loop {
            if !self.inner.next() {
                self.done = true;
                return false;
            }
            let ts = self.inner.sample().timestamp;
            if ts < self.mint {
                continue;
            }
            if ts > self.maxt {
                self.done = true;
                let _ = self.inner.close();
                return false;
            }
            return true;
        }
    }

    fn sample(&self) -> Sample {
        self.inner.sample()
    }

    fn labels(&self) -> String {
        self.inner.labels()
    }

    fn error(&self) -> Option<Error> {
        self.inner.error()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn stream(labels: &str, timestamps: &[i64]) -> Stream {
        Stream {
            labels: labels.to_string(),
            entries: timestamps
                .iter()
                .map(|&t| Entry::new(t, Bytes::from(format!("line-{t}"))))
                .collect(),
        }
    }

    fn collect_entries(it: &mut dyn EntryIterator) -> Vec<i64> {
        let mut out = Vec::new();
        while it.next() {
            out.push(it.entry().timestamp);
        }
        out
    }

    // ---------------------------------------------------------------
    // StreamsIterator
    // ---------------------------------------------------------------

    #[test]
    fn test_streams_forward_merge() {
        let mut it = StreamsIterator::new(
            vec![stream("a", &[1, 4, 7]), stream("b", &[2, 3, 9])],
            Direction::Forward,
        );
        assert_eq!(collect_entries(&mut it), vec![1, 2, 3, 4, 7, 9]);
    }

    #[test]
    fn test_streams_backward_merge() {
        let mut it = StreamsIterator::new(
            vec![stream("a", &[1, 4, 7]), stream("b", &[2, 3, 9])],
            Direction::Backward,
        );
        assert_eq!(collect_entries(&mut it), vec![9, 7, 4, 3, 2, 1]);
    }

    #[test]
    fn test_streams_labels_follow_current_entry() {
        let mut it = StreamsIterator::new(
            vec![stream("left", &[1]), stream("right", &[2])],
            Direction::Forward,
        );
        assert!(it.next());
        assert_eq!(it.labels(), "left");
        assert!(it.next());
        assert_eq!(it.labels(), "right");
    }

    #[test]
    fn test_streams_empty() {
        let mut it = StreamsIterator::new(vec![], Direction::Forward);
        assert!(!it.next());
    }

    #[test]
    fn test_streams_equal_timestamps_prefer_first_stream() {
        let mut it = StreamsIterator::new(
            vec![stream("first", &[5]), stream("second", &[5])],
            Direction::Forward,
        );
        assert!(it.next());
        assert_eq!(it.labels(), "first");
        assert!(it.next());
        assert_eq!(it.labels(), "second");
        assert!(!it.next());
    }

    // ---------------------------------------------------------------
    // NonOverlappingIterator
    // ---------------------------------------------------------------

    #[test]
    fn test_non_overlapping_concatenates_in_order() {
        let its: Vec<Box<dyn EntryIterator>> = vec![
            Box::new(StreamsIterator::new(
                vec![stream("a", &[1, 2])],
                Direction::Forward,
            )),
            Box::new(StreamsIterator::new(
                vec![stream("a", &[3, 4])],
                Direction::Forward,
            )),
        ];
        let mut it = NonOverlappingIterator::new(QueryContext::new(), its);
        assert_eq!(collect_entries(&mut it), vec![1, 2, 3, 4]);
        assert!(it.error().is_none());
        assert!(it.close().is_ok());
    }

    #[test]
    fn test_non_overlapping_cancellation() {
        let ctx = QueryContext::new();
        let its: Vec<Box<dyn EntryIterator>> = vec![Box::new(StreamsIterator::new(
            vec![stream("a", &[1])],
            Direction::Forward,
        ))];
        let mut it = NonOverlappingIterator::new(ctx.clone(), its);
        ctx.cancel();
        assert!(!it.next());
        assert_eq!(it.error(), Some(Error::Cancelled));
        assert_eq!(it.close(), Err(Error::Cancelled));
    }

    #[test]
    fn test_non_overlapping_close_is_idempotent() {
        let its: Vec<Box<dyn EntryIterator>> = vec![Box::new(NoopIterator)];
        let mut it = NonOverlappingIterator::new(QueryContext::new(), its);
        assert!(it.close().is_ok());
        assert!(it.close().is_ok());
        assert!(!it.next());
    }

    // ---------------------------------------------------------------
    // TimeRangedIterator
    // ---------------------------------------------------------------

    #[test]
    fn test_time_ranged_clips_inclusive() {
        let inner = Box::new(StreamsIterator::new(
            vec![stream("a", &[1, 2, 3, 4, 5])],
            Direction::Forward,
        ));
        let mut it = TimeRangedIterator::new(inner, 2, 4);
        assert_eq!(collect_entries(&mut it), vec![2, 3, 4]);
    }

    #[test]
    fn test_time_ranged_empty_window() {
        let inner = Box::new(StreamsIterator::new(
            vec![stream("a", &[10, 20])],
            Direction::Forward,
        ));
        let mut it = TimeRangedIterator::new(inner, 11, 19);
        assert_eq!(collect_entries(&mut it), Vec::<i64>::new());
    }

    // ---------------------------------------------------------------
    // ReversedEntryIterator
    // ---------------------------------------------------------------

    #[test]
    fn test_reversed_yields_descending() {
        let inner: Box<dyn EntryIterator> = Box::new(StreamsIterator::new(
            vec![stream("a", &[1, 2, 3])],
            Direction::Forward,
        ));
        let mut it = ReversedEntryIterator::new(inner).unwrap();
        assert_eq!(collect_entries(&mut it), vec![3, 2, 1]);
    }

    #[test]
    fn test_reversed_preserves_labels() {
        let inner: Box<dyn EntryIterator> = Box::new(StreamsIterator::new(
            vec![stream("left", &[1]), stream("right", &[2])],
            Direction::Forward,
        ));
        let mut it = ReversedEntryIterator::new(inner).unwrap();
        assert!(it.next());
        assert_eq!(it.labels(), "right");
        assert!(it.next());
        assert_eq!(it.labels(), "left");
    }

    // ---------------------------------------------------------------
    // Sample combinators
    // ---------------------------------------------------------------

    fn series(labels: &str, timestamps: &[i64]) -> Series {
        Series {
            labels: labels.to_string(),
            samples: timestamps
                .iter()
                .map(|&t| Sample {
                    timestamp: t,
                    value: 1.0,
                    hash: t as u64,
                })
                .collect(),
        }
    }

    #[test]
    fn test_multi_series_merges_ascending() {
        let mut it = MultiSeriesIterator::new(vec![series("a", &[1, 5]), series("b", &[2, 3])]);
        let mut out = Vec::new();
        while it.next() {
            out.push(it.sample().timestamp);
        }
        assert_eq!(out, vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_time_ranged_samples_clip() {
        let inner: Box<dyn SampleIterator> =
            Box::new(MultiSeriesIterator::new(vec![series("a", &[1, 2, 3, 4])]));
        let mut it = TimeRangedSampleIterator::new(inner, 2, 3);
        let mut out = Vec::new();
        while it.next() {
            out.push(it.sample().timestamp);
        }
        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn test_noop_iterator() {
        let mut it = NoopIterator;
        assert!(!EntryIterator::next(&mut it));
        assert!(EntryIterator::error(&it).is_none());
        assert!(EntryIterator::close(&mut it).is_ok());
    }
}
