//! Line-processing Collaborator Interfaces
//!
//! The chunk does not interpret log lines itself. Query semantics (filtering,
//! parsing, rewriting, metric extraction) come from two caller-supplied
//! traits that iterators drive per line:
//!
//! - `Pipeline`: transforms/filters entries. Returning `None` drops the line
//!   silently; returning `Some` yields the (possibly rewritten) line and the
//!   labels parsed out of it.
//! - `SampleExtractor`: the numeric analogue, producing an `f64` per kept
//!   line.
//!
//! Both receive the decoded line as a borrowed slice that aliases pool-owned
//! memory: implementations must not retain it past the call. The iterator
//! copies whatever the pipeline returns before yielding, so nothing escapes.
//!
//! `Labels` is the minimal label model the chunk needs from its surroundings:
//! an immutable, sorted name/value set that can be hashed (to group the head
//! snapshot into per-label streams) and rendered in the conventional
//! `{name="value", ...}` form.

use std::borrow::Cow;
use std::fmt;
use std::hash::Hasher;

use twox_hash::XxHash64;

/// An immutable, sorted set of label name/value pairs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Labels {
    pairs: Vec<(String, String)>,
}

impl Labels {
    /// Build a label set; pairs are sorted by name
    pub fn new(mut pairs: Vec<(String, String)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self { pairs }
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Order-independent hash of the label set. Stable within a process;
    /// cross-process stability is not guaranteed.
    pub fn hash(&self) -> u64 {
        let mut h = XxHash64::with_seed(0);
        for (name, value) in &self.pairs {
            h.write(name.as_bytes());
            h.write(&[0xFF]);
            h.write(value.as_bytes());
            h.write(&[0xFF]);
        }
        h.finish()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value:?}")?;
        }
        write!(f, "}}")
    }
}

/// Per-line entry processor
pub trait Pipeline {
    /// Process one line under the stream's base labels. `None` drops the
    /// entry; `Some` yields the output line and the parsed labels. The input
    /// slice aliases pool-owned memory and must not be retained.
    fn process<'a>(&self, line: &'a [u8], labels: &Labels) -> Option<(Cow<'a, [u8]>, Labels)>;
}

/// Per-line sample extractor
pub trait SampleExtractor {
    /// Extract a sample value from one line. `None` drops the entry.
    fn process(&self, line: &[u8], labels: &Labels) -> Option<(f64, Labels)>;
}

/// Pass-through pipeline: keeps every line unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPipeline;

impl Pipeline for NoopPipeline {
    fn process<'a>(&self, line: &'a [u8], labels: &Labels) -> Option<(Cow<'a, [u8]>, Labels)> {
        Some((Cow::Borrowed(line), labels.clone()))
    }
}

/// Counts every line as a single sample
#[derive(Debug, Clone, Copy, Default)]
pub struct CountExtractor;

impl SampleExtractor for CountExtractor {
    fn process(&self, _line: &[u8], labels: &Labels) -> Option<(f64, Labels)> {
        Some((1.0, labels.clone()))
    }
}
