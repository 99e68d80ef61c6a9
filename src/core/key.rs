//! Series keys: the categorical labels identifying one series of a panel.

use crate::error::{ForecastError, Result};
use serde::{Serialize, Serializer};
use std::fmt;

/// Ordered names of the key labels of a panel, e.g. `["state", "industry"]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeySchema {
    labels: Vec<String>,
}

impl KeySchema {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Positions of `keep` within this schema, in the order given.
    pub fn projection<S: AsRef<str>>(&self, keep: &[S]) -> Result<Vec<usize>> {
        keep.iter()
            .map(|label| {
                let label = label.as_ref();
                self.position(label).ok_or_else(|| {
                    ForecastError::InvalidParameter(format!(
                        "unknown key label '{}' (schema: {})",
                        label,
                        self.labels.join(", ")
                    ))
                })
            })
            .collect()
    }

    /// The schema restricted to `keep`.
    pub fn project<S: AsRef<str>>(&self, keep: &[S]) -> Result<KeySchema> {
        let positions = self.projection(keep)?;
        Ok(KeySchema {
            labels: positions.iter().map(|&i| self.labels[i].clone()).collect(),
        })
    }
}

/// The label values of one series, in schema order.
///
/// The empty key identifies the grand total of a fully aggregated panel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeriesKey(Vec<String>);

impl SeriesKey {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// The key of the fully aggregated series.
    pub fn total() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the labels at `positions` (see [`KeySchema::projection`]).
    pub fn project(&self, positions: &[usize]) -> SeriesKey {
        SeriesKey(positions.iter().map(|&i| self.0[i].clone()).collect())
    }
}

/// Labels joined with `/`; a `/` or `\` inside a label is escaped with `\`.
impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<total>");
        }
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            for c in label.chars() {
                if c == '/' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

impl Serialize for SeriesKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<S: Into<String>> FromIterator<S> for SeriesKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        SeriesKey::new(iter)
    }
}
