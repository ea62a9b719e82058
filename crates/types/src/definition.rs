//! Statistics definition documents
//!
//! A definition binds a monitored stream ("asset") to one or more named
//! groups, each requesting a set of statistical functions and optionally
//! a reset period with an anchor date. This is the JSON document the
//! engine consumes; authoring and storage of definitions live outside
//! this workspace.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::DefinitionError;
use crate::period::ResetPeriod;
use crate::value::ValueKind;

/// The statistical functions the engine knows how to maintain
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StatFunction {
    /// Number of observations in the current window
    Count,
    /// Smallest value observed in the current window
    Min,
    /// Largest value observed in the current window
    Max,
    /// Running mean (engine recurrence, see the processor crate)
    Avg,
    /// Running deviation estimate built on `avg`
    Std,
    /// Occurrence count per value bucket
    Dist,
    /// `dist` expressed as percentages
    DistProcent,
    /// Dwell time in seconds per value bucket
    DistSumTime,
    /// `distsumtime` expressed as percentages
    DistSumTimeProcent,
    /// Difference against the value at the end of the previous window
    Delta,
}

impl StatFunction {
    /// Canonical lowercase name, as used in definition documents and
    /// output-slot names
    pub fn as_str(&self) -> &'static str {
        match self {
            StatFunction::Count => "count",
            StatFunction::Min => "min",
            StatFunction::Max => "max",
            StatFunction::Avg => "avg",
            StatFunction::Std => "std",
            StatFunction::Dist => "dist",
            StatFunction::DistProcent => "distprocent",
            StatFunction::DistSumTime => "distsumtime",
            StatFunction::DistSumTimeProcent => "distsumtimeprocent",
            StatFunction::Delta => "delta",
        }
    }

    /// True for the bucket-based distribution functions (the ones that
    /// take `bucketsize`/`min`/`max` parameters)
    pub fn is_distribution(&self) -> bool {
        matches!(
            self,
            StatFunction::Dist
                | StatFunction::DistProcent
                | StatFunction::DistSumTime
                | StatFunction::DistSumTimeProcent
        )
    }
}

impl fmt::Display for StatFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested function with its optional parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRequest {
    /// Which function to maintain
    pub function: StatFunction,

    /// Bucket width for the distribution functions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucketsize: Option<f64>,

    /// Explicit lower bucket bound; when present the bucket array never
    /// grows below it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Explicit upper bucket bound; when present the bucket array never
    /// grows above it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FunctionRequest {
    /// A request with no parameters
    pub fn new(function: StatFunction) -> Self {
        Self {
            function,
            bucketsize: None,
            min: None,
            max: None,
        }
    }

    /// Set the bucket width
    pub fn with_bucketsize(mut self, bucketsize: f64) -> Self {
        self.bucketsize = Some(bucketsize);
        self
    }

    /// Set an explicit lower bound
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Set an explicit upper bound
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

/// One named group of functions over a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    /// Group name, unique within its definition
    pub name: String,

    /// The requested functions
    pub calculate: Vec<FunctionRequest>,

    /// Optional reset period; when present, live values are archived to
    /// history slots and cleared on this cadence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<ResetPeriod>,

    /// Optional anchor date phase-aligning the reset boundaries
    #[serde(
        default,
        rename = "start date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<String>,
}

impl GroupDefinition {
    /// A group with the given name and requests, no reset
    pub fn new(name: impl Into<String>, calculate: Vec<FunctionRequest>) -> Self {
        Self {
            name: name.into(),
            calculate,
            reset: None,
            start_date: None,
        }
    }

    /// Set the reset period
    pub fn with_reset(mut self, reset: ResetPeriod) -> Self {
        self.reset = Some(reset);
        self
    }

    /// Set the anchor date (ISO-8601 string)
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    /// Parse the anchor date, discarding any timezone offset
    ///
    /// Boundaries recur at the anchor's local wall-clock phase, so an
    /// offset-carrying anchor is reduced to its naive local time.
    pub fn anchor(&self) -> Result<Option<NaiveDateTime>, DefinitionError> {
        let raw = match &self.start_date {
            Some(raw) => raw.trim(),
            None => return Ok(None),
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(dt.naive_local()));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Some(dt));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Ok(Some(dt));
        }
        if let Ok(date) = raw.parse::<NaiveDate>() {
            return Ok(Some(date.and_hms_opt(0, 0, 0).unwrap_or_default()));
        }

        Err(DefinitionError::InvalidAnchor {
            group: self.name.clone(),
            value: raw.to_string(),
        })
    }
}

/// A full statistics definition for one monitored stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsDefinition {
    /// Identifier of the monitored stream
    pub asset: String,

    /// Name of this definition
    pub name: String,

    /// The groups to maintain
    pub groups: Vec<GroupDefinition>,
}

impl StatsDefinition {
    /// Validate the definition against the stream's value kind
    ///
    /// Checks everything that must hold before any group is registered:
    /// duplicate group names, anchor parseability, empty reset periods,
    /// and bucket-size parameters for distribution functions on numeric
    /// streams. A definition that fails here must not be registered at
    /// all.
    pub fn validate(&self, kind: ValueKind) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(DefinitionError::DuplicateGroup {
                    group: group.name.clone(),
                    definition: self.name.clone(),
                });
            }

            group.anchor()?;

            if let Some(reset) = &group.reset {
                if reset.is_zero() {
                    return Err(DefinitionError::EmptyPeriod {
                        group: group.name.clone(),
                        spec: reset.to_string(),
                    });
                }
            }

            for request in &group.calculate {
                if !request.function.is_distribution() {
                    continue;
                }
                match request.bucketsize {
                    // Boolean streams use a fixed two-bucket scheme
                    None if kind == ValueKind::Numeric => {
                        return Err(DefinitionError::MissingBucketSize {
                            function: request.function.to_string(),
                            group: group.name.clone(),
                        });
                    }
                    Some(size) if size <= 0.0 => {
                        return Err(DefinitionError::InvalidBucketSize {
                            function: request.function.to_string(),
                            group: group.name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
