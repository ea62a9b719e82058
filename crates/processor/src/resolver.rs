//! Dependency resolution for requested function sets
//!
//! A group's requested functions rarely stand alone: `std` needs the
//! running `avg`, which in turn needs `count`; the percentage variants
//! need their base distributions; and distributions on numeric streams
//! need live `min`/`max` unless the request pins explicit bounds. The
//! resolver closes a request list over these rules so the aggregate
//! group always maintains every prerequisite.

use std::collections::BTreeMap;

use statistician_types::{FunctionRequest, StatFunction, ValueKind};

/// Parameters attached to a resolved function
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FunctionParams {
    pub bucketsize: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl From<&FunctionRequest> for FunctionParams {
    fn from(request: &FunctionRequest) -> Self {
        Self {
            bucketsize: request.bucketsize,
            min: request.min,
            max: request.max,
        }
    }
}

/// One entry in a resolved set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFunction {
    pub params: FunctionParams,
    /// False for functions pulled in as prerequisites
    pub explicit: bool,
}

/// The closed set of functions a group maintains
///
/// Iteration order is the `StatFunction` declaration order, which is
/// also the fixed execution order of an `observe` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSet {
    functions: BTreeMap<StatFunction, ResolvedFunction>,
}

impl ResolvedSet {
    pub fn contains(&self, function: StatFunction) -> bool {
        self.functions.contains_key(&function)
    }

    /// Parameters for a resolved function; defaults when absent
    pub fn params(&self, function: StatFunction) -> FunctionParams {
        self.functions
            .get(&function)
            .map(|f| f.params)
            .unwrap_or_default()
    }

    pub fn get(&self, function: StatFunction) -> Option<&ResolvedFunction> {
        self.functions.get(&function)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatFunction, &ResolvedFunction)> {
        self.functions.iter().map(|(f, r)| (*f, r))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Insert a prerequisite unless already present; explicit requests
    /// are never overwritten
    fn require(&mut self, function: StatFunction, params: FunctionParams) -> bool {
        if self.functions.contains_key(&function) {
            return false;
        }
        self.functions.insert(
            function,
            ResolvedFunction {
                params,
                explicit: false,
            },
        );
        true
    }
}

/// Resolve a request list into its dependency closure
///
/// Rules, applied until fixpoint:
/// - `std` requires `avg`; `avg` requires `count`
/// - `distprocent` requires `dist` with the same parameters;
///   `distsumtimeprocent` requires `distsumtime` with the same parameters
/// - `dist` and `distsumtime` require live `min`/`max` on numeric
///   streams, except for bounds the request pins explicitly
///
/// Implicit prerequisites carry no parameters of their own (the percent
/// variants hand their parameters down to their base distribution).
pub fn resolve(requests: &[FunctionRequest], kind: ValueKind) -> ResolvedSet {
    let mut set = ResolvedSet::default();
    for request in requests {
        // A repeated request for the same function replaces the earlier one
        set.functions.insert(
            request.function,
            ResolvedFunction {
                params: request.into(),
                explicit: true,
            },
        );
    }

    loop {
        let mut added = false;
        let snapshot: Vec<(StatFunction, FunctionParams)> =
            set.iter().map(|(f, r)| (f, r.params)).collect();

        for (function, params) in snapshot {
            match function {
                StatFunction::Std => {
                    added |= set.require(StatFunction::Avg, FunctionParams::default());
                }
                StatFunction::Avg => {
                    added |= set.require(StatFunction::Count, FunctionParams::default());
                }
                StatFunction::DistProcent => {
                    added |= set.require(StatFunction::Dist, params);
                }
                StatFunction::DistSumTimeProcent => {
                    added |= set.require(StatFunction::DistSumTime, params);
                }
                StatFunction::Dist | StatFunction::DistSumTime
                    if kind == ValueKind::Numeric =>
                {
                    if params.min.is_none() {
                        added |= set.require(StatFunction::Min, FunctionParams::default());
                    }
                    if params.max.is_none() {
                        added |= set.require(StatFunction::Max, FunctionParams::default());
                    }
                }
                _ => {}
            }
        }

        if !added {
            break;
        }
    }

    set
}
