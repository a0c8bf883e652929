//! Functional unit pool.
//!
//! This module implements the resources Execute issues instructions into. It provides:
//! 1. **Descriptions:** Serializable unit descriptions with op-class sets, latencies and
//!    ordered mask/match timing rules ([`FuDescription`], [`TimingRule`]).
//! 2. **Pool configuration:** [`FuPoolConfig`], whose default is the CVA6 pool.
//! 3. **Runtime pool:** [`FuPool`], which answers allocation queries in pool order and tracks
//!    each unit's next free issue cycle and in-flight instructions.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::common::op_class::{FLOAT_SIMD_CLASSES, VECTOR_CLASSES};
use crate::common::{ConfigError, Cycle, OpClass, OpClassSet, ThreadId};
use crate::core::inst::{InstId, StaticInst};

/// Live pipeline state visible to a programmatic commit latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueContext {
    /// Cycle of issue.
    pub cycle: Cycle,
    /// Issuing thread.
    pub thread: ThreadId,
    /// Instructions of the thread already in flight in Execute.
    pub in_flight: usize,
}

/// A pure function computing extra commit latency at issue time.
#[derive(Clone)]
pub struct CommitLatencyFn(Arc<dyn Fn(&StaticInst, &IssueContext) -> Cycle + Send + Sync>);

impl CommitLatencyFn {
    /// Wraps `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&StaticInst, &IssueContext) -> Cycle + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluates the latency for `inst` issued in `ctx`.
    pub fn eval(&self, inst: &StaticInst, ctx: &IssueContext) -> Cycle {
        (self.0)(inst, ctx)
    }
}

impl fmt::Debug for CommitLatencyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommitLatencyFn(..)")
    }
}

/// A timing rule refining how a unit handles a subset of its instructions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRule {
    /// Mask applied to the encoding before comparing with `match`
    #[serde(default)]
    pub mask: u64,

    /// Value the masked encoding must equal
    #[serde(default, rename = "match")]
    pub match_bits: u64,

    /// Matching instructions are not executed by this unit
    #[serde(default)]
    pub suppress: bool,

    /// Extra cycles to stall commit
    #[serde(default)]
    pub extra_commit_lat: Cycle,

    /// Extra commit cycles computed at issue
    #[serde(skip)]
    pub extra_commit_lat_fn: Option<CommitLatencyFn>,

    /// Extra cycles before dependents see the result. Zero on a memory reference marks the result unpredictable.
    #[serde(default)]
    pub extra_assumed_lat: Cycle,

    /// Per-source-operand early issue allowance, the last entry repeating
    #[serde(default)]
    pub src_regs_relative_lats: Vec<Cycle>,

    /// Op classes the rule applies to (empty means any)
    #[serde(default)]
    pub op_classes: OpClassSet,

    /// Free-form label
    #[serde(default)]
    pub description: String,
}

impl TimingRule {
    /// A rule matching every instruction, labelled `description`.
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_owned(),
            ..Self::default()
        }
    }

    /// Whether the rule applies to `inst`.
    pub fn matches(&self, inst: &StaticInst) -> bool {
        self.op_classes.provides(inst.op_class) && (inst.encoding & self.mask) == self.match_bits
    }

    /// Static plus programmatic extra commit latency.
    pub fn extra_commit_latency(&self, inst: &StaticInst, ctx: &IssueContext) -> Cycle {
        let dynamic = self
            .extra_commit_lat_fn
            .as_ref()
            .map_or(0, |f| f.eval(inst, ctx));
        self.extra_commit_lat + dynamic
    }
}

/// Description of one functional unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuDescription {
    /// Name used in traces
    #[serde(default)]
    pub name: String,

    /// Op classes the unit executes (empty means any)
    #[serde(default)]
    pub op_classes: OpClassSet,

    /// Cycles from issue to the end of the unit's pipeline
    #[serde(default = "FuDescription::default_lat")]
    pub op_lat: Cycle,

    /// Cycles after an issue before the unit accepts another instruction
    #[serde(default = "FuDescription::default_lat")]
    pub issue_lat: Cycle,

    /// Ordered timing rules
    #[serde(default)]
    pub timings: Vec<TimingRule>,

    /// Units whose results this unit cannot receive early
    #[serde(default, rename = "cantForwardFromFUIndices")]
    pub cant_forward_from_fu_indices: Vec<usize>,
}

impl FuDescription {
    fn default_lat() -> Cycle {
        1
    }

    /// A unit named `name` executing `classes` with the given operation latency.
    pub fn new(name: &str, classes: &[OpClass], op_lat: Cycle) -> Self {
        Self {
            name: name.to_owned(),
            op_classes: OpClassSet::of(classes),
            op_lat,
            issue_lat: 1,
            timings: Vec::new(),
            cant_forward_from_fu_indices: Vec::new(),
        }
    }

    /// Sets the issue latency.
    #[must_use]
    pub fn with_issue_lat(mut self, issue_lat: Cycle) -> Self {
        self.issue_lat = issue_lat;
        self
    }

    /// Appends a timing rule.
    #[must_use]
    pub fn with_timing(mut self, rule: TimingRule) -> Self {
        self.timings.push(rule);
        self
    }

    /// Whether the unit's op-class set admits `op`. Every unit admits `No_OpClass`.
    pub fn provides(&self, op: OpClass) -> bool {
        op == OpClass::NoOpClass || self.op_classes.provides(op)
    }

    /// The first timing rule matching `inst`, in declaration order.
    pub fn find_timing(&self, inst: &StaticInst) -> Option<&TimingRule> {
        self.timings.iter().find(|rule| rule.matches(inst))
    }

    /// Whether the unit executes `inst`: its class is admitted and the governing rule does not suppress it.
    pub fn accepts(&self, inst: &StaticInst) -> bool {
        self.provides(inst.op_class) && !self.find_timing(inst).is_some_and(|rule| rule.suppress)
    }
}

/// The pool of functional units, in query order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuPoolConfig {
    /// Units in pool order
    #[serde(default = "FuPoolConfig::cva6_units")]
    pub func_units: Vec<FuDescription>,
}

impl FuPoolConfig {
    /// A pool made of `units`.
    pub fn new(units: Vec<FuDescription>) -> Self {
        Self { func_units: units }
    }

    /// The CVA6 default units: two integer ALUs, multiplier, divider, float/SIMD, predicate,
    /// memory, misc and vector units.
    pub fn cva6_units() -> Vec<FuDescription> {
        let int = || {
            FuDescription::new("Int", &[OpClass::IntAlu], 3).with_timing(TimingRule {
                src_regs_relative_lats: vec![2],
                ..TimingRule::new("Int")
            })
        };
        vec![
            int(),
            int(),
            FuDescription::new("IntMul", &[OpClass::IntMult], 3).with_timing(TimingRule {
                src_regs_relative_lats: vec![0],
                ..TimingRule::new("Mul")
            }),
            FuDescription::new("IntDiv", &[OpClass::IntDiv], 9).with_issue_lat(9),
            FuDescription::new("FloatSimd", FLOAT_SIMD_CLASSES, 6).with_timing(TimingRule {
                src_regs_relative_lats: vec![2],
                ..TimingRule::new("FloatSimd")
            }),
            FuDescription::new("Pred", &[OpClass::SimdPredAlu], 3).with_timing(TimingRule {
                src_regs_relative_lats: vec![2],
                ..TimingRule::new("Pred")
            }),
            FuDescription::new(
                "Mem",
                &[
                    OpClass::MemRead,
                    OpClass::MemWrite,
                    OpClass::FloatMemRead,
                    OpClass::FloatMemWrite,
                ],
                1,
            )
            .with_timing(TimingRule {
                src_regs_relative_lats: vec![1],
                extra_assumed_lat: 2,
                ..TimingRule::new("Mem")
            }),
            FuDescription::new("Misc", &[OpClass::IprAccess, OpClass::InstPrefetch], 1),
            FuDescription::new("Vec", VECTOR_CLASSES, 1),
        ]
    }

    /// Checks the pool is non-empty and every forwarding restriction names a unit in it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyFuPool`] or [`ConfigError::ForwardingIndex`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.func_units.is_empty() {
            return Err(ConfigError::EmptyFuPool);
        }
        for (unit, desc) in self.func_units.iter().enumerate() {
            if let Some(&index) = desc
                .cant_forward_from_fu_indices
                .iter()
                .find(|&&index| index >= self.func_units.len())
            {
                return Err(ConfigError::ForwardingIndex { unit, index });
            }
        }
        Ok(())
    }

    /// Whether some unit's op-class set admits `op`.
    pub fn accepts_op_class(&self, op: OpClass) -> bool {
        self.func_units.iter().any(|desc| desc.provides(op))
    }

    /// Whether some unit executes `inst`.
    pub fn services(&self, inst: &StaticInst) -> bool {
        self.func_units.iter().any(|desc| desc.accepts(inst))
    }
}

impl Default for FuPoolConfig {
    fn default() -> Self {
        Self::new(Self::cva6_units())
    }
}

/// The outcome of matching an instruction against one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Index of the unit in the pool.
    pub fu_index: usize,
    /// Base operation latency of the unit.
    pub op_lat: Cycle,
    /// Extra commit latency from the governing rule.
    pub extra_commit_lat: Cycle,
    /// Extra result visibility latency from the governing rule.
    pub extra_assumed_lat: Cycle,
    /// Per-source relative latencies from the governing rule.
    pub src_rel_lats: Vec<Cycle>,
}

impl Allocation {
    /// Cycles from issue until the instruction may commit.
    pub const fn latency(&self) -> Cycle {
        self.op_lat + self.extra_commit_lat
    }
}

/// Runtime state of one functional unit.
#[derive(Debug)]
pub struct FuPipeline {
    desc: FuDescription,
    next_insert_cycle: Cycle,
    in_flight: VecDeque<(InstId, Cycle)>,
}

impl FuPipeline {
    fn new(desc: FuDescription) -> Self {
        Self {
            desc,
            next_insert_cycle: 0,
            in_flight: VecDeque::new(),
        }
    }

    /// The unit's description.
    pub const fn description(&self) -> &FuDescription {
        &self.desc
    }

    /// Whether a new instruction may enter at `now`.
    pub const fn can_insert(&self, now: Cycle) -> bool {
        now >= self.next_insert_cycle
    }

    /// Instructions still travelling through the unit.
    pub fn occupancy(&self) -> usize {
        self.in_flight.len()
    }

    fn allocation(&self, fu_index: usize, inst: &StaticInst, ctx: &IssueContext) -> Option<Allocation> {
        if !self.desc.provides(inst.op_class) {
            return None;
        }
        let rule = self.desc.find_timing(inst);
        if rule.is_some_and(|r| r.suppress) {
            return None;
        }
        Some(Allocation {
            fu_index,
            op_lat: self.desc.op_lat,
            extra_commit_lat: rule.map_or(0, |r| r.extra_commit_latency(inst, ctx)),
            extra_assumed_lat: rule.map_or(0, |r| r.extra_assumed_lat),
            src_rel_lats: rule.map_or_else(Vec::new, |r| r.src_regs_relative_lats.clone()),
        })
    }
}

/// The functional unit pool owned by Execute.
#[derive(Debug)]
pub struct FuPool {
    units: Vec<FuPipeline>,
}

impl FuPool {
    /// Builds the runtime pool from a validated configuration.
    pub fn new(config: &FuPoolConfig) -> Self {
        Self {
            units: config
                .func_units
                .iter()
                .cloned()
                .map(FuPipeline::new)
                .collect(),
        }
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when the pool has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit `index`.
    pub fn unit(&self, index: usize) -> Option<&FuPipeline> {
        self.units.get(index)
    }

    /// Every unit that accepts `inst` and is free at `ctx.cycle`, in pool order.
    pub fn candidates<'a>(
        &'a self,
        inst: &'a StaticInst,
        ctx: &'a IssueContext,
    ) -> impl Iterator<Item = Allocation> + 'a {
        self.units
            .iter()
            .enumerate()
            .filter(move |(_, unit)| unit.can_insert(ctx.cycle))
            .filter_map(move |(index, unit)| unit.allocation(index, inst, ctx))
    }

    /// The first free unit accepting `inst`. Does not change pool state.
    pub fn allocate(&self, inst: &StaticInst, ctx: &IssueContext) -> Option<Allocation> {
        self.candidates(inst, ctx).next()
    }

    /// Whether any unit executes `inst`, busy or not.
    pub fn any_accepts(&self, inst: &StaticInst) -> bool {
        self.units.iter().any(|unit| unit.desc.accepts(inst))
    }

    /// Whether unit `consumer` is barred from receiving forwarded results of unit `producer`.
    pub fn cant_forward(&self, consumer: usize, producer: usize) -> bool {
        self.units
            .get(consumer)
            .is_some_and(|unit| unit.desc.cant_forward_from_fu_indices.contains(&producer))
    }

    /// Occupies the allocated unit with `id` from `now`.
    pub fn issue(&mut self, alloc: &Allocation, id: InstId, now: Cycle) {
        if let Some(unit) = self.units.get_mut(alloc.fu_index) {
            unit.next_insert_cycle = now + unit.desc.issue_lat.max(1);
            unit.in_flight.push_back((id, now + alloc.op_lat));
            trace!(
                target: "fu",
                unit = alloc.fu_index,
                inst = %id,
                done = now + alloc.op_lat,
                "issue"
            );
        }
    }

    /// Removes instructions that reached the end of their unit by `now`. Returns how many left.
    pub fn retire(&mut self, now: Cycle) -> usize {
        let mut retired = 0;
        for unit in &mut self.units {
            while unit.in_flight.front().is_some_and(|&(_, done)| done <= now) {
                let _ = unit.in_flight.pop_front();
                retired += 1;
            }
        }
        retired
    }

    /// True when no instruction occupies any unit.
    pub fn is_idle(&self) -> bool {
        self.units.iter().all(|unit| unit.in_flight.is_empty())
    }

    /// Earliest future cycle at which some unit frees a slot or completes an instruction.
    pub fn next_event(&self, now: Cycle) -> Option<Cycle> {
        self.units
            .iter()
            .flat_map(|unit| {
                let done = unit.in_flight.front().map(|&(_, done)| done);
                let insert = (unit.next_insert_cycle > now).then_some(unit.next_insert_cycle);
                done.into_iter().chain(insert)
            })
            .filter(|&cycle| cycle > now)
            .min()
    }
}
