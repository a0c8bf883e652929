//! Configuration for the CVA6 pipeline model.
//!
//! This module defines the single flat parameter surface of the pipeline. It provides:
//! 1. **Defaults:** The documented baseline value of every stage width, buffer size and delay.
//! 2. **Structure:** [`Config`], deserialized from JSON with the parameter names used by CVA6
//!    configuration scripts (`fetch1FetchLimit`, `executeLSQStoreBufferSize`, ...).
//! 3. **Validation:** [`Config::validate`], run once when a pipeline is built. An invalid
//!    configuration never reaches the engine.
//!
//! Configuration is supplied as JSON (see [`Config::from_json`]) or built from `Config::default()`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::{ConfigError, Cycle, INST_BYTES, OpClass};

pub use crate::core::units::fu::{CommitLatencyFn, FuDescription, FuPoolConfig, TimingRule};

/// Default configuration constants.
///
/// These values match the CVA6 baseline and apply whenever a JSON document leaves a field out.
mod defaults {
    use crate::common::Cycle;

    /// Number of hardware thread contexts.
    pub const NUM_THREADS: usize = 1;

    /// System cache line size in bytes.
    ///
    /// Used wherever a fetch or memory width is configured as zero.
    pub const CACHE_LINE_SIZE: u64 = 64;

    pub const FETCH1_FETCH_LIMIT: usize = 1;
    pub const FETCH1_LINE_SNAP_WIDTH: u64 = 0;
    pub const FETCH1_LINE_WIDTH: u64 = 0;
    pub const FETCH1_TO_FETCH2_FORWARD_DELAY: Cycle = 1;
    pub const FETCH1_TO_FETCH2_BACKWARD_DELAY: Cycle = 1;

    pub const FETCH2_INPUT_BUFFER_SIZE: usize = 2;
    pub const FETCH2_TO_DECODE_FORWARD_DELAY: Cycle = 1;

    pub const DECODE_INPUT_BUFFER_SIZE: usize = 3;
    pub const DECODE_TO_EXECUTE_FORWARD_DELAY: Cycle = 1;
    pub const DECODE_INPUT_WIDTH: usize = 2;

    pub const EXECUTE_INPUT_WIDTH: usize = 2;
    pub const EXECUTE_ISSUE_LIMIT: usize = 2;
    pub const EXECUTE_MEMORY_ISSUE_LIMIT: usize = 1;
    pub const EXECUTE_COMMIT_LIMIT: usize = 2;
    pub const EXECUTE_MEMORY_COMMIT_LIMIT: usize = 1;
    pub const EXECUTE_INPUT_BUFFER_SIZE: usize = 7;
    pub const EXECUTE_MEMORY_WIDTH: u64 = 0;
    pub const EXECUTE_MAX_ACCESSES_IN_MEMORY: usize = 2;
    pub const EXECUTE_BRANCH_DELAY: Cycle = 1;

    pub const LSQ_MAX_STORE_BUFFER_STORES_PER_CYCLE: usize = 2;
    pub const LSQ_REQUESTS_QUEUE_SIZE: usize = 1;
    pub const LSQ_TRANSFERS_QUEUE_SIZE: usize = 2;
    pub const LSQ_STORE_BUFFER_SIZE: usize = 5;

    /// Branch Target Buffer entries for the BTB predictor.
    pub const BTB_SIZE: usize = 256;
}

/// Thread scheduling policy applied at Fetch1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ThreadPolicy {
    /// Only thread 0 is ever fetched. Invalid with more than one thread.
    SingleThreaded,
    /// Grants rotate deterministically through the eligible threads.
    #[default]
    RoundRobin,
    /// Each cycle the priority order is a fresh pseudo-random shuffle.
    Random,
}

/// Branch predictor built by the simulator driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BranchPredictorKind {
    /// Never predicts taken.
    #[default]
    Static,
    /// Direct-mapped branch target buffer.
    #[serde(alias = "BTB")]
    Btb,
}

/// Complete pipeline configuration.
///
/// Every field is optional in JSON and falls back to the CVA6 default.
///
/// # Examples
///
/// ```
/// use cva6_core::config::{Config, ThreadPolicy};
///
/// let json = r#"{
///     "numThreads": 2,
///     "threadPolicy": "RoundRobin",
///     "fetch1LineWidth": 16,
///     "decodeInputWidth": 4,
///     "executeLSQStoreBufferSize": 8,
///     "enableIdling": false
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.num_threads, 2);
/// assert_eq!(config.thread_policy, ThreadPolicy::RoundRobin);
/// assert_eq!(config.line_width(), 16);
/// assert_eq!(config.line_snap_width(), 64);
/// assert_eq!(config.execute_lsq_store_buffer_size, 8);
/// assert_eq!(config.execute_issue_limit, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Number of hardware thread contexts sharing the pipeline
    #[serde(default = "Config::default_num_threads")]
    pub num_threads: usize,

    /// System cache line size in bytes (fallback for zero widths)
    #[serde(default = "Config::default_cache_line_size")]
    pub cache_line_size: u64,

    /// Thread scheduling policy
    #[serde(default)]
    pub thread_policy: ThreadPolicy,

    /// Number of line fetches allowable in flight at once
    #[serde(default = "Config::default_fetch1_fetch_limit")]
    pub fetch1_fetch_limit: usize,

    /// Fetch line snap size in bytes (0 means the cache line size)
    #[serde(default = "Config::default_fetch1_line_snap_width")]
    pub fetch1_line_snap_width: u64,

    /// Maximum fetch size in bytes (0 means the cache line size)
    #[serde(default = "Config::default_fetch1_line_width")]
    pub fetch1_line_width: u64,

    /// Forward delay from Fetch1 to Fetch2 (1 means next cycle)
    #[serde(default = "Config::default_fetch1_to_fetch2_forward_delay")]
    pub fetch1_to_fetch2_forward_delay: Cycle,

    /// Delay between a redirect reaching Fetch1 and the restarted fetch (0 means same cycle)
    #[serde(default = "Config::default_fetch1_to_fetch2_backward_delay")]
    pub fetch1_to_fetch2_backward_delay: Cycle,

    /// Size of the Fetch2 input buffer in lines
    #[serde(default = "Config::default_fetch2_input_buffer_size")]
    pub fetch2_input_buffer_size: usize,

    /// Forward delay from Fetch2 to Decode
    #[serde(default = "Config::default_fetch2_to_decode_forward_delay")]
    pub fetch2_to_decode_forward_delay: Cycle,

    /// Allow Fetch2 to cross input lines to fill its output each cycle
    #[serde(default = "Config::default_true")]
    pub fetch2_cycle_input: bool,

    /// Size of the Decode input buffer in cycles-worth of instructions
    #[serde(default = "Config::default_decode_input_buffer_size")]
    pub decode_input_buffer_size: usize,

    /// Forward delay from Decode to Execute
    #[serde(default = "Config::default_decode_to_execute_forward_delay")]
    pub decode_to_execute_forward_delay: Cycle,

    /// Width in instructions of the input to Decode (and of Decode itself)
    #[serde(default = "Config::default_decode_input_width")]
    pub decode_input_width: usize,

    /// Allow Decode to pack instructions from more than one input cycle
    #[serde(default = "Config::default_true")]
    pub decode_cycle_input: bool,

    /// Width in instructions of the input to Execute
    #[serde(default = "Config::default_execute_input_width")]
    pub execute_input_width: usize,

    /// Allow Execute to use instructions from more than one input cycle
    #[serde(default = "Config::default_true")]
    pub execute_cycle_input: bool,

    /// Instructions issued per cycle
    #[serde(default = "Config::default_execute_issue_limit")]
    pub execute_issue_limit: usize,

    /// Memory instructions issued per cycle
    #[serde(default = "Config::default_execute_memory_issue_limit")]
    pub execute_memory_issue_limit: usize,

    /// Instructions committed per cycle
    #[serde(default = "Config::default_execute_commit_limit")]
    pub execute_commit_limit: usize,

    /// Memory references committed per cycle
    #[serde(default = "Config::default_execute_memory_commit_limit")]
    pub execute_memory_commit_limit: usize,

    /// Size of the Execute input buffer in cycles-worth of instructions
    #[serde(default = "Config::default_execute_input_buffer_size")]
    pub execute_input_buffer_size: usize,

    /// Width and snap in bytes of the data memory interface (0 means the cache line size)
    #[serde(default = "Config::default_execute_memory_width")]
    pub execute_memory_width: u64,

    /// Concurrent accesses allowed to the data memory system
    #[serde(default = "Config::default_execute_max_accesses_in_memory")]
    pub execute_max_accesses_in_memory: usize,

    /// Stores the store buffer may issue per cycle
    #[serde(
        rename = "executeLSQMaxStoreBufferStoresPerCycle",
        alias = "executeLsqMaxStoreBufferStoresPerCycle",
        default = "Config::default_lsq_max_store_buffer_stores_per_cycle"
    )]
    pub execute_lsq_max_store_buffer_stores_per_cycle: usize,

    /// Size of the LSQ requests (address translation) queue
    #[serde(
        rename = "executeLSQRequestsQueueSize",
        alias = "executeLsqRequestsQueueSize",
        default = "Config::default_lsq_requests_queue_size"
    )]
    pub execute_lsq_requests_queue_size: usize,

    /// Size of the LSQ transfers (memory transaction) queue
    #[serde(
        rename = "executeLSQTransfersQueueSize",
        alias = "executeLsqTransfersQueueSize",
        default = "Config::default_lsq_transfers_queue_size"
    )]
    pub execute_lsq_transfers_queue_size: usize,

    /// Size of the LSQ store buffer
    #[serde(
        rename = "executeLSQStoreBufferSize",
        alias = "executeLsqStoreBufferSize",
        default = "Config::default_lsq_store_buffer_size"
    )]
    pub execute_lsq_store_buffer_size: usize,

    /// Delay from Execute deciding to branch and Fetch1 seeing it
    #[serde(default = "Config::default_execute_branch_delay")]
    pub execute_branch_delay: Cycle,

    /// Functional unit pool
    #[serde(default)]
    pub execute_func_units: FuPoolConfig,

    /// Attribute trace times to commit
    #[serde(default = "Config::default_true")]
    pub execute_set_trace_time_on_commit: bool,

    /// Attribute trace times to issue
    #[serde(default)]
    pub execute_set_trace_time_on_issue: bool,

    /// Allow memory references to enter the LSQ before reaching the head of the in-flight queue
    #[serde(default = "Config::default_true")]
    pub execute_allow_early_memory_issue: bool,

    /// Skip cycles while the pipeline is idle
    #[serde(default = "Config::default_true")]
    pub enable_idling: bool,

    /// Branch predictor built by the simulator driver
    #[serde(default)]
    pub branch_predictor: BranchPredictorKind,

    /// Branch Target Buffer entries
    #[serde(default = "Config::default_btb_size")]
    pub btb_size: usize,
}

impl Config {
    fn default_num_threads() -> usize {
        defaults::NUM_THREADS
    }

    fn default_cache_line_size() -> u64 {
        defaults::CACHE_LINE_SIZE
    }

    fn default_true() -> bool {
        true
    }

    fn default_fetch1_fetch_limit() -> usize {
        defaults::FETCH1_FETCH_LIMIT
    }

    fn default_fetch1_line_snap_width() -> u64 {
        defaults::FETCH1_LINE_SNAP_WIDTH
    }

    fn default_fetch1_line_width() -> u64 {
        defaults::FETCH1_LINE_WIDTH
    }

    fn default_fetch1_to_fetch2_forward_delay() -> Cycle {
        defaults::FETCH1_TO_FETCH2_FORWARD_DELAY
    }

    fn default_fetch1_to_fetch2_backward_delay() -> Cycle {
        defaults::FETCH1_TO_FETCH2_BACKWARD_DELAY
    }

    fn default_fetch2_input_buffer_size() -> usize {
        defaults::FETCH2_INPUT_BUFFER_SIZE
    }

    fn default_fetch2_to_decode_forward_delay() -> Cycle {
        defaults::FETCH2_TO_DECODE_FORWARD_DELAY
    }

    fn default_decode_input_buffer_size() -> usize {
        defaults::DECODE_INPUT_BUFFER_SIZE
    }

    fn default_decode_to_execute_forward_delay() -> Cycle {
        defaults::DECODE_TO_EXECUTE_FORWARD_DELAY
    }

    fn default_decode_input_width() -> usize {
        defaults::DECODE_INPUT_WIDTH
    }

    fn default_execute_input_width() -> usize {
        defaults::EXECUTE_INPUT_WIDTH
    }

    fn default_execute_issue_limit() -> usize {
        defaults::EXECUTE_ISSUE_LIMIT
    }

    fn default_execute_memory_issue_limit() -> usize {
        defaults::EXECUTE_MEMORY_ISSUE_LIMIT
    }

    fn default_execute_commit_limit() -> usize {
        defaults::EXECUTE_COMMIT_LIMIT
    }

    fn default_execute_memory_commit_limit() -> usize {
        defaults::EXECUTE_MEMORY_COMMIT_LIMIT
    }

    fn default_execute_input_buffer_size() -> usize {
        defaults::EXECUTE_INPUT_BUFFER_SIZE
    }

    fn default_execute_memory_width() -> u64 {
        defaults::EXECUTE_MEMORY_WIDTH
    }

    fn default_execute_max_accesses_in_memory() -> usize {
        defaults::EXECUTE_MAX_ACCESSES_IN_MEMORY
    }

    fn default_lsq_max_store_buffer_stores_per_cycle() -> usize {
        defaults::LSQ_MAX_STORE_BUFFER_STORES_PER_CYCLE
    }

    fn default_lsq_requests_queue_size() -> usize {
        defaults::LSQ_REQUESTS_QUEUE_SIZE
    }

    fn default_lsq_transfers_queue_size() -> usize {
        defaults::LSQ_TRANSFERS_QUEUE_SIZE
    }

    fn default_lsq_store_buffer_size() -> usize {
        defaults::LSQ_STORE_BUFFER_SIZE
    }

    fn default_execute_branch_delay() -> Cycle {
        defaults::EXECUTE_BRANCH_DELAY
    }

    fn default_btb_size() -> usize {
        defaults::BTB_SIZE
    }

    /// Parses a JSON document and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed documents and any validation error otherwise.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as [`Config::from_json`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Fetch line snap width in bytes, with zero resolved to the cache line size.
    pub fn line_snap_width(&self) -> u64 {
        if self.fetch1_line_snap_width == 0 {
            self.cache_line_size
        } else {
            self.fetch1_line_snap_width
        }
    }

    /// Fetch line width in bytes, with zero resolved to the cache line size.
    pub fn line_width(&self) -> u64 {
        if self.fetch1_line_width == 0 {
            self.cache_line_size
        } else {
            self.fetch1_line_width
        }
    }

    /// Data memory interface width in bytes, with zero resolved to the cache line size.
    pub fn memory_width(&self) -> u64 {
        if self.execute_memory_width == 0 {
            self.cache_line_size
        } else {
            self.execute_memory_width
        }
    }

    /// Checks every parameter constraint.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let delays = [
            ("fetch1ToFetch2ForwardDelay", self.fetch1_to_fetch2_forward_delay),
            ("fetch2ToDecodeForwardDelay", self.fetch2_to_decode_forward_delay),
            ("decodeToExecuteForwardDelay", self.decode_to_execute_forward_delay),
            ("executeBranchDelay", self.execute_branch_delay),
        ];
        for (name, value) in delays {
            if value < 1 {
                return Err(ConfigError::DelayTooShort {
                    name,
                    value,
                    min: 1,
                });
            }
        }

        let counts = [
            ("numThreads", self.num_threads),
            ("fetch1FetchLimit", self.fetch1_fetch_limit),
            ("fetch2InputBufferSize", self.fetch2_input_buffer_size),
            ("decodeInputBufferSize", self.decode_input_buffer_size),
            ("decodeInputWidth", self.decode_input_width),
            ("executeInputWidth", self.execute_input_width),
            ("executeIssueLimit", self.execute_issue_limit),
            ("executeMemoryIssueLimit", self.execute_memory_issue_limit),
            ("executeCommitLimit", self.execute_commit_limit),
            ("executeMemoryCommitLimit", self.execute_memory_commit_limit),
            ("executeInputBufferSize", self.execute_input_buffer_size),
            ("executeMaxAccessesInMemory", self.execute_max_accesses_in_memory),
            (
                "executeLSQMaxStoreBufferStoresPerCycle",
                self.execute_lsq_max_store_buffer_stores_per_cycle,
            ),
            ("executeLSQRequestsQueueSize", self.execute_lsq_requests_queue_size),
            ("executeLSQTransfersQueueSize", self.execute_lsq_transfers_queue_size),
            ("executeLSQStoreBufferSize", self.execute_lsq_store_buffer_size),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::ZeroParameter { name });
            }
        }
        if self.cache_line_size == 0 {
            return Err(ConfigError::ZeroParameter {
                name: "cacheLineSize",
            });
        }
        if self.branch_predictor == BranchPredictorKind::Btb && self.btb_size == 0 {
            return Err(ConfigError::ZeroParameter { name: "btbSize" });
        }

        self.validate_line_geometry()?;

        if self.thread_policy == ThreadPolicy::SingleThreaded && self.num_threads > 1 {
            return Err(ConfigError::SingleThreadedPolicy {
                threads: self.num_threads,
            });
        }
        if self.execute_set_trace_time_on_commit && self.execute_set_trace_time_on_issue {
            return Err(ConfigError::TraceTimeConflict);
        }

        self.execute_func_units.validate()?;
        for op_class in [OpClass::IntAlu, OpClass::MemRead, OpClass::MemWrite] {
            if !self.execute_func_units.accepts_op_class(op_class) {
                return Err(ConfigError::UnservicedOpClass { op_class });
            }
        }
        Ok(())
    }

    fn validate_line_geometry(&self) -> Result<(), ConfigError> {
        let snap = self.line_snap_width();
        let width = self.line_width();
        if snap % INST_BYTES != 0 || width % INST_BYTES != 0 {
            return Err(ConfigError::LineGeometry {
                detail: format!(
                    "snap width {snap} and line width {width} must be multiples of {INST_BYTES}"
                ),
            });
        }
        if !snap.is_power_of_two() {
            return Err(ConfigError::LineGeometry {
                detail: format!("snap width {snap} is not a power of two"),
            });
        }
        if width < snap {
            return Err(ConfigError::LineGeometry {
                detail: format!("line width {width} is smaller than snap width {snap}"),
            });
        }
        let memory_width = self.memory_width();
        if !memory_width.is_power_of_two() {
            return Err(ConfigError::LineGeometry {
                detail: format!("memory width {memory_width} is not a power of two"),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: defaults::NUM_THREADS,
            cache_line_size: defaults::CACHE_LINE_SIZE,
            thread_policy: ThreadPolicy::default(),
            fetch1_fetch_limit: defaults::FETCH1_FETCH_LIMIT,
            fetch1_line_snap_width: defaults::FETCH1_LINE_SNAP_WIDTH,
            fetch1_line_width: defaults::FETCH1_LINE_WIDTH,
            fetch1_to_fetch2_forward_delay: defaults::FETCH1_TO_FETCH2_FORWARD_DELAY,
            fetch1_to_fetch2_backward_delay: defaults::FETCH1_TO_FETCH2_BACKWARD_DELAY,
            fetch2_input_buffer_size: defaults::FETCH2_INPUT_BUFFER_SIZE,
            fetch2_to_decode_forward_delay: defaults::FETCH2_TO_DECODE_FORWARD_DELAY,
            fetch2_cycle_input: true,
            decode_input_buffer_size: defaults::DECODE_INPUT_BUFFER_SIZE,
            decode_to_execute_forward_delay: defaults::DECODE_TO_EXECUTE_FORWARD_DELAY,
            decode_input_width: defaults::DECODE_INPUT_WIDTH,
            decode_cycle_input: true,
            execute_input_width: defaults::EXECUTE_INPUT_WIDTH,
            execute_cycle_input: true,
            execute_issue_limit: defaults::EXECUTE_ISSUE_LIMIT,
            execute_memory_issue_limit: defaults::EXECUTE_MEMORY_ISSUE_LIMIT,
            execute_commit_limit: defaults::EXECUTE_COMMIT_LIMIT,
            execute_memory_commit_limit: defaults::EXECUTE_MEMORY_COMMIT_LIMIT,
            execute_input_buffer_size: defaults::EXECUTE_INPUT_BUFFER_SIZE,
            execute_memory_width: defaults::EXECUTE_MEMORY_WIDTH,
            execute_max_accesses_in_memory: defaults::EXECUTE_MAX_ACCESSES_IN_MEMORY,
            execute_lsq_max_store_buffer_stores_per_cycle:
                defaults::LSQ_MAX_STORE_BUFFER_STORES_PER_CYCLE,
            execute_lsq_requests_queue_size: defaults::LSQ_REQUESTS_QUEUE_SIZE,
            execute_lsq_transfers_queue_size: defaults::LSQ_TRANSFERS_QUEUE_SIZE,
            execute_lsq_store_buffer_size: defaults::LSQ_STORE_BUFFER_SIZE,
            execute_branch_delay: defaults::EXECUTE_BRANCH_DELAY,
            execute_func_units: FuPoolConfig::default(),
            execute_set_trace_time_on_commit: true,
            execute_set_trace_time_on_issue: false,
            execute_allow_early_memory_issue: true,
            enable_idling: true,
            branch_predictor: BranchPredictorKind::default(),
            btb_size: defaults::BTB_SIZE,
        }
    }
}
