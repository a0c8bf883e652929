//! # Configuration Tests
//!
//! Tests for configuration defaults, JSON deserialization and the validation rules run when
//! a pipeline is built.

use std::io::Write;

use cva6_core::Pipeline;
use cva6_core::common::{ConfigError, OpClass};
use cva6_core::config::{BranchPredictorKind, Config, FuDescription, FuPoolConfig, ThreadPolicy};
use rstest::rstest;

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.num_threads, 1);
    assert_eq!(config.thread_policy, ThreadPolicy::RoundRobin);
    assert_eq!(config.fetch1_fetch_limit, 1);
    assert_eq!(config.fetch1_to_fetch2_forward_delay, 1);
    assert_eq!(config.fetch1_to_fetch2_backward_delay, 1);
    assert_eq!(config.fetch2_input_buffer_size, 2);
    assert_eq!(config.decode_input_buffer_size, 3);
    assert_eq!(config.decode_input_width, 2);
    assert_eq!(config.execute_input_width, 2);
    assert_eq!(config.execute_issue_limit, 2);
    assert_eq!(config.execute_memory_issue_limit, 1);
    assert_eq!(config.execute_commit_limit, 2);
    assert_eq!(config.execute_memory_commit_limit, 1);
    assert_eq!(config.execute_input_buffer_size, 7);
    assert_eq!(config.execute_max_accesses_in_memory, 2);
    assert_eq!(config.execute_lsq_max_store_buffer_stores_per_cycle, 2);
    assert_eq!(config.execute_lsq_requests_queue_size, 1);
    assert_eq!(config.execute_lsq_transfers_queue_size, 2);
    assert_eq!(config.execute_lsq_store_buffer_size, 5);
    assert_eq!(config.execute_branch_delay, 1);
    assert!(config.fetch2_cycle_input);
    assert!(config.decode_cycle_input);
    assert!(config.execute_cycle_input);
    assert!(config.execute_set_trace_time_on_commit);
    assert!(!config.execute_set_trace_time_on_issue);
    assert!(config.execute_allow_early_memory_issue);
    assert!(config.enable_idling);
    assert_eq!(config.branch_predictor, BranchPredictorKind::Static);
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_widths_fall_back_to_cache_line() {
    let config = Config {
        cache_line_size: 32,
        ..Config::default()
    };
    assert_eq!(config.line_snap_width(), 32);
    assert_eq!(config.line_width(), 32);
    assert_eq!(config.memory_width(), 32);
}

#[test]
fn test_json_keys_use_parameter_names() {
    let config = Config::from_json(
        r#"{
            "fetch1FetchLimit": 3,
            "fetch1LineSnapWidth": 16,
            "fetch1LineWidth": 32,
            "executeLSQRequestsQueueSize": 4,
            "executeLsqTransfersQueueSize": 6,
            "threadPolicy": "Random",
            "numThreads": 2,
            "branchPredictor": "BTB"
        }"#,
    )
    .unwrap();
    assert_eq!(config.fetch1_fetch_limit, 3);
    assert_eq!(config.line_snap_width(), 16);
    assert_eq!(config.line_width(), 32);
    assert_eq!(config.execute_lsq_requests_queue_size, 4);
    assert_eq!(config.execute_lsq_transfers_queue_size, 6);
    assert_eq!(config.thread_policy, ThreadPolicy::Random);
    assert_eq!(config.branch_predictor, BranchPredictorKind::Btb);
    assert_eq!(config.execute_func_units.func_units.len(), 9);
}

#[test]
fn test_json_func_units() {
    let config = Config::from_json(
        r#"{
            "executeFuncUnits": {
                "funcUnits": [
                    { "name": "Any", "opLat": 2 },
                    {
                        "name": "Mem",
                        "opClasses": ["MemRead", "MemWrite"],
                        "timings": [{ "mask": 255, "match": 3, "extraCommitLat": 4 }],
                        "cantForwardFromFUIndices": [0]
                    }
                ]
            }
        }"#,
    )
    .unwrap();
    let units = &config.execute_func_units.func_units;
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].op_lat, 2);
    assert_eq!(units[0].issue_lat, 1);
    assert!(units[0].op_classes.is_wildcard());
    assert_eq!(units[1].timings[0].match_bits, 3);
    assert_eq!(units[1].cant_forward_from_fu_indices, vec![0]);
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "decodeInputWidth": 4, "enableIdling": false }}"#).unwrap();
    let config = Config::from_json_file(file.path()).unwrap();
    assert_eq!(config.decode_input_width, 4);
    assert!(!config.enable_idling);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_json_is_rejected() {
    let err = Config::from_json(r#"{ "decodeInputWidth": "wide" }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

fn with(f: impl FnOnce(&mut Config)) -> Config {
    let mut config = Config::default();
    f(&mut config);
    config
}

#[rstest]
#[case::zero_decode_width(with(|c| c.decode_input_width = 0), "decodeInputWidth")]
#[case::zero_fetch_limit(with(|c| c.fetch1_fetch_limit = 0), "fetch1FetchLimit")]
#[case::zero_store_buffer(with(|c| c.execute_lsq_store_buffer_size = 0), "executeLSQStoreBufferSize")]
#[case::zero_threads(with(|c| c.num_threads = 0), "numThreads")]
fn test_zero_parameter_rejected(#[case] config: Config, #[case] expected: &str) {
    match config.validate() {
        Err(ConfigError::ZeroParameter { name }) => assert_eq!(name, expected),
        other => panic!("expected ZeroParameter({expected}), got {other:?}"),
    }
}

#[rstest]
#[case::fetch1_to_fetch2(with(|c| c.fetch1_to_fetch2_forward_delay = 0))]
#[case::fetch2_to_decode(with(|c| c.fetch2_to_decode_forward_delay = 0))]
#[case::decode_to_execute(with(|c| c.decode_to_execute_forward_delay = 0))]
#[case::branch(with(|c| c.execute_branch_delay = 0))]
fn test_zero_delay_rejected(#[case] config: Config) {
    assert!(matches!(
        config.validate(),
        Err(ConfigError::DelayTooShort { value: 0, min: 1, .. })
    ));
}

#[rstest]
#[case::snap_not_power_of_two(with(|c| {
    c.fetch1_line_snap_width = 48;
    c.fetch1_line_width = 48;
}))]
#[case::width_below_snap(with(|c| {
    c.fetch1_line_snap_width = 64;
    c.fetch1_line_width = 32;
}))]
#[case::width_not_instruction_multiple(with(|c| {
    c.fetch1_line_snap_width = 16;
    c.fetch1_line_width = 18;
}))]
#[case::memory_width_not_power_of_two(with(|c| c.execute_memory_width = 24))]
fn test_bad_geometry_rejected(#[case] config: Config) {
    assert!(matches!(config.validate(), Err(ConfigError::LineGeometry { .. })));
}

#[test]
fn test_single_threaded_policy_needs_one_thread() {
    let config = with(|c| {
        c.num_threads = 2;
        c.thread_policy = ThreadPolicy::SingleThreaded;
    });
    assert!(matches!(
        config.validate(),
        Err(ConfigError::SingleThreadedPolicy { threads: 2 })
    ));
}

#[test]
fn test_trace_time_flags_exclusive() {
    let config = with(|c| c.execute_set_trace_time_on_issue = true);
    assert!(matches!(config.validate(), Err(ConfigError::TraceTimeConflict)));
}

#[test]
fn test_pool_rules() {
    let empty = with(|c| c.execute_func_units = FuPoolConfig::new(Vec::new()));
    assert!(matches!(empty.validate(), Err(ConfigError::EmptyFuPool)));

    let mut bad_index = FuDescription::new("Any", &[], 1);
    bad_index.cant_forward_from_fu_indices = vec![3];
    let forwarding = with(|c| c.execute_func_units = FuPoolConfig::new(vec![bad_index]));
    assert!(matches!(
        forwarding.validate(),
        Err(ConfigError::ForwardingIndex { unit: 0, index: 3 })
    ));

    let no_memory = with(|c| {
        c.execute_func_units = FuPoolConfig::new(vec![FuDescription::new("Int", &[OpClass::IntAlu], 1)]);
    });
    assert!(matches!(
        no_memory.validate(),
        Err(ConfigError::UnservicedOpClass {
            op_class: OpClass::MemRead
        })
    ));
}

#[test]
fn test_pipeline_construction_validates() {
    assert!(Pipeline::new(Config::default()).is_ok());
    assert!(Pipeline::new(with(|c| c.execute_issue_limit = 0)).is_err());
}
