//! # Statistics Tests

use cva6_core::stats::{PipelineStats, STATS_SECTIONS};

fn sample() -> PipelineStats {
    let mut stats = PipelineStats::new(2);
    stats.cycles = 200;
    stats.quiesce_cycles = 50;
    stats.committed_insts = vec![60, 40];
    stats.committed_mem_refs = vec![10, 5];
    stats.fu_stalls = 20;
    stats.mispredictions = 3;
    stats
}

#[test]
fn test_totals_and_ipc() {
    let stats = sample();
    assert_eq!(stats.total_committed(), 100);
    assert!((stats.ipc() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_render_all_sections() {
    let text = sample().render_sections(&[]);
    assert!(text.contains("sim_cycles               200"));
    assert!(text.contains("quiesce_cycles           50 (25.00%)"));
    assert!(text.contains("thread1.committed     40 (mem refs 5)"));
    assert!(text.contains("execute.fu_busy"));
    assert!(text.contains("branch.mispredicts     3"));
    assert!(text.contains("MEMORY"));
}

#[test]
fn test_every_section_name_renders_something() {
    let stats = sample();
    let header = stats.render_sections(&["none".to_owned()]);
    for section in STATS_SECTIONS {
        let text = stats.render_sections(&[(*section).to_owned()]);
        assert!(text.len() > header.len(), "section {section} rendered nothing");
    }
}
