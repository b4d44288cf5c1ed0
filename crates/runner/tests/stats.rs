//! End-to-end checks of the statistics pipeline's pure half: block records
//! in, aggregated stats and a schema-stable JSON report out.

use surge_runner::{BlockRecord, RunReport, aggregate};

fn block(number: u64, tx_count: u64, block_time: u64, gas_used: u64) -> BlockRecord {
    BlockRecord {
        number,
        timestamp: 1_700_000_000 + number * 12,
        tx_count,
        gas_used,
        gas_limit: 30_000_000,
        block_time,
    }
}

#[test]
fn test_stats_to_report_pipeline() {
    let stats = aggregate(vec![
        block(101, 40, 2, 10_000_000),
        block(102, 55, 2, 20_000_000),
        block(103, 5, 1, 1_000_000),
    ]);

    // ceil(100 / 5)
    assert_eq!(stats.avg_tps, 20);
    assert_eq!(stats.min_tps, 5.0);
    assert_eq!(stats.max_tps, 27.5);
    assert_eq!(stats.total_included, 100);

    let report = RunReport::from(&stats);
    assert_eq!(report.average_tps, 20);
    assert_eq!(report.blocks.len(), 3);
    // Blocks come out sorted by number.
    assert!(report.blocks.windows(2).all(|w| w[0].block_num < w[1].block_num));
}

#[test]
fn test_report_json_is_stable_under_round_trip() {
    let stats = aggregate(vec![block(7, 12, 3, 4_200_000)]);
    let report = RunReport::from(&stats);

    let first = serde_json::to_string(&report).unwrap();
    let decoded: RunReport = serde_json::from_str(&first).unwrap();
    let second = serde_json::to_string(&decoded).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_gas_quantities_serialize_as_hex() {
    let stats = aggregate(vec![block(7, 12, 3, 4_200_000)]);
    let encoded = serde_json::to_value(RunReport::from(&stats)).unwrap();

    let gas_used = encoded["blocks"][0]["gasUsed"].as_str().unwrap();
    assert!(gas_used.starts_with("0x"));
}
