//! End-to-end protocol runs over the in-process backend

use latency_flow_tester::{
    assignment::{bisection_table, MatrixSchedule},
    executor::{create_controller, execute, ExecutionConfig, ExecutionResults},
    logging::RoundLogger,
    models::{Config, PairId, Role, RunResults, UNMEASURED},
    session::Session,
    stats::average_samples,
    transport::{LocalCluster, Transport},
    types::TestMode,
};
use std::sync::Arc;

async fn run_cluster(config: Config) -> ExecutionResults {
    let config = Arc::new(config);
    let exec_config = ExecutionConfig::from(config.as_ref());

    let handles: Vec<_> = LocalCluster::create_named(config.world_size(), "node")
        .unwrap()
        .into_iter()
        .map(|transport| {
            let config = config.clone();
            let exec_config = exec_config.clone();
            tokio::spawn(async move {
                let rank = transport.rank();
                let mut session = Session::new(Box::new(transport), config.clone(), RoundLogger::new(&config, rank));
                let controller = create_controller(&exec_config);
                execute(&mut session, controller.as_ref(), "scenario").await.unwrap()
            })
        })
        .collect();

    let mut coordinator = None;
    for handle in handles {
        if let Some(results) = handle.await.unwrap() {
            coordinator = Some(results);
        }
    }
    coordinator.expect("rank 0 returns the results")
}

fn config(ranks: usize, mode: TestMode, retries: i64) -> Config {
    Config {
        ranks,
        mode,
        retries,
        payload_size: 64 * 1024,
        seed: Some(5),
        enable_color: false,
        ..Config::default()
    }
}

#[tokio::test]
async fn four_node_matrix_averages_three_samples_per_pair() {
    let results = run_cluster(config(4, TestMode::Matrix, 3)).await;
    let matrix = match &results.results {
        RunResults::Matrix(matrix) => matrix,
        other => panic!("expected a matrix, got {:?}", other),
    };

    assert_eq!(matrix.populated_count(), 6);
    assert_eq!(matrix.unused_count(), 3);
    for pair in MatrixSchedule::new(4).unwrap().pairs() {
        let result = matrix.get(pair.sender, pair.receiver).unwrap();
        assert_eq!(result.samples.len(), 3);
        let mean = average_samples(&result.samples).unwrap();
        assert_eq!(result.latency, mean.latency_us);
        assert_eq!(result.throughput, mean.throughput_mibps);
        assert!(result.throughput > 0.0);
    }

    assert_eq!(results.latency_stats.measured, 6);
    let expected_avg = results.latency_stats.sum / 6.0;
    assert!((results.latency_stats.avg - expected_avg).abs() < 1e-9);
}

#[tokio::test]
async fn five_workers_deterministic_bisection() {
    let results = run_cluster(config(6, TestMode::Bisection, 2)).await;
    let table = bisection_table(TestMode::Bisection, 6, None).unwrap();
    assert_eq!(table.get(5).unwrap().role, Role::Deactivated);

    let bisection = match &results.results {
        RunResults::Bisection(bisection) => bisection,
        other => panic!("expected bisection results, got {:?}", other),
    };
    let pairs: Vec<PairId> = bisection.measured().filter_map(|r| r.pair_id()).collect();
    assert_eq!(pairs, vec![PairId { sender: 1, receiver: 3 }, PairId { sender: 2, receiver: 4 }]);

    let sitting_out = bisection.get(5).unwrap();
    assert_eq!(sitting_out.latency, UNMEASURED);
    assert_eq!(sitting_out.throughput, UNMEASURED);

    // Average over floor(5 / 2) pairs
    let expected_avg = results.throughput_stats.sum / 2.0;
    assert!((results.throughput_stats.avg - expected_avg).abs() < 1e-9);
}

#[tokio::test]
async fn random_bisection_pairs_every_active_worker_once() {
    let results = run_cluster(config(9, TestMode::RandomBisection, 1)).await;
    let mut seen = Vec::new();
    for pair in results.results.records().filter_map(|r| r.pair_id()) {
        seen.push(pair.sender);
        seen.push(pair.receiver);
    }
    seen.sort_unstable();
    assert_eq!(seen, (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn zero_retries_leave_every_pair_unmeasured() {
    let results = run_cluster(config(4, TestMode::Matrix, 0)).await;
    assert!(results.results.records().all(|r| !r.is_measured()));
    assert_eq!(results.latency_stats.min, None);
    assert_eq!(results.latency_stats.max, None);
    assert_eq!(results.latency_stats.sum, 0.0);
}
