use rfa_demo::{run_captured, DemoRequest, RepeatedAllocation, RequestOrchestrator};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_enclosing_sink_restored_after_success() {
    let ((), outer) = run_captured(|_| {
        tracing::info!(target: "host", "before");
        let ((), inner) = run_captured(|_| tracing::info!(target: "engine", "inner event"));
        assert_eq!(inner, "I engine: inner event\n");
        tracing::info!(target: "host", "after");
    });
    assert_eq!(outer, "I host: before\nI host: after\n");
}

#[test]
fn test_enclosing_sink_restored_after_panic() {
    let ((), outer) = run_captured(|_| {
        let caught = std::panic::catch_unwind(|| {
            run_captured(|_| {
                tracing::warn!(target: "engine", "about to fail");
                panic!("engine exploded");
            })
        });
        assert!(caught.is_err());
        tracing::info!(target: "host", "after failure");
    });
    // 失敗請求的診斷不會流入外層
    assert_eq!(outer, "I host: after failure\n");
}

#[test]
fn test_debug_and_trace_captured_regardless_of_caller() {
    let ((), text) = run_captured(|console| {
        tracing::trace!(target: "engine", "t");
        tracing::debug!(target: "engine", "d");
        console.println("plain");
    });
    assert_eq!(text, "T engine: t\nD engine: d\nplain\n");
}

#[test]
fn test_concurrent_captures_do_not_leak() {
    const WORKERS: usize = 8;
    const LINES: usize = 50;
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|id| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let ((), text) = run_captured(|console| {
                    barrier.wait();
                    for line in 0..LINES {
                        tracing::info!(target: "worker", "worker {} line {}", id, line);
                        console.println(format!("worker {} console {}", id, line));
                    }
                });
                (id, text)
            })
        })
        .collect();

    for handle in handles {
        let (id, text) = handle.join().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), LINES * 2);
        let marker = format!("worker {} ", id);
        assert!(lines.iter().all(|l| l.contains(&marker)), "worker {id} saw foreign lines");
    }
}

#[test]
fn test_concurrent_requests_keep_their_own_diagnostics() {
    let orchestrator = Arc::new(RequestOrchestrator::new(RepeatedAllocation::new()));
    let payloads = [
        (r#"{"0": {"0": 5, "1": 3}, "1": {"0": 2, "1": 6}}"#, 2, "1"),
        (r#"{"0": {"10": 1, "11": 1, "12": 1}, "1": {"10": 3, "11": 2, "12": 1}}"#, 4, "2"),
        ("{0: {20: 4}, 1: {20: 9}}", 6, "2"),
    ];

    let handles: Vec<_> = payloads
        .iter()
        .map(|(raw, k, algo)| {
            let orchestrator = Arc::clone(&orchestrator);
            let request = DemoRequest::new(*raw, *k, *algo);
            thread::spawn(move || orchestrator.prepare(&request).unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results[0].log_txt.contains("Algorithm 1"));
    assert!(!results[0].log_txt.contains("Algorithm 2"));
    assert!(results[1].log_txt.contains("Algorithm 2: 4 rounds"));
    assert!(!results[1].log_txt.contains("6 rounds"));
    assert!(results[2].log_txt.contains("Algorithm 2: 6 rounds"));
    assert_eq!(results[2].log_txt.matches("Round ").count(), 6);
}
