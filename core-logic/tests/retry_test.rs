use core_logic::{is_transient_message, with_retry, RetryConfig};
use std::cell::Cell;
use std::time::Duration;

fn fast(attempts: u32) -> RetryConfig {
    RetryConfig::new(attempts, Duration::from_millis(5)).without_jitter()
}

#[tokio::test]
async fn test_transient_read_recovers() {
    let calls = Cell::new(0);

    let price: Result<u64, String> = with_retry(&fast(3), "eth_gasPrice", || {
        calls.set(calls.get() + 1);
        let n = calls.get();
        async move {
            if n < 3 {
                Err("503 Service Unavailable".to_string())
            } else {
                Ok(7)
            }
        }
    })
    .await;

    assert_eq!(price, Ok(7));
    assert_eq!(calls.get(), 3);
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let calls = Cell::new(0);

    let result: Result<u64, String> = with_retry(&fast(5), "eth_call", || {
        calls.set(calls.get() + 1);
        async { Err("execution reverted".to_string()) }
    })
    .await;

    assert_eq!(result, Err("execution reverted".to_string()));
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn test_last_error_after_attempts_run_out() {
    let calls = Cell::new(0);

    let result: Result<u64, String> = with_retry(&fast(2), "eth_getBalance", || {
        calls.set(calls.get() + 1);
        let n = calls.get();
        async move { Err(format!("request timed out ({})", n)) }
    })
    .await;

    assert_eq!(result, Err("request timed out (2)".to_string()));
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn test_none_disables_retry() {
    let calls = Cell::new(0);

    let _: Result<u64, String> = with_retry(&RetryConfig::none(), "eth_call", || {
        calls.set(calls.get() + 1);
        async { Err("connection refused".to_string()) }
    })
    .await;

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_transient_message_detection() {
    assert!(is_transient_message("Request timeout"));
    assert!(is_transient_message("429 Too Many Requests"));
    assert!(is_transient_message("HEADER NOT FOUND"));
    assert!(!is_transient_message(
        "insufficient funds for gas * price + value"
    ));
    assert!(!is_transient_message("nonce too low"));
}
