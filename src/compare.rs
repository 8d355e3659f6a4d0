//! Differential comparator

use crate::types::{EndpointResponse, LogRecord, Status};

/// Classify a reference/candidate pair.
///
/// Both sides must already be in canonical order (see [`crate::normalize`]);
/// ordering differences between the nodes are therefore invisible here.
pub fn compare(reference: &EndpointResponse, candidate: &EndpointResponse) -> Status {
    let (reference, candidate) = match (reference.logs(), candidate.logs()) {
        (Some(r), Some(c)) => (r, c),
        _ => return Status::Error,
    };

    if reference.is_empty() && candidate.is_empty() {
        return Status::Match;
    }

    if reference.len() != candidate.len() {
        return Status::MismatchCount;
    }

    if reference == candidate {
        Status::Match
    } else {
        Status::MismatchContent
    }
}

/// Index of the first position where the two sequences disagree
pub fn first_divergence(reference: &[LogRecord], candidate: &[LogRecord]) -> Option<usize> {
    reference
        .iter()
        .zip(candidate)
        .position(|(r, c)| r != c)
        .or_else(|| {
            (reference.len() != candidate.len()).then(|| reference.len().min(candidate.len()))
        })
}

/// Human-readable description of a divergence, for logs
pub fn describe_divergence(reference: &EndpointResponse, candidate: &EndpointResponse) -> Option<String> {
    if let Some(reason) = reference.failure() {
        return Some(format!("reference failed: {}", reason));
    }
    if let Some(reason) = candidate.failure() {
        return Some(format!("candidate failed: {}", reason));
    }

    let (r, c) = (reference.logs()?, candidate.logs()?);
    let index = first_divergence(r, c)?;
    let coordinates = |logs: &[LogRecord]| {
        logs.get(index)
            .map(|l| format!("block {} tx {} log {}", l.block_number, l.transaction_index, l.log_index))
            .unwrap_or_else(|| "<none>".to_string())
    };
    Some(format!(
        "{} vs {} logs, first divergence at #{}: reference {} / candidate {}",
        r.len(),
        c.len(),
        index,
        coordinates(r),
        coordinates(c)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::normalize::normalize;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn raw(block: u64, tx: u64, index: u64, data: &str) -> Value {
        json!({
            "address": "0x00000000000000000000000000000000000000aa",
            "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
            "data": data,
            "blockNumber": format!("0x{:x}", block),
            "transactionIndex": format!("0x{:x}", tx),
            "logIndex": format!("0x{:x}", index),
        })
    }

    fn ok(logs: Vec<Value>) -> EndpointResponse {
        EndpointResponse::Ok {
            logs: normalize(&Value::Array(logs)).unwrap(),
            latency: Duration::from_millis(5),
        }
    }

    fn failed(reason: FailureReason) -> EndpointResponse {
        EndpointResponse::Err { reason, latency: Duration::from_millis(5) }
    }

    #[test]
    fn test_reversed_order_matches() {
        let a = ok(vec![raw(100, 0, 0, "0x0a"), raw(101, 0, 0, "0x0b")]);
        let b = ok(vec![raw(101, 0, 0, "0x0b"), raw(100, 0, 0, "0x0a")]);
        assert_eq!(compare(&a, &b), Status::Match);
    }

    #[test]
    fn test_any_permutation_matches() {
        let logs = vec![
            raw(7, 0, 0, "0x01"),
            raw(7, 0, 1, "0x02"),
            raw(7, 2, 0, "0x03"),
            raw(9, 1, 4, "0x04"),
        ];
        let reference = ok(logs.clone());
        for rotation in 0..logs.len() {
            let mut permuted = logs.clone();
            permuted.rotate_left(rotation);
            permuted.swap(0, logs.len() - 1);
            assert_eq!(compare(&reference, &ok(permuted)), Status::Match);
        }
    }

    #[test]
    fn test_swapped_records_sharing_a_key_match() {
        let a = ok(vec![raw(5, 0, 0, "0xaa"), raw(5, 0, 0, "0xbb")]);
        let b = ok(vec![raw(5, 0, 0, "0xbb"), raw(5, 0, 0, "0xaa")]);
        assert_eq!(compare(&a, &b), Status::Match);
    }

    #[test]
    fn test_missing_record_is_count_mismatch() {
        let a = ok(vec![raw(1, 0, 0, "0x01"), raw(2, 0, 0, "0x02"), raw(3, 0, 0, "0x03")]);
        let b = ok(vec![raw(1, 0, 0, "0x01"), raw(3, 0, 0, "0x03")]);
        assert_eq!(compare(&a, &b), Status::MismatchCount);
    }

    #[test]
    fn test_count_takes_precedence_over_content() {
        let a = ok(vec![raw(1, 0, 0, "0x01")]);
        let b = ok(vec![raw(1, 0, 0, "0xff"), raw(2, 0, 0, "0x02")]);
        assert_eq!(compare(&a, &b), Status::MismatchCount);
    }

    #[test]
    fn test_different_payload_is_content_mismatch() {
        let a = ok(vec![raw(100, 0, 0, "0x0a")]);
        let b = ok(vec![raw(100, 0, 0, "0x0b")]);
        assert_eq!(compare(&a, &b), Status::MismatchContent);
    }

    #[test]
    fn test_both_empty_match() {
        assert_eq!(compare(&ok(vec![]), &ok(vec![])), Status::Match);
    }

    #[test]
    fn test_one_side_empty_is_count_mismatch() {
        assert_eq!(compare(&ok(vec![]), &ok(vec![raw(1, 0, 0, "0x")])), Status::MismatchCount);
    }

    #[test]
    fn test_failure_takes_precedence() {
        let good = ok(vec![raw(1, 0, 0, "0x")]);
        let timeout = failed(FailureReason::Transport("request timed out".into()));
        let rpc = failed(FailureReason::Rpc { code: -32000, message: "boom".into() });
        let parse = failed(FailureReason::Parse("bad".into()));

        assert_eq!(compare(&good, &timeout), Status::Error);
        assert_eq!(compare(&rpc, &good), Status::Error);
        assert_eq!(compare(&parse, &ok(vec![])), Status::Error);
        assert_eq!(compare(&timeout, &rpc), Status::Error);
    }

    #[test]
    fn test_first_divergence() {
        let a = normalize(&json!([raw(1, 0, 0, "0x01"), raw(2, 0, 0, "0x02")])).unwrap();
        let b = normalize(&json!([raw(1, 0, 0, "0x01"), raw(2, 0, 0, "0x03")])).unwrap();
        let short = normalize(&json!([raw(1, 0, 0, "0x01")])).unwrap();

        assert_eq!(first_divergence(&a, &a), None);
        assert_eq!(first_divergence(&a, &b), Some(1));
        assert_eq!(first_divergence(&a, &short), Some(1));
    }

    #[test]
    fn test_describe_divergence() {
        let a = ok(vec![raw(100, 0, 0, "0x0a")]);
        let b = ok(vec![raw(100, 0, 0, "0x0b")]);
        let detail = describe_divergence(&a, &b).unwrap();
        assert!(detail.contains("first divergence at #0"));
        assert!(detail.contains("block 100 tx 0 log 0"));

        assert!(describe_divergence(&a, &a).is_none());

        let err = failed(FailureReason::Transport("connection refused".into()));
        assert_eq!(
            describe_divergence(&a, &err).unwrap(),
            "candidate failed: transport error: connection refused"
        );
    }
}
