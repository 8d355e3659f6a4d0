//! Response normalizer: typed log records in canonical order

use serde_json::Value;

use crate::error::FailureReason;
use crate::types::LogRecord;

/// Parse an `eth_getLogs` result into canonically ordered records.
///
/// Pure: no I/O, so saved responses can be re-normalized offline.
pub fn normalize(result: &Value) -> Result<Vec<LogRecord>, FailureReason> {
    let entries = result
        .as_array()
        .ok_or_else(|| FailureReason::Parse(format!("expected a log array, got {}", json_kind(result))))?;

    let mut logs = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let log: LogRecord = serde_json::from_value(entry.clone())
            .map_err(|e| FailureReason::Parse(format!("log #{}: {}", i, e)))?;
        logs.push(log);
    }

    canonical_sort(&mut logs);
    Ok(logs)
}

/// Sort by (block, tx index, log index), breaking ties on content
pub fn canonical_sort(logs: &mut [LogRecord]) {
    logs.sort_by(LogRecord::canonical_cmp);
}

/// Accept either a full JSON-RPC envelope or a bare result array.
///
/// Used for saved responses; live responses are unwrapped by the fetcher.
pub fn unwrap_envelope(body: &Value) -> Result<&Value, FailureReason> {
    if !body.is_object() {
        return Ok(body);
    }
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(FailureReason::Rpc { code, message });
    }
    body.get("result")
        .ok_or_else(|| FailureReason::Parse("response has neither result nor error".to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(block: u64, tx: u64, index: u64, data: &str) -> Value {
        json!({
            "address": "0x00000000000000000000000000000000000000aa",
            "topics": [],
            "data": data,
            "blockNumber": format!("0x{:x}", block),
            "transactionIndex": format!("0x{:x}", tx),
            "logIndex": format!("0x{:x}", index),
        })
    }

    #[test]
    fn test_normalize_sorts_by_coordinates() {
        let raw = json!([
            log(101, 0, 0, "0x02"),
            log(100, 1, 0, "0x01"),
            log(100, 0, 3, "0x00"),
            log(100, 0, 1, "0x00"),
        ]);
        let logs = normalize(&raw).unwrap();
        let keys: Vec<_> = logs.iter().map(LogRecord::sort_key).collect();
        assert_eq!(keys, vec![(100, 0, 1), (100, 0, 3), (100, 1, 0), (101, 0, 0)]);
    }

    #[test]
    fn test_equal_keys_ordered_by_content() {
        let forward = normalize(&json!([log(5, 0, 0, "0xaa"), log(5, 0, 0, "0xbb")])).unwrap();
        let swapped = normalize(&json!([log(5, 0, 0, "0xbb"), log(5, 0, 0, "0xaa")])).unwrap();
        assert_eq!(forward, swapped);
        assert_eq!(forward[0].data.as_ref(), &[0xaa]);
        assert_eq!(forward[1].data.as_ref(), &[0xbb]);
    }

    #[test]
    fn test_equal_keys_ordered_by_opaque_fields() {
        let mut removed = log(5, 0, 0, "0xaa");
        removed["removed"] = json!(true);
        let mut kept = log(5, 0, 0, "0xaa");
        kept["removed"] = json!(false);

        let a = normalize(&json!([removed.clone(), kept.clone()])).unwrap();
        let b = normalize(&json!([kept, removed])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = json!([log(3, 1, 0, "0x"), log(1, 0, 0, "0x"), log(2, 4, 7, "0x")]);
        let once = normalize(&raw).unwrap();
        let again = normalize(&serde_json::to_value(&once).unwrap()).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_rejects_non_array() {
        let err = normalize(&json!({"logs": []})).unwrap_err();
        assert!(matches!(err, FailureReason::Parse(ref msg) if msg.contains("an object")));
    }

    #[test]
    fn test_normalize_rejects_malformed_record() {
        let mut bad = log(1, 0, 0, "0x");
        bad["blockNumber"] = json!(null);
        let err = normalize(&json!([log(1, 0, 1, "0x"), bad])).unwrap_err();
        assert!(matches!(err, FailureReason::Parse(ref msg) if msg.starts_with("log #1")));
    }

    #[test]
    fn test_unwrap_envelope() {
        let ok = json!({"jsonrpc": "2.0", "id": 1, "result": []});
        assert_eq!(unwrap_envelope(&ok).unwrap(), &json!([]));

        let bare = json!([]);
        assert_eq!(unwrap_envelope(&bare).unwrap(), &json!([]));

        let err = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32005, "message": "query returned more than 10000 results"}});
        assert_eq!(
            unwrap_envelope(&err).unwrap_err(),
            FailureReason::Rpc { code: -32005, message: "query returned more than 10000 results".into() }
        );

        assert!(matches!(unwrap_envelope(&json!({"id": 1})), Err(FailureReason::Parse(_))));
    }
}
