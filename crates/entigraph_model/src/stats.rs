//! Task status buckets of a project.

use entigraph_core::RawPayload;
use serde::Serialize;
use serde_json::Value;

/// One status bucket, as a whole percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStat {
    /// Bucket name.
    pub key: &'static str,
    /// Percentage of tasks in the bucket.
    pub value: i64,
}

/// (bucket, wire key, fallback fraction). Absent and zero values both take
/// the fallback.
const BUCKETS: [(&str, &str, f64); 5] = [
    ("fail", "red_pct", 0.0),
    ("not_started", "grey_pct", 1.0),
    ("working_on_it", "orange_pct", 0.0),
    ("ready_for_feedback", "blue_pct", 0.0),
    ("complete", "green_pct", 0.0),
];

/// Collapses a `stats` payload into buckets and the scalar order scale.
pub fn task_stats(values: &RawPayload) -> (Vec<TaskStat>, i64) {
    let stats = BUCKETS
        .iter()
        .map(|&(key, wire_key, fallback)| TaskStat {
            key,
            value: percent(fraction_or(values.get(wire_key), fallback)),
        })
        .collect();
    let order_scale = percent(fraction_or(values.get("order_scale"), 0.0));
    (stats, order_scale)
}

fn fraction_or(value: Option<&Value>, fallback: f64) -> f64 {
    let fraction = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    match fraction {
        Some(f) if f != 0.0 && f.is_finite() => f,
        _ => fallback,
    }
}

/// Rounds to a whole percentage; halves round up.
fn percent(fraction: f64) -> i64 {
    (fraction * 100.0 + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(value: Value) -> (Vec<(&'static str, i64)>, i64) {
        let payload = entigraph_core::payload_from_value(value).unwrap();
        let (buckets, order) = task_stats(&payload);
        (buckets.into_iter().map(|s| (s.key, s.value)).collect(), order)
    }

    #[test]
    fn missing_buckets_take_fallbacks() {
        let (buckets, order) = stats(json!({"red_pct": 0.2, "green_pct": 0.5}));
        assert_eq!(
            buckets,
            vec![
                ("fail", 20),
                ("not_started", 100),
                ("working_on_it", 0),
                ("ready_for_feedback", 0),
                ("complete", 50),
            ]
        );
        assert_eq!(order, 0);
    }

    #[test]
    fn zero_grey_counts_as_not_started() {
        let (buckets, _) = stats(json!({"grey_pct": 0, "green_pct": 1.0}));
        assert_eq!(buckets[1], ("not_started", 100));
        assert_eq!(buckets[4], ("complete", 100));
    }

    #[test]
    fn values_round_to_whole_percent() {
        let (buckets, order) = stats(json!({
            "red_pct": 0.125,
            "grey_pct": 0.333,
            "orange_pct": "0.2",
            "blue_pct": null,
            "order_scale": 0.456
        }));
        assert_eq!(buckets[0], ("fail", 13));
        assert_eq!(buckets[1], ("not_started", 33));
        assert_eq!(buckets[2], ("working_on_it", 20));
        assert_eq!(buckets[3], ("ready_for_feedback", 0));
        assert_eq!(order, 46);
    }
}
