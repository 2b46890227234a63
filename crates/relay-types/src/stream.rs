use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A total-ordering token for stream events, of shape `"<millis>-<seq>"`.
/// Parsed lazily: an empty or malformed checkpoint behaves as if both
/// components were absent, which `IsOlder` treats as `-infinity` so it
/// always loses to any well-formed checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint(pub String);

impl Checkpoint {
    pub const EMPTY: &'static str = "";

    pub fn new(millis: i64, seq: i64) -> Self {
        Checkpoint(format!("{millis}-{seq}"))
    }

    pub fn empty() -> Self {
        Checkpoint(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses `"millis-seq"` into `(Option<millis>, Option<seq>)`. Either or
    /// both components are `None` if the checkpoint is empty or malformed —
    /// never an error, since an unparseable checkpoint must still compare as
    /// older than everything (spec: "missing segments compare as -infinity").
    fn components(&self) -> (Option<i64>, Option<i64>) {
        if self.0.is_empty() {
            return (None, None);
        }
        let mut parts = self.0.splitn(2, '-');
        let millis = parts.next().and_then(|s| s.parse::<i64>().ok());
        let seq = parts.next().and_then(|s| s.parse::<i64>().ok());
        (millis, seq)
    }

    /// `IsOlder(a, b)`: true iff `a` strictly precedes `b`. Compares by
    /// (millis, seq) lexicographically; a missing component sorts before
    /// any present value.
    pub fn is_older(a: &Checkpoint, b: &Checkpoint) -> bool {
        let (a_ms, a_seq) = a.components();
        let (b_ms, b_seq) = b.components();
        match cmp_option(a_ms, b_ms) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => cmp_option(a_seq, b_seq) == Ordering::Less,
        }
    }

    /// True iff neither checkpoint is older than the other: equal under the
    /// ordering used by `is_older`.
    pub fn is_same_or_newer(&self, other: &Checkpoint) -> bool {
        !Checkpoint::is_older(self, other)
    }
}

fn cmp_option(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

/// Well-known value-map keys carried by a `StreamEvent`.
pub const VALUE_API_KEY: &str = "APIKey";
pub const VALUE_DATA: &str = "Data";

/// Created by the EventListener from an SSE event, consumed by stream
/// subscribers; its checkpoint is persisted by `CheckpointingStream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub checkpoint: Checkpoint,
    pub values: HashMap<String, String>,
}

impl StreamEvent {
    pub fn new(checkpoint: Checkpoint, api_key_or_topic: impl Into<String>, data: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(VALUE_API_KEY.to_string(), api_key_or_topic.into());
        values.insert(VALUE_DATA.to_string(), data.into());
        StreamEvent { checkpoint, values }
    }

    pub fn data(&self) -> Option<&str> {
        self.values.get(VALUE_DATA).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_older_orders_by_millis_then_seq() {
        assert!(Checkpoint::is_older(&Checkpoint::new(2, 0), &Checkpoint::new(3, 0)));
        assert!(!Checkpoint::is_older(&Checkpoint::new(3, 2), &Checkpoint::new(3, 1)));
    }

    #[test]
    fn empty_checkpoint_is_older_than_anything() {
        assert!(Checkpoint::is_older(&Checkpoint::empty(), &Checkpoint::new(1, 0)));
    }

    #[test]
    fn equal_checkpoints_are_not_older() {
        let a = Checkpoint::new(5, 3);
        let b = Checkpoint::new(5, 3);
        assert!(!Checkpoint::is_older(&a, &b));
        assert!(a.is_same_or_newer(&b));
    }

    #[test]
    fn malformed_checkpoint_behaves_as_missing() {
        let malformed = Checkpoint("not-a-number-x".to_string());
        assert!(Checkpoint::is_older(&malformed, &Checkpoint::new(1, 0)));
    }

    proptest::proptest! {
        // spec §8 property 6 and §9: IsOlder must order strictly by (millis, seq),
        // never the other way around, for any pair of well-formed checkpoints.
        #[test]
        fn is_older_is_consistent_with_millis_seq_ordering(
            a_ms in 0i64..1_000_000,
            a_seq in 0i64..1_000,
            b_ms in 0i64..1_000_000,
            b_seq in 0i64..1_000,
        ) {
            let a = Checkpoint::new(a_ms, a_seq);
            let b = Checkpoint::new(b_ms, b_seq);
            let expected = (a_ms, a_seq) < (b_ms, b_seq);
            prop_assert_eq!(Checkpoint::is_older(&a, &b), expected);
        }

        // spec §8 property 4/5: applying a sequence of events in arbitrary order,
        // the checkpoint that should end up persisted is always the maximum one —
        // `is_older` must never disagree with that maximum on any pair in the set.
        #[test]
        fn is_older_agrees_with_slice_maximum(points in proptest::collection::vec((0i64..1000, 0i64..1000), 1..20)) {
            let checkpoints: Vec<Checkpoint> = points.iter().map(|&(ms, seq)| Checkpoint::new(ms, seq)).collect();
            let max = points.iter().max().copied().unwrap();
            let max_checkpoint = Checkpoint::new(max.0, max.1);
            for checkpoint in &checkpoints {
                prop_assert!(!Checkpoint::is_older(&max_checkpoint, checkpoint));
            }
        }
    }
}
