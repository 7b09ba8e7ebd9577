use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Record identifier as found on disk.
/// Older files sometimes carry ids as strings, so both forms are accepted and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(u64),
    Text(String),
}

impl RecordId {
    /// Numeric value, including strings such as `"12"`.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            RecordId::Number(n) => Some(*n),
            RecordId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        RecordId::Number(n)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

pub trait Identified {
    fn record_id(&self) -> &RecordId;
}

/// Next id for an id-bearing collection: max + 1, or 1 when empty.
///
/// If any id is non-numeric, or the max is `u64::MAX`, the count-based `len + 1`
/// is used instead, bumped past any numeric id it would collide with.
pub fn next_id<R: Identified>(records: &[R]) -> u64 {
    let numeric: Option<Vec<u64>> = records.iter().map(|r| r.record_id().as_number()).collect();
    let after_max = match numeric {
        Some(ids) => ids.into_iter().max().map_or(Some(1), |max| max.checked_add(1)),
        None => None,
    };
    after_max.unwrap_or_else(|| first_free_from_count(records))
}

/// `len + 1`, bumped past taken ids. At most `len` ids are taken, so a free one
/// always exists within `len + 1` steps.
fn first_free_from_count<R: Identified>(records: &[R]) -> u64 {
    let taken: HashSet<u64> = records
        .iter()
        .filter_map(|r| r.record_id().as_number())
        .collect();
    let mut candidate = records.len() as u64 + 1;
    while taken.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rec(RecordId);

    impl Identified for Rec {
        fn record_id(&self) -> &RecordId {
            &self.0
        }
    }

    fn recs(ids: &[RecordId]) -> Vec<Rec> {
        ids.iter().cloned().map(Rec).collect()
    }

    #[test]
    fn test_empty_is_one() {
        assert_eq!(next_id::<Rec>(&[]), 1);
    }

    #[test]
    fn test_max_plus_one_with_gaps() {
        let records = recs(&[5.into(), 2.into(), 9.into()]);
        assert_eq!(next_id(&records), 10);
    }

    #[test]
    fn test_numeric_strings_count_as_numbers() {
        let records = recs(&[RecordId::Text("4".into()), 1.into()]);
        assert_eq!(next_id(&records), 5);
    }

    #[test]
    fn test_non_numeric_falls_back_to_count() {
        let records = recs(&[RecordId::Text("abc".into()), 1.into()]);
        assert_eq!(next_id(&records), 3);
    }

    #[test]
    fn test_count_fallback_never_reuses_an_id() {
        let records = recs(&[RecordId::Text("abc".into()), 3.into(), 4.into()]);
        let id = next_id(&records);
        assert_eq!(id, 5);
        assert!(records.iter().all(|r| r.0.as_number() != Some(id)));
    }

    #[test]
    fn test_max_id_at_limit_falls_back_to_count() {
        let records = recs(&[u64::MAX.into()]);
        assert_eq!(next_id(&records), 2);

        let records = recs(&[1.into(), 2.into(), u64::MAX.into()]);
        assert_eq!(next_id(&records), 4);
    }

    #[test]
    fn test_untagged_serde_keeps_shape() {
        let ids: Vec<RecordId> = serde_json::from_str(r#"[3, "7", "x"]"#).unwrap();
        assert_eq!(
            ids,
            vec![RecordId::Number(3), RecordId::Text("7".into()), RecordId::Text("x".into())]
        );
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"[3,"7","x"]"#);
        assert_eq!(ids[1].to_string(), "7");
    }
}
