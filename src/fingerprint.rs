use crate::target::Target;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// Order-independent digest of a target set. Only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for log lines and status output.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn fingerprint(targets: &[Target]) -> Fingerprint {
    let mut tuples: Vec<(&str, &str, &str, &str)> = targets
        .iter()
        .map(|t| {
            (
                t.id.as_str(),
                t.scrape_url.as_str(),
                t.tenant_id.as_str(),
                t.display_name.as_str(),
            )
        })
        .collect();
    tuples.sort_unstable();
    // JSON keeps field boundaries unambiguous
    let encoded = serde_json::to_vec(&tuples).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    Fingerprint(format!("{digest:x}"))
}

/// A missing previous fingerprint is the baseline observation, not a change.
pub fn has_changed(previous: Option<&Fingerprint>, current: &Fingerprint) -> bool {
    previous.is_some_and(|prev| prev != current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> Vec<Target> {
        vec![
            Target::new("A", "alpha", "https://a.com/m", "t1"),
            Target::new("B", "beta", "http://b.com:81/m", "t1"),
            Target::new("C", "gamma", "https://c.com/m", "t2"),
        ]
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let forward = targets();
        let mut reversed = targets();
        reversed.reverse();
        let mut rotated = targets();
        rotated.rotate_left(1);

        assert_eq!(fingerprint(&forward), fingerprint(&reversed));
        assert_eq!(fingerprint(&forward), fingerprint(&rotated));
    }

    #[test]
    fn test_fingerprint_sees_every_field() {
        let base = fingerprint(&targets());

        let mut renamed = targets();
        renamed[0].display_name = "alpha-2".to_string();
        assert_ne!(base, fingerprint(&renamed));

        let mut moved = targets();
        moved[1].tenant_id = "t2".to_string();
        assert_ne!(base, fingerprint(&moved));

        let mut repointed = targets();
        repointed[2].scrape_url = "https://c.com/other".to_string();
        assert_ne!(base, fingerprint(&repointed));

        let mut removed = targets();
        removed.pop();
        assert_ne!(base, fingerprint(&removed));
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        let a = vec![Target::new("ab", "", "c", "t")];
        let b = vec![Target::new("a", "", "bc", "t")];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_empty_set_has_stable_fingerprint() {
        assert_eq!(fingerprint(&[]), fingerprint(&[]));
        assert_ne!(fingerprint(&[]), fingerprint(&targets()));
        assert_eq!(fingerprint(&[]).short().len(), 8);
    }

    #[test]
    fn test_has_changed() {
        let f1 = fingerprint(&targets());
        let f2 = fingerprint(&targets()[..2]);

        assert!(!has_changed(None, &f1));
        assert!(!has_changed(Some(&f1), &f1));
        assert!(has_changed(Some(&f1), &f2));
        assert!(has_changed(Some(&f2), &f1));
    }
}
