//! Pluggable identity validation for auth requests.

use courier_shared::constants::MAX_UID_LEN;

pub trait IdentityPolicy: Send + Sync {
    /// Whether `uid` may authenticate.
    fn accepts(&self, uid: &str) -> bool;
}

/// Accepts any syntactically valid user id: non-empty, at most
/// [`MAX_UID_LEN`] characters, no whitespace or control characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIdentityPolicy;

impl IdentityPolicy for DefaultIdentityPolicy {
    fn accepts(&self, uid: &str) -> bool {
        !uid.is_empty()
            && uid.chars().count() <= MAX_UID_LEN
            && !uid.chars().any(|c| c.is_whitespace() || c.is_control())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = DefaultIdentityPolicy;
        assert!(policy.accepts("alice"));
        assert!(policy.accepts("用户-42"));
        assert!(policy.accepts(&"x".repeat(MAX_UID_LEN)));

        assert!(!policy.accepts(""));
        assert!(!policy.accepts("al ice"));
        assert!(!policy.accepts("bob\n"));
        assert!(!policy.accepts("\u{7}"));
        assert!(!policy.accepts(&"x".repeat(MAX_UID_LEN + 1)));
    }
}
