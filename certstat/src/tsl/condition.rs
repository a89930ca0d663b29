//! Predicates over certificates used to assign trusted list qualifiers

use std::collections::BTreeSet;
use std::sync::Arc;

use flagset::FlagSet;

use der::asn1::ObjectIdentifier;
use x509_cert::ext::pkix::KeyUsages;

use crate::evidence::cert_with_context::CertificateWithContext;

/// `ObjectIdentifierSet` is a set of policy OIDs
pub type ObjectIdentifierSet = BTreeSet<ObjectIdentifier>;

/// Caller-supplied predicate
pub type ConditionFn = Arc<dyn Fn(&CertificateWithContext) -> bool + Send + Sync>;

/// `MatchingCriteria` governs how a set of policy OIDs is compared to the policies asserted in a
/// certificate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MatchingCriteria {
    /// Every OID in the set must be asserted
    All,
    /// At least one OID in the set must be asserted
    AtLeastOne,
    /// No OID in the set may be asserted
    None,
}

/// `Condition` is a composable predicate over a [`CertificateWithContext`].
#[derive(Clone)]
pub enum Condition {
    /// Constant result
    Always(bool),
    /// With true, every key usage bit in the set must be asserted. With false, none may be. A
    /// certificate without a key usage extension asserts no bits.
    KeyUsage(FlagSet<KeyUsages>, bool),
    /// Policy OIDs compared to the certificate policies extension per the criteria
    PolicyId(ObjectIdentifierSet, MatchingCriteria),
    /// All nested conditions hold. An empty list holds.
    And(Vec<Condition>),
    /// At least one nested condition holds. An empty list does not hold.
    Or(Vec<Condition>),
    /// The nested condition does not hold
    Not(Box<Condition>),
    /// Caller-supplied predicate
    Custom(ConditionFn),
}

impl Condition {
    /// Wraps a closure as a condition
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&CertificateWithContext) -> bool + Send + Sync + 'static,
    {
        Condition::Custom(Arc::new(f))
    }

    /// Returns true if the condition holds for the certificate
    pub fn check(&self, cert: &CertificateWithContext) -> bool {
        match self {
            Condition::Always(b) => *b,
            Condition::KeyUsage(bits, asserted) => {
                let ku = match cert.key_usage() {
                    Some(ku) => ku.0,
                    None => FlagSet::default(),
                };
                if *asserted {
                    ku.contains(*bits)
                } else {
                    (ku & *bits).is_empty()
                }
            }
            Condition::PolicyId(oids, criteria) => {
                let policies: ObjectIdentifierSet = cert.policy_oids().into_iter().collect();
                match criteria {
                    MatchingCriteria::All => oids.is_subset(&policies),
                    MatchingCriteria::AtLeastOne => !oids.is_disjoint(&policies),
                    MatchingCriteria::None => oids.is_disjoint(&policies),
                }
            }
            Condition::And(conditions) => conditions.iter().all(|c| c.check(cert)),
            Condition::Or(conditions) => conditions.iter().any(|c| c.check(cert)),
            Condition::Not(condition) => !condition.check(cert),
            Condition::Custom(f) => f(cert),
        }
    }
}

impl core::fmt::Debug for Condition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Condition::Always(b) => write!(f, "Always({})", b),
            Condition::KeyUsage(bits, asserted) => write!(f, "KeyUsage({:?}, {})", bits, asserted),
            Condition::PolicyId(oids, criteria) => write!(f, "PolicyId({:?}, {:?})", oids, criteria),
            Condition::And(c) => f.debug_tuple("And").field(c).finish(),
            Condition::Or(c) => f.debug_tuple("Or").field(c).finish(),
            Condition::Not(c) => f.debug_tuple("Not").field(c).finish(),
            Condition::Custom(_) => write!(f, "Custom"),
        }
    }
}
