//! Evaluation of trusted list service qualifiers

use std::collections::BTreeSet;

use log::debug;

use crate::evidence::cert_with_context::CertificateWithContext;
use crate::tsl::condition::Condition;

/// `QualifierRules` holds (qualifier, condition) pairs read from a trusted list service entry.
///
/// Every pair is evaluated independently, so a certificate may receive any number of qualifiers.
#[derive(Clone, Debug, Default)]
pub struct QualifierRules {
    rules: Vec<(String, Condition)>,
}

impl QualifierRules {
    /// Creates an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a qualifier that applies when the condition holds
    pub fn add(&mut self, qualifier: &str, condition: Condition) {
        self.rules.push((qualifier.to_string(), condition));
    }

    /// Number of registered pairs
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no pairs are registered
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the qualifiers whose conditions hold for the certificate
    pub fn qualifiers_for(&self, cert: &CertificateWithContext) -> BTreeSet<String> {
        let mut retval = BTreeSet::new();
        for (qualifier, condition) in &self.rules {
            if condition.check(cert) {
                debug!("{} applies to {}", qualifier, cert.subject_string());
                retval.insert(qualifier.clone());
            }
        }
        retval
    }
}

impl FromIterator<(String, Condition)> for QualifierRules {
    fn from_iter<I: IntoIterator<Item = (String, Condition)>>(iter: I) -> Self {
        QualifierRules {
            rules: iter.into_iter().collect(),
        }
    }
}
