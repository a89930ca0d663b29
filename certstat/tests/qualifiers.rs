mod common;

use std::collections::BTreeSet;

use common::*;
use x509_cert::ext::pkix::KeyUsages;

use certstat::*;

fn oids(list: &[der::asn1::ObjectIdentifier]) -> ObjectIdentifierSet {
    list.iter().copied().collect()
}

#[test]
fn only_satisfied_qualifiers_are_assigned() {
    let mut rules = QualifierRules::new();
    rules.add("Q1", Condition::Always(true));
    rules.add("Q2", Condition::Always(false));
    let expected: BTreeSet<String> = ["Q1".to_string()].into_iter().collect();
    assert_eq!(expected, rules.qualifiers_for(&leaf()));
    assert!(QualifierRules::new().qualifiers_for(&leaf()).is_empty());
}

#[test]
fn policy_conditions() {
    let leaf = leaf();
    let c = |set, criteria| Condition::PolicyId(set, criteria);
    assert!(c(oids(&[TEST_POLICY]), MatchingCriteria::All).check(&leaf));
    assert!(!c(oids(&[TEST_POLICY, OTHER_POLICY]), MatchingCriteria::All).check(&leaf));
    assert!(c(oids(&[TEST_POLICY, OTHER_POLICY]), MatchingCriteria::AtLeastOne).check(&leaf));
    assert!(!c(oids(&[OTHER_POLICY]), MatchingCriteria::AtLeastOne).check(&leaf));
    assert!(c(oids(&[OTHER_POLICY]), MatchingCriteria::None).check(&leaf));
    assert!(!c(oids(&[TEST_POLICY]), MatchingCriteria::None).check(&leaf));
    // the CA asserts no policies
    assert!(!c(oids(&[TEST_POLICY]), MatchingCriteria::AtLeastOne).check(&ca()));
}

#[test]
fn key_usage_conditions() {
    let leaf = leaf();
    assert!(Condition::KeyUsage(KeyUsages::DigitalSignature.into(), true).check(&leaf));
    assert!(!Condition::KeyUsage(KeyUsages::NonRepudiation.into(), true).check(&leaf));
    assert!(Condition::KeyUsage(KeyUsages::NonRepudiation.into(), false).check(&leaf));
    assert!(!Condition::KeyUsage(KeyUsages::DigitalSignature.into(), false).check(&leaf));
    assert!(
        Condition::KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign, true).check(&ca())
    );
}

#[test]
fn composite_conditions() {
    let leaf = leaf();
    let t = Condition::Always(true);
    let f = Condition::Always(false);
    assert!(Condition::And(vec![t.clone(), t.clone()]).check(&leaf));
    assert!(!Condition::And(vec![t.clone(), f.clone()]).check(&leaf));
    assert!(Condition::And(vec![]).check(&leaf));
    assert!(Condition::Or(vec![f.clone(), t.clone()]).check(&leaf));
    assert!(!Condition::Or(vec![]).check(&leaf));
    assert!(Condition::Not(Box::new(f)).check(&leaf));

    let is_leaf = Condition::custom(|c| c.subject_string().contains("Leaf"));
    assert!(is_leaf.check(&leaf));
    assert!(!is_leaf.check(&ca()));
    assert_eq!("Custom", format!("{:?}", is_leaf));
}

#[test]
fn qualifiers_from_iterator() {
    let rules: QualifierRules = vec![
        (
            "QCWithSSCD".to_string(),
            Condition::PolicyId(oids(&[TEST_POLICY]), MatchingCriteria::AtLeastOne),
        ),
        (
            "QCForESig".to_string(),
            Condition::KeyUsage(KeyUsages::NonRepudiation.into(), true),
        ),
        ("NotQualified".to_string(), Condition::Always(false)),
    ]
    .into_iter()
    .collect();
    assert_eq!(3, rules.len());
    let q = rules.qualifiers_for(&leaf());
    assert_eq!(1, q.len());
    assert!(q.contains("QCWithSSCD"));
}
