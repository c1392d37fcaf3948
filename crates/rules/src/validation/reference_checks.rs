//! Cross-document checks: duplicate ids and dangling references.

use std::collections::{HashMap, HashSet};

use crate::evaluator::all_aggregations_in_condition_set;
use crate::schema::*;
use super::ValidationResult;
use super::fuzzy::fuzzy_match;

pub(super) fn validate_references(docs: &[RuleDocument], result: &mut ValidationResult) {
    let mut seen: HashSet<(DocumentKind, &str)> = HashSet::new();
    for doc in docs {
        let id = doc.metadata().id.as_str();
        if !seen.insert((doc.kind(), id)) {
            result.error(format!("{}/{id}", doc.kind()), format!("duplicate {} id '{id}'", doc.kind()));
        }
    }

    let ids_of = |kind: DocumentKind| -> Vec<&str> {
        docs.iter()
            .filter(|d| d.kind() == kind)
            .map(|d| d.metadata().id.as_str())
            .collect()
    };
    let action_ids = ids_of(DocumentKind::Action);
    let policy_ids = ids_of(DocumentKind::Policy);

    // Aggregation counters are shared by id, so reuse across rules double-counts.
    let mut aggregation_owners: HashMap<&str, &str> = HashMap::new();

    for def in docs.iter().filter_map(RuleDocument::as_rule) {
        let prefix = format!("Rule/{}", def.metadata.id);
        check_refs(&def.spec.actions, &action_ids, "action", &format!("{prefix}: spec.actions"), result);
        check_refs(&def.spec.policies, &policy_ids, "policy", &format!("{prefix}: spec.policies"), result);

        for clause in all_aggregations_in_condition_set(&def.spec.condition_set) {
            let owner = aggregation_owners
                .entry(clause.id.as_str())
                .or_insert(def.metadata.id.as_str());
            if *owner != def.metadata.id {
                result.warn(
                    format!("{prefix}: spec.conditionSet"),
                    format!(
                        "aggregation '{}' is also used by rule '{owner}'; each rule counts the event",
                        clause.id
                    ),
                );
            }
        }
    }
}

fn check_refs(refs: &[String], known: &[&str], what: &str, path: &str, result: &mut ValidationResult) {
    for (i, reference) in refs.iter().enumerate() {
        if known.contains(&reference.as_str()) {
            continue;
        }
        let path = format!("{path}[{i}]");
        let message = format!("unknown {what} '{reference}'");
        match fuzzy_match(reference, known) {
            Some(close) => result.error_with_suggestion(path, message, format!("Did you mean '{close}'?")),
            None => result.error(path, message),
        }
    }
}
