//! Header and per-kind spec checks.

use crate::schema::*;
use super::ValidationResult;
use super::fuzzy::is_kebab_case;

pub(super) fn validate_header(doc: &RuleDocument, result: &mut ValidationResult) {
    let (api_version, kind) = match doc {
        RuleDocument::Rule(d) => (&d.api_version, &d.kind),
        RuleDocument::Action(d) => (&d.api_version, &d.kind),
        RuleDocument::Policy(d) => (&d.api_version, &d.kind),
    };

    if api_version != "v1" {
        result.error("apiVersion", format!("apiVersion must be 'v1', got '{api_version}'"));
    }

    let expected = doc.kind().to_string();
    if *kind != expected {
        result.error("kind", format!("kind must be '{expected}', got '{kind}'"));
    }

    let id = &doc.metadata().id;
    if !is_kebab_case(id) {
        result.warn(
            "metadata.id",
            format!("id should be kebab-case (lowercase alphanumeric + hyphens), got '{id}'"),
        );
    }
}

pub(super) fn validate_rule_spec(def: &RuleDefinition, result: &mut ValidationResult) {
    let spec = &def.spec;

    if spec.status == RuleStatus::Expired {
        result.error(
            "spec.status",
            "EXPIRED is derived from expirationTime and cannot be stored; use LIVE, BACKGROUND or DRAFT",
        );
    }

    if spec.item_types.is_empty() {
        result.warn("spec.itemTypes", "rule applies to no item types and will never run");
    }

    if spec.actions.is_empty() && spec.status == RuleStatus::Live {
        result.warn("spec.actions", "LIVE rule has no actions; it will only be logged");
    }

    if spec.max_daily_actions == Some(0) {
        result.warn(
            "spec.maxDailyActions",
            "maxDailyActions is 0; the rule drops out after its first dispatch each day",
        );
    }
}

pub(super) fn validate_action_spec(def: &ActionDocument, result: &mut ValidationResult) {
    match &def.spec.callback_url {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
            result.error(
                "spec.callbackUrl",
                format!("callbackUrl must be an http(s) URL, got '{url}'"),
            );
        }
        Some(_) => {}
        None => result.warn(
            "spec.callbackUrl",
            "no callbackUrl; deliveries use the publisher's default callback URL",
        ),
    }

    if let Some(body) = &def.spec.callback_body {
        if !body.is_object() {
            result.error("spec.callbackBody", "callbackBody must be a mapping");
        }
    }
}
