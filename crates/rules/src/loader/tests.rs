//! Tests for the document loader module.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::memory::InMemoryRuleRepository;
use crate::schema::{DocumentKind, RuleDocument};
use crate::services::{ActionSource, RuleSource};

const RULE_YAML: &str = r#"
apiVersion: v1
kind: Rule
metadata:
  id: casino-spam
  name: Casino Spam
spec:
  status: LIVE
  itemTypes: [post]
  actions: [remove-post]
  conditionSet:
    conjunction: AND
    conditions:
      - input: { type: CONTENT_FIELD, name: text }
        signal: { type: EXTERNAL, id: TEXT_CONTAINS }
        matchingValues: [casino]
"#;

const ACTION_YAML: &str = r#"
apiVersion: v1
kind: Action
metadata:
  id: remove-post
  name: Remove Post
spec:
  callbackUrl: https://hooks.example.com/remove
"#;

const POLICY_YAML: &str = r#"
apiVersion: v1
kind: Policy
metadata:
  id: spam
  name: Spam
spec:
  penalty: MEDIUM
"#;

fn temp_loader() -> (TempDir, RuleLoader) {
    let dir = TempDir::new().expect("create tempdir");
    let loader = RuleLoader::new(dir.path().to_path_buf(), Arc::new(InMemoryRuleRepository::new()));
    (dir, loader)
}

#[test]
fn load_rule_from_file() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("casino-spam.yml");
    fs::write(&path, RULE_YAML).unwrap();

    let doc = loader.load_file(&path).unwrap();
    assert_eq!(doc.metadata().id, "casino-spam");
    assert_eq!(doc.kind(), DocumentKind::Rule);
    // load_file only parses.
    assert_eq!(loader.repository().rule_count(), 0);
}

#[tokio::test]
async fn load_all_fills_repository() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("rule.yml"), RULE_YAML).unwrap();
    let sub = dir.path().join("actions");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("remove.yaml"), ACTION_YAML).unwrap();
    fs::write(sub.join("spam.yml"), POLICY_YAML).unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(results.iter().filter(|r| r.is_loaded()).count(), 3);

    let repo = loader.repository();
    assert_eq!((repo.rule_count(), repo.action_count(), repo.policy_count()), (1, 1, 1));
    let rules = repo.get_enabled_rules_for_item_type("post").await.unwrap().unwrap();
    assert_eq!(rules[0].id, "casino-spam");
    let actions = repo.get_actions_for_rule("casino-spam").await.unwrap();
    assert_eq!(actions[0].callback_url.as_deref(), Some("https://hooks.example.com/remove"));
    assert_eq!(loader.documents().len(), 3);
}

#[test]
fn load_all_skips_dotfiles_and_non_yaml() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("rule.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join(".hidden.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("readme.txt"), "not a rule").unwrap();

    let results = loader.load_all().unwrap();
    let skipped = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .count();
    assert_eq!(results.iter().filter(|r| r.is_loaded()).count(), 1);
    assert_eq!(skipped, 2);
}

#[test]
fn same_id_in_different_kinds_coexists() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("a.yml"), POLICY_YAML).unwrap();
    fs::write(
        dir.path().join("b.yml"),
        ACTION_YAML.replace("remove-post", "spam"),
    )
    .unwrap();

    loader.load_all().unwrap();
    assert!(loader.document(DocumentKind::Policy, "spam").is_some());
    assert!(loader.document(DocumentKind::Action, "spam").is_some());
}

#[test]
fn invalid_yaml_produces_error_not_panic() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("bad.yml");
    fs::write(&path, "{{{{not yaml").unwrap();
    assert!(loader.load_file(&path).is_err());
}

#[test]
fn unknown_kind_fails() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("odd.yml");
    fs::write(&path, RULE_YAML.replace("kind: Rule", "kind: Webhook")).unwrap();
    let err = loader.load_file(&path).unwrap_err();
    assert!(err.to_string().contains("unknown document kind"));
}

#[test]
fn empty_id_fails_validation() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("empty.yml");
    fs::write(&path, RULE_YAML.replace("id: casino-spam", "id: \"\"")).unwrap();
    assert!(matches!(loader.load_file(&path), Err(RuleError::Validation(_))));
}

const EMPTY_CONDITIONS: &str = r#"
apiVersion: v1
kind: Rule
metadata:
  id: catch-all
  name: Catch All
spec:
  status: LIVE
  itemTypes: [post]
  actions: [remove-post]
  conditionSet:
    conjunction: AND
    conditions: []
"#;

#[test]
fn rule_without_conditions_is_rejected() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("good.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("catch-all.yml"), EMPTY_CONDITIONS).unwrap();

    let results = loader.load_all().unwrap();
    let failed: Vec<_> = results.iter().filter(|r| r.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    match &failed[0].status {
        LoadStatus::Failed { error } => {
            assert!(error.contains("catch-all"), "{error}");
            assert!(error.contains("spec.conditionSet.conditions"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(loader.repository().rule_count(), 1);
    assert!(loader.repository().rule("catch-all").is_none());
}

#[test]
fn nested_empty_set_is_rejected() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("nested.yml");
    let yaml = RULE_YAML.replace(
        "        matchingValues: [casino]\n",
        "        matchingValues: [casino]\n      - conjunction: OR\n        conditions: []\n",
    );
    assert_ne!(yaml, RULE_YAML);
    fs::write(&path, yaml).unwrap();
    assert!(matches!(loader.load_file(&path), Err(RuleError::Validation(_))));
}

#[test]
fn write_document_rejects_invalid_rule() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("seed.yml");
    fs::write(&path, RULE_YAML).unwrap();
    let RuleDocument::Rule(mut rule) = loader.load_file(&path).unwrap() else {
        panic!("expected rule document");
    };
    rule.metadata.id = "emptied".into();
    rule.spec.condition_set.conditions.clear();

    assert!(matches!(
        loader.write_document(&RuleDocument::Rule(rule)),
        Err(RuleError::Validation(_))
    ));
    assert!(!dir.path().join("emptied.yml").exists());
    assert_eq!(loader.repository().rule_count(), 0);
}

#[test]
fn load_all_reports_failed_files() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("good.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("bad.yml"), "kind: Rule\n").unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(results.iter().filter(|r| r.is_failed()).count(), 1);
    assert_eq!(loader.repository().rule_count(), 1);
}

#[test]
fn write_and_delete_document() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("seed.yml"), POLICY_YAML).unwrap();
    loader.load_all().unwrap();

    let doc = loader.document(DocumentKind::Policy, "spam").unwrap();
    let RuleDocument::Policy(mut policy) = doc else {
        panic!("expected policy document");
    };
    policy.metadata.id = "scam".into();
    let path = loader.write_document(&RuleDocument::Policy(policy)).unwrap();
    assert!(path.ends_with("scam.yml"));
    assert_eq!(loader.repository().policy_count(), 2);

    loader.delete_document(DocumentKind::Policy, "scam").unwrap();
    assert!(!path.exists());
    assert_eq!(loader.repository().policy_count(), 1);
    assert!(loader.delete_document(DocumentKind::Policy, "scam").is_err());
}

#[test]
fn new_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    let loader = RuleLoader::new(nested.clone(), Arc::new(InMemoryRuleRepository::new()));
    assert!(nested.is_dir());
    assert_eq!(loader.rules_dir(), nested.as_path());
}

mod hot_reload {
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use notify::{Event, EventKind};

    use super::*;
    use crate::loader::watcher::handle_fs_event;

    fn event(kind: EventKind, path: &std::path::Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn created_file_is_loaded() {
        let (dir, loader) = temp_loader();
        let path = dir.path().join("spam.yml");
        fs::write(&path, POLICY_YAML).unwrap();

        handle_fs_event(&event(EventKind::Create(CreateKind::File), &path), loader.state());
        assert_eq!(loader.repository().policy_count(), 1);
        assert!(loader.document(DocumentKind::Policy, "spam").is_some());
    }

    #[test]
    fn edit_that_changes_id_replaces_old_document() {
        let (dir, loader) = temp_loader();
        let path = dir.path().join("policy.yml");
        fs::write(&path, POLICY_YAML).unwrap();
        loader.load_all().unwrap();

        fs::write(&path, POLICY_YAML.replace("id: spam", "id: scam")).unwrap();
        handle_fs_event(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &path),
            loader.state(),
        );
        assert!(loader.document(DocumentKind::Policy, "spam").is_none());
        assert!(loader.document(DocumentKind::Policy, "scam").is_some());
        assert_eq!(loader.repository().policy_count(), 1);
    }

    #[test]
    fn broken_edit_keeps_previous_version() {
        let (dir, loader) = temp_loader();
        let path = dir.path().join("policy.yml");
        fs::write(&path, POLICY_YAML).unwrap();
        loader.load_all().unwrap();

        fs::write(&path, "{{{{ broken").unwrap();
        handle_fs_event(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &path),
            loader.state(),
        );
        assert!(loader.document(DocumentKind::Policy, "spam").is_some());
    }

    #[test]
    fn edit_emptying_conditions_keeps_previous_version() {
        let (dir, loader) = temp_loader();
        let path = dir.path().join("rule.yml");
        fs::write(&path, RULE_YAML).unwrap();
        loader.load_all().unwrap();

        fs::write(&path, EMPTY_CONDITIONS.replace("catch-all", "casino-spam")).unwrap();
        handle_fs_event(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &path),
            loader.state(),
        );
        let rule = loader.repository().rule("casino-spam").unwrap();
        assert_eq!(rule.condition_set.conditions.len(), 1);
    }

    #[test]
    fn removed_file_unloads_document() {
        let (dir, loader) = temp_loader();
        let path = dir.path().join("rule.yml");
        fs::write(&path, RULE_YAML).unwrap();
        loader.load_all().unwrap();
        assert_eq!(loader.repository().rule_count(), 1);

        fs::remove_file(&path).unwrap();
        handle_fs_event(&event(EventKind::Remove(RemoveKind::File), &path), loader.state());
        assert_eq!(loader.repository().rule_count(), 0);
        assert!(loader.documents().is_empty());
    }

    #[test]
    fn dotfiles_are_ignored() {
        let (dir, loader) = temp_loader();
        let path = dir.path().join(".spam.yml.tmp.yml");
        fs::write(&path, POLICY_YAML).unwrap();
        handle_fs_event(&event(EventKind::Create(CreateKind::File), &path), loader.state());
        assert_eq!(loader.repository().policy_count(), 0);
    }
}
