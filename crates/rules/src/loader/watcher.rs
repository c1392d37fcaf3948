//! Filesystem event handler for the notify watcher (hot-reload).

use std::fs;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use super::core::{is_yaml, parse_document, LoaderState};
use super::error::RuleError;

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(event: &Event, state: &LoaderState) {
    for path in &event.paths {
        if !is_yaml(path) {
            continue;
        }

        // Skip dotfiles (including our .tmp files)
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                continue;
            }
        }

        match &event.kind {
            EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_)) => {
                // A rename away from this path shows up here too.
                if !path.exists() {
                    remove(state, path);
                    continue;
                }
                match fs::read_to_string(path).map_err(RuleError::from).and_then(|c| parse_document(&c)) {
                    Ok(doc) => {
                        info!(
                            id = %doc.metadata().id,
                            kind = %doc.kind(),
                            path = %path.display(),
                            "hot-reloaded document"
                        );
                        state.upsert(path, doc);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to reload document, keeping previous version"
                        );
                    }
                }
            }
            EventKind::Remove(RemoveKind::File) => remove(state, path),
            _ => {}
        }
    }
}

fn remove(state: &LoaderState, path: &std::path::Path) {
    if let Some((kind, id)) = state.remove_path(path) {
        info!(id = %id, kind = %kind, path = %path.display(), "removed document after file deletion");
    }
}
