//! Interactive conflict resolution.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use dialoguer::{Input, Select};

use confsync_core::merge::{MergeStatus, Resolution, ResolutionChoice, SyncResult};

use crate::render;
use crate::style;

/// Walk the user through every open conflict and collect resolutions.
///
/// Skipped conflicts stay in the returned map as explicit skips, so the
/// caller can tell "user chose to defer" apart from "no answer given".
pub fn prompt_resolutions(result: &SyncResult) -> Result<BTreeMap<String, Vec<Resolution>>> {
    let mut resolutions: BTreeMap<String, Vec<Resolution>> = BTreeMap::new();

    for file in &result.files {
        if file.status != MergeStatus::Conflicted {
            continue;
        }

        for conflict in &file.conflicts {
            render::print_conflict(&file.file_name, conflict);
            println!();

            let options = vec![
                format!("keep {}", style::local_label()),
                format!("take {}", style::remote_label()),
                "restore base".to_string(),
                "enter a value manually".to_string(),
                "skip for now".to_string(),
            ];
            let selection = Select::new()
                .with_prompt("Resolution")
                .items(&options)
                .default(0)
                .interact()
                .context("failed to read resolution choice")?;

            let resolution = match selection {
                0 => Resolution::new(conflict.key.clone(), ResolutionChoice::Local),
                1 => Resolution::new(conflict.key.clone(), ResolutionChoice::Remote),
                2 => Resolution::new(conflict.key.clone(), ResolutionChoice::Base),
                3 => {
                    let value: String = Input::new()
                        .with_prompt(format!("New value for {}", conflict.key))
                        .allow_empty(true)
                        .interact_text()
                        .context("failed to read manual value")?;
                    Resolution::manual(conflict.key.clone(), value)
                }
                _ => Resolution::new(conflict.key.clone(), ResolutionChoice::Skip),
            };

            resolutions
                .entry(file.file_name.clone())
                .or_default()
                .push(resolution);
        }
    }

    Ok(resolutions)
}

/// Count resolutions that defer rather than decide.
pub fn count_skipped(resolutions: &BTreeMap<String, Vec<Resolution>>) -> usize {
    resolutions
        .values()
        .flatten()
        .filter(|r| r.choice == ResolutionChoice::Skip)
        .count()
}
