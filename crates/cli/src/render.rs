//! Rendering of plans, stats, and history for terminal output.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use diffy::PatchFormatter;

use confsync_core::merge::{ConflictEntry, MergeStatus, SyncResult};
use confsync_core::models::{SyncRecord, SyncStats, SyncStatus};

use crate::style;

/// Print a per-file summary of a sync plan.
pub fn print_plan(result: &SyncResult) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Kind", "Status", "Auto-merged", "Conflicts"]);

    for file in &result.files {
        let status = match file.status {
            MergeStatus::Clean => style::dim("clean"),
            MergeStatus::AutoMerged => style::success("auto-merged"),
            MergeStatus::Conflicted => style::error("conflicted"),
        };
        table.add_row(vec![
            Cell::new(&file.file_name),
            Cell::new(file.kind.to_string()),
            Cell::new(status),
            Cell::new(file.auto_merged.len()),
            Cell::new(file.conflicts.len()),
        ]);
    }

    println!("{table}");
}

/// Print one conflict in detail, including a diff preview for whole-file
/// conflicts.
pub fn print_conflict(file_name: &str, conflict: &ConflictEntry) {
    println!();
    println!(
        "{}",
        style::header(&format!("Conflict in {} ({})", file_name, conflict.key))
    );
    println!("  kind: {}", conflict.kind);
    print_value("base", conflict.base_value.as_deref());
    print_value(&style::local_label(), conflict.local_value.as_deref());
    print_value(&style::remote_label(), conflict.remote_value.as_deref());

    // For multi-line values a unified diff reads better than two blobs.
    if let (Some(local), Some(remote)) = (
        conflict.local_value.as_deref(),
        conflict.remote_value.as_deref(),
    ) {
        if local.contains('\n') || remote.contains('\n') {
            println!();
            println!("  {} -> {}:", style::local_label(), style::remote_label());
            let patch = diffy::create_patch(local, remote);
            let formatter = PatchFormatter::new().with_color();
            print!("{}", formatter.fmt_patch(&patch));
        }
    }
}

fn print_value(label: &str, value: Option<&str>) {
    match value {
        Some(v) if v.contains('\n') => {
            println!("  {}: ({} bytes, multi-line)", label, v.len());
        }
        Some(v) => println!("  {}: {}", label, v),
        None => println!("  {}: {}", label, style::dim("(absent)")),
    }
}

/// Print the closing stats of a completed cycle.
pub fn print_stats(stats: &SyncStats) {
    println!();
    println!("{}", style::header("Cycle summary"));
    println!("  Files examined : {}", stats.files_examined);
    println!("  Clean          : {}", stats.files_clean);
    println!("  Auto-merged    : {}", stats.files_auto_merged);
    println!("  Written locally: {}", stats.files_written);
    println!("  Uploaded       : {}", stats.uploaded);
    println!("  Downloaded     : {}", stats.downloaded);
    if stats.conflicts_detected > 0 {
        println!(
            "  Conflicts      : {} detected, {} resolved",
            stats.conflicts_detected, stats.conflicts_resolved
        );
    }
}

/// Print the status summary.
pub fn print_status(status: &SyncStatus) {
    println!("{}", style::header("confsync status"));
    println!();
    println!("  State          : {}", status.state);
    println!(
        "  Last sync at   : {}",
        status
            .last_sync_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    println!(
        "  Base fingerprint: {}",
        status
            .base_fingerprint
            .as_deref()
            .unwrap_or("none (no prior sync)")
    );
    println!("  Tracked files  : {}", status.tracked_files);
    println!("  Total sync ops : {}", status.total_syncs);
}

/// Print recent sync records as a table.
pub fn print_log(records: &[SyncRecord]) {
    if records.is_empty() {
        println!("No sync history yet.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Started",
        "Op",
        "Status",
        "Examined",
        "Written",
        "Conflicts",
    ]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(record.operation.to_string()),
            Cell::new(record.status.to_string()),
            Cell::new(record.files_examined),
            Cell::new(record.files_written),
            Cell::new(format!(
                "{}/{}",
                record.conflicts_resolved, record.conflicts_detected
            )),
        ]);
    }

    println!("{table}");
}
