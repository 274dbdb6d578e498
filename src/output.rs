//! Output formatting utilities

use crate::error::Result;
use crate::report::{ComparisonReport, KeyDiff, KeyDiffKind, StoreDiff, StoreStatus};
use crate::snapshot::DirStoreSet;
use crate::store::StoreSet;

/// Pretty printer for storediff output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print a comparison report as a tree
    pub fn print_report(report: &ComparisonReport) {
        println!(
            "🔍 Store comparison: version {} (left) vs {} (right)",
            report.version_left, report.version_right
        );

        for (i, diff) in report.diffs.iter().enumerate() {
            let last = i == report.diffs.len() - 1;
            Self::print_store_diff(diff, last);
        }

        let s = &report.summary;
        println!(
            "📊 {} stores: {} matching, {} differing, {} missing",
            s.total, s.matching, s.differing, s.missing
        );
        if s.is_identical {
            println!("✅ Snapshots are identical");
        } else {
            println!("❌ Snapshots diverge");
        }
    }

    fn print_store_diff(diff: &StoreDiff, last: bool) {
        let prefix = if last { "└─" } else { "├─" };
        let cont = if last { "   " } else { "│  " };

        let headline = match diff.status {
            StoreStatus::Match => format!("✅ {}: hashes match", diff.name),
            StoreStatus::Differ => format!("❌ {}: hashes differ", diff.name),
            StoreStatus::MissingInRight => format!("⚠️  {}: only in left snapshot", diff.name),
            StoreStatus::MissingInLeft => format!("⚠️  {}: only in right snapshot", diff.name),
        };
        println!("{} {}", prefix, headline);

        let mut details = Vec::new();
        if diff.status == StoreStatus::Differ {
            if let Some(hash) = &diff.hash_left {
                details.push(format!("Left:  {}", hash));
            }
            if let Some(hash) = &diff.hash_right {
                details.push(format!("Right: {}", hash));
            }
        }
        for key_diff in &diff.key_diffs {
            details.push(Self::format_key_diff(key_diff));
        }
        if diff.truncated {
            details.push("... further diffs truncated at the configured limit".to_string());
        }
        if let Some(sample) = &diff.sample_keys {
            let keys: Vec<String> = sample.iter().map(|k| k.to_hex()).collect();
            details.push(format!("Sample keys: {}", keys.join(", ")));
        }
        if let Some(shape) = &diff.shape {
            details.push(format!(
                "Shape: {} vs {} lines, {} mismatching positions{}",
                shape.lines_left,
                shape.lines_right,
                shape.mismatches.len(),
                if shape.truncated { " (truncated)" } else { "" }
            ));
        }
        if diff.partial {
            details.push("⚠️  comparison incomplete (stream failed mid-run)".to_string());
        }
        if let Some(note) = &diff.note {
            details.push(format!("Note: {}", note));
        }

        for (i, line) in details.iter().enumerate() {
            let marker = if i == details.len() - 1 { "└─" } else { "├─" };
            println!("{}{} {}", cont, marker, line);
        }
    }

    fn format_key_diff(diff: &KeyDiff) -> String {
        match diff.kind {
            KeyDiffKind::KeyOnlyLeft => format!(
                "only left:  {} (value {})",
                diff.key,
                diff.value_left.as_ref().map(|v| v.to_hex()).unwrap_or_default()
            ),
            KeyDiffKind::KeyOnlyRight => format!(
                "only right: {} (value {})",
                diff.key,
                diff.value_right.as_ref().map(|v| v.to_hex()).unwrap_or_default()
            ),
            KeyDiffKind::ValueDiffers => format!(
                "differs:    {} left={} right={}",
                diff.key,
                diff.value_left.as_ref().map(|v| v.to_hex()).unwrap_or_default(),
                diff.value_right.as_ref().map(|v| v.to_hex()).unwrap_or_default()
            ),
        }
    }

    /// Print one opened snapshot's stores and root hashes
    pub fn print_store_set(set: &DirStoreSet) {
        println!("📸 Snapshot at version {}", set.version());
        let infos: Vec<_> = set.store_infos().collect();
        if infos.is_empty() {
            println!("└─ (no stores)");
            return;
        }
        println!("├─ Stores: {}", infos.len());
        for (i, info) in infos.iter().enumerate() {
            let prefix = if i == infos.len() - 1 { "└─" } else { "├─" };
            println!(
                "{} {} ({:?}): {}",
                prefix,
                info.name,
                info.kind,
                info.root_hash
            );
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Format an opened snapshot's store summaries as JSON
    pub fn format_store_set(set: &DirStoreSet) -> Result<String> {
        let stores: Vec<_> = set.store_infos().collect();
        let json = serde_json::json!({
            "version": set.version(),
            "stores": stores,
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}
