//! `mdm list` – show completed downloads with their size on disk.

use mdm_core::manager::DownloadManager;

/// `1536` → `1.5 KiB`.
pub(super) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

pub fn run_list(manager: &DownloadManager) {
    let mut records = manager.all_downloads();
    if records.is_empty() {
        println!("No downloads recorded.");
        return;
    }
    records.sort_by_key(|r| r.id);
    println!(
        "{:<10} {:<16} {:<10} {:<28} {}",
        "ID", "DOWNLOADED_AT", "SIZE", "FILE", "PATH"
    );
    let mut total = 0u64;
    let mut missing = 0usize;
    for r in records {
        // Missing files show as `-` and are left out of the total.
        let size = match std::fs::metadata(&r.local_path) {
            Ok(meta) => {
                total += meta.len();
                format_size(meta.len())
            }
            Err(_) => {
                missing += 1;
                "-".to_string()
            }
        };
        println!(
            "{:<10} {:<16} {:<10} {:<28} {}",
            r.id,
            r.downloaded_at,
            size,
            r.file_name,
            r.local_path.display()
        );
    }
    if missing > 0 {
        println!("Total: {} ({} file(s) missing)", format_size(total), missing);
    } else {
        println!("Total: {}", format_size(total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
