//! Query cache maintenance.

use std::io::Write;

use anyhow::{Context, Result};
use qm_store::Cache;

use crate::config::Config;

/// Empties the cache.
pub fn clear(config: &Config, writer: &mut impl Write) -> Result<()> {
    let path = &config.cache_path;
    if !path.exists() {
        writeln!(writer, "Cache is empty ({} does not exist)", path.display())?;
        return Ok(());
    }
    let mut cache = Cache::open(path)
        .with_context(|| format!("failed to open cache at {}", path.display()))?;
    let stats = cache.stats()?;
    let removed = cache.clear()?;
    tracing::debug!(removed, events = stats.events, "cache cleared");
    writeln!(
        writer,
        "Removed {removed} cached chunks ({} events) from {}",
        stats.events,
        path.display()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use qm_store::ChunkKey;

    #[test]
    fn test_clear_missing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache_path = dir.path().join("cache.db");
        let mut out = Vec::new();

        clear(&config, &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().starts_with("Cache is empty"));
        assert!(!config.cache_path.exists());
    }

    #[test]
    fn test_clear_removes_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache_path = dir.path().join("cache.db");
        {
            let mut cache = Cache::open(&config.cache_path).unwrap();
            let key = ChunkKey::new(
                "activitywatch",
                "erb-laptop",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
            );
            assert!(cache.put_chunk(&key, &[]).unwrap());
        }
        let mut out = Vec::new();

        clear(&config, &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().starts_with("Removed 1 cached chunks (0 events)"));
        assert_eq!(Cache::open(&config.cache_path).unwrap().stats().unwrap().chunks, 0);
    }
}
