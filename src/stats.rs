//! Chain-length statistics for diagnosing hash quality.

use crate::table::{BucketTable, Entries};
use core::fmt;

/// Chain lengths at or above `DISTRIBUTION_LEN - 1` share the last slot.
pub const DISTRIBUTION_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    pub size: usize,
    pub used: usize,
    /// Non-empty buckets.
    pub slots: usize,
    pub max_chain_len: usize,
    pub total_chain_len: usize,
    /// `distribution[n]` = buckets whose chain has `n` entries.
    pub distribution: Vec<usize>,
}

impl TableStats {
    pub(crate) fn collect<K, P>(table: &BucketTable, entries: &Entries<K, P>) -> Self {
        let mut stats = TableStats {
            size: table.size(),
            used: table.used(),
            slots: 0,
            max_chain_len: 0,
            total_chain_len: 0,
            distribution: vec![0; DISTRIBUTION_LEN],
        };
        for idx in 0..table.size() {
            let len = table.chain_len(entries, idx);
            stats.distribution[len.min(DISTRIBUTION_LEN - 1)] += 1;
            if len == 0 {
                continue;
            }
            stats.slots += 1;
            stats.max_chain_len = stats.max_chain_len.max(len);
            stats.total_chain_len += len;
        }
        stats
    }

    /// Mean chain length over non-empty buckets, from walking the chains.
    pub fn avg_chain_len_counted(&self) -> f64 {
        if self.slots == 0 {
            return 0.0;
        }
        self.total_chain_len as f64 / self.slots as f64
    }

    /// Mean chain length over non-empty buckets, from the `used` counter.
    pub fn avg_chain_len_computed(&self) -> f64 {
        if self.slots == 0 {
            return 0.0;
        }
        self.used as f64 / self.slots as f64
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.used == 0 {
            return writeln!(f, "No stats available for empty dictionaries");
        }
        writeln!(f, "Hash table stats:")?;
        writeln!(f, " table size: {}", self.size)?;
        writeln!(f, " number of elements: {}", self.used)?;
        writeln!(f, " different slots: {}", self.slots)?;
        writeln!(f, " max chain length: {}", self.max_chain_len)?;
        writeln!(f, " avg chain length (counted): {:.02}", self.avg_chain_len_counted())?;
        writeln!(f, " avg chain length (computed): {:.02}", self.avg_chain_len_computed())?;
        writeln!(f, " Chain length distribution:")?;
        for (len, &count) in self.distribution.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let prefix = if len == DISTRIBUTION_LEN - 1 { ">= " } else { "" };
            let pct = count as f64 / self.size as f64 * 100.0;
            writeln!(f, "   {prefix}{len}: {count} ({pct:.02}%)")?;
        }
        Ok(())
    }
}

/// Stats for the current table and, mid-rehash, the target table.
#[derive(Debug, Clone, PartialEq)]
pub struct DictStats {
    pub main: TableStats,
    pub rehash_target: Option<TableStats>,
}

impl fmt::Display for DictStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.main)?;
        if let Some(target) = &self.rehash_target {
            writeln!(f, "-- Rehashing into ht[1]:")?;
            write!(f, "{target}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DictConfig;
    use crate::dict::Dict;
    use crate::dict_type::IntKeys;

    #[test]
    fn empty_dict_reports_no_stats() {
        let d: Dict<u32, (), IntKeys> = Dict::with_type(IntKeys, ());
        let s = d.stats();
        assert_eq!(s.main.used, 0);
        assert!(s.to_string().starts_with("No stats available"));
    }

    #[test]
    fn counts_add_up() {
        let mut d: Dict<u32, (), IntKeys> = Dict::with_config(IntKeys, (), DictConfig::shared());
        for k in 0..100 {
            d.insert_raw(k).unwrap();
        }
        while d.rehash(1) {}
        let s = d.stats().main;
        assert_eq!(s.used, 100);
        assert_eq!(s.total_chain_len, 100);
        assert_eq!(s.distribution.iter().sum::<usize>(), s.size);
        assert_eq!(s.size - s.distribution[0], s.slots);
        assert!((s.avg_chain_len_counted() - s.avg_chain_len_computed()).abs() < 1e-9);
        let text = d.stats().to_string();
        assert!(text.contains("number of elements: 100"));
    }
}
