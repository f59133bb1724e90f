//! Channel selection and the bad-channel flag set.
//!
//! Name matching everywhere in the crate is case-insensitive and ignores
//! spaces, so `"e 105"` refers to `E105` and `"sti014"` to `STI 014`.
use serde::{Deserialize, Serialize};

/// Canonical form used for channel-name comparisons.
pub fn normalize_name(name: &str) -> String {
    name.replace(' ', "").to_lowercase()
}

/// Whether two channel names refer to the same channel.
pub fn same_channel(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

/// Ordered set of channel names flagged as bad.
///
/// Insertion order is kept (it is the order written to `bad-elecs.tsv`);
/// duplicates under [`normalize_name`] are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelFlagSet(Vec<String>);

impl ChannelFlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the name was not already present.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.0.push(name.to_string());
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|n| !same_channel(n, name));
        self.0.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| same_channel(n, name))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<S: AsRef<str>> FromIterator<S> for ChannelFlagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.insert(name.as_ref());
        }
        set
    }
}

/// Indices of channels whose name starts with `prefix` and is not flagged.
///
/// The prefix test is case-sensitive: EGI scalp electrodes are `E1…E128`
/// while the reference and trigger channels are `VREF` and `STI 014`.
pub fn select_by_prefix(names: &[String], prefix: &str, bads: &ChannelFlagSet) -> Vec<usize> {
    names.iter()
        .enumerate()
        .filter(|(_, n)| n.starts_with(prefix) && !bads.contains(n))
        .map(|(i, _)| i)
        .collect()
}

/// Indices of the listed channels, in the order given. Unknown names are
/// returned in the error.
pub fn indices_of(names: &[String], wanted: &[String]) -> Result<Vec<usize>, crate::Error> {
    wanted.iter()
        .map(|w| names.iter()
            .position(|n| same_channel(n, w))
            .ok_or_else(|| crate::Error::ChannelNotFound(w.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefix_selection_skips_bads_and_non_scalp() {
        let chs = names(&["E1", "E2", "E3", "VREF", "STI 014"]);
        let bads: ChannelFlagSet = ["e2"].into_iter().collect();
        assert_eq!(select_by_prefix(&chs, "E", &bads), vec![0, 2]);
    }

    #[test]
    fn flag_set_ignores_case_and_spaces() {
        let mut set = ChannelFlagSet::new();
        assert!(set.insert("E105"));
        assert!(!set.insert("e 105"));
        assert!(set.contains("E105"));
        assert_eq!(set.len(), 1);
        assert!(set.remove("e105"));
        assert!(set.is_empty());
    }

    #[test]
    fn indices_of_reports_missing() {
        let chs = names(&["E1", "VREF"]);
        assert_eq!(indices_of(&chs, &names(&["vref"])).unwrap(), vec![1]);
        assert_eq!(
            indices_of(&chs, &names(&["E128"])).unwrap_err(),
            crate::Error::ChannelNotFound("E128".into()),
        );
    }
}
