use crate::image::ImageAsset;

/// Append-only log of edit results, stored as data URLs.
///
/// Reverting only moves the "current" cursor. Entries after it stay, and the
/// next append still lands at the tail of the full log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditHistory {
    entries: Vec<String>,
    current: Option<usize>,
}

impl EditHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a history from persisted entries. The last entry is current.
    pub fn from_entries(entries: Vec<String>) -> Self {
        let current = entries.len().checked_sub(1);
        Self { entries, current }
    }

    /// Appends `asset` at the tail and makes it current. Returns its index.
    pub fn append(&mut self, asset: &ImageAsset) -> usize {
        self.entries.push(asset.data_url().to_string());
        let index = self.entries.len() - 1;
        self.current = Some(index);
        index
    }

    /// Makes the entry at `index` current without removing anything.
    pub fn revert(&mut self, index: usize) -> Option<&str> {
        let entry = self.entries.get(index)?;
        self.current = Some(index);
        Some(entry.as_str())
    }

    /// Points the cursor at the last entry equal to `data_url`, if any.
    pub(crate) fn select_matching(&mut self, data_url: &str) {
        self.current = self.entries.iter().rposition(|e| e == data_url);
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in generation order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Index of the current entry.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;

    fn asset(tag: u8) -> ImageAsset {
        ImageAsset::new(vec![tag], ImageFormat::Png)
    }

    #[test]
    fn test_append_grows_by_one() {
        let mut history = EditHistory::new();
        for i in 0..5u8 {
            let before = history.len();
            let index = history.append(&asset(i));
            assert_eq!(history.len(), before + 1);
            assert_eq!(index, before);
            assert_eq!(history.current_index(), Some(index));
        }
    }

    #[test]
    fn test_append_keeps_duplicates() {
        let mut history = EditHistory::new();
        history.append(&asset(1));
        history.append(&asset(1));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_revert_then_append_goes_to_tail() {
        let mut history = EditHistory::new();
        history.append(&asset(1));
        history.append(&asset(2));
        history.append(&asset(3));
        let before = history.entries().to_vec();

        assert_eq!(history.revert(0), Some(asset(1).data_url()));
        assert_eq!(history.current_index(), Some(0));
        assert_eq!(history.len(), 3);

        history.append(&asset(4));
        let mut expected = before;
        expected.push(asset(4).data_url().to_string());
        assert_eq!(history.entries(), expected.as_slice());
        assert_eq!(history.current_index(), Some(3));
    }

    #[test]
    fn test_revert_out_of_range() {
        let mut history = EditHistory::new();
        history.append(&asset(1));
        assert_eq!(history.revert(5), None);
        assert_eq!(history.current_index(), Some(0));
    }

    #[test]
    fn test_clear() {
        let mut history = EditHistory::from_entries(vec!["data:a".into(), "data:b".into()]);
        assert_eq!(history.current_index(), Some(1));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.current_index(), None);
    }
}
