//! Image-edit session state and its persisted projection.

mod history;

pub use history::EditHistory;

use crate::error::{Result, StudioError};
use crate::image::ImageAsset;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};

/// Key holding the uploaded image as `{ base64, mimeType, dataUrl }`.
pub const ORIGINAL_IMAGE_KEY: &str = "originalImage";
/// Key holding the current edit result as a data URL.
pub const EDITED_IMAGE_KEY: &str = "editedImage";
/// Key holding the history as a JSON array of data URLs.
pub const EDIT_HISTORY_KEY: &str = "editHistory";

/// Persisted form of the original image.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredImage {
    base64: String,
    mime_type: String,
    data_url: String,
}

impl From<&ImageAsset> for StoredImage {
    fn from(asset: &ImageAsset) -> Self {
        Self {
            base64: asset.to_base64().to_string(),
            mime_type: asset.mime_type().to_string(),
            data_url: asset.data_url().to_string(),
        }
    }
}

impl TryFrom<StoredImage> for ImageAsset {
    type Error = StudioError;

    fn try_from(stored: StoredImage) -> Result<Self> {
        let asset = ImageAsset::from_base64(&stored.base64, &stored.mime_type)?;
        if asset.data_url() != stored.data_url {
            return Err(StudioError::StorageCorrupt(
                "stored data URL does not match stored bytes".into(),
            ));
        }
        Ok(asset)
    }
}

/// Original image, current edit result and edit history for one editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSession {
    original: Option<ImageAsset>,
    current: Option<ImageAsset>,
    history: EditHistory,
}

impl EditSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the session persisted in `store`.
    ///
    /// Never fails: if any key is unreadable or the keys disagree, the store is
    /// wiped and an empty session is returned.
    pub fn restore(store: &dyn KeyValueStore) -> Self {
        match Self::try_restore(store) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("discarding stored session: {e}");
                if let Err(clear_err) = store.clear() {
                    tracing::warn!("failed to reset session store: {clear_err}");
                }
                Self::new()
            }
        }
    }

    fn try_restore(store: &dyn KeyValueStore) -> Result<Self> {
        let original = store
            .load(ORIGINAL_IMAGE_KEY)?
            .map(|raw| -> Result<ImageAsset> {
                let stored: StoredImage = serde_json::from_str(&raw)
                    .map_err(|e| StudioError::StorageCorrupt(format!("{ORIGINAL_IMAGE_KEY}: {e}")))?;
                ImageAsset::try_from(stored)
            })
            .transpose()?;

        let current = store
            .load(EDITED_IMAGE_KEY)?
            .map(|raw| ImageAsset::from_data_url(&raw))
            .transpose()
            .map_err(|e| StudioError::StorageCorrupt(format!("{EDITED_IMAGE_KEY}: {e}")))?;

        let entries: Vec<String> = store
            .load(EDIT_HISTORY_KEY)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| StudioError::StorageCorrupt(format!("{EDIT_HISTORY_KEY}: {e}")))?
            .unwrap_or_default();
        for (i, entry) in entries.iter().enumerate() {
            ImageAsset::from_data_url(entry).map_err(|e| {
                StudioError::StorageCorrupt(format!("{EDIT_HISTORY_KEY}: entry {i}: {e}"))
            })?;
        }

        if original.is_none() && (current.is_some() || !entries.is_empty()) {
            return Err(StudioError::StorageCorrupt(
                "edit results stored without an original image".into(),
            ));
        }

        let mut history = EditHistory::from_entries(entries);
        if let Some(ref current) = current {
            history.select_matching(current.data_url());
        }

        Ok(Self {
            original,
            current,
            history,
        })
    }

    /// Rewrites all three keys from in-memory state. Absent values remove their key.
    pub fn sync(&self, store: &dyn KeyValueStore) -> Result<()> {
        match &self.original {
            Some(asset) => {
                store.save(
                    ORIGINAL_IMAGE_KEY,
                    &serde_json::to_string(&StoredImage::from(asset))?,
                )?;
            }
            None => store.remove(ORIGINAL_IMAGE_KEY)?,
        }

        match &self.current {
            Some(asset) => store.save(EDITED_IMAGE_KEY, asset.data_url())?,
            None => store.remove(EDITED_IMAGE_KEY)?,
        }

        if self.history.is_empty() {
            store.remove(EDIT_HISTORY_KEY)?;
        } else {
            store.save(
                EDIT_HISTORY_KEY,
                &serde_json::to_string(self.history.entries())?,
            )?;
        }
        Ok(())
    }

    /// Starts a new session from an uploaded image.
    pub fn load_original(&mut self, asset: ImageAsset) {
        self.original = Some(asset);
        self.current = None;
        self.history.clear();
    }

    /// Forgets every image.
    pub fn remove_image(&mut self) {
        self.original = None;
        self.current = None;
        self.history.clear();
    }

    /// Records a successful edit: it becomes current and is appended to history.
    pub fn record_edit(&mut self, asset: ImageAsset) -> usize {
        let index = self.history.append(&asset);
        self.current = Some(asset);
        index
    }

    /// Makes history entry `index` the current image.
    pub fn revert_to(&mut self, index: usize) -> Result<&ImageAsset> {
        let entry = self.history.get(index).ok_or_else(|| {
            StudioError::MissingInput(format!(
                "pick a history entry between 0 and {}",
                self.history.len().saturating_sub(1)
            ))
        })?;
        let asset = ImageAsset::from_data_url(entry)?;
        self.history.revert(index);
        Ok(self.current.insert(asset))
    }

    /// Empties the history. The current image stays on display.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// The image the next edit starts from: the current result, else the original.
    pub fn source_image(&self) -> Option<&ImageAsset> {
        self.current.as_ref().or(self.original.as_ref())
    }

    /// The uploaded image.
    pub fn original(&self) -> Option<&ImageAsset> {
        self.original.as_ref()
    }

    /// The latest or reverted-to edit result.
    pub fn current(&self) -> Option<&ImageAsset> {
        self.current.as_ref()
    }

    /// The edit log.
    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.original.is_none() && self.current.is_none() && self.history.is_empty()
    }
}
