use super::Score;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Identifies a playable item in a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        ItemId(value.to_string())
    }
}

/// Resolves an item into a decoded score. Called off the engine thread, so it
/// may block on storage or network access.
pub trait ScoreProvider: Send + Sync {
    fn resolve(&self, item: &ItemId) -> Result<Score, ProviderError>;
}

impl<F> ScoreProvider for F
where
    F: Fn(&ItemId) -> Result<Score, ProviderError> + Send + Sync,
{
    fn resolve(&self, item: &ItemId) -> Result<Score, ProviderError> {
        self(item)
    }
}

/// Reads scores stored as `<root>/<item>.ron`.
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, item: &ItemId) -> Option<PathBuf> {
        // item ids are file stems, never paths
        let id = item.as_str();
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return None;
        }
        Some(self.root.join(format!("{id}.ron")))
    }
}

impl ScoreProvider for DirectoryProvider {
    fn resolve(&self, item: &ItemId) -> Result<Score, ProviderError> {
        let path = self
            .path_for(item)
            .ok_or_else(|| ProviderError::NotFound(item.clone()))?;

        let source = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ProviderError::NotFound(item.clone()),
            _ => ProviderError::Io {
                item: item.clone(),
                source: e,
            },
        })?;

        // notes outside the data model fail here, not at playback
        ron::from_str(&source).map_err(|e| ProviderError::MalformedSource {
            item: item.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{NoteEvent, Track};

    #[test]
    fn test_directory_provider_resolves_ron() {
        let dir = tempfile::tempdir().unwrap();
        let score = Score::new(vec![Track::new(vec![NoteEvent::new(60, 0.0, 2.0, 0.5)])]);
        let text = ron::ser::to_string_pretty(&score, ron::ser::PrettyConfig::default()).unwrap();
        fs::write(dir.path().join("song.ron"), text).unwrap();

        let provider = DirectoryProvider::new(dir.path());
        let resolved = provider.resolve(&ItemId::new("song")).unwrap();
        assert_eq!(resolved, score);
    }

    #[test]
    fn test_directory_provider_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryProvider::new(dir.path());
        assert!(matches!(
            provider.resolve(&ItemId::new("missing")),
            Err(ProviderError::NotFound(_))
        ));
        assert!(matches!(
            provider.resolve(&ItemId::new("../escape")),
            Err(ProviderError::NotFound(_))
        ));
    }

    #[test]
    fn test_directory_provider_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.ron"), "(tracks: [").unwrap();
        let provider = DirectoryProvider::new(dir.path());
        assert!(matches!(
            provider.resolve(&ItemId::new("broken")),
            Err(ProviderError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_short_duration_is_extended() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("short.ron"),
            "(tracks: [(notes: [(pitch: 60, start_time: 1.0, duration: 2.0, velocity: 1.0)])], total_duration: 0.5)",
        )
        .unwrap();
        let provider = DirectoryProvider::new(dir.path());
        let score = provider.resolve(&ItemId::new("short")).unwrap();
        assert_eq!(score.total_duration(), 3.0);
    }

    #[test]
    fn test_out_of_range_notes_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryProvider::new(dir.path());
        let cases = [
            ("negative_start", "start_time: -2.0, duration: 1.0, velocity: 0.5"),
            ("negative_duration", "start_time: 0.0, duration: -1.0, velocity: 0.5"),
            ("zero_duration", "start_time: 0.0, duration: 0.0, velocity: 0.5"),
            ("loud", "start_time: 0.0, duration: 1.0, velocity: 5.0"),
        ];
        for (name, fields) in cases {
            fs::write(
                dir.path().join(format!("{name}.ron")),
                format!("(tracks: [(notes: [(pitch: 60, {fields})])], total_duration: 1.0)"),
            )
            .unwrap();
            match provider.resolve(&ItemId::new(name)) {
                Err(ProviderError::MalformedSource { item, .. }) => assert_eq!(item.as_str(), name),
                other => panic!("{name}: expected a malformed source, got {other:?}"),
            }
        }

        fs::write(dir.path().join("endless.ron"), "(tracks: [], total_duration: -3.0)").unwrap();
        assert!(matches!(
            provider.resolve(&ItemId::new("endless")),
            Err(ProviderError::MalformedSource { .. })
        ));
    }
}
