use serde::Serialize;

/// A single downloadable artifact attached to a release.
///
/// Both fields are guaranteed non-empty; [Asset::new] is the only way to
/// build one.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Asset {
    name: String,
    url: String,
}

impl Asset {
    /// Builds an asset only when both the label and the location are present.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let url = url.into();
        if name.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self { name, url })
    }

    /// Label shown to the user.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// One entry of a project's release list.
///
/// Every text field defaults to an empty string when the API omits it.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub display_name: String,
    /// Opaque timestamp as sent by the server.
    pub created_at: String,
    pub commit_id: String,
    pub description: String,
    pub assets: Vec<Asset>,
}

impl Release {
    pub fn has_assets(&self) -> bool {
        !self.assets.is_empty()
    }

    /// Looks an asset up by its position in the list or by its exact name.
    pub fn find_asset(&self, query: &str) -> Option<&Asset> {
        if let Ok(index) = query.parse::<usize>()
            && let Some(asset) = self.assets.get(index)
        {
            return Some(asset);
        }
        self.assets.iter().find(|asset| asset.name == query)
    }
}

/// One-release-per-page browsing over a fetched release list, wrapping around
/// at both ends.
#[derive(Debug)]
pub struct ReleasePager<'a> {
    releases: &'a [Release],
    current: usize,
}

impl<'a> ReleasePager<'a> {
    pub fn new(releases: &'a [Release]) -> Self {
        Self {
            releases,
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Zero-based position of the current page.
    pub fn position(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&'a Release> {
        self.releases.get(self.current)
    }

    pub fn next_page(&mut self) -> Option<&'a Release> {
        if self.releases.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.releases.len();
        self.current()
    }

    pub fn previous_page(&mut self) -> Option<&'a Release> {
        if self.releases.is_empty() {
            return None;
        }
        self.current = (self.current + self.releases.len() - 1) % self.releases.len();
        self.current()
    }

    /// Moves to the release matching `query`, either a tag or a zero-based index.
    pub fn select(&mut self, query: &str) -> Option<&'a Release> {
        let index = self
            .releases
            .iter()
            .position(|release| release.tag == query)
            .or_else(|| {
                query
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index < self.releases.len())
            })?;
        self.current = index;
        self.current()
    }
}
