//! Channel registry
//!
//! In-memory state for the fixed channel catalog: subscription flags,
//! per-channel receiving counts, and the last clip heard on each channel.
//! The registry is owned by the session dispatch loop and never shared,
//! so none of this needs locking.

use std::collections::HashSet;
use std::sync::Arc;

/// State for a single channel in the catalog
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel name (unique within the catalog)
    pub name: String,
    /// Whether the user is subscribed
    pub subscribed: bool,
    /// Number of clips currently playing from this channel
    receiving: u32,
    /// Most recent clip heard on this channel, kept for replay
    last_clip: Option<Arc<Vec<u8>>>,
}

impl Channel {
    fn new(name: String, subscribed: bool) -> Self {
        Self {
            name,
            subscribed,
            receiving: 0,
            last_clip: None,
        }
    }

    /// Whether recording into this channel is allowed
    ///
    /// Derived from subscription so the two can never disagree.
    pub fn recording_allowed(&self) -> bool {
        self.subscribed
    }

    /// Whether at least one clip from this channel is currently playing
    pub fn is_receiving(&self) -> bool {
        self.receiving > 0
    }

    /// Whether a clip is cached for replay
    pub fn has_clip(&self) -> bool {
        self.last_clip.is_some()
    }
}

/// The catalog of channels, in the order supplied at startup
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    /// Build the registry from the catalog and the persisted subscribed set
    ///
    /// Saved names not present in the catalog are ignored; they can appear
    /// when the catalog shrinks between runs.
    pub fn new(catalog: &[String], saved: &HashSet<String>) -> Self {
        let channels = catalog
            .iter()
            .map(|name| Channel::new(name.clone(), saved.contains(name)))
            .collect();
        Self { channels }
    }

    /// Get a channel by name
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.name == name)
    }

    /// Whether the catalog contains this channel
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether recording into this channel is allowed right now
    pub fn recording_allowed(&self, name: &str) -> bool {
        self.get(name).is_some_and(Channel::recording_allowed)
    }

    /// Set a channel's subscription state
    ///
    /// Returns true if the state changed. Unknown names are no-ops.
    pub fn set_subscribed(&mut self, name: &str, subscribed: bool) -> bool {
        if let Some(channel) = self.get_mut(name)
            && channel.subscribed != subscribed
        {
            channel.subscribed = subscribed;
            return true;
        }
        false
    }

    /// Names of all subscribed channels, in catalog order
    pub fn subscribed_names(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|c| c.subscribed)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Record that a clip from this channel started playing
    ///
    /// Returns true if the channel just became audible (count was zero).
    pub fn begin_receiving(&mut self, name: &str) -> bool {
        if let Some(channel) = self.get_mut(name) {
            channel.receiving += 1;
            return channel.receiving == 1;
        }
        false
    }

    /// Record that a clip from this channel finished playing
    ///
    /// Returns true if the channel just became quiet (count hit zero).
    /// A completion with no matching start is ignored.
    pub fn end_receiving(&mut self, name: &str) -> bool {
        if let Some(channel) = self.get_mut(name)
            && channel.receiving > 0
        {
            channel.receiving -= 1;
            return channel.receiving == 0;
        }
        false
    }

    /// Whether at least one clip from this channel is currently playing
    pub fn is_receiving(&self, name: &str) -> bool {
        self.get(name).is_some_and(Channel::is_receiving)
    }

    /// Cache the most recent clip heard on a channel
    pub fn cache_clip(&mut self, name: &str, clip: Arc<Vec<u8>>) {
        if let Some(channel) = self.get_mut(name) {
            channel.last_clip = Some(clip);
        }
    }

    /// Get the cached clip for a channel, if any
    pub fn clip(&self, name: &str) -> Option<Arc<Vec<u8>>> {
        self.get(name).and_then(|c| c.last_clip.clone())
    }

    /// Iterate over all channels in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    /// Number of channels in the catalog
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<String> {
        ["General", "Project Alpha", "Emergency", "Music Room"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn registry_with_saved(saved: &[&str]) -> ChannelRegistry {
        let saved: HashSet<String> = saved.iter().map(|s| s.to_string()).collect();
        ChannelRegistry::new(&catalog(), &saved)
    }

    #[test]
    fn test_new_applies_saved_subscriptions() {
        let registry = registry_with_saved(&["General", "Emergency"]);

        assert!(registry.get("General").unwrap().subscribed);
        assert!(registry.get("Emergency").unwrap().subscribed);
        assert!(!registry.get("Project Alpha").unwrap().subscribed);
        assert!(!registry.get("Music Room").unwrap().subscribed);
    }

    #[test]
    fn test_new_ignores_saved_names_outside_catalog() {
        let registry = registry_with_saved(&["General", "Retired Channel"]);

        assert_eq!(registry.len(), 4);
        assert!(!registry.contains("Retired Channel"));
        assert_eq!(registry.subscribed_names(), vec!["General"]);
    }

    #[test]
    fn test_subscribed_names_in_catalog_order() {
        let registry = registry_with_saved(&["Music Room", "General"]);
        assert_eq!(registry.subscribed_names(), vec!["General", "Music Room"]);
    }

    #[test]
    fn test_set_subscribed_reports_changes() {
        let mut registry = registry_with_saved(&[]);

        assert!(registry.set_subscribed("General", true));
        assert!(!registry.set_subscribed("General", true));
        assert!(registry.set_subscribed("General", false));
        assert!(!registry.set_subscribed("General", false));
    }

    #[test]
    fn test_set_subscribed_unknown_channel_is_noop() {
        let mut registry = registry_with_saved(&[]);
        assert!(!registry.set_subscribed("Nope", true));
        assert!(registry.subscribed_names().is_empty());
    }

    #[test]
    fn test_recording_allowed_tracks_subscription() {
        let mut registry = registry_with_saved(&[]);

        assert!(!registry.recording_allowed("General"));
        registry.set_subscribed("General", true);
        assert!(registry.recording_allowed("General"));
        registry.set_subscribed("General", false);
        assert!(!registry.recording_allowed("General"));
    }

    #[test]
    fn test_recording_allowed_unknown_channel() {
        let registry = registry_with_saved(&[]);
        assert!(!registry.recording_allowed("Nope"));
    }

    #[test]
    fn test_receiving_refcount_overlap() {
        let mut registry = registry_with_saved(&["General"]);

        // First clip starts: channel becomes audible
        assert!(registry.begin_receiving("General"));
        // Second clip overlaps: no transition
        assert!(!registry.begin_receiving("General"));
        assert!(registry.is_receiving("General"));

        // First clip ends: still audible
        assert!(!registry.end_receiving("General"));
        assert!(registry.is_receiving("General"));

        // Second clip ends: quiet again
        assert!(registry.end_receiving("General"));
        assert!(!registry.is_receiving("General"));
    }

    #[test]
    fn test_end_receiving_without_begin_is_noop() {
        let mut registry = registry_with_saved(&["General"]);
        assert!(!registry.end_receiving("General"));
        assert!(!registry.is_receiving("General"));
    }

    #[test]
    fn test_receiving_is_per_channel() {
        let mut registry = registry_with_saved(&["General", "Emergency"]);

        registry.begin_receiving("General");
        assert!(registry.is_receiving("General"));
        assert!(!registry.is_receiving("Emergency"));
    }

    #[test]
    fn test_clip_cache_overwrites() {
        let mut registry = registry_with_saved(&["General"]);

        assert!(registry.clip("General").is_none());

        registry.cache_clip("General", Arc::new(vec![1, 2, 3]));
        assert_eq!(*registry.clip("General").unwrap(), vec![1, 2, 3]);

        registry.cache_clip("General", Arc::new(vec![4, 5]));
        assert_eq!(*registry.clip("General").unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_clip_cache_survives_unsubscribe() {
        let mut registry = registry_with_saved(&["General"]);

        registry.cache_clip("General", Arc::new(vec![9]));
        registry.set_subscribed("General", false);

        assert!(registry.clip("General").is_some());
    }

    #[test]
    fn test_cache_clip_unknown_channel_is_noop() {
        let mut registry = registry_with_saved(&[]);
        registry.cache_clip("Nope", Arc::new(vec![1]));
        assert!(registry.clip("Nope").is_none());
    }
}
