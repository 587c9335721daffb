use crate::events::RemoteTrack;

/// Remote video tracks currently published in the room.
///
/// Keyed by track id. Keeps first-insertion order so tiles render in a
/// stable position; an upsert of a known id replaces it in place.
#[derive(Debug, Clone, Default)]
pub struct RemoteTrackSet {
    tracks: Vec<RemoteTrack>,
}

impl RemoteTrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `track.track_id`.
    ///
    /// Returns `true` if the track id was not present before.
    pub fn upsert(&mut self, track: RemoteTrack) -> bool {
        match self.tracks.iter_mut().find(|t| t.track_id == track.track_id) {
            Some(existing) => {
                *existing = track;
                false
            }
            None => {
                self.tracks.push(track);
                true
            }
        }
    }

    /// Remove a track. Returns the removed entry, `None` if it was unknown.
    pub fn remove(&mut self, track_id: &str) -> Option<RemoteTrack> {
        let idx = self.tracks.iter().position(|t| t.track_id == track_id)?;
        Some(self.tracks.remove(idx))
    }

    pub fn get(&self, track_id: &str) -> Option<&RemoteTrack> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    pub fn tracks(&self) -> &[RemoteTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}
