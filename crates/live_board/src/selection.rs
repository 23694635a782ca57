//! Which stream to show, decided without any rendering layer.
//!
//! All records are ordered newest first. The newest record flagged live is
//! the *current* stream; every other record belongs to the archive. A
//! [`BoardState`] holds the fetched partition plus the viewer's navigation and
//! changes only through [`BoardState::apply`].

use domain::Live;
use domain::embed::{ThumbnailQuality, thumbnail_url};
use std::collections::BTreeSet;

/// Query appended to the player URL when showing the current stream
pub const AUTOPLAY_QUERY: &str = "autoplay=1&mute=1";

/// Message shown when loading the board fails for a non-auth reason
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch live streams. Please try again.";

/// Which half of the board the viewer is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Current,
    Previous,
}

/// An archived live with its preview image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub live: Live,
    pub thumbnail: String,
}

/// Fetched records split into the current stream and the archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub current: Option<Live>,
    pub archive: Vec<ArchiveEntry>,
}

/// Partition records into the newest live and everything else
pub fn derive_board(records: impl IntoIterator<Item = Live>, quality: ThumbnailQuality) -> Board {
    let mut records: Vec<Live> = records.into_iter().collect();
    domain::sort_newest_first(&mut records);

    let current = records
        .iter()
        .position(|live| live.is_live)
        .map(|index| records.remove(index));

    let archive = records
        .into_iter()
        .map(|live| ArchiveEntry {
            thumbnail: thumbnail_url(&live.url, quality),
            live,
        })
        .collect();

    Board { current, archive }
}

/// The single stream to play, if any
pub fn resolve_active<'a>(
    mode: Mode,
    selected: Option<&'a Live>,
    current: Option<&'a Live>,
) -> Option<&'a Live> {
    match (mode, selected) {
        (Mode::Current, None) => current,
        (Mode::Previous, Some(selected)) => Some(selected),
        _ => None,
    }
}

/// Case-insensitive substring match on the title; an empty query matches all
pub fn matches_query(title: &str, query: &str) -> bool {
    query.is_empty() || title.to_lowercase().contains(&query.to_lowercase())
}

pub fn filter_archive<'a>(archive: &'a [ArchiveEntry], query: &str) -> Vec<&'a ArchiveEntry> {
    archive
        .iter()
        .filter(|entry| matches_query(&entry.live.title, query))
        .collect()
}

/// Everything a front end needs to draw the board
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub current: Option<Live>,
    pub active: Option<Live>,
    pub archive: Vec<ArchiveEntry>,
    pub filtered: Vec<ArchiveEntry>,
}

/// Pure form of the whole derivation: records plus navigation in, view out
pub fn resolve(
    records: &[Live],
    mode: Mode,
    selected: Option<&Live>,
    query: &str,
    quality: ThumbnailQuality,
) -> Resolution {
    let board = derive_board(records.iter().cloned(), quality);
    let active = resolve_active(mode, selected, board.current.as_ref()).cloned();
    let filtered = filter_archive(&board.archive, query)
        .into_iter()
        .cloned()
        .collect();
    Resolution {
        current: board.current,
        active,
        archive: board.archive,
        filtered,
    }
}

/// URL to load in the player; the current stream starts muted and playing
pub fn player_src(live: &Live, mode: Mode) -> String {
    match mode {
        Mode::Previous => live.url.clone(),
        Mode::Current => {
            let separator = if live.url.contains('?') { '&' } else { '?' };
            format!("{}{separator}{AUTOPLAY_QUERY}", live.url)
        }
    }
}

/// Inputs to [`BoardState::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A full load with sequence number `seq` was sent
    LoadStarted { seq: u64 },
    /// A full load completed
    Loaded { seq: u64, records: Vec<Live> },
    /// A full load failed; `message` is user-facing
    LoadFailed { seq: u64, message: String },
    /// Result of polling the live records while `watched` was on screen
    LivenessChecked { watched: String, live: Vec<Live> },
    LivenessCheckFailed { message: String },
    ShowCurrent,
    ShowPrevious,
    /// Open an archive entry by id
    Select(String),
    /// Leave the opened archive entry
    Back,
    Search(String),
}

/// Follow-up work requested by a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Refetch,
}

/// Which operation produced the message on display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorOrigin {
    Load,
    Liveness,
}

/// Client-side board state
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    mode: Mode,
    selected: Option<Live>,
    board: Board,
    query: String,
    error: Option<(ErrorOrigin, String)>,
    quality: ThumbnailQuality,
    /// Loads started but not yet answered
    pending: BTreeSet<u64>,
    last_applied: u64,
}

impl BoardState {
    pub fn new(quality: ThumbnailQuality) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selected(&self) -> Option<&Live> {
        self.selected.as_ref()
    }

    pub fn current(&self) -> Option<&Live> {
        self.board.current.as_ref()
    }

    pub fn archive(&self) -> &[ArchiveEntry] {
        &self.board.archive
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|(_, message)| message.as_str())
    }

    pub fn active(&self) -> Option<&Live> {
        resolve_active(self.mode, self.selected.as_ref(), self.board.current.as_ref())
    }

    pub fn filtered(&self) -> Vec<&ArchiveEntry> {
        filter_archive(&self.board.archive, &self.query)
    }

    /// Id of the stream whose liveness should be polled
    pub fn watched_live_id(&self) -> Option<&str> {
        match (self.mode, &self.selected) {
            (Mode::Current, None) => self.board.current.as_ref().map(|live| live.id.as_str()),
            _ => None,
        }
    }

    pub fn apply(&mut self, action: Action) -> Effect {
        match action {
            Action::LoadStarted { seq } => {
                self.pending.insert(seq);
                self.error = None;
            }
            Action::Loaded { seq, records } => {
                self.pending.remove(&seq);
                if seq <= self.last_applied {
                    tracing::debug!(seq, last_applied = self.last_applied, "dropping stale load");
                    return Effect::None;
                }
                self.last_applied = seq;
                self.error = None;
                self.board = derive_board(records, self.quality);
                self.forget_missing_selection();
            }
            Action::LoadFailed { seq, message } => {
                self.pending.remove(&seq);
                if seq <= self.last_applied {
                    return Effect::None;
                }
                self.error = Some((ErrorOrigin::Load, message));
            }
            Action::LivenessChecked { watched, live } => {
                let Some(current) = &self.board.current else {
                    return Effect::None;
                };
                if current.id != watched {
                    return Effect::None;
                }
                if matches!(self.error, Some((ErrorOrigin::Liveness, _))) {
                    self.error = None;
                }

                if !live.iter().any(|candidate| candidate.id == watched) {
                    tracing::info!(id = %watched, "current live ended");
                    self.mode = Mode::Previous;
                    self.selected = None;
                    self.board.current = None;
                    return Effect::Refetch;
                }

                let newest = live.iter().max_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| b.id.cmp(&a.id))
                });
                if newest.is_some_and(|newest| newest.id != watched) {
                    tracing::info!(id = %watched, "newer live available");
                    return Effect::Refetch;
                }
            }
            Action::LivenessCheckFailed { message } => {
                self.error = Some((ErrorOrigin::Liveness, message));
            }
            Action::ShowCurrent => {
                self.mode = Mode::Current;
                self.selected = None;
                self.query.clear();
            }
            Action::ShowPrevious => {
                self.mode = Mode::Previous;
                self.selected = None;
                self.query.clear();
            }
            Action::Select(id) => {
                match self.board.archive.iter().find(|entry| entry.live.id == id) {
                    Some(entry) => {
                        self.mode = Mode::Previous;
                        self.selected = Some(entry.live.clone());
                    }
                    None => tracing::debug!(id = %id, "ignoring selection of unknown live"),
                }
            }
            Action::Back => {
                self.selected = None;
            }
            Action::Search(query) => {
                self.query = query;
            }
        }
        Effect::None
    }

    /// A selected archive entry that vanished from the server is closed
    fn forget_missing_selection(&mut self) {
        let still_there = self.selected.as_ref().is_none_or(|selected| {
            self.board
                .archive
                .iter()
                .any(|entry| entry.live.id == selected.id)
        });
        if !still_there {
            self.selected = None;
        }
    }

    /// Owned view of the state for front ends
    pub fn snapshot(&self) -> Snapshot {
        let active = self.active().cloned();
        Snapshot {
            mode: self.mode,
            player_src: active.as_ref().map(|live| player_src(live, self.mode)),
            active,
            current: self.board.current.clone(),
            filtered: self.filtered().into_iter().cloned().collect(),
            archive_len: self.board.archive.len(),
            query: self.query.clone(),
            loading: self.is_loading(),
            error: self.error().map(str::to_string),
        }
    }
}

/// Point-in-time copy of a [`BoardState`], ready to render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub mode: Mode,
    pub active: Option<Live>,
    pub player_src: Option<String>,
    pub current: Option<Live>,
    pub filtered: Vec<ArchiveEntry>,
    pub archive_len: usize,
    pub query: String,
    pub loading: bool,
    pub error: Option<String>,
}
