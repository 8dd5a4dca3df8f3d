//! Pure candidate-selection logic of the swipe feed.
//!
//! Everything here is synchronous and store-agnostic; the feed service feeds it
//! fresh reads and persists the decisions it produces.

use crate::config::FeedConfig;
use crate::domain::matching::MatchId;
use crate::domain::profile::{Profile, Relationships};
use crate::domain::user::UserId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Like,
    Dislike,
}

impl SwipeDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwipeOutcome {
    Liked,
    Disliked,
    /// Both sides liked each other; the conversation now exists.
    Matched { conversation_id: MatchId },
    /// The candidate had liked the acting user, who passed on them.
    MissedMatch,
}

impl SwipeOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Liked => "liked",
            Self::Disliked => "disliked",
            Self::Matched { .. } => "matched",
            Self::MissedMatch => "missed_match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSettings {
    pub page_size: usize,
    pub visible_window: usize,
    pub rotation_threshold: usize,
    pub quota_ratio: f64,
    /// Cached sessions idle this long may be evicted.
    pub session_idle: Duration,
}

impl From<&FeedConfig> for FeedSettings {
    fn from(config: &FeedConfig) -> Self {
        Self {
            page_size: config.page_size,
            visible_window: config.visible_window.max(1),
            rotation_threshold: config.rotation_threshold,
            quota_ratio: config.quota_ratio,
            session_idle: Duration::from_secs(config.session_idle_secs),
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

/// Number of likes allowed per period for a population of `total_eligible`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn like_quota(total_eligible: u64, ratio: f64) -> u32 {
    let raw = (total_eligible as f64 * ratio.max(0.0)).ceil();
    if raw >= f64::from(u32::MAX) { u32::MAX } else { raw as u32 }
}

/// Whether every eligible profile has already been shown.
#[must_use]
pub fn catalog_exhausted(visited: usize, total_eligible: u64) -> bool {
    visited as u64 >= total_eligible
}

/// Orders a fetched page of eligible profiles for presentation.
///
/// Matched profiles and the acting user are dropped. Profiles that were
/// already shown come back only when they have since liked the acting user,
/// and those come first. Unvisited profiles follow in fetch order.
#[must_use]
pub fn rank_candidates(fetched: Vec<Profile>, me: &UserId, relationships: &Relationships) -> Vec<Profile> {
    let (priority, regular): (Vec<_>, Vec<_>) = fetched
        .into_iter()
        .filter(|p| &p.id != me && !relationships.has_matched(&p.id))
        .filter(|p| {
            let visited = relationships.has_visited(&p.id);
            !visited || relationships.is_liked_by(&p.id)
        })
        .partition(|p| relationships.has_visited(&p.id));

    priority.into_iter().chain(regular).collect()
}

/// What happened to the queue after a candidate left the visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A backlog entry moved into the visible window.
    Promoted,
    /// Nothing left to promote and the window is running dry.
    NeedsRotation,
    Idle,
}

/// Visible window plus backlog of ranked candidates.
#[derive(Debug, Clone, Default)]
pub struct FeedQueue {
    visible: Vec<Profile>,
    backlog: VecDeque<Profile>,
}

impl FeedQueue {
    #[must_use]
    pub fn from_ranked(mut ranked: Vec<Profile>, window: usize) -> Self {
        let backlog = if ranked.len() > window { ranked.split_off(window) } else { Vec::new() };
        Self { visible: ranked, backlog: backlog.into() }
    }

    #[must_use]
    pub fn visible(&self) -> &[Profile] {
        &self.visible
    }

    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.backlog.is_empty()
    }

    #[must_use]
    pub fn find_visible(&self, id: &UserId) -> Option<&Profile> {
        self.visible.iter().find(|p| &p.id == id)
    }

    /// Drops `id` from the visible window, then refills or asks for rotation.
    pub fn take(&mut self, id: &UserId, rotation_threshold: usize) -> Advance {
        self.visible.retain(|p| &p.id != id);

        if let Some(next) = self.backlog.pop_front() {
            self.visible.push(next);
            Advance::Promoted
        } else if self.visible.len() < rotation_threshold {
            Advance::NeedsRotation
        } else {
            Advance::Idle
        }
    }
}

/// Likes issued by one user during the current UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeCounter {
    day: Date,
    used: u32,
}

impl LikeCounter {
    #[must_use]
    pub const fn new(today: Date) -> Self {
        Self { day: today, used: 0 }
    }

    /// Likes used so far, resetting when the period has rolled over.
    pub fn used(&mut self, today: Date) -> u32 {
        if today != self.day {
            self.day = today;
            self.used = 0;
        }
        self.used
    }

    pub fn record(&mut self, today: Date) {
        let used = self.used(today);
        self.used = used.saturating_add(1);
    }
}
