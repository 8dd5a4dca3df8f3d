use crate::domain::identity::Identity;
use crate::domain::user::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

/// Who a user wants to see, in the vocabulary of the profile form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenderPreference {
    Men,
    Women,
}

impl GenderPreference {
    /// The `gender` value candidates must carry to satisfy this preference.
    #[must_use]
    pub const fn counterpart_gender(self) -> Gender {
        match self {
            Self::Men => Gender::Male,
            Self::Women => Gender::Female,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum University {
    #[serde(rename = "bitjpr")]
    BitJaipur,
}

impl University {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BitJaipur => "bitjpr",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::BitJaipur => "Birla Institute of Technology, Jaipur",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub label: String,
    pub answer: String,
}

/// Everything the profile form edits. Relationship lists are never part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    pub name: String,
    pub age: Option<u8>,
    pub university: Option<University>,
    pub gender: Option<Gender>,
    pub interested_in: Option<GenderPreference>,
    pub bio: String,
    pub prompts: Vec<Prompt>,
    pub photos: Vec<String>,
}

impl ProfileDetails {
    /// A profile can enter the feed once every matching attribute and a photo is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && self.age.is_some()
            && self.university.is_some()
            && self.gender.is_some()
            && self.interested_in.is_some()
            && !self.photos.is_empty()
    }
}

/// Pending and settled relationships between a profile and its counterparts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    pub liked_by: Vec<UserId>,
    pub matches: Vec<UserId>,
    pub dislikes: Vec<UserId>,
    pub visited: Vec<UserId>,
}

impl Relationships {
    #[must_use]
    pub fn is_liked_by(&self, id: &UserId) -> bool {
        self.liked_by.contains(id)
    }

    #[must_use]
    pub fn has_matched(&self, id: &UserId) -> bool {
        self.matches.contains(id)
    }

    #[must_use]
    pub fn has_visited(&self, id: &UserId) -> bool {
        self.visited.contains(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub details: ProfileDetails,
    pub relationships: Relationships,
    pub profile_complete: bool,
}

/// What the feed engine needs to know about the acting user's taste.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedPreferences {
    pub university: University,
    pub gender: Gender,
}

impl Profile {
    /// The record written on first sign-in, before the profile form is filled in.
    #[must_use]
    pub fn skeleton(identity: &Identity) -> Self {
        Self {
            id: identity.user_id.clone(),
            email: identity.email.clone(),
            avatar_url: identity.avatar_url.clone(),
            details: ProfileDetails { name: identity.display_name.clone().unwrap_or_default(), ..ProfileDetails::default() },
            relationships: Relationships::default(),
            profile_complete: false,
        }
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        self.details.name.split_whitespace().next().unwrap_or_default()
    }

    #[must_use]
    pub fn primary_photo(&self) -> Option<&str> {
        self.details.photos.first().map(String::as_str)
    }

    /// `None` until both the university and the preference are known.
    #[must_use]
    pub fn feed_preferences(&self) -> Option<FeedPreferences> {
        Some(FeedPreferences {
            university: self.details.university?,
            gender: self.details.interested_in?.counterpart_gender(),
        })
    }
}
