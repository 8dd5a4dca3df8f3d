use crate::domain::profile::{Gender, GenderPreference, Profile, ProfileDetails, Prompt, University};
use serde::{Deserialize, Serialize};

/// The signed-in user's own profile.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub uid: String,
    pub name: String,
    pub email: Option<String>,
    pub profile_pic: Option<String>,
    pub age: Option<u8>,
    pub university: Option<University>,
    pub gender: Option<Gender>,
    pub interested_in: Option<GenderPreference>,
    pub bio: String,
    pub prompts: Vec<Prompt>,
    pub photos: Vec<String>,
    pub like_count: usize,
    pub match_count: usize,
    pub profile_complete: bool,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        let d = profile.details;
        Self {
            uid: profile.id.to_string(),
            name: d.name,
            email: profile.email,
            profile_pic: profile.avatar_url,
            age: d.age,
            university: d.university,
            gender: d.gender,
            interested_in: d.interested_in,
            bio: d.bio,
            prompts: d.prompts,
            photos: d.photos,
            like_count: profile.relationships.liked_by.len(),
            match_count: profile.relationships.matches.len(),
            profile_complete: profile.profile_complete,
        }
    }
}

/// Body of `PUT /v1/profile`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileForm {
    pub name: String,
    pub age: Option<u8>,
    pub university: Option<University>,
    pub gender: Option<Gender>,
    pub interested_in: Option<GenderPreference>,
    pub bio: String,
    pub prompts: Vec<Prompt>,
    pub photos: Vec<String>,
}

impl From<ProfileForm> for ProfileDetails {
    fn from(form: ProfileForm) -> Self {
        Self {
            name: form.name,
            age: form.age,
            university: form.university,
            gender: form.gender,
            interested_in: form.interested_in,
            bio: form.bio,
            prompts: form.prompts,
            photos: form.photos,
        }
    }
}

/// Full card shown in the swipe feed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCard {
    pub uid: String,
    pub name: String,
    pub age: Option<u8>,
    pub university: Option<String>,
    pub bio: String,
    pub prompts: Vec<Prompt>,
    pub photos: Vec<String>,
}

impl From<&Profile> for CandidateCard {
    fn from(profile: &Profile) -> Self {
        let d = &profile.details;
        Self {
            uid: profile.id.to_string(),
            name: d.name.clone(),
            age: d.age,
            university: d.university.map(|u| u.display_name().to_string()),
            bio: d.bio.clone(),
            prompts: d.prompts.clone(),
            photos: d.photos.clone(),
        }
    }
}

/// Reduced card for people the user has not matched with.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePreview {
    pub uid: String,
    pub first_name: String,
    pub age: Option<u8>,
    pub photo: Option<String>,
}

impl From<&Profile> for ProfilePreview {
    fn from(profile: &Profile) -> Self {
        Self {
            uid: profile.id.to_string(),
            first_name: profile.first_name().to_string(),
            age: profile.details.age,
            photo: profile.primary_photo().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhotoUploadQuery {
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhotoUploadResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikesResponse {
    pub profiles: Vec<ProfilePreview>,
    pub like_count: usize,
    pub match_count: usize,
}
