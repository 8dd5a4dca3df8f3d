use crate::adapters::database::Snapshot;
use crate::domain::profile::{Gender, GenderPreference, Profile, ProfileDetails, Prompt, Relationships, University};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Stored shape of a `users` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileRecord {
    pub(crate) uid: String,
    pub(crate) name: String,
    pub(crate) email: Option<String>,
    pub(crate) profile_pic: Option<String>,
    pub(crate) age: Option<u8>,
    pub(crate) university: Option<University>,
    pub(crate) gender: Option<Gender>,
    pub(crate) interested_in: Option<GenderPreference>,
    pub(crate) bio: String,
    pub(crate) prompts: Vec<Prompt>,
    pub(crate) photos: Vec<String>,
    pub(crate) liked_by: Vec<UserId>,
    pub(crate) matches: Vec<UserId>,
    pub(crate) dislikes: Vec<UserId>,
    #[serde(rename = "visited_profiles")]
    pub(crate) visited_profiles: Vec<UserId>,
    pub(crate) profile_complete: bool,
}

impl From<&Profile> for ProfileRecord {
    fn from(profile: &Profile) -> Self {
        let d = &profile.details;
        let r = &profile.relationships;
        Self {
            uid: profile.id.as_str().to_string(),
            name: d.name.clone(),
            email: profile.email.clone(),
            profile_pic: profile.avatar_url.clone(),
            age: d.age,
            university: d.university,
            gender: d.gender,
            interested_in: d.interested_in,
            bio: d.bio.clone(),
            prompts: d.prompts.clone(),
            photos: d.photos.clone(),
            liked_by: r.liked_by.clone(),
            matches: r.matches.clone(),
            dislikes: r.dislikes.clone(),
            visited_profiles: r.visited.clone(),
            profile_complete: profile.profile_complete,
        }
    }
}

impl From<ProfileRecord> for Profile {
    fn from(record: ProfileRecord) -> Self {
        Self {
            id: UserId::new(record.uid),
            email: record.email,
            avatar_url: record.profile_pic,
            details: ProfileDetails {
                name: record.name,
                age: record.age,
                university: record.university,
                gender: record.gender,
                interested_in: record.interested_in,
                bio: record.bio,
                prompts: record.prompts,
                photos: record.photos,
            },
            relationships: Relationships {
                liked_by: record.liked_by,
                matches: record.matches,
                dislikes: record.dislikes,
                visited: record.visited_profiles,
            },
            profile_complete: record.profile_complete,
        }
    }
}

impl TryFrom<Snapshot> for Profile {
    type Error = AppError;

    fn try_from(snapshot: Snapshot) -> Result<Self> {
        let mut record: ProfileRecord = serde_json::from_value(snapshot.data)?;
        if record.uid.is_empty() {
            record.uid = snapshot.id;
        }
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_stored_field_names() {
        let snapshot = Snapshot {
            id: "u1".into(),
            data: json!({
                "uid": "u1",
                "name": "Asha",
                "university": "bitjpr",
                "gender": "Female",
                "interestedIn": "Men",
                "likedBy": ["u2"],
                "visited_profiles": ["u3"],
                "profileComplete": true
            }),
        };
        let profile = Profile::try_from(snapshot).unwrap();
        assert_eq!(profile.details.university, Some(University::BitJaipur));
        assert_eq!(profile.details.interested_in, Some(GenderPreference::Men));
        assert_eq!(profile.relationships.liked_by, vec![UserId::new("u2")]);
        assert_eq!(profile.relationships.visited, vec![UserId::new("u3")]);
        assert!(profile.relationships.matches.is_empty());
    }

    #[test]
    fn test_written_fields_use_stored_names() {
        let profile = Profile::try_from(Snapshot { id: "u1".into(), data: json!({}) }).unwrap();
        let value = serde_json::to_value(ProfileRecord::from(&profile)).unwrap();
        assert_eq!(value["uid"], json!("u1"));
        assert!(value.get("visited_profiles").is_some());
        assert!(value.get("profileComplete").is_some());
        assert!(value.get("likedBy").is_some());
    }
}
