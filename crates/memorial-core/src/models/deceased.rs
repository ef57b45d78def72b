//! Deceased profile records.
//!
//! Names follow Vietnamese convention: the primary name is the Vietnamese
//! one, with optional Western name, common name, generation name (tên thế
//! hệ) and ancestral title. Dates may be recorded on both the solar and
//! the lunar calendar; lunar dates are free text as entered by the family.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default page size for profile listings
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size the server accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Who may see a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Public,
    #[default]
    Family,
    Private,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::Family => "family",
            PrivacyLevel::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "public" | "công khai" => Some(PrivacyLevel::Public),
            "family" | "gia đình" => Some(PrivacyLevel::Family),
            "private" | "riêng tư" => Some(PrivacyLevel::Private),
            _ => None,
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gender values the server accepts. Vietnamese spellings map onto the same variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "nam")]
    Male,
    #[serde(alias = "nữ")]
    Female,
    #[serde(alias = "khác")]
    Other,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "nam" => Some(Gender::Male),
            "female" | "nữ" => Some(Gender::Female),
            "other" | "khác" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeceasedProfile {
    pub id: String,
    #[serde(default)]
    pub family_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,

    pub vietnamese_name: String,
    #[serde(default)]
    pub english_name: Option<String>,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub generation_name: Option<String>,
    #[serde(default)]
    pub ancestral_title: Option<String>,

    pub gender: Gender,

    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub death_date: Option<String>,
    #[serde(default)]
    pub birth_date_lunar: Option<String>,
    #[serde(default)]
    pub death_date_lunar: Option<String>,

    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub death_place: Option<String>,
    #[serde(default)]
    pub resting_place: Option<String>,

    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,

    #[serde(default)]
    pub special_dates: Option<serde_json::Value>,
    #[serde(default)]
    pub cultural_info: Option<serde_json::Value>,

    #[serde(default)]
    pub privacy_level: PrivacyLevel,

    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub cover_photo: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl DeceasedProfile {
    /// Name to show in listings: ancestral title first when one is recorded.
    pub fn display_name(&self) -> String {
        match self.ancestral_title.as_deref() {
            Some(title) if !title.is_empty() => format!("{} {}", title, self.vietnamese_name),
            _ => self.vietnamese_name.clone(),
        }
    }

    /// "birth – death" using solar dates, falling back to the lunar entry.
    pub fn life_span(&self) -> Option<String> {
        let birth = self.birth_date.as_deref().or(self.birth_date_lunar.as_deref());
        let death = self.death_date.as_deref().or(self.death_date_lunar.as_deref());
        match (birth, death) {
            (None, None) => None,
            (b, d) => Some(format!("{} – {}", b.unwrap_or("?"), d.unwrap_or("?"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeceasedProfileCreate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    pub vietnamese_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestral_title: Option<String>,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date_lunar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date_lunar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resting_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_dates: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural_info: Option<serde_json::Value>,
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
}

impl DeceasedProfileCreate {
    pub fn new(vietnamese_name: &str, gender: Gender) -> Self {
        Self {
            family_id: None,
            vietnamese_name: vietnamese_name.to_string(),
            english_name: None,
            common_name: None,
            generation_name: None,
            ancestral_title: None,
            gender,
            birth_date: None,
            death_date: None,
            birth_date_lunar: None,
            death_date_lunar: None,
            birth_place: None,
            death_place: None,
            resting_place: None,
            occupation: None,
            education: None,
            biography: None,
            special_dates: None,
            cultural_info: None,
            privacy_level: PrivacyLevel::default(),
        }
    }
}

/// Partial profile update. Unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeceasedProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vietnamese_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestral_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date_lunar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date_lunar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resting_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_dates: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural_info: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_level: Option<PrivacyLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeceasedProfileList {
    #[serde(default)]
    pub profiles: Vec<DeceasedProfile>,
    pub total: u64,
    pub skip: u32,
    pub limit: u32,
}

impl DeceasedProfileList {
    pub fn has_more(&self) -> bool {
        (self.skip as u64 + self.profiles.len() as u64) < self.total
    }
}

/// Listing filters for `GET /deceased/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub family_id: Option<String>,
    pub search: Option<String>,
}

impl ProfileQuery {
    /// Query pairs in a stable order, omitting unset filters.
    /// The limit is clamped to what the server accepts.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(skip) = self.skip {
            pairs.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string()));
        }
        if let Some(ref family_id) = self.family_id {
            if !family_id.is_empty() {
                pairs.push(("family_id", family_id.clone()));
            }
        }
        if let Some(ref search) = self.search {
            if !search.is_empty() {
                pairs.push(("search", search.clone()));
            }
        }
        pairs
    }
}
