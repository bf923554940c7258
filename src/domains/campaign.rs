use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::archetypes::ArchetypeProfile;
use crate::domains::brand::BrandValues;
use crate::domains::icp::IcpProfile;
use crate::error::StudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Headline,
    Tagline,
    SocialPost,
    EmailSubject,
    EmailBody,
    LandingPage,
    AdCopy,
}

impl ContentKind {
    pub const ALL: [ContentKind; 7] = [
        ContentKind::Headline,
        ContentKind::Tagline,
        ContentKind::SocialPost,
        ContentKind::EmailSubject,
        ContentKind::EmailBody,
        ContentKind::LandingPage,
        ContentKind::AdCopy,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Headline => "headline",
            Self::Tagline => "tagline",
            Self::SocialPost => "social_post",
            Self::EmailSubject => "email_subject",
            Self::EmailBody => "email_body",
            Self::LandingPage => "landing_page",
            Self::AdCopy => "ad_copy",
        }
    }

    /// Length guidance appended to generation prompts.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Headline => "one headline, at most 12 words",
            Self::Tagline => "one tagline, at most 8 words",
            Self::SocialPost => "one social media post, at most 280 characters, up to 2 hashtags",
            Self::EmailSubject => "one email subject line, at most 60 characters",
            Self::EmailBody => "a short marketing email body of 120 to 180 words with one call to action",
            Self::LandingPage => "landing page copy: hero headline, subheading, three benefit bullets, call to action",
            Self::AdCopy => "one paid ad: headline up to 30 characters and description up to 90 characters",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ContentKind {
    type Err = StudioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized)
            .ok_or_else(|| StudioError::Validation(format!("unknown content kind: {value}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAsset {
    pub kind: ContentKind,
    pub text: String,
}

/// A generated campaign. `brand` is the frozen snapshot the copy was written
/// against; later questionnaire submissions never touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i32,
    pub user_id: String,
    pub name: String,
    pub archetype: ArchetypeProfile,
    pub brand: BrandValues,
    pub icp: Option<IcpProfile>,
    pub channels: Vec<String>,
    pub assets: Vec<ContentAsset>,
    pub created_at: i64,
}

/// Campaign contents before persistence assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignDraft {
    pub user_id: String,
    pub name: String,
    pub archetype: ArchetypeProfile,
    pub brand: BrandValues,
    pub icp: Option<IcpProfile>,
    pub channels: Vec<String>,
    pub assets: Vec<ContentAsset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_kind_parses_loose_spellings() {
        assert_eq!(
            "Social Post".parse::<ContentKind>().unwrap(),
            ContentKind::SocialPost
        );
        assert_eq!(
            "email-subject".parse::<ContentKind>().unwrap(),
            ContentKind::EmailSubject
        );
        assert!("billboard".parse::<ContentKind>().is_err());
    }

    #[test]
    fn content_kind_serde_matches_key() {
        for kind in ContentKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.key()));
        }
    }
}
