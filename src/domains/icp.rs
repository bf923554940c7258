use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::text::split_list;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IcpProfile {
    pub industry: String,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub age_range: Option<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub buying_triggers: Vec<String>,
}

impl IcpProfile {
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Industry: {}", self.industry)];
        for (label, value) in [
            ("Company size", &self.company_size),
            ("Role", &self.role),
            ("Age range", &self.age_range),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                lines.push(format!("{label}: {value}"));
            }
        }
        for (label, items) in [
            ("Pain points", &self.pain_points),
            ("Goals", &self.goals),
            ("Objections", &self.objections),
            ("Channels", &self.channels),
            ("Buying triggers", &self.buying_triggers),
        ] {
            if !items.is_empty() {
                lines.push(format!("{label}: {}", items.join("; ")));
            }
        }
        lines.join("\n")
    }

    /// Free text from every list field, used for keyword extraction.
    pub fn corpus(&self) -> String {
        [
            &self.pain_points,
            &self.goals,
            &self.objections,
            &self.buying_triggers,
        ]
        .iter()
        .flat_map(|items| items.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Raw ICP form answers. List fields take comma or newline separated text.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IcpQuestionnaire {
    pub industry: String,
    pub company_size: Option<String>,
    pub role: Option<String>,
    pub age_range: Option<String>,
    pub pain_points: Option<String>,
    pub goals: Option<String>,
    pub objections: Option<String>,
    pub channels: Option<String>,
    pub buying_triggers: Option<String>,
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn list(value: Option<String>) -> Vec<String> {
    value.as_deref().map(split_list).unwrap_or_default()
}

impl IcpQuestionnaire {
    pub fn into_profile(self) -> Result<IcpProfile> {
        let industry = self.industry.trim().to_string();
        if industry.is_empty() {
            return Err(StudioError::Validation("industry is required".to_string()));
        }
        let pain_points = list(self.pain_points);
        if pain_points.is_empty() {
            return Err(StudioError::Validation(
                "at least one pain point is required".to_string(),
            ));
        }
        Ok(IcpProfile {
            industry,
            company_size: optional(self.company_size),
            role: optional(self.role),
            age_range: optional(self.age_range),
            pain_points,
            goals: list(self.goals),
            objections: list(self.objections),
            channels: list(self.channels)
                .into_iter()
                .map(|channel| channel.to_lowercase())
                .collect(),
            buying_triggers: list(self.buying_triggers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_profile_from_answers() {
        let profile = IcpQuestionnaire {
            industry: " Fintech ".to_string(),
            role: Some("  ".to_string()),
            pain_points: Some("manual reconciliation\nlate invoices".to_string()),
            channels: Some("LinkedIn, Email".to_string()),
            ..Default::default()
        }
        .into_profile()
        .unwrap();

        assert_eq!(profile.industry, "Fintech");
        assert_eq!(profile.role, None);
        assert_eq!(profile.pain_points.len(), 2);
        assert_eq!(profile.channels, vec!["linkedin", "email"]);
        let summary = profile.summary();
        assert!(summary.contains("Pain points: manual reconciliation; late invoices"));
        assert!(!summary.contains("Role"));
    }

    #[test]
    fn requires_industry_and_pain_point() {
        let err = IcpQuestionnaire::default().into_profile().unwrap_err();
        assert!(err.to_string().contains("industry"));

        let err = IcpQuestionnaire {
            industry: "Retail".to_string(),
            pain_points: Some(" , ".to_string()),
            ..Default::default()
        }
        .into_profile()
        .unwrap_err();
        assert!(err.to_string().contains("pain point"));
    }
}
