use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::archetypes::normalize_keywords;
use crate::error::{Result, StudioError};
use crate::text::{keyword_set, split_list};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandValues {
    pub mission: String,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub tone: BTreeMap<String, f64>,
}

impl BrandValues {
    pub fn validate(&self) -> Result<()> {
        if self.mission.trim().is_empty() {
            return Err(StudioError::Validation("mission is required".to_string()));
        }
        for (key, weight) in &self.tone {
            if !(0.0..=1.0).contains(weight) {
                return Err(StudioError::Validation(format!(
                    "tone weight for `{key}` must be in [0, 1], got {weight}"
                )));
            }
        }
        Ok(())
    }

    /// Short plain-text summary used in generation prompts.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Mission: {}", self.mission.trim())];
        if !self.vision.trim().is_empty() {
            lines.push(format!("Vision: {}", self.vision.trim()));
        }
        if !self.values.is_empty() {
            lines.push(format!("Values: {}", self.values.join(", ")));
        }
        if !self.keywords.is_empty() {
            let keywords: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
            lines.push(format!("Keywords: {}", keywords.join(", ")));
        }
        let dominant: Vec<String> = self
            .dominant_tones(3)
            .into_iter()
            .map(|(key, weight)| format!("{key} ({weight:.2})"))
            .collect();
        if !dominant.is_empty() {
            lines.push(format!("Tone: {}", dominant.join(", ")));
        }
        lines.join("\n")
    }

    pub fn dominant_tones(&self, limit: usize) -> Vec<(String, f64)> {
        let mut tones: Vec<(String, f64)> = self
            .tone
            .iter()
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(key, weight)| (key.clone(), *weight))
            .collect();
        tones.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tones.truncate(limit);
        tones
    }
}

/// Raw answers from the brand questionnaire form.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BrandQuestionnaire {
    pub mission: String,
    #[serde(default)]
    pub vision: Option<String>,
    #[serde(default)]
    pub values: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    /// Slider positions, either 0..=1 or 0..=100.
    #[serde(default)]
    pub tone: BTreeMap<String, f64>,
}

impl BrandQuestionnaire {
    pub fn into_brand_values(self) -> Result<BrandValues> {
        let vision = self.vision.unwrap_or_default().trim().to_string();
        let values = self.values.as_deref().map(split_list).unwrap_or_default();

        let mut keywords = normalize_keywords(
            self.keywords
                .as_deref()
                .map(split_list)
                .unwrap_or_default(),
        );
        if keywords.is_empty() {
            let corpus = format!("{} {} {}", self.mission, vision, values.join(" "));
            keywords = keyword_set(&corpus);
        }

        let mut tone = BTreeMap::new();
        for (key, raw) in self.tone {
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            tone.insert(key.clone(), normalize_slider(&key, raw)?);
        }

        let brand = BrandValues {
            mission: self.mission.trim().to_string(),
            vision,
            values,
            keywords,
            tone,
        };
        brand.validate()?;
        Ok(brand)
    }
}

fn normalize_slider(key: &str, raw: f64) -> Result<f64> {
    if !raw.is_finite() || raw < 0.0 || raw > 100.0 {
        return Err(StudioError::Validation(format!(
            "tone slider `{key}` must be between 0 and 100, got {raw}"
        )));
    }
    if raw > 1.0 {
        Ok(raw / 100.0)
    } else {
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn questionnaire_extracts_keywords_when_none_given() {
        let brand = BrandQuestionnaire {
            mission: "Give every family safe, simple banking".to_string(),
            values: Some("Trust, care".to_string()),
            ..Default::default()
        }
        .into_brand_values()
        .unwrap();

        assert!(brand.keywords.contains("safe"));
        assert!(brand.keywords.contains("simple"));
        assert!(brand.keywords.contains("care"));
        assert_eq!(brand.values, vec!["Trust", "care"]);
    }

    #[test]
    fn explicit_keywords_are_normalized() {
        let brand = BrandQuestionnaire {
            mission: "Go".to_string(),
            keywords: Some(" Freedom, CONTROL\nfreedom ".to_string()),
            ..Default::default()
        }
        .into_brand_values()
        .unwrap();
        let keywords: Vec<&str> = brand.keywords.iter().map(String::as_str).collect();
        assert_eq!(keywords, vec!["control", "freedom"]);
    }

    #[test]
    fn sliders_accept_percent_and_fraction() {
        let mut tone = BTreeMap::new();
        tone.insert("Warm".to_string(), 80.0);
        tone.insert("direct".to_string(), 0.25);
        let brand = BrandQuestionnaire {
            mission: "Go".to_string(),
            tone,
            ..Default::default()
        }
        .into_brand_values()
        .unwrap();
        assert_eq!(brand.tone.get("warm"), Some(&0.8));
        assert_eq!(brand.tone.get("direct"), Some(&0.25));
        assert_eq!(brand.dominant_tones(1), vec![("warm".to_string(), 0.8)]);
    }

    #[test]
    fn rejects_missing_mission_and_bad_slider() {
        let err = BrandQuestionnaire::default().into_brand_values().unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));

        let mut tone = BTreeMap::new();
        tone.insert("urgent".to_string(), 140.0);
        let err = BrandQuestionnaire {
            mission: "Go".to_string(),
            tone,
            ..Default::default()
        }
        .into_brand_values()
        .unwrap_err();
        assert!(err.to_string().contains("urgent"));
    }

    #[test]
    fn summary_lists_populated_sections_only() {
        let brand = BrandValues {
            mission: "Make tax simple".to_string(),
            keywords: normalize_keywords(["simple"]),
            ..BrandValues::default()
        };
        let summary = brand.summary();
        assert!(summary.contains("Mission: Make tax simple"));
        assert!(summary.contains("Keywords: simple"));
        assert!(!summary.contains("Vision"));
        assert!(!summary.contains("Tone"));
    }
}
