//! Archetype-tailored copy generation on top of an [`LlmProvider`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::archetypes::ArchetypeProfile;
use crate::domains::brand::BrandValues;
use crate::domains::campaign::{CampaignDraft, ContentAsset, ContentKind};
use crate::domains::icp::IcpProfile;
use crate::emotion;
use crate::error::{Result, StudioError};
use crate::interfaces::providers::{GenerationOptions, LlmProvider};

const COPY_TEMPERATURE: f32 = 0.8;
const CAMPAIGN_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub archetype: ArchetypeProfile,
    pub kind: ContentKind,
    pub brand: BrandValues,
    #[serde(default)]
    pub icp: Option<IcpProfile>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedContent {
    pub archetype: ArchetypeProfile,
    pub kind: ContentKind,
    pub text: String,
    /// Share of the archetype's trigger emotions the copy hits.
    pub resonance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRequest {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub archetype: ArchetypeProfile,
    pub brand: BrandValues,
    #[serde(default)]
    pub icp: Option<IcpProfile>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<ContentKind>,
}

#[derive(Deserialize)]
struct RawCampaign {
    name: Option<String>,
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Deserialize)]
struct RawAsset {
    kind: String,
    text: String,
}

pub struct ContentGenerator {
    provider: Arc<dyn LlmProvider>,
}

impl ContentGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn system_prompt(
        archetype: ArchetypeProfile,
        brand: &BrandValues,
        icp: Option<&IcpProfile>,
    ) -> String {
        let emotions: Vec<String> = emotion::triggers_for(archetype)
            .iter()
            .map(|trigger| format!("{} ({:.1})", trigger.emotion.key(), trigger.intensity))
            .collect();
        let tone: Vec<String> = archetype
            .tone_weights()
            .iter()
            .filter(|(_, weight)| *weight >= 0.6)
            .map(|(key, _)| key.to_string())
            .collect();

        let mut prompt = format!(
            "You are a senior brand copywriter.\n\
             Audience archetype: {name}. {description}\n\
             Messaging angle: {angle}\n\
             Tone: {tone}.\n\
             Emotional triggers to evoke: {emotions}.\n\
             Useful phrases: {phrases}.\n\n\
             # Brand\n{brand}\n",
            name = archetype.display_name(),
            description = archetype.description(),
            angle = archetype.messaging_angle(),
            tone = tone.join(", "),
            emotions = emotions.join(", "),
            phrases = emotion::power_words(archetype).join(", "),
            brand = brand.summary(),
        );
        if let Some(icp) = icp {
            prompt.push_str("\n# Ideal customer\n");
            prompt.push_str(&icp.summary());
            prompt.push('\n');
        }
        prompt.push_str(
            "\nStay truthful to the brand. Do not invent statistics, awards or customer names.",
        );
        prompt
    }

    pub async fn generate(&self, request: &ContentRequest) -> Result<GeneratedContent> {
        request.brand.validate()?;
        let system = Self::system_prompt(request.archetype, &request.brand, request.icp.as_ref());
        let mut prompt = format!(
            "Write {}. Return only the copy, no preamble.",
            request.kind.guidance()
        );
        if let Some(extra) = request
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|extra| !extra.is_empty())
        {
            prompt.push_str("\nAdditional instructions: ");
            prompt.push_str(extra);
        }

        let options = GenerationOptions {
            temperature: Some(COPY_TEMPERATURE),
            ..GenerationOptions::default()
        };
        let text = self
            .provider
            .generate_text(&prompt, &system, &options)
            .await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(StudioError::Runtime(format!(
                "model returned no {} copy",
                request.kind
            )));
        }
        tracing::info!(
            archetype = %request.archetype,
            kind = %request.kind,
            model = self.provider.model(),
            "Generated copy"
        );
        Ok(GeneratedContent {
            archetype: request.archetype,
            kind: request.kind,
            resonance: emotion::resonance(&text, request.archetype),
            text,
        })
    }

    /// Same content kind for every archetype, in declaration order.
    pub async fn generate_for_all(
        &self,
        kind: ContentKind,
        brand: &BrandValues,
        icp: Option<&IcpProfile>,
    ) -> Result<Vec<GeneratedContent>> {
        let requests: Vec<ContentRequest> = ArchetypeProfile::ALL
            .into_iter()
            .map(|archetype| ContentRequest {
                archetype,
                kind,
                brand: brand.clone(),
                icp: icp.cloned(),
                instructions: None,
            })
            .collect();
        futures::future::try_join_all(requests.iter().map(|request| self.generate(request))).await
    }

    pub async fn generate_campaign(&self, request: &CampaignRequest) -> Result<CampaignDraft> {
        request.brand.validate()?;
        let kinds = if request.kinds.is_empty() {
            vec![
                ContentKind::Headline,
                ContentKind::Tagline,
                ContentKind::SocialPost,
                ContentKind::EmailSubject,
                ContentKind::EmailBody,
            ]
        } else {
            request.kinds.clone()
        };
        let channels = if request.channels.is_empty() {
            request
                .archetype
                .channels()
                .iter()
                .map(|channel| channel.to_string())
                .collect()
        } else {
            request.channels.clone()
        };
        let default_name = request
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{} campaign", request.archetype.display_name()));

        let system = Self::system_prompt(request.archetype, &request.brand, request.icp.as_ref());
        let kind_lines: Vec<String> = kinds
            .iter()
            .map(|kind| format!("- {}: {}", kind.key(), kind.guidance()))
            .collect();
        let prompt = format!(
            "Plan a marketing campaign for the channels: {channels}.\n\
             Produce one asset for each kind below:\n{kinds}\n\n\
             Respond with a JSON object: {{\"name\": string, \"assets\": [{{\"kind\": string, \"text\": string}}]}}.",
            channels = channels.join(", "),
            kinds = kind_lines.join("\n"),
        );

        let options = GenerationOptions {
            temperature: Some(CAMPAIGN_TEMPERATURE),
            json_object: true,
            ..GenerationOptions::default()
        };
        let raw = self
            .provider
            .generate_text(&prompt, &system, &options)
            .await?;
        let (name, assets) = parse_campaign_response(&raw, &default_name);

        Ok(CampaignDraft {
            user_id: request.user_id.clone(),
            name: request
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(name),
            archetype: request.archetype,
            brand: request.brand.clone(),
            icp: request.icp.clone(),
            channels,
            assets,
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Best-effort decode of a campaign reply. Unparseable replies become a
/// single landing page asset; unknown kinds are skipped.
pub fn parse_campaign_response(raw: &str, default_name: &str) -> (String, Vec<ContentAsset>) {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<RawCampaign>(body) {
        Ok(parsed) => {
            let assets: Vec<ContentAsset> = parsed
                .assets
                .into_iter()
                .filter_map(|asset| {
                    let kind = match asset.kind.parse::<ContentKind>() {
                        Ok(kind) => kind,
                        Err(err) => {
                            tracing::debug!("Skipping campaign asset: {}", err);
                            return None;
                        }
                    };
                    let text = asset.text.trim().to_string();
                    (!text.is_empty()).then_some(ContentAsset { kind, text })
                })
                .collect();
            let name = parsed
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| default_name.to_string());
            if assets.is_empty() {
                return (name, fallback_assets(raw));
            }
            (name, assets)
        }
        Err(err) => {
            tracing::warn!("Campaign reply was not valid JSON: {}", err);
            (default_name.to_string(), fallback_assets(raw))
        }
    }
}

fn fallback_assets(raw: &str) -> Vec<ContentAsset> {
    let text = raw.trim();
    if text.is_empty() {
        return Vec::new();
    }
    vec![ContentAsset {
        kind: ContentKind::LandingPage,
        text: text.to_string(),
    }]
}
