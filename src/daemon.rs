use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::archetypes::{self, compute_alignment, AlignmentScore, ArchetypeProfile, ArchetypeReport};
use crate::config::Config;
use crate::content::{CampaignRequest, ContentGenerator, ContentRequest, GeneratedContent};
use crate::domains::brand::{BrandQuestionnaire, BrandValues};
use crate::domains::campaign::{Campaign, ContentKind};
use crate::domains::icp::{IcpProfile, IcpQuestionnaire};
use crate::emotion::{self, Emotion};
use crate::error::{Result, StudioError};
use crate::interfaces::providers::LlmProvider;
use crate::metrics::{EngagementEvent, MetricSnapshot, MetricsTracker};
use crate::personalization::{self, Feedback, RankedArchetype};
use crate::providers::openai::OpenAiProvider;
use crate::scraper::{WebsiteAnalysis, WebsiteAnalyzer};
use crate::session::{SessionStore, BRAND_VALUES_KEY, ICP_KEY, WEBSITE_ANALYSIS_KEY};
use crate::store::CampaignStore;
use crate::text::keyword_set;

#[derive(Clone)]
pub struct AppState {
    pub token: String,
    pub sessions: Arc<SessionStore>,
    pub analyzer: Arc<WebsiteAnalyzer>,
    pub generator: Option<Arc<ContentGenerator>>,
    pub campaigns: Arc<CampaignStore>,
    pub metrics: Arc<RwLock<MetricsTracker>>,
}

impl AppState {
    pub async fn from_config(config: &Config, token: &str) -> Result<Self> {
        let generator = match config.openai.as_ref().filter(|_| config.openai_api_key().is_some()) {
            Some(openai) => {
                let provider = OpenAiProvider::from_config(openai)?;
                tracing::info!(model = provider.model(), "Content generation enabled");
                Some(Arc::new(ContentGenerator::new(Arc::new(provider))))
            }
            None => {
                tracing::warn!("No OpenAI API key configured; content generation is disabled");
                None
            }
        };
        Ok(Self {
            token: token.to_string(),
            sessions: Arc::new(SessionStore::new()),
            analyzer: Arc::new(WebsiteAnalyzer::from_config(&config.scraper)?),
            generator,
            campaigns: Arc::new(CampaignStore::new(config.sqlite_path()).await?),
            metrics: Arc::new(RwLock::new(MetricsTracker::new(&config.metrics)?)),
        })
    }

    fn generator(&self) -> Result<Arc<ContentGenerator>> {
        self.generator.clone().ok_or_else(|| {
            StudioError::Config("content generation requires openai.api_key".to_string())
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    git_sha: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Deserialize)]
struct CampaignListQuery {
    user_id: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct BrandValuesRequest {
    user_id: String,
    #[serde(flatten)]
    answers: BrandQuestionnaire,
}

#[derive(Serialize)]
struct BrandValuesResponse {
    brand_values: BrandValues,
    report: Vec<ArchetypeReport>,
}

#[derive(Deserialize)]
struct IcpRequest {
    user_id: String,
    #[serde(flatten)]
    answers: IcpQuestionnaire,
}

#[derive(Deserialize)]
struct AnalyzeWebsiteRequest {
    user_id: String,
    url: String,
}

#[derive(Serialize)]
struct AnalyzeWebsiteResponse {
    analysis: WebsiteAnalysis,
    alignment: AlignmentScore,
}

#[derive(Deserialize)]
struct AlignmentRequest {
    user_id: Option<String>,
    keywords: Option<Vec<String>>,
}

#[derive(Serialize)]
struct TopArchetype {
    archetype: ArchetypeProfile,
    score: f64,
}

#[derive(Serialize)]
struct AlignmentResponse {
    keywords: Vec<String>,
    scores: AlignmentScore,
    top: TopArchetype,
}

#[derive(Deserialize)]
struct EmotionsRequest {
    text: String,
}

#[derive(Serialize)]
struct EmotionsResponse {
    emotions: BTreeMap<Emotion, f64>,
    resonance: BTreeMap<ArchetypeProfile, f64>,
}

#[derive(Deserialize)]
struct GenerateContentRequest {
    user_id: Option<String>,
    archetype: Option<ArchetypeProfile>,
    kind: ContentKind,
    brand: Option<BrandValues>,
    icp: Option<IcpProfile>,
    instructions: Option<String>,
}

#[derive(Deserialize)]
struct CreateCampaignRequest {
    user_id: String,
    name: Option<String>,
    archetype: Option<ArchetypeProfile>,
    brand: Option<BrandValues>,
    icp: Option<IcpProfile>,
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    kinds: Vec<ContentKind>,
}

#[derive(Serialize)]
struct CampaignListResponse {
    campaigns: Vec<Campaign>,
}

#[derive(Serialize)]
struct FeedbackResponse {
    archetype: ArchetypeProfile,
    ema: f64,
}

#[derive(Serialize)]
struct MetricsResponse {
    metrics: Vec<MetricSnapshot>,
    recent: Vec<EngagementEvent>,
}

#[derive(Serialize)]
struct PersonalizeResponse {
    ranked: Vec<RankedArchetype>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/brand_values", post(submit_brand_values).get(brand_values))
        .route("/icp", post(submit_icp).get(icp))
        .route("/analyze_website", post(analyze_website))
        .route("/alignment", post(alignment))
        .route("/emotions", post(emotions))
        .route("/generate_content", post(generate_content))
        .route("/campaigns", post(create_campaign).get(list_campaigns))
        .route("/campaigns/{id}", get(campaign))
        .route("/feedback", post(feedback))
        .route("/metrics", get(metrics))
        .route("/personalize", get(personalize))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_sha: crate::GIT_SHA.to_string(),
    })
}

fn error_response(err: StudioError) -> Response {
    let status = match &err {
        StudioError::Validation(_) => StatusCode::BAD_REQUEST,
        StudioError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Request failed: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn submit_brand_values(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BrandValuesRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, store_brand_values(&state, payload).await)
}

async fn brand_values(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let result = stored::<BrandValues>(&state, &query.user_id, BRAND_VALUES_KEY).await;
    respond(StatusCode::OK, result)
}

async fn submit_icp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IcpRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, store_icp(&state, payload).await)
}

async fn icp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let result = stored::<IcpProfile>(&state, &query.user_id, ICP_KEY).await;
    respond(StatusCode::OK, result)
}

async fn analyze_website(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AnalyzeWebsiteRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, analyze_and_store(&state, payload).await)
}

async fn alignment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AlignmentRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, align(&state, payload).await)
}

async fn emotions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<EmotionsRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let resonance = ArchetypeProfile::ALL
        .into_iter()
        .map(|archetype| (archetype, emotion::resonance(&payload.text, archetype)))
        .collect();
    (
        StatusCode::OK,
        Json(EmotionsResponse {
            emotions: emotion::detect(&payload.text),
            resonance,
        }),
    )
        .into_response()
}

async fn generate_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateContentRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, generate(&state, payload).await)
}

async fn create_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCampaignRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::CREATED, generate_and_save_campaign(&state, payload).await)
}

async fn list_campaigns(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CampaignListQuery>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let result = state
        .campaigns
        .list(&query.user_id, limit)
        .await
        .map(|campaigns| CampaignListResponse { campaigns });
    respond(StatusCode::OK, result)
}

async fn campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Query(query): Query<UserQuery>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, owned_campaign(&state, id, &query.user_id).await)
}

async fn feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Feedback>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, record_feedback(&state, payload).await)
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let tracker = state.metrics.read().await;
    (
        StatusCode::OK,
        Json(MetricsResponse {
            metrics: tracker.snapshot(),
            recent: tracker.recent(20),
        }),
    )
        .into_response()
}

async fn personalize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserQuery>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    respond(StatusCode::OK, rank_for_user(&state, &query.user_id).await)
}

async fn store_brand_values(
    state: &AppState,
    payload: BrandValuesRequest,
) -> Result<BrandValuesResponse> {
    let brand_values = payload.answers.into_brand_values()?;
    state
        .sessions
        .put(&payload.user_id, BRAND_VALUES_KEY, &brand_values)
        .await?;
    tracing::info!(
        user_id = %payload.user_id,
        keywords = brand_values.keywords.len(),
        "Stored brand values"
    );
    let report = archetypes::report(&brand_values);
    Ok(BrandValuesResponse {
        brand_values,
        report,
    })
}

async fn store_icp(state: &AppState, payload: IcpRequest) -> Result<IcpProfile> {
    let profile = payload.answers.into_profile()?;
    state
        .sessions
        .put(&payload.user_id, ICP_KEY, &profile)
        .await?;
    tracing::info!(user_id = %payload.user_id, industry = %profile.industry, "Stored ICP");
    Ok(profile)
}

async fn analyze_and_store(
    state: &AppState,
    payload: AnalyzeWebsiteRequest,
) -> Result<AnalyzeWebsiteResponse> {
    let analysis = state.analyzer.analyze(&payload.url).await?;
    state
        .sessions
        .put(&payload.user_id, WEBSITE_ANALYSIS_KEY, &analysis)
        .await?;
    let alignment = compute_alignment(analysis.keyword_set());
    Ok(AnalyzeWebsiteResponse {
        analysis,
        alignment,
    })
}

async fn align(state: &AppState, payload: AlignmentRequest) -> Result<AlignmentResponse> {
    let keywords = match (payload.keywords, payload.user_id.as_deref()) {
        (Some(keywords), _) => archetypes::normalize_keywords(keywords),
        (_, Some(user_id)) => session_keywords(state, user_id).await?,
        _ => {
            return Err(StudioError::Validation(
                "provide keywords or a user_id with stored brand values".to_string(),
            ))
        }
    };
    let scores = compute_alignment(&keywords);
    let (archetype, score) = scores.top();
    Ok(AlignmentResponse {
        keywords: keywords.into_iter().collect(),
        scores,
        top: TopArchetype { archetype, score },
    })
}

async fn generate(state: &AppState, payload: GenerateContentRequest) -> Result<GeneratedContent> {
    let generator = state.generator()?;
    let brand = resolve_brand(state, payload.brand, payload.user_id.as_deref()).await?;
    let icp = resolve_icp(state, payload.icp, payload.user_id.as_deref()).await?;
    let archetype = payload
        .archetype
        .unwrap_or_else(|| best_archetype(&brand));
    generator
        .generate(&ContentRequest {
            archetype,
            kind: payload.kind,
            brand,
            icp,
            instructions: payload.instructions,
        })
        .await
}

async fn generate_and_save_campaign(
    state: &AppState,
    payload: CreateCampaignRequest,
) -> Result<Campaign> {
    let generator = state.generator()?;
    let brand = resolve_brand(state, payload.brand, Some(&payload.user_id)).await?;
    let icp = resolve_icp(state, payload.icp, Some(&payload.user_id)).await?;
    let archetype = payload
        .archetype
        .unwrap_or_else(|| best_archetype(&brand));
    let channels = if payload.channels.is_empty() {
        icp.as_ref()
            .map(|icp| icp.channels.clone())
            .unwrap_or_default()
    } else {
        payload.channels
    };
    let draft = generator
        .generate_campaign(&CampaignRequest {
            user_id: payload.user_id,
            name: payload.name,
            archetype,
            brand,
            icp,
            channels,
            kinds: payload.kinds,
        })
        .await?;
    state.campaigns.save(&draft).await
}

/// Campaigns owned by another user read as missing.
async fn owned_campaign(state: &AppState, id: i32, user_id: &str) -> Result<Campaign> {
    state
        .campaigns
        .get(id)
        .await?
        .filter(|campaign| campaign.user_id == user_id)
        .ok_or_else(|| StudioError::NotFound(format!("campaign {id}")))
}

async fn record_feedback(state: &AppState, payload: Feedback) -> Result<FeedbackResponse> {
    if let Some(id) = payload.campaign_id {
        if state.campaigns.get(id).await?.is_none() {
            return Err(StudioError::NotFound(format!("campaign {id}")));
        }
    }
    let mut tracker = state.metrics.write().await;
    let ema =
        personalization::record_feedback(&mut tracker, &payload, chrono::Utc::now().timestamp())?;
    Ok(FeedbackResponse {
        archetype: payload.archetype,
        ema,
    })
}

async fn rank_for_user(state: &AppState, user_id: &str) -> Result<PersonalizeResponse> {
    let keywords = session_keywords(state, user_id).await?;
    let alignment = compute_alignment(&keywords);
    let tracker = state.metrics.read().await;
    Ok(PersonalizeResponse {
        ranked: personalization::rank(&alignment, &tracker),
    })
}

async fn stored<T: serde::de::DeserializeOwned>(
    state: &AppState,
    user_id: &str,
    key: &str,
) -> Result<T> {
    state
        .sessions
        .get(user_id, key)
        .await?
        .ok_or_else(|| StudioError::NotFound(format!("no {key} stored for user {user_id}")))
}

/// Brand keywords, website keywords and ICP terms stored for `user_id`.
///
/// Stored records that yield no keywords give an empty set; only a user with
/// nothing stored is an error.
async fn session_keywords(state: &AppState, user_id: &str) -> Result<BTreeSet<String>> {
    let mut keywords = BTreeSet::new();
    let mut found = false;
    if let Some(brand) = state
        .sessions
        .get::<BrandValues>(user_id, BRAND_VALUES_KEY)
        .await?
    {
        found = true;
        keywords.extend(brand.keywords);
    }
    if let Some(analysis) = state
        .sessions
        .get::<WebsiteAnalysis>(user_id, WEBSITE_ANALYSIS_KEY)
        .await?
    {
        found = true;
        keywords.extend(analysis.keyword_set());
    }
    if let Some(icp) = state.sessions.get::<IcpProfile>(user_id, ICP_KEY).await? {
        found = true;
        keywords.extend(keyword_set(&icp.corpus()));
    }
    if !found {
        return Err(StudioError::NotFound(format!(
            "no brand values, ICP or website analysis stored for user {user_id}"
        )));
    }
    Ok(keywords)
}

async fn resolve_brand(
    state: &AppState,
    explicit: Option<BrandValues>,
    user_id: Option<&str>,
) -> Result<BrandValues> {
    match (explicit, user_id) {
        (Some(brand), _) => Ok(brand),
        (None, Some(user_id)) => stored(state, user_id, BRAND_VALUES_KEY).await,
        (None, None) => Err(StudioError::Validation(
            "provide brand values or a user_id with stored brand values".to_string(),
        )),
    }
}

async fn resolve_icp(
    state: &AppState,
    explicit: Option<IcpProfile>,
    user_id: Option<&str>,
) -> Result<Option<IcpProfile>> {
    match (explicit, user_id) {
        (Some(icp), _) => Ok(Some(icp)),
        (None, Some(user_id)) => state.sessions.get(user_id, ICP_KEY).await,
        (None, None) => Ok(None),
    }
}

fn best_archetype(brand: &BrandValues) -> ArchetypeProfile {
    archetypes::report(brand)
        .into_iter()
        .fold(None::<ArchetypeReport>, |best, row| match best {
            Some(best) if best.combined >= row.combined => Some(best),
            _ => Some(row),
        })
        .map(|row| row.archetype)
        .unwrap_or(ArchetypeProfile::ALL[0])
}

fn authorize(
    headers: &HeaderMap,
    token: &str,
) -> std::result::Result<(), (StatusCode, Json<ErrorResponse>)> {
    let expected_token = token.trim();
    if expected_token.is_empty() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        ));
    }

    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("").trim();
    let api_key = api_key.trim();

    if bearer == expected_token || api_key == expected_token {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        ))
    }
}

pub async fn run(host: &str, port: u16, config: &Config, token: &str) -> Result<()> {
    run_with_shutdown(host, port, config, token, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    config: &Config,
    token: &str,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    let state = AppState::from_config(config, token).await?;
    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StudioError::Runtime(e.to_string()))?;
    tracing::info!(addr = %addr, db = %config.sqlite_path(), "Daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| StudioError::Runtime(e.to_string()))?;

    Ok(())
}
