use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use archetype_studio::archetypes::{compute_alignment, ArchetypeProfile};
use archetype_studio::config::Config;
use archetype_studio::content::{ContentGenerator, ContentRequest};
use archetype_studio::domains::brand::BrandQuestionnaire;
use archetype_studio::domains::campaign::ContentKind;
use archetype_studio::error::Result;
use archetype_studio::providers::openai::OpenAiProvider;
use archetype_studio::runtime_paths;
use archetype_studio::scraper::WebsiteAnalyzer;
use archetype_studio::text::split_list;

#[derive(Parser, Debug)]
#[command(name = "archetype-studio")]
#[command(version, about = "Score brands against consumer archetypes and draft tailored copy")]
struct Cli {
    #[arg(long, global = true, env = "STUDIO_CONFIG")]
    config: Option<String>,

    /// Root for the default config path
    #[arg(long, global = true, env = "STUDIO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Alignment of a keyword list with every archetype
    Score {
        /// Comma separated keywords
        #[arg(long)]
        keywords: String,
    },
    /// Fetch a page and score its keywords
    Analyze { url: String },
    /// Generate one piece of copy for an archetype
    Generate {
        /// Defaults to the best-aligned archetype for the keywords
        #[arg(long)]
        archetype: Option<ArchetypeProfile>,
        #[arg(long, default_value = "headline")]
        kind: ContentKind,
        #[arg(long)]
        mission: String,
        #[arg(long)]
        vision: Option<String>,
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    archetype_studio::logging::init_tracing("archetype_studio_cli");
    let cli = Cli::parse();
    if cli.data_dir.is_some() {
        runtime_paths::set_app_root_override(cli.data_dir.clone());
    }
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(runtime_paths::default_config_path);
    let config = Config::load_or_default(Some(&config_path), &runtime_paths::default_db_path())?;

    match cli.command {
        Commands::Score { keywords } => {
            let scores = compute_alignment(split_list(&keywords));
            let (top, score) = scores.top();
            for (archetype, value) in scores.ranked() {
                println!("{:<16} {:.3}", archetype.display_name(), value);
            }
            println!("top: {} ({:.3})", top.display_name(), score);
        }
        Commands::Analyze { url } => {
            let analyzer = WebsiteAnalyzer::from_config(&config.scraper)?;
            let analysis = analyzer.analyze(&url).await?;
            let scores = compute_alignment(analysis.keyword_set());
            let output = serde_json::json!({
                "analysis": analysis,
                "alignment": scores,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Generate {
            archetype,
            kind,
            mission,
            vision,
            keywords,
            instructions,
        } => {
            let brand = BrandQuestionnaire {
                mission,
                vision,
                keywords,
                ..BrandQuestionnaire::default()
            }
            .into_brand_values()?;
            let archetype =
                archetype.unwrap_or_else(|| compute_alignment(&brand.keywords).top().0);
            let openai = config.openai.clone().unwrap_or_default();
            let provider = OpenAiProvider::from_config(&openai)?;
            let generator = ContentGenerator::new(Arc::new(provider));
            let content = generator
                .generate(&ContentRequest {
                    archetype,
                    kind,
                    brand,
                    icp: None,
                    instructions,
                })
                .await?;
            println!("[{} / {}]", content.archetype.display_name(), content.kind);
            println!("{}", content.text);
            println!("resonance: {:.2}", content.resonance);
        }
    }
    Ok(())
}
