use asset_analysis_orchestrator::{
    agent::Orchestrator,
    cache::build_cache,
    execution::FanOutExecutor,
    gemini::GeminiClient,
    memory::{ContextConfig, ContextManager, ConversationStore},
    models::{AnalysisRequest, SpecialistResult, SpecialistRole, Timeframe},
    specialists::{LlmSpecialist, Specialist, StaticSpecialist, TextGenerator},
    state::build_store,
    Settings,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Canned specialists used when no Gemini key is configured
fn offline_specialists() -> [Arc<dyn Specialist>; 3] {
    let macro_analyst = SpecialistResult {
        key_factors: vec!["Real yields easing".to_string()],
        key_risks: vec!["Sticky core inflation".to_string()],
        ..SpecialistResult::new(
            SpecialistRole::Macro,
            "Liquidity conditions are improving as central banks pause. Risk assets benefit.",
            0.72,
        )
    }
    .with_signal("bullish");

    let technical_analyst = SpecialistResult {
        key_factors: vec!["Price above 50-day average".to_string()],
        key_risks: vec!["Overbought daily RSI".to_string()],
        ..SpecialistResult::new(
            SpecialistRole::Technical,
            "Trend structure shows higher lows with rising volume.",
            0.68,
        )
    }
    .with_signal("bullish");

    let sentiment_analyst = SpecialistResult::new(
        SpecialistRole::Sentiment,
        "Headlines are mixed with no dominant narrative.",
        0.55,
    )
    .with_signal("neutral");

    [
        Arc::new(StaticSpecialist::new(macro_analyst)),
        Arc::new(StaticSpecialist::new(technical_analyst)),
        Arc::new(StaticSpecialist::new(sentiment_analyst)),
    ]
}

fn specialists(settings: &Settings) -> [Arc<dyn Specialist>; 3] {
    let Some(api_key) = settings.gemini_api_key.as_deref() else {
        warn!("GEMINI_API_KEY not set, using offline specialists");
        return offline_specialists();
    };

    match GeminiClient::new(api_key, settings.gemini_model.as_str()) {
        Ok(client) => {
            info!(model = %settings.gemini_model, "Using Gemini-backed specialists");
            let generator: Arc<dyn TextGenerator> = Arc::new(client);
            LlmSpecialist::all(generator).map(|s| Arc::new(s) as Arc<dyn Specialist>)
        }
        Err(e) => {
            warn!(error = %e, "Gemini client unavailable, using offline specialists");
            offline_specialists()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG, then LOG_LEVEL, then info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into())))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::from_env()?;
    info!("Asset Analysis Orchestrator starting");

    let [macro_analyst, technical_analyst, sentiment_analyst] = specialists(&settings);
    let executor = FanOutExecutor::new(
        macro_analyst,
        technical_analyst,
        sentiment_analyst,
        settings.specialist_timeout(),
    );

    let cache = build_cache(&settings).await;
    if !cache.health_check().await {
        warn!("Cache unreachable, analyses will not be cached");
    }
    let conversations = Arc::new(ConversationStore::with_context_manager(
        ContextManager::with_config(ContextConfig {
            recent_window: settings.context_window,
            max_message_chars: settings.context_message_chars,
        }),
    ));
    let store = build_store(&settings);

    let orchestrator = Orchestrator::new(executor, cache, conversations, store);

    let mut args = std::env::args().skip(1);
    let asset = args.next().unwrap_or_else(|| "BTC".to_string());
    let timeframe: Timeframe = match args.next() {
        Some(raw) => raw.parse()?,
        None => Timeframe::Medium,
    };
    let query = args.collect::<Vec<_>>().join(" ");
    let query = if query.trim().is_empty() {
        format!("Should I buy {} now?", asset)
    } else {
        query
    };

    let request = AnalysisRequest::new(query.as_str(), asset.as_str(), timeframe)
        .with_conversation("cli-session", "cli-conversation");
    let follow_up = AnalysisRequest::new("What are the main risks?", asset.as_str(), timeframe)
        .with_conversation("cli-session", "cli-conversation");

    for request in [&request, &follow_up] {
        match orchestrator.analyze(request).await {
            Ok(analysis) => {
                println!("\n=== ANALYSIS {} ===", analysis.id);
                println!("Query: {}", analysis.query);
                println!("Risk Level: {}", analysis.risk_level);
                println!("{}", analysis.synthesis.executive_summary);
                if !analysis.synthesis.key_risks.is_empty() {
                    println!("\nKey Risks:");
                    for (i, risk) in analysis.synthesis.key_risks.iter().enumerate() {
                        println!("  {}: {}", i + 1, risk);
                    }
                }
            }
            Err(e) => {
                eprintln!("Analysis unavailable: {}", e);
                return Err(Box::new(e) as Box<dyn std::error::Error>);
            }
        }
    }

    Ok(())
}
