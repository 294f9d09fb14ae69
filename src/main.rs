use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};

use reply_triage::config::{MatcherConfig, QdrantConfig, RouterConfig, VoyageConfig};
use reply_triage::email::{
    InboundEmail, ParseOptions, detect_auto_reply, looks_like_message, parse_email_reply,
};
use reply_triage::kb::{KbMatcher, QdrantStore, VoyageEmbedder};
use reply_triage::pipeline::types::{Classification, LeadContext};
use reply_triage::pipeline::{
    StaticClassifier, TierRouter, TriagePipeline, TriageRequest, calculate_routing_confidence,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut raw = Vec::new();
    std::io::stdin()
        .read_to_end(&mut raw)
        .context("failed to read email from stdin")?;

    let inbound = looks_like_message(&raw)
        .then(|| InboundEmail::parse(&raw))
        .flatten();
    let body = match &inbound {
        Some(email) => email.body.clone(),
        None => String::from_utf8_lossy(&raw).into_owned(),
    };

    let Ok(classification_json) = std::env::var("TRIAGE_CLASSIFICATION") else {
        let parsed = parse_email_reply(&body, &ParseOptions::default());
        let auto_reply = detect_auto_reply(&parsed.new_content);
        let output = json!({
            "message": inbound,
            "parsed": parsed,
            "auto_reply": auto_reply,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    };

    let classification: Classification = serde_json::from_str(&classification_json)
        .context("TRIAGE_CLASSIFICATION is not a valid classification")?;
    let lead_context: Option<LeadContext> = match std::env::var("TRIAGE_LEAD_CONTEXT") {
        Ok(s) => Some(serde_json::from_str(&s).context("TRIAGE_LEAD_CONTEXT is not valid JSON")?),
        Err(_) => None,
    };

    let classifier = Arc::new(StaticClassifier(classification));
    let router = TierRouter::new(RouterConfig::from_env());
    let tenant_id = std::env::var("TRIAGE_TENANT_ID").ok();

    let pipeline = match (&tenant_id, VoyageConfig::from_env()) {
        (Some(tenant), Ok(voyage)) => {
            let qdrant = QdrantConfig::from_env();
            info!(tenant_id = %tenant, qdrant_url = %qdrant.url, model = %voyage.model, "KB matching enabled");
            let matcher = KbMatcher::new(
                Arc::new(VoyageEmbedder::new(voyage)),
                Arc::new(QdrantStore::new(qdrant)),
                MatcherConfig::from_env(),
            );
            TriagePipeline::new(classifier, matcher, router)
        }
        (Some(_), Err(e)) => {
            warn!(error = %e, "Tenant set but embeddings not configured, routing without KB");
            TriagePipeline::without_kb(classifier, router)
        }
        (None, _) => TriagePipeline::without_kb(classifier, router),
    };

    let request = TriageRequest {
        raw_body: body,
        tenant_id: tenant_id.unwrap_or_default(),
        lead_context,
    };
    let outcome = pipeline.triage(&request).await?;
    if let Err(e) = pipeline.ensure_tier_one_executable(&outcome) {
        warn!(error = %e, "Tier 1 outcome is not executable");
    }

    let output = json!({
        "message": inbound,
        "routing_confidence": calculate_routing_confidence(&outcome.routing),
        "outcome": outcome,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
