//! Sign in, submit one question through the pipeline and print the answer.
//!
//! ```sh
//! INSIGHT_API_URL=https://insight.example.com \
//! INSIGHT_USERNAME=jdoe INSIGHT_PASSWORD=secret \
//! cargo run -p insight-client --example converse -- "What changed this quarter?"
//! ```

use std::sync::Arc;

use anyhow::Context;

use insight_client::{AuthGateway, ChatApi, CredentialStore};
use insight_core::models::settings::ChatSettings;
use insight_core::models::submission::SubmissionStatus;
use insight_core::models::toggles::ToggleController;
use insight_core::repositories::JsonFileKeyValueRepository;
use insight_core::services::submission_pipeline::{
    DraftInput, SubmissionContext, SubmissionPipeline,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let base_url = std::env::var("INSIGHT_API_URL").context("INSIGHT_API_URL not set")?;
    let username = std::env::var("INSIGHT_USERNAME").context("INSIGHT_USERNAME not set")?;
    let password = std::env::var("INSIGHT_PASSWORD").context("INSIGHT_PASSWORD not set")?;
    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Summarize the latest company updates.".to_string());

    let repository = Arc::new(JsonFileKeyValueRepository::new()?);
    let store = CredentialStore::new(repository.clone());
    let gateway = Arc::new(AuthGateway::new(base_url, store));
    let api = ChatApi::new(gateway);

    let identity = api.login(&username, &password).await?;
    println!("Signed in as {} ({})", identity.display_name, identity.role_name);

    let toggles = ToggleController::for_new_conversation(repository.clone()).await?;
    let pipeline = SubmissionPipeline::new(Arc::new(api.clone()), ChatSettings::default());

    let draft = DraftInput {
        prompt: question,
        toggles: toggles.state(),
        files: Vec::new(),
    };
    let response = pipeline
        .submit(draft, SubmissionContext::new_conversation(0))
        .await?;

    println!("\n{}", response.answer);
    for doc in &response.source_documents {
        println!("  source: {}", doc.name);
    }
    assert_eq!(pipeline.status(), SubmissionStatus::Succeeded);

    api.logout().await?;
    Ok(())
}
