use std::sync::Arc;

use vitae::prelude::*;
use vitae::providers::embeddings::HashingEmbedding;

fn records() -> Vec<ExperienceRecord> {
    vec![
        ExperienceRecord {
            employer: "Tech Corp".to_string(),
            role: "Senior Engineer".to_string(),
            dates: "2020 - 2023".to_string(),
            technologies: vec!["Python".to_string(), "AWS".to_string()],
            bullets: vec![
                "Built Python microservices on AWS".to_string(),
                "Led team using Agile".to_string(),
            ],
            ..Default::default()
        },
        ExperienceRecord {
            employer: "Startup".to_string(),
            role: "CTO".to_string(),
            bullets: vec!["Hired and mentored four developers".to_string()],
            ..Default::default()
        },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let dir = tempfile::tempdir()?;
    let config = Config::in_dir(dir.path());
    let model: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedding::default());

    let loader = DirectLoader::new(vec![ExperienceSource::Records {
        name: "experiences".to_string(),
        records: records(),
    }]);
    let indexed = Indexer::new(model.clone())
        .index_from_loader(&loader, &config)
        .await?;
    println!("indexed {} documents", indexed.document_count);

    let retriever = Retriever::builder(&config.store_path, model)
        .with_config(&config)
        .build()?;

    for requirement in ["Python", "team leadership"] {
        let evidence = retriever.retrieve_by_requirement(requirement).await?;
        println!("{requirement}: {} of {} matches", evidence.len(), evidence.total_matched);
        for (doc, score) in evidence.iter() {
            println!(
                "  {score:.3} {} [{}]",
                doc.content,
                doc.metadata.employer().unwrap_or("unknown")
            );
        }
    }

    let at_startup = retriever.retrieve_by_employer("startup", None, None).await?;
    println!("startup: {} documents", at_startup.len());
    Ok(())
}
