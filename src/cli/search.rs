use anyhow::Result;

use coursefinder::config::CourseFinderConfig;
use coursefinder::recommend::RetrievalService;

/// Run a one-off recommendation query from the terminal.
pub fn search(config: &CourseFinderConfig, query: &str, top_k: Option<usize>) -> Result<()> {
    let service = RetrievalService::open(config)?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let results = service.recommend_scored(query, top_k)?;

    if results.is_empty() {
        println!("No courses found.");
        return Ok(());
    }

    println!("Top {} course(s) for \"{query}\":\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "  {}. {} (score: {:.4}, row: {})",
            i + 1,
            result.course.name,
            result.score,
            result.position,
        );
        println!("     {}", super::truncate_preview(&result.course.description, 120));
        if !result.course.skills.is_empty() {
            println!("     Skills: {}", super::truncate_preview(&result.course.skills, 120));
        }
        println!();
    }

    Ok(())
}
