use subscene::{RetrieveOutcome, SearchOutcome, SearchQuery, Subscene, SubsceneOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut options = SubsceneOptions::new().timeout(15);
    if let Ok(key) = std::env::var("TMDB_API_KEY") {
        options = options.tmdb_api_key(&key);
    }

    let client = Subscene::new(options)?;

    println!("Searching Farsi subtitles for Bright (2017)...");
    let query = SearchQuery::movie("Bright").year(2017).language("fa");

    let candidates = match client.search(&query).await {
        SearchOutcome::Found(candidates) => candidates,
        SearchOutcome::NotFound => {
            println!("No subtitles found.");
            return Ok(());
        }
        SearchOutcome::Failed(e) => {
            eprintln!("Search failed: {}", e);
            return Ok(());
        }
    };

    println!("Found {} subtitle(s):", candidates.len());
    for candidate in candidates.iter().take(10) {
        println!("  - {} [{}]", candidate.name, candidate.language);
    }
    println!();

    // Episode searches filter by the SxxEyy token
    let episode = SearchQuery::episode("Dark", 1, 1).language("en");
    let episodes = client.search_candidates(&episode).await;
    println!("Dark S01E01: {} subtitle(s)", episodes.len());
    println!();

    let first = &candidates[0];
    println!("Downloading {}...", first.name);
    match client.retrieve(&first.id).await {
        RetrieveOutcome::Found(file) => {
            println!(
                "Got {} bytes of {} ({})",
                file.bytes.len(),
                file.format.as_deref().unwrap_or("?"),
                file.language.as_deref().unwrap_or("?")
            );
            let text = file.to_utf8();
            println!("Preview:\n{}", text.lines().take(8).collect::<Vec<_>>().join("\n"));
        }
        RetrieveOutcome::NotFound => println!("No downloadable archive."),
        RetrieveOutcome::Failed(e) => eprintln!("Download failed: {}", e),
    }

    Ok(())
}
