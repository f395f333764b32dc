use anyhow::Result;
use bold::search::{SearchClient, SearchHit};
use bold::time::seconds_to_readable;
use cliclack::spinner;
use console::style;

pub async fn execute(endpoint: String, query: String) -> Result<()> {
    let client = SearchClient::new(endpoint)?;

    let spin = spinner();
    spin.start("searching");
    let results = client.search(&query).await;
    spin.stop("");
    let results = results?;

    if results.hits.is_empty() {
        println!("{}", style("no matches").dim());
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "{} hits in {}ms",
            results.total_hits, results.processing_time_ms
        ))
        .dim()
    );
    for hit in &results.hits {
        print_hit(hit);
    }
    Ok(())
}

fn print_hit(hit: &SearchHit) {
    println!(
        "\n{} {}",
        style(&hit.title).bold(),
        style(format!("({}, {})", hit.short_id, seconds_to_readable(hit.duration))).dim()
    );
    for segment in &hit.segments {
        let text = if segment.snippet.is_empty() {
            &segment.text
        } else {
            &segment.snippet
        };
        println!(
            "  {} {}",
            style(seconds_to_readable(segment.start_time)).cyan(),
            text
        );
    }
}
