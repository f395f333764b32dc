use anyhow::{Context, Result};
use bold::chapters::{parse_chapters, Chapter};
use std::path::Path;

pub fn execute(file: &Path) -> Result<()> {
    let track = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read chapter track {}", file.display()))?;

    let chapters = parse_chapters(&track);
    if chapters.is_empty() {
        anyhow::bail!("{} is not a WEBVTT chapter track", file.display());
    }

    for line in render(&chapters) {
        println!("{}", line);
    }
    Ok(())
}

fn render(chapters: &[Chapter]) -> Vec<String> {
    chapters
        .iter()
        .map(|chapter| format!("{} {}", chapter.start_time, chapter.title))
        .collect()
}
