//! List stored media.

use dashcam_common::config::AppConfig;

pub fn run(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let store = super::media_store(config);
    let records = store
        .list()
        .map_err(|e| anyhow::anyhow!("Failed to read media store: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("Media in {}", store.root().display());
    if records.is_empty() {
        println!("  (empty)");
        return Ok(());
    }
    for record in &records {
        println!(
            "  {:<6} {}/{}{}",
            format!("{:?}", record.kind).to_lowercase(),
            record.relative_path,
            record.file_name,
            if record.is_pending { "  (pending)" } else { "" }
        );
        if let Some(orientation) = record.attributes.get("Orientation") {
            println!("         orientation: {orientation}");
        }
    }
    println!();
    println!("{} item(s)", records.len());
    Ok(())
}
