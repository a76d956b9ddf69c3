//! `curator docx retrieve` / `curator docx convert` - artifact conversion.

use std::sync::Arc;

use anyhow::{Result, bail};
use curator::convert::{ArtifactConverter, PandocConverter};
use curator::{AppConfig, Store};

use super::StageOutcome;

fn converter(config: &AppConfig) -> ArtifactConverter {
    ArtifactConverter::new(
        Arc::new(PandocConverter::new()),
        config.markdown_from_docx_dir(),
    )
}

/// Locates DOCX renditions for one record or for every record with a
/// downloaded PDF and no DOCX yet.
pub async fn run_docx_retrieve(
    config: &AppConfig,
    store: &Store,
    record_id: Option<i64>,
) -> Result<StageOutcome> {
    let converter = converter(config);
    let docx_dir = config.docx_dir();

    let targets: Vec<i64> = match record_id {
        Some(id) => vec![id],
        None => {
            let downloaded = store.downloaded_record_ids().await?;
            let with_docx = store.records_with_docx().await?;
            let mut pending: Vec<i64> =
                downloaded.difference(&with_docx).copied().collect();
            pending.sort_unstable();
            pending
        }
    };
    if targets.is_empty() {
        println!("No records with PDFs but missing DOCX versions.");
        return Ok(StageOutcome::Success);
    }
    println!("Processing {} records...", targets.len());

    let mut found = 0usize;
    let mut missing = 0usize;
    let mut failed = 0usize;
    for id in targets {
        let Some(article) = store.article(id).await? else {
            eprintln!("Record {id} not found");
            failed += 1;
            continue;
        };
        let sha1 = store
            .latest_downloaded_pdf(id)
            .await?
            .and_then(|(_, sha1)| sha1);

        let docx = converter
            .retrieve_docx(store, &article, &docx_dir, sha1.as_deref())
            .await?;
        if docx.docx_local_path.is_some() {
            found += 1;
            println!(
                "Record {id}: DOCX found ({})",
                docx.docx_local_path.as_deref().unwrap_or("-")
            );
        } else {
            missing += 1;
            println!("Record {id}: DOCX not found");
        }
    }

    println!("\nDOCX retrieval: {found} found, {missing} not found, {failed} errors");
    Ok(StageOutcome::from_failed(failed))
}

/// Converts one located DOCX (or every pending one) to both Markdown
/// variants.
pub async fn run_docx_convert(
    config: &AppConfig,
    store: &Store,
    docx_version_id: Option<i64>,
) -> Result<StageOutcome> {
    let converter = converter(config);

    let targets = match docx_version_id {
        Some(id) => match store.docx_version(id).await? {
            Some(docx) => vec![docx],
            None => bail!("no docx_version found with id={id}"),
        },
        None => store.docx_versions_pending_conversion().await?,
    };
    if targets.is_empty() {
        println!("No DOCX versions pending conversion.");
        return Ok(StageOutcome::Success);
    }
    println!("Converting {} DOCX files...", targets.len());

    let mut full = 0usize;
    let mut partial = 0usize;
    let mut failed = 0usize;
    for docx in targets {
        if docx.docx_local_path.is_none() {
            eprintln!("docx_version {} has no file path", docx.id);
            failed += 1;
            continue;
        }
        let outcomes = converter.convert_to_markdown(store, &docx).await?;
        let successes = outcomes.iter().filter(|o| o.error.is_none()).count();
        match successes {
            2 => {
                full += 1;
                println!("Record {}: both markdown variants created", docx.record_id);
            }
            1 => {
                partial += 1;
                println!("Record {}: partial success (one variant)", docx.record_id);
            }
            _ => {
                failed += 1;
                println!("Record {}: all conversions failed", docx.record_id);
            }
        }
    }

    println!("\nConversion: {full} full, {partial} partial, {failed} failed");
    Ok(StageOutcome::from_failed(failed))
}
