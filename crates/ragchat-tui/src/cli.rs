//! One-shot commands: each runs a single session operation and prints the
//! result to stdout. Failures surface as errors so the process exits non-zero.

use anyhow::{bail, Result};
use ragchat_core::{HttpGateway, Mode, OperationKind, Outcome, Session, Slot};

pub async fn chat(session: &Session<HttpGateway>, message: &str, mode: Option<Mode>) -> Result<()> {
    if let Some(mode) = mode {
        session.set_mode(mode);
    }

    match session.submit(message).await {
        Outcome::Ignored(_) => bail!("message is empty"),
        outcome => {
            let messages = session.messages();
            let Some(reply) = messages.last() else {
                bail!("no reply recorded");
            };
            if outcome == Outcome::Failed {
                bail!("{}", reply.content);
            }

            println!("{}", reply.content);
            if !reply.citations.is_empty() {
                println!("\nSources:");
                for (i, citation) in reply.citations.iter().enumerate() {
                    println!("  [{}] {}", i + 1, citation.location());
                }
            }
            Ok(())
        }
    }
}

pub async fn index(session: &Session<HttpGateway>, repo_name: &str, root_path: Option<&str>) -> Result<()> {
    session.run_index(repo_name, root_path).await;

    let result = match session.index_result() {
        Slot::Ready(result) => result,
        Slot::Failed(msg) => bail!("indexing failed: {}", msg),
        Slot::Empty => bail!("indexing did not run"),
    };

    println!("Indexed repository #{}", result.repository_id);
    println!("  files scanned:      {}", result.files_scanned);
    println!("  files indexed:      {}", result.files_indexed);
    println!("  files skipped:      {}", result.files_skipped);
    println!("  documents upserted: {}", result.documents_upserted);
    println!("  chunks created:     {}", result.chunks_created);
    println!("  chunks embedded:    {}", result.chunks_embedded);
    println!("  elapsed:            {} ms", result.elapsed_ms_total);
    if let Some(err) = &result.embedding_error {
        println!("  embedding error:    {}", err);
    }

    if session.status().is_some() {
        println!();
        print_status(session);
    }
    Ok(())
}

pub async fn reindex(session: &Session<HttpGateway>) -> Result<()> {
    session.run_reindex().await;

    match session.reindex_result() {
        Slot::Ready(summary) => println!("{}", summary),
        Slot::Failed(msg) => bail!("reindex failed: {}", msg),
        Slot::Empty => bail!("reindex did not run"),
    }
    Ok(())
}

pub async fn status(session: &Session<HttpGateway>) -> Result<()> {
    if session.refresh_status().await == Outcome::Failed {
        let msg = session
            .last_error(OperationKind::Status)
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("could not load status: {}", msg);
    }
    print_status(session);
    Ok(())
}

pub async fn retrieve(session: &Session<HttpGateway>, question: &str) -> Result<()> {
    let chunks = session
        .retrieve(question)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if chunks.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    for (i, chunk) in chunks.iter().enumerate() {
        println!("{}. {}:{}-{}", i + 1, chunk.file_path, chunk.start_line, chunk.end_line);
        for line in chunk.content.lines() {
            println!("   {}", line);
        }
        println!();
    }
    Ok(())
}

fn print_status(session: &Session<HttpGateway>) {
    let Some(status) = session.status() else {
        println!("Status unknown");
        return;
    };

    println!("Corpus status");
    println!("  repositories:      {}", status.repository_count);
    println!("  documents:         {}", status.document_count);
    println!("  chunks:            {}", status.chunks_total);
    println!("  with embedding:    {}", status.chunks_with_embedding);
    println!("  missing embedding: {}", status.chunks_missing_embedding);
    println!("  coverage:          {:.1}%", status.embedding_coverage() * 100.0);
    if let Some(warning) = session.status_warning() {
        println!("  warning:           {}", warning);
    }
}
