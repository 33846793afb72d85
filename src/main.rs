use anyhow::Result;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use uploadqueue::{
    FileRecord, FileRole, FileStatus, ManagerConfig, MemoryEndpoint, ProcessingConfig,
    ProcessingKind, ProcessingRequest, StageStatus, UploadManager,
};

fn payload(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 256) as u8).collect::<Vec<u8>>())
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("UploadQueue - resumable upload queue demo");
    println!("=========================================\n");

    // A lossy link: roughly one chunk in twenty goes missing.
    let endpoint = Arc::new(MemoryEndpoint::new().with_loss_rate(0.05));
    let manager = UploadManager::new(
        endpoint,
        ManagerConfig {
            concurrency_ceiling: 3,
            chunk_size: 4 * 1024,
        },
    );

    let interview = FileRecord::new("interview.mp4", 64 * 1024)
        .with_role(FileRole::VideoFile)
        .with_processing(vec![ProcessingRequest::new(
            ProcessingConfig::Transcription {
                source_language: Some("nl".into()),
                diarisation: true,
                speakers: Some(2),
            },
        )]);

    manager.add_files(vec![
        (interview, payload(64 * 1024)),
        (FileRecord::new("survey.csv", 16 * 1024), payload(16 * 1024)),
        (
            FileRecord::new("site-photo.jpg", 32 * 1024).with_private(true),
            payload(32 * 1024),
        ),
        (FileRecord::new("notes.txt", 2 * 1024), payload(2 * 1024)),
        (FileRecord::new("audio.wav", 48 * 1024), payload(48 * 1024)),
    ])?;

    println!("✓ Selected {} files (ceiling: {})", manager.list().len(), manager.ceiling());

    manager.queue_all()?;
    manager.wait_quiescent(Duration::from_secs(10)).await;

    // Failed transfers keep their resume token; each retry continues from
    // the far end's confirmed offset instead of resending from zero.
    for round in 1..=10 {
        let errored: Vec<String> = manager
            .list()
            .into_iter()
            .filter(|r| r.status == FileStatus::Error)
            .map(|r| r.name)
            .collect();
        if errored.is_empty() {
            break;
        }
        println!("✗ {} transfer(s) hit the lossy link, resuming (round {round})", errored.len());
        for name in &errored {
            manager.retry(name)?;
        }
        manager.wait_quiescent(Duration::from_secs(10)).await;
    }

    println!("✓ All transfers settled:\n");
    for record in manager.list() {
        println!(
            "  {:<16} {:>8} bytes  {:?} ({}%)",
            record.name, record.size_bytes, record.status, record.progress_percent
        );
    }

    // The external processing service reports transcription stages.
    manager.processing_update(
        "interview.mp4",
        ProcessingKind::Transcription,
        StageStatus::Running,
    )?;
    manager.processing_update(
        "interview.mp4",
        ProcessingKind::Transcription,
        StageStatus::Completed,
    )?;

    let record = manager
        .get("interview.mp4")
        .ok_or_else(|| anyhow::anyhow!("interview.mp4 missing from store"))?;
    println!("\n✓ interview.mp4 after processing: {:?}", record.status);

    Ok(())
}
