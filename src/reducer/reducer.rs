use crate::record::{FileRecord, FileStatus, FileStore};
use crate::reducer::actions::{Action, MetaPatch};
use crate::reducer::error::{ReducerError, ReducerResult};

/// Apply one action to the store. This is the single writer: every status
/// transition in the system funnels through here, which keeps the store free
/// of concurrent mutation and makes the transition rules testable in
/// isolation.
///
/// User-driven actions that violate a rule return an error and leave the
/// store untouched. Protocol-driven actions arriving late (the record was
/// removed or already moved on) are treated as benign races and ignored.
pub fn apply(store: &mut FileStore, action: Action) -> ReducerResult<()> {
    match action {
        Action::AddFiles(records) => add_files(store, records),

        Action::RemoveFile(name) => {
            match store.get(&name) {
                Some(record) if !record.status.is_removable() => {
                    return Err(ReducerError::RemovalDenied {
                        name,
                        status: record.status,
                    });
                }
                Some(_) => {
                    store.remove(&name);
                    tracing::debug!(file = %name, "record removed");
                }
                // Already removed by a concurrent action.
                None => {}
            }
            Ok(())
        }

        Action::QueueAll => {
            let eligible: Vec<String> = store
                .iter()
                .filter(|r| r.status.is_queueable())
                .map(|r| r.name.clone())
                .collect();

            for name in eligible {
                store.patch(&name, |r| {
                    r.status = FileStatus::Queued;
                    r.progress_percent = 0;
                    r.resume_token = None;
                });
            }
            Ok(())
        }

        Action::RetryFile(name) => {
            match store.get(&name) {
                Some(record) if record.status != FileStatus::Error => {
                    return Err(ReducerError::RetryDenied {
                        name,
                        status: record.status,
                    });
                }
                Some(_) => {
                    // Token and progress stay: the next transfer resumes from
                    // the confirmed offset rather than restarting.
                    store.patch(&name, |r| r.status = FileStatus::Queued);
                    tracing::info!(file = %name, "re-queued for retry");
                }
                None => {}
            }
            Ok(())
        }

        Action::SetMeta { name, patch } => set_meta(store, name, patch),

        Action::BeginTransfer { name, resume_token } => {
            match store.get(&name).map(|r| r.status) {
                Some(FileStatus::Queued) => {
                    let fresh = resume_token.is_none();
                    store.patch(&name, |r| {
                        r.status = FileStatus::Submitting;
                        r.resume_token = resume_token;
                        if fresh {
                            r.progress_percent = 0;
                        }
                    });
                    tracing::debug!(file = %name, fresh, "transfer started");
                }
                Some(status) => {
                    tracing::warn!(file = %name, ?status, "BeginTransfer on non-queued record ignored")
                }
                None => {}
            }
            Ok(())
        }

        Action::SessionNegotiated { name, token } => {
            store.patch(&name, |r| {
                if r.status == FileStatus::Submitting {
                    r.resume_token = Some(token);
                }
            });
            Ok(())
        }

        Action::Progress { name, percent } => {
            store.patch(&name, |r| {
                if r.status == FileStatus::Submitting {
                    // Monotonic for the life of a token; late or re-synced
                    // events never move the bar backwards.
                    r.progress_percent = r.progress_percent.max(percent.min(100));
                }
            });
            Ok(())
        }

        Action::Finalising(name) => {
            store.patch(&name, |r| {
                if r.status == FileStatus::Submitting {
                    r.status = FileStatus::Finalising;
                }
            });
            Ok(())
        }

        Action::TransferSucceeded(name) => {
            store.patch(&name, |r| {
                if r.status.is_active() {
                    r.status = if r.processing.is_empty() {
                        FileStatus::Success
                    } else {
                        FileStatus::Processing
                    };
                    r.progress_percent = 100;
                    r.resume_token = None;
                    tracing::info!(file = %r.name, status = ?r.status, "upload finished");
                }
            });
            Ok(())
        }

        Action::TransferFailed { name, error } => {
            store.patch(&name, |r| {
                if r.status.is_active() {
                    // Token preserved so a retry can resume.
                    r.status = FileStatus::Error;
                    tracing::warn!(file = %r.name, error = %error, "upload failed");
                }
            });
            Ok(())
        }

        Action::ProcessingUpdate { name, kind, stage } => {
            store.patch(&name, |r| {
                if r.status != FileStatus::Processing {
                    tracing::warn!(file = %r.name, status = ?r.status, "processing update on non-processing record ignored");
                    return;
                }
                if let Some(request) = r.processing.iter_mut().find(|p| p.kind() == kind) {
                    request.stage = stage;
                }
                if r.processing_finished() {
                    r.status = FileStatus::Processed;
                    tracing::info!(file = %r.name, "all processing stages finished");
                }
            });
            Ok(())
        }

        Action::Reset => {
            store.clear();
            Ok(())
        }
    }
}

fn add_files(store: &mut FileStore, records: Vec<FileRecord>) -> ReducerResult<()> {
    // Validate the whole batch before touching the store: the action is
    // atomic, one bad record rejects them all.
    let mut seen = std::collections::HashSet::new();
    for record in &records {
        if store.contains(&record.name) || !seen.insert(record.name.clone()) {
            return Err(ReducerError::DuplicateName(record.name.clone()));
        }
        for request in &record.processing {
            if !record.kind.supports(request.kind()) {
                return Err(ReducerError::IncompatibleProcessing {
                    name: record.name.clone(),
                    file_kind: record.kind,
                    kind: request.kind(),
                });
            }
        }
    }

    for mut record in records {
        record.status = FileStatus::Unsubmitted;
        record.progress_percent = 0;
        record.resume_token = None;
        tracing::debug!(file = %record.name, size = record.size_bytes, "record added");
        store.upsert(record);
    }
    Ok(())
}

fn set_meta(store: &mut FileStore, name: String, patch: MetaPatch) -> ReducerResult<()> {
    let Some(record) = store.get(&name) else {
        // Removed concurrently; nothing to patch.
        return Ok(());
    };

    if record.status.is_transfer_locked() {
        return Err(ReducerError::TransferLocked {
            name,
            status: record.status,
        });
    }

    if let MetaPatch::Processing(requests) = &patch {
        for request in requests {
            if !record.kind.supports(request.kind()) {
                return Err(ReducerError::IncompatibleProcessing {
                    name,
                    file_kind: record.kind,
                    kind: request.kind(),
                });
            }
        }
    }

    store.patch(&name, |r| match patch {
        MetaPatch::Private(private) => r.private = private,
        MetaPatch::Role(role) => r.role = role,
        MetaPatch::Processing(requests) => r.processing = requests,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FileRole, ProcessingConfig, ProcessingKind, ProcessingRequest, StageStatus};
    use crate::transfer::ResumeToken;

    fn transcription() -> ProcessingRequest {
        ProcessingRequest::new(ProcessingConfig::Transcription {
            source_language: Some("en".into()),
            diarisation: true,
            speakers: Some(2),
        })
    }

    fn thumbnail() -> ProcessingRequest {
        ProcessingRequest::new(ProcessingConfig::Thumbnail { frame_index: None })
    }

    fn store_with_status(name: &str, status: FileStatus) -> FileStore {
        let mut store = FileStore::new();
        let mut record = FileRecord::new(name, 1024);
        record.status = status;
        store.upsert(record);
        store
    }

    #[test]
    fn test_add_files() {
        let mut store = FileStore::new();
        apply(
            &mut store,
            Action::AddFiles(vec![
                FileRecord::new("a.mp4", 100),
                FileRecord::new("b.wav", 200),
            ]),
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        assert!(store
            .iter()
            .all(|r| r.status == FileStatus::Unsubmitted));
    }

    #[test]
    fn test_duplicate_name_rejects_whole_batch() {
        let mut store = FileStore::new();
        apply(&mut store, Action::AddFiles(vec![FileRecord::new("a.mp4", 100)])).unwrap();

        let result = apply(
            &mut store,
            Action::AddFiles(vec![
                FileRecord::new("fresh.wav", 50),
                FileRecord::new("a.mp4", 100),
            ]),
        );

        assert_eq!(result, Err(ReducerError::DuplicateName("a.mp4".into())));
        // Atomic: the non-colliding record was not added either.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_within_batch_rejected() {
        let mut store = FileStore::new();
        let result = apply(
            &mut store,
            Action::AddFiles(vec![
                FileRecord::new("a.mp4", 100),
                FileRecord::new("a.mp4", 100),
            ]),
        );
        assert_eq!(result, Err(ReducerError::DuplicateName("a.mp4".into())));
        assert!(store.is_empty());
    }

    #[test]
    fn test_incompatible_processing_rejected_at_selection() {
        let mut store = FileStore::new();
        // Thumbnails are not an audio capability.
        let record = FileRecord::new("voice.wav", 100).with_processing(vec![thumbnail()]);

        let result = apply(&mut store, Action::AddFiles(vec![record]));
        assert!(matches!(
            result,
            Err(ReducerError::IncompatibleProcessing { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_queue_all_skips_success_and_submitting() {
        let mut store = FileStore::new();
        for (name, status) in [
            ("a.bin", FileStatus::Unsubmitted),
            ("b.bin", FileStatus::Error),
            ("c.bin", FileStatus::Success),
            ("d.bin", FileStatus::Submitting),
        ] {
            let mut record = FileRecord::new(name, 100);
            record.status = status;
            store.upsert(record);
        }

        apply(&mut store, Action::QueueAll).unwrap();

        assert_eq!(store.get("a.bin").unwrap().status, FileStatus::Queued);
        assert_eq!(store.get("b.bin").unwrap().status, FileStatus::Queued);
        assert_eq!(store.get("c.bin").unwrap().status, FileStatus::Success);
        assert_eq!(store.get("d.bin").unwrap().status, FileStatus::Submitting);
    }

    #[test]
    fn test_queue_all_requeues_processing_and_processed() {
        let mut store = FileStore::new();
        for (name, status) in [
            ("a.mp4", FileStatus::Processing),
            ("b.mp4", FileStatus::Processed),
        ] {
            let mut record = FileRecord::new(name, 100);
            record.status = status;
            record.progress_percent = 100;
            store.upsert(record);
        }

        apply(&mut store, Action::QueueAll).unwrap();

        for name in ["a.mp4", "b.mp4"] {
            let record = store.get(name).unwrap();
            assert_eq!(record.status, FileStatus::Queued);
            assert_eq!(record.progress_percent, 0);
            assert!(record.resume_token.is_none());
        }
    }

    #[test]
    fn test_queue_all_is_idempotent() {
        let mut store = FileStore::new();
        store.upsert(FileRecord::new("a.bin", 100));
        let mut done = FileRecord::new("b.bin", 100);
        done.status = FileStatus::Success;
        done.progress_percent = 100;
        store.upsert(done);

        apply(&mut store, Action::QueueAll).unwrap();
        let once = store.list();
        apply(&mut store, Action::QueueAll).unwrap();
        let twice = store.list();

        // Ignore updated_at drift; compare the fields the action governs.
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.status, b.status);
            assert_eq!(a.progress_percent, b.progress_percent);
            assert_eq!(a.resume_token, b.resume_token);
        }
    }

    #[test]
    fn test_queue_all_clears_token_retry_preserves_it() {
        let token = ResumeToken::generate();
        let mut store = store_with_status("a.bin", FileStatus::Error);
        store.patch("a.bin", |r| r.resume_token = Some(token.clone()));

        apply(&mut store, Action::RetryFile("a.bin".into())).unwrap();
        assert_eq!(store.get("a.bin").unwrap().status, FileStatus::Queued);
        assert_eq!(store.get("a.bin").unwrap().resume_token, Some(token));

        // A later QueueAll starts everything from scratch.
        apply(&mut store, Action::QueueAll).unwrap();
        assert!(store.get("a.bin").unwrap().resume_token.is_none());
        assert_eq!(store.get("a.bin").unwrap().progress_percent, 0);
    }

    #[test]
    fn test_retry_denied_unless_error() {
        let mut store = store_with_status("a.bin", FileStatus::Submitting);
        let result = apply(&mut store, Action::RetryFile("a.bin".into()));
        assert!(matches!(result, Err(ReducerError::RetryDenied { .. })));
    }

    #[test]
    fn test_set_meta_while_unsubmitted() {
        let mut store = store_with_status("a.mp4", FileStatus::Unsubmitted);

        apply(
            &mut store,
            Action::SetMeta {
                name: "a.mp4".into(),
                patch: MetaPatch::Private(true),
            },
        )
        .unwrap();
        apply(
            &mut store,
            Action::SetMeta {
                name: "a.mp4".into(),
                patch: MetaPatch::Role(Some(FileRole::VideoFile)),
            },
        )
        .unwrap();

        let record = store.get("a.mp4").unwrap();
        assert!(record.private);
        assert_eq!(record.role, Some(FileRole::VideoFile));
    }

    #[test]
    fn test_set_meta_on_success_is_rejected_unchanged() {
        let mut store = store_with_status("a.mp4", FileStatus::Success);
        store.patch("a.mp4", |r| r.role = Some(FileRole::DataFile));

        let result = apply(
            &mut store,
            Action::SetMeta {
                name: "a.mp4".into(),
                patch: MetaPatch::Role(Some(FileRole::Publication)),
            },
        );

        assert!(matches!(result, Err(ReducerError::TransferLocked { .. })));
        assert_eq!(store.get("a.mp4").unwrap().role, Some(FileRole::DataFile));
    }

    #[test]
    fn test_set_meta_missing_record_is_silent() {
        let mut store = FileStore::new();
        apply(
            &mut store,
            Action::SetMeta {
                name: "ghost.bin".into(),
                patch: MetaPatch::Private(true),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_remove_rules() {
        for status in [
            FileStatus::Unsubmitted,
            FileStatus::Queued,
            FileStatus::Error,
        ] {
            let mut store = store_with_status("a.bin", status);
            apply(&mut store, Action::RemoveFile("a.bin".into())).unwrap();
            assert!(store.is_empty());
        }

        for status in [
            FileStatus::Submitting,
            FileStatus::Finalising,
            FileStatus::Success,
            FileStatus::Processing,
        ] {
            let mut store = store_with_status("a.bin", status);
            let result = apply(&mut store, Action::RemoveFile("a.bin".into()));
            assert!(matches!(result, Err(ReducerError::RemovalDenied { .. })));
            assert_eq!(store.len(), 1);
        }

        // Missing name is a benign race.
        let mut store = FileStore::new();
        apply(&mut store, Action::RemoveFile("ghost.bin".into())).unwrap();
    }

    #[test]
    fn test_begin_transfer_from_queued_only() {
        let mut store = store_with_status("a.bin", FileStatus::Queued);
        apply(
            &mut store,
            Action::BeginTransfer {
                name: "a.bin".into(),
                resume_token: None,
            },
        )
        .unwrap();
        assert_eq!(store.get("a.bin").unwrap().status, FileStatus::Submitting);

        // Late BeginTransfer on a record that moved on is ignored.
        let mut store = store_with_status("b.bin", FileStatus::Success);
        apply(
            &mut store,
            Action::BeginTransfer {
                name: "b.bin".into(),
                resume_token: None,
            },
        )
        .unwrap();
        assert_eq!(store.get("b.bin").unwrap().status, FileStatus::Success);
    }

    #[test]
    fn test_progress_monotonic_and_submitting_only() {
        let mut store = store_with_status("a.bin", FileStatus::Submitting);

        for percent in [10, 40, 30, 99] {
            apply(
                &mut store,
                Action::Progress {
                    name: "a.bin".into(),
                    percent,
                },
            )
            .unwrap();
        }
        assert_eq!(store.get("a.bin").unwrap().progress_percent, 99);

        // Progress on a non-submitting record is a late event, ignored.
        let mut store = store_with_status("b.bin", FileStatus::Error);
        apply(
            &mut store,
            Action::Progress {
                name: "b.bin".into(),
                percent: 50,
            },
        )
        .unwrap();
        assert_eq!(store.get("b.bin").unwrap().progress_percent, 0);
    }

    #[test]
    fn test_succeeded_goes_to_processing_with_options() {
        let mut store = FileStore::new();
        let mut record = FileRecord::new("talk.mp4", 100).with_processing(vec![transcription()]);
        record.status = FileStatus::Submitting;
        record.resume_token = Some(ResumeToken::generate());
        store.upsert(record);

        apply(&mut store, Action::TransferSucceeded("talk.mp4".into())).unwrap();

        let record = store.get("talk.mp4").unwrap();
        assert_eq!(record.status, FileStatus::Processing);
        assert_eq!(record.progress_percent, 100);
        assert!(record.resume_token.is_none());
    }

    #[test]
    fn test_succeeded_without_options_is_terminal_success() {
        let mut store = store_with_status("a.bin", FileStatus::Finalising);
        apply(&mut store, Action::TransferSucceeded("a.bin".into())).unwrap();
        assert_eq!(store.get("a.bin").unwrap().status, FileStatus::Success);
    }

    #[test]
    fn test_failed_preserves_token() {
        let token = ResumeToken::generate();
        let mut store = store_with_status("a.bin", FileStatus::Submitting);
        store.patch("a.bin", |r| r.resume_token = Some(token.clone()));

        apply(
            &mut store,
            Action::TransferFailed {
                name: "a.bin".into(),
                error: "network down".into(),
            },
        )
        .unwrap();

        let record = store.get("a.bin").unwrap();
        assert_eq!(record.status, FileStatus::Error);
        assert_eq!(record.resume_token, Some(token));
    }

    #[test]
    fn test_processing_updates_drive_to_processed() {
        let mut store = FileStore::new();
        let mut record = FileRecord::new("talk.mp4", 100)
            .with_processing(vec![thumbnail(), transcription()]);
        record.status = FileStatus::Processing;
        store.upsert(record);

        apply(
            &mut store,
            Action::ProcessingUpdate {
                name: "talk.mp4".into(),
                kind: ProcessingKind::Thumbnail,
                stage: StageStatus::Completed,
            },
        )
        .unwrap();
        assert_eq!(store.get("talk.mp4").unwrap().status, FileStatus::Processing);

        apply(
            &mut store,
            Action::ProcessingUpdate {
                name: "talk.mp4".into(),
                kind: ProcessingKind::Transcription,
                stage: StageStatus::Running,
            },
        )
        .unwrap();
        assert_eq!(store.get("talk.mp4").unwrap().status, FileStatus::Processing);

        apply(
            &mut store,
            Action::ProcessingUpdate {
                name: "talk.mp4".into(),
                kind: ProcessingKind::Transcription,
                stage: StageStatus::Failed("model crashed".into()),
            },
        )
        .unwrap();
        // Every stage terminal (one failed) -> processed, with the failure
        // visible in the stage sub-status.
        let record = store.get("talk.mp4").unwrap();
        assert_eq!(record.status, FileStatus::Processed);
        assert!(matches!(
            record.processing[1].stage,
            StageStatus::Failed(_)
        ));
    }

    #[test]
    fn test_reset_clears_store() {
        let mut store = store_with_status("a.bin", FileStatus::Success);
        apply(&mut store, Action::Reset).unwrap();
        assert!(store.is_empty());
    }
}
