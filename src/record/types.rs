use crate::transfer::ResumeToken;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Unsubmitted,
    Queued,
    Submitting,
    Finalising,
    Success,
    Error,
    Processing,
    Processed,
}

impl FileStatus {
    /// A record holds transfer capacity while its client is bound.
    pub fn is_active(&self) -> bool {
        matches!(self, FileStatus::Submitting | FileStatus::Finalising)
    }

    /// Metadata is frozen once transfer has started or completed.
    pub fn is_transfer_locked(&self) -> bool {
        !matches!(self, FileStatus::Unsubmitted | FileStatus::Queued)
    }

    pub fn is_removable(&self) -> bool {
        matches!(
            self,
            FileStatus::Unsubmitted | FileStatus::Queued | FileStatus::Error
        )
    }

    /// Eligible for (re-)queueing via QueueAll: everything except a terminal
    /// success or a record already mid-transfer.
    pub fn is_queueable(&self) -> bool {
        !matches!(
            self,
            FileStatus::Success | FileStatus::Submitting | FileStatus::Finalising
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Video,
    Audio,
    Image,
    Other,
}

impl FileKind {
    /// Classify by file name extension. Selection-time helper; the queue
    /// itself never inspects file contents.
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit('.')
            .next()
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "mpeg" | "mpg" => FileKind::Video,
            "mp3" | "wav" | "flac" | "ogg" | "m4a" | "aac" => FileKind::Audio,
            "jpg" | "jpeg" | "png" | "gif" | "tiff" | "bmp" | "webp" => FileKind::Image,
            _ => FileKind::Other,
        }
    }

    /// Static capability table: which processing operations a kind supports.
    pub fn allowed_operations(&self) -> &'static [ProcessingKind] {
        match self {
            FileKind::Video => &[ProcessingKind::Thumbnail, ProcessingKind::Transcription],
            FileKind::Audio => &[ProcessingKind::Transcription],
            FileKind::Image => &[ProcessingKind::Thumbnail],
            FileKind::Other => &[],
        }
    }

    pub fn supports(&self, kind: ProcessingKind) -> bool {
        self.allowed_operations().contains(&kind)
    }
}

/// Classification tag a user can attach to a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    AudioFile,
    Code,
    DataDictionaryCodeBook,
    DataDictionaryOther,
    DataFile,
    DisseminationCopy,
    ImageFile,
    Methodology,
    OriginalMetadata,
    PreservationCopy,
    Publication,
    Report,
    SupplementaryFile,
    Thumbnail,
    TranscriptOrDerivedFile,
    TypeRegistryValue,
    VideoFile,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessingKind {
    #[serde(rename = "create_thumbnail")]
    Thumbnail,
    #[serde(rename = "transcribe_audio")]
    Transcription,
}

/// Configuration for one requested post-upload operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingConfig {
    Thumbnail {
        /// Which captured frame to use, once the user has picked one.
        frame_index: Option<u32>,
    },
    Transcription {
        source_language: Option<String>,
        diarisation: bool,
        speakers: Option<u32>,
    },
}

impl ProcessingConfig {
    pub fn kind(&self) -> ProcessingKind {
        match self {
            ProcessingConfig::Thumbnail { .. } => ProcessingKind::Thumbnail,
            ProcessingConfig::Transcription { .. } => ProcessingKind::Transcription,
        }
    }
}

/// Sub-status of a processing stage, driven by the external service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingRequest {
    pub config: ProcessingConfig,
    pub stage: StageStatus,
}

impl ProcessingRequest {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            config,
            stage: StageStatus::Pending,
        }
    }

    pub fn kind(&self) -> ProcessingKind {
        self.config.kind()
    }
}

/// One selected file and everything the queue knows about it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub name: String,
    pub size_bytes: u64,
    pub kind: FileKind,
    pub status: FileStatus,
    pub progress_percent: u8,
    pub private: bool,
    pub role: Option<FileRole>,
    pub processing: Vec<ProcessingRequest>,
    pub resume_token: Option<ResumeToken>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        let name = name.into();
        let kind = FileKind::from_name(&name);
        let now = chrono::Utc::now().timestamp();

        Self {
            name,
            size_bytes,
            kind,
            status: FileStatus::Unsubmitted,
            progress_percent: 0,
            private: false,
            role: None,
            processing: Vec::new(),
            resume_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn with_role(mut self, role: FileRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_processing(mut self, requests: Vec<ProcessingRequest>) -> Self {
        self.processing = requests;
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp();
    }

    /// All requested processing stages have reached a terminal sub-status.
    pub fn processing_finished(&self) -> bool {
        !self.processing.is_empty() && self.processing.iter().all(|r| r.stage.is_terminal())
    }
}
