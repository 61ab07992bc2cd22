use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Opaque key-value payload carried through the lifecycle untouched
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The transformation that produced an artifact. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Merge,
    Split,
    Compress,
    ImageToPdf,
    PdfToImage,
    Reorder,
    WordToExcel,
    ExcelToWord,
    DocToPdf,
    ExcelToCsv,
    CsvToExcel,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Merge => "merge",
            Operation::Split => "split",
            Operation::Compress => "compress",
            Operation::ImageToPdf => "image-to-pdf",
            Operation::PdfToImage => "pdf-to-image",
            Operation::Reorder => "reorder",
            Operation::WordToExcel => "word-to-excel",
            Operation::ExcelToWord => "excel-to-word",
            Operation::DocToPdf => "doc-to-pdf",
            Operation::ExcelToCsv => "excel-to-csv",
            Operation::CsvToExcel => "csv-to-excel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "merge" => Operation::Merge,
            "split" => Operation::Split,
            "compress" => Operation::Compress,
            "image-to-pdf" => Operation::ImageToPdf,
            "pdf-to-image" => Operation::PdfToImage,
            "reorder" => Operation::Reorder,
            "word-to-excel" => Operation::WordToExcel,
            "excel-to-word" => Operation::ExcelToWord,
            "doc-to-pdf" => Operation::DocToPdf,
            "excel-to-csv" => Operation::ExcelToCsv,
            "csv-to-excel" => Operation::CsvToExcel,
            _ => return None,
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(FileStatus::Processing),
            "completed" => Some(FileStatus::Completed),
            "failed" => Some(FileStatus::Failed),
            _ => None,
        }
    }
}

/// A processed-file record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    pub id: String,
    pub original_name: String,
    pub processed_name: String,
    pub file_size: u64,
    pub operation: Operation,
    pub status: FileStatus,
    /// `None` until the artifact is downloadable
    pub download_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
}

impl ProcessedFile {
    pub fn is_expired_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at < as_of
    }
}

/// Insert payload for a record; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFileDraft {
    pub original_name: String,
    pub processed_name: String,
    pub file_size: u64,
    pub operation: Operation,
    #[serde(default)]
    pub status: Option<FileStatus>,
    #[serde(default)]
    pub download_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Partial update. Only the mutable fields are representable, so identity,
/// size, creation and expiry stamps can never be overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFileUpdate {
    pub original_name: Option<String>,
    pub processed_name: Option<String>,
    pub status: Option<FileStatus>,
    pub download_url: Option<String>,
    pub metadata: Option<Metadata>,
}

impl ProcessedFileUpdate {
    pub fn apply_to(self, file: &mut ProcessedFile) {
        if let Some(v) = self.original_name {
            file.original_name = v;
        }
        if let Some(v) = self.processed_name {
            file.processed_name = v;
        }
        if let Some(v) = self.status {
            file.status = v;
        }
        if let Some(v) = self.download_url {
            file.download_url = Some(v);
        }
        if let Some(v) = self.metadata {
            file.metadata = Some(v);
        }
    }
}

/// What callers get back after an artifact is registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicHandle {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
}
