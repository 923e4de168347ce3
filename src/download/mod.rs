pub mod downloader;

pub use downloader::{DownloadError, DownloadSummary, Downloader};
