//! Turning a candidate id into subtitle bytes: detail page, download link,
//! zip archive, entry.

use crate::error::{SubsceneError, SubsceneResult};
use crate::fetcher::PageFetcher;
use crate::language;
use crate::types::{CandidateId, RetrieveOutcome, SubtitleFile};
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const DOWNLOAD_BLOCK: &str = "<div class=\"download\">";
const DEFAULT_FORMAT: &str = "srt";

/// An unpacked archive member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Retrieve the subtitle behind a candidate id
pub async fn retrieve(fetcher: &PageFetcher, id: &str, fallback_language: &str) -> RetrieveOutcome {
    let candidate = match CandidateId::decode(id) {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!("{}", e);
            return RetrieveOutcome::Failed(e);
        }
    };

    info!("Retrieving subtitle from {}", candidate.path);

    let detail = match fetcher.fetch_page(&candidate.path).await {
        Ok(Some(html)) => html,
        Ok(None) => return RetrieveOutcome::NotFound,
        Err(e) => {
            warn!("Detail page {} failed: {}", candidate.path, e);
            return RetrieveOutcome::Failed(e);
        }
    };

    let Some(link) = extract_download_link(&detail) else {
        debug!("No download block on {}", candidate.path);
        return RetrieveOutcome::NotFound;
    };

    debug!("Downloading subtitle archive from {}", link);
    let download = match fetcher.fetch_bytes(&link).await {
        Ok(Some(download)) => download,
        Ok(None) => return RetrieveOutcome::NotFound,
        Err(e) => {
            warn!("Archive download {} failed: {}", link, e);
            return RetrieveOutcome::Failed(e);
        }
    };

    if !download.content_type.contains("zip") {
        info!("Download is {}, not an archive", download.content_type);
        return RetrieveOutcome::NotFound;
    }

    match unpack_archive(download.bytes) {
        Ok(entry) => {
            info!("Unpacked {} ({} bytes)", entry.name, entry.bytes.len());
            RetrieveOutcome::Found(SubtitleFile {
                format: Some(format_from_name(&entry.name)),
                language: Some(language::to_iso(&candidate.language, fallback_language)),
                bytes: entry.bytes,
            })
        }
        Err(SubsceneError::EmptyArchive) => RetrieveOutcome::NotFound,
        Err(e) => {
            warn!("Could not unpack archive: {}", e);
            RetrieveOutcome::Failed(e)
        }
    }
}

/// Href of the first link in the first download block.
///
/// Found by plain string search since the block is not always well formed.
pub fn extract_download_link(html: &str) -> Option<String> {
    let start = html.find(DOWNLOAD_BLOCK)?;
    let block = &html[start..];
    let block = match block.find("</div>") {
        Some(end) => &block[..end],
        None => block,
    };

    let anchor = &block[block.find("<a ")?..];
    let href_start = anchor.find("href=\"")? + "href=\"".len();
    let href_len = anchor[href_start..].find('"')?;
    let href = anchor[href_start..href_start + href_len].trim();

    if href.is_empty() {
        return None;
    }
    Some(href.replace("&amp;", "&"))
}

/// Index of the entry to extract among `names`.
///
/// With several entries the first whose name mentions `utf` wins, otherwise
/// the first entry.
pub fn select_entry<S: AsRef<str>>(names: &[S]) -> Option<usize> {
    if names.is_empty() {
        return None;
    }
    if names.len() > 1
        && let Some(index) = names
            .iter()
            .position(|name| name.as_ref().to_lowercase().contains("utf"))
    {
        return Some(index);
    }
    Some(0)
}

/// Open a zip archive and read the selected subtitle entry
pub fn unpack_archive(bytes: Vec<u8>) -> SubsceneResult<ArchiveEntry> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut files = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if !entry.is_dir() {
            files.push((index, entry.name().to_string()));
        }
    }

    let names: Vec<&str> = files.iter().map(|(_, name)| name.as_str()).collect();
    let selected = select_entry(&names).ok_or(SubsceneError::EmptyArchive)?;
    let (index, name) = &files[selected];

    let mut entry = archive.by_index(*index)?;
    let mut buffer = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
    entry.read_to_end(&mut buffer)?;

    Ok(ArchiveEntry {
        name: name.clone(),
        bytes: buffer,
    })
}

/// Lowercase extension of an entry name, `srt` when there is none
pub fn format_from_name(name: &str) -> String {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file_name.rsplit_once('.') {
        Some((_, extension)) if !extension.trim().is_empty() => extension.trim().to_lowercase(),
        _ => DEFAULT_FORMAT.to_string(),
    }
}
