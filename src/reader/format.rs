// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Reading module selection
//!
//! Each publication opens in one of four reading modules. The choice is made
//! from the acquisition link's media type when we have it, otherwise from the
//! downloaded file's extension.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reading module a publication opens in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum ReaderFormat {
    /// Reflowable or fixed-layout EPUB
    Epub,
    /// Zipped comic pages (CBZ)
    ComicArchive,
    /// PDF document
    Pdf,
    /// Readium audiobook manifest or packaged audio
    Audiobook,
}

impl ReaderFormat {
    /// Select from a MIME type, ignoring parameters and case
    ///
    /// `application/epub+zip; profile=foo` is an EPUB.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/epub+zip" => Some(ReaderFormat::Epub),
            "application/vnd.comicbook+zip" | "application/x-cbz" => {
                Some(ReaderFormat::ComicArchive)
            }
            "application/pdf" | "application/pdf+lcp" => Some(ReaderFormat::Pdf),
            "application/audiobook+json"
            | "application/audiobook+zip"
            | "application/audiobook+lcp"
            | "audio/mp4"
            | "audio/mpeg" => Some(ReaderFormat::Audiobook),
            _ => None,
        }
    }

    /// Select from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();

        match extension.as_str() {
            "epub" => Some(ReaderFormat::Epub),
            "cbz" => Some(ReaderFormat::ComicArchive),
            "pdf" | "lcpdf" => Some(ReaderFormat::Pdf),
            "audiobook" | "lcpa" | "m4b" | "mp3" => Some(ReaderFormat::Audiobook),
            _ => None,
        }
    }

    /// Canonical media type for this module
    pub fn media_type(&self) -> &'static str {
        match self {
            ReaderFormat::Epub => "application/epub+zip",
            ReaderFormat::ComicArchive => "application/vnd.comicbook+zip",
            ReaderFormat::Pdf => "application/pdf",
            ReaderFormat::Audiobook => "application/audiobook+json",
        }
    }

    /// Whether an LCP-protected variant of this format exists
    pub fn is_drm_capable(&self) -> bool {
        !matches!(self, ReaderFormat::ComicArchive)
    }
}

impl std::fmt::Display for ReaderFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReaderFormat::Epub => "EPUB",
            ReaderFormat::ComicArchive => "CBZ",
            ReaderFormat::Pdf => "PDF",
            ReaderFormat::Audiobook => "Audiobook",
        };
        f.write_str(name)
    }
}
