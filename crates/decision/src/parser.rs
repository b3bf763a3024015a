//! Release title parser
//!
//! `parse` is a pure function from a scene title to its quality attributes.
//! It never fails: unrecognized markers degrade to `Unknown`, and an empty
//! title produces an all-default record. Every pattern is compiled once and
//! shared.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Video resolution parsed from a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "2160p")]
    R2160p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "480p")]
    R480p,
    #[serde(rename = "unknown")]
    #[default]
    Unknown,
}

impl Resolution {
    /// Label used in delay-profile quality keys and log output
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::R2160p => "2160p",
            Resolution::R1080p => "1080p",
            Resolution::R720p => "720p",
            Resolution::R480p => "480p",
            Resolution::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Source medium of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    BluRay,
    WebDl,
    WebRip,
    Hdtv,
    HdRip,
    DvdRip,
    Dvd,
    Cam,
    Telesync,
    Screener,
    Pdtv,
    Dsr,
    R5,
    #[default]
    Unknown,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::BluRay => "bluray",
            Source::WebDl => "webdl",
            Source::WebRip => "webrip",
            Source::Hdtv => "hdtv",
            Source::HdRip => "hdrip",
            Source::DvdRip => "dvdrip",
            Source::Dvd => "dvd",
            Source::Cam => "cam",
            Source::Telesync => "telesync",
            Source::Screener => "screener",
            Source::Pdtv => "pdtv",
            Source::Dsr => "dsr",
            Source::R5 => "r5",
            Source::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Video codec, stored as the canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    X264,
    X265,
    Av1,
    Vp9,
    Xvid,
    Divx,
    Mpeg2,
    #[default]
    Unknown,
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Codec::X264 => "x264",
            Codec::X265 => "x265",
            Codec::Av1 => "AV1",
            Codec::Vp9 => "VP9",
            Codec::Xvid => "XviD",
            Codec::Divx => "DivX",
            Codec::Mpeg2 => "MPEG2",
            Codec::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// HDR format ladder, from richest to none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HdrFormat {
    DvHdr10Plus,
    Dv,
    Hdr10Plus,
    Hdr10,
    Hdr,
    Hlg,
    Pq,
    #[default]
    Sdr,
}

/// Audio codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    TrueHd,
    DtsHdMa,
    DtsHd,
    DtsX,
    Dts,
    Eac3,
    Ac3,
    Aac,
    Flac,
    Opus,
    Mp3,
    Pcm,
    #[default]
    Unknown,
}

/// Audio attributes: codec, channel layout, Atmos modifier
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioAttributes {
    pub codec: AudioCodec,
    pub channels: Option<String>,
    pub atmos: bool,
}

/// TV numbering extras
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TvAttributes {
    /// A season is named without any episode numbers
    pub is_season_pack: bool,
    pub is_complete_series: bool,
    pub season_count: u32,
    pub seasons: Vec<u16>,
    pub episodes: Vec<u16>,
    pub absolute_episode: Option<u32>,
}

/// Parsed view of a release title. Derivable purely from the title.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseAttributes {
    pub resolution: Resolution,
    pub source: Source,
    pub codec: Codec,
    pub hdr: HdrFormat,
    pub audio: AudioAttributes,
    pub release_group: Option<String>,
    pub streaming_service: Option<String>,
    pub edition: Option<String>,
    pub languages: Vec<String>,
    pub is_remux: bool,
    pub is_repack: bool,
    pub is_proper: bool,
    pub is_3d: bool,
    pub tv: TvAttributes,
    pub size_bytes: Option<i64>,
}

static EXPLICIT_RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160|1080|720|480)p\b").unwrap());
static UHD_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(4k|uhd)\b").unwrap());
static HD_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhd\b").unwrap());
static SD_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsd\b").unwrap());

// Source vocabulary in longest-match-first order; the first hit wins.
static SOURCE_PATTERNS: Lazy<Vec<(Regex, Source)>> = Lazy::new(|| {
    let table: &[(&str, Source)] = &[
        (r"(?i)\bweb[-_. ]?dl\b", Source::WebDl),
        (r"(?i)\bweb[-_. ]?rip\b", Source::WebRip),
        (r"(?i)\b(blu-?ray|bd-?rip|br-?rip|bdmv|bd25|bd50)\b", Source::BluRay),
        (r"(?i)\bhdtv\b", Source::Hdtv),
        (r"(?i)\bhd-?rip\b", Source::HdRip),
        (r"(?i)\bdvd-?rip\b", Source::DvdRip),
        (r"(?i)\b(dvd|dvd5|dvd9|ntsc|pal)\b", Source::Dvd),
        (r"(?i)\b(hd-?cam|cam-?rip|cam)\b", Source::Cam),
        (r"(?i)\b(hd-?ts|telesync|ts)\b", Source::Telesync),
        (r"(?i)\b(dvd-?scr|bd-?scr|screener|scr)\b", Source::Screener),
        (r"(?i)\bpdtv\b", Source::Pdtv),
        (r"(?i)\bdsr\b", Source::Dsr),
        (r"(?i)\br5\b", Source::R5),
        // bare WEB maps to WEB-DL
        (r"(?i)\bweb\b", Source::WebDl),
    ];
    table
        .iter()
        .map(|(pattern, source)| (Regex::new(pattern).unwrap(), *source))
        .collect()
});

static CODEC_PATTERNS: Lazy<Vec<(Regex, Codec)>> = Lazy::new(|| {
    let table: &[(&str, Codec)] = &[
        (r"(?i)\b(x265|h[-. ]?265|hevc)\b", Codec::X265),
        (r"(?i)\b(x264|h[-. ]?264|avc)\b", Codec::X264),
        (r"(?i)\bav1\b", Codec::Av1),
        (r"(?i)\bvp9\b", Codec::Vp9),
        (r"(?i)\bxvid\b", Codec::Xvid),
        (r"(?i)\bdivx\b", Codec::Divx),
        (r"(?i)\bmpeg-?2\b", Codec::Mpeg2),
    ];
    table
        .iter()
        .map(|(pattern, codec)| (Regex::new(pattern).unwrap(), *codec))
        .collect()
});

static DV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(dv|dovi|dolby[ ._-]?vision)\b").unwrap());
static HDR10_PLUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhdr-?10(\+|[ ._-]?plus)").unwrap());
static HDR10: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhdr-?10\b").unwrap());
static HDR_PLAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhdr\b").unwrap());
static HLG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhlg\b").unwrap());
static PQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpq\b").unwrap());

static AUDIO_PATTERNS: Lazy<Vec<(Regex, AudioCodec)>> = Lazy::new(|| {
    let table: &[(&str, AudioCodec)] = &[
        (r"(?i)\btrue-?hd\b", AudioCodec::TrueHd),
        (r"(?i)\bdts[-. ]?hd[-. ]?ma\b", AudioCodec::DtsHdMa),
        (r"(?i)\bdts[-. ]?hd\b", AudioCodec::DtsHd),
        (r"(?i)\bdts[-. ]?x\b", AudioCodec::DtsX),
        (r"(?i)\bdts\b", AudioCodec::Dts),
        (r"(?i)(\bddp|\bdd\+|\be-?ac-?3\b)", AudioCodec::Eac3),
        (r"(?i)(\bac-?3\b|\bdd\d|\bdd\b)", AudioCodec::Ac3),
        (r"(?i)\baac\b", AudioCodec::Aac),
        (r"(?i)\bflac\b", AudioCodec::Flac),
        (r"(?i)\bopus\b", AudioCodec::Opus),
        (r"(?i)\bmp3\b", AudioCodec::Mp3),
        (r"(?i)\b(l?pcm)\b", AudioCodec::Pcm),
    ];
    table
        .iter()
        .map(|(pattern, codec)| (Regex::new(pattern).unwrap(), *codec))
        .collect()
});

// no leading boundary: channel layouts ride directly on the codec token
// ("DDP5.1", "TrueHD.7.1")
static AUDIO_CHANNELS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([1-9])[. ]([01])\b").unwrap());
static ATMOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\batmos\b").unwrap());

static REMUX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bremux\b").unwrap());
static REPACK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\brepack\b").unwrap());
static PROPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bproper\b").unwrap());
static THREE_D: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b3d\b").unwrap());

static STREAMING_SERVICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(amzn|nf|dsnp|hmax|max|hulu|atvp|pcok|pmtp|crav|stan)\b").unwrap()
});

static EDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(extended|director'?s[ ._-]?cut|unrated|theatrical|imax|remastered|criterion)\b",
    )
    .unwrap()
});

static LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(multi|vostfr|french|german|italian|spanish|nordic|hindi|korean|japanese|russian)\b",
    )
    .unwrap()
});

// TV numbering
static EPISODE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?e(\d{1,3})[-+]e?(\d{1,3})\b").unwrap());
static EPISODE_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?e(\d{1,3})\b").unwrap());
static MULTI_SEASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?-[ ._-]?s?(\d{1,2})\b").unwrap());
static SEASON_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:s|season[ ._-]?)(\d{1,2})\b").unwrap());
static COMPLETE_SERIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(complete[ ._-]?(series|collection)|all[ ._-]?seasons)\b").unwrap()
});
static ABSOLUTE_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s-\s(\d{2,4})(?:\s|\[|\(|$)").unwrap());

static GROUP_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([A-Za-z0-9][A-Za-z0-9._]{0,24})$").unwrap());
static VIDEO_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mkv|mp4|avi|m4v|wmv|mpg|mpeg)$").unwrap());

fn detect_resolution(title: &str) -> Resolution {
    if let Some(caps) = EXPLICIT_RESOLUTION.captures(title) {
        return match &caps[1] {
            "2160" => Resolution::R2160p,
            "1080" => Resolution::R1080p,
            "720" => Resolution::R720p,
            "480" => Resolution::R480p,
            _ => Resolution::Unknown,
        };
    }
    if UHD_HINT.is_match(title) {
        return Resolution::R2160p;
    }
    if HD_HINT.is_match(title) {
        return Resolution::R720p;
    }
    if SD_HINT.is_match(title) {
        return Resolution::R480p;
    }
    Resolution::Unknown
}

fn detect_source(title: &str) -> Source {
    for (pattern, source) in SOURCE_PATTERNS.iter() {
        if pattern.is_match(title) {
            return *source;
        }
    }
    Source::Unknown
}

fn detect_codec(title: &str) -> Codec {
    for (pattern, codec) in CODEC_PATTERNS.iter() {
        if pattern.is_match(title) {
            return *codec;
        }
    }
    Codec::Unknown
}

fn detect_hdr(title: &str) -> HdrFormat {
    let has_dv = DV.is_match(title);
    let has_hdr10_plus = HDR10_PLUS.is_match(title);

    if has_dv && has_hdr10_plus {
        HdrFormat::DvHdr10Plus
    } else if has_dv {
        HdrFormat::Dv
    } else if has_hdr10_plus {
        HdrFormat::Hdr10Plus
    } else if HDR10.is_match(title) {
        HdrFormat::Hdr10
    } else if HDR_PLAIN.is_match(title) {
        HdrFormat::Hdr
    } else if HLG.is_match(title) {
        HdrFormat::Hlg
    } else if PQ.is_match(title) {
        HdrFormat::Pq
    } else {
        HdrFormat::Sdr
    }
}

fn detect_audio(title: &str) -> AudioAttributes {
    let codec = AUDIO_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(title))
        .map(|(_, codec)| *codec)
        .unwrap_or_default();

    let channels = AUDIO_CHANNELS
        .captures(title)
        .map(|caps| format!("{}.{}", &caps[1], &caps[2]));

    AudioAttributes {
        codec,
        channels,
        atmos: ATMOS.is_match(title),
    }
}

fn detect_release_group(title: &str) -> Option<String> {
    let stripped = VIDEO_EXTENSION.replace(title, "");
    let caps = GROUP_SUFFIX.captures(&stripped)?;
    let group = caps[1].trim().to_string();
    // trailing source/codec tokens are not groups
    let lowered = group.to_ascii_lowercase();
    if matches!(lowered.as_str(), "dl" | "rip" | "remux" | "web") {
        return None;
    }
    Some(group)
}

fn canonical_streaming(tag: &str) -> &'static str {
    match tag.to_ascii_lowercase().as_str() {
        "amzn" => "Amazon",
        "nf" => "Netflix",
        "dsnp" => "Disney+",
        "hmax" | "max" => "Max",
        "hulu" => "Hulu",
        "atvp" => "Apple TV+",
        "pcok" => "Peacock",
        "pmtp" => "Paramount+",
        "crav" => "Crave",
        "stan" => "Stan",
        _ => "unknown",
    }
}

fn detect_languages(title: &str) -> Vec<String> {
    let mut languages: Vec<String> = LANGUAGE
        .captures_iter(title)
        .map(|caps| {
            let tag = caps[1].to_ascii_lowercase();
            let mut chars = tag.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => tag,
            }
        })
        .collect();
    languages.dedup();
    if languages.is_empty() {
        languages.push("English".to_string());
    }
    languages
}

fn detect_tv(title: &str) -> TvAttributes {
    let mut tv = TvAttributes::default();

    if COMPLETE_SERIES.is_match(title) {
        tv.is_complete_series = true;
        tv.is_season_pack = true;
    }

    if let Some(caps) = EPISODE_RANGE.captures(title) {
        let season: u16 = caps[1].parse().unwrap_or(0);
        let first: u16 = caps[2].parse().unwrap_or(0);
        let last: u16 = caps[3].parse().unwrap_or(first);
        tv.seasons = vec![season];
        if last >= first {
            tv.episodes = (first..=last).collect();
        } else {
            tv.episodes = vec![first];
        }
    } else if let Some(caps) = EPISODE_SINGLE.captures(title) {
        let season: u16 = caps[1].parse().unwrap_or(0);
        let episode: u16 = caps[2].parse().unwrap_or(0);
        tv.seasons = vec![season];
        tv.episodes = vec![episode];
    } else if let Some(caps) = MULTI_SEASON.captures(title) {
        let start: u16 = caps[1].parse().unwrap_or(0);
        let end: u16 = caps[2].parse().unwrap_or(start);
        if end >= start {
            tv.seasons = (start..=end).collect();
        } else {
            tv.seasons = vec![start];
        }
        tv.is_season_pack = true;
    } else if let Some(caps) = SEASON_ONLY.captures(title) {
        let season: u16 = caps[1].parse().unwrap_or(0);
        tv.seasons = vec![season];
        tv.is_season_pack = true;
    }

    if tv.episodes.is_empty() {
        if let Some(caps) = ABSOLUTE_EPISODE.captures(title) {
            if let Ok(value) = caps[1].parse::<u32>() {
                // skip values that are almost certainly a year
                if !(1900..=2099).contains(&value) {
                    tv.absolute_episode = Some(value);
                }
            }
        }
    }

    tv.season_count = tv.seasons.len() as u32;
    tv
}

/// Parse a release title into its quality attributes.
///
/// Deterministic and free of I/O; malformed input degrades to `Unknown`
/// rather than failing.
pub fn parse(title: &str, size_bytes: Option<i64>) -> ReleaseAttributes {
    if title.trim().is_empty() {
        return ReleaseAttributes {
            size_bytes,
            languages: vec!["English".to_string()],
            ..Default::default()
        };
    }

    ReleaseAttributes {
        resolution: detect_resolution(title),
        source: detect_source(title),
        codec: detect_codec(title),
        hdr: detect_hdr(title),
        audio: detect_audio(title),
        release_group: detect_release_group(title),
        streaming_service: STREAMING_SERVICE
            .captures(title)
            .map(|caps| canonical_streaming(&caps[1]).to_string()),
        edition: EDITION
            .captures(title)
            .map(|caps| caps[1].to_string()),
        languages: detect_languages(title),
        is_remux: REMUX.is_match(title),
        is_repack: REPACK.is_match(title),
        is_proper: PROPER.is_match(title),
        is_3d: THREE_D.is_match(title),
        tv: detect_tv(title),
        size_bytes,
    }
}
