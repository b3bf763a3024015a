//! Built-in custom-format catalog
//!
//! The stock rules the shipped profiles score against. User formats are
//! appended to these at load; ids are stable and referenced by the built-in
//! profiles' score tables.

use crate::formats::{CustomFormat, FormatCategory, FormatCondition};
use crate::parser::{Resolution, Source};

/// The stock format catalog
pub fn default_formats() -> Vec<CustomFormat> {
    let mut formats = Vec::new();

    // Resolution tiers
    formats.push(
        CustomFormat::new("res-2160p", "2160p", FormatCategory::Resolution, 5000)
            .with_condition(FormatCondition::resolution(Resolution::R2160p).required(true)),
    );
    formats.push(
        CustomFormat::new("res-1080p", "1080p", FormatCategory::Resolution, 2500)
            .with_condition(FormatCondition::resolution(Resolution::R1080p).required(true)),
    );
    formats.push(
        CustomFormat::new("res-720p", "720p", FormatCategory::Resolution, 800)
            .with_condition(FormatCondition::resolution(Resolution::R720p).required(true)),
    );
    formats.push(
        CustomFormat::new("res-480p", "480p", FormatCategory::Resolution, 100)
            .with_condition(FormatCondition::resolution(Resolution::R480p).required(true)),
    );

    // Source tiers
    formats.push(
        CustomFormat::new("remux", "Remux", FormatCategory::Enhancement, 8000)
            .with_condition(FormatCondition::release_title(r"\bremux\b").required(true)),
    );
    formats.push(
        CustomFormat::new("source-bluray", "BluRay", FormatCategory::Other, 2500)
            .with_condition(FormatCondition::source(Source::BluRay).required(true)),
    );
    formats.push(
        CustomFormat::new("source-webdl", "WEB-DL", FormatCategory::Other, 1500)
            .with_condition(FormatCondition::source(Source::WebDl).required(true)),
    );
    formats.push(
        CustomFormat::new("source-webrip", "WEBRip", FormatCategory::LowQuality, 300)
            .with_condition(FormatCondition::source(Source::WebRip).required(true)),
    );
    formats.push(
        CustomFormat::new("source-hdtv", "HDTV", FormatCategory::LowQuality, -300)
            .with_condition(FormatCondition::source(Source::Hdtv).required(true)),
    );
    formats.push(
        CustomFormat::new("source-dvd", "DVD", FormatCategory::LowQuality, -500)
            .with_condition(FormatCondition::source(Source::Dvd))
            .with_condition(FormatCondition::source(Source::DvdRip)),
    );

    // Banned sources: never grabbed regardless of numeric score
    formats.push(
        CustomFormat::new("banned-cam", "CAM", FormatCategory::Banned, -10000)
            .with_condition(FormatCondition::source(Source::Cam).required(true)),
    );
    formats.push(
        CustomFormat::new("banned-telesync", "Telesync", FormatCategory::Banned, -10000)
            .with_condition(FormatCondition::source(Source::Telesync).required(true)),
    );
    formats.push(
        CustomFormat::new("banned-screener", "Screener", FormatCategory::Banned, -10000)
            .with_condition(FormatCondition::source(Source::Screener).required(true)),
    );

    // HDR ladder
    formats.push(
        CustomFormat::new("hdr-dv-hdr10plus", "DV HDR10+", FormatCategory::Hdr, 900)
            .with_condition(
                FormatCondition::release_title(r"\b(dv|dovi|dolby[ ._-]?vision)\b").required(true),
            )
            .with_condition(FormatCondition::release_title(r"\bhdr-?10(\+|[ ._-]?plus)").required(true)),
    );
    formats.push(
        CustomFormat::new("hdr-dv", "DV", FormatCategory::Hdr, 700).with_condition(
            FormatCondition::release_title(r"\b(dv|dovi|dolby[ ._-]?vision)\b").required(true),
        ),
    );
    formats.push(
        CustomFormat::new("hdr-hdr10plus", "HDR10+", FormatCategory::Hdr, 600)
            .with_condition(FormatCondition::release_title(r"\bhdr-?10(\+|[ ._-]?plus)").required(true)),
    );
    formats.push(
        CustomFormat::new("hdr-hdr10", "HDR10", FormatCategory::Hdr, 500)
            .with_condition(FormatCondition::release_title(r"\bhdr-?10\b").required(true)),
    );
    formats.push(
        CustomFormat::new("hdr-generic", "HDR", FormatCategory::Hdr, 300)
            .with_condition(FormatCondition::release_title(r"\bhdr\b").required(true)),
    );
    formats.push(
        CustomFormat::new("hdr-hlg", "HLG", FormatCategory::Hdr, 100)
            .with_condition(FormatCondition::release_title(r"\bhlg\b").required(true)),
    );

    // Audio
    formats.push(
        CustomFormat::new("audio-truehd-atmos", "TrueHD Atmos", FormatCategory::Audio, 1500)
            .with_condition(FormatCondition::release_title(r"\btrue-?hd\b").required(true))
            .with_condition(FormatCondition::release_title(r"\batmos\b").required(true)),
    );
    formats.push(
        CustomFormat::new("audio-truehd", "TrueHD", FormatCategory::Audio, 1200)
            .with_condition(FormatCondition::release_title(r"\btrue-?hd\b").required(true)),
    );
    formats.push(
        CustomFormat::new("audio-dtshd-ma", "DTS-HD MA", FormatCategory::Audio, 1100)
            .with_condition(
                FormatCondition::release_title(r"\bdts[-. ]?hd[-. ]?ma\b").required(true),
            ),
    );
    formats.push(
        CustomFormat::new("audio-dtsx", "DTS:X", FormatCategory::Audio, 1000)
            .with_condition(FormatCondition::release_title(r"\bdts[-. ]?x\b").required(true)),
    );
    formats.push(
        CustomFormat::new("audio-eac3", "DD+", FormatCategory::Audio, 300).with_condition(
            FormatCondition::release_title(r"(\bddp|\bdd\+|\be-?ac-?3\b)").required(true),
        ),
    );
    formats.push(
        CustomFormat::new("audio-flac", "FLAC", FormatCategory::Audio, 200)
            .with_condition(FormatCondition::release_title(r"\bflac\b").required(true)),
    );

    // Codecs
    formats.push(
        CustomFormat::new("codec-av1", "AV1", FormatCategory::Codec, 150)
            .with_condition(FormatCondition::release_title(r"\bav1\b").required(true)),
    );
    formats.push(
        CustomFormat::new("codec-x265", "x265", FormatCategory::Codec, 100)
            .with_condition(FormatCondition::release_title(r"\b(x265|h[-. ]?265|hevc)\b").required(true)),
    );
    formats.push(
        CustomFormat::new("codec-x264", "x264", FormatCategory::Codec, 50)
            .with_condition(FormatCondition::release_title(r"\b(x264|h[-. ]?264|avc)\b").required(true)),
    );
    formats.push(
        CustomFormat::new("codec-xvid", "XviD", FormatCategory::LowQuality, -800)
            .with_condition(FormatCondition::release_title(r"\b(xvid|divx)\b").required(true)),
    );

    // Streaming services
    formats.push(
        CustomFormat::new("stream-amzn", "Amazon", FormatCategory::Streaming, 200)
            .with_condition(FormatCondition::release_title(r"\bamzn\b").required(true)),
    );
    formats.push(
        CustomFormat::new("stream-nf", "Netflix", FormatCategory::Streaming, 200)
            .with_condition(FormatCondition::release_title(r"\bnf\b").required(true)),
    );
    formats.push(
        CustomFormat::new("stream-atvp", "Apple TV+", FormatCategory::Streaming, 250)
            .with_condition(FormatCondition::release_title(r"\batvp\b").required(true)),
    );
    formats.push(
        CustomFormat::new("stream-dsnp", "Disney+", FormatCategory::Streaming, 150)
            .with_condition(FormatCondition::release_title(r"\bdsnp\b").required(true)),
    );
    formats.push(
        CustomFormat::new("stream-max", "Max", FormatCategory::Streaming, 150)
            .with_condition(FormatCondition::release_title(r"\b(hmax|max)\b").required(true)),
    );

    // Release group tiers
    formats.push(
        CustomFormat::new("group-tier-1", "Tier 1 Groups", FormatCategory::ReleaseGroupTier, 800)
            .with_condition(
                FormatCondition::release_group(
                    r"^(framestor|flux|sparks|don|cinefile|geckos|ntb|w4nk3r|bhdstudio)$",
                )
                .required(true),
            ),
    );
    formats.push(
        CustomFormat::new("group-tier-2", "Tier 2 Groups", FormatCategory::ReleaseGroupTier, 400)
            .with_condition(
                FormatCondition::release_group(r"^(ntg|cmrg|tommy|tepes|amiable|rovers|blow)$")
                    .required(true),
            ),
    );

    // Micro encoders
    formats.push(
        CustomFormat::new("micro-encoders", "Micro Encoders", FormatCategory::Micro, -2000)
            .with_condition(
                FormatCondition::release_group(r"^(yify|yts([._-]?(mx|lt|ag))?|psa|galaxyrg|tgx)$")
                    .required(true),
            ),
    );

    // Enhancements
    formats.push(
        CustomFormat::new("repack", "Repack", FormatCategory::Enhancement, 50)
            .with_condition(FormatCondition::release_title(r"\brepack\b").required(true)),
    );
    formats.push(
        CustomFormat::new("proper", "Proper", FormatCategory::Enhancement, 50)
            .with_condition(FormatCondition::release_title(r"\bproper\b").required(true)),
    );
    formats.push(
        CustomFormat::new("low-3d", "3D", FormatCategory::LowQuality, -1500)
            .with_condition(FormatCondition::release_title(r"\b3d\b").required(true)),
    );

    formats
}
