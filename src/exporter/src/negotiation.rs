//! `Accept` and `Accept-Encoding` negotiation for scrape requests
//!
//! Malformed headers never fail a scrape; they fall back to the classic
//! Prometheus text format and identity encoding.

use common::config::TranslationStrategy;
use exposition::{EscapingScheme, ExpositionFormat};

/// A media type the scrape endpoint can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentOffer {
    pub media_type: &'static str,
    pub version: &'static str,
    pub escaping: Option<EscapingScheme>,
    /// Normalized `Content-Type` value
    pub content_type: &'static str,
}

const fn offer(
    media_type: &'static str,
    version: &'static str,
    escaping: Option<EscapingScheme>,
    content_type: &'static str,
) -> ContentOffer {
    ContentOffer {
        media_type,
        version,
        escaping,
        content_type,
    }
}

/// Every supported combination, in order of preference
pub const OFFERS: [ContentOffer; 10] = [
    offer("text/plain", "0.0.4", None, "text/plain; version=0.0.4; charset=utf-8"),
    offer(
        "text/plain",
        "1.0.0",
        Some(EscapingScheme::Underscores),
        "text/plain; version=1.0.0; charset=utf-8; escaping=underscores",
    ),
    offer(
        "text/plain",
        "1.0.0",
        Some(EscapingScheme::AllowUtf8),
        "text/plain; version=1.0.0; charset=utf-8; escaping=allow-utf-8",
    ),
    offer(
        "text/plain",
        "1.0.0",
        Some(EscapingScheme::Dots),
        "text/plain; version=1.0.0; charset=utf-8; escaping=dots",
    ),
    offer(
        "text/plain",
        "1.0.0",
        Some(EscapingScheme::Values),
        "text/plain; version=1.0.0; charset=utf-8; escaping=values",
    ),
    offer(
        "application/openmetrics-text",
        "0.0.1",
        None,
        "application/openmetrics-text; version=0.0.1; charset=utf-8",
    ),
    offer(
        "application/openmetrics-text",
        "1.0.0",
        Some(EscapingScheme::Underscores),
        "application/openmetrics-text; version=1.0.0; charset=utf-8; escaping=underscores",
    ),
    offer(
        "application/openmetrics-text",
        "1.0.0",
        Some(EscapingScheme::AllowUtf8),
        "application/openmetrics-text; version=1.0.0; charset=utf-8; escaping=allow-utf-8",
    ),
    offer(
        "application/openmetrics-text",
        "1.0.0",
        Some(EscapingScheme::Dots),
        "application/openmetrics-text; version=1.0.0; charset=utf-8; escaping=dots",
    ),
    offer(
        "application/openmetrics-text",
        "1.0.0",
        Some(EscapingScheme::Values),
        "application/openmetrics-text; version=1.0.0; charset=utf-8; escaping=values",
    ),
];

/// Used when negotiation fails or the client sent no `Accept` header
pub const DEFAULT_OFFER: ContentOffer = OFFERS[0];

impl ContentOffer {
    pub fn format(&self) -> ExpositionFormat {
        if self.media_type == "application/openmetrics-text" {
            ExpositionFormat::OpenMetrics
        } else {
            ExpositionFormat::Prometheus
        }
    }

    /// Escaping applied to names; offers without an explicit scheme imply underscores
    pub fn escaping_scheme(&self) -> EscapingScheme {
        self.escaping.unwrap_or(EscapingScheme::Underscores)
    }

    fn parameter(&self, name: &str) -> Option<&'static str> {
        match name {
            "version" => Some(self.version),
            "charset" => Some("utf-8"),
            "escaping" => self.escaping.map(|escaping| escaping.as_param()),
            _ => None,
        }
    }
}

/// Offers available under a translation strategy
pub fn offers_for(strategy: TranslationStrategy) -> Vec<ContentOffer> {
    OFFERS
        .into_iter()
        .filter(|offer| {
            strategy.allows_utf8() || offer.escaping_scheme() == EscapingScheme::Underscores
        })
        .collect()
}

#[derive(Debug)]
struct MediaRange<'h> {
    kind: &'h str,
    subtype: &'h str,
    params: Vec<(&'h str, &'h str)>,
    quality: f32,
}

fn parse_quality(value: &str) -> Option<f32> {
    let quality: f32 = value.parse().ok()?;
    (0.0..=1.0).contains(&quality).then_some(quality)
}

/// Split one `token;k=v;...` element into its token and parameters, pulling out `q`
fn parse_element(element: &str) -> Option<(&str, Vec<(&str, &str)>, f32)> {
    let mut parts = element.split(';');
    let token = parts.next()?.trim();
    if token.is_empty() {
        return None;
    }

    let mut params = Vec::new();
    let mut quality = 1.0;
    for param in parts {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        let (key, value) = param.split_once('=')?;
        let (key, value) = (key.trim(), value.trim().trim_matches('"'));
        if key.eq_ignore_ascii_case("q") {
            quality = parse_quality(value)?;
        } else {
            params.push((key, value));
        }
    }
    Some((token, params, quality))
}

fn parse_accept(header: &str) -> Option<Vec<MediaRange<'_>>> {
    header
        .split(',')
        .filter(|element| !element.trim().is_empty())
        .map(|element| {
            let (token, params, quality) = parse_element(element)?;
            let (kind, subtype) = token.split_once('/')?;
            if kind.is_empty() || subtype.is_empty() || (kind == "*" && subtype != "*") {
                return None;
            }
            Some(MediaRange {
                kind,
                subtype,
                params,
                quality,
            })
        })
        .collect()
}

impl MediaRange<'_> {
    /// Specificity of the match, `None` if the range does not cover `offer`
    fn matches(&self, offer: &ContentOffer) -> Option<usize> {
        let (kind, subtype) = offer.media_type.split_once('/')?;
        let mut score = 0;
        if self.kind != "*" {
            if !self.kind.eq_ignore_ascii_case(kind) {
                return None;
            }
            score += 1;
        }
        if self.subtype != "*" {
            if !self.subtype.eq_ignore_ascii_case(subtype) {
                return None;
            }
            score += 1;
        }
        for (key, value) in &self.params {
            let offered = offer.parameter(&key.to_ascii_lowercase())?;
            if !offered.eq_ignore_ascii_case(value) {
                return None;
            }
            score += 1;
        }
        Some(score)
    }
}

/// Pick the offer with the highest quality, then the most specific matching
/// range, then the earliest position in `offers`
pub fn negotiate_content(accept: Option<&str>, offers: &[ContentOffer]) -> ContentOffer {
    let Some(ranges) = accept.and_then(parse_accept) else {
        return DEFAULT_OFFER;
    };

    let mut best: Option<(f32, usize, ContentOffer)> = None;
    for offer in offers {
        let matched = ranges
            .iter()
            .filter_map(|range| range.matches(offer).map(|score| (range.quality, score)))
            .fold(None, |current: Option<(f32, usize)>, candidate| match current {
                Some(current) if current.1 >= candidate.1 => Some(current),
                _ => Some(candidate),
            });
        let Some((quality, score)) = matched else {
            continue;
        };
        if quality <= 0.0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_quality, best_score, _)) => {
                quality > best_quality || (quality == best_quality && score > best_score)
            }
        };
        if better {
            best = Some((quality, score, *offer));
        }
    }

    best.map_or(DEFAULT_OFFER, |(_, _, offer)| offer)
}

/// Response content encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    /// Raw DEFLATE stream
    Deflate,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
        }
    }
}

/// Pick a response encoding; gzip and deflate are offered only with `compression`
pub fn negotiate_encoding(accept_encoding: Option<&str>, compression: bool) -> ContentEncoding {
    let offers: &[ContentEncoding] = if compression {
        &[
            ContentEncoding::Identity,
            ContentEncoding::Gzip,
            ContentEncoding::Deflate,
        ]
    } else {
        &[ContentEncoding::Identity]
    };

    let Some(header) = accept_encoding else {
        return ContentEncoding::Identity;
    };
    let ranges: Option<Vec<_>> = header
        .split(',')
        .filter(|element| !element.trim().is_empty())
        .map(parse_element)
        .collect();
    let Some(ranges) = ranges else {
        return ContentEncoding::Identity;
    };

    let mut best: Option<(f32, usize, ContentEncoding)> = None;
    for offer in offers {
        let matched = ranges
            .iter()
            .filter_map(|(token, _, quality)| {
                if token.eq_ignore_ascii_case(offer.as_str()) {
                    Some((*quality, 1))
                } else if *token == "*" {
                    Some((*quality, 0))
                } else {
                    None
                }
            })
            .max_by_key(|(_, score)| *score);
        let Some((quality, score)) = matched else {
            continue;
        };
        if quality <= 0.0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_quality, best_score, _)) => {
                quality > best_quality || (quality == best_quality && score > best_score)
            }
        };
        if better {
            best = Some((quality, score, *offer));
        }
    }

    best.map_or(ContentEncoding::Identity, |(_, _, encoding)| encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMETHEUS_ACCEPT: &str = "application/openmetrics-text;version=1.0.0;escaping=allow-utf-8;q=0.6,application/openmetrics-text;version=0.0.1;q=0.5,text/plain;version=1.0.0;escaping=allow-utf-8;q=0.4,text/plain;version=0.0.4;q=0.3,*/*;q=0.2";

    fn all() -> Vec<ContentOffer> {
        offers_for(TranslationStrategy::NoUtf8EscapingWithSuffixes)
    }

    #[test]
    fn test_missing_or_malformed_accept_falls_back() {
        assert_eq!(negotiate_content(None, &all()), DEFAULT_OFFER);
        assert_eq!(negotiate_content(Some("garbage"), &all()), DEFAULT_OFFER);
        assert_eq!(
            negotiate_content(Some("text/plain;q=abc"), &all()),
            DEFAULT_OFFER
        );
        assert_eq!(negotiate_content(Some("text/plain;q=2"), &all()), DEFAULT_OFFER);
        assert_eq!(negotiate_content(Some("*/plain"), &all()), DEFAULT_OFFER);
        assert_eq!(negotiate_content(Some("image/png"), &all()), DEFAULT_OFFER);
        assert_eq!(
            DEFAULT_OFFER.content_type,
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }

    #[test]
    fn test_prometheus_scrape_header_prefers_utf8_openmetrics() {
        let chosen = negotiate_content(Some(PROMETHEUS_ACCEPT), &all());
        assert_eq!(chosen.format(), ExpositionFormat::OpenMetrics);
        assert_eq!(chosen.escaping_scheme(), EscapingScheme::AllowUtf8);
        assert_eq!(
            chosen.content_type,
            "application/openmetrics-text; version=1.0.0; charset=utf-8; escaping=allow-utf-8"
        );
    }

    #[test]
    fn test_underscore_strategy_restricts_escaping() {
        let offers = offers_for(TranslationStrategy::UnderscoreEscapingWithSuffixes);
        assert_eq!(offers.len(), 4);
        assert!(
            offers
                .iter()
                .all(|offer| offer.escaping_scheme() == EscapingScheme::Underscores)
        );

        let chosen = negotiate_content(Some(PROMETHEUS_ACCEPT), &offers);
        assert_eq!(
            chosen.content_type,
            "application/openmetrics-text; version=0.0.1; charset=utf-8"
        );
    }

    #[test]
    fn test_wildcards_pick_first_offer() {
        assert_eq!(negotiate_content(Some("*/*"), &all()), OFFERS[0]);
        assert_eq!(
            negotiate_content(Some("application/*"), &all()).content_type,
            "application/openmetrics-text; version=0.0.1; charset=utf-8"
        );
    }

    #[test]
    fn test_specificity_breaks_quality_ties() {
        let chosen = negotiate_content(
            Some("text/plain, text/plain;version=1.0.0;escaping=dots"),
            &all(),
        );
        assert_eq!(chosen.escaping, Some(EscapingScheme::Dots));
    }

    #[test]
    fn test_zero_quality_excludes() {
        let chosen = negotiate_content(
            Some("text/plain;version=0.0.4;q=0, text/plain;q=0.5"),
            &all(),
        );
        assert_eq!(chosen, OFFERS[1]);
    }

    #[test]
    fn test_parameters_are_case_insensitive() {
        let chosen = negotiate_content(
            Some("Application/OpenMetrics-Text; Version=1.0.0; Escaping=\"VALUES\""),
            &all(),
        );
        assert_eq!(chosen.escaping, Some(EscapingScheme::Values));
        assert_eq!(chosen.format(), ExpositionFormat::OpenMetrics);
    }

    #[test]
    fn test_unknown_parameter_does_not_match() {
        assert_eq!(
            negotiate_content(Some("text/plain;foo=bar"), &all()),
            DEFAULT_OFFER
        );
    }

    #[test]
    fn test_encoding_negotiation() {
        assert_eq!(negotiate_encoding(None, true), ContentEncoding::Identity);
        assert_eq!(negotiate_encoding(Some("gzip"), true), ContentEncoding::Gzip);
        assert_eq!(negotiate_encoding(Some("deflate"), true), ContentEncoding::Deflate);
        assert_eq!(
            negotiate_encoding(Some("gzip;q=0.5, deflate"), true),
            ContentEncoding::Deflate
        );
        assert_eq!(negotiate_encoding(Some("br"), true), ContentEncoding::Identity);
        assert_eq!(negotiate_encoding(Some("gzip"), false), ContentEncoding::Identity);
        assert_eq!(negotiate_encoding(Some("gzip;q=x"), true), ContentEncoding::Identity);
    }

    #[test]
    fn test_encoding_wildcard_and_identity_ties() {
        assert_eq!(negotiate_encoding(Some("*"), true), ContentEncoding::Identity);
        assert_eq!(
            negotiate_encoding(Some("identity;q=0, *"), true),
            ContentEncoding::Gzip
        );
        assert_eq!(
            negotiate_encoding(Some("gzip, identity"), true),
            ContentEncoding::Identity
        );
    }
}
