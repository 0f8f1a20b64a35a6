//! Parsing of the client's acceptable MIME types.

/// One media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    quality: f32,
}

impl MediaRange {
    fn matches(&self, kind: &str, subtype: &str) -> bool {
        (self.kind == "*" || self.kind == kind) && (self.subtype == "*" || self.subtype == subtype)
    }
}

/// The set of MIME types a client accepts, ordered by preference.
///
/// Entries with `q=0` are dropped. An empty header accepts nothing, so
/// negotiation falls through to cached or transcoded representations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptList {
    ranges: Vec<MediaRange>,
}

impl AcceptList {
    /// Parses an `Accept` header value such as
    /// `audio/webm,audio/ogg;q=0.9,*/*;q=0.5`.
    pub fn parse(header: &str) -> Self {
        let mut ranges: Vec<MediaRange> = header
            .split(',')
            .filter_map(|part| {
                let mut params = part.split(';');
                let essence = params.next()?.trim().to_ascii_lowercase();
                let (kind, subtype) = essence.split_once('/')?;
                if kind.is_empty() || subtype.is_empty() {
                    return None;
                }
                let quality = params
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                if quality <= 0.0 {
                    return None;
                }
                Some(MediaRange {
                    kind: kind.to_string(),
                    subtype: subtype.to_string(),
                    quality,
                })
            })
            .collect();

        // Stable: equal weights keep header order.
        ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        Self { ranges }
    }

    /// An accept list that matches anything.
    pub fn any() -> Self {
        Self::parse("*/*")
    }

    /// Whether the list contains no acceptable range.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether `mime` is acceptable.
    pub fn accepts(&self, mime: &str) -> bool {
        self.preference(mime).is_some()
    }

    /// Rank of `mime` in the list; lower is more preferred.
    pub fn preference(&self, mime: &str) -> Option<usize> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let (kind, subtype) = essence.split_once('/')?;
        self.ranges.iter().position(|r| r.matches(kind, subtype))
    }
}
