//! Macros recognised in ad markup.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnippetMacro {
    /// Base URL of the bidder, e.g. `http://zone.bidder.example`.
    CallbackUrl,
    /// Impression callback URL.
    ImpressionUrl,
    /// Click callback URL.
    ClickUrl,
    /// Width of the bid's creative, or of the impression slot.
    AdWidth,
    /// Height of the bid's creative, or of the impression slot.
    AdHeight,
    /// Winning price, replaced with an encrypted price token.
    WinningPrice,
}

impl SnippetMacro {
    pub const ALL: [SnippetMacro; 6] = [
        SnippetMacro::CallbackUrl,
        SnippetMacro::ImpressionUrl,
        SnippetMacro::ClickUrl,
        SnippetMacro::AdWidth,
        SnippetMacro::AdHeight,
        SnippetMacro::WinningPrice,
    ];

    /// Text substituted when the macro is processed.
    pub const fn key(self) -> &'static str {
        match self {
            SnippetMacro::CallbackUrl => "${OB_CALLBACK_URL}",
            SnippetMacro::ImpressionUrl => "${OB_IMPRESSION_URL}",
            SnippetMacro::ClickUrl => "${OB_CLICK_URL}",
            SnippetMacro::AdWidth => "${OB_AD_WIDTH}",
            SnippetMacro::AdHeight => "${OB_AD_HEIGHT}",
            SnippetMacro::WinningPrice => "%%WINNING_PRICE%%",
        }
    }

    pub fn by_key(key: &str) -> Option<SnippetMacro> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl fmt::Display for SnippetMacro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_key() {
        for m in SnippetMacro::ALL {
            assert_eq!(SnippetMacro::by_key(m.key()), Some(m));
        }
        assert_eq!(SnippetMacro::by_key("${AUCTION_ID}"), None);
    }
}
