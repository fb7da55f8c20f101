//! Turning raw query text into [`QueryParams`].

use map_search_mwm::normalize::{ends_with_delimiter, split_tokens};
use map_search_mwm_models::Lang;
use map_search_retrieval_models::QueryParams;

/// Tokenizes `query` for the matchers.
///
/// Every word becomes a one-form token set. The last word is treated as
/// a prefix unless the query ends with a delimiter, in which case the
/// user has finished typing it.
#[must_use]
pub fn build_query_params(query: &str, langs: impl IntoIterator<Item = Lang>) -> QueryParams {
    let mut words = split_tokens(query);

    let prefix_tokens = if ends_with_delimiter(query) {
        Vec::new()
    } else {
        words.pop().into_iter().collect()
    };

    QueryParams {
        tokens: words.into_iter().map(|word| vec![word]).collect(),
        prefix_tokens,
        langs: langs.into_iter().collect(),
        ..QueryParams::default()
    }
}

#[cfg(test)]
mod tests {
    use map_search_geometry::UPPER_SCALE;

    use super::*;

    const ANY_LANG: [Lang; 0] = [];

    #[test]
    fn last_word_is_a_prefix() {
        let params = build_query_params("Whiskey Ba", [Lang::En]);
        assert_eq!(params.tokens, vec![vec!["whiskey".to_string()]]);
        assert_eq!(params.prefix_tokens, vec!["ba".to_string()]);
        assert!(params.is_lang_allowed(Lang::En));
        assert!(!params.is_lang_allowed(Lang::Ru));
        assert_eq!(params.scale, UPPER_SCALE);
    }

    #[test]
    fn trailing_delimiter_completes_the_last_word() {
        let params = build_query_params("whiskey bar ", ANY_LANG);
        assert_eq!(
            params.tokens,
            vec![vec!["whiskey".to_string()], vec!["bar".to_string()]]
        );
        assert!(params.prefix_tokens.is_empty());
        assert!(params.is_lang_allowed(Lang::Ru));
    }

    #[test]
    fn blank_query_is_empty() {
        assert!(build_query_params("   ", ANY_LANG).is_empty());
        assert!(build_query_params("", [Lang::En]).is_empty());
    }
}
