//! Query-string parsing into an ordered multimap.

use std::collections::BTreeMap;

/// Query parameters by name, values in the order they appeared.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// Parse an optional raw query string.
pub fn parse_query(query: Option<&str>) -> QueryParams {
    query.map_or_else(QueryParams::new, parse_query_string)
}

/// Parse `a=1&a=2&b`, URL-decoding keys and values (`+` is a space).
/// A key without `=` gets an empty value.
pub fn parse_query_string(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
    params
}

/// Render parameters back into a query string, keys sorted, values in order.
pub fn encode_query(params: &QueryParams) -> String {
    params
        .iter()
        .flat_map(|(key, values)| {
            values.iter().map(move |value| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_keys_keep_order() {
        let params = parse_query(Some("baz=bat&foo=x&baz=foo&baz=something"));
        assert_eq!(params["baz"], vec!["bat", "foo", "something"]);
        assert_eq!(params["foo"], vec!["x"]);
    }

    #[test]
    fn test_decoding_and_bare_keys() {
        let params = parse_query(Some("q=hello+world&tag=a%2Cb&flag"));
        assert_eq!(params["q"], vec!["hello world"]);
        assert_eq!(params["tag"], vec!["a,b"]);
        assert_eq!(params["flag"], vec![""]);
    }

    #[test]
    fn test_empty_query() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
    }

    #[test]
    fn test_encode_round_trips() {
        let params = parse_query(Some("b=2&a=x+y&a=z"));
        assert_eq!(encode_query(&params), "a=x%20y&a=z&b=2");
        assert_eq!(parse_query(Some(&encode_query(&params))), params);
    }
}
