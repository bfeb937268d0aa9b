//! Key/value parsing of marker payloads.
//!
//! Payloads look like `geo:48.1,11.5;site=weir%20north;tank=3` or
//! `fish:tag?id=17&site=north`. The leading `scheme:path` segment yields a
//! `scheme` entry; for `geo` the path is split into `lat`, `lon` and
//! optionally `alt`, otherwise it is kept as `path`. Every later segment is
//! `key=value` with a percent-encoded value. Segments that do not parse are
//! skipped.

use std::collections::BTreeMap;

fn is_delimiter(c: char) -> bool {
    matches!(c, ';' | '&' | '?')
}

pub fn parse_geo_uri(payload: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    let mut segments = payload.trim().split(is_delimiter);

    if let Some(head) = segments.next() {
        if head.contains('=') {
            insert_pair(&mut values, head);
        } else if let Some((scheme, path)) = head.split_once(':') {
            insert_head(&mut values, scheme, path);
        } else if !head.is_empty() {
            log::debug!("skipping payload head {head:?}: no scheme");
        }
    }

    for segment in segments {
        insert_pair(&mut values, segment);
    }
    values
}

fn insert_head(values: &mut BTreeMap<String, String>, scheme: &str, path: &str) {
    let scheme = scheme.trim().to_ascii_lowercase();
    if scheme.is_empty() {
        log::debug!("skipping payload head with empty scheme");
        return;
    }

    if scheme == "geo" {
        let coords: Vec<&str> = path.split(',').map(str::trim).collect();
        let numeric = coords.iter().all(|c| c.parse::<f64>().is_ok());
        if numeric && (2..=3).contains(&coords.len()) {
            for (key, value) in ["lat", "lon", "alt"].iter().zip(&coords) {
                values.insert((*key).to_string(), (*value).to_string());
            }
        } else {
            log::debug!("skipping malformed geo coordinates {path:?}");
        }
    } else if let Some(path) = decode(path) {
        if !path.is_empty() {
            values.insert("path".to_string(), path);
        }
    }
    values.insert("scheme".to_string(), scheme);
}

fn insert_pair(values: &mut BTreeMap<String, String>, segment: &str) {
    let Some((key, value)) = segment.split_once('=') else {
        if !segment.trim().is_empty() {
            log::debug!("skipping payload segment {segment:?}: no '='");
        }
        return;
    };
    let key = key.trim();
    if key.is_empty() {
        log::debug!("skipping payload segment {segment:?}: empty key");
        return;
    }
    match decode(value) {
        Some(value) => {
            values.insert(key.to_string(), value);
        }
        None => log::debug!("skipping payload segment {segment:?}: bad percent encoding"),
    }
}

fn decode(value: &str) -> Option<String> {
    urlencoding::decode(value).ok().map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_head_and_parameters() {
        let v = parse_geo_uri("geo:48.137,11.575,520;site=weir%20north;tank=3");
        assert_eq!(v["scheme"], "geo");
        assert_eq!(v["lat"], "48.137");
        assert_eq!(v["lon"], "11.575");
        assert_eq!(v["alt"], "520");
        assert_eq!(v["site"], "weir north");
        assert_eq!(v["tank"], "3");
    }

    #[test]
    fn ampersand_and_query_delimiters() {
        let v = parse_geo_uri("fish:tag?id=17&site=north");
        assert_eq!(v["scheme"], "fish");
        assert_eq!(v["path"], "tag");
        assert_eq!(v["id"], "17");
        assert_eq!(v["site"], "north");
    }

    #[test]
    fn malformed_segments_are_skipped() {
        let v = parse_geo_uri("geo:north,south;novalue;=orphan;ok=1;bad=%FF%FE;;last=x");
        assert_eq!(v.get("lat"), None);
        assert_eq!(v.get("novalue"), None);
        assert_eq!(v.get(""), None);
        assert_eq!(v.get("bad"), None);
        assert_eq!(v["scheme"], "geo");
        assert_eq!(v["ok"], "1");
        assert_eq!(v["last"], "x");
    }

    #[test]
    fn bare_parameter_list() {
        let v = parse_geo_uri("id=4;tank=2");
        assert_eq!(v.len(), 2);
        assert_eq!(v["id"], "4");
        assert!(parse_geo_uri("").is_empty());
    }
}
