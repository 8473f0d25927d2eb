//! URL parameter parsing and serialization for viewer state.
//!
//! Viewer state travels in the address bar in two parallel namings — long
//! (`edition`/`volume`/`page`) and short (`e`/`v`/`p`) — and in two carriers:
//! the query string and the hash fragment. Reads accept everything; the hash
//! is applied after the query, so its values win. Writes pick one canonical
//! form (short if any short key was already present, long otherwise) and one
//! carrier (the query string if the location already has query parameters,
//! the hash otherwise), so a shared link keeps its shape as the reader pages
//! through.
//!
//! The serializer is the parser's exact inverse: writing `(edition, volume,
//! page)` and re-parsing yields the same normalized values under the chosen
//! form. Query writes preserve foreign parameters (locale switches and the
//! like) and replace only the viewer's own keys.

use std::fmt;

use url::form_urlencoded;

use crate::ident::Edition;

/// Every key the viewer owns in a URL, across both forms (`ed` is a legacy
/// spelling that is stripped on write but never read).
const VIEWER_PARAM_KEYS: [&str; 7] = ["edition", "e", "volume", "v", "page", "p", "ed"];

const SHORT_KEYS: [&str; 3] = ["e", "v", "p"];

/// Which parameter naming a URL uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamForm {
    #[default]
    Long,
    Short,
}

/// Raw (un-normalized) viewer parameters as found in a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    pub edition: Option<String>,
    pub volume: Option<String>,
    pub page: Option<String>,
}

/// A document location split into the parts the viewer cares about.
/// `query` and `hash` are stored without their `?`/`#` prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: String,
    pub hash: String,
}

impl Location {
    /// Split a URL or path into path, query, and hash. Accepts both full
    /// URLs (`https://host/p?q#h`) and document-relative inputs (`/p?q#h`,
    /// `?q#h`, `#h`).
    pub fn parse(input: &str) -> Location {
        if input.contains("://")
            && let Ok(parsed) = url::Url::parse(input)
        {
            return Location {
                path: parsed.path().to_string(),
                query: parsed.query().unwrap_or_default().to_string(),
                hash: parsed.fragment().unwrap_or_default().to_string(),
            };
        }
        let (rest, hash) = match input.split_once('#') {
            Some((rest, hash)) => (rest, hash.to_string()),
            None => (input, String::new()),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (rest.to_string(), String::new()),
        };
        Location { path, query, hash }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.hash.is_empty() {
            write!(f, "#{}", self.hash)?;
        }
        Ok(())
    }
}

fn pairs(encoded: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(encoded.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Read the viewer parameters out of a location.
///
/// Query and hash parameters are merged last-write-wins with the hash applied
/// second; within the merged set the long key is consulted before its short
/// alias. Also reports which form the URL already speaks, for writes.
pub fn parse_params(location: &Location) -> (RawParams, ParamForm) {
    let query_pairs = pairs(&location.query);
    let hash_pairs = pairs(&location.hash);

    let form = if query_pairs
        .iter()
        .chain(&hash_pairs)
        .any(|(k, _)| SHORT_KEYS.contains(&k.as_str()))
    {
        ParamForm::Short
    } else {
        ParamForm::Long
    };

    let mut merged: Vec<(String, String)> = query_pairs;
    for (k, v) in hash_pairs {
        merged.retain(|(existing, _)| *existing != k);
        merged.push((k, v));
    }

    let get = |key: &str| -> Option<String> {
        merged
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    let raw = RawParams {
        edition: get("edition").or_else(|| get("e")),
        volume: get("volume").or_else(|| get("v")),
        page: get("page").or_else(|| get("p")),
    };
    (raw, form)
}

/// Serialize viewer parameters in the given form. The inverse of
/// [`parse_params`] for normalized values.
pub fn encode_params(
    edition: Edition,
    volume: Option<u32>,
    page: Option<u32>,
    form: ParamForm,
) -> String {
    let (ek, vk, pk) = match form {
        ParamForm::Long => ("edition", "volume", "page"),
        ParamForm::Short => ("e", "v", "p"),
    };
    let mut ser = form_urlencoded::Serializer::new(String::new());
    ser.append_pair(ek, edition.as_str());
    if let Some(volume) = volume {
        ser.append_pair(vk, &volume.to_string());
    }
    if let Some(page) = page {
        ser.append_pair(pk, &page.to_string());
    }
    ser.finish()
}

/// Write encoded viewer parameters into a location, in place.
///
/// Carrier selection follows the document: if the location already has query
/// parameters the viewer's keys are replaced there (foreign keys survive, the
/// hash is dropped); otherwise the hash carries the state and the query stays
/// untouched.
pub fn write_params(location: &Location, encoded: &str) -> Location {
    if !location.query.is_empty() {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs(&location.query) {
            if !VIEWER_PARAM_KEYS.contains(&k.as_str()) {
                ser.append_pair(&k, &v);
            }
        }
        let foreign = ser.finish();
        let query = if foreign.is_empty() {
            encoded.to_string()
        } else {
            format!("{foreign}&{encoded}")
        };
        Location {
            path: location.path.clone(),
            query,
            hash: String::new(),
        }
    } else {
        Location {
            path: location.path.clone(),
            query: String::new(),
            hash: encoded.to_string(),
        }
    }
}

/// Rewrite a location to carry only the edition, long form, query carrier.
/// Used to strip an invalid volume reference out of a shared URL.
pub fn edition_only(location: &Location, edition: Edition) -> Location {
    Location {
        path: location.path.clone(),
        query: format!("edition={edition}"),
        hash: String::new(),
    }
}
