//! The flat key/value request bag shared by every operation.

use std::collections::{BTreeMap, HashMap};

/// Read access to decoded form or query parameters.
pub trait Params {
    /// Returns the last value given for `key`.
    fn get(&self, key: &str) -> Option<&str>;

    /// Returns every value given for `key`, in request order.
    fn get_list(&self, key: &str) -> Vec<&str>;

    fn has_key(&self, key: &str) -> bool;

    /// Iterates over the distinct keys.
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_>;
}

/// Parameters as decoded from a query string or urlencoded body, with
/// repeated keys preserved.
#[derive(Clone, Debug, Default)]
pub struct FormParams {
    pairs: Vec<(String, String)>,
}

impl FormParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        FormParams { pairs }
    }
}

impl<K: Into<String>, V: Into<String>> std::iter::FromIterator<(K, V)> for FormParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FormParams::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Params for FormParams {
    fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_list(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn has_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        let mut seen = Vec::new();

        for (k, _) in &self.pairs {
            if !seen.contains(&k.as_str()) {
                seen.push(k.as_str());
            }
        }

        Box::new(seen.into_iter())
    }
}

/// A single decoded sub-object, such as one location.
impl Params for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }

    fn get_list(&self, key: &str) -> Vec<&str> {
        Params::get(self, key).into_iter().collect()
    }

    fn has_key(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(HashMap::keys(self).map(String::as_str))
    }
}

/// Returns the non-blank values of a list field. A blank value stands
/// for an explicitly empty list rather than a malformed entry.
pub fn list_values<'a, P: Params + ?Sized>(params: &'a P, name: &str) -> Vec<&'a str> {
    params
        .get_list(name)
        .into_iter()
        .filter(|value| !value.trim().is_empty())
        .collect()
}

/// Returns whether a list field was given at all, in either its `name[]`
/// or bare `name` spelling. An explicitly empty list counts as given.
pub fn is_list_given<P: Params + ?Sized>(params: &P, name: &str) -> bool {
    match name.strip_suffix("[]") {
        Some(bare) => params.has_key(name) || params.has_key(bare),
        None => params.has_key(name) || params.has_key(&format!("{}[]", name)),
    }
}

/// Reassembles a list of flat objects sent as `prefix[<index>][<field>]`
/// keys, ordered by index. The flag reports whether any key started with
/// `prefix`; a bare `prefix` or `prefix[]` key marks an empty list.
///
/// Keys whose index is not an integer, or which have no field part, are
/// skipped.
pub fn extract_indexed_objects<P: Params + ?Sized>(
    params: &P,
    prefix: &str,
) -> (Vec<HashMap<String, String>>, bool) {
    let mut present = false;
    let mut objects: BTreeMap<i64, HashMap<String, String>> = BTreeMap::new();

    for key in params.keys() {
        let rest = match key.strip_prefix(prefix) {
            Some(rest) => rest,
            None => continue,
        };

        present = true;

        let (index, field) = match split_indexed_key(rest) {
            Some(parts) => parts,
            None => continue,
        };

        if let Some(value) = params.get(key) {
            objects
                .entry(index)
                .or_default()
                .insert(field.to_owned(), value.to_owned());
        }
    }

    (objects.into_iter().map(|(_, object)| object).collect(), present)
}

/// Splits `[<index>][<field>]` into its parts, stripping quotes from the
/// index.
fn split_indexed_key(rest: &str) -> Option<(i64, &str)> {
    let mut segments = rest.strip_prefix('[')?.split('[');

    let index = segments.next()?.strip_suffix(']')?.replace('"', "");
    let field = segments.next()?.strip_suffix(']')?;

    if field.is_empty() {
        return None;
    }

    Some((index.trim().parse().ok()?, field))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn object(fields: &[(&str, &str)]) -> HashMap<String, String> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repeated_keys_are_kept() {
        let params: FormParams = vec![("a", "1"), ("b", "2"), ("a", "3")].into_iter().collect();

        assert_eq!(params.get("a"), Some("3"));
        assert_eq!(params.get_list("a"), vec!["1", "3"]);
        assert!(params.get_list("c").is_empty());
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn nothing_to_extract() {
        let params = FormParams::default();

        assert_eq!(extract_indexed_objects(&params, "locations"), (vec![], false));
    }

    #[test]
    fn extracts_single_object() {
        let params: FormParams = vec![("locations[0][lat]", "1.0"), ("locations[0][lng]", "2.0")]
            .into_iter()
            .collect();

        assert_eq!(
            extract_indexed_objects(&params, "locations"),
            (vec![object(&[("lat", "1.0"), ("lng", "2.0")])], true)
        );
    }

    #[test]
    fn orders_by_numeric_index() {
        let params: FormParams = vec![
            ("locations[10][friendly_name]", "ten"),
            ("locations[\"2\"][friendly_name]", "two"),
            ("locations[0][friendly_name]", "zero"),
            ("title", "Lunch"),
        ]
        .into_iter()
        .collect();

        let (objects, present) = extract_indexed_objects(&params, "locations");

        assert!(present);
        assert_eq!(
            objects,
            vec![
                object(&[("friendly_name", "zero")]),
                object(&[("friendly_name", "two")]),
                object(&[("friendly_name", "ten")]),
            ]
        );
    }

    #[test]
    fn bare_key_means_empty_list() {
        for key in &["locations", "locations[]"] {
            let params: FormParams = vec![(*key, "")].into_iter().collect();

            assert_eq!(extract_indexed_objects(&params, "locations"), (vec![], true));
        }
    }

    #[test]
    fn malformed_keys_are_skipped() {
        let params: FormParams = vec![
            ("locations[x][lat]", "1"),
            ("locations[0]", "1"),
            ("locations[1][lat]", "5"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            extract_indexed_objects(&params, "locations"),
            (vec![object(&[("lat", "5")])], true)
        );
    }

    #[test]
    fn list_presence() {
        let empty: FormParams = vec![("participants[]", "")].into_iter().collect();
        let bare: FormParams = vec![("participants", "")].into_iter().collect();
        let absent: FormParams = vec![("title", "x")].into_iter().collect();

        assert!(is_list_given(&empty, "participants[]"));
        assert!(is_list_given(&bare, "participants[]"));
        assert!(is_list_given(&empty, "participants"));
        assert!(!is_list_given(&absent, "participants[]"));
        assert!(list_values(&empty, "participants[]").is_empty());
    }
}
