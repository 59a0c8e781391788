use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt, sync::Arc};

/// A single segment of a [`QueryKey`](./struct.QueryKey.html).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    /// An integer segment, usually an ID
    Int(i64),
    /// A string segment, usually a resource name
    Str(String)
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Str(s) => write!(f, "{:?}", s)
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<&String> for KeyPart {
    fn from(s: &String) -> Self {
        KeyPart::Str(s.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(i: i64) -> Self {
        KeyPart::Int(i)
    }
}

impl From<i32> for KeyPart {
    fn from(i: i32) -> Self {
        KeyPart::Int(i as i64)
    }
}

impl From<u32> for KeyPart {
    fn from(i: u32) -> Self {
        KeyPart::Int(i as i64)
    }
}

/// IDs that don't fit in an `i64` become string parts instead of wrapping around.
impl From<u64> for KeyPart {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or_else(|_| KeyPart::Str(i.to_string()), KeyPart::Int)
    }
}

/// Identifies one entry in the query cache.
///
/// Keys are ordered lists of parts, so `["super-hero", 1]` and `["super-hero", 2]` are different
/// entries, while filters like [`QueryClient::invalidate_queries`](../client/struct.QueryClient.html#method.invalidate_queries)
/// match by prefix, so `["super-hero"]` covers both of them.
///
/// ```
/// use sidekick::{query_key, QueryKey};
///
/// let key = query_key!["super-hero", 1];
/// assert!(key.starts_with(&QueryKey::from("super-hero")));
/// assert_eq!(key.to_string(), r#"["super-hero", 1]"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Arc<[KeyPart]>);

impl QueryKey {
    pub fn new<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<KeyPart>
    {
        QueryKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Whether `prefix` matches the start of this key. Every key starts with itself.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns a new key with `part` appended.
    pub fn join<P: Into<KeyPart>>(&self, part: P) -> Self {
        let mut parts = self.0.to_vec();
        parts.push(part.into());
        QueryKey(parts.into())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}

impl From<&str> for QueryKey {
    fn from(s: &str) -> Self {
        QueryKey::new(std::iter::once(s))
    }
}

impl From<String> for QueryKey {
    fn from(s: String) -> Self {
        QueryKey::new(std::iter::once(s))
    }
}

impl From<&QueryKey> for QueryKey {
    fn from(key: &QueryKey) -> Self {
        key.clone()
    }
}

/// Builds a [`QueryKey`](./struct.QueryKey.html) from a list of parts.
#[macro_export]
macro_rules! query_key {
    ($($x: expr),* $(,)?) => {
        {
            let parts: ::std::vec::Vec<$crate::KeyPart> = vec![$($crate::KeyPart::from($x)),*];
            $crate::QueryKey::new(parts)
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefix_matching() {
        let hero = query_key!["super-hero", 1];
        let heroes = QueryKey::from("super-hero");

        assert!(hero.starts_with(&heroes));
        assert!(hero.starts_with(&hero));
        assert!(!heroes.starts_with(&hero));
        assert!(!hero.starts_with(&query_key!["super-hero", 2]));
        assert!(!hero.starts_with(&QueryKey::from("super-heroes")));
    }

    #[test]
    fn int_and_string_parts_differ() {
        assert_ne!(query_key!["user", 1], query_key!["user", "1"]);
    }

    #[test]
    fn large_unsigned_ids_do_not_wrap() {
        assert_eq!(KeyPart::from(7u64), KeyPart::Int(7));
        assert_eq!(KeyPart::from(u64::MAX), KeyPart::Str(u64::MAX.to_string()));
        assert_ne!(query_key!["super-hero", u64::MAX], query_key!["super-hero", -1]);
    }

    #[test]
    fn join_appends() {
        let key = QueryKey::from("courses").join("codevolution");
        assert_eq!(key, query_key!["courses", "codevolution"]);
    }

    #[test]
    fn parts_serialize_as_plain_values() {
        let parts = query_key!["super-hero", 1].parts().to_vec();
        assert_eq!(serde_json::to_string(&parts).unwrap(), r#"["super-hero",1]"#);

        let parsed: Vec<KeyPart> = serde_json::from_str(r#"["user",7]"#).unwrap();
        assert_eq!(QueryKey::new(parsed), query_key!["user", 7]);
    }
}
