//! Domain primitives for the order-tracking core.
//!
//! Strong-typed wrappers for user slugs and composite record keys, plus the
//! naming rules that tie a user account to its on-disk database shard.

pub mod billing;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File name of the shared accounts database.
pub const SHARED_DB_FILE: &str = "system.db";

/// File-name prefix for per-user database shards.
pub const USER_DB_PREFIX: &str = "usuario_";

/// File-name prefix marking an archived user shard.
pub const ARCHIVED_DB_PREFIX: &str = "ARCHIVED_";

/// Stem used when a user name folds down to nothing printable.
const FALLBACK_STEM: &str = "user";

/// Stable slug derived from a user name, safe for file names.
///
/// The slug is the ASCII-folded, hyphenated, lowercased name followed by an
/// 8-hex-char suffix hashed from the *original* name, so two names that fold
/// to the same ASCII stem still get distinct shards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSlug(String);

impl UserSlug {
    /// Derives the slug for a user name. Deterministic and total.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = if name.is_empty() { FALLBACK_STEM } else { name };

        static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
        let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").expect("Invalid regex"));

        let folded = ascii_fold(name);
        let stem = re
            .replace_all(&folded, "-")
            .trim_matches(['-', '_'])
            .to_lowercase();
        let stem = if stem.is_empty() {
            FALLBACK_STEM
        } else {
            stem.as_str()
        };

        let digest = format!("{:x}", Sha256::digest(name.as_bytes()));
        Self(format!("{stem}-{}", &digest[..8]))
    }

    /// Wraps an already-derived slug (e.g. recovered from a file name).
    #[must_use]
    pub fn from_raw(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this user's database shard.
    #[must_use]
    pub fn db_file_name(&self) -> String {
        format!("{USER_DB_PREFIX}{}.db", self.0)
    }

    /// File name of this user's shard while the account is archived.
    #[must_use]
    pub fn archived_db_file_name(&self) -> String {
        format!("{ARCHIVED_DB_PREFIX}{USER_DB_PREFIX}{}.db", self.0)
    }

    /// Recovers the slug from a live or archived shard file name, if it
    /// is one.
    #[must_use]
    pub fn from_db_file_name(file_name: &str) -> Option<Self> {
        let file_name = file_name
            .strip_prefix(ARCHIVED_DB_PREFIX)
            .unwrap_or(file_name);
        let stem = file_name
            .strip_prefix(USER_DB_PREFIX)?
            .strip_suffix(".db")?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_string()))
    }
}

impl fmt::Display for UserSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves the path of the shared accounts database under `data_dir`.
#[must_use]
pub fn shared_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SHARED_DB_FILE)
}

/// Resolves the path of a user's database shard under `data_dir`.
#[must_use]
pub fn user_db_path(data_dir: &Path, slug: &UserSlug) -> PathBuf {
    data_dir.join(slug.db_file_name())
}

/// Composite identifier handed to the UI for a record row: `<slug>:<row id>`.
///
/// Rows only carry per-shard autoincrement ids, so the slug is needed to
/// route an edit or delete back to the right database file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    slug: UserSlug,
    id: i32,
}

impl RecordKey {
    #[must_use]
    pub const fn new(slug: UserSlug, id: i32) -> Self {
        Self { slug, id }
    }

    /// Parses a composite key. Returns `None` when the separator is missing
    /// or the row id is not an integer.
    #[must_use]
    pub fn decode(encoded: &str) -> Option<Self> {
        let (slug, id) = encoded.split_once(':')?;
        let id = id.trim().parse::<i32>().ok()?;
        Some(Self {
            slug: UserSlug::from_raw(slug),
            id,
        })
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.slug, self.id)
    }

    #[must_use]
    pub const fn slug(&self) -> &UserSlug {
        &self.slug
    }

    #[must_use]
    pub const fn id(&self) -> i32 {
        self.id
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slug, self.id)
    }
}

/// Folds accented Latin characters to plain ASCII and drops everything else
/// non-ASCII, approximating a compatibility decomposition followed by an
/// ASCII re-encode. Covers the Latin-1 and Latin Extended-A ranges Portuguese
/// names draw from.
#[must_use]
pub fn ascii_fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii() {
            out.push(ch);
            continue;
        }
        let folded: &str = match ch {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
            'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
            'É' | 'È' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "E",
            'í' | 'ì' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => "i",
            'Í' | 'Ì' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' => "I",
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "O",
            'ú' | 'ù' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
            'Ú' | 'Ù' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
            'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
            'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "C",
            'ñ' | 'ń' | 'ņ' | 'ň' => "n",
            'Ñ' | 'Ń' | 'Ņ' | 'Ň' => "N",
            'ý' | 'ÿ' => "y",
            'Ý' | 'Ÿ' => "Y",
            'ß' => "ss",
            'æ' => "ae",
            'Æ' => "AE",
            'œ' => "oe",
            'Œ' => "OE",
            'ð' | 'đ' => "d",
            'Ð' | 'Đ' => "D",
            'þ' => "th",
            'Þ' => "Th",
            'š' | 'ś' | 'ş' => "s",
            'Š' | 'Ś' | 'Ş' => "S",
            'ž' | 'ź' | 'ż' => "z",
            'Ž' | 'Ź' | 'Ż' => "Z",
            'ğ' | 'ĝ' => "g",
            'Ğ' | 'Ĝ' => "G",
            'ł' => "l",
            'Ł' => "L",
            'ŕ' | 'ř' => "r",
            'Ŕ' | 'Ř' => "R",
            'ť' | 'ţ' => "t",
            'Ť' | 'Ţ' => "T",
            _ => "",
        };
        out.push_str(folded);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_is_deterministic() {
        let a = UserSlug::from_name("João da Silva");
        let b = UserSlug::from_name("João da Silva");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("joao-da-silva-"));
        let suffix = a.as_str().rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_slug_distinguishes_fold_collisions() {
        let accented = UserSlug::from_name("José");
        let plain = UserSlug::from_name("Jose");
        assert_ne!(accented, plain);
        assert!(accented.as_str().starts_with("jose-"));
        assert!(plain.as_str().starts_with("jose-"));
    }

    #[test]
    fn test_slug_empty_and_symbolic_names() {
        let empty = UserSlug::from_name("");
        assert!(empty.as_str().starts_with("user-"));

        let symbols = UserSlug::from_name("@@@");
        assert!(symbols.as_str().starts_with("user-"));
        // hash still comes from the original text, so they differ
        assert_ne!(empty, symbols);
    }

    #[test]
    fn test_db_file_names_round_trip() {
        let slug = UserSlug::from_name("Maria");
        let file = slug.db_file_name();
        assert!(file.starts_with("usuario_"));
        assert!(file.ends_with(".db"));
        assert_eq!(UserSlug::from_db_file_name(&file), Some(slug.clone()));
        assert_eq!(slug.archived_db_file_name(), format!("ARCHIVED_{file}"));
        assert_eq!(
            UserSlug::from_db_file_name(&slug.archived_db_file_name()),
            Some(slug.clone())
        );
        assert_eq!(UserSlug::from_db_file_name("notes.txt"), None);
        assert_eq!(UserSlug::from_db_file_name("usuario_.db"), None);
    }

    #[test]
    fn test_record_key_round_trip() {
        let key = RecordKey::new(UserSlug::from_name("Ana"), 42);
        let encoded = key.encode();
        assert_eq!(RecordKey::decode(&encoded), Some(key));
    }

    #[test]
    fn test_record_key_rejects_garbage() {
        assert_eq!(RecordKey::decode(""), None);
        assert_eq!(RecordKey::decode("no-separator"), None);
        assert_eq!(RecordKey::decode("slug:notanumber"), None);
        assert_eq!(RecordKey::decode("slug:12.5"), None);
    }

    #[test]
    fn test_ascii_fold() {
        assert_eq!(ascii_fold("João Conceição"), "Joao Conceicao");
        assert_eq!(ascii_fold("Müller"), "Muller");
        assert_eq!(ascii_fold("plain"), "plain");
        assert_eq!(ascii_fold("日本"), "");
    }
}
