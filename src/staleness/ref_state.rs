//! Recorded ref states
//!
//! Wire form is the UTF-8 string `<project>:<ref>:<sha1-hex>`. An absent ref
//! is recorded with the all-zero id.

use std::collections::BTreeMap;
use std::fmt;

use super::errors::{StalenessError, StalenessResult};

const ID_LEN: usize = 20;

/// 20-byte git object id
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ID_LEN]);

impl ObjectId {
    /// Sentinel for "ref absent"
    pub const ZERO: ObjectId = ObjectId([0; ID_LEN]);

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        ObjectId(bytes)
    }

    /// Parses 40 hex characters, either case
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != ID_LEN * 2 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut bytes = [0u8; ID_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(ObjectId(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

/// A ref and the id it pointed at when the document was indexed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefState {
    pub ref_name: String,
    pub id: ObjectId,
}

impl RefState {
    /// `None` records the ref as absent
    pub fn new(ref_name: impl Into<String>, id: Option<ObjectId>) -> Self {
        Self {
            ref_name: ref_name.into(),
            id: id.unwrap_or(ObjectId::ZERO),
        }
    }

    /// Parses wire entries, grouped by project.
    ///
    /// Duplicates are kept in input order. Any malformed entry fails the
    /// whole batch.
    pub fn parse_states<I, B>(entries: I) -> StalenessResult<BTreeMap<String, Vec<RefState>>>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut out: BTreeMap<String, Vec<RefState>> = BTreeMap::new();
        for entry in entries {
            let (project, state) = Self::parse_one(entry.as_ref())?;
            out.entry(project).or_default().push(state);
        }
        Ok(out)
    }

    fn parse_one(raw: &[u8]) -> StalenessResult<(String, RefState)> {
        let text = std::str::from_utf8(raw).map_err(|_| {
            StalenessError::InvalidRefState(String::from_utf8_lossy(raw).into_owned())
        })?;
        let invalid = || StalenessError::InvalidRefState(text.to_string());

        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let (project, ref_name, sha) = (parts[0], parts[1], parts[2]);
        if project.is_empty() || ref_name.is_empty() {
            return Err(invalid());
        }
        let id = ObjectId::from_hex(sha).ok_or_else(invalid)?;
        Ok((project.to_string(), RefState::new(ref_name, Some(id))))
    }

    /// Wire form for `project`
    pub fn to_byte_array(&self, project: &str) -> Vec<u8> {
        format!("{}:{}:{}", project, self.ref_name, self.id.to_hex()).into_bytes()
    }
}
