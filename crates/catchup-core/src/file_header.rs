//! Header sent ahead of every file in a store copy.
//!
//! The header names the file and declares the page alignment the receiver
//! must honour. Stores memory-map some files with a fixed page size, so a
//! receiver that ignores the alignment can leave a file whose last page is
//! short. An alignment of 1 means any layout will do.
//!
//! The header carries no checksum; integrity of the copy as a whole is the
//! transfer client's concern.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Alignment used when the sender does not ask for one.
pub const DEFAULT_ALIGNMENT: u32 = 1;

/// Name and required alignment of a transferred file.
///
/// Equality and hashing cover both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFileHeader")]
pub struct FileHeader {
    file_name: String,
    required_alignment: u32,
}

#[derive(Deserialize)]
struct RawFileHeader {
    file_name: String,
    #[serde(default = "default_alignment")]
    required_alignment: u32,
}

fn default_alignment() -> u32 {
    DEFAULT_ALIGNMENT
}

impl TryFrom<RawFileHeader> for FileHeader {
    type Error = CoreError;

    fn try_from(raw: RawFileHeader) -> Result<Self, Self::Error> {
        FileHeader::with_alignment(raw.file_name, raw.required_alignment)
    }
}

impl FileHeader {
    /// Header for a file with no alignment requirement.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            required_alignment: DEFAULT_ALIGNMENT,
        }
    }

    /// Header for a file that must be laid out on `required_alignment`-byte pages.
    pub fn with_alignment(
        file_name: impl Into<String>,
        required_alignment: u32,
    ) -> Result<Self, CoreError> {
        if required_alignment == 0 {
            return Err(CoreError::InvalidAlignment(required_alignment));
        }
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(CoreError::EmptyFileName);
        }
        Ok(Self {
            file_name,
            required_alignment,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn required_alignment(&self) -> u32 {
        self.required_alignment
    }

    /// Whether the receiver has to lay the file out on pages.
    pub fn is_aligned(&self) -> bool {
        self.required_alignment > DEFAULT_ALIGNMENT
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileHeader{{fileName='{}', requiredAlignment={}}}",
            self.file_name, self.required_alignment
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;
    use std::hash::{Hash, Hasher};

    fn hash_of(header: &FileHeader) -> u64 {
        let mut hasher = DefaultHasher::new();
        header.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_name_only_defaults_alignment_to_one() {
        let header = FileHeader::new("neostore.nodestore.db");
        assert_eq!(header.required_alignment(), 1);
        assert!(!header.is_aligned());
        assert_eq!(header, FileHeader::with_alignment("neostore.nodestore.db", 1).unwrap());
    }

    #[test]
    fn test_equality_covers_name_and_alignment() {
        let a = FileHeader::with_alignment("a.db", 8192).unwrap();
        let b = FileHeader::with_alignment("a.db", 8192).unwrap();
        let c = FileHeader::with_alignment("a.db", 4096).unwrap();
        let d = FileHeader::with_alignment("b.db", 8192).unwrap();

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
        assert_ne!(a, d);

        let set: HashSet<_> = [a, b, c, d].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_zero_alignment_rejected() {
        assert!(matches!(
            FileHeader::with_alignment("a.db", 0),
            Err(CoreError::InvalidAlignment(0))
        ));
        assert!(matches!(
            FileHeader::with_alignment("", 8),
            Err(CoreError::EmptyFileName)
        ));
    }

    #[test]
    fn test_deserialize_defaults_and_validates() {
        let header: FileHeader = serde_json::from_str(r#"{"file_name":"x.db"}"#).unwrap();
        assert_eq!(header, FileHeader::new("x.db"));

        let bad = serde_json::from_str::<FileHeader>(
            r#"{"file_name":"x.db","required_alignment":0}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_display() {
        let header = FileHeader::with_alignment("x.db", 8192).unwrap();
        assert_eq!(
            header.to_string(),
            "FileHeader{fileName='x.db', requiredAlignment=8192}"
        );
    }

    proptest! {
        #[test]
        fn test_equal_headers_hash_equal(
            name in "[a-z.]{1,16}",
            alignment in 1u32..=65536,
        ) {
            let a = FileHeader::with_alignment(name.clone(), alignment).unwrap();
            let b = FileHeader::with_alignment(name, alignment).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(hash_of(&a), hash_of(&b));
        }
    }
}
