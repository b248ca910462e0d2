//! Rearranging MIF data to match how the memories are banked in hardware.
//!
//! Both transforms work on an already parsed [`MifDocument`] and never touch
//! its header lines, so they can be chained in any order.

use derive_more::IsVariant;

use crate::{
    error::{Error, Result},
    mif::{MifDocument, MifEntry},
};

pub const DEFAULT_GROUP_SIZE: usize = 256;
/// Digits in one nibble group
pub const NIBBLE_GROUP_DIGITS: usize = 4;
/// A word is only reversed when it holds exactly this many groups
pub const NIBBLE_GROUPS_PER_WORD: usize = 16;

/// What to do with data lines that do not fill a whole group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IsVariant, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingGroup {
    /// drop them (logged)
    #[default]
    Discard,
    /// fail with `MalformedRecord`
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupReversal {
    pub group_size: usize,
    pub trailing: TrailingGroup,
}

impl Default for GroupReversal {
    fn default() -> Self {
        return Self {
            group_size: DEFAULT_GROUP_SIZE,
            trailing: TrailingGroup::Discard,
        };
    }
}

impl GroupReversal {
    pub fn new(group_size: usize, trailing: TrailingGroup) -> Self {
        return Self {
            group_size,
            trailing,
        };
    }

    /// Reverses the order of `group_size` line groups, keeping the order of
    /// lines inside each group, and renumbers addresses from 0.
    pub fn apply(&self, entries: &[MifEntry]) -> Result<Vec<MifEntry>> {
        if self.group_size == 0 {
            return Err(Error::malformed(0, "group size must be at least 1"));
        }
        let leftover = entries.len() % self.group_size;
        if leftover != 0 {
            match self.trailing {
                TrailingGroup::Discard => log::warn!(
                    "discarding {leftover} trailing lines that do not fill a group of {}",
                    self.group_size
                ),
                TrailingGroup::Reject => {
                    return Err(Error::malformed(
                        entries.len() - leftover + 1,
                        format!("{leftover} lines do not fill a group of {}", self.group_size),
                    ))
                }
            }
        }
        let groups: Vec<&[MifEntry]> = entries.chunks_exact(self.group_size).collect();
        log::debug!("reversing {} groups of {}", groups.len(), self.group_size);
        return Ok(groups
            .into_iter()
            .rev()
            .flatten()
            .enumerate()
            .map(|(address, entry)| MifEntry {
                address,
                value: entry.value.clone(),
            })
            .collect());
    }

    pub fn apply_document(&self, doc: &MifDocument) -> Result<MifDocument> {
        return Ok(MifDocument {
            header_lines: doc.header_lines.clone(),
            header: doc.header.clone(),
            entries: self.apply(&doc.entries)?,
        });
    }
}

/// Reverses the order of the 4 digit groups of a word made of exactly 16 of
/// them. Any other word is returned unchanged.
pub fn reverse_nibble_groups(word: &str) -> String {
    let groups: Vec<&str> = word
        .as_bytes()
        .chunks(NIBBLE_GROUP_DIGITS)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    let whole = groups.len() == NIBBLE_GROUPS_PER_WORD
        && groups.iter().all(|g| g.len() == NIBBLE_GROUP_DIGITS);
    if !whole {
        return word.to_string();
    }
    return groups.into_iter().rev().collect();
}

/// [`reverse_nibble_groups`] on every data line, addresses unchanged
pub fn reverse_document_nibbles(doc: &MifDocument) -> MifDocument {
    let mut reversed = 0;
    let entries = doc
        .entries
        .iter()
        .map(|entry| {
            let value = reverse_nibble_groups(&entry.value);
            if value != entry.value {
                reversed += 1;
            }
            MifEntry {
                address: entry.address,
                value,
            }
        })
        .collect();
    log::debug!("reversed nibble groups of {reversed}/{} words", doc.entries.len());
    return MifDocument {
        header_lines: doc.header_lines.clone(),
        header: doc.header.clone(),
        entries,
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mif::MifImage;

    fn document(lines: usize) -> MifDocument {
        let words: Vec<String> = (0..lines).map(|i| format!("{i:04X}")).collect();
        return MifDocument::parse(&MifImage::new(16, 0x100, &words).unwrap().to_mif_string()).unwrap();
    }

    #[test]
    fn two_groups_swap_places() {
        let doc = document(32);
        let out = GroupReversal::new(16, TrailingGroup::Discard)
            .apply_document(&doc)
            .unwrap();
        assert_eq!(out.entries.len(), 32);
        assert_eq!(out.entries[0].value, doc.entries[16].value);
        assert_eq!(out.entries[15].value, doc.entries[31].value);
        assert_eq!(out.entries[16].value, doc.entries[0].value);
        let addresses: Vec<usize> = out.entries.iter().map(|e| e.address).collect();
        assert_eq!(addresses, (0..32).collect::<Vec<_>>());
        assert_eq!(out.header_lines, doc.header_lines);
    }

    #[test]
    fn trailing_partial_group_is_dropped() {
        let doc = document(17);
        let out = GroupReversal::new(16, TrailingGroup::Discard)
            .apply(&doc.entries)
            .unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(doc.entries.len() - out.len(), 1);
        assert!(out.iter().all(|e| e.value != "0010"));
    }

    #[test]
    fn trailing_partial_group_can_be_rejected() {
        let doc = document(17);
        let err = GroupReversal::new(16, TrailingGroup::Reject)
            .apply(&doc.entries)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 17, .. }));
    }

    #[test]
    fn zero_group_size_is_an_error() {
        let doc = document(4);
        assert!(GroupReversal::new(0, TrailingGroup::Discard)
            .apply(&doc.entries)
            .is_err());
    }

    #[test]
    fn nibble_groups_reverse() {
        let groups: Vec<String> = (0..16).map(|i| format!("{:04X}", 0x1110 * (i % 15) + i)).collect();
        let word: String = groups.concat();
        let expected: String = groups.iter().rev().cloned().collect();
        assert_eq!(reverse_nibble_groups(&word), expected);
        assert_eq!(reverse_nibble_groups(&expected), word);
    }

    #[test]
    fn malformed_words_pass_through() {
        let short = "ABCD".repeat(14) + "0123";
        let long = "ABCD".repeat(16) + "0123";
        let ragged = "ABCD".repeat(15) + "012";
        assert_eq!(reverse_nibble_groups(&short), short);
        assert_eq!(reverse_nibble_groups(&long), long);
        assert_eq!(reverse_nibble_groups(&ragged), ragged);
        assert_eq!(reverse_nibble_groups("00FF"), "00FF");
    }

    #[test]
    fn document_nibbles_keep_addresses() {
        let wide = MifImage::new(256, 0x10, &["0001".repeat(15) + "FFFF", "12".to_string()]).unwrap();
        let doc = MifDocument::parse(&wide.to_mif_string()).unwrap();
        let out = reverse_document_nibbles(&doc);
        assert_eq!(out.entries[0].address, 0x10);
        assert_eq!(out.entries[0].value, "FFFF".to_string() + &"0001".repeat(15));
        // padded to 64 digits by the writer, so it is reversed too
        assert_eq!(out.entries[1].address, 0x11);
        assert!(out.entries[1].value.starts_with("0012"));
    }
}
