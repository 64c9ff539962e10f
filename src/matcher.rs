//! Sender-name to member resolution.
//!
//! Display names in a transcript rarely equal the registered full name, so
//! resolution runs three tiers in order (exact, containment, first/last
//! token). Within a tier the directory is scanned in its given order and the
//! first qualifying member wins.

use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::models::{MemberDirectoryEntry, SenderMatches};

/// Which tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Normalized names are equal
    Exact,
    /// One normalized name contains the other
    Containment,
    /// Same first token and compatible last token
    FirstLastToken,
}

struct CleanedMember<'a> {
    id: &'a str,
    name: String,
}

/// Resolves sender names against a member directory
#[derive(Debug, Clone)]
pub struct IdentityMatcher {
    special_chars_regex: Regex,
    extra_spaces_regex: Regex,
}

impl IdentityMatcher {
    /// Compile the normalization patterns
    pub fn new() -> Result<Self> {
        Ok(Self {
            special_chars_regex: Regex::new(r"[^\w\s]")?,
            extra_spaces_regex: Regex::new(r"\s+")?,
        })
    }

    /// Normalize a name for comparison: lower-case, drop anything that is not
    /// a word character or whitespace, collapse whitespace runs, trim.
    #[must_use]
    pub fn clean_name(&self, name: &str) -> String {
        let lower = name.nfc().collect::<String>().to_lowercase();
        let no_special = self.special_chars_regex.replace_all(&lower, "");
        self.extra_spaces_regex
            .replace_all(&no_special, " ")
            .trim()
            .to_string()
    }

    /// Resolve every distinct sender name once.
    ///
    /// Duplicate names in `sender_names` are resolved only on first sight.
    pub fn match_senders<'a, I>(
        &self,
        sender_names: I,
        directory: &[MemberDirectoryEntry],
    ) -> SenderMatches
    where
        I: IntoIterator<Item = &'a str>,
    {
        let members = self.clean_directory(directory);

        let mut matches = SenderMatches::default();
        for sender in sender_names {
            if matches.contains(sender) {
                continue;
            }
            let resolved = self.resolve(sender, &members);
            if let Some((id, tier)) = resolved {
                debug!(sender, member_id = id, ?tier, "Sender resolved");
            }
            matches.insert(sender, resolved.map(|(id, _)| id.to_string()));
        }
        matches
    }

    /// Resolve a single sender name, reporting the tier that matched
    #[must_use]
    pub fn find_member<'d>(
        &self,
        sender_name: &str,
        directory: &'d [MemberDirectoryEntry],
    ) -> Option<(&'d MemberDirectoryEntry, MatchTier)> {
        let members = self.clean_directory(directory);

        let (id, tier) = self.resolve(sender_name, &members)?;
        directory
            .iter()
            .find(|member| member.id == id)
            .map(|member| (member, tier))
    }

    /// Normalize member names once per run; members whose name cleans to
    /// nothing are left out.
    fn clean_directory<'d>(&self, directory: &'d [MemberDirectoryEntry]) -> Vec<CleanedMember<'d>> {
        directory
            .iter()
            .map(|member| CleanedMember {
                id: member.id.as_str(),
                name: self.clean_name(&member.full_name),
            })
            .filter(|member| !member.name.is_empty())
            .collect()
    }

    fn resolve<'m>(
        &self,
        sender_name: &str,
        members: &[CleanedMember<'m>],
    ) -> Option<(&'m str, MatchTier)> {
        let sender = self.clean_name(sender_name);
        if sender.is_empty() {
            return None;
        }

        if let Some(member) = members.iter().find(|m| m.name == sender) {
            return Some((member.id, MatchTier::Exact));
        }

        if let Some(member) = members
            .iter()
            .find(|m| sender.contains(m.name.as_str()) || m.name.contains(sender.as_str()))
        {
            return Some((member.id, MatchTier::Containment));
        }

        let sender_tokens: Vec<&str> = sender.split(' ').collect();
        members
            .iter()
            .find(|m| {
                let member_tokens: Vec<&str> = m.name.split(' ').collect();
                first_last_compatible(&sender_tokens, &member_tokens)
            })
            .map(|member| (member.id, MatchTier::FirstLastToken))
    }
}

fn first_last_compatible(sender: &[&str], member: &[&str]) -> bool {
    let (Some(sender_first), Some(member_first)) = (sender.first(), member.first()) else {
        return false;
    };
    if sender_first != member_first {
        return false;
    }
    sender.len() == 1 || member.len() == 1 || sender.last() == member.last()
}
