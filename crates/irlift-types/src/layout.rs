//! Structure layout reconstruction.
//!
//! The host reports structure members as `(offset, width, type)` triples
//! and a total width. Gaps between members are not reported, so they are
//! rebuilt here as explicit padding elements.

use std::collections::BTreeMap;

use tracing::warn;

use crate::TypeId;

/// A member as reported by the host, with its normalized type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberSpan {
    pub offset: u64,
    pub width: u64,
    pub ty: TypeId,
}

/// One element of a laid-out structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutElement {
    Member(TypeId),
    Padding(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Not covered by any member; counts as padding.
    Unclaimed,
    /// Covered by a member that starts earlier.
    Claimed,
    /// First byte of a member.
    Member(TypeId),
}

/// Byte states of a structure as runs: each key starts a run that lasts
/// until the next key. The run at `width` is a claimed sentinel.
struct Runs {
    starts: BTreeMap<u64, Slot>,
}

impl Runs {
    fn new(width: u64) -> Self {
        let mut starts = BTreeMap::new();
        starts.insert(0, Slot::Unclaimed);
        starts.insert(width, Slot::Claimed);
        Self { starts }
    }

    /// State of the byte at `at`.
    fn state_at(&self, at: u64) -> Slot {
        self.starts
            .range(..=at)
            .next_back()
            .map_or(Slot::Unclaimed, |(_, slot)| *slot)
    }

    /// Set every byte in `[start, end)` to `slot`.
    fn paint(&mut self, start: u64, end: u64, slot: Slot) {
        if start >= end {
            return;
        }
        let resume = self.state_at(end);
        let covered: Vec<u64> = self.starts.range(start..end).map(|(at, _)| *at).collect();
        for at in covered {
            self.starts.remove(&at);
        }
        self.starts.entry(end).or_insert(resume);
        self.starts.insert(start, slot);
    }

    /// `(start, length, state)` of each run below the sentinel.
    fn iter(&self) -> impl Iterator<Item = (u64, u64, Slot)> + '_ {
        let ends = self.starts.keys().skip(1).copied();
        self.starts
            .iter()
            .zip(ends)
            .map(|((at, slot), end)| (*at, end - at, *slot))
    }
}

/// Lay out a structure of `width` bytes.
///
/// Members are applied in the given order. A later member overwrites the
/// claims of an earlier one where they overlap, so for overlapping members
/// the result depends on host member order. Member ranges are clamped to
/// the structure; members starting past the end are dropped.
///
/// Each maximal run of non-member bytes becomes one padding element sized
/// by the number of unclaimed bytes in the run. Work is proportional to the
/// number of members, not to the width.
pub fn plan_structure(width: u64, members: &[MemberSpan]) -> Vec<LayoutElement> {
    let mut runs = Runs::new(width);

    for member in members {
        if member.offset >= width {
            warn!(
                offset = member.offset,
                width, "structure member starts past the end of the structure, dropping it"
            );
            continue;
        }
        let end = member
            .offset
            .checked_add(member.width)
            .map_or(width, |end| end.min(width));
        runs.paint(member.offset, end, Slot::Claimed);
        runs.paint(member.offset, member.offset + 1, Slot::Member(member.ty));
    }

    let mut elements = Vec::new();
    let mut padding = 0u64;
    for (_, len, slot) in runs.iter() {
        match slot {
            // Member runs are one byte wide.
            Slot::Member(ty) => {
                if padding > 0 {
                    elements.push(LayoutElement::Padding(padding));
                    padding = 0;
                }
                elements.push(LayoutElement::Member(ty));
            }
            Slot::Unclaimed => padding += len,
            Slot::Claimed => {}
        }
    }
    if padding > 0 {
        elements.push(LayoutElement::Padding(padding));
    }

    elements
}
