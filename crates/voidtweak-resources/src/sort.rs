//! Ordering of collected search results.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Entry, EntryRef, ResourceArchive};

/// Sort keys offered for result lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Keep index order.
    #[default]
    None,
    SizeAscending,
    SizeDescending,
    TypeAscending,
    TypeDescending,
    SrcAscending,
    SrcDescending,
    DstAscending,
    DstDescending,
}

impl SortOrder {
    /// All orders, in the order a UI would cycle through them.
    pub const ALL: [SortOrder; 9] = [
        SortOrder::None,
        SortOrder::SizeAscending,
        SortOrder::SizeDescending,
        SortOrder::TypeAscending,
        SortOrder::TypeDescending,
        SortOrder::SrcAscending,
        SortOrder::SrcDescending,
        SortOrder::DstAscending,
        SortOrder::DstDescending,
    ];

    /// Get the command-line name of this order.
    pub fn name(self) -> &'static str {
        match self {
            SortOrder::None => "none",
            SortOrder::SizeAscending => "size",
            SortOrder::SizeDescending => "size-desc",
            SortOrder::TypeAscending => "type",
            SortOrder::TypeDescending => "type-desc",
            SortOrder::SrcAscending => "src",
            SortOrder::SrcDescending => "src-desc",
            SortOrder::DstAscending => "dst",
            SortOrder::DstDescending => "dst-desc",
        }
    }

    /// Compare two entries under this order.
    pub fn compare(self, a: &Entry, b: &Entry) -> Ordering {
        match self {
            SortOrder::None => Ordering::Equal,
            SortOrder::SizeAscending => a.size.cmp(&b.size),
            SortOrder::SizeDescending => b.size.cmp(&a.size),
            SortOrder::TypeAscending => a.type_name.cmp(&b.type_name),
            SortOrder::TypeDescending => b.type_name.cmp(&a.type_name),
            SortOrder::SrcAscending => a.src.cmp(&b.src),
            SortOrder::SrcDescending => b.src.cmp(&a.src),
            SortOrder::DstAscending => a.dst.cmp(&b.dst),
            SortOrder::DstDescending => b.dst.cmp(&a.dst),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = SortOrder::ALL.iter().map(|o| o.name()).collect();
                format!("unknown sort order '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

impl ResourceArchive {
    /// Sort collected references by `order`.
    ///
    /// The sort is stable; references that no longer resolve keep their
    /// relative position at the end.
    pub fn sort_refs(&self, refs: &mut [EntryRef], order: SortOrder) {
        if order == SortOrder::None {
            return;
        }
        refs.sort_by(|a, b| match (self.get(*a), self.get(*b)) {
            (Ok(a), Ok(b)) => order.compare(a, b),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => Ordering::Equal,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for order in SortOrder::ALL {
            assert_eq!(order.name().parse::<SortOrder>().unwrap(), order);
        }
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_compare() {
        let small = Entry {
            container: 0,
            index: 0,
            index_pos: 0,
            id: 0,
            type_name: "b".to_string(),
            src: "z".to_string(),
            dst: "a".to_string(),
            resource_pos: 0,
            size: 1,
            size_packed: 1,
            flags1: 0,
            flags2: 0,
        };
        let large = Entry {
            type_name: "a".to_string(),
            src: "y".to_string(),
            dst: "b".to_string(),
            size: 9,
            size_packed: 9,
            ..small.clone()
        };

        assert_eq!(SortOrder::SizeAscending.compare(&small, &large), Ordering::Less);
        assert_eq!(SortOrder::SizeDescending.compare(&small, &large), Ordering::Greater);
        assert_eq!(SortOrder::TypeAscending.compare(&small, &large), Ordering::Greater);
        assert_eq!(SortOrder::SrcDescending.compare(&small, &large), Ordering::Less);
        assert_eq!(SortOrder::DstAscending.compare(&small, &large), Ordering::Less);
        assert_eq!(SortOrder::None.compare(&small, &large), Ordering::Equal);
    }
}
