use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Canonical edge type `(source category, relation, destination category)`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct EdgeType {
    pub src: String,
    pub relation: String,
    pub dst: String,
}
impl EdgeType {
    pub fn new(src: impl Into<String>, relation: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            relation: relation.into(),
            dst: dst.into(),
        }
    }
}
impl From<(&str, &str, &str)> for EdgeType {
    fn from((src, relation, dst): (&str, &str, &str)) -> Self {
        Self::new(src, relation, dst)
    }
}
impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.src, self.relation, self.dst)
    }
}

/// A path template over edge types. Consecutive hops always share a category.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EdgeType>", into = "Vec<EdgeType>")]
pub struct Metapath(Vec<EdgeType>);

impl Metapath {
    pub fn new(hops: Vec<EdgeType>) -> Result<Self> {
        if hops.is_empty() {
            return Err(Error::InvalidConfig("metapath must have at least one hop".into()));
        }
        for (a, b) in hops.iter().tuple_windows() {
            if a.dst != b.src {
                return Err(Error::InvalidConfig(format!(
                    "metapath hops {a} and {b} are not contiguous"
                )));
            }
        }
        Ok(Self(hops))
    }
    pub fn hops(&self) -> &[EdgeType] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn start(&self) -> &str {
        &self.0[0].src
    }
    pub fn end(&self) -> &str {
        &self.0[self.0.len() - 1].dst
    }
}
impl TryFrom<Vec<EdgeType>> for Metapath {
    type Error = Error;
    fn try_from(hops: Vec<EdgeType>) -> Result<Self> {
        Self::new(hops)
    }
}
impl From<Metapath> for Vec<EdgeType> {
    fn from(metapath: Metapath) -> Self {
        metapath.0
    }
}
impl fmt::Display for Metapath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.start())?;
        for hop in &self.0 {
            write!(f, " -{}-> {}", hop.relation, hop.dst)?;
        }
        Ok(())
    }
}

/// Enumerates `category -> X -> category` metapaths where `X != category`.
///
/// The first hop is the outer loop and the second the inner one, both in the
/// order of `etypes`.
pub fn two_hop_metapaths(etypes: &[EdgeType], category: &str) -> Vec<Metapath> {
    let mut metapaths = Vec::new();
    for first in etypes.iter().filter(|e| e.src == category && e.dst != e.src) {
        for second in etypes
            .iter()
            .filter(|e| e.src == first.dst && e.dst == first.src)
        {
            metapaths.push(Metapath(vec![first.clone(), second.clone()]));
        }
    }
    metapaths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn etypes(triples: &[(&str, &str, &str)]) -> Vec<EdgeType> {
        triples.iter().map(|&t| t.into()).collect()
    }

    #[test]
    fn single_round_trip_metapath() {
        let etypes = etypes(&[("A", "ab", "B"), ("B", "ba", "A")]);
        let mps = two_hop_metapaths(&etypes, "A");
        assert_eq!(mps.len(), 1);
        assert_eq!(mps[0].hops(), &etypes[..]);
        assert_eq!(mps[0].start(), "A");
        assert_eq!(mps[0].end(), "A");
    }

    #[test]
    fn self_loops_are_skipped() {
        let etypes = etypes(&[("A", "cites", "A"), ("A", "ab", "B"), ("B", "ba", "A")]);
        let mps = two_hop_metapaths(&etypes, "A");
        assert_eq!(mps.len(), 1);
        assert!(mps[0].hops().iter().all(|e| e.relation != "cites"));
    }

    #[test]
    fn enumeration_order_follows_edge_types() {
        let etypes = etypes(&[
            ("author", "to", "paper"),
            ("author", "to", "venue"),
            ("paper", "to", "author"),
            ("paper", "cited-by", "author"),
            ("venue", "to", "author"),
        ]);
        let mps = two_hop_metapaths(&etypes, "author");
        let names: Vec<String> = mps.iter().map(|m| m.to_string()).collect();
        assert_eq!(
            names,
            [
                "author -to-> paper -to-> author",
                "author -to-> paper -cited-by-> author",
                "author -to-> venue -to-> author",
            ]
        );
    }

    #[test]
    fn no_metapaths_for_unreachable_category() {
        let etypes = etypes(&[("A", "ab", "B")]);
        assert!(two_hop_metapaths(&etypes, "A").is_empty());
        assert!(two_hop_metapaths(&etypes, "C").is_empty());
    }

    #[test]
    fn non_contiguous_metapath_is_rejected() {
        let hops = etypes(&[("A", "ab", "B"), ("C", "ca", "A")]);
        assert!(matches!(Metapath::new(hops), Err(Error::InvalidConfig(_))));
        assert!(Metapath::new(vec![]).is_err());
    }

    #[test]
    fn metapath_deserializes_with_validation() {
        let ok: Metapath =
            serde_json::from_str(r#"[{"src":"A","relation":"ab","dst":"B"},{"src":"B","relation":"ba","dst":"A"}]"#)
                .unwrap();
        assert_eq!(ok.len(), 2);
        let bad = serde_json::from_str::<Metapath>(
            r#"[{"src":"A","relation":"ab","dst":"B"},{"src":"A","relation":"ab","dst":"B"}]"#,
        );
        assert!(bad.is_err());
    }
}
