//! Delegated (triangle-pattern) matching.
//!
//! Frame 0 is the initial reference. Each later frame is matched against the
//! current reference by a [`PairMatcher`]; the matcher returns the matched
//! rows of both sides, in corresponding order. The matched reference side
//! becomes the reference for the next round, so reference IDs always stay in
//! frame 0's ID space and the surviving set can only shrink.

use tracing::info;

use super::MatchTable;
use crate::catalogs::Catalog;
use crate::{Error, Result};

/// Rows matched between a reference catalog and one frame catalog.
///
/// Row `i` of `reference` and row `i` of `frame` are the same object.
#[derive(Debug, Clone)]
pub struct PairMatch {
    pub reference: Catalog,
    pub frame: Catalog,
}

/// A pairwise catalog matcher, typically an external program.
pub trait PairMatcher {
    /// Match `frame` (the catalog of frame `frame_index`) against `reference`
    /// with tolerance `matchrad`.
    fn match_pair(
        &mut self,
        reference: &Catalog,
        frame: &Catalog,
        frame_index: usize,
        matchrad: f64,
    ) -> Result<PairMatch>;
}

/// Build the match table for `catalogs` (one per frame, frame 0 first).
pub fn match_frames(
    catalogs: &[Catalog],
    matcher: &mut dyn PairMatcher,
    matchrad: f64,
) -> Result<MatchTable> {
    if catalogs.len() < 2 {
        return Err(Error::TooFewFrames {
            frames: catalogs.len(),
        });
    }
    if let Some(frame) = catalogs.iter().position(Catalog::is_empty) {
        return Err(Error::EmptyCatalog { frame });
    }

    let mut table = MatchTable::new();
    let mut reference = catalogs[0].clone();

    for (frame_index, frame) in catalogs.iter().enumerate().skip(1) {
        let matched = matcher.match_pair(&reference, frame, frame_index, matchrad)?;
        if matched.reference.is_empty() || matched.frame.is_empty() {
            return Err(Error::EmptyCatalog { frame: frame_index });
        }

        table.extend(matched.reference.ids(), matched.frame.ids().to_vec())?;
        info!(
            "Frame {}: {} objects matched in all frames so far",
            frame_index,
            table.n_objects()
        );

        reference = matched.reference;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::catalogs::CoordKind;
    use crate::ErrorKind;

    /// Matches rows whose first payload column (an object tag) agrees,
    /// optionally hiding some tags in chosen frames.
    struct TagMatcher {
        hidden: Vec<(usize, f64)>,
        rounds: Vec<usize>,
    }

    impl PairMatcher for TagMatcher {
        fn match_pair(
            &mut self,
            reference: &Catalog,
            frame: &Catalog,
            frame_index: usize,
            _matchrad: f64,
        ) -> Result<PairMatch> {
            let mut ref_rows = Vec::new();
            let mut frame_ids = Vec::new();
            for (row, &tag) in reference.extra()[0].iter().enumerate() {
                if self.hidden.contains(&(frame_index, tag)) {
                    continue;
                }
                if let Some(frow) = frame.extra()[0].iter().position(|&t| t == tag) {
                    ref_rows.push(reference.ids()[row]);
                    frame_ids.push(frame.ids()[frow]);
                }
            }
            self.rounds.push(ref_rows.len());
            Ok(PairMatch {
                reference: reference.select(&ref_rows)?,
                frame: frame.select(&frame_ids)?,
            })
        }
    }

    fn tagged(ids: &[u64], tags: &[f64]) -> Catalog {
        Catalog::new(
            CoordKind::Pixel,
            ids.to_vec(),
            vec![0.0; ids.len()],
            vec![0.0; ids.len()],
            vec![tags.to_vec()],
        )
        .unwrap()
    }

    fn catalogs() -> Vec<Catalog> {
        vec![
            tagged(&[1, 2, 3, 4], &[100.0, 200.0, 300.0, 400.0]),
            tagged(&[1, 2, 3, 4, 5], &[400.0, 500.0, 300.0, 100.0, 200.0]),
            tagged(&[1, 2, 3], &[300.0, 200.0, 400.0]),
            tagged(&[1, 2, 3, 4], &[200.0, 400.0, 300.0, 100.0]),
        ]
    }

    #[test]
    fn columns_stay_aligned_to_the_same_object() {
        let cats = catalogs();
        let mut matcher = TagMatcher {
            hidden: vec![(3, 300.0)],
            rounds: Vec::new(),
        };
        let table = match_frames(&cats, &mut matcher, 1.0).unwrap();

        assert_eq!(table.n_frames(), 4);
        // 100 is missing from frame 2, 300 is hidden in frame 3.
        assert_eq!(table.n_objects(), 2);

        for object in 0..table.n_objects() {
            let tags: HashSet<u64> = (0..table.n_frames())
                .map(|f| {
                    let cat = &cats[f];
                    let row = cat.row_of(table.id(f, object)).unwrap();
                    cat.extra()[0][row] as u64
                })
                .collect();
            assert_eq!(tags.len(), 1, "object {object} mixes physical sources");
        }
    }

    #[test]
    fn surviving_count_is_non_increasing() {
        let mut matcher = TagMatcher {
            hidden: vec![(3, 300.0)],
            rounds: Vec::new(),
        };
        match_frames(&catalogs(), &mut matcher, 1.0).unwrap();
        assert_eq!(matcher.rounds, vec![4, 3, 2]);
        assert!(matcher.rounds.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn round_without_matches_is_fatal() {
        let mut cats = catalogs();
        cats[2] = tagged(&[1], &[999.0]);
        let mut matcher = TagMatcher {
            hidden: Vec::new(),
            rounds: Vec::new(),
        };
        let err = match_frames(&cats, &mut matcher, 1.0).unwrap_err();
        assert!(matches!(err, Error::EmptyCatalog { frame: 2 }));
    }

    #[test]
    fn empty_input_catalog_is_fatal() {
        let mut cats = catalogs();
        cats[1] = tagged(&[], &[]);
        let mut matcher = TagMatcher {
            hidden: Vec::new(),
            rounds: Vec::new(),
        };
        let err = match_frames(&cats, &mut matcher, 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCatalog);
    }

    /// Claims one extra pair beyond what the reference can hold.
    struct GreedyMatcher;

    impl PairMatcher for GreedyMatcher {
        fn match_pair(
            &mut self,
            reference: &Catalog,
            frame: &Catalog,
            frame_index: usize,
            _matchrad: f64,
        ) -> Result<PairMatch> {
            if frame_index == 1 {
                let n = reference.len().min(frame.len()).min(2);
                let ids: Vec<u64> = reference.ids()[..n].to_vec();
                let fids: Vec<u64> = frame.ids()[..n].to_vec();
                return Ok(PairMatch {
                    reference: reference.select(&ids)?,
                    frame: frame.select(&fids)?,
                });
            }
            let ids = vec![1, 2, 3];
            Ok(PairMatch {
                reference: tagged(&ids, &[0.0; 3]),
                frame: tagged(&ids, &[0.0; 3]),
            })
        }
    }

    #[test]
    fn too_many_matches_is_bad_match() {
        let err = match_frames(&catalogs(), &mut GreedyMatcher, 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMatch);
    }
}
