use super::finder::{
    check_timing_line, group_finders, locate_finders, scan_region, FinderGroup, Pattern,
    PatternKind,
};
use super::perspective::{sample_grid, Perspective};
use crate::common::matrix::BitMatrix;

// Detection
//------------------------------------------------------------------------------

#[derive(Debug)]
pub struct Detection {
    /// Resampled module matrix, one bit per module
    pub matrix: BitMatrix,
    pub finder: FinderGroup,
    pub alignment: Option<Pattern>,
}

/// Symbols below this size carry no alignment pattern to search for.
const MIN_ALIGNMENT_SIZE: usize = 25;

// Alignment search
//------------------------------------------------------------------------------

/// Alignment anchor candidates for a group: the two best-ranked patterns
/// in the predicted region, then the bare prediction as a fallback.
fn alignment_candidates(img: &BitMatrix, group: &FinderGroup) -> Vec<Option<Pattern>> {
    let size = group.size as f64;
    let (tl, tr, bl) = (&group.tl, &group.tr, &group.bl);
    let br = (tr.x + bl.x - tl.x, tr.y + bl.y - tl.y);

    // The bottom-right alignment center sits 6.5 modules inside the
    // estimated corner
    let factor = 1.0 - 3.0 / (size - 7.0);
    let prediction = (tl.x + (br.0 - tl.x) * factor, tl.y + (br.1 - tl.y) * factor);

    let radius = (size / 4.0).min(20.0) * group.module_size;
    let left = (prediction.0 - radius).floor().max(0.0) as usize;
    let top = (prediction.1 - radius).floor().max(0.0) as usize;
    let right = (prediction.0 + radius).ceil() as usize;
    let bottom = (prediction.1 + radius).ceil() as usize;

    let mut found = scan_region(img, PatternKind::Alignment, left, top, right, bottom);

    found.sort_by(|a, b| {
        let rank = |p: &Pattern| {
            let dist = ((p.x - prediction.0).powi(2) + (p.y - prediction.1).powi(2)).sqrt();
            let size_diff = (p.module_size - group.module_size).abs();
            (dist + size_diff) * (1.0 + p.noise)
        };
        rank(a).partial_cmp(&rank(b)).expect("ranks are finite")
    });

    let mut candidates: Vec<Option<Pattern>> = found.into_iter().take(2).map(Some).collect();
    // Prediction fallback, sampled as if an alignment had been found
    candidates.push(Some(Pattern {
        x: prediction.0,
        y: prediction.1,
        module_size: group.module_size,
        noise: 0.0,
        combined: 0,
    }));
    candidates
}

// Detector
//------------------------------------------------------------------------------

/// Caller-driven detection cursor. Every call to `advance` reports how
/// the previous detection fared and receives the next candidate, until
/// the finder groups are exhausted.
pub struct Detector<'a> {
    img: &'a BitMatrix,
    groups: Vec<FinderGroup>,
    group_idx: usize,
    candidates: Vec<Option<Pattern>>,
    candidate_idx: usize,
    used: Vec<(f64, f64)>,
    started: bool,
}

impl<'a> Detector<'a> {
    pub fn new(img: &'a BitMatrix) -> Self {
        let finders = locate_finders(img);
        let groups = group_finders(img, &finders);
        Self {
            img,
            groups,
            group_idx: 0,
            candidates: Vec::new(),
            candidate_idx: 0,
            used: Vec::new(),
            started: false,
        }
    }

    /// `success` reports whether the previously yielded detection
    /// decoded; it advances past the whole group instead of just the
    /// next alignment candidate.
    pub fn advance(&mut self, success: bool) -> Option<Detection> {
        if self.started && self.group_idx < self.groups.len() {
            if success {
                let g = &self.groups[self.group_idx];
                self.used.push((g.tl.x, g.tl.y));
                self.used.push((g.tr.x, g.tr.y));
                self.used.push((g.bl.x, g.bl.y));
                self.next_group();
            } else {
                self.candidate_idx += 1;
            }
        }
        self.started = true;

        while self.group_idx < self.groups.len() {
            if self.group_uses_spent_finder() {
                self.next_group();
                continue;
            }

            if self.candidates.is_empty() {
                let group = self.groups[self.group_idx].clone();
                self.candidates = if group.size < MIN_ALIGNMENT_SIZE {
                    vec![None]
                } else {
                    alignment_candidates(self.img, &group)
                };
            }

            while self.candidate_idx < self.candidates.len() {
                let alignment = self.candidates[self.candidate_idx];
                let group = &self.groups[self.group_idx];
                if let Some(matrix) = sample_symbol(self.img, group, alignment.as_ref()) {
                    return Some(Detection { matrix, finder: group.clone(), alignment });
                }
                self.candidate_idx += 1;
            }

            self.next_group();
        }

        None
    }

    fn next_group(&mut self) {
        self.group_idx += 1;
        self.candidate_idx = 0;
        self.candidates.clear();
    }

    fn group_uses_spent_finder(&self) -> bool {
        let g = &self.groups[self.group_idx];
        let near = |p: &Pattern| {
            self.used.iter().any(|(ux, uy)| {
                (p.x - ux).abs() <= p.module_size && (p.y - uy).abs() <= p.module_size
            })
        };
        near(&g.tl) || near(&g.tr) || near(&g.bl)
    }
}

/// Builds the projective map for a group (with or without an alignment
/// anchor), validates the mapped timing lines and resamples the grid.
fn sample_symbol(
    img: &BitMatrix,
    group: &FinderGroup,
    alignment: Option<&Pattern>,
) -> Option<BitMatrix> {
    let size = group.size as f64;
    let (tl, tr, bl) = (&group.tl, &group.tr, &group.bl);

    let (src_br, dst_br) = match alignment {
        Some(p) => ((size - 6.5, size - 6.5), (p.x, p.y)),
        None => ((size - 3.5, size - 3.5), (tr.x + bl.x - tl.x, tr.y + bl.y - tl.y)),
    };

    let src = [(3.5, 3.5), (size - 3.5, 3.5), src_br, (3.5, size - 3.5)];
    let dst = [(tl.x, tl.y), (tr.x, tr.y), dst_br, (bl.x, bl.y)];
    let transform = Perspective::quad_to_quad(src, dst);

    // The mapped timing lines have to look like timing lines before the
    // sample is trusted
    let h_from = transform.transform(3.5, 6.5)?;
    let h_to = transform.transform(size - 3.5, 6.5)?;
    let v_from = transform.transform(6.5, 3.5)?;
    let v_to = transform.transform(6.5, size - 3.5)?;
    if !check_timing_line(img, h_from, h_to, group.size)
        || !check_timing_line(img, v_from, v_to, group.size)
    {
        return None;
    }

    sample_grid(img, &transform, group.size)
}
