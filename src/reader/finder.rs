use itertools::Itertools;

use crate::common::matrix::BitMatrix;

// Pattern
//------------------------------------------------------------------------------

/// Candidate concentric pattern center. Merged candidates accumulate in
/// `combined`; `noise` sums ratio deviation across scan directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pattern {
    pub x: f64,
    pub y: f64,
    pub module_size: f64,
    pub noise: f64,
    pub combined: u32,
}

impl Pattern {
    pub fn dist(&self, other: &Pattern) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// 1:1:3:1:1, strict diagonal verification
    Finder,
    /// 1:1:1, either diagonal suffices
    Alignment,
}

impl PatternKind {
    fn ratios(self) -> &'static [u32] {
        match self {
            Self::Finder => &[1, 1, 3, 1, 1],
            Self::Alignment => &[1, 1, 1],
        }
    }

    fn ratio_sum(self) -> u32 {
        self.ratios().iter().sum()
    }

    fn mid_ratio(self) -> u32 {
        self.ratios()[self.ratios().len() / 2]
    }
}

#[inline]
fn get(img: &BitMatrix, x: i32, y: i32) -> Option<bool> {
    if x < 0 || y < 0 || x as usize >= img.width() || y as usize >= img.height() {
        return None;
    }
    Some(img.get(x as usize, y as usize))
}

// Scanline ratio matcher
//------------------------------------------------------------------------------

/// Runs the ratio-windowed scanline over every row of a region, cross
/// checking each hit and merging nearby candidates.
pub fn scan_region(
    img: &BitMatrix,
    kind: PatternKind,
    left: usize,
    top: usize,
    right: usize,
    bottom: usize,
) -> Vec<Pattern> {
    let n = kind.ratios().len();
    let mut patterns: Vec<Pattern> = Vec::new();

    let right = right.min(img.width());
    let bottom = bottom.min(img.height());

    for y in top..bottom {
        // Ring of the last n completed run lengths
        let mut window = vec![0u32; n];
        let mut runs_seen = 0usize;
        let mut run_len = 0u32;
        let mut prev = None;

        for x in left..=right {
            // One virtual pixel past the edge flushes the final run
            let color = if x < right { img.get(x, y) } else { prev.map_or(false, |c: bool| !c) };

            if prev == Some(color) {
                run_len += 1;
                continue;
            }

            if prev.is_some() {
                window.rotate_left(1);
                window[n - 1] = run_len;
                runs_seen += 1;

                // The freshly completed run must be the pattern's last:
                // dark for 1:1:3:1:1, light for the loose 1:1:1
                let last_dark = !color;
                let want_dark = kind == PatternKind::Finder;
                if runs_seen >= n && last_dark == want_dark && ratio_fits(&window, kind) {
                    if let Some(cand) = match_pattern(img, x, y, &window, kind) {
                        merge_pattern(&mut patterns, cand, kind);
                    }
                }
            }

            prev = Some(color);
            run_len = 1;
        }
    }

    patterns
}

/// Every run must sit within (unit * 0.625 + 0.5) of its ideal width.
fn ratio_fits(window: &[u32], kind: PatternKind) -> bool {
    let total: u32 = window.iter().sum();
    if total < kind.ratio_sum() {
        return false;
    }
    let unit = total as f64 / kind.ratio_sum() as f64;
    let tolerance = unit * 0.625 + 0.5;

    kind.ratios()
        .iter()
        .zip(window.iter())
        .all(|(&r, &run)| (run as f64 - r as f64 * unit).abs() <= tolerance)
}

/// Center of the middle run, walking back from the end of the window.
fn center_from_end(window: &[u32], end: f64) -> f64 {
    let half = window.len() / 2;
    let tail: u32 = window[half + 1..].iter().sum();
    end - tail as f64 - window[half] as f64 / 2.0
}

/// Full verification of a scanline hit: vertical cross check, refined
/// horizontal check, diagonal checks, then noise scoring.
fn match_pattern(
    img: &BitMatrix,
    end_x: usize,
    y: usize,
    window: &[u32],
    kind: PatternKind,
) -> Option<Pattern> {
    let cx = center_from_end(window, end_x as f64);
    // No run in a verification pass may dwarf the triggering window
    let max_run = window.iter().sum::<u32>() * 2;

    // Vertical from the provisional center
    let (cy, v_runs) = cross_check(img, cx as i32, y as i32, 0, 1, kind, max_run)?;
    // Horizontal again with the refined y
    let (cx, h_runs) = cross_check(img, cx as i32, cy as i32, 1, 0, kind, max_run)?;

    let d1 = cross_check(img, cx as i32, cy as i32, 1, 1, kind, max_run);
    let d2 = cross_check(img, cx as i32, cy as i32, 1, -1, kind, max_run);
    match kind {
        PatternKind::Finder if d1.is_none() || d2.is_none() => return None,
        PatternKind::Alignment if d1.is_none() && d2.is_none() => return None,
        _ => {}
    }

    // Gather per-direction units and ratio deviations
    let mut units = Vec::with_capacity(4);
    let mut noise = 0f64;
    for runs in [Some(&h_runs), Some(&v_runs), d1.as_ref().map(|d| &d.1), d2.as_ref().map(|d| &d.1)]
        .into_iter()
        .flatten()
    {
        let total: u32 = runs.iter().sum();
        let unit = total as f64 / kind.ratio_sum() as f64;
        units.push(unit);
        let deviation: f64 = kind
            .ratios()
            .iter()
            .zip(runs.iter())
            .map(|(&r, &run)| (run as f64 - r as f64 * unit).abs())
            .sum();
        noise += deviation / total as f64;
    }

    let module_size = units.iter().sum::<f64>() / units.len() as f64;
    noise += units.iter().map(|u| (u - module_size).abs()).sum::<f64>() / module_size;

    Some(Pattern { x: cx, y: cy, module_size, noise, combined: 1 })
}

/// Walks outward from (cx, cy) along (dx, dy) in both directions,
/// collecting the alternating runs of the pattern. Returns the refined
/// center along the walk axis and the run lengths.
fn cross_check(
    img: &BitMatrix,
    cx: i32,
    cy: i32,
    dx: i32,
    dy: i32,
    kind: PatternKind,
    max_run: u32,
) -> Option<(f64, Vec<u32>)> {
    let n = kind.ratios().len();
    let half = n / 2;

    if !get(img, cx, cy)? {
        return None;
    }

    let mut runs = vec![0u32; n];
    runs[half] = 1;

    // Backward
    let (mut x, mut y) = (cx - dx, cy - dy);
    let mut state = half;
    let mut dark = true;
    loop {
        let Some(px) = get(img, x, y) else { break };
        if px != dark {
            if state == 0 {
                break;
            }
            state -= 1;
            dark = px;
        }
        runs[state] += 1;
        if runs[state] > max_run {
            return None;
        }
        x -= dx;
        y -= dy;
    }
    if state != 0 {
        return None;
    }

    // Forward
    let (mut x, mut y) = (cx + dx, cy + dy);
    let mut state = half;
    let mut dark = true;
    let mut end = 0f64;
    loop {
        let Some(px) = get(img, x, y) else {
            end = axis_pos(x, y, dx, dy);
            break;
        };
        if px != dark {
            if state == n - 1 {
                end = axis_pos(x, y, dx, dy);
                break;
            }
            state += 1;
            dark = px;
        }
        runs[state] += 1;
        if runs[state] > max_run {
            return None;
        }
        x += dx;
        y += dy;
    }
    if state != n - 1 {
        return None;
    }

    if !ratio_fits(&runs, kind) {
        return None;
    }

    Some((center_from_end(&runs, end), runs))
}

/// Position along the walk axis; only meaningful for axis-aligned walks.
#[inline]
fn axis_pos(x: i32, y: i32, dx: i32, _dy: i32) -> f64 {
    if dx != 0 {
        x as f64
    } else {
        y as f64
    }
}

/// Combines the candidate into a close-enough existing pattern by
/// weighted average, or records it as new.
fn merge_pattern(patterns: &mut Vec<Pattern>, cand: Pattern, kind: PatternKind) {
    for p in patterns.iter_mut() {
        let close = p.dist(&cand) <= p.module_size * kind.mid_ratio() as f64 / 2.0;
        let size_diff = (p.module_size - cand.module_size).abs();
        if close && (size_diff <= 1.0 || size_diff <= p.module_size) {
            let n = p.combined as f64;
            p.x = (p.x * n + cand.x) / (n + 1.0);
            p.y = (p.y * n + cand.y) / (n + 1.0);
            p.module_size = (p.module_size * n + cand.module_size) / (n + 1.0);
            p.noise = (p.noise * n + cand.noise) / (n + 1.0);
            p.combined += 1;
            return;
        }
    }
    patterns.push(cand);
}

/// Scans the whole image for finder patterns.
pub fn locate_finders(img: &BitMatrix) -> Vec<Pattern> {
    scan_region(img, PatternKind::Finder, 0, 0, img.width(), img.height())
}

// Finder grouping
//------------------------------------------------------------------------------

const MIN_COMBINED: u32 = 3;

const MAX_NOISE: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct FinderGroup {
    pub tl: Pattern,
    pub tr: Pattern,
    pub bl: Pattern,
    pub size: usize,
    pub module_size: f64,
    pub score: f64,
}

/// Forms oriented triples out of the scanned patterns, cheapest first.
pub fn group_finders(img: &BitMatrix, patterns: &[Pattern]) -> Vec<FinderGroup> {
    let filtered: Vec<Pattern> = patterns
        .iter()
        .filter(|p| p.combined >= MIN_COMBINED && p.noise <= MAX_NOISE)
        .copied()
        .collect();

    if filtered.len() == 3 {
        return make_group(img, filtered[0], filtered[1], filtered[2]).into_iter().collect();
    }

    let mut groups: Vec<FinderGroup> = Vec::new();
    for (a, b, c) in filtered.iter().copied().tuple_combinations() {
        // Module sizes must agree pairwise within a 0.5 ratio
        let similar = [(a, b), (a, c), (b, c)].iter().all(|(p, q)| {
            let (lo, hi) =
                if p.module_size < q.module_size { (p.module_size, q.module_size) } else { (q.module_size, p.module_size) };
            hi / lo - 1.0 <= 0.5
        });
        if !similar {
            continue;
        }

        let Some(group) = make_group(img, a, b, c) else { continue };

        // A comparable-scale candidate nested inside the symbol means
        // superposed patterns
        let nested = filtered.iter().any(|p| {
            [a, b, c].iter().all(|g| g.dist(p) > 1.0)
                && (p.module_size / group.module_size - 1.0).abs() <= 0.5
                && inside_quad(&group, p)
        });
        if nested {
            continue;
        }

        groups.push(group);
    }

    groups.sort_by(|a, b| a.score.partial_cmp(&b.score).expect("scores are finite"));
    groups
}

/// Orients a triple as TL/TR/BL and derives the symbol size; fails when
/// the geometry cannot belong to one symbol.
fn make_group(img: &BitMatrix, a: Pattern, b: Pattern, c: Pattern) -> Option<FinderGroup> {
    // The two most distant patterns span the hypotenuse; the remaining
    // one is the top-left
    let dab = a.dist(&b);
    let dac = a.dist(&c);
    let dbc = b.dist(&c);
    let (tl, mut tr, mut bl) = if dab >= dac && dab >= dbc {
        (c, a, b)
    } else if dac >= dab && dac >= dbc {
        (b, a, c)
    } else {
        (a, b, c)
    };

    // Swap so the cross product of (TR - TL) x (BL - TL) is positive,
    // which in image coordinates puts TR clockwise from BL
    let cross = (tr.x - tl.x) * (bl.y - tl.y) - (tr.y - tl.y) * (bl.x - tl.x);
    if cross < 0.0 {
        std::mem::swap(&mut tr, &mut bl);
    }

    let module_size = (tl.module_size + tr.module_size + bl.module_size) / 3.0;

    // Top-left corner angle
    let e1 = tl.dist(&tr);
    let e2 = tl.dist(&bl);
    let dot = (tr.x - tl.x) * (bl.x - tl.x) + (tr.y - tl.y) * (bl.y - tl.y);
    let angle = (dot / (e1 * e2)).clamp(-1.0, 1.0).acos().to_degrees();
    if !(40.0..=140.0).contains(&angle) {
        return None;
    }

    // Edges must agree in module counts
    let ms_x = (tl.module_size + tr.module_size) / 2.0;
    let ms_y = (tl.module_size + bl.module_size) / 2.0;
    if (e1 / ms_x - e2 / ms_y).abs() > 4.0 {
        return None;
    }

    let size = estimate_size(&tl, &tr, &bl, module_size)?;
    if !(21..=177).contains(&size) {
        return None;
    }

    // Estimated timing lines must show plausible module transitions
    let vx = ((bl.x - tl.x) / e2, (bl.y - tl.y) / e2);
    let ux = ((tr.x - tl.x) / e1, (tr.y - tl.y) / e1);
    let off = 2.5 * module_size;
    let h_from = (tl.x + vx.0 * off, tl.y + vx.1 * off);
    let h_to = (tr.x + vx.0 * off, tr.y + vx.1 * off);
    let v_from = (tl.x + ux.0 * off, tl.y + ux.1 * off);
    let v_to = (bl.x + ux.0 * off, bl.y + ux.1 * off);
    if !check_timing_line(img, h_from, h_to, size) || !check_timing_line(img, v_from, v_to, size) {
        return None;
    }

    let symmetry = (e1 / e2 - 1.0).abs();
    let score = tl.noise + tr.noise + bl.noise + symmetry;

    Some(FinderGroup { tl, tr, bl, size, module_size, score })
}

/// Average edge length over the module size, plus the seven modules of
/// the two finder halves; normalized to 1 mod 4.
fn estimate_size(tl: &Pattern, tr: &Pattern, bl: &Pattern, module_size: f64) -> Option<usize> {
    let d = (tl.dist(tr) + tl.dist(bl)) / 2.0 / module_size;
    let size = d.round() as i64 + 7;
    let size = match size & 3 {
        0 => size + 1,
        2 => size - 1,
        3 => size + 2,
        _ => size,
    };
    usize::try_from(size).ok()
}

/// Counts color transitions along the segment and accepts when they are
/// plausible for a timing line of the estimated size.
pub fn check_timing_line(img: &BitMatrix, from: (f64, f64), to: (f64, f64), size: usize) -> bool {
    let transitions = count_transitions(img, from, to);
    let lo = size.saturating_sub(14 + 2.max((size - 17) / 4));
    let hi = size + 8;
    (lo..=hi).contains(&transitions)
}

fn count_transitions(img: &BitMatrix, from: (f64, f64), to: (f64, f64)) -> usize {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let steps = dx.abs().max(dy.abs()).ceil() as usize;
    if steps == 0 {
        return 0;
    }

    let mut transitions = 0;
    let mut prev = None;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = (from.0 + dx * t) as i32;
        let y = (from.1 + dy * t) as i32;
        let Some(px) = get(img, x, y) else { continue };
        if let Some(p) = prev {
            if p != px {
                transitions += 1;
            }
        }
        prev = Some(px);
    }
    transitions
}

/// True when the pattern sits strictly inside the parallelogram spanned
/// by the group's finders.
fn inside_quad(group: &FinderGroup, p: &Pattern) -> bool {
    let ux = group.tr.x - group.tl.x;
    let uy = group.tr.y - group.tl.y;
    let vx = group.bl.x - group.tl.x;
    let vy = group.bl.y - group.tl.y;
    let det = ux * vy - uy * vx;
    if det.abs() < f64::EPSILON {
        return false;
    }
    let px = p.x - group.tl.x;
    let py = p.y - group.tl.y;
    let s = (px * vy - py * vx) / det;
    let t = (ux * py - uy * px) / det;
    (0.05..=0.95).contains(&s) && (0.05..=0.95).contains(&t)
}
