//! Ordering and orientation of a profile/guide curve network.

use luthier_kernel_nurbs::BSplineCurve;

use crate::{GordonError, Result};

/// A sorted network: curves plus their `[profile][guide]` intersection parameters.
#[derive(Debug, Clone)]
pub struct SortedNetwork {
    /// Profiles in network order.
    pub profiles: Vec<BSplineCurve>,
    /// Guides in network order.
    pub guides: Vec<BSplineCurve>,
    /// Parameter on profile `i` where it meets guide `j`.
    pub params_profiles: Vec<Vec<f64>>,
    /// Parameter on guide `j` where it meets profile `i`.
    pub params_guides: Vec<Vec<f64>>,
}

/// Sorts and orients a curve network into a grid.
///
/// After [`perform`](Self::perform), profile 0 and guide 0 start at the same
/// corner, guides are ordered along the first profile, profiles are ordered
/// along the first guide, and every curve runs in the direction of the
/// network.
#[derive(Debug, Clone)]
pub struct CurveNetworkSorter {
    profiles: Vec<BSplineCurve>,
    guides: Vec<BSplineCurve>,
    params_profiles: Vec<Vec<f64>>,
    params_guides: Vec<Vec<f64>>,
    profile_ids: Vec<String>,
    guide_ids: Vec<String>,
    performed: bool,
}

impl CurveNetworkSorter {
    /// Create a sorter over owned curves and `[profile][guide]` parameter matrices.
    pub fn new(
        profiles: Vec<BSplineCurve>,
        guides: Vec<BSplineCurve>,
        params_profiles: Vec<Vec<f64>>,
        params_guides: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if profiles.len() < 2 {
            return Err(GordonError::TooFewProfiles(profiles.len()));
        }
        if guides.len() < 2 {
            return Err(GordonError::TooFewGuides(guides.len()));
        }
        let (rows, cols) = (profiles.len(), guides.len());
        let well_shaped = |m: &Vec<Vec<f64>>| m.len() == rows && m.iter().all(|r| r.len() == cols);
        if !well_shaped(&params_profiles) || !well_shaped(&params_guides) {
            return Err(GordonError::MatrixShape { rows, cols });
        }

        Ok(Self {
            profile_ids: (0..rows).map(|i| i.to_string()).collect(),
            guide_ids: (0..cols).map(|j| j.to_string()).collect(),
            profiles,
            guides,
            params_profiles,
            params_guides,
            performed: false,
        })
    }

    /// Find the profile and guide that start the network.
    ///
    /// Returns `(profile, guide, guide_must_be_reversed)`. A pair starts the
    /// network if the profile's smallest parameter lies on a guide whose
    /// smallest parameter lies on that profile. Closed loops can lack such a
    /// pair; then a guide whose largest parameter meets the profile's start
    /// is accepted and flagged for reversal.
    pub fn start_curve_indices(&self) -> Result<(usize, usize, bool)> {
        for row in 0..self.profiles.len() {
            let jmin = min_row_index(&self.params_profiles, row);
            if min_col_index(&self.params_guides, jmin) == row {
                return Ok((row, jmin, false));
            }
        }
        for row in 0..self.profiles.len() {
            let jmin = min_row_index(&self.params_profiles, row);
            if max_col_index(&self.params_guides, jmin) == row {
                return Ok((row, jmin, true));
            }
        }
        Err(GordonError::NoStartCurves)
    }

    /// Sort and orient the network. Later calls do nothing.
    pub fn perform(&mut self) -> Result<()> {
        if self.performed {
            return Ok(());
        }
        let (prof_start, guide_start, reverse_guide) = self.start_curve_indices()?;

        self.swap_profiles(0, prof_start);
        self.swap_guides(0, guide_start);
        if reverse_guide {
            self.reverse_guide(0);
        }

        let n_guides = self.guides.len();
        for n in (2..=n_guides).rev() {
            for j in 1..n - 1 {
                if self.params_profiles[0][j] > self.params_profiles[0][j + 1] {
                    self.swap_guides(j, j + 1);
                }
            }
        }
        let n_profiles = self.profiles.len();
        for n in (2..=n_profiles).rev() {
            for i in 1..n - 1 {
                if self.params_guides[i][0] > self.params_guides[i + 1][0] {
                    self.swap_profiles(i, i + 1);
                }
            }
        }

        for i in 1..n_profiles {
            if self.params_profiles[i][0] > self.params_profiles[i][n_guides - 1] {
                self.reverse_profile(i);
            }
        }
        for j in 1..n_guides {
            if self.params_guides[0][j] > self.params_guides[n_profiles - 1][j] {
                self.reverse_guide(j);
            }
        }

        self.performed = true;
        Ok(())
    }

    /// Profiles in their current order.
    pub fn profiles(&self) -> &[BSplineCurve] {
        &self.profiles
    }

    /// Guides in their current order.
    pub fn guides(&self) -> &[BSplineCurve] {
        &self.guides
    }

    /// Parameters on the profiles, `[profile][guide]`.
    pub fn params_profiles(&self) -> &[Vec<f64>] {
        &self.params_profiles
    }

    /// Parameters on the guides, `[profile][guide]`.
    pub fn params_guides(&self) -> &[Vec<f64>] {
        &self.params_guides
    }

    /// Input index of each profile, prefixed with `-` if it was reversed.
    pub fn profile_ids(&self) -> &[String] {
        &self.profile_ids
    }

    /// Input index of each guide, prefixed with `-` if it was reversed.
    pub fn guide_ids(&self) -> &[String] {
        &self.guide_ids
    }

    /// Consume the sorter.
    pub fn into_network(self) -> SortedNetwork {
        SortedNetwork {
            profiles: self.profiles,
            guides: self.guides,
            params_profiles: self.params_profiles,
            params_guides: self.params_guides,
        }
    }

    fn swap_profiles(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.profiles.swap(a, b);
        self.profile_ids.swap(a, b);
        self.params_profiles.swap(a, b);
        self.params_guides.swap(a, b);
    }

    fn swap_guides(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.guides.swap(a, b);
        self.guide_ids.swap(a, b);
        for row in self.params_profiles.iter_mut().chain(self.params_guides.iter_mut()) {
            row.swap(a, b);
        }
    }

    fn reverse_profile(&mut self, idx: usize) {
        let (first, last) = self.profiles[idx].parameter_domain();
        for p in &mut self.params_profiles[idx] {
            *p = -*p + first + last;
        }
        self.profiles[idx] = self.profiles[idx].reversed();
        self.profile_ids[idx].insert(0, '-');
    }

    fn reverse_guide(&mut self, idx: usize) {
        let (first, last) = self.guides[idx].parameter_domain();
        for row in &mut self.params_guides {
            row[idx] = -row[idx] + first + last;
        }
        self.guides[idx] = self.guides[idx].reversed();
        self.guide_ids[idx].insert(0, '-');
    }
}

/// Column of the first minimum in `row`.
fn min_row_index(m: &[Vec<f64>], row: usize) -> usize {
    first_extreme(m[row].iter().copied(), |a, b| a < b)
}

/// Row of the first minimum in `col`.
fn min_col_index(m: &[Vec<f64>], col: usize) -> usize {
    first_extreme(m.iter().map(|r| r[col]), |a, b| a < b)
}

/// Row of the first maximum in `col`.
fn max_col_index(m: &[Vec<f64>], col: usize) -> usize {
    first_extreme(m.iter().map(|r| r[col]), |a, b| a > b)
}

fn first_extreme(values: impl Iterator<Item = f64>, better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best_idx = 0;
    let mut best: Option<f64> = None;
    for (idx, v) in values.enumerate() {
        if best.map_or(true, |b| better(v, b)) {
            best = Some(v);
            best_idx = idx;
        }
    }
    best_idx
}
