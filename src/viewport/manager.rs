use std::collections::BTreeSet;
use std::ops::Range;

use super::layout::Layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportPolicy {
    pub batch_size: usize,
    pub load_threshold: usize,
    pub unload_threshold: usize,
}

impl Default for ViewportPolicy {
    fn default() -> Self {
        Self {
            batch_size: 10,
            load_threshold: 5,
            unload_threshold: 20,
        }
    }
}

/// Batch surrounding a jump target: `[page - B, page + B)` clipped to the document.
pub fn goto_range(page: usize, total_pages: usize, policy: &ViewportPolicy) -> Range<usize> {
    let start = page.saturating_sub(policy.batch_size);
    let end = page.saturating_add(policy.batch_size).min(total_pages);
    start..end.max(start)
}

/// Pages to fetch for the current visible page, in load order. Empty when nothing is
/// needed.
pub fn plan_lazy_load(
    visible: usize,
    resident: &BTreeSet<usize>,
    total_pages: usize,
    policy: &ViewportPolicy,
) -> Vec<usize> {
    if total_pages == 0 || visible >= total_pages {
        return Vec::new();
    }
    let (Some(&min_loaded), Some(&max_loaded)) = (resident.first(), resident.last()) else {
        return goto_range(visible, total_pages, policy).collect();
    };
    if !resident.contains(&visible) {
        return goto_range(visible, total_pages, policy)
            .filter(|page| !resident.contains(page))
            .collect();
    }

    let mut pages = Vec::new();
    if visible + policy.load_threshold > max_loaded {
        let start = max_loaded + 1;
        let end = start.saturating_add(policy.batch_size).min(total_pages);
        pages.extend((start..end).filter(|page| !resident.contains(page)));
    }
    if visible < min_loaded + policy.load_threshold {
        let start = min_loaded.saturating_sub(policy.batch_size);
        pages.extend((start..min_loaded).filter(|page| !resident.contains(page)));
    }
    pages
}

/// Resident pages farther than the unload threshold from the visible page. Pinned
/// pages are never returned.
pub fn plan_unload(
    visible: usize,
    resident: &BTreeSet<usize>,
    policy: &ViewportPolicy,
    pinned: &[usize],
) -> Vec<usize> {
    resident
        .iter()
        .copied()
        .filter(|&page| page.abs_diff(visible) > policy.unload_threshold)
        .filter(|page| !pinned.contains(page))
        .collect()
}

/// Viewport state owned by the session: geometry, residency policy and the single
/// in-flight lazy load guard.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub layout: Layout,
    policy: ViewportPolicy,
    loading: bool,
    layout_epoch: u64,
}

impl Viewport {
    pub fn new(layout: Layout, policy: ViewportPolicy) -> Self {
        Self {
            layout,
            policy,
            loading: false,
            layout_epoch: 0,
        }
    }

    pub fn policy(&self) -> &ViewportPolicy {
        &self.policy
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Claims the load guard. Returns false while another lazy load is in flight.
    pub fn begin_load(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn finish_load(&mut self) {
        self.loading = false;
    }

    /// Results produced under an older epoch were rasterized for a different geometry.
    pub fn layout_epoch(&self) -> u64 {
        self.layout_epoch
    }

    pub fn bump_layout_epoch(&mut self) -> u64 {
        self.layout_epoch = self.layout_epoch.saturating_add(1);
        self.layout_epoch
    }

    pub fn visible_page(&self) -> usize {
        self.layout.visible_page()
    }

    pub fn lazy_load_plan(&self, resident: &BTreeSet<usize>) -> Vec<usize> {
        plan_lazy_load(
            self.layout.visible_page(),
            resident,
            self.layout.total_pages(),
            &self.policy,
        )
    }

    pub fn unload_plan(&self, resident: &BTreeSet<usize>, pinned: &[usize]) -> Vec<usize> {
        plan_unload(self.layout.visible_page(), resident, &self.policy, pinned)
    }

    pub fn goto_range(&self, page: usize) -> Range<usize> {
        goto_range(page, self.layout.total_pages(), &self.policy)
    }
}
