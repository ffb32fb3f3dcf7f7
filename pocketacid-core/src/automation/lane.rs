//! AutomationLane (spec §3/§4.2): a sequence of nodes stored as a
//! contiguous slice inside a shared `AutomationNodePool`.

use serde::{Deserialize, Serialize};

use super::node::AutomationNode;
use super::pool::{AutomationNodePool, LANE_MAX_NODES};

const MAX_OPTION_LABELS: usize = 8;
const MAX_LABEL_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationLane {
    start: Option<usize>,
    capacity: usize,
    count: usize,
    pub enabled: bool,
    option_labels: Vec<String>,
}

impl Default for AutomationLane {
    fn default() -> Self {
        Self {
            start: None,
            capacity: 0,
            count: 0,
            enabled: true,
            option_labels: Vec::new(),
        }
    }
}

impl AutomationLane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option_count(&self) -> usize {
        self.option_labels.len()
    }

    pub fn is_option_lane(&self) -> bool {
        !self.option_labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn nodes<'p>(&self, pool: &'p AutomationNodePool) -> &'p [AutomationNode] {
        match self.start {
            Some(s) => pool.slice(s, self.count),
            None => &[],
        }
    }

    /// Read-only view of this lane's live nodes, for scene dumps.
    pub fn nodes_for_dump<'p>(&self, pool: &'p AutomationNodePool) -> &'p [AutomationNode] {
        self.nodes(pool)
    }

    /// Growth policy: `max(requested, 2*current, 4)` capped at
    /// `LANE_MAX_NODES`; on failure at the capped size, retry at exactly
    /// `requested`. Relocates live nodes into the new block.
    fn ensure_capacity(&mut self, pool: &mut AutomationNodePool, requested: usize) -> bool {
        if requested <= self.capacity {
            return true;
        }
        let grown = requested.max(self.capacity * 2).max(4).min(LANE_MAX_NODES);
        let try_sizes = if grown > requested {
            [grown, requested]
        } else {
            [requested, requested]
        };
        for &new_len in &try_sizes {
            if new_len < requested {
                continue;
            }
            if let Some(new_start) = pool.reserve_block(new_len) {
                if let Some(old_start) = self.start {
                    {
                        let (src_data, dst_ready) = (old_start, new_start);
                        for i in 0..self.count {
                            let node = pool.slice(src_data, self.count)[i];
                            pool.slice_mut(dst_ready, new_len)[i] = node;
                        }
                    }
                    pool.free_block(old_start, self.capacity);
                }
                self.start = Some(new_start);
                self.capacity = new_len;
                return true;
            }
        }
        false
    }

    /// `appendNode(x, y) -> bool`.
    pub fn append_node(&mut self, pool: &mut AutomationNodePool, x: u8, y: u8) -> bool {
        if let Some(last) = self.nodes(pool).last() {
            if x < last.x {
                return false;
            }
            let same_x_count = self.nodes(pool).iter().filter(|n| n.x == x).count();
            if same_x_count >= 2 {
                return false;
            }
        }
        let y = self.clamp_y(y);
        if self.count == self.capacity && !self.ensure_capacity(pool, self.count + 1) {
            return false;
        }
        let start = self.start.expect("capacity ensured");
        pool.slice_mut(start, self.capacity)[self.count] = AutomationNode::new(x, y);
        self.count += 1;
        true
    }

    fn clamp_y(&self, y: u8) -> u8 {
        if self.is_option_lane() {
            let max = (self.option_labels.len() - 1).min(255) as u8;
            y.min(max)
        } else {
            y
        }
    }

    /// `evaluate(t) -> u8`: total over all `t`, 0 for empty lanes.
    pub fn evaluate(&self, pool: &AutomationNodePool, t: f32) -> u8 {
        let nodes = self.nodes(pool);
        if nodes.is_empty() {
            return 0;
        }
        let first = nodes[0];
        let last = nodes[nodes.len() - 1];
        if t <= first.x as f32 {
            return first.y;
        }
        if t >= last.x as f32 {
            return last.y;
        }
        for w in nodes.windows(2) {
            let (a, b) = (w[0], w[1]);
            if t >= a.x as f32 && t <= b.x as f32 {
                if self.is_option_lane() || a.x == b.x {
                    return a.y;
                }
                let span = (b.x - a.x) as f32;
                let frac = if span > 0.0 { (t - a.x as f32) / span } else { 0.0 };
                let value = a.y as f32 + (b.y as f32 - a.y as f32) * frac;
                return value.round().clamp(0.0, 255.0) as u8;
            }
        }
        last.y
    }

    /// `clear()`: releases the pool slice, resets count and enabled.
    pub fn clear(&mut self, pool: &mut AutomationNodePool) {
        if let Some(start) = self.start.take() {
            pool.free_block(start, self.capacity);
        }
        self.capacity = 0;
        self.count = 0;
        self.enabled = true;
    }

    /// `setOptions(labels[])`: copies up to 8 labels, truncating, and
    /// re-clamps existing node y-values into the new option range.
    pub fn set_options(&mut self, pool: &mut AutomationNodePool, labels: &[&str]) {
        self.option_labels = labels
            .iter()
            .take(MAX_OPTION_LABELS)
            .map(|s| {
                let mut s = s.to_string();
                s.truncate(MAX_LABEL_LEN);
                s
            })
            .collect();
        if self.is_option_lane() {
            if let Some(start) = self.start {
                let max = (self.option_labels.len() - 1).min(255) as u8;
                for node in pool.slice_mut(start, self.count) {
                    node.y = node.y.min(max);
                }
            }
        }
    }

    pub fn option_labels(&self) -> &[String] {
        &self.option_labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lane_evaluates_zero() {
        let pool = AutomationNodePool::new(64);
        let lane = AutomationLane::new();
        assert_eq!(lane.evaluate(&pool, 5.0), 0);
    }

    #[test]
    fn append_rejects_decreasing_x() {
        let mut pool = AutomationNodePool::new(64);
        let mut lane = AutomationLane::new();
        assert!(lane.append_node(&mut pool, 5, 10));
        assert!(!lane.append_node(&mut pool, 3, 10));
    }

    #[test]
    fn append_rejects_third_node_at_same_x() {
        let mut pool = AutomationNodePool::new(64);
        let mut lane = AutomationLane::new();
        assert!(lane.append_node(&mut pool, 5, 10));
        assert!(lane.append_node(&mut pool, 5, 20));
        assert!(!lane.append_node(&mut pool, 5, 30));
    }

    #[test]
    fn linear_interpolation_between_nodes() {
        let mut pool = AutomationNodePool::new(64);
        let mut lane = AutomationLane::new();
        lane.append_node(&mut pool, 0, 0);
        lane.append_node(&mut pool, 10, 100);
        assert_eq!(lane.evaluate(&pool, 0.0), 0);
        assert_eq!(lane.evaluate(&pool, 10.0), 100);
        assert_eq!(lane.evaluate(&pool, 5.0), 50);
        assert_eq!(lane.evaluate(&pool, -5.0), 0);
        assert_eq!(lane.evaluate(&pool, 50.0), 100);
    }

    #[test]
    fn option_lane_step_holds_and_clamps_on_narrow() {
        let mut pool = AutomationNodePool::new(64);
        let mut lane = AutomationLane::new();
        lane.set_options(&mut pool, &["lp1", "acid", "moog"]);
        assert!(lane.append_node(&mut pool, 0, 255));
        assert!(lane.append_node(&mut pool, 15, 0));
        lane.set_options(&mut pool, &["lp1", "acid"]);
        assert_eq!(lane.evaluate(&pool, 0.0), 1);
        assert_eq!(lane.evaluate(&pool, 15.0), 0);
        assert_eq!(lane.evaluate(&pool, 7.0), 1);
    }

    #[test]
    fn clear_releases_block_for_reuse() {
        let mut pool = AutomationNodePool::new(8);
        let mut lane = AutomationLane::new();
        for x in 0..8u8 {
            lane.append_node(&mut pool, x, x * 10);
        }
        lane.clear(&mut pool);
        assert_eq!(lane.len(), 0);
        let mut other = AutomationLane::new();
        assert!(other.append_node(&mut pool, 0, 1));
    }

    #[test]
    fn pool_exhaustion_leaves_lane_unchanged() {
        let mut pool = AutomationNodePool::new(2);
        let mut lane = AutomationLane::new();
        assert!(lane.append_node(&mut pool, 0, 1));
        assert!(lane.append_node(&mut pool, 1, 2));
        let before = lane.len();
        assert!(!lane.append_node(&mut pool, 2, 3));
        assert_eq!(lane.len(), before);
    }
}
